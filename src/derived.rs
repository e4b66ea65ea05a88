// 📅 Derived-Attribute Generator
// Calendar columns computed from the cleaned date column. Adds columns, never removes rows.

use crate::schema::CanonicalField;
use crate::table::{Cell, Table};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

pub const YEAR_COLUMN: &str = "Annee";
pub const MONTH_COLUMN: &str = "Mois";
pub const DAY_COLUMN: &str = "Jour";
pub const WEEKDAY_COLUMN: &str = "Jour_Semaine";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarAttributes {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub weekday_name: String,
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn calendar_for(date: NaiveDate) -> CalendarAttributes {
    CalendarAttributes {
        year: date.year(),
        month: date.month(),
        day: date.day(),
        weekday_name: weekday_name(date.weekday()).to_string(),
    }
}

fn calendar_column<F>(calendars: &[Option<CalendarAttributes>], f: F) -> Vec<Cell>
where
    F: Fn(&CalendarAttributes) -> Cell,
{
    calendars
        .iter()
        .map(|c| c.as_ref().map(&f).unwrap_or(Cell::Empty))
        .collect()
}

/// Append (or overwrite) the calendar columns.
///
/// Returns the table unchanged when there is no date column. Rows are expected
/// to hold cleaned date-time cells; a row that doesn't gets empty calendar cells.
pub fn add_calendar_columns(mut table: Table) -> Table {
    let Some(date_idx) = table.column_index(CanonicalField::Date.column_name()) else {
        return table;
    };

    let calendars: Vec<Option<CalendarAttributes>> = table
        .column(date_idx)
        .map(|cell| cell.as_datetime().map(|dt| calendar_for(dt.date())))
        .collect();

    let years = calendar_column(&calendars, |c| Cell::Number(c.year as f64));
    let months = calendar_column(&calendars, |c| Cell::Number(c.month as f64));
    let days = calendar_column(&calendars, |c| Cell::Number(c.day as f64));
    let weekdays = calendar_column(&calendars, |c| Cell::text(c.weekday_name.clone()));

    table.set_column(YEAR_COLUMN, years);
    table.set_column(MONTH_COLUMN, months);
    table.set_column(DAY_COLUMN, days);
    table.set_column(WEEKDAY_COLUMN, weekdays);
    table
}
