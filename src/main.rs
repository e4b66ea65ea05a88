use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sales_kpi::logging::init_logging;
use sales_kpi::{
    compute_kpis, load_table, profile_table, summarize, CleaningReport, Config, KpiFilter, KpiSet,
    Pipeline, PipelineOutput,
};

#[derive(Debug, Parser)]
#[command(name = "sales-kpi", version, about = "Clean a sales export and compute KPIs")]
struct Cli {
    /// TOML config file (default: ./sales-kpi.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Source spreadsheet or CSV
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Clean snapshot destination (.xlsx, .csv, .db, .sqlite)
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the cleaning pipeline and print the cleaning report (default)
    Run,

    /// Compute KPIs over the clean data, optionally filtered
    Kpi {
        /// First day included (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day included (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Exact category, or ALL
        #[arg(long)]
        category: Option<String>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Preview the raw source: columns, missing values, distinct values
    Profile,

    /// Descriptive statistics over the clean data
    Summary {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(input) = cli.input {
        config.input_path = input;
    }
    if let Some(snapshot) = cli.snapshot {
        config.snapshot_path = Some(snapshot);
    }

    init_logging(&config.log_filter);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let output = run_or_exit(&config);
            print_report(&config, &output);
        }
        Command::Kpi {
            from,
            to,
            category,
            json,
        } => {
            let output = run_or_exit(&config);
            let mut filter = KpiFilter::new().with_range(from, to);
            if let Some(category) = category {
                filter = filter.with_category(category);
            }
            let kpis = compute_kpis(&filter.apply(&output.transactions));
            if json {
                println!("{}", serde_json::to_string_pretty(&kpis)?);
            } else {
                print_kpis(&kpis);
            }
        }
        Command::Profile => {
            let table = match load_table(&config.input_path) {
                Ok(table) => table,
                Err(e) => exit_with(&e),
            };
            let profile = profile_table(&table);

            println!("🔍 Source preview: {}", config.input_path.display());
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("{}", profile.summary());
            println!();
            println!("{:<32} {:>10} {:>10}", "Column", "Missing", "Distinct");
            for column in &profile.column_profiles {
                println!("{:<32} {:>10} {:>10}", column.name, column.missing, column.distinct);
            }
        }
        Command::Summary { json } => {
            let output = run_or_exit(&config);
            let summary = summarize(&output.transactions);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("📋 Dataset summary");
                println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
                println!("Transactions:     {}", summary.transactions);
                println!("Unique clients:   {}", summary.unique_clients);
                if let Some((start, end)) = summary.period() {
                    println!("Period:           {} → {}", start, end);
                }
                println!("Categories:       {}", summary.categories);
                println!("Payment methods:  {}", summary.payment_methods);
                println!(
                    "Amounts:          total {:.2}€ | mean {:.2}€ | median {:.2}€ | std {:.2}€",
                    summary.amounts.total,
                    summary.amounts.mean,
                    summary.amounts.median,
                    summary.amounts.std_dev
                );
                println!(
                    "                  min {:.2}€ | max {:.2}€",
                    summary.amounts.min, summary.amounts.max
                );
                println!("\nPer category:");
                for c in &summary.per_category {
                    println!("  {:<24} {:>6} ({:.2}%)", c.label, c.count, c.percentage);
                }
                println!("\nPer payment method:");
                for p in &summary.per_payment_method {
                    println!("  {:<24} {:>6} ({:.2}%)", p.label, p.count, p.percentage);
                }
            }
        }
    }

    Ok(())
}

/// A fatal pipeline error ends the process with status 1
fn run_or_exit(config: &Config) -> PipelineOutput {
    match Pipeline::from_config(config).run() {
        Ok(output) => output,
        Err(e) => exit_with(&e),
    }
}

fn exit_with(err: &sales_kpi::PipelineError) -> ! {
    eprintln!("❌ {}", err);
    std::process::exit(1);
}

fn print_report(config: &Config, output: &PipelineOutput) {
    let report: &CleaningReport = &output.report;

    println!("🧹 Sales KPI - Cleaning pipeline");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Source:   {}", config.input_path.display());
    println!("Run:      {}", report.run_id);

    if let Some(warning) = &output.schema_warning {
        println!("\n⚠️  Schema incomplete: {}", warning);
    }

    println!("\n📊 Cleaning report");
    println!("  Initial rows:             {}", report.initial_rows);
    println!("  Empty rows:               {}", report.empty_rows);
    println!("  Duplicates:               {}", report.duplicates);
    println!("  Invalid client ids:       {}", report.invalid_client_ids);
    println!("  Invalid amounts:          {}", report.invalid_amounts);
    println!("  Unparseable dates:        {}", report.invalid_dates);
    println!("  Future dates:             {}", report.future_dates);
    println!("  Invalid categories:       {}", report.invalid_categories);
    println!("  Invalid payment methods:  {}", report.invalid_payment_methods);
    println!("  Final rows:               {}", report.final_rows);
    println!("  Loss:                     {:.2}%", report.loss_percentage);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    match &output.snapshot_error {
        None => println!("✓ Snapshot written: {}", config.snapshot_destination().display()),
        Some(e) => println!("⚠️  Snapshot not written: {}", e),
    }
}

fn print_kpis(kpis: &KpiSet) {
    println!("📈 KPIs");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if kpis.is_empty() {
        println!("No transactions match the filter.");
        return;
    }

    println!("Transactions:      {}", kpis.nb_transactions);
    println!("Unique clients:    {}", kpis.nb_clients);
    println!("Revenue:           {:.2}€", kpis.total_amount);
    println!("Mean basket:       {:.2}€", kpis.mean_amount);
    println!(
        "Recurrence rate:   {:.1}% ({}/{} clients)",
        kpis.recurrence_rate, kpis.recurring_clients, kpis.nb_clients
    );
    println!(
        "CLV:               mean {:.2}€ | min {:.2}€ | max {:.2}€ | median {:.2}€",
        kpis.clv.mean, kpis.clv.min, kpis.clv.max, kpis.clv.median
    );

    if let Some(top) = &kpis.top_category {
        println!("Top category:      {} ({:.2}€)", top.name, top.total);
    }

    println!("\nRevenue by category:");
    for c in &kpis.category_totals {
        println!("  {:<24} {:>12.2}€ ({:.2}%)", c.category, c.total, c.share);
    }

    println!("\nPayment methods:");
    for p in &kpis.payment_methods {
        println!("  {:<24} {:>6} ({:.2}%)", p.method, p.count, p.share);
    }
}
