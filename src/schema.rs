// 📐 Schema Normalizer
// Maps variant column names onto the five canonical transaction fields.

use crate::table::Table;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

// ============================================================================
// CANONICAL FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    ClientId,
    Amount,
    Date,
    Category,
    PaymentMethod,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 5] = [
        CanonicalField::ClientId,
        CanonicalField::Amount,
        CanonicalField::Date,
        CanonicalField::Category,
        CanonicalField::PaymentMethod,
    ];

    /// Column name used in the normalized table and the clean snapshot
    pub fn column_name(&self) -> &'static str {
        match self {
            CanonicalField::ClientId => "ID_Client",
            CanonicalField::Amount => "Montant",
            CanonicalField::Date => "Date",
            CanonicalField::Category => "Categorie",
            CanonicalField::PaymentMethod => "Mode_Paiement",
        }
    }

    /// Internal field name
    pub fn key(&self) -> &'static str {
        match self {
            CanonicalField::ClientId => "client_id",
            CanonicalField::Amount => "amount",
            CanonicalField::Date => "date",
            CanonicalField::Category => "category",
            CanonicalField::PaymentMethod => "payment_method",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

// ============================================================================
// SYNONYM REGISTRY
// ============================================================================

/// Lookup key for a raw column name: trimmed, lowercased, with `_` and
/// whitespace runs collapsed into a single space.
pub fn normalize_column_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Immutable map from normalized raw names to canonical fields.
pub struct SynonymRegistry {
    synonyms: HashMap<String, CanonicalField>,
}

impl SynonymRegistry {
    /// Registry holding every known French/English variant
    pub fn new() -> Self {
        let mut registry = SynonymRegistry {
            synonyms: HashMap::new(),
        };
        registry.register_known_synonyms();
        registry
    }

    fn register_known_synonyms(&mut self) {
        use CanonicalField::*;

        for name in [
            "ID Client", "id client", "ID_client", "id_client", "Client ID",
            "client_id", "ClientID", "ID_Client", "Customer ID",
        ] {
            self.register(name, ClientId);
        }

        for name in [
            "Montant", "montant", "Montant de la transaction", "Montant_Transaction",
            "montant_transaction", "MontantTransaction", "Transaction", "Amount", "Prix",
        ] {
            self.register(name, Amount);
        }

        for name in [
            "Date", "date", "Date de la transaction", "Date_Transaction",
            "date_transaction", "DateTransaction", "Transaction Date",
        ] {
            self.register(name, Date);
        }

        for name in [
            "Catégorie", "Categorie", "categorie", "Category", "Catégorie de produit",
            "Categorie_Produit", "categorie_produit", "CategorieProduit", "Produit",
        ] {
            self.register(name, Category);
        }

        for name in [
            "Mode de paiement", "Mode_de_paiement", "Paiement", "Payment",
            "Mode_Paiement", "mode_paiement", "ModePaiement", "Payment Method",
        ] {
            self.register(name, PaymentMethod);
        }
    }

    pub fn register(&mut self, raw_name: &str, field: CanonicalField) {
        self.synonyms.insert(normalize_column_key(raw_name), field);
    }

    pub fn lookup(&self, raw_name: &str) -> Option<CanonicalField> {
        self.synonyms.get(&normalize_column_key(raw_name)).copied()
    }

    pub fn count(&self) -> usize {
        self.synonyms.len()
    }
}

impl Default for SynonymRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Built once on first use
pub static SYNONYMS: Lazy<SynonymRegistry> = Lazy::new(SynonymRegistry::new);

// ============================================================================
// NORMALIZATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMapping {
    pub raw: String,
    pub normalized: String,
    pub field: Option<CanonicalField>,
}

/// Non-fatal warning: canonical columns absent after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaIncomplete {
    pub missing: Vec<CanonicalField>,
    pub unmapped: Vec<String>,
}

impl fmt::Display for SchemaIncomplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let missing: Vec<&str> = self.missing.iter().map(|m| m.column_name()).collect();
        write!(
            f,
            "missing canonical columns [{}]; unmapped columns [{}]",
            missing.join(", "),
            self.unmapped.join(", ")
        )
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub table: Table,
    pub mappings: Vec<ColumnMapping>,
    pub warning: Option<SchemaIncomplete>,
}

impl NormalizedTable {
    pub fn is_complete(&self) -> bool {
        self.warning.is_none()
    }
}

/// Rename raw columns to canonical names; unmatched columns keep their trimmed name.
/// If two raw columns resolve to the same field, the first one wins.
pub fn normalize_columns(table: Table) -> NormalizedTable {
    normalize_with(&SYNONYMS, table)
}

pub fn normalize_with(registry: &SynonymRegistry, table: Table) -> NormalizedTable {
    let mut claimed: Vec<CanonicalField> = Vec::new();
    let mut mappings = Vec::with_capacity(table.columns.len());

    for raw in &table.columns {
        let trimmed = raw.trim().to_string();
        let field = match registry.lookup(raw) {
            Some(field) if claimed.contains(&field) => {
                warn!(column = %trimmed, field = %field, "column maps to an already claimed field; passing through");
                None
            }
            Some(field) => {
                claimed.push(field);
                Some(field)
            }
            None => None,
        };

        let mut normalized = match field {
            Some(f) => f.column_name().to_string(),
            None => trimmed,
        };
        // Column names stay unique: a pass-through may collide with a canonical name
        let base = normalized.clone();
        let mut suffix = 2;
        while mappings.iter().any(|m: &ColumnMapping| m.normalized == normalized) {
            normalized = format!("{}_{}", base, suffix);
            suffix += 1;
        }

        mappings.push(ColumnMapping {
            raw: raw.clone(),
            normalized,
            field,
        });
    }

    let missing: Vec<CanonicalField> = CanonicalField::ALL
        .iter()
        .copied()
        .filter(|f| !claimed.contains(f))
        .collect();

    let warning = if missing.is_empty() {
        info!("all canonical columns present");
        None
    } else {
        let unmapped = mappings
            .iter()
            .filter(|m| m.field.is_none())
            .map(|m| m.normalized.clone())
            .collect();
        let incomplete = SchemaIncomplete { missing, unmapped };
        warn!(%incomplete, "schema incomplete");
        Some(incomplete)
    };

    let Table { rows, .. } = table;
    let columns = mappings.iter().map(|m| m.normalized.clone()).collect();

    NormalizedTable {
        table: Table { columns, rows },
        mappings,
        warning,
    }
}

// ============================================================================
// TESTS
// ============================================================================
