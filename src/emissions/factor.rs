use super::catalog::{self, CatalogEntry};
use crate::error::Result;
use crate::store::Store;
use crate::types::{Category, EmissionFactor};

/// Factor chosen for a calculation, with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFactor {
    pub co2e_per_unit: f64,
    pub unit: String,
    pub source: String,
}

/// Looks up the factor for `(category, activity_type)` in `region`.
///
/// A positive database row wins, then a positive catalog entry. A zero
/// database row is still used when nothing positive exists, so admins can
/// record intentional zeros.
pub fn resolve_factor(
    store: &dyn Store,
    category: Category,
    activity_type: &str,
    region: &str,
) -> Result<Option<ResolvedFactor>> {
    let rows = store.find_emission_factors(category, activity_type, region)?;
    Ok(choose(
        rows.first(),
        catalog::lookup(category, activity_type),
    ))
}

fn choose(db: Option<&EmissionFactor>, schema: Option<&CatalogEntry>) -> Option<ResolvedFactor> {
    let from_db = |row: &EmissionFactor| ResolvedFactor {
        co2e_per_unit: row.co2e_per_unit.max(0.0),
        unit: if row.unit.is_empty() {
            schema.map(|s| s.unit.to_string()).unwrap_or_default()
        } else {
            row.unit.clone()
        },
        source: row
            .source
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "database".to_string()),
    };
    let from_catalog = |entry: &CatalogEntry| ResolvedFactor {
        co2e_per_unit: entry.factor,
        unit: entry.unit.to_string(),
        source: "default".to_string(),
    };

    match (db, schema) {
        (Some(row), _) if row.co2e_per_unit > 0.0 => Some(from_db(row)),
        (Some(_), Some(entry)) if entry.factor > 0.0 => Some(from_catalog(entry)),
        (Some(row), _) => Some(from_db(row)),
        (None, Some(entry)) => Some(from_catalog(entry)),
        (None, None) => None,
    }
}
