use serde_json::Value;

use super::calculator::{CalculationError, EmissionCalculator};
use super::catalog;
use crate::types::Category;

const MAX_VALUE: f64 = 1_000_000.0;

/// Activity input after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidActivity {
    pub category: Category,
    pub activity_type: String,
    pub value: f64,
    pub unit: String,
}

/// Parses a JSON number or numeric string.
pub fn parse_value(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Checks a positive quantity no larger than the accepted maximum.
pub fn validate_value(value: Option<&Value>) -> Result<f64, CalculationError> {
    let parsed = parse_value(value)
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| CalculationError::Invalid("Value must be a positive number".to_string()))?;
    if parsed > MAX_VALUE {
        return Err(CalculationError::Invalid("Value is too large".to_string()));
    }
    Ok(parsed)
}

pub fn validate_unit(unit: Option<&str>) -> Result<String, CalculationError> {
    unit.map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CalculationError::Invalid("Unit is required".to_string()))
}

/// Validates a full activity payload.
///
/// The activity type must be in the built-in catalog or have a database
/// factor for the category. A configured remote estimator does not widen
/// the accepted types.
pub fn validate_activity(
    calculator: &EmissionCalculator,
    category: Option<&str>,
    activity_type: Option<&str>,
    value: Option<&Value>,
    unit: Option<&str>,
) -> Result<ValidActivity, CalculationError> {
    let category = category.and_then(Category::parse).ok_or_else(|| {
        CalculationError::Invalid(format!(
            "Invalid category. Must be one of: {}",
            Category::names()
        ))
    })?;

    let activity_type = activity_type.map(str::trim).unwrap_or_default();
    let known = !activity_type.is_empty()
        && (catalog::lookup(category, activity_type).is_some()
            || calculator
                .store()
                .has_emission_factor(category, activity_type)?);
    if !known {
        return Err(CalculationError::Invalid(format!(
            "Invalid activity type for {}. Must be one of: {}",
            category,
            catalog::activity_type_names(category)
        )));
    }

    Ok(ValidActivity {
        category,
        activity_type: activity_type.to_string(),
        value: validate_value(value)?,
        unit: validate_unit(unit)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emissions::remote::{RemoteError, RemoteEstimator, RetryPolicy};
    use crate::store::{SqliteStore, Store};
    use crate::types::NewEmissionFactor;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct AnyEstimator;

    #[async_trait]
    impl RemoteEstimator for AnyEstimator {
        fn source(&self) -> &str {
            "climatiq"
        }

        async fn estimate(
            &self,
            _category: Category,
            _activity_type: &str,
            value: f64,
            _unit: &str,
        ) -> Result<f64, RemoteError> {
            Ok(value)
        }
    }

    fn calculator() -> (TempDir, Arc<SqliteStore>, EmissionCalculator) {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::new(temp.path().join("test.db")).unwrap());
        store.initialize().unwrap();
        let calc = EmissionCalculator::new(store.clone(), "global");
        (temp, store, calc)
    }

    #[test]
    fn test_valid_activity() {
        let (_temp, _store, calc) = calculator();
        let activity = validate_activity(
            &calc,
            Some("transport"),
            Some("bus"),
            Some(&json!("12.5")),
            Some(" miles "),
        )
        .unwrap();
        assert_eq!(activity.category, Category::Transport);
        assert_eq!(activity.value, 12.5);
        assert_eq!(activity.unit, "miles");
    }

    #[test]
    fn test_invalid_category() {
        let (_temp, _store, calc) = calculator();
        let err = validate_activity(&calc, Some("shopping"), Some("bus"), Some(&json!(1)), Some("x"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid category. Must be one of: transport, diet, energy, waste"
        );
    }

    #[test]
    fn test_mismatched_activity_type() {
        let (_temp, _store, calc) = calculator();
        let err = validate_activity(&calc, Some("diet"), Some("bus"), Some(&json!(1)), Some("kg"))
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid activity type for diet"));
    }

    #[test]
    fn test_remote_estimator_does_not_widen_types() {
        let (_temp, _store, calc) = calculator();
        let calc = calc.with_remote(Arc::new(AnyEstimator), RetryPolicy::default());
        let err = validate_activity(&calc, Some("diet"), Some("bus"), Some(&json!(1)), Some("kg"))
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid activity type for diet"));
        assert!(
            validate_activity(&calc, Some("transport"), Some("bus"), Some(&json!(1)), Some("km"))
                .is_ok()
        );
    }

    #[test]
    fn test_db_factor_makes_type_known() {
        let (_temp, store, calc) = calculator();
        store
            .create_emission_factor(&NewEmissionFactor {
                category: Category::Diet,
                activity_type: "tofu".to_string(),
                region: "global".to_string(),
                co2e_per_unit: 2.0,
                unit: "kg".to_string(),
                source: None,
            })
            .unwrap();
        assert!(
            validate_activity(&calc, Some("diet"), Some("tofu"), Some(&json!(1)), Some("kg"))
                .is_ok()
        );
    }

    #[test]
    fn test_value_bounds() {
        assert!(validate_value(Some(&json!(0))).is_err());
        assert!(validate_value(Some(&json!(-3))).is_err());
        assert!(validate_value(Some(&json!("abc"))).is_err());
        assert!(validate_value(None).is_err());
        assert_eq!(
            validate_value(Some(&json!(2_000_000))).unwrap_err().to_string(),
            "Value is too large"
        );
        assert_eq!(validate_value(Some(&json!(1_000_000))).unwrap(), 1_000_000.0);
    }

    #[test]
    fn test_unit_required() {
        assert!(validate_unit(Some("   ")).is_err());
        assert!(validate_unit(None).is_err());
        assert_eq!(validate_unit(Some("kg")).unwrap(), "kg");
    }
}
