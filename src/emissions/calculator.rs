use std::sync::Arc;

use serde::Serialize;

use super::factor::resolve_factor;
use super::remote::{RemoteEstimator, RetryPolicy, estimate_with_retry};
use crate::store::Store;
use crate::types::Category;

/// Result of a CO2e calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calculation {
    /// kg CO2e, rounded to 3 decimals
    pub co2e: f64,
    pub source: String,
    pub unit_used: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CalculationError {
    #[error("{0}")]
    Invalid(String),

    #[error("Emission factor not found for {category}/{activity_type}")]
    FactorNotFound {
        category: Category,
        activity_type: String,
    },

    #[error(transparent)]
    Store(#[from] crate::error::Error),
}

/// Computes activity emissions: local factor first, then the remote
/// estimator (when configured) under its retry policy.
pub struct EmissionCalculator {
    store: Arc<dyn Store>,
    remote: Option<Arc<dyn RemoteEstimator>>,
    retry: RetryPolicy,
    default_region: String,
}

impl EmissionCalculator {
    pub fn new(store: Arc<dyn Store>, default_region: impl Into<String>) -> Self {
        Self {
            store,
            remote: None,
            retry: RetryPolicy::default(),
            default_region: default_region.into(),
        }
    }

    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn RemoteEstimator>, retry: RetryPolicy) -> Self {
        self.remote = Some(remote);
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub async fn calculate(
        &self,
        category: Category,
        activity_type: &str,
        value: f64,
        unit: &str,
        region: Option<&str>,
    ) -> Result<Calculation, CalculationError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(CalculationError::Invalid(
                "Value must be greater than 0".to_string(),
            ));
        }
        if unit.trim().is_empty() || activity_type.trim().is_empty() {
            return Err(CalculationError::Invalid(
                "Missing required parameters for emissions calculation".to_string(),
            ));
        }

        let region = region
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(&self.default_region);

        if let Some(factor) = resolve_factor(self.store.as_ref(), category, activity_type, region)? {
            return Ok(Calculation {
                co2e: round3(value * factor.co2e_per_unit),
                source: factor.source,
                unit_used: factor.unit,
            });
        }

        if let Some(remote) = &self.remote {
            match estimate_with_retry(
                remote.as_ref(),
                self.retry,
                category,
                activity_type,
                value,
                unit,
            )
            .await
            {
                Ok(co2e) => {
                    return Ok(Calculation {
                        co2e: round3(co2e),
                        source: remote.source().to_string(),
                        unit_used: unit.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(%category, activity_type, error = %e, "remote estimate unavailable");
                }
            }
        }

        Err(CalculationError::FactorNotFound {
            category,
            activity_type: activity_type.to_string(),
        })
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emissions::remote::RemoteError;
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct FixedEstimator {
        calls: AtomicU32,
        result: Option<f64>,
    }

    #[async_trait]
    impl RemoteEstimator for FixedEstimator {
        fn source(&self) -> &str {
            "climatiq"
        }

        async fn estimate(
            &self,
            _category: Category,
            _activity_type: &str,
            _value: f64,
            _unit: &str,
        ) -> Result<f64, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.ok_or(RemoteError::Status(500))
        }
    }

    fn calculator() -> (TempDir, EmissionCalculator) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, EmissionCalculator::new(Arc::new(store), "global"))
    }

    fn quick() -> RetryPolicy {
        RetryPolicy {
            retries: 2,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_catalog_calculation_rounds() {
        let (_temp, calc) = calculator();
        let result = calc
            .calculate(Category::Transport, "car_gasoline", 12.5, "miles", None)
            .await
            .unwrap();
        assert_eq!(result.co2e, 5.05);
        assert_eq!(result.source, "default");
        assert_eq!(result.unit_used, "miles");

        let result = calc
            .calculate(Category::Energy, "electricity", 1.234, "kwh", None)
            .await
            .unwrap();
        assert_eq!(result.co2e, 0.475);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_value() {
        let (_temp, calc) = calculator();
        let err = calc
            .calculate(Category::Diet, "beef", 0.0, "kg", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CalculationError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_unknown_type_without_remote_is_not_found() {
        let (_temp, calc) = calculator();
        let err = calc
            .calculate(Category::Diet, "tofu", 1.0, "kg", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Emission factor not found for diet/tofu");
    }

    #[tokio::test]
    async fn test_remote_used_for_unknown_type() {
        let (_temp, calc) = calculator();
        let remote = Arc::new(FixedEstimator {
            calls: AtomicU32::new(0),
            result: Some(3.14159),
        });
        let calc = calc.with_remote(remote.clone(), quick());

        let result = calc
            .calculate(Category::Diet, "tofu", 2.0, "kg", None)
            .await
            .unwrap();
        assert_eq!(result.co2e, 3.142);
        assert_eq!(result.source, "climatiq");
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);

        // Local factors never reach the remote.
        calc.calculate(Category::Diet, "beef", 1.0, "kg", None)
            .await
            .unwrap();
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remote_failure_is_not_found_after_retries() {
        let (_temp, calc) = calculator();
        let remote = Arc::new(FixedEstimator {
            calls: AtomicU32::new(0),
            result: None,
        });
        let calc = calc.with_remote(remote.clone(), quick());

        let err = calc
            .calculate(Category::Waste, "plastic", 1.0, "kg", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CalculationError::FactorNotFound { .. }));
        assert_eq!(remote.calls.load(Ordering::SeqCst), 3);
    }
}
