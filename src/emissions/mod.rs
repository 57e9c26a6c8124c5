//! CO2e calculation: built-in catalog, database factors, and remote estimation.

pub mod catalog;
mod calculator;
mod factor;
mod remote;
mod validate;

pub use calculator::{Calculation, CalculationError, EmissionCalculator};
pub use factor::{ResolvedFactor, resolve_factor};
pub use remote::{ClimatiqEstimator, RemoteError, RemoteEstimator, RetryPolicy, estimate_with_retry};
pub use validate::{ValidActivity, parse_value, validate_activity, validate_unit, validate_value};
