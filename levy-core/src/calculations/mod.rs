//! Levy and VAT calculations.
//!
//! The cascade itself lives in [`cascade`]; [`fallback`] holds the documented
//! default rate table used when configured rates are unavailable.

pub mod cascade;
pub mod common;
pub mod fallback;

pub use cascade::{
    ConfigurationError, InvalidInputError, LevyCascadeCalculator, LevyCascadeError,
    LevyCascadeResult, LevyLine, compute_levy_cascade, parse_gross_sales, validate_gross_sales,
};
pub use fallback::{
    FallbackRateTable, GHANA_STANDARD_VERSION, RateSource, ResolvedRates, compute_with_fallback,
    resolve_rates, run_with_fallback,
};
