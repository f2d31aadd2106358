//! Error types for lagless-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Non-finite value in {field}: {value}")]
    NonFinite { field: &'static str, value: f64 },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Reject NaN and infinities before they reach the simulation.
pub fn ensure_finite(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::NonFinite { field, value })
    }
}
