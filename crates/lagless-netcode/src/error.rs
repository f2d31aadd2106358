//! Error types for lagless-netcode

use thiserror::Error;

/// Netcode error type
#[derive(Debug, Error)]
pub enum Error {
    /// Local input arrived before a baseline state was set
    #[error("Prediction engine used before initialize()")]
    NotInitialized,

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Inbound message rejected at the transport boundary
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Outbound send failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Core contract error
    #[error(transparent)]
    Core(#[from] lagless_core::Error),

    /// IO error while reading configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RON parse error while reading configuration
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Result type for netcode operations
pub type Result<T> = std::result::Result<T, Error>;
