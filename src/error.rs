//! Error types for staking data reconciliation

use thiserror::Error;

/// Staking data error
#[derive(Debug, Error)]
pub enum StakingError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Upstream API returned an error status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid response from an upstream API
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Subgraph answered with a GraphQL `errors` array
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Solana JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Program account bytes do not match the expected layout
    #[error("Account layout error: {0}")]
    AccountLayout(String),

    /// Address could not be parsed for the target chain
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Raw amount could not be normalised
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Stake duration is not part of the configured reward schedule
    #[error("Unsupported stake duration: {0} days")]
    UnsupportedDuration(u64),

    /// Base64 decode error
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for staking operations
pub type Result<T> = std::result::Result<T, StakingError>;
