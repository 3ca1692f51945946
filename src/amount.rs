//! Fixed-point amount normalisation
//!
//! Raw on-chain amounts are integers in the token's smallest unit. The
//! divisor is always an explicit `decimals` value looked up per token,
//! never assumed at the call site.

use crate::error::{Result, StakingError};
use crate::types::ChainKind;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::str::FromStr;

/// Seconds per day, used to turn raw lock durations into days
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Convert a raw integer string (e.g. wei) into human units
pub fn normalize_str(raw: &str, decimals: u32) -> Result<BigDecimal> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(StakingError::InvalidAmount(raw.to_string()));
    }
    BigDecimal::from_str(&format!("{}e-{}", raw, decimals))
        .map_err(|e| StakingError::InvalidAmount(format!("{}: {}", raw, e)))
}

/// Convert a raw `u64` amount (e.g. SPL token lamports) into human units
pub fn normalize_u64(raw: u64, decimals: u32) -> BigDecimal {
    // digits-only input always parses
    normalize_str(&raw.to_string(), decimals).unwrap_or_default()
}

/// Convert an oracle price or point total into a decimal
pub fn decimal_from_f64(value: f64) -> Result<BigDecimal> {
    if !value.is_finite() || value < 0.0 {
        return Err(StakingError::InvalidAmount(value.to_string()));
    }
    BigDecimal::from_str(&value.to_string())
        .map_err(|e| StakingError::InvalidAmount(format!("{}: {}", value, e)))
}

/// Per-token decimals registry
///
/// Tokens without an override use the chain default (18 on EVM, 9 on
/// Solana). Keys are compared case-insensitively so EVM checksum and
/// lowercase addresses resolve to the same entry.
#[derive(Debug, Clone, Default)]
pub struct TokenDecimals {
    overrides: HashMap<String, u32>,
}

impl TokenDecimals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register decimals for a token address or mint
    pub fn with_token(mut self, token: impl AsRef<str>, decimals: u32) -> Self {
        self.overrides
            .insert(token.as_ref().to_ascii_lowercase(), decimals);
        self
    }

    /// Parse `token:decimals` pairs separated by commas
    pub fn parse(pairs: &str) -> Result<Self> {
        let mut registry = Self::new();
        for pair in pairs.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (token, decimals) = pair
                .rsplit_once(':')
                .ok_or_else(|| StakingError::Config(format!("expected token:decimals, got {}", pair)))?;
            let decimals = decimals
                .trim()
                .parse::<u32>()
                .map_err(|e| StakingError::Config(format!("bad decimals for {}: {}", token, e)))?;
            registry = registry.with_token(token.trim(), decimals);
        }
        Ok(registry)
    }

    /// Decimals for a token on the given chain
    pub fn decimals_for(&self, chain: ChainKind, token: &str) -> u32 {
        self.overrides
            .get(&token.to_ascii_lowercase())
            .copied()
            .unwrap_or_else(|| chain.default_decimals())
    }
}
