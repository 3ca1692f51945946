//! Configuration for the staking data sources
//!
//! Environment variable handling uses clap so a host binary can flatten
//! [`Args`] into its own CLI, or call [`Args::from_env`] directly.

use crate::amount::TokenDecimals;
use crate::error::{Result, StakingError};
use clap::Parser;
use std::time::Duration;

/// Staking data reconciliation settings
#[derive(Parser, Debug, Clone)]
#[command(name = "stake-ledger")]
#[command(about = "Multi-chain staking data reconciliation")]
pub struct Args {
    /// EVM subgraph GraphQL endpoint
    #[arg(long, env = "SUBGRAPH_URL", default_value = "http://localhost:8000/subgraphs/name/staking")]
    pub subgraph_url: String,

    /// Bearer token for the subgraph
    #[arg(long, env = "SUBGRAPH_API_KEY")]
    pub subgraph_api_key: Option<String>,

    /// Page size for subgraph list queries
    #[arg(long, env = "SUBGRAPH_PAGE_SIZE", default_value = "1000")]
    pub subgraph_page_size: u32,

    /// Price oracle platform id for EVM tokens
    #[arg(long, env = "EVM_PRICE_PLATFORM", default_value = "ethereum")]
    pub evm_price_platform: String,

    /// Solana JSON-RPC endpoint
    #[arg(long, env = "SOLANA_RPC_URL", default_value = "https://api.devnet.solana.com")]
    pub solana_rpc_url: String,

    /// Staking program id (base58)
    #[arg(long, env = "STAKING_PROGRAM_ID")]
    pub staking_program_id: Option<String>,

    /// Price oracle platform id for Solana mints
    #[arg(long, env = "SOLANA_PRICE_PLATFORM", default_value = "solana")]
    pub solana_price_platform: String,

    /// Price/metadata oracle base URL
    #[arg(long, env = "PRICE_API_URL", default_value = "https://api.coingecko.com/api/v3")]
    pub price_api_url: String,

    /// Price oracle API key
    #[arg(long, env = "PRICE_API_KEY")]
    pub price_api_key: Option<String>,

    /// Header carrying the price oracle API key
    #[arg(long, env = "PRICE_API_KEY_HEADER", default_value = "x-cg-demo-api-key")]
    pub price_api_key_header: String,

    /// Points leaderboard base URL
    #[arg(long, env = "LEADERBOARD_URL", default_value = "http://localhost:3000/api")]
    pub leaderboard_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Minimum spacing between progressive project emissions
    #[arg(long, env = "EMISSION_THROTTLE_MS", default_value = "200")]
    pub emission_throttle_ms: u64,

    /// Confirmation polls before a transaction is reported unconfirmed
    #[arg(long, env = "CONFIRM_MAX_ATTEMPTS", default_value = "30")]
    pub confirm_max_attempts: u32,

    /// Interval between confirmation polls
    #[arg(long, env = "CONFIRM_INTERVAL_MS", default_value = "2000")]
    pub confirm_interval_ms: u64,

    /// Attempts for the pre-submission account existence check
    #[arg(long, env = "EXISTENCE_MAX_ATTEMPTS", default_value = "5")]
    pub existence_max_attempts: u32,

    /// Base delay for the existence check, grows linearly per attempt
    #[arg(long, env = "EXISTENCE_BASE_DELAY_MS", default_value = "500")]
    pub existence_base_delay_ms: u64,

    /// Per-token decimals overrides, `token:decimals` separated by commas
    #[arg(long, env = "TOKEN_DECIMALS", default_value = "")]
    pub token_decimals: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Load settings from the environment, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::try_parse_from([env!("CARGO_PKG_NAME")])
            .map_err(|e| StakingError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.request_timeout_secs == 0 {
            return Err("REQUEST_TIMEOUT_SECS must be greater than zero".to_string());
        }
        if self.subgraph_page_size == 0 {
            return Err("SUBGRAPH_PAGE_SIZE must be greater than zero".to_string());
        }
        if self.confirm_max_attempts == 0 {
            return Err("CONFIRM_MAX_ATTEMPTS must be greater than zero".to_string());
        }
        TokenDecimals::parse(&self.token_decimals).map_err(|e| e.to_string())?;
        Ok(())
    }

    fn decimals(&self) -> Result<TokenDecimals> {
        TokenDecimals::parse(&self.token_decimals)
    }

    pub fn subgraph_config(&self) -> Result<SubgraphConfig> {
        Ok(SubgraphConfig {
            url: self.subgraph_url.clone(),
            api_key: self.subgraph_api_key.clone(),
            page_size: self.subgraph_page_size,
            price_platform: self.evm_price_platform.clone(),
            timeout_secs: self.request_timeout_secs,
            token_decimals: self.decimals()?,
        })
    }

    pub fn solana_config(&self) -> Result<SolanaConfig> {
        let program_id = self
            .staking_program_id
            .clone()
            .ok_or_else(|| StakingError::Config("STAKING_PROGRAM_ID is required for Solana".to_string()))?;
        Ok(SolanaConfig {
            rpc_url: self.solana_rpc_url.clone(),
            program_id,
            price_platform: self.solana_price_platform.clone(),
            timeout_secs: self.request_timeout_secs,
            token_decimals: self.decimals()?,
            confirm_max_attempts: self.confirm_max_attempts,
            confirm_interval: Duration::from_millis(self.confirm_interval_ms),
            existence_max_attempts: self.existence_max_attempts,
            existence_base_delay: Duration::from_millis(self.existence_base_delay_ms),
        })
    }

    pub fn price_config(&self) -> PriceConfig {
        PriceConfig {
            base_url: self.price_api_url.clone(),
            api_key: self.price_api_key.clone(),
            api_key_header: self.price_api_key_header.clone(),
            timeout_secs: self.request_timeout_secs,
        }
    }

    pub fn leaderboard_config(&self) -> LeaderboardConfig {
        LeaderboardConfig {
            base_url: self.leaderboard_url.clone(),
            timeout_secs: self.request_timeout_secs,
        }
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            emission_throttle: Duration::from_millis(self.emission_throttle_ms),
        }
    }
}

/// EVM subgraph client configuration
#[derive(Debug, Clone)]
pub struct SubgraphConfig {
    /// GraphQL endpoint
    pub url: String,
    /// Optional bearer token
    pub api_key: Option<String>,
    /// `first` argument for list queries
    pub page_size: u32,
    /// Price oracle platform id
    pub price_platform: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    pub token_decimals: TokenDecimals,
}

impl Default for SubgraphConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/subgraphs/name/staking".to_string(),
            api_key: None,
            page_size: 1000,
            price_platform: "ethereum".to_string(),
            timeout_secs: 30,
            token_decimals: TokenDecimals::default(),
        }
    }
}

/// Solana RPC client configuration
#[derive(Debug, Clone)]
pub struct SolanaConfig {
    pub rpc_url: String,
    /// Staking program id (base58)
    pub program_id: String,
    pub price_platform: String,
    pub timeout_secs: u64,
    pub token_decimals: TokenDecimals,
    pub confirm_max_attempts: u32,
    pub confirm_interval: Duration,
    pub existence_max_attempts: u32,
    pub existence_base_delay: Duration,
}

impl Default for SolanaConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.devnet.solana.com".to_string(),
            program_id: String::new(),
            price_platform: "solana".to_string(),
            timeout_secs: 30,
            token_decimals: TokenDecimals::default(),
            confirm_max_attempts: 30,
            confirm_interval: Duration::from_secs(2),
            existence_max_attempts: 5,
            existence_base_delay: Duration::from_millis(500),
        }
    }
}

/// Price/metadata oracle configuration
#[derive(Debug, Clone)]
pub struct PriceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub timeout_secs: u64,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            api_key: None,
            api_key_header: "x-cg-demo-api-key".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Points leaderboard configuration
#[derive(Debug, Clone)]
pub struct LeaderboardConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Project aggregation settings
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Trailing-edge window between progressive emissions
    pub emission_throttle: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            emission_throttle: Duration::from_millis(200),
        }
    }
}
