//! External data sources
//!
//! The reconciliation layer only talks to the outside world through the
//! traits in this module, so tests can swap in in-memory fakes.
//!
//! - [`ChainDataSource`]: project registry and user stakes for one chain
//! - [`PriceOracle`]: token metadata and USD price
//! - [`LeaderboardSource`]: points leaderboard and per-address dashboard

pub mod leaderboard;
pub mod price;
pub mod solana;
pub mod subgraph;

use crate::error::Result;
use crate::types::{ChainKind, LeaderboardEntry, PointsDashboard, StakeStatus, TokenMetadata};
use bigdecimal::BigDecimal;
use reqwest::StatusCode;

pub use leaderboard::LeaderboardClient;
pub use price::PriceClient;
pub use solana::SolanaSource;
pub use subgraph::SubgraphSource;

/// Registered project as read from the chain, amounts already in human units
#[derive(Debug, Clone, PartialEq)]
pub struct RawProject {
    pub id: String,
    pub project_name: String,
    pub staking_token: String,
    pub total_staked: BigDecimal,
    pub user_count: u64,
}

/// Stake as read from the chain, before read-time derivation
#[derive(Debug, Clone, PartialEq)]
pub struct RawStake {
    pub project_id: String,
    pub project_name: String,
    pub stake_id: u64,
    pub user: String,
    pub amount: BigDecimal,
    pub duration_secs: u64,
    /// Milliseconds since epoch
    pub staked_at: i64,
    /// Milliseconds since epoch
    pub unlocked_at: i64,
    pub status: StakeStatus,
}

/// Completed unstake as read from the chain
#[derive(Debug, Clone, PartialEq)]
pub struct RawUnstake {
    pub project_id: String,
    pub project_name: String,
    pub stake_id: u64,
    pub user: String,
    pub amount: BigDecimal,
    /// Milliseconds since epoch
    pub unstaked_at: i64,
    pub emergency: bool,
}

/// Everything one address has done on one chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawUserStakes {
    pub stakes: Vec<RawStake>,
    pub unstakes: Vec<RawUnstake>,
}

/// Project registry and stake data for one chain family
#[async_trait::async_trait]
pub trait ChainDataSource: Send + Sync {
    /// Chain family served by this source
    fn chain(&self) -> ChainKind;

    /// Platform id used by the price oracle for this chain's tokens
    fn price_platform(&self) -> &str;

    /// All registered projects. Ids may repeat if the backing store pages inconsistently.
    async fn list_registered_projects(&self) -> Result<Vec<RawProject>>;

    /// All stakes and unstakes for an address
    async fn list_user_stakes(&self, address: &str) -> Result<RawUserStakes>;

    /// A single project by id, `None` if it is not registered
    async fn get_project(&self, id: &str) -> Result<Option<RawProject>>;
}

/// Token metadata and price lookups
#[async_trait::async_trait]
pub trait PriceOracle: Send + Sync {
    /// Description, image and links for a token contract
    async fn token_metadata(&self, platform: &str, contract: &str) -> Result<TokenMetadata>;

    /// USD price for a token contract
    async fn token_usd_price(&self, platform: &str, contract: &str) -> Result<BigDecimal>;
}

/// Points leaderboard
#[async_trait::async_trait]
pub trait LeaderboardSource: Send + Sync {
    /// Points per project
    async fn points_leaderboard(&self) -> Result<Vec<LeaderboardEntry>>;

    /// Total score and per-chain stake history for an address
    async fn points_for_address(&self, address: &str) -> Result<PointsDashboard>;
}

/// Shared response handling for the HTTP-backed sources
pub(crate) async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(crate::error::StakingError::NotFound(
            response.url().path().to_string(),
        ));
    }

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(crate::error::StakingError::Server {
            status,
            message: body,
        });
    }

    let body = response.json().await?;
    Ok(body)
}

/// Build a reqwest client with an optional default auth header
pub(crate) fn build_http_client(
    timeout_secs: u64,
    auth: Option<(reqwest::header::HeaderName, String)>,
) -> Result<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    if let Some((name, value)) = auth {
        let value = reqwest::header::HeaderValue::from_str(&value)
            .map_err(|e| crate::error::StakingError::Config(format!("invalid {} header: {}", name, e)))?;
        headers.insert(name, value);
    }

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}
