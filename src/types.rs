//! Normalised types handed to the presentation layer

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Chain family a project or stake lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Evm,
    Solana,
}

impl ChainKind {
    /// Stake id handed out when an address has no stakes yet.
    ///
    /// EVM call sites start at 0 and the Solana call site starts at 1.
    /// Both are pinned as-is until product decides on one base.
    pub fn next_stake_id_base(self) -> u64 {
        match self {
            ChainKind::Evm => 0,
            ChainKind::Solana => 1,
        }
    }

    /// Default token decimals for amounts on this chain
    pub fn default_decimals(self) -> u32 {
        match self {
            ChainKind::Evm => 18,
            ChainKind::Solana => 9,
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainKind::Evm => write!(f, "evm"),
            ChainKind::Solana => write!(f, "solana"),
        }
    }
}

/// External links for a project token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectLinks {
    pub website: Option<String>,
    pub x: Option<String>,
    pub twitter: Option<String>,
    pub dex: Option<String>,
}

/// Token metadata returned by the price oracle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub description: Option<String>,
    pub image: Option<String>,
    pub links: ProjectLinks,
}

/// One registered staking pool, enriched for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Chain-scoped id (numeric index on Solana, decoded bytes32 on EVM)
    pub id: String,
    pub project_name: String,
    /// Token contract (EVM) or mint (Solana)
    pub staking_token: String,
    /// Total staked in human units
    pub total_staked: BigDecimal,
    /// Distinct addresses with an active stake
    pub user_count: u64,
    /// Leaderboard points, zero when the leaderboard is unavailable
    pub points: BigDecimal,
    pub coin_price_usd: Option<BigDecimal>,
    /// `total_staked * coin_price_usd`
    pub tvl: Option<BigDecimal>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub links: ProjectLinks,
    /// True until enrichment settles
    pub is_loading: bool,
    /// Enrichment failed; the project is dropped from every later emission
    pub should_remove: bool,
    /// 1-based position in the current emission
    pub rank: u32,
}

impl Project {
    /// Apply successful enrichment results
    pub fn enrich(&mut self, metadata: TokenMetadata, price_usd: BigDecimal) {
        self.tvl = Some(&self.total_staked * &price_usd);
        self.coin_price_usd = Some(price_usd);
        self.description = metadata.description;
        self.image = metadata.image;
        self.links = metadata.links;
        self.is_loading = false;
    }

    /// Mark enrichment as irrecoverably failed
    pub fn mark_removed(&mut self) {
        self.should_remove = true;
        self.is_loading = false;
    }
}

/// Lifecycle state of an on-chain stake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StakeStatus {
    Active,
    Unstaked,
    EmergencyUnstaked,
}

/// Reward points attached to a stake
#[derive(Debug, Clone, PartialEq)]
pub enum StakePoints {
    Earned(BigDecimal),
    /// Emergency unstake forfeits all points
    Forfeited,
}

impl StakePoints {
    /// Sentinel shown for forfeited points
    pub const FORFEITED_SENTINEL: &'static str = "-";

    pub fn earned(&self) -> Option<&BigDecimal> {
        match self {
            StakePoints::Earned(points) => Some(points),
            StakePoints::Forfeited => None,
        }
    }
}

impl fmt::Display for StakePoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakePoints::Earned(points) => write!(f, "{}", points),
            StakePoints::Forfeited => f.write_str(Self::FORFEITED_SENTINEL),
        }
    }
}

impl Serialize for StakePoints {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One stake action for a user, with read-time derived fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeRecord {
    pub project_id: String,
    pub project_name: String,
    /// Unique per user + project
    pub stake_id: u64,
    pub user_id: String,
    pub amount: BigDecimal,
    /// Lock duration in days
    pub duration: u64,
    /// Milliseconds since epoch
    pub staked_at: i64,
    /// Milliseconds since epoch
    pub unlocked_at: i64,
    pub can_unstake: bool,
    pub status: StakeStatus,
    pub points: StakePoints,
}

/// A completed unstake
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnstakeRecord {
    pub project_id: String,
    pub project_name: String,
    pub stake_id: u64,
    pub user_id: String,
    pub amount: BigDecimal,
    /// Copied from the matching stake, the unstake account does not carry it
    pub duration: u64,
    /// Milliseconds since epoch
    pub unstaked_at: i64,
    pub emergency: bool,
}

/// Points held by one project on the leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub project_id: String,
    #[serde(default)]
    pub project_name: Option<String>,
    pub points: f64,
}

/// Stake history row as reported by the points dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStake {
    pub project_id: String,
    #[serde(default)]
    pub project_name: Option<String>,
    pub amount: f64,
    pub duration: u64,
    pub staked_at: i64,
    #[serde(default)]
    pub points: Option<f64>,
}

/// Per-address points summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsDashboard {
    pub address: String,
    pub total_score: f64,
    #[serde(default)]
    pub evm: Vec<DashboardStake>,
    #[serde(default)]
    pub solana: Vec<DashboardStake>,
}

impl PointsDashboard {
    /// Stake history for one chain
    pub fn history(&self, chain: ChainKind) -> &[DashboardStake] {
        match chain {
            ChainKind::Evm => &self.evm,
            ChainKind::Solana => &self.solana,
        }
    }
}
