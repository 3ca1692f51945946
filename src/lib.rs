//! Multi-chain staking data reconciliation
//!
//! Reads staking projects and user stakes from an EVM subgraph or a
//! Solana staking program, enriches projects with oracle prices and
//! leaderboard points, and derives per-user stake ledgers.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stake_ledger::{
//!     Args, LeaderboardClient, PriceClient, ProjectAggregator, RewardPointsPolicy,
//!     StakeLedgerBuilder, SubgraphSource,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::from_env()?;
//! stake_ledger::telemetry::init_tracing(&args.log_level);
//!
//! let chain = Arc::new(SubgraphSource::new(args.subgraph_config()?)?);
//! let aggregator = ProjectAggregator::new(
//!     chain.clone(),
//!     Arc::new(PriceClient::new(args.price_config())?),
//!     Arc::new(LeaderboardClient::new(args.leaderboard_config())?),
//!     args.aggregator_config(),
//! );
//!
//! // Progressive snapshots while prices resolve
//! let settled = aggregator
//!     .aggregate(|emission| println!("{} projects", emission.projects.len()))
//!     .await?;
//! println!("top project: {:?}", settled.projects.first().map(|p| &p.project_name));
//!
//! let ledger = StakeLedgerBuilder::new(chain, RewardPointsPolicy::default())
//!     .build_now("0xabc...")
//!     .await?;
//! println!("next stake id: {}", ledger.next_stake_id(None));
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod amount;
pub mod config;
pub mod error;
pub mod ledger;
pub mod points;
pub mod source;
pub mod telemetry;
pub mod types;

// Re-export main types
pub use aggregator::{EmissionGate, ProjectAggregator, ProjectEmission};
pub use amount::TokenDecimals;
pub use config::Args;
pub use error::{Result, StakingError};
pub use ledger::{next_stake_id, StakeLedgerBuilder, UserLedger};
pub use points::RewardPointsPolicy;
pub use source::solana::pda::ProgramAddresses;
pub use source::{
    ChainDataSource, LeaderboardClient, LeaderboardSource, PriceClient, PriceOracle,
    SolanaSource, SubgraphSource,
};
pub use types::*;
