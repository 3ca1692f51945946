//! Per-user stake ledger
//!
//! Turns raw stake and unstake rows into display records: durations in
//! days, unlock eligibility against a supplied clock, and reward points.
//! Nothing here writes to the chain; next-stake-id values are optimistic
//! and the chain rejects collisions.

use crate::amount::SECONDS_PER_DAY;
use crate::error::Result;
use crate::points::RewardPointsPolicy;
use crate::source::{ChainDataSource, RawStake, RawUnstake};
use crate::types::{ChainKind, StakeRecord, StakeStatus, UnstakeRecord};
use bigdecimal::BigDecimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One address's stakes on one chain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLedger {
    pub chain: ChainKind,
    pub address: String,
    /// Active stakes, highest stake id first
    pub active: Vec<StakeRecord>,
    /// Every stake, most recent first
    pub history: Vec<StakeRecord>,
    /// Completed unstakes, most recent first
    pub unstakes: Vec<UnstakeRecord>,
}

impl UserLedger {
    /// Next stake id for this address, optionally scoped to one project
    pub fn next_stake_id(&self, project_id: Option<&str>) -> u64 {
        next_stake_id(&self.history, project_id, self.chain.next_stake_id_base())
    }

    /// Sum of points that have not been forfeited
    pub fn total_points(&self) -> BigDecimal {
        self.history
            .iter()
            .filter_map(|stake| stake.points.earned())
            .fold(BigDecimal::default(), |acc, points| acc + points)
    }
}

/// `max(stake_id) + 1` over the matching stakes, or `base` when there are none
pub fn next_stake_id(stakes: &[StakeRecord], project_id: Option<&str>, base: u64) -> u64 {
    stakes
        .iter()
        .filter(|stake| project_id.map_or(true, |id| stake.project_id == id))
        .map(|stake| stake.stake_id)
        .max()
        .map_or(base, |max| max + 1)
}

/// Derive a display record from a raw stake
pub fn derive_stake(raw: RawStake, now_ms: i64, policy: &RewardPointsPolicy) -> Result<StakeRecord> {
    let duration = raw.duration_secs / SECONDS_PER_DAY;
    let points = policy.points_for(&raw.amount, duration, raw.status)?;
    Ok(StakeRecord {
        project_id: raw.project_id,
        project_name: raw.project_name,
        stake_id: raw.stake_id,
        user_id: raw.user,
        amount: raw.amount,
        duration,
        staked_at: raw.staked_at,
        unlocked_at: raw.unlocked_at,
        can_unstake: now_ms >= raw.unlocked_at,
        status: raw.status,
        points,
    })
}

fn derive_unstake(raw: RawUnstake, durations: &HashMap<(String, u64), u64>) -> UnstakeRecord {
    let duration = match durations.get(&(raw.project_id.clone(), raw.stake_id)) {
        Some(days) => *days,
        None => {
            warn!(
                project_id = %raw.project_id,
                stake_id = raw.stake_id,
                "Unstake has no matching stake, duration unknown"
            );
            0
        }
    };
    UnstakeRecord {
        project_id: raw.project_id,
        project_name: raw.project_name,
        stake_id: raw.stake_id,
        user_id: raw.user,
        amount: raw.amount,
        duration,
        unstaked_at: raw.unstaked_at,
        emergency: raw.emergency,
    }
}

/// Builds [`UserLedger`]s from a chain data source
pub struct StakeLedgerBuilder {
    source: Arc<dyn ChainDataSource>,
    policy: RewardPointsPolicy,
}

impl StakeLedgerBuilder {
    pub fn new(source: Arc<dyn ChainDataSource>, policy: RewardPointsPolicy) -> Self {
        Self { source, policy }
    }

    /// Build the ledger against the current wall clock
    pub async fn build_now(&self, address: &str) -> Result<UserLedger> {
        self.build(address, chrono::Utc::now().timestamp_millis()).await
    }

    /// Build the ledger as of `now_ms` (milliseconds since epoch)
    pub async fn build(&self, address: &str, now_ms: i64) -> Result<UserLedger> {
        let chain = self.source.chain();
        let raw = self.source.list_user_stakes(address).await?;

        let mut history = raw
            .stakes
            .into_iter()
            .map(|stake| derive_stake(stake, now_ms, &self.policy))
            .collect::<Result<Vec<_>>>()?;
        history.sort_by(|a, b| b.staked_at.cmp(&a.staked_at));

        let durations: HashMap<(String, u64), u64> = history
            .iter()
            .map(|stake| ((stake.project_id.clone(), stake.stake_id), stake.duration))
            .collect();
        let mut unstakes: Vec<UnstakeRecord> = raw
            .unstakes
            .into_iter()
            .map(|unstake| derive_unstake(unstake, &durations))
            .collect();
        unstakes.sort_by(|a, b| b.unstaked_at.cmp(&a.unstaked_at));

        let mut active: Vec<StakeRecord> = history
            .iter()
            .filter(|stake| stake.status == StakeStatus::Active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.stake_id.cmp(&a.stake_id));

        debug!(
            %chain,
            address,
            active = active.len(),
            history = history.len(),
            unstakes = unstakes.len(),
            "Built stake ledger"
        );

        Ok(UserLedger {
            chain,
            address: address.to_string(),
            active,
            history,
            unstakes,
        })
    }

    /// Fetch fresh stakes and compute the next stake id.
    ///
    /// Call right before building a stake transaction; a cached ledger
    /// may be stale if another session staked in the meantime.
    pub async fn next_stake_id_for(&self, address: &str, project_id: Option<&str>) -> Result<u64> {
        let ledger = self.build_now(address).await?;
        Ok(ledger.next_stake_id(project_id))
    }
}
