//! Reward points schedule

use crate::error::{Result, StakingError};
use crate::types::{StakePoints, StakeStatus};
use bigdecimal::BigDecimal;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Maps a lock duration in days to a points multiplier.
///
/// Only durations in the configured schedule are valid. Anything else is
/// a configuration mismatch between this schedule and the chain, and is
/// reported rather than defaulted.
#[derive(Debug, Clone)]
pub struct RewardPointsPolicy {
    schedule: BTreeMap<u64, BigDecimal>,
}

impl Default for RewardPointsPolicy {
    fn default() -> Self {
        let schedule = [(1, "1"), (7, "1.25"), (14, "1.5"), (21, "1.75"), (30, "2")]
            .into_iter()
            .filter_map(|(days, m)| BigDecimal::from_str(m).ok().map(|m| (days, m)))
            .collect();
        Self { schedule }
    }
}

impl RewardPointsPolicy {
    /// Build a policy from explicit `(days, multiplier)` pairs
    pub fn new(schedule: impl IntoIterator<Item = (u64, BigDecimal)>) -> Self {
        Self {
            schedule: schedule.into_iter().collect(),
        }
    }

    /// Durations accepted by this policy, ascending
    pub fn durations(&self) -> impl Iterator<Item = u64> + '_ {
        self.schedule.keys().copied()
    }

    /// Multiplier for a lock duration
    pub fn multiplier(&self, duration_days: u64) -> Result<&BigDecimal> {
        self.schedule
            .get(&duration_days)
            .ok_or(StakingError::UnsupportedDuration(duration_days))
    }

    /// Points earned by a stake. Emergency unstakes forfeit everything.
    pub fn points_for(
        &self,
        amount: &BigDecimal,
        duration_days: u64,
        status: StakeStatus,
    ) -> Result<StakePoints> {
        if status == StakeStatus::EmergencyUnstaked {
            return Ok(StakePoints::Forfeited);
        }
        let multiplier = self.multiplier(duration_days)?;
        Ok(StakePoints::Earned(amount * multiplier))
    }
}
