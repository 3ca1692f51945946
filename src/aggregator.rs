//! Progressive project aggregation
//!
//! ## Flow
//!
//! ```text
//! registry ──┐
//!            ├─► basic set ──► emit (rank by total staked)
//! leaderboard┘        │
//!                     ▼
//!        per-project enrichment (interleaved)
//!          metadata ─► price ─► tvl
//!                     │
//!         each completion ──► throttled emit (rank by tvl)
//!                     │
//!             all settled ──► final emit + return
//! ```
//!
//! A failed enrichment removes only that project. A failed leaderboard
//! fetch zeroes points. A failed registry fetch fails the call.
//!
//! Every call draws a fresh generation number and stamps it on each
//! emission. Consumers that may see emissions from overlapping calls
//! should pass them through an [`EmissionGate`].

use crate::amount::decimal_from_f64;
use crate::config::AggregatorConfig;
use crate::error::{Result, StakingError};
use crate::source::{ChainDataSource, LeaderboardSource, PriceOracle, RawProject};
use crate::types::{Project, ProjectLinks, TokenMetadata};
use bigdecimal::BigDecimal;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One snapshot of the project list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEmission {
    /// Aggregation call this snapshot belongs to
    pub generation: u64,
    /// Valid projects, ranked `1..=len`
    pub projects: Vec<Project>,
    /// Set on the last emission of a call
    pub is_final: bool,
}

/// Drops emissions from superseded aggregation calls
#[derive(Debug, Default)]
pub struct EmissionGate {
    newest: AtomicU64,
}

impl EmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept an emission unless a newer generation has already been seen
    pub fn accept(&self, emission: &ProjectEmission) -> bool {
        let previous = self.newest.fetch_max(emission.generation, Ordering::SeqCst);
        emission.generation >= previous
    }

    /// Newest generation seen so far
    pub fn newest(&self) -> u64 {
        self.newest.load(Ordering::SeqCst)
    }
}

/// Trailing-edge throttle owned by a single aggregation call
#[derive(Debug)]
struct EmissionThrottle {
    window: Duration,
    last_emit: Option<Instant>,
    dirty: bool,
}

impl EmissionThrottle {
    fn new(window: Duration) -> Self {
        Self {
            window,
            last_emit: None,
            dirty: false,
        }
    }

    /// Returns true if an emission may go out now; otherwise remembers
    /// that the latest state still needs emitting.
    fn try_emit(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.window => {
                self.dirty = true;
                false
            }
            _ => {
                self.mark_emitted(now);
                true
            }
        }
    }

    fn mark_emitted(&mut self, now: Instant) {
        self.last_emit = Some(now);
        self.dirty = false;
    }

    /// When the suppressed state should be flushed
    fn trailing_deadline(&self) -> Option<Instant> {
        match (self.dirty, self.last_emit) {
            (true, Some(last)) => Some(last + self.window),
            _ => None,
        }
    }
}

#[derive(Clone, Copy)]
enum RankBy {
    TotalStaked,
    Tvl,
}

/// Snapshot of the non-removed projects, stably sorted and ranked
fn ranked(projects: &[Project], by: RankBy) -> Vec<Project> {
    let mut valid: Vec<Project> = projects.iter().filter(|p| !p.should_remove).cloned().collect();
    match by {
        RankBy::TotalStaked => valid.sort_by(|a, b| b.total_staked.cmp(&a.total_staked)),
        // projects still loading have no tvl and sort last
        RankBy::Tvl => valid.sort_by(|a, b| b.tvl.cmp(&a.tvl)),
    }
    for (index, project) in valid.iter_mut().enumerate() {
        project.rank = index as u32 + 1;
    }
    valid
}

/// Keep the first occurrence of each project id
fn dedup_by_id(registry: Vec<RawProject>) -> Vec<RawProject> {
    let mut seen = HashSet::new();
    registry
        .into_iter()
        .filter(|raw| {
            let first = seen.insert(raw.id.clone());
            if !first {
                debug!(project_id = %raw.id, "Dropping duplicate registry entry");
            }
            first
        })
        .collect()
}

fn basic_project(raw: RawProject, points: &HashMap<String, BigDecimal>) -> Project {
    Project {
        points: points.get(&raw.id).cloned().unwrap_or_default(),
        id: raw.id,
        project_name: raw.project_name,
        staking_token: raw.staking_token,
        total_staked: raw.total_staked,
        user_count: raw.user_count,
        coin_price_usd: None,
        tvl: None,
        description: None,
        image: None,
        links: ProjectLinks::default(),
        is_loading: true,
        should_remove: false,
        rank: 0,
    }
}

type Enrichment = (usize, Result<(TokenMetadata, BigDecimal)>);

/// Builds the ranked, enriched project list for one chain
pub struct ProjectAggregator {
    chain: Arc<dyn ChainDataSource>,
    oracle: Arc<dyn PriceOracle>,
    leaderboard: Arc<dyn LeaderboardSource>,
    config: AggregatorConfig,
    generation: AtomicU64,
}

impl ProjectAggregator {
    pub fn new(
        chain: Arc<dyn ChainDataSource>,
        oracle: Arc<dyn PriceOracle>,
        leaderboard: Arc<dyn LeaderboardSource>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            chain,
            oracle,
            leaderboard,
            config,
            generation: AtomicU64::new(0),
        }
    }

    /// Generation of the most recently started call
    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn leaderboard_points(&self) -> HashMap<String, BigDecimal> {
        match self.leaderboard.points_leaderboard().await {
            Ok(entries) => entries
                .into_iter()
                .map(|entry| {
                    let points = decimal_from_f64(entry.points).unwrap_or_else(|e| {
                        warn!(project_id = %entry.project_id, error = %e, "Unusable leaderboard score, using zero");
                        BigDecimal::default()
                    });
                    (entry.project_id, points)
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "Leaderboard unavailable, points default to zero");
                HashMap::new()
            }
        }
    }

    fn enrichment_future(&self, index: usize, project: &Project) -> BoxFuture<'static, Enrichment> {
        let oracle = Arc::clone(&self.oracle);
        let platform = self.chain.price_platform().to_string();
        let token = project.staking_token.clone();
        Box::pin(async move {
            let outcome = async {
                let metadata = oracle.token_metadata(&platform, &token).await?;
                let price = oracle.token_usd_price(&platform, &token).await?;
                Ok::<_, StakingError>((metadata, price))
            }
            .await;
            (index, outcome)
        })
    }

    /// Run one aggregation call.
    ///
    /// `on_emit` receives the basic set first, then throttled snapshots as
    /// enrichment settles, then the final list, which is also returned.
    pub async fn aggregate<F>(&self, mut on_emit: F) -> Result<ProjectEmission>
    where
        F: FnMut(ProjectEmission) + Send,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let chain = self.chain.chain();

        let (registry, points) = tokio::join!(
            self.chain.list_registered_projects(),
            self.leaderboard_points()
        );
        let registry = registry?;
        info!(%chain, generation, projects = registry.len(), "Aggregating projects");

        let mut projects: Vec<Project> = dedup_by_id(registry)
            .into_iter()
            .map(|raw| basic_project(raw, &points))
            .collect();

        on_emit(ProjectEmission {
            generation,
            projects: ranked(&projects, RankBy::TotalStaked),
            is_final: false,
        });

        let mut pending: FuturesUnordered<BoxFuture<'static, Enrichment>> = projects
            .iter()
            .enumerate()
            .map(|(index, project)| self.enrichment_future(index, project))
            .collect();

        let mut throttle = EmissionThrottle::new(self.config.emission_throttle);
        let mut removed = 0usize;

        loop {
            let deadline = throttle.trailing_deadline();
            tokio::select! {
                next = pending.next() => {
                    let Some((index, outcome)) = next else { break };
                    let project = &mut projects[index];
                    match outcome {
                        Ok((metadata, price)) => {
                            debug!(generation, project_id = %project.id, price = %price, "Project enriched");
                            project.enrich(metadata, price);
                        }
                        Err(e) => {
                            warn!(generation, project_id = %project.id, error = %e, "Enrichment failed, dropping project");
                            project.mark_removed();
                            removed += 1;
                        }
                    }

                    if throttle.try_emit(Instant::now()) {
                        on_emit(ProjectEmission {
                            generation,
                            projects: ranked(&projects, RankBy::Tvl),
                            is_final: false,
                        });
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    throttle.mark_emitted(Instant::now());
                    on_emit(ProjectEmission {
                        generation,
                        projects: ranked(&projects, RankBy::Tvl),
                        is_final: false,
                    });
                }
            }
        }

        let final_emission = ProjectEmission {
            generation,
            projects: ranked(&projects, RankBy::Tvl),
            is_final: true,
        };
        info!(
            %chain,
            generation,
            projects = final_emission.projects.len(),
            removed,
            "Aggregation settled"
        );
        on_emit(final_emission.clone());
        Ok(final_emission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn project(id: &str, total: &str, tvl: Option<&str>) -> Project {
        let mut p = basic_project(
            RawProject {
                id: id.into(),
                project_name: id.to_uppercase(),
                staking_token: format!("token-{}", id),
                total_staked: BigDecimal::from_str(total).unwrap(),
                user_count: 1,
            },
            &HashMap::new(),
        );
        p.tvl = tvl.map(|t| BigDecimal::from_str(t).unwrap());
        p
    }

    fn ids(projects: &[Project]) -> Vec<&str> {
        projects.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_rank_by_total_staked_is_stable() {
        let projects = vec![
            project("a", "10", None),
            project("b", "30", None),
            project("c", "10", None),
        ];
        let ranked = ranked(&projects, RankBy::TotalStaked);
        assert_eq!(ids(&ranked), vec!["b", "a", "c"]);
        assert_eq!(ranked.iter().map(|p| p.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_rank_by_tvl_skips_removed_and_sorts_loading_last() {
        let mut removed = project("r", "99", Some("999"));
        removed.should_remove = true;
        let projects = vec![
            project("loading", "50", None),
            removed,
            project("low", "1", Some("5")),
            project("high", "1", Some("50")),
        ];

        let ranked = ranked(&projects, RankBy::Tvl);
        assert_eq!(ids(&ranked), vec!["high", "low", "loading"]);
        assert_eq!(ranked.iter().map(|p| p.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let raw = |id: &str, total: &str| RawProject {
            id: id.into(),
            project_name: id.to_uppercase(),
            staking_token: format!("token-{}", id),
            total_staked: BigDecimal::from_str(total).unwrap(),
            user_count: 1,
        };

        let unique = dedup_by_id(vec![raw("a", "10"), raw("b", "5"), raw("a", "11")]);
        let kept: Vec<(&str, String)> = unique
            .iter()
            .map(|p| (p.id.as_str(), p.total_staked.to_string()))
            .collect();
        assert_eq!(kept, vec![("a", "10".to_string()), ("b", "5".to_string())]);
    }

    #[test]
    fn test_gate_drops_stale_generations() {
        let gate = EmissionGate::new();
        let emission = |generation| ProjectEmission {
            generation,
            projects: Vec::new(),
            is_final: false,
        };

        assert!(gate.accept(&emission(1)));
        assert!(gate.accept(&emission(2)));
        assert!(!gate.accept(&emission(1)));
        assert!(gate.accept(&emission(2)));
        assert_eq!(gate.newest(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_suppresses_within_window() {
        let mut throttle = EmissionThrottle::new(Duration::from_millis(200));
        let start = Instant::now();

        assert!(throttle.try_emit(start));
        assert!(throttle.trailing_deadline().is_none());

        assert!(!throttle.try_emit(start + Duration::from_millis(50)));
        assert_eq!(
            throttle.trailing_deadline(),
            Some(start + Duration::from_millis(200))
        );

        assert!(throttle.try_emit(start + Duration::from_millis(200)));
        assert!(throttle.trailing_deadline().is_none());
    }
}
