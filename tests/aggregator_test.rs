//! Progressive project aggregation integration tests

use bigdecimal::BigDecimal;
use stake_ledger::config::AggregatorConfig;
use stake_ledger::source::{
    ChainDataSource, LeaderboardSource, PriceOracle, RawProject, RawUserStakes,
};
use stake_ledger::{
    ChainKind, EmissionGate, LeaderboardEntry, PointsDashboard, ProjectAggregator,
    ProjectEmission, Result, StakingError, TokenMetadata,
};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

struct MockChain {
    projects: Vec<RawProject>,
    fail_registry: bool,
}

impl MockChain {
    fn with(projects: &[(&str, &str)]) -> Self {
        Self {
            projects: projects
                .iter()
                .map(|(id, total)| RawProject {
                    id: id.to_string(),
                    project_name: id.to_uppercase(),
                    staking_token: format!("token-{}", id),
                    total_staked: dec(total),
                    user_count: 1,
                })
                .collect(),
            fail_registry: false,
        }
    }
}

#[async_trait::async_trait]
impl ChainDataSource for MockChain {
    fn chain(&self) -> ChainKind {
        ChainKind::Evm
    }

    fn price_platform(&self) -> &str {
        "ethereum"
    }

    async fn list_registered_projects(&self) -> Result<Vec<RawProject>> {
        if self.fail_registry {
            return Err(StakingError::Server {
                status: 503,
                message: "indexer down".into(),
            });
        }
        Ok(self.projects.clone())
    }

    async fn list_user_stakes(&self, _address: &str) -> Result<RawUserStakes> {
        Ok(RawUserStakes::default())
    }

    async fn get_project(&self, id: &str) -> Result<Option<RawProject>> {
        Ok(self.projects.iter().find(|p| p.id == id).cloned())
    }
}

/// Per-token price and latency; `None` price fails the lookup
struct MockOracle {
    quotes: HashMap<String, (u64, Option<&'static str>)>,
}

impl MockOracle {
    fn new(quotes: &[(&str, u64, Option<&'static str>)]) -> Self {
        Self {
            quotes: quotes
                .iter()
                .map(|(id, delay, price)| (format!("token-{}", id), (*delay, *price)))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl PriceOracle for MockOracle {
    async fn token_metadata(&self, _platform: &str, _contract: &str) -> Result<TokenMetadata> {
        Ok(TokenMetadata::default())
    }

    async fn token_usd_price(&self, _platform: &str, contract: &str) -> Result<BigDecimal> {
        let (delay, price) = self
            .quotes
            .get(contract)
            .copied()
            .ok_or_else(|| StakingError::NotFound(contract.to_string()))?;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        price
            .map(dec)
            .ok_or_else(|| StakingError::NotFound(format!("price for {}", contract)))
    }
}

struct MockLeaderboard {
    entries: Option<Vec<LeaderboardEntry>>,
}

#[async_trait::async_trait]
impl LeaderboardSource for MockLeaderboard {
    async fn points_leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        self.entries.clone().ok_or_else(|| StakingError::Server {
            status: 500,
            message: "leaderboard down".into(),
        })
    }

    async fn points_for_address(&self, address: &str) -> Result<PointsDashboard> {
        Err(StakingError::NotFound(address.to_string()))
    }
}

fn aggregator(
    chain: MockChain,
    oracle: MockOracle,
    leaderboard: MockLeaderboard,
    throttle: Duration,
) -> ProjectAggregator {
    ProjectAggregator::new(
        Arc::new(chain),
        Arc::new(oracle),
        Arc::new(leaderboard),
        AggregatorConfig {
            emission_throttle: throttle,
        },
    )
}

fn no_leaderboard() -> MockLeaderboard {
    MockLeaderboard { entries: Some(Vec::new()) }
}

fn ids(emission: &ProjectEmission) -> Vec<&str> {
    emission.projects.iter().map(|p| p.id.as_str()).collect()
}

fn assert_contiguous_ranks(emission: &ProjectEmission) {
    let ranks: Vec<u32> = emission.projects.iter().map(|p| p.rank).collect();
    let expected: Vec<u32> = (1..=emission.projects.len() as u32).collect();
    assert_eq!(ranks, expected, "ranks in {:?}", ids(emission));
}

#[tokio::test(start_paused = true)]
async fn test_progressive_emissions_drop_failed_project() {
    let aggregator = aggregator(
        MockChain::with(&[("a", "100"), ("b", "300"), ("c", "200")]),
        MockOracle::new(&[("a", 10, Some("2")), ("b", 20, None), ("c", 30, Some("3"))]),
        no_leaderboard(),
        Duration::ZERO,
    );

    let mut emissions = Vec::new();
    let settled = aggregator
        .aggregate(|emission| emissions.push(emission))
        .await
        .unwrap();

    // basic set ranked by total staked, everything still loading
    let first = &emissions[0];
    assert_eq!(ids(first), vec!["b", "c", "a"]);
    assert!(first.projects.iter().all(|p| p.is_loading));

    // B is gone from every emission after its failure
    let failed_at = emissions
        .iter()
        .position(|e| !e.projects.iter().any(|p| p.id == "b"))
        .unwrap();
    assert!(emissions[failed_at..]
        .iter()
        .all(|e| !e.projects.iter().any(|p| p.id == "b")));

    for emission in &emissions {
        assert_contiguous_ranks(emission);
        assert_eq!(emission.generation, 1);
        assert!(emission.projects.iter().all(|p| !p.should_remove));
    }

    // final list ranked by tvl: C = 200 * 3, A = 100 * 2
    assert_eq!(ids(&settled), vec!["c", "a"]);
    assert!(settled.is_final);
    assert_eq!(settled.projects[0].tvl, Some(dec("600")));
    assert_eq!(settled.projects[1].tvl, Some(dec("200")));
    assert!(settled.projects.iter().all(|p| !p.is_loading));

    assert_eq!(emissions.last(), Some(&settled));
    assert_eq!(emissions.iter().filter(|e| e.is_final).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_leaderboard_points_attached() {
    let leaderboard = MockLeaderboard {
        entries: Some(vec![LeaderboardEntry {
            project_id: "a".into(),
            project_name: Some("A".into()),
            points: 42.5,
        }]),
    };
    let aggregator = aggregator(
        MockChain::with(&[("a", "1"), ("b", "1")]),
        MockOracle::new(&[("a", 1, Some("1")), ("b", 1, Some("1"))]),
        leaderboard,
        Duration::ZERO,
    );

    let settled = aggregator.aggregate(|_| {}).await.unwrap();
    let points: HashMap<&str, BigDecimal> = settled
        .projects
        .iter()
        .map(|p| (p.id.as_str(), p.points.clone()))
        .collect();
    assert_eq!(points["a"], dec("42.5"));
    assert_eq!(points["b"], BigDecimal::default());
}

#[tokio::test(start_paused = true)]
async fn test_leaderboard_failure_zeroes_points() {
    let aggregator = aggregator(
        MockChain::with(&[("a", "10")]),
        MockOracle::new(&[("a", 1, Some("1"))]),
        MockLeaderboard { entries: None },
        Duration::ZERO,
    );

    let settled = aggregator.aggregate(|_| {}).await.unwrap();
    assert_eq!(settled.projects.len(), 1);
    assert_eq!(settled.projects[0].points, BigDecimal::default());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_registry_ids_collapse() {
    let aggregator = aggregator(
        MockChain::with(&[("a", "10"), ("b", "5"), ("a", "11")]),
        MockOracle::new(&[("a", 1, Some("1")), ("b", 2, Some("1"))]),
        no_leaderboard(),
        Duration::ZERO,
    );

    let mut emissions = Vec::new();
    let settled = aggregator.aggregate(|e| emissions.push(e)).await.unwrap();

    for emission in &emissions {
        assert_eq!(ids(emission).iter().filter(|id| **id == "a").count(), 1);
        assert_contiguous_ranks(emission);
    }
    assert_eq!(ids(&settled), vec!["a", "b"]);
    // first registry occurrence wins
    assert_eq!(settled.projects[0].total_staked, dec("10"));
}

#[tokio::test(start_paused = true)]
async fn test_unusable_leaderboard_scores_become_zero() {
    let entry = |id: &str, points: f64| LeaderboardEntry {
        project_id: id.into(),
        project_name: None,
        points,
    };
    let aggregator = aggregator(
        MockChain::with(&[("a", "2"), ("b", "1"), ("c", "3")]),
        MockOracle::new(&[("a", 1, Some("1")), ("b", 1, Some("1")), ("c", 1, Some("1"))]),
        MockLeaderboard {
            entries: Some(vec![entry("a", f64::NAN), entry("b", -3.0), entry("c", 7.0)]),
        },
        Duration::ZERO,
    );

    let settled = aggregator.aggregate(|_| {}).await.unwrap();
    let points: HashMap<&str, BigDecimal> = settled
        .projects
        .iter()
        .map(|p| (p.id.as_str(), p.points.clone()))
        .collect();
    assert_eq!(points["a"], BigDecimal::default());
    assert_eq!(points["b"], BigDecimal::default());
    assert_eq!(points["c"], dec("7"));
}

#[tokio::test]
async fn test_registry_failure_is_fatal() {
    let mut chain = MockChain::with(&[("a", "10")]);
    chain.fail_registry = true;
    let aggregator = aggregator(
        chain,
        MockOracle::new(&[("a", 1, Some("1"))]),
        no_leaderboard(),
        Duration::ZERO,
    );

    let mut emitted = 0;
    let result = aggregator.aggregate(|_| emitted += 1).await;
    assert!(matches!(result, Err(StakingError::Server { status: 503, .. })));
    assert_eq!(emitted, 0);
}

#[tokio::test]
async fn test_empty_registry_emits_empty_final() {
    let aggregator = aggregator(
        MockChain::with(&[]),
        MockOracle::new(&[]),
        no_leaderboard(),
        Duration::ZERO,
    );

    let mut emissions = Vec::new();
    let settled = aggregator.aggregate(|e| emissions.push(e)).await.unwrap();
    assert!(settled.projects.is_empty());
    assert!(settled.is_final);
    assert_eq!(emissions.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_calls_gate_stale_generation() {
    let aggregator = aggregator(
        MockChain::with(&[("a", "10"), ("b", "20")]),
        MockOracle::new(&[("a", 50, Some("1")), ("b", 100, Some("2"))]),
        no_leaderboard(),
        Duration::ZERO,
    );
    let gate = EmissionGate::new();
    let accepted: Mutex<Vec<ProjectEmission>> = Mutex::new(Vec::new());

    let deliver = |emission: ProjectEmission| {
        if gate.accept(&emission) {
            accepted.lock().unwrap().push(emission);
        }
    };

    let (first, second) = tokio::join!(aggregator.aggregate(deliver), aggregator.aggregate(deliver));
    assert_eq!(first.unwrap().generation, 1);
    assert_eq!(second.unwrap().generation, 2);
    assert_eq!(aggregator.latest_generation(), 2);

    let accepted = accepted.into_inner().unwrap();
    let generations: Vec<u64> = accepted.iter().map(|e| e.generation).collect();
    assert!(generations.windows(2).all(|w| w[0] <= w[1]), "{:?}", generations);

    let last = accepted.last().unwrap();
    assert_eq!(last.generation, 2);
    assert!(last.is_final);
    assert_eq!(gate.newest(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_throttle_coalesces_and_flushes_trailing_state() {
    let aggregator = aggregator(
        MockChain::with(&[("a", "1"), ("b", "1"), ("c", "1"), ("d", "1")]),
        MockOracle::new(&[
            ("a", 10, Some("4")),
            ("b", 20, Some("3")),
            ("c", 30, Some("2")),
            ("d", 500, Some("1")),
        ]),
        no_leaderboard(),
        Duration::from_millis(200),
    );

    let started = tokio::time::Instant::now();
    let mut emissions = Vec::new();
    aggregator
        .aggregate(|e| emissions.push((started.elapsed(), e)))
        .await
        .unwrap();

    // basic, first completion, trailing flush of b and c, d, final
    assert_eq!(emissions.len(), 5, "{:?}", emissions.iter().map(|(t, _)| *t).collect::<Vec<_>>());

    let (flushed_at, flushed) = &emissions[2];
    assert!(*flushed_at >= Duration::from_millis(200) && *flushed_at < Duration::from_millis(500));
    assert_eq!(ids(flushed), vec!["a", "b", "c", "d"]);
    assert_eq!(flushed.projects.iter().filter(|p| p.is_loading).count(), 1);

    let (_, settled) = emissions.last().unwrap();
    assert!(settled.is_final);
    assert!(settled.projects.iter().all(|p| !p.is_loading));
}
