//! EVM staking data from the indexing subgraph
//!
//! Projects and stakes are read through GraphQL. Big integers arrive as
//! decimal strings in the token's smallest unit; project ids are
//! right-padded `bytes32` names.
//!
//! List queries page on the immutable entity `id` with an `id_gt` cursor.
//! Ordering pages by a mutable field such as `totalStaked` lets rows shift
//! between requests, so any display ordering is applied locally.

use super::{ChainDataSource, RawProject, RawStake, RawUnstake, RawUserStakes};
use crate::amount::{normalize_str, TokenDecimals};
use crate::config::SubgraphConfig;
use crate::error::{Result, StakingError};
use crate::types::{ChainKind, StakeStatus};
use reqwest::header;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use tracing::debug;

const PROJECTS_QUERY: &str = r#"
query Projects($first: Int!, $after: ID!) {
  projects(first: $first, where: { id_gt: $after }, orderBy: id, orderDirection: asc) {
    id
    projectName
    stakingToken
    totalStaked
    userCount
    registered
  }
}"#;

const PROJECT_QUERY: &str = r#"
query Project($id: ID!) {
  project(id: $id) {
    id
    projectName
    stakingToken
    totalStaked
    userCount
    registered
  }
}"#;

const STAKES_QUERY: &str = r#"
query UserStakes($user: Bytes!, $first: Int!, $after: ID!) {
  stakes(first: $first, where: { user: $user, id_gt: $after }, orderBy: id, orderDirection: asc) {
    id
    stakeId
    user
    amount
    duration
    stakedAt
    unlockTime
    status
    project { id projectName stakingToken }
  }
}"#;

const UNSTAKES_QUERY: &str = r#"
query UserUnstakes($user: Bytes!, $first: Int!, $after: ID!) {
  unstakes(first: $first, where: { user: $user, id_gt: $after }, orderBy: id, orderDirection: asc) {
    id
    stakeId
    user
    amount
    unstakedAt
    emergency
    project { id projectName stakingToken }
  }
}"#;

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectRow {
    id: String,
    project_name: String,
    staking_token: String,
    total_staked: String,
    user_count: String,
    registered: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectRef {
    id: String,
    project_name: String,
    staking_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StakeRow {
    id: String,
    stake_id: String,
    user: String,
    amount: String,
    duration: String,
    staked_at: String,
    unlock_time: String,
    status: String,
    project: ProjectRef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnstakeRow {
    id: String,
    stake_id: String,
    user: String,
    amount: String,
    unstaked_at: String,
    emergency: bool,
    project: ProjectRef,
}

/// Row of an id-paged list query
trait PageRow {
    fn cursor(&self) -> &str;
}

impl PageRow for ProjectRow {
    fn cursor(&self) -> &str {
        &self.id
    }
}

impl PageRow for StakeRow {
    fn cursor(&self) -> &str {
        &self.id
    }
}

impl PageRow for UnstakeRow {
    fn cursor(&self) -> &str {
        &self.id
    }
}

#[derive(Deserialize)]
struct ProjectsData {
    projects: Vec<ProjectRow>,
}

#[derive(Deserialize)]
struct ProjectData {
    project: Option<ProjectRow>,
}

#[derive(Deserialize)]
struct StakesData {
    stakes: Vec<StakeRow>,
}

#[derive(Deserialize)]
struct UnstakesData {
    unstakes: Vec<UnstakeRow>,
}

/// Decode a right-padded `bytes32` project id into its name.
///
/// Ids that are not valid hex or not UTF-8 are returned unchanged.
pub fn decode_bytes32(id: &str) -> String {
    let stripped = id.strip_prefix("0x").unwrap_or(id);
    match hex::decode(stripped) {
        Ok(bytes) => {
            let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
            match String::from_utf8(bytes[..end].to_vec()) {
                Ok(name) => name,
                Err(_) => id.to_string(),
            }
        }
        Err(_) => id.to_string(),
    }
}

/// Encode a project name as a right-padded `bytes32` hex id
pub fn encode_bytes32(name: &str) -> Result<String> {
    let bytes = name.as_bytes();
    if bytes.len() > 32 {
        return Err(StakingError::InvalidAddress(format!(
            "project id longer than 32 bytes: {}",
            name
        )));
    }
    let mut padded = [0u8; 32];
    padded[..bytes.len()].copy_from_slice(bytes);
    Ok(format!("0x{}", hex::encode(padded)))
}

fn parse_u64(field: &str, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|e| StakingError::InvalidAmount(format!("{} = {}: {}", field, value, e)))
}

/// Subgraph unix seconds to milliseconds
fn unix_millis(field: &str, value: &str) -> Result<i64> {
    let secs = parse_u64(field, value)?;
    i64::try_from(secs)
        .ok()
        .and_then(|secs| secs.checked_mul(1000))
        .ok_or_else(|| StakingError::InvalidAmount(format!("{} out of range: {}", field, value)))
}

/// Fetch pages until a short one comes back.
///
/// `fetch` receives the `id_gt` cursor, empty for the first page.
async fn collect_pages<T, F, Fut>(page_size: u32, mut fetch: F) -> Result<Vec<T>>
where
    T: PageRow,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    if page_size == 0 {
        return Err(StakingError::Config("subgraph page size must be greater than zero".to_string()));
    }

    let mut after = String::new();
    let mut all = Vec::new();
    loop {
        let page = fetch(after.clone()).await?;
        let count = page.len();
        let last = page.last().map(|row| row.cursor().to_string());
        all.extend(page);
        debug!(after = %after, count, "Fetched subgraph page");

        match last {
            Some(last) if count >= page_size as usize => {
                if last == after {
                    return Err(StakingError::InvalidResponse(format!(
                        "subgraph cursor did not advance past {}",
                        last
                    )));
                }
                after = last;
            }
            _ => break,
        }
    }
    Ok(all)
}

fn parse_status(value: &str) -> Result<StakeStatus> {
    match value {
        "ACTIVE" | "Active" | "active" => Ok(StakeStatus::Active),
        "UNSTAKED" | "Unstaked" | "unstaked" => Ok(StakeStatus::Unstaked),
        "EMERGENCY_UNSTAKED" | "EmergencyUnstaked" | "emergency_unstaked" => {
            Ok(StakeStatus::EmergencyUnstaked)
        }
        other => Err(StakingError::InvalidResponse(format!("unknown stake status {}", other))),
    }
}

/// EVM chain data source backed by a subgraph
pub struct SubgraphSource {
    config: SubgraphConfig,
    client: reqwest::Client,
}

impl SubgraphSource {
    /// Create a new subgraph source
    pub fn new(config: SubgraphConfig) -> Result<Self> {
        if config.page_size == 0 {
            return Err(StakingError::Config("subgraph page size must be greater than zero".to_string()));
        }
        let auth = config
            .api_key
            .as_ref()
            .map(|key| (header::AUTHORIZATION, format!("Bearer {}", key)));
        let client = super::build_http_client(config.timeout_secs, auth)?;
        Ok(Self { config, client })
    }

    fn decimals(&self) -> &TokenDecimals {
        &self.config.token_decimals
    }

    async fn query<T: DeserializeOwned>(&self, query: &str, variables: serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(&self.config.url)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;

        let body: GraphQlResponse<T> = super::handle_response(response).await?;
        if !body.errors.is_empty() {
            let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(StakingError::GraphQl(messages.join("; ")));
        }
        body.data
            .ok_or_else(|| StakingError::GraphQl("response carried no data".to_string()))
    }

    /// Run an id-paged list query to exhaustion
    async fn paginate<D, T>(
        &self,
        query: &str,
        variables: serde_json::Value,
        rows: impl Fn(D) -> Vec<T>,
    ) -> Result<Vec<T>>
    where
        D: DeserializeOwned,
        T: PageRow,
    {
        let rows = &rows;
        let variables = &variables;
        collect_pages(self.config.page_size, |after| {
            let mut variables = variables.clone();
            variables["first"] = json!(self.config.page_size);
            variables["after"] = json!(after);
            async move { Ok::<_, StakingError>(rows(self.query::<D>(query, variables).await?)) }
        })
        .await
    }

    fn to_raw_project(&self, row: ProjectRow) -> Result<RawProject> {
        let decimals = self.decimals().decimals_for(ChainKind::Evm, &row.staking_token);
        Ok(RawProject {
            id: decode_bytes32(&row.id),
            total_staked: normalize_str(&row.total_staked, decimals)?,
            user_count: parse_u64("userCount", &row.user_count)?,
            project_name: row.project_name,
            staking_token: row.staking_token,
        })
    }

    fn to_raw_stake(&self, row: StakeRow) -> Result<RawStake> {
        let decimals = self
            .decimals()
            .decimals_for(ChainKind::Evm, &row.project.staking_token);
        Ok(RawStake {
            project_id: decode_bytes32(&row.project.id),
            project_name: row.project.project_name,
            stake_id: parse_u64("stakeId", &row.stake_id)?,
            user: row.user,
            amount: normalize_str(&row.amount, decimals)?,
            duration_secs: parse_u64("duration", &row.duration)?,
            staked_at: unix_millis("stakedAt", &row.staked_at)?,
            unlocked_at: unix_millis("unlockTime", &row.unlock_time)?,
            status: parse_status(&row.status)?,
        })
    }

    fn to_raw_unstake(&self, row: UnstakeRow) -> Result<RawUnstake> {
        let decimals = self
            .decimals()
            .decimals_for(ChainKind::Evm, &row.project.staking_token);
        Ok(RawUnstake {
            project_id: decode_bytes32(&row.project.id),
            project_name: row.project.project_name,
            stake_id: parse_u64("stakeId", &row.stake_id)?,
            user: row.user,
            amount: normalize_str(&row.amount, decimals)?,
            unstaked_at: unix_millis("unstakedAt", &row.unstaked_at)?,
            emergency: row.emergency,
        })
    }
}

#[async_trait::async_trait]
impl ChainDataSource for SubgraphSource {
    fn chain(&self) -> ChainKind {
        ChainKind::Evm
    }

    fn price_platform(&self) -> &str {
        &self.config.price_platform
    }

    async fn list_registered_projects(&self) -> Result<Vec<RawProject>> {
        let rows = self
            .paginate(PROJECTS_QUERY, json!({}), |d: ProjectsData| d.projects)
            .await?;
        let total = rows.len();

        let mut projects = rows
            .into_iter()
            .filter(|row| row.registered)
            .map(|row| self.to_raw_project(row))
            .collect::<Result<Vec<_>>>()?;
        projects.sort_by(|a, b| b.total_staked.cmp(&a.total_staked));

        debug!(total, registered = projects.len(), "Listed subgraph projects");
        Ok(projects)
    }

    async fn list_user_stakes(&self, address: &str) -> Result<RawUserStakes> {
        let user = address.to_ascii_lowercase();

        let stakes = self
            .paginate(STAKES_QUERY, json!({ "user": user }), |d: StakesData| d.stakes)
            .await?
            .into_iter()
            .map(|row| self.to_raw_stake(row))
            .collect::<Result<Vec<_>>>()?;

        let unstakes = self
            .paginate(UNSTAKES_QUERY, json!({ "user": user }), |d: UnstakesData| d.unstakes)
            .await?
            .into_iter()
            .map(|row| self.to_raw_unstake(row))
            .collect::<Result<Vec<_>>>()?;

        Ok(RawUserStakes { stakes, unstakes })
    }

    async fn get_project(&self, id: &str) -> Result<Option<RawProject>> {
        let encoded = encode_bytes32(id)?;
        let data: ProjectData = self.query(PROJECT_QUERY, json!({ "id": encoded })).await?;
        data.project
            .filter(|row| row.registered)
            .map(|row| self.to_raw_project(row))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_bytes32_trims_padding() {
        let id = encode_bytes32("alpha").unwrap();
        assert_eq!(id.len(), 66);
        assert_eq!(decode_bytes32(&id), "alpha");
    }

    #[test]
    fn test_decode_bytes32_passthrough_on_garbage() {
        assert_eq!(decode_bytes32("not-hex"), "not-hex");
        assert_eq!(decode_bytes32("0xff00"), "0xff00");
    }

    #[test]
    fn test_encode_bytes32_rejects_long_names() {
        assert!(encode_bytes32(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_stake_row_conversion() {
        let source = SubgraphSource::new(SubgraphConfig::default()).unwrap();
        let row: StakeRow = serde_json::from_value(json!({
            "id": "0xabc-4",
            "stakeId": "4",
            "user": "0xabc",
            "amount": "2000000000000000000",
            "duration": "604800",
            "stakedAt": "1700000000",
            "unlockTime": "1700604800",
            "status": "EMERGENCY_UNSTAKED",
            "project": {
                "id": encode_bytes32("alpha").unwrap(),
                "projectName": "Alpha",
                "stakingToken": "0xtoken"
            }
        }))
        .unwrap();

        let stake = source.to_raw_stake(row).unwrap();
        assert_eq!(stake.project_id, "alpha");
        assert_eq!(stake.stake_id, 4);
        assert_eq!(stake.amount, normalize_str("2", 0).unwrap());
        assert_eq!(stake.staked_at, 1_700_000_000_000);
        assert_eq!(stake.status, StakeStatus::EmergencyUnstaked);
    }

    #[test]
    fn test_timestamp_overflow_rejected() {
        assert_eq!(unix_millis("stakedAt", "1700000000").unwrap(), 1_700_000_000_000);
        assert!(matches!(
            unix_millis("stakedAt", &u64::MAX.to_string()),
            Err(StakingError::InvalidAmount(_))
        ));
        assert!(matches!(
            unix_millis("stakedAt", &(i64::MAX / 100).to_string()),
            Err(StakingError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config = SubgraphConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(matches!(SubgraphSource::new(config), Err(StakingError::Config(_))));
    }

    struct Row(String);

    impl PageRow for Row {
        fn cursor(&self) -> &str {
            &self.0
        }
    }

    fn store(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("id-{:02}", i)).collect()
    }

    fn page(store: &[String], after: &str, size: usize) -> Vec<Row> {
        store
            .iter()
            .filter(|id| id.as_str() > after)
            .take(size)
            .cloned()
            .map(Row)
            .collect()
    }

    #[tokio::test]
    async fn test_collect_pages_follows_cursor() {
        let ids = store(7);
        let mut cursors = Vec::new();
        let rows = collect_pages(3, |after| {
            let rows = page(&ids, &after, 3);
            cursors.push(after);
            async move { Ok(rows) }
        })
        .await
        .unwrap();

        let fetched: Vec<&str> = rows.iter().map(|r| r.0.as_str()).collect();
        assert_eq!(fetched, ids.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(cursors, vec!["", "id-02", "id-05"]);
    }

    #[tokio::test]
    async fn test_collect_pages_exact_multiple_ends_on_empty_page() {
        let ids = store(6);
        let mut requests = 0;
        let rows = collect_pages(3, |after| {
            requests += 1;
            let rows = page(&ids, &after, 3);
            async move { Ok(rows) }
        })
        .await
        .unwrap();

        assert_eq!(rows.len(), 6);
        assert_eq!(requests, 3);
    }

    #[tokio::test]
    async fn test_collect_pages_zero_size_never_fetches() {
        let mut requests = 0;
        let result = collect_pages(0, |_| {
            requests += 1;
            async { Ok(Vec::<Row>::new()) }
        })
        .await;

        assert!(matches!(result, Err(StakingError::Config(_))));
        assert_eq!(requests, 0);
    }

    #[tokio::test]
    async fn test_collect_pages_stuck_cursor_fails() {
        let ids = store(3);
        let result = collect_pages(3, |_| {
            let rows = page(&ids, "", 3);
            async move { Ok(rows) }
        })
        .await;

        assert!(matches!(result, Err(StakingError::InvalidResponse(_))));
    }

    #[test]
    fn test_graphql_errors_deserialize() {
        let body: GraphQlResponse<ProjectsData> = serde_json::from_value(json!({
            "errors": [{ "message": "bad query" }]
        }))
        .unwrap();
        assert!(body.data.is_none());
        assert_eq!(body.errors[0].message, "bad query");
    }
}
