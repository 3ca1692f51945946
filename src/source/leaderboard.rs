//! Points leaderboard client

use super::LeaderboardSource;
use crate::config::LeaderboardConfig;
use crate::error::Result;
use crate::types::{LeaderboardEntry, PointsDashboard};

/// HTTP client for the points API
pub struct LeaderboardClient {
    config: LeaderboardConfig,
    client: reqwest::Client,
}

impl LeaderboardClient {
    /// Create a new leaderboard client
    pub fn new(config: LeaderboardConfig) -> Result<Self> {
        let client = super::build_http_client(config.timeout_secs, None)?;
        Ok(Self { config, client })
    }
}

#[async_trait::async_trait]
impl LeaderboardSource for LeaderboardClient {
    async fn points_leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        let url = format!("{}/points/leaderboard", self.config.base_url);
        let response = self.client.get(&url).send().await?;
        super::handle_response(response).await
    }

    async fn points_for_address(&self, address: &str) -> Result<PointsDashboard> {
        let url = format!(
            "{}/points/dashboard/{}",
            self.config.base_url,
            urlencoding::encode(address)
        );
        let response = self.client.get(&url).send().await?;
        super::handle_response(response).await
    }
}
