//! Price and metadata oracle client (CoinGecko-compatible API)

use super::PriceOracle;
use crate::amount::decimal_from_f64;
use crate::config::PriceConfig;
use crate::error::{Result, StakingError};
use crate::types::{ProjectLinks, TokenMetadata};
use bigdecimal::BigDecimal;
use reqwest::header::HeaderName;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct ContractResponse {
    #[serde(default)]
    description: HashMap<String, String>,
    #[serde(default)]
    image: Option<ImageSet>,
    #[serde(default)]
    links: Option<LinkSet>,
}

#[derive(Debug, Default, Deserialize)]
struct ImageSet {
    large: Option<String>,
    small: Option<String>,
    thumb: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LinkSet {
    #[serde(default)]
    homepage: Vec<String>,
    twitter_screen_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceQuote {
    usd: Option<f64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ContractResponse {
    fn into_metadata(self, platform: &str, contract: &str) -> TokenMetadata {
        let links = self.links.unwrap_or_default();
        let twitter = non_empty(links.twitter_screen_name);
        let image = self
            .image
            .and_then(|i| non_empty(i.large).or(non_empty(i.small)).or(non_empty(i.thumb)));

        TokenMetadata {
            description: non_empty(self.description.get("en").cloned()),
            image,
            links: ProjectLinks {
                website: non_empty(links.homepage.into_iter().next()),
                x: twitter.as_ref().map(|name| format!("https://x.com/{}", name)),
                twitter: twitter.map(|name| format!("https://twitter.com/{}", name)),
                dex: Some(format!("https://dexscreener.com/{}/{}", platform, contract)),
            },
        }
    }
}

/// HTTP client for the price oracle
pub struct PriceClient {
    config: PriceConfig,
    client: reqwest::Client,
}

impl PriceClient {
    /// Create a new price client
    pub fn new(config: PriceConfig) -> Result<Self> {
        let auth = match config.api_key {
            Some(ref key) => {
                let name = HeaderName::from_bytes(config.api_key_header.as_bytes())
                    .map_err(|e| StakingError::Config(format!("invalid API key header: {}", e)))?;
                Some((name, key.clone()))
            }
            None => None,
        };
        let client = super::build_http_client(config.timeout_secs, auth)?;
        Ok(Self { config, client })
    }
}

#[async_trait::async_trait]
impl PriceOracle for PriceClient {
    async fn token_metadata(&self, platform: &str, contract: &str) -> Result<TokenMetadata> {
        let url = format!(
            "{}/coins/{}/contract/{}",
            self.config.base_url,
            urlencoding::encode(platform),
            urlencoding::encode(contract)
        );

        let response = self.client.get(&url).send().await?;
        let body: ContractResponse = super::handle_response(response).await?;
        debug!(platform, contract, "Fetched token metadata");
        Ok(body.into_metadata(platform, contract))
    }

    async fn token_usd_price(&self, platform: &str, contract: &str) -> Result<BigDecimal> {
        let url = format!(
            "{}/simple/token_price/{}?contract_addresses={}&vs_currencies=usd",
            self.config.base_url,
            urlencoding::encode(platform),
            urlencoding::encode(contract)
        );

        let response = self.client.get(&url).send().await?;
        let body: HashMap<String, PriceQuote> = super::handle_response(response).await?;

        let quote = body
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(contract))
            .and_then(|(_, quote)| quote.usd)
            .ok_or_else(|| StakingError::NotFound(format!("USD price for {}/{}", platform, contract)))?;

        debug!(platform, contract, price = quote, "Fetched token price");
        decimal_from_f64(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contract_response_to_metadata() {
        let body: ContractResponse = serde_json::from_value(json!({
            "id": "alpha",
            "description": { "en": "Alpha staking token" },
            "image": { "thumb": "t.png", "small": "s.png", "large": "l.png" },
            "links": {
                "homepage": ["https://alpha.example", ""],
                "twitter_screen_name": "alpha"
            },
            "market_data": { "current_price": { "usd": 1.5 } }
        }))
        .unwrap();

        let metadata = body.into_metadata("ethereum", "0xabc");
        assert_eq!(metadata.description.as_deref(), Some("Alpha staking token"));
        assert_eq!(metadata.image.as_deref(), Some("l.png"));
        assert_eq!(metadata.links.website.as_deref(), Some("https://alpha.example"));
        assert_eq!(metadata.links.x.as_deref(), Some("https://x.com/alpha"));
        assert_eq!(
            metadata.links.dex.as_deref(),
            Some("https://dexscreener.com/ethereum/0xabc")
        );
    }

    #[test]
    fn test_sparse_contract_response() {
        let body: ContractResponse = serde_json::from_value(json!({
            "description": { "en": "" },
            "links": { "homepage": [], "twitter_screen_name": "" }
        }))
        .unwrap();

        let metadata = body.into_metadata("solana", "Mint");
        assert!(metadata.description.is_none());
        assert!(metadata.image.is_none());
        assert!(metadata.links.twitter.is_none());
    }

    #[test]
    fn test_price_client_rejects_bad_header_name() {
        let config = PriceConfig {
            api_key: Some("key".into()),
            api_key_header: "bad header".into(),
            ..Default::default()
        };
        assert!(matches!(PriceClient::new(config), Err(StakingError::Config(_))));
    }
}
