//! Minimal Solana JSON-RPC client
//!
//! Only the read calls the staking layer needs: account reads, filtered
//! program scans and signature statuses. Account data is always requested
//! base64-encoded.

use crate::error::{Result, StakingError};
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use solana_program::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// `getMultipleAccounts` accepts at most this many keys per call
pub const MAX_MULTIPLE_ACCOUNTS: usize = 100;

/// Byte-offset equality filter for program account scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemcmpFilter {
    pub offset: usize,
    pub bytes: Vec<u8>,
}

impl MemcmpFilter {
    pub fn new(offset: usize, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            bytes: bytes.into(),
        }
    }

    /// Whether account data satisfies this filter
    pub fn matches(&self, data: &[u8]) -> bool {
        data.get(self.offset..self.offset + self.bytes.len()) == Some(self.bytes.as_slice())
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            "memcmp": {
                "offset": self.offset,
                "bytes": bs58::encode(&self.bytes).into_string(),
            }
        })
    }
}

/// Status of a submitted transaction
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    #[serde(default)]
    pub confirmation_status: Option<String>,
    #[serde(default)]
    pub err: Option<serde_json::Value>,
}

impl SignatureStatus {
    /// Reached `confirmed` or `finalized` commitment
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self.confirmation_status.as_deref(),
            Some("confirmed") | Some("finalized")
        )
    }
}

/// Read access to the chain, as used by the staking source
#[async_trait::async_trait]
pub trait SolanaRpc: Send + Sync {
    /// Raw data of one account, `None` if it does not exist
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>>;

    /// Raw data of several accounts, in request order
    async fn get_multiple_account_data(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Accounts owned by a program that satisfy every filter
    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[MemcmpFilter],
    ) -> Result<Vec<(Pubkey, Vec<u8>)>>;

    /// Status of a transaction signature, `None` while unknown to the cluster
    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>>;
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
struct UiAccount {
    /// `[data, encoding]`
    data: (String, String),
}

#[derive(Deserialize)]
struct KeyedAccount {
    pubkey: String,
    account: UiAccount,
}

fn decode_account(account: UiAccount) -> Result<Vec<u8>> {
    let (data, encoding) = account.data;
    if encoding != "base64" {
        return Err(StakingError::InvalidResponse(format!(
            "unexpected account encoding {}",
            encoding
        )));
    }
    Ok(base64::engine::general_purpose::STANDARD.decode(data)?)
}

/// HTTP JSON-RPC client
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a new RPC client
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            client: crate::source::build_http_client(timeout_secs, None)?,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "Solana RPC call");

        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await?;

        let body: RpcResponse<T> = crate::source::handle_response(response).await?;
        if let Some(error) = body.error {
            return Err(StakingError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        body.result
            .ok_or_else(|| StakingError::InvalidResponse(format!("{} returned no result", method)))
    }
}

#[async_trait::async_trait]
impl SolanaRpc for RpcClient {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        let response: WithContext<Option<UiAccount>> = self
            .call(
                "getAccountInfo",
                json!([address.to_string(), { "encoding": "base64" }]),
            )
            .await?;
        response.value.map(decode_account).transpose()
    }

    async fn get_multiple_account_data(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut out = Vec::with_capacity(addresses.len());
        for chunk in addresses.chunks(MAX_MULTIPLE_ACCOUNTS) {
            let keys: Vec<String> = chunk.iter().map(Pubkey::to_string).collect();
            let response: WithContext<Vec<Option<UiAccount>>> = self
                .call("getMultipleAccounts", json!([keys, { "encoding": "base64" }]))
                .await?;
            for account in response.value {
                out.push(account.map(decode_account).transpose()?);
            }
        }
        Ok(out)
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[MemcmpFilter],
    ) -> Result<Vec<(Pubkey, Vec<u8>)>> {
        let filters: Vec<serde_json::Value> = filters.iter().map(MemcmpFilter::to_json).collect();
        let accounts: Vec<KeyedAccount> = self
            .call(
                "getProgramAccounts",
                json!([program_id.to_string(), { "encoding": "base64", "filters": filters }]),
            )
            .await?;

        accounts
            .into_iter()
            .map(|keyed| {
                let pubkey = Pubkey::from_str(&keyed.pubkey)
                    .map_err(|e| StakingError::InvalidAddress(format!("{}: {}", keyed.pubkey, e)))?;
                Ok((pubkey, decode_account(keyed.account)?))
            })
            .collect()
    }

    async fn get_signature_status(&self, signature: &str) -> Result<Option<SignatureStatus>> {
        let response: WithContext<Vec<Option<SignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": true }]),
            )
            .await?;
        Ok(response.value.into_iter().next().flatten())
    }
}
