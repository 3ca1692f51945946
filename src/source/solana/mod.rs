//! Solana staking data from program accounts
//!
//! Projects are enumerated from the platform config's `project_count` and
//! resolved through their derived addresses. User stakes are found with
//! `getProgramAccounts` scans filtered on the embedded user and project
//! keys.

pub mod accounts;
pub mod confirm;
pub mod pda;
pub mod rpc;

use super::{ChainDataSource, RawProject, RawStake, RawUnstake, RawUserStakes};
use crate::amount::normalize_u64;
use crate::config::SolanaConfig;
use crate::error::{Result, StakingError};
use crate::types::ChainKind;
use accounts::{
    account_discriminator, PlatformConfigAccount, ProjectConfigAccount, StakeInfoAccount,
    UnstakeInfoAccount, PROJECT_OFFSET, USER_OFFSET,
};
use solana_program::pubkey::Pubkey;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

pub use confirm::Confirmation;
pub use pda::ProgramAddresses;
pub use rpc::{MemcmpFilter, RpcClient, SignatureStatus, SolanaRpc};

/// Parse a base58 public key
pub fn parse_pubkey(value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).map_err(|e| StakingError::InvalidAddress(format!("{}: {}", value, e)))
}

/// On-chain unix seconds to milliseconds
fn unix_millis(field: &str, secs: i64) -> Result<i64> {
    secs.checked_mul(1000)
        .ok_or_else(|| StakingError::AccountLayout(format!("{} out of range: {}", field, secs)))
}

/// Solana chain data source
pub struct SolanaSource<R: SolanaRpc = RpcClient> {
    config: SolanaConfig,
    rpc: Arc<R>,
    addresses: ProgramAddresses,
}

impl SolanaSource<RpcClient> {
    /// Create a source talking to the configured RPC endpoint
    pub fn new(config: SolanaConfig) -> Result<Self> {
        let rpc = RpcClient::new(config.rpc_url.clone(), config.timeout_secs)?;
        Self::with_rpc(config, Arc::new(rpc))
    }
}

impl<R: SolanaRpc> SolanaSource<R> {
    /// Create a source over any RPC implementation
    pub fn with_rpc(config: SolanaConfig, rpc: Arc<R>) -> Result<Self> {
        let program_id = parse_pubkey(&config.program_id)?;
        Ok(Self {
            config,
            rpc,
            addresses: ProgramAddresses::new(program_id),
        })
    }

    pub fn addresses(&self) -> &ProgramAddresses {
        &self.addresses
    }

    fn human_amount(&self, raw: u64, mint: &Pubkey) -> bigdecimal::BigDecimal {
        let decimals = self
            .config
            .token_decimals
            .decimals_for(ChainKind::Solana, &mint.to_string());
        normalize_u64(raw, decimals)
    }

    fn to_raw_project(&self, account: &ProjectConfigAccount) -> RawProject {
        RawProject {
            id: account.project_id.to_string(),
            project_name: account.name.clone(),
            staking_token: account.staking_mint.to_string(),
            total_staked: self.human_amount(account.total_staked, &account.staking_mint),
            user_count: account.user_count,
        }
    }

    /// Read the platform config; its absence is fatal
    pub async fn platform_config(&self) -> Result<PlatformConfigAccount> {
        let (address, _) = self.addresses.platform_config();
        let data = self
            .rpc
            .get_account_data(&address)
            .await?
            .ok_or_else(|| StakingError::NotFound(format!("platform config {}", address)))?;
        PlatformConfigAccount::decode(&data)
    }

    /// Resolve project config accounts by their account address
    async fn project_configs_by_address(
        &self,
        addresses: &[Pubkey],
    ) -> Result<HashMap<Pubkey, ProjectConfigAccount>> {
        let data = self.rpc.get_multiple_account_data(addresses).await?;
        let mut out = HashMap::new();
        for (address, data) in addresses.iter().zip(data) {
            match data {
                Some(data) => {
                    out.insert(*address, ProjectConfigAccount::decode(&data)?);
                }
                None => warn!(address = %address, "Project config account missing"),
            }
        }
        Ok(out)
    }

    /// Scan stake and unstake accounts, optionally restricted to one project
    async fn scan_user(&self, user: &Pubkey, project: Option<&Pubkey>) -> Result<RawUserStakes> {
        let program_id = *self.addresses.program_id();
        let mut scope = vec![MemcmpFilter::new(USER_OFFSET, user.to_bytes().to_vec())];
        if let Some(project) = project {
            scope.push(MemcmpFilter::new(PROJECT_OFFSET, project.to_bytes().to_vec()));
        }

        let mut stake_filters = vec![MemcmpFilter::new(0, account_discriminator(StakeInfoAccount::NAME).to_vec())];
        stake_filters.extend(scope.iter().cloned());
        let mut unstake_filters = vec![MemcmpFilter::new(0, account_discriminator(UnstakeInfoAccount::NAME).to_vec())];
        unstake_filters.extend(scope);

        let stakes = self
            .rpc
            .get_program_accounts(&program_id, &stake_filters)
            .await?
            .into_iter()
            .map(|(_, data)| StakeInfoAccount::decode(&data))
            .collect::<Result<Vec<_>>>()?;
        let unstakes = self
            .rpc
            .get_program_accounts(&program_id, &unstake_filters)
            .await?
            .into_iter()
            .map(|(_, data)| UnstakeInfoAccount::decode(&data))
            .collect::<Result<Vec<_>>>()?;

        let mut project_keys: Vec<Pubkey> = stakes
            .iter()
            .map(|s| s.project)
            .chain(unstakes.iter().map(|u| u.project))
            .collect();
        project_keys.sort();
        project_keys.dedup();
        let projects = self.project_configs_by_address(&project_keys).await?;

        debug!(
            user = %user,
            stakes = stakes.len(),
            unstakes = unstakes.len(),
            projects = projects.len(),
            "Scanned user stake accounts"
        );

        // accounts whose project config is missing were already warned about
        let mut out = RawUserStakes::default();
        for stake in stakes {
            let Some(project) = projects.get(&stake.project) else { continue };
            out.stakes.push(RawStake {
                project_id: project.project_id.to_string(),
                project_name: project.name.clone(),
                stake_id: stake.stake_id,
                user: stake.user.to_string(),
                amount: self.human_amount(stake.amount, &project.staking_mint),
                duration_secs: stake.duration_secs,
                staked_at: unix_millis("staked_at", stake.staked_at)?,
                unlocked_at: unix_millis("unlock_at", stake.unlock_at)?,
                status: stake.status,
            });
        }
        for unstake in unstakes {
            let Some(project) = projects.get(&unstake.project) else { continue };
            out.unstakes.push(RawUnstake {
                project_id: project.project_id.to_string(),
                project_name: project.name.clone(),
                stake_id: unstake.stake_id,
                user: unstake.user.to_string(),
                amount: self.human_amount(unstake.amount, &project.staking_mint),
                unstaked_at: unix_millis("unstaked_at", unstake.unstaked_at)?,
                emergency: unstake.emergency,
            });
        }

        Ok(out)
    }

    /// Stakes and unstakes of one user within one project
    pub async fn list_user_project_stakes(&self, address: &str, project_id: u64) -> Result<RawUserStakes> {
        let user = parse_pubkey(address)?;
        let (project, _) = self.addresses.project_config(project_id);
        self.scan_user(&user, Some(&project)).await
    }

    /// Poll a submitted transaction with the configured budget
    pub async fn wait_for_confirmation(&self, signature: &str) -> Confirmation {
        confirm::wait_for_confirmation(
            self.rpc.as_ref(),
            signature,
            self.config.confirm_max_attempts,
            self.config.confirm_interval,
        )
        .await
    }

    /// Pre-submission check that an account exists, with linear backoff
    pub async fn wait_for_account(&self, address: &Pubkey) -> bool {
        confirm::wait_for_account(
            self.rpc.as_ref(),
            address,
            self.config.existence_max_attempts,
            self.config.existence_base_delay,
        )
        .await
    }
}

#[async_trait::async_trait]
impl<R: SolanaRpc> ChainDataSource for SolanaSource<R> {
    fn chain(&self) -> ChainKind {
        ChainKind::Solana
    }

    fn price_platform(&self) -> &str {
        &self.config.price_platform
    }

    async fn list_registered_projects(&self) -> Result<Vec<RawProject>> {
        let platform = self.platform_config().await?;
        let addresses: Vec<Pubkey> = (0..platform.project_count)
            .map(|id| self.addresses.project_config(id).0)
            .collect();

        let data = self.rpc.get_multiple_account_data(&addresses).await?;
        let mut projects = Vec::with_capacity(addresses.len());
        for (id, data) in data.into_iter().enumerate() {
            match data {
                Some(data) => projects.push(self.to_raw_project(&ProjectConfigAccount::decode(&data)?)),
                None => warn!(project_id = id, "Registered project has no config account"),
            }
        }

        debug!(
            project_count = platform.project_count,
            resolved = projects.len(),
            "Listed Solana projects"
        );
        Ok(projects)
    }

    async fn list_user_stakes(&self, address: &str) -> Result<RawUserStakes> {
        let user = parse_pubkey(address)?;
        self.scan_user(&user, None).await
    }

    async fn get_project(&self, id: &str) -> Result<Option<RawProject>> {
        let project_id = id
            .parse::<u64>()
            .map_err(|e| StakingError::InvalidAddress(format!("project id {}: {}", id, e)))?;
        let (address, _) = self.addresses.project_config(project_id);
        match self.rpc.get_account_data(&address).await? {
            Some(data) => Ok(Some(self.to_raw_project(&ProjectConfigAccount::decode(&data)?))),
            None => Ok(None),
        }
    }
}
