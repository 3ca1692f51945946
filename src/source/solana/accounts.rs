//! Staking program account layouts
//!
//! Every account starts with an 8-byte discriminator,
//! `sha256("account:<Name>")[..8]`, followed by little-endian fields.
//! Strings are a `u32` length prefix plus UTF-8 bytes.

use crate::error::{Result, StakingError};
use crate::types::StakeStatus;
use sha2::{Digest, Sha256};
use solana_program::pubkey::Pubkey;

pub const DISCRIMINATOR_LEN: usize = 8;

/// Offset of the owning user key in stake and unstake accounts
pub const USER_OFFSET: usize = DISCRIMINATOR_LEN;

/// Offset of the project config key in stake and unstake accounts
pub const PROJECT_OFFSET: usize = DISCRIMINATOR_LEN + 32;

/// Discriminator for an account type name
pub fn account_discriminator(name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("account:{}", name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

struct AccountReader<'a> {
    account: &'static str,
    data: &'a [u8],
    offset: usize,
}

impl<'a> AccountReader<'a> {
    fn new(account: &'static str, data: &'a [u8]) -> Result<Self> {
        if data.len() < DISCRIMINATOR_LEN {
            return Err(StakingError::AccountLayout(format!(
                "{}: {} bytes is shorter than the discriminator",
                account,
                data.len()
            )));
        }
        if data[..DISCRIMINATOR_LEN] != account_discriminator(account) {
            return Err(StakingError::AccountLayout(format!(
                "{}: discriminator mismatch",
                account
            )));
        }
        Ok(Self {
            account,
            data,
            offset: DISCRIMINATOR_LEN,
        })
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.offset + len;
        if end > self.data.len() {
            return Err(StakingError::AccountLayout(format!(
                "{}: need {} bytes at offset {}, have {}",
                self.account,
                len,
                self.offset,
                self.data.len()
            )));
        }
        let data = self.data;
        let slice = &data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn bool(&mut self) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(StakingError::AccountLayout(format!(
                "{}: invalid bool byte {}",
                self.account, other
            ))),
        }
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn pubkey(&mut self) -> Result<Pubkey> {
        Ok(Pubkey::new_from_array(self.array()?))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| StakingError::AccountLayout(format!("{}: {}", self.account, e)))
    }
}

/// Singleton platform settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfigAccount {
    pub admin: Pubkey,
    /// Number of registered projects; ids run `0..project_count`
    pub project_count: u64,
}

impl PlatformConfigAccount {
    pub const NAME: &'static str = "PlatformConfig";

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = AccountReader::new(Self::NAME, data)?;
        Ok(Self {
            admin: reader.pubkey()?,
            project_count: reader.u64()?,
        })
    }
}

/// One registered project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfigAccount {
    pub project_id: u64,
    pub name: String,
    pub staking_mint: Pubkey,
    /// Raw amount in the mint's smallest unit
    pub total_staked: u64,
    pub user_count: u64,
}

impl ProjectConfigAccount {
    pub const NAME: &'static str = "ProjectConfig";

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = AccountReader::new(Self::NAME, data)?;
        Ok(Self {
            project_id: reader.u64()?,
            name: reader.string()?,
            staking_mint: reader.pubkey()?,
            total_staked: reader.u64()?,
            user_count: reader.u64()?,
        })
    }
}

/// One stake position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeInfoAccount {
    pub user: Pubkey,
    /// Project config account this stake belongs to
    pub project: Pubkey,
    pub stake_id: u64,
    pub amount: u64,
    pub duration_secs: u64,
    /// Unix seconds
    pub staked_at: i64,
    /// Unix seconds
    pub unlock_at: i64,
    pub status: StakeStatus,
}

impl StakeInfoAccount {
    pub const NAME: &'static str = "StakeInfo";

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = AccountReader::new(Self::NAME, data)?;
        Ok(Self {
            user: reader.pubkey()?,
            project: reader.pubkey()?,
            stake_id: reader.u64()?,
            amount: reader.u64()?,
            duration_secs: reader.u64()?,
            staked_at: reader.i64()?,
            unlock_at: reader.i64()?,
            status: match reader.u8()? {
                0 => StakeStatus::Active,
                1 => StakeStatus::Unstaked,
                2 => StakeStatus::EmergencyUnstaked,
                other => {
                    return Err(StakingError::AccountLayout(format!(
                        "{}: unknown status {}",
                        Self::NAME,
                        other
                    )))
                }
            },
        })
    }
}

/// A completed unstake. Carries no duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnstakeInfoAccount {
    pub user: Pubkey,
    pub project: Pubkey,
    pub stake_id: u64,
    pub amount: u64,
    /// Unix seconds
    pub unstaked_at: i64,
    pub emergency: bool,
}

impl UnstakeInfoAccount {
    pub const NAME: &'static str = "UnstakeInfo";

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = AccountReader::new(Self::NAME, data)?;
        Ok(Self {
            user: reader.pubkey()?,
            project: reader.pubkey()?,
            stake_id: reader.u64()?,
            amount: reader.u64()?,
            unstaked_at: reader.i64()?,
            emergency: reader.bool()?,
        })
    }
}
