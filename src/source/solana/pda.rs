//! Program-derived addresses for the staking program
//!
//! Seed encoding is a binary contract with the on-chain program: UTF-8
//! tag first, then `u64` values as 8 little-endian bytes and public keys
//! as their raw 32 bytes, in exactly this order. Any drift here makes
//! every lookup silently target the wrong account.

use solana_program::pubkey::Pubkey;

pub const PLATFORM_CONFIG_TAG: &[u8] = b"platform_config";
pub const PROJECT_CONFIG_TAG: &[u8] = b"project_config";
pub const STAKE_INFO_TAG: &[u8] = b"stake_info";
pub const UNSTAKE_INFO_TAG: &[u8] = b"unstake_info";
pub const VAULT_AUTHORITY_TAG: &[u8] = b"vault_authority";

/// Seeds for the singleton platform config account
pub fn platform_config_seeds() -> Vec<Vec<u8>> {
    vec![PLATFORM_CONFIG_TAG.to_vec()]
}

/// Seeds for a project config account
pub fn project_config_seeds(project_id: u64) -> Vec<Vec<u8>> {
    vec![PROJECT_CONFIG_TAG.to_vec(), project_id.to_le_bytes().to_vec()]
}

/// Seeds for a stake info account
pub fn stake_info_seeds(project_id: u64, user: &Pubkey, stake_id: u64) -> Vec<Vec<u8>> {
    vec![
        STAKE_INFO_TAG.to_vec(),
        project_id.to_le_bytes().to_vec(),
        user.to_bytes().to_vec(),
        stake_id.to_le_bytes().to_vec(),
    ]
}

/// Seeds for an unstake info account
pub fn unstake_info_seeds(project_id: u64, user: &Pubkey, stake_id: u64) -> Vec<Vec<u8>> {
    vec![
        UNSTAKE_INFO_TAG.to_vec(),
        project_id.to_le_bytes().to_vec(),
        user.to_bytes().to_vec(),
        stake_id.to_le_bytes().to_vec(),
    ]
}

/// Seeds for the token vault authority of a project
pub fn vault_authority_seeds(project_id: u64) -> Vec<Vec<u8>> {
    vec![VAULT_AUTHORITY_TAG.to_vec(), project_id.to_le_bytes().to_vec()]
}

/// Address derivation bound to one program id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAddresses {
    program_id: Pubkey,
}

impl ProgramAddresses {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    fn derive(&self, seeds: Vec<Vec<u8>>) -> (Pubkey, u8) {
        let seeds: Vec<&[u8]> = seeds.iter().map(Vec::as_slice).collect();
        Pubkey::find_program_address(&seeds, &self.program_id)
    }

    pub fn platform_config(&self) -> (Pubkey, u8) {
        self.derive(platform_config_seeds())
    }

    pub fn project_config(&self, project_id: u64) -> (Pubkey, u8) {
        self.derive(project_config_seeds(project_id))
    }

    pub fn stake_info(&self, project_id: u64, user: &Pubkey, stake_id: u64) -> (Pubkey, u8) {
        self.derive(stake_info_seeds(project_id, user, stake_id))
    }

    pub fn unstake_info(&self, project_id: u64, user: &Pubkey, stake_id: u64) -> (Pubkey, u8) {
        self.derive(unstake_info_seeds(project_id, user, stake_id))
    }

    pub fn vault_authority(&self, project_id: u64) -> (Pubkey, u8) {
        self.derive(vault_authority_seeds(project_id))
    }
}
