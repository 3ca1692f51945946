//! Transaction confirmation polling
//!
//! Running out of attempts is a soft outcome: the transaction may still
//! land, so callers get [`Confirmation::Unconfirmed`] instead of an error.

use super::rpc::SolanaRpc;
use solana_program::pubkey::Pubkey;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of waiting for a submitted transaction
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    /// Reached confirmed or finalized commitment
    Confirmed { slot: u64 },
    /// Landed but the program rejected it
    Failed(String),
    /// Attempt budget exhausted; possibly successful
    Unconfirmed { attempts: u32 },
}

impl Confirmation {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Confirmation::Confirmed { .. })
    }
}

/// Poll a signature at a fixed interval for at most `max_attempts` polls.
///
/// RPC errors during polling count as a missed poll.
pub async fn wait_for_confirmation<R: SolanaRpc + ?Sized>(
    rpc: &R,
    signature: &str,
    max_attempts: u32,
    interval: Duration,
) -> Confirmation {
    for attempt in 1..=max_attempts {
        match rpc.get_signature_status(signature).await {
            Ok(Some(status)) => {
                if let Some(err) = status.err {
                    warn!(signature, attempt, error = %err, "Transaction failed on chain");
                    return Confirmation::Failed(err.to_string());
                }
                if status.is_confirmed() {
                    info!(signature, attempt, slot = status.slot, "Transaction confirmed");
                    return Confirmation::Confirmed { slot: status.slot };
                }
                debug!(signature, attempt, "Transaction seen, awaiting commitment");
            }
            Ok(None) => debug!(signature, attempt, "Transaction not yet visible"),
            Err(e) => warn!(signature, attempt, error = %e, "Signature status poll failed"),
        }

        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }

    warn!(signature, max_attempts, "Confirmation polling exhausted, outcome unknown");
    Confirmation::Unconfirmed {
        attempts: max_attempts,
    }
}

/// Wait for an account to exist, backing off linearly (`base_delay * attempt`).
pub async fn wait_for_account<R: SolanaRpc + ?Sized>(
    rpc: &R,
    address: &Pubkey,
    max_attempts: u32,
    base_delay: Duration,
) -> bool {
    for attempt in 1..=max_attempts {
        match rpc.get_account_data(address).await {
            Ok(Some(_)) => {
                debug!(address = %address, attempt, "Account exists");
                return true;
            }
            Ok(None) => debug!(address = %address, attempt, "Account not found yet"),
            Err(e) => warn!(address = %address, attempt, error = %e, "Account lookup failed"),
        }

        if attempt < max_attempts {
            tokio::time::sleep(base_delay * attempt).await;
        }
    }

    false
}
