//! Tracing setup for hosts embedding the library

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise this crate logs at `log_level` and
/// everything else at `info`. Returns `false` if a subscriber was already
/// installed.
pub fn init_tracing(log_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("stake_ledger={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
