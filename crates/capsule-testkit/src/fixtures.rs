//! Shared fixtures

use capsule_core::Identity;
use std::sync::Once;

/// Ledger timestamp most scenarios start from
pub const T0: u64 = 1_700_000_000;

/// Block height at `T0`
pub const H0: u64 = 18_000_000;

/// Account that creates capsules
pub fn creator() -> Identity {
    Identity::from("0x1111111111111111111111111111111111111111")
}

/// Account capsules are addressed to
pub fn recipient() -> Identity {
    Identity::from("0x2222222222222222222222222222222222222222")
}

/// Account with no rights over any capsule
pub fn stranger() -> Identity {
    Identity::from("0x3333333333333333333333333333333333333333")
}

static TRACING: Once = Once::new();

/// Route test logs through the test writer; `RUST_LOG` selects the level
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}
