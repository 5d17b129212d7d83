//! Property test strategies for capsule types

use proptest::prelude::*;

pub use proptest;

use capsule_core::{CapsuleState, Identity, UnlockCondition};

/// Arbitrary payloads, including empty
pub fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

/// Address-like identities
pub fn arb_identity() -> impl Strategy<Value = Identity> {
    prop::array::uniform20(any::<u8>()).prop_map(|bytes| {
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Identity::from(format!("0x{hex}").as_str())
    })
}

/// Timestamp and block-height conditions
pub fn arb_condition() -> impl Strategy<Value = UnlockCondition> {
    prop_oneof![
        (1u64..4_000_000_000).prop_map(UnlockCondition::at_timestamp),
        (1u64..100_000_000).prop_map(UnlockCondition::at_height),
    ]
}

/// Any lifecycle state
pub fn arb_state() -> impl Strategy<Value = CapsuleState> {
    prop_oneof![
        Just(CapsuleState::Created),
        Just(CapsuleState::Locked),
        Just(CapsuleState::Unlockable),
        Just(CapsuleState::UnlockFailed),
        Just(CapsuleState::Unlocked),
    ]
}
