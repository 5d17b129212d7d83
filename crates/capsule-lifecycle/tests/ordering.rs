//! States only follow the forward ordering, whatever sequence is attempted

use capsule_core::CapsuleState;
use capsule_lifecycle::CapsuleStateMachine;
use capsule_testkit::strategies::arb_state;
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_accepted_transitions_never_skip_or_regress(
        attempts in prop::collection::vec(arb_state(), 0..64)
    ) {
        let mut machine = CapsuleStateMachine::new();
        for next in attempts {
            let before = machine.state();
            match machine.apply(next) {
                Ok(()) => {
                    prop_assert!(!before.is_terminal());
                    let back_to_unlockable =
                        before == CapsuleState::UnlockFailed && next == CapsuleState::Unlockable;
                    let retry_marker =
                        before == CapsuleState::Unlockable && next == CapsuleState::UnlockFailed;
                    if back_to_unlockable || retry_marker {
                        prop_assert_eq!(before.rank(), next.rank());
                    } else {
                        prop_assert_eq!(before.rank() + 1, next.rank());
                    }
                }
                Err(_) => prop_assert_eq!(machine.state(), before),
            }
        }

        let history = machine.history();
        prop_assert_eq!(history[0], CapsuleState::Created);
        prop_assert!(history.windows(2).all(|w| w[1].rank() >= w[0].rank()));
        if let Some(pos) = history.iter().position(|s| *s == CapsuleState::Unlocked) {
            prop_assert_eq!(pos, history.len() - 1);
        }
    }
}
