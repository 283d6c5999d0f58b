//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::ledger::FrameLedger;
use crate::state::{StateId, Status};

/// Validate the ledger counters against each other and the frame table
pub fn assert_ledger_invariants(ledger: &FrameLedger) {
    debug_assert!(
        ledger.client_frame_no() <= ledger.server_frame_no(),
        "client frame {} is ahead of server frame {}",
        ledger.client_frame_no(),
        ledger.server_frame_no()
    );

    // Frames are only recorded once known to exist upstream
    debug_assert!(
        ledger
            .get(ledger.server_frame_no().saturating_add(1))
            .is_none(),
        "ledger holds frames past server frame {}",
        ledger.server_frame_no()
    );
}

/// Validate a state stack listed bottom to top
pub fn assert_stack_invariants(stack: &[(StateId, Status)]) {
    let active = stack.iter().filter(|(_, s)| *s == Status::Active).count();
    debug_assert!(
        stack.is_empty() || active == 1,
        "stack {:?} has {} active states, expected 1",
        stack,
        active
    );

    // Only the head may be active
    if let Some((id, status)) = stack.last() {
        debug_assert!(
            *status == Status::Active,
            "head state {} is {:?}",
            id,
            status
        );
    }

    debug_assert!(
        stack.iter().all(|(_, s)| *s != Status::Ready),
        "stack {:?} holds a state that was never entered",
        stack
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_stack() {
        assert_stack_invariants(&[]);
        assert_stack_invariants(&[("a", Status::Paused), ("b", Status::Active)]);
    }

    #[test]
    #[should_panic(expected = "active states")]
    fn test_two_active_states() {
        assert_stack_invariants(&[("a", Status::Active), ("b", Status::Active)]);
    }

    #[test]
    #[should_panic(expected = "never entered")]
    fn test_ready_state_on_stack() {
        assert_stack_invariants(&[("a", Status::Paused), ("b", Status::Ready), ("c", Status::Active)]);
    }

    #[test]
    fn test_fresh_ledger() {
        assert_ledger_invariants(&FrameLedger::new());
    }
}
