use crate::error::CoreError;
use crate::types::DidStatus;

/// Events that move a DID record through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DidEvent {
    /// The record was persisted and handed to the anchoring worker.
    Submit,
    /// The ledger accepted the create operation.
    Anchor,
    /// Anchoring exhausted its retries.
    Fail,
}

/// Enforces the DID lifecycle.
///
/// Valid transitions:
/// - Draft → Pending (Submit)
/// - Pending → Anchored (Anchor)
/// - Pending → Failed (Fail)
///
/// Anchored and Failed are final.
pub struct DidStateMachine;

impl DidStateMachine {
    pub fn transition(current: DidStatus, event: DidEvent) -> Result<DidStatus, CoreError> {
        let new_state = match (current, event) {
            (DidStatus::Draft, DidEvent::Submit) => DidStatus::Pending,
            (DidStatus::Pending, DidEvent::Anchor) => DidStatus::Anchored,
            (DidStatus::Pending, DidEvent::Fail) => DidStatus::Failed,
            _ => {
                let target = match event {
                    DidEvent::Submit => DidStatus::Pending,
                    DidEvent::Anchor => DidStatus::Anchored,
                    DidEvent::Fail => DidStatus::Failed,
                };
                return Err(CoreError::InvalidDidTransition {
                    from: current,
                    to: target,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_state,
            event = ?event,
            "DID state transition"
        );

        Ok(new_state)
    }

    pub fn can_transition(current: DidStatus, event: DidEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}
