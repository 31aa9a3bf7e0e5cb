use crate::error::CoreError;
use crate::types::CredentialStatus;

/// Events that end a credential's active life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialEvent {
    /// Issuer permanently revokes the credential.
    Revoke,
    /// The expiration date has passed.
    Expire,
}

/// Valid transitions:
/// - Active → Revoked (Revoke)
/// - Active → Expired (Expire)
pub struct CredentialStateMachine;

impl CredentialStateMachine {
    pub fn transition(
        current: CredentialStatus,
        event: CredentialEvent,
    ) -> Result<CredentialStatus, CoreError> {
        let new_state = match (current, event) {
            (CredentialStatus::Active, CredentialEvent::Revoke) => CredentialStatus::Revoked,
            (CredentialStatus::Active, CredentialEvent::Expire) => CredentialStatus::Expired,
            _ => {
                let target = match event {
                    CredentialEvent::Revoke => CredentialStatus::Revoked,
                    CredentialEvent::Expire => CredentialStatus::Expired,
                };
                return Err(CoreError::InvalidCredentialTransition {
                    from: current,
                    to: target,
                });
            }
        };

        tracing::debug!(
            from = %current,
            to = %new_state,
            event = ?event,
            "credential state transition"
        );

        Ok(new_state)
    }

    pub fn can_transition(current: CredentialStatus, event: CredentialEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revoke_from_active() {
        let s = CredentialStateMachine::transition(CredentialStatus::Active, CredentialEvent::Revoke)
            .unwrap();
        assert_eq!(s, CredentialStatus::Revoked);
        assert!(s.is_final());
    }

    #[test]
    fn test_expire_from_active() {
        let s = CredentialStateMachine::transition(CredentialStatus::Active, CredentialEvent::Expire)
            .unwrap();
        assert_eq!(s, CredentialStatus::Expired);
    }

    #[test]
    fn test_revoked_cannot_expire() {
        assert!(!CredentialStateMachine::can_transition(
            CredentialStatus::Revoked,
            CredentialEvent::Expire
        ));
    }

    #[test]
    fn test_double_revoke_rejected() {
        let result =
            CredentialStateMachine::transition(CredentialStatus::Revoked, CredentialEvent::Revoke);
        assert!(result.is_err());
    }
}
