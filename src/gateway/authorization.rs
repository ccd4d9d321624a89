// Authorization gate shared by gateway implementations
// One pending registration at a time; concurrent callers join it.

use std::sync::{Mutex, PoisonError};

use super::completion::Completion;
use crate::error::GatewayError;

pub type AuthorizationOutcome = Result<(), GatewayError>;

/// Result of `AuthorizationGate::begin`.
pub struct AuthorizationTicket {
    pub completion: Completion<AuthorizationOutcome>,
    /// True for exactly one caller per attempt: it must start the backend registration.
    pub must_register: bool,
}

/// Per-gateway authorization state. A success is cached for the gateway's
/// lifetime; a failure lets the next caller start a fresh attempt.
#[derive(Default)]
pub struct AuthorizationGate {
    current: Mutex<Option<Completion<AuthorizationOutcome>>>,
}

impl AuthorizationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> AuthorizationTicket {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(completion) = current.as_ref() {
            match completion.peek() {
                // Pending or succeeded: join it
                None | Some(Ok(())) => {
                    return AuthorizationTicket {
                        completion: completion.clone(),
                        must_register: false,
                    };
                }
                Some(Err(e)) => {
                    log::info!("Retrying authorization after earlier failure: {}", e);
                }
            }
        }

        let completion = Completion::new();
        *current = Some(completion.clone());
        AuthorizationTicket {
            completion,
            must_register: true,
        }
    }

    pub fn is_authorized(&self) -> bool {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(current.as_ref().and_then(|c| c.peek()), Some(Ok(())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_first_caller_registers() {
        let gate = AuthorizationGate::new();
        let first = gate.begin();
        let second = gate.begin();
        assert!(first.must_register);
        assert!(!second.must_register);
        assert!(!gate.is_authorized());

        first.completion.resolve(Ok(()));
        assert!(gate.is_authorized());
        assert_eq!(second.completion.peek(), Some(Ok(())));
        assert!(!gate.begin().must_register);
    }

    #[test]
    fn test_failure_allows_retry() {
        let gate = AuthorizationGate::new();
        let first = gate.begin();
        first.completion.resolve(Err(GatewayError::NotAuthorized));
        assert!(!gate.is_authorized());

        let retry = gate.begin();
        assert!(retry.must_register);
        assert!(!retry.completion.is_resolved());
    }
}
