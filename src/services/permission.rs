use super::PermissionService;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// How microphone access requests are answered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MicrophoneAccess {
    /// Ask the user on the console each time access is needed
    #[default]
    Prompt,
    Allow,
    Deny,
}

type PendingAnswer = Arc<Mutex<Option<oneshot::Sender<bool>>>>;

/// Grants or refuses microphone access according to the configured policy
///
/// In prompt mode the request stays open until a `ConsentResponder` answers it.
pub struct ConsentGate {
    policy: MicrophoneAccess,
    pending: PendingAnswer,
}

/// Answers the request held by a `ConsentGate`
#[derive(Clone)]
pub struct ConsentResponder {
    pending: PendingAnswer,
}

impl ConsentGate {
    pub fn new(policy: MicrophoneAccess) -> Self {
        Self {
            policy,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn responder(&self) -> ConsentResponder {
        ConsentResponder {
            pending: self.pending.clone(),
        }
    }
}

impl PermissionService for ConsentGate {
    fn request(&mut self) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();

        match self.policy {
            MicrophoneAccess::Allow => {
                let _ = tx.send(true);
            }
            MicrophoneAccess::Deny => {
                let _ = tx.send(false);
            }
            MicrophoneAccess::Prompt => match self.pending.lock() {
                // Replacing an unanswered request drops its sender, which the
                // waiting side treats as a denial
                Ok(mut slot) => *slot = Some(tx),
                Err(e) => tracing::error!("Consent state poisoned: {}", e),
            },
        }

        rx
    }
}

impl ConsentResponder {
    /// Resolve the outstanding request, returning false if none was open
    pub fn answer(&self, granted: bool) -> bool {
        let sender = match self.pending.lock() {
            Ok(mut slot) => slot.take(),
            Err(e) => {
                tracing::error!("Consent state poisoned: {}", e);
                None
            }
        };

        match sender {
            Some(tx) => tx.send(granted).is_ok(),
            None => false,
        }
    }
}
