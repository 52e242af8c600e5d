//! Typing indicator emulation.
//!
//! The channel has no native typing API, so the cue is a reaction added to
//! the message being answered and removed when the reply cycle goes idle.
//! Start and stop failures are routed to the observer and never reach the
//! delivery path.

use tracing::debug;

use crate::{dispatch::DispatchObserver, send::ReplySender};

/// Correlates an added reaction with its later removal. Exists only
/// strictly between a successful start and its matching stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingIndicatorState {
    pub message_id: String,
    pub reaction_id: String,
}

/// Owned per reply cycle by its dispatcher; never shared across cycles.
#[derive(Debug)]
pub struct TypingIndicator {
    reply_to: Option<String>,
    state: Option<TypingIndicatorState>,
}

impl TypingIndicator {
    #[must_use]
    pub fn new(reply_to: Option<String>) -> Self {
        Self {
            reply_to,
            state: None,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    /// Add the reaction. No-op when no reply-target message is known or a
    /// cue is already showing. Failure goes to the observer only.
    pub async fn start(&mut self, sender: &dyn ReplySender, observer: &dyn DispatchObserver) {
        if self.state.is_some() {
            return;
        }
        let Some(message_id) = self.reply_to.clone() else {
            return;
        };
        match sender.add_reaction(&message_id).await {
            Ok(state) => {
                debug!(message_id, "typing indicator reaction added");
                self.state = Some(state);
            },
            Err(error) => observer.on_typing_start_error(&error),
        }
    }

    /// Remove the reaction. The tracked state is cleared unconditionally,
    /// even when the removal call fails, so stop is idempotent.
    pub async fn stop(&mut self, sender: &dyn ReplySender, observer: &dyn DispatchObserver) {
        let Some(state) = self.state.take() else {
            return;
        };
        match sender.remove_reaction(&state).await {
            Ok(()) => debug!(message_id = state.message_id, "typing indicator reaction removed"),
            Err(error) => observer.on_typing_stop_error(&error),
        }
    }
}
