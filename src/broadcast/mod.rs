//! Broadcasting localized messages.
//!
//! A broadcast selects its audience from a [`RecipientSource`], groups the
//! recipients by resolved language, renders once per group and hands each
//! rendered text to a [`MessageSink`] together with the group's recipients.
//!
//! [`RecipientSource`]: crate::audience::RecipientSource

mod dispatcher;
mod outbox;

pub use dispatcher::{BroadcastResult, BroadcastStats, BroadcastStatsSnapshot, Broadcaster};
pub use outbox::{Outbox, OutboxEntry};

use crate::audience::RecipientId;

/// Host boundary for actual delivery (chat, HUD, sign text)
pub trait MessageSink: Send + Sync {
    /// Deliver `text` to every recipient; returns how many received it
    fn deliver(&self, recipients: &[RecipientId], text: &str) -> usize;
}

impl<F> MessageSink for F
where
    F: Fn(&[RecipientId], &str) -> usize + Send + Sync,
{
    fn deliver(&self, recipients: &[RecipientId], text: &str) -> usize {
        self(recipients, text)
    }
}
