use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::audience::RecipientId;

use super::MessageSink;

/// Default number of messages kept per recipient
const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct OutboxEntry {
    pub text: String,
    pub delivered_at: DateTime<Utc>,
}

/// In-memory sink keeping the latest messages per recipient.
///
/// Used by the HTTP surface so previews and broadcasts can be inspected.
pub struct Outbox {
    capacity: usize,
    messages: DashMap<RecipientId, VecDeque<OutboxEntry>>,
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Outbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            messages: DashMap::new(),
        }
    }

    /// Messages for `recipient`, oldest first
    pub fn messages(&self, recipient: RecipientId) -> Vec<OutboxEntry> {
        self.messages
            .get(&recipient)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self, recipient: RecipientId) {
        self.messages.remove(&recipient);
    }
}

impl MessageSink for Outbox {
    fn deliver(&self, recipients: &[RecipientId], text: &str) -> usize {
        let delivered_at = Utc::now();
        for recipient in recipients {
            let mut queue = self.messages.entry(*recipient).or_default();
            if queue.len() == self.capacity {
                queue.pop_front();
            }
            queue.push_back(OutboxEntry {
                text: text.to_string(),
                delivered_at,
            });
        }
        recipients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_latest_messages() {
        let outbox = Outbox::new(2);
        let ids = [RecipientId(1), RecipientId(2)];

        assert_eq!(outbox.deliver(&ids, "one"), 2);
        outbox.deliver(&ids[..1], "two");
        outbox.deliver(&ids[..1], "three");

        let texts: Vec<String> = outbox
            .messages(RecipientId(1))
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["two", "three"]);
        assert_eq!(outbox.messages(RecipientId(2)).len(), 1);

        outbox.clear(RecipientId(2));
        assert!(outbox.messages(RecipientId(2)).is_empty());
    }
}
