//! Qualification predicate for scanned messages.

use std::collections::HashSet;

use crate::domain::message::{EmailMessage, MessageId};

/// Sender/subject substring filter, matched case-insensitively.
///
/// Checks run cheapest/most-specific first: dedup-set membership, then
/// sender, then subject. The only side effect is debug logging of the
/// skip reason.
pub struct MessageFilter {
    sender_contains: String,
    subject_contains: String,
}

impl MessageFilter {
    pub fn new(sender_contains: &str, subject_contains: &str) -> Self {
        Self {
            sender_contains: sender_contains.to_lowercase(),
            subject_contains: subject_contains.to_lowercase(),
        }
    }

    pub fn qualifies(&self, msg: &EmailMessage, processed: &HashSet<MessageId>) -> bool {
        if processed.contains(&msg.id) {
            log::debug!("skip {}: already processed", msg.id);
            return false;
        }

        if !msg.from.to_lowercase().contains(&self.sender_contains) {
            log::debug!("skip {}: sender {:?} does not match", msg.id, msg.from);
            return false;
        }

        if !msg.subject.to_lowercase().contains(&self.subject_contains) {
            log::debug!("skip {}: subject {:?} does not match", msg.id, msg.subject);
            return false;
        }

        true
    }
}
