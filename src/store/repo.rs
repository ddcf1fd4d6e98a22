use std::collections::HashSet;

use anyhow::Result;

use crate::domain::message::MessageId;
use crate::domain::purchase::Purchase;

/// Append-only purchase ledger. The message-id column doubles as the
/// dedup source for the ingestion pipeline.
pub trait PurchaseLedger: Send + Sync {
    fn ledger_message_ids(&self) -> Result<HashSet<MessageId>>;
    fn append_purchase(&self, purchase: &Purchase) -> Result<()>;
}

/// Durable set of message ids handled by the export pipeline.
///
/// `save_processed` fully replaces the persisted content, so concurrent
/// runs against the same log are unsafe.
pub trait ProcessedLog: Send + Sync {
    fn load_processed(&self) -> Result<HashSet<MessageId>>;
    fn save_processed(&self, ids: &HashSet<MessageId>) -> Result<()>;
}
