pub mod decoders;
pub mod imap_client;

use anyhow::Result;

use crate::domain::message::MailThread;

/// Handle to a mailbox label after a successful lookup.
#[derive(Debug, Clone)]
pub struct LabelRef {
    pub name: String,
}

/// Narrow mail-store capability used by the run controllers.
pub trait Mailbox {
    /// Errors when the label does not exist.
    fn find_label(&self, name: &str) -> Result<LabelRef>;

    /// One page of threads in store order, covering `[start, start + page_size)`.
    /// An empty page means the label is exhausted.
    fn list_threads(&self, label: &LabelRef, start: usize, page_size: usize)
    -> Result<Vec<MailThread>>;
}
