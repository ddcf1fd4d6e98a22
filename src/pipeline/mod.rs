//! Run controllers: paginated label scan, filtering, sinks, dedup state.
//!
//! Both pipelines drive the same loop. A run walks the label in thread
//! pages, filters each message, hands qualifying ones to a sink, and
//! tracks handled ids in an in-memory set. One bad message never aborts
//! a run; only setup failures (missing label, unreadable store, empty
//! folder path) do.

use std::collections::HashSet;

use anyhow::{Result, bail};

use crate::config::{ExportSettings, IngestSettings};
use crate::domain::message::{EmailMessage, MessageId};
use crate::extract::{build_export_filename, parse_purchase};
use crate::filter::MessageFilter;
use crate::mail::{LabelRef, Mailbox};
use crate::render::inline::{Fetcher, inline_cid_images, inline_remote_images};
use crate::render::{DocumentRenderer, build_document_html};
use crate::store::files::FileStore;
use crate::store::repo::{ProcessedLog, PurchaseLedger};

/// Counters accumulated over one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Messages examined, qualifying or not.
    pub scanned: usize,
    /// Messages that made it all the way through the sink.
    pub emitted: usize,
}

/// What the sink did with one qualifying message.
enum SinkOutcome {
    /// Side effect performed: mark processed, count as emitted.
    Emitted,
    /// Nothing extractable: not marked, not counted, eligible again
    /// next run.
    Skipped,
}

/// Shared scan loop. Pagination advances in thread pages; the per-run cap
/// counts messages, so the tail of the page that hits the cap is
/// abandoned unexamined. A page shorter than `page_size` is the last one.
fn scan_label<F>(
    mailbox: &dyn Mailbox,
    label: &LabelRef,
    filter: &MessageFilter,
    processed: &mut HashSet<MessageId>,
    page_size: usize,
    max_per_run: usize,
    mut sink: F,
) -> Result<Summary>
where
    F: FnMut(&EmailMessage) -> Result<SinkOutcome>,
{
    let mut summary = Summary::default();
    let mut start = 0usize;

    'scan: while summary.emitted < max_per_run {
        log::debug!("fetching up to {page_size} threads from offset {start}");
        let threads = mailbox.list_threads(label, start, page_size)?;
        if threads.is_empty() {
            log::info!("label exhausted after {} scanned messages", summary.scanned);
            break;
        }

        for thread in &threads {
            for msg in &thread.messages {
                if summary.emitted >= max_per_run {
                    log::info!("per-run cap of {max_per_run} reached");
                    break 'scan;
                }
                summary.scanned += 1;

                if !filter.qualifies(msg, processed) {
                    continue;
                }

                match sink(msg) {
                    Ok(SinkOutcome::Emitted) => {
                        processed.insert(msg.id.clone());
                        summary.emitted += 1;
                    }
                    Ok(SinkOutcome::Skipped) => {
                        log::debug!("{}: nothing extracted, skipped", msg.id);
                    }
                    Err(e) => {
                        // Per-message isolation: log and move on. The id is
                        // not marked, so a later run retries it.
                        log::error!("{}: {e:#}", msg.id);
                    }
                }
            }
        }

        if threads.len() < page_size {
            log::debug!("short page ({} < {page_size}), scan complete", threads.len());
            break;
        }
        start += page_size;
    }

    Ok(summary)
}

/// Parse qualifying confirmations into ledger rows.
///
/// The dedup set is the ledger's own message-id column, so the appended
/// rows are the durable record and no separate save step exists.
pub fn run_ingest(
    mailbox: &dyn Mailbox,
    ledger: &dyn PurchaseLedger,
    settings: &IngestSettings,
) -> Result<Summary> {
    log::info!("ingest run over label {:?}", settings.label);
    let label = mailbox.find_label(&settings.label)?;

    let mut processed = ledger.ledger_message_ids()?;
    log::info!("{} message ids already in the ledger", processed.len());

    let filter = MessageFilter::new(&settings.sender_contains, &settings.subject_contains);

    scan_label(
        mailbox,
        &label,
        &filter,
        &mut processed,
        settings.page_size,
        settings.max_per_run,
        |msg| match parse_purchase(msg) {
            Some(purchase) => {
                ledger.append_purchase(&purchase)?;
                log::info!(
                    "{}: appended order {} ({})",
                    msg.id,
                    purchase.order_number,
                    purchase.item_title
                );
                Ok(SinkOutcome::Emitted)
            }
            None => Ok(SinkOutcome::Skipped),
        },
    )
}

/// Render qualifying confirmations to PDFs in the export folder.
///
/// The processed set is persisted exactly once at run end; a crash
/// mid-run re-exports this run's files on the next attempt.
pub fn run_export(
    mailbox: &dyn Mailbox,
    files: &dyn FileStore,
    processed_log: &dyn ProcessedLog,
    renderer: &dyn DocumentRenderer,
    fetcher: &dyn Fetcher,
    settings: &ExportSettings,
) -> Result<Summary> {
    if settings.folder_path.trim().is_empty() {
        bail!("export folder path is empty");
    }

    log::info!("export run over label {:?}", settings.label);
    let label = mailbox.find_label(&settings.label)?;
    let folder = files.resolve_folder(&settings.folder_path)?;

    let mut processed = processed_log.load_processed()?;
    log::info!("{} previously exported message ids loaded", processed.len());

    let filter = MessageFilter::new(&settings.sender_contains, &settings.subject_contains);

    let summary = scan_label(
        mailbox,
        &label,
        &filter,
        &mut processed,
        settings.page_size,
        settings.max_per_run,
        |msg| {
            let html = inline_cid_images(&msg.html_body, &msg.inline_attachments);
            let html = inline_remote_images(&html, fetcher);
            let document = build_document_html(msg, &html);

            let bytes = renderer.render_html(&document)?;
            let name = build_export_filename(msg);
            let path = files.create_file(&folder, &name, &bytes)?;
            log::info!("{}: exported {}", msg.id, path.display());
            Ok(SinkOutcome::Emitted)
        },
    )?;

    processed_log.save_processed(&processed)?;
    Ok(summary)
}
