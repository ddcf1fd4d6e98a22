use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};

use purchase_ledger::config::{Config, load_config, resolve_db_path, resolve_export_root};
use purchase_ledger::mail::imap_client::{Credential, ImapMailbox};
use purchase_ledger::notify::notify_summary;
use purchase_ledger::pipeline::{run_export, run_ingest};
use purchase_ledger::render::WkhtmltopdfRenderer;
use purchase_ledger::render::inline::HttpFetcher;
use purchase_ledger::store::files::FsFileStore;
use purchase_ledger::store::sqlite::SqliteStore;

#[derive(Parser)]
#[command(name = "purchase_ledger")]
#[command(about = "Scan a mailbox label for order confirmations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse confirmations into the purchase ledger
    Ingest {
        /// Override the per-run message cap
        #[arg(long)]
        max: Option<usize>,
    },

    /// Render confirmations to PDFs in the export folder
    Export {
        /// Override the per-run message cap
        #[arg(long)]
        max: Option<usize>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;

    let imap_server = cfg
        .imap_server
        .clone()
        .unwrap_or_else(|| "imap.gmail.com".to_string());
    let credential = resolve_credential(&cfg)?;
    let mailbox = ImapMailbox::new(imap_server, cfg.user_email.clone(), credential);

    let db_path = resolve_db_path(&cfg)?;
    let store = SqliteStore::open(&db_path)?;

    match cli.cmd {
        Command::Ingest { max } => {
            let mut settings = cfg.ingest.clone();
            if let Some(max) = max {
                settings.max_per_run = max;
            }

            let summary = run_ingest(&mailbox, &store, &settings)?;
            let line = format!(
                "Processed and appended {} new purchases ({} messages scanned).",
                summary.emitted, summary.scanned
            );
            println!("{line}");
            notify_summary("Purchase ingest finished", &line);
        }

        Command::Export { max } => {
            let mut settings = cfg.export.clone();
            if let Some(max) = max {
                settings.max_per_run = max;
            }

            let files = FsFileStore::new(resolve_export_root(&cfg)?);
            let renderer = WkhtmltopdfRenderer::new();
            let fetcher = HttpFetcher::new()?;

            let summary = run_export(&mailbox, &files, &store, &renderer, &fetcher, &settings)?;
            let line = format!(
                "Exported {} PDFs to {} ({} messages scanned).",
                summary.emitted, settings.folder_path, summary.scanned
            );
            println!("{line}");
            notify_summary("Purchase export finished", &line);
        }
    }

    Ok(())
}

fn resolve_credential(cfg: &Config) -> Result<Credential> {
    if let Ok(token) = std::env::var("PURCHASE_LEDGER_ACCESS_TOKEN") {
        return Ok(Credential::AccessToken(token));
    }

    std::env::var("PURCHASE_LEDGER_PASSWORD")
        .ok()
        .or_else(|| cfg.password.clone())
        .map(Credential::Password)
        .ok_or_else(|| {
            anyhow!(
                "no IMAP credential: set PURCHASE_LEDGER_PASSWORD or \
                 PURCHASE_LEDGER_ACCESS_TOKEN, or put password in the config"
            )
        })
}
