use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub user_email: String,
    pub imap_server: Option<String>,
    /// App password for IMAP LOGIN; prefer PURCHASE_LEDGER_PASSWORD in the
    /// environment over storing it here.
    pub password: Option<String>,
    pub db_path: Option<String>,
    /// Root directory the export folder path is resolved under.
    pub export_root: Option<String>,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default)]
    pub export: ExportSettings,
}

/// Per-run knobs for the ingestion pipeline, passed explicitly into the
/// run controller.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct IngestSettings {
    pub label: String,
    pub sender_contains: String,
    pub subject_contains: String,
    pub page_size: usize,
    /// Safety cap on emails processed per run.
    pub max_per_run: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            label: "Amazon Orders".to_string(),
            sender_contains: "auto-confirm@amazon.com".to_string(),
            subject_contains: "ordered".to_string(),
            page_size: 50,
            max_per_run: 250,
        }
    }
}

/// Per-run knobs for the PDF export pipeline.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ExportSettings {
    pub label: String,
    /// `/`-separated folder path under the export root.
    pub folder_path: String,
    pub sender_contains: String,
    pub subject_contains: String,
    pub page_size: usize,
    pub max_per_run: usize,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            label: "Amazon Orders".to_string(),
            folder_path: "Purchases/Amazon/Extracted PDFs".to_string(),
            sender_contains: "amazon.com".to_string(),
            subject_contains: "ordered".to_string(),
            page_size: 50,
            max_per_run: 100,
        }
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("purchase_ledger"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn default_db_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("purchases.db");
    Ok(p)
}

pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        // create a template config for users to edit
        let sample = Config {
            user_email: "you@example.com".to_string(),
            imap_server: Some("imap.gmail.com".to_string()),
            password: None,
            db_path: None,
            export_root: None,
            ingest: IngestSettings::default(),
            export: ExportSettings::default(),
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(&path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {} — edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}

pub fn resolve_db_path(cfg: &Config) -> Result<PathBuf> {
    if let Some(p) = &cfg.db_path {
        Ok(PathBuf::from(p))
    } else {
        default_db_path()
    }
}

pub fn resolve_export_root(cfg: &Config) -> Result<PathBuf> {
    if let Some(p) = &cfg.export_root {
        Ok(PathBuf::from(p))
    } else {
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("no home dir available"))
    }
}
