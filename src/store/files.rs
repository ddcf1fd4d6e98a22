use std::fs;
use std::path::PathBuf;

use anyhow::{Result, anyhow};

/// A resolved folder, ready to receive files.
#[derive(Debug, Clone)]
pub struct FolderRef {
    pub path: PathBuf,
}

/// Narrow file-store capability: resolve a `/`-separated folder path
/// (creating missing segments) and create named files inside it.
pub trait FileStore: Send + Sync {
    fn resolve_folder(&self, path: &str) -> Result<FolderRef>;
    fn create_file(&self, folder: &FolderRef, name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Filesystem-backed store rooted at a configured directory.
pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileStore for FsFileStore {
    fn resolve_folder(&self, path: &str) -> Result<FolderRef> {
        let segments: Vec<&str> = path
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return Err(anyhow!("export folder path is empty"));
        }

        let mut folder = self.root.clone();
        for segment in segments {
            folder.push(segment);
        }
        fs::create_dir_all(&folder)?;
        Ok(FolderRef { path: folder })
    }

    fn create_file(&self, folder: &FolderRef, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = folder.path.join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}
