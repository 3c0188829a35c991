//! Copies of local skill content taken before it is overwritten or deleted.
//!
//! Layout: `<state>/backups/<millis>-<name>/{content, origin.json}`. Backups
//! older than the retention window are pruned when a hub opens.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IoContext, Result, SkillError};
use crate::fs::{copy_path, publish_new, remove_path, write_file_atomic};

pub const BACKUPS_DIR: &str = "backups";
pub const DEFAULT_RETENTION_DAYS: u64 = 7;
const CONTENT: &str = "content";
const ORIGIN_FILE: &str = "origin.json";

/// One backed-up file or folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    /// Directory name under the backups root
    pub id: String,
    /// Where the content lived when it was backed up
    pub original_path: PathBuf,
    pub is_folder: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BackupStore {
    root: PathBuf,
}

impl BackupStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            root: state_dir.join(BACKUPS_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy `path` (file or folder) into a new backup.
    pub fn backup(&self, path: &Path) -> Result<Backup> {
        let meta = fs::metadata(path).map_err(|_| SkillError::not_found_path(path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| SkillError::InvalidInput(format!("Nothing to back up at {}", path.display())))?;
        fs::create_dir_all(&self.root).with_path("create backups directory", &self.root)?;

        let created_at = Utc::now();
        let base = format!("{}-{}", created_at.timestamp_millis(), name);
        let mut id = base.clone();
        let mut n = 1;
        while fs::symlink_metadata(self.root.join(&id)).is_ok() {
            id = format!("{}-{}", base, n);
            n += 1;
        }

        let backup = Backup {
            id,
            original_path: path.to_path_buf(),
            is_folder: meta.is_dir(),
            created_at,
        };
        let origin = serde_json::to_vec_pretty(&backup)
            .map_err(|e| SkillError::Parse(format!("Failed to serialize backup record: {}", e)))?;
        publish_new(&self.root.join(&backup.id), |tmp| {
            fs::create_dir(tmp).with_path("create directory", tmp)?;
            copy_path(path, &tmp.join(CONTENT))?;
            write_file_atomic(&tmp.join(ORIGIN_FILE), &origin)
        })?;

        tracing::debug!(path = %path.display(), backup = %backup.id, "Backed up skill content");
        Ok(backup)
    }

    /// Every readable backup, newest first.
    pub fn list(&self) -> Result<Vec<Backup>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err).with_path("read directory", &self.root),
        };
        let mut backups: Vec<Backup> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
            .filter_map(|entry| match self.load(&entry.path()) {
                Ok(backup) => Some(backup),
                Err(err) => {
                    tracing::warn!(path = %entry.path().display(), error = %err, "Skipping unreadable backup");
                    None
                }
            })
            .collect();
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(backups)
    }

    pub fn get(&self, id: &str) -> Result<Backup> {
        let single = Path::new(id).components().count() == 1 && !id.starts_with('.');
        let dir = self.root.join(id);
        if !single || !dir.is_dir() {
            return Err(SkillError::NotFound(format!("Backup {}", id)));
        }
        self.load(&dir)
    }

    /// Backed-up bytes of `backup`.
    pub fn content_path(&self, backup: &Backup) -> PathBuf {
        self.root.join(&backup.id).join(CONTENT)
    }

    /// Delete backups created more than `retention` ago. Returns how many went.
    pub fn cleanup(&self, retention: Duration) -> Result<usize> {
        let retention = chrono::Duration::from_std(retention)
            .map_err(|e| SkillError::InvalidInput(format!("Retention out of range: {}", e)))?;
        let cutoff = Utc::now() - retention;

        let mut removed = 0;
        for backup in self.list()?.into_iter().filter(|b| b.created_at <= cutoff) {
            let dir = self.root.join(&backup.id);
            match remove_path(&dir) {
                Ok(()) => removed += 1,
                Err(err) => {
                    tracing::warn!(path = %dir.display(), error = %err, "Failed to prune backup");
                }
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Pruned old backups");
        }
        Ok(removed)
    }

    fn load(&self, dir: &Path) -> Result<Backup> {
        let origin = dir.join(ORIGIN_FILE);
        let bytes = fs::read(&origin).with_path("read", &origin)?;
        let backup: Backup = serde_json::from_slice(&bytes)
            .map_err(|e| SkillError::Parse(format!("Corrupt backup record {}: {}", origin.display(), e)))?;
        if !dir.join(CONTENT).exists() {
            return Err(SkillError::Parse(format!("Backup {} has no content", dir.display())));
        }
        Ok(backup)
    }
}
