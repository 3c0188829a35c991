//! Application context: the directories every component is rooted at.

use std::path::{Path, PathBuf};

use crate::config::ConfigStore;
use crate::error::{Result, SkillError};
use crate::install::SnapshotStore;
use crate::ledger::LedgerStore;
use crate::skills::BackupStore;

const APP_DIR: &str = "quiver";

/// Paths shared by the front ends. Created once and handed to [`crate::SkillHub`].
#[derive(Debug, Clone)]
pub struct AppContext {
    home_dir: PathBuf,
    config_dir: PathBuf,
    state_dir: PathBuf,
}

impl AppContext {
    pub fn new(home_dir: PathBuf, config_dir: PathBuf, state_dir: PathBuf) -> Self {
        Self {
            home_dir,
            config_dir,
            state_dir,
        }
    }

    /// Context rooted at the platform directories.
    ///
    /// - config: `<config dir>/quiver`
    /// - state: `$XDG_STATE_HOME/quiver` on Unix (fallback: local data dir),
    ///   `%LOCALAPPDATA%\quiver` on Windows
    pub fn from_env() -> Result<Self> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| SkillError::NotFound("home directory".to_string()))?;
        let config_dir = dirs::config_dir()
            .map(|p| p.join(APP_DIR))
            .unwrap_or_else(|| home_dir.join(".config").join(APP_DIR));
        let state_base = if cfg!(unix) {
            dirs::state_dir().or_else(dirs::data_local_dir)
        } else {
            dirs::data_local_dir()
        };
        let state_dir = state_base
            .map(|p| p.join(APP_DIR))
            .unwrap_or_else(|| home_dir.join(".local").join("state").join(APP_DIR));
        Ok(Self::new(home_dir, config_dir, state_dir))
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::from_paths(&self.config_dir, self.home_dir.clone())
    }

    pub fn open_ledger(&self) -> Result<LedgerStore> {
        LedgerStore::open(&self.state_dir)
    }

    pub fn snapshot_store(&self) -> SnapshotStore {
        SnapshotStore::new(&self.state_dir)
    }

    pub fn backup_store(&self) -> BackupStore {
        BackupStore::new(&self.state_dir)
    }
}
