//! Single-level rollback snapshots.
//!
//! Layout: `<state>/snapshots/<key digest>/{content/, entry.json}`. Saving a
//! snapshot for a key replaces the previous one.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IoContext, Result, SkillError};
use crate::fs::{Swap, copy_path, remove_path, stage_dir, write_file_atomic};
use crate::ledger::{InstalledSkill, LedgerKey};

pub const SNAPSHOTS_DIR: &str = "snapshots";
const CONTENT_DIR: &str = "content";
const ENTRY_FILE: &str = "entry.json";

/// Content and ledger entry captured before an update.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub content: PathBuf,
    pub entry: InstalledSkill,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            root: state_dir.join(SNAPSHOTS_DIR),
        }
    }

    fn dir_for(&self, key: &LedgerKey) -> PathBuf {
        let mut hasher = blake3::Hasher::new();
        hasher.update(key.skill_id.as_bytes());
        hasher.update(&[0x00]);
        hasher.update(key.agent.key().as_bytes());
        self.root.join(&hasher.finalize().to_hex()[..32])
    }

    /// Capture `content` and `entry`. The returned swap must be committed
    /// once the update succeeds, or reverted to bring back the older snapshot.
    pub fn stage(&self, key: &LedgerKey, content: &Path, entry: &InstalledSkill) -> Result<Swap> {
        let bytes = serde_json::to_vec_pretty(entry)
            .map_err(|e| SkillError::Parse(format!("Failed to serialize snapshot entry: {}", e)))?;
        stage_dir(&self.dir_for(key), |tmp| {
            copy_path(content, &tmp.join(CONTENT_DIR))?;
            write_file_atomic(&tmp.join(ENTRY_FILE), &bytes)
        })
    }

    pub fn load(&self, key: &LedgerKey) -> Result<Option<Snapshot>> {
        let dir = self.dir_for(key);
        let entry_path = dir.join(ENTRY_FILE);
        let bytes = match fs::read(&entry_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SkillError::io(format!("Failed to read {}", entry_path.display()), err)),
        };
        let entry: InstalledSkill = serde_json::from_slice(&bytes).map_err(|e| {
            SkillError::Parse(format!("Corrupt snapshot {}: {}", entry_path.display(), e))
        })?;
        let content = dir.join(CONTENT_DIR);
        if !content.exists() {
            return Err(SkillError::Parse(format!(
                "Snapshot {} has no content",
                dir.display()
            )));
        }
        Ok(Some(Snapshot { content, entry }))
    }

    pub fn exists(&self, key: &LedgerKey) -> bool {
        self.dir_for(key).join(ENTRY_FILE).is_file()
    }

    /// Drop the snapshot for `key`, if any.
    pub fn discard(&self, key: &LedgerKey) -> Result<()> {
        let dir = self.dir_for(key);
        match remove_path(&dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_path("remove snapshot", &dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgentType;
    use chrono::Utc;
    use tempfile::TempDir;

    fn entry(path: &Path, version: &str) -> InstalledSkill {
        InstalledSkill {
            skill_id: "demo".to_string(),
            registry_url: "https://example.com/registry.json".to_string(),
            version: version.to_string(),
            installed_path: path.to_path_buf(),
            agent: AgentType::Claude,
            installed_at: Utc::now(),
            content_hash: None,
        }
    }

    #[test]
    fn test_stage_load_discard() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = SnapshotStore::new(&tmp.path().join("state"));
        let key = LedgerKey::new("demo", AgentType::Claude);
        let content = tmp.path().join("demo");
        fs::create_dir_all(&content).expect("create_dir_all should succeed");
        fs::write(content.join("SKILL.md"), "v1").expect("write should succeed");

        assert!(store.load(&key).expect("load").is_none());
        store.stage(&key, &content, &entry(&content, "1.0.0")).expect("stage").commit();

        let snapshot = store.load(&key).expect("load").expect("snapshot");
        assert_eq!(snapshot.entry.version, "1.0.0");
        assert_eq!(
            fs::read_to_string(snapshot.content.join("SKILL.md")).expect("read should succeed"),
            "v1"
        );

        store.discard(&key).expect("discard");
        store.discard(&key).expect("discard twice");
        assert!(!store.exists(&key));
    }

    #[test]
    fn test_reverted_stage_keeps_older_snapshot() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let store = SnapshotStore::new(&tmp.path().join("state"));
        let key = LedgerKey::new("demo", AgentType::Claude);
        let content = tmp.path().join("demo");
        fs::create_dir_all(&content).expect("create_dir_all should succeed");

        store.stage(&key, &content, &entry(&content, "1.0.0")).expect("stage").commit();
        store
            .stage(&key, &content, &entry(&content, "1.1.0"))
            .expect("stage")
            .revert()
            .expect("revert");

        let snapshot = store.load(&key).expect("load").expect("snapshot");
        assert_eq!(snapshot.entry.version, "1.0.0");
    }
}
