//! Ledger persistence in the state directory.
//!
//! The ledger is one JSON document. Every write clones the cached document,
//! applies the change, persists it with tmp + rename and only then publishes
//! it to readers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::error::{IoContext, Result, SkillError};
use crate::fs::write_file_atomic;
use crate::types::AgentType;

use super::types::{InstalledSkill, LedgerDocument, SkippedVersion};

pub const LEDGER_FILE_NAME: &str = "ledger.json";

#[derive(Debug)]
pub struct LedgerStore {
    path: PathBuf,
    doc: RwLock<LedgerDocument>,
    load_warning: Option<String>,
}

impl LedgerStore {
    /// Open (or start) the ledger under `state_dir`.
    ///
    /// A corrupt document is moved aside to `ledger.json.corrupt-<timestamp>`
    /// and replaced by an empty ledger; the problem is reported through
    /// [`LedgerStore::load_warning`] instead of failing.
    pub fn open(state_dir: &Path) -> Result<Self> {
        fs::create_dir_all(state_dir).with_path("create state directory", state_dir)?;
        let path = state_dir.join(LEDGER_FILE_NAME);
        let (doc, load_warning) = Self::load_document(&path);
        Ok(Self {
            path,
            doc: RwLock::new(doc),
            load_warning,
        })
    }

    fn load_document(path: &Path) -> (LedgerDocument, Option<String>) {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return (LedgerDocument::default(), None);
            }
            Err(err) => {
                let warning = format!(
                    "Ledger {} is unreadable ({}); starting with an empty ledger",
                    path.display(),
                    err
                );
                tracing::warn!("{}", warning);
                return (LedgerDocument::default(), Some(warning));
            }
        };

        let parsed = serde_json::from_slice::<LedgerDocument>(&bytes)
            .map_err(|e| SkillError::Parse(e.to_string()))
            .and_then(|doc| doc.validate().map(|_| doc));
        match parsed {
            Ok(doc) => (doc, None),
            Err(err) => {
                let aside = path.with_file_name(format!(
                    "{}.corrupt-{}",
                    LEDGER_FILE_NAME,
                    Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
                ));
                let moved = match fs::rename(path, &aside) {
                    Ok(()) => format!("moved to {}", aside.display()),
                    Err(rename_err) => format!("could not move it aside: {}", rename_err),
                };
                let warning = format!(
                    "Ledger {} is corrupt ({}); {}; starting with an empty ledger",
                    path.display(),
                    err,
                    moved
                );
                tracing::warn!("{}", warning);
                (LedgerDocument::default(), Some(warning))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Problem found while opening the ledger, if any.
    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerDocument> {
        self.doc.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerDocument> {
        self.doc.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `change` to a copy of the document, persist it, then publish.
    fn modify<R>(&self, change: impl FnOnce(&mut LedgerDocument) -> R) -> Result<R> {
        let mut guard = self.write();
        let mut next = guard.clone();
        let out = change(&mut next);
        if next != *guard {
            let bytes = serde_json::to_vec_pretty(&next)
                .map_err(|e| SkillError::Parse(format!("Failed to serialize ledger: {}", e)))?;
            write_file_atomic(&self.path, &bytes)?;
            *guard = next;
        }
        Ok(out)
    }

    pub fn snapshot(&self) -> LedgerDocument {
        self.read().clone()
    }

    pub fn all(&self) -> Vec<InstalledSkill> {
        self.read().installed.clone()
    }

    pub fn find(&self, skill_id: &str, agent: &AgentType) -> Option<InstalledSkill> {
        self.read().find(skill_id, agent).cloned()
    }

    /// Entry whose install folder contains `path`.
    pub fn find_by_path(&self, path: &Path) -> Option<InstalledSkill> {
        self.read().installed.iter().find(|e| e.covers(path)).cloned()
    }

    /// Insert or replace the entry for `(skill_id, agent)`.
    pub fn record(&self, entry: InstalledSkill) -> Result<()> {
        tracing::debug!(skill = %entry.skill_id, agent = %entry.agent, version = %entry.version, "Recording install");
        self.modify(|doc| doc.upsert(entry))
    }

    /// Remove an entry. Returns the removed record; absent keys are a no-op.
    pub fn remove(&self, skill_id: &str, agent: &AgentType) -> Result<Option<InstalledSkill>> {
        self.modify(|doc| doc.remove(skill_id, agent))
    }

    /// Remember that `version` of `skill_id` should not be offered. Idempotent.
    pub fn skip_version(&self, skill_id: &str, version: &str) -> Result<()> {
        self.modify(|doc| {
            if !doc.is_skipped(skill_id, version) {
                doc.skipped.push(SkippedVersion {
                    skill_id: skill_id.to_string(),
                    version: version.to_string(),
                    skipped_at: Utc::now(),
                });
            }
        })
    }

    pub fn skipped_versions(&self) -> Vec<SkippedVersion> {
        self.read().skipped.clone()
    }

    pub fn is_skipped(&self, skill_id: &str, version: &str) -> bool {
        self.read().is_skipped(skill_id, version)
    }
}
