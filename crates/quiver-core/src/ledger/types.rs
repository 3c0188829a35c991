//! Ledger document types.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillError};
use crate::types::AgentType;

/// Current on-disk format version.
pub const LEDGER_VERSION: u32 = 1;

/// Identity of an install: one entry per `(skill_id, agent)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerKey {
    pub skill_id: String,
    pub agent: AgentType,
}

impl LedgerKey {
    pub fn new(skill_id: impl Into<String>, agent: AgentType) -> Self {
        Self {
            skill_id: skill_id.into(),
            agent,
        }
    }
}

impl std::fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.skill_id, self.agent)
    }
}

/// A skill installed from a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledSkill {
    pub skill_id: String,
    pub registry_url: String,
    pub version: String,
    pub installed_path: PathBuf,
    pub agent: AgentType,
    pub installed_at: DateTime<Utc>,

    /// blake3 tree hash of `installed_path` right after install
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl InstalledSkill {
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(self.skill_id.clone(), self.agent.clone())
    }

    /// Whether `path` is the install folder or anything inside it.
    pub fn covers(&self, path: &Path) -> bool {
        path.starts_with(&self.installed_path)
    }
}

/// A version the user asked not to be offered again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedVersion {
    pub skill_id: String,
    pub version: String,
    pub skipped_at: DateTime<Utc>,
}

/// Root of `ledger.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDocument {
    pub version: u32,

    #[serde(default)]
    pub installed: Vec<InstalledSkill>,

    #[serde(default)]
    pub skipped: Vec<SkippedVersion>,
}

impl Default for LedgerDocument {
    fn default() -> Self {
        Self {
            version: LEDGER_VERSION,
            installed: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl LedgerDocument {
    pub fn find(&self, skill_id: &str, agent: &AgentType) -> Option<&InstalledSkill> {
        self.installed
            .iter()
            .find(|e| e.skill_id == skill_id && &e.agent == agent)
    }

    /// Insert or replace the entry for the record's key.
    pub fn upsert(&mut self, entry: InstalledSkill) {
        match self
            .installed
            .iter_mut()
            .find(|e| e.skill_id == entry.skill_id && e.agent == entry.agent)
        {
            Some(existing) => *existing = entry,
            None => self.installed.push(entry),
        }
    }

    pub fn remove(&mut self, skill_id: &str, agent: &AgentType) -> Option<InstalledSkill> {
        let idx = self
            .installed
            .iter()
            .position(|e| e.skill_id == skill_id && &e.agent == agent)?;
        Some(self.installed.remove(idx))
    }

    pub fn is_skipped(&self, skill_id: &str, version: &str) -> bool {
        self.skipped
            .iter()
            .any(|s| s.skill_id == skill_id && s.version == version)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != LEDGER_VERSION {
            return Err(SkillError::Version(format!(
                "Unsupported ledger version: {}",
                self.version
            )));
        }
        let mut keys = std::collections::HashSet::new();
        for entry in &self.installed {
            if !keys.insert((entry.skill_id.as_str(), &entry.agent)) {
                return Err(SkillError::Parse(format!(
                    "Duplicate ledger entry for {} ({})",
                    entry.skill_id, entry.agent
                )));
            }
        }
        Ok(())
    }
}
