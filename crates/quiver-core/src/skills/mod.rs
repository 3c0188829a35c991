//! Skill model, filesystem scanner and local skill editing.

pub mod backup;
pub mod crud;
pub mod frontmatter;
pub mod scanner;
pub mod templates;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentType, SkillFormat};

pub use backup::{Backup, BackupStore};
pub use crud::{ExportData, NewSkill, SkillEditor};
pub use scanner::{ScanFailure, ScanReport, Scanner};

/// One file inside a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillFile {
    pub name: String,
    /// Absolute path, unique across a scan
    pub file_path: PathBuf,
    pub format: SkillFormat,
    pub is_entry: bool,
    pub size: u64,
}

impl SkillFile {
    pub(crate) fn from_path(path: &Path, size: u64, is_entry: bool) -> Self {
        Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            file_path: path.to_path_buf(),
            format: SkillFormat::from_path(path),
            is_entry,
            size,
        }
    }
}

/// A skill folder (or bare file) as observed on disk at the last scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    /// Stable id derived from agent + path
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub folder_path: PathBuf,
    pub agent: AgentType,
    pub files: Vec<SkillFile>,
    pub entry_file: Option<PathBuf>,
    /// Sorted, deduplicated
    pub tags: Vec<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    /// False when the skill is tracked by the ledger
    pub is_local: bool,
    pub is_folder: bool,
    pub file_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Skill {
    pub fn entry(&self) -> Option<&SkillFile> {
        self.files.iter().find(|f| f.is_entry)
    }

    pub fn contains(&self, path: &Path) -> bool {
        path == self.folder_path || (self.is_folder && path.starts_with(&self.folder_path))
    }
}

/// Stable skill id: the first 16 hex chars of `blake3(agent || 0x00 || path)`.
pub fn skill_id(agent: &AgentType, path: &Path) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(agent.key().as_bytes());
    hasher.update(&[0x00]);
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.finalize().to_hex()[..16].to_string()
}

/// Sort + dedup tags so they compare as sets.
pub(crate) fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Folder name for a user-supplied skill name: lowercase, spaces to `-`,
/// anything outside `[a-z0-9._-]` dropped.
pub fn slugify(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    slug.trim_matches('.').to_string()
}
