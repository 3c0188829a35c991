//! Error taxonomy shared by every component.
//!
//! Each variant maps to one stable kind name (see [`SkillError::kind`]) that
//! front ends can show or match on without inspecting internals.

use std::path::{Path, PathBuf};

use crate::types::AgentType;

pub type Result<T, E = SkillError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    /// Missing skill, file, agent config or ledger entry
    #[error("Not found: {0}")]
    NotFound(String),

    /// Install target is occupied by content the ledger does not track
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Create/duplicate target name already taken
    #[error("Already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Checksum mismatch for {skill_id}: expected {expected}, got {actual}")]
    Checksum {
        skill_id: String,
        expected: String,
        actual: String,
    },

    #[error("Skill {skill_id} has no file variant for agent {agent}")]
    UnsupportedAgent { skill_id: String, agent: AgentType },

    /// Direct edit attempted on a registry-installed skill
    #[error("Skill is installed from a registry and cannot be edited directly: {}", .0.display())]
    ReadOnly(PathBuf),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported registry version: {0}")]
    Version(String),

    /// Uninstall refused because the on-disk content no longer matches the ledger
    #[error("Ambiguous install state: {0}")]
    AmbiguousState(String),

    #[error("No snapshot to roll back for {skill_id} ({agent})")]
    NoSnapshot { skill_id: String, agent: AgentType },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl SkillError {
    /// Stable error name surfaced to presentation layers.
    pub fn kind(&self) -> &'static str {
        match self {
            SkillError::NotFound(_) => "NotFoundError",
            SkillError::Conflict(_) => "ConflictError",
            SkillError::AlreadyExists(_) => "AlreadyExistsError",
            SkillError::Checksum { .. } => "ChecksumError",
            SkillError::UnsupportedAgent { .. } => "UnsupportedAgentError",
            SkillError::ReadOnly(_) => "ReadOnlyError",
            SkillError::Network(_) => "NetworkError",
            SkillError::Parse(_) => "ParseError",
            SkillError::Version(_) => "VersionError",
            SkillError::AmbiguousState(_) => "AmbiguousStateError",
            SkillError::NoSnapshot { .. } => "NoSnapshotError",
            SkillError::InvalidInput(_) => "InvalidInputError",
            SkillError::Io { .. } => "IoError",
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SkillError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn not_found_path(path: &Path) -> Self {
        SkillError::NotFound(path.display().to_string())
    }
}

/// Attach a path-bearing context message to `std::io::Result` values.
pub(crate) trait IoContext<T> {
    fn with_path(self, action: &str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn with_path(self, action: &str, path: &Path) -> Result<T> {
        self.map_err(|err| SkillError::io(format!("Failed to {}: {}", action, path.display()), err))
    }
}
