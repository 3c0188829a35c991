//! Quiver Core Library
//!
//! Discovers AI-agent skills on disk, edits local skills, and installs,
//! updates and rolls back skills published in remote registries.

pub mod config;
pub mod context;
pub mod error;
pub mod fs;
pub mod hub;
pub mod install;
pub mod ledger;
pub mod registry;
pub mod skills;
pub mod types;
pub mod version;

pub use context::AppContext;
pub use error::{Result, SkillError};
pub use hub::SkillHub;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{AgentConfig, ConfigStore, QuiverConfig, RegistrySettings};

    // Skills
    pub use crate::skills::{Backup, ExportData, NewSkill, ScanReport, Scanner, Skill, SkillFile};

    // Ledger
    pub use crate::ledger::{InstalledSkill, LedgerStore, SkippedVersion};

    // Registry
    pub use crate::registry::{FetchedSkill, RegistryClient, RemoteSkill, SkillRegistry};

    // Updates
    pub use crate::install::{SkillUpdate, UpdateCheckResult};

    pub use crate::types::{AgentType, SkillFormat};
    pub use crate::{AppContext, SkillError, SkillHub};
}
