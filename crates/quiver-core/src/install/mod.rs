//! Installing, updating and rolling back registry skills.

pub mod checksum;
pub mod installer;
pub mod locks;
pub mod snapshot;
pub mod updates;

pub use installer::{Installer, UpdateJob};
pub use locks::{KeyGuard, KeyLocks};
pub use snapshot::{Snapshot, SnapshotStore};
pub use updates::{RegistryCheckError, SkillUpdate, UpdateCheckResult, compute_updates};
