//! Installed-skill ledger.
//!
//! Records which skill folders were installed from a registry, which version
//! they hold and which versions the user chose to skip.

pub mod store;
pub mod types;

pub use store::{LEDGER_FILE_NAME, LedgerStore};
pub use types::{InstalledSkill, LedgerDocument, LedgerKey, SkippedVersion};
