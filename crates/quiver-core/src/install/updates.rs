//! Update detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{InstalledSkill, LedgerDocument};
use crate::registry::SkillRegistry;
use crate::types::AgentType;
use crate::version;

/// A newer registry version available for an installed skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillUpdate {
    pub skill_id: String,
    pub skill_name: String,
    pub current_version: String,
    pub new_version: String,
    pub agent: AgentType,
    pub registry_url: String,
    pub changelog: Option<String>,
    pub is_major: bool,
}

/// A registry that could not be checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCheckError {
    pub registry_url: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCheckResult {
    pub available_updates: Vec<SkillUpdate>,
    pub last_checked: DateTime<Utc>,
    pub errors: Vec<RegistryCheckError>,
}

/// Updates offered by `registry` for ledger entries recorded against it.
///
/// Only strictly newer, non-skipped versions are offered. Entries whose
/// recorded version does not parse are skipped with a warning.
pub fn compute_updates(ledger: &LedgerDocument, registry: &SkillRegistry) -> Vec<SkillUpdate> {
    ledger
        .installed
        .iter()
        .filter(|entry| entry.registry_url == registry.url)
        .filter_map(|entry| candidate(entry, registry, ledger))
        .collect()
}

fn candidate(
    entry: &InstalledSkill,
    registry: &SkillRegistry,
    ledger: &LedgerDocument,
) -> Option<SkillUpdate> {
    let remote = registry.skill(&entry.skill_id)?;
    let newer = match version::is_newer(&entry.version, &remote.version) {
        Ok(newer) => newer,
        Err(err) => {
            tracing::warn!(
                skill = %entry.skill_id,
                installed = %entry.version,
                remote = %remote.version,
                error = %err,
                "Skipping update check for unparseable version"
            );
            return None;
        }
    };
    if !newer || ledger.is_skipped(&entry.skill_id, &remote.version) {
        return None;
    }
    let is_major = version::is_major_change(&entry.version, &remote.version).unwrap_or(false);

    Some(SkillUpdate {
        skill_id: entry.skill_id.clone(),
        skill_name: remote.name.clone(),
        current_version: entry.version.clone(),
        new_version: remote.version.clone(),
        agent: entry.agent.clone(),
        registry_url: entry.registry_url.clone(),
        changelog: remote.changelog.clone(),
        is_major,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SkippedVersion;
    use crate::registry::schema::parse_document;
    use std::path::PathBuf;

    const URL: &str = "https://example.com/registry.json";

    fn registry(version: &str) -> SkillRegistry {
        let mut registry = parse_document(&format!(
            r#"{{"version": "1", "name": "r", "skills": [
                {{"id": "demo", "name": "Demo", "version": "{}", "changelog": "notes"}}
            ]}}"#,
            version
        ))
        .expect("registry should parse");
        registry.url = URL.to_string();
        registry
    }

    fn ledger(version: &str) -> LedgerDocument {
        let mut doc = LedgerDocument::default();
        doc.upsert(InstalledSkill {
            skill_id: "demo".to_string(),
            registry_url: URL.to_string(),
            version: version.to_string(),
            installed_path: PathBuf::from("/skills/demo"),
            agent: AgentType::Claude,
            installed_at: Utc::now(),
            content_hash: None,
        });
        doc
    }

    #[test]
    fn test_minor_major_and_equal() {
        let minor = compute_updates(&ledger("1.2.0"), &registry("1.3.0"));
        assert_eq!(minor.len(), 1);
        assert!(!minor[0].is_major);
        assert_eq!(minor[0].changelog.as_deref(), Some("notes"));

        let major = compute_updates(&ledger("1.2.0"), &registry("2.0.0"));
        assert!(major[0].is_major);

        assert!(compute_updates(&ledger("1.2.0"), &registry("1.2.0")).is_empty());
        assert!(compute_updates(&ledger("1.3.0"), &registry("1.2.0")).is_empty());
    }

    #[test]
    fn test_skipped_and_foreign_entries() {
        let mut doc = ledger("1.2.0");
        doc.skipped.push(SkippedVersion {
            skill_id: "demo".to_string(),
            version: "1.3.0".to_string(),
            skipped_at: Utc::now(),
        });
        assert!(compute_updates(&doc, &registry("1.3.0")).is_empty());
        assert_eq!(compute_updates(&doc, &registry("1.4.0")).len(), 1);

        let mut other = registry("9.0.0");
        other.url = "https://elsewhere.example/registry.json".to_string();
        assert!(compute_updates(&ledger("1.0.0"), &other).is_empty());
    }

    #[test]
    fn test_unparseable_installed_version_is_skipped() {
        assert!(compute_updates(&ledger("nightly"), &registry("1.3.0")).is_empty());
    }
}
