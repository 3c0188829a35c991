//! Installs, updates, rolls back and removes registry skills.
//!
//! Content is always materialized in a hidden sibling directory and renamed
//! into place. When the destination already exists it is parked aside until
//! the ledger write succeeds, so a failure restores the previous files.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use crate::config::AgentConfig;
use crate::error::{IoContext, Result, SkillError};
use crate::fs::{Swap, copy_tree, hash_tree, remove_path, stage_dir, unique_temp_path};
use crate::ledger::{InstalledSkill, LedgerKey, LedgerStore};
use crate::registry::FetchedSkill;
use crate::registry::schema::validate_skill_id;
use crate::types::AgentType;

use super::checksum;
use super::locks::KeyLocks;
use super::snapshot::SnapshotStore;
use super::updates::SkillUpdate;

/// One unit of work for [`Installer::apply_all`]; the fetch may have failed.
pub type UpdateJob = (SkillUpdate, Result<FetchedSkill>);

#[derive(Debug)]
pub struct Installer {
    ledger: Arc<LedgerStore>,
    snapshots: SnapshotStore,
    locks: KeyLocks,
}

impl Installer {
    pub fn new(ledger: Arc<LedgerStore>, snapshots: SnapshotStore) -> Self {
        Self {
            ledger,
            snapshots,
            locks: KeyLocks::new(),
        }
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    pub fn has_snapshot(&self, skill_id: &str, agent: &AgentType) -> bool {
        self.snapshots.exists(&LedgerKey::new(skill_id, agent.clone()))
    }

    /// Install `fetched` for `config.agent` under `<skills root>/<id>`.
    pub fn install(
        &self,
        fetched: &FetchedSkill,
        registry_url: &str,
        config: &AgentConfig,
    ) -> Result<InstalledSkill> {
        let skill = &fetched.skill;
        let agent = &config.agent;
        let payload = verified_payload(fetched, agent)?;
        validate_skill_id(&skill.id)?;

        let dst = config.skills_root().join(&skill.id);
        let key = LedgerKey::new(skill.id.clone(), agent.clone());
        let _guard = self.locks.lock(key.clone());

        let existing = self.ledger.find(&skill.id, agent);
        let tracked_here = existing.as_ref().is_some_and(|e| e.installed_path == dst);
        if fs::symlink_metadata(&dst).is_ok() && !tracked_here {
            return Err(SkillError::Conflict(format!(
                "{} exists and was not installed by quiver",
                dst.display()
            )));
        }

        // Same registry, version and bytes: only the ledger record is refreshed.
        if let Some(existing) = existing.as_ref().filter(|_| tracked_here)
            && existing.registry_url == registry_url
            && existing.version == skill.version
            && is_unchanged(existing, &dst, agent, payload)
        {
            let entry = InstalledSkill {
                installed_at: Utc::now(),
                ..existing.clone()
            };
            self.ledger.record(entry.clone())?;
            tracing::debug!(skill = %skill.id, agent = %agent, "Install unchanged, refreshed ledger entry");
            return Ok(entry);
        }

        let swap = materialize(&dst, agent, payload)?;
        let entry = InstalledSkill {
            skill_id: skill.id.clone(),
            registry_url: registry_url.to_string(),
            version: skill.version.clone(),
            installed_path: dst.clone(),
            agent: agent.clone(),
            installed_at: Utc::now(),
            content_hash: None,
        };
        let entry = self.finish(entry, swap, None)?;
        tracing::info!(skill = %entry.skill_id, agent = %agent, version = %entry.version, "Installed skill");
        Ok(entry)
    }

    /// Remove an installed skill after checking it still matches the ledger.
    pub fn uninstall(&self, skill_id: &str, agent: &AgentType) -> Result<InstalledSkill> {
        let key = LedgerKey::new(skill_id, agent.clone());
        let _guard = self.locks.lock(key.clone());
        let entry = self
            .ledger
            .find(skill_id, agent)
            .ok_or_else(|| SkillError::NotFound(format!("Installed skill {}", key)))?;
        let path = &entry.installed_path;

        if fs::symlink_metadata(path).is_err() {
            tracing::warn!(skill = %skill_id, path = %path.display(), "Install folder already gone, dropping ledger entry");
            self.ledger.remove(skill_id, agent)?;
            self.discard_snapshot(&key);
            return Ok(entry);
        }

        let on_disk = hash_tree(path).map_err(|err| {
            SkillError::AmbiguousState(format!("Cannot verify {}: {}", path.display(), err))
        })?;
        match entry.content_hash.as_deref() {
            Some(recorded) if recorded == on_disk => {}
            Some(_) => {
                return Err(SkillError::AmbiguousState(format!(
                    "{} was modified after install; refusing to delete it",
                    path.display()
                )));
            }
            None => {
                return Err(SkillError::AmbiguousState(format!(
                    "No content hash recorded for {}",
                    path.display()
                )));
            }
        }

        let parked = unique_temp_path(path, "removed")?;
        fs::rename(path, &parked).with_path("move aside", path)?;
        if let Err(err) = self.ledger.remove(skill_id, agent) {
            if let Err(restore) = fs::rename(&parked, path) {
                tracing::error!(path = %path.display(), error = %restore, "Failed to restore skill after ledger error");
            }
            return Err(err);
        }
        if let Err(err) = remove_path(&parked) {
            tracing::warn!(path = %parked.display(), error = %err, "Failed to delete removed skill");
        }
        self.discard_snapshot(&key);

        tracing::info!(skill = %skill_id, agent = %agent, "Uninstalled skill");
        Ok(entry)
    }

    /// Replace an installed skill with newer content, keeping a snapshot of
    /// the previous files and ledger entry for [`Installer::rollback`].
    pub fn apply_update(&self, update: &SkillUpdate, fetched: &FetchedSkill) -> Result<InstalledSkill> {
        let agent = &update.agent;
        if fetched.skill.id != update.skill_id {
            return Err(SkillError::InvalidInput(format!(
                "Fetched skill {} does not match update for {}",
                fetched.skill.id, update.skill_id
            )));
        }
        let payload = verified_payload(fetched, agent)?;

        let key = LedgerKey::new(update.skill_id.clone(), agent.clone());
        let _guard = self.locks.lock(key.clone());
        let previous = self
            .ledger
            .find(&update.skill_id, agent)
            .ok_or_else(|| SkillError::NotFound(format!("Installed skill {}", key)))?;
        let dst = previous.installed_path.clone();

        let snapshot = if dst.is_dir() {
            Some(self.snapshots.stage(&key, &dst, &previous)?)
        } else {
            tracing::warn!(skill = %update.skill_id, path = %dst.display(), "Install folder missing, updating without snapshot");
            None
        };

        let swap = match materialize(&dst, agent, payload) {
            Ok(swap) => swap,
            Err(err) => {
                revert_quietly(snapshot);
                return Err(err);
            }
        };

        let entry = InstalledSkill {
            version: fetched.skill.version.clone(),
            installed_at: Utc::now(),
            content_hash: None,
            ..previous.clone()
        };
        let entry = self.finish(entry, swap, snapshot)?;
        tracing::info!(
            skill = %entry.skill_id,
            agent = %agent,
            from = %previous.version,
            to = %entry.version,
            "Updated skill"
        );
        Ok(entry)
    }

    /// Apply every job on its own scoped thread. Results keep input order and
    /// one failure never cancels another.
    pub fn apply_all(&self, jobs: Vec<UpdateJob>) -> Vec<Result<InstalledSkill>> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .into_iter()
                .map(|(update, fetched)| {
                    scope.spawn(move || {
                        fetched.and_then(|fetched| self.apply_update(&update, &fetched))
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(SkillError::io(
                            "Update worker panicked",
                            std::io::Error::other("worker panic"),
                        ))
                    })
                })
                .collect()
        })
    }

    /// Restore the content and ledger entry captured by the last update.
    pub fn rollback(&self, skill_id: &str, agent: &AgentType) -> Result<InstalledSkill> {
        let key = LedgerKey::new(skill_id, agent.clone());
        let _guard = self.locks.lock(key.clone());
        let snapshot = self.snapshots.load(&key)?.ok_or_else(|| SkillError::NoSnapshot {
            skill_id: skill_id.to_string(),
            agent: agent.clone(),
        })?;

        let dst = snapshot.entry.installed_path.clone();
        let swap = stage_dir(&dst, |tmp| copy_tree(&snapshot.content, tmp))?;
        if let Err(err) = self.ledger.record(snapshot.entry.clone()) {
            revert_quietly(Some(swap));
            return Err(err);
        }
        swap.commit();
        self.discard_snapshot(&key);

        tracing::info!(skill = %skill_id, agent = %agent, version = %snapshot.entry.version, "Rolled back skill");
        Ok(snapshot.entry)
    }

    /// Never offer `version` of `skill_id` again. Files are untouched.
    pub fn skip_version(&self, skill_id: &str, version: &str) -> Result<()> {
        self.ledger.skip_version(skill_id, version)?;
        tracing::info!(skill = %skill_id, version = %version, "Skipped version");
        Ok(())
    }

    /// Hash the swapped-in content, record the entry, then commit the swaps.
    fn finish(
        &self,
        mut entry: InstalledSkill,
        swap: Swap,
        snapshot: Option<Swap>,
    ) -> Result<InstalledSkill> {
        let recorded = hash_tree(&entry.installed_path).and_then(|hash| {
            entry.content_hash = Some(hash);
            self.ledger.record(entry.clone())
        });
        if let Err(err) = recorded {
            revert_quietly(Some(swap));
            revert_quietly(snapshot);
            return Err(err);
        }
        swap.commit();
        if let Some(snapshot) = snapshot {
            snapshot.commit();
        }
        Ok(entry)
    }

    fn discard_snapshot(&self, key: &LedgerKey) {
        if let Err(err) = self.snapshots.discard(key) {
            tracing::warn!(key = %key, error = %err, "Failed to discard snapshot");
        }
    }
}

fn verified_payload<'a>(fetched: &'a FetchedSkill, agent: &AgentType) -> Result<&'a [u8]> {
    let payload = fetched
        .payload(agent)
        .ok_or_else(|| SkillError::UnsupportedAgent {
            skill_id: fetched.skill.id.clone(),
            agent: agent.clone(),
        })?;
    if let Some(expected) = fetched.skill.checksum.as_deref().filter(|c| !c.trim().is_empty()) {
        checksum::verify(&fetched.skill.id, expected, payload)?;
    }
    Ok(payload)
}

fn materialize(dst: &Path, agent: &AgentType, payload: &[u8]) -> Result<Swap> {
    stage_dir(dst, |tmp| {
        let entry = tmp.join(agent.entry_file_name());
        fs::write(&entry, payload).with_path("write", &entry)
    })
}

/// Same entry bytes and no edits since install.
fn is_unchanged(existing: &InstalledSkill, dst: &Path, agent: &AgentType, payload: &[u8]) -> bool {
    let entry = dst.join(agent.entry_file_name());
    let same_bytes = fs::read(&entry).is_ok_and(|bytes| bytes == payload);
    same_bytes
        && hash_tree(dst)
            .ok()
            .is_some_and(|hash| existing.content_hash.as_deref() == Some(hash.as_str()))
}

fn revert_quietly(swap: Option<Swap>) {
    if let Some(swap) = swap
        && let Err(err) = swap.revert()
    {
        tracing::error!(error = %err, "Failed to restore previous content");
    }
}
