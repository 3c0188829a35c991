//! Command surface shared by every front end.
//!
//! `SkillHub` owns the agent configuration, the ledger, the registry
//! snapshots and the cached skill view. Local verbs are synchronous; verbs
//! that reach a registry are `async` and hand their disk work to
//! `spawn_blocking`.
//!
//! The view is rebuilt in full by [`SkillHub::scan_skills`]. Every other
//! mutating verb rescans only the skill it touched.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;

use crate::config::{AgentConfig, ConfigStore, QuiverConfig};
use crate::context::AppContext;
use crate::error::{Result, SkillError};
use crate::install::{
    Installer, RegistryCheckError, SkillUpdate, UpdateCheckResult, UpdateJob, compute_updates,
};
use crate::ledger::{InstalledSkill, LedgerStore};
use crate::registry::{RegistryClient, SkillRegistry};
use crate::skills::backup::DEFAULT_RETENTION_DAYS;
use crate::skills::{
    Backup, BackupStore, ExportData, NewSkill, ScanFailure, Scanner, Skill, SkillEditor, SkillFile,
};
use crate::types::AgentType;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn sort_view(skills: &mut [Skill]) {
    skills.sort_by(|a, b| a.agent.cmp(&b.agent).then(a.folder_path.cmp(&b.folder_path)));
}

#[derive(Debug)]
pub struct SkillHub {
    config_store: ConfigStore,
    config: RwLock<QuiverConfig>,
    ledger: Arc<LedgerStore>,
    backups: BackupStore,
    installer: Arc<Installer>,
    client: RegistryClient,
    view: RwLock<Option<Vec<Skill>>>,
    failures: RwLock<Vec<ScanFailure>>,
    registries: RwLock<HashMap<String, SkillRegistry>>,
}

impl SkillHub {
    /// Load configuration and open the ledger for `ctx`.
    pub fn open(ctx: &AppContext) -> Result<Self> {
        let config_store = ctx.config_store();
        let config = config_store.load()?;
        let ledger = Arc::new(ctx.open_ledger()?);
        let installer = Arc::new(Installer::new(Arc::clone(&ledger), ctx.snapshot_store()));
        let client = RegistryClient::from_settings(&config.registry)?;
        let backups = ctx.backup_store();
        let retention = Duration::from_secs(DEFAULT_RETENTION_DAYS * 24 * 60 * 60);
        if let Err(err) = backups.cleanup(retention) {
            tracing::warn!(error = %err, "Failed to prune old backups");
        }

        tracing::debug!(
            config = %config_store.config_path().display(),
            state = %ctx.state_dir().display(),
            agents = config.agents.len(),
            "Opened skill hub"
        );
        Ok(Self {
            config_store,
            config: RwLock::new(config),
            ledger,
            backups,
            installer,
            client,
            view: RwLock::new(None),
            failures: RwLock::new(Vec::new()),
            registries: RwLock::new(HashMap::new()),
        })
    }

    /// Non-fatal problems: a recovered ledger and skills the last scan skipped.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings: Vec<String> = self.ledger.load_warning().map(str::to_string).into_iter().collect();
        warnings.extend(
            read(&self.failures)
                .iter()
                .map(|f| format!("{}: skipped {} ({})", f.agent, f.path.display(), f.reason)),
        );
        warnings
    }

    fn agents(&self) -> Vec<AgentConfig> {
        read(&self.config).agents.clone()
    }

    fn agent_config(&self, agent: &AgentType) -> Result<AgentConfig> {
        read(&self.config)
            .agent(agent)
            .cloned()
            .ok_or_else(|| SkillError::NotFound(format!("Agent config for {}", agent)))
    }

    fn annotate(&self, mut skill: Skill) -> Skill {
        if let Some(entry) = self.ledger.find_by_path(&skill.folder_path) {
            skill.is_local = false;
            skill.version = Some(entry.version);
        }
        skill
    }

    // ---- view ------------------------------------------------------------

    /// Full rescan of every enabled agent. Replaces the cached view.
    pub fn scan_skills(&self) -> Vec<Skill> {
        let report = Scanner::scan(&self.agents());
        let mut skills: Vec<Skill> = report.skills.into_iter().map(|s| self.annotate(s)).collect();
        sort_view(&mut skills);
        *write(&self.failures) = report.failures;
        *write(&self.view) = Some(skills.clone());
        skills
    }

    pub fn get_all_skills(&self) -> Vec<Skill> {
        if let Some(skills) = read(&self.view).as_ref() {
            return skills.clone();
        }
        self.scan_skills()
    }

    pub fn get_skills_by_agent(&self, agent: &AgentType) -> Vec<Skill> {
        self.get_all_skills()
            .into_iter()
            .filter(|s| &s.agent == agent)
            .collect()
    }

    pub fn get_skill_by_id(&self, id: &str) -> Result<Skill> {
        self.get_all_skills()
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| SkillError::NotFound(format!("Skill {}", id)))
    }

    /// Insert or replace `skill` in the cached view (no-op before the first scan).
    fn upsert_view(&self, skill: &Skill) {
        let enabled = read(&self.config)
            .agent(&skill.agent)
            .is_some_and(|c| c.enabled);
        let mut view = write(&self.view);
        let Some(skills) = view.as_mut() else {
            return;
        };
        skills.retain(|s| s.id != skill.id);
        if enabled {
            skills.push(skill.clone());
            sort_view(skills);
        }
    }

    fn remove_from_view(&self, path: &Path) {
        if let Some(skills) = write(&self.view).as_mut() {
            skills.retain(|s| s.folder_path != path);
        }
    }

    /// Bring the view in line with whatever is now at `path`.
    fn refresh_path(&self, path: &Path, agent: &AgentType) {
        let scanned = if path.is_dir() {
            Scanner::scan_folder(path, agent)
        } else if path.is_file() {
            Scanner::scan_file(path, agent)
        } else {
            self.remove_from_view(path);
            return;
        };
        match scanned {
            Ok(skill) => {
                let skill = self.annotate(skill);
                self.upsert_view(&skill);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to rescan skill");
                self.remove_from_view(path);
            }
        }
    }

    // ---- local skills ----------------------------------------------------

    fn with_editor<T>(&self, op: impl FnOnce(&SkillEditor<'_>) -> Result<T>) -> Result<T> {
        let agents = self.agents();
        let editor = SkillEditor::new(&agents, &self.ledger, &self.backups);
        op(&editor)
    }

    pub fn get_skill_files(&self, path: &Path) -> Result<Vec<SkillFile>> {
        self.with_editor(|editor| editor.list_files(path))
    }

    pub fn read_skill_content(&self, file_path: &Path) -> Result<String> {
        self.with_editor(|editor| editor.read_content(file_path))
    }

    pub fn create_skill(&self, agent: &AgentType, new: NewSkill) -> Result<Skill> {
        let skill = self.with_editor(|editor| editor.create(agent, new))?;
        let skill = self.annotate(skill);
        self.upsert_view(&skill);
        Ok(skill)
    }

    pub fn update_skill(&self, file_path: &Path, content: &str) -> Result<Skill> {
        let skill = self.with_editor(|editor| editor.update(file_path, content))?;
        self.upsert_view(&skill);
        Ok(skill)
    }

    /// Delete a local skill, returning the backup that can restore it.
    pub fn delete_skill(&self, path: &Path) -> Result<Backup> {
        let backup = self.with_editor(|editor| editor.delete(path))?;
        self.remove_from_view(path);
        Ok(backup)
    }

    pub fn rename_skill(&self, path: &Path, new_name: &str) -> Result<Skill> {
        let skill = self.with_editor(|editor| editor.rename(path, new_name))?;
        self.remove_from_view(path);
        self.upsert_view(&skill);
        Ok(skill)
    }

    pub fn export_skill(&self, file_path: &Path) -> Result<ExportData> {
        self.with_editor(|editor| editor.export(file_path))
    }

    /// Backups of local edits and deletes, newest first.
    pub fn list_backups(&self) -> Result<Vec<Backup>> {
        self.backups.list()
    }

    pub fn restore_backup(&self, backup_id: &str) -> Result<Skill> {
        let skill = self.with_editor(|editor| editor.restore(backup_id))?;
        let skill = self.annotate(skill);
        self.upsert_view(&skill);
        Ok(skill)
    }

    pub fn duplicate_skill(&self, path: &Path, new_name: &str) -> Result<Skill> {
        let skill = self.with_editor(|editor| editor.duplicate(path, new_name))?;
        self.upsert_view(&skill);
        Ok(skill)
    }

    pub fn create_skill_file(
        &self,
        folder: &Path,
        file_name: &str,
        content: Option<&str>,
    ) -> Result<Skill> {
        let skill = self.with_editor(|editor| editor.create_file(folder, file_name, content))?;
        self.upsert_view(&skill);
        Ok(skill)
    }

    pub fn delete_skill_file(&self, file_path: &Path) -> Result<Skill> {
        let skill = self.with_editor(|editor| editor.delete_file(file_path))?;
        self.upsert_view(&skill);
        Ok(skill)
    }

    // ---- configuration ---------------------------------------------------

    pub fn get_agent_configs(&self) -> Vec<AgentConfig> {
        self.agents()
    }

    pub fn registry_urls(&self) -> Vec<String> {
        read(&self.config).registry.urls.clone()
    }

    /// Persist `config` (insert or replace by agent) and rescan that agent.
    pub fn update_agent_config(&self, config: AgentConfig) -> Result<()> {
        let mut next = read(&self.config).clone();
        next.upsert_agent(config.clone());
        self.config_store.save(&next)?;
        *write(&self.config) = next;
        tracing::info!(agent = %config.agent, enabled = config.enabled, "Updated agent config");

        let report = Scanner::scan(std::slice::from_ref(&config));
        let fresh: Vec<Skill> = report.skills.into_iter().map(|s| self.annotate(s)).collect();
        {
            let mut failures = write(&self.failures);
            failures.retain(|f| f.agent != config.agent);
            failures.extend(report.failures);
        }
        if let Some(skills) = write(&self.view).as_mut() {
            skills.retain(|s| s.agent != config.agent);
            skills.extend(fresh);
            sort_view(skills);
        }
        Ok(())
    }

    // ---- registries ------------------------------------------------------

    /// Fetch `url` and replace the stored snapshot for it.
    pub async fn fetch_registry(&self, url: &str) -> Result<SkillRegistry> {
        let registry = self.client.fetch(url).await?;
        write(&self.registries).insert(registry.url.clone(), registry.clone());
        Ok(registry)
    }

    /// Last snapshot for `url`, fetching it when there is none yet.
    async fn registry(&self, url: &str) -> Result<SkillRegistry> {
        let cached = read(&self.registries).get(url.trim()).cloned();
        match cached {
            Some(registry) => Ok(registry),
            None => self.fetch_registry(url).await,
        }
    }

    pub async fn install_remote_skill(
        &self,
        registry_url: &str,
        skill_id: &str,
        agent: &AgentType,
    ) -> Result<InstalledSkill> {
        let registry = self.registry(registry_url).await?;
        let skill = registry
            .skill(skill_id)
            .ok_or_else(|| SkillError::NotFound(format!("Skill {} in {}", skill_id, registry.url)))?;
        let config = self.agent_config(agent)?;
        let fetched = self
            .client
            .fetch_skill(&registry.url, skill, std::slice::from_ref(agent))
            .await?;

        let installer = Arc::clone(&self.installer);
        let url = registry.url.clone();
        let entry = blocking(move || installer.install(&fetched, &url, &config)).await?;
        self.refresh_path(&entry.installed_path, agent);
        Ok(entry)
    }

    pub fn uninstall_remote_skill(&self, skill_id: &str, agent: &AgentType) -> Result<InstalledSkill> {
        let entry = self.installer.uninstall(skill_id, agent)?;
        self.remove_from_view(&entry.installed_path);
        Ok(entry)
    }

    pub fn get_installed_skills(&self) -> Vec<InstalledSkill> {
        self.ledger.all()
    }

    /// Fetch `registry_url` and list updates for skills installed from it.
    pub async fn check_skill_updates(&self, registry_url: &str) -> Result<Vec<SkillUpdate>> {
        let registry = self.fetch_registry(registry_url).await?;
        Ok(compute_updates(&self.ledger.snapshot(), &registry))
    }

    /// Check every registry referenced by the ledger. A registry that fails
    /// is reported in `errors` without hiding updates from the others.
    pub async fn check_for_updates(&self) -> UpdateCheckResult {
        let urls: BTreeSet<String> = self
            .ledger
            .all()
            .into_iter()
            .map(|e| e.registry_url)
            .collect();

        let mut available_updates = Vec::new();
        let mut errors = Vec::new();
        for url in urls {
            match self.check_skill_updates(&url).await {
                Ok(updates) => available_updates.extend(updates),
                Err(err) => {
                    tracing::warn!(registry = %url, error = %err, "Update check failed");
                    errors.push(RegistryCheckError {
                        registry_url: url,
                        kind: err.kind().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(updates = available_updates.len(), errors = errors.len(), "Checked for updates");
        UpdateCheckResult {
            available_updates,
            last_checked: Utc::now(),
            errors,
        }
    }

    async fn update_job(&self, update: SkillUpdate) -> UpdateJob {
        let fetched = async {
            let registry = self.registry(&update.registry_url).await?;
            let skill = registry.skill(&update.skill_id).ok_or_else(|| {
                SkillError::NotFound(format!("Skill {} in {}", update.skill_id, registry.url))
            })?;
            self.client
                .fetch_skill(&registry.url, skill, std::slice::from_ref(&update.agent))
                .await
        }
        .await;
        (update, fetched)
    }

    pub async fn apply_skill_update(&self, update: &SkillUpdate) -> Result<InstalledSkill> {
        let (update, fetched) = self.update_job(update.clone()).await;
        let fetched = fetched?;
        let installer = Arc::clone(&self.installer);
        let entry = blocking(move || installer.apply_update(&update, &fetched)).await?;
        self.refresh_path(&entry.installed_path, &entry.agent);
        Ok(entry)
    }

    /// Apply every update independently. Results keep input order.
    pub async fn apply_all_skill_updates(
        &self,
        updates: Vec<SkillUpdate>,
    ) -> Vec<Result<InstalledSkill>> {
        let count = updates.len();
        let jobs = join_all(updates.into_iter().map(|update| self.update_job(update))).await;

        let installer = Arc::clone(&self.installer);
        let results = match tokio::task::spawn_blocking(move || installer.apply_all(jobs)).await {
            Ok(results) => results,
            Err(err) => {
                tracing::error!(error = %err, "Update batch worker failed");
                (0..count).map(|_| Err(join_failure(&err))).collect()
            }
        };
        for entry in results.iter().flatten() {
            self.refresh_path(&entry.installed_path, &entry.agent);
        }
        results
    }

    pub fn skip_skill_version(&self, skill_id: &str, version: &str) -> Result<()> {
        self.installer.skip_version(skill_id, version)
    }

    pub fn rollback_skill(&self, skill_id: &str, agent: &AgentType) -> Result<InstalledSkill> {
        let entry = self.installer.rollback(skill_id, agent)?;
        self.refresh_path(&entry.installed_path, agent);
        Ok(entry)
    }
}

/// Run installer work off the async worker threads.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| join_failure(&err))?
}

fn join_failure(err: &tokio::task::JoinError) -> SkillError {
    SkillError::io("Installer worker failed", std::io::Error::other(err.to_string()))
}
