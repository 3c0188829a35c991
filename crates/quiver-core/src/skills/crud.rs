//! Editing of local skills.
//!
//! Every path handed in must resolve inside a configured agent's roots.
//! Skills tracked by the ledger are read-only here: they change only through
//! install, update, rollback and uninstall. Content is copied to the
//! [`BackupStore`] before it is overwritten or deleted.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::config::AgentConfig;
use crate::error::{IoContext, Result, SkillError};
use crate::fs::{copy_path, publish_new, remove_path, write_file_atomic};
use crate::ledger::LedgerStore;
use crate::types::{AgentType, SkillFormat};

use super::backup::{Backup, BackupStore};
use super::frontmatter::{self, Frontmatter};
use super::scanner::Scanner;
use super::{Skill, SkillFile, normalize_tags, slugify, templates};

const MIN_NAME_CHARS: usize = 2;
const DEFAULT_EXTENSION: &str = "md";
/// Largest text accepted by create and update.
pub const MAX_CONTENT_BYTES: usize = 1_000_000;

/// Input for [`SkillEditor::create`].
#[derive(Debug, Clone, Default)]
pub struct NewSkill {
    pub name: String,
    /// Entry file body; empty selects a starter template
    pub content: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

/// A skill file packaged for saving elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportData {
    pub file_name: String,
    pub content: String,
}

/// Which skill a path belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Owner {
    Folder(PathBuf),
    File(PathBuf),
}

impl Owner {
    fn root(&self) -> &Path {
        match self {
            Owner::Folder(path) | Owner::File(path) => path,
        }
    }
}

#[derive(Debug)]
struct Located<'a> {
    config: &'a AgentConfig,
    owner: Owner,
}

pub struct SkillEditor<'a> {
    agents: &'a [AgentConfig],
    ledger: &'a LedgerStore,
    backups: &'a BackupStore,
}

impl<'a> SkillEditor<'a> {
    pub fn new(agents: &'a [AgentConfig], ledger: &'a LedgerStore, backups: &'a BackupStore) -> Self {
        Self {
            agents,
            ledger,
            backups,
        }
    }

    /// Create a folder skill with a single entry file.
    pub fn create(&self, agent: &AgentType, new: NewSkill) -> Result<Skill> {
        let config = self
            .agents
            .iter()
            .find(|c| &c.agent == agent)
            .ok_or_else(|| SkillError::NotFound(format!("Agent config for {}", agent)))?;
        let name = validate_name(&new.name)?;
        validate_content(&new.content)?;
        let folder = config.skills_root().join(slug_for(name)?);

        let entry_name = agent.entry_file_name();
        let body = if new.content.trim().is_empty() {
            templates::entry_template(agent, name)
        } else {
            new.content.clone()
        };
        let content = if SkillFormat::from_path(Path::new(entry_name)) == SkillFormat::Markdown {
            with_frontmatter(&body, name, new.description.as_deref(), &new.tags)
        } else {
            body
        };

        fs::create_dir_all(config.skills_root()).with_path("create skills directory", config.skills_root())?;
        publish_new(&folder, |tmp| {
            fs::create_dir(tmp).with_path("create directory", tmp)?;
            let entry = tmp.join(entry_name);
            fs::write(&entry, content.as_bytes()).with_path("write", &entry)
        })?;

        tracing::info!(agent = %agent, path = %folder.display(), "Created skill");
        Scanner::scan_folder(&folder, agent)
    }

    /// Overwrite a file of a local skill and return the rescanned skill.
    pub fn update(&self, file_path: &Path, content: &str) -> Result<Skill> {
        let located = self.locate(file_path)?;
        if !file_path.is_file() {
            return Err(SkillError::not_found_path(file_path));
        }
        self.ensure_writable(&located)?;
        validate_content(content)?;

        self.backups.backup(file_path)?;
        write_file_atomic(file_path, content.as_bytes())?;
        tracing::debug!(path = %file_path.display(), "Updated skill file");
        self.rescan(&located)
    }

    /// Delete a whole local skill (folder or single file). The returned
    /// backup can bring it back through [`SkillEditor::restore`].
    pub fn delete(&self, path: &Path) -> Result<Backup> {
        let located = self.locate(path)?;
        require_root(&located, path)?;
        self.ensure_writable(&located)?;

        let backup = self.backups.backup(path)?;
        remove_path(path).with_path("delete", path)?;
        tracing::info!(path = %path.display(), backup = %backup.id, "Deleted skill");
        Ok(backup)
    }

    /// Move a skill to a new slugged name in the same directory.
    ///
    /// Only the folder or file is renamed; a `name` in the entry's
    /// frontmatter keeps precedence for display.
    pub fn rename(&self, path: &Path, new_name: &str) -> Result<Skill> {
        let located = self.locate(path)?;
        require_root(&located, path)?;
        self.ensure_writable(&located)?;
        let dst = sibling_target(&located, path, validate_name(new_name)?)?;
        if dst == path {
            return self.rescan(&located);
        }
        if fs::symlink_metadata(&dst).is_ok() {
            return Err(SkillError::AlreadyExists(dst));
        }

        fs::rename(path, &dst).with_path("rename", path)?;
        tracing::info!(from = %path.display(), to = %dst.display(), "Renamed skill");
        let agent = &located.config.agent;
        match located.owner {
            Owner::Folder(_) => Scanner::scan_folder(&dst, agent),
            Owner::File(_) => Scanner::scan_file(&dst, agent),
        }
    }

    /// A file's name and text, for saving outside the agent's tree.
    pub fn export(&self, file_path: &Path) -> Result<ExportData> {
        let content = self.read_content(file_path)?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| SkillError::not_found_path(file_path))?;
        Ok(ExportData { file_name, content })
    }

    /// Put backed-up content back where it came from.
    ///
    /// A missing target is recreated. An existing file is overwritten after
    /// being backed up itself; an existing folder is never replaced.
    pub fn restore(&self, backup_id: &str) -> Result<Skill> {
        let backup = self.backups.get(backup_id)?;
        let target = backup.original_path.as_path();
        let content = self.backups.content_path(&backup);

        if fs::symlink_metadata(target).is_ok() {
            let located = self.locate(target)?;
            self.ensure_writable(&located)?;
            if backup.is_folder || !target.is_file() {
                return Err(SkillError::AlreadyExists(target.to_path_buf()));
            }
            let bytes = fs::read(&content).with_path("read", &content)?;
            self.backups.backup(target)?;
            write_file_atomic(target, &bytes)?;
            tracing::info!(path = %target.display(), backup = %backup.id, "Restored skill file");
            return self.rescan(&located);
        }

        let escapes = target.components().any(|c| matches!(c, Component::ParentDir));
        if escapes || !target.is_absolute() || !self.agents.iter().any(|c| c.owns(target)) {
            return Err(SkillError::not_found_path(target));
        }
        if let Some(entry) = self.ledger.find_by_path(target) {
            return Err(SkillError::ReadOnly(entry.installed_path));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).with_path("create directory", parent)?;
        }
        publish_new(target, |tmp| copy_path(&content, tmp))?;
        tracing::info!(path = %target.display(), backup = %backup.id, "Restored skill");

        let located = self.locate(target)?;
        self.rescan(&located)
    }

    /// Copy a skill under a new name next to the original.
    ///
    /// Installed skills may be duplicated; the copy is a local skill.
    pub fn duplicate(&self, path: &Path, new_name: &str) -> Result<Skill> {
        let located = self.locate(path)?;
        require_root(&located, path)?;
        let dst = sibling_target(&located, path, validate_name(new_name)?)?;

        publish_new(&dst, |tmp| copy_path(path, tmp))?;
        tracing::info!(from = %path.display(), to = %dst.display(), "Duplicated skill");

        let agent = &located.config.agent;
        match located.owner {
            Owner::Folder(_) => Scanner::scan_folder(&dst, agent),
            Owner::File(_) => Scanner::scan_file(&dst, agent),
        }
    }

    /// Add a file to a folder skill. Names without an extension get `.md`.
    pub fn create_file(&self, folder: &Path, file_name: &str, content: Option<&str>) -> Result<Skill> {
        let located = self.locate(folder)?;
        if !matches!(located.owner, Owner::Folder(_)) || !folder.is_dir() {
            return Err(SkillError::InvalidInput(format!(
                "Not a skill folder: {}",
                folder.display()
            )));
        }
        self.ensure_writable(&located)?;

        let file_name = validate_file_name(file_name)?;
        if let Some(content) = content {
            validate_content(content)?;
        }
        let path = folder.join(&file_name);
        let body = match content {
            Some(content) => content.to_string(),
            None => {
                let stem = Path::new(&file_name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                templates::file_template(SkillFormat::from_path(&path), &stem)
            }
        };

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::AlreadyExists => SkillError::AlreadyExists(path.clone()),
                _ => SkillError::io(format!("Failed to create {}", path.display()), err),
            })?;
        if let Err(err) = file.write_all(body.as_bytes()) {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(SkillError::io(format!("Failed to write {}", path.display()), err));
        }

        tracing::debug!(path = %path.display(), "Created skill file");
        self.rescan(&located)
    }

    /// Remove one file from a folder skill.
    pub fn delete_file(&self, file_path: &Path) -> Result<Skill> {
        let located = self.locate(file_path)?;
        let Owner::Folder(root) = &located.owner else {
            return Err(SkillError::InvalidInput(format!(
                "{} is a single-file skill; delete the skill instead",
                file_path.display()
            )));
        };
        if file_path == root.as_path() || !file_path.is_file() {
            return Err(SkillError::not_found_path(file_path));
        }
        self.ensure_writable(&located)?;

        self.backups.backup(file_path)?;
        fs::remove_file(file_path).with_path("delete", file_path)?;
        tracing::debug!(path = %file_path.display(), "Deleted skill file");
        self.rescan(&located)
    }

    /// Every file of a skill, at any depth.
    pub fn list_files(&self, path: &Path) -> Result<Vec<SkillFile>> {
        self.locate(path)?;
        Scanner::list_files(path)
    }

    pub fn read_content(&self, file_path: &Path) -> Result<String> {
        self.locate(file_path)?;
        fs::read_to_string(file_path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => SkillError::not_found_path(file_path),
            std::io::ErrorKind::InvalidData => {
                SkillError::Parse(format!("Not a text file: {}", file_path.display()))
            }
            _ => SkillError::io(format!("Failed to read {}", file_path.display()), err),
        })
    }

    fn rescan(&self, located: &Located<'_>) -> Result<Skill> {
        let agent = &located.config.agent;
        match &located.owner {
            Owner::Folder(root) => Scanner::scan_folder(root, agent),
            Owner::File(file) => Scanner::scan_file(file, agent),
        }
    }

    fn ensure_writable(&self, located: &Located<'_>) -> Result<()> {
        let root = located.owner.root();
        if self.ledger.find_by_path(root).is_some() {
            return Err(SkillError::ReadOnly(root.to_path_buf()));
        }
        Ok(())
    }

    /// Resolve `path` to its agent and owning skill, using the same
    /// classification as a scan. Anything a scan would not report is
    /// `NotFound`, so agent settings next to the skills stay untouched.
    fn locate(&self, path: &Path) -> Result<Located<'a>> {
        if !path.is_absolute() {
            return Err(SkillError::InvalidInput(format!(
                "Path must be absolute: {}",
                path.display()
            )));
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(SkillError::not_found_path(path));
        }

        let config = self
            .agents
            .iter()
            .filter(|c| c.owns(path))
            .max_by_key(|c| c.skills_root().components().count())
            .ok_or_else(|| SkillError::not_found_path(path))?;

        let root = config.skills_root();
        if let Ok(rel) = path.strip_prefix(root)
            && let Some(Component::Normal(first)) = rel.components().next()
        {
            let top = root.join(first);
            if Scanner::is_folder_skill(config, &top) {
                return Ok(Located {
                    config,
                    owner: Owner::Folder(top),
                });
            }
        }

        if Scanner::is_single_file_skill(config, path) {
            return Ok(Located {
                config,
                owner: Owner::File(path.to_path_buf()),
            });
        }
        Err(SkillError::not_found_path(path))
    }
}

fn require_root(located: &Located<'_>, path: &Path) -> Result<()> {
    if located.owner.root() != path {
        return Err(SkillError::InvalidInput(format!(
            "{} is inside a skill, not a skill root",
            path.display()
        )));
    }
    Ok(())
}

/// Where a copy or rename of the located skill called `name` goes.
fn sibling_target(located: &Located<'_>, path: &Path, name: &str) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| SkillError::InvalidInput(format!("Path has no parent: {}", path.display())))?;
    let slug = slug_for(name)?;
    Ok(match &located.owner {
        Owner::Folder(_) => parent.join(slug),
        Owner::File(file) => match file.extension() {
            Some(ext) => parent.join(format!("{}.{}", slug, ext.to_string_lossy())),
            None => parent.join(slug),
        },
    })
}

fn validate_content(content: &str) -> Result<()> {
    if content.len() > MAX_CONTENT_BYTES {
        return Err(SkillError::InvalidInput(format!(
            "Content is {} bytes; the limit is {}",
            content.len(),
            MAX_CONTENT_BYTES
        )));
    }
    if content.contains('\0') {
        return Err(SkillError::InvalidInput("Binary content (NUL bytes) is not allowed".to_string()));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.chars().count() < MIN_NAME_CHARS {
        return Err(SkillError::InvalidInput(format!(
            "Skill name must be at least {} characters",
            MIN_NAME_CHARS
        )));
    }
    Ok(name)
}

fn slug_for(name: &str) -> Result<String> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(SkillError::InvalidInput(format!(
            "Skill name '{}' has no usable characters",
            name
        )));
    }
    Ok(slug)
}

fn validate_file_name(file_name: &str) -> Result<String> {
    let name = file_name.trim();
    if name.is_empty()
        || name.contains(['/', '\\'])
        || name == "."
        || name == ".."
        || name.starts_with('.')
    {
        return Err(SkillError::InvalidInput(format!(
            "Invalid file name: '{}'",
            file_name
        )));
    }
    if Path::new(name).extension().is_none() {
        return Ok(format!("{}.{}", name, DEFAULT_EXTENSION));
    }
    Ok(name.to_string())
}

/// Merge `name`, `description` and `tags` into any frontmatter `body` already has.
fn with_frontmatter(body: &str, name: &str, description: Option<&str>, tags: &[String]) -> String {
    let (existing, rest) = frontmatter::parse(body);
    let mut meta = existing.unwrap_or_else(Frontmatter::default);
    meta.name = Some(name.to_string());
    if let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) {
        meta.description = Some(description.to_string());
    }
    if !tags.is_empty() {
        meta.tags = normalize_tags(tags.iter().cloned());
    }
    frontmatter::render(&meta, rest.trim_start_matches(['\r', '\n']))
}
