//! Filesystem scanner: turns agent skill trees into `Skill` records.
//!
//! A scan is a pure read. It never writes, never consults the ledger and
//! always returns a complete snapshot, so two scans of an unchanged tree are
//! equal.
//!
//! # Layout rules
//! - Folder skills are the non-hidden immediate subdirectories of the agent's
//!   skills root (`skills_dir`, else `config_dir`). When the root falls back
//!   to `config_dir`, only subdirectories holding a file that matches one of
//!   the agent's `file_patterns` count.
//! - Files are collected to depth 2: a folder's own files plus the files of
//!   its immediate subdirectories. Hidden entries are skipped.
//! - Single-file skills are files under `config_dir` matching
//!   `file_patterns`, outside the skills root and outside folder skills.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::AgentConfig;
use crate::error::{IoContext, Result, SkillError};
use crate::types::{AgentType, SkillFormat};

use super::frontmatter;
use super::{Skill, SkillFile, normalize_tags, skill_id};

/// Maximum folder depth collected per skill (the folder itself is depth 1).
pub const MAX_DEPTH: usize = 2;

/// Conventional entry names checked after the agent's own entry name.
const ENTRY_CANDIDATES: [&str; 4] = ["SKILL.md", "skill.md", "index.md", "README.md"];

const MATCH_OPTIONS: glob::MatchOptions = glob::MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// A skill folder or file that could not be read.
#[derive(Debug, Clone, Serialize)]
pub struct ScanFailure {
    pub agent: AgentType,
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub skills: Vec<Skill>,
    pub failures: Vec<ScanFailure>,
}

impl ScanReport {
    fn fail(&mut self, agent: &AgentType, path: &Path, reason: impl ToString) {
        let reason = reason.to_string();
        tracing::warn!(agent = %agent, path = %path.display(), %reason, "Skipping unreadable skill");
        self.failures.push(ScanFailure {
            agent: agent.clone(),
            path: path.to_path_buf(),
            reason,
        });
    }
}

pub struct Scanner;

impl Scanner {
    /// Scan every enabled agent.
    pub fn scan(configs: &[AgentConfig]) -> ScanReport {
        let mut report = ScanReport::default();
        for config in configs.iter().filter(|c| c.enabled) {
            Self::scan_agent(config, &mut report);
        }
        tracing::debug!(
            skills = report.skills.len(),
            failures = report.failures.len(),
            "Scan complete"
        );
        report
    }

    fn scan_agent(config: &AgentConfig, report: &mut ScanReport) {
        let root = config.skills_root();
        let fallback = config.skills_dir.is_none();
        let mut folders = Vec::new();

        match sorted_entries(root) {
            Ok(entries) => {
                for path in entries {
                    if is_hidden(&path) {
                        continue;
                    }
                    match fs::metadata(&path) {
                        Ok(meta) if meta.is_dir() => {
                            if fallback && !folder_matches_patterns(&path, &config.file_patterns) {
                                continue;
                            }
                            match Self::scan_folder(&path, &config.agent) {
                                Ok(skill) => {
                                    folders.push(path);
                                    report.skills.push(skill);
                                }
                                Err(err) => report.fail(&config.agent, &path, err),
                            }
                        }
                        Ok(_) => {}
                        Err(err) => report.fail(&config.agent, &path, err),
                    }
                }
            }
            Err(SkillError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(agent = %config.agent, root = %root.display(), "Skills root missing");
            }
            Err(err) => report.fail(&config.agent, root, err),
        }

        for path in single_file_candidates(config, report) {
            let inside_root = !fallback && path.starts_with(root);
            let inside_folder = folders.iter().any(|f| path.starts_with(f));
            if inside_root || inside_folder {
                continue;
            }
            match Self::scan_file(&path, &config.agent) {
                Ok(skill) => report.skills.push(skill),
                Err(err) => report.fail(&config.agent, &path, err),
            }
        }
    }

    /// Whether a scan of `config` would report `folder` as a folder skill.
    pub fn is_folder_skill(config: &AgentConfig, folder: &Path) -> bool {
        let root = config.skills_root();
        if folder.parent() != Some(root) || is_hidden(folder) || !folder.is_dir() {
            return false;
        }
        config.skills_dir.is_some() || folder_matches_patterns(folder, &config.file_patterns)
    }

    /// Whether a scan of `config` would report `path` as a single-file skill,
    /// ignoring files that sit inside a folder skill.
    pub fn is_single_file_skill(config: &AgentConfig, path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        if config.skills_dir.is_some() && path.starts_with(config.skills_root()) {
            return false;
        }
        let Some(rel) = path
            .strip_prefix(&config.config_dir)
            .ok()
            .and_then(|rel| rel.to_str())
            .map(|rel| rel.replace('\\', "/"))
        else {
            return false;
        };
        config
            .file_patterns
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .any(|p| p.matches_with(&rel, MATCH_OPTIONS))
    }

    /// Build a `Skill` from a folder.
    pub fn scan_folder(folder: &Path, agent: &AgentType) -> Result<Skill> {
        let folder_name = folder
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| SkillError::InvalidInput(format!("Not a folder: {}", folder.display())))?;

        let mut collected = Vec::new();
        collect_files(folder, folder, 1, MAX_DEPTH, &mut collected)?;

        let entry_idx = pick_entry(&collected, agent, &folder_name);
        if let Some(idx) = entry_idx {
            collected[idx].1.is_entry = true;
        }
        collected.sort_by(|(a_rel, a), (b_rel, b)| b.is_entry.cmp(&a.is_entry).then(a_rel.cmp(b_rel)));

        let files: Vec<SkillFile> = collected.into_iter().map(|(_, file)| file).collect();
        let entry_file = files.iter().find(|f| f.is_entry).map(|f| f.file_path.clone());
        let meta = fs::metadata(folder).with_path("stat", folder)?;

        let mut skill = Skill {
            id: skill_id(agent, folder),
            name: folder_name,
            description: None,
            folder_path: folder.to_path_buf(),
            agent: agent.clone(),
            file_count: files.len(),
            files,
            entry_file,
            tags: Vec::new(),
            version: None,
            author: None,
            is_local: true,
            is_folder: true,
            created_at: created_at(&meta),
            updated_at: modified_at(&meta),
        };
        apply_entry_metadata(&mut skill);
        Ok(skill)
    }

    /// Build a single-file `Skill`.
    pub fn scan_file(path: &Path, agent: &AgentType) -> Result<Skill> {
        let meta = fs::metadata(path).with_path("stat", path)?;
        if !meta.is_file() {
            return Err(SkillError::InvalidInput(format!(
                "Not a file: {}",
                path.display()
            )));
        }
        let name = path
            .file_stem()
            .map(|n| n.to_string_lossy().trim_start_matches('.').to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        let file = SkillFile::from_path(path, meta.len(), true);

        let mut skill = Skill {
            id: skill_id(agent, path),
            name,
            description: None,
            folder_path: path.to_path_buf(),
            agent: agent.clone(),
            files: vec![file],
            entry_file: Some(path.to_path_buf()),
            tags: Vec::new(),
            version: None,
            author: None,
            is_local: true,
            is_folder: false,
            file_count: 1,
            created_at: created_at(&meta),
            updated_at: modified_at(&meta),
        };
        apply_entry_metadata(&mut skill);
        Ok(skill)
    }

    /// Recursive file listing of a skill folder (or the file itself).
    ///
    /// Unlike a scan this is unbounded in depth; it backs file browsers
    /// that need every file, including deeply nested assets.
    pub fn list_files(path: &Path) -> Result<Vec<SkillFile>> {
        let meta = fs::metadata(path).map_err(|_| SkillError::not_found_path(path))?;
        if meta.is_file() {
            return Ok(vec![SkillFile::from_path(path, meta.len(), true)]);
        }
        let mut collected = Vec::new();
        collect_files(path, path, 1, usize::MAX, &mut collected)?;
        collected.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(collected.into_iter().map(|(_, file)| file).collect())
    }
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .with_path("read directory", dir)?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(err) => {
                tracing::warn!(dir = %dir.display(), error = %err, "Skipping unreadable entry");
                None
            }
        })
        .collect::<Vec<_>>();
    entries.sort();
    Ok(entries)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Collect `(relative_path, file)` pairs. Only the top-level read error is
/// fatal; nested failures are logged and skipped.
fn collect_files(
    root: &Path,
    dir: &Path,
    depth: usize,
    max_depth: usize,
    out: &mut Vec<(String, SkillFile)>,
) -> Result<()> {
    for path in sorted_entries(dir)? {
        if is_hidden(&path) {
            continue;
        }
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable file");
                continue;
            }
        };
        if meta.is_dir() {
            if depth < max_depth {
                if let Err(err) = collect_files(root, &path, depth + 1, max_depth, out) {
                    tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable directory");
                }
            }
        } else if meta.is_file() {
            let rel = path
                .strip_prefix(root)
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_else(|_| path.to_string_lossy().to_string());
            out.push((rel, SkillFile::from_path(&path, meta.len(), false)));
        }
    }
    Ok(())
}

/// Entry precedence: agent entry name, conventional names, `<folder>.md`,
/// then the sole top-level Markdown file.
fn pick_entry(files: &[(String, SkillFile)], agent: &AgentType, folder_name: &str) -> Option<usize> {
    let folder_md = format!("{}.md", folder_name);
    let candidates = std::iter::once(agent.entry_file_name())
        .chain(ENTRY_CANDIDATES)
        .chain(std::iter::once(folder_md.as_str()));

    let top_level = |rel: &str| !rel.contains('/');

    for candidate in candidates {
        if let Some(idx) = files
            .iter()
            .position(|(rel, _)| top_level(rel) && rel == candidate)
        {
            return Some(idx);
        }
    }

    let mut markdown = files
        .iter()
        .enumerate()
        .filter(|(_, (rel, f))| top_level(rel) && f.format == SkillFormat::Markdown);
    match (markdown.next(), markdown.next()) {
        (Some((idx, _)), None) => Some(idx),
        _ => None,
    }
}

fn apply_entry_metadata(skill: &mut Skill) {
    let Some(entry) = skill.entry().cloned() else {
        return;
    };
    if !matches!(entry.format, SkillFormat::Markdown | SkillFormat::PlainText) {
        return;
    }
    let content = match fs::read_to_string(&entry.file_path) {
        Ok(content) => content,
        Err(err) => {
            tracing::debug!(path = %entry.file_path.display(), error = %err, "Entry not readable as text");
            return;
        }
    };

    let (meta, body) = if entry.format == SkillFormat::Markdown {
        frontmatter::parse(&content)
    } else {
        (None, content.as_str())
    };

    if let Some(meta) = meta {
        if let Some(name) = meta.name {
            skill.name = name;
        }
        skill.description = meta.description;
        skill.tags = normalize_tags(meta.tags);
        skill.version = meta.version;
        skill.author = meta.author;
    }
    if skill.description.is_none() {
        skill.description = frontmatter::first_paragraph(body);
    }
}

fn folder_matches_patterns(folder: &Path, patterns: &[String]) -> bool {
    let matchers: Vec<glob::Pattern> = patterns
        .iter()
        .filter_map(|p| p.rsplit('/').next())
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();
    if matchers.is_empty() {
        return false;
    }
    let Ok(entries) = sorted_entries(folder) else {
        return false;
    };
    entries.iter().any(|path| {
        path.is_file()
            && path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .is_some_and(|name| matchers.iter().any(|m| m.matches(&name)))
    })
}

fn single_file_candidates(config: &AgentConfig, report: &mut ScanReport) -> BTreeSet<PathBuf> {
    let mut found = BTreeSet::new();
    if !config.config_dir.is_dir() {
        return found;
    }
    let Some(base) = config.config_dir.to_str() else {
        report.fail(&config.agent, &config.config_dir, "config_dir is not valid UTF-8");
        return found;
    };
    for pattern in &config.file_patterns {
        let full = format!("{}/{}", glob::Pattern::escape(base), pattern);
        let paths = match glob::glob_with(&full, MATCH_OPTIONS) {
            Ok(paths) => paths,
            Err(err) => {
                report.fail(&config.agent, &config.config_dir, format!("Bad pattern {}: {}", pattern, err));
                continue;
            }
        };
        for path in paths {
            match path {
                Ok(path) if path.is_file() => {
                    found.insert(path);
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(agent = %config.agent, error = %err, "Skipping unreadable pattern match");
                }
            }
        }
    }
    found
}

fn modified_at(meta: &fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH))
}

fn created_at(meta: &fs::Metadata) -> DateTime<Utc> {
    meta.created()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| modified_at(meta))
}
