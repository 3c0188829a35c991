//! Shared fixtures: an isolated home/config/state layout and on-disk registries.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use quiver_core::{AppContext, SkillHub};
use tempfile::TempDir;

pub struct TestEnv {
    pub tmp: TempDir,
    pub ctx: AppContext,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir should succeed");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).expect("create home should succeed");
        let ctx = AppContext::new(home, tmp.path().join("config"), tmp.path().join("state"));
        Self { tmp, ctx }
    }

    pub fn hub(&self) -> SkillHub {
        SkillHub::open(&self.ctx).expect("hub should open")
    }

    /// `~/.claude/skills` inside the sandbox.
    pub fn claude_root(&self) -> PathBuf {
        self.ctx.home_dir().join(".claude").join("skills")
    }

    /// Write a folder skill under the Claude skills root.
    pub fn write_skill(&self, folder: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = self.claude_root().join(folder);
        for (name, content) in files {
            let path = dir.join(name);
            fs::create_dir_all(path.parent().expect("file has parent")).expect("create_dir_all should succeed");
            fs::write(&path, content).expect("write should succeed");
        }
        dir
    }

    pub fn registry_dir(&self) -> PathBuf {
        self.tmp.path().join("registry")
    }
}

/// One skill published by a [`write_registry`] document.
pub struct Published<'a> {
    pub id: &'a str,
    pub version: &'a str,
    pub body: &'a str,
    pub checksum: Option<String>,
}

impl<'a> Published<'a> {
    pub fn new(id: &'a str, version: &'a str, body: &'a str) -> Self {
        Self {
            id,
            version,
            body,
            checksum: None,
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }
}

/// Write `registry.json` plus one Claude file per skill into `dir` and return
/// the path string to fetch it by. Rewriting the same `dir` publishes a new
/// revision at the same URL.
pub fn write_registry(dir: &Path, skills: &[Published<'_>]) -> String {
    fs::create_dir_all(dir.join("files")).expect("create_dir_all should succeed");
    let entries: Vec<serde_json::Value> = skills
        .iter()
        .map(|skill| {
            let file = format!("files/{}-{}.md", skill.id, skill.version);
            fs::write(dir.join(&file), skill.body).expect("write should succeed");
            let mut entry = serde_json::json!({
                "id": skill.id,
                "name": skill.id.to_uppercase(),
                "version": skill.version,
                "agents": ["claude"],
                "files": { "claude": file },
                "changelog": format!("Release {}", skill.version),
            });
            if let Some(checksum) = &skill.checksum {
                entry["checksum"] = serde_json::json!(checksum);
            }
            entry
        })
        .collect();

    let doc = serde_json::json!({
        "version": "1.0",
        "name": "Fixture Registry",
        "skills": entries,
    });
    let path = dir.join("registry.json");
    fs::write(&path, serde_json::to_vec_pretty(&doc).expect("serialize registry"))
        .expect("write should succeed");
    path.to_string_lossy().to_string()
}
