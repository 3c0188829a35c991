//! Agent and registry configuration.
//!
//! Configuration lives in `config.toml` under the user's config directory and
//! is the only user-editable input besides the skill trees themselves.

pub mod paths;
pub mod store;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillError};
use crate::types::AgentType;

pub use store::ConfigStore;

/// Default registry fetch timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Per-agent scan configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent: AgentType,

    /// Display name
    pub name: String,

    /// Agent's configuration root (e.g. `~/.claude`)
    pub config_dir: PathBuf,

    /// Dedicated skills directory, when it differs from `config_dir`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_dir: Option<PathBuf>,

    /// Glob patterns relative to `config_dir` that identify single-file skills
    #[serde(default)]
    pub file_patterns: Vec<String>,

    /// Disabled agents are excluded from scans entirely
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl AgentConfig {
    /// Directory skill folders are listed from and installed into.
    pub fn skills_root(&self) -> &Path {
        self.skills_dir.as_deref().unwrap_or(&self.config_dir)
    }

    /// Whether `path` lives under one of this agent's roots.
    pub fn owns(&self, path: &Path) -> bool {
        path.starts_with(self.skills_root()) || path.starts_with(&self.config_dir)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SkillError::InvalidInput(format!(
                "Agent {} needs a display name",
                self.agent
            )));
        }
        if !self.config_dir.is_absolute() {
            return Err(SkillError::InvalidInput(format!(
                "config_dir for {} must be absolute: {}",
                self.agent,
                self.config_dir.display()
            )));
        }
        if let Some(skills_dir) = &self.skills_dir
            && !skills_dir.is_absolute()
        {
            return Err(SkillError::InvalidInput(format!(
                "skills_dir for {} must be absolute: {}",
                self.agent,
                skills_dir.display()
            )));
        }
        for pattern in &self.file_patterns {
            glob::Pattern::new(pattern).map_err(|e| {
                SkillError::InvalidInput(format!("Invalid file pattern '{}': {}", pattern, e))
            })?;
        }
        Ok(())
    }

    /// Built-in agent defaults rooted at `home`.
    pub fn defaults(home: &Path) -> Vec<Self> {
        vec![
            AgentConfig {
                agent: AgentType::Claude,
                name: "Claude Code".to_string(),
                config_dir: home.join(".claude"),
                skills_dir: Some(home.join(".claude").join("skills")),
                file_patterns: vec![
                    "*.md".to_string(),
                    "CLAUDE.md".to_string(),
                    "rules/*.md".to_string(),
                ],
                enabled: true,
            },
            AgentConfig {
                agent: AgentType::Cursor,
                name: "Cursor".to_string(),
                config_dir: home.join(".cursor"),
                skills_dir: Some(home.join(".cursor").join("skills")),
                file_patterns: vec![".cursorrules".to_string(), "*.cursorrules".to_string()],
                enabled: true,
            },
            AgentConfig {
                agent: AgentType::ContinueDev,
                name: "Continue.dev".to_string(),
                config_dir: home.join(".continue"),
                skills_dir: Some(home.join(".continue").join("skills")),
                file_patterns: vec!["config.json".to_string(), "profiles/*.json".to_string()],
                enabled: false,
            },
            AgentConfig {
                agent: AgentType::Aider,
                name: "Aider".to_string(),
                config_dir: home.join(".aider"),
                skills_dir: Some(home.join(".aider").join("skills")),
                file_patterns: vec![".aider.conf.yml".to_string(), "*.txt".to_string()],
                enabled: false,
            },
            AgentConfig {
                agent: AgentType::Windsurf,
                name: "Windsurf/Codeium".to_string(),
                config_dir: home.join(".codeium"),
                skills_dir: Some(home.join(".codeium").join("skills")),
                file_patterns: vec!["*.yaml".to_string(), "*.json".to_string()],
                enabled: false,
            },
        ]
    }
}

/// Registry client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Registries offered to the user for browsing
    #[serde(default)]
    pub urls: Vec<String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            urls: Vec::new(),
        }
    }
}

/// Root of `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuiverConfig {
    #[serde(default)]
    pub registry: RegistrySettings,

    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

impl QuiverConfig {
    pub fn with_defaults(home: &Path) -> Self {
        Self {
            registry: RegistrySettings::default(),
            agents: AgentConfig::defaults(home),
        }
    }

    pub fn agent(&self, agent: &AgentType) -> Option<&AgentConfig> {
        self.agents.iter().find(|c| &c.agent == agent)
    }

    /// Replace the config for `config.agent`, appending it when new.
    pub fn upsert_agent(&mut self, config: AgentConfig) {
        match self.agents.iter_mut().find(|c| c.agent == config.agent) {
            Some(existing) => *existing = config,
            None => self.agents.push(config),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for agent in &self.agents {
            agent.validate()?;
            if !seen.insert(&agent.agent) {
                return Err(SkillError::InvalidInput(format!(
                    "Agent {} is configured twice",
                    agent.agent
                )));
            }
        }
        if self.registry.timeout_secs == 0 {
            return Err(SkillError::InvalidInput(
                "registry.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
