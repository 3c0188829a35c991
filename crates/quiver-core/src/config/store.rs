//! Config store for loading and saving config.toml.

use std::path::{Path, PathBuf};

use crate::error::{IoContext, Result, SkillError};
use crate::fs::write_file_atomic;

use super::QuiverConfig;
use super::paths::{config_file_path, expand_home};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
    home_dir: PathBuf,
}

impl ConfigStore {
    pub fn from_paths(config_dir: &Path, home_dir: PathBuf) -> Self {
        Self {
            config_path: config_file_path(config_dir),
            home_dir,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the config, falling back to built-in defaults when the file is absent.
    pub fn load(&self) -> Result<QuiverConfig> {
        if !self.config_path.exists() {
            return Ok(QuiverConfig::with_defaults(&self.home_dir));
        }
        let content =
            std::fs::read_to_string(&self.config_path).with_path("read config", &self.config_path)?;
        let mut config: QuiverConfig = toml::from_str(&content).map_err(|e| {
            SkillError::Parse(format!(
                "Invalid config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;
        if config.agents.is_empty() {
            config.agents = QuiverConfig::with_defaults(&self.home_dir).agents;
        }
        for agent in &mut config.agents {
            agent.config_dir = expand_home(&agent.config_dir, &self.home_dir);
            agent.skills_dir = agent
                .skills_dir
                .as_deref()
                .map(|dir| expand_home(dir, &self.home_dir));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &QuiverConfig) -> Result<()> {
        config.validate()?;
        let content = toml::to_string_pretty(config)
            .map_err(|e| SkillError::Parse(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).with_path("create config directory", parent)?;
        }
        write_file_atomic(&self.config_path, content.as_bytes())
    }
}
