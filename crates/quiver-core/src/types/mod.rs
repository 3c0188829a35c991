//! Shared core types used across the scanner, ledger and registry layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SkillError;

/// Target agent a skill is written for.
///
/// Serialized as a plain string so it can be used as a map key. Parsing
/// normalizes built-in names (case-insensitive, with aliases), which keeps
/// equality and hashing consistent wherever an agent string enters the system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AgentType {
    Claude,
    Cursor,
    ContinueDev,
    Aider,
    Windsurf,
    /// User-defined agent, keyed by its trimmed name
    Custom(String),
}

impl AgentType {
    /// Built-in agents, in display order.
    pub const BUILT_IN: [AgentType; 5] = [
        AgentType::Claude,
        AgentType::Cursor,
        AgentType::ContinueDev,
        AgentType::Aider,
        AgentType::Windsurf,
    ];

    /// Lowercase key matching the registry `files` mapping.
    pub fn key(&self) -> &str {
        match self {
            AgentType::Claude => "claude",
            AgentType::Cursor => "cursor",
            AgentType::ContinueDev => "continue_dev",
            AgentType::Aider => "aider",
            AgentType::Windsurf => "windsurf",
            AgentType::Custom(name) => name,
        }
    }

    /// File name used for the entry file when quiver writes a skill.
    pub fn entry_file_name(&self) -> &'static str {
        match self {
            AgentType::Claude | AgentType::Custom(_) => "SKILL.md",
            AgentType::Cursor => "skill.cursorrules",
            AgentType::ContinueDev => "skill.json",
            AgentType::Aider => "skill.txt",
            AgentType::Windsurf => "skill.yaml",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentType::Claude => write!(f, "Claude"),
            AgentType::Cursor => write!(f, "Cursor"),
            AgentType::ContinueDev => write!(f, "ContinueDev"),
            AgentType::Aider => write!(f, "Aider"),
            AgentType::Windsurf => write!(f, "Windsurf"),
            AgentType::Custom(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for AgentType {
    type Err = SkillError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SkillError::InvalidInput(
                "Agent name must not be empty".to_string(),
            ));
        }
        let agent = match trimmed.to_ascii_lowercase().as_str() {
            "claude" => AgentType::Claude,
            "cursor" => AgentType::Cursor,
            "continuedev" | "continue_dev" | "continue-dev" | "continue" => AgentType::ContinueDev,
            "aider" => AgentType::Aider,
            "windsurf" | "codeium" => AgentType::Windsurf,
            _ => AgentType::Custom(trimmed.to_string()),
        };
        Ok(agent)
    }
}

impl TryFrom<String> for AgentType {
    type Error = SkillError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AgentType> for String {
    fn from(agent: AgentType) -> Self {
        agent.to_string()
    }
}

/// File format, derived from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillFormat {
    Markdown,
    Json,
    Yaml,
    Python,
    PlainText,
}

impl SkillFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" => SkillFormat::Markdown,
            "json" => SkillFormat::Json,
            "yaml" | "yml" => SkillFormat::Yaml,
            "py" => SkillFormat::Python,
            _ => SkillFormat::PlainText,
        }
    }

    pub fn from_path(path: &std::path::Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(SkillFormat::PlainText)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SkillFormat::Markdown => "md",
            SkillFormat::Json => "json",
            SkillFormat::Yaml => "yaml",
            SkillFormat::Python => "py",
            SkillFormat::PlainText => "txt",
        }
    }
}
