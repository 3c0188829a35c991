//! Registry document schema and validation.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SkillError};
use crate::types::AgentType;
use crate::version;

/// Supported registry schema major version.
pub const SCHEMA_MAJOR: u64 = 1;

/// A fetched registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRegistry {
    /// Registry schema version
    #[serde(deserialize_with = "string_or_number")]
    pub version: String,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Canonical URL, overwritten with the URL it was fetched from
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub skills: Vec<RemoteSkill>,

    /// Fetch time
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl SkillRegistry {
    pub fn skill(&self, id: &str) -> Option<&RemoteSkill> {
        self.skills.iter().find(|s| s.id == id)
    }

    /// Check the schema version and every skill's shape.
    pub fn validate(&self) -> Result<()> {
        check_schema_version(&self.version)?;
        let mut ids = HashSet::new();
        for skill in &self.skills {
            skill.validate()?;
            if !ids.insert(skill.id.as_str()) {
                return Err(SkillError::Parse(format!(
                    "Duplicate skill id in registry: {}",
                    skill.id
                )));
            }
        }
        Ok(())
    }
}

/// A skill offered by a registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSkill {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(deserialize_with = "skill_version")]
    pub version: String,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub agents: Vec<AgentType>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub files: SkillFiles,

    /// Homepage or source URL
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub checksum: Option<String>,

    #[serde(default)]
    pub changelog: Option<String>,
}

impl RemoteSkill {
    pub fn validate(&self) -> Result<()> {
        validate_skill_id(&self.id)?;
        version::parse_lenient(&self.version).map_err(|_| {
            SkillError::Parse(format!(
                "Skill {} has an invalid version: {}",
                self.id, self.version
            ))
        })?;
        Ok(())
    }

    /// Agents this skill ships a file for.
    pub fn supported_agents(&self) -> Vec<AgentType> {
        AgentType::BUILT_IN
            .iter()
            .filter(|agent| self.files.for_agent(agent).is_some())
            .cloned()
            .collect()
    }
}

/// Per-agent content references (absolute URL or relative to the registry).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillFiles {
    #[serde(default)]
    pub claude: Option<String>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default, alias = "continue", alias = "continueDev")]
    pub continue_dev: Option<String>,
    #[serde(default)]
    pub aider: Option<String>,
    #[serde(default)]
    pub windsurf: Option<String>,
}

impl SkillFiles {
    pub fn for_agent(&self, agent: &AgentType) -> Option<&str> {
        let reference = match agent {
            AgentType::Claude => &self.claude,
            AgentType::Cursor => &self.cursor,
            AgentType::ContinueDev => &self.continue_dev,
            AgentType::Aider => &self.aider,
            AgentType::Windsurf => &self.windsurf,
            AgentType::Custom(_) => return None,
        };
        reference.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

/// Parse a registry body: JSON first, then YAML.
pub fn parse_document(body: &str) -> Result<SkillRegistry> {
    let registry = match serde_json::from_str::<SkillRegistry>(body) {
        Ok(registry) => registry,
        Err(json_err) => serde_yaml::from_str::<SkillRegistry>(body).map_err(|yaml_err| {
            SkillError::Parse(format!(
                "Registry is neither valid JSON ({}) nor YAML ({})",
                json_err, yaml_err
            ))
        })?,
    };
    registry.validate()?;
    Ok(registry)
}

fn check_schema_version(raw: &str) -> Result<()> {
    let major = raw
        .trim()
        .trim_start_matches(['v', 'V'])
        .split('.')
        .next()
        .and_then(|m| m.parse::<u64>().ok());
    match major {
        Some(SCHEMA_MAJOR) => Ok(()),
        _ => Err(SkillError::Version(format!(
            "Registry schema {} is not supported (expected {}.x)",
            raw, SCHEMA_MAJOR
        ))),
    }
}

/// Ids become folder names, so they must be a single safe path component.
pub fn validate_skill_id(id: &str) -> Result<()> {
    let bad = id.trim().is_empty()
        || id != id.trim()
        || id.starts_with('.')
        || id.contains(['/', '\\', '\0'])
        || id.contains(':');
    if bad {
        return Err(SkillError::Parse(format!("Invalid skill id: '{}'", id)));
    }
    Ok(())
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(u64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}

/// Skill versions must be strings or integers. A float such as `1.10` has
/// already lost its trailing zero by the time it is parsed.
fn skill_version<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(u64),
        Float(f64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(s) => Ok(s),
        Raw::Int(n) => Ok(n.to_string()),
        Raw::Float(f) => Err(serde::de::Error::custom(format!(
            "skill version {} is a number; quote it (\"{}\") so it is read exactly",
            f, f
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "version": "1.0",
        "name": "Demo",
        "skills": [
            {
                "id": "rust-review",
                "name": "Rust Review",
                "version": "1.2",
                "agents": ["claude", "cursor"],
                "files": { "claude": "skills/rust-review/SKILL.md", "continue": "x.json" }
            }
        ]
    }"#;

    #[test]
    fn test_parse_json_document() {
        let registry = parse_document(JSON).expect("registry should parse");
        let skill = registry.skill("rust-review").expect("skill");
        assert_eq!(skill.agents, vec![AgentType::Claude, AgentType::Cursor]);
        assert_eq!(skill.files.for_agent(&AgentType::Claude), Some("skills/rust-review/SKILL.md"));
        assert_eq!(skill.files.for_agent(&AgentType::ContinueDev), Some("x.json"));
        assert_eq!(skill.files.for_agent(&AgentType::Cursor), None);
        assert_eq!(skill.supported_agents(), vec![AgentType::Claude, AgentType::ContinueDev]);
    }

    #[test]
    fn test_parse_yaml_document() {
        let yaml = "version: 1\nname: Demo\nskills:\n  - id: a\n    name: A\n    version: 2.0.1\n";
        let registry = parse_document(yaml).expect("registry should parse");
        assert_eq!(registry.version, "1");
        assert_eq!(registry.skills[0].version, "2.0.1");
    }

    #[test]
    fn test_float_skill_version_must_be_quoted() {
        let yaml = "version: 1.0\nname: Demo\nskills:\n  - id: a\n    name: A\n    version: 1.10\n";
        let err = parse_document(yaml).expect_err("float version should fail");
        assert_eq!(err.kind(), "ParseError");
        assert!(err.to_string().contains("quote it"));

        let quoted = "version: 1.0\nname: Demo\nskills:\n  - id: a\n    name: A\n    version: \"1.10\"\n";
        let registry = parse_document(quoted).expect("quoted version should parse");
        assert_eq!(registry.skills[0].version, "1.10");

        let whole = "version: 1\nname: Demo\nskills:\n  - id: a\n    name: A\n    version: 3\n";
        let registry = parse_document(whole).expect("integer version should parse");
        assert_eq!(registry.skills[0].version, "3");
    }

    #[test]
    fn test_unsupported_schema_is_version_error() {
        let err = parse_document(r#"{"version": "2.0", "name": "x", "skills": []}"#)
            .expect_err("schema 2 should fail");
        assert_eq!(err.kind(), "VersionError");

        let err = parse_document(r#"{"version": "beta", "name": "x", "skills": []}"#)
            .expect_err("non-numeric schema should fail");
        assert_eq!(err.kind(), "VersionError");
    }

    #[test]
    fn test_shape_errors_are_parse_errors() {
        let dup = r#"{"version": "1", "name": "x", "skills": [
            {"id": "a", "name": "A", "version": "1.0.0"},
            {"id": "a", "name": "A2", "version": "1.0.1"}
        ]}"#;
        assert_eq!(parse_document(dup).expect_err("dup").kind(), "ParseError");

        let unsafe_id = r#"{"version": "1", "name": "x", "skills": [
            {"id": "../evil", "name": "A", "version": "1.0.0"}
        ]}"#;
        assert_eq!(parse_document(unsafe_id).expect_err("id").kind(), "ParseError");

        let bad_version = r#"{"version": "1", "name": "x", "skills": [
            {"id": "a", "name": "A", "version": "latest"}
        ]}"#;
        assert_eq!(parse_document(bad_version).expect_err("version").kind(), "ParseError");

        assert_eq!(parse_document("{{{").expect_err("garbage").kind(), "ParseError");
    }

    #[test]
    fn test_validate_skill_id() {
        assert!(validate_skill_id("rust-review").is_ok());
        for bad in ["", ".", "..", ".hidden", "a/b", "a\\b", " a", "c:x"] {
            assert!(validate_skill_id(bad).is_err(), "{bad} should be rejected");
        }
    }
}
