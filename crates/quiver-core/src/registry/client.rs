//! Registry client: the only component that performs network I/O.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;

use crate::config::RegistrySettings;
use crate::error::{Result, SkillError};
use crate::types::AgentType;

use super::schema::{RemoteSkill, SkillRegistry, parse_document};
use super::source::{Location, registry_location, resolve_reference};

const USER_AGENT: &str = concat!("quiver/", env!("CARGO_PKG_VERSION"));

/// A registry skill together with downloaded per-agent content.
#[derive(Debug, Clone)]
pub struct FetchedSkill {
    pub skill: RemoteSkill,
    pub payloads: HashMap<AgentType, Vec<u8>>,
}

impl FetchedSkill {
    pub fn payload(&self, agent: &AgentType) -> Option<&[u8]> {
        self.payloads.get(agent).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: Client,
    timeout: Duration,
}

impl RegistryClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SkillError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, timeout })
    }

    pub fn from_settings(settings: &RegistrySettings) -> Result<Self> {
        Self::new(Duration::from_secs(settings.timeout_secs))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch and validate a registry document.
    ///
    /// The returned registry's `url` is the URL it was fetched with, so
    /// ledger entries and update checks agree on the key.
    pub async fn fetch(&self, url: &str) -> Result<SkillRegistry> {
        let location = registry_location(url)?;
        tracing::debug!(url = %url, location = %location, "Fetching registry");

        let bytes = self.read(&location).await?;
        let body = String::from_utf8(bytes)
            .map_err(|_| SkillError::Parse(format!("Registry {} is not UTF-8", location)))?;
        let mut registry = parse_document(&body)?;
        registry.url = url.trim().to_string();
        registry.last_updated = Utc::now();

        tracing::info!(url = %registry.url, skills = registry.skills.len(), "Fetched registry");
        Ok(registry)
    }

    /// Download one agent's content for `skill`.
    pub async fn fetch_payload(
        &self,
        registry_url: &str,
        skill: &RemoteSkill,
        agent: &AgentType,
    ) -> Result<Vec<u8>> {
        let reference = skill
            .files
            .for_agent(agent)
            .ok_or_else(|| SkillError::UnsupportedAgent {
                skill_id: skill.id.clone(),
                agent: agent.clone(),
            })?;
        let base = registry_location(registry_url)?;
        let location = resolve_reference(&base, reference)?;
        tracing::debug!(skill = %skill.id, agent = %agent, location = %location, "Fetching skill content");
        self.read(&location).await
    }

    /// Fetch `skill` with content for every agent in `agents`.
    pub async fn fetch_skill(
        &self,
        registry_url: &str,
        skill: &RemoteSkill,
        agents: &[AgentType],
    ) -> Result<FetchedSkill> {
        let mut payloads = HashMap::new();
        for agent in agents {
            let bytes = self.fetch_payload(registry_url, skill, agent).await?;
            payloads.insert(agent.clone(), bytes);
        }
        Ok(FetchedSkill {
            skill: skill.clone(),
            payloads,
        })
    }

    async fn read(&self, location: &Location) -> Result<Vec<u8>> {
        match location {
            Location::Local(path) => tokio::fs::read(path).await.map_err(|e| {
                SkillError::Network(format!("Failed to read {}: {}", path.display(), e))
            }),
            Location::Remote(url) => {
                let response = self.http.get(url.clone()).send().await.map_err(|e| {
                    if e.is_timeout() {
                        SkillError::Network(format!(
                            "Timed out after {}s fetching {}",
                            self.timeout.as_secs(),
                            url
                        ))
                    } else {
                        SkillError::Network(format!("Request to {} failed: {}", url, e))
                    }
                })?;

                if !response.status().is_success() {
                    return Err(SkillError::Network(format!(
                        "HTTP {} from {}",
                        response.status(),
                        url
                    )));
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| SkillError::Network(format!("Failed to read body from {}: {}", url, e)))?;
                Ok(bytes.to_vec())
            }
        }
    }
}
