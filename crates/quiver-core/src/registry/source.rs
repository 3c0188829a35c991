//! Where registry documents and skill payloads are read from.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{Result, SkillError};

const GITHUB_HOST: &str = "github.com";
const RAW_HOST: &str = "raw.githubusercontent.com";
const DEFAULT_BRANCH: &str = "main";
const REGISTRY_FILE: &str = "registry.json";

/// A resolved fetch location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Remote(Url),
    Local(PathBuf),
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Remote(url) => write!(f, "{}", url),
            Location::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolve a user-supplied registry URL or path.
///
/// GitHub page links are rewritten to raw content links; a bare repository
/// (or tree) link points at `registry.json` on its branch.
pub fn registry_location(input: &str) -> Result<Location> {
    match parse_location(input)? {
        Location::Remote(url) => Ok(Location::Remote(github_registry_url(&url))),
        local => Ok(local),
    }
}

/// Resolve a skill content reference against the registry it came from.
pub fn resolve_reference(registry: &Location, reference: &str) -> Result<Location> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(SkillError::InvalidInput("Empty content reference".to_string()));
    }
    if has_scheme(reference) {
        return match parse_location(reference)? {
            Location::Remote(url) => Ok(Location::Remote(github_raw_url(&url))),
            local => Ok(local),
        };
    }

    match registry {
        Location::Remote(base) => base.join(reference).map(Location::Remote).map_err(|e| {
            SkillError::InvalidInput(format!("Cannot resolve '{}' against {}: {}", reference, base, e))
        }),
        Location::Local(path) => {
            let relative = Path::new(reference);
            if relative.is_absolute() {
                return Ok(Location::Local(relative.to_path_buf()));
            }
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            Ok(Location::Local(base.join(relative)))
        }
    }
}

fn has_scheme(input: &str) -> bool {
    input
        .split_once("://")
        .is_some_and(|(scheme, _)| !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')))
}

fn parse_location(input: &str) -> Result<Location> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SkillError::InvalidInput("Registry URL is empty".to_string()));
    }
    if !has_scheme(input) {
        return Ok(Location::Local(PathBuf::from(input)));
    }

    let url = Url::parse(input)
        .map_err(|e| SkillError::InvalidInput(format!("Invalid URL '{}': {}", input, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(Location::Remote(url)),
        "file" => url
            .to_file_path()
            .map(Location::Local)
            .map_err(|_| SkillError::InvalidInput(format!("Invalid file URL: {}", input))),
        other => Err(SkillError::InvalidInput(format!(
            "Unsupported URL scheme '{}': {}",
            other, input
        ))),
    }
}

fn segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn raw_url(parts: &[String]) -> Option<Url> {
    Url::parse(&format!("https://{}/{}", RAW_HOST, parts.join("/"))).ok()
}

/// `github.com/<o>/<r>/blob/<ref>/<path>` → raw link; anything else unchanged.
fn github_raw_url(url: &Url) -> Url {
    if url.host_str() != Some(GITHUB_HOST) {
        return url.clone();
    }
    let parts = segments(url);
    if parts.len() > 4 && parts[2] == "blob" {
        let mut raw = vec![parts[0].clone(), parts[1].clone()];
        raw.extend(parts[3..].iter().cloned());
        if let Some(raw) = raw_url(&raw) {
            return raw;
        }
    }
    url.clone()
}

fn github_registry_url(url: &Url) -> Url {
    if url.host_str() != Some(GITHUB_HOST) {
        return url.clone();
    }
    let mut parts = segments(url);
    if let Some(last) = parts.last_mut()
        && let Some(stripped) = last.strip_suffix(".git")
    {
        *last = stripped.to_string();
    }

    let raw = match parts.len() {
        2 => {
            let mut raw = parts.clone();
            raw.push(DEFAULT_BRANCH.to_string());
            raw.push(REGISTRY_FILE.to_string());
            Some(raw)
        }
        n if n > 3 && parts[2] == "tree" => {
            let mut raw = vec![parts[0].clone(), parts[1].clone()];
            raw.extend(parts[3..].iter().cloned());
            raw.push(REGISTRY_FILE.to_string());
            Some(raw)
        }
        _ => None,
    };
    match raw.and_then(|raw| raw_url(&raw)) {
        Some(raw) => raw,
        None => github_raw_url(url),
    }
}
