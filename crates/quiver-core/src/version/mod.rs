//! Semantic version helpers.
//!
//! Registry and ledger versions are compared with semver ordering. Authors
//! often publish `1.2` or `v1.2.0`, so parsing pads missing components and
//! strips a leading `v` before handing the string to `semver`.

use std::cmp::Ordering;

use semver::Version;

use crate::error::{Result, SkillError};

/// Parse a version leniently: `v1.2` → `1.2.0`, `3` → `3.0.0`.
pub fn parse_lenient(input: &str) -> Result<Version> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    if let Ok(version) = Version::parse(trimmed) {
        return Ok(version);
    }

    // Pad the numeric core, keeping any pre-release/build suffix.
    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty()
        || parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(SkillError::Parse(format!("Invalid version: {}", input)));
    }
    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);

    Version::parse(&padded).map_err(|e| SkillError::Parse(format!("Invalid version {}: {}", input, e)))
}

/// Compare two version strings with semver ordering.
pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    Ok(parse_lenient(a)?.cmp(&parse_lenient(b)?))
}

/// Whether `candidate` is strictly newer than `current`.
pub fn is_newer(current: &str, candidate: &str) -> Result<bool> {
    Ok(compare(current, candidate)? == Ordering::Less)
}

/// Whether the major components differ.
pub fn is_major_change(current: &str, candidate: &str) -> Result<bool> {
    Ok(parse_lenient(current)?.major != parse_lenient(candidate)?.major)
}
