//! YAML frontmatter carried by Markdown entry files.

use serde::Serialize;
use serde_yaml::Value;

/// Metadata read from (or written to) a `---` fenced YAML block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Frontmatter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Frontmatter {
    pub fn is_empty(&self) -> bool {
        *self == Frontmatter::default()
    }
}

/// Split `content` into its YAML block (if any) and the body after it.
pub fn split(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }
    (None, content)
}

/// Parse frontmatter leniently: numbers are accepted where strings are
/// expected and `tags` may be a list or a comma-separated string. Invalid
/// YAML yields `None`.
pub fn parse(content: &str) -> (Option<Frontmatter>, &str) {
    let (yaml, body) = split(content);
    let Some(yaml) = yaml else {
        return (None, body);
    };
    let value: Value = match serde_yaml::from_str(yaml) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(error = %err, "Ignoring invalid frontmatter");
            return (None, body);
        }
    };
    let Value::Mapping(map) = value else {
        return (None, body);
    };

    let text = |key: &str| -> Option<String> {
        match map.get(key)? {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    };

    let tags = match map.get("tags") {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    let frontmatter = Frontmatter {
        name: text("name"),
        description: text("description"),
        tags,
        version: text("version"),
        author: text("author"),
    };
    (Some(frontmatter), body)
}

/// Prefix `body` with a frontmatter block (no-op for empty frontmatter).
pub fn render(frontmatter: &Frontmatter, body: &str) -> String {
    if frontmatter.is_empty() {
        return body.to_string();
    }
    match serde_yaml::to_string(frontmatter) {
        Ok(yaml) => format!("---\n{}---\n\n{}", yaml, body),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to render frontmatter");
            body.to_string()
        }
    }
}

/// First non-empty, non-heading line of `body`, capped at 200 characters.
pub fn first_paragraph(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.chars().take(200).collect())
}
