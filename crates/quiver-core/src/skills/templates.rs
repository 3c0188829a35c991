//! Starter content for new skills and files.

use crate::types::{AgentType, SkillFormat};

const MARKDOWN_SKILL: &str = "# {name}

Brief description of what this skill does.

## When to use

Situations where this skill helps.

## Instructions

1. First step
2. Second step

## Examples

```
Example usage here
```
";

const CURSOR_RULES: &str = "# {name}

You are an expert assistant following these guidelines:

## Code Style
- Write clean, readable code
- Follow the project's conventions

## Behavior
- Be concise and explain your reasoning
- Ask for clarification when requirements are unclear
";

const CONTINUE_JSON: &str = r#"{
  "name": "{name}",
  "version": "1.0.0",
  "description": "Brief description",
  "systemMessage": "You are a helpful assistant.",
  "contextProviders": [],
  "slashCommands": []
}
"#;

const AIDER_PROMPT: &str = "You are an expert developer working on {name}.

1. Write clean, maintainable code
2. Add tests for new features
3. Follow project conventions
";

const YAML_SKILL: &str = "name: {name}
description: Brief description
instructions:
  - First step
  - Second step
";

const PYTHON_SCRIPT: &str = r#"#!/usr/bin/env python3
"""{name}"""

import sys


def main() -> int:
    return 0


if __name__ == "__main__":
    sys.exit(main())
"#;

/// Template for a skill's entry file.
pub fn entry_template(agent: &AgentType, name: &str) -> String {
    let raw = match agent {
        AgentType::Cursor => CURSOR_RULES,
        AgentType::ContinueDev => CONTINUE_JSON,
        AgentType::Aider => AIDER_PROMPT,
        AgentType::Windsurf => YAML_SKILL,
        AgentType::Claude | AgentType::Custom(_) => MARKDOWN_SKILL,
    };
    fill(raw, name)
}

/// Template for an additional file, chosen by format.
pub fn file_template(format: SkillFormat, name: &str) -> String {
    match format {
        SkillFormat::Markdown => format!("# {}\n", name),
        SkillFormat::Python => fill(PYTHON_SCRIPT, name),
        SkillFormat::Yaml => fill(YAML_SKILL, name),
        SkillFormat::Json => "{}\n".to_string(),
        SkillFormat::PlainText => String::new(),
    }
}

fn fill(raw: &str, name: &str) -> String {
    // JSON templates need the name escaped as a string body.
    let json = serde_json::to_string(name).unwrap_or_default();
    let escaped = json.trim_matches('"');
    if raw.trim_start().starts_with('{') {
        raw.replace("{name}", escaped)
    } else {
        raw.replace("{name}", name)
    }
}
