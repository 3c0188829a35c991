//! Scanner behaviour against a realistic agent layout.

mod support;

use std::fs;
use std::time::{Duration, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use filetime::FileTime;
use quiver_core::config::QuiverConfig;
use quiver_core::prelude::*;
use support::TestEnv;

fn claude_only(env: &TestEnv) -> Vec<AgentConfig> {
    QuiverConfig::with_defaults(env.ctx.home_dir())
        .agents
        .into_iter()
        .filter(|c| c.agent == AgentType::Claude)
        .collect()
}

#[test]
fn test_scan_is_idempotent() {
    let env = TestEnv::new();
    let review = env.write_skill(
        "code-review",
        &[
            (
                "SKILL.md",
                "---\nname: Code Review\ndescription: Reviews diffs\ntags: [rust, review]\nversion: 1.2.0\n---\n# Code Review\n",
            ),
            ("checklist.md", "- [ ] tests\n"),
            ("scripts/lint.py", "print('ok')\n"),
        ],
    );
    env.write_skill("notes", &[("README.md", "Plain notes skill.\n")]);

    let fixed = FileTime::from_unix_time(1_700_000_000, 0);
    filetime::set_file_mtime(&review, fixed).expect("set mtime should succeed");

    let configs = claude_only(&env);
    let first = Scanner::scan(&configs);
    let second = Scanner::scan(&configs);
    assert!(first.failures.is_empty());
    assert_eq!(first.skills, second.skills);
    assert_eq!(first.skills.len(), 2);

    let skill = first
        .skills
        .iter()
        .find(|s| s.folder_path == review)
        .expect("code-review should be found");
    assert_eq!(skill.name, "Code Review");
    assert_eq!(skill.description.as_deref(), Some("Reviews diffs"));
    assert_eq!(skill.tags, vec!["review".to_string(), "rust".to_string()]);
    assert_eq!(skill.version.as_deref(), Some("1.2.0"));
    assert_eq!(skill.file_count, 3);
    assert_eq!(skill.entry_file, Some(review.join("SKILL.md")));
    assert!(skill.is_local && skill.is_folder);

    let expected: DateTime<Utc> = (UNIX_EPOCH + Duration::from_secs(1_700_000_000)).into();
    assert_eq!(skill.updated_at, expected);
}

#[test]
fn test_single_file_skills_from_patterns() {
    let env = TestEnv::new();
    let claude_dir = env.ctx.home_dir().join(".claude");
    fs::create_dir_all(claude_dir.join("rules")).expect("create_dir_all should succeed");
    fs::write(claude_dir.join("CLAUDE.md"), "Global instructions.\n").expect("write should succeed");
    fs::write(claude_dir.join("rules/style.md"), "Prefer small functions.\n").expect("write should succeed");
    fs::write(claude_dir.join("settings.json"), "{}").expect("write should succeed");
    env.write_skill("folder-skill", &[("SKILL.md", "# Folder\n")]);

    let report = Scanner::scan(&claude_only(&env));
    let mut names: Vec<&str> = report.skills.iter().map(|s| s.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["CLAUDE", "folder-skill", "style"]);

    let single = report
        .skills
        .iter()
        .find(|s| s.name == "style")
        .expect("rules/style.md should be a skill");
    assert!(!single.is_folder);
    assert_eq!(single.file_count, 1);
    assert_eq!(single.description.as_deref(), Some("Prefer small functions."));
}

#[test]
fn test_disabled_and_missing_agents_are_quiet() {
    let env = TestEnv::new();
    env.write_skill("demo", &[("SKILL.md", "# Demo\n")]);

    let mut configs = claude_only(&env);
    configs[0].enabled = false;
    let report = Scanner::scan(&configs);
    assert!(report.skills.is_empty());
    assert!(report.failures.is_empty());

    // Cursor's directories do not exist in the sandbox.
    let all = QuiverConfig::with_defaults(env.ctx.home_dir()).agents;
    let report = Scanner::scan(&all);
    assert_eq!(report.skills.len(), 1);
    assert!(report.failures.is_empty());
}

#[test]
fn test_scan_depth_is_bounded_but_listing_is_not() {
    let env = TestEnv::new();
    let folder = env.write_skill(
        "deep",
        &[
            ("SKILL.md", "# Deep\n"),
            ("a/one.md", "1"),
            ("a/b/two.md", "2"),
        ],
    );

    let skill = Scanner::scan_folder(&folder, &AgentType::Claude).expect("scan should succeed");
    let names: Vec<&str> = skill.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["SKILL.md", "one.md"]);

    let listed = Scanner::list_files(&folder).expect("list should succeed");
    assert_eq!(listed.len(), 3);
}

#[cfg(unix)]
#[test]
fn test_broken_symlinks_are_reported_not_fatal() {
    use std::os::unix::fs::symlink;

    let env = TestEnv::new();
    let good = env.write_skill("good", &[("SKILL.md", "# Good\n")]);
    let dangling = env.claude_root().join("dangling");
    symlink(env.tmp.path().join("nowhere"), &dangling).expect("symlink should succeed");
    // A dead link inside a skill only drops that file.
    symlink(env.tmp.path().join("gone.md"), good.join("refs.md")).expect("symlink should succeed");

    let report = Scanner::scan(&claude_only(&env));
    assert_eq!(report.skills.len(), 1);
    assert_eq!(report.skills[0].folder_path, good);
    assert_eq!(report.skills[0].file_count, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, dangling);
    assert_eq!(report.failures[0].agent, AgentType::Claude);
}

#[cfg(unix)]
#[test]
fn test_symlinked_skill_folder_is_followed() {
    use std::os::unix::fs::symlink;

    let env = TestEnv::new();
    let shared = env.tmp.path().join("shared/linked");
    fs::create_dir_all(&shared).expect("create_dir_all should succeed");
    fs::write(shared.join("SKILL.md"), "---\nname: Shared\n---\nFrom elsewhere.\n").expect("write should succeed");
    fs::create_dir_all(env.claude_root()).expect("create_dir_all should succeed");
    let link = env.claude_root().join("linked");
    symlink(&shared, &link).expect("symlink should succeed");

    let report = Scanner::scan(&claude_only(&env));
    assert!(report.failures.is_empty());
    assert_eq!(report.skills.len(), 1);
    let skill = &report.skills[0];
    assert_eq!(skill.folder_path, link);
    assert_eq!(skill.name, "Shared");
    assert_eq!(skill.entry_file, Some(link.join("SKILL.md")));
}

#[cfg(unix)]
#[test]
fn test_unreadable_folder_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let env = TestEnv::new();
    env.write_skill("open", &[("SKILL.md", "# Open\n")]);
    let locked = env.write_skill("locked", &[("SKILL.md", "# Locked\n")]);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod should succeed");
    if fs::read_dir(&locked).is_ok() {
        // Running with CAP_DAC_OVERRIDE (root); permissions are not enforced.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("chmod should succeed");
        return;
    }

    let report = Scanner::scan(&claude_only(&env));
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("chmod should succeed");

    let names: Vec<&str> = report.skills.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["open"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, locked);
}
