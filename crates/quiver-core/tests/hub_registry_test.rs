//! Registry install, update, rollback and uninstall through `SkillHub`.

mod support;

use std::fs;

use quiver_core::fs::hash_tree;
use quiver_core::prelude::*;
use support::{Published, TestEnv, write_registry};

const WRONG_SHA: &str = "sha256:0000000000000000000000000000000000000000000000000000000000000000";

async fn install(hub: &SkillHub, url: &str, id: &str) -> InstalledSkill {
    hub.install_remote_skill(url, id, &AgentType::Claude)
        .await
        .expect("install should succeed")
}

#[tokio::test]
async fn test_install_records_ledger_and_view() {
    let env = TestEnv::new();
    let url = write_registry(&env.registry_dir(), &[Published::new("alpha", "1.0.0", "# Alpha\n")]);
    let hub = env.hub();
    assert!(hub.get_all_skills().is_empty());

    let entry = install(&hub, &url, "alpha").await;
    assert_eq!(entry.installed_path, env.claude_root().join("alpha"));
    assert_eq!(entry.registry_url, url);
    assert_eq!(entry.version, "1.0.0");
    assert_eq!(
        entry.content_hash.as_deref(),
        Some(hash_tree(&entry.installed_path).expect("hash").as_str())
    );
    assert_eq!(hub.get_installed_skills(), vec![entry.clone()]);

    let view = hub.get_all_skills();
    assert_eq!(view.len(), 1);
    assert!(!view[0].is_local);
    assert_eq!(view[0].version.as_deref(), Some("1.0.0"));

    // A second hub sees the same install after a fresh scan.
    let other = env.hub();
    let scanned = other.scan_skills();
    assert_eq!(scanned.len(), 1);
    assert!(!scanned[0].is_local);
}

#[tokio::test]
async fn test_install_errors() {
    let env = TestEnv::new();
    let url = write_registry(
        &env.registry_dir(),
        &[
            Published::new("alpha", "1.0.0", "# Alpha\n"),
            Published::new("tampered", "1.0.0", "# Tampered\n").with_checksum(WRONG_SHA),
        ],
    );
    let hub = env.hub();

    let err = hub
        .install_remote_skill(&url, "missing", &AgentType::Claude)
        .await
        .expect_err("unknown skill");
    assert_eq!(err.kind(), "NotFoundError");

    let err = hub
        .install_remote_skill(&url, "alpha", &AgentType::Cursor)
        .await
        .expect_err("no cursor file");
    assert_eq!(err.kind(), "UnsupportedAgentError");

    let err = hub
        .install_remote_skill(&url, "tampered", &AgentType::Claude)
        .await
        .expect_err("bad checksum");
    assert_eq!(err.kind(), "ChecksumError");
    assert!(!env.claude_root().join("tampered").exists());
    assert!(hub.get_installed_skills().is_empty());
}

#[tokio::test]
async fn test_install_never_overwrites_untracked_folder() {
    let env = TestEnv::new();
    let url = write_registry(&env.registry_dir(), &[Published::new("alpha", "1.0.0", "# Alpha\n")]);
    let mine = env.write_skill("alpha", &[("SKILL.md", "# My own alpha\n"), ("notes.md", "keep")]);
    let hub = env.hub();

    let err = hub
        .install_remote_skill(&url, "alpha", &AgentType::Claude)
        .await
        .expect_err("untracked folder should conflict");
    assert_eq!(err.kind(), "ConflictError");
    assert_eq!(fs::read_to_string(mine.join("SKILL.md")).expect("read"), "# My own alpha\n");
    assert_eq!(fs::read_to_string(mine.join("notes.md")).expect("read"), "keep");
    assert!(hub.get_installed_skills().is_empty());
}

#[tokio::test]
async fn test_reinstall_overwrites_ledger_record() {
    let env = TestEnv::new();
    let url_a = write_registry(&env.registry_dir(), &[Published::new("demo", "1.0.0", "# Demo\n")]);
    let mirror = env.tmp.path().join("mirror");
    let url_b = write_registry(&mirror, &[Published::new("demo", "1.0.0", "# Demo\n")]);
    let hub = env.hub();

    let first = install(&hub, &url_a, "demo").await;
    let again = install(&hub, &url_a, "demo").await;
    assert_eq!(again.registry_url, url_a);
    assert!(again.installed_at >= first.installed_at);
    assert_eq!(hub.get_installed_skills(), vec![again]);

    // Same bytes from another registry: the record follows the new source.
    let moved = install(&hub, &url_b, "demo").await;
    assert_eq!(moved.registry_url, url_b);
    assert_eq!(moved.content_hash, first.content_hash);
    let ledger = hub.get_installed_skills();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].registry_url, url_b);

    write_registry(&mirror, &[Published::new("demo", "1.1.0", "# Demo v2\n")]);
    let updates = hub.check_skill_updates(&url_b).await.expect("check should succeed");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].new_version, "1.1.0");
    assert!(hub.check_skill_updates(&url_a).await.expect("check should succeed").is_empty());
}

#[tokio::test]
async fn test_update_detection_respects_skips_and_majors() {
    let env = TestEnv::new();
    let dir = env.registry_dir();
    let url = write_registry(
        &dir,
        &[
            Published::new("alpha", "1.0.0", "a1"),
            Published::new("beta", "1.0.0", "b1"),
        ],
    );
    let hub = env.hub();
    install(&hub, &url, "alpha").await;
    install(&hub, &url, "beta").await;

    let result = hub.check_for_updates().await;
    assert!(result.available_updates.is_empty());
    assert!(result.errors.is_empty());

    write_registry(
        &dir,
        &[
            Published::new("alpha", "1.1.0", "a2"),
            Published::new("beta", "1.0.0", "b1"),
        ],
    );
    let updates = hub.check_skill_updates(&url).await.expect("check should succeed");
    assert_eq!(updates.len(), 1);
    let update = &updates[0];
    assert_eq!(update.skill_id, "alpha");
    assert_eq!(update.current_version, "1.0.0");
    assert_eq!(update.new_version, "1.1.0");
    assert_eq!(update.changelog.as_deref(), Some("Release 1.1.0"));
    assert!(!update.is_major);

    hub.skip_skill_version("alpha", "1.1.0").expect("skip should succeed");
    assert!(hub.check_for_updates().await.available_updates.is_empty());

    write_registry(
        &dir,
        &[
            Published::new("alpha", "2.0.0", "a3"),
            Published::new("beta", "0.9.0", "b0"),
        ],
    );
    let result = hub.check_for_updates().await;
    assert_eq!(result.available_updates.len(), 1);
    assert_eq!(result.available_updates[0].new_version, "2.0.0");
    assert!(result.available_updates[0].is_major);
}

#[tokio::test]
async fn test_apply_all_isolates_failures() {
    let env = TestEnv::new();
    let dir = env.registry_dir();
    let url = write_registry(
        &dir,
        &[
            Published::new("one", "1.0.0", "one v1"),
            Published::new("two", "1.0.0", "two v1"),
            Published::new("three", "1.0.0", "three v1"),
        ],
    );
    let hub = env.hub();
    for id in ["one", "two", "three"] {
        install(&hub, &url, id).await;
    }

    write_registry(
        &dir,
        &[
            Published::new("one", "1.1.0", "one v2"),
            Published::new("two", "1.1.0", "two v2").with_checksum(WRONG_SHA),
            Published::new("three", "1.1.0", "three v2"),
        ],
    );
    let mut updates = hub.check_skill_updates(&url).await.expect("check should succeed");
    let order = ["one", "two", "three"];
    updates.sort_by_key(|u| order.iter().position(|id| *id == u.skill_id));
    assert_eq!(updates.len(), 3);

    let results = hub.apply_all_skill_updates(updates).await;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().expect("one should update").version, "1.1.0");
    assert_eq!(
        results[1].as_ref().expect_err("two should fail").kind(),
        "ChecksumError"
    );
    assert_eq!(results[2].as_ref().expect("three should update").version, "1.1.0");

    let root = env.claude_root();
    assert_eq!(fs::read_to_string(root.join("one/SKILL.md")).expect("read"), "one v2");
    assert_eq!(fs::read_to_string(root.join("two/SKILL.md")).expect("read"), "two v1");
    assert_eq!(fs::read_to_string(root.join("three/SKILL.md")).expect("read"), "three v2");

    let ledger = hub.get_installed_skills();
    let version = |id: &str| {
        ledger
            .iter()
            .find(|e| e.skill_id == id)
            .map(|e| e.version.clone())
            .expect("entry should exist")
    };
    assert_eq!(version("one"), "1.1.0");
    assert_eq!(version("two"), "1.0.0");
    assert_eq!(version("three"), "1.1.0");
}

#[tokio::test]
async fn test_rollback_restores_previous_install() {
    let env = TestEnv::new();
    let dir = env.registry_dir();
    let url = write_registry(&dir, &[Published::new("alpha", "1.0.0", "alpha v1\n")]);
    let hub = env.hub();
    let original = install(&hub, &url, "alpha").await;
    let original_bytes = fs::read(original.installed_path.join("SKILL.md")).expect("read");

    let err = hub
        .rollback_skill("alpha", &AgentType::Claude)
        .expect_err("nothing to roll back yet");
    assert_eq!(err.kind(), "NoSnapshotError");

    write_registry(&dir, &[Published::new("alpha", "1.1.0", "alpha v2\n")]);
    let updates = hub.check_skill_updates(&url).await.expect("check should succeed");
    let updated = hub
        .apply_skill_update(&updates[0])
        .await
        .expect("update should succeed");
    assert_eq!(updated.version, "1.1.0");
    assert_eq!(
        fs::read_to_string(updated.installed_path.join("SKILL.md")).expect("read"),
        "alpha v2\n"
    );

    let restored = hub
        .rollback_skill("alpha", &AgentType::Claude)
        .expect("rollback should succeed");
    assert_eq!(restored.version, "1.0.0");
    assert_eq!(restored.content_hash, original.content_hash);
    assert_eq!(
        fs::read(restored.installed_path.join("SKILL.md")).expect("read"),
        original_bytes
    );
    assert_eq!(hub.get_all_skills()[0].version.as_deref(), Some("1.0.0"));

    let err = hub
        .rollback_skill("alpha", &AgentType::Claude)
        .expect_err("snapshot is single-use");
    assert_eq!(err.kind(), "NoSnapshotError");
}

#[tokio::test]
async fn test_uninstall_checks_content_first() {
    let env = TestEnv::new();
    let url = write_registry(&env.registry_dir(), &[Published::new("alpha", "1.0.0", "# Alpha\n")]);
    let hub = env.hub();
    let entry = install(&hub, &url, "alpha").await;
    let entry_file = entry.installed_path.join("SKILL.md");

    fs::write(&entry_file, "hand edited").expect("write should succeed");
    let err = hub
        .uninstall_remote_skill("alpha", &AgentType::Claude)
        .expect_err("modified install should be ambiguous");
    assert_eq!(err.kind(), "AmbiguousStateError");
    assert_eq!(fs::read_to_string(&entry_file).expect("read"), "hand edited");
    assert_eq!(hub.get_installed_skills().len(), 1);

    fs::write(&entry_file, "# Alpha\n").expect("write should succeed");
    hub.uninstall_remote_skill("alpha", &AgentType::Claude)
        .expect("uninstall should succeed");
    assert!(!entry.installed_path.exists());
    assert!(hub.get_installed_skills().is_empty());
    assert!(hub.get_all_skills().is_empty());
}

#[tokio::test]
async fn test_http_registry_and_partial_check_errors() {
    let env = TestEnv::new();
    let mut server = mockito::Server::new_async().await;
    let body = serde_json::json!({
        "version": 1,
        "name": "HTTP Registry",
        "skills": [{
            "id": "remote",
            "name": "Remote",
            "version": "1.0.0",
            "files": { "claude": "remote.md" }
        }]
    })
    .to_string();
    let registry_mock = server
        .mock("GET", "/registry.json")
        .with_status(200)
        .with_body(body)
        .expect_at_least(1)
        .create_async()
        .await;
    let payload_mock = server
        .mock("GET", "/remote.md")
        .with_status(200)
        .with_body("# Remote\n")
        .create_async()
        .await;

    let http_url = format!("{}/registry.json", server.url());
    let local_url = write_registry(&env.registry_dir(), &[Published::new("alpha", "1.0.0", "a1")]);
    let hub = env.hub();
    install(&hub, &http_url, "remote").await;
    install(&hub, &local_url, "alpha").await;
    registry_mock.assert_async().await;
    payload_mock.assert_async().await;

    // The HTTP registry starts failing; the local one publishes an update.
    server.reset_async().await;
    let failing = server
        .mock("GET", "/registry.json")
        .with_status(500)
        .create_async()
        .await;
    write_registry(&env.registry_dir(), &[Published::new("alpha", "1.5.0", "a2")]);

    let result = hub.check_for_updates().await;
    failing.assert_async().await;
    assert_eq!(result.available_updates.len(), 1);
    assert_eq!(result.available_updates[0].skill_id, "alpha");
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].registry_url, http_url);
    assert_eq!(result.errors[0].kind, "NetworkError");
}
