//! Backups into a real git repository.

use std::process::Command;

use chrono_task::chrono_dirs;
use chrono_task::scheduler::JobStart;
use chrono_task::vcs::CommitOutcome;

use crate::helpers::{git_available, temp_app, temp_settings};

#[tokio::test]
async fn backup_commits_saved_data_once() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let app = temp_app(dir.path(), temp_settings(dir.path()));
    assert_eq!(app.backup().last_backup_message().await, None);

    app.registry().create("Backed up").unwrap();
    app.registry().persist().unwrap();

    let outcome = app.backup().backup_now().await.unwrap();
    let CommitOutcome::Committed(message) = outcome else {
        panic!("expected a commit, got {outcome:?}");
    };
    assert!(message.starts_with("Backup "));
    assert!(app.settings().data_root().join(".git").is_dir());

    assert_eq!(
        app.backup().backup_now().await.unwrap(),
        CommitOutcome::NothingToCommit
    );
    assert_eq!(app.backup().last_backup_message().await, Some(message));
}

#[tokio::test]
async fn log_files_in_data_root_are_not_backed_up() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let app = temp_app(dir.path(), temp_settings(dir.path()));
    let root = app.settings().data_root();
    let log = chrono_dirs::logs_dir(&root).join("chrono-task.2026-10-18.log");
    std::fs::create_dir_all(log.parent().unwrap()).unwrap();
    std::fs::write(&log, "started\n").unwrap();

    app.registry().create("Logged").unwrap();
    app.registry().persist().unwrap();
    assert!(matches!(
        app.backup().backup_now().await.unwrap(),
        CommitOutcome::Committed(_)
    ));

    let tracked = Command::new("git")
        .arg("ls-files")
        .current_dir(&root)
        .output()
        .unwrap();
    let tracked = String::from_utf8_lossy(&tracked.stdout);
    assert_eq!(tracked.lines().collect::<Vec<_>>(), [".gitignore", "data.json"]);

    std::fs::write(&log, "started\nbackup committed\n").unwrap();
    assert_eq!(
        app.backup().backup_now().await.unwrap(),
        CommitOutcome::NothingToCommit
    );
}

#[tokio::test]
async fn shutdown_commits_final_state_when_enabled() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let mut settings = temp_settings(dir.path());
    settings.backup.enabled = true;
    let app = temp_app(dir.path(), settings.clone());

    app.start().await;
    assert!(app.backup().is_running().await);
    app.registry().create("Last minute task").unwrap();
    app.shutdown().await.unwrap();

    let reopened = temp_app(dir.path(), settings);
    let message = reopened.backup().last_backup_message().await;
    assert!(message.is_some_and(|m| m.starts_with("Backup ")));
    assert_eq!(
        reopened.backup().backup_now().await.unwrap(),
        CommitOutcome::NothingToCommit,
        "final save was part of the final backup"
    );
}

#[tokio::test]
async fn disabled_backup_does_not_start() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = temp_app(dir.path(), temp_settings(dir.path()));
    assert_eq!(app.backup().start().await.unwrap(), JobStart::Disabled);
    assert!(!app.backup().is_running().await);
}
