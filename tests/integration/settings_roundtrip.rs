//! Settings file loading and saving.

use std::time::Duration;

use chrono_task::Settings;

#[test]
fn partial_file_fills_in_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[tracker]
email = "me@example.com"

[backup]
enabled = true
interval = 0
unit = "minutes"
"#,
    )
    .unwrap();

    let settings = Settings::from_file(&path).unwrap();
    assert_eq!(settings.tracker.email, "me@example.com");
    assert!(settings.tracker.credentials().is_none(), "token is blank");
    assert!(settings.backup.enabled);
    assert_eq!(settings.backup.period(), Duration::from_secs(60));
    assert_eq!(settings.status_sync, Settings::default().status_sync);
    assert_eq!(settings.autosave_period(), Duration::from_secs(30));
    assert_eq!(settings.tick_period(), Duration::from_secs(1));
}

#[test]
fn malformed_file_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[backup\nenabled = ").unwrap();

    let err = Settings::from_file(&path).unwrap_err();
    assert!(matches!(err, chrono_task::ChronoError::Config(_)));
}
