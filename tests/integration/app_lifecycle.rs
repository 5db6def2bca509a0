//! Start/shutdown of a full application instance.

use std::time::Duration;

use chrono_task::ChronoEvent;

use crate::helpers::{temp_app, temp_settings};

#[tokio::test]
async fn shutdown_persists_running_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = temp_settings(dir.path());

    let app = temp_app(dir.path(), settings.clone());
    let mut events = app.events().subscribe();
    app.start().await;

    let task = app.registry().create("Timed").unwrap();
    app.timer().set_active(Some(task));
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    app.shutdown().await.unwrap();

    let mut saw_save = false;
    while let Ok(event) = events.try_recv() {
        saw_save |= matches!(event, ChronoEvent::Saved { .. });
    }
    assert!(saw_save);

    let reopened = temp_app(dir.path(), settings);
    let task = reopened
        .registry()
        .find_by_description("Timed")
        .expect("task saved");
    assert!(task.read().duration_today() >= chrono::TimeDelta::seconds(1));
}

#[tokio::test]
async fn switching_task_clears_pause() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = temp_app(dir.path(), temp_settings(dir.path()));
    let a = app.registry().create("A").unwrap();
    let b = app.registry().create("B").unwrap();

    app.timer().set_active(Some(a));
    app.timer().pause();
    assert!(app.timer().is_paused());

    app.timer().set_active(Some(b.clone()));
    assert!(!app.timer().is_paused());
    assert_eq!(app.timer().active_task(), Some(b));
}
