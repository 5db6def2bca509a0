//! Task collection survives a restart through the JSON file store.

use chrono::TimeDelta;
use chrono_task::TaskStatus;
use chrono_task::chrono_dirs;
use chrono_task::model::today;

use crate::helpers::{temp_app, temp_settings};

#[test]
fn tasks_ledger_and_order_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = temp_settings(dir.path());

    {
        let app = temp_app(dir.path(), settings.clone());
        let registry = app.registry();
        let first = registry.create("Write report").unwrap();
        let second = registry.create("Review PR").unwrap();
        registry
            .set_tracker_url(
                &second,
                Some("https://acme.atlassian.net/browse/PR-42".to_owned()),
            )
            .unwrap();
        registry.reorder(vec![second.clone(), first.clone()]);

        first
            .add_duration(today(), TimeDelta::minutes(25))
            .unwrap();
        first.set_note(today(), "outline done");
        second.set_status(TaskStatus::InProgress);
        second.add_tag("review");
        registry.update(&second, |t| t.set_notes("# Checklist\n- tests"));

        // Noise from an abandoned start three days ago is pruned on save.
        first
            .add_duration(today() - TimeDelta::days(3), TimeDelta::seconds(40))
            .unwrap();

        registry.persist().unwrap();
        assert!(registry.last_saved_at().is_some());
    }

    assert!(chrono_dirs::data_file(&settings.data_root()).exists());

    let app = temp_app(dir.path(), settings);
    let tasks = app.registry().tasks();
    assert_eq!(tasks.len(), 2);

    let review = tasks[0].read();
    assert_eq!(review.description(), "Review PR");
    assert_eq!(review.order(), 0);
    assert!(review.is_linked_to_tracker());
    assert_eq!(review.label(), "0 - PR-42: Review PR");
    assert_eq!(review.status(), TaskStatus::InProgress);
    assert_eq!(review.tags().to_vec(), vec!["review".to_owned()]);
    assert_eq!(review.notes(), "# Checklist\n- tests");

    let report = tasks[1].read();
    assert_eq!(report.description(), "Write report");
    assert_eq!(report.duration_today(), TimeDelta::minutes(25));
    assert_eq!(report.note(today()), "outline done");
    assert_eq!(report.history().len(), 1);
}

#[test]
fn uniqueness_holds_after_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = temp_settings(dir.path());

    let app = temp_app(dir.path(), settings.clone());
    app.registry().create("Only once").unwrap();
    app.registry().persist().unwrap();
    drop(app);

    let app = temp_app(dir.path(), settings);
    let err = app.registry().create("Only once").unwrap_err();
    assert!(err.is_validation());
}
