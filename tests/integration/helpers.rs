//! Shared helpers for integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono_task::notify::RecordingNotifier;
use chrono_task::store::JsonFileStore;
use chrono_task::tracker::JiraClient;
use chrono_task::vcs::{GitBackend, VersionControlBackend};
use chrono_task::{App, Backends, Settings, chrono_dirs};

/// Settings whose data directory lives under `root`.
pub(crate) fn temp_settings(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.storage.data_dir = Some(root.join("data"));
    settings
}

pub(crate) fn config_path(root: &Path) -> PathBuf {
    root.join("config").join("config.toml")
}

/// Production backends except for a recording notifier and an optional
/// tracker base URL.
pub(crate) fn backends(
    settings: &Settings,
    tracker_base: Option<&str>,
) -> (Backends, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let tracker = match tracker_base {
        Some(base) => JiraClient::new().with_base_url(base),
        None => JiraClient::new(),
    };
    let backends = Backends {
        store: Arc::new(JsonFileStore::new(chrono_dirs::data_file(
            &settings.data_root(),
        ))),
        vcs: Arc::new(GitBackend::new()),
        tracker: Arc::new(tracker),
        notifier: notifier.clone(),
    };
    (backends, notifier)
}

/// App over a temp directory with real file store and git.
pub(crate) fn temp_app(root: &Path, settings: Settings) -> App {
    let (backends, _) = backends(&settings, None);
    App::with_backends(settings, config_path(root), backends).expect("open app")
}

/// Whether a working `git` binary is on `PATH`.
pub(crate) fn git_available() -> bool {
    GitBackend::new().is_available()
}
