//! Status sync against a mock Jira server.

use chrono_task::{App, Settings, TaskStatus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{backends, config_path, temp_settings};

fn issue(key: &str, status: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "key": key,
        "fields": {
            "summary": format!("Summary of {key}"),
            "status": { "name": status }
        }
    }))
}

fn app_with_tracker(root: &std::path::Path, server: &MockServer) -> App {
    let mut settings: Settings = temp_settings(root);
    settings.tracker.email = "me@example.com".to_owned();
    settings.tracker.api_token = "token".to_owned();
    let uri = server.uri();
    let (backends, _) = backends(&settings, Some(uri.as_str()));
    App::with_backends(settings, config_path(root), backends).expect("open app")
}

#[tokio::test]
async fn refresh_maps_statuses_and_isolates_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/issue/APP-1"))
        .respond_with(issue("APP-1", "Closed"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/issue/APP-2"))
        .respond_with(issue("APP-2", "In Progress"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/issue/APP-3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let app = app_with_tracker(dir.path(), &server);
    let registry = app.registry();

    let mut tasks = Vec::new();
    for key in ["APP-1", "APP-2", "APP-3"] {
        let task = registry.create(format!("Task {key}")).unwrap();
        registry
            .set_tracker_url(
                &task,
                Some(format!("https://acme.atlassian.net/browse/{key}")),
            )
            .unwrap();
        tasks.push(task);
    }

    assert_eq!(app.status_sync().refresh_now().await, 2);
    assert_eq!(tasks[0].status(), TaskStatus::Done);
    assert_eq!(tasks[1].status(), TaskStatus::InProgress);
    assert_eq!(tasks[2].status(), TaskStatus::Todo);
    assert!(!app.status_sync().is_refreshing());

    // Done tasks are no longer fetched.
    let requests_before = server.received_requests().await.unwrap_or_default().len();
    app.status_sync().refresh_now().await;
    let requests_after = server.received_requests().await.unwrap_or_default().len();
    assert_eq!(requests_after - requests_before, 2);
}

#[tokio::test]
async fn linking_an_issue_adopts_its_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/3/issue/APP-9"))
        .respond_with(issue("APP-9", "Final Check"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let app = app_with_tracker(dir.path(), &server);
    let task = app.registry().create("Ship it").unwrap();

    let issue = app
        .status_sync()
        .link_issue(&task, "https://acme.atlassian.net/browse/APP-9")
        .await
        .unwrap()
        .expect("credentials are set");

    assert_eq!(issue.summary, "Summary of APP-9");
    assert_eq!(task.status(), TaskStatus::Validation);
    assert_eq!(task.read().tracker_key().as_deref(), Some("APP-9"));
}
