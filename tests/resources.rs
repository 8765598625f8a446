//! Integration tests for HAL resources and environment actions.

mod common;

use common::*;
use integrations_platform::mocks::{activity_envelope, hal, MockAuthenticator};
use integrations_platform::{
    ActivityState, ApiBase, Entity, Environment, EnvironmentStatus, PlatformErrorKind, Resource, Schema,
};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct Note {
    #[serde(default)]
    id: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    internal: Option<String>,
}

impl Entity for Note {
    const SCHEMA: Schema = Schema::new(ApiBase::Api, "/notes/:id").creatable(&["body"]);
}

fn environment(server_uri: &str, status: &str) -> serde_json::Value {
    let base = format!("{}/projects/p1/environments/main", server_uri);
    let activate = format!("{}/activate", base);
    hal(
        json!({
            "id": "main",
            "title": "Main",
            "status": status,
            "project": "p1",
            "parent": null
        }),
        &[
            ("self", base.as_str()),
            ("#edit", base.as_str()),
            ("#activate", activate.as_str()),
        ],
    )
}

#[tokio::test]
async fn test_save_sends_only_creatable_fields() {
    let server = setup_mock_server().await;
    let auth = MockAuthenticator::new();
    let client = client_with(&server, &auth);

    Mock::given(method("POST"))
        .and(path("/notes"))
        .and(body_json(json!({"body": "x"})))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(hal(json!({"id": "n1", "body": "x"}), &[("self", "/notes/n1")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut note = Resource::new(Note {
        body: "x".to_string(),
        internal: Some("local only".to_string()),
        ..Default::default()
    });
    note.save(&client).await.unwrap();

    assert_eq!(note.id, "n1");
    assert_eq!(note.link("self").unwrap(), "/notes/n1");
}

#[tokio::test]
async fn test_environment_update_patches_edit_link() {
    let server = setup_mock_server().await;
    let auth = MockAuthenticator::new();
    let client = client_with(&server, &auth);

    Mock::given(method("GET"))
        .and(path("/projects/p1/environments/main"))
        .respond_with(success_response(environment(&server.uri(), "inactive")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/projects/p1/environments/main"))
        .and(body_json(json!({"title": "Renamed"})))
        .respond_with(success_response(json!({
            "id": "main",
            "title": "Renamed",
            "status": "inactive"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut env = client.environments().get("p1", "main").await.unwrap();
    assert_eq!(env.status, EnvironmentStatus::Inactive);

    client
        .environments()
        .update(&mut env, json!({"title": "Renamed", "name": "ignored"}))
        .await
        .unwrap();

    assert_eq!(env.title, "Renamed");
    assert_eq!(env.project, "p1");
    assert!(env.has_link("#activate"));
}

#[tokio::test]
async fn test_missing_link_makes_no_request() {
    let server = setup_mock_server().await;
    let auth = MockAuthenticator::new();
    let client = client_with(&server, &auth);

    Mock::given(method("GET"))
        .and(path("/projects/p1/environments/main"))
        .respond_with(success_response(environment(&server.uri(), "active")))
        .expect(1)
        .mount(&server)
        .await;

    let env = client.environments().get("p1", "main").await.unwrap();

    let err = env.link("nonexistent").unwrap_err();
    assert_eq!(*err.kind(), PlatformErrorKind::LinkNotFound);

    let err = env.redeploy(&client).await.unwrap_err();
    assert_eq!(*err.kind(), PlatformErrorKind::LinkNotFound);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_active_environment_delete_is_rejected() {
    let server = setup_mock_server().await;
    let auth = MockAuthenticator::new();
    let client = client_with(&server, &auth);

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let env: Resource<Environment> = Resource::from_value(
        environment(&server.uri(), "active"),
        Default::default(),
        None,
    )
    .unwrap();

    let err = client.environments().delete(&env).await.unwrap_err();
    assert_eq!(*err.kind(), PlatformErrorKind::InvalidState);
    assert_eq!(auth.calls(), 0);
}

#[tokio::test]
async fn test_activate_returns_started_activity() {
    let server = setup_mock_server().await;
    let auth = MockAuthenticator::new();
    let client = client_with(&server, &auth);

    Mock::given(method("POST"))
        .and(path("/projects/p1/environments/main/activate"))
        .respond_with(
            ResponseTemplate::new(202).set_body_json(activity_envelope("act-1", "environment.activate")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let env: Resource<Environment> = Resource::from_value(
        environment(&server.uri(), "inactive"),
        Default::default(),
        None,
    )
    .unwrap();

    let activity = env.activate(&client).await.unwrap();
    assert_eq!(activity.id, "act-1");
    assert_eq!(activity.activity_type, "environment.activate");
    assert_eq!(activity.state, ActivityState::Pending);
}

#[tokio::test]
async fn test_activate_active_environment_is_rejected() {
    let server = setup_mock_server().await;
    let auth = MockAuthenticator::new();
    let client = client_with(&server, &auth);

    let env: Resource<Environment> = Resource::from_value(
        environment(&server.uri(), "active"),
        Default::default(),
        None,
    )
    .unwrap();

    let err = env.activate(&client).await.unwrap_err();
    assert_eq!(*err.kind(), PlatformErrorKind::InvalidState);
    assert!(server.received_requests().await.unwrap().is_empty());
}
