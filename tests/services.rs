//! Integration tests for entity services.

mod common;

use common::*;
use integrations_platform::mocks::{error_body, MockAuthenticator};
use integrations_platform::{Comment, Params, PlatformErrorKind};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_regions_are_extracted_from_wrapper() {
    let server = setup_mock_server().await;
    let auth = MockAuthenticator::new();
    let client = client_with(&server, &auth);

    Mock::given(method("GET"))
        .and(path("/platform/regions"))
        .respond_with(success_response(json!({
            "regions": [
                {"id": "eu-3.platform.sh", "available": true, "zone": "Europe"},
                {"id": "us-4.platform.sh", "available": false, "zone": "North America"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let regions = client.regions().list(Params::new()).await.unwrap();

    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0].zone, "Europe");
    assert!(!regions[1].available);
}

#[tokio::test]
async fn test_missing_payment_source_is_none() {
    let server = setup_mock_server().await;
    let auth = MockAuthenticator::new();
    let client = client_with(&server, &auth);

    Mock::given(method("GET"))
        .and(path("/platform/payment_source"))
        .respond_with(error_response(404, error_body(404, "No payment source")))
        .expect(1)
        .mount(&server)
        .await;

    let source = client.payment_sources().get(Params::new()).await.unwrap();
    assert!(source.is_none());
}

#[tokio::test]
async fn test_payment_source_server_error_propagates() {
    let server = setup_mock_server().await;
    let auth = MockAuthenticator::new();
    let client = client_with(&server, &auth);

    Mock::given(method("GET"))
        .and(path("/platform/payment_source"))
        .respond_with(error_response(503, error_body(503, "Maintenance")))
        .mount(&server)
        .await;

    let err = client.payment_sources().get(Params::new()).await.unwrap_err();
    assert_eq!(*err.kind(), PlatformErrorKind::ServiceUnavailable);
}

#[tokio::test]
async fn test_credit_card_payment_source_is_normalized() {
    let server = setup_mock_server().await;
    let auth = MockAuthenticator::new();
    let client = client_with(&server, &auth);

    Mock::given(method("GET"))
        .and(path("/platform/payment_source"))
        .respond_with(success_response(json!({
            "payment_source": {
                "id": "ps-1",
                "type": "credit-card",
                "data": {"exp_month": "12", "last4": "4242"}
            }
        })))
        .mount(&server)
        .await;

    let source = client
        .payment_sources()
        .get(Params::new())
        .await
        .unwrap()
        .expect("payment source present");
    assert_eq!(source.source_type, "credit-card");
    assert_eq!(source.card, Some(json!({"exp_month": "12", "last4": "4242"})));
}

#[tokio::test]
async fn test_comments_list_and_send() {
    let server = setup_mock_server().await;
    let auth = MockAuthenticator::new();
    let client = client_with(&server, &auth);

    Mock::given(method("GET"))
        .and(path("/v1/comments/t-1"))
        .respond_with(success_response(json!({
            "comments": [{"comment_id": "c-1", "ticket_id": "t-1", "body": "hello"}],
            "count": 1
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/comments"))
        .and(body_json(json!({"body": "reply", "ticket_id": "t-1", "attachments": []})))
        .respond_with(success_response(json!({
            "comment_id": "c-2",
            "ticket_id": "t-1",
            "body": "reply"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let comments = client.comments().list("t-1", Params::new()).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].body, "hello");

    let sent = client
        .comments()
        .send(Comment::new("t-1", "reply"))
        .await
        .unwrap();
    assert_eq!(sent.comment_id.as_deref(), Some("c-2"));
}

#[tokio::test]
async fn test_address_query_accepts_single_object() {
    let server = setup_mock_server().await;
    let auth = MockAuthenticator::new();
    let client = client_with(&server, &auth);

    Mock::given(method("GET"))
        .and(path("/v1/profiles/u-1/address"))
        .respond_with(success_response(json!({
            "id": "u-1",
            "country": "FR",
            "locality": "Paris"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let addresses = client.addresses().query("u-1", Params::new()).await.unwrap();
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0].locality.as_deref(), Some("Paris"));
}

#[tokio::test]
async fn test_two_factor_lifecycle() {
    let server = setup_mock_server().await;
    let auth = MockAuthenticator::new();
    let client = client_with(&server, &auth);

    Mock::given(method("GET"))
        .and(path("/users/u-1/totp"))
        .respond_with(success_response(json!({
            "issuer": "Platform",
            "account_name": "dev@example.com",
            "secret": "JBSWY3DP",
            "qr_code": "data:image/png;base64,AAAA"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/u-1/totp"))
        .and(body_json(json!({"secret": "JBSWY3DP", "passcode": "123456"})))
        .respond_with(success_response(json!({"recovery_codes": ["a1", "b2"]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/u-1/codes"))
        .respond_with(success_response(json!({"recovery_codes": ["c3"]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/users/u-1/totp"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let two_factor = client.two_factor();

    let enrollment = two_factor.get("u-1").await.unwrap();
    assert_eq!(enrollment.secret, "JBSWY3DP");
    assert_eq!(enrollment.issuer, "Platform");

    let enrolled = two_factor.enroll("u-1", "JBSWY3DP", "123456").await.unwrap();
    assert_eq!(enrolled.as_json(), Some(&json!({"recovery_codes": ["a1", "b2"]})));

    let codes = two_factor.reset("u-1").await.unwrap().into_value().await.unwrap();
    assert_eq!(codes["recovery_codes"], json!(["c3"]));

    two_factor.delete("u-1").await.unwrap();
}
