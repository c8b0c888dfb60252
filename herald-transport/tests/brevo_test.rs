#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use std::sync::Arc;

use herald_transport::{
    BrevoSettings, BrevoTransport, CredentialSource, EmailMessage, SendOutcome, StaticCredentials,
    Transport, TransportError,
    credentials::{BREVO_API_KEY, BREVO_LOGIN, BREVO_SENDER_EMAIL, BREVO_TEST_RECIPIENT},
};
use pretty_assertions::assert_eq;
use support::mock_http::MockApi;

fn brevo(base_url: String, creds: Arc<StaticCredentials>) -> BrevoTransport {
    let creds: Arc<dyn CredentialSource> = creds;
    BrevoTransport::new(
        BrevoSettings {
            base_url,
            timeout_secs: 5,
            ..BrevoSettings::default()
        },
        creds,
    )
}

fn configured() -> Arc<StaticCredentials> {
    Arc::new(StaticCredentials::new([
        (BREVO_API_KEY, "xkeysib-test"),
        (BREVO_SENDER_EMAIL, "noreply@listings.example"),
    ]))
}

fn viewing_confirmation() -> EmailMessage {
    EmailMessage::new(
        "buyer@example.com",
        "Your viewing is confirmed",
        "<p>See you on Saturday</p>",
    )
    .with_reply_to("agent@listings.example")
}

#[tokio::test]
async fn send_posts_to_the_transactional_endpoint() {
    let api = MockApi::start(201, r#"{"messageId":"<202410@smtp-relay.brevo.com>"}"#)
        .await
        .unwrap();
    let transport = brevo(api.base_url(), configured());

    let outcome = transport.send(&viewing_confirmation()).await.unwrap();
    assert_eq!(
        outcome,
        SendOutcome::delivered(Some("<202410@smtp-relay.brevo.com>".to_string()))
    );

    let requests = api.requests().await;
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/v3/smtp/email");
    assert_eq!(request.headers.get("api-key").map(String::as_str), Some("xkeysib-test"));

    let body = request.json();
    assert_eq!(body["sender"]["email"], "noreply@listings.example");
    assert_eq!(body["sender"]["name"], "Herald");
    assert_eq!(body["to"][0]["email"], "buyer@example.com");
    assert_eq!(body["subject"], "Your viewing is confirmed");
    assert_eq!(body["htmlContent"], "<p>See you on Saturday</p>");
    assert_eq!(body["replyTo"]["email"], "agent@listings.example");
    assert!(body.get("textContent").is_none());

    api.shutdown();
}

#[tokio::test]
async fn rejection_is_a_failed_outcome() {
    let api = MockApi::start(400, r#"{"code":"invalid_parameter","message":"email is not valid"}"#)
        .await
        .unwrap();
    let transport = brevo(api.base_url(), configured());

    let outcome = transport.send(&viewing_confirmation()).await.unwrap();

    assert!(!outcome.success);
    let error = outcome.error.unwrap();
    assert!(error.contains("400"), "{error}");
    assert!(error.contains("email is not valid"), "{error}");

    api.shutdown();
}

#[tokio::test]
async fn without_a_key_no_request_is_ever_made() {
    let api = MockApi::start(201, "{}").await.unwrap();
    let transport = brevo(api.base_url(), Arc::new(StaticCredentials::default()));

    for _ in 0..5 {
        let outcome = transport.send(&viewing_confirmation()).await.unwrap();
        assert_eq!(outcome, SendOutcome::failure("Brevo not configured"));
    }

    assert!(api.requests().await.is_empty());
    assert!(!transport.status().is_initialized);

    api.shutdown();
}

#[tokio::test]
async fn key_exported_later_is_picked_up() {
    let api = MockApi::start(201, r#"{"messageId":"<1@brevo>"}"#).await.unwrap();
    let creds = Arc::new(StaticCredentials::new([(BREVO_LOGIN, "login@listings.example")]));
    let transport = brevo(api.base_url(), Arc::clone(&creds));

    assert!(!transport.send(&viewing_confirmation()).await.unwrap().success);

    creds.set(BREVO_API_KEY, "xkeysib-late");
    let outcome = transport.send(&viewing_confirmation()).await.unwrap();
    assert!(outcome.success);

    let requests = api.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].json()["sender"]["email"], "login@listings.example");

    api.shutdown();
}

#[tokio::test]
async fn sender_exported_after_the_key_is_picked_up() {
    let api = MockApi::start(201, r#"{"messageId":"<2@brevo>"}"#).await.unwrap();
    let creds = Arc::new(StaticCredentials::new([(BREVO_API_KEY, "xkeysib-test")]));
    let transport = brevo(api.base_url(), Arc::clone(&creds));

    let first = transport.send(&viewing_confirmation()).await.unwrap();
    assert!(!first.success);
    assert!(transport.status().is_initialized);

    creds.set(BREVO_SENDER_EMAIL, "noreply@listings.example");
    let second = transport.send(&viewing_confirmation()).await.unwrap();
    assert_eq!(second, SendOutcome::delivered(Some("<2@brevo>".to_string())));

    let requests = api.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].json()["sender"]["email"], "noreply@listings.example");

    api.shutdown();
}

#[tokio::test]
async fn network_failure_is_an_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let transport = brevo(format!("http://127.0.0.1:{port}"), configured());

    let err = transport.send(&viewing_confirmation()).await.unwrap_err();
    assert!(matches!(err, TransportError::Http(_)));
}

#[tokio::test]
async fn test_connection_uses_the_configured_recipient() {
    let api = MockApi::start(201, r#"{"messageId":"<t@brevo>"}"#).await.unwrap();
    let creds = configured();
    let transport = brevo(api.base_url(), Arc::clone(&creds));

    let outcome = transport.test_connection(None).await.unwrap();
    assert!(!outcome.success);
    assert!(api.requests().await.is_empty());

    creds.set(BREVO_TEST_RECIPIENT, "ops@listings.example");
    assert!(transport.test_connection(None).await.unwrap().success);
    assert!(
        transport
            .test_connection(Some("oncall@listings.example"))
            .await
            .unwrap()
            .success
    );

    let recipients: Vec<_> = api
        .requests()
        .await
        .iter()
        .map(|r| r.json()["to"][0]["email"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(recipients, ["ops@listings.example", "oncall@listings.example"]);

    api.shutdown();
}
