//! Router-level tests driving the service with in-memory state.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use grab_core::{Correlation, Instance, InstanceStore, ThreadReference, WikiCredentials};
use grab_server::{AppState, ServerConfig, create_router_with_state};
use grab_slack::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use grab_slack::{SignatureVerifier, SlackAppConfig};
use grab_storage::MemoryInstanceStore;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";

fn instance(team: &str) -> Instance {
    Instance::new(
        team,
        "xoxb-test",
        WikiCredentials::new("https://wiki.example.org/w", "GrabBot", "pw"),
    )
}

fn app_with(slack: SlackAppConfig, store: Arc<MemoryInstanceStore>) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(ServerConfig::new(slack), store).unwrap());
    (create_router_with_state(Arc::clone(&state)), state)
}

fn app(store: Arc<MemoryInstanceStore>) -> Router {
    app_with(SlackAppConfig::new(SECRET), store).0
}

fn signed(uri: &str, content_type: &str, body: String) -> Request<Body> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        .to_string();
    let signature = SignatureVerifier::new(SECRET)
        .sign(&timestamp, body.as_bytes())
        .unwrap();

    Request::post(uri)
        .header(header::CONTENT_TYPE, content_type)
        .header(TIMESTAMP_HEADER, timestamp)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let response = app(Arc::new(MemoryInstanceStore::new()))
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn url_verification_echoes_challenge() {
    let body = json!({"type": "url_verification", "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"});
    let response = app(Arc::new(MemoryInstanceStore::new()))
        .oneshot(signed("/slack/events", "application/json", body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["challenge"],
        "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"
    );
}

#[tokio::test]
async fn unsigned_requests_are_rejected() {
    let body = json!({"type": "url_verification", "challenge": "x"}).to_string();
    let mut request = signed("/slack/events", "application/json", body);
    request
        .headers_mut()
        .insert(SIGNATURE_HEADER, "v0=deadbeef".parse().unwrap());

    let response = app(Arc::new(MemoryInstanceStore::new()))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::post("/slack/events")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app(Arc::new(MemoryInstanceStore::new()))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"]["code"], "authentication_failed");
}

#[tokio::test]
async fn uninstall_removes_instance() {
    let store = Arc::new(MemoryInstanceStore::with_instances([instance("T1"), instance("T2")]));
    let body = json!({
        "type": "event_callback",
        "team_id": "T1",
        "event_id": "Ev1",
        "event": {"type": "app_uninstalled"}
    });

    let response = app(Arc::clone(&store))
        .oneshot(signed("/slack/events", "application/json", body.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(store.resolve_by_org_id("T1").await.is_err());
    assert!(store.resolve_by_org_id("T2").await.is_ok());
}

#[tokio::test]
async fn bad_start_link_is_reported_in_modal() {
    let store = Arc::new(MemoryInstanceStore::with_instances([instance("T1")]));
    let correlation = Correlation {
        team_id: "T1".into(),
        channel_id: "C1".into(),
        user_id: "U1".into(),
        reference: ThreadReference::thread("1700000000.000100"),
        response_url: None,
    };
    let payload = json!({
        "type": "view_submission",
        "team": {"id": "T1"},
        "user": {"id": "U1"},
        "view": {
            "callback_id": "grab_thread",
            "private_metadata": correlation.encode(),
            "state": {"values": {
                "range_block": {"range_start": {"type": "plain_text_input", "value": "not a link"}}
            }}
        }
    });
    // Browsers and Slack encode spaces in form bodies as `+`.
    let body = format!("payload={}", urlencoding::encode(&payload.to_string())).replace("%20", "+");

    let response = app(store)
        .oneshot(signed(
            "/slack/interactions",
            "application/x-www-form-urlencoded",
            body,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["response_action"], "errors");
    assert!(body["errors"].as_object().is_some_and(|e| e.len() == 1));
}

#[tokio::test]
async fn install_requires_oauth() {
    let response = app(Arc::new(MemoryInstanceStore::new()))
        .oneshot(Request::get("/install").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn install_round_trip_stores_instance() {
    let slack = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth.v2.access"))
        .and(body_string_contains("code=c0de"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "access_token": "xoxb-installed",
            "token_type": "bot",
            "bot_user_id": "UBOT",
            "team": {"id": "T9", "name": "Acme"}
        })))
        .expect(1)
        .mount(&slack)
        .await;

    let store = Arc::new(MemoryInstanceStore::new());
    let config = SlackAppConfig::new(SECRET)
        .with_oauth("1.2", "client-secret", None)
        .with_api_base(slack.uri());
    let (router, _state) = app_with(config, Arc::clone(&store));

    let form = "wiki_url=https%3A%2F%2Fwiki.corp%2Fw&wiki_username=alice&wiki_password=pw&wiki_domain=";
    let response = router
        .clone()
        .oneshot(
            Request::post("/install")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("https://slack.com/oauth/v2/authorize?client_id=1.2"));
    let token = location
        .split('&')
        .find_map(|pair| pair.strip_prefix("state="))
        .unwrap()
        .to_string();

    let response = router
        .clone()
        .oneshot(
            Request::get(format!("/slack/oauth/callback?code=c0de&state={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = store.resolve_by_org_id("T9").await.unwrap();
    assert_eq!(stored.wiki.url, "https://wiki.corp/w");
    assert_eq!(stored.wiki.username, "alice");
    assert_eq!(stored.slack_bot_user_id.as_deref(), Some("UBOT"));

    // The state token is single-use.
    let response = router
        .oneshot(
            Request::get(format!("/slack/oauth/callback?code=c0de&state={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
}
