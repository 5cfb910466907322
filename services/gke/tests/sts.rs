//! Retry and request-shape tests for the raw two-step exchange.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use bytes::Bytes;
use pretty_assertions::assert_eq;

use fedtoken_core::{Context, ErrorKind, HttpSend, Result};
use fedtoken_gke::{exchange_token, StsRequest};

fn subject_token() -> String {
    let header = URL_SAFE.encode(r#"{"typ":"JWT","alg":"HS256"}"#);
    let payload = URL_SAFE.encode(r#"{"iss":"doge","iat":null,"exp":null,"aud":"","sub":""}"#);
    format!("{header}.{payload}.signature")
}

fn sts_request() -> StsRequest {
    StsRequest {
        subject_token: subject_token(),
        service_account: "gcp-service-account".to_string(),
        identity_namespace: "flyte.svc.id.doge".to_string(),
        ..Default::default()
    }
}

fn response(status: u16, body: &str) -> Result<http::Response<Bytes>> {
    Ok(http::Response::builder()
        .status(status)
        .body(Bytes::from(body.to_string()))
        .unwrap())
}

/// Fake endpoints that answer the federation path with a scripted status
/// sequence and always accept impersonation.
#[derive(Debug)]
struct ScriptedEndpoints {
    federation_statuses: Mutex<VecDeque<u16>>,
    federation_calls: Arc<Mutex<usize>>,
    bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

#[async_trait]
impl HttpSend for ScriptedEndpoints {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        if req.uri().path() == "/v1/identitybindingtoken" {
            *self.federation_calls.lock().unwrap() += 1;
            self.bodies
                .lock()
                .unwrap()
                .push(serde_json::from_slice(req.body()).unwrap());

            let status = self
                .federation_statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(200);
            if status != 200 {
                return response(status, "scripted failure");
            }
            return response(
                200,
                r#"{"access_token": "federated-access-token", "expires_in": 3600}"#,
            );
        }

        response(200, r#"{"access_token": "google-access-token"}"#)
    }
}

struct Fixture {
    ctx: Context,
    federation_calls: Arc<Mutex<usize>>,
    bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

fn fixture(federation_statuses: impl IntoIterator<Item = u16>) -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();

    let federation_calls = Arc::new(Mutex::new(0));
    let bodies = Arc::new(Mutex::new(Vec::new()));

    let ctx = Context::new().with_http_send(ScriptedEndpoints {
        federation_statuses: Mutex::new(federation_statuses.into_iter().collect()),
        federation_calls: federation_calls.clone(),
        bodies: bodies.clone(),
    });

    Fixture {
        ctx,
        federation_calls,
        bodies,
    }
}

#[tokio::test]
async fn test_exchange_succeeds() {
    let fixture = fixture([]);

    let token = exchange_token(&fixture.ctx, sts_request()).await.unwrap();

    assert_eq!(token.access_token, "google-access-token");
    assert_eq!(token.authorization_header(), "Bearer google-access-token");
    assert_eq!(*fixture.federation_calls.lock().unwrap(), 1);

    // Empty scope falls back to the cloud-platform default.
    let bodies = fixture.bodies.lock().unwrap();
    assert_eq!(
        bodies[0]["scope"],
        "https://www.googleapis.com/auth/cloud-platform"
    );
    assert_eq!(
        bodies[0]["audience"],
        "identitynamespace:flyte.svc.id.doge:doge"
    );
}

#[tokio::test]
async fn test_client_error_aborts_immediately() {
    let fixture = fixture([401]);

    let err = exchange_token(&fixture.ctx, sts_request()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExchangeClient);
    assert_eq!(*fixture.federation_calls.lock().unwrap(), 1);
    assert!(!err.to_string().contains(&subject_token()));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let fixture = fixture([500, 503]);

    let token = exchange_token(&fixture.ctx, sts_request()).await.unwrap();

    assert_eq!(token.access_token, "google-access-token");
    assert_eq!(*fixture.federation_calls.lock().unwrap(), 3);
}

#[tokio::test]
async fn test_retry_budget_is_exhausted() {
    let fixture = fixture([500, 500, 500, 500, 500]);

    let err = exchange_token(&fixture.ctx, sts_request()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExchangeTransient);
    assert!(err.to_string().contains("5 attempts"));
    assert_eq!(*fixture.federation_calls.lock().unwrap(), 5);
}

#[tokio::test]
async fn test_cluster_url_overrides_audience_suffix() {
    let fixture = fixture([]);

    let mut request = sts_request();
    request.gke_cluster_url = Some(
        "https://container.googleapis.com/v1/projects/doge/locations/us/clusters/cake".to_string(),
    );
    request.scope = vec!["https://www.googleapis.com/auth/devstorage.read_only".to_string()];

    exchange_token(&fixture.ctx, request).await.unwrap();

    let bodies = fixture.bodies.lock().unwrap();
    assert_eq!(
        bodies[0]["audience"],
        "identitynamespace:flyte.svc.id.doge:https://container.googleapis.com/v1/projects/doge/locations/us/clusters/cake"
    );
    assert_eq!(
        bodies[0]["scope"],
        "https://www.googleapis.com/auth/devstorage.read_only"
    );
}

#[tokio::test]
async fn test_garbage_subject_token_is_rejected() {
    let fixture = fixture([]);

    let mut request = sts_request();
    request.subject_token = "not-a-jwt".to_string();

    let err = exchange_token(&fixture.ctx, request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedSubjectToken);
    assert!(!err.to_string().contains("not-a-jwt"));
    assert_eq!(*fixture.federation_calls.lock().unwrap(), 0);
}
