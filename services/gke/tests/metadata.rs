//! Tests for the metadata-server token source against a fake endpoint.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use pretty_assertions::assert_eq;

use fedtoken_core::{Context, HttpSend, Result, StaticEnv};
use fedtoken_gke::{Identity, MetadataTokenSource, TokenSource, TokenSourceConfig};

/// Fake metadata server that counts hits.
#[derive(Debug)]
struct FakeMetadataServer {
    calls: Arc<Mutex<usize>>,
}

#[async_trait]
impl HttpSend for FakeMetadataServer {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        *self.calls.lock().unwrap() += 1;

        assert_eq!(
            req.uri().path(),
            "/computeMetadata/v1/instance/service-accounts/default/token"
        );
        assert_eq!(
            req.headers().get("Metadata-Flavor").unwrap(),
            &http::HeaderValue::from_static("Google")
        );

        Ok(http::Response::builder()
            .status(200)
            .body(Bytes::from_static(
                br#"{
                    "access_token": "metadata-access-token",
                    "expires_in": 3600,
                    "token_type": "Bearer"
                }"#,
            ))
            .unwrap())
    }
}

#[tokio::test]
async fn test_fetches_and_caches_metadata_token() {
    let calls = Arc::new(Mutex::new(0));
    let ctx = Context::new().with_http_send(FakeMetadataServer {
        calls: calls.clone(),
    });

    let source =
        MetadataTokenSource::new(TokenSourceConfig::new()).with_endpoint("metadata.test:80");

    let first = source
        .token_source(&ctx, Identity::new("namespace", "name"))
        .await
        .unwrap();
    assert_eq!(first.token().access_token, "metadata-access-token");
    assert_eq!(first.authorization_header(), "Bearer metadata-access-token");

    // The identity is irrelevant for the metadata source; any caller
    // reuses the node token until it expires.
    let second = source
        .token_source(&ctx, Identity::new("other", "default"))
        .await
        .unwrap();
    assert_eq!(second.token().access_token, "metadata-access-token");

    assert_eq!(*calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_metadata_host_from_environment() {
    let calls = Arc::new(Mutex::new(0));
    let ctx = Context::new()
        .with_http_send(FakeMetadataServer {
            calls: calls.clone(),
        })
        .with_env(StaticEnv {
            envs: [("GCE_METADATA_HOST".to_string(), "metadata.test:80".to_string())].into(),
        });

    let source = MetadataTokenSource::new(TokenSourceConfig::new());

    let provider = source
        .token_source(&ctx, Identity::new("namespace", "name"))
        .await
        .unwrap();

    assert_eq!(provider.token().access_token, "metadata-access-token");
    assert_eq!(*calls.lock().unwrap(), 1);
}
