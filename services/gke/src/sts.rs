//! The two-step STS exchange: federation, then impersonation.
//!
//! See <https://cloud.google.com/iam/docs/access-resources-oidc>:
//!
//! 1. Obtain an OIDC token from the identity provider (the subject token).
//! 2. Pass it to the Security Token Service to get a federated access
//!    token asserting the workload identity within an identity namespace.
//! 3. Call `generateAccessToken` to exchange the federated token for a
//!    service account access token, since only a limited number of Google
//!    Cloud APIs accept federated tokens directly.

use bytes::Bytes;
use chrono::TimeDelta;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{Method, StatusCode};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use fedtoken_core::time::now;
use fedtoken_core::{Context, Error, Result};

use crate::constants::*;
use crate::jwt;
use crate::token::Token;

/// Parameters of one exchange attempt. Transient, constructed per attempt.
#[derive(Clone, Debug, Default)]
pub struct StsRequest {
    /// External credential issued by the workload identity pool provider.
    /// Secret: never logged, never part of error messages.
    pub subject_token: String,

    /// OAuth 2.0 scopes to include on the resulting access token. Empty
    /// means the cloud-platform default scope.
    pub scope: Vec<String>,

    /// Google service account to impersonate.
    pub service_account: String,

    /// Workload identity namespace, e.g. `[project_id].svc.id.goog`.
    pub identity_namespace: String,

    /// GKE cluster URL. When set it is used as the audience suffix in
    /// place of the issuer extracted from the subject token (a GKE-minted
    /// token's issuer is the cluster URL).
    pub gke_cluster_url: Option<String>,

    /// Override of the federation endpoint, mainly for testing.
    pub federated_token_endpoint: Option<String>,

    /// Override of the IAM credentials endpoint, mainly for testing.
    pub iam_credentials_endpoint: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FederatedTokenRequest<'a> {
    audience: &'a str,
    grant_type: &'static str,
    requested_token_type: &'static str,
    subject_token_type: &'static str,
    subject_token: &'a str,
    scope: &'a str,
}

#[derive(Deserialize)]
struct FederatedTokenResponse {
    access_token: String,
    #[serde(default)]
    #[allow(dead_code)]
    issued_token_type: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    /// Expiration time in seconds.
    #[serde(default)]
    expires_in: i64,
}

#[derive(Serialize)]
struct GenerateAccessTokenRequest<'a> {
    scope: &'a [String],
    lifetime: &'static str,
}

#[derive(Deserialize)]
struct GenerateAccessTokenResponse {
    #[serde(alias = "accessToken")]
    access_token: String,
}

/// Runs the full two-step exchange and returns the resulting Google
/// credential.
///
/// The returned token carries the federation-layer expiry: the
/// impersonated token's lifetime is a fixed constant known in advance, so
/// the federation expiry is authoritative for caching.
pub async fn exchange_token(ctx: &Context, mut request: StsRequest) -> Result<Token> {
    if request.scope.is_empty() {
        request.scope = vec![DEFAULT_SCOPE.to_string()];
    }

    let federated_token = fetch_federated_token(ctx, &request).await?;

    generate_access_token(ctx, &request, &federated_token).await
}

/// Exchanges a third-party issued JWT for an OAuth2.0 access token which
/// asserts the third-party identity within an identity namespace.
async fn fetch_federated_token(ctx: &Context, request: &StsRequest) -> Result<Token> {
    let iss = match request.gke_cluster_url.as_deref() {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => jwt::issuer(&request.subject_token)?,
    };

    if iss.is_empty() {
        return Err(Error::malformed_subject_token(
            "subject token doesn't have 'iss' in payload",
        ));
    }

    let audience = format!("identitynamespace:{}:{iss}", request.identity_namespace);
    let scope = request.scope.join(",");

    let redacted = FederatedTokenRequest {
        audience: &scope,
        grant_type: GRANT_TYPE,
        requested_token_type: REQUESTED_TOKEN_TYPE,
        subject_token_type: SUBJECT_TOKEN_TYPE,
        subject_token: "redacted",
        scope: &audience,
    };
    if let Ok(body) = serde_json::to_string(&redacted) {
        info!("prepared federated token request: {body}");
    }

    let body = serde_json::to_vec(&FederatedTokenRequest {
        audience: &audience,
        grant_type: GRANT_TYPE,
        requested_token_type: REQUESTED_TOKEN_TYPE,
        subject_token_type: SUBJECT_TOKEN_TYPE,
        subject_token: &request.subject_token,
        scope: &scope,
    })
    .map_err(|e| Error::unexpected("failed to serialize federated token request").with_source(e))?;
    let body = Bytes::from(body);

    let endpoint = request
        .federated_token_endpoint
        .as_deref()
        .unwrap_or(FEDERATED_TOKEN_ENDPOINT);
    let uri = format!("{endpoint}/v1/identitybindingtoken");

    let resp = send_with_retry(ctx, || {
        http::Request::builder()
            .method(Method::POST)
            .uri(&uri)
            .header(CONTENT_TYPE, "application/json")
            .body(body.clone())
            .map_err(|e| {
                Error::unexpected("failed to build federated token request").with_source(e)
            })
    })
    .await?;

    let resp_data: FederatedTokenResponse = serde_json::from_slice(resp.body())
        .map_err(|e| Error::protocol("failed to parse federated token response").with_source(e))?;

    if resp_data.access_token.is_empty() {
        return Err(Error::protocol(
            "federated token response does not have an access token",
        ));
    }

    debug!(
        "federated token will expire in {} seconds",
        resp_data.expires_in
    );

    let expires_in = TimeDelta::try_seconds(resp_data.expires_in)
        .ok_or_else(|| Error::protocol("federated token expiry is out of range"))?;

    Ok(Token {
        access_token: resp_data.access_token,
        token_type: resp_data
            .token_type
            .unwrap_or_else(|| BEARER_TOKEN_TYPE.to_string()),
        expires_at: now() + expires_in,
    })
}

/// Exchanges the federated token for an access token scoped to the target
/// service account.
async fn generate_access_token(
    ctx: &Context,
    request: &StsRequest,
    federated_token: &Token,
) -> Result<Token> {
    let endpoint = request
        .iam_credentials_endpoint
        .as_deref()
        .unwrap_or(IAM_CREDENTIALS_ENDPOINT);
    let name = format!("projects/-/serviceAccounts/{}", request.service_account);
    let uri = format!("{endpoint}/v1/{name}:generateAccessToken");

    info!("generating access token for [{name}]");

    let body = serde_json::to_vec(&GenerateAccessTokenRequest {
        scope: &request.scope,
        lifetime: ACCESS_TOKEN_LIFETIME,
    })
    .map_err(|e| Error::unexpected("failed to serialize access token request").with_source(e))?;
    let body = Bytes::from(body);
    let authorization = format!("Bearer {}", federated_token.access_token);

    let resp = send_with_retry(ctx, || {
        http::Request::builder()
            .method(Method::POST)
            .uri(&uri)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, &authorization)
            .body(body.clone())
            .map_err(|e| Error::unexpected("failed to build access token request").with_source(e))
    })
    .await?;

    let resp_data: GenerateAccessTokenResponse = serde_json::from_slice(resp.body())
        .map_err(|e| Error::protocol("failed to parse access token response").with_source(e))?;

    if resp_data.access_token.is_empty() {
        return Err(Error::protocol(
            "access token response does not have an access token",
        ));
    }

    Ok(Token {
        access_token: resp_data.access_token,
        token_type: BEARER_TOKEN_TYPE.to_string(),
        // The impersonated token's lifetime is a fixed constant; keep the
        // federation expiry as the cacheable one.
        expires_at: federated_token.expires_at,
    })
}

/// Sends the request until a 200 response arrives or the attempt budget is
/// exhausted, with a short fixed delay between attempts.
///
/// A 4xx response aborts immediately: retrying a client error cannot help.
/// Anything else (network failure, 5xx, non-OK without classification) is
/// retried, and the last error is wrapped once the budget runs out.
async fn send_with_retry<F>(ctx: &Context, build: F) -> Result<http::Response<Bytes>>
where
    F: Fn() -> Result<http::Request<Bytes>>,
{
    let mut last_err = None;

    for attempt in 0..MAX_REQUEST_RETRY {
        if attempt > 0 {
            tokio::time::sleep(REQUEST_RETRY_DELAY).await;
        }

        match ctx.http_send(build()?).await {
            Ok(resp) if resp.status() == StatusCode::OK => return Ok(resp),
            Ok(resp) => {
                let status = resp.status();
                let body = String::from_utf8_lossy(resp.body()).to_string();

                if status.is_client_error() {
                    return Err(Error::exchange_client(format!(
                        "HTTP status {status}, body: {body}"
                    )));
                }

                last_err = Some(Error::exchange_transient(format!(
                    "HTTP status {status}, body: {body}"
                )));
            }
            Err(err) => last_err = Some(err),
        }
    }

    let last_err =
        last_err.unwrap_or_else(|| Error::exchange_transient("request failed without a response"));
    Err(
        Error::exchange_transient(format!("request failed after {MAX_REQUEST_RETRY} attempts"))
            .with_source(last_err),
    )
}
