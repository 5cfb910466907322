use std::sync::Mutex;

use async_trait::async_trait;
use chrono::TimeDelta;
use log::debug;
use serde::Deserialize;

use fedtoken_core::time::now;
use fedtoken_core::{Context, Error, Result};

use crate::config::TokenSourceConfig;
use crate::constants::{
    BEARER_TOKEN_TYPE, DEFAULT_SCOPE, DEFAULT_SERVICE_ACCOUNT, GCE_METADATA_HOST, METADATA_HOST,
};
use crate::identity::Identity;
use crate::singleflight::Group;
use crate::token::Token;
use crate::token_source::{StaticTokenSource, TokenSource};

const FLIGHT_KEY: &str = "metadata";

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    token_type: Option<String>,
}

/// MetadataTokenSource fetches tokens from the GCE metadata server.
///
/// This is the `default` token source type: no federation, the node's own
/// service account is used regardless of the workload identity. The last
/// token is kept until its grace period runs out.
#[derive(Debug)]
pub struct MetadataTokenSource {
    scope: Vec<String>,
    endpoint: Option<String>,
    token: Mutex<Option<Token>>,
    flights: Group<Token>,
}

impl MetadataTokenSource {
    /// Create a new MetadataTokenSource.
    pub fn new(config: TokenSourceConfig) -> Self {
        Self {
            scope: config.scope,
            endpoint: None,
            token: Mutex::new(None),
            flights: Group::new(),
        }
    }

    /// Override the metadata host, mainly for testing.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    async fn fetch_token(&self, ctx: &Context) -> Result<Token> {
        let scope = if self.scope.is_empty() {
            DEFAULT_SCOPE.to_string()
        } else {
            self.scope.join(",")
        };

        let metadata_host = self
            .endpoint
            .clone()
            .or_else(|| ctx.env_var(GCE_METADATA_HOST))
            .unwrap_or_else(|| METADATA_HOST.to_string());

        debug!("loading token from the metadata server at [{metadata_host}]");

        let uri = format!(
            "http://{metadata_host}/computeMetadata/v1/instance/service-accounts/{DEFAULT_SERVICE_ACCOUNT}/token?scopes={scope}"
        );

        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri(&uri)
            .header("Metadata-Flavor", "Google")
            .body(Vec::<u8>::new().into())
            .map_err(|e| Error::unexpected("failed to build metadata request").with_source(e))?;

        let resp = ctx.http_send(req).await?;

        if resp.status() != http::StatusCode::OK {
            return Err(Error::unexpected(format!(
                "metadata server returned HTTP status {}",
                resp.status()
            )));
        }

        let resp_data: MetadataTokenResponse = serde_json::from_slice(resp.body())
            .map_err(|e| Error::protocol("failed to parse metadata token response").with_source(e))?;

        let expires_in = TimeDelta::try_seconds(resp_data.expires_in)
            .ok_or_else(|| Error::protocol("metadata token expiry is out of range"))?;

        Ok(Token {
            access_token: resp_data.access_token,
            token_type: resp_data
                .token_type
                .unwrap_or_else(|| BEARER_TOKEN_TYPE.to_string()),
            expires_at: now() + expires_in,
        })
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    async fn token_source(&self, ctx: &Context, _identity: Identity) -> Result<StaticTokenSource> {
        let cached = self.token.lock().expect("lock poisoned").clone();
        if let Some(token) = cached {
            if !token.has_expired() {
                return Ok(StaticTokenSource::new(token));
            }
        }

        let token = self
            .flights
            .run(FLIGHT_KEY, || async {
                let token = self.fetch_token(ctx).await?;
                *self.token.lock().expect("lock poisoned") = Some(token.clone());
                Ok(token)
            })
            .await?;

        Ok(StaticTokenSource::new(token))
    }
}
