use async_trait::async_trait;

use fedtoken_core::{Context, Error, Result};

use crate::cache::TokenCache;
use crate::config::TokenSourceConfig;
use crate::constants::{GCP_SERVICE_ACCOUNT_ANNOTATION, WORKLOAD_IDENTITY_DOC_URL};
use crate::identity::Identity;
use crate::singleflight::Group;
use crate::sts::{exchange_token, StsRequest};
use crate::token::Token;
use crate::token_source::{StaticTokenSource, TokenSource};

/// GkeTokenSource federates Kubernetes service-account tokens into Google
/// credentials via workload identity.
///
/// Per identity it moves through `absent` → `exchanging` →
/// `cached-valid`, back to `exchanging` once the grace period runs out. A
/// failed exchange caches nothing and surfaces the error to every caller
/// that joined it.
#[derive(Debug)]
pub struct GkeTokenSource {
    identity_namespace: String,
    scope: Vec<String>,
    gke_cluster_url: Option<String>,
    federated_token_endpoint: Option<String>,
    iam_credentials_endpoint: Option<String>,
    tokens: TokenCache,
    flights: Group<Token>,
}

impl GkeTokenSource {
    /// Create a new GkeTokenSource.
    pub fn new(config: TokenSourceConfig) -> Self {
        Self {
            identity_namespace: config.identity_namespace,
            scope: config.scope,
            gke_cluster_url: config.gke_cluster_url,
            federated_token_endpoint: None,
            iam_credentials_endpoint: None,
            tokens: TokenCache::new(),
            flights: Group::new(),
        }
    }

    /// Override the federation endpoint, mainly for testing.
    pub fn with_federated_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.federated_token_endpoint = Some(endpoint.into());
        self
    }

    /// Override the IAM credentials endpoint, mainly for testing.
    pub fn with_iam_credentials_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.iam_credentials_endpoint = Some(endpoint.into());
        self
    }

    async fn exchange(&self, ctx: &Context, identity: &Identity) -> Result<Token> {
        let subject_token = ctx
            .mint_service_account_token(
                identity.k8s_namespace(),
                identity.k8s_service_account(),
                &self.identity_namespace,
            )
            .await?;

        let gcp_service_account = self.gcp_service_account(ctx, identity).await?;

        exchange_token(
            ctx,
            StsRequest {
                subject_token,
                scope: self.scope.clone(),
                service_account: gcp_service_account,
                identity_namespace: self.identity_namespace.clone(),
                gke_cluster_url: self.gke_cluster_url.clone(),
                federated_token_endpoint: self.federated_token_endpoint.clone(),
                iam_credentials_endpoint: self.iam_credentials_endpoint.clone(),
            },
        )
        .await
    }

    async fn gcp_service_account(&self, ctx: &Context, identity: &Identity) -> Result<String> {
        let annotations = ctx
            .service_account_annotations(identity.k8s_namespace(), identity.k8s_service_account())
            .await?;

        annotations
            .get(GCP_SERVICE_ACCOUNT_ANNOTATION)
            .cloned()
            .ok_or_else(|| {
                Error::missing_identity_annotation(format!(
                    "[{GCP_SERVICE_ACCOUNT_ANNOTATION}] annotation doesn't exist on k8s service account [{}/{}], read more at {WORKLOAD_IDENTITY_DOC_URL}",
                    identity.k8s_namespace(),
                    identity.k8s_service_account(),
                ))
            })
    }
}

#[async_trait]
impl TokenSource for GkeTokenSource {
    async fn token_source(&self, ctx: &Context, identity: Identity) -> Result<StaticTokenSource> {
        if let Some(token) = self.tokens.get(&identity) {
            return Ok(StaticTokenSource::new(token));
        }

        // When tokens expire or we hit a miss, at most one exchange runs
        // per identity; everyone else joins it.
        let token = self
            .flights
            .run(&identity.flight_key(), || async {
                let token = self.exchange(ctx, &identity).await?;
                self.tokens.put(identity.clone(), token.clone());
                Ok(token)
            })
            .await?;

        Ok(StaticTokenSource::new(token))
    }
}
