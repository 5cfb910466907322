//! Kubernetes-backed [`TokenMint`] implementation.
//!
//! Mints audience-bound service-account tokens through the `TokenRequest`
//! subresource and reads service-account annotations, which is all a
//! federated token source needs from the cluster.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::authentication::v1::{TokenRequest, TokenRequestSpec};
use k8s_openapi::api::core::v1::ServiceAccount;
use kube::api::{Api, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use log::debug;

use fedtoken_core::{Error, Result, TokenMint};

/// KubeTokenMint talks to the Kubernetes API through a `kube::Client`.
#[derive(Clone)]
pub struct KubeTokenMint {
    client: kube::Client,
}

impl Debug for KubeTokenMint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeTokenMint").finish_non_exhaustive()
    }
}

impl KubeTokenMint {
    /// Create a new KubeTokenMint from an existing client.
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Create a new KubeTokenMint from the inferred configuration: the
    /// local kubeconfig when present, the in-cluster environment otherwise.
    pub async fn try_default() -> Result<Self> {
        let client = kube::Client::try_default().await.map_err(|e| {
            Error::kubernetes_api("failed to build kubernetes client").with_source(e)
        })?;
        Ok(Self::new(client))
    }

    /// Create a new KubeTokenMint from an explicit kubeconfig path, or the
    /// in-cluster environment when no path is given. `timeout` bounds every
    /// request to the Kubernetes API.
    pub async fn from_kubeconfig(path: Option<&str>, timeout: Option<Duration>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    Error::kubernetes_api(format!("failed to read kubeconfig from [{path}]"))
                        .with_source(e)
                })?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| {
                        Error::kubernetes_api("failed to load kubeconfig").with_source(e)
                    })?
            }
            None => kube::Config::incluster().map_err(|e| {
                Error::kubernetes_api("cannot get in-cluster kubeconfig").with_source(e)
            })?,
        };

        if timeout.is_some() {
            config.connect_timeout = timeout;
            config.read_timeout = timeout;
        }

        let client = kube::Client::try_from(config).map_err(|e| {
            Error::kubernetes_api("failed to build kubernetes client").with_source(e)
        })?;

        Ok(Self::new(client))
    }

    fn service_accounts(&self, namespace: &str) -> Api<ServiceAccount> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl TokenMint for KubeTokenMint {
    async fn mint_service_account_token(
        &self,
        namespace: &str,
        name: &str,
        audience: &str,
    ) -> Result<String> {
        debug!("minting service account token for [{namespace}/{name}]");

        let request = TokenRequest {
            spec: TokenRequestSpec {
                audiences: vec![audience.to_string()],
                ..Default::default()
            },
            ..Default::default()
        };

        let response = self
            .service_accounts(namespace)
            .create_token_request(name, &PostParams::default(), &request)
            .await
            .map_err(|e| {
                Error::kubernetes_api(format!(
                    "failed to create token for k8s service account [{namespace}/{name}]"
                ))
                .with_source(e)
            })?;

        response
            .status
            .map(|status| status.token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                Error::kubernetes_api(format!(
                    "token request for k8s service account [{namespace}/{name}] returned no token"
                ))
            })
    }

    async fn service_account_annotations(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<HashMap<String, String>> {
        let service_account = self.service_accounts(namespace).get(name).await.map_err(|e| {
            Error::kubernetes_api(format!(
                "failed to get k8s service account [{namespace}/{name}]"
            ))
            .with_source(e)
        })?;

        Ok(service_account
            .metadata
            .annotations
            .map(|annotations| annotations.into_iter().collect())
            .unwrap_or_default())
    }
}
