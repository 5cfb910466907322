use serde::Deserialize;

/// Which token source implementation to use.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenSourceType {
    /// Tokens from the GCE metadata server (application default).
    #[default]
    Default,
    /// Workload identity federation on GKE.
    Gke,
}

/// TokenSourceConfig carries the configuration for token sources.
///
/// Owned by the plugin framework's configuration layer and consumed here.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenSourceConfig {
    /// Token source type, `default` or `gke`.
    pub token_source_type: TokenSourceType,

    /// Workload identity namespace, e.g. `[project_id].svc.id.goog`.
    pub identity_namespace: String,

    /// OAuth 2.0 scopes to include on the resulting access token. Empty
    /// means the cloud-platform default scope.
    pub scope: Vec<String>,

    /// GKE cluster URL, used as the STS audience suffix when set.
    pub gke_cluster_url: Option<String>,

    /// Path to the Kubernetes client config file. Unset means the
    /// in-cluster configuration.
    pub kube_config_path: Option<String>,

    /// Configuration of the Kubernetes client.
    pub kube_client_config: KubeClientConfig,
}

/// KubeClientConfig controls the Kubernetes client.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KubeClientConfig {
    /// Max duration in seconds allowed for every request to the
    /// Kubernetes API before giving up. Unset implies no timeout.
    pub timeout_secs: Option<u64>,
}

impl TokenSourceConfig {
    /// Create a new config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the token source type.
    pub fn with_token_source_type(mut self, token_source_type: TokenSourceType) -> Self {
        self.token_source_type = token_source_type;
        self
    }

    /// Set the workload identity namespace.
    pub fn with_identity_namespace(mut self, identity_namespace: impl Into<String>) -> Self {
        self.identity_namespace = identity_namespace.into();
        self
    }

    /// Set the OAuth 2.0 scopes.
    pub fn with_scope(mut self, scope: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scope = scope.into_iter().map(Into::into).collect();
        self
    }

    /// Set the GKE cluster URL.
    pub fn with_gke_cluster_url(mut self, gke_cluster_url: impl Into<String>) -> Self {
        self.gke_cluster_url = Some(gke_cluster_url.into());
        self
    }

    /// Set the path to the Kubernetes client config file.
    pub fn with_kube_config_path(mut self, kube_config_path: impl Into<String>) -> Self {
        self.kube_config_path = Some(kube_config_path.into());
        self
    }
}
