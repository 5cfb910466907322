use crate::{Error, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Context provides the execution context for token acquisition.
///
/// ## Important
///
/// fedtoken provides NO default implementations. Users MUST configure the
/// components a token source uses. Any unconfigured component falls back to
/// a no-op implementation that returns errors or empty values when called.
///
/// ## Example
///
/// ```
/// use fedtoken_core::{Context, OsEnv};
///
/// let ctx = Context::new().with_env(OsEnv);
/// ```
#[derive(Clone)]
pub struct Context {
    http: Arc<dyn HttpSend>,
    env: Arc<dyn Env>,
    minter: Arc<dyn TokenMint>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("http", &self.http)
            .field("env", &self.env)
            .field("minter", &self.minter)
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a new Context with no-op implementations.
    ///
    /// Use the `with_*` methods to configure the components you need.
    pub fn new() -> Self {
        Self {
            http: Arc::new(NoopHttpSend),
            env: Arc::new(NoopEnv),
            minter: Arc::new(NoopTokenMint),
        }
    }

    /// Replace the HTTP client implementation.
    pub fn with_http_send(mut self, http: impl HttpSend) -> Self {
        self.http = Arc::new(http);
        self
    }

    /// Replace the environment implementation.
    pub fn with_env(mut self, env: impl Env) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Replace the service-account token minter implementation.
    pub fn with_token_mint(mut self, minter: impl TokenMint) -> Self {
        self.minter = Arc::new(minter);
        self
    }

    /// Send http request and return the response.
    #[inline]
    pub async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        self.http.http_send(req).await
    }

    /// Get the environment variable.
    ///
    /// - Returns `Some(v)` if the environment variable is found and is valid utf-8.
    /// - Returns `None` if the environment variable is not found or value is invalid.
    #[inline]
    pub fn env_var(&self, key: &str) -> Option<String> {
        self.env.var(key)
    }

    /// Mint a short-lived, audience-bound token for a Kubernetes service
    /// account.
    #[inline]
    pub async fn mint_service_account_token(
        &self,
        namespace: &str,
        name: &str,
        audience: &str,
    ) -> Result<String> {
        self.minter
            .mint_service_account_token(namespace, name, audience)
            .await
    }

    /// Read the annotation map of a Kubernetes service account.
    #[inline]
    pub async fn service_account_annotations(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<HashMap<String, String>> {
        self.minter.service_account_annotations(namespace, name).await
    }
}

/// HttpSend is used to send http requests during the token exchange.
///
/// This trait is designed especially for the exchange protocol, please
/// don't use it as a general http client.
#[async_trait::async_trait]
pub trait HttpSend: Debug + Send + Sync + 'static {
    /// Send http request and return the response.
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>>;
}

/// Env abstracts environment variable access.
pub trait Env: Debug + Send + Sync + 'static {
    /// Get an environment variable.
    ///
    /// - Returns `Some(v)` if the environment variable is found and is valid utf-8.
    /// - Returns `None` if the environment variable is not found or value is invalid.
    fn var(&self, key: &str) -> Option<String>;

    /// Returns an hashmap of (variable, value) pairs of strings, for all the
    /// environment variables of the current process.
    fn vars(&self) -> HashMap<String, String>;
}

/// TokenMint is the Kubernetes service-account collaborator surface.
///
/// Implementations talk to the Kubernetes API; token sources only consume
/// this interface so that exchanges can run against in-process fakes.
#[async_trait::async_trait]
pub trait TokenMint: Debug + Send + Sync + 'static {
    /// Mint a short-lived token for the service account, bound to the
    /// given audience.
    async fn mint_service_account_token(
        &self,
        namespace: &str,
        name: &str,
        audience: &str,
    ) -> Result<String>;

    /// Read the annotation map of the service account.
    async fn service_account_annotations(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<HashMap<String, String>>;
}

/// Implements Env for the OS context.
#[derive(Debug, Copy, Clone)]
pub struct OsEnv;

impl Env for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key)?.into_string().ok()
    }

    fn vars(&self) -> HashMap<String, String> {
        std::env::vars().collect()
    }
}

/// StaticEnv provides a static env environment.
///
/// This is useful for testing or for providing a fixed environment.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    /// The environment variables to use.
    pub envs: HashMap<String, String>,
}

impl Env for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.envs.get(key).cloned()
    }

    fn vars(&self) -> HashMap<String, String> {
        self.envs.clone()
    }
}

/// NoopHttpSend is a no-op implementation that always returns an error.
///
/// This is used when no HTTP client is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHttpSend;

#[async_trait::async_trait]
impl HttpSend for NoopHttpSend {
    async fn http_send(&self, _req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        Err(Error::unexpected(
            "HTTP sending not supported: no HTTP client configured",
        ))
    }
}

/// NoopEnv is a no-op implementation that always returns None/empty.
///
/// This is used when no environment is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnv;

impl Env for NoopEnv {
    fn var(&self, _key: &str) -> Option<String> {
        None
    }

    fn vars(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}

/// NoopTokenMint is a no-op implementation that always returns an error.
///
/// This is used when no token minter is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTokenMint;

#[async_trait::async_trait]
impl TokenMint for NoopTokenMint {
    async fn mint_service_account_token(
        &self,
        _namespace: &str,
        _name: &str,
        _audience: &str,
    ) -> Result<String> {
        Err(Error::unexpected(
            "token minting not supported: no token minter configured",
        ))
    }

    async fn service_account_annotations(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> Result<HashMap<String, String>> {
        Err(Error::unexpected(
            "token minting not supported: no token minter configured",
        ))
    }
}
