use std::fmt::Debug;

use async_trait::async_trait;

use fedtoken_core::{Context, Result};

use crate::config::{TokenSourceConfig, TokenSourceType};
use crate::gke_token_source::GkeTokenSource;
use crate::identity::Identity;
use crate::metadata_token_source::MetadataTokenSource;
use crate::token::Token;

/// TokenSource produces a usable token provider for a workload identity.
///
/// Consumed by backend plugins that need a bearer token for cloud API
/// calls on behalf of a workload.
#[async_trait]
pub trait TokenSource: Debug + Send + Sync + 'static {
    /// Return a token provider for the identity.
    ///
    /// On a cache miss this blocks on the full exchange (two HTTP round
    /// trips plus the Kubernetes API calls), so callers must expect
    /// multi-hundred-millisecond latency. Concurrent callers for one
    /// identity share a single exchange and its outcome.
    async fn token_source(&self, ctx: &Context, identity: Identity) -> Result<StaticTokenSource>;
}

/// StaticTokenSource yields a fixed token.
#[derive(Clone, Debug)]
pub struct StaticTokenSource {
    token: Token,
}

impl StaticTokenSource {
    pub(crate) fn new(token: Token) -> Self {
        Self { token }
    }

    /// The underlying token.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Value usable as an HTTP `Authorization` header.
    pub fn authorization_header(&self) -> String {
        self.token.authorization_header()
    }
}

/// Create a token source of the configured type.
pub fn new_token_source(config: TokenSourceConfig) -> Box<dyn TokenSource> {
    match config.token_source_type {
        TokenSourceType::Default => Box::new(MetadataTokenSource::new(config)),
        TokenSourceType::Gke => Box::new(GkeTokenSource::new(config)),
    }
}
