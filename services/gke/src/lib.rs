//! GKE workload identity federation token sources.
//!
//! Workloads running under a Kubernetes service account obtain short-lived
//! Google Cloud access tokens without long-lived credentials: a
//! Kubernetes-issued token is federated through the Security Token Service
//! into a federated access token, which is then exchanged for an IAM
//! access token scoped to the annotated target service account. Results
//! are cached per [`Identity`] with a grace period, and concurrent
//! requests for one identity collapse into a single exchange.
//!
//! ```no_run
//! use fedtoken_core::Context;
//! use fedtoken_gke::{new_token_source, Identity, TokenSource, TokenSourceConfig};
//! use fedtoken_gke::TokenSourceType;
//!
//! # async fn example(ctx: Context) -> fedtoken_core::Result<()> {
//! let source = new_token_source(
//!     TokenSourceConfig::new()
//!         .with_token_source_type(TokenSourceType::Gke)
//!         .with_identity_namespace("my-project.svc.id.goog"),
//! );
//!
//! let provider = source
//!     .token_source(&ctx, Identity::new("flytesnacks", "default"))
//!     .await?;
//! let header = provider.authorization_header();
//! # Ok(())
//! # }
//! ```
//!
//! The `ctx` above carries the HTTP client and the Kubernetes token
//! minter; see `fedtoken-http-send-reqwest` and `fedtoken-token-mint-kube`.

mod constants;

mod config;
pub use config::{KubeClientConfig, TokenSourceConfig, TokenSourceType};

mod identity;
pub use identity::Identity;

mod token;
pub use token::Token;

mod jwt;

mod cache;
mod singleflight;

mod sts;
pub use sts::{exchange_token, StsRequest};

mod token_source;
pub use token_source::{new_token_source, StaticTokenSource, TokenSource};

mod gke_token_source;
pub use gke_token_source::GkeTokenSource;

mod metadata_token_source;
pub use metadata_token_source::MetadataTokenSource;
