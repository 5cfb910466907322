//! Core components for workload identity federation.
//!
//! This crate provides the foundational types and traits shared by the
//! fedtoken ecosystem: a pluggable execution [`Context`], the collaborator
//! traits it carries, and the common error type.
//!
//! ## Overview
//!
//! Token sources never talk to the network or the Kubernetes API directly.
//! Instead they go through a [`Context`], a container holding
//! implementations for HTTP sending, environment access, and
//! service-account token minting. This keeps every exchange step testable
//! with in-process fakes.
//!
//! ## Example
//!
//! ```no_run
//! use fedtoken_core::{Context, OsEnv};
//!
//! let ctx = Context::new().with_env(OsEnv);
//! // Configure the remaining components as needed:
//! // ctx.with_http_send(my_http_client)
//! //    .with_token_mint(my_kube_minter);
//! ```
//!
//! ## Traits
//!
//! - [`HttpSend`]: sending HTTP requests during a token exchange
//! - [`Env`]: environment variable access
//! - [`TokenMint`]: the Kubernetes service-account collaborator surface

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod time;
pub mod utils;

mod context;
pub use context::Context;
pub use context::Env;
pub use context::HttpSend;
pub use context::OsEnv;
pub use context::StaticEnv;
pub use context::TokenMint;

mod error;
pub use error::{Error, ErrorKind, Result};
