use std::fmt;
use thiserror::Error;

/// The error type for fedtoken operations
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<anyhow::Error>,
}

/// The kind of error that occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The subject token is not a well-formed JWT, its payload cannot be
    /// decoded, or it lacks an issuer claim
    MalformedSubjectToken,

    /// The Kubernetes service account lacks the required cloud
    /// service-account annotation
    MissingIdentityAnnotation,

    /// Failure minting a service-account token or reading the service
    /// account resource; never retried by this subsystem
    KubernetesApi,

    /// HTTP 4xx from an exchange endpoint; retrying cannot succeed
    ExchangeClient,

    /// Network failure or 5xx from an exchange endpoint; retried up to the
    /// attempt budget
    ExchangeTransient,

    /// Well-formed HTTP response missing or carrying invalid expected
    /// fields (e.g., an empty access token)
    Protocol,

    /// Configuration error (missing fields, invalid values)
    ConfigInvalid,

    /// Unexpected errors (I/O, serialization, etc.)
    Unexpected,
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Check if this error may be resolved by retrying the request
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::ExchangeTransient)
    }
}

// Convenience constructors
impl Error {
    /// Create a malformed subject token error
    pub fn malformed_subject_token(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedSubjectToken, message)
    }

    /// Create a missing identity annotation error
    pub fn missing_identity_annotation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingIdentityAnnotation, message)
    }

    /// Create a Kubernetes API error
    pub fn kubernetes_api(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::KubernetesApi, message)
    }

    /// Create an exchange client error
    pub fn exchange_client(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExchangeClient, message)
    }

    /// Create an exchange transient error
    pub fn exchange_transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExchangeTransient, message)
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// Create a config invalid error
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::MalformedSubjectToken => write!(f, "malformed subject token"),
            ErrorKind::MissingIdentityAnnotation => write!(f, "missing identity annotation"),
            ErrorKind::KubernetesApi => write!(f, "kubernetes api error"),
            ErrorKind::ExchangeClient => write!(f, "exchange client error"),
            ErrorKind::ExchangeTransient => write!(f, "exchange transient error"),
            ErrorKind::Protocol => write!(f, "protocol error"),
            ErrorKind::ConfigInvalid => write!(f, "invalid configuration"),
            ErrorKind::Unexpected => write!(f, "unexpected error"),
        }
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

// Common From implementations
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(err)
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}
