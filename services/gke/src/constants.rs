use std::time::Duration;

// Fixed protocol constants for the STS token exchange.
pub const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
pub const REQUESTED_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";
pub const SUBJECT_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:jwt";

pub const FEDERATED_TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com";
pub const IAM_CREDENTIALS_ENDPOINT: &str = "https://iamcredentials.googleapis.com";

// Default OAuth2 scope for Google Cloud services.
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

// Fixed lifetime requested for impersonated access tokens.
pub const ACCESS_TOKEN_LIFETIME: &str = "3000s";
pub const BEARER_TOKEN_TYPE: &str = "Bearer";

pub const MAX_REQUEST_RETRY: usize = 5;
pub const REQUEST_RETRY_DELAY: Duration = Duration::from_millis(10);

// Tokens are treated as expired this many seconds before their real
// expiry to absorb clock skew and in-flight latency.
pub const GRACE_PERIOD_SECONDS: i64 = 300;

pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";
pub const GCP_SERVICE_ACCOUNT_ANNOTATION: &str = "iam.gke.io/gcp-service-account";
pub const WORKLOAD_IDENTITY_DOC_URL: &str =
    "https://cloud.google.com/kubernetes-engine/docs/how-to/workload-identity";

pub const METADATA_HOST: &str = "metadata.google.internal";
pub const GCE_METADATA_HOST: &str = "GCE_METADATA_HOST";
