use std::fmt::{self, Debug};

use fedtoken_core::time::{now, DateTime};
use fedtoken_core::utils::Redact;

/// A cloud access token together with its type and expiry.
///
/// Never mutated in place once cached, only replaced by a fresh exchange.
#[derive(Clone)]
pub struct Token {
    /// The access token.
    pub access_token: String,
    /// The token type, e.g. `Bearer`.
    pub token_type: String,
    /// The expiration time of the token.
    pub expires_at: DateTime,
}

impl Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &Redact::from(&self.access_token))
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Token {
    /// Value usable as an HTTP `Authorization` header for cloud API calls.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Whether the token is past its expiry minus the grace period.
    pub(crate) fn has_expired(&self) -> bool {
        let grace = chrono::TimeDelta::seconds(crate::constants::GRACE_PERIOD_SECONDS);
        now() + grace >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_access_token() {
        let token = Token {
            access_token: "super-secret-access-token".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: now(),
        };

        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret-access-token"));
        assert!(debug.contains("sup***ken"));
    }
}
