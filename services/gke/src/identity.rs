use crate::constants::DEFAULT_SERVICE_ACCOUNT;

/// Identity of a workload: the Kubernetes namespace and service account it
/// runs under.
///
/// Used by value as the cache and deduplication key. An empty service
/// account is normalized to `"default"` at construction, before any
/// lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity {
    k8s_namespace: String,
    k8s_service_account: String,
}

impl Identity {
    /// Create a new Identity, normalizing an empty service account to
    /// `"default"`.
    pub fn new(k8s_namespace: impl Into<String>, k8s_service_account: impl Into<String>) -> Self {
        let k8s_service_account = k8s_service_account.into();
        let k8s_service_account = if k8s_service_account.is_empty() {
            DEFAULT_SERVICE_ACCOUNT.to_string()
        } else {
            k8s_service_account
        };

        Self {
            k8s_namespace: k8s_namespace.into(),
            k8s_service_account,
        }
    }

    /// The Kubernetes namespace.
    pub fn k8s_namespace(&self) -> &str {
        &self.k8s_namespace
    }

    /// The Kubernetes service account name.
    pub fn k8s_service_account(&self) -> &str {
        &self.k8s_service_account
    }

    /// Key used to collapse concurrent exchanges for one identity.
    pub(crate) fn flight_key(&self) -> String {
        format!("{}/{}", self.k8s_namespace, self.k8s_service_account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_service_account_is_normalized() {
        let explicit = Identity::new("flytesnacks-development", "default");
        let implicit = Identity::new("flytesnacks-development", "");

        assert_eq!(explicit, implicit);
        assert_eq!(implicit.k8s_service_account(), "default");
        assert_eq!(implicit.flight_key(), "flytesnacks-development/default");
    }
}
