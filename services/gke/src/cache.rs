use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use log::info;

use crate::identity::Identity;
use crate::token::Token;

/// TokenCache maps an [`Identity`] to its last successfully exchanged
/// token.
///
/// There is no background reaper: an expired hit triggers a sweep over all
/// entries, gated by a compare-and-swap flag so at most one sweep runs at
/// a time. Cache size is bounded by the number of distinct service
/// accounts running workloads.
#[derive(Debug, Default)]
pub(crate) struct TokenCache {
    tokens: Mutex<HashMap<Identity, Token>>,
    sweeping: AtomicBool,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token for the identity while it is still within
    /// its grace period. An expired entry counts as a miss and kicks off
    /// the sweep.
    pub fn get(&self, identity: &Identity) -> Option<Token> {
        let expired = {
            let tokens = self.tokens.lock().expect("lock poisoned");
            match tokens.get(identity) {
                Some(token) if !token.has_expired() => return Some(token.clone()),
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            self.sweep();
        }

        None
    }

    pub fn put(&self, identity: Identity, token: Token) {
        self.tokens
            .lock()
            .expect("lock poisoned")
            .insert(identity, token);
    }

    /// Remove every expired entry. A sweep that finds another sweep in
    /// flight is a no-op, not a block.
    fn sweep(&self) {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        self.tokens
            .lock()
            .expect("lock poisoned")
            .retain(|identity, token| {
                if token.has_expired() {
                    info!(
                        "removed expired token for [{}/{}]",
                        identity.k8s_namespace(),
                        identity.k8s_service_account()
                    );
                    false
                } else {
                    true
                }
            });

        self.sweeping.store(false, Ordering::Release);
    }

    #[cfg(test)]
    fn contains(&self, identity: &Identity) -> bool {
        self.tokens
            .lock()
            .expect("lock poisoned")
            .contains_key(identity)
    }
}
