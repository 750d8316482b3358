use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tokio::time;
use tracing::debug;

/// A freshly minted bearer token and how long it stays valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub bearer: String,
    pub lifetime: Duration,
}

/// Issues and tracks bearer tokens. A token is either valid or it is not;
/// implementations must never report a token valid past its lifetime.
pub trait TokenStore: Send + Sync {
    fn issue(&self) -> IssuedToken;
    fn check(&self, token: &str) -> bool;
    /// Returns true if the token was still active.
    fn revoke(&self, token: &str) -> bool;
}

/// Token value derived from the wall clock at two resolutions.
fn mint() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{:x}:{:x}", now.as_secs(), now.as_micros())
}

/// In-process token set keyed by token, valued by expiry instant.
///
/// Expiry is checked on every lookup, so a token stops validating the moment
/// its lifetime elapses even if the sweep has not run yet. The sweep only
/// bounds memory.
#[derive(Clone)]
pub struct MemoryTokenStore {
    tokens: Arc<RwLock<HashMap<String, Instant>>>,
    lifetime: Duration,
}

impl MemoryTokenStore {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            tokens: Arc::new(RwLock::new(HashMap::new())),
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Number of entries held, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired token. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut tokens = self.tokens.write();
        let before = tokens.len();
        tokens.retain(|_, expires_at| now < *expires_at);
        before - tokens.len()
    }

    /// Spawn a background Tokio task that calls `prune()` every `interval`.
    pub fn spawn_sweep(self, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.tick().await; // skip first immediate tick
            loop {
                ticker.tick().await;
                let pruned = self.prune();
                if pruned > 0 {
                    debug!(pruned, "expired tokens swept");
                }
            }
        });
    }
}

impl TokenStore for MemoryTokenStore {
    fn issue(&self) -> IssuedToken {
        let bearer = mint();
        let expires_at = Instant::now() + self.lifetime;
        self.tokens.write().insert(bearer.clone(), expires_at);
        debug!(token = %bearer, "issued token");
        IssuedToken {
            bearer,
            lifetime: self.lifetime,
        }
    }

    fn check(&self, token: &str) -> bool {
        self.tokens
            .read()
            .get(token)
            .is_some_and(|expires_at| Instant::now() < *expires_at)
    }

    fn revoke(&self, token: &str) -> bool {
        self.tokens
            .write()
            .remove(token)
            .is_some_and(|expires_at| Instant::now() < expires_at)
    }
}
