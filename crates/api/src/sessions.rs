//! Pending checkout sessions.
//!
//! A checkout session carries what the visitor chose (payment reference,
//! preset, prompt) across the payment redirect. Tokens are opaque, single-use
//! ([`SessionStore::take`] removes), and expire after a fixed TTL so an
//! abandoned checkout cannot be replayed later.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use genselfie_core::types::DbId;

/// Default session lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// What a visitor had in flight when they were sent off to pay.
#[derive(Debug, Clone)]
pub struct PendingCheckout {
    /// Payment method name (`"stripe"` or `"lightning"`).
    pub method: String,
    /// Provider-side payment reference to verify on return.
    pub payment_ref: String,
    pub preset_id: Option<DbId>,
    /// Custom prompt fixed at checkout time, when the preset allows one.
    pub prompt: Option<String>,
}

struct Entry {
    checkout: PendingCheckout,
    created: Instant,
}

/// In-memory store of pending checkouts, keyed by opaque token.
pub struct SessionStore {
    ttl: Duration,
    inner: Mutex<HashMap<String, Entry>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Store a checkout and hand back its token.
    pub fn insert(&self, checkout: PendingCheckout) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let mut map = self.lock();
        sweep(&mut map, self.ttl);
        map.insert(
            token.clone(),
            Entry {
                checkout,
                created: Instant::now(),
            },
        );
        token
    }

    /// Remove and return the checkout for a token. A second call with the
    /// same token finds nothing.
    pub fn take(&self, token: &str) -> Option<PendingCheckout> {
        let mut map = self.lock();
        sweep(&mut map, self.ttl);
        map.remove(token).map(|e| e.checkout)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn sweep(map: &mut HashMap<String, Entry>, ttl: Duration) {
    map.retain(|_, e| e.created.elapsed() < ttl);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkout() -> PendingCheckout {
        PendingCheckout {
            method: "stripe".into(),
            payment_ref: "pi_123".into(),
            preset_id: Some(7),
            prompt: None,
        }
    }

    #[test]
    fn take_is_single_use() {
        let store = SessionStore::default();
        let token = store.insert(checkout());
        let first = store.take(&token).unwrap();
        assert_eq!(first.payment_ref, "pi_123");
        assert!(store.take(&token).is_none());
    }

    #[test]
    fn unknown_token_yields_nothing() {
        let store = SessionStore::default();
        assert!(store.take("nope").is_none());
    }

    #[test]
    fn expired_sessions_are_swept() {
        let store = SessionStore::new(Duration::ZERO);
        let token = store.insert(checkout());
        assert!(store.take(&token).is_none());
    }
}
