//! Runtime-mutable generation backend base URL.
//!
//! The admin can point the server at a different backend without a
//! restart. Readers take a cheap snapshot; an in-flight poll loop keeps
//! the snapshot it started with, so a replacement never mixes backends
//! mid-job.

use std::sync::{Arc, RwLock};

/// Process-wide backend base URL with atomic replace.
#[derive(Debug)]
pub struct BackendUrl {
    inner: RwLock<Arc<String>>,
}

impl BackendUrl {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(Arc::new(normalize(initial.into()))),
        }
    }

    /// The current URL. The returned `Arc` stays valid across replaces.
    pub fn snapshot(&self) -> Arc<String> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Atomically install a new URL. Existing snapshots are unaffected.
    pub fn replace(&self, url: impl Into<String>) {
        let url = Arc::new(normalize(url.into()));
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = url;
    }
}

fn normalize(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped() {
        let url = BackendUrl::new("http://gpu:8188/");
        assert_eq!(url.snapshot().as_str(), "http://gpu:8188");
    }

    #[test]
    fn snapshot_survives_replace() {
        let url = BackendUrl::new("http://a:8188");
        let before = url.snapshot();
        url.replace("http://b:8188");
        assert_eq!(before.as_str(), "http://a:8188");
        assert_eq!(url.snapshot().as_str(), "http://b:8188");
    }
}
