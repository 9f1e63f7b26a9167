//! Transient display URLs for encoded slices.
//!
//! A display surface never holds slice bytes directly; it is handed an [`ObjectUrl`] that resolves
//! through the registry until revoked. Every issued URL must be revoked exactly once, and the
//! registry keeps the counters needed to verify that.

use std::fmt;
use std::sync::Arc;

use hashlink::LinkedHashMap;
use parking_lot::Mutex;
use tracing::{trace, warn};

pub const URL_SCHEME: &str = "blob:shotslice/";

/// Handle to bytes registered with a [`UrlRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bytes and media type behind a live URL.
#[derive(Debug, Clone)]
pub struct Blob {
    pub mime: &'static str,
    pub bytes: Arc<[u8]>,
}

/// Issued/revoked counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UrlStats {
    pub created: u64,
    pub revoked: u64,
    pub live: usize,
}

#[derive(Debug, Default)]
struct RegistryInner {
    live: LinkedHashMap<ObjectUrl, Blob>,
    created: u64,
    revoked: u64,
}

/// Process-wide table of live object URLs.
#[derive(Debug, Default)]
pub struct UrlRegistry {
    inner: Mutex<RegistryInner>,
}

impl UrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and return a fresh URL resolving to them.
    pub fn create(&self, mime: &'static str, bytes: Arc<[u8]>) -> ObjectUrl {
        let mut guard = self.inner.lock();
        guard.created += 1;

        let mut hasher = blake3::Hasher::new();
        hasher.update(&guard.created.to_le_bytes());
        hasher.update(&bytes);
        let hash = hasher.finalize();
        let url = ObjectUrl(format!("{URL_SCHEME}{}", &hash.to_hex()[..32]));

        trace!(target: "url", %url, mime, bytes = bytes.len(), "created object url");
        guard.live.insert(url.clone(), Blob { mime, bytes });
        url
    }

    /// Resolve a live URL.
    pub fn resolve(&self, url: &ObjectUrl) -> Option<Blob> {
        self.inner.lock().live.get(url).cloned()
    }

    pub fn is_live(&self, url: &ObjectUrl) -> bool {
        self.inner.lock().live.contains_key(url)
    }

    /// Release a URL. Returns `false` if it was not live (unknown or already revoked).
    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        let mut guard = self.inner.lock();
        if guard.live.remove(url).is_some() {
            guard.revoked += 1;
            trace!(target: "url", %url, "revoked object url");
            true
        } else {
            warn!(target: "url", %url, "revoke of a url that is not live");
            false
        }
    }

    pub fn stats(&self) -> UrlStats {
        let guard = self.inner.lock();
        UrlStats { created: guard.created, revoked: guard.revoked, live: guard.live.len() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_resolve_revoke() {
        let registry = UrlRegistry::new();
        let url = registry.create("image/jpeg", Arc::from(vec![1u8, 2, 3]));

        assert!(url.as_str().starts_with(URL_SCHEME));
        let blob = registry.resolve(&url).expect("live");
        assert_eq!(&*blob.bytes, &[1, 2, 3]);
        assert_eq!(blob.mime, "image/jpeg");

        assert!(registry.revoke(&url));
        assert!(!registry.revoke(&url));
        assert!(registry.resolve(&url).is_none());
        assert_eq!(registry.stats(), UrlStats { created: 1, revoked: 1, live: 0 });
    }

    #[test]
    fn identical_bytes_get_distinct_urls() {
        let registry = UrlRegistry::new();
        let bytes: Arc<[u8]> = Arc::from(vec![7u8; 16]);
        let first = registry.create("image/png", Arc::clone(&bytes));
        let second = registry.create("image/png", bytes);
        assert_ne!(first, second);
        assert!(registry.is_live(&first) && registry.is_live(&second));
        assert_eq!(registry.stats().live, 2);
    }
}
