//! In-process object store that remembers every write.

use super::{validate_key, ObjectStore};
use crate::error::Jats2SiteError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, Vec<u8>>,
    /// Every successful write, in order, including overwrites.
    history: Vec<(String, Vec<u8>)>,
    fail_suffixes: Vec<String>,
    fail_puts: bool,
    /// Puts whose body contains any of these byte strings fail.
    fail_put_patterns: Vec<Vec<u8>>,
}

/// A `BTreeMap`-backed store. Cloning shares the same objects.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upload whose key ends with `suffix` fail.
    pub fn fail_uploads_ending_with(&self, suffix: impl Into<String>) {
        self.lock().fail_suffixes.push(suffix.into());
    }

    /// Make every `put` fail (status and log writes).
    pub fn fail_puts(&self, fail: bool) {
        self.lock().fail_puts = fail;
    }

    /// Make every `put` whose body contains `pattern` fail.
    pub fn fail_puts_containing(&self, pattern: impl Into<Vec<u8>>) {
        self.lock().fail_put_patterns.push(pattern.into());
    }

    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.lock().objects.insert(key.into(), bytes.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// All values ever written to `key`, oldest first.
    pub fn writes_to(&self, key: &str) -> Vec<Vec<u8>> {
        self.lock()
            .history
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.lock().history.len()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the maps half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, key: &str, bytes: Vec<u8>) {
        let mut inner = self.lock();
        inner.history.push((key.to_string(), bytes.clone()));
        inner.objects.insert(key.to_string(), bytes);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, prefix: &str) -> Result<bool, Jats2SiteError> {
        validate_key(prefix)?;
        Ok(self.lock().objects.keys().any(|k| k.starts_with(prefix)))
    }

    async fn upload(&self, local: &Path, key: &str) -> Result<(), Jats2SiteError> {
        validate_key(key)?;
        if self.lock().fail_suffixes.iter().any(|s| key.ends_with(s.as_str())) {
            return Err(Jats2SiteError::storage(key, "injected upload failure"));
        }
        let bytes = tokio::fs::read(local)
            .await
            .map_err(|e| Jats2SiteError::io(local, e))?;
        self.record(key, bytes);
        Ok(())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), Jats2SiteError> {
        validate_key(key)?;
        let refused = {
            let inner = self.lock();
            inner.fail_puts
                || inner
                    .fail_put_patterns
                    .iter()
                    .any(|p| !p.is_empty() && bytes.windows(p.len()).any(|w| w == p.as_slice()))
        };
        if refused {
            return Err(Jats2SiteError::storage(key, "injected put failure"));
        }
        self.record(key, bytes);
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Option<Vec<u8>>, Jats2SiteError> {
        validate_key(key)?;
        Ok(self.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_keeps_overwrites() {
        let store = MemoryStore::new();
        store.put("f/a/status.json", b"1".to_vec()).await.unwrap();
        store.put("f/a/status.json", b"2".to_vec()).await.unwrap();
        assert_eq!(store.get("f/a/status.json").unwrap(), b"2");
        assert_eq!(store.writes_to("f/a/status.json").len(), 2);
        assert_eq!(store.keys(), vec!["f/a/status.json".to_string()]);
    }

    #[tokio::test]
    async fn exists_matches_prefix() {
        let store = MemoryStore::new();
        store.insert("f/PMC12/index.html", "x");
        assert!(store.exists("f/PMC12/").await.unwrap());
        assert!(!store.exists("f/PMC1/").await.unwrap());
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = MemoryStore::new();
        store.fail_uploads_ending_with(".bad");
        let err = store
            .upload(Path::new("/nonexistent"), "f/a/file.bad")
            .await
            .unwrap_err();
        assert!(matches!(err, Jats2SiteError::Storage { .. }));

        store.fail_puts(true);
        assert!(store.put("f/a/status.json", vec![]).await.is_err());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn pattern_failures_only_hit_matching_bodies() {
        let store = MemoryStore::new();
        store.fail_puts_containing(r#""status":"failure""#);
        store
            .put("f/a/status.json", br#"{"status":"processing"}"#.to_vec())
            .await
            .unwrap();
        let err = store
            .put("f/a/status.json", br#"{"status":"failure"}"#.to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, Jats2SiteError::Storage { .. }));
        assert_eq!(store.write_count(), 1);
    }
}
