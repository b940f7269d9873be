//! On-disk, content-addressed store of rendered PDFs.

use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::Fingerprint;

/// Entries live as `<fingerprint>.pdf` in one flat directory; the file mtime
/// is the only freshness signal, there is no metadata sidecar. No
/// cross-process locking: concurrent writes of the same key race benignly
/// (last write wins) and a delete losing the race is not an error. Cache I/O
/// failures are soft: a broken cache degrades to re-rendering, never to a
/// failed request.
pub struct PdfStore {
    directory: PathBuf,
    ttl: Duration,
    max_entries: usize,
}

/// Aggregate view of the store, served by the stats endpoint. An empty store
/// reports zero sizes with the current time for both timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub oldest: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub newest: OffsetDateTime,
}

struct EntryInfo {
    path: PathBuf,
    modified: SystemTime,
    size: u64,
}

impl PdfStore {
    pub fn new(config: &CacheConfig) -> io::Result<Self> {
        std::fs::create_dir_all(&config.directory)?;
        Ok(Self {
            directory: config.directory.clone(),
            ttl: config.ttl(),
            max_entries: config.max_entries,
        })
    }

    /// Fetch a cached PDF. Hits require the entry to exist and be younger
    /// than the TTL; an expired entry counts as a miss but is left on disk
    /// for the eviction sweep.
    pub async fn lookup(&self, key: &Fingerprint) -> Option<Bytes> {
        let path = self.entry_path(key);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!(
                        target = "notepress::cache",
                        error = %err,
                        path = %path.display(),
                        "cache metadata read failed"
                    );
                }
                counter!("notepress_pdf_cache_miss_total").increment(1);
                return None;
            }
        };

        if !is_fresh(&metadata, self.ttl) {
            debug!(target = "notepress::cache", key = key.as_str(), "cache entry expired");
            counter!("notepress_pdf_cache_miss_total").increment(1);
            return None;
        }

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                counter!("notepress_pdf_cache_hit_total").increment(1);
                debug!(target = "notepress::cache", key = key.as_str(), "cache hit");
                Some(Bytes::from(bytes))
            }
            Err(err) => {
                warn!(
                    target = "notepress::cache",
                    error = %err,
                    path = %path.display(),
                    "cache entry read failed"
                );
                counter!("notepress_pdf_cache_miss_total").increment(1);
                None
            }
        }
    }

    /// Write a rendered PDF under its fingerprint, then bring the entry count
    /// back under the configured bound.
    pub async fn store(&self, key: &Fingerprint, bytes: &[u8]) {
        let path = self.entry_path(key);
        if let Err(err) = tokio::fs::write(&path, bytes).await {
            warn!(
                target = "notepress::cache",
                error = %err,
                path = %path.display(),
                "cache write failed"
            );
            return;
        }
        debug!(
            target = "notepress::cache",
            key = key.as_str(),
            size_bytes = bytes.len(),
            "cache entry written"
        );
        self.evict().await;
    }

    /// Delete oldest-by-mtime entries until the count fits `max_entries`.
    /// Individual deletion failures are logged and skipped.
    pub async fn evict(&self) {
        let mut entries = match self.read_entries().await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(target = "notepress::cache", error = %err, "cache scan failed");
                return;
            }
        };
        if entries.len() <= self.max_entries {
            return;
        }

        entries.sort_by_key(|entry| entry.modified);
        let excess = entries.len() - self.max_entries;
        for entry in entries.into_iter().take(excess) {
            match tokio::fs::remove_file(&entry.path).await {
                Ok(()) => {
                    counter!("notepress_pdf_cache_evict_total").increment(1);
                    debug!(
                        target = "notepress::cache",
                        path = %entry.path.display(),
                        "cache entry evicted"
                    );
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(
                        target = "notepress::cache",
                        error = %err,
                        path = %entry.path.display(),
                        "cache eviction failed"
                    );
                }
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = match self.read_entries().await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(target = "notepress::cache", error = %err, "cache scan failed");
                Vec::new()
            }
        };

        let now = OffsetDateTime::now_utc();
        if entries.is_empty() {
            return CacheStats {
                entries: 0,
                total_bytes: 0,
                oldest: now,
                newest: now,
            };
        }

        let total_bytes = entries.iter().map(|entry| entry.size).sum();
        let oldest = entries.iter().map(|entry| entry.modified).min();
        let newest = entries.iter().map(|entry| entry.modified).max();

        CacheStats {
            entries: entries.len(),
            total_bytes,
            oldest: oldest.map(OffsetDateTime::from).unwrap_or(now),
            newest: newest.map(OffsetDateTime::from).unwrap_or(now),
        }
    }

    fn entry_path(&self, key: &Fingerprint) -> PathBuf {
        self.directory.join(format!("{key}.pdf"))
    }

    async fn read_entries(&self) -> io::Result<Vec<EntryInfo>> {
        let mut dir = tokio::fs::read_dir(&self.directory).await?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("pdf") {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push(EntryInfo {
                path,
                modified,
                size: metadata.len(),
            });
        }
        Ok(entries)
    }
}

fn is_fresh(metadata: &std::fs::Metadata, ttl: Duration) -> bool {
    let Ok(modified) = metadata.modified() else {
        return false;
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age < ttl,
        // mtime in the future, count it as fresh
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(label: &str) -> Fingerprint {
        Fingerprint::compute(&serde_json::json!({ "content": label })).expect("fingerprint")
    }

    fn config(dir: &std::path::Path, ttl_seconds: u64, max_entries: usize) -> CacheConfig {
        CacheConfig {
            directory: dir.to_path_buf(),
            ttl_seconds,
            max_entries,
        }
    }

    #[tokio::test]
    async fn store_then_lookup_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PdfStore::new(&config(dir.path(), 3600, 100)).expect("store");

        let key = key("roundtrip");
        store.store(&key, b"%PDF-1.4 fake").await;

        let bytes = store.lookup(&key).await.expect("cached entry");
        assert_eq!(bytes.as_ref(), b"%PDF-1.4 fake");
    }

    #[tokio::test]
    async fn unknown_key_is_a_miss() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PdfStore::new(&config(dir.path(), 3600, 100)).expect("store");

        assert!(store.lookup(&key("never stored")).await.is_none());
    }

    #[tokio::test]
    async fn expired_entry_misses_but_stays_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PdfStore::new(&config(dir.path(), 0, 100)).expect("store");

        let key = key("expired");
        store.store(&key, b"old").await;

        assert!(store.lookup(&key).await.is_none());
        assert!(dir.path().join(format!("{key}.pdf")).exists());
    }

    #[tokio::test]
    async fn storing_same_key_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PdfStore::new(&config(dir.path(), 3600, 100)).expect("store");

        let key = key("overwrite");
        store.store(&key, b"first").await;
        store.store(&key, b"second").await;

        let bytes = store.lookup(&key).await.expect("cached entry");
        assert_eq!(bytes.as_ref(), b"second");
    }

    #[tokio::test]
    async fn eviction_keeps_newest_entries_within_bound() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PdfStore::new(&config(dir.path(), 3600, 2)).expect("store");

        let keys: Vec<Fingerprint> = (0..4).map(|n| key(&format!("entry {n}"))).collect();
        for stored_key in &keys {
            store.store(stored_key, b"payload").await;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let stats = store.stats().await;
        assert_eq!(stats.entries, 2);
        assert!(store.lookup(&keys[3]).await.is_some());
        assert!(store.lookup(&keys[0]).await.is_none());
    }

    #[tokio::test]
    async fn stats_on_empty_store_report_zeroes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PdfStore::new(&config(dir.path(), 3600, 100)).expect("store");

        let stats = store.stats().await;
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.total_bytes, 0);
        assert!(stats.oldest <= stats.newest);
    }

    #[tokio::test]
    async fn stats_aggregate_sizes_and_timestamps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PdfStore::new(&config(dir.path(), 3600, 100)).expect("store");

        store.store(&key("a"), b"12345").await;
        store.store(&key("b"), b"123").await;

        let stats = store.stats().await;
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.total_bytes, 8);
        assert!(stats.oldest <= stats.newest);
    }

    #[tokio::test]
    async fn non_pdf_files_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PdfStore::new(&config(dir.path(), 3600, 100)).expect("store");

        tokio::fs::write(dir.path().join("stray.tmp"), b"junk")
            .await
            .expect("write stray file");
        store.store(&key("real"), b"pdf").await;

        let stats = store.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_bytes, 3);
    }
}
