use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_CACHE_DIRECTORY: &str = ".pdf-cache";
pub const DEFAULT_TTL_SECONDS: u64 = 60 * 60;
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Bounds for the on-disk PDF store. Injected into [`super::PdfStore`] at
/// construction; nothing here is global.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub directory: PathBuf,
    pub ttl_seconds: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_CACHE_DIRECTORY),
            ttl_seconds: DEFAULT_TTL_SECONDS,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            directory: settings.directory.clone(),
            ttl_seconds: settings.ttl_seconds,
            max_entries: settings.max_entries,
        }
    }
}
