pub mod config;
pub mod keys;
pub mod store;

pub use config::CacheConfig;
pub use keys::Fingerprint;
pub use store::{CacheStats, PdfStore};
