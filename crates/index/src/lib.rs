mod crawl;
mod error;
mod pacing;
mod upload;

pub use crawl::{build_document, crawl, discover_files, CrawlConfig, DEFAULT_EXTENSIONS};
pub use error::{IndexError, Result};
pub use pacing::{FixedDelay, Pacer, RateLimiter};
pub use upload::{IndexReport, Indexer, IndexerConfig, DEFAULT_BATCH_SIZE, DEFAULT_BATCH_DELAY};
