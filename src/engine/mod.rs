pub mod batch;
pub mod cache;
pub mod core;
pub mod retry;

// Re-export key components
pub use batch::{BatchReport, CancellationFlag};
pub use cache::{CacheKey, CacheStats, LevelCache};
pub use core::LevelEngine;
pub use retry::RetryPolicy;
