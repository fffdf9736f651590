// Data-loading collaborators and the on-disk series format
pub mod file_source;
pub mod series_file;
pub mod source;

// Re-export commonly used types
pub use file_source::FileSource;
pub use series_file::SeriesFile;
pub use source::{BarSource, FallbackSource, InMemorySource};
