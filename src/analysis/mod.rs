// Level detection stages and the pipeline tying them together
pub mod clustering;
pub mod extrema;
pub mod pipeline;
pub mod strength;
pub mod validation;
pub mod volume_profile;

// Re-export commonly used types
pub use pipeline::run_pipeline;
pub use validation::{ValidatedLevel, ValidationOutcome};
pub use volume_profile::{LevelCandidate, VolumeNode, VolumeProfile};
