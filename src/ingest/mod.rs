//! Ingestion pipeline: fence stripping and tabular normalization

pub mod fence;
pub mod normalize;

pub use fence::strip_fences;
pub use normalize::{normalize, TabularArtifact};
