use thiserror::Error;

/// Cosine distance between feature vectors
pub mod distance;

/// Embedding capability interface and feature vector representation
pub mod embedding;

/// Long-lived identity ("customer") records
pub mod gallery;

/// Track lifecycle manager: accumulation, readiness, fragment recovery and purge
pub mod manager;

/// Appearance matching: scoring, ranking and decision
pub mod matching;

/// Frame-level driver that glues the manager, the gallery and the matcher
pub mod pipeline;

/// Public re-exports
pub mod prelude;

/// Bounding boxes and evenly spaced thinning
pub mod utils;

#[cfg(test)]
pub(crate) mod test_stuff;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Errors {
    #[error("Query vectors have length {0}, candidate vectors have length {1}.")]
    DimensionMismatch(usize, usize),
    #[error("Track {0} is not present in the active set.")]
    InvalidTrackReference(u64),
    #[error("Identity {0} is not present in the gallery.")]
    MissingIdentity(u64),
    #[error("Embedding source returned {1} vectors for {0} images.")]
    EmbeddingCountMismatch(usize, usize),
}

pub const EPS: f32 = 0.00001;

/// Timestamps are milliseconds since an arbitrary, caller-defined origin
pub type Timestamp = u64;
