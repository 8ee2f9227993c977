pub use crate::embedding::{Embedding, EmbeddingSource};
pub use crate::gallery::{Gallery, GalleryOptions, IdentityRecord, Query, Session, TimeSpan};
pub use crate::manager::options::TrackManagerOptions;
pub use crate::manager::record::{ProcessingState, TrackRecord};
pub use crate::manager::{Readiness, TrackEvent, TrackManager, TrackedBox};
pub use crate::matching::{MatchDecision, MatchResult, Matcher, MatchingOptions};
pub use crate::pipeline::{FrameReport, ReidOptions, ReidPipeline, TrackAnnotation};
pub use crate::utils::bbox::BoundingBox;
pub use crate::Errors;
