/// Bounding boxes
pub mod bbox;

/// Evenly spaced thinning of sequences
pub mod thinning;
