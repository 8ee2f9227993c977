use crate::embedding::Feature;
use std::ops::{Mul, MulAssign};

/// Cosine similarity between two feature vectors
///
/// When the feature lengths don't match, the longer feature vector is truncated to
/// the shorter one. A zero vector has no direction, so its similarity with anything is `0.0`.
///
pub fn cosine(f1: &Feature, f2: &Feature) -> f32 {
    let mut divided = 0.0;
    let len = f1.len().min(f2.len());
    for i in 0..len {
        let mut block1 = f1[i];
        let block2 = &f2[i];
        block1.mul_assign(block2);
        divided += block1.reduce_add();
    }

    let f1_divisor = f1
        .iter()
        .take(len)
        .fold(0.0_f32, |acc, a| acc + a.mul(a).reduce_add());

    let f2_divisor = f2
        .iter()
        .take(len)
        .fold(0.0_f32, |acc, a| acc + a.mul(a).reduce_add());

    let divisor = (f1_divisor * f2_divisor).sqrt();
    if divisor == 0.0 {
        0.0
    } else {
        divided / divisor
    }
}

/// Cosine distance `1 - cosine(f1, f2)`, lays within `[0.0; 2.0]`
///
pub fn cosine_distance(f1: &Feature, f2: &Feature) -> f32 {
    (1.0 - cosine(f1, f2)).max(0.0)
}
