use crate::Errors;
use anyhow::Result;
use image::RgbImage;
use ultraviolet::f32x8;

/// Appearance vector as produced by an embedding model
pub type Embedding = Vec<f32>;

/// Feature vector packed into SIMD lanes, used internally for distance calculation
pub type Feature = Vec<f32x8>;

/// Number of SIMD lanes used to store feature parts internally
pub(crate) const FEATURE_LANES_SIZE: usize = 8;

/// The capability the core depends on to turn person crops into appearance vectors.
///
/// Implementations wrap a concrete inference backend (ONNX runtime, a native engine, a
/// remote service). The core never depends on the backend itself.
///
/// The contract:
/// * one vector per image, in the same order as the input;
/// * all vectors share the same length;
/// * identical pixels produce identical vectors, otherwise gallery decisions are not reproducible.
///
pub trait EmbeddingSource {
    fn extract(&mut self, images: &[RgbImage]) -> Result<Vec<Embedding>>;
}

/// Calls the source and checks that it honoured the one-vector-per-image contract.
///
pub(crate) fn extract_checked<E: EmbeddingSource>(
    source: &mut E,
    images: &[RgbImage],
) -> Result<Vec<Embedding>> {
    let vectors = source.extract(images)?;
    if vectors.len() != images.len() {
        return Err(Errors::EmbeddingCountMismatch(images.len(), vectors.len()).into());
    }
    Ok(vectors)
}

impl FromVec<&Feature, Vec<f32>> for Vec<f32> {
    fn from_vec(vec: &Feature) -> Vec<f32> {
        let mut res = Vec::with_capacity(vec.len() * FEATURE_LANES_SIZE);
        for e in vec {
            res.extend_from_slice(e.as_array_ref());
        }
        res
    }
}

/// Feature from Vec<f32>
///
impl FromVec<Vec<f32>, Feature> for Feature {
    fn from_vec(vec: Vec<f32>) -> Feature {
        Feature::from_vec(vec.as_slice())
    }
}

/// Feature from &[f32]
///
impl FromVec<&[f32], Feature> for Feature {
    fn from_vec(vec: &[f32]) -> Feature {
        let mut feature = {
            let one_more = usize::from(vec.len() % FEATURE_LANES_SIZE > 0);
            Feature::with_capacity(vec.len() / FEATURE_LANES_SIZE + one_more)
        };

        for chunk in vec.chunks(FEATURE_LANES_SIZE) {
            let mut acc: [f32; FEATURE_LANES_SIZE] = [0.0; FEATURE_LANES_SIZE];
            acc[..chunk.len()].copy_from_slice(chunk);
            feature.push(f32x8::new(acc));
        }
        feature
    }
}

/// Utility trait to get conversion between feature vector representations
///
pub trait FromVec<V, R> {
    fn from_vec(vec: V) -> R;
}

#[cfg(test)]
mod tests {
    use crate::embedding::{extract_checked, Embedding, EmbeddingSource, Feature, FromVec};
    use crate::Errors;
    use anyhow::Result;
    use image::RgbImage;

    #[test]
    fn conv_tests() {
        let v = vec![0.0, 0.2, 0.3];
        let o = Feature::from_vec(v);
        assert_eq!(o.len(), 1);
        let v2 = Vec::from_vec(&o);
        assert_eq!(v2, vec![0.0, 0.2, 0.3, 0.0, 0.0, 0.0, 0.0, 0.0]);

        let v = (0..9).map(|i| i as f32).collect::<Vec<_>>();
        let o = Feature::from_vec(v.as_slice());
        assert_eq!(o.len(), 2);
        let v2 = Vec::from_vec(&o);
        assert_eq!(&v2[..9], v.as_slice());
    }

    struct Lossy;

    impl EmbeddingSource for Lossy {
        fn extract(&mut self, images: &[RgbImage]) -> Result<Vec<Embedding>> {
            Ok(images.iter().skip(1).map(|_| vec![1.0]).collect())
        }
    }

    #[test]
    fn count_mismatch_is_reported() {
        let images = vec![RgbImage::new(2, 2), RgbImage::new(2, 2)];
        let res = extract_checked(&mut Lossy, &images);
        let err = res.unwrap_err();
        assert_eq!(
            err.downcast_ref::<Errors>(),
            Some(&Errors::EmbeddingCountMismatch(2, 1))
        );
    }
}
