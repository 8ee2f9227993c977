use crate::distance::cosine_distance;
use crate::embedding::{Embedding, Feature, FromVec};
use crate::gallery::IdentityRecord;
use crate::Errors;
use anyhow::Result;
use log::{debug, warn};
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Result of comparing a query signature with one identity
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub identity_id: u64,
    /// number of query/identity embedding pairs closer than the threshold
    pub frequency: usize,
    /// mean distance of the pairs counted in `frequency`, or of all pairs when there are none
    pub distance: f32,
}

impl MatchResult {
    pub fn new(identity_id: u64, frequency: usize, distance: f32) -> Self {
        Self {
            identity_id,
            frequency,
            distance,
        }
    }

    /// Ranking order: higher frequency first, then lower distance
    ///
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .frequency
            .cmp(&self.frequency)
            .then(self.distance.total_cmp(&other.distance))
    }
}

/// Outcome of the match / no-match decision
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    /// The query belongs to an existing identity
    Matched(u64),
    /// The query is a person not seen before
    New,
}

/// Options that drive the gallery match decision
///
#[derive(Debug, Clone)]
pub struct MatchingOptions {
    distance_threshold: f32,
    min_frequency: usize,
}

impl Default for MatchingOptions {
    fn default() -> Self {
        Self {
            distance_threshold: 0.3,
            min_frequency: 3,
        }
    }
}

impl MatchingOptions {
    /// Cosine distance under which a pair of embeddings counts as a match. The same value is
    /// used to accept the winning identity.
    ///
    pub fn distance_threshold(mut self, threshold: f32) -> Self {
        assert!(
            (0.0..=2.0).contains(&threshold),
            "Cosine distance threshold must lay within [0.0:2.0]"
        );
        self.distance_threshold = threshold;
        self
    }

    /// Minimal number of matching pairs an identity needs to be considered at all.
    ///
    pub fn min_frequency(mut self, n: usize) -> Self {
        self.min_frequency = n;
        self
    }

    pub fn get_distance_threshold(&self) -> f32 {
        self.distance_threshold
    }

    pub fn get_min_frequency(&self) -> usize {
        self.min_frequency
    }

    pub fn matcher(&self) -> Matcher {
        Matcher::new(self.distance_threshold)
    }

    /// Ranks `candidates` against `query` and decides
    ///
    pub fn identify(&self, query: &[Embedding], candidates: &[&IdentityRecord]) -> MatchDecision {
        let ranked = self.matcher().rank(query, candidates);
        decide(&ranked, self.min_frequency, self.distance_threshold)
    }
}

/// Packs vectors into SIMD features, checking that all of them share one length.
///
fn features(vectors: &[Embedding]) -> Result<(usize, Vec<Feature>)> {
    let dim = vectors.first().map(|v| v.len()).unwrap_or(0);
    if let Some(ragged) = vectors.iter().find(|v| v.len() != dim) {
        return Err(Errors::DimensionMismatch(dim, ragged.len()).into());
    }
    Ok((
        dim,
        vectors
            .iter()
            .map(|v| Feature::from_vec(v.as_slice()))
            .collect(),
    ))
}

/// Appearance matching engine
///
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    distance_threshold: f32,
}

impl Matcher {
    pub fn new(distance_threshold: f32) -> Self {
        Self { distance_threshold }
    }

    /// Full pairwise cosine distance matrix, rows are query vectors
    ///
    pub fn distance_matrix(
        &self,
        query: &[Embedding],
        candidate: &[Embedding],
    ) -> Result<DMatrix<f32>> {
        let (query_dim, query) = features(query)?;
        let (candidate_dim, candidate) = features(candidate)?;
        if !query.is_empty() && !candidate.is_empty() && query_dim != candidate_dim {
            return Err(Errors::DimensionMismatch(query_dim, candidate_dim).into());
        }
        Ok(DMatrix::from_fn(query.len(), candidate.len(), |i, j| {
            cosine_distance(&query[i], &candidate[j])
        }))
    }

    /// Counts the pairs under the threshold and summarises their distance.
    ///
    /// Empty input on either side is not an error, it gives `(0, 0.0)`. When no pair is under
    /// the threshold, the mean of the whole matrix is reported.
    ///
    /// # Returns
    /// `(frequency, distance)`
    ///
    pub fn score_embeddings(
        &self,
        query: &[Embedding],
        candidate: &[Embedding],
    ) -> Result<(usize, f32)> {
        let m = self.distance_matrix(query, candidate)?;
        if m.is_empty() {
            return Ok((0, 0.0));
        }

        let (frequency, sum) = m
            .iter()
            .filter(|d| **d < self.distance_threshold)
            .fold((0usize, 0.0f32), |(n, s), d| (n + 1, s + d));

        if frequency > 0 {
            Ok((frequency, sum / frequency as f32))
        } else {
            Ok((0, m.mean()))
        }
    }

    /// Scores the query against one identity
    ///
    pub fn score(&self, query: &[Embedding], candidate: &IdentityRecord) -> Result<MatchResult> {
        let (frequency, distance) = self.score_embeddings(query, candidate.embeddings())?;
        Ok(MatchResult::new(candidate.identity_id(), frequency, distance))
    }

    /// Scores the query against every candidate and sorts results by frequency (decreasing), then
    /// by distance (increasing). Candidates that can't be scored are skipped.
    ///
    /// Candidates with equal keys keep their input order, so the ranking is reproducible.
    ///
    pub fn rank(&self, query: &[Embedding], candidates: &[&IdentityRecord]) -> Vec<MatchResult> {
        let scored = candidates
            .par_iter()
            .map(|c| (c.identity_id(), self.score(query, c)))
            .collect::<Vec<_>>();

        let mut results = scored
            .into_iter()
            .filter_map(|(identity_id, res)| match res {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!("Identity {} skipped from ranking: {}", identity_id, e);
                    None
                }
            })
            .collect::<Vec<_>>();

        results.sort_by(|l, r| l.rank_cmp(r));
        debug!("Ranked candidates: {:#?}", &results);
        results
    }
}

/// Picks the best identity from ranked results.
///
/// Results with fewer than `min_frequency` matching pairs are discarded; the first remaining
/// one is accepted only when its distance is under `distance_threshold`.
///
pub fn decide(
    ranked: &[MatchResult],
    min_frequency: usize,
    distance_threshold: f32,
) -> MatchDecision {
    match ranked.iter().find(|r| r.frequency >= min_frequency) {
        Some(best) if best.distance < distance_threshold => {
            MatchDecision::Matched(best.identity_id)
        }
        _ => MatchDecision::New,
    }
}
