/// Bounded representative-set merge of embeddings
pub mod merge;

use crate::embedding::Embedding;
use crate::gallery::merge::representative_merge;
use crate::utils::thinning::thin;
use crate::{Errors, Timestamp};
use anyhow::Result;
use log::debug;
use std::collections::BTreeMap;

/// Inclusive time interval `[start; end]`
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeSpan {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeSpan {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        assert!(start <= end, "Span must not end before it starts");
        Self { start, end }
    }

    /// Two spans overlap when `min(ends) >= max(starts)`. Touching spans overlap.
    ///
    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.end.min(other.end) >= self.start.max(other.start)
    }

    /// Smallest span covering both
    ///
    pub fn envelope(&self, other: &TimeSpan) -> TimeSpan {
        TimeSpan {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// One observation episode (a track) contributed to an identity
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub track_id: u64,
    pub span: TimeSpan,
}

/// Appearance signature of one track, submitted to the gallery for matching and registration
///
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub track_id: u64,
    pub span: TimeSpan,
    pub embeddings: Vec<Embedding>,
}

impl Query {
    pub fn new(track_id: u64, span: TimeSpan, embeddings: Vec<Embedding>) -> Self {
        Self {
            track_id,
            span,
            embeddings,
        }
    }

    pub fn session(&self) -> Session {
        Session {
            track_id: self.track_id,
            span: self.span,
        }
    }
}

/// Long-lived identity ("customer") record
///
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    identity_id: u64,
    sessions: Vec<Session>,
    embeddings: Vec<Embedding>,
    span: TimeSpan,
    update_count: usize,
}

impl IdentityRecord {
    pub fn identity_id(&self) -> u64 {
        self.identity_id
    }

    /// Sessions ordered by their end time
    ///
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    /// Envelope of all sessions
    ///
    pub fn span(&self) -> TimeSpan {
        self.span
    }

    /// How many times the embedding set was built or merged (1 after creation)
    ///
    pub fn update_count(&self) -> usize {
        self.update_count
    }

    fn recompute_span(&mut self) {
        self.span = self
            .sessions
            .iter()
            .map(|s| s.span)
            .reduce(|acc, s| acc.envelope(&s))
            .unwrap_or_default();
    }

    fn sort_sessions(&mut self) {
        self.sessions.sort_by_key(|s| s.span.end);
    }
}

/// Options of the identity gallery
///
#[derive(Debug, Clone)]
pub struct GalleryOptions {
    max_embeddings: usize,
}

impl Default for GalleryOptions {
    fn default() -> Self {
        Self { max_embeddings: 20 }
    }
}

impl GalleryOptions {
    /// The maximum number of embeddings an identity retains. When a session is merged into an
    /// identity whose set would overflow, the representative-set merge decides what survives.
    ///
    pub fn max_embeddings(mut self, n: usize) -> Self {
        assert!(n > 0, "The number of embeddings kept must be a positive number");
        self.max_embeddings = n;
        self
    }

    pub fn get_max_embeddings(&self) -> usize {
        self.max_embeddings
    }
}

/// Store of identities observed across sessions
///
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    opts: GalleryOptions,
    identities: BTreeMap<u64, IdentityRecord>,
    last_identity_id: u64,
}

impl Gallery {
    pub fn new(opts: GalleryOptions) -> Self {
        Self {
            opts,
            identities: BTreeMap::default(),
            last_identity_id: 0,
        }
    }

    /// Gallery that never evicts embeddings. Used as a throwaway comparison set.
    ///
    pub fn unbounded() -> Self {
        Self::new(GalleryOptions::default().max_embeddings(usize::MAX))
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn get(&self, identity_id: u64) -> Option<&IdentityRecord> {
        self.identities.get(&identity_id)
    }

    /// Identities in the order of their ids
    ///
    pub fn iter(&self) -> impl Iterator<Item = &IdentityRecord> {
        self.identities.values()
    }

    /// Identities that may be the person observed during `span`.
    ///
    /// A person cannot be in two places at once, so identities whose span overlaps the query
    /// span are excluded.
    ///
    pub fn candidates(&self, span: &TimeSpan) -> Vec<&IdentityRecord> {
        self.identities
            .values()
            .filter(|r| !r.span.overlaps(span))
            .collect()
    }

    fn gen_identity_id(&mut self) -> u64 {
        self.last_identity_id += 1;
        self.last_identity_id
    }

    /// Registers a new identity from the query and returns its id.
    ///
    /// A query carrying more embeddings than the cap is thinned evenly down to the cap.
    ///
    pub fn create(&mut self, query: &Query) -> u64 {
        let identity_id = self.gen_identity_id();
        let record = IdentityRecord {
            identity_id,
            sessions: vec![query.session()],
            embeddings: thin(query.embeddings.clone(), self.opts.max_embeddings),
            span: query.span,
            update_count: 1,
        };
        debug!("Identity {} created from track {}", identity_id, query.track_id);
        self.identities.insert(identity_id, record);
        identity_id
    }

    /// Merges the query into an existing identity: the session is appended, the span is
    /// widened and the embeddings are merged with the representative-set algorithm.
    ///
    pub fn update(&mut self, identity_id: u64, query: &Query) -> Result<()> {
        let max_embeddings = self.opts.max_embeddings;
        let record = self
            .identities
            .get_mut(&identity_id)
            .ok_or(Errors::MissingIdentity(identity_id))?;

        record.sessions.push(query.session());
        record.sort_sessions();
        record.recompute_span();

        record.update_count += 1;
        record.embeddings = representative_merge(
            &record.embeddings,
            &query.embeddings,
            record.update_count,
            max_embeddings,
        );

        debug!(
            "Identity {} updated from track {}, update count {}",
            identity_id, query.track_id, record.update_count
        );
        Ok(())
    }

    /// Moves the end of the identity's session for `track_id` forward to `end`.
    ///
    /// Keeps the identity span in sync with a track that is still being observed after the
    /// identity was assigned. Ends never move backwards.
    ///
    pub fn extend_session(
        &mut self,
        identity_id: u64,
        track_id: u64,
        end: Timestamp,
    ) -> Result<()> {
        let record = self
            .identities
            .get_mut(&identity_id)
            .ok_or(Errors::MissingIdentity(identity_id))?;

        let session = record
            .sessions
            .iter_mut()
            .rev()
            .find(|s| s.track_id == track_id)
            .ok_or(Errors::InvalidTrackReference(track_id))?;

        if end > session.span.end {
            session.span.end = end;
            record.sort_sessions();
            record.recompute_span();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::gallery::{Gallery, GalleryOptions, Query, TimeSpan};
    use crate::test_stuff::random_span;
    use crate::Errors;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn query(track_id: u64, start: u64, end: u64, n: usize) -> Query {
        Query::new(
            track_id,
            TimeSpan::new(start, end),
            (0..n).map(|i| vec![i as f32, 1.0]).collect(),
        )
    }

    #[test]
    fn overlap() {
        let s = TimeSpan::new(10, 20);
        assert!(s.overlaps(&TimeSpan::new(15, 30)));
        assert!(s.overlaps(&TimeSpan::new(0, 10)));
        assert!(s.overlaps(&TimeSpan::new(20, 25)));
        assert!(s.overlaps(&TimeSpan::new(12, 13)));
        assert!(s.overlaps(&TimeSpan::new(0, 100)));
        assert!(!s.overlaps(&TimeSpan::new(0, 9)));
        assert!(!s.overlaps(&TimeSpan::new(21, 30)));
    }

    #[test]
    fn ids_are_monotonic() {
        let mut g = Gallery::new(GalleryOptions::default());
        assert_eq!(g.create(&query(5, 0, 10, 3)), 1);
        assert_eq!(g.create(&query(6, 20, 30, 3)), 2);
        assert_eq!(g.create(&query(7, 40, 50, 3)), 3);
        assert_eq!(g.len(), 3);

        let r = g.get(2).unwrap();
        assert_eq!(r.update_count(), 1);
        assert_eq!(r.sessions().len(), 1);
        assert_eq!(r.sessions()[0].track_id, 6);
        assert_eq!(r.span(), TimeSpan::new(20, 30));
        assert_eq!(r.embeddings().len(), 3);
    }

    #[test]
    fn create_keeps_the_cap() {
        let mut g = Gallery::new(GalleryOptions::default().max_embeddings(4));
        let id = g.create(&query(1, 0, 10, 10));
        assert!(g.get(id).unwrap().embeddings().len() <= 4);
    }

    #[test]
    fn candidates_exclude_overlapping() {
        let mut g = Gallery::new(GalleryOptions::default());
        g.create(&query(1, 0, 10, 3));
        g.create(&query(2, 5, 30, 3));
        g.create(&query(3, 40, 50, 3));

        let span = TimeSpan::new(12, 20);
        let c = g.candidates(&span);
        assert_eq!(
            c.iter().map(|r| r.identity_id()).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert!(c.iter().all(|r| !r.span().overlaps(&span)));

        assert!(g.candidates(&TimeSpan::new(0, 100)).is_empty());
        assert_eq!(g.candidates(&TimeSpan::new(31, 39)).len(), 3);
    }

    #[test]
    fn candidates_never_overlap() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut g = Gallery::new(GalleryOptions::default());
        for track_id in 0..50 {
            let span = random_span(&mut rng);
            g.create(&Query::new(track_id, span, vec![vec![1.0, 0.0]]));
        }
        for _ in 0..100 {
            let span = random_span(&mut rng);
            let c = g.candidates(&span);
            assert!(c.iter().all(|r| !r.span().overlaps(&span)));
            assert_eq!(
                c.len(),
                g.iter().filter(|r| !r.span().overlaps(&span)).count()
            );
        }
    }

    #[test]
    fn update_merges() {
        let mut g = Gallery::new(GalleryOptions::default().max_embeddings(20));
        let id = g.create(&query(1, 100, 200, 18));
        g.update(id, &query(2, 10, 50, 5)).unwrap();

        let r = g.get(id).unwrap();
        assert_eq!(r.update_count(), 2);
        assert_eq!(r.embeddings().len(), 20);
        assert_eq!(r.span(), TimeSpan::new(10, 200));
        assert_eq!(
            r.sessions().iter().map(|s| s.track_id).collect::<Vec<_>>(),
            vec![2, 1]
        );

        g.update(id, &query(3, 300, 400, 2)).unwrap();
        let r = g.get(id).unwrap();
        assert_eq!(r.update_count(), 3);
        assert_eq!(r.span(), TimeSpan::new(10, 400));
        assert!(r.embeddings().len() <= 20);
    }

    #[test]
    fn update_missing() {
        let mut g = Gallery::new(GalleryOptions::default());
        let err = g.update(7, &query(1, 0, 1, 1)).unwrap_err();
        assert_eq!(err.downcast_ref::<Errors>(), Some(&Errors::MissingIdentity(7)));
    }

    #[test]
    fn extend_session() {
        let mut g = Gallery::new(GalleryOptions::default());
        let id = g.create(&query(1, 0, 10, 3));
        g.extend_session(id, 1, 25).unwrap();
        assert_eq!(g.get(id).unwrap().span(), TimeSpan::new(0, 25));
        g.extend_session(id, 1, 5).unwrap();
        assert_eq!(g.get(id).unwrap().span(), TimeSpan::new(0, 25));

        let err = g.extend_session(id, 9, 30).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Errors>(),
            Some(&Errors::InvalidTrackReference(9))
        );
    }
}
