use crate::embedding::EmbeddingSource;
use crate::gallery::{Gallery, GalleryOptions};
use crate::manager::options::TrackManagerOptions;
use crate::manager::{TrackEvent, TrackManager, TrackedBox};
use crate::matching::{MatchDecision, MatchingOptions};
use crate::utils::bbox::BoundingBox;
use crate::{Errors, Timestamp};
use anyhow::Result;
use image::RgbImage;
use log::{info, warn};

/// Options of the whole re-identification pipeline
///
#[derive(Debug, Clone, Default)]
pub struct ReidOptions {
    manager: TrackManagerOptions,
    gallery: GalleryOptions,
    matching: MatchingOptions,
}

impl ReidOptions {
    pub fn manager(mut self, opts: TrackManagerOptions) -> Self {
        self.manager = opts;
        self
    }

    pub fn gallery(mut self, opts: GalleryOptions) -> Self {
        self.gallery = opts;
        self
    }

    pub fn matching(mut self, opts: MatchingOptions) -> Self {
        self.matching = opts;
        self
    }
}

/// What the pipeline knows about one alive row of the frame
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackAnnotation {
    /// id reported by the tracker
    pub tracker_id: i64,
    /// id of the record holding the observations, differs from `tracker_id` after recovery
    pub track_id: u64,
    pub identity_id: Option<u64>,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub annotations: Vec<TrackAnnotation>,
    pub events: Vec<TrackEvent>,
}

/// Frame driver: feeds tracker output into the lifecycle manager and identifies tracks
/// against the long-lived gallery
///
pub struct ReidPipeline<E: EmbeddingSource> {
    manager: TrackManager<E>,
    gallery: Gallery,
    matching: MatchingOptions,
}

impl<E: EmbeddingSource> ReidPipeline<E> {
    pub fn new(opts: ReidOptions, source: E) -> Self {
        Self {
            manager: TrackManager::new(opts.manager, source),
            gallery: Gallery::new(opts.gallery),
            matching: opts.matching,
        }
    }

    pub fn manager(&self) -> &TrackManager<E> {
        &self.manager
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    /// Processes the tracker output of one frame.
    ///
    /// Every inited track without an identity is identified: the gallery gives the candidates
    /// that could be the person, the matching engine ranks them, and the query either updates
    /// the winner or creates a new identity.
    ///
    pub fn process_frame(
        &mut self,
        frame: &RgbImage,
        frame_index: u64,
        timestamp: Timestamp,
        alive: &[TrackedBox],
        dead: &[i64],
    ) -> FrameReport {
        let events = self.manager.update(alive, dead, frame, frame_index, timestamp);

        let mut annotations = Vec::with_capacity(alive.len());
        for row in alive.iter().filter(|r| r.track_id >= 0) {
            let track_id = self.manager.resolve(row.track_id as u64);
            let (identity_id, identifiable, end_time) = match self.manager.get(track_id) {
                Some(r) => (
                    r.identity_id(),
                    r.is_inited() && !r.embeddings().is_empty(),
                    r.end_time(),
                ),
                None => (None, false, timestamp),
            };

            let identity_id = match identity_id {
                Some(identity_id) => {
                    if let Err(e) = self.gallery.extend_session(identity_id, track_id, end_time) {
                        warn!("Identity {}: session is not extended: {}", identity_id, e);
                    }
                    Some(identity_id)
                }
                None if identifiable => match self.identify(track_id) {
                    Ok(identity_id) => Some(identity_id),
                    Err(e) => {
                        warn!("Track {} is not identified: {}", track_id, e);
                        None
                    }
                },
                None => None,
            };

            annotations.push(TrackAnnotation {
                tracker_id: row.track_id,
                track_id,
                identity_id,
                bbox: row.bbox,
            });
        }

        FrameReport {
            annotations,
            events,
        }
    }

    /// Matches the track against the gallery and registers it.
    ///
    /// # Returns
    /// the identity assigned to the track
    ///
    pub fn identify(&mut self, track_id: u64) -> Result<u64> {
        let query = self
            .manager
            .get(track_id)
            .ok_or(Errors::InvalidTrackReference(track_id))?
            .query();

        let decision = {
            let candidates = self.gallery.candidates(&query.span);
            self.matching.identify(&query.embeddings, &candidates)
        };

        let identity_id = match decision {
            MatchDecision::Matched(identity_id) => {
                self.gallery.update(identity_id, &query)?;
                info!("Track {} re-identified as {}", track_id, identity_id);
                identity_id
            }
            MatchDecision::New => {
                let identity_id = self.gallery.create(&query);
                info!("Track {} is a new identity {}", track_id, identity_id);
                identity_id
            }
        };

        self.manager.assign_identity(track_id, identity_id)?;
        Ok(identity_id)
    }
}
