/// Options object to configure the manager
pub mod options;

/// Per-track state kept by the manager
pub mod record;

use crate::embedding::{extract_checked, EmbeddingSource};
use crate::gallery::Gallery;
use crate::manager::options::TrackManagerOptions;
use crate::manager::record::TrackRecord;
use crate::matching::Matcher;
use crate::utils::bbox::BoundingBox;
use crate::{Errors, Timestamp};
use anyhow::Result;
use image::RgbImage;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};

/// One row of the external tracker output
///
#[derive(Debug, Clone, Copy)]
pub struct TrackedBox {
    pub bbox: BoundingBox,
    pub confidence: f32,
    /// tracker-assigned id, negative values are invalid
    pub track_id: i64,
}

impl TrackedBox {
    pub fn new(track_id: i64, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            bbox,
            confidence,
            track_id,
        }
    }
}

/// Outcome of a readiness check
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Not enough observations (or no crops) yet
    Collecting,
    /// The check already happened earlier
    AlreadyInited,
    /// The track is a new independent track from now on
    Inited,
    /// The track was merged into the terminated track with the given id
    Recovered(u64),
}

/// Lifecycle transitions that happened while processing a frame
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEvent {
    Inited(u64),
    Recovered { track_id: u64, into: u64 },
    Purged(u64),
}

/// Track lifecycle manager.
///
/// Owns a record for every track reported by the external tracker, accumulates crops and
/// boxes, extracts embeddings in batches, decides readiness, joins fragments of an interrupted
/// track and purges terminated tracks.
///
pub struct TrackManager<E: EmbeddingSource> {
    opts: TrackManagerOptions,
    source: E,
    tracks: BTreeMap<u64, TrackRecord>,
    aliases: HashMap<u64, u64>,
}

impl<E: EmbeddingSource> TrackManager<E> {
    pub fn new(opts: TrackManagerOptions, source: E) -> Self {
        Self {
            opts,
            source,
            tracks: BTreeMap::default(),
            aliases: HashMap::default(),
        }
    }

    pub fn options(&self) -> &TrackManagerOptions {
        &self.opts
    }

    pub fn source(&self) -> &E {
        &self.source
    }

    pub fn get(&self, track_id: u64) -> Option<&TrackRecord> {
        self.tracks.get(&track_id)
    }

    /// Tracks in the order of their ids
    ///
    pub fn tracks(&self) -> impl Iterator<Item = &TrackRecord> {
        self.tracks.values()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Maps the id reported by the tracker to the id of the record that holds its observations.
    /// The two differ after the track was joined to a terminated one.
    ///
    pub fn resolve(&self, tracker_id: u64) -> u64 {
        *self.aliases.get(&tracker_id).unwrap_or(&tracker_id)
    }

    fn record(&self, track_id: u64) -> Result<&TrackRecord> {
        Ok(self
            .tracks
            .get(&track_id)
            .ok_or(Errors::InvalidTrackReference(track_id))?)
    }

    fn record_mut(&mut self, track_id: u64) -> Result<&mut TrackRecord> {
        Ok(self
            .tracks
            .get_mut(&track_id)
            .ok_or(Errors::InvalidTrackReference(track_id))?)
    }

    /// Adds one observation of the track. No embeddings are extracted here.
    ///
    /// # Returns
    /// the id of the record that received the observation
    ///
    pub fn ingest(
        &mut self,
        tracker_id: u64,
        bbox: BoundingBox,
        frame: &RgbImage,
        frame_index: u64,
        timestamp: Timestamp,
    ) -> u64 {
        let track_id = self.resolve(tracker_id);
        let record = self
            .tracks
            .entry(track_id)
            .or_insert_with(|| TrackRecord::new(track_id, frame_index, timestamp));

        let crop = bbox.crop(frame);
        if crop.is_none() {
            debug!("Track {}: box {:?} is outside of the frame", track_id, bbox);
        }
        record.observe(bbox, crop, frame_index, timestamp);
        track_id
    }

    /// Extracts embeddings for the most recent `max_num_embeds` crops in one batch and appends
    /// them to the track.
    ///
    /// # Returns
    /// the number of embeddings appended, `0` when the track has too few crops
    ///
    pub fn refresh_embeddings(&mut self, track_id: u64) -> Result<usize> {
        let gate = self.opts.extraction_gate();
        let max_num_embeds = self.opts.max_num_embeds;
        let record = self
            .tracks
            .get_mut(&track_id)
            .ok_or(Errors::InvalidTrackReference(track_id))?;

        if record.crops().len() < gate {
            return Ok(0);
        }

        let embeddings =
            extract_checked(&mut self.source, record.recent_crops(max_num_embeds))?;
        let n = embeddings.len();
        record.append_embeddings(embeddings);
        debug!(
            "Track {}: {} embeddings extracted, {} in total",
            track_id,
            n,
            record.embeddings().len()
        );
        Ok(n)
    }

    fn refresh_or_warn(&mut self, track_id: u64) {
        if let Err(e) = self.refresh_embeddings(track_id) {
            warn!("Track {}: embeddings are not refreshed: {}", track_id, e);
        }
    }

    /// Checks whether the track has been observed long enough and, if so, either joins it to a
    /// terminated track or makes it a new independent track.
    ///
    pub fn evaluate_readiness(&mut self, track_id: u64) -> Result<Readiness> {
        let record = self.record(track_id)?;
        if record.is_inited() {
            return Ok(Readiness::AlreadyInited);
        }
        if record.bboxes().len() < self.opts.min_hits || record.crops().is_empty() {
            return Ok(Readiness::Collecting);
        }

        self.refresh_or_warn(track_id);

        if self.opts.join_enabled {
            if let Some(into) = self.join_tracks(track_id)? {
                self.recover_tracks(into, track_id)?;
                return Ok(Readiness::Recovered(into));
            }
        }

        self.record_mut(track_id)?.set_inited();
        info!("Track {} inited", track_id);
        Ok(Readiness::Inited)
    }

    /// Looks for a terminated track the given track continues.
    ///
    /// Every terminated track becomes a single-session identity in a throwaway gallery, the
    /// track is ranked against them, and the best one is accepted if it collected at least
    /// `join_min_frequency` close embedding pairs.
    ///
    pub fn join_tracks(&self, track_id: u64) -> Result<Option<u64>> {
        let query = self.record(track_id)?.query();
        if query.embeddings.is_empty() {
            return Ok(None);
        }

        let mut scratch = Gallery::unbounded();
        for dead in self
            .tracks
            .values()
            .filter(|r| r.is_dead() && r.track_id() != track_id)
        {
            scratch.create(&dead.query());
        }
        if scratch.is_empty() {
            return Ok(None);
        }

        let candidates = scratch.iter().collect::<Vec<_>>();
        let matcher = Matcher::new(self.opts.join_distance_threshold);
        let ranked = matcher.rank(&query.embeddings, &candidates);

        let best = ranked
            .first()
            .filter(|r| r.frequency >= self.opts.join_min_frequency);

        Ok(match best {
            Some(best) => {
                let into = scratch
                    .get(best.identity_id)
                    .and_then(|r| r.sessions().first())
                    .map(|s| s.track_id)
                    .ok_or(Errors::MissingIdentity(best.identity_id))?;
                info!(
                    "Join track {} with {}: distance {}, frequency {}",
                    track_id, into, best.distance, best.frequency
                );
                Some(into)
            }
            None => None,
        })
    }

    /// Merges the boxes and crops of `track_id` into the terminated track `into`, resumes
    /// `into` and drops the record of `track_id`. Further observations reported under
    /// `track_id` go to `into`.
    ///
    pub fn recover_tracks(&mut self, into: u64, track_id: u64) -> Result<()> {
        if !self.tracks.contains_key(&into) {
            return Err(Errors::InvalidTrackReference(into).into());
        }
        let fragment = self
            .tracks
            .remove(&track_id)
            .ok_or(Errors::InvalidTrackReference(track_id))?;

        self.record_mut(into)?.absorb(fragment);

        for target in self.aliases.values_mut() {
            if *target == track_id {
                *target = into;
            }
        }
        self.aliases.insert(track_id, into);
        info!("Track {} recovered as {}", track_id, into);
        Ok(())
    }

    /// Handles the termination reported by the tracker. Negative ids are ignored.
    ///
    pub fn mark_dead(&mut self, tracker_id: i64) -> Result<()> {
        if tracker_id < 0 {
            debug!("Invalid terminated track id {} ignored", tracker_id);
            return Ok(());
        }
        let track_id = self.resolve(tracker_id as u64);
        self.record(track_id)?;

        self.refresh_or_warn(track_id);
        self.record_mut(track_id)?.set_dead();
        debug!("Track {} is dead", track_id);
        Ok(())
    }

    /// Purges terminated tracks that ended more than `max_fragment_frame` frames ago.
    ///
    /// # Returns
    /// ids of purged tracks
    ///
    pub fn sweep(&mut self, frame_index: u64) -> Vec<u64> {
        let timeout = self.opts.max_fragment_frame;
        let purged = self
            .tracks
            .values()
            .filter(|r| r.is_dead() && frame_index.saturating_sub(r.end_frame()) > timeout)
            .map(|r| r.track_id())
            .collect::<Vec<_>>();

        for track_id in &purged {
            self.tracks.remove(track_id);
            debug!("Track {} purged", track_id);
        }
        self.aliases.retain(|_, target| !purged.contains(target));
        purged
    }

    /// Records the identity the track was assigned by the gallery
    ///
    pub fn assign_identity(&mut self, track_id: u64, identity_id: u64) -> Result<()> {
        self.record_mut(track_id)?.set_identity(identity_id);
        Ok(())
    }

    /// Processes the tracker output for one frame: ingests alive tracks and checks their
    /// readiness, refreshes embeddings of grown tracks, terminates dead tracks and purges
    /// expired ones.
    ///
    /// Nothing here fails the frame: invalid ids and extraction errors are logged and skipped.
    ///
    pub fn update(
        &mut self,
        alive: &[TrackedBox],
        dead: &[i64],
        frame: &RgbImage,
        frame_index: u64,
        timestamp: Timestamp,
    ) -> Vec<TrackEvent> {
        let mut events = Vec::default();

        for row in alive {
            if row.track_id < 0 {
                warn!("Invalid track id {} skipped", row.track_id);
                continue;
            }
            let track_id =
                self.ingest(row.track_id as u64, row.bbox, frame, frame_index, timestamp);

            match self.evaluate_readiness(track_id) {
                Ok(Readiness::Inited) => events.push(TrackEvent::Inited(track_id)),
                Ok(Readiness::Recovered(into)) => {
                    events.push(TrackEvent::Recovered { track_id, into })
                }
                Ok(Readiness::AlreadyInited) => {
                    let grown = self
                        .tracks
                        .get(&track_id)
                        .map(|r| r.crops_since_refresh() >= self.opts.max_num_embeds)
                        .unwrap_or(false);
                    if grown {
                        self.refresh_or_warn(track_id);
                    }
                }
                Ok(Readiness::Collecting) => {}
                Err(e) => warn!("Track {}: readiness check failed: {}", track_id, e),
            }
        }

        for tracker_id in dead {
            if let Err(e) = self.mark_dead(*tracker_id) {
                warn!("Terminated track {} ignored: {}", tracker_id, e);
            }
        }

        events.extend(self.sweep(frame_index).into_iter().map(TrackEvent::Purged));
        events
    }
}
