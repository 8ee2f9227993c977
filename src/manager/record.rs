use crate::embedding::Embedding;
use crate::gallery::{Query, TimeSpan};
use crate::utils::bbox::BoundingBox;
use crate::Timestamp;
use image::RgbImage;

/// Where the track is in the identification process
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingState {
    /// No identity assigned yet
    #[default]
    Pending,
    /// The track was matched against the gallery and carries an identity
    Scored,
    /// The external tracker reported the track terminated
    Terminal,
}

/// Everything collected for one track reported by the external tracker
///
#[derive(Debug, Clone)]
pub struct TrackRecord {
    track_id: u64,
    bboxes: Vec<BoundingBox>,
    crops: Vec<RgbImage>,
    embeddings: Vec<Embedding>,
    start_frame: u64,
    end_frame: u64,
    start_time: Timestamp,
    end_time: Timestamp,
    inited: bool,
    dead: bool,
    state: ProcessingState,
    identity_id: Option<u64>,
    crops_since_refresh: usize,
}

impl TrackRecord {
    pub fn new(track_id: u64, frame_index: u64, timestamp: Timestamp) -> Self {
        Self {
            track_id,
            bboxes: Vec::default(),
            crops: Vec::default(),
            embeddings: Vec::default(),
            start_frame: frame_index,
            end_frame: frame_index,
            start_time: timestamp,
            end_time: timestamp,
            inited: false,
            dead: false,
            state: ProcessingState::Pending,
            identity_id: None,
            crops_since_refresh: 0,
        }
    }

    pub fn track_id(&self) -> u64 {
        self.track_id
    }

    pub fn bboxes(&self) -> &[BoundingBox] {
        &self.bboxes
    }

    pub fn crops(&self) -> &[RgbImage] {
        &self.crops
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    pub fn end_frame(&self) -> u64 {
        self.end_frame
    }

    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    pub fn end_time(&self) -> Timestamp {
        self.end_time
    }

    pub fn is_inited(&self) -> bool {
        self.inited
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn state(&self) -> ProcessingState {
        self.state
    }

    pub fn identity_id(&self) -> Option<u64> {
        self.identity_id
    }

    pub fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start_time, self.end_time)
    }

    /// The appearance signature submitted to the gallery
    ///
    pub fn query(&self) -> Query {
        Query::new(self.track_id, self.span(), self.embeddings.clone())
    }

    pub(crate) fn crops_since_refresh(&self) -> usize {
        self.crops_since_refresh
    }

    pub(crate) fn observe(
        &mut self,
        bbox: BoundingBox,
        crop: Option<RgbImage>,
        frame_index: u64,
        timestamp: Timestamp,
    ) {
        self.bboxes.push(bbox);
        if let Some(crop) = crop {
            self.crops.push(crop);
            self.crops_since_refresh += 1;
        }
        self.end_frame = self.end_frame.max(frame_index);
        self.end_time = self.end_time.max(timestamp);
    }

    /// The most recent `n` crops
    ///
    pub(crate) fn recent_crops(&self, n: usize) -> &[RgbImage] {
        &self.crops[self.crops.len().saturating_sub(n)..]
    }

    pub(crate) fn append_embeddings(&mut self, embeddings: Vec<Embedding>) {
        self.embeddings.extend(embeddings);
        self.crops_since_refresh = 0;
    }

    pub(crate) fn set_inited(&mut self) {
        self.inited = true;
    }

    pub(crate) fn set_dead(&mut self) {
        self.dead = true;
        self.state = ProcessingState::Terminal;
    }

    pub(crate) fn set_identity(&mut self, identity_id: u64) {
        self.identity_id = Some(identity_id);
        if !self.dead {
            self.state = ProcessingState::Scored;
        }
    }

    /// Takes over the observations of a fragment that continues this track and resumes it.
    ///
    pub(crate) fn absorb(&mut self, fragment: TrackRecord) {
        self.crops_since_refresh += fragment.crops.len();
        self.bboxes.extend(fragment.bboxes);
        self.crops.extend(fragment.crops);
        self.end_frame = self.end_frame.max(fragment.end_frame);
        self.end_time = self.end_time.max(fragment.end_time);
        self.dead = false;
        self.state = if self.identity_id.is_some() {
            ProcessingState::Scored
        } else {
            ProcessingState::Pending
        };
    }
}
