/// Class that is used to configure the track lifecycle manager
#[derive(Debug, Clone)]
pub struct TrackManagerOptions {
    pub(crate) min_hits: usize,
    pub(crate) min_num_embeds: usize,
    pub(crate) max_num_embeds: usize,
    pub(crate) max_fragment_frame: u64,
    pub(crate) join_enabled: bool,
    pub(crate) join_min_frequency: usize,
    pub(crate) join_distance_threshold: f32,
}

impl Default for TrackManagerOptions {
    fn default() -> Self {
        Self {
            min_hits: 10,
            min_num_embeds: 10,
            max_num_embeds: 10,
            max_fragment_frame: 50,
            join_enabled: true,
            join_min_frequency: 5,
            join_distance_threshold: 0.2,
        }
    }
}

impl TrackManagerOptions {
    /// The number of observed boxes after which the track is checked for readiness: it is either
    /// joined to a recently terminated track or becomes a new independent track.
    ///
    pub fn min_hits(mut self, n: usize) -> Self {
        assert!(n > 0, "The number of hits must be a positive number");
        self.min_hits = n;
        self
    }

    /// The minimal number of collected crops required to call the embedding source. With fewer
    /// crops the embedding refresh does nothing. Equals `max_num_embeds` by default, values
    /// above `max_num_embeds` act as `max_num_embeds`.
    ///
    pub fn min_num_embeds(mut self, n: usize) -> Self {
        assert!(n > 0, "The number of embeddings must be a positive number");
        self.min_num_embeds = n;
        self
    }

    /// The number of most recent crops sent to the embedding source in one batch. An inited track
    /// is refreshed each time it collects that many new crops.
    ///
    pub fn max_num_embeds(mut self, n: usize) -> Self {
        assert!(n > 0, "The number of embeddings must be a positive number");
        self.max_num_embeds = n;
        self
    }

    /// The number of frames a terminated track is kept for fragment recovery before it is purged.
    ///
    pub fn max_fragment_frame(mut self, n: u64) -> Self {
        self.max_fragment_frame = n;
        self
    }

    /// Enables or disables fragment recovery (joining new tracks to recently terminated ones).
    ///
    pub fn join_enabled(mut self, enabled: bool) -> Self {
        self.join_enabled = enabled;
        self
    }

    /// The minimal number of close embedding pairs a terminated track needs to be joined.
    ///
    pub fn join_min_frequency(mut self, n: usize) -> Self {
        self.join_min_frequency = n;
        self
    }

    /// Cosine distance under which a pair of embeddings counts for joining.
    ///
    pub fn join_distance_threshold(mut self, threshold: f32) -> Self {
        assert!(
            (0.0..=2.0).contains(&threshold),
            "Cosine distance threshold must lay within [0.0:2.0]"
        );
        self.join_distance_threshold = threshold;
        self
    }

    pub(crate) fn extraction_gate(&self) -> usize {
        self.min_num_embeds.min(self.max_num_embeds)
    }
}

#[cfg(test)]
mod tests {
    use crate::manager::options::TrackManagerOptions;

    #[test]
    fn default_gate_is_a_full_batch() {
        let opts = TrackManagerOptions::default();
        assert_eq!(opts.extraction_gate(), opts.max_num_embeds);
    }

    #[test]
    fn extraction_gate() {
        let opts = TrackManagerOptions::default()
            .min_num_embeds(3)
            .max_num_embeds(8);
        assert_eq!(opts.extraction_gate(), 3);

        let opts = opts.min_num_embeds(12);
        assert_eq!(opts.extraction_gate(), 8);
    }

    #[test]
    #[should_panic]
    fn zero_hits() {
        let _ = TrackManagerOptions::default().min_hits(0);
    }
}
