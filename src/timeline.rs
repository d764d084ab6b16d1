//! Cross-segment timeline reconstruction for word boundaries.
//!
//! Each segment's boundary offsets restart at zero when its turn begins. To
//! present one continuous timeline, every boundary of segment `i` is shifted
//! by the summed audio extent of segments `0..i`: a segment's extent is the
//! end of its last word boundary plus a fixed trailing-silence allowance.
//! Boundaries must be fed in segment-index order; the merger guarantees that.

use crate::constants::TRAILING_SILENCE_TICKS;

pub(crate) struct TimelineReconstructor {
    /// Accumulated shift for the segment currently being fed, in ticks.
    shift: u64,
    current_segment: Option<usize>,
    /// End tick (offset + duration) of the newest boundary in the current
    /// segment, relative to its own turn start.
    segment_end: u64,
}

impl TimelineReconstructor {
    pub(crate) fn new() -> Self {
        Self {
            shift: 0,
            current_segment: None,
            segment_end: 0,
        }
    }

    /// Rebase one boundary onto the global timeline, returning its global
    /// offset in ticks. The first boundary of a new segment folds the
    /// previous segment's extent into the shift; segments that produced no
    /// boundaries contribute nothing.
    pub(crate) fn rebase(&mut self, segment: usize, offset: u64, duration: u64) -> u64 {
        if self.current_segment != Some(segment) {
            if self.current_segment.is_some() {
                self.shift += self.segment_end + TRAILING_SILENCE_TICKS;
            }
            self.current_segment = Some(segment);
            self.segment_end = 0;
        }
        self.segment_end = offset + duration;
        self.shift + offset
    }
}

// =============================================================================
// Tests
// =============================================================================
