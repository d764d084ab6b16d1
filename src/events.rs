//! Public event and output types for the synthesis surface.

use std::time::Duration;

use bytes::Bytes;

use crate::error::{TtsError, TtsResult};

/// Ticks are the service's native time unit, 100 nanoseconds each.
const NANOS_PER_TICK: u64 = 100;

/// One spoken-word marker on the call-wide timeline.
///
/// Offsets are global: already shifted past the audio of every earlier
/// segment, so they index into the reassembled stream as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordBoundary {
    /// Segment the word was spoken in.
    pub segment: usize,
    /// Global offset from the start of the call's audio, in 100ns ticks.
    pub offset_ticks: u64,
    /// Spoken duration, in 100ns ticks.
    pub duration_ticks: u64,
    /// The word as spoken.
    pub text: String,
}

impl WordBoundary {
    pub fn offset(&self) -> Duration {
        Duration::from_nanos(self.offset_ticks * NANOS_PER_TICK)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.duration_ticks * NANOS_PER_TICK)
    }
}

/// Events yielded by [`Synthesizer::synthesize_stream`], delivered strictly
/// in segment-index order.
///
/// [`Synthesizer::synthesize_stream`]: crate::Synthesizer::synthesize_stream
#[derive(Debug, Clone)]
pub enum SpeechEvent {
    /// One chunk of encoded audio.
    Audio { segment: usize, data: Bytes },
    /// A word boundary, rebased onto the global timeline.
    WordBoundary(WordBoundary),
    /// The segment completed and produced audio.
    SegmentEnd { segment: usize },
    /// The segment failed; later segments may still succeed unless strict
    /// mode is on.
    SegmentError { segment: usize, error: TtsError },
}

/// A per-segment failure surfaced alongside partial output.
#[derive(Debug, Clone)]
pub struct SegmentFailure {
    pub segment: usize,
    pub error: TtsError,
}

/// Complete result of a synthesis call.
///
/// `audio` concatenates every successful segment in order; when `failures`
/// is non-empty the stream has gaps where those segments would have been.
#[derive(Debug, Clone)]
pub struct StreamOutput {
    pub audio: Bytes,
    pub word_boundaries: Vec<WordBoundary>,
    pub failures: Vec<SegmentFailure>,
    pub(crate) total_segments: usize,
}

impl StreamOutput {
    /// Total number of segments the input text was split into.
    pub fn segment_count(&self) -> usize {
        self.total_segments
    }

    /// Error out unless every segment synthesized successfully.
    pub fn ensure_complete(&self) -> TtsResult<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        Err(TtsError::SegmentFailures {
            failed: self.failures.len(),
            total: self.total_segments,
            messages: self
                .failures
                .iter()
                .map(|f| format!("segment {}: {}", f.segment, f.error))
                .collect(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
