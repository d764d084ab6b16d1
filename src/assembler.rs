//! Reassembly of per-segment audio chunks into one contiguous stream.

use bytes::{Bytes, BytesMut};

/// Collects audio chunks keyed by segment index and concatenates them in
/// segment order. Chunks may arrive interleaved across segments; ordering
/// within a segment follows arrival order, which the session preserves.
#[derive(Debug, Default)]
pub(crate) struct AudioAssembler {
    segments: Vec<Vec<Bytes>>,
}

impl AudioAssembler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, segment: usize, chunk: Bytes) {
        if segment >= self.segments.len() {
            self.segments.resize_with(segment + 1, Vec::new);
        }
        self.segments[segment].push(chunk);
    }

    /// True if no segment contributed any audio bytes.
    pub(crate) fn is_empty(&self) -> bool {
        self.segments
            .iter()
            .all(|chunks| chunks.iter().all(|c| c.is_empty()))
    }

    /// Concatenate everything in segment order into a single buffer.
    pub(crate) fn finish(self) -> Bytes {
        let total: usize = self
            .segments
            .iter()
            .flat_map(|chunks| chunks.iter().map(Bytes::len))
            .sum();
        let mut out = BytesMut::with_capacity(total);
        for chunks in self.segments {
            for chunk in chunks {
                out.extend_from_slice(&chunk);
            }
        }
        out.freeze()
    }
}

// =============================================================================
// Tests
// =============================================================================
