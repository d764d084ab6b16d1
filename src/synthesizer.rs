//! Caller-facing synthesis handle.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{ReadyConfig, SpeechConfig};
use crate::error::{TtsError, TtsResult};
use crate::events::{SpeechEvent, StreamOutput, WordBoundary};
use crate::orchestrator;

/// Handle for synthesis requests against one validated configuration.
///
/// Cheap to clone conceptually (holds only shared read-only configuration);
/// every call opens its own set of WebSocket sessions and no state persists
/// between calls.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    config: Arc<ReadyConfig>,
}

impl Synthesizer {
    /// Validate the configuration and build a synthesizer.
    pub fn new(config: SpeechConfig) -> TtsResult<Self> {
        Ok(Self {
            config: Arc::new(config.validate()?),
        })
    }

    /// Synthesize `text` and accumulate the entire result in memory.
    ///
    /// Per-segment failures do not abort the call (unless strict mode is on):
    /// surviving segments' audio and boundaries are returned alongside the
    /// failures. Use [`StreamOutput::ensure_complete`] to turn gaps into an
    /// error.
    pub async fn synthesize(&self, text: &str) -> TtsResult<StreamOutput> {
        let stream = orchestrator::start(Arc::clone(&self.config), text)?;
        Ok(orchestrator::collect(stream).await)
    }

    /// Synthesize `text`, writing audio to `sink` as it arrives, and return
    /// the word boundaries.
    ///
    /// Fails with [`TtsError::SegmentFailures`] when any segment failed; the
    /// audio written so far stays in the sink, with gaps where the failed
    /// segments would have been.
    pub async fn synthesize_to<W>(&self, text: &str, sink: &mut W) -> TtsResult<Vec<WordBoundary>>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut stream = orchestrator::start(Arc::clone(&self.config), text)?;
        let mut boundaries = Vec::new();
        let mut failures = Vec::new();

        while let Some(event) = stream.events.recv().await {
            match event {
                SpeechEvent::Audio { data, .. } => {
                    if let Err(e) = sink.write_all(&data).await {
                        stream.cancel.cancel();
                        return Err(TtsError::TransportError(format!(
                            "failed to write audio to sink: {e}"
                        )));
                    }
                }
                SpeechEvent::WordBoundary(boundary) => boundaries.push(boundary),
                SpeechEvent::SegmentEnd { .. } => {}
                SpeechEvent::SegmentError { segment, error } => {
                    failures.push((segment, error));
                }
            }
        }

        if !failures.is_empty() {
            return Err(TtsError::SegmentFailures {
                failed: failures.len(),
                total: stream.total_segments,
                messages: failures
                    .iter()
                    .map(|(segment, error)| format!("segment {segment}: {error}"))
                    .collect(),
            });
        }
        Ok(boundaries)
    }

    /// Synthesize `text` as a live event stream.
    ///
    /// Events arrive strictly in segment order. The returned token cancels
    /// the whole request; dropping the receiver cancels it too.
    pub async fn synthesize_stream(
        &self,
        text: &str,
    ) -> TtsResult<(mpsc::Receiver<SpeechEvent>, CancellationToken)> {
        let stream = orchestrator::start(Arc::clone(&self.config), text)?;
        Ok((stream.events, stream.cancel))
    }
}

// =============================================================================
// Tests
// =============================================================================
