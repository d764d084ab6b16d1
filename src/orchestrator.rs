//! Multi-segment orchestration: a bounded session pool and an ordering
//! merger.
//!
//! Every segment runs its own session task, gated by a semaphore so at most
//! `max_concurrency` sockets are open per request. Session events funnel
//! through one unbounded channel into the merger task, the single writer of
//! all cross-segment state. The merger releases events strictly in segment
//! order: segment `i+1` stays buffered until segment `i` has reached its
//! terminal event, which also guarantees the timeline shift for `i+1` is
//! final before any of its boundaries are rebased.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::assembler::AudioAssembler;
use crate::config::ReadyConfig;
use crate::error::{TtsError, TtsResult};
use crate::events::{SegmentFailure, SpeechEvent, StreamOutput, WordBoundary};
use crate::protocol::session::{self, SessionEvent, SessionStatus};
use crate::segment;
use crate::ssml;
use crate::timeline::TimelineReconstructor;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A running synthesis request: the ordered event stream plus its
/// cancellation token.
pub(crate) struct ActiveStream {
    pub events: mpsc::Receiver<SpeechEvent>,
    pub cancel: CancellationToken,
    pub total_segments: usize,
}

/// Segment the text and launch one session per segment.
pub(crate) fn start(config: Arc<ReadyConfig>, text: &str) -> TtsResult<ActiveStream> {
    let normalized = segment::normalize(text);
    let budget = ssml::max_payload_bytes(&config);
    let segments = segment::split(&normalized, budget)?;
    let total = segments.len();
    info!(segments = total, "Starting synthesis request");

    let cancel = CancellationToken::new();
    let (raw_tx, raw_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let semaphore = Arc::new(Semaphore::new(config.max_concurrency));
    for piece in segments {
        let config = Arc::clone(&config);
        let tx = raw_tx.clone();
        let cancel = cancel.clone();
        let semaphore = Arc::clone(&semaphore);
        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            session::run_session(piece.index, piece.payload, config, tx, cancel).await;
        });
    }
    // The merger's channel closes once the last session task drops its clone.
    drop(raw_tx);

    let strict = config.strict;
    tokio::spawn(run_merger(
        raw_rx,
        events_tx,
        total,
        strict,
        cancel.clone(),
    ));

    Ok(ActiveStream {
        events: events_rx,
        cancel,
        total_segments: total,
    })
}

/// Drain an [`ActiveStream`] into an accumulated [`StreamOutput`].
pub(crate) async fn collect(mut stream: ActiveStream) -> StreamOutput {
    let mut assembler = AudioAssembler::new();
    let mut word_boundaries = Vec::new();
    let mut failures = Vec::new();

    while let Some(event) = stream.events.recv().await {
        match event {
            SpeechEvent::Audio { segment, data } => assembler.push(segment, data),
            SpeechEvent::WordBoundary(boundary) => word_boundaries.push(boundary),
            SpeechEvent::SegmentEnd { .. } => {}
            SpeechEvent::SegmentError { segment, error } => {
                failures.push(SegmentFailure { segment, error })
            }
        }
    }

    if assembler.is_empty() {
        debug!(
            segments = stream.total_segments,
            "Request produced no audio"
        );
    }
    StreamOutput {
        audio: assembler.finish(),
        word_boundaries,
        failures,
        total_segments: stream.total_segments,
    }
}

// =============================================================================
// Ordering merger
// =============================================================================

/// Single writer over the cross-segment state (timeline, buffers, cursor).
/// Receives session events in arrival order, emits public events in segment
/// order. Exits when every segment has been released or the raw channel
/// closes early (cancellation drops sessions without a full flush).
async fn run_merger(
    mut raw_rx: mpsc::UnboundedReceiver<SessionEvent>,
    events_tx: mpsc::Sender<SpeechEvent>,
    total: usize,
    strict: bool,
    cancel: CancellationToken,
) {
    let mut timeline = TimelineReconstructor::new();
    let mut buffered: Vec<Vec<SessionEvent>> = vec![Vec::new(); total];
    let mut status: Vec<Option<SessionStatus>> = vec![None; total];
    let mut cursor = 0;

    'recv: while cursor < total {
        let Some(event) = raw_rx.recv().await else {
            break;
        };

        match event {
            SessionEvent::End {
                segment,
                status: terminal,
            } => {
                if strict
                    && matches!(
                        terminal,
                        SessionStatus::NoAudio | SessionStatus::Failed(_)
                    )
                {
                    debug!(segment, "Strict mode: cancelling outstanding segments");
                    cancel.cancel();
                }
                status[segment] = Some(terminal);
            }
            other => {
                let segment = match &other {
                    SessionEvent::Audio { segment, .. }
                    | SessionEvent::Boundary { segment, .. } => *segment,
                    SessionEvent::End { .. } => unreachable!(),
                };
                buffered[segment].push(other);
            }
        }

        // Release everything the cursor allows: the head segment streams
        // live, later segments wait for every predecessor's terminal.
        while cursor < total {
            for event in buffered[cursor].drain(..) {
                if events_tx.send(translate(event, &mut timeline)).await.is_err() {
                    // Consumer is gone; tear the request down.
                    cancel.cancel();
                    break 'recv;
                }
            }
            let Some(terminal) = status[cursor].take() else {
                break;
            };
            if let Some(event) = terminal_event(cursor, terminal) {
                if events_tx.send(event).await.is_err() {
                    cancel.cancel();
                    break 'recv;
                }
            }
            cursor += 1;
        }
    }
}

fn translate(event: SessionEvent, timeline: &mut TimelineReconstructor) -> SpeechEvent {
    match event {
        SessionEvent::Audio { segment, data } => SpeechEvent::Audio { segment, data },
        SessionEvent::Boundary {
            segment,
            offset,
            duration,
            text,
        } => {
            let offset_ticks = timeline.rebase(segment, offset, duration);
            SpeechEvent::WordBoundary(WordBoundary {
                segment,
                offset_ticks,
                duration_ticks: duration,
                text,
            })
        }
        SessionEvent::End { .. } => unreachable!("terminals are handled by the cursor"),
    }
}

fn terminal_event(segment: usize, status: SessionStatus) -> Option<SpeechEvent> {
    match status {
        SessionStatus::Succeeded => Some(SpeechEvent::SegmentEnd { segment }),
        SessionStatus::NoAudio => Some(SpeechEvent::SegmentError {
            segment,
            error: TtsError::NoAudioReceived,
        }),
        SessionStatus::Failed(error) => Some(SpeechEvent::SegmentError { segment, error }),
        // Cancellation flushes nothing.
        SessionStatus::Cancelled => None,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TRAILING_SILENCE_TICKS;
    use bytes::Bytes;

    fn audio(segment: usize, data: &'static [u8]) -> SessionEvent {
        SessionEvent::Audio {
            segment,
            data: Bytes::from_static(data),
        }
    }

    fn boundary(segment: usize, offset: u64, duration: u64, text: &str) -> SessionEvent {
        SessionEvent::Boundary {
            segment,
            offset,
            duration,
            text: text.to_string(),
        }
    }

    fn end(segment: usize, status: SessionStatus) -> SessionEvent {
        SessionEvent::End { segment, status }
    }

    /// Pump a fixed raw-event sequence through the merger and collect the
    /// public stream.
    async fn merge(
        raw: Vec<SessionEvent>,
        total: usize,
        strict: bool,
    ) -> (Vec<SpeechEvent>, CancellationToken) {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (events_tx, mut events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        for event in raw {
            raw_tx.send(event).unwrap();
        }
        drop(raw_tx);

        run_merger(raw_rx, events_tx, total, strict, cancel.clone()).await;

        let mut out = Vec::new();
        while let Some(event) = events_rx.recv().await {
            out.push(event);
        }
        (out, cancel)
    }

    fn summarize(events: &[SpeechEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| match e {
                SpeechEvent::Audio { segment, data } => {
                    format!("audio{segment}:{}", String::from_utf8_lossy(data))
                }
                SpeechEvent::WordBoundary(b) => format!("word{}:{}", b.segment, b.offset_ticks),
                SpeechEvent::SegmentEnd { segment } => format!("end{segment}"),
                SpeechEvent::SegmentError { segment, .. } => format!("err{segment}"),
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Ordering
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_out_of_order_completion_is_released_in_index_order() {
        // Segment 1 finishes entirely before segment 0 produces anything.
        let raw = vec![
            audio(1, b"one"),
            end(1, SessionStatus::Succeeded),
            audio(0, b"zero"),
            end(0, SessionStatus::Succeeded),
        ];
        let (events, _) = merge(raw, 2, false).await;
        assert_eq!(
            summarize(&events),
            vec!["audio0:zero", "end0", "audio1:one", "end1"]
        );
    }

    #[tokio::test]
    async fn test_head_segment_streams_before_its_terminal() {
        let raw = vec![
            audio(0, b"a"),
            audio(1, b"buffered"),
            audio(0, b"b"),
            end(0, SessionStatus::Succeeded),
            end(1, SessionStatus::Succeeded),
        ];
        let (events, _) = merge(raw, 2, false).await;
        assert_eq!(
            summarize(&events),
            vec!["audio0:a", "audio0:b", "end0", "audio1:buffered", "end1"]
        );
    }

    #[tokio::test]
    async fn test_boundaries_are_rebased_in_index_order() {
        // Segment 1's boundary arrives first; its shift must still include
        // segment 0's full contribution.
        let raw = vec![
            boundary(1, 100, 50, "later"),
            end(1, SessionStatus::Succeeded),
            boundary(0, 1_000, 2_000, "first"),
            end(0, SessionStatus::Succeeded),
        ];
        let (events, _) = merge(raw, 2, false).await;

        let offsets: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                SpeechEvent::WordBoundary(b) => Some(b.offset_ticks),
                _ => None,
            })
            .collect();
        let shift = 1_000 + 2_000 + TRAILING_SILENCE_TICKS;
        assert_eq!(offsets, vec![1_000, shift + 100]);
    }

    // -------------------------------------------------------------------------
    // Failures
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_failure_is_isolated_in_non_strict_mode() {
        let raw = vec![
            end(0, SessionStatus::Failed(TtsError::ProtocolError("boom".to_string()))),
            audio(1, b"fine"),
            end(1, SessionStatus::Succeeded),
        ];
        let (events, cancel) = merge(raw, 2, false).await;
        assert_eq!(summarize(&events), vec!["err0", "audio1:fine", "end1"]);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_no_audio_surfaces_as_segment_error() {
        let raw = vec![end(0, SessionStatus::NoAudio)];
        let (events, _) = merge(raw, 1, false).await;
        match &events[..] {
            [SpeechEvent::SegmentError {
                segment: 0,
                error: TtsError::NoAudioReceived,
            }] => {}
            other => panic!("expected NoAudioReceived error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_strict_mode_cancels_on_first_failure() {
        let raw = vec![end(1, SessionStatus::Failed(TtsError::NoAudioReceived))];
        let (_, cancel) = merge(raw, 3, true).await;
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_segments_emit_nothing() {
        let raw = vec![
            audio(0, b"kept"),
            end(0, SessionStatus::Succeeded),
            end(1, SessionStatus::Cancelled),
        ];
        let (events, _) = merge(raw, 2, false).await;
        assert_eq!(summarize(&events), vec!["audio0:kept", "end0"]);
    }

    #[tokio::test]
    async fn test_merger_exits_on_early_channel_close() {
        // Segment 1 never reports a terminal; the merger must not hang.
        let raw = vec![audio(0, b"a"), end(0, SessionStatus::Succeeded)];
        let (events, _) = merge(raw, 3, false).await;
        assert_eq!(summarize(&events), vec!["audio0:a", "end0"]);
    }

    // -------------------------------------------------------------------------
    // Collection
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_collect_accumulates_in_order() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        for event in [
            audio(1, b"-two"),
            boundary(1, 10, 5, "two"),
            end(1, SessionStatus::Succeeded),
            audio(0, b"one"),
            boundary(0, 0, 7, "one"),
            end(0, SessionStatus::Succeeded),
            end(2, SessionStatus::Failed(TtsError::NoAudioReceived)),
        ] {
            raw_tx.send(event).unwrap();
        }
        drop(raw_tx);
        tokio::spawn(run_merger(raw_rx, events_tx, 3, false, cancel.clone()));

        let output = collect(ActiveStream {
            events: events_rx,
            cancel,
            total_segments: 3,
        })
        .await;

        assert_eq!(output.audio, Bytes::from_static(b"one-two"));
        assert_eq!(output.segment_count(), 3);
        assert_eq!(output.word_boundaries.len(), 2);
        assert_eq!(output.word_boundaries[0].text, "one");
        assert!(output.word_boundaries[0].offset_ticks < output.word_boundaries[1].offset_ticks);
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].segment, 2);
        assert!(output.ensure_complete().is_err());
    }
}
