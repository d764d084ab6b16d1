//! Per-segment synthesis session.
//!
//! One session owns one WebSocket connection and walks it through the
//! protocol's lifecycle: connect with a fresh access token, send the
//! `speech.config` and `ssml` frames, then read until `turn.end`, a failure,
//! or cancellation. Every frame the session accepts turns into a
//! [`SessionEvent`] on the orchestrator's channel; the session always ends by
//! sending exactly one `End` event, and its socket is closed on every exit
//! path.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::client_async_tls_with_config;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{self, DrmToken, HANDSHAKE_HEADERS};
use crate::config::ReadyConfig;
use crate::constants::{TRUSTED_CLIENT_TOKEN, WSS_ENDPOINT};
use crate::error::{TtsError, TtsResult};
use crate::protocol::frame::{self, MetadataEntry, ProtocolFrame};
use crate::ssml;
use crate::transport;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Session Events
// =============================================================================

/// Terminal outcome of one session.
#[derive(Debug, Clone)]
pub(crate) enum SessionStatus {
    /// `turn.end` arrived after at least one audio chunk.
    Succeeded,
    /// The session reached a terminal state without ever emitting audio.
    NoAudio,
    /// The call-scoped cancellation token fired.
    Cancelled,
    /// Connection, transport, or protocol failure.
    Failed(TtsError),
}

/// Events a session reports to the orchestrator's merge task.
///
/// Boundary offsets are local to the segment's own turn; the merge task
/// rebases them onto the global timeline.
#[derive(Debug, Clone)]
pub(crate) enum SessionEvent {
    Audio {
        segment: usize,
        data: Bytes,
    },
    Boundary {
        segment: usize,
        offset: u64,
        duration: u64,
        text: String,
    },
    End {
        segment: usize,
        status: SessionStatus,
    },
}

// =============================================================================
// Session driver
// =============================================================================

/// Run one segment's session to completion. Always emits exactly one
/// [`SessionEvent::End`], whatever path the session takes.
pub(crate) async fn run_session(
    segment: usize,
    payload: String,
    config: Arc<ReadyConfig>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
) {
    let status = match drive(segment, &payload, &config, &events, &cancel).await {
        Ok(status) => status,
        Err(error) => {
            warn!(segment, %error, "Synthesis session failed");
            SessionStatus::Failed(error)
        }
    };
    let _ = events.send(SessionEvent::End { segment, status });
}

/// Build the per-connection endpoint URL: base plus trusted token, access
/// token, token version, and connection id.
fn endpoint_url(
    config: &ReadyConfig,
    token: &DrmToken,
    connection_id: &str,
) -> TtsResult<Url> {
    let base = config.endpoint.as_deref().unwrap_or(WSS_ENDPOINT);
    let raw = format!(
        "{base}?TrustedClientToken={TRUSTED_CLIENT_TOKEN}\
         &Sec-MS-GEC={digest}\
         &Sec-MS-GEC-Version={version}\
         &ConnectionId={connection_id}",
        digest = token.digest,
        version = DrmToken::version(),
    );
    Url::parse(&raw)
        .map_err(|e| TtsError::ConfigurationError(format!("invalid endpoint URL {raw:?}: {e}")))
}

async fn drive(
    segment: usize,
    payload: &str,
    config: &ReadyConfig,
    events: &mpsc::UnboundedSender<SessionEvent>,
    cancel: &CancellationToken,
) -> TtsResult<SessionStatus> {
    // Tokens are time-windowed; derive fresh ones per connection attempt.
    let connection_id = auth::connection_id();
    let token = DrmToken::generate();
    let url = endpoint_url(config, &token, &connection_id)?;

    let stream = tokio::select! {
        _ = cancel.cancelled() => return Ok(SessionStatus::Cancelled),
        dialed = transport::dial(&url, config) => dialed?,
    };
    let connector = transport::tls_connector(config)?;

    let host = url
        .host_str()
        .ok_or_else(|| TtsError::ConnectionError(format!("endpoint URL has no host: {url}")))?;
    let host_header = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let mut builder = Request::builder()
        .method("GET")
        .uri(url.as_str())
        .header("Host", host_header)
        .header("Upgrade", "websocket")
        .header("Connection", "upgrade")
        .header("Sec-WebSocket-Key", generate_key())
        .header("Sec-WebSocket-Version", "13");
    for (name, value) in HANDSHAKE_HEADERS.iter() {
        builder = builder.header(*name, value.as_str());
    }
    let request = builder.body(()).map_err(|e| {
        TtsError::ConnectionError(format!("failed to build WebSocket request: {e}"))
    })?;

    let handshake = client_async_tls_with_config(request, stream, None, connector);
    let (ws_stream, _response) = tokio::select! {
        _ = cancel.cancelled() => return Ok(SessionStatus::Cancelled),
        result = timeout(CONNECT_TIMEOUT, handshake) => match result {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => {
                return Err(TtsError::ConnectionError(format!(
                    "WebSocket handshake failed: {e}"
                )))
            }
            Err(_) => {
                return Err(TtsError::ConnectionError(format!(
                    "connection timed out after {}s",
                    CONNECT_TIMEOUT.as_secs()
                )))
            }
        },
    };

    info!(segment, connection_id = %connection_id, "Synthesis session connected");
    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    // speech.config, then the segment's SSML request.
    let config_frame = ssml::config_frame(&auth::timestamp_string());
    ws_sink
        .send(Message::text(config_frame))
        .await
        .map_err(|e| TtsError::TransportError(format!("failed to send speech.config: {e}")))?;

    let document = ssml::build_ssml(config, payload);
    let ssml_frame = ssml::ssml_frame(&connection_id, &auth::timestamp_string(), &document);
    ws_sink
        .send(Message::text(ssml_frame))
        .await
        .map_err(|e| TtsError::TransportError(format!("failed to send ssml: {e}")))?;

    let mut armed = false;
    let mut saw_audio = false;

    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(segment, "Session cancelled, closing socket");
                let _ = ws_sink.send(Message::Close(None)).await;
                return Ok(SessionStatus::Cancelled);
            }
            message = ws_stream.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => match frame::parse_text_frame(text.as_str())? {
                ProtocolFrame::TurnStart => {
                    debug!(segment, "Turn started");
                    armed = true;
                }
                ProtocolFrame::TurnEnd => {
                    debug!(segment, "Turn ended, closing socket");
                    let _ = ws_sink.send(Message::Close(None)).await;
                    if saw_audio {
                        return Ok(SessionStatus::Succeeded);
                    }
                    return Ok(SessionStatus::NoAudio);
                }
                ProtocolFrame::Response => {}
                ProtocolFrame::AudioMetadata(entries) => {
                    handle_metadata(segment, entries, events)?;
                }
                ProtocolFrame::AudioData(_) => unreachable!("text frames never carry audio"),
            },
            Some(Ok(Message::Binary(data))) => {
                if !armed {
                    return Err(TtsError::ProtocolError(
                        "binary frame received before turn.start".to_string(),
                    ));
                }
                match frame::parse_binary_frame(data)? {
                    ProtocolFrame::AudioData(audio) if !audio.is_empty() => {
                        saw_audio = true;
                        let _ = events.send(SessionEvent::Audio {
                            segment,
                            data: audio,
                        });
                    }
                    _ => {}
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                if !saw_audio {
                    return Ok(SessionStatus::NoAudio);
                }
                return Err(TtsError::TransportError(
                    "connection closed before turn.end".to_string(),
                ));
            }
            Some(Ok(_)) => {} // ping/pong, answered by the socket layer
            Some(Err(e)) => {
                return Err(TtsError::TransportError(format!("WebSocket error: {e}")));
            }
        }
    }
}

fn handle_metadata(
    segment: usize,
    entries: Vec<MetadataEntry>,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> TtsResult<()> {
    for entry in entries {
        match entry.kind.as_str() {
            "WordBoundary" => {
                let _ = events.send(SessionEvent::Boundary {
                    segment,
                    offset: entry.data.offset,
                    duration: entry.data.duration,
                    text: entry.data.text.content,
                });
            }
            "SessionEnd" => {}
            other => {
                return Err(TtsError::ProtocolError(format!(
                    "unknown metadata type: {other}"
                )));
            }
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    // -------------------------------------------------------------------------
    // Mock synthesis service
    // -------------------------------------------------------------------------

    #[derive(Clone, Copy)]
    enum Script {
        /// turn.start, audio, word boundary, turn.end.
        Normal,
        /// turn.start then immediate close, no audio.
        CloseAfterTurnStart,
        /// Binary audio before turn.start.
        BinaryBeforeStart,
        /// turn.start then metadata that is not valid JSON.
        MalformedMetadata,
        /// turn.start then metadata of an unknown type.
        UnknownMetadataType,
        /// turn.start then silence until the client goes away.
        Stall,
    }

    fn text_frame(path: &str, body: &str) -> Message {
        Message::text(format!("X-RequestId:x\r\nPath:{path}\r\n\r\n{body}"))
    }

    fn audio_frame(payload: &[u8]) -> Message {
        let headers = b"Path:audio\r\n";
        let mut data = Vec::new();
        data.extend_from_slice(&(headers.len() as u16).to_be_bytes());
        data.extend_from_slice(headers);
        data.extend_from_slice(payload);
        Message::binary(data)
    }

    fn boundary_frame(offset: u64, duration: u64, word: &str) -> Message {
        let body = format!(
            r#"{{"Metadata":[{{"Type":"WordBoundary","Data":{{"Offset":{offset},"Duration":{duration},"text":{{"Text":"{word}","Length":{},"BoundaryType":"WordBoundary"}}}}}}]}}"#,
            word.len()
        );
        text_frame("audio.metadata", &body)
    }

    /// Bind a one-shot mock service and return its ws:// URL.
    async fn spawn_mock(script: Script) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();

            // speech.config and ssml must arrive before anything is spoken.
            let config = ws.next().await.unwrap().unwrap();
            assert!(config.to_text().unwrap().contains("Path:speech.config"));
            let ssml = ws.next().await.unwrap().unwrap();
            assert!(ssml.to_text().unwrap().contains("Path:ssml"));

            match script {
                Script::Normal => {
                    ws.send(text_frame("turn.start", "{}")).await.unwrap();
                    ws.send(audio_frame(b"AUDIO-1")).await.unwrap();
                    ws.send(boundary_frame(1_000_000, 500_000, "hello"))
                        .await
                        .unwrap();
                    ws.send(audio_frame(b"AUDIO-2")).await.unwrap();
                    ws.send(text_frame("turn.end", "{}")).await.unwrap();
                }
                Script::CloseAfterTurnStart => {
                    ws.send(text_frame("turn.start", "{}")).await.unwrap();
                    ws.close(None).await.unwrap();
                }
                Script::BinaryBeforeStart => {
                    ws.send(audio_frame(b"EARLY")).await.unwrap();
                }
                Script::MalformedMetadata => {
                    ws.send(text_frame("turn.start", "{}")).await.unwrap();
                    ws.send(text_frame("audio.metadata", "not json")).await.unwrap();
                }
                Script::UnknownMetadataType => {
                    ws.send(text_frame("turn.start", "{}")).await.unwrap();
                    ws.send(text_frame(
                        "audio.metadata",
                        r#"{"Metadata":[{"Type":"VisemeEvent","Data":{}}]}"#,
                    ))
                    .await
                    .unwrap();
                }
                Script::Stall => {
                    ws.send(text_frame("turn.start", "{}")).await.unwrap();
                    // Hold the connection open until the peer disconnects.
                    while let Some(Ok(_)) = ws.next().await {}
                    return;
                }
            }
            // Drain until the client closes.
            while let Some(Ok(_)) = ws.next().await {}
        });
        format!("ws://127.0.0.1:{}", addr.port())
    }

    async fn run_against(script: Script) -> (Vec<SessionEvent>, SessionStatus) {
        run_against_with_cancel(script, CancellationToken::new()).await
    }

    async fn run_against_with_cancel(
        script: Script,
        cancel: CancellationToken,
    ) -> (Vec<SessionEvent>, SessionStatus) {
        let endpoint = spawn_mock(script).await;
        let config = crate::config::SpeechConfig {
            endpoint: Some(endpoint),
            ..Default::default()
        };
        let config = Arc::new(config.validate().unwrap());
        let (tx, mut rx) = mpsc::unbounded_channel();

        run_session(0, "hello world".to_string(), config, tx, cancel).await;

        let mut events = Vec::new();
        let mut status = None;
        while let Some(event) = rx.recv().await {
            match event {
                SessionEvent::End { status: s, .. } => {
                    status = Some(s);
                }
                other => events.push(other),
            }
        }
        (events, status.unwrap())
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_happy_path_collects_audio_and_boundaries() {
        let (events, status) = run_against(Script::Normal).await;
        assert!(matches!(status, SessionStatus::Succeeded));

        let audio: Vec<&Bytes> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Audio { data, .. } => Some(data),
                _ => None,
            })
            .collect();
        assert_eq!(audio, vec![&Bytes::from_static(b"AUDIO-1"), &Bytes::from_static(b"AUDIO-2")]);

        let boundaries: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Boundary {
                    offset,
                    duration,
                    text,
                    ..
                } => Some((*offset, *duration, text.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(boundaries, vec![(1_000_000, 500_000, "hello")]);
    }

    #[tokio::test]
    async fn test_close_after_turn_start_is_no_audio() {
        let (events, status) = run_against(Script::CloseAfterTurnStart).await;
        assert!(events.is_empty());
        assert!(matches!(status, SessionStatus::NoAudio));
    }

    #[tokio::test]
    async fn test_binary_before_turn_start_is_protocol_error() {
        let (_, status) = run_against(Script::BinaryBeforeStart).await;
        assert!(matches!(
            status,
            SessionStatus::Failed(TtsError::ProtocolError(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_metadata_is_protocol_error() {
        let (_, status) = run_against(Script::MalformedMetadata).await;
        assert!(matches!(
            status,
            SessionStatus::Failed(TtsError::ProtocolError(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_metadata_type_is_protocol_error() {
        let (_, status) = run_against(Script::UnknownMetadataType).await;
        assert!(matches!(
            status,
            SessionStatus::Failed(TtsError::ProtocolError(_))
        ));
    }

    #[tokio::test]
    async fn test_cancellation_ends_a_stalled_session() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let (_, status) = tokio::time::timeout(
            Duration::from_secs(5),
            run_against_with_cancel(Script::Stall, cancel),
        )
        .await
        .unwrap();
        assert!(matches!(status, SessionStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_dial_failure_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = crate::config::SpeechConfig {
            endpoint: Some(format!("ws://127.0.0.1:{port}")),
            ..Default::default()
        };
        let config = Arc::new(config.validate().unwrap());
        let (tx, mut rx) = mpsc::unbounded_channel();
        run_session(0, "hi".to_string(), config, tx, CancellationToken::new()).await;

        match rx.recv().await.unwrap() {
            SessionEvent::End {
                status: SessionStatus::Failed(TtsError::ConnectionError(_)),
                ..
            } => {}
            other => panic!("expected ConnectionError end, got {other:?}"),
        }
    }

    // -------------------------------------------------------------------------
    // URL construction
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_endpoint_url_query_parameters() {
        let config = Arc::new(crate::config::SpeechConfig::default().validate().unwrap());
        let token = DrmToken::generate();
        let url = endpoint_url(&config, &token, "abc123").unwrap();
        assert_eq!(url.scheme(), "wss");
        let query = url.query().unwrap();
        assert!(query.contains(&format!("TrustedClientToken={TRUSTED_CLIENT_TOKEN}")));
        assert!(query.contains(&format!("Sec-MS-GEC={}", token.digest)));
        assert!(query.contains("Sec-MS-GEC-Version=1-103.0.5060.66"));
        assert!(query.contains("ConnectionId=abc123"));
    }
}
