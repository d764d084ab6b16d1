//! Parsing of the service's pseudo-HTTP message frames.
//!
//! Text frames carry `Header: value` lines, a blank line, and a body; the
//! `Path` header selects the message kind. Binary frames carry a big-endian
//! u16 header length, the header block, and raw audio after it.

use bytes::Bytes;
use serde::Deserialize;

use crate::constants::BINARY_FRAME_HEADER_SIZE;
use crate::error::{TtsError, TtsResult};

pub(crate) const PATH_TURN_START: &str = "turn.start";
pub(crate) const PATH_TURN_END: &str = "turn.end";
pub(crate) const PATH_AUDIO_METADATA: &str = "audio.metadata";
pub(crate) const PATH_RESPONSE: &str = "response";

// =============================================================================
// Frame types
// =============================================================================

/// A parsed server-to-client frame.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ProtocolFrame {
    /// `Path: turn.start`, arms audio acceptance.
    TurnStart,
    /// `Path: turn.end`, the segment is complete.
    TurnEnd,
    /// `Path: response`, acknowledgement with no client-visible effect.
    Response,
    /// `Path: audio.metadata`, decoded boundary entries.
    AudioMetadata(Vec<MetadataEntry>),
    /// Binary frame payload, one chunk of encoded audio.
    AudioData(Bytes),
}

/// One entry of an `audio.metadata` body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct MetadataEntry {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Data", default)]
    pub data: MetadataData,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub(crate) struct MetadataData {
    /// Offset from turn start, in 100ns ticks.
    #[serde(rename = "Offset", default)]
    pub offset: u64,
    /// Spoken duration, in 100ns ticks.
    #[serde(rename = "Duration", default)]
    pub duration: u64,
    #[serde(rename = "Text", alias = "text", default)]
    pub text: MetadataText,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub(crate) struct MetadataText {
    #[serde(rename = "Text", default)]
    pub content: String,
    #[allow(dead_code)]
    #[serde(rename = "Length", default)]
    pub length: u64,
    #[allow(dead_code)]
    #[serde(rename = "BoundaryType", default)]
    pub boundary_type: String,
}

#[derive(Deserialize)]
struct MetadataPayload {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<MetadataEntry>,
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse a text frame into its protocol message.
///
/// Rejects frames with no header/body separator, no `Path` header, or a
/// `Path` value outside the protocol's server-to-client set.
pub(crate) fn parse_text_frame(raw: &str) -> TtsResult<ProtocolFrame> {
    let (headers, body) = raw.split_once("\r\n\r\n").ok_or_else(|| {
        TtsError::ProtocolError("text frame has no header/body separator".to_string())
    })?;

    let path = header_value(headers, "Path")
        .ok_or_else(|| TtsError::ProtocolError("text frame has no Path header".to_string()))?;

    match path {
        PATH_TURN_START => Ok(ProtocolFrame::TurnStart),
        PATH_TURN_END => Ok(ProtocolFrame::TurnEnd),
        PATH_RESPONSE => Ok(ProtocolFrame::Response),
        PATH_AUDIO_METADATA => {
            let payload: MetadataPayload = serde_json::from_str(body).map_err(|e| {
                TtsError::ProtocolError(format!("malformed audio.metadata body: {e}"))
            })?;
            Ok(ProtocolFrame::AudioMetadata(payload.metadata))
        }
        other => Err(TtsError::ProtocolError(format!(
            "unrecognized frame path: {other}"
        ))),
    }
}

/// Parse a binary frame, returning the audio payload past the header block.
///
/// Layout: 2-byte big-endian header length `N`, `N` header bytes, audio.
/// Frames shorter than their declared header are truncated and rejected.
pub(crate) fn parse_binary_frame(data: Bytes) -> TtsResult<ProtocolFrame> {
    if data.len() < BINARY_FRAME_HEADER_SIZE {
        return Err(TtsError::ProtocolError(format!(
            "binary frame of {} bytes is too short for a header length",
            data.len()
        )));
    }
    let header_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    let payload_start = BINARY_FRAME_HEADER_SIZE + header_len;
    if data.len() < payload_start {
        return Err(TtsError::ProtocolError(format!(
            "binary frame truncated: {} header bytes declared, {} present",
            header_len,
            data.len() - BINARY_FRAME_HEADER_SIZE
        )));
    }
    Ok(ProtocolFrame::AudioData(data.slice(payload_start..)))
}

fn header_value<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    headers.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim() == name {
            Some(value.trim())
        } else {
            None
        }
    })
}

// =============================================================================
// Tests
// =============================================================================
