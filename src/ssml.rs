//! SSML rendering and upstream frame assembly.
//!
//! Only the minimal voice/pitch/rate/volume/text substitution the wire format
//! needs; this is not a general SSML processor.

use crate::auth;
use crate::config::ReadyConfig;
use crate::constants::{MAX_FRAME_SIZE, OUTPUT_FORMAT, PAYLOAD_SAFETY_MARGIN};

/// Render the SSML document for one text segment.
///
/// `text` must already be XML-escaped (the segmenter escapes during
/// normalization, before the byte budget is applied).
pub(crate) fn build_ssml(config: &ReadyConfig, text: &str) -> String {
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{}'>\
         <voice name='{}'>\
         <prosody pitch='{}' rate='{}' volume='{}'>{}</prosody>\
         </voice></speak>",
        config.language, config.voice_name, config.pitch, config.rate, config.volume, text
    )
}

/// Assemble the `speech.config` frame fixing the output codec and enabling
/// word-boundary metadata (sentence boundaries stay off).
pub(crate) fn config_frame(timestamp: &str) -> String {
    format!(
        "X-Timestamp:{timestamp}\r\n\
         Content-Type:application/json; charset=utf-8\r\n\
         Path:speech.config\r\n\r\n\
         {{\"context\":{{\"synthesis\":{{\"audio\":{{\"metadataoptions\":{{\
         \"sentenceBoundaryEnabled\":false,\"wordBoundaryEnabled\":true}},\
         \"outputFormat\":\"{OUTPUT_FORMAT}\"}}}}}}}}\r\n"
    )
}

/// Assemble the `ssml` frame carrying one segment's SSML document.
pub(crate) fn ssml_frame(request_id: &str, timestamp: &str, ssml: &str) -> String {
    format!(
        "X-RequestId:{request_id}\r\n\
         Content-Type:application/ssml+xml\r\n\
         X-Timestamp:{timestamp}Z\r\n\
         Path:ssml\r\n\r\n\
         {ssml}"
    )
}

/// Per-segment payload budget: the frame ceiling minus the fixed envelope
/// (headers plus an empty-text SSML document for the active voice settings)
/// minus a safety margin.
pub(crate) fn max_payload_bytes(config: &ReadyConfig) -> usize {
    let envelope = ssml_frame(
        &auth::connection_id(),
        &auth::timestamp_string(),
        &build_ssml(config, ""),
    )
    .len()
        + PAYLOAD_SAFETY_MARGIN;
    MAX_FRAME_SIZE.saturating_sub(envelope)
}

// =============================================================================
// Tests
// =============================================================================
