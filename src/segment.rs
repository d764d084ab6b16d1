//! Text segmentation under the per-frame byte budget.
//!
//! Input text is normalized and XML-escaped first, then split into chunks
//! that each fit the SSML frame budget without breaking words or escaped
//! entities. Each chunk becomes one [`TextSegment`], synthesized over its own
//! WebSocket session.

use crate::error::{TtsError, TtsResult};

/// One byte-bounded slice of the caller's text.
///
/// Segments are ordered `0..N-1`; the trimmed concatenation of all payloads
/// reproduces the normalized input except for whitespace consumed exactly at
/// split points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSegment {
    /// Position of this segment in the original text.
    pub index: usize,
    /// Normalized, escaped payload, at most the computed budget in bytes.
    pub payload: String,
}

/// Normalize caller text for the wire: control characters other than
/// tab/LF/CR become spaces, then XML-special characters are escaped
/// (ampersand first, so later escapes stay intact).
pub(crate) fn normalize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_control() && c != '\t' && c != '\n' && c != '\r' {
                ' '
            } else {
                c
            }
        })
        .collect();

    cleaned
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Split normalized text into segments of at most `max_bytes` bytes.
///
/// Scans left to right; when a chunk would exceed the budget it backs off to
/// the nearest preceding whitespace. A single word longer than the budget is
/// hard-cut at a character boundary. A cut never lands inside an unresolved
/// escaped entity (an `&` with no `;` before the cut point); the cut retreats
/// before the `&`, and if that empties the chunk the budget cannot hold the
/// data and segmentation fails.
pub(crate) fn split(normalized: &str, max_bytes: usize) -> TtsResult<Vec<TextSegment>> {
    if max_bytes == 0 {
        return Err(TtsError::ConfigurationError(
            "frame payload budget is zero; SSML envelope exceeds the frame size".to_string(),
        ));
    }

    let mut segments = Vec::new();
    let mut start = 0;

    while start < normalized.len() {
        let mut end = if normalized.len() - start <= max_bytes {
            normalized.len()
        } else {
            let mut cut = start + max_bytes;
            while !normalized.is_char_boundary(cut) {
                cut -= 1;
            }
            // Prefer the nearest preceding whitespace; keep the hard cut when
            // the window holds a single oversized word.
            if let Some(pos) = normalized[start..cut].rfind(|c: char| c.is_whitespace()) {
                let ws = start + pos;
                let ws_char_len = normalized[ws..]
                    .chars()
                    .next()
                    .map(char::len_utf8)
                    .unwrap_or(1);
                cut = ws + ws_char_len;
            }
            cut
        };

        // Never cut inside an unresolved escaped entity.
        if end < normalized.len() {
            let chunk = &normalized[start..end];
            if let Some(amp) = chunk.rfind('&') {
                if !chunk[amp..].contains(';') {
                    end = start + amp;
                    if normalized[start..end].trim().is_empty() {
                        return Err(TtsError::ConfigurationError(format!(
                            "payload budget of {max_bytes} bytes is too small to hold an \
                             escaped entity"
                        )));
                    }
                }
            }
        }

        let trimmed = normalized[start..end].trim();
        if !trimmed.is_empty() {
            segments.push(TextSegment {
                index: segments.len(),
                payload: trimmed.to_string(),
            });
        }
        start = end;
    }

    Ok(segments)
}

// =============================================================================
// Tests
// =============================================================================
