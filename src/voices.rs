//! Voice catalog access.
//!
//! The catalog lives behind a plain HTTPS endpoint, separate from the
//! synthesis WebSocket. It only needs the trusted client token and the
//! browser-mimicking header set, not a derived access token.

use serde::Deserialize;
use tracing::debug;

use crate::auth::VOICE_LIST_HEADERS;
use crate::constants::{TRUSTED_CLIENT_TOKEN, VOICE_LIST_ENDPOINT};
use crate::error::{TtsError, TtsResult};

/// One entry of the service's voice catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Voice {
    /// Full display name, the form the synthesis protocol addresses.
    pub name: String,
    /// Short name, e.g. `en-US-AriaNeural`; what [`SpeechConfig::voice`]
    /// takes.
    ///
    /// [`SpeechConfig::voice`]: crate::SpeechConfig::voice
    pub short_name: String,
    #[serde(default)]
    pub gender: String,
    pub locale: String,
    #[serde(default)]
    pub suggested_codec: String,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub voice_tag: VoiceTag,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoiceTag {
    #[serde(default)]
    pub content_categories: Vec<String>,
    #[serde(default)]
    pub voice_personalities: Vec<String>,
}

/// Fetch the full voice catalog.
pub async fn list_voices() -> TtsResult<Vec<Voice>> {
    let url = format!("{VOICE_LIST_ENDPOINT}?trustedclienttoken={TRUSTED_CLIENT_TOKEN}");
    list_voices_at(&url).await
}

/// Fetch the catalog and return the voice with the given short name, if any.
pub async fn find_voice(short_name: &str) -> TtsResult<Option<Voice>> {
    Ok(list_voices()
        .await?
        .into_iter()
        .find(|v| v.short_name == short_name))
}

async fn list_voices_at(url: &str) -> TtsResult<Vec<Voice>> {
    let client = reqwest::Client::new();
    let mut request = client.get(url);
    for (name, value) in VOICE_LIST_HEADERS.iter() {
        request = request.header(*name, value.as_str());
    }

    let response = request
        .send()
        .await
        .map_err(|e| TtsError::ConnectionError(format!("voice list request failed: {e}")))?
        .error_for_status()
        .map_err(|e| TtsError::ConnectionError(format!("voice list request rejected: {e}")))?;

    let voices: Vec<Voice> = response
        .json()
        .await
        .map_err(|e| TtsError::ProtocolError(format!("voice list decode failed: {e}")))?;
    debug!(count = voices.len(), "Fetched voice catalog");
    Ok(voices)
}

// =============================================================================
// Tests
// =============================================================================
