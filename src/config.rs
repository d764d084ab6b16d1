//! Synthesis configuration and validation.
//!
//! Callers describe what they want with [`SpeechConfig`]; validation turns it
//! into the canonical form the wire protocol expects (the service addresses
//! voices by their full display name, not the short `en-US-AriaNeural` form).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{DEFAULT_MAX_CONCURRENCY, DEFAULT_VOICE};
use crate::error::{TtsError, TtsResult};

/// Short voice names look like `en-US-AriaNeural` or `zh-CN-liaoning-XiaobeiNeural`.
static VOICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]{2,})-([A-Z]{2,})-(.+Neural)$").unwrap());

/// Rate and volume are signed percentages: `+0%`, `-50%`.
static RATE_VOLUME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]\d+%$").unwrap());

/// Pitch is a signed Hz delta: `+0Hz`, `-20Hz`.
static PITCH_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]\d+Hz$").unwrap());

// =============================================================================
// SpeechConfig
// =============================================================================

/// SOCKS5 proxy settings for the synthesis WebSocket connections.
#[derive(Debug, Clone)]
pub struct Socks5Proxy {
    /// Proxy address as `host:port`.
    pub host: String,
    /// Optional username for proxy authentication.
    pub username: Option<String>,
    /// Optional password for proxy authentication.
    pub password: Option<String>,
}

/// Caller-facing configuration for a [`Synthesizer`](crate::Synthesizer).
///
/// All fields have usable defaults; construct with struct-update syntax:
///
/// ```rust
/// use read_aloud_tts::SpeechConfig;
///
/// let config = SpeechConfig {
///     voice: "en-GB-SoniaNeural".to_string(),
///     rate: "+10%".to_string(),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Voice short name, e.g. `en-US-AriaNeural`.
    pub voice: String,
    /// Language-region tag for the SSML document. Derived from the voice
    /// name when not set.
    pub language: Option<String>,
    /// Prosody pitch as a signed Hz delta, e.g. `+0Hz`.
    pub pitch: String,
    /// Prosody rate as a signed percentage, e.g. `+0%`.
    pub rate: String,
    /// Prosody volume as a signed percentage, e.g. `+0%`.
    pub volume: String,
    /// HTTP proxy URL for the WebSocket connections, e.g. `http://127.0.0.1:8080`.
    pub http_proxy: Option<String>,
    /// SOCKS5 proxy for the WebSocket connections. Takes precedence over
    /// `http_proxy` when both are set.
    pub socks5_proxy: Option<Socks5Proxy>,
    /// Skip TLS certificate verification. Only useful behind intercepting
    /// proxies.
    pub danger_accept_invalid_certs: bool,
    /// When true, the first segment failure cancels all outstanding segments.
    pub strict: bool,
    /// Ceiling on concurrently open synthesis sessions for one request.
    pub max_concurrency: usize,
    /// Override of the synthesis WebSocket endpoint. Intended for relays and
    /// tests; the default is the public read-aloud endpoint.
    pub endpoint: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
            language: None,
            pitch: "+0Hz".to_string(),
            rate: "+0%".to_string(),
            volume: "+0%".to_string(),
            http_proxy: None,
            socks5_proxy: None,
            danger_accept_invalid_certs: false,
            strict: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            endpoint: None,
        }
    }
}

impl SpeechConfig {
    /// Validate the configuration and resolve the canonical voice form.
    pub(crate) fn validate(self) -> TtsResult<ReadyConfig> {
        let captures = VOICE_PATTERN
            .captures(&self.voice)
            .ok_or_else(|| TtsError::InvalidVoice(self.voice.clone()))?;

        let lang = &captures[1];
        let base_region = &captures[2];
        let mut region = base_region.to_string();
        let mut name = captures[3].to_string();

        // Voices like zh-CN-liaoning-XiaobeiNeural carry a locale suffix in
        // the name part; it belongs to the region in the display form.
        if let Some(dash) = name.find('-') {
            region = format!("{}-{}", region, &name[..dash]);
            name = name[dash + 1..].to_string();
        }

        if !RATE_VOLUME_PATTERN.is_match(&self.rate) {
            return Err(TtsError::InvalidRate(self.rate));
        }
        if !RATE_VOLUME_PATTERN.is_match(&self.volume) {
            return Err(TtsError::InvalidVolume(self.volume));
        }
        if !PITCH_PATTERN.is_match(&self.pitch) {
            return Err(TtsError::InvalidPitch(self.pitch));
        }
        if self.max_concurrency == 0 {
            return Err(TtsError::ConfigurationError(
                "max_concurrency must be at least 1".to_string(),
            ));
        }

        let language = self
            .language
            .clone()
            .unwrap_or_else(|| format!("{}-{}", lang, base_region));

        Ok(ReadyConfig {
            voice_name: format!(
                "Microsoft Server Speech Text to Speech Voice ({}-{}, {})",
                lang, region, name
            ),
            language,
            pitch: self.pitch,
            rate: self.rate,
            volume: self.volume,
            http_proxy: self.http_proxy,
            socks5_proxy: self.socks5_proxy,
            danger_accept_invalid_certs: self.danger_accept_invalid_certs,
            strict: self.strict,
            max_concurrency: self.max_concurrency,
            endpoint: self.endpoint,
        })
    }
}

// =============================================================================
// ReadyConfig
// =============================================================================

/// Validated configuration in the form the protocol layer consumes.
///
/// Computed once per [`Synthesizer`](crate::Synthesizer) and shared read-only
/// across every session of every request.
#[derive(Debug, Clone)]
pub(crate) struct ReadyConfig {
    /// Canonical voice display name the service addresses voices by.
    pub voice_name: String,
    /// Language-region tag for the SSML `xml:lang` attribute.
    pub language: String,
    pub pitch: String,
    pub rate: String,
    pub volume: String,
    pub http_proxy: Option<String>,
    pub socks5_proxy: Option<Socks5Proxy>,
    pub danger_accept_invalid_certs: bool,
    pub strict: bool,
    pub max_concurrency: usize,
    pub endpoint: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================
