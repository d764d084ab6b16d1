//! Service endpoints and fixed protocol constants.
//!
//! The read-aloud service only accepts connections that look like they come
//! from a specific Edge browser build, so the client token, Chromium version
//! and default voice are all pinned here.

/// Token identifying the trusted first-party client to the service.
pub(crate) const TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";

/// Base WebSocket endpoint for synthesis sessions (query parameters are
/// appended per connection).
pub(crate) const WSS_ENDPOINT: &str =
    "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1";

/// HTTP endpoint serving the available-voices catalog.
pub(crate) const VOICE_LIST_ENDPOINT: &str =
    "https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voices/list";

/// Full Chromium release the client impersonates.
pub(crate) const CHROMIUM_FULL_VERSION: &str = "103.0.5060.66";

/// Major Chromium version, used in the Sec-CH-UA hint headers.
pub(crate) const CHROMIUM_MAJOR_VERSION: &str = "103";

/// Seconds between the Windows FILETIME epoch (1601-01-01) and the Unix epoch.
pub(crate) const WINDOWS_FILETIME_EPOCH_SECS: u64 = 11_644_473_600;

/// FILETIME ticks per second (100-nanosecond resolution).
pub(crate) const TICKS_PER_SECOND: u64 = 10_000_000;

/// Validity window of a derived access token, in ticks (5 minutes).
pub(crate) const DRM_WINDOW_TICKS: u64 = 3_000_000_000;

/// Ticks of trailing silence the service appends after the last word of a
/// turn. Added to a segment's duration contribution when rebasing timelines.
pub(crate) const TRAILING_SILENCE_TICKS: u64 = 8_750_000;

/// Output codec requested in the `speech.config` frame.
pub(crate) const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

/// Default voice when the caller does not pick one.
pub(crate) const DEFAULT_VOICE: &str = "en-US-AriaNeural";

/// Size in bytes of the length prefix on binary audio frames.
pub(crate) const BINARY_FRAME_HEADER_SIZE: usize = 2;

/// Hard WebSocket frame ceiling imposed by the service.
pub(crate) const MAX_FRAME_SIZE: usize = 1 << 16;

/// Safety margin subtracted from the computed per-segment payload budget.
pub(crate) const PAYLOAD_SAFETY_MARGIN: usize = 50;

/// Default ceiling on concurrently open synthesis sessions.
pub(crate) const DEFAULT_MAX_CONCURRENCY: usize = 16;
