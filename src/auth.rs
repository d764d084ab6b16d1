//! Session authentication: derived access tokens and handshake headers.
//!
//! The service gates synthesis sessions behind a time-windowed token derived
//! from the trusted client constant, plus a header set mimicking a specific
//! Edge browser build. Tokens expire with their window, so everything here is
//! recomputed fresh on each connection attempt and never cached.

use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::constants::{
    CHROMIUM_FULL_VERSION, CHROMIUM_MAJOR_VERSION, DRM_WINDOW_TICKS, TICKS_PER_SECOND,
    TRUSTED_CLIENT_TOKEN, WINDOWS_FILETIME_EPOCH_SECS,
};

/// Static headers sent with every WebSocket handshake.
///
/// Computed once at first use and read-only thereafter; every session borrows
/// the same slice.
pub(crate) static HANDSHAKE_HEADERS: Lazy<Vec<(&'static str, String)>> = Lazy::new(|| {
    vec![
        ("Pragma", "no-cache".to_string()),
        ("Cache-Control", "no-cache".to_string()),
        (
            "Origin",
            "chrome-extension://jdiccldimpdaibmpdkjnbmckianbfold".to_string(),
        ),
        ("Accept-Encoding", "gzip, deflate, br".to_string()),
        ("Accept-Language", "en-US,en;q=0.9".to_string()),
        ("User-Agent", user_agent()),
    ]
});

/// Static headers for the voice-catalog HTTP request.
pub(crate) static VOICE_LIST_HEADERS: Lazy<Vec<(&'static str, String)>> = Lazy::new(|| {
    vec![
        ("Content-Type", "application/json".to_string()),
        ("Accept", "*/*".to_string()),
        ("Authority", "speech.platform.bing.com".to_string()),
        (
            "Sec-CH-UA",
            format!(
                "\" Not;A Brand\";v=\"99\", \"Microsoft Edge\";v=\"{v}\", \"Chromium\";v=\"{v}\"",
                v = CHROMIUM_MAJOR_VERSION
            ),
        ),
        ("Sec-CH-UA-Mobile", "?0".to_string()),
        ("User-Agent", user_agent()),
        ("Sec-Fetch-Site", "none".to_string()),
        ("Sec-Fetch-Mode", "cors".to_string()),
        ("Sec-Fetch-Dest", "empty".to_string()),
        ("Accept-Encoding", "gzip, deflate, br".to_string()),
        ("Accept-Language", "en-US,en;q=0.9".to_string()),
    ]
});

fn user_agent() -> String {
    format!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/{v}.0.0.0 Safari/537.36 Edg/{v}.0.0.0",
        v = CHROMIUM_MAJOR_VERSION
    )
}

// =============================================================================
// DrmToken
// =============================================================================

/// Time-windowed derived access token for one connection attempt.
///
/// The digest is stable for the lifetime of its window and rolls over with
/// it, so a token must never be persisted across sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DrmToken {
    /// FILETIME ticks floored to the window boundary.
    pub windowed_ticks: u64,
    /// Uppercase hex SHA-256 digest sent as the `Sec-MS-GEC` parameter.
    pub digest: String,
}

impl DrmToken {
    /// Derive the token for the current system time.
    pub fn generate() -> Self {
        Self::at(SystemTime::now())
    }

    /// Derive the token for an arbitrary instant.
    pub fn at(time: SystemTime) -> Self {
        let unix_secs = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let ticks = (unix_secs + WINDOWS_FILETIME_EPOCH_SECS) * TICKS_PER_SECOND;
        let windowed_ticks = ticks - (ticks % DRM_WINDOW_TICKS);

        let mut hasher = Sha256::new();
        hasher.update(format!("{windowed_ticks}{TRUSTED_CLIENT_TOKEN}").as_bytes());
        let digest = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect();

        Self {
            windowed_ticks,
            digest,
        }
    }

    /// Value of the accompanying `Sec-MS-GEC-Version` parameter.
    pub fn version() -> String {
        format!("1-{CHROMIUM_FULL_VERSION}")
    }
}

// =============================================================================
// Per-connection identifiers and timestamps
// =============================================================================

/// Random per-connection id: a v4 UUID with the dashes stripped.
pub(crate) fn connection_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Clock string for `X-Timestamp` headers, in the JavaScript `Date` shape the
/// service expects.
pub(crate) fn timestamp_string() -> String {
    chrono::Utc::now()
        .format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
        .to_string()
}

// =============================================================================
// Tests
// =============================================================================
