//! Error types for synthesis operations.

/// Error taxonomy for the synthesis client.
///
/// A segment-level failure (`ConnectionError`, `TransportError`,
/// `ProtocolError`, `NoAudioReceived`) fails only the segment that produced
/// it; the orchestrator aggregates per-segment failures into
/// [`TtsError::SegmentFailures`] when reporting to the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TtsError {
    /// WebSocket dial or handshake failed.
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    /// A read or write on an established socket failed mid-session.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The service sent a frame the protocol does not allow here: an
    /// unexpected binary frame, a malformed or truncated frame, an unknown
    /// metadata type, or an unrecognized path.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The session reached a terminal state without ever emitting audio.
    #[error("No audio was received. Please verify that your parameters are correct")]
    NoAudioReceived,

    /// The configuration cannot be satisfied, e.g. the per-frame byte budget
    /// is too small for the text being segmented.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Voice name does not match the `lang-REGION-NameNeural` form.
    #[error("Invalid voice: {0}")]
    InvalidVoice(String),

    /// Rate is not a signed percentage such as `+0%` or `-25%`.
    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    /// Volume is not a signed percentage such as `+0%` or `-25%`.
    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    /// Pitch is not a signed Hz value such as `+0Hz` or `-50Hz`.
    #[error("Invalid pitch: {0}")]
    InvalidPitch(String),

    /// Aggregate report for a multi-segment request where some sessions
    /// failed. Partial output from the surviving segments is still returned
    /// alongside this error; the gaps are what it reports.
    #[error("{failed}/{total} segments failed: {}", messages.join("; "))]
    SegmentFailures {
        failed: usize,
        total: usize,
        messages: Vec<String>,
    },
}

/// Convenience alias used throughout the crate.
pub type TtsResult<T> = Result<T, TtsError>;
