//! Streaming text-to-speech client for Microsoft Edge's online "read aloud"
//! service.
//!
//! Text is split into byte-bounded segments, each synthesized over its own
//! authenticated WebSocket session; sessions run concurrently and the
//! results are merged back into one ordered stream of audio chunks and
//! word-boundary timing events on a single global timeline.
//!
//! ```rust,no_run
//! use read_aloud_tts::{SpeechConfig, Synthesizer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let synthesizer = Synthesizer::new(SpeechConfig {
//!         voice: "en-US-AriaNeural".to_string(),
//!         ..Default::default()
//!     })?;
//!
//!     let output = synthesizer.synthesize("Hello, world!").await?;
//!     output.ensure_complete()?;
//!     println!(
//!         "{} bytes of audio, {} word boundaries",
//!         output.audio.len(),
//!         output.word_boundaries.len()
//!     );
//!     Ok(())
//! }
//! ```

mod assembler;
mod auth;
mod config;
mod constants;
mod error;
mod events;
mod orchestrator;
mod protocol;
mod segment;
mod ssml;
mod synthesizer;
mod timeline;
mod transport;
mod voices;

pub use config::{Socks5Proxy, SpeechConfig};
pub use error::{TtsError, TtsResult};
pub use events::{SegmentFailure, SpeechEvent, StreamOutput, WordBoundary};
pub use synthesizer::Synthesizer;
pub use voices::{find_voice, list_voices, Voice, VoiceTag};
