//! # Audio Handling
//!
//! Everything that touches recorded audio before it is sent to the
//! assessment service lives here.
//!
//! ## Key Components:
//! - **Decoded buffer**: Per-channel float samples plus their sample rate
//! - **WAV codec**: Canonical 44-byte RIFF/WAVE encoder and a tolerant decoder
//! - **Audio processor**: Capture-to-container conversion with pass-through fallback
//!
//! ## Canonical Output Format:
//! - **Channels**: Mono (1 channel)
//! - **Bit Depth**: 16-bit signed PCM, little-endian
//! - **Sample Rate**: Native rate of the input, or the configured target rate

pub mod buffer;      // Decoded multi-channel float audio
pub mod processor;   // Conversion of uploaded recordings
pub mod wav;         // RIFF/WAVE encoding and decoding

pub use buffer::{DecodedAudioBuffer, DownmixPolicy};
pub use processor::AudioProcessor;
pub use wav::encode_wav;

use std::fmt;

/// Errors raised while building, decoding or converting audio.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// No audio bytes were supplied
    Empty,

    /// A buffer was requested with zero channels
    NoChannels,

    /// Channels of one buffer hold different numbers of samples
    ChannelLengthMismatch { expected: usize, found: usize, channel: usize },

    /// The bytes are not a WAV stream we can read
    InvalidWav(String),

    /// The WAV stream uses a sample encoding we do not convert
    UnsupportedEncoding(String),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::Empty => write!(f, "Audio data is empty"),
            AudioError::NoChannels => write!(f, "Audio buffer must have at least one channel"),
            AudioError::ChannelLengthMismatch { expected, found, channel } => write!(
                f,
                "Channel {} has {} samples, expected {}",
                channel, found, expected
            ),
            AudioError::InvalidWav(msg) => write!(f, "Invalid WAV data: {}", msg),
            AudioError::UnsupportedEncoding(msg) => write!(f, "Unsupported WAV encoding: {}", msg),
        }
    }
}

impl std::error::Error for AudioError {}
