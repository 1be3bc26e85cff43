//! # Audio Preparation
//!
//! Turns an uploaded recording into the payload sent to the assessment
//! service. WAV uploads are re-encoded into the canonical mono 16-bit layout
//! (optionally resampled to the configured rate) unless they already use it;
//! anything else is forwarded untouched.
//!
//! ## Fallback Policy:
//! If a recording cannot be converted, the original bytes are sent as-is.
//! Conversion problems are recorded in `PreparedAudio::note`, never raised.

use crate::audio::wav::{decode_wav, encode_wav, AudioFormat, WavHeader, WAV_HEADER_LEN};
use crate::audio::AudioError;
use crate::config::AudioSettings;
use tracing::{debug, warn};

/// Audio payload ready to be posted upstream.
#[derive(Debug, Clone)]
pub struct PreparedAudio {
    /// Bytes to send
    pub bytes: Vec<u8>,

    /// Container of `bytes`
    pub format: AudioFormat,

    /// Whether `bytes` are canonical 16-bit mono WAV
    pub converted: bool,

    /// Sample rate of `bytes`, when known
    pub sample_rate: Option<u32>,

    /// Duration of the recording, when known
    pub duration_seconds: Option<f64>,

    /// Why conversion was skipped, if it was
    pub note: Option<String>,
}

impl PreparedAudio {
    /// MIME type for the upload, including codec details for canonical WAV.
    pub fn content_type(&self) -> String {
        match (self.format, self.sample_rate) {
            (AudioFormat::Wav, Some(rate)) => {
                format!("audio/wav; codecs=audio/pcm; samplerate={}", rate)
            }
            (format, _) => format.content_type().to_string(),
        }
    }
}

/// Converts recordings according to the configured audio settings.
pub struct AudioProcessor {
    settings: AudioSettings,
}

impl AudioProcessor {
    pub fn new(settings: AudioSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AudioSettings {
        &self.settings
    }

    /// Prepare raw recording bytes for assessment.
    ///
    /// ## Steps for WAV input:
    /// 1. Decode into per-channel float samples
    /// 2. Collapse to mono with the configured downmix policy
    /// 3. Resample to the target rate, if one is configured
    /// 4. Re-encode as canonical 16-bit mono WAV
    ///
    /// ## Errors:
    /// Only empty input is an error. Undecodable input passes through.
    pub fn prepare(&self, bytes: Vec<u8>) -> Result<PreparedAudio, AudioError> {
        if bytes.is_empty() {
            return Err(AudioError::Empty);
        }

        let format = AudioFormat::sniff(&bytes);
        if format != AudioFormat::Wav {
            debug!(format = format.as_str(), "Forwarding non-WAV recording unchanged");
            return Ok(PreparedAudio {
                bytes,
                format,
                converted: false,
                sample_rate: None,
                duration_seconds: None,
                note: Some(format!("{} input is forwarded without conversion", format.as_str())),
            });
        }

        if let Ok(header) = WavHeader::parse(&bytes) {
            if self.is_canonical(&header, bytes.len()) {
                debug!(rate = header.sample_rate, "Recording is already canonical WAV");
                let frames = header.data_size / u32::from(header.block_align);
                return Ok(PreparedAudio {
                    bytes,
                    format,
                    converted: true,
                    sample_rate: Some(header.sample_rate),
                    duration_seconds: Some(f64::from(frames) / f64::from(header.sample_rate)),
                    note: None,
                });
            }
        }

        let decoded = match decode_wav(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "WAV conversion failed, using original recording");
                return Ok(PreparedAudio {
                    bytes,
                    format,
                    converted: false,
                    sample_rate: None,
                    duration_seconds: None,
                    note: Some(format!("conversion failed: {}", e)),
                });
            }
        };

        let mut mono = decoded.downmixed(self.settings.downmix);
        if let Some(target) = self.settings.target_sample_rate {
            mono = mono.resampled(target);
        }

        debug!(
            source_rate = decoded.sample_rate(),
            source_channels = decoded.channel_count(),
            output_rate = mono.sample_rate(),
            frames = mono.len(),
            "Converted recording to canonical WAV"
        );

        Ok(PreparedAudio {
            bytes: encode_wav(&mono),
            format: AudioFormat::Wav,
            converted: true,
            sample_rate: Some(mono.sample_rate()),
            duration_seconds: Some(mono.duration_seconds()),
            note: None,
        })
    }

    /// True when a WAV stream is exactly what `encode_wav` would produce at
    /// the configured rate.
    fn is_canonical(&self, header: &WavHeader, total_len: usize) -> bool {
        let rate_matches = self
            .settings
            .target_sample_rate
            .map_or(true, |target| target == header.sample_rate);

        header.audio_format == 1
            && header.channels == 1
            && header.bits_per_sample == 16
            && header.block_align == 2
            && header.sample_rate > 0
            && rate_matches
            && header.data_size as usize == total_len - WAV_HEADER_LEN
    }
}
