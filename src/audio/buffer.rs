//! # Decoded Audio Buffer
//!
//! Holds decoded audio as one float sample sequence per channel, the shape a
//! browser decoder or the WAV decoder hands us. Samples are nominally in
//! [-1.0, 1.0]; out-of-range values are tolerated and clamped on encode.
//!
//! ## Key Features:
//! - **Construction checks**: At least one channel, all channels equal length
//! - **Downmixing**: Keep the first channel, or average every channel
//! - **Resampling**: Linear interpolation to a target sample rate

use super::AudioError;
use serde::Deserialize;

/// How a multi-channel buffer is collapsed to mono.
///
/// `FirstChannel` is what the WAV encoder itself does: channel 0 is kept and
/// the others are ignored. `Average` mixes all channels so nothing recorded
/// on the other channels is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownmixPolicy {
    #[default]
    FirstChannel,
    Average,
}

/// Decoded audio: a sample rate and one sample sequence per channel.
///
/// ## Invariants:
/// - There is always at least one channel
/// - Every channel has the same number of samples (frames)
///
/// Both are enforced by the constructors, so code that receives a
/// `DecodedAudioBuffer` never needs to check them again.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl DecodedAudioBuffer {
    /// Build a buffer from per-channel sample vectors.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, AudioError> {
        let expected = match channels.first() {
            Some(first) => first.len(),
            None => return Err(AudioError::NoChannels),
        };

        if let Some((channel, samples)) = channels
            .iter()
            .enumerate()
            .find(|(_, samples)| samples.len() != expected)
        {
            return Err(AudioError::ChannelLengthMismatch {
                expected,
                found: samples.len(),
                channel,
            });
        }

        Ok(Self { sample_rate, channels })
    }

    /// Build a single-channel buffer.
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels: vec![samples],
        }
    }

    /// Split interleaved frames (`L R L R ...`) into per-channel vectors.
    ///
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(
        samples: &[f32],
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Self, AudioError> {
        if channel_count == 0 {
            return Err(AudioError::NoChannels);
        }

        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];

        for frame in samples.chunks_exact(channel_count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }

        Ok(Self { sample_rate, channels })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel).
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples of one channel, if it exists.
    #[cfg(test)]
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// First channel. Always present.
    pub fn primary_channel(&self) -> &[f32] {
        &self.channels[0]
    }

    /// Playback duration in seconds. Zero when the sample rate is zero.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Collapse to a single channel using the given policy.
    pub fn downmixed(&self, policy: DownmixPolicy) -> DecodedAudioBuffer {
        let samples = match policy {
            DownmixPolicy::FirstChannel => self.channels[0].clone(),
            DownmixPolicy::Average => {
                let count = self.channels.len() as f32;
                (0..self.len())
                    .map(|frame| {
                        self.channels.iter().map(|channel| channel[frame]).sum::<f32>() / count
                    })
                    .collect()
            }
        };

        DecodedAudioBuffer::mono(self.sample_rate, samples)
    }

    /// Resample every channel to `target_rate` with linear interpolation.
    ///
    /// Output length is `round(len * target / source)`. Returns an unchanged
    /// copy when the rates already match, the buffer is empty, or either rate
    /// is zero.
    pub fn resampled(&self, target_rate: u32) -> DecodedAudioBuffer {
        if target_rate == self.sample_rate
            || target_rate == 0
            || self.sample_rate == 0
            || self.is_empty()
        {
            return self.clone();
        }

        let ratio = self.sample_rate as f64 / target_rate as f64;
        let out_len = ((self.len() as f64) * target_rate as f64 / self.sample_rate as f64).round() as usize;

        let channels = self
            .channels
            .iter()
            .map(|channel| resample_linear(channel, ratio, out_len))
            .collect();

        DecodedAudioBuffer {
            sample_rate: target_rate,
            channels,
        }
    }
}

fn resample_linear(input: &[f32], ratio: f64, out_len: usize) -> Vec<f32> {
    let last = input.len() - 1;

    (0..out_len)
        .map(|i| {
            let position = i as f64 * ratio;
            let index = (position.floor() as usize).min(last);
            let next = (index + 1).min(last);
            let fraction = (position - index as f64).clamp(0.0, 1.0) as f32;
            input[index] + (input[next] - input[index]) * fraction
        })
        .collect()
}
