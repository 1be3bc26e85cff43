//! # WAV Container Codec
//!
//! Converts decoded audio into the canonical uncompressed container the
//! assessment service accepts, and reads WAV uploads back into decoded form.
//!
//! ## Canonical Layout (all integers little-endian):
//! ```text
//! offset  size  field            value
//!      0     4  ChunkID          "RIFF"
//!      4     4  ChunkSize        36 + data size
//!      8     4  Format           "WAVE"
//!     12     4  Subchunk1ID      "fmt "
//!     16     4  Subchunk1Size    16
//!     20     2  AudioFormat      1 (integer PCM)
//!     22     2  NumChannels      1
//!     24     4  SampleRate       rate of the input buffer
//!     28     4  ByteRate         SampleRate * 2
//!     32     2  BlockAlign       2
//!     34     2  BitsPerSample    16
//!     36     4  Subchunk2ID      "data"
//!     40     4  Subchunk2Size    sample count * 2
//!     44     *  Data             16-bit signed samples
//! ```

use super::{AudioError, DecodedAudioBuffer};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Size of the canonical header in bytes.
pub const WAV_HEADER_LEN: usize = 44;

const PCM_FORMAT: u16 = 1;
const IEEE_FLOAT_FORMAT: u16 = 3;
const OUTPUT_CHANNELS: u16 = 1;
const OUTPUT_BITS_PER_SAMPLE: u16 = 16;
const OUTPUT_BLOCK_ALIGN: u16 = OUTPUT_CHANNELS * OUTPUT_BITS_PER_SAMPLE / 8;

/// Encode a decoded buffer as a mono 16-bit PCM WAV byte stream.
///
/// ## Behaviour:
/// - Only channel 0 is written; other channels are ignored, not mixed
/// - The sample rate is copied from the buffer, no resampling happens here
/// - Output length is always `44 + 2 * buffer.len()`
///
/// The function is total: every `DecodedAudioBuffer` has at least one
/// channel, and out-of-range samples are clamped rather than rejected.
pub fn encode_wav(buffer: &DecodedAudioBuffer) -> Vec<u8> {
    let samples = buffer.primary_channel();
    let data_size = samples.len() * OUTPUT_BLOCK_ALIGN as usize;

    let mut bytes = vec![0u8; WAV_HEADER_LEN + data_size];
    write_header(&mut bytes[..WAV_HEADER_LEN], buffer.sample_rate(), data_size as u32);

    for (slot, &sample) in bytes[WAV_HEADER_LEN..].chunks_exact_mut(2).zip(samples) {
        LittleEndian::write_i16(slot, sample_to_i16(sample));
    }

    bytes
}

fn write_header(header: &mut [u8], sample_rate: u32, data_size: u32) {
    header[0..4].copy_from_slice(b"RIFF");
    LittleEndian::write_u32(&mut header[4..8], 36u32.wrapping_add(data_size));
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    LittleEndian::write_u32(&mut header[16..20], 16);
    LittleEndian::write_u16(&mut header[20..22], PCM_FORMAT);
    LittleEndian::write_u16(&mut header[22..24], OUTPUT_CHANNELS);
    LittleEndian::write_u32(&mut header[24..28], sample_rate);
    LittleEndian::write_u32(&mut header[28..32], sample_rate.wrapping_mul(OUTPUT_BLOCK_ALIGN as u32));
    LittleEndian::write_u16(&mut header[32..34], OUTPUT_BLOCK_ALIGN);
    LittleEndian::write_u16(&mut header[34..36], OUTPUT_BITS_PER_SAMPLE);

    header[36..40].copy_from_slice(b"data");
    LittleEndian::write_u32(&mut header[40..44], data_size);
}

/// Convert one float sample to 16-bit PCM.
///
/// The value is clamped to [-1.0, 1.0]. Negative values scale by 32768 and
/// non-negative values by 32767, so both -1.0 and +1.0 land exactly on the
/// ends of the i16 range. The fractional part is truncated toward zero.
/// NaN encodes as silence.
pub fn sample_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

/// Fields of a canonical 44-byte WAV header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Read the header of a stream laid out like `encode_wav` output.
    ///
    /// Only the canonical layout is understood: `fmt ` immediately after
    /// `WAVE`, and `data` immediately after a 16-byte format chunk.
    pub fn parse(bytes: &[u8]) -> Result<WavHeader, AudioError> {
        if bytes.len() < WAV_HEADER_LEN {
            return Err(AudioError::InvalidWav(format!(
                "header needs {} bytes, got {}",
                WAV_HEADER_LEN,
                bytes.len()
            )));
        }

        expect_tag(bytes, 0, b"RIFF")?;
        expect_tag(bytes, 8, b"WAVE")?;
        expect_tag(bytes, 12, b"fmt ")?;
        expect_tag(bytes, 36, b"data")?;

        let mut cursor = Cursor::new(bytes);
        let read_err = |e: std::io::Error| AudioError::InvalidWav(e.to_string());

        cursor.set_position(4);
        let riff_size = cursor.read_u32::<LittleEndian>().map_err(read_err)?;

        cursor.set_position(16);
        let fmt_size = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        if fmt_size != 16 {
            return Err(AudioError::InvalidWav(format!(
                "expected a 16-byte fmt chunk, found {} bytes",
                fmt_size
            )));
        }

        let audio_format = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let channels = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let sample_rate = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let byte_rate = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let block_align = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let bits_per_sample = cursor.read_u16::<LittleEndian>().map_err(read_err)?;

        cursor.set_position(40);
        let data_size = cursor.read_u32::<LittleEndian>().map_err(read_err)?;

        Ok(WavHeader {
            riff_size,
            audio_format,
            channels,
            sample_rate,
            byte_rate,
            block_align,
            bits_per_sample,
            data_size,
        })
    }
}

fn expect_tag(bytes: &[u8], offset: usize, tag: &[u8; 4]) -> Result<(), AudioError> {
    if &bytes[offset..offset + 4] == tag {
        Ok(())
    } else {
        Err(AudioError::InvalidWav(format!(
            "missing {:?} tag at offset {}",
            String::from_utf8_lossy(tag),
            offset
        )))
    }
}

/// Decode any PCM or float WAV stream into per-channel float samples.
///
/// Supports 8-bit unsigned, 16-bit and 24-bit signed integer PCM and 32-bit
/// IEEE float. Integer samples are scaled into [-1.0, 1.0).
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudioBuffer, AudioError> {
    if bytes.is_empty() {
        return Err(AudioError::Empty);
    }
    if AudioFormat::sniff(bytes) != AudioFormat::Wav {
        return Err(AudioError::InvalidWav("missing RIFF/WAVE signature".to_string()));
    }

    let mut cursor = Cursor::new(bytes);
    let (header, data) = wav::read(&mut cursor).map_err(|e| AudioError::InvalidWav(e.to_string()))?;

    if header.audio_format != PCM_FORMAT && header.audio_format != IEEE_FLOAT_FORMAT {
        return Err(AudioError::UnsupportedEncoding(format!(
            "format code {}",
            header.audio_format
        )));
    }

    let interleaved: Vec<f32> = match data {
        wav::BitDepth::Eight(samples) => samples
            .into_iter()
            .map(|s| (s as f32 - 128.0) / 128.0)
            .collect(),
        wav::BitDepth::Sixteen(samples) => samples
            .into_iter()
            .map(|s| s as f32 / 32768.0)
            .collect(),
        // 24-bit samples arrive in the top three bytes of an i32
        wav::BitDepth::TwentyFour(samples) => samples
            .into_iter()
            .map(|s| (s as f64 / 2_147_483_648.0) as f32)
            .collect(),
        wav::BitDepth::ThirtyTwoFloat(samples) => samples,
        wav::BitDepth::Empty => Vec::new(),
    };

    DecodedAudioBuffer::from_interleaved(
        &interleaved,
        header.channel_count as usize,
        header.sampling_rate,
    )
}

/// Container format of an uploaded recording, detected from its magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Ogg,
    WebM,
    Mp4,
    Mpeg,
    Unknown,
}

impl AudioFormat {
    pub fn sniff(bytes: &[u8]) -> AudioFormat {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            AudioFormat::Wav
        } else if bytes.starts_with(b"OggS") {
            AudioFormat::Ogg
        } else if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            AudioFormat::WebM
        } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            AudioFormat::Mp4
        } else if bytes.starts_with(b"ID3") || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0) {
            AudioFormat::Mpeg
        } else {
            AudioFormat::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Ogg => "ogg",
            AudioFormat::WebM => "webm",
            AudioFormat::Mp4 => "mp4",
            AudioFormat::Mpeg => "mpeg",
            AudioFormat::Unknown => "unknown",
        }
    }

    /// MIME type to send upstream for this container.
    pub fn content_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Ogg => "audio/ogg; codecs=opus",
            AudioFormat::WebM => "audio/webm; codecs=opus",
            AudioFormat::Mp4 => "audio/mp4",
            AudioFormat::Mpeg => "audio/mpeg",
            AudioFormat::Unknown => "application/octet-stream",
        }
    }
}
