//! The `fmt ` sub-chunk: decoding into [`StreamFormat`] and encoding for the writer.

use crate::prelude::*;

// Format tags
pub const FORMAT_PCM: u16 = 1;
pub const FORMAT_IEEE_FLOAT: u16 = 3;

pub const STANDARD_FMT_CHUNK_SIZE: u32 = 16;

// Standard bit depths
pub const BIT_DEPTH_8: u16 = 8;
pub const BIT_DEPTH_16: u16 = 16;
pub const BIT_DEPTH_24: u16 = 24;
pub const BIT_DEPTH_32: u16 = 32;

pub const SUPPORTED_BIT_DEPTHS: [u16; 4] = [BIT_DEPTH_8, BIT_DEPTH_16, BIT_DEPTH_24, BIT_DEPTH_32];

/// Sample layout of a WAV stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamFormat {
    pub sample_rate: f64,
    pub channel_count: u16,
    pub bits_per_sample: u16,
    pub is_floating_point: bool,
    /// Format tag as found in the file.
    pub format_code: u16,
    /// Zero marks a stream whose samples cannot be decoded.
    pub bytes_per_frame: u32,
}

impl StreamFormat {
    pub fn new(sample_rate: f64, channel_count: u16, bits_per_sample: u16, is_floating_point: bool) -> Self {
        Self {
            sample_rate,
            channel_count,
            bits_per_sample,
            is_floating_point,
            format_code: if is_floating_point {
                FORMAT_IEEE_FLOAT
            } else {
                FORMAT_PCM
            },
            bytes_per_frame: channel_count as u32 * bits_per_sample as u32 / 8,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.bytes_per_frame > 0
            && SUPPORTED_BIT_DEPTHS.contains(&self.bits_per_sample)
            && (1..=2).contains(&self.channel_count)
    }

    pub fn bytes_per_second(&self) -> u32 {
        self.bytes_per_frame
            .saturating_mul(self.sample_rate.round() as u32)
    }
}

/// Decodes a `fmt ` chunk body.
///
/// Frame size and bit depth are derived from the byte rate rather than read
/// from the block-align and bits fields. An unsupported format code yields
/// `bytes_per_frame == 0` instead of an error so the caller decides how to
/// report it.
pub fn decode_format_chunk(body: &[u8]) -> Result<StreamFormat> {
    if body.len() < STANDARD_FMT_CHUNK_SIZE as usize {
        return Err(WavError::TruncatedChunk {
            tag: "fmt ".to_string(),
            declared: STANDARD_FMT_CHUNK_SIZE,
            available: body.len() as u64,
        });
    }

    let format_code = LittleEndian::read_u16(&body[0..2]);
    let channel_count = LittleEndian::read_u16(&body[2..4]);
    let sample_rate = LittleEndian::read_u32(&body[4..8]);
    let byte_rate = LittleEndian::read_u32(&body[8..12]);

    if sample_rate == 0 || channel_count == 0 {
        return Err(WavError::MalformedContainer(format!(
            "format chunk declares {} Hz with {} channels",
            sample_rate, channel_count
        )));
    }

    let mut bytes_per_frame = byte_rate / sample_rate;
    // a depth that does not fit reads as 0, which marks the stream unusable
    let bits_per_sample = u16::try_from(8 * bytes_per_frame as u64 / channel_count as u64).unwrap_or(0);

    let is_floating_point = format_code == FORMAT_IEEE_FLOAT;
    if format_code != FORMAT_PCM && !is_floating_point {
        bytes_per_frame = 0;
    }

    Ok(StreamFormat {
        sample_rate: sample_rate as f64,
        channel_count,
        bits_per_sample,
        is_floating_point,
        format_code,
        bytes_per_frame,
    })
}

/// Encodes the 16-byte `fmt ` body for `format`.
pub fn encode_format_chunk(format: &StreamFormat) -> [u8; STANDARD_FMT_CHUNK_SIZE as usize] {
    let mut body = [0u8; STANDARD_FMT_CHUNK_SIZE as usize];
    let code = if format.is_floating_point {
        FORMAT_IEEE_FLOAT
    } else {
        FORMAT_PCM
    };
    LittleEndian::write_u16(&mut body[0..2], code);
    LittleEndian::write_u16(&mut body[2..4], format.channel_count);
    LittleEndian::write_u32(&mut body[4..8], format.sample_rate.round() as u32);
    LittleEndian::write_u32(&mut body[8..12], format.bytes_per_second());
    LittleEndian::write_u16(&mut body[12..14], format.bytes_per_frame as u16);
    LittleEndian::write_u16(&mut body[14..16], format.bits_per_sample);
    body
}
