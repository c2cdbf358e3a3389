//! Conversion between interleaved little-endian sample bytes and canonical
//! per-channel `i32` samples.
//!
//! Integer samples are left-justified in the canonical `i32` (full scale is
//! `i32::MIN..=i32::MAX` at every depth). 32-bit float data travels as the raw
//! IEEE bit pattern in both directions.

/// Scratch buffer size for sample reads: a multiple of 3 and 4 so no frame of
/// any supported layout straddles a refill.
pub const SCRATCH_BUFFER_SIZE: usize = 480 * 3 * 4;

pub fn bytes_per_sample(bits_per_sample: u16) -> usize {
    bits_per_sample as usize / 8
}

/// Decodes one sample from the first `bits_per_sample / 8` bytes of `bytes`.
#[inline]
pub fn decode_sample(bytes: &[u8], bits_per_sample: u16) -> i32 {
    match bits_per_sample {
        8 => (bytes[0] as i32 - 128) << 24,
        16 => (i16::from_le_bytes([bytes[0], bytes[1]]) as i32) << 16,
        24 => i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]),
        32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        _ => 0,
    }
}

/// Appends the encoded form of `sample` to `out`.
#[inline]
pub fn encode_sample(sample: i32, bits_per_sample: u16, out: &mut Vec<u8>) {
    match bits_per_sample {
        8 => out.push((128 + (sample >> 24)) as u8),
        16 => out.extend_from_slice(&((sample >> 16) as i16).to_le_bytes()),
        24 => out.extend_from_slice(&(sample >> 8).to_le_bytes()[..3]),
        32 => out.extend_from_slice(&sample.to_le_bytes()),
        _ => {}
    }
}

/// Deinterleaves whole frames from `src` into the requested channel outputs.
///
/// Channel 0 goes to `left`, channel 1 (if present) to `right`; either may be
/// `None`. A mono source leaves `right` untouched. Returns the number of
/// frames decoded, bounded by `src` and by the length of each supplied output.
pub fn decode_frames(
    src: &[u8],
    bits_per_sample: u16,
    channel_count: u16,
    mut left: Option<&mut [i32]>,
    mut right: Option<&mut [i32]>,
) -> usize {
    let sample_size = bytes_per_sample(bits_per_sample);
    let stride = sample_size * channel_count as usize;
    if stride == 0 {
        return 0;
    }

    let mut frames = src.len() / stride;
    if let Some(out) = left.as_deref() {
        frames = frames.min(out.len());
    }
    if channel_count > 1 {
        if let Some(out) = right.as_deref() {
            frames = frames.min(out.len());
        }
    }

    for frame in 0..frames {
        let base = frame * stride;
        if let Some(out) = left.as_deref_mut() {
            out[frame] = decode_sample(&src[base..], bits_per_sample);
        }
        if channel_count > 1 {
            if let Some(out) = right.as_deref_mut() {
                out[frame] = decode_sample(&src[base + sample_size..], bits_per_sample);
            }
        }
    }

    frames
}

/// Interleaves the first `num_frames` samples of each channel slice into `out`.
pub fn encode_frames(channels: &[&[i32]], bits_per_sample: u16, num_frames: usize, out: &mut Vec<u8>) {
    out.reserve(num_frames * channels.len() * bytes_per_sample(bits_per_sample));
    for frame in 0..num_frames {
        for channel in channels {
            encode_sample(channel[frame], bits_per_sample, out);
        }
    }
}

/// Canonical sample for a float in `[-1.0, 1.0]`.
pub fn from_f32(value: f32, floating_point: bool) -> i32 {
    if floating_point {
        value.to_bits() as i32
    } else {
        (value.clamp(-1.0, 1.0) as f64 * i32::MAX as f64).round() as i32
    }
}

/// Inverse of [`from_f32`].
pub fn to_f32(sample: i32, floating_point: bool) -> f32 {
    if floating_point {
        f32::from_bits(sample as u32)
    } else {
        (sample as f64 / -(i32::MIN as f64)) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rules() {
        assert_eq!(decode_sample(&[0], 8), i32::MIN);
        assert_eq!(decode_sample(&[128], 8), 0);
        assert_eq!(decode_sample(&[255], 8), 127 << 24);
        assert_eq!(decode_sample(&[0x34, 0x12], 16), 0x1234 << 16);
        assert_eq!(decode_sample(&[0xff, 0xff], 16), -1 << 16);
        assert_eq!(decode_sample(&[0x56, 0x34, 0x12], 24), 0x123456 << 8);
        assert_eq!(decode_sample(&[0x00, 0x00, 0x80], 24), i32::MIN);
        assert_eq!(decode_sample(&[1, 2, 3, 4], 32), 0x04030201);
    }

    #[test]
    fn test_encode_rules() {
        let mut out = Vec::new();
        encode_sample(0, 8, &mut out);
        encode_sample(i32::MIN, 8, &mut out);
        encode_sample(0x1234_0000, 16, &mut out);
        encode_sample(0x1234_5600, 24, &mut out);
        encode_sample(-1, 32, &mut out);
        assert_eq!(
            out,
            vec![128, 0, 0x34, 0x12, 0x56, 0x34, 0x12, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn test_decode_stereo_with_selective_outputs() {
        // two 16-bit stereo frames: (1, 2), (3, 4)
        let src = [1u8, 0, 2, 0, 3, 0, 4, 0];
        let mut left = [0i32; 2];
        let mut right = [0i32; 2];

        assert_eq!(decode_frames(&src, 16, 2, Some(&mut left), Some(&mut right)), 2);
        assert_eq!(left, [1 << 16, 3 << 16]);
        assert_eq!(right, [2 << 16, 4 << 16]);

        let mut right_only = [0i32; 2];
        assert_eq!(decode_frames(&src, 16, 2, None, Some(&mut right_only)), 2);
        assert_eq!(right_only, [2 << 16, 4 << 16]);

        assert_eq!(decode_frames(&src, 16, 2, None, None), 2);
    }

    #[test]
    fn test_mono_never_fills_right() {
        let src = [0x00u8, 0x00, 0x40];
        let mut left = [0i32; 1];
        let mut right = [7i32; 1];
        assert_eq!(decode_frames(&src, 24, 1, Some(&mut left), Some(&mut right)), 1);
        assert_eq!(left, [0x40_0000 << 8]);
        assert_eq!(right, [7]);
    }

    #[test]
    fn test_encode_interleaves_channels() {
        let left = [1 << 24, 2 << 24];
        let right = [-(1 << 24), -(2 << 24)];
        let mut out = Vec::new();
        encode_frames(&[&left, &right], 8, 2, &mut out);
        assert_eq!(out, vec![129, 127, 130, 126]);
    }

    #[test]
    fn test_partial_frame_is_ignored() {
        let src = [0u8; 7]; // one 24-bit stereo frame plus a stray byte
        let mut left = [1i32; 4];
        assert_eq!(decode_frames(&src, 24, 2, Some(&mut left), None), 1);
        assert_eq!(left, [0, 1, 1, 1]);
    }

    #[test]
    fn test_float_bits_pass_through() {
        let sample = from_f32(-0.25, true);
        assert_eq!(sample as u32, (-0.25f32).to_bits());
        assert_eq!(to_f32(sample, true), -0.25);

        assert_eq!(from_f32(2.0, false), i32::MAX);
        assert_eq!(to_f32(i32::MIN, false), -1.0);
    }
}
