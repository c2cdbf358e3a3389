use crate::bext::BroadcastMetadata;
use crate::chunk::{self, *};
use crate::convert;
use crate::format::{self, *};
use crate::prelude::*;
use crate::reader::WavReader;
use crate::smpl::SampleLoopTable;

/// A write that would bring the data byte count to this value or beyond fails.
pub const WRITE_CAPACITY_LIMIT: u32 = 0xFFF0_0000;

const COPY_BLOCK_FRAMES: usize = 4096;

/// Largest header (RIFF, `fmt `, metadata chunks, `data` tag) that still
/// leaves the RIFF length representable once data reaches the capacity limit.
pub const MAX_HEADER_SIZE: u64 = (u32::MAX - WRITE_CAPACITY_LIMIT) as u64;

/// Output layout for a [`WavWriter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriterConfig {
    pub sample_rate: f64,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Only meaningful with 32-bit samples.
    pub floating_point: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            channels: 2,
            bits_per_sample: BIT_DEPTH_16,
            floating_point: false,
        }
    }
}

impl WriterConfig {
    /// 32-bit output defaults to IEEE float; use [`Self::with_floating_point`]
    /// for 32-bit integer PCM.
    pub fn new(sample_rate: f64, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
            floating_point: bits_per_sample == BIT_DEPTH_32,
        }
    }

    pub fn with_floating_point(mut self, floating_point: bool) -> Self {
        self.floating_point = floating_point;
        self
    }

    /// Same layout as an existing stream.
    pub fn from_format(format: &StreamFormat) -> Self {
        Self {
            sample_rate: format.sample_rate,
            channels: format.channel_count,
            bits_per_sample: format.bits_per_sample,
            floating_point: format.is_floating_point,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=2).contains(&self.channels) {
            return Err(WavError::UnsupportedChannelCount(self.channels));
        }
        if !SUPPORTED_BIT_DEPTHS.contains(&self.bits_per_sample) {
            return Err(WavError::UnsupportedBitDepth(self.bits_per_sample));
        }
        if !(self.sample_rate > 0.0 && self.sample_rate.round() <= u32::MAX as f64) {
            return Err(WavError::InvalidArgument(format!(
                "sample rate {} out of range",
                self.sample_rate
            )));
        }
        if self.floating_point && self.bits_per_sample != BIT_DEPTH_32 {
            return Err(WavError::InvalidArgument(format!(
                "floating point output needs 32-bit samples, not {}",
                self.bits_per_sample
            )));
        }
        Ok(())
    }

    pub fn stream_format(&self) -> StreamFormat {
        StreamFormat::new(
            self.sample_rate,
            self.channels,
            self.bits_per_sample,
            self.floating_point,
        )
    }
}

/// Streaming WAV writer.
///
/// A provisional header is written when the writer is created and rewritten
/// with the final lengths by [`WavWriter::finalize`], or by `Drop` if the
/// writer is never finalized. Both need a sink that can seek back to the
/// header. After any failed write the header is rewritten to cover the data
/// written so far and the writer refuses further input.
pub struct WavWriter<W: OutputStream> {
    output: Option<W>,
    config: WriterConfig,
    format: StreamFormat,
    metadata_chunks: Vec<(&'static ChunkId, Vec<u8>)>,
    header_position: u64,
    frames_written: u64,
    bytes_written: u64,
    capacity_limit: u64,
    failed: bool,
    finalized: bool,
    data_padded: bool,
    buffer: Vec<u8>,
}

impl<W: OutputStream> WavWriter<W> {
    /// Starts a stream at the current position of `output`.
    ///
    /// `metadata` may carry `bwav *` keys (written as a `bext` chunk unless
    /// all of them are empty) and sampler keys (written as a `smpl` chunk).
    pub fn new(output: W, config: WriterConfig, metadata: &MetadataMap) -> Result<Self> {
        config.validate()?;

        let mut metadata_chunks = Vec::new();
        if let Some(bext) = BroadcastMetadata::from_map(metadata).encode() {
            metadata_chunks.push((BEXT_CHUNK_ID, bext));
        }
        if let Some(table) = SampleLoopTable::from_map(metadata) {
            metadata_chunks.push((SMPL_CHUNK_ID, table.encode()));
        }

        let header_size = RIFF_HEADER_SIZE
            + CHUNK_HEADER_SIZE
            + STANDARD_FMT_CHUNK_SIZE as u64
            + metadata_chunks
                .iter()
                .map(|(_, body)| padded_chunk_size(body))
                .sum::<u64>()
            + CHUNK_HEADER_SIZE;
        if header_size > MAX_HEADER_SIZE {
            return Err(WavError::InvalidArgument(format!(
                "metadata chunks need a {} byte header, limit is {}",
                header_size, MAX_HEADER_SIZE
            )));
        }

        let mut writer = Self {
            output: Some(output),
            config,
            format: config.stream_format(),
            metadata_chunks,
            header_position: 0,
            frames_written: 0,
            bytes_written: 0,
            capacity_limit: WRITE_CAPACITY_LIMIT as u64,
            failed: false,
            finalized: false,
            data_padded: false,
            buffer: Vec::new(),
        };

        let started = match writer.output.as_mut() {
            Some(output) => output.tell().map_err(WavError::from),
            None => Err(WavError::WriterFailed),
        };
        let header = started.and_then(|position| {
            writer.header_position = position;
            writer.write_header()
        });
        if let Err(e) = header {
            writer.output = None;
            return Err(e);
        }

        Ok(writer)
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// True once a write has failed; the writer accepts nothing further.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Appends `num_frames` frames. `channels` holds one slice per output
    /// channel, each at least `num_frames` long.
    pub fn write(&mut self, channels: &[&[i32]], num_frames: usize) -> Result<()> {
        if self.failed || self.finalized {
            return Err(WavError::WriterFailed);
        }
        if channels.len() != self.config.channels as usize {
            return Err(WavError::InvalidArgument(format!(
                "writer has {} channels, got {}",
                self.config.channels,
                channels.len()
            )));
        }
        if let Some(short) = channels.iter().find(|channel| channel.len() < num_frames) {
            return Err(WavError::InvalidArgument(format!(
                "channel holds {} samples, {} requested",
                short.len(),
                num_frames
            )));
        }

        self.buffer.clear();
        convert::encode_frames(channels, self.config.bits_per_sample, num_frames, &mut self.buffer);
        let bytes = self.buffer.len() as u64;

        if self.bytes_written + bytes >= self.capacity_limit {
            return Err(self.fail(WavError::CapacityExceeded {
                limit: self.capacity_limit as u32,
            }));
        }

        let written = match self.output.as_mut() {
            Some(output) => output.write_bytes(&self.buffer).map_err(WavError::from),
            None => Err(WavError::WriterFailed),
        };
        if let Err(e) = written {
            return Err(self.fail(e));
        }

        self.bytes_written += bytes;
        self.frames_written += num_frames as u64;
        Ok(())
    }

    /// Copies frames from `reader`, starting at `start_frame`, until
    /// `num_frames` have been copied or the reader runs out.
    ///
    /// A mono source feeding a stereo writer is duplicated into both
    /// channels; a stereo source feeding a mono writer keeps its left channel.
    pub fn write_from_reader<R: InputStream>(
        &mut self,
        reader: &mut WavReader<R>,
        start_frame: u64,
        num_frames: Option<u64>,
    ) -> Result<u64> {
        if reader.is_floating_point() != self.config.floating_point {
            return Err(WavError::InvalidArgument(
                "cannot copy between integer and floating point samples".to_string(),
            ));
        }

        let available = reader.frame_count().saturating_sub(start_frame);
        let total = num_frames.map_or(available, |n| n.min(available));
        let source_stereo = reader.channel_count() > 1;

        let mut left = vec![0i32; COPY_BLOCK_FRAMES];
        let mut right = vec![0i32; COPY_BLOCK_FRAMES];
        let mut copied = 0u64;

        while copied < total {
            let frames = (total - copied).min(COPY_BLOCK_FRAMES as u64) as usize;
            let right_out = if source_stereo {
                Some(&mut right[..frames])
            } else {
                None
            };
            reader.read_samples(Some(&mut left[..frames]), right_out, start_frame + copied, frames)?;

            if self.config.channels > 1 {
                if !source_stereo {
                    right[..frames].copy_from_slice(&left[..frames]);
                }
                self.write(&[&left[..frames], &right[..frames]], frames)?;
            } else {
                self.write(&[&left[..frames]], frames)?;
            }
            copied += frames as u64;
        }

        debug!(frames = copied, "copied frames from reader");
        Ok(copied)
    }

    /// Rewrites the header with the final lengths and hands back the sink.
    pub fn finalize(mut self) -> Result<W> {
        self.commit()?;
        self.output.take().ok_or(WavError::WriterFailed)
    }

    fn commit(&mut self) -> Result<()> {
        self.finalized = true;
        if !self.failed && self.bytes_written % 2 == 1 {
            if let Some(output) = self.output.as_mut() {
                output.write_bytes(&[0])?; // padding
                self.data_padded = true;
            }
        }
        self.write_header()?;
        if let Some(output) = self.output.as_mut() {
            output.flush_bytes()?;
        }
        debug!(
            frames = self.frames_written,
            bytes = self.bytes_written,
            "finalized wav header"
        );
        Ok(())
    }

    /// Records a failed write: rewrites the header over what made it out,
    /// then disables the writer.
    fn fail(&mut self, error: WavError) -> WavError {
        warn!(error = %error, frames = self.frames_written, "wav write failed, disabling writer");
        if let Err(e) = self.write_header() {
            warn!(error = %e, "could not rewrite header after failed write");
        }
        self.failed = true;
        error
    }

    fn header_bytes(&self) -> Vec<u8> {
        let data_length = u32::try_from(self.bytes_written).unwrap_or(u32::MAX);
        // the pad byte only counts once it is actually in the stream
        let pad = u64::from(self.data_padded);
        let metadata_length: u64 = self
            .metadata_chunks
            .iter()
            .map(|(_, body)| padded_chunk_size(body))
            .sum();
        let riff_length = 4
            + CHUNK_HEADER_SIZE
            + STANDARD_FMT_CHUNK_SIZE as u64
            + metadata_length
            + CHUNK_HEADER_SIZE
            + self.bytes_written
            + pad;
        let riff_length = u32::try_from(riff_length).unwrap_or(u32::MAX);

        let mut header = Vec::with_capacity(44 + metadata_length as usize);
        header.extend_from_slice(RIFF_CHUNK_ID);
        header.extend_from_slice(&riff_length.to_le_bytes());
        header.extend_from_slice(WAVE_FORMAT_ID);
        // Vec<u8> writes cannot fail
        let _ = chunk::write_chunk(&mut header, FMT_CHUNK_ID, &format::encode_format_chunk(&self.format));
        for (id, body) in &self.metadata_chunks {
            let _ = chunk::write_chunk(&mut header, id, body);
        }
        header.extend_from_slice(DATA_CHUNK_ID);
        header.extend_from_slice(&data_length.to_le_bytes());
        header
    }

    fn write_header(&mut self) -> Result<()> {
        let header = self.header_bytes();
        let header_position = self.header_position;
        let output = self.output.as_mut().ok_or(WavError::WriterFailed)?;

        let end = output.tell()?;
        output.seek_to(header_position)?;
        output.write_bytes(&header)?;
        let after = output.tell()?;
        if end > after {
            output.seek_to(end)?;
        }

        debug!(position = header_position, length = header.len(), "wrote wav header");
        Ok(())
    }
}

/// Bytes a chunk occupies in the stream: header, body and pad byte.
fn padded_chunk_size(body: &[u8]) -> u64 {
    let length = body.len() as u64;
    CHUNK_HEADER_SIZE + length + (length & 1)
}

impl<W: OutputStream> Drop for WavWriter<W> {
    fn drop(&mut self) {
        if self.output.is_some() && !self.finalized {
            if let Err(e) = self.commit() {
                warn!(error = %e, "failed to finalize wav header on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ForwardOnly;
    use std::io::{self, Cursor};

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        LittleEndian::read_u32(&bytes[offset..offset + 4])
    }

    /// Seekable sink that rejects any single write larger than `max_write`.
    struct FlakySink {
        inner: Cursor<Vec<u8>>,
        max_write: usize,
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.len() > self.max_write {
                return Err(io::Error::other("disk full"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FlakySink {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_header_before_and_after_finalize() {
        let mut out = Cursor::new(Vec::new());
        let mut writer = WavWriter::new(&mut out, WriterConfig::default(), &MetadataMap::new()).unwrap();
        assert_eq!(writer.format().bytes_per_frame, 4);

        let left = [0i32; 3];
        let right = [0i32; 3];
        writer.write(&[&left, &right], 3).unwrap();
        writer.finalize().unwrap();

        let bytes = out.into_inner();
        assert_eq!(bytes.len(), 44 + 12);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4), 36 + 12);
        assert_eq!(&bytes[8..16], b"WAVEfmt ");
        assert_eq!(u32_at(&bytes, 16), 16);
        assert_eq!(LittleEndian::read_u16(&bytes[20..22]), FORMAT_PCM);
        assert_eq!(u32_at(&bytes, 24), 44100);
        assert_eq!(u32_at(&bytes, 28), 44100 * 4);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40), 12);
    }

    #[test]
    fn test_drop_commits_header() {
        let mut out = Cursor::new(Vec::new());
        {
            let config = WriterConfig::new(48000.0, 1, 24);
            let mut writer = WavWriter::new(&mut out, config, &MetadataMap::new()).unwrap();
            writer.write(&[&[1 << 8, 2 << 8]], 2).unwrap();
        }
        let bytes = out.into_inner();
        assert_eq!(u32_at(&bytes, 40), 6);
        assert_eq!(u32_at(&bytes, 4), 36 + 6);
    }

    #[test]
    fn test_metadata_chunks_in_header() {
        let mut metadata = crate::metadata::create_bwav_metadata(
            "Thunder", "wavcodex", "", "2024-01-01", "10:00:00", 0, "",
        );
        metadata.insert("MidiUnityNote".to_string(), "60".to_string());

        let mut out = Cursor::new(Vec::new());
        let writer = WavWriter::new(&mut out, WriterConfig::default(), &metadata).unwrap();
        writer.finalize().unwrap();

        let bytes = out.into_inner();
        assert_eq!(&bytes[36..40], b"bext");
        assert_eq!(u32_at(&bytes, 40), 604);
        let smpl = 44 + 604;
        assert_eq!(&bytes[smpl..smpl + 4], b"smpl");
        assert_eq!(u32_at(&bytes, smpl + 4), 36);
        let data = smpl + 8 + 36;
        assert_eq!(&bytes[data..data + 4], b"data");
        assert_eq!(u32_at(&bytes, 4), 36 + 8 + 604 + 8 + 36);
        assert_eq!(bytes.len(), data + 8);
    }

    #[test]
    fn test_empty_broadcast_map_writes_no_bext() {
        let metadata = crate::metadata::create_bwav_metadata("", "", "", "", "", 0, "");
        let mut out = Cursor::new(Vec::new());
        WavWriter::new(&mut out, WriterConfig::default(), &metadata)
            .unwrap()
            .finalize()
            .unwrap();
        let bytes = out.into_inner();
        assert_eq!(&bytes[36..40], b"data");
    }

    #[test]
    fn test_odd_data_length_is_padded() {
        let mut out = Cursor::new(Vec::new());
        let config = WriterConfig::new(8000.0, 1, 8);
        let mut writer = WavWriter::new(&mut out, config, &MetadataMap::new()).unwrap();
        writer.write(&[&[0, 0, 0]], 3).unwrap();
        writer.finalize().unwrap();

        let bytes = out.into_inner();
        assert_eq!(bytes.len(), 44 + 4);
        assert_eq!(u32_at(&bytes, 40), 3);
        assert_eq!(u32_at(&bytes, 4), 36 + 4);
        assert_eq!(&bytes[44..], &[128, 128, 128, 0]);
    }

    #[test]
    fn test_forward_only_sink_reports_not_seekable() {
        let sink = ForwardOnly::new(Vec::new());
        let mut writer = WavWriter::new(sink, WriterConfig::new(44100.0, 1, 16), &MetadataMap::new()).unwrap();
        writer.write(&[&[0, 0]], 2).unwrap();
        assert!(matches!(writer.finalize(), Err(WavError::NotSeekable)));
    }

    #[test]
    fn test_failed_write_rewrites_header_and_disables() {
        let sink = FlakySink {
            inner: Cursor::new(Vec::new()),
            max_write: 64,
        };
        let config = WriterConfig::new(44100.0, 1, 16);
        let mut writer = WavWriter::new(sink, config, &MetadataMap::new()).unwrap();

        writer.write(&[&[1 << 16; 8]], 8).unwrap();
        let big = vec![0i32; 100];
        assert!(matches!(writer.write(&[&big], 100), Err(WavError::Io(_))));
        assert!(writer.has_failed());
        assert!(matches!(writer.write(&[&[0; 1]], 1), Err(WavError::WriterFailed)));

        let sink = writer.finalize().unwrap();
        let bytes = sink.inner.into_inner();
        assert_eq!(u32_at(&bytes, 40), 16);
        assert_eq!(bytes.len(), 44 + 16);
    }

    #[test]
    fn test_failed_odd_session_declares_only_written_bytes() {
        let sink = FlakySink {
            inner: Cursor::new(Vec::new()),
            max_write: 64,
        };
        let config = WriterConfig::new(8000.0, 1, 8);
        let mut writer = WavWriter::new(sink, config, &MetadataMap::new()).unwrap();

        writer.write(&[&[0, 0, 0]], 3).unwrap();
        let big = vec![0i32; 100];
        assert!(writer.write(&[&big], 100).is_err());

        let bytes = writer.finalize().unwrap().inner.into_inner();
        assert_eq!(bytes.len(), 44 + 3);
        assert_eq!(u32_at(&bytes, 40), 3);
        assert_eq!(u32_at(&bytes, 4), 36 + 3);
    }

    #[test]
    fn test_oversized_metadata_is_rejected() {
        let metadata = crate::metadata::create_bwav_metadata("", "", "", "", "", 0, &"h".repeat(2 << 20));
        let mut out = Cursor::new(Vec::new());
        assert!(matches!(
            WavWriter::new(&mut out, WriterConfig::default(), &metadata),
            Err(WavError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_riff_length_at_capacity_with_metadata() {
        let metadata = crate::metadata::create_bwav_metadata("", "", "", "", "", 0, &"h".repeat(1000));
        let mut out = Cursor::new(Vec::new());
        let mut writer = WavWriter::new(&mut out, WriterConfig::default(), &metadata).unwrap();
        writer.bytes_written = WRITE_CAPACITY_LIMIT as u64 - 1;

        let header = writer.header_bytes();
        let expected = header.len() as u64 - 8 + WRITE_CAPACITY_LIMIT as u64 - 1;
        assert_eq!(u32_at(&header, 4) as u64, expected);
        assert_eq!(u32_at(&header, header.len() - 4), WRITE_CAPACITY_LIMIT - 1);

        // keep the drop-time commit from writing a pad byte and header
        writer.output = None;
    }

    #[test]
    fn test_capacity_limit() {
        let mut out = Cursor::new(Vec::new());
        let mut writer = WavWriter::new(&mut out, WriterConfig::default(), &MetadataMap::new()).unwrap();
        writer.capacity_limit = 100;

        let samples = [0i32; 25];
        writer.write(&[&samples, &samples], 24).unwrap();
        assert!(matches!(
            writer.write(&[&samples, &samples], 1),
            Err(WavError::CapacityExceeded { limit: 100 })
        ));
        assert!(writer.has_failed());
        assert_eq!(writer.frames_written(), 24);
        drop(writer);

        assert_eq!(u32_at(out.get_ref(), 40), 96);
    }

    #[test]
    fn test_argument_errors_do_not_disable() {
        let mut out = Cursor::new(Vec::new());
        let mut writer = WavWriter::new(&mut out, WriterConfig::default(), &MetadataMap::new()).unwrap();
        assert!(matches!(
            writer.write(&[&[0; 4]], 4),
            Err(WavError::InvalidArgument(_))
        ));
        assert!(matches!(
            writer.write(&[&[0; 2], &[0; 4]], 4),
            Err(WavError::InvalidArgument(_))
        ));
        assert!(!writer.has_failed());
        writer.write(&[&[0; 4], &[0; 4]], 4).unwrap();
    }

    #[test]
    fn test_config_validation() {
        assert!(WriterConfig::default().validate().is_ok());
        assert!(WriterConfig::new(96000.0, 2, 32).floating_point);
        assert!(matches!(
            WriterConfig::new(44100.0, 3, 16).validate(),
            Err(WavError::UnsupportedChannelCount(3))
        ));
        assert!(matches!(
            WriterConfig::new(44100.0, 2, 12).validate(),
            Err(WavError::UnsupportedBitDepth(12))
        ));
        assert!(WriterConfig::new(0.0, 2, 16).validate().is_err());
        assert!(
            WriterConfig::new(44100.0, 2, 16)
                .with_floating_point(true)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_float_header_code() {
        let mut out = Cursor::new(Vec::new());
        let writer = WavWriter::new(&mut out, WriterConfig::new(48000.0, 2, 32), &MetadataMap::new()).unwrap();
        writer.finalize().unwrap();
        let bytes = out.into_inner();
        assert_eq!(LittleEndian::read_u16(&bytes[20..22]), FORMAT_IEEE_FLOAT);

        let mut out = Cursor::new(Vec::new());
        let config = WriterConfig::new(48000.0, 2, 32).with_floating_point(false);
        WavWriter::new(&mut out, config, &MetadataMap::new())
            .unwrap()
            .finalize()
            .unwrap();
        assert_eq!(LittleEndian::read_u16(&out.get_ref()[20..22]), FORMAT_PCM);
    }
}
