use crate::bext::BroadcastMetadata;
use crate::chunk::{self, *};
use crate::convert::{self, SCRATCH_BUFFER_SIZE};
use crate::format::{self, StreamFormat};
use crate::prelude::*;
use crate::smpl::SampleLoopTable;

/// Location of the sample data inside the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataRegion {
    pub start_offset: u64,
    pub byte_length: u64,
}

impl DataRegion {
    pub fn frame_count(&self, bytes_per_frame: u32) -> u64 {
        if bytes_per_frame == 0 {
            0
        } else {
            self.byte_length / bytes_per_frame as u64
        }
    }
}

/// Collects everything the reader needs from a single chunk walk.
#[derive(Default)]
struct HeaderParser {
    format: Option<StreamFormat>,
    data: Option<DataRegion>,
    broadcast_chunk: Option<ChunkDescriptor>,
    broadcast: Option<BroadcastMetadata>,
    sample_loops: Option<SampleLoopTable>,
    metadata: MetadataMap,
}

impl ChunkHandler for HeaderParser {
    fn handles(&self, tag: &ChunkId) -> bool {
        [FMT_CHUNK_ID, DATA_CHUNK_ID, BEXT_CHUNK_ID, SMPL_CHUNK_ID].contains(&tag)
    }

    fn handle<S: InputStream>(&mut self, chunk: &ChunkDescriptor, input: &mut S) -> Result<()> {
        match &chunk.tag {
            FMT_CHUNK_ID => {
                let body = chunk::read_chunk_body(input, chunk)?;
                self.format = Some(format::decode_format_chunk(&body)?);
            }
            DATA_CHUNK_ID => {
                self.data = Some(DataRegion {
                    start_offset: chunk.data_offset,
                    byte_length: chunk.data_length as u64,
                });
            }
            BEXT_CHUNK_ID => {
                let body = chunk::read_chunk_body(input, chunk)?;
                let broadcast = BroadcastMetadata::decode(&body);
                broadcast.copy_to(&mut self.metadata);
                self.broadcast = Some(broadcast);
                self.broadcast_chunk = Some(*chunk);
            }
            SMPL_CHUNK_ID => {
                let body = chunk::read_chunk_body(input, chunk)?;
                let table = SampleLoopTable::decode(&body);
                table.copy_to(&mut self.metadata);
                self.sample_loops = Some(table);
            }
            _ => {}
        }
        Ok(())
    }
}

/// Random-access reader over a RIFF/WAVE stream.
///
/// The header is parsed once by [`WavReader::new`]; afterwards the format,
/// metadata and chunk layout are fixed and only sample reads touch the stream.
pub struct WavReader<R: InputStream> {
    input: R,
    format: StreamFormat,
    data: DataRegion,
    frame_count: u64,
    metadata: MetadataMap,
    broadcast_chunk: Option<ChunkDescriptor>,
    broadcast: Option<BroadcastMetadata>,
    sample_loops: Option<SampleLoopTable>,
    chunks: Vec<ChunkDescriptor>,
    scratch: Vec<u8>,
}

impl<R: InputStream> WavReader<R> {
    /// Parses the header of `input`, which must be positioned at the `RIFF` tag.
    pub fn new(mut input: R) -> Result<Self> {
        let mut parser = HeaderParser::default();
        let chunks = chunk::walk_chunks(&mut input, &mut parser)?;

        let format = parser.format.ok_or(WavError::MissingChunk("fmt "))?;
        let data = parser.data.ok_or(WavError::MissingChunk("data"))?;

        if format.bytes_per_frame == 0 {
            return Err(WavError::UnsupportedFormat(format.format_code));
        }
        if !format::SUPPORTED_BIT_DEPTHS.contains(&format.bits_per_sample) {
            return Err(WavError::UnsupportedBitDepth(format.bits_per_sample));
        }
        if format.channel_count > 2 {
            return Err(WavError::UnsupportedChannelCount(format.channel_count));
        }

        let frame_count = data.frame_count(format.bytes_per_frame);
        debug!(
            sample_rate = format.sample_rate,
            channels = format.channel_count,
            bits = format.bits_per_sample,
            frames = frame_count,
            "opened wav stream"
        );

        Ok(Self {
            input,
            format,
            data,
            frame_count,
            metadata: parser.metadata,
            broadcast_chunk: parser.broadcast_chunk,
            broadcast: parser.broadcast,
            sample_loops: parser.sample_loops,
            chunks,
            scratch: vec![0u8; SCRATCH_BUFFER_SIZE],
        })
    }

    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    pub fn sample_rate(&self) -> f64 {
        self.format.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.format.channel_count
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.format.bits_per_sample
    }

    pub fn is_floating_point(&self) -> bool {
        self.format.is_floating_point
    }

    /// Length of the stream in frames.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn data_region(&self) -> DataRegion {
        self.data
    }

    /// All `bwav *` and sampler keys found in the stream.
    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    /// Location and declared size of the `bext` chunk, if there is one.
    pub fn broadcast_chunk(&self) -> Option<&ChunkDescriptor> {
        self.broadcast_chunk.as_ref()
    }

    pub fn broadcast_metadata(&self) -> Option<&BroadcastMetadata> {
        self.broadcast.as_ref()
    }

    pub fn sample_loops(&self) -> Option<&SampleLoopTable> {
        self.sample_loops.as_ref()
    }

    /// Every chunk seen while parsing, in file order.
    pub fn chunks(&self) -> &[ChunkDescriptor] {
        &self.chunks
    }

    pub fn into_inner(self) -> R {
        self.input
    }

    /// Reads `num_frames` frames starting at `start_frame` into the requested
    /// channel buffers, each of which must hold at least `num_frames` samples.
    ///
    /// Frames past the end of the stream are written as zero. A mono stream
    /// never writes to `right`. Returns the number of frames that came from
    /// the stream.
    pub fn read_samples(
        &mut self,
        mut left: Option<&mut [i32]>,
        mut right: Option<&mut [i32]>,
        start_frame: u64,
        num_frames: usize,
    ) -> Result<usize> {
        for buffer in [left.as_deref(), right.as_deref()].into_iter().flatten() {
            if buffer.len() < num_frames {
                return Err(WavError::InvalidArgument(format!(
                    "buffer holds {} samples, {} requested",
                    buffer.len(),
                    num_frames
                )));
            }
        }

        let stereo = self.format.channel_count > 1;
        let bytes_per_frame = self.format.bytes_per_frame as usize;
        let available = self.frame_count.saturating_sub(start_frame);
        let to_read = (num_frames as u64).min(available) as usize;

        if to_read > 0 && bytes_per_frame > 0 {
            self.input
                .seek_to(self.data.start_offset + start_frame * bytes_per_frame as u64)?;

            let frames_per_block = SCRATCH_BUFFER_SIZE / bytes_per_frame;
            let mut done = 0;
            while done < to_read {
                let frames = frames_per_block.min(to_read - done);
                let wanted = frames * bytes_per_frame;
                let got = self.input.read_bytes(&mut self.scratch[..wanted])?;
                if got < wanted {
                    warn!(
                        expected = wanted,
                        read = got,
                        "data chunk ends early, padding with silence"
                    );
                    self.scratch[got..wanted].fill(0);
                }

                convert::decode_frames(
                    &self.scratch[..wanted],
                    self.format.bits_per_sample,
                    self.format.channel_count,
                    left.as_deref_mut().map(|out| &mut out[done..done + frames]),
                    right
                        .as_deref_mut()
                        .map(|out| &mut out[done..done + frames]),
                );
                done += frames;
            }
        }

        let read = if bytes_per_frame > 0 { to_read } else { 0 };
        if let Some(out) = left.as_deref_mut() {
            out[read..num_frames].fill(0);
        }
        if stereo {
            if let Some(out) = right.as_deref_mut() {
                out[read..num_frames].fill(0);
            }
        }

        Ok(read)
    }

    /// Reads every frame, one `Vec` per channel.
    pub fn read_all(&mut self) -> Result<Vec<Vec<i32>>> {
        let frames = usize::try_from(self.frame_count)
            .map_err(|_| WavError::InvalidArgument("stream too long to buffer".to_string()))?;
        let mut left = vec![0i32; frames];
        if self.format.channel_count > 1 {
            let mut right = vec![0i32; frames];
            self.read_samples(Some(&mut left), Some(&mut right), 0, frames)?;
            Ok(vec![left, right])
        } else {
            self.read_samples(Some(&mut left), None, 0, frames)?;
            Ok(vec![left])
        }
    }
}
