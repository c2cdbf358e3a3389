pub mod bext;
pub mod chunk;
pub mod codecs;
pub mod convert;
pub mod error;
pub mod format;
pub mod metadata;
pub mod patch;
mod prelude;
pub mod reader;
pub mod smpl;
pub mod stream;
pub mod writer;

use crate::prelude::*;

pub use bext::BroadcastMetadata;
pub use chunk::{ChunkDescriptor, ChunkId};
pub use codecs::{Codec, FileInfo, WavCodec, get_codec};
pub use error::{Result, WavError};
pub use format::StreamFormat;
pub use metadata::{MetadataMap, create_bwav_metadata};
pub use patch::{PatchOutcome, replace_metadata_in_file};
pub use reader::{DataRegion, WavReader};
pub use smpl::{SampleLoop, SampleLoopTable};
pub use stream::{ForwardOnly, InputStream, OutputStream};
pub use writer::{WRITE_CAPACITY_LIMIT, WavWriter, WriterConfig};

pub fn get_file_info(path: &str) -> Result<FileInfo> {
    get_codec(path)?.get_file_info(path)
}

pub fn read_metadata(path: &str) -> Result<MetadataMap> {
    get_codec(path)?.read_metadata(path)
}

/// Copies `source` into a new file at `dest` with a different sample layout.
///
/// Only the bit depth and channel count may change; integer and float data
/// are not converted into each other. Metadata found in `source` is carried
/// across.
pub fn convert_file(source: &str, dest: &str, bits_per_sample: u16, channels: u16) -> Result<u64> {
    if std::path::Path::new(source) == std::path::Path::new(dest) {
        return Err(WavError::InvalidArgument(
            "source and destination are the same file".to_string(),
        ));
    }

    let codec = WavCodec;
    let mut reader = codec.open_file(source)?;
    let format = *reader.format();

    let config = WriterConfig::new(format.sample_rate, channels, bits_per_sample)
        .with_floating_point(format.is_floating_point);
    let metadata = reader.metadata().clone();
    let mut writer = codec.create_file(dest, config, &metadata)?;

    let frames = writer.write_from_reader(&mut reader, 0, None)?;
    writer.finalize()?;
    debug!(source, dest, frames, "converted file");
    Ok(frames)
}
