//! Replacing the broadcast metadata of an existing WAV file.
//!
//! When the new `bext` block fits inside the chunk already in the file it is
//! written over the old one and nothing else in the file moves. Otherwise the
//! whole file is re-encoded into a temporary sibling which then replaces the
//! original.

use crate::bext::BroadcastMetadata;
use crate::prelude::*;
use crate::reader::WavReader;
use crate::writer::{WavWriter, WriterConfig};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

const SIBLING_ATTEMPTS: usize = 100;

/// How [`replace_metadata_in_file`] applied the new metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The existing `bext` chunk was overwritten; file size is unchanged.
    InPlace,
    /// The file was re-encoded with the new metadata and swapped in.
    Rewritten,
}

pub fn replace_metadata_in_file<P: AsRef<Path>>(path: P, metadata: &MetadataMap) -> Result<PatchOutcome> {
    let path = path.as_ref();
    let reader = WavReader::new(BufReader::new(File::open(path)?))?;
    let broadcast_chunk = reader.broadcast_chunk().copied();
    drop(reader);

    if let Some(chunk) = broadcast_chunk {
        let file_length = fs::metadata(path)?.len();
        if chunk.data_offset + chunk.data_length as u64 > file_length {
            warn!(
                path = %path.display(),
                declared = chunk.data_length,
                "bext chunk runs past end of file, rewriting instead"
            );
        } else {
            let mut file = OpenOptions::new().write(true).open(path)?;
            if write_broadcast_in_place(&mut file, &chunk, metadata)? {
                debug!(path = %path.display(), "replaced bext chunk in place");
                return Ok(PatchOutcome::InPlace);
            }
        }
    }

    debug!(path = %path.display(), "rewriting file with new metadata");
    copy_with_metadata(path, metadata)?;
    Ok(PatchOutcome::Rewritten)
}

/// Overwrites the `bext` chunk described by `chunk` if the encoded metadata
/// fits in its declared length.
///
/// The caller must make sure the declared chunk lies inside the stream.
///
/// Any part of the chunk the new block does not cover is zeroed and the
/// stream position is restored afterwards. Returns `false` without touching
/// the stream when the block is too large or encodes to nothing.
pub fn write_broadcast_in_place<W: OutputStream>(
    out: &mut W,
    chunk: &ChunkDescriptor,
    metadata: &MetadataMap,
) -> Result<bool> {
    let Some(mut block) = BroadcastMetadata::from_map(metadata).encode() else {
        return Ok(false);
    };
    let reserved = chunk.data_length as usize;
    if block.len() > reserved {
        debug!(
            needed = block.len(),
            reserved, "new bext block does not fit existing chunk"
        );
        return Ok(false);
    }
    block.resize(reserved, 0);

    let position = out.tell()?;
    out.seek_to(chunk.data_offset)?;
    out.write_bytes(&block)?;
    out.seek_to(position)?;
    out.flush_bytes()?;
    Ok(true)
}

/// Re-encodes `path` with `metadata` via a temporary sibling file that is
/// renamed over the original on success and removed on failure.
pub fn copy_with_metadata(path: &Path, metadata: &MetadataMap) -> Result<()> {
    let temp_file = nonexistent_sibling(path)?;

    let result = copy_into(path, &temp_file, metadata).and_then(|_| {
        fs::rename(&temp_file, path)?;
        Ok(())
    });

    if let Err(e) = &result {
        warn!(path = %path.display(), error = %e, "metadata rewrite failed, original left untouched");
        let _ = fs::remove_file(&temp_file);
    }
    result
}

fn copy_into(source: &Path, dest: &Path, metadata: &MetadataMap) -> Result<()> {
    let mut reader = WavReader::new(BufReader::new(File::open(source)?))?;
    let out = BufWriter::new(File::create_new(dest)?);

    let mut writer = WavWriter::new(out, WriterConfig::from_format(reader.format()), metadata)?;
    writer.write_from_reader(&mut reader, 0, None)?;
    let out = writer.finalize()?;

    let file = out.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// A path next to `path` that does not exist yet.
fn nonexistent_sibling(path: &Path) -> Result<PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "wav".to_string());

    for _ in 0..SIBLING_ATTEMPTS {
        let candidate = parent.join(format!("{}_{:08x}.{}", stem, rand::random::<u32>(), extension));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(WavError::InvalidArgument(format!(
        "no free temporary name next to {}",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{BWAV_DESCRIPTION, create_bwav_metadata};
    use std::io::Cursor;

    fn chunk(data_offset: u64, data_length: u32) -> ChunkDescriptor {
        ChunkDescriptor {
            tag: *b"bext",
            data_offset,
            data_length,
        }
    }

    #[test]
    fn test_in_place_zeroes_remainder_and_restores_position() {
        let mut out = Cursor::new(vec![0xaau8; 1000]);
        OutputStream::seek_to(&mut out, 900).unwrap();

        let metadata = create_bwav_metadata("short", "", "", "", "", 0, "");
        assert!(write_broadcast_in_place(&mut out, &chunk(8, 700), &metadata).unwrap());

        assert_eq!(OutputStream::tell(&mut out).unwrap(), 900);
        let bytes = out.into_inner();
        assert_eq!(bytes.len(), 1000);
        assert_eq!(&bytes[..8], &[0xaau8; 8]);
        assert_eq!(&bytes[8..13], b"short");
        assert!(bytes[13..708].iter().all(|&b| b == 0));
        assert!(bytes[708..].iter().all(|&b| b == 0xaa));
    }

    #[test]
    fn test_in_place_refuses_oversized_or_empty_block() {
        let mut out = Cursor::new(vec![0xaau8; 700]);
        let long = create_bwav_metadata("", "", "", "", "", 0, &"h".repeat(200));
        assert!(!write_broadcast_in_place(&mut out, &chunk(0, 604), &long).unwrap());

        let mut empty = MetadataMap::new();
        empty.insert(BWAV_DESCRIPTION.to_string(), String::new());
        assert!(!write_broadcast_in_place(&mut out, &chunk(0, 604), &empty).unwrap());

        assert!(out.into_inner().iter().all(|&b| b == 0xaa));
    }

    #[test]
    fn test_sibling_is_fresh_and_alongside() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("take.wav");
        let sibling = nonexistent_sibling(&original).unwrap();
        assert_eq!(sibling.parent(), Some(dir.path()));
        assert_eq!(sibling.extension().unwrap(), "wav");
        assert!(!sibling.exists());
    }
}
