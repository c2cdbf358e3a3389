//! RIFF chunk walking.
//!
//! [`walk_chunks`] validates the outer `RIFF....WAVE` header and visits every
//! sub-chunk in order. Chunks a [`ChunkHandler`] claims are dispatched to it
//! with the stream positioned at the chunk data; everything else is skipped.
//! After each chunk the walker seeks to the padded chunk end itself, so a
//! handler that reads less (or more) than the declared length cannot
//! desynchronise the walk.

use crate::prelude::*;

/// A four-character RIFF chunk code.
pub type ChunkId = [u8; 4];

// Chunk Identifiers
pub const RIFF_CHUNK_ID: &ChunkId = b"RIFF";
pub const WAVE_FORMAT_ID: &ChunkId = b"WAVE";
pub const FMT_CHUNK_ID: &ChunkId = b"fmt ";
pub const DATA_CHUNK_ID: &ChunkId = b"data";
pub const BEXT_CHUNK_ID: &ChunkId = b"bext";
pub const SMPL_CHUNK_ID: &ChunkId = b"smpl";

// Chunk Structures
pub const CHUNK_HEADER_SIZE: u64 = 8; // id + size
pub const RIFF_HEADER_SIZE: u64 = 12; // RIFF + size + WAVE

const READ_STEP: usize = 64 * 1024;

/// Location of one sub-chunk inside the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub tag: ChunkId,
    /// Absolute offset of the first data byte (just past the 8-byte header).
    pub data_offset: u64,
    /// Declared data length, excluding the pad byte.
    pub data_length: u32,
}

impl ChunkDescriptor {
    /// Offset of the next chunk header, honouring RIFF word alignment.
    pub fn padded_end(&self) -> u64 {
        let length = self.data_length as u64;
        self.data_offset + length + (length & 1)
    }

    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }
}

/// Receives the chunks it registers interest in during a walk.
pub trait ChunkHandler {
    fn handles(&self, tag: &ChunkId) -> bool;

    /// Called with `input` positioned at `chunk.data_offset`.
    fn handle<S: InputStream>(&mut self, chunk: &ChunkDescriptor, input: &mut S) -> Result<()>;
}

/// Walks every sub-chunk of a RIFF/WAVE stream starting at its current position.
///
/// Returns the descriptors of all chunks seen, handled or not. The walk ends
/// without error at the outer chunk's declared end, at the end of the stream,
/// on a truncated chunk header, or on a zero-length unclaimed chunk (which
/// would otherwise never advance).
pub fn walk_chunks<S, H>(input: &mut S, handler: &mut H) -> Result<Vec<ChunkDescriptor>>
where
    S: InputStream,
    H: ChunkHandler,
{
    let mut header = [0u8; RIFF_HEADER_SIZE as usize];
    let got = input.read_bytes(&mut header)?;
    if got < header.len() || &header[0..4] != RIFF_CHUNK_ID {
        return Err(WavError::MalformedContainer(
            "missing RIFF signature".to_string(),
        ));
    }
    if &header[8..12] != WAVE_FORMAT_ID {
        return Err(WavError::MalformedContainer(format!(
            "form type is '{}', expected 'WAVE'",
            String::from_utf8_lossy(&header[8..12])
        )));
    }

    let riff_length = LittleEndian::read_u32(&header[4..8]) as u64;
    // The declared length counts from just after the size field.
    let end = input.tell()? - 4 + riff_length;

    let mut chunks = Vec::new();
    while input.tell()? < end && !input.is_exhausted()? {
        let mut chunk_header = [0u8; CHUNK_HEADER_SIZE as usize];
        if input.read_bytes(&mut chunk_header)? < chunk_header.len() {
            debug!("trailing bytes shorter than a chunk header, stopping");
            break;
        }

        let mut tag = [0u8; 4];
        tag.copy_from_slice(&chunk_header[0..4]);
        let chunk = ChunkDescriptor {
            tag,
            data_offset: input.tell()?,
            data_length: LittleEndian::read_u32(&chunk_header[4..8]),
        };
        let chunk_end = chunk.padded_end();
        chunks.push(chunk);

        if handler.handles(&chunk.tag) {
            debug!(
                tag = %chunk.tag_str(),
                offset = chunk.data_offset,
                length = chunk.data_length,
                "dispatching chunk"
            );
            handler.handle(&chunk, input)?;
        } else if chunk_end <= chunk.data_offset {
            debug!(tag = %chunk.tag_str(), "zero-length chunk, stopping walk");
            break;
        } else {
            debug!(tag = %chunk.tag_str(), length = chunk.data_length, "skipping chunk");
        }

        input.seek_to(chunk_end)?;
    }

    Ok(chunks)
}

/// Reads a chunk body of at most its declared length.
///
/// The buffer grows in bounded steps, so a garbage length on a short stream
/// cannot force a huge allocation; a stream that ends early yields the bytes
/// that were actually present.
pub fn read_chunk_body<S: InputStream>(input: &mut S, chunk: &ChunkDescriptor) -> Result<Vec<u8>> {
    let declared = chunk.data_length as usize;
    let mut body = Vec::new();

    while body.len() < declared {
        let start = body.len();
        let step = READ_STEP.min(declared - start);
        body.resize(start + step, 0);
        let got = input.read_bytes(&mut body[start..])?;
        body.truncate(start + got);
        if got < step {
            warn!(
                tag = %chunk.tag_str(),
                declared = chunk.data_length,
                available = body.len(),
                "chunk runs past end of stream"
            );
            break;
        }
    }

    Ok(body)
}

/// Appends a complete chunk (header, body, pad byte) to `out`.
pub fn write_chunk<W: Write>(out: &mut W, id: &ChunkId, data: &[u8]) -> Result<()> {
    out.write_all(id)?;
    out.write_u32::<LittleEndian>(data.len() as u32)?;
    out.write_all(data)?;
    if data.len() % 2 == 1 {
        out.write_all(&[0])?; // padding
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn riff(chunks: &[(&ChunkId, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(WAVE_FORMAT_ID);
        for (id, data) in chunks {
            write_chunk(&mut body, id, data).unwrap();
        }
        let mut out = Vec::new();
        out.extend_from_slice(RIFF_CHUNK_ID);
        out.write_u32::<LittleEndian>(body.len() as u32).unwrap();
        out.extend_from_slice(&body);
        out
    }

    /// Records what it sees and deliberately reads only one byte of each chunk.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<(ChunkId, u8)>,
    }

    impl ChunkHandler for Recorder {
        fn handles(&self, tag: &ChunkId) -> bool {
            tag == b"aaaa" || tag == b"bbbb"
        }

        fn handle<S: InputStream>(&mut self, chunk: &ChunkDescriptor, input: &mut S) -> Result<()> {
            let mut first = [0u8; 1];
            input.read_bytes(&mut first)?;
            self.seen.push((chunk.tag, first[0]));
            Ok(())
        }
    }

    #[test]
    fn test_walk_dispatches_and_skips() {
        let bytes = riff(&[
            (b"aaaa", &[1u8, 2, 3][..]),
            (b"junk", &[9u8; 10][..]),
            (b"bbbb", &[7u8, 8][..]),
        ]);
        let mut recorder = Recorder::default();
        let chunks = walk_chunks(&mut Cursor::new(bytes), &mut recorder).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(recorder.seen, vec![(*b"aaaa", 1), (*b"bbbb", 7)]);
    }

    #[test]
    fn test_walk_honours_odd_length_padding() {
        let bytes = riff(&[(b"aaaa", &[5u8][..]), (b"bbbb", &[6u8][..])]);
        let mut recorder = Recorder::default();
        let chunks = walk_chunks(&mut Cursor::new(bytes), &mut recorder).unwrap();

        assert_eq!(chunks[0].data_offset, 20);
        assert_eq!(chunks[0].padded_end(), 22);
        assert_eq!(chunks[1].data_offset, 30);
        assert_eq!(recorder.seen.len(), 2);
    }

    #[test]
    fn test_walk_rejects_bad_signatures() {
        let mut recorder = Recorder::default();
        let mut not_riff = riff(&[]);
        not_riff[0..4].copy_from_slice(b"RIFX");
        assert!(matches!(
            walk_chunks(&mut Cursor::new(not_riff), &mut recorder),
            Err(WavError::MalformedContainer(_))
        ));

        let mut not_wave = riff(&[]);
        not_wave[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(
            walk_chunks(&mut Cursor::new(not_wave), &mut recorder),
            Err(WavError::MalformedContainer(_))
        ));

        assert!(walk_chunks(&mut Cursor::new(b"RIF".to_vec()), &mut recorder).is_err());
    }

    #[test]
    fn test_zero_length_unknown_chunk_ends_walk() {
        let bytes = riff(&[(b"aaaa", &[1u8][..]), (b"zero", &[][..]), (b"bbbb", &[2u8][..])]);
        let mut recorder = Recorder::default();
        let chunks = walk_chunks(&mut Cursor::new(bytes), &mut recorder).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(recorder.seen, vec![(*b"aaaa", 1)]);
    }

    #[test]
    fn test_walk_stops_at_declared_riff_end() {
        let mut bytes = riff(&[(b"aaaa", &[1u8, 1][..])]);
        // trailing chunk outside the declared RIFF length
        write_chunk(&mut bytes, b"bbbb", &[3u8, 3]).unwrap();
        let mut recorder = Recorder::default();
        walk_chunks(&mut Cursor::new(bytes), &mut recorder).unwrap();

        assert_eq!(recorder.seen, vec![(*b"aaaa", 1)]);
    }

    #[test]
    fn test_walk_survives_truncated_tail() {
        let mut bytes = riff(&[(b"aaaa", &[1u8, 1][..])]);
        let declared = LittleEndian::read_u32(&bytes[4..8]) + 100;
        LittleEndian::write_u32(&mut bytes[4..8], declared);
        bytes.extend_from_slice(b"bbb"); // partial header
        let mut recorder = Recorder::default();
        let chunks = walk_chunks(&mut Cursor::new(bytes), &mut recorder).unwrap();

        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_read_chunk_body_clips_to_stream() {
        let mut input = Cursor::new(vec![4u8; 10]);
        let chunk = ChunkDescriptor {
            tag: *b"test",
            data_offset: 0,
            data_length: 1_000_000,
        };
        let body = read_chunk_body(&mut input, &chunk).unwrap();
        assert_eq!(body.len(), 10);
    }
}
