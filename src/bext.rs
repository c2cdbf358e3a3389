//! Broadcast Wave `bext` chunk codec.
//!
//! Layout (all offsets in bytes, integers little-endian):
//!
//! | offset | size | field            |
//! |-------:|-----:|------------------|
//! |      0 |  256 | description      |
//! |    256 |   32 | originator       |
//! |    288 |   32 | originator ref   |
//! |    320 |   10 | origination date |
//! |    330 |    8 | origination time |
//! |    338 |    4 | time ref (low)   |
//! |    342 |    4 | time ref (high)  |
//! |    346 |    2 | version          |
//! |    348 |   64 | UMID             |
//! |    412 |  190 | reserved         |
//! |    602 |  ... | coding history   |

use crate::metadata::{self, *};
use crate::prelude::*;

const DESCRIPTION: (usize, usize) = (0, 256);
const ORIGINATOR: (usize, usize) = (256, 32);
const ORIGINATOR_REF: (usize, usize) = (288, 32);
const ORIGINATION_DATE: (usize, usize) = (320, 10);
const ORIGINATION_TIME: (usize, usize) = (330, 8);
const TIME_REFERENCE_LOW: usize = 338;
const TIME_REFERENCE_HIGH: usize = 342;
const VERSION: usize = 346;

/// Size of the fixed part that precedes the coding history.
pub const BEXT_FIXED_SIZE: usize = 602;

/// Decoded contents of a `bext` chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastMetadata {
    pub description: String,
    pub originator: String,
    pub originator_ref: String,
    pub origination_date: String,
    pub origination_time: String,
    pub time_reference: u64,
    pub version: u16,
    pub coding_history: String,
}

impl BroadcastMetadata {
    /// Decodes a chunk body. Bodies shorter than the fixed layout read as if
    /// zero-padded.
    pub fn decode(body: &[u8]) -> Self {
        let mut data = body.to_vec();
        if data.len() < BEXT_FIXED_SIZE {
            data.resize(BEXT_FIXED_SIZE, 0);
        }

        let low = LittleEndian::read_u32(&data[TIME_REFERENCE_LOW..TIME_REFERENCE_LOW + 4]) as u64;
        let high = LittleEndian::read_u32(&data[TIME_REFERENCE_HIGH..TIME_REFERENCE_HIGH + 4]) as u64;

        Self {
            description: read_slot(&data, DESCRIPTION),
            originator: read_slot(&data, ORIGINATOR),
            originator_ref: read_slot(&data, ORIGINATOR_REF),
            origination_date: read_slot(&data, ORIGINATION_DATE),
            origination_time: read_slot(&data, ORIGINATION_TIME),
            time_reference: (high << 32) | low,
            version: LittleEndian::read_u16(&data[VERSION..VERSION + 2]),
            coding_history: read_slot(&data, (BEXT_FIXED_SIZE, data.len() - BEXT_FIXED_SIZE)),
        }
    }

    /// True when no field carries information worth writing. The originator
    /// reference and version alone do not count.
    pub fn is_empty(&self) -> bool {
        self.description.is_empty()
            && self.originator.is_empty()
            && self.origination_date.is_empty()
            && self.origination_time.is_empty()
            && self.coding_history.is_empty()
            && self.time_reference == 0
    }

    /// Encodes the chunk body, or returns `None` when every field is empty so
    /// the caller can leave the chunk out.
    ///
    /// The buffer holds the fixed part, the coding history and its NUL,
    /// rounded up to a multiple of four. Each slot write also stores a NUL
    /// terminator in the byte after the text, which may be the first byte of
    /// the next slot; the next write then overwrites it. Fields must therefore
    /// be written in slot order into a zeroed buffer.
    pub fn encode(&self) -> Option<Vec<u8>> {
        if self.is_empty() {
            return None;
        }

        let history = utf8_prefix(&self.coding_history, usize::MAX);
        let size = (BEXT_FIXED_SIZE + history.len() + 1 + 3) & !3;
        let mut data = vec![0u8; size];

        write_slot(&mut data, DESCRIPTION, &self.description);
        write_slot(&mut data, ORIGINATOR, &self.originator);
        write_slot(&mut data, ORIGINATOR_REF, &self.originator_ref);
        write_slot(&mut data, ORIGINATION_DATE, &self.origination_date);
        write_slot(&mut data, ORIGINATION_TIME, &self.origination_time);

        LittleEndian::write_u32(
            &mut data[TIME_REFERENCE_LOW..TIME_REFERENCE_LOW + 4],
            (self.time_reference & 0xffff_ffff) as u32,
        );
        LittleEndian::write_u32(
            &mut data[TIME_REFERENCE_HIGH..TIME_REFERENCE_HIGH + 4],
            (self.time_reference >> 32) as u32,
        );
        LittleEndian::write_u16(&mut data[VERSION..VERSION + 2], self.version);

        data[BEXT_FIXED_SIZE..BEXT_FIXED_SIZE + history.len()].copy_from_slice(history);

        Some(data)
    }

    /// Reads the `bwav *` keys; missing keys are empty, the time reference
    /// defaults to zero.
    pub fn from_map(map: &MetadataMap) -> Self {
        Self {
            description: metadata::get_field(map, BWAV_DESCRIPTION).to_string(),
            originator: metadata::get_field(map, BWAV_ORIGINATOR).to_string(),
            originator_ref: metadata::get_field(map, BWAV_ORIGINATOR_REF).to_string(),
            origination_date: metadata::get_field(map, BWAV_ORIGINATION_DATE).to_string(),
            origination_time: metadata::get_field(map, BWAV_ORIGINATION_TIME).to_string(),
            time_reference: metadata::get_number(map, BWAV_TIME_REFERENCE),
            version: 0,
            coding_history: metadata::get_field(map, BWAV_CODING_HISTORY).to_string(),
        }
    }

    /// Stores every field under its `bwav *` key.
    pub fn copy_to(&self, map: &mut MetadataMap) {
        map.insert(BWAV_DESCRIPTION.to_string(), self.description.clone());
        map.insert(BWAV_ORIGINATOR.to_string(), self.originator.clone());
        map.insert(BWAV_ORIGINATOR_REF.to_string(), self.originator_ref.clone());
        map.insert(BWAV_ORIGINATION_DATE.to_string(), self.origination_date.clone());
        map.insert(BWAV_ORIGINATION_TIME.to_string(), self.origination_time.clone());
        map.insert(BWAV_TIME_REFERENCE.to_string(), self.time_reference.to_string());
        map.insert(BWAV_CODING_HISTORY.to_string(), self.coding_history.clone());
    }
}

/// Text of a fixed slot up to its first NUL.
fn read_slot(data: &[u8], (offset, width): (usize, usize)) -> String {
    let slot = &data[offset..offset + width];
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    String::from_utf8_lossy(&slot[..end]).into_owned()
}

/// Writes `text` (truncated to `width` bytes on a char boundary) followed by
/// a NUL, which lands at most one byte past the slot.
fn write_slot(data: &mut [u8], (offset, width): (usize, usize), text: &str) {
    let bytes = utf8_prefix(text, width);
    data[offset..offset + bytes.len()].copy_from_slice(bytes);
    data[offset + bytes.len()] = 0;
}

fn utf8_prefix(text: &str, max: usize) -> &[u8] {
    let mut end = text.len().min(max);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text.as_bytes()[..end]
}
