//! Sampler (`smpl`) chunk codec.
//!
//! Nine little-endian `u32` globals are followed by a table of 24-byte loop
//! records. The declared loop count is not trusted: a record is decoded only
//! when it lies entirely inside the chunk body.

use crate::prelude::*;

pub const SMPL_HEADER_SIZE: usize = 36;
pub const SMPL_LOOP_SIZE: usize = 24;

// Metadata keys
pub const SMPL_MANUFACTURER: &str = "Manufacturer";
pub const SMPL_PRODUCT: &str = "Product";
pub const SMPL_SAMPLE_PERIOD: &str = "SamplePeriod";
pub const SMPL_MIDI_UNITY_NOTE: &str = "MidiUnityNote";
pub const SMPL_MIDI_PITCH_FRACTION: &str = "MidiPitchFraction";
pub const SMPL_SMPTE_FORMAT: &str = "SmpteFormat";
pub const SMPL_SMPTE_OFFSET: &str = "SmpteOffset";
pub const SMPL_NUM_SAMPLE_LOOPS: &str = "NumSampleLoops";
pub const SMPL_SAMPLER_DATA: &str = "SamplerData";

pub const SMPL_KEYS: [&str; 9] = [
    SMPL_MANUFACTURER,
    SMPL_PRODUCT,
    SMPL_SAMPLE_PERIOD,
    SMPL_MIDI_UNITY_NOTE,
    SMPL_MIDI_PITCH_FRACTION,
    SMPL_SMPTE_FORMAT,
    SMPL_SMPTE_OFFSET,
    SMPL_NUM_SAMPLE_LOOPS,
    SMPL_SAMPLER_DATA,
];

/// One loop record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleLoop {
    pub identifier: u32,
    pub loop_type: u32,
    pub start: u32,
    pub end: u32,
    pub fraction: u32,
    pub play_count: u32,
}

impl SampleLoop {
    fn decode(record: &[u8]) -> Self {
        Self {
            identifier: LittleEndian::read_u32(&record[0..4]),
            loop_type: LittleEndian::read_u32(&record[4..8]),
            start: LittleEndian::read_u32(&record[8..12]),
            end: LittleEndian::read_u32(&record[12..16]),
            fraction: LittleEndian::read_u32(&record[16..20]),
            play_count: LittleEndian::read_u32(&record[20..24]),
        }
    }

    fn fields(&self) -> [(&'static str, u32); 6] {
        [
            ("Identifier", self.identifier),
            ("Type", self.loop_type),
            ("Start", self.start),
            ("End", self.end),
            ("Fraction", self.fraction),
            ("PlayCount", self.play_count),
        ]
    }
}

/// Decoded contents of a `smpl` chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleLoopTable {
    pub manufacturer: u32,
    pub product: u32,
    pub sample_period: u32,
    pub midi_unity_note: u32,
    pub midi_pitch_fraction: u32,
    pub smpte_format: u32,
    pub smpte_offset: u32,
    /// Loop count as stored in the chunk, which may exceed `loops.len()`.
    pub declared_loop_count: u32,
    pub sampler_data: u32,
    pub loops: Vec<SampleLoop>,
}

impl SampleLoopTable {
    /// Decodes a chunk body. A body shorter than the globals reads as if
    /// zero-padded; loops are kept only while they fit inside `body`.
    pub fn decode(body: &[u8]) -> Self {
        let mut globals = [0u8; SMPL_HEADER_SIZE];
        let available = body.len().min(SMPL_HEADER_SIZE);
        globals[..available].copy_from_slice(&body[..available]);

        let mut values = [0u32; 9];
        LittleEndian::read_u32_into(&globals, &mut values);
        let [
            manufacturer,
            product,
            sample_period,
            midi_unity_note,
            midi_pitch_fraction,
            smpte_format,
            smpte_offset,
            declared_loop_count,
            sampler_data,
        ] = values;

        let mut loops = Vec::new();
        for i in 0..declared_loop_count as usize {
            let start = SMPL_HEADER_SIZE + i * SMPL_LOOP_SIZE;
            let end = start + SMPL_LOOP_SIZE;
            if end > body.len() {
                warn!(
                    declared = declared_loop_count,
                    present = i,
                    "sampler chunk declares more loops than it holds"
                );
                break;
            }
            loops.push(SampleLoop::decode(&body[start..end]));
        }

        Self {
            manufacturer,
            product,
            sample_period,
            midi_unity_note,
            midi_pitch_fraction,
            smpte_format,
            smpte_offset,
            declared_loop_count,
            sampler_data,
            loops,
        }
    }

    /// Encodes the chunk body. The stored loop count is the number of loops
    /// actually written.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(SMPL_HEADER_SIZE + self.loops.len() * SMPL_LOOP_SIZE);
        let globals = [
            self.manufacturer,
            self.product,
            self.sample_period,
            self.midi_unity_note,
            self.midi_pitch_fraction,
            self.smpte_format,
            self.smpte_offset,
            self.loops.len() as u32,
            self.sampler_data,
        ];
        for value in globals {
            // Vec<u8> writes cannot fail
            let _ = data.write_u32::<LittleEndian>(value);
        }
        for sample_loop in &self.loops {
            for (_, value) in sample_loop.fields() {
                let _ = data.write_u32::<LittleEndian>(value);
            }
        }
        data
    }

    /// Stores the globals and every decoded loop under the sampler keys.
    pub fn copy_to(&self, map: &mut MetadataMap) {
        let globals = [
            (SMPL_MANUFACTURER, self.manufacturer),
            (SMPL_PRODUCT, self.product),
            (SMPL_SAMPLE_PERIOD, self.sample_period),
            (SMPL_MIDI_UNITY_NOTE, self.midi_unity_note),
            (SMPL_MIDI_PITCH_FRACTION, self.midi_pitch_fraction),
            (SMPL_SMPTE_FORMAT, self.smpte_format),
            (SMPL_SMPTE_OFFSET, self.smpte_offset),
            (SMPL_NUM_SAMPLE_LOOPS, self.declared_loop_count),
            (SMPL_SAMPLER_DATA, self.sampler_data),
        ];
        for (key, value) in globals {
            map.insert(key.to_string(), value.to_string());
        }

        for (i, sample_loop) in self.loops.iter().enumerate() {
            for (field, value) in sample_loop.fields() {
                map.insert(loop_key(i, field), value.to_string());
            }
        }
    }

    /// Builds a table from the sampler keys, or `None` when the map carries
    /// none of them. Loops are collected from index 0 up to `NumSampleLoops`,
    /// stopping at the first index without an identifier entry.
    pub fn from_map(map: &MetadataMap) -> Option<Self> {
        let has_globals = SMPL_KEYS.iter().any(|key| map.contains_key(*key));
        if !has_globals && !map.contains_key(&loop_key(0, "Identifier")) {
            return None;
        }

        let number = |key: &str| crate::metadata::get_number::<u32>(map, key);
        let declared = number(SMPL_NUM_SAMPLE_LOOPS);

        let mut loops = Vec::new();
        for i in 0.. {
            if (has_globals && i >= declared as usize) || !map.contains_key(&loop_key(i, "Identifier")) {
                break;
            }
            loops.push(SampleLoop {
                identifier: number(&loop_key(i, "Identifier")),
                loop_type: number(&loop_key(i, "Type")),
                start: number(&loop_key(i, "Start")),
                end: number(&loop_key(i, "End")),
                fraction: number(&loop_key(i, "Fraction")),
                play_count: number(&loop_key(i, "PlayCount")),
            });
        }

        Some(Self {
            manufacturer: number(SMPL_MANUFACTURER),
            product: number(SMPL_PRODUCT),
            sample_period: number(SMPL_SAMPLE_PERIOD),
            midi_unity_note: number(SMPL_MIDI_UNITY_NOTE),
            midi_pitch_fraction: number(SMPL_MIDI_PITCH_FRACTION),
            smpte_format: number(SMPL_SMPTE_FORMAT),
            smpte_offset: number(SMPL_SMPTE_OFFSET),
            declared_loop_count: loops.len() as u32,
            sampler_data: number(SMPL_SAMPLER_DATA),
            loops,
        })
    }
}

/// `Loop{index}{field}`, e.g. `Loop0Start`.
pub fn loop_key(index: usize, field: &str) -> String {
    format!("Loop{}{}", index, field)
}
