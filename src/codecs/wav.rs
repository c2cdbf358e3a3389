use crate::chunk::{RIFF_CHUNK_ID, RIFF_HEADER_SIZE, WAVE_FORMAT_ID};
use crate::codecs::{Codec, FileInfo};
use crate::metadata::{self, BWAV_DESCRIPTION};
use crate::patch::{self, PatchOutcome};
use crate::prelude::*;
use crate::reader::WavReader;
use crate::writer::{WavWriter, WriterConfig};
use std::fs::File;
use std::io::{BufReader, BufWriter};

const WAV_FORMAT_NAME: &str = "WAV file";
const WAV_EXTENSIONS: [&str; 2] = ["wav", "bwf"];
const WAV_SAMPLE_RATES: [u32; 8] = [22050, 32000, 44100, 48000, 88200, 96000, 176400, 192000];
const WAV_BIT_DEPTHS: [u16; 4] = [8, 16, 24, 32];

pub struct WavCodec;

impl WavCodec {
    pub fn create_reader<R: InputStream>(&self, input: R) -> Result<WavReader<R>> {
        WavReader::new(input)
    }

    pub fn create_writer<W: OutputStream>(
        &self,
        output: W,
        config: WriterConfig,
        metadata: &MetadataMap,
    ) -> Result<WavWriter<W>> {
        WavWriter::new(output, config, metadata)
    }

    pub fn open_file(&self, file_path: &str) -> Result<WavReader<BufReader<File>>> {
        self.create_reader(BufReader::new(File::open(file_path)?))
    }

    pub fn create_file(
        &self,
        file_path: &str,
        config: WriterConfig,
        metadata: &MetadataMap,
    ) -> Result<WavWriter<BufWriter<File>>> {
        self.create_writer(BufWriter::new(File::create(file_path)?), config, metadata)
    }
}

impl Codec for WavCodec {
    fn format_name(&self) -> &'static str {
        WAV_FORMAT_NAME
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &WAV_EXTENSIONS
    }

    fn possible_sample_rates(&self) -> &'static [u32] {
        &WAV_SAMPLE_RATES
    }

    fn possible_bit_depths(&self) -> &'static [u16] {
        &WAV_BIT_DEPTHS
    }

    fn can_do_mono(&self) -> bool {
        true
    }

    fn can_do_stereo(&self) -> bool {
        true
    }

    fn validate_file_format(&self, data: &[u8]) -> Result<()> {
        if data.len() < RIFF_HEADER_SIZE as usize {
            return Err(WavError::MalformedContainer(
                "File too small to be a valid WAV".to_string(),
            ));
        }

        // Check for 'RIFF....WAVE' header
        if &data[0..4] != RIFF_CHUNK_ID || &data[8..12] != WAVE_FORMAT_ID {
            return Err(WavError::MalformedContainer(
                "Missing RIFF/WAVE signature".to_string(),
            ));
        }

        Ok(())
    }

    fn get_file_info(&self, file_path: &str) -> Result<FileInfo> {
        let size = std::fs::metadata(file_path)?.len();
        let reader = self.open_file(file_path)?;
        let format = reader.format();

        let frames = reader.frame_count();
        let duration = format_duration(frames as f64 / format.sample_rate);

        Ok(FileInfo {
            path: file_path.to_string(),
            size,
            sample_rate: format.sample_rate,
            channels: format.channel_count,
            bit_depth: format.bits_per_sample,
            floating_point: format.is_floating_point,
            frames,
            duration,
            description: metadata::get_field(reader.metadata(), BWAV_DESCRIPTION).to_string(),
        })
    }

    fn read_metadata(&self, file_path: &str) -> Result<MetadataMap> {
        Ok(self.open_file(file_path)?.metadata().clone())
    }

    fn replace_metadata_in_file(&self, file_path: &str, metadata: &MetadataMap) -> Result<PatchOutcome> {
        patch::replace_metadata_in_file(file_path, metadata)
    }
}

fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "Unknown".to_string();
    }
    let total_ms = (seconds * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let milliseconds = total_ms % 1000;

    if hours > 0 {
        format!("{}:{:02}:{:02}.{:03}", hours, minutes, secs, milliseconds)
    } else {
        format!("{}:{:02}.{:03}", minutes, secs, milliseconds)
    }
}
