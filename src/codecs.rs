use crate::prelude::*;
mod wav;
pub use wav::WavCodec;

pub fn get_codec(file_path: &str) -> Result<Box<dyn Codec>> {
    let extension = std::path::Path::new(file_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| WavError::InvalidArgument(format!("no file extension: {}", file_path)))?;

    match extension.to_lowercase().as_str() {
        "wav" | "bwf" => Ok(Box::new(WavCodec)),
        _ => Err(WavError::InvalidArgument(format!(
            "No codec found for extension: {}",
            extension
        ))),
    }
}

/// Summary of a file, as shown by `wavcodex info`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub sample_rate: f64,
    pub channels: u16,
    pub bit_depth: u16,
    pub floating_point: bool,
    pub frames: u64,
    pub duration: String,
    pub description: String,
}

/// Format-level capabilities and file entry points.
pub trait Codec: Send + Sync {
    fn format_name(&self) -> &'static str;

    fn file_extensions(&self) -> &'static [&'static str];

    fn possible_sample_rates(&self) -> &'static [u32];

    fn possible_bit_depths(&self) -> &'static [u16];

    fn can_do_mono(&self) -> bool;

    fn can_do_stereo(&self) -> bool;

    fn can_handle_file(&self, file_path: &str) -> bool {
        std::path::Path::new(file_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.file_extensions()
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    fn validate_file_format(&self, data: &[u8]) -> Result<()>;

    fn get_file_info(&self, file_path: &str) -> Result<FileInfo>;

    fn read_metadata(&self, file_path: &str) -> Result<MetadataMap>;

    fn replace_metadata_in_file(
        &self,
        file_path: &str,
        metadata: &MetadataMap,
    ) -> Result<crate::patch::PatchOutcome>;
}
