//! String-keyed metadata maps exchanged with callers.
//!
//! Readers populate a [`MetadataMap`] from the `bext` and `smpl` chunks;
//! writers and the patch API read the same keys back. Broadcast keys are the
//! `BWAV_*` constants below; sampler keys are listed in [`crate::smpl`].

use std::collections::HashMap;

pub type MetadataMap = HashMap<String, String>;

pub const BWAV_DESCRIPTION: &str = "bwav description";
pub const BWAV_ORIGINATOR: &str = "bwav originator";
pub const BWAV_ORIGINATOR_REF: &str = "bwav originator ref";
pub const BWAV_ORIGINATION_DATE: &str = "bwav origination date";
pub const BWAV_ORIGINATION_TIME: &str = "bwav origination time";
pub const BWAV_TIME_REFERENCE: &str = "bwav time reference";
pub const BWAV_CODING_HISTORY: &str = "bwav coding history";

pub const BWAV_KEYS: [&str; 7] = [
    BWAV_DESCRIPTION,
    BWAV_ORIGINATOR,
    BWAV_ORIGINATOR_REF,
    BWAV_ORIGINATION_DATE,
    BWAV_ORIGINATION_TIME,
    BWAV_TIME_REFERENCE,
    BWAV_CODING_HISTORY,
];

/// Builds a broadcast metadata map.
///
/// `date` is expected as `YYYY-MM-DD` and `time` as `HH:MM:SS`; longer values
/// are truncated to their slot width when encoded.
pub fn create_bwav_metadata(
    description: &str,
    originator: &str,
    originator_ref: &str,
    date: &str,
    time: &str,
    time_reference_samples: u64,
    coding_history: &str,
) -> MetadataMap {
    let mut map = MetadataMap::new();
    map.insert(BWAV_DESCRIPTION.to_string(), description.to_string());
    map.insert(BWAV_ORIGINATOR.to_string(), originator.to_string());
    map.insert(BWAV_ORIGINATOR_REF.to_string(), originator_ref.to_string());
    map.insert(BWAV_ORIGINATION_DATE.to_string(), date.to_string());
    map.insert(BWAV_ORIGINATION_TIME.to_string(), time.to_string());
    map.insert(
        BWAV_TIME_REFERENCE.to_string(),
        time_reference_samples.to_string(),
    );
    map.insert(BWAV_CODING_HISTORY.to_string(), coding_history.to_string());
    map
}

/// Looks up `key`, treating a missing entry as the empty string.
pub fn get_field<'a>(map: &'a MetadataMap, key: &str) -> &'a str {
    map.get(key).map(String::as_str).unwrap_or("")
}

/// Parses an unsigned numeric field; missing or malformed values read as zero.
pub fn get_number<T: std::str::FromStr + Default>(map: &MetadataMap, key: &str) -> T {
    map.get(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_bwav_metadata_sets_every_key() {
        let map = create_bwav_metadata(
            "Kick drum",
            "wavcodex",
            "REF-1",
            "2024-03-01",
            "12:30:00",
            48000,
            "A=PCM,F=48000,W=24",
        );
        assert_eq!(map.len(), BWAV_KEYS.len());
        assert_eq!(get_field(&map, BWAV_ORIGINATION_TIME), "12:30:00");
        assert_eq!(get_number::<u64>(&map, BWAV_TIME_REFERENCE), 48000);
    }

    #[test]
    fn test_lookups_default_when_missing_or_garbage() {
        let mut map = MetadataMap::new();
        map.insert(BWAV_TIME_REFERENCE.to_string(), "soon".to_string());
        assert_eq!(get_field(&map, BWAV_DESCRIPTION), "");
        assert_eq!(get_number::<u64>(&map, BWAV_TIME_REFERENCE), 0);
    }
}
