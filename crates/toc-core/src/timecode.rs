//! Scene timestamp parsing
//!
//! Manifests annotate scenes with display ranges such as `"00:08-00:16"` or
//! `"01:02:03-01:02:09"`. Generation only needs the length of that range.

use crate::error::{Result, TocError};

/// Parse `MM:SS` or `HH:MM:SS` into whole seconds
pub fn parse_timecode(s: &str) -> Result<u32> {
    let unsupported = || TocError::Manifest(format!("Unsupported timecode: {}", s.trim()));
    let parts: Vec<&str> = s.trim().split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(unsupported());
    }
    let mut total: u32 = 0;
    for part in parts {
        let value = part.trim().parse::<u32>().map_err(|_| unsupported())?;
        total = total
            .checked_mul(60)
            .and_then(|t| t.checked_add(value))
            .ok_or_else(unsupported)?;
    }
    Ok(total)
}

/// Duration of a `start-end` range in seconds.
///
/// Anything unparseable, or a range whose end is not after its start, yields
/// `default_seconds` instead of an error.
pub fn duration_from_timestamp_range(range: Option<&str>, default_seconds: u32) -> u32 {
    let Some(range) = range else {
        return default_seconds;
    };
    let raw = range.trim().trim_matches('"').trim_matches('\'');
    let Some((start, end)) = raw.split_once('-') else {
        return default_seconds;
    };
    match (parse_timecode(start), parse_timecode(end)) {
        (Ok(start), Ok(end)) if end > start => end - start,
        _ => default_seconds,
    }
}
