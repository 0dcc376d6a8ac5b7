//! toc Core - Foundational types for the manifest-driven video pipeline
//!
//! This crate provides what every other toc crate depends on:
//! - `TocError` and the `Result` alias
//! - Timecode parsing for scene timestamp ranges

mod error;
pub mod timecode;

pub use error::{Result, TocError};
pub use timecode::{duration_from_timestamp_range, parse_timecode};
