//! toc Gen - Asset generation from video manifests
//!
//! Drives image, video and narration providers over the scenes of a prepared
//! manifest:
//! - `prepare`: asset guides, turnaround reference expansion and validation
//! - `orchestrator`: the three generation passes and dry-run planning
//! - `segment`: splitting scene lengths into provider-sized clips
//! - `media`: ffmpeg-backed re-encoding, joining and frame extraction

pub mod batch;
pub mod media;
pub mod options;
pub mod orchestrator;
pub mod prepare;
pub mod segment;
pub mod turnaround;

pub use batch::{ImageBatch, ImageRole};
pub use media::{Ffmpeg, MediaTool};
pub use options::{parse_scene_ids, GenerationOptions};
pub use orchestrator::{artifact_exists, Generator, ProviderSet, RunReport, ToolNeeds};
pub use prepare::{prepare, PreparedManifest};
pub use segment::{plan_segments, SegmentPlan};
pub use turnaround::{parse_views, View};

use std::path::{Path, PathBuf};

/// Manifest paths are relative to the base directory unless absolute
pub fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
