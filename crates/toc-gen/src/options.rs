//! Run options for a generation pass over a manifest

use crate::batch::ImageBatch;
use crate::turnaround::{View, DEFAULT_STRIP_SUFFIX};
use std::collections::HashSet;
use std::path::PathBuf;
use toc_manifest::{CharacterRefsMode, VideoMetadata};
use toc_providers::{PollSettings, TocConfig};

/// Everything that shapes a run besides the manifest and provider credentials
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Relative manifest paths resolve against this directory
    pub base_dir: PathBuf,
    /// Provider logs; `<base_dir>/logs/providers` when unset
    pub log_dir: Option<PathBuf>,
    pub force: bool,
    pub dry_run: bool,
    pub skip_images: bool,
    pub skip_videos: bool,
    pub skip_audio: bool,
    /// Only these scene ids, when set
    pub scene_ids: Option<HashSet<i64>>,

    // Asset guides and validation
    pub apply_asset_guides: bool,
    pub character_refs_mode: CharacterRefsMode,
    pub require_character_ids: bool,
    pub require_object_ids: bool,
    pub require_object_reference_scenes: bool,

    // Character turnaround
    pub character_views: Vec<View>,
    pub character_strip: bool,
    pub strip_suffix: String,
    pub prefer_strips_for_video: bool,

    pub image_batch: Option<ImageBatch>,

    // Images
    pub image_aspect_ratio: Option<String>,
    pub image_size: String,
    pub image_prompt_prefix: String,
    pub image_prompt_suffix: String,

    // Videos
    pub video_aspect_ratio: Option<String>,
    pub video_resolution: String,
    pub default_scene_seconds: u32,
    pub video_prompt_prefix: String,
    pub video_prompt_suffix: String,
    pub video_negative_prompt: String,
    pub poll: PollSettings,
    pub enable_last_frame: bool,
    pub chain_frames: bool,
    pub chain_seconds_from_end: f64,

    // Narration
    pub tts_prompt_prefix: String,
    pub tts_prompt_suffix: String,

    /// Write final prompts and redacted responses under the log dir
    pub log_prompts: bool,
}

impl GenerationOptions {
    /// Defaults, with run settings taken from the `[generation]` config table
    pub fn from_config(base_dir: impl Into<PathBuf>, config: &TocConfig) -> Self {
        let generation = &config.generation;
        Self {
            base_dir: base_dir.into(),
            log_dir: None,
            force: false,
            dry_run: false,
            skip_images: false,
            skip_videos: false,
            skip_audio: false,
            scene_ids: None,
            apply_asset_guides: false,
            character_refs_mode: CharacterRefsMode::Auto,
            require_character_ids: false,
            require_object_ids: false,
            require_object_reference_scenes: false,
            character_views: Vec::new(),
            character_strip: false,
            strip_suffix: DEFAULT_STRIP_SUFFIX.to_string(),
            prefer_strips_for_video: true,
            image_batch: None,
            image_aspect_ratio: None,
            image_size: generation.image_size().to_string(),
            image_prompt_prefix: String::new(),
            image_prompt_suffix: String::new(),
            video_aspect_ratio: None,
            video_resolution: generation.video_resolution().to_string(),
            default_scene_seconds: generation.default_scene_seconds(),
            video_prompt_prefix: String::new(),
            video_prompt_suffix: String::new(),
            video_negative_prompt: String::new(),
            poll: PollSettings {
                every: std::time::Duration::from_secs(generation.poll_every_seconds()),
                timeout: std::time::Duration::from_secs(generation.timeout_seconds()),
            },
            enable_last_frame: false,
            chain_frames: false,
            chain_seconds_from_end: 1.0,
            tts_prompt_prefix: String::new(),
            tts_prompt_suffix: String::new(),
            log_prompts: true,
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("logs").join("providers"))
    }

    pub fn includes_scene(&self, scene_id: i64) -> bool {
        self.scene_ids
            .as_ref()
            .map(|ids| ids.contains(&scene_id))
            .unwrap_or(true)
    }

    /// A strip needs all three views
    pub fn effective_views(&self) -> Vec<View> {
        if self.character_strip {
            View::ALL.to_vec()
        } else {
            self.character_views.clone()
        }
    }

    pub fn turnaround_enabled(&self) -> bool {
        self.character_strip || !self.character_views.is_empty()
    }

    /// CLI image aspect > CLI video aspect > manifest > `9:16`
    pub fn run_aspect_ratio(&self, metadata: &VideoMetadata) -> String {
        self.image_aspect_ratio
            .clone()
            .or_else(|| self.video_aspect_ratio.clone())
            .or_else(|| metadata.aspect_ratio.clone())
            .unwrap_or_else(|| "9:16".to_string())
    }
}

/// `prefix\n\nbody\n\nsuffix`, skipping blank parts
pub fn decorate(prefix: &str, body: &str, suffix: &str) -> String {
    [prefix.trim(), body.trim(), suffix.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Parse `"1, 3,5"` into scene ids
pub fn parse_scene_ids(csv: &str) -> toc_core::Result<HashSet<i64>> {
    csv.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|_| {
                toc_core::TocError::Config(format!("Invalid scene id in --scene-ids: '{}'", part))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_config() {
        let config = TocConfig::from_toml_str(
            "[generation]\nimage_size = \"4K\"\ndefault_scene_seconds = 8\npoll_every_seconds = 2\n",
        )
        .unwrap();
        let options = GenerationOptions::from_config("/ep", &config);
        assert_eq!(options.image_size, "4K");
        assert_eq!(options.default_scene_seconds, 8);
        assert_eq!(options.video_resolution, "720p");
        assert_eq!(options.poll.every, std::time::Duration::from_secs(2));
        assert_eq!(options.log_dir(), PathBuf::from("/ep/logs/providers"));
        assert!(options.log_prompts);
    }

    #[test]
    fn test_aspect_ratio_precedence() {
        let mut options = GenerationOptions::from_config("/ep", &TocConfig::default());
        let mut metadata = VideoMetadata::default();
        assert_eq!(options.run_aspect_ratio(&metadata), "9:16");
        metadata.aspect_ratio = Some("16:9".to_string());
        assert_eq!(options.run_aspect_ratio(&metadata), "16:9");
        options.video_aspect_ratio = Some("1:1".to_string());
        assert_eq!(options.run_aspect_ratio(&metadata), "1:1");
        options.image_aspect_ratio = Some("4:5".to_string());
        assert_eq!(options.run_aspect_ratio(&metadata), "4:5");
    }

    #[test]
    fn test_strip_implies_all_views() {
        let mut options = GenerationOptions::from_config("/ep", &TocConfig::default());
        assert!(!options.turnaround_enabled());
        options.character_strip = true;
        assert!(options.turnaround_enabled());
        assert_eq!(options.effective_views(), vec![View::Front, View::Side, View::Back]);
    }

    #[test]
    fn test_decorate_and_scene_ids() {
        assert_eq!(decorate(" style ", "body", ""), "style\n\nbody");
        assert_eq!(decorate("", " body ", "end"), "body\n\nend");
        assert_eq!(parse_scene_ids("1, 3,,5").unwrap(), HashSet::from([1, 3, 5]));
        assert!(parse_scene_ids("1,x").is_err());
    }
}
