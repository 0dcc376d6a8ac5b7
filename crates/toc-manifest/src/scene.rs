//! Parsed manifest records: metadata, per-scene generation blocks

use crate::guides::AssetGuides;
use serde::{Deserialize, Serialize};

/// `video_metadata` from the manifest header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub topic: Option<String>,
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
}

/// `image_generation` block of a scene or cut
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageGeneration {
    pub tool: Option<String>,
    pub prompt: Option<String>,
    pub output: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
    /// `None` when the field is absent; `Some(vec![])` for an explicit empty list
    pub character_ids: Option<Vec<String>>,
    /// Same presence semantics as `character_ids`
    pub object_ids: Option<Vec<String>>,
    pub aspect_ratio: Option<String>,
    pub image_size: Option<String>,
}

impl ImageGeneration {
    /// Character ids, empty when the field is absent
    pub fn character_ids(&self) -> &[String] {
        self.character_ids.as_deref().unwrap_or(&[])
    }

    pub fn object_ids(&self) -> &[String] {
        self.object_ids.as_deref().unwrap_or(&[])
    }
}

/// `video_generation` block of a scene or cut
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoGeneration {
    pub tool: Option<String>,
    pub input_image: Option<String>,
    pub first_frame: Option<String>,
    pub last_frame: Option<String>,
    pub motion_prompt: Option<String>,
    pub output: Option<String>,
}

/// Narration block, read from `audio.narration` or the legacy `narration` key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narration {
    pub tool: Option<String>,
    pub text: Option<String>,
    pub output: Option<String>,
    /// Pad or trim the synthesized audio to the scene duration
    pub normalize_to_scene_duration: bool,
}

impl Default for Narration {
    fn default() -> Self {
        Self {
            tool: None,
            text: None,
            output: None,
            normalize_to_scene_duration: true,
        }
    }
}

/// One unit of generation work. Cuts are expanded into their own scenes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneSpec {
    pub scene_id: i64,
    /// Display range such as `"00:08-00:16"`
    pub timestamp: Option<String>,
    pub image: ImageGeneration,
    pub video: VideoGeneration,
    pub narration: Narration,
}

impl SceneSpec {
    pub fn new(scene_id: i64) -> Self {
        Self {
            scene_id,
            ..Default::default()
        }
    }

    /// True when the scene declares both an image prompt and an output path
    pub fn has_image_work(&self) -> bool {
        self.image.output.is_some() && self.image.prompt.is_some()
    }

    /// True when the scene declares a video output and something to prompt it with
    pub fn has_video_work(&self) -> bool {
        self.video.output.is_some()
            && (self.video.motion_prompt.is_some() || self.image.prompt.is_some())
    }
}

/// Which parsing strategy produced a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStrategy {
    /// Full YAML parse with guides and cut expansion
    Structured,
    /// Line-oriented fallback; guides are always empty
    Minimal,
}

/// A parsed manifest document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub metadata: VideoMetadata,
    pub guides: AssetGuides,
    pub scenes: Vec<SceneSpec>,
    pub strategy: ParseStrategy,
}

impl Manifest {
    pub fn scene(&self, scene_id: i64) -> Option<&SceneSpec> {
        self.scenes.iter().find(|s| s.scene_id == scene_id)
    }
}
