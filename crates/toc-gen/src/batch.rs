//! Image pass ordering and batch selection
//!
//! Character references render first, then object references, then story
//! scenes, so every reference exists before a later scene reads it. Batching
//! windows the story scenes only; missing references ride along in every batch.

use crate::resolve_path;
use crate::turnaround::{is_character_ref_path, is_object_ref_path};
use std::path::Path;
use toc_core::{Result, TocError};
use toc_manifest::SceneSpec;

/// What an image output is used for, in generation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImageRole {
    CharacterRef,
    ObjectRef,
    Story,
}

impl ImageRole {
    pub fn of(output: &Path) -> Self {
        if is_character_ref_path(output) {
            ImageRole::CharacterRef
        } else if is_object_ref_path(output) {
            ImageRole::ObjectRef
        } else {
            ImageRole::Story
        }
    }

    fn of_scene(scene: &SceneSpec, base_dir: &Path) -> Self {
        scene
            .image
            .output
            .as_deref()
            .map(|out| ImageRole::of(&resolve_path(base_dir, out)))
            .unwrap_or(ImageRole::Story)
    }
}

/// A 1-based window over story scenes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBatch {
    pub size: usize,
    pub index: usize,
    /// Also render reference scenes whose output is missing
    pub include_refs: bool,
}

impl ImageBatch {
    pub fn new(size: i64, index: i64, include_refs: bool) -> Result<Self> {
        if size <= 0 {
            return Err(TocError::Config(
                "--image-batch-size must be a positive integer.".to_string(),
            ));
        }
        if index <= 0 {
            return Err(TocError::Config("--image-batch-index must be >= 1.".to_string()));
        }
        Ok(Self {
            size: size as usize,
            index: index as usize,
            include_refs,
        })
    }
}

/// Stable sort: character refs, object refs, story scenes
pub fn order_image_scenes<'a>(mut scenes: Vec<&'a SceneSpec>, base_dir: &Path) -> Vec<&'a SceneSpec> {
    scenes.sort_by_key(|s| ImageRole::of_scene(s, base_dir));
    scenes
}

/// Pick the scenes of one batch from an already ordered list.
///
/// `wants_ref` decides whether a reference scene should run this time
/// (output missing, or regeneration forced).
pub fn select_batch<'a>(
    ordered: Vec<&'a SceneSpec>,
    batch: &ImageBatch,
    base_dir: &Path,
    wants_ref: impl Fn(&Path) -> bool,
) -> Vec<&'a SceneSpec> {
    let mut refs = Vec::new();
    let mut story = Vec::new();
    for scene in ordered {
        match ImageRole::of_scene(scene, base_dir) {
            ImageRole::Story => story.push(scene),
            _ => refs.push(scene),
        }
    }

    let start = (batch.index - 1).saturating_mul(batch.size);
    let selected_story = story.into_iter().skip(start).take(batch.size);

    let mut selected = Vec::new();
    if batch.include_refs {
        selected.extend(refs.into_iter().filter(|s| {
            s.image
                .output
                .as_deref()
                .map(|out| wants_ref(&resolve_path(base_dir, out)))
                .unwrap_or(false)
        }));
    }
    selected.extend(selected_story);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(id: i64, output: &str) -> SceneSpec {
        let mut s = SceneSpec::new(id);
        s.image.prompt = Some(format!("scene {}", id));
        s.image.output = Some(output.to_string());
        s
    }

    fn ids(scenes: &[&SceneSpec]) -> Vec<i64> {
        scenes.iter().map(|s| s.scene_id).collect()
    }

    fn fixture() -> Vec<SceneSpec> {
        vec![
            scene(1, "assets/scenes/s1.png"),
            scene(2, "assets/objects/gate.png"),
            scene(3, "assets/scenes/s3.png"),
            scene(4, "assets/characters/hero.png"),
            scene(5, "assets/scenes/s5.png"),
            scene(6, "assets/scenes/s6.png"),
        ]
    }

    #[test]
    fn test_role_ordering_is_stable() {
        let scenes = fixture();
        let ordered = order_image_scenes(scenes.iter().collect(), Path::new("/ep"));
        assert_eq!(ids(&ordered), vec![4, 2, 1, 3, 5, 6]);
    }

    #[test]
    fn test_batch_windows_story_scenes() {
        let scenes = fixture();
        let base = Path::new("/ep");
        let ordered = order_image_scenes(scenes.iter().collect(), base);

        let batch = ImageBatch::new(2, 2, false).unwrap();
        assert_eq!(ids(&select_batch(ordered.clone(), &batch, base, |_| true)), vec![5, 6]);

        let batch = ImageBatch::new(2, 1, true).unwrap();
        let selected = select_batch(ordered.clone(), &batch, base, |p| !p.ends_with("gate.png"));
        assert_eq!(ids(&selected), vec![4, 1, 3]);

        let past_end = ImageBatch::new(4, 3, false).unwrap();
        assert!(select_batch(ordered, &past_end, base, |_| true).is_empty());
    }

    #[test]
    fn test_batch_arguments_validated() {
        assert!(ImageBatch::new(0, 1, true)
            .unwrap_err()
            .to_string()
            .contains("--image-batch-size"));
        assert!(ImageBatch::new(3, 0, true)
            .unwrap_err()
            .to_string()
            .contains("--image-batch-index"));
    }
}
