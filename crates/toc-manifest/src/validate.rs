//! Manifest completeness checks run before any paid call

use crate::guides::AssetGuides;
use crate::resolve::CharacterRefsMode;
use crate::scene::SceneSpec;
use std::collections::HashSet;
use toc_core::{Result, TocError};

fn in_filter(scene: &SceneSpec, filter: Option<&HashSet<i64>>) -> bool {
    filter.map(|f| f.contains(&scene.scene_id)).unwrap_or(true)
}

/// In `scene` mode, every image scene must declare `character_ids` (possibly empty)
pub fn validate_scene_character_ids(
    scenes: &[SceneSpec],
    require: bool,
    mode: CharacterRefsMode,
    filter: Option<&HashSet<i64>>,
) -> Result<()> {
    if !require || mode != CharacterRefsMode::Scene {
        return Ok(());
    }
    for scene in scenes {
        if !in_filter(scene, filter) || !scene.has_image_work() {
            continue;
        }
        if scene.image.character_ids.is_none() {
            return Err(TocError::scene(
                scene.scene_id,
                "missing image_generation.character_ids. For B-roll scenes, set an explicit empty list: character_ids: [].",
            ));
        }
    }
    Ok(())
}

/// With an object bible present, every image scene must declare `object_ids` (possibly empty)
pub fn validate_scene_object_ids(
    scenes: &[SceneSpec],
    guides: &AssetGuides,
    require: bool,
    filter: Option<&HashSet<i64>>,
) -> Result<()> {
    if !require || guides.object_bible.is_empty() {
        return Ok(());
    }
    for scene in scenes {
        if !in_filter(scene, filter) || !scene.has_image_work() {
            continue;
        }
        if scene.image.object_ids.is_none() {
            return Err(TocError::scene(
                scene.scene_id,
                "missing image_generation.object_ids. For scenes with no props/setpieces, set an explicit empty list: object_ids: [].",
            ));
        }
    }
    Ok(())
}

/// Every object bible entry must be complete, and each of its reference images
/// must be the image output of some scene. Violations are reported together.
pub fn validate_object_reference_scenes(
    scenes: &[SceneSpec],
    guides: &AssetGuides,
    require: bool,
) -> Result<()> {
    if !require || guides.object_bible.is_empty() {
        return Ok(());
    }

    let outputs: HashSet<&str> = scenes
        .iter()
        .filter_map(|s| s.image.output.as_deref())
        .collect();

    let mut missing_required = Vec::new();
    let mut missing_outputs = Vec::new();
    for entry in &guides.object_bible {
        let Some(object_id) = &entry.object_id else {
            missing_required.push("object_id is required (found null/empty).".to_string());
            continue;
        };
        if entry.reference_images.is_empty() {
            missing_required.push(format!(
                "{}: reference_images is required and must be non-empty.",
                object_id
            ));
        }
        if entry.fixed_prompts.is_empty() {
            missing_required.push(format!(
                "{}: fixed_prompts is required and must be non-empty.",
                object_id
            ));
        }
        for reference in &entry.reference_images {
            if !outputs.contains(reference.as_str()) {
                missing_outputs.push(format!("{}:{}", object_id, reference));
            }
        }
    }

    if !missing_required.is_empty() {
        return Err(TocError::Validation(format!(
            "assets.object_bible invalid:\n- {}",
            missing_required.join("\n- ")
        )));
    }
    if !missing_outputs.is_empty() {
        return Err(TocError::Validation(format!(
            "Missing object reference scenes: each assets.object_bible[].reference_images path must be generated by some scenes[].image_generation.output.\n- {}",
            missing_outputs.join("\n- ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guides::ObjectBibleEntry;

    fn image_scene(id: i64, output: &str) -> SceneSpec {
        let mut scene = SceneSpec::new(id);
        scene.image.prompt = Some("prompt".to_string());
        scene.image.output = Some(output.to_string());
        scene
    }

    fn gate_guides(refs: &[&str]) -> AssetGuides {
        AssetGuides {
            object_bible: vec![ObjectBibleEntry {
                object_id: Some("gate".to_string()),
                reference_images: refs.iter().map(|r| r.to_string()).collect(),
                fixed_prompts: vec!["vermilion gate".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_character_ids_names_scene() {
        let mut tagged = image_scene(1, "a.png");
        tagged.image.character_ids = Some(vec![]);
        let untagged = image_scene(2, "b.png");
        let scenes = vec![tagged, untagged];

        let err = validate_scene_character_ids(&scenes, true, CharacterRefsMode::Scene, None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "scene2: missing image_generation.character_ids. For B-roll scenes, set an explicit empty list: character_ids: []."
        );

        // other modes and the filter skip the check
        assert!(validate_scene_character_ids(&scenes, true, CharacterRefsMode::Auto, None).is_ok());
        assert!(validate_scene_character_ids(&scenes, false, CharacterRefsMode::Scene, None).is_ok());
        let only_first: HashSet<i64> = [1].into_iter().collect();
        assert!(
            validate_scene_character_ids(&scenes, true, CharacterRefsMode::Scene, Some(&only_first))
                .is_ok()
        );
    }

    #[test]
    fn test_scenes_without_image_work_are_exempt() {
        let mut video_only = SceneSpec::new(7);
        video_only.video.output = Some("v.mp4".to_string());
        assert!(validate_scene_character_ids(&[video_only], true, CharacterRefsMode::Scene, None)
            .is_ok());
    }

    #[test]
    fn test_missing_object_ids_requires_bible() {
        let scenes = vec![image_scene(3, "c.png")];
        assert!(validate_scene_object_ids(&scenes, &AssetGuides::default(), true, None).is_ok());
        let err = validate_scene_object_ids(&scenes, &gate_guides(&["g.png"]), true, None)
            .unwrap_err();
        assert!(err.to_string().starts_with("scene3: missing image_generation.object_ids."));
    }

    #[test]
    fn test_object_reference_scenes() {
        let guides = gate_guides(&["assets/objects/gate.png"]);
        let producing = vec![image_scene(1, "assets/objects/gate.png")];
        assert!(validate_object_reference_scenes(&producing, &guides, true).is_ok());

        let err = validate_object_reference_scenes(&[image_scene(1, "x.png")], &guides, true)
            .unwrap_err();
        assert!(err
            .to_string()
            .ends_with("scenes[].image_generation.output.\n- gate:assets/objects/gate.png"));
    }

    #[test]
    fn test_incomplete_object_entries_reported_together() {
        let guides = AssetGuides {
            object_bible: vec![
                ObjectBibleEntry::default(),
                ObjectBibleEntry {
                    object_id: Some("lamp".to_string()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let err = validate_object_reference_scenes(&[], &guides, true).unwrap_err();
        assert_eq!(
            err.to_string(),
            "assets.object_bible invalid:\n- object_id is required (found null/empty).\n- lamp: reference_images is required and must be non-empty.\n- lamp: fixed_prompts is required and must be non-empty."
        );
    }
}
