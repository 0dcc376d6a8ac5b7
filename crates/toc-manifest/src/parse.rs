//! Structured manifest parsing on top of `serde_yaml::Value`
//!
//! Manifests are hand-written, so scalar coercion is lenient: numbers and
//! booleans become strings, blank / `null` / `none` count as absent, and list
//! fields accept a lone scalar.

use crate::guides::{AssetGuides, CharacterBibleEntry, ObjectBibleEntry, StyleGuideSpec};
use crate::scene::{ImageGeneration, Narration, SceneSpec, VideoGeneration, VideoMetadata};
use serde_yaml::Value;
use toc_core::{Result, TocError};

/// Cut ids are folded into `scene_id * 100 + cut_id`, so they must stay below 100
const MAX_CUT_ID: i64 = 99;

/// Parse YAML text into metadata, guides, and cut-expanded scenes
pub fn parse_structured(yaml_text: &str) -> Result<(VideoMetadata, AssetGuides, Vec<SceneSpec>)> {
    let root: Value = serde_yaml::from_str(yaml_text)?;
    if !root.is_mapping() {
        return Err(TocError::Manifest(
            "Manifest YAML must be a mapping at the root.".to_string(),
        ));
    }

    let metadata = parse_metadata(root.get("video_metadata"));
    let guides = parse_assets(root.get("assets"));

    let mut scenes = Vec::new();
    let raw_scenes = match root.get("scenes") {
        None | Some(Value::Null) => return Ok((metadata, guides, scenes)),
        Some(Value::Sequence(seq)) => seq,
        Some(_) => {
            return Err(TocError::Manifest(
                "Manifest YAML scenes must be a list.".to_string(),
            ))
        }
    };

    for (position, raw_scene) in raw_scenes.iter().enumerate() {
        if !raw_scene.is_mapping() {
            continue;
        }
        let scene_id = as_int(raw_scene.get("scene_id")).ok_or_else(|| {
            TocError::Manifest(format!(
                "scenes[{}]: scene_id must be a non-negative integer",
                position
            ))
        })?;
        if scene_id < 0 {
            return Err(TocError::scene(scene_id, "scene_id must be non-negative"));
        }
        let timestamp = as_opt_str(raw_scene.get("timestamp"));

        if let Some(Value::Sequence(cuts)) = raw_scene.get("cuts") {
            if !cuts.is_empty() {
                for (idx, raw_cut) in cuts.iter().enumerate() {
                    if !raw_cut.is_mapping() {
                        continue;
                    }
                    let cut_id = match raw_cut.get("cut_id") {
                        None | Some(Value::Null) => idx as i64 + 1,
                        Some(raw) => as_int(Some(raw))
                            .filter(|id| (1..=MAX_CUT_ID).contains(id))
                            .ok_or_else(|| {
                                TocError::scene(
                                    scene_id,
                                    format!("invalid cut_id at cuts[{}] (expected 1-{})", idx, MAX_CUT_ID),
                                )
                            })?,
                    };
                    let mut cut = parse_scene_body(raw_cut);
                    cut.scene_id = scene_id
                        .checked_mul(100)
                        .and_then(|id| id.checked_add(cut_id))
                        .ok_or_else(|| {
                            TocError::scene(scene_id, "scene_id too large for cut expansion")
                        })?;
                    cut.timestamp = timestamp.clone();
                    scenes.push(cut);
                }
                continue;
            }
        }

        let mut scene = parse_scene_body(raw_scene);
        scene.scene_id = scene_id;
        scene.timestamp = timestamp;
        scenes.push(scene);
    }

    Ok((metadata, guides, scenes))
}

fn parse_metadata(value: Option<&Value>) -> VideoMetadata {
    let Some(vm) = value.filter(|v| v.is_mapping()) else {
        return VideoMetadata::default();
    };
    VideoMetadata {
        topic: as_opt_str(vm.get("topic")),
        aspect_ratio: as_opt_str(vm.get("aspect_ratio")),
        resolution: as_opt_str(vm.get("resolution")),
    }
}

/// Image, video, and narration blocks shared by scenes and cuts
fn parse_scene_body(raw: &Value) -> SceneSpec {
    let mut scene = SceneSpec::default();

    if let Some(ig) = raw.get("image_generation").filter(|v| v.is_mapping()) {
        scene.image = ImageGeneration {
            tool: as_opt_str(ig.get("tool")),
            prompt: as_opt_str(ig.get("prompt")),
            output: as_opt_str(ig.get("output")),
            references: str_list(ig.get("references")),
            character_ids: present_list(ig, "character_ids"),
            object_ids: present_list(ig, "object_ids"),
            aspect_ratio: as_opt_str(ig.get("aspect_ratio")),
            image_size: as_opt_str(ig.get("image_size")),
        };
    }

    if let Some(vg) = raw.get("video_generation").filter(|v| v.is_mapping()) {
        scene.video = VideoGeneration {
            tool: as_opt_str(vg.get("tool")),
            input_image: as_opt_str(vg.get("input_image")),
            first_frame: as_opt_str(vg.get("first_frame")),
            last_frame: as_opt_str(vg.get("last_frame")),
            motion_prompt: as_opt_str(vg.get("motion_prompt")),
            output: as_opt_str(vg.get("output")),
        };
    }

    let nested = raw.get("audio").and_then(|a| a.get("narration"));
    let narration = match nested {
        Some(v) if !v.is_null() => Some(v),
        _ => raw.get("narration"),
    };
    if let Some(n) = narration.filter(|v| v.is_mapping()) {
        scene.narration = Narration {
            tool: as_opt_str(n.get("tool")),
            text: as_opt_str(n.get("text")),
            output: as_opt_str(n.get("output")),
            normalize_to_scene_duration: as_flag(n.get("normalize_to_scene_duration"), true),
        };
    }

    scene
}

fn parse_assets(value: Option<&Value>) -> AssetGuides {
    let Some(assets) = value.filter(|v| v.is_mapping()) else {
        return AssetGuides::default();
    };

    let character_bible = mappings(assets.get("character_bible"))
        .map(|item| CharacterBibleEntry {
            character_id: as_opt_str(item.get("character_id")),
            reference_images: str_list(item.get("reference_images")),
            fixed_prompts: str_list(item.get("fixed_prompts")),
            notes: as_opt_str(item.get("notes")),
        })
        .collect();

    let style_guide = assets
        .get("style_guide")
        .filter(|v| v.is_mapping())
        .map(|sg| StyleGuideSpec {
            visual_style: as_opt_str(sg.get("visual_style")),
            forbidden: str_list(sg.get("forbidden")),
            reference_images: str_list(sg.get("reference_images")),
        });

    let object_bible = mappings(assets.get("object_bible"))
        .map(|item| {
            let cinematic = item.get("cinematic").filter(|v| v.is_mapping());
            let nested = |key: &str| cinematic.and_then(|c| c.get(key));

            let cinematic_role = as_opt_str(nested("role"))
                .or_else(|| as_opt_str(item.get("cinematic_role")))
                .or_else(|| as_opt_str(item.get("role_in_film")));
            let visual_takeaways = non_empty_or(
                str_list(nested("visual_takeaways")),
                || str_list(item.get("visual_information")),
            );
            let spectacle_details = non_empty_or(
                str_list(nested("spectacle_details")),
                || str_list(item.get("spectacle_details")),
            );

            ObjectBibleEntry {
                object_id: as_opt_str(item.get("object_id")),
                kind: as_opt_str(item.get("kind")),
                reference_images: str_list(item.get("reference_images")),
                fixed_prompts: str_list(item.get("fixed_prompts")),
                cinematic_role,
                visual_takeaways,
                spectacle_details,
                notes: as_opt_str(item.get("notes")),
            }
        })
        .collect();

    AssetGuides {
        character_bible,
        style_guide,
        object_bible,
    }
}

fn mappings(value: Option<&Value>) -> impl Iterator<Item = &Value> {
    value
        .and_then(Value::as_sequence)
        .into_iter()
        .flatten()
        .filter(|v| v.is_mapping())
}

fn non_empty_or(primary: Vec<String>, fallback: impl FnOnce() -> Vec<String>) -> Vec<String> {
    if primary.is_empty() {
        fallback()
    } else {
        primary
    }
}

/// `Some(list)` whenever the key is present, even if its value is null
fn present_list(block: &Value, key: &str) -> Option<Vec<String>> {
    block.get(key).map(|v| str_list(Some(v)))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Optional string with blank, `null`, and `none` treated as absent
pub(crate) fn as_opt_str(value: Option<&Value>) -> Option<String> {
    let s = scalar_text(value?)?;
    if s.is_empty() || s.eq_ignore_ascii_case("null") || s.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(s)
    }
}

/// List of non-blank strings; a single scalar becomes a one-element list
pub(crate) fn str_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(scalar_text)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::Bool(false)) | None => Vec::new(),
        Some(other) => scalar_text(other)
            .filter(|s| !s.is_empty())
            .into_iter()
            .collect(),
    }
}

fn as_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Tagged(tagged) => as_int(Some(&tagged.value)),
        _ => None,
    }
}

/// YAML bool, or the strings `false` / `no` / `0` for false
fn as_flag(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        other => match as_opt_str(other) {
            Some(s) if matches!(s.to_lowercase().as_str(), "false" | "no" | "0") => false,
            _ => default,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_expansion() {
        let yaml = r#"
video_metadata:
  topic: "Lighthouse"
  aspect_ratio: "16:9"
scenes:
  - scene_id: 10
    timestamp: "00:00-00:12"
    cuts:
      - cut_id: 1
        image_generation:
          tool: google_nanobanana_pro
          prompt: "wide shot"
          output: assets/scenes/scene10_1.png
        video_generation:
          tool: google_veo_3_1
          output: assets/scenes/scene10_1.mp4
      - cut_id: 2
        image_generation:
          prompt: "close up"
          output: assets/scenes/scene10_2.png
        audio:
          narration:
            tool: elevenlabs
            text: "The light turns."
            output: assets/audio/scene10_2.mp3
            normalize_to_scene_duration: "no"
"#;
        let (meta, guides, scenes) = parse_structured(yaml).unwrap();
        assert_eq!(meta.topic.as_deref(), Some("Lighthouse"));
        assert_eq!(meta.aspect_ratio.as_deref(), Some("16:9"));
        assert!(guides.is_empty());

        let ids: Vec<i64> = scenes.iter().map(|s| s.scene_id).collect();
        assert_eq!(ids, vec![1001, 1002]);
        assert_eq!(scenes[0].image.prompt.as_deref(), Some("wide shot"));
        assert_eq!(
            scenes[0].video.output.as_deref(),
            Some("assets/scenes/scene10_1.mp4")
        );
        assert_eq!(scenes[1].image.prompt.as_deref(), Some("close up"));
        assert_eq!(scenes[1].video.output, None);
        assert_eq!(scenes[1].timestamp.as_deref(), Some("00:00-00:12"));
        assert_eq!(scenes[1].narration.tool.as_deref(), Some("elevenlabs"));
        assert!(!scenes[1].narration.normalize_to_scene_duration);
    }

    #[test]
    fn test_cut_ids_default_to_position() {
        let yaml = r#"
scenes:
  - scene_id: 3
    cuts:
      - image_generation: {prompt: a, output: a.png}
      - image_generation: {prompt: b, output: b.png}
      - image_generation: {prompt: c, output: c.png}
"#;
        let (_, _, scenes) = parse_structured(yaml).unwrap();
        let ids: Vec<i64> = scenes.iter().map(|s| s.scene_id).collect();
        assert_eq!(ids, vec![301, 302, 303]);
    }

    #[test]
    fn test_invalid_ids_are_errors() {
        let bad_cut = "scenes:\n  - scene_id: 2\n    cuts:\n      - cut_id: abc\n";
        let err = parse_structured(bad_cut).unwrap_err();
        assert!(err.to_string().starts_with("scene2: invalid cut_id"));

        let bad_scene = "scenes:\n  - scene_id: first\n";
        assert!(parse_structured(bad_scene).is_err());

        let not_a_list = "scenes: 5\n";
        assert!(parse_structured(not_a_list).is_err());

        assert!(parse_structured("- just\n- a list\n").is_err());
    }

    #[test]
    fn test_oversized_scene_id_with_cuts_is_error() {
        let yaml = "scenes:\n  - scene_id: 922337203685477580\n    cuts:\n      - cut_id: 1\n";
        let err = parse_structured(yaml).unwrap_err();
        assert!(err
            .to_string()
            .contains("scene_id too large for cut expansion"));

        // without cuts the id is kept as written
        let plain = "scenes:\n  - scene_id: 922337203685477580\n";
        let (_, _, scenes) = parse_structured(plain).unwrap();
        assert_eq!(scenes[0].scene_id, 922337203685477580);
    }

    #[test]
    fn test_id_list_presence() {
        let yaml = r#"
scenes:
  - scene_id: 1
    image_generation:
      prompt: broll
      output: a.png
      character_ids: []
  - scene_id: 2
    image_generation:
      prompt: hero
      output: b.png
      character_ids: hero
      object_ids:
  - scene_id: 3
    image_generation:
      prompt: nothing
      output: c.png
"#;
        let (_, _, scenes) = parse_structured(yaml).unwrap();
        assert_eq!(scenes[0].image.character_ids, Some(vec![]));
        assert_eq!(scenes[1].image.character_ids, Some(vec!["hero".to_string()]));
        assert_eq!(scenes[1].image.object_ids, Some(vec![]));
        assert_eq!(scenes[2].image.character_ids, None);
        assert_eq!(scenes[2].image.object_ids, None);
    }

    #[test]
    fn test_lenient_scalars_and_legacy_narration() {
        let yaml = r#"
scenes:
  - scene_id: "4"
    timestamp: null
    image_generation:
      tool: none
      prompt: "  "
      output: out.png
      image_size: 2048
      references: [a.png, "", b.png, null]
    narration:
      tool: tbd
      output: n.mp3
"#;
        let (_, _, scenes) = parse_structured(yaml).unwrap();
        let scene = &scenes[0];
        assert_eq!(scene.scene_id, 4);
        assert_eq!(scene.timestamp, None);
        assert_eq!(scene.image.tool, None);
        assert_eq!(scene.image.prompt, None);
        assert_eq!(scene.image.image_size.as_deref(), Some("2048"));
        assert_eq!(scene.image.references, vec!["a.png", "b.png"]);
        assert_eq!(scene.narration.tool.as_deref(), Some("tbd"));
        assert!(scene.narration.normalize_to_scene_duration);
    }

    #[test]
    fn test_object_bible_shapes() {
        let yaml = r#"
assets:
  object_bible:
    - object_id: gate
      kind: setpiece
      reference_images: assets/objects/gate.png
      fixed_prompts: ["bronze torii gate"]
      cinematic:
        role: "threshold between worlds"
        visual_takeaways: ["scale", "age"]
    - object_id: lamp
      role_in_film: "guides the hero"
      visual_information: ["warm glow"]
      spectacle_details: ["flicker"]
  style_guide:
    visual_style: "painterly"
    forbidden: anime
scenes: []
"#;
        let (_, guides, scenes) = parse_structured(yaml).unwrap();
        assert!(scenes.is_empty());
        let gate = &guides.object_bible[0];
        assert_eq!(gate.reference_images, vec!["assets/objects/gate.png"]);
        assert_eq!(gate.cinematic_role.as_deref(), Some("threshold between worlds"));
        assert_eq!(gate.visual_takeaways, vec!["scale", "age"]);
        let lamp = &guides.object_bible[1];
        assert_eq!(lamp.cinematic_role.as_deref(), Some("guides the hero"));
        assert_eq!(lamp.visual_takeaways, vec!["warm glow"]);
        assert_eq!(lamp.spectacle_details, vec!["flicker"]);
        let style = guides.style_guide.unwrap();
        assert_eq!(style.forbidden, vec!["anime"]);
    }
}
