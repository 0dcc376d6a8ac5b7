//! Turn a parsed manifest into the scene list a run works on
//!
//! Expands character references with their turnaround siblings, merges the
//! asset guides into every scene and runs the opt-in completeness checks.

use crate::options::GenerationOptions;
use crate::turnaround::{strip_path, view_path, View};
use std::collections::HashSet;
use std::path::Path;
use toc_core::{Result, TocError};
use toc_manifest::{
    apply_asset_guides, validate_object_reference_scenes, validate_scene_character_ids,
    validate_scene_object_ids, AssetGuides, CharacterRefsMode, Manifest, ParseStrategy, SceneSpec,
    VideoMetadata,
};

/// Scenes ready for generation, with the guides they were resolved against
#[derive(Debug, Clone)]
pub struct PreparedManifest {
    pub metadata: VideoMetadata,
    pub guides: AssetGuides,
    pub scenes: Vec<SceneSpec>,
    /// Non-fatal findings, already logged
    pub warnings: Vec<String>,
}

impl PreparedManifest {
    pub fn scene(&self, scene_id: i64) -> Option<&SceneSpec> {
        self.scenes.iter().find(|s| s.scene_id == scene_id)
    }
}

fn is_under_characters(reference: &str) -> bool {
    let names: Vec<_> = Path::new(reference)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    names.iter().any(|n| n == "assets") && names.iter().any(|n| n == "characters")
}

/// Add side/back view and strip paths next to every character reference
pub fn expand_character_references(
    guides: &mut AssetGuides,
    views: &[View],
    strip_suffix: Option<&str>,
) {
    fn push(path: String, list: &mut Vec<String>) {
        if !list.contains(&path) {
            list.push(path);
        }
    }

    for entry in &mut guides.character_bible {
        let mut expanded: Vec<String> = Vec::new();
        for reference in &entry.reference_images {
            push(reference.clone(), &mut expanded);
            if !is_under_characters(reference) {
                continue;
            }
            let front = Path::new(reference);
            for view in views.iter().filter(|v| **v != View::Front) {
                push(view_path(front, *view).to_string_lossy().to_string(), &mut expanded);
            }
            if let Some(suffix) = strip_suffix {
                push(strip_path(front, suffix).to_string_lossy().to_string(), &mut expanded);
            }
        }
        entry.reference_images = expanded;
    }
}

/// Apply guides and run validations for a run with `options`
pub fn prepare(manifest: Manifest, options: &GenerationOptions) -> Result<PreparedManifest> {
    let Manifest {
        metadata,
        mut guides,
        scenes,
        strategy,
    } = manifest;
    let mut warnings = Vec::new();

    if scenes.is_empty() {
        return Err(TocError::Manifest("No scenes found in manifest YAML.".to_string()));
    }

    let mut seen = HashSet::new();
    for scene in &scenes {
        if !seen.insert(scene.scene_id) {
            return Err(TocError::Manifest(format!(
                "Duplicate scene_id {} (after cut expansion)",
                scene.scene_id
            )));
        }
    }

    let scenes = if options.apply_asset_guides {
        if strategy == ParseStrategy::Minimal {
            warnings.push(
                "--apply-asset-guides: manifest was read by the minimal parser; asset guides unavailable."
                    .to_string(),
            );
        }
        if options.turnaround_enabled() {
            let strip = options.character_strip.then_some(options.strip_suffix.as_str());
            expand_character_references(&mut guides, &options.effective_views(), strip);
        }
        if guides.character_bible.is_empty() && guides.style_guide.is_none() {
            warnings.push(
                "--apply-asset-guides: no assets.character_bible/style_guide found in manifest."
                    .to_string(),
            );
        }
        if guides.character_bible.len() > 1
            && options.character_refs_mode == CharacterRefsMode::Auto
        {
            warnings.push(
                "--asset-guides-character-refs=auto with multiple characters: references are chosen from each scene's own references; consider 'scene' with image_generation.character_ids."
                    .to_string(),
            );
        }
        scenes
            .iter()
            .map(|scene| apply_asset_guides(scene, &guides, options.character_refs_mode))
            .collect()
    } else {
        scenes
    };

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    let filter = options.scene_ids.as_ref();
    validate_scene_character_ids(
        &scenes,
        options.require_character_ids,
        options.character_refs_mode,
        filter,
    )?;
    validate_scene_object_ids(&scenes, &guides, options.require_object_ids, filter)?;
    validate_object_reference_scenes(&scenes, &guides, options.require_object_reference_scenes)?;

    Ok(PreparedManifest {
        metadata,
        guides,
        scenes,
        warnings,
    })
}
