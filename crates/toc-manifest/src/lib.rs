//! toc Manifest - Interpreting video production manifests
//!
//! A manifest is a markdown document with one fenced YAML block describing
//! scenes (and their cuts), video metadata, and optional asset guides. This
//! crate parses it, merges the guides into each scene, and checks that the
//! manifest is complete enough to generate from.

pub mod extract;
pub mod guides;
pub mod minimal;
pub mod parse;
pub mod prompt;
pub mod resolve;
pub mod scene;
pub mod validate;

pub use extract::extract_yaml_block;
pub use guides::{AssetGuides, CharacterBibleEntry, ObjectBibleEntry, StyleGuideSpec};
pub use prompt::{inject_lines, PromptSection};
pub use resolve::{apply_asset_guides, merge_refs, CharacterRefsMode};
pub use scene::{
    ImageGeneration, Manifest, Narration, ParseStrategy, SceneSpec, VideoGeneration, VideoMetadata,
};
pub use validate::{
    validate_object_reference_scenes, validate_scene_character_ids, validate_scene_object_ids,
};

use std::path::Path;
use toc_core::{Result, TocError};

/// Parse the YAML body of a manifest.
///
/// The structured parser runs first. If it fails and `strict` is off, the
/// line-oriented parser takes over and the failure is logged; guides are not
/// available in that case.
pub fn parse_manifest_yaml(yaml_text: &str, strict: bool) -> Result<Manifest> {
    match parse::parse_structured(yaml_text) {
        Ok((metadata, guides, scenes)) => Ok(Manifest {
            metadata,
            guides,
            scenes,
            strategy: ParseStrategy::Structured,
        }),
        Err(err) if strict => Err(err),
        Err(err) => {
            tracing::warn!(
                error = %err,
                "structured manifest parse failed; falling back to the minimal parser (asset guides ignored)"
            );
            let (metadata, scenes) = minimal::parse_minimal(yaml_text);
            Ok(Manifest {
                metadata,
                guides: AssetGuides::default(),
                scenes,
                strategy: ParseStrategy::Minimal,
            })
        }
    }
}

/// Extract and parse the YAML block of a manifest markdown document
pub fn parse_manifest(markdown: &str, strict: bool) -> Result<Manifest> {
    parse_manifest_yaml(extract_yaml_block(markdown)?, strict)
}

/// Read and parse a manifest file
pub fn load_manifest(path: &Path, strict: bool) -> Result<Manifest> {
    if !path.exists() {
        return Err(TocError::Manifest(format!(
            "Manifest not found: {}",
            path.display()
        )));
    }
    let markdown = std::fs::read_to_string(path)?;
    let manifest = parse_manifest(&markdown, strict)?;
    tracing::debug!(
        path = %path.display(),
        scenes = manifest.scenes.len(),
        strategy = ?manifest.strategy,
        "loaded manifest"
    );
    Ok(manifest)
}
