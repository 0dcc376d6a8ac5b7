//! CLI command implementations

pub mod generate;
pub mod providers;
pub mod segments;
pub mod validate;

use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};
use toc_gen::{parse_scene_ids, parse_views, GenerationOptions};
use toc_manifest::{load_manifest, CharacterRefsMode, Manifest};
use toc_providers::TocConfig;

/// Flags shared by `generate` and `validate`: what to read and how to check it
#[derive(Args)]
pub struct PrepareArgs {
    /// Path to the manifest markdown
    #[arg(long)]
    pub manifest: PathBuf,

    /// Directory manifest paths are relative to (defaults to the manifest's)
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Fail on YAML errors instead of falling back to the minimal parser
    #[arg(long)]
    pub strict_manifest: bool,

    /// Comma-separated scene ids to work on
    #[arg(long)]
    pub scene_ids: Option<String>,

    #[arg(long)]
    pub skip_images: bool,

    #[arg(long)]
    pub skip_videos: bool,

    #[arg(long)]
    pub skip_audio: bool,

    /// Merge assets.style_guide / character_bible / object_bible into prompts
    #[arg(long)]
    pub apply_asset_guides: bool,

    /// How character references are chosen (auto, scene, all, none)
    #[arg(long, default_value = "auto")]
    pub asset_guides_character_refs: CharacterRefsMode,

    /// Every image scene must declare character_ids (scene mode only)
    #[arg(long)]
    pub require_character_ids: bool,

    /// Every image scene must declare object_ids when an object bible exists
    #[arg(long)]
    pub require_object_ids: bool,

    /// Every object bible reference must be some scene's image output
    #[arg(long)]
    pub require_object_reference_scenes: bool,

    /// Extra character reference views to render (comma-separated: side,back)
    #[arg(long)]
    pub character_reference_views: Option<String>,

    /// Render front/side/back and join them into one strip image
    #[arg(long)]
    pub character_reference_strip: bool,

    /// File stem suffix of strip images
    #[arg(long, default_value = "_refstrip")]
    pub character_reference_strip_suffix: String,
}

impl PrepareArgs {
    pub fn load_manifest(&self) -> Result<Manifest> {
        Ok(load_manifest(&self.manifest, self.strict_manifest)?)
    }

    fn base_dir(&self) -> PathBuf {
        if let Some(dir) = &self.base_dir {
            return dir.clone();
        }
        self.manifest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Run options with these flags applied over the config defaults
    pub fn options(&self, config: &TocConfig) -> Result<GenerationOptions> {
        let mut options = GenerationOptions::from_config(self.base_dir(), config);
        options.scene_ids = self.scene_ids.as_deref().map(parse_scene_ids).transpose()?;
        options.skip_images = self.skip_images;
        options.skip_videos = self.skip_videos;
        options.skip_audio = self.skip_audio;
        options.apply_asset_guides = self.apply_asset_guides;
        options.character_refs_mode = self.asset_guides_character_refs;
        options.require_character_ids = self.require_character_ids;
        options.require_object_ids = self.require_object_ids;
        options.require_object_reference_scenes = self.require_object_reference_scenes;
        if let Some(views) = &self.character_reference_views {
            options.character_views = parse_views(views)?;
        }
        options.character_strip = self.character_reference_strip;
        options.strip_suffix = self.character_reference_strip_suffix.clone();
        Ok(options)
    }
}
