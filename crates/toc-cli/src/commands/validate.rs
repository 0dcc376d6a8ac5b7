//! Manifest validation command

use super::PrepareArgs;
use anyhow::Result;
use clap::Args;
use toc_gen::{prepare, ToolNeeds};
use toc_providers::TocConfig;

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub prepare: PrepareArgs,

    /// Output format (text or json)
    #[arg(long, default_value = "text")]
    pub format: String,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let config = TocConfig::load()?;
    let manifest = args.prepare.load_manifest()?;
    let strategy = manifest.strategy;
    let options = args.prepare.options(&config)?;
    let prepared = prepare(manifest, &options)?;
    let needs = ToolNeeds::scan(&prepared.scenes, &options)?;

    let selected: Vec<_> = prepared
        .scenes
        .iter()
        .filter(|s| options.includes_scene(s.scene_id))
        .collect();
    let images = selected.iter().filter(|s| s.has_image_work()).count();
    let videos = selected.iter().filter(|s| s.has_video_work()).count();
    let narration = selected
        .iter()
        .filter(|s| s.narration.output.is_some())
        .count();
    let names = |tools: Vec<&'static str>| tools.join(", ");
    let image_tools = names(needs.images.iter().map(|t| t.name()).collect());
    let video_tools = names(needs.videos.iter().map(|t| t.name()).collect());
    let narration_tools = names(needs.narration.iter().map(|t| t.name()).collect());

    if args.format == "json" {
        let summary = serde_json::json!({
            "manifest": args.prepare.manifest.display().to_string(),
            "parser": strategy,
            "scenes": prepared.scenes.len(),
            "selected": selected.len(),
            "images": images,
            "videos": videos,
            "narration": narration,
            "tools": {
                "image": needs.images.iter().map(|t| t.name()).collect::<Vec<_>>(),
                "video": needs.videos.iter().map(|t| t.name()).collect::<Vec<_>>(),
                "narration": needs.narration.iter().map(|t| t.name()).collect::<Vec<_>>(),
            },
            "warnings": &prepared.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Manifest OK: {}", args.prepare.manifest.display());
    println!("  Parser: {:?}", strategy);
    println!("  Scenes: {} ({} selected)", prepared.scenes.len(), selected.len());
    println!("  Images: {}  [{}]", images, image_tools);
    println!("  Videos: {}  [{}]", videos, video_tools);
    println!("  Narration: {}  [{}]", narration, narration_tools);
    if !prepared.warnings.is_empty() {
        println!("\n  {} warning(s):", prepared.warnings.len());
        for warning in &prepared.warnings {
            println!("    {}", warning);
        }
    }
    Ok(())
}
