//! Asset generation command

use super::PrepareArgs;
use anyhow::Result;
use clap::{ArgAction, Args};
use std::path::PathBuf;
use std::time::Duration;
use toc_gen::{prepare, Ffmpeg, Generator, GenerationOptions, ImageBatch};
use toc_providers::TocConfig;

#[derive(Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub prepare: PrepareArgs,

    /// Regenerate outputs that already exist
    #[arg(long)]
    pub force: bool,

    /// Print planned provider calls without making them or writing files
    #[arg(long)]
    pub dry_run: bool,

    // Images
    /// Image size passed to the image model (e.g. 1K, 2K, 4K)
    #[arg(long)]
    pub image_size: Option<String>,

    #[arg(long)]
    pub image_aspect_ratio: Option<String>,

    #[arg(long)]
    pub image_prompt_prefix: Option<String>,

    #[arg(long)]
    pub image_prompt_suffix: Option<String>,

    /// Story scenes per image batch
    #[arg(long)]
    pub image_batch_size: Option<i64>,

    /// 1-based batch to render
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub image_batch_index: i64,

    /// Also render missing character/object references in every batch
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub image_batch_include_character_refs: bool,

    // Videos
    #[arg(long)]
    pub video_resolution: Option<String>,

    #[arg(long)]
    pub video_aspect_ratio: Option<String>,

    /// Scene length when the timestamp is missing or unparseable
    #[arg(long)]
    pub default_scene_seconds: Option<u32>,

    #[arg(long)]
    pub video_prompt_prefix: Option<String>,

    #[arg(long)]
    pub video_prompt_suffix: Option<String>,

    #[arg(long)]
    pub video_negative_prompt: Option<String>,

    /// Pass character strips instead of individual views as video references
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub video_reference_prefer_character_refstrips: bool,

    /// Seconds between operation polls
    #[arg(long)]
    pub poll_every: Option<u64>,

    /// Give up on a video operation after this many seconds
    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    /// Send video_generation.last_frame to the provider
    #[arg(long)]
    pub enable_last_frame: bool,

    /// Start each clip from the last frame of the previous one
    #[arg(long)]
    pub chain_first_frame_from_prev_video: bool,

    #[arg(long, default_value_t = 1.0)]
    pub chain_first_frame_seconds_from_end: f64,

    // Narration
    #[arg(long)]
    pub tts_prompt_prefix: Option<String>,

    #[arg(long)]
    pub tts_prompt_suffix: Option<String>,

    // Logs and tools
    /// Write final prompts and redacted provider responses
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub log_prompts: bool,

    /// Where prompt and response logs go (defaults to <base-dir>/logs/providers)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// ffmpeg binary to run
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: String,

    // Provider overrides
    #[arg(long)]
    pub gemini_image_model: Option<String>,

    #[arg(long)]
    pub gemini_video_model: Option<String>,

    #[arg(long)]
    pub seadream_model: Option<String>,

    #[arg(long)]
    pub seadream_size: Option<String>,

    #[arg(long)]
    pub kling_video_model: Option<String>,

    #[arg(long)]
    pub elevenlabs_voice_id: Option<String>,

    #[arg(long)]
    pub elevenlabs_model_id: Option<String>,

    #[arg(long)]
    pub elevenlabs_output_format: Option<String>,
}

impl GenerateArgs {
    fn apply_provider_overrides(&self, config: &mut TocConfig) {
        let set = |slot: &mut Option<String>, value: &Option<String>| {
            if let Some(v) = value {
                *slot = Some(v.clone());
            }
        };
        set(&mut config.gemini.image_model, &self.gemini_image_model);
        set(&mut config.gemini.video_model, &self.gemini_video_model);
        set(&mut config.seadream.model, &self.seadream_model);
        set(&mut config.seadream.size, &self.seadream_size);
        set(&mut config.kling.video_model, &self.kling_video_model);
        set(&mut config.elevenlabs.voice_id, &self.elevenlabs_voice_id);
        set(&mut config.elevenlabs.model_id, &self.elevenlabs_model_id);
        set(&mut config.elevenlabs.output_format, &self.elevenlabs_output_format);
    }

    fn options(&self, config: &TocConfig) -> Result<GenerationOptions> {
        let mut options = self.prepare.options(config)?;
        options.force = self.force;
        options.dry_run = self.dry_run;
        options.log_prompts = self.log_prompts;
        options.log_dir = self.log_dir.clone();

        if let Some(size) = self.image_batch_size {
            options.image_batch = Some(ImageBatch::new(
                size,
                self.image_batch_index,
                self.image_batch_include_character_refs,
            )?);
        }

        options.image_aspect_ratio = self.image_aspect_ratio.clone();
        if let Some(size) = &self.image_size {
            options.image_size = size.clone();
        }
        options.image_prompt_prefix = self.image_prompt_prefix.clone().unwrap_or_default();
        options.image_prompt_suffix = self.image_prompt_suffix.clone().unwrap_or_default();

        options.video_aspect_ratio = self.video_aspect_ratio.clone();
        if let Some(resolution) = &self.video_resolution {
            options.video_resolution = resolution.clone();
        }
        if let Some(seconds) = self.default_scene_seconds {
            options.default_scene_seconds = seconds;
        }
        options.video_prompt_prefix = self.video_prompt_prefix.clone().unwrap_or_default();
        options.video_prompt_suffix = self.video_prompt_suffix.clone().unwrap_or_default();
        options.video_negative_prompt = self.video_negative_prompt.clone().unwrap_or_default();
        options.prefer_strips_for_video = self.video_reference_prefer_character_refstrips;
        if let Some(every) = self.poll_every {
            options.poll.every = Duration::from_secs(every);
        }
        if let Some(timeout) = self.timeout_seconds {
            options.poll.timeout = Duration::from_secs(timeout);
        }
        options.enable_last_frame = self.enable_last_frame;
        options.chain_frames = self.chain_first_frame_from_prev_video;
        options.chain_seconds_from_end = self.chain_first_frame_seconds_from_end;

        options.tts_prompt_prefix = self.tts_prompt_prefix.clone().unwrap_or_default();
        options.tts_prompt_suffix = self.tts_prompt_suffix.clone().unwrap_or_default();
        Ok(options)
    }
}

pub fn run(args: GenerateArgs) -> Result<()> {
    let mut config = TocConfig::load()?;
    args.apply_provider_overrides(&mut config);

    let manifest = args.prepare.load_manifest()?;
    let options = args.options(&config)?;
    let prepared = prepare(manifest, &options)?;

    let ffmpeg = Ffmpeg::new(&args.ffmpeg);
    let report = Generator::new(&config, options, &ffmpeg).run(&prepared)?;

    for line in &report.planned {
        println!("{}", line);
    }
    if args.dry_run {
        println!(
            "Dry run: {} planned call(s), {} existing output(s) kept",
            report.planned.len(),
            report.skipped.len()
        );
    } else {
        println!(
            "Generated {} file(s), kept {} existing",
            report.generated.len(),
            report.skipped.len()
        );
    }
    Ok(())
}
