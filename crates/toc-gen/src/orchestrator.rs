//! Generation run over a prepared manifest
//!
//! A run has three passes in a fixed order: images, then videos (which read
//! the images as first frames and references), then narration. Existing
//! non-empty outputs are kept unless `force` is set. In dry-run mode nothing
//! is written and no provider is contacted; each planned call is recorded in
//! the report instead.

use crate::batch::{order_image_scenes, select_batch, ImageRole};
use crate::media::{extract_frame_best_effort, MediaTool};
use crate::options::{decorate, GenerationOptions};
use crate::prepare::PreparedManifest;
use crate::resolve_path;
use crate::segment::{plan_segments, SegmentPlan};
use crate::turnaround::{prefer_strips, strip_path, view_path, view_prompt, views_to_generate, View};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use toc_core::{duration_from_timestamp_range, Result, TocError};
use toc_manifest::SceneSpec;
use toc_providers::{
    image_suffix_for_mime, redact, sniff_image_mime, GeneratedImage, ImageProvider, ImageRequest,
    ImageTool, NarrationTool, SpeechProvider, TocConfig, VideoProvider, VideoRequest, VideoTool,
};
use tracing::{debug, info, warn};

/// Outputs touched by a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub generated: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    /// Dry-run plan lines, in pass order
    pub planned: Vec<String>,
}

/// An output counts as present only when it is a non-empty file
pub fn artifact_exists(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

fn tool_label(tool: Option<&str>) -> &str {
    tool.unwrap_or("(unset)")
}

fn image_tool(scene: &SceneSpec) -> Result<ImageTool> {
    let name = scene.image.tool.as_deref();
    name.and_then(ImageTool::from_name).ok_or_else(|| {
        TocError::scene(
            scene.scene_id,
            format!("unsupported image tool: {}", tool_label(name)),
        )
    })
}

fn video_tool(scene: &SceneSpec) -> Result<VideoTool> {
    let name = scene.video.tool.as_deref();
    name.and_then(VideoTool::from_name).ok_or_else(|| {
        TocError::scene(
            scene.scene_id,
            format!("unsupported video tool: {}", tool_label(name)),
        )
    })
}

fn narration_tool(scene: &SceneSpec) -> Result<NarrationTool> {
    let name = scene.narration.tool.as_deref();
    NarrationTool::from_name(name).ok_or_else(|| {
        TocError::scene(
            scene.scene_id,
            format!("unsupported narration tool: {}", tool_label(name)),
        )
    })
}

/// `<stem>_chain_first_frame.png` next to a clip
pub fn chain_frame_path(clip: &Path) -> PathBuf {
    let stem = clip
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    clip.with_file_name(format!("{}_chain_first_frame.png", stem))
}

/// Motion prompt followed by the scene description the image was made from
pub fn video_prompt_body(motion_prompt: Option<&str>, image_prompt: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(motion) = motion_prompt.map(str::trim).filter(|m| !m.is_empty()) {
        parts.push(motion.to_string());
    }
    if let Some(image) = image_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        parts.push(format!("シーン説明:\n{}", image));
    }
    parts.join("\n\n")
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// Tools the selected scenes will call, per pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolNeeds {
    pub images: Vec<ImageTool>,
    pub videos: Vec<VideoTool>,
    pub narration: Vec<NarrationTool>,
}

impl ToolNeeds {
    /// Resolve every tool name up front so an unknown one fails before any paid call
    pub fn scan(scenes: &[SceneSpec], options: &GenerationOptions) -> Result<Self> {
        let mut needs = ToolNeeds::default();
        for scene in scenes.iter().filter(|s| options.includes_scene(s.scene_id)) {
            if !options.skip_images && scene.has_image_work() {
                push_unique(&mut needs.images, image_tool(scene)?);
            }
            if !options.skip_videos && scene.has_video_work() {
                push_unique(&mut needs.videos, video_tool(scene)?);
            }
            if !options.skip_audio && scene.narration.output.is_some() {
                push_unique(&mut needs.narration, narration_tool(scene)?);
            }
        }
        Ok(needs)
    }
}

/// Provider clients keyed by tool
///
/// Clients supplied up front are used as-is; the rest are built from config
/// during preflight.
#[derive(Default)]
pub struct ProviderSet {
    images: HashMap<ImageTool, Box<dyn ImageProvider>>,
    videos: HashMap<VideoTool, Box<dyn VideoProvider>>,
    speech: HashMap<NarrationTool, Box<dyn SpeechProvider>>,
}

impl ProviderSet {
    pub fn with_image(mut self, tool: ImageTool, provider: impl ImageProvider + 'static) -> Self {
        self.images.insert(tool, Box::new(provider));
        self
    }

    pub fn with_video(mut self, tool: VideoTool, provider: impl VideoProvider + 'static) -> Self {
        self.videos.insert(tool, Box::new(provider));
        self
    }

    pub fn with_speech(
        mut self,
        tool: NarrationTool,
        provider: impl SpeechProvider + 'static,
    ) -> Self {
        self.speech.insert(tool, Box::new(provider));
        self
    }

    /// Create every missing client; the first missing credential aborts the run
    pub fn ensure(&mut self, needs: &ToolNeeds, config: &TocConfig) -> Result<()> {
        for tool in &needs.images {
            if !self.images.contains_key(tool) {
                self.images.insert(*tool, tool.create(config)?);
            }
        }
        for tool in &needs.videos {
            if !self.videos.contains_key(tool) {
                self.videos.insert(*tool, tool.create(config)?);
            }
        }
        for tool in &needs.narration {
            if !self.speech.contains_key(tool) {
                if let Some(provider) = tool.create(config)? {
                    self.speech.insert(*tool, provider);
                }
            }
        }
        Ok(())
    }

    fn image(&self, tool: ImageTool) -> Result<&dyn ImageProvider> {
        self.images
            .get(&tool)
            .map(|p| p.as_ref())
            .ok_or_else(|| TocError::Config(format!("No client for image tool {}", tool.name())))
    }

    fn video(&self, tool: VideoTool) -> Result<&dyn VideoProvider> {
        self.videos
            .get(&tool)
            .map(|p| p.as_ref())
            .ok_or_else(|| TocError::Config(format!("No client for video tool {}", tool.name())))
    }

    fn speech(&self, tool: NarrationTool) -> Result<&dyn SpeechProvider> {
        self.speech
            .get(&tool)
            .map(|p| p.as_ref())
            .ok_or_else(|| {
                TocError::Config(format!("No client for narration tool {}", tool.name()))
            })
    }
}

/// Per-scene image settings shared by every view of that scene
struct ImageJob {
    scene_id: i64,
    tool: ImageTool,
    aspect_ratio: String,
    image_size: String,
}

/// Runs the image, video and narration passes
pub struct Generator<'a> {
    config: &'a TocConfig,
    options: GenerationOptions,
    media: &'a dyn MediaTool,
    providers: ProviderSet,
}

impl<'a> Generator<'a> {
    pub fn new(config: &'a TocConfig, options: GenerationOptions, media: &'a dyn MediaTool) -> Self {
        Self {
            config,
            options,
            media,
            providers: ProviderSet::default(),
        }
    }

    pub fn with_providers(mut self, providers: ProviderSet) -> Self {
        self.providers = providers;
        self
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    pub fn run(&mut self, prepared: &PreparedManifest) -> Result<RunReport> {
        let needs = ToolNeeds::scan(&prepared.scenes, &self.options)?;
        if !self.options.dry_run {
            self.providers.ensure(&needs, self.config)?;
        }

        let mut report = RunReport::default();
        self.image_pass(prepared, &mut report)?;
        self.video_pass(prepared, &mut report)?;
        self.audio_pass(prepared, &mut report)?;
        info!(
            generated = report.generated.len(),
            skipped = report.skipped.len(),
            planned = report.planned.len(),
            "generation run finished"
        );
        Ok(report)
    }

    fn plan(&self, report: &mut RunReport, line: String) {
        debug!("{}", line);
        report.planned.push(line);
    }

    fn skip(&self, report: &mut RunReport, out: &Path) -> bool {
        if self.options.force || !artifact_exists(out) {
            return false;
        }
        debug!(out = %out.display(), "output exists; skipping");
        report.skipped.push(out.to_path_buf());
        true
    }

    fn write_text_log(&self, name: &str, text: &str) -> Result<()> {
        if self.options.dry_run || !self.options.log_prompts {
            return Ok(());
        }
        write_output(&self.options.log_dir().join(name), text.as_bytes())
    }

    fn write_json_log(&self, name: &str, value: &Value) -> Result<()> {
        if self.options.dry_run || !self.options.log_prompts {
            return Ok(());
        }
        let text = serde_json::to_string_pretty(&redact(value))?;
        write_output(&self.options.log_dir().join(name), text.as_bytes())
    }

    fn resolve(&self, path: &str) -> PathBuf {
        resolve_path(&self.options.base_dir, path)
    }

    /// Scene references as paths; in a real run each must already exist
    fn references(&self, scene: &SceneSpec) -> Result<Vec<PathBuf>> {
        let mut refs = Vec::new();
        for reference in &scene.image.references {
            let path = self.resolve(reference);
            if !self.options.dry_run && !artifact_exists(&path) {
                return Err(TocError::scene(
                    scene.scene_id,
                    format!("reference image not found: {}", path.display()),
                ));
            }
            push_unique(&mut refs, path);
        }
        Ok(refs)
    }

    /// Files a character reference scene produces with turnaround enabled
    fn turnaround_outputs(&self, front: &Path) -> Vec<PathBuf> {
        let mut outputs: Vec<PathBuf> = views_to_generate(&self.options.effective_views())
            .into_iter()
            .map(|v| view_path(front, v))
            .collect();
        if self.options.character_strip {
            outputs.push(strip_path(front, &self.options.strip_suffix));
        }
        outputs
    }

    fn wants_reference(&self, out: &Path) -> bool {
        if self.options.force {
            return true;
        }
        if self.options.turnaround_enabled() && ImageRole::of(out) == ImageRole::CharacterRef {
            return self.turnaround_outputs(out).iter().any(|p| !artifact_exists(p));
        }
        !artifact_exists(out)
    }

    // Images

    fn image_pass(&self, prepared: &PreparedManifest, report: &mut RunReport) -> Result<()> {
        if self.options.skip_images {
            return Ok(());
        }
        let _pass = tracing::info_span!("images").entered();
        let base_dir = &self.options.base_dir;
        let candidates: Vec<&SceneSpec> = prepared
            .scenes
            .iter()
            .filter(|s| self.options.includes_scene(s.scene_id) && s.has_image_work())
            .collect();
        let ordered = order_image_scenes(candidates, base_dir);
        let selected = match &self.options.image_batch {
            Some(batch) => select_batch(ordered, batch, base_dir, |out| self.wants_reference(out)),
            None => ordered,
        };

        let run_aspect = self.options.run_aspect_ratio(&prepared.metadata);
        for scene in selected {
            self.generate_scene_image(scene, &run_aspect, report)?;
        }
        Ok(())
    }

    fn generate_scene_image(
        &self,
        scene: &SceneSpec,
        run_aspect: &str,
        report: &mut RunReport,
    ) -> Result<()> {
        let Some(output) = scene.image.output.as_deref() else {
            return Ok(());
        };
        let out = self.resolve(output);
        let job = ImageJob {
            scene_id: scene.scene_id,
            tool: image_tool(scene)?,
            aspect_ratio: scene
                .image
                .aspect_ratio
                .clone()
                .unwrap_or_else(|| run_aspect.to_string()),
            image_size: scene
                .image
                .image_size
                .clone()
                .unwrap_or_else(|| self.options.image_size.clone()),
        };
        let refs = self.references(scene)?;
        let prompt = decorate(
            &self.options.image_prompt_prefix,
            scene.image.prompt.as_deref().unwrap_or_default(),
            &self.options.image_prompt_suffix,
        );

        if self.options.turnaround_enabled() && ImageRole::of(&out) == ImageRole::CharacterRef {
            return self.generate_turnaround(&job, &prompt, &refs, &out, report);
        }
        self.generate_image(&job, &prompt, &refs, &out, None, report)
    }

    /// Front view from the scene references, then side/back conditioned on the front
    fn generate_turnaround(
        &self,
        job: &ImageJob,
        prompt: &str,
        refs: &[PathBuf],
        front: &Path,
        report: &mut RunReport,
    ) -> Result<()> {
        let mut conditioned = refs.to_vec();
        push_unique(&mut conditioned, front.to_path_buf());

        let mut rendered = Vec::new();
        for view in views_to_generate(&self.options.effective_views()) {
            let path = view_path(front, view);
            let view_refs = if view == View::Front { refs } else { &conditioned[..] };
            self.generate_image(job, &view_prompt(prompt, view), view_refs, &path, Some(view), report)?;
            rendered.push(path);
        }

        if !self.options.character_strip || rendered.len() != View::ALL.len() {
            return Ok(());
        }
        let strip = strip_path(front, &self.options.strip_suffix);
        if self.skip(report, &strip) {
            return Ok(());
        }
        if self.options.dry_run {
            self.plan(
                report,
                format!("[dry-run] IMAGE {} <- hstack(front,side,back)", strip.display()),
            );
            return Ok(());
        }
        self.media.hstack_images(&rendered, &strip)?;
        info!(scene = job.scene_id, out = %strip.display(), "reference strip written");
        report.generated.push(strip);
        Ok(())
    }

    fn generate_image(
        &self,
        job: &ImageJob,
        prompt: &str,
        refs: &[PathBuf],
        out: &Path,
        view: Option<View>,
        report: &mut RunReport,
    ) -> Result<()> {
        if self.skip(report, out) {
            return Ok(());
        }
        if self.options.dry_run {
            let model = job.tool.model_label(self.config);
            let line = match job.tool {
                ImageTool::SeaDream => format!(
                    "[dry-run] IMAGE {} <- {} (size={})",
                    out.display(),
                    model,
                    self.config.seadream.size()
                ),
                _ => format!(
                    "[dry-run] IMAGE {} <- {} ({}, {})",
                    out.display(),
                    model,
                    job.aspect_ratio,
                    job.image_size
                ),
            };
            self.plan(report, line);
            return Ok(());
        }

        let suffix = view.map(|v| format!("_{}", v)).unwrap_or_default();
        self.write_text_log(&format!("scene{}_image_prompt{}.txt", job.scene_id, suffix), prompt)?;

        let provider = self.providers.image(job.tool)?;
        let reference_images = if provider.supports_reference_images() {
            refs.to_vec()
        } else {
            if !refs.is_empty() {
                debug!(provider = provider.name(), "provider takes no reference images");
            }
            Vec::new()
        };
        let request = ImageRequest {
            prompt: prompt.to_string(),
            aspect_ratio: job.aspect_ratio.clone(),
            image_size: job.image_size.clone(),
            reference_images,
        };
        info!(scene = job.scene_id, provider = provider.name(), out = %out.display(), "generating image");
        let image = provider.generate_image(&request)?;
        self.write_json_log(&format!("scene{}_image{}.json", job.scene_id, suffix), &image.raw)?;
        self.write_image(&image, out)?;
        report.generated.push(out.to_path_buf());
        Ok(())
    }

    /// Re-encode to the output's format; raw bytes when the media tool is absent
    fn write_image(&self, image: &GeneratedImage, out: &Path) -> Result<()> {
        let mime = image
            .mime_type
            .as_deref()
            .or_else(|| sniff_image_mime(&image.bytes));
        let tmp = tempfile::Builder::new()
            .prefix("toc_image_")
            .suffix(image_suffix_for_mime(mime))
            .tempfile()?;
        std::fs::write(tmp.path(), &image.bytes)?;
        match self.media.reencode_image(tmp.path(), out) {
            Err(e) if e.is_tool_missing() => {
                warn!(error = %e, out = %out.display(), "writing provider bytes without re-encoding");
                write_output(out, &image.bytes)
            }
            other => other,
        }
    }

    // Videos

    fn video_pass(&self, prepared: &PreparedManifest, report: &mut RunReport) -> Result<()> {
        if self.options.skip_videos {
            return Ok(());
        }
        let _pass = tracing::info_span!("videos").entered();
        let run_aspect = self.options.run_aspect_ratio(&prepared.metadata);

        // Filtered-out scenes still count as the previous clip for chaining
        let mut previous: Option<&SceneSpec> = None;
        let mut chained: Option<PathBuf> = None;
        for scene in prepared.scenes.iter().filter(|s| s.has_video_work()) {
            if self.options.includes_scene(scene.scene_id) {
                chained = self.generate_scene_video(scene, previous, chained.take(), &run_aspect, report)?;
            } else {
                chained = None;
            }
            previous = Some(scene);
        }
        Ok(())
    }

    /// Last frame of an earlier run's clip, when chaining into a scene whose
    /// predecessor was not rendered in this run
    fn frame_from_existing_clip(&self, previous: &SceneSpec) -> Result<Option<PathBuf>> {
        if self.options.dry_run {
            return Ok(None);
        }
        let Some(output) = previous.video.output.as_deref() else {
            return Ok(None);
        };
        let clip = self.resolve(output);
        if !artifact_exists(&clip) {
            return Ok(None);
        }
        self.extract_chain_frame(&clip, true)
    }

    fn extract_chain_frame(&self, clip: &Path, force: bool) -> Result<Option<PathBuf>> {
        let frame = chain_frame_path(clip);
        match extract_frame_best_effort(
            self.media,
            clip,
            &frame,
            self.options.chain_seconds_from_end,
            force,
        ) {
            Ok(path) => Ok(Some(path)),
            Err(e) if e.is_tool_missing() => {
                warn!(error = %e, "frame chaining disabled for the next scene");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Render one scene's clip; returns the frame the next scene should start from
    fn generate_scene_video(
        &self,
        scene: &SceneSpec,
        previous: Option<&SceneSpec>,
        chained: Option<PathBuf>,
        run_aspect: &str,
        report: &mut RunReport,
    ) -> Result<Option<PathBuf>> {
        let scene_id = scene.scene_id;
        let tool = video_tool(scene)?;
        let Some(output) = scene.video.output.as_deref() else {
            return Ok(None);
        };
        let out = self.resolve(output);
        let duration = duration_from_timestamp_range(
            scene.timestamp.as_deref(),
            self.options.default_scene_seconds,
        );

        let mut first_frame = scene
            .video
            .first_frame
            .as_deref()
            .or(scene.video.input_image.as_deref())
            .or(scene.image.output.as_deref())
            .map(|p| self.resolve(p));
        if self.options.chain_frames {
            let frame = match (chained, previous) {
                (Some(frame), _) => Some(frame),
                (None, Some(prev)) => self.frame_from_existing_clip(prev)?,
                (None, None) => None,
            };
            if frame.is_some() {
                first_frame = frame;
            }
        }
        if let Some(frame) = &first_frame {
            if !self.options.dry_run && !artifact_exists(frame) {
                return Err(TocError::scene(
                    scene_id,
                    format!("first frame image not found: {}", frame.display()),
                ));
            }
        }

        let last_frame = if self.options.enable_last_frame {
            scene.video.last_frame.as_deref().map(|p| self.resolve(p))
        } else {
            None
        };
        if let Some(frame) = &last_frame {
            if !self.options.dry_run && !artifact_exists(frame) {
                return Err(TocError::scene(
                    scene_id,
                    format!("last frame image not found: {}", frame.display()),
                ));
            }
        }

        let mut refs = self.references(scene)?;
        if self.options.prefer_strips_for_video {
            refs = prefer_strips(refs, &self.options.strip_suffix);
        }

        let prompt = decorate(
            &self.options.video_prompt_prefix,
            &video_prompt_body(
                scene.video.motion_prompt.as_deref(),
                scene.image.prompt.as_deref(),
            ),
            &self.options.video_prompt_suffix,
        );
        let negative = self.options.video_negative_prompt.trim();
        let request = VideoRequest {
            prompt,
            negative_prompt: (!negative.is_empty()).then(|| negative.to_string()),
            duration_seconds: duration,
            aspect_ratio: run_aspect.to_string(),
            resolution: self.options.video_resolution.clone(),
            first_frame,
            last_frame,
            reference_images: refs,
        };

        if !self.skip(report, &out) {
            self.write_text_log(&format!("scene{}_video_prompt.txt", scene_id), &request.prompt)?;
            match tool.allowed_durations() {
                Some(allowed) => {
                    let plan = plan_segments(i64::from(duration), allowed)?;
                    if plan.is_single() && plan.trim_to.is_none() {
                        self.render_clip(scene_id, tool, &request, &out, report)?;
                    } else {
                        self.render_segments(scene_id, tool, &request, &plan, &out, report)?;
                    }
                }
                None => self.render_clip(scene_id, tool, &request, &out, report)?,
            }
        }

        if !self.options.chain_frames {
            return Ok(None);
        }
        if self.options.dry_run {
            return Ok(Some(chain_frame_path(&out)));
        }
        if !artifact_exists(&out) {
            return Ok(None);
        }
        self.extract_chain_frame(&out, self.options.force)
    }

    fn provider_request(&self, provider: &dyn VideoProvider, request: &VideoRequest) -> VideoRequest {
        let mut request = request.clone();
        if !provider.supports_reference_images() && !request.reference_images.is_empty() {
            debug!(provider = provider.name(), "provider takes no reference images");
            request.reference_images.clear();
        }
        request
    }

    fn render_clip(
        &self,
        scene_id: i64,
        tool: VideoTool,
        request: &VideoRequest,
        out: &Path,
        report: &mut RunReport,
    ) -> Result<()> {
        if self.options.dry_run {
            self.plan(
                report,
                format!(
                    "[dry-run] VIDEO({}) {} <- {} ({}s, {}, {})",
                    request.kind(),
                    out.display(),
                    tool.model_label(self.config),
                    request.duration_seconds,
                    request.aspect_ratio,
                    request.resolution
                ),
            );
            return Ok(());
        }

        let provider = self.providers.video(tool)?;
        let request = self.provider_request(provider, request);
        info!(
            scene = scene_id,
            provider = provider.name(),
            kind = request.kind(),
            seconds = request.duration_seconds,
            "generating video"
        );
        let video = provider.generate_video(&request, &self.options.poll)?;
        self.write_json_log(&format!("scene{}_video.json", scene_id), &video.raw)?;
        write_output(out, &video.bytes)?;
        report.generated.push(out.to_path_buf());
        Ok(())
    }

    /// One provider call per segment, then join and trim to the scene length
    fn render_segments(
        &self,
        scene_id: i64,
        tool: VideoTool,
        request: &VideoRequest,
        plan: &SegmentPlan,
        out: &Path,
        report: &mut RunReport,
    ) -> Result<()> {
        if self.options.dry_run {
            let trim = plan
                .trim_to
                .map(|s| s.to_string())
                .unwrap_or_else(|| "None".to_string());
            self.plan(
                report,
                format!(
                    "[dry-run] VIDEO scene{}: segments={:?} then trim_to={}",
                    scene_id, plan.segments, trim
                ),
            );
            return Ok(());
        }

        let provider = self.providers.video(tool)?;
        let base_request = self.provider_request(provider, request);
        let workdir = tempfile::tempdir()?;
        let mut parts = Vec::new();
        for (index, seconds) in plan.segments.iter().enumerate() {
            let number = index + 1;
            let mut segment = base_request.clone();
            segment.duration_seconds = *seconds;
            info!(scene = scene_id, segment = number, seconds, "generating video segment");
            let video = provider.generate_video(&segment, &self.options.poll)?;
            self.write_json_log(&format!("scene{}_video_seg{}.json", scene_id, number), &video.raw)?;
            let part = workdir.path().join(format!("scene{}_seg{}.mp4", scene_id, number));
            std::fs::write(&part, &video.bytes)?;
            parts.push(part);
        }

        let joined = match parts.as_slice() {
            [single] => single.clone(),
            _ => {
                let joined = workdir.path().join(format!("scene{}_joined.mp4", scene_id));
                self.media.concat_videos(&parts, &joined)?;
                joined
            }
        };
        match plan.trim_to {
            Some(seconds) => self.media.trim_video(&joined, out, seconds)?,
            None => write_output(out, &std::fs::read(&joined)?)?,
        }
        report.generated.push(out.to_path_buf());
        Ok(())
    }

    // Narration

    fn audio_pass(&self, prepared: &PreparedManifest, report: &mut RunReport) -> Result<()> {
        if self.options.skip_audio {
            return Ok(());
        }
        let _pass = tracing::info_span!("audio").entered();
        for scene in prepared
            .scenes
            .iter()
            .filter(|s| self.options.includes_scene(s.scene_id) && s.narration.output.is_some())
        {
            self.generate_narration(scene, report)?;
        }
        Ok(())
    }

    fn generate_narration(&self, scene: &SceneSpec, report: &mut RunReport) -> Result<()> {
        let scene_id = scene.scene_id;
        let tool = narration_tool(scene)?;
        let Some(output) = scene.narration.output.as_deref() else {
            return Ok(());
        };
        let out = self.resolve(output);
        let duration = duration_from_timestamp_range(
            scene.timestamp.as_deref(),
            self.options.default_scene_seconds,
        );
        if self.skip(report, &out) {
            return Ok(());
        }

        if tool == NarrationTool::Silence {
            if self.options.dry_run {
                self.plan(
                    report,
                    format!(
                        "[dry-run] AUDIO {} <- placeholder (tool={})",
                        out.display(),
                        tool_label(scene.narration.tool.as_deref())
                    ),
                );
                return Ok(());
            }
            self.media.write_silence(&out, duration)?;
            report.generated.push(out);
            return Ok(());
        }

        let label = match tool {
            NarrationTool::ElevenLabs => "ElevenLabs",
            _ => tool.name(),
        };
        let text = scene
            .narration
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                TocError::scene(scene_id, format!("missing narration text for {} TTS", label))
            })?;
        let text = decorate(&self.options.tts_prompt_prefix, text, &self.options.tts_prompt_suffix);
        let target = scene.narration.normalize_to_scene_duration.then_some(duration);

        if self.options.dry_run {
            let line = match tool {
                NarrationTool::ElevenLabs => format!(
                    "[dry-run] AUDIO {} <- elevenlabs voice={} model={} fmt={}",
                    out.display(),
                    self.config.elevenlabs.voice_id(),
                    self.config.elevenlabs.model_id(),
                    self.config.elevenlabs.output_format()
                ),
                _ => format!("[dry-run] AUDIO {} <- {}", out.display(), tool.name()),
            };
            self.plan(report, line);
            return Ok(());
        }

        let provider = self.providers.speech(tool)?;
        self.write_json_log(
            &format!("scene{}_tts_request.json", scene_id),
            &provider.request_payload(&text),
        )?;
        info!(scene = scene_id, provider = provider.name(), "synthesizing narration");
        let audio = provider.synthesize(&text)?;

        let tmp = tempfile::Builder::new()
            .prefix("toc_tts_")
            .suffix(".mp3")
            .tempfile()?;
        std::fs::write(tmp.path(), &audio)?;
        match self.media.normalize_audio(tmp.path(), &out, target) {
            Err(e) if e.is_tool_missing() => {
                warn!(error = %e, out = %out.display(), "writing narration without normalizing");
                write_output(&out, &audio)?;
            }
            other => other?,
        }
        report.generated.push(out);
        Ok(())
    }
}
