//! External media tool capability and its ffmpeg implementation
//!
//! The orchestrator only talks to [`MediaTool`], so tests can swap in a fake
//! that records calls instead of spawning a binary.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use toc_core::{Result, TocError};

/// Offsets tried in order after the requested one, in seconds from the end
const FRAME_RETRY_OFFSETS: &[f64] = &[1.0 / 24.0, 0.05, 0.1, 0.25, 0.5, 1.0];
/// Seeking closer than one 24 fps frame to EOF can produce no frame at all
pub const MIN_FRAME_SEEK: f64 = 1.0 / 24.0;

/// One method per media operation the pipeline needs
pub trait MediaTool {
    fn name(&self) -> &str;

    /// Decode any image and write it in the format implied by `out`'s extension
    fn reencode_image(&self, src: &Path, out: &Path) -> Result<()>;

    /// Composite images side by side into one
    fn hstack_images(&self, inputs: &[PathBuf], out: &Path) -> Result<()>;

    /// Silent mono MP3 of the given length
    fn write_silence(&self, out: &Path, seconds: u32) -> Result<()>;

    /// 44.1 kHz mono 128 kbps MP3, padded or cut to `seconds` when given
    fn normalize_audio(&self, src: &Path, out: &Path, seconds: Option<u32>) -> Result<()>;

    /// Join clips without re-encoding
    fn concat_videos(&self, inputs: &[PathBuf], out: &Path) -> Result<()>;

    /// Re-encode the first `seconds` of a clip
    fn trim_video(&self, src: &Path, out: &Path, seconds: u32) -> Result<()>;

    /// Write one frame taken `seconds_from_end` before the end of a clip
    fn extract_frame_from_end(&self, src: &Path, out: &Path, seconds_from_end: f64) -> Result<()>;
}

/// ffmpeg on the PATH, or at an explicit location
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary: PathBuf,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }
}

impl Ffmpeg {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, args: &[String]) -> Result<()> {
        tracing::debug!(binary = %self.binary.display(), args = %args.join(" "), "running media tool");
        let output = Command::new(&self.binary)
            .arg("-hide_banner")
            .arg("-y")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TocError::ToolMissing(self.binary.display().to_string())
                } else {
                    TocError::ToolFailed {
                        tool: self.binary.display().to_string(),
                        status: "spawn failed".to_string(),
                        stderr: e.to_string(),
                    }
                }
            })?;
        if output.status.success() {
            return Ok(());
        }
        Err(TocError::ToolFailed {
            tool: self.binary.display().to_string(),
            status: output.status.to_string(),
            stderr: last_n_chars(&String::from_utf8_lossy(&output.stderr), 500),
        })
    }
}

fn last_n_chars(s: &str, max_chars: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    let start = chars.len().saturating_sub(max_chars);
    chars[start..].iter().collect::<String>().trim().to_owned()
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn arg(path: &Path) -> String {
    path.display().to_string()
}

/// ffmpeg concat demuxer list: one `file '<path>'` line per clip
pub fn concat_list(inputs: &[PathBuf]) -> String {
    let mut list = String::new();
    for input in inputs {
        let posix = input.to_string_lossy().replace('\\', "/");
        list.push_str(&format!("file '{}'\n", posix));
    }
    list
}

impl MediaTool for Ffmpeg {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn reencode_image(&self, src: &Path, out: &Path) -> Result<()> {
        ensure_parent(out)?;
        self.run(&[
            "-i".into(),
            arg(src),
            "-frames:v".into(),
            "1".into(),
            "-update".into(),
            "1".into(),
            arg(out),
        ])
    }

    fn hstack_images(&self, inputs: &[PathBuf], out: &Path) -> Result<()> {
        if inputs.len() < 2 {
            return Err(TocError::Validation(
                "hstack requires at least 2 inputs".to_string(),
            ));
        }
        ensure_parent(out)?;
        let mut args = Vec::new();
        for input in inputs {
            args.push("-i".to_string());
            args.push(arg(input));
        }
        args.extend([
            "-filter_complex".to_string(),
            format!("hstack=inputs={}", inputs.len()),
            "-frames:v".to_string(),
            "1".to_string(),
            "-update".to_string(),
            "1".to_string(),
            arg(out),
        ]);
        self.run(&args)
    }

    fn write_silence(&self, out: &Path, seconds: u32) -> Result<()> {
        ensure_parent(out)?;
        self.run(&[
            "-f".into(),
            "lavfi".into(),
            "-i".into(),
            "anullsrc=r=44100:cl=mono".into(),
            "-t".into(),
            seconds.to_string(),
            "-q:a".into(),
            "9".into(),
            "-acodec".into(),
            "libmp3lame".into(),
            arg(out),
        ])
    }

    fn normalize_audio(&self, src: &Path, out: &Path, seconds: Option<u32>) -> Result<()> {
        ensure_parent(out)?;
        let mut args: Vec<String> = vec![
            "-i".into(),
            arg(src),
            "-ar".into(),
            "44100".into(),
            "-ac".into(),
            "1".into(),
            "-b:a".into(),
            "128k".into(),
            "-codec:a".into(),
            "libmp3lame".into(),
        ];
        if let Some(seconds) = seconds {
            args.extend(["-af".into(), "apad".into(), "-t".into(), seconds.to_string()]);
        }
        args.push(arg(out));
        self.run(&args)
    }

    fn concat_videos(&self, inputs: &[PathBuf], out: &Path) -> Result<()> {
        ensure_parent(out)?;
        let dir = tempfile::tempdir()?;
        let list_path = dir.path().join("concat.txt");
        let mut list = std::fs::File::create(&list_path)?;
        list.write_all(concat_list(inputs).as_bytes())?;
        drop(list);
        self.run(&[
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            arg(&list_path),
            "-c".into(),
            "copy".into(),
            arg(out),
        ])
    }

    fn trim_video(&self, src: &Path, out: &Path, seconds: u32) -> Result<()> {
        ensure_parent(out)?;
        self.run(&[
            "-i".into(),
            arg(src),
            "-t".into(),
            seconds.to_string(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "medium".into(),
            "-crf".into(),
            "18".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "192k".into(),
            arg(out),
        ])
    }

    fn extract_frame_from_end(&self, src: &Path, out: &Path, seconds_from_end: f64) -> Result<()> {
        ensure_parent(out)?;
        let seconds = seconds_from_end.max(MIN_FRAME_SEEK);
        self.run(&[
            "-sseof".into(),
            format!("-{}", seconds),
            "-i".into(),
            arg(src),
            "-frames:v".into(),
            "1".into(),
            "-q:v".into(),
            "2".into(),
            arg(out),
        ])
    }
}

fn non_empty_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Extract a frame near the end of `src`, retrying further from the end when
/// the tool exits cleanly but writes an empty file.
///
/// A missing tool fails immediately; other failures move on to the next offset.
pub fn extract_frame_best_effort(
    media: &dyn MediaTool,
    src: &Path,
    out: &Path,
    seconds_from_end: f64,
    force: bool,
) -> Result<PathBuf> {
    if !force && non_empty_file(out) {
        return Ok(out.to_path_buf());
    }

    let first = seconds_from_end.max(MIN_FRAME_SEEK);
    let mut last_err = None;
    for offset in std::iter::once(first).chain(FRAME_RETRY_OFFSETS.iter().copied()) {
        match media.extract_frame_from_end(src, out, offset) {
            Ok(()) if non_empty_file(out) => return Ok(out.to_path_buf()),
            Ok(()) => {
                tracing::debug!(offset, src = %src.display(), "empty frame; retrying further from the end");
            }
            Err(e) if e.is_tool_missing() => return Err(e),
            Err(e) => last_err = Some(e),
        }
        std::fs::remove_file(out).ok();
    }

    Err(last_err.unwrap_or_else(|| TocError::ToolFailed {
        tool: media.name().to_string(),
        status: "no frame written".to_string(),
        stderr: format!("Failed to extract chaining frame from: {}", src.display()),
    }))
}
