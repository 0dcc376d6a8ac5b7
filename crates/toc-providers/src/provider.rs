//! Provider traits and request/result types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use toc_core::{Result, TocError};

/// Whether a provider can be constructed from the current configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Available,
    /// Needs no credentials (mock, silence)
    Offline,
    NoApiKey(&'static str),
}

/// A request to generate one still image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub aspect_ratio: String,
    pub image_size: String,
    pub reference_images: Vec<PathBuf>,
}

/// Raw image bytes as returned by a provider
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    /// Declared or sniffed MIME type
    pub mime_type: Option<String>,
    /// Full provider response, for logging
    pub raw: Value,
}

/// Trait implemented by each image provider (Gemini, SeaDream, Mock)
pub trait ImageProvider {
    fn name(&self) -> &str;

    /// Whether `reference_images` are sent with the request
    fn supports_reference_images(&self) -> bool {
        true
    }

    /// Generate an image synchronously (blocks until complete)
    fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage>;
}

/// A request to generate one video clip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub duration_seconds: u32,
    pub aspect_ratio: String,
    pub resolution: String,
    pub first_frame: Option<PathBuf>,
    pub last_frame: Option<PathBuf>,
    pub reference_images: Vec<PathBuf>,
}

impl VideoRequest {
    /// `F2F` (first and last frame), `I2V` (first frame) or `T2V` (text only)
    pub fn kind(&self) -> &'static str {
        match (&self.first_frame, &self.last_frame) {
            (Some(_), Some(_)) => "F2F",
            (Some(_), None) => "I2V",
            _ => "T2V",
        }
    }
}

/// Outcome of submitting a video job
#[derive(Debug, Clone)]
pub enum VideoSubmission {
    /// The provider answered with a finished result
    Completed(Value),
    /// A long-running operation to poll
    Pending { handle: String, response: Value },
}

/// Where the finished video lives
#[derive(Debug, Clone, PartialEq)]
pub enum VideoOutput {
    Bytes(Vec<u8>),
    Uri(String),
}

/// Poll interval and overall deadline for long-running operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub every: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            every: Duration::from_secs(5),
            timeout: Duration::from_secs(900),
        }
    }
}

/// A finished video clip
#[derive(Debug, Clone)]
pub struct GeneratedVideo {
    pub bytes: Vec<u8>,
    /// Submit and final operation responses, for logging
    pub raw: Value,
}

/// Trait implemented by each video provider (Veo, Kling, Mock)
pub trait VideoProvider {
    fn name(&self) -> &str;

    fn supports_reference_images(&self) -> bool {
        false
    }

    /// Submit a generation job
    fn start_video(&self, request: &VideoRequest) -> Result<VideoSubmission>;

    /// Fetch the current state of an operation
    fn get_operation(&self, handle: &str) -> Result<Value>;

    /// Whether the operation reached a terminal state (success or failure)
    fn is_terminal(&self, operation: &Value) -> bool;

    fn is_failed(&self, operation: &Value) -> bool;

    /// Locate the video in a finished operation
    fn extract_video(&self, operation: &Value) -> Result<VideoOutput>;

    fn download(&self, uri: &str) -> Result<Vec<u8>>;

    /// Submit, poll to completion and fetch the clip
    fn generate_video(&self, request: &VideoRequest, poll: &PollSettings) -> Result<GeneratedVideo> {
        let (submit, operation) = match self.start_video(request)? {
            VideoSubmission::Completed(operation) => (Value::Null, operation),
            VideoSubmission::Pending { handle, response } => {
                tracing::info!(provider = self.name(), operation = %handle, "waiting for video operation");
                let operation = poll_until(&handle, poll, || {
                    let op = self.get_operation(&handle)?;
                    Ok(self.is_terminal(&op).then_some(op))
                })?;
                (response, operation)
            }
        };

        if self.is_failed(&operation) {
            return Err(TocError::Provider(format!(
                "{} operation failed: {}",
                self.name(),
                operation
            )));
        }

        let bytes = match self.extract_video(&operation)? {
            VideoOutput::Bytes(bytes) => bytes,
            VideoOutput::Uri(uri) => self.download(&uri)?,
        };
        Ok(GeneratedVideo {
            bytes,
            raw: serde_json::json!({"submit": submit, "operation": operation}),
        })
    }
}

/// Default ElevenLabs-style voice settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stability: f64,
    pub similarity_boost: f64,
    pub style: f64,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.35,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
        }
    }
}

/// Trait implemented by each text-to-speech provider (ElevenLabs, Mock)
pub trait SpeechProvider {
    fn name(&self) -> &str;

    /// The JSON body that `synthesize` would send, for request logs
    fn request_payload(&self, text: &str) -> Value;

    fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Call `check` every `poll.every` until it yields a value or the deadline passes
pub fn poll_until<T>(
    handle: &str,
    poll: &PollSettings,
    mut check: impl FnMut() -> Result<Option<T>>,
) -> Result<T> {
    let started = Instant::now();
    loop {
        if let Some(done) = check()? {
            return Ok(done);
        }
        if started.elapsed() >= poll.timeout {
            return Err(TocError::Timeout(handle.to_string()));
        }
        std::thread::sleep(poll.every);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_video_kind() {
        let mut request = VideoRequest::default();
        assert_eq!(request.kind(), "T2V");
        request.first_frame = Some(PathBuf::from("a.png"));
        assert_eq!(request.kind(), "I2V");
        request.last_frame = Some(PathBuf::from("b.png"));
        assert_eq!(request.kind(), "F2F");
    }

    #[test]
    fn test_poll_until_returns_when_ready() {
        let calls = Cell::new(0);
        let poll = PollSettings {
            every: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        };
        let result = poll_until("op-1", &poll, || {
            calls.set(calls.get() + 1);
            Ok((calls.get() == 3).then_some("done"))
        })
        .unwrap();
        assert_eq!(result, "done");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_poll_until_times_out_with_handle() {
        let poll = PollSettings {
            every: Duration::from_millis(1),
            timeout: Duration::from_millis(5),
        };
        let err = poll_until::<()>("operations/abc", &poll, || Ok(None)).unwrap_err();
        assert!(matches!(err, TocError::Timeout(ref h) if h == "operations/abc"));
        assert_eq!(
            err.to_string(),
            "Timed out waiting for operation: operations/abc"
        );
    }

    #[test]
    fn test_voice_settings_defaults() {
        let json = serde_json::to_value(VoiceSettings::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "stability": 0.35,
                "similarity_boost": 0.75,
                "style": 0.0,
                "use_speaker_boost": true
            })
        );
    }
}
