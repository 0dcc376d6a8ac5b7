//! toc Providers - Generative media provider clients
//!
//! Provides the layered configuration, blocking HTTP plumbing and the
//! image (Gemini, SeaDream), video (Veo, Kling) and speech (ElevenLabs)
//! clients the generator talks to, plus offline mocks for tests.

pub mod config;
pub mod http;
pub mod json_path;
pub mod mime;
pub mod provider;
pub mod providers;
pub mod redact;

pub use config::TocConfig;
pub use json_path::JsonPath;
pub use mime::{guess_mime_from_path, image_suffix_for_mime, sniff_image_mime};
pub use provider::{
    GeneratedImage, GeneratedVideo, ImageProvider, ImageRequest, PollSettings, ProviderStatus,
    SpeechProvider, VideoOutput, VideoProvider, VideoRequest, VideoSubmission, VoiceSettings,
};
pub use providers::{available_tools, normalize_tool_name, ImageTool, NarrationTool, VideoTool};
pub use redact::redact;
