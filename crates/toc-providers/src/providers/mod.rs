//! Provider registry
//!
//! Maps manifest tool names to concrete implementations.

pub mod elevenlabs;
pub mod gemini;
pub mod kling;
pub mod mock;
pub mod seadream;
pub mod veo;

use crate::config::TocConfig;
use crate::mime::guess_mime_from_path;
use crate::provider::{ImageProvider, ProviderStatus, SpeechProvider, VideoProvider};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use toc_core::Result;

/// Trim, lowercase and replace spaces with `_`
pub fn normalize_tool_name(tool: &str) -> String {
    tool.trim().to_lowercase().replace(' ', "_")
}

/// Read an image file as (MIME type, base64 data) for inline JSON payloads
pub(crate) fn inline_image(path: &Path) -> Result<(&'static str, String)> {
    let bytes = std::fs::read(path)?;
    Ok((guess_mime_from_path(path), STANDARD.encode(bytes)))
}

/// Image generation tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTool {
    GeminiImage,
    SeaDream,
    Mock,
}

impl ImageTool {
    pub const ALL: [ImageTool; 3] = [ImageTool::GeminiImage, ImageTool::SeaDream, ImageTool::Mock];

    pub fn from_name(tool: &str) -> Option<Self> {
        match normalize_tool_name(tool).as_str() {
            "google_nanobanana_pro" | "nanobanana_pro" => Some(Self::GeminiImage),
            "seadream" | "seedream" | "seedream_4_5" | "byteplus_seedream_4_5" => {
                Some(Self::SeaDream)
            }
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::GeminiImage => "google_nanobanana_pro",
            Self::SeaDream => "seadream",
            Self::Mock => "mock",
        }
    }

    pub fn create(self, config: &TocConfig) -> Result<Box<dyn ImageProvider>> {
        Ok(match self {
            Self::GeminiImage => Box::new(gemini::GeminiImageProvider::from_config(config)?),
            Self::SeaDream => Box::new(seadream::SeaDreamProvider::from_config(config)?),
            Self::Mock => Box::new(mock::MockImageProvider::new()),
        })
    }

    pub fn model_label(self, config: &TocConfig) -> String {
        match self {
            Self::GeminiImage => config.gemini.image_model().to_string(),
            Self::SeaDream => config.seadream.model().to_string(),
            Self::Mock => "mock".to_string(),
        }
    }

    pub fn status(self, config: &TocConfig) -> ProviderStatus {
        match self {
            Self::GeminiImage if config.gemini.api_key.is_none() => {
                ProviderStatus::NoApiKey("GEMINI_API_KEY")
            }
            Self::SeaDream if config.seadream.api_key.is_none() => {
                ProviderStatus::NoApiKey("SEADREAM_API_KEY")
            }
            Self::Mock => ProviderStatus::Offline,
            _ => ProviderStatus::Available,
        }
    }
}

/// Video generation tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoTool {
    Veo,
    Kling,
    Mock,
}

impl VideoTool {
    pub const ALL: [VideoTool; 3] = [VideoTool::Veo, VideoTool::Kling, VideoTool::Mock];

    pub fn from_name(tool: &str) -> Option<Self> {
        match normalize_tool_name(tool).as_str() {
            "google_veo_3_1" => Some(Self::Veo),
            "kling_3_0" | "kling" => Some(Self::Kling),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Veo => "google_veo_3_1",
            Self::Kling => "kling_3_0",
            Self::Mock => "mock",
        }
    }

    /// Per-call clip lengths, or `None` when any duration is accepted
    pub fn allowed_durations(self) -> Option<&'static [u32]> {
        match self {
            Self::Veo | Self::Mock => Some(veo::VEO_ALLOWED_DURATIONS),
            Self::Kling => None,
        }
    }

    pub fn create(self, config: &TocConfig) -> Result<Box<dyn VideoProvider>> {
        Ok(match self {
            Self::Veo => Box::new(veo::VeoProvider::from_config(config)?),
            Self::Kling => Box::new(kling::KlingProvider::from_config(config)?),
            Self::Mock => Box::new(mock::MockVideoProvider::new()),
        })
    }

    pub fn model_label(self, config: &TocConfig) -> String {
        match self {
            Self::Veo => config.gemini.video_model().to_string(),
            Self::Kling => config.kling.video_model().to_string(),
            Self::Mock => "mock".to_string(),
        }
    }

    pub fn status(self, config: &TocConfig) -> ProviderStatus {
        match self {
            Self::Veo if config.gemini.api_key.is_none() => {
                ProviderStatus::NoApiKey("GEMINI_API_KEY")
            }
            Self::Kling if !config.kling.has_credentials() => {
                ProviderStatus::NoApiKey("KLING_API_KEY")
            }
            Self::Mock => ProviderStatus::Offline,
            _ => ProviderStatus::Available,
        }
    }
}

/// Narration tools; an unset tool means a silent placeholder track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NarrationTool {
    ElevenLabs,
    Silence,
    Mock,
}

impl NarrationTool {
    pub const ALL: [NarrationTool; 3] =
        [NarrationTool::ElevenLabs, NarrationTool::Silence, NarrationTool::Mock];

    pub fn from_name(tool: Option<&str>) -> Option<Self> {
        match normalize_tool_name(tool.unwrap_or_default()).as_str() {
            "elevenlabs" => Some(Self::ElevenLabs),
            "" | "tbd" => Some(Self::Silence),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ElevenLabs => "elevenlabs",
            Self::Silence => "tbd",
            Self::Mock => "mock",
        }
    }

    /// `None` for the silent placeholder, which needs no provider
    pub fn create(self, config: &TocConfig) -> Result<Option<Box<dyn SpeechProvider>>> {
        Ok(match self {
            Self::ElevenLabs => Some(Box::new(elevenlabs::ElevenLabsProvider::from_config(
                config,
            )?)),
            Self::Silence => None,
            Self::Mock => Some(Box::new(mock::MockSpeechProvider::new())),
        })
    }

    pub fn status(self, config: &TocConfig) -> ProviderStatus {
        match self {
            Self::ElevenLabs if config.elevenlabs.api_key.is_none() => {
                ProviderStatus::NoApiKey("ELEVENLABS_API_KEY")
            }
            Self::ElevenLabs => ProviderStatus::Available,
            Self::Silence | Self::Mock => ProviderStatus::Offline,
        }
    }
}

/// Canonical tool names accepted in manifests, grouped by pass
pub fn available_tools() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        (
            "image",
            vec!["google_nanobanana_pro", "nanobanana_pro", "seadream", "seedream", "seedream_4_5", "byteplus_seedream_4_5", "mock"],
        ),
        ("video", vec!["google_veo_3_1", "kling_3_0", "kling", "mock"]),
        ("narration", vec!["elevenlabs", "tbd", "mock"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_normalize() {
        assert_eq!(normalize_tool_name("  Google NanoBanana Pro "), "google_nanobanana_pro");
        assert_eq!(ImageTool::from_name("Seedream 4.5"), None);
        assert_eq!(ImageTool::from_name("seedream_4_5"), Some(ImageTool::SeaDream));
        assert_eq!(ImageTool::from_name("nanobanana pro"), Some(ImageTool::GeminiImage));
        assert_eq!(VideoTool::from_name("Kling"), Some(VideoTool::Kling));
        assert_eq!(VideoTool::from_name("sora"), None);
        assert_eq!(NarrationTool::from_name(None), Some(NarrationTool::Silence));
        assert_eq!(NarrationTool::from_name(Some("TBD")), Some(NarrationTool::Silence));
        assert_eq!(NarrationTool::from_name(Some("ElevenLabs")), Some(NarrationTool::ElevenLabs));
        assert_eq!(NarrationTool::from_name(Some("polly")), None);
    }

    #[test]
    fn test_every_listed_tool_resolves() {
        for (pass, names) in available_tools() {
            for name in names {
                let known = match pass {
                    "image" => ImageTool::from_name(name).is_some(),
                    "video" => VideoTool::from_name(name).is_some(),
                    _ => NarrationTool::from_name(Some(name)).is_some(),
                };
                assert!(known, "{} tool {} does not resolve", pass, name);
            }
        }
    }

    #[test]
    fn test_allowed_durations() {
        assert_eq!(VideoTool::Veo.allowed_durations(), Some(&[4u32, 6, 8][..]));
        assert_eq!(VideoTool::Kling.allowed_durations(), None);
    }

    #[test]
    fn test_status_reports_missing_keys() {
        let config = TocConfig::default();
        assert_eq!(ImageTool::GeminiImage.status(&config), ProviderStatus::NoApiKey("GEMINI_API_KEY"));
        assert_eq!(VideoTool::Kling.status(&config), ProviderStatus::NoApiKey("KLING_API_KEY"));
        assert_eq!(NarrationTool::Silence.status(&config), ProviderStatus::Offline);

        let keyed = TocConfig::from_toml_str("[kling]\naccess_key = \"a\"\nsecret_key = \"s\"\n").unwrap();
        assert_eq!(VideoTool::Kling.status(&keyed), ProviderStatus::Available);
    }

    #[test]
    fn test_create_mock_and_missing_key() {
        let config = TocConfig::default();
        assert_eq!(ImageTool::Mock.create(&config).unwrap().name(), "mock");
        assert!(NarrationTool::Silence.create(&config).unwrap().is_none());
        let err = VideoTool::Veo.create(&config).err().unwrap();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_inline_image() {
        let dir = std::env::temp_dir().join(format!("toc_inline_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ref.webp");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(inline_image(&path).unwrap(), ("image/webp", "YWJj".to_string()));
        assert!(inline_image(&dir.join("missing.png")).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
