//! Layered configuration system
//!
//! Config is loaded with these layers of precedence (highest wins):
//! 1. Environment variables: `GEMINI_API_KEY`, `KLING_ACCESS_KEY`, ...
//! 2. `.env` / `.env.local` in the working directory (never override 1)
//! 3. Project-local: `.toc/config.toml`
//! 4. Global: `~/.toc/config.toml`
//!
//! Command-line flags are applied on top by the caller.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use toc_core::{Result, TocError};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_GEMINI_VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";
pub const DEFAULT_VEO_LAST_IMAGE_FIELD: &str = "endImage";

pub const DEFAULT_SEADREAM_API_BASE: &str = "https://ark.ap-southeast.bytepluses.com/api/v3";
pub const DEFAULT_SEADREAM_MODEL: &str = "seedream-4-5-251128";
pub const DEFAULT_SEADREAM_SIZE: &str = "1024x1536";

pub const DEFAULT_KLING_API_BASE: &str = "https://api.klingai.com";
pub const DEFAULT_KLING_VIDEO_MODEL: &str = "kling-3.0";
pub const DEFAULT_KLING_SUBMIT_PATH: &str = "/v1/videos/generations";
pub const DEFAULT_KLING_STATUS_PATH_TEMPLATE: &str = "/v1/videos/generations/{operation_id}";
pub const DEFAULT_KLING_OPERATION_ID_PATHS: &str = "data.id,id,task_id,data.task_id";
pub const DEFAULT_KLING_STATUS_PATHS: &str = "status,data.status,task.status,data.task_status";
pub const DEFAULT_KLING_DONE_STATUSES: &str = "succeeded,success,completed,done,finished";
pub const DEFAULT_KLING_FAILED_STATUSES: &str = "failed,error,cancelled,canceled,rejected";
pub const DEFAULT_KLING_VIDEO_URL_PATHS: &str = "data.video.url,data.video_url,data.output.url,video.url,video_url,output.video_url,result.video.url";

pub const DEFAULT_ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io/v1";
pub const DEFAULT_ELEVENLABS_VOICE_ID: &str = "JOcmGzB8OFjY8MhjHHEf";
pub const DEFAULT_ELEVENLABS_MODEL_ID: &str = "eleven_multilingual_v2";
pub const DEFAULT_ELEVENLABS_OUTPUT_FORMAT: &str = "mp3_44100_128";
const PLACEHOLDER_VOICE_IDS: &[&str] = &["your_voice_id", "voice_id_tbd", "tbd"];

/// Overwrite each listed field of `$base` when the overlay has it set
macro_rules! overlay_fields {
    ($base:expr, $overlay:expr; $($field:ident),+ $(,)?) => {
        $(
            if $overlay.$field.is_some() {
                $base.$field = $overlay.$field;
            }
        )+
    };
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// Gemini image generation and Veo video generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub image_model: Option<String>,
    pub video_model: Option<String>,
    pub veo_last_image_field: Option<String>,
}

impl GeminiSettings {
    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_GEMINI_API_BASE)
    }

    pub fn image_model(&self) -> &str {
        self.image_model.as_deref().unwrap_or(DEFAULT_GEMINI_IMAGE_MODEL)
    }

    pub fn video_model(&self) -> &str {
        self.video_model.as_deref().unwrap_or(DEFAULT_GEMINI_VIDEO_MODEL)
    }

    pub fn veo_last_image_field(&self) -> &str {
        self.veo_last_image_field
            .as_deref()
            .unwrap_or(DEFAULT_VEO_LAST_IMAGE_FIELD)
    }

    fn overlay(&mut self, other: Self) {
        overlay_fields!(self, other; api_key, api_base, image_model, video_model, veo_last_image_field);
    }
}

/// SeaDream (OpenAI-images compatible) image generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeaDreamSettings {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub model: Option<String>,
    pub size: Option<String>,
}

impl SeaDreamSettings {
    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_SEADREAM_API_BASE)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_SEADREAM_MODEL)
    }

    pub fn size(&self) -> &str {
        self.size.as_deref().unwrap_or(DEFAULT_SEADREAM_SIZE)
    }

    fn overlay(&mut self, other: Self) {
        overlay_fields!(self, other; api_key, api_base, model, size);
    }
}

/// Kling video generation: static key or access/secret key JWT
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KlingSettings {
    pub api_key: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub api_base: Option<String>,
    pub video_model: Option<String>,
    pub submit_path: Option<String>,
    pub status_path_template: Option<String>,
    pub api_key_header: Option<String>,
    pub api_key_prefix: Option<String>,
    pub jwt_expiration_seconds: Option<u64>,
    pub jwt_clock_skew_seconds: Option<u64>,
    pub operation_id_paths: Option<Vec<String>>,
    pub status_paths: Option<Vec<String>>,
    pub done_statuses: Option<Vec<String>>,
    pub failed_statuses: Option<Vec<String>>,
    pub video_url_paths: Option<Vec<String>>,
    /// Deep-merged into every submit payload
    pub extra_payload: Option<serde_json::Value>,
}

impl KlingSettings {
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() || (self.access_key.is_some() && self.secret_key.is_some())
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_KLING_API_BASE)
    }

    pub fn video_model(&self) -> &str {
        self.video_model.as_deref().unwrap_or(DEFAULT_KLING_VIDEO_MODEL)
    }

    pub fn submit_path(&self) -> &str {
        self.submit_path.as_deref().unwrap_or(DEFAULT_KLING_SUBMIT_PATH)
    }

    pub fn status_path_template(&self) -> &str {
        self.status_path_template
            .as_deref()
            .unwrap_or(DEFAULT_KLING_STATUS_PATH_TEMPLATE)
    }

    pub fn api_key_header(&self) -> &str {
        self.api_key_header.as_deref().unwrap_or("authorization")
    }

    pub fn api_key_prefix(&self) -> &str {
        self.api_key_prefix.as_deref().unwrap_or("Bearer ")
    }

    pub fn jwt_expiration_seconds(&self) -> u64 {
        self.jwt_expiration_seconds.unwrap_or(1800)
    }

    pub fn jwt_clock_skew_seconds(&self) -> u64 {
        self.jwt_clock_skew_seconds.unwrap_or(5)
    }

    pub fn operation_id_paths(&self) -> Vec<String> {
        list_or_default(&self.operation_id_paths, DEFAULT_KLING_OPERATION_ID_PATHS)
    }

    pub fn status_paths(&self) -> Vec<String> {
        list_or_default(&self.status_paths, DEFAULT_KLING_STATUS_PATHS)
    }

    pub fn done_statuses(&self) -> Vec<String> {
        lowercase(list_or_default(&self.done_statuses, DEFAULT_KLING_DONE_STATUSES))
    }

    pub fn failed_statuses(&self) -> Vec<String> {
        lowercase(list_or_default(&self.failed_statuses, DEFAULT_KLING_FAILED_STATUSES))
    }

    pub fn video_url_paths(&self) -> Vec<String> {
        list_or_default(&self.video_url_paths, DEFAULT_KLING_VIDEO_URL_PATHS)
    }

    fn overlay(&mut self, other: Self) {
        overlay_fields!(self, other;
            api_key, access_key, secret_key, api_base, video_model, submit_path,
            status_path_template, api_key_header, api_key_prefix, jwt_expiration_seconds,
            jwt_clock_skew_seconds, operation_id_paths, status_paths, done_statuses,
            failed_statuses, video_url_paths, extra_payload,
        );
    }
}

fn list_or_default(list: &Option<Vec<String>>, default_csv: &str) -> Vec<String> {
    match list {
        Some(items) if !items.is_empty() => items.clone(),
        _ => split_csv(default_csv),
    }
}

fn lowercase(items: Vec<String>) -> Vec<String> {
    items.into_iter().map(|s| s.trim().to_lowercase()).collect()
}

/// ElevenLabs text-to-speech
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevenLabsSettings {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub voice_id: Option<String>,
    pub model_id: Option<String>,
    pub output_format: Option<String>,
}

impl ElevenLabsSettings {
    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_ELEVENLABS_API_BASE)
    }

    /// Configured voice, or the default voice when unset or a placeholder
    pub fn voice_id(&self) -> &str {
        match self.voice_id.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_ELEVENLABS_VOICE_ID,
            Some(v) if PLACEHOLDER_VOICE_IDS.contains(&v.to_lowercase().as_str()) => {
                tracing::warn!(
                    voice_id = v,
                    default = DEFAULT_ELEVENLABS_VOICE_ID,
                    "ELEVENLABS_VOICE_ID looks like a placeholder; falling back to the default voice"
                );
                DEFAULT_ELEVENLABS_VOICE_ID
            }
            Some(v) => v,
        }
    }

    pub fn model_id(&self) -> &str {
        self.model_id.as_deref().unwrap_or(DEFAULT_ELEVENLABS_MODEL_ID)
    }

    pub fn output_format(&self) -> &str {
        self.output_format
            .as_deref()
            .unwrap_or(DEFAULT_ELEVENLABS_OUTPUT_FORMAT)
    }

    fn overlay(&mut self, other: Self) {
        overlay_fields!(self, other; api_key, api_base, voice_id, model_id, output_format);
    }
}

/// Run defaults for the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub default_scene_seconds: Option<u32>,
    pub image_size: Option<String>,
    pub video_resolution: Option<String>,
    pub poll_every_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
}

impl GenerationSettings {
    pub fn default_scene_seconds(&self) -> u32 {
        self.default_scene_seconds.unwrap_or(6)
    }

    pub fn image_size(&self) -> &str {
        self.image_size.as_deref().unwrap_or("2K")
    }

    pub fn video_resolution(&self) -> &str {
        self.video_resolution.as_deref().unwrap_or("720p")
    }

    pub fn poll_every_seconds(&self) -> u64 {
        self.poll_every_seconds.unwrap_or(5)
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(900)
    }

    fn overlay(&mut self, other: Self) {
        overlay_fields!(self, other;
            default_scene_seconds, image_size, video_resolution, poll_every_seconds, timeout_seconds,
        );
    }
}

/// Resolved configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TocConfig {
    pub gemini: GeminiSettings,
    pub seadream: SeaDreamSettings,
    pub kling: KlingSettings,
    pub elevenlabs: ElevenLabsSettings,
    pub generation: GenerationSettings,
}

impl TocConfig {
    /// Load config with layered precedence: global < project < .env files < env vars
    pub fn load() -> Result<Self> {
        let mut config = TocConfig::default();

        // Layer 1: Global config (~/.toc/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                config.overlay(Self::load_file(&global_path)?);
            }
        }

        // Layer 2: Project-local config (.toc/config.toml)
        let local_path = PathBuf::from(".toc/config.toml");
        if local_path.exists() {
            config.overlay(Self::load_file(&local_path)?);
        }

        // Layer 3: .env files, then the environment itself
        Self::load_env_files(Path::new("."))?;
        config.apply_env_overrides();

        Ok(config)
    }

    /// Load config from a specific file path only (for testing)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a config file body without consulting the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| TocError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Values from `overlay` replace ours wherever they are set
    pub fn overlay(&mut self, overlay: TocConfig) {
        self.gemini.overlay(overlay.gemini);
        self.seadream.overlay(overlay.seadream);
        self.kling.overlay(overlay.kling);
        self.elevenlabs.overlay(overlay.elevenlabs);
        self.generation.overlay(overlay.generation);
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Apply provider variables read through `lookup`; empty values count as unset
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let get_u64 = |name: &str| {
            let raw = get(name)?;
            match raw.trim().parse::<u64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(variable = name, value = %raw, "ignoring non-numeric value");
                    None
                }
            }
        };
        let get_list = |name: &str| get(name).map(|v| split_csv(&v));

        let gemini = GeminiSettings {
            api_key: get("GEMINI_API_KEY"),
            api_base: get("GEMINI_API_BASE"),
            image_model: get("GEMINI_IMAGE_MODEL"),
            video_model: get("GEMINI_VIDEO_MODEL"),
            veo_last_image_field: get("GEMINI_VEO_LAST_IMAGE_FIELD"),
        };
        let seadream = SeaDreamSettings {
            api_key: get("SEADREAM_API_KEY"),
            api_base: get("SEADREAM_API_BASE"),
            model: get("SEADREAM_MODEL"),
            size: get("SEADREAM_SIZE"),
        };
        let kling = KlingSettings {
            api_key: get("KLING_API_KEY"),
            access_key: get("KLING_ACCESS_KEY"),
            secret_key: get("KLING_SECRET_KEY"),
            api_base: get("KLING_API_BASE"),
            video_model: get("KLING_VIDEO_MODEL"),
            submit_path: get("KLING_VIDEO_SUBMIT_PATH"),
            status_path_template: get("KLING_VIDEO_STATUS_PATH_TEMPLATE"),
            api_key_header: get("KLING_API_KEY_HEADER"),
            api_key_prefix: get("KLING_API_KEY_PREFIX"),
            jwt_expiration_seconds: get_u64("KLING_JWT_EXPIRATION_SECONDS"),
            jwt_clock_skew_seconds: get_u64("KLING_JWT_CLOCK_SKEW_SECONDS"),
            operation_id_paths: get_list("KLING_OPERATION_ID_PATHS"),
            status_paths: get_list("KLING_STATUS_PATHS"),
            done_statuses: get_list("KLING_DONE_STATUSES"),
            failed_statuses: get_list("KLING_FAILED_STATUSES"),
            video_url_paths: get_list("KLING_VIDEO_URL_PATHS"),
            extra_payload: None,
        };
        let elevenlabs = ElevenLabsSettings {
            api_key: get("ELEVENLABS_API_KEY"),
            api_base: get("ELEVENLABS_API_BASE"),
            voice_id: get("ELEVENLABS_VOICE_ID"),
            model_id: get("ELEVENLABS_MODEL_ID"),
            output_format: get("ELEVENLABS_OUTPUT_FORMAT"),
        };

        self.overlay(TocConfig {
            gemini,
            seadream,
            kling,
            elevenlabs,
            generation: GenerationSettings::default(),
        });
    }

    /// Load `.env` then `.env.local` from `dir` without overriding variables already set
    pub fn load_env_files(dir: &Path) -> Result<()> {
        for name in [".env", ".env.local"] {
            let path = dir.join(name);
            if !path.is_file() {
                continue;
            }
            dotenvy::from_path(&path).map_err(|e| {
                TocError::Config(format!("Failed to load {}: {}", path.display(), e))
            })?;
            tracing::debug!(path = %path.display(), "loaded env file");
        }
        Ok(())
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".toc").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<TocConfig> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            TocError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn temp_config(content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("toc_config_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_load_config_from_file() {
        let config_str = r#"
[gemini]
image_model = "gemini-test-image"

[kling]
access_key = "ak"
secret_key = "sk"
status_paths = ["data.state"]

[kling.extra_payload]
mode = "pro"

[kling.extra_payload.camera]
type = "simple"

[generation]
default_scene_seconds = 6
"#;
        let path = temp_config(config_str);
        let config = TocConfig::load_from_file(&path).unwrap();

        assert_eq!(config.gemini.image_model(), "gemini-test-image");
        assert_eq!(config.gemini.video_model(), DEFAULT_GEMINI_VIDEO_MODEL);
        assert!(config.kling.has_credentials());
        assert_eq!(config.kling.status_paths(), vec!["data.state"]);
        let extra = config.kling.extra_payload.as_ref().unwrap();
        assert_eq!(extra["mode"], serde_json::json!("pro"));
        assert_eq!(extra["camera"]["type"], serde_json::json!("simple"));
        assert_eq!(config.generation.default_scene_seconds(), 6);
        assert_eq!(config.generation.image_size(), "2K");

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_env_overrides_file_and_ignores_empty() {
        let mut config = TocConfig::from_toml_str(
            "[elevenlabs]\napi_key = \"file-key\"\nmodel_id = \"file-model\"\n",
        )
        .unwrap();
        config.apply_env_with(env(&[
            ("ELEVENLABS_API_KEY", "env-key"),
            ("ELEVENLABS_MODEL_ID", ""),
            ("KLING_DONE_STATUSES", "OK, Ready ,"),
            ("KLING_JWT_EXPIRATION_SECONDS", "600"),
        ]));

        assert_eq!(config.elevenlabs.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.elevenlabs.model_id(), "file-model");
        assert_eq!(config.kling.done_statuses(), vec!["ok", "ready"]);
        assert_eq!(config.kling.jwt_expiration_seconds(), 600);
    }

    #[test]
    fn test_overlay_keeps_unset_fields() {
        let mut base = TocConfig::from_toml_str("[seadream]\nmodel = \"a\"\nsize = \"1x1\"\n").unwrap();
        let overlay = TocConfig::from_toml_str("[seadream]\nsize = \"2x2\"\n").unwrap();
        base.overlay(overlay);
        assert_eq!(base.seadream.model(), "a");
        assert_eq!(base.seadream.size(), "2x2");
    }

    #[test]
    fn test_defaults() {
        let config = TocConfig::default();
        assert_eq!(config.kling.api_key_prefix(), "Bearer ");
        assert_eq!(config.kling.jwt_clock_skew_seconds(), 5);
        assert_eq!(
            config.kling.operation_id_paths(),
            vec!["data.id", "id", "task_id", "data.task_id"]
        );
        assert_eq!(config.kling.failed_statuses().len(), 5);
        assert!(!config.kling.has_credentials());
        assert_eq!(config.elevenlabs.output_format(), "mp3_44100_128");
        assert_eq!(config.seadream.size(), "1024x1536");
    }

    #[test]
    fn test_placeholder_voice_falls_back() {
        let mut settings = ElevenLabsSettings {
            voice_id: Some("TBD".to_string()),
            ..Default::default()
        };
        assert_eq!(settings.voice_id(), DEFAULT_ELEVENLABS_VOICE_ID);
        settings.voice_id = Some("  ".to_string());
        assert_eq!(settings.voice_id(), DEFAULT_ELEVENLABS_VOICE_ID);
        settings.voice_id = Some("abc123".to_string());
        assert_eq!(settings.voice_id(), "abc123");
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = TocConfig::from_toml_str("[gemini\n").unwrap_err();
        assert!(matches!(err, TocError::Config(_)));
    }

    #[test]
    fn test_env_files_do_not_override() {
        let dir = std::env::temp_dir().join(format!("toc_env_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let var = format!("TOC_TEST_VAR_{}", uuid::Uuid::new_v4().simple());
        std::fs::write(dir.join(".env"), format!("{}=from_env_file\n", var)).unwrap();
        std::fs::write(dir.join(".env.local"), format!("{}=from_local\n", var)).unwrap();

        TocConfig::load_env_files(&dir).unwrap();
        assert_eq!(std::env::var(&var).unwrap(), "from_env_file");

        std::env::remove_var(&var);
        std::fs::remove_dir_all(&dir).ok();
    }
}
