//! ElevenLabs text-to-speech provider

use crate::config::TocConfig;
use crate::http::{header, Headers, HttpClient};
use crate::provider::{SpeechProvider, VoiceSettings};
use serde_json::{json, Value};
use toc_core::{Result, TocError};
use url::Url;

pub struct ElevenLabsProvider {
    api_key: String,
    api_base: String,
    voice_id: String,
    model_id: String,
    output_format: String,
    voice_settings: VoiceSettings,
}

impl ElevenLabsProvider {
    /// Create a new ElevenLabsProvider from config
    pub fn from_config(config: &TocConfig) -> Result<Self> {
        let settings = &config.elevenlabs;
        let api_key = settings.api_key.clone().ok_or_else(|| {
            TocError::Config(
                "Missing ELEVENLABS_API_KEY (required for ElevenLabs TTS). Set ELEVENLABS_API_KEY or add to .toc/config.toml".to_string(),
            )
        })?;
        Ok(Self {
            api_key,
            api_base: settings.api_base().to_string(),
            voice_id: settings.voice_id().to_string(),
            model_id: settings.model_id().to_string(),
            output_format: settings.output_format().to_string(),
            voice_settings: VoiceSettings::default(),
        })
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    /// `{base}/text-to-speech/{voice}?output_format={format}`, voice percent-encoded
    pub fn endpoint(&self) -> Result<Url> {
        let mut url = Url::parse(&self.api_base).map_err(|e| {
            TocError::Config(format!("Invalid ElevenLabs API base '{}': {}", self.api_base, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                TocError::Config(format!("ElevenLabs API base cannot be a base URL: {}", self.api_base))
            })?
            .pop_if_empty()
            .push("text-to-speech")
            .push(&self.voice_id);
        url.query_pairs_mut()
            .append_pair("output_format", &self.output_format);
        Ok(url)
    }

    fn headers(&self) -> Headers {
        vec![
            header("xi-api-key", self.api_key.as_str()),
            header("accept", "audio/mpeg"),
        ]
    }
}

impl SpeechProvider for ElevenLabsProvider {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    fn request_payload(&self, text: &str) -> Value {
        json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": self.voice_settings,
        })
    }

    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let url = self.endpoint()?;
        tracing::debug!(voice = %self.voice_id, model = %self.model_id, chars = text.chars().count(), "requesting speech");
        HttpClient::api().post_json_for_bytes(url.as_str(), &self.headers(), &self.request_payload(text))
    }
}
