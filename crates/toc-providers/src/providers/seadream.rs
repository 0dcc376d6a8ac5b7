//! SeaDream image generation provider
//!
//! Speaks the OpenAI images API (`POST {base}/images/generations`), so any
//! compatible endpoint works by changing the base URL. Results may arrive as
//! base64 or as a URL to fetch; the MIME type is sniffed from the bytes.

use crate::config::TocConfig;
use crate::http::{header, Headers, HttpClient, REQUEST_TIMEOUT_SECS};
use crate::mime::sniff_image_mime;
use crate::provider::*;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::time::Duration;
use toc_core::{Result, TocError};

/// SeaDream provider for still images
pub struct SeaDreamProvider {
    api_key: String,
    api_base: String,
    model: String,
    size: String,
}

/// Where the image of a response lives
#[derive(Debug, Clone, PartialEq)]
pub enum ImageLocation {
    Inline(Vec<u8>),
    Url(String),
}

impl SeaDreamProvider {
    /// Create a new SeaDreamProvider from config
    pub fn from_config(config: &TocConfig) -> Result<Self> {
        let api_key = config.seadream.api_key.clone().ok_or_else(|| {
            TocError::Config(
                "Missing SEADREAM_API_KEY (required for SeaDream image generation). Set SEADREAM_API_KEY or add to .toc/config.toml".to_string(),
            )
        })?;
        Ok(Self {
            api_key,
            api_base: config.seadream.api_base().trim_end_matches('/').to_string(),
            model: config.seadream.model().to_string(),
            size: config.seadream.size().to_string(),
        })
    }

    fn headers(&self) -> Headers {
        vec![header("authorization", format!("Bearer {}", self.api_key))]
    }

    pub fn build_payload(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": self.size,
            "response_format": "b64_json",
        })
    }
}

/// First usable entry of `data[]`: inline base64 wins over a URL within an entry
pub fn locate_image(response: &Value) -> Result<ImageLocation> {
    let items = response
        .get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for item in items.iter().filter(|i| i.is_object()) {
        let encoded = ["b64_json", "b64", "image_base64"]
            .iter()
            .find_map(|k| item.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()));
        if let Some(encoded) = encoded {
            let bytes = STANDARD.decode(encoded).map_err(|e| {
                TocError::Provider(format!("Invalid base64 image in SeaDream response: {}", e))
            })?;
            return Ok(ImageLocation::Inline(bytes));
        }
        let url = ["url", "image_url"]
            .iter()
            .find_map(|k| item.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()));
        if let Some(url) = url {
            return Ok(ImageLocation::Url(url.to_string()));
        }
    }
    Err(TocError::Provider(
        "No image data found in SeaDream response.".to_string(),
    ))
}

impl ImageProvider for SeaDreamProvider {
    fn name(&self) -> &str {
        "seadream"
    }

    fn supports_reference_images(&self) -> bool {
        false
    }

    fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        let url = format!("{}/images/generations", self.api_base);
        tracing::debug!(model = %self.model, size = %self.size, "requesting SeaDream image");
        let raw = HttpClient::api().post_json(&url, &self.headers(), &self.build_payload(&request.prompt))?;
        let bytes = match locate_image(&raw)? {
            ImageLocation::Inline(bytes) => bytes,
            ImageLocation::Url(image_url) => {
                HttpClient::new(Duration::from_secs(REQUEST_TIMEOUT_SECS.max(60)))
                    .get_bytes(&image_url, &self.headers())?
            }
        };
        let mime_type = Some(sniff_image_mime(&bytes).unwrap_or("image/png").to_string());
        Ok(GeneratedImage {
            bytes,
            mime_type,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload() {
        let config = TocConfig::from_toml_str("[seadream]\napi_key = \"k\"\n").unwrap();
        let provider = SeaDreamProvider::from_config(&config).unwrap();
        assert_eq!(
            provider.build_payload("harbor"),
            json!({
                "model": "seedream-4-5-251128",
                "prompt": "harbor",
                "n": 1,
                "size": "1024x1536",
                "response_format": "b64_json"
            })
        );
        assert_eq!(provider.headers()[0].1, "Bearer k");
    }

    #[test]
    fn test_locate_inline_and_url() {
        let inline = json!({"data": [{"b64_json": "YWJj"}]});
        assert_eq!(locate_image(&inline).unwrap(), ImageLocation::Inline(b"abc".to_vec()));

        let by_url = json!({"data": ["junk", {"b64_json": "", "url": "https://cdn/x.jpg"}]});
        assert_eq!(
            locate_image(&by_url).unwrap(),
            ImageLocation::Url("https://cdn/x.jpg".to_string())
        );
    }

    #[test]
    fn test_locate_nothing() {
        let err = locate_image(&json!({"data": []})).unwrap_err();
        assert!(err.to_string().ends_with("No image data found in SeaDream response."));
    }
}
