//! Gemini image generation provider
//!
//! `POST {base}/models/{model}:generateContent` with the prompt as a text part
//! followed by each reference image as inline data. The first inline image in
//! the response wins.

use super::inline_image;
use crate::config::TocConfig;
use crate::http::{header, Headers, HttpClient};
use crate::provider::*;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::path::Path;
use toc_core::{Result, TocError};

/// Gemini provider for still images
pub struct GeminiImageProvider {
    api_key: String,
    api_base: String,
    model: String,
}

impl GeminiImageProvider {
    /// Create a new GeminiImageProvider from config
    pub fn from_config(config: &TocConfig) -> Result<Self> {
        let api_key = gemini_api_key(config)?;
        Ok(Self {
            api_key,
            api_base: config.gemini.api_base().trim_end_matches('/').to_string(),
            model: config.gemini.image_model().to_string(),
        })
    }

    fn headers(&self) -> Headers {
        vec![header("x-goog-api-key", self.api_key.as_str())]
    }
}

/// Shared with Veo: both use the Gemini API key
pub(crate) fn gemini_api_key(config: &TocConfig) -> Result<String> {
    config.gemini.api_key.clone().ok_or_else(|| {
        TocError::Config(
            "Missing GEMINI_API_KEY (required for Gemini image/video). Set GEMINI_API_KEY or add to .toc/config.toml".to_string(),
        )
    })
}

/// Build the generateContent body
pub fn build_image_payload(
    prompt: &str,
    aspect_ratio: &str,
    image_size: &str,
    reference_images: &[impl AsRef<Path>],
) -> Result<Value> {
    let mut parts = vec![json!({"text": prompt})];
    for reference in reference_images {
        let (mime_type, data) = inline_image(reference.as_ref())?;
        parts.push(json!({"inlineData": {"mimeType": mime_type, "data": data}}));
    }
    Ok(json!({
        "contents": [{"parts": parts}],
        "generationConfig": {
            "responseModalities": ["Image"],
            "imageConfig": {"aspectRatio": aspect_ratio, "imageSize": image_size},
        },
    }))
}

/// Decode the first inline image of a generateContent response
pub fn extract_first_inline_image(response: &Value) -> Result<(Vec<u8>, Option<String>)> {
    let candidates = response
        .get("candidates")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for candidate in candidates {
        let parts = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for part in parts {
            let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
                continue;
            };
            let Some(data) = inline.get("data").and_then(Value::as_str).filter(|d| !d.is_empty())
            else {
                continue;
            };
            let bytes = STANDARD.decode(data).map_err(|e| {
                TocError::Provider(format!("Invalid base64 image in Gemini response: {}", e))
            })?;
            let mime = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .map(str::to_string);
            return Ok((bytes, mime));
        }
    }
    Err(TocError::Provider(
        "No inline image found in Gemini response.".to_string(),
    ))
}

impl ImageProvider for GeminiImageProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let payload = build_image_payload(
            &request.prompt,
            &request.aspect_ratio,
            &request.image_size,
            &request.reference_images,
        )?;
        tracing::debug!(
            model = %self.model,
            references = request.reference_images.len(),
            "requesting Gemini image"
        );
        let raw = HttpClient::api().post_json(&url, &self.headers(), &payload)?;
        let (bytes, mime_type) = extract_first_inline_image(&raw)?;
        Ok(GeneratedImage {
            bytes,
            mime_type,
            raw,
        })
    }
}
