//! Veo video generation provider
//!
//! Jobs are submitted with `predictLongRunning` and polled at `{base}/{name}`
//! until `done`. Veo accepts only a few clip lengths per call, so the
//! orchestrator plans segments for longer scenes.

use super::gemini::gemini_api_key;
use super::inline_image;
use crate::config::TocConfig;
use crate::http::{header, Headers, HttpClient};
use crate::provider::*;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Map, Value};
use toc_core::{Result, TocError};

/// Clip lengths (seconds) Veo accepts per request
pub const VEO_ALLOWED_DURATIONS: &[u32] = &[4, 6, 8];

/// Veo provider for video clips
pub struct VeoProvider {
    api_key: String,
    api_base: String,
    model: String,
    last_image_field: String,
}

impl VeoProvider {
    /// Create a new VeoProvider from config
    pub fn from_config(config: &TocConfig) -> Result<Self> {
        Ok(Self {
            api_key: gemini_api_key(config)?,
            api_base: config.gemini.api_base().trim_end_matches('/').to_string(),
            model: config.gemini.video_model().to_string(),
            last_image_field: config.gemini.veo_last_image_field().to_string(),
        })
    }

    fn headers(&self) -> Headers {
        vec![header("x-goog-api-key", self.api_key.as_str())]
    }

    /// Build the predictLongRunning body
    pub fn build_payload(&self, request: &VideoRequest) -> Result<Value> {
        let mut instance = Map::new();
        instance.insert("prompt".into(), json!(request.prompt));
        if let Some(first) = &request.first_frame {
            let (mime_type, data) = inline_image(first)?;
            instance.insert(
                "image".into(),
                json!({"inlineData": {"mimeType": mime_type, "data": data}}),
            );
        }
        if let Some(last) = &request.last_frame {
            let (mime_type, data) = inline_image(last)?;
            instance.insert(
                self.last_image_field.clone(),
                json!({"inlineData": {"mimeType": mime_type, "data": data}}),
            );
        }
        if self.supports_reference_images() && !request.reference_images.is_empty() {
            let mut references = Vec::new();
            for path in &request.reference_images {
                let (mime_type, data) = inline_image(path)?;
                references.push(json!({
                    "image": {"inlineData": {"mimeType": mime_type, "data": data}},
                    "referenceType": "asset",
                }));
            }
            instance.insert("referenceImages".into(), Value::Array(references));
        }

        let mut parameters = json!({
            "durationSeconds": request.duration_seconds,
            "aspectRatio": request.aspect_ratio,
            "resolution": request.resolution,
        });
        if let Some(negative) = request.negative_prompt.as_deref().map(str::trim) {
            if !negative.is_empty() {
                parameters["negativePrompt"] = json!(negative);
            }
        }
        Ok(json!({"instances": [Value::Object(instance)], "parameters": parameters}))
    }
}

/// Locate the generated clip in a finished operation
pub fn extract_video_output(operation: &Value) -> Result<VideoOutput> {
    let response = operation.get("response").unwrap_or(&Value::Null);
    let generated = response
        .get("generateVideoResponse")
        .or_else(|| response.get("generate_video_response"))
        .unwrap_or(&Value::Null);
    let samples = generated
        .get("generatedSamples")
        .or_else(|| generated.get("generated_samples"))
        .and_then(Value::as_array);

    let Some(first) = samples.and_then(|s| s.first()) else {
        let count = generated
            .get("raiMediaFilteredCount")
            .or_else(|| generated.get("rai_media_filtered_count"))
            .cloned()
            .unwrap_or(Value::Null);
        let reasons = generated
            .get("raiMediaFilteredReasons")
            .or_else(|| generated.get("rai_media_filtered_reasons"))
            .cloned()
            .unwrap_or(Value::Null);
        return Err(TocError::Provider(format!(
            "Veo operation completed but generated samples are empty.\nrai_media_filtered_count={}\nrai_media_filtered_reasons={}",
            count, reasons
        )));
    };

    let video = first.get("video").unwrap_or(&Value::Null);
    if let Some(encoded) = video
        .get("bytesBase64Encoded")
        .or_else(|| video.get("videoBytes"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
    {
        let bytes = STANDARD.decode(encoded).map_err(|e| {
            TocError::Provider(format!("Invalid base64 video in Veo response: {}", e))
        })?;
        return Ok(VideoOutput::Bytes(bytes));
    }
    match video.get("uri").and_then(Value::as_str) {
        Some(uri) if !uri.is_empty() => Ok(VideoOutput::Uri(uri.to_string())),
        _ => Err(TocError::Provider(
            "Operation completed but no video URI found.".to_string(),
        )),
    }
}

impl VideoProvider for VeoProvider {
    fn name(&self) -> &str {
        "veo"
    }

    /// Fast variants reject reference images
    fn supports_reference_images(&self) -> bool {
        !self.model.to_lowercase().contains("fast")
    }

    fn start_video(&self, request: &VideoRequest) -> Result<VideoSubmission> {
        let url = format!("{}/models/{}:predictLongRunning", self.api_base, self.model);
        let payload = self.build_payload(request)?;
        tracing::debug!(
            model = %self.model,
            seconds = request.duration_seconds,
            kind = request.kind(),
            "submitting Veo job"
        );
        let response = HttpClient::api().post_json(&url, &self.headers(), &payload)?;
        if response.get("done").and_then(Value::as_bool) == Some(true) {
            return Ok(VideoSubmission::Completed(response));
        }
        let handle = response
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                TocError::Provider(format!("No operation name in Veo response: {}", response))
            })?
            .to_string();
        Ok(VideoSubmission::Pending { handle, response })
    }

    fn get_operation(&self, handle: &str) -> Result<Value> {
        let url = if handle.starts_with("http") {
            handle.to_string()
        } else {
            format!("{}/{}", self.api_base, handle.trim_start_matches('/'))
        };
        HttpClient::api().get_json(&url, &self.headers())
    }

    fn is_terminal(&self, operation: &Value) -> bool {
        operation.get("done").and_then(Value::as_bool) == Some(true)
    }

    fn is_failed(&self, operation: &Value) -> bool {
        operation.get("error").map(|e| !e.is_null()).unwrap_or(false)
    }

    fn extract_video(&self, operation: &Value) -> Result<VideoOutput> {
        extract_video_output(operation)
    }

    fn download(&self, uri: &str) -> Result<Vec<u8>> {
        HttpClient::download().get_bytes(uri, &self.headers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(model: &str) -> VeoProvider {
        VeoProvider {
            api_key: "k".to_string(),
            api_base: "https://example.test/v1beta".to_string(),
            model: model.to_string(),
            last_image_field: "endImage".to_string(),
        }
    }

    #[test]
    fn test_payload_with_frames_and_references() {
        let dir = std::env::temp_dir().join(format!("toc_veo_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let first = dir.join("first.png");
        let last = dir.join("last.jpg");
        std::fs::write(&first, b"abc").unwrap();
        std::fs::write(&last, b"abc").unwrap();

        let request = VideoRequest {
            prompt: "drift".to_string(),
            negative_prompt: Some("  text overlay ".to_string()),
            duration_seconds: 8,
            aspect_ratio: "9:16".to_string(),
            resolution: "720p".to_string(),
            first_frame: Some(first.clone()),
            last_frame: Some(last),
            reference_images: vec![first],
        };

        let payload = provider("veo-3.1-generate-preview").build_payload(&request).unwrap();
        let instance = &payload["instances"][0];
        assert_eq!(instance["prompt"], json!("drift"));
        assert_eq!(instance["image"]["inlineData"]["mimeType"], json!("image/png"));
        assert_eq!(instance["endImage"]["inlineData"]["mimeType"], json!("image/jpeg"));
        assert_eq!(instance["referenceImages"][0]["referenceType"], json!("asset"));
        assert_eq!(
            payload["parameters"],
            json!({
                "durationSeconds": 8,
                "aspectRatio": "9:16",
                "resolution": "720p",
                "negativePrompt": "text overlay"
            })
        );

        // fast models drop references
        let fast = provider("veo-3.1-fast-generate-preview").build_payload(&request).unwrap();
        assert!(fast["instances"][0].get("referenceImages").is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_extract_uri_both_casings() {
        let camel = json!({"done": true, "response": {"generateVideoResponse": {
            "generatedSamples": [{"video": {"uri": "https://files/v.mp4"}}]
        }}});
        assert_eq!(
            extract_video_output(&camel).unwrap(),
            VideoOutput::Uri("https://files/v.mp4".to_string())
        );
        let snake = json!({"response": {"generate_video_response": {
            "generated_samples": [{"video": {"uri": "u"}}]
        }}});
        assert_eq!(extract_video_output(&snake).unwrap(), VideoOutput::Uri("u".to_string()));
    }

    #[test]
    fn test_empty_samples_report_filter() {
        let op = json!({"response": {"generateVideoResponse": {
            "raiMediaFilteredCount": 1,
            "raiMediaFilteredReasons": ["celebrity"]
        }}});
        let err = extract_video_output(&op).unwrap_err().to_string();
        assert!(err.contains("rai_media_filtered_count=1"));
        assert!(err.contains("celebrity"));
    }

    #[test]
    fn test_terminal_and_failed() {
        let p = provider("veo");
        assert!(!p.is_terminal(&json!({"name": "operations/1"})));
        assert!(p.is_terminal(&json!({"done": true})));
        assert!(p.is_failed(&json!({"done": true, "error": {"code": 3}})));
        assert!(!p.is_failed(&json!({"done": true, "error": null})));
    }
}
