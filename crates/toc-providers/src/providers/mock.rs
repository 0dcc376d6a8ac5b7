//! Mock providers for testing
//!
//! Generate solid-color PNGs, placeholder clip bytes and placeholder audio
//! without any network calls. Each mock records the requests it served so
//! tests can assert on prompts, references and call counts.

use crate::provider::*;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use toc_core::{Result, TocError};

const MOCK_IMAGE_SIZE: u32 = 16;

/// Requests seen by a mock, shared between clones
#[derive(Debug)]
pub struct CallLog<T>(Arc<Mutex<Vec<T>>>);

impl<T> Clone for CallLog<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Default for CallLog<T> {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }
}

impl<T: Clone> CallLog<T> {
    fn record(&self, item: &T) {
        if let Ok(mut items) = self.0.lock() {
            items.push(item.clone());
        }
    }

    pub fn calls(&self) -> Vec<T> {
        self.0.lock().map(|items| items.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.0.lock().map(|items| items.len()).unwrap_or(0)
    }
}

/// A mock image provider producing a solid PNG colored by the prompt hash
#[derive(Debug, Clone, Default)]
pub struct MockImageProvider {
    log: CallLog<ImageRequest>,
}

impl MockImageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> CallLog<ImageRequest> {
        self.log.clone()
    }
}

impl ImageProvider for MockImageProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        self.log.record(request);
        let bytes = solid_png(&request.prompt, MOCK_IMAGE_SIZE, MOCK_IMAGE_SIZE)?;
        Ok(GeneratedImage {
            bytes,
            mime_type: Some("image/png".to_string()),
            raw: json!({"mock": true, "references": request.reference_images.len()}),
        })
    }
}

/// Encode a solid-color PNG in memory
fn solid_png(seed: &str, width: u32, height: u32) -> Result<Vec<u8>> {
    let digest = Sha256::digest(seed.as_bytes());
    let pixel = [digest[0], digest[1], digest[2], 255];

    let mut img_data = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..(width * height) {
        img_data.extend_from_slice(&pixel);
    }

    let img = image::RgbaImage::from_raw(width, height, img_data)
        .ok_or_else(|| TocError::Provider("Failed to create image buffer".to_string()))?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| TocError::Provider(format!("Failed to encode PNG: {}", e)))?;
    Ok(out.into_inner())
}

/// A mock video provider whose jobs complete on submit
#[derive(Debug, Clone, Default)]
pub struct MockVideoProvider {
    log: CallLog<VideoRequest>,
}

impl MockVideoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> CallLog<VideoRequest> {
        self.log.clone()
    }
}

impl VideoProvider for MockVideoProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_reference_images(&self) -> bool {
        true
    }

    fn start_video(&self, request: &VideoRequest) -> Result<VideoSubmission> {
        self.log.record(request);
        Ok(VideoSubmission::Completed(json!({
            "done": true,
            "kind": request.kind(),
            "seconds": request.duration_seconds,
        })))
    }

    fn get_operation(&self, handle: &str) -> Result<Value> {
        Err(TocError::Provider(format!("mock has no pending operation {}", handle)))
    }

    fn is_terminal(&self, _operation: &Value) -> bool {
        true
    }

    fn is_failed(&self, _operation: &Value) -> bool {
        false
    }

    fn extract_video(&self, operation: &Value) -> Result<VideoOutput> {
        let mut bytes = b"\x00\x00\x00\x18ftypmp42mock".to_vec();
        bytes.extend_from_slice(operation.to_string().as_bytes());
        Ok(VideoOutput::Bytes(bytes))
    }

    fn download(&self, uri: &str) -> Result<Vec<u8>> {
        Err(TocError::Provider(format!("mock cannot download {}", uri)))
    }
}

/// A mock speech provider returning placeholder MP3 bytes
#[derive(Debug, Clone, Default)]
pub struct MockSpeechProvider {
    log: CallLog<String>,
}

impl MockSpeechProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> CallLog<String> {
        self.log.clone()
    }
}

impl SpeechProvider for MockSpeechProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn request_payload(&self, text: &str) -> Value {
        json!({"text": text, "voice_settings": VoiceSettings::default()})
    }

    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.log.record(&text.to_string());
        let mut bytes = b"ID3\x04\x00\x00mock".to_vec();
        bytes.extend_from_slice(text.as_bytes());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::sniff_image_mime;

    #[test]
    fn test_mock_image_is_png() {
        let provider = MockImageProvider::new();
        let log = provider.log();
        let request = ImageRequest {
            prompt: "lighthouse".to_string(),
            ..Default::default()
        };
        let image = provider.generate_image(&request).unwrap();
        assert_eq!(sniff_image_mime(&image.bytes), Some("image/png"));

        let decoded = image::load_from_memory(&image.bytes).unwrap();
        assert_eq!(decoded.width(), MOCK_IMAGE_SIZE);
        assert_eq!(log.count(), 1);
        assert_eq!(log.calls()[0].prompt, "lighthouse");
    }

    #[test]
    fn test_mock_image_color_follows_prompt() {
        let a = solid_png("a", 2, 2).unwrap();
        let b = solid_png("b", 2, 2).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, solid_png("a", 2, 2).unwrap());
    }

    #[test]
    fn test_mock_video_completes_without_polling() {
        let provider = MockVideoProvider::new();
        let request = VideoRequest {
            prompt: "wave".to_string(),
            duration_seconds: 4,
            ..Default::default()
        };
        let video = provider.generate_video(&request, &PollSettings::default()).unwrap();
        assert!(video.bytes.starts_with(b"\x00\x00\x00\x18ftyp"));
        assert_eq!(video.raw["operation"]["kind"], json!("T2V"));
        assert_eq!(provider.log().count(), 1);
    }

    #[test]
    fn test_mock_speech() {
        let provider = MockSpeechProvider::new();
        let bytes = provider.synthesize("hello").unwrap();
        assert!(bytes.starts_with(b"ID3"));
        assert_eq!(provider.log().calls(), vec!["hello".to_string()]);
    }
}
