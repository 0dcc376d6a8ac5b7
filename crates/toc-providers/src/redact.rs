//! Strip binary payloads from provider JSON before it is logged

use serde_json::Value;

/// Keys whose string values carry base64 media
const BINARY_KEYS: &[&str] = &[
    "data",
    "b64_json",
    "b64",
    "image_base64",
    "bytesBase64Encoded",
    "imageBytes",
    "videoBytes",
    "video_bytes",
];

/// Strings longer than this are replaced even under other keys
const MAX_LOGGED_STRING: usize = 4096;

fn placeholder(len: usize) -> Value {
    Value::String(format!("<redacted {} chars>", len))
}

/// Return a copy of `value` with large binary strings replaced by a placeholder
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let redacted = match v {
                        Value::String(s) if BINARY_KEYS.contains(&key.as_str()) => {
                            placeholder(s.len())
                        }
                        other => redact(other),
                    };
                    (key.clone(), redacted)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        Value::String(s) if s.len() > MAX_LOGGED_STRING => placeholder(s.len()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inline_data_is_redacted() {
        let resp = json!({
            "candidates": [{"content": {"parts": [
                {"text": "ok"},
                {"inlineData": {"mimeType": "image/png", "data": "QUJD"}}
            ]}}]
        });
        let out = redact(&resp);
        let parts = &out["candidates"][0]["content"]["parts"];
        assert_eq!(parts[0]["text"], json!("ok"));
        assert_eq!(parts[1]["inlineData"]["data"], json!("<redacted 4 chars>"));
        assert_eq!(parts[1]["inlineData"]["mimeType"], json!("image/png"));
    }

    #[test]
    fn test_non_string_data_is_walked() {
        let resp = json!({"data": [{"b64_json": "xxxx", "url": null}], "created": 1});
        let out = redact(&resp);
        assert_eq!(out["data"][0]["b64_json"], json!("<redacted 4 chars>"));
        assert_eq!(out["created"], json!(1));
    }

    #[test]
    fn test_long_strings_are_redacted() {
        let long = "a".repeat(MAX_LOGGED_STRING + 1);
        let out = redact(&json!({"blob": long}));
        assert_eq!(out["blob"], json!(format!("<redacted {} chars>", MAX_LOGGED_STRING + 1)));
    }
}
