//! Kling video generation provider
//!
//! Authenticates with a static API key, or with a short-lived HS256 JWT signed
//! from an access key / secret key pair. The JWT is cached and refreshed when
//! less than max(10 s, 10% of its lifetime) remains.
//!
//! Kling's API shape varies between versions, so the submit/status paths, the
//! auth header and the JSON locations of the operation id, status and video URL
//! are all configurable.

use super::inline_image;
use crate::config::{KlingSettings, TocConfig};
use crate::http::{header, Headers, HttpClient};
use crate::json_path::{describe_keys, describe_paths, first_non_empty, parse_paths, JsonPath};
use crate::provider::*;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::Sha256;
use std::cell::RefCell;
use std::time::{SystemTime, UNIX_EPOCH};
use toc_core::{Result, TocError};

type HmacSha256 = Hmac<Sha256>;

/// How requests are authenticated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KlingAuth {
    StaticKey(String),
    Jwt {
        access_key: String,
        secret_key: String,
    },
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: u64,
}

#[derive(Serialize)]
struct JwtHeader {
    alg: &'static str,
    typ: &'static str,
}

/// Field order is part of the signed bytes: iss, exp, nbf
#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    exp: u64,
    nbf: u64,
}

/// Sign an HS256 JWT issued at `now`; returns the token and its expiry
pub fn build_jwt(
    access_key: &str,
    secret_key: &str,
    now: u64,
    lifetime_secs: u64,
    clock_skew_secs: u64,
) -> Result<(String, u64)> {
    let exp = now + lifetime_secs;
    let header = serde_json::to_vec(&JwtHeader {
        alg: "HS256",
        typ: "JWT",
    })?;
    let claims = serde_json::to_vec(&JwtClaims {
        iss: access_key,
        exp,
        nbf: now.saturating_sub(clock_skew_secs),
    })?;
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(claims)
    );

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|e| TocError::Config(format!("Invalid Kling secret key: {}", e)))?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();

    Ok((
        format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)),
        exp,
    ))
}

/// Recursively merge `overlay` into `base`; objects merge, everything else replaces
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Loose truthiness used for `error` fields
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Kling provider for video clips
pub struct KlingProvider {
    settings: KlingSettings,
    auth: KlingAuth,
    operation_id_paths: Vec<JsonPath>,
    status_paths: Vec<JsonPath>,
    video_url_paths: Vec<JsonPath>,
    done_statuses: Vec<String>,
    failed_statuses: Vec<String>,
    token: RefCell<Option<CachedToken>>,
}

impl KlingProvider {
    /// Create a new KlingProvider from config
    pub fn from_config(config: &TocConfig) -> Result<Self> {
        let settings = config.kling.clone();
        let auth = match (&settings.api_key, &settings.access_key, &settings.secret_key) {
            (Some(key), _, _) => KlingAuth::StaticKey(key.trim().to_string()),
            (None, Some(ak), Some(sk)) => KlingAuth::Jwt {
                access_key: ak.trim().to_string(),
                secret_key: sk.trim().to_string(),
            },
            _ => {
                return Err(TocError::Config(
                    "Missing Kling credentials (set KLING_API_KEY or KLING_ACCESS_KEY+KLING_SECRET_KEY, or add to .toc/config.toml)".to_string(),
                ))
            }
        };
        Ok(Self {
            operation_id_paths: parse_paths(&settings.operation_id_paths()),
            status_paths: parse_paths(&settings.status_paths()),
            video_url_paths: parse_paths(&settings.video_url_paths()),
            done_statuses: settings.done_statuses(),
            failed_statuses: settings.failed_statuses(),
            auth,
            settings,
            token: RefCell::new(None),
        })
    }

    pub fn auth(&self) -> &KlingAuth {
        &self.auth
    }

    /// Bearer token valid at `now`, reusing the cached JWT while it is fresh
    pub fn token_at(&self, now: u64) -> Result<String> {
        let (access_key, secret_key) = match &self.auth {
            KlingAuth::StaticKey(key) => return Ok(key.clone()),
            KlingAuth::Jwt {
                access_key,
                secret_key,
            } => (access_key, secret_key),
        };

        let lifetime = self.settings.jwt_expiration_seconds();
        let refresh_before = (lifetime / 10).max(10);
        if let Some(cached) = self.token.borrow().as_ref() {
            if now + refresh_before < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let (token, expires_at) = build_jwt(
            access_key,
            secret_key,
            now,
            lifetime,
            self.settings.jwt_clock_skew_seconds(),
        )?;
        tracing::debug!(expires_at, "signed new Kling JWT");
        *self.token.borrow_mut() = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });
        Ok(token)
    }

    fn auth_headers(&self) -> Result<Headers> {
        let token = self.token_at(unix_now())?;
        let name = self.settings.api_key_header().trim();
        if name.eq_ignore_ascii_case("authorization") {
            Ok(vec![header(
                "authorization",
                format!("{}{}", self.settings.api_key_prefix(), token),
            )])
        } else {
            Ok(vec![header(name, token)])
        }
    }

    /// Absolute URLs pass through; paths are joined to the API base
    pub fn resolve_url(&self, path_or_url: &str, operation_id: Option<&str>) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            return path_or_url.to_string();
        }
        let path = match operation_id {
            Some(id) => path_or_url.replace("{operation_id}", id),
            None => path_or_url.to_string(),
        };
        let base = self.settings.api_base().trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    pub fn build_payload(&self, request: &VideoRequest) -> Result<Value> {
        let mut payload = json!({
            "model": self.settings.video_model(),
            "prompt": request.prompt,
            "duration_seconds": request.duration_seconds,
            "aspect_ratio": request.aspect_ratio,
            "resolution": request.resolution,
        });
        if let Some(negative) = request.negative_prompt.as_deref().map(str::trim) {
            if !negative.is_empty() {
                payload["negative_prompt"] = json!(negative);
            }
        }
        if let Some(first) = &request.first_frame {
            let (mime_type, data) = inline_image(first)?;
            payload["first_frame_image"] = json!({"mime_type": mime_type, "data": data});
        }
        if let Some(last) = &request.last_frame {
            let (mime_type, data) = inline_image(last)?;
            payload["last_frame_image"] = json!({"mime_type": mime_type, "data": data});
        }
        if let Some(extra) = &self.settings.extra_payload {
            deep_merge(&mut payload, extra);
        }
        Ok(payload)
    }

    pub fn extract_operation_id(&self, response: &Value) -> Result<String> {
        match first_non_empty(response, &self.operation_id_paths) {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(TocError::Provider(format!(
                "No operation id found in Kling submit response. Tried paths={}. Response keys={}",
                describe_paths(&self.operation_id_paths),
                describe_keys(response)
            ))),
        }
    }

    /// Lowercased status, if any status path matches
    pub fn extract_status(&self, operation: &Value) -> Option<String> {
        let status = match first_non_empty(operation, &self.status_paths)? {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Some(status.trim().to_lowercase())
    }

    pub fn is_done(&self, operation: &Value) -> bool {
        if let Some(done) = operation.get("done").and_then(Value::as_bool) {
            return done;
        }
        self.extract_status(operation)
            .map(|s| self.done_statuses.contains(&s))
            .unwrap_or(false)
    }

    /// Resolve the video URL; a path may land on an object holding the URL
    pub fn extract_video_url(&self, operation: &Value) -> Result<String> {
        let Some(value) = first_non_empty(operation, &self.video_url_paths) else {
            return Err(TocError::Provider(format!(
                "Operation completed but no video URL found. Tried paths={}. Response keys={}",
                describe_paths(&self.video_url_paths),
                describe_keys(operation)
            )));
        };
        match value {
            Value::String(url) => Ok(url.trim().to_string()),
            Value::Object(map) => ["url", "uri", "download_url", "downloadUrl"]
                .iter()
                .find_map(|k| {
                    map.get(*k)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                })
                .map(str::to_string)
                .ok_or_else(|| {
                    TocError::Provider(
                        "Video URL field resolved to an object without a URL-like key.".to_string(),
                    )
                }),
            other => Err(TocError::Provider(format!(
                "Video URL value has unsupported type: {}",
                other
            ))),
        }
    }
}

impl VideoProvider for KlingProvider {
    fn name(&self) -> &str {
        "kling"
    }

    fn start_video(&self, request: &VideoRequest) -> Result<VideoSubmission> {
        let url = self.resolve_url(self.settings.submit_path(), None);
        let payload = self.build_payload(request)?;
        tracing::debug!(
            model = self.settings.video_model(),
            seconds = request.duration_seconds,
            kind = request.kind(),
            "submitting Kling job"
        );
        let response = HttpClient::api().post_json(&url, &self.auth_headers()?, &payload)?;
        let handle = self.extract_operation_id(&response)?;
        Ok(VideoSubmission::Pending { handle, response })
    }

    fn get_operation(&self, handle: &str) -> Result<Value> {
        let url = self.resolve_url(self.settings.status_path_template(), Some(handle));
        HttpClient::api().get_json(&url, &self.auth_headers()?)
    }

    fn is_terminal(&self, operation: &Value) -> bool {
        self.is_failed(operation) || self.is_done(operation)
    }

    fn is_failed(&self, operation: &Value) -> bool {
        if operation.get("error").map(is_truthy).unwrap_or(false) {
            return true;
        }
        self.extract_status(operation)
            .map(|s| self.failed_statuses.contains(&s))
            .unwrap_or(false)
    }

    fn extract_video(&self, operation: &Value) -> Result<VideoOutput> {
        self.extract_video_url(operation).map(VideoOutput::Uri)
    }

    /// Signed CDN URLs can reject our auth header, so retry bare on HTTP errors
    fn download(&self, uri: &str) -> Result<Vec<u8>> {
        let client = HttpClient::download();
        match client.get_bytes(uri, &self.auth_headers()?) {
            Err(TocError::Http { status, .. }) => {
                tracing::debug!(status, "authenticated download failed; retrying without auth");
                client.get_bytes(uri, &Vec::new())
            }
            other => other,
        }
    }
}
