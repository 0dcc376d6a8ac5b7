//! Error types for the toc pipeline

use thiserror::Error;

/// The main error type for manifest interpretation and asset generation
#[derive(Debug, Error)]
pub enum TocError {
    /// Missing credential or invalid configuration for a declared tool
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No ```yaml ... ``` block found in manifest markdown.")]
    NoYamlBlock,

    #[error("Manifest error: {0}")]
    Manifest(String),

    /// A structural or runtime failure attributed to one scene
    #[error("scene{scene_id}: {message}")]
    Scene { scene_id: i64, message: String },

    #[error("{0}")]
    Validation(String),

    /// Non-success HTTP status from a provider, with the response body kept verbatim
    #[error("HTTP {status} {reason} ({url}){}", format_body(.body))]
    Http {
        status: u16,
        reason: String,
        url: String,
        body: String,
    },

    #[error("Transport error ({url}): {message}")]
    Transport { url: String, message: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Timed out waiting for operation: {0}")]
    Timeout(String),

    /// The external media tool binary could not be spawned
    #[error("Media tool not found: {0}")]
    ToolMissing(String),

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("YAML parse error: {0}")]
    Yaml(String),

    #[error("TOML parse error: {0}")]
    Toml(String),
}

fn format_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{}", trimmed)
    }
}

impl TocError {
    /// Shorthand for a scene-scoped error
    pub fn scene(scene_id: i64, message: impl Into<String>) -> Self {
        TocError::Scene {
            scene_id,
            message: message.into(),
        }
    }

    /// True when the failure means the media tool is not installed
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, TocError::ToolMissing(_))
    }
}

/// Result type alias for toc operations
pub type Result<T> = std::result::Result<T, TocError>;

impl From<serde_json::Error> for TocError {
    fn from(err: serde_json::Error) -> Self {
        TocError::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for TocError {
    fn from(err: serde_yaml::Error) -> Self {
        TocError::Yaml(err.to_string())
    }
}

impl From<toml::de::Error> for TocError {
    fn from(err: toml::de::Error) -> Self {
        TocError::Toml(err.to_string())
    }
}
