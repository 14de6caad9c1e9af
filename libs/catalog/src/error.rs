use reqwest::StatusCode;
use thiserror::Error;

/// Failures from the catalog-management API.
///
/// The client never retries; callers decide whether a failure is fatal
/// (bootstrap) or recorded (per-catalog fan-out).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to catalog service failed: {0}")]
    Transport(#[source] anyhow::Error),

    #[error("{entity} `{name}` already exists; re-run with --replace to recreate it")]
    Conflict { entity: &'static str, name: String },

    #[error("catalog service returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode catalog service response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("connection properties are missing `base-url`")]
    MissingBaseUrl,

    #[error("invalid `base-url`: {0}")]
    InvalidBaseUrl(#[source] url::ParseError),
}
