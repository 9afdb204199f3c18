use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::config::CredentialField;

/// A specialized `Result` type for Glowmarkt operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "missing credential `{0}`: pass it explicitly, set {env} or add it to the credentials file",
        env = .0.env_var()
    )]
    MissingCredential(CredentialField),

    #[error("invalid credentials file {}: {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("authentication failed{}: {message}", status_suffix(.status))]
    Authentication { status: Option<u16>, message: String },

    #[error("not authenticated: call login() before requesting data")]
    NotAuthenticated,

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("resource id must not be empty")]
    EmptyResourceId,

    #[error("invalid time range: start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("API request failed: HTTP {status}\n{body}")]
    Api { status: u16, body: String },

    #[error("failed to parse API response ({url}): {message}")]
    Parse { url: String, message: String },

    #[error("could not reach {url}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("unknown aggregation period `{0}`")]
    InvalidPeriod(String),

    #[error("invalid base URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl Error {
    pub(crate) fn parse(url: impl Into<String>, message: impl ToString) -> Self {
        Error::Parse {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn transport<E>(url: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport {
            url: url.into(),
            source: Box::new(source),
        }
    }

    /// HTTP status carried by the error, if the vendor answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Authentication { status, .. } => *status,
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

// Glowmarkt error bodies are loosely shaped: {"valid":false,"error":...} on auth,
// {"message":...} or plain text elsewhere.
#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct VendorErrorBody {
    #[serde(default)]
    pub(crate) error: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

pub(crate) fn vendor_message(body: &str) -> String {
    let parsed = serde_json::from_str::<VendorErrorBody>(body).unwrap_or_default();
    parsed
        .error
        .or(parsed.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let text = body.trim();
            if text.is_empty() {
                "no message from server".to_string()
            } else {
                text.to_string()
            }
        })
}
