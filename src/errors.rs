//! Error types for infraview.
//!
//! Uses `thiserror` for library-style error definitions.

use thiserror::Error;

/// Errors that can occur in infraview operations.
#[derive(Error, Debug)]
pub enum InfraviewError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Backend returned an error status
    #[error("dashboard API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Data validation failed
    #[error("Invalid data: {0}")]
    Validation(String),

    /// A page or series fetch failed for a specific volcano.
    ///
    /// Callers show an "Unable to retrieve images" state scoped to this
    /// volcano's panel; the rest of the UI stays interactive.
    #[error("unable to retrieve data for {volcano}: {source}")]
    Fetch {
        volcano: String,
        #[source]
        source: Box<InfraviewError>,
    },
}

impl InfraviewError {
    /// Wrap an error with the volcano it was fetched for.
    #[must_use]
    pub fn for_volcano(self, volcano: &str) -> Self {
        match self {
            Self::Fetch { .. } => self,
            other => Self::Fetch {
                volcano: volcano.to_string(),
                source: Box::new(other),
            },
        }
    }
}
