//! Response classification: the single decision point for whether the retry
//! engine engages.

use serde::Serialize;
use teetime_core::config::BurstConfig;

use crate::client::{RawResponse, TransportError};

/// Longest error body kept on a record.
const MAX_DETAIL_CHARS: usize = 256;

/// What a response means for its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// The slot was secured.
    Success,
    /// Rejected only because the booking window is not open yet.
    RetryableRejection,
    /// Any other rejection (slot taken, validation error, ...).
    TerminalFailure,
    /// The request did not complete. Terminal: transport errors are never
    /// retried, neither on the first request nor inside the retry loop.
    TransportError,
}

/// A classified response: the verdict plus what the record keeps of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedResponse {
    pub classification: Classification,
    /// HTTP status; `None` for transport errors.
    pub status: Option<u16>,
    /// Error body or transport message; `None` on success.
    pub detail: Option<String>,
}

/// Maps a raw response to a [`Classification`].
///
/// Must be a pure function of its input so identical responses always
/// classify identically, whatever the timing.
pub trait ResponseClassifier: Send + Sync {
    fn classify(&self, response: &Result<RawResponse, TransportError>) -> ClassifiedResponse;
}

/// Substring matching on free-text error bodies.
///
/// A response is a retryable rejection when its status equals
/// `rejected_status` and its body contains `marker`, case-insensitively.
#[derive(Debug, Clone)]
pub struct MarkerClassifier {
    rejected_status: u16,
    marker: String,
}

impl MarkerClassifier {
    pub fn new(rejected_status: u16, marker: &str) -> Self {
        Self {
            rejected_status,
            marker: marker.to_lowercase(),
        }
    }

    pub fn from_config(config: &BurstConfig) -> Self {
        Self::new(config.rejected_status, &config.not_open_marker)
    }
}

impl ResponseClassifier for MarkerClassifier {
    fn classify(&self, response: &Result<RawResponse, TransportError>) -> ClassifiedResponse {
        match response {
            Ok(resp) if (200..300).contains(&resp.status) => ClassifiedResponse {
                classification: Classification::Success,
                status: Some(resp.status),
                detail: None,
            },
            Ok(resp) => {
                let not_open = resp.status == self.rejected_status
                    && resp.body.to_lowercase().contains(&self.marker);
                ClassifiedResponse {
                    classification: if not_open {
                        Classification::RetryableRejection
                    } else {
                        Classification::TerminalFailure
                    },
                    status: Some(resp.status),
                    detail: Some(truncate_detail(&resp.body)),
                }
            }
            Err(e) => ClassifiedResponse {
                classification: Classification::TransportError,
                status: None,
                detail: Some(e.to_string()),
            },
        }
    }
}

fn truncate_detail(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_DETAIL_CHARS {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(MAX_DETAIL_CHARS).collect();
    cut.push('…');
    cut
}
