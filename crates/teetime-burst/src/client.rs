use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use teetime_core::BookingTarget;
use tracing::debug;

use crate::session::Session;

/// JSON body of one booking request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPayload {
    pub date: String,
    /// Slot label.
    pub time: String,
    pub players: u32,
    pub course: String,
}

impl BookingPayload {
    pub fn for_target(target: &BookingTarget, players: u32, course: &str) -> Self {
        Self {
            date: target.date.clone(),
            time: target.slot.clone(),
            players,
            course: course.to_string(),
        }
    }
}

/// Status and body of a completed request. The body is only read by the
/// classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connect => write!(f, "connect"),
            Self::Other => write!(f, "transport"),
        }
    }
}

/// A request that could not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, e.to_string())
    }
}

/// Issues one booking request. Implementations must be cheap to call
/// concurrently from many units.
#[async_trait]
pub trait BookingClient: Send + Sync {
    /// Client name for logging.
    fn name(&self) -> &str;

    async fn submit(
        &self,
        session: &Session,
        payload: &BookingPayload,
    ) -> Result<RawResponse, TransportError>;
}

/// `BookingClient` over a single shared reqwest connection pool.
pub struct HttpBookingClient {
    client: reqwest::Client,
}

impl HttpBookingClient {
    /// Every request carries `timeout`, which must stay below the retry
    /// cutoff so a stalled request cannot hold its unit past the burst.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BookingClient for HttpBookingClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit(
        &self,
        session: &Session,
        payload: &BookingPayload,
    ) -> Result<RawResponse, TransportError> {
        debug!(endpoint = %session.endpoint, slot = %payload.time, "submitting booking");

        let mut builder = self.client.post(&session.endpoint).json(payload);
        let cookie = session.cookie_header();
        if !cookie.is_empty() {
            builder = builder.header(reqwest::header::COOKIE, cookie);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(RawResponse { status, body })
    }
}
