//! Session Provider capability: how the engine obtains credential material and
//! the booking endpoint. Implementations live outside the engine.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Authenticated session shared read-only by every unit of a burst.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Cookie name/value pairs attached to every booking request.
    pub cookies: Vec<(String, String)>,
    /// Absolute URL booking requests are POSTed to.
    pub endpoint: String,
}

impl Session {
    pub fn new(endpoint: impl Into<String>, cookies: Vec<(String, String)>) -> Self {
        Self {
            cookies,
            endpoint: endpoint.into(),
        }
    }

    /// Render the cookies as a `Cookie` request header value.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Parse a raw `Cookie` header (`a=1; b=2`) into name/value pairs.
    /// Fragments without `=` are skipped.
    pub fn parse_cookie_header(raw: &str) -> Vec<(String, String)> {
        raw.split(';')
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().to_string()))
            })
            .collect()
    }
}

// Cookie values are credentials: show names only.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.cookies.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("cookies", &names)
            .finish()
    }
}

/// Reasons a session could not be acquired. All of them abort the burst.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("login rejected with status {status}")]
    LoginRejected { status: u16 },

    #[error("username and password are required")]
    MissingCredentials,

    #[error("no credential material was obtained")]
    NoCredentialMaterial,

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Acquires the authenticated session a burst runs with.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Obtain credential material and the booking endpoint.
    async fn initialize(&self) -> Result<Session, SessionError>;

    /// Release whatever `initialize` acquired. Default: nothing to release.
    async fn close(&self) {}
}
