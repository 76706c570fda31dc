use async_trait::async_trait;
use teetime_burst::{Session, SessionError, SessionProvider};

use crate::booking_endpoint;

/// Session from a pre-acquired `Cookie` header. No network traffic.
pub struct StaticSessionProvider {
    base_url: String,
    booking_path: String,
    cookie: String,
}

impl StaticSessionProvider {
    pub fn new(base_url: &str, booking_path: &str, cookie: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            booking_path: booking_path.to_string(),
            cookie: cookie.to_string(),
        }
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn initialize(&self) -> Result<Session, SessionError> {
        let cookies = Session::parse_cookie_header(&self.cookie);
        if cookies.is_empty() {
            return Err(SessionError::NoCredentialMaterial);
        }
        let endpoint = booking_endpoint(&self.base_url, &self.booking_path)?;
        Ok(Session::new(endpoint, cookies))
    }
}
