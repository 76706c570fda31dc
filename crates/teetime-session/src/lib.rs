//! Concrete [`SessionProvider`]s and the config-driven choice between them.

pub mod form_login;
pub mod static_cookie;

use std::sync::Arc;

use teetime_burst::{SessionError, SessionProvider};
use teetime_core::TeeTimeConfig;
use tracing::info;

pub use form_login::FormLoginProvider;
pub use static_cookie::StaticSessionProvider;

/// A configured `session.cookie` wins; otherwise log in with the credentials.
pub fn build_provider(config: &TeeTimeConfig) -> Arc<dyn SessionProvider> {
    match config.session.cookie.as_deref() {
        Some(cookie) => {
            info!("using pre-acquired session cookie");
            Arc::new(StaticSessionProvider::new(
                &config.session.base_url,
                &config.session.booking_path,
                cookie,
            ))
        }
        None => {
            info!(base_url = %config.session.base_url, "using form login");
            Arc::new(FormLoginProvider::new(
                config.credentials.clone(),
                &config.session,
            ))
        }
    }
}

/// Booking endpoint on the origin of `base_url`: any path on the base is
/// replaced by `booking_path`.
pub(crate) fn booking_endpoint(base_url: &str, booking_path: &str) -> Result<String, SessionError> {
    let base = reqwest::Url::parse(base_url)
        .map_err(|e| SessionError::InvalidEndpoint(format!("{base_url}: {e}")))?;
    let path = format!("/{}", booking_path.trim_start_matches('/'));
    base.join(&path)
        .map(String::from)
        .map_err(|e| SessionError::InvalidEndpoint(format!("{path}: {e}")))
}
