use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::SET_COOKIE;
use reqwest::redirect::Policy;
use teetime_burst::{Session, SessionError, SessionProvider};
use teetime_core::config::SessionConfig;
use teetime_core::Credentials;
use tracing::{debug, info, warn};

use crate::booking_endpoint;

const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Logs in by POSTing the credentials as a form and keeps whatever cookies
/// the login response sets.
///
/// Redirects are not followed: a `3xx` login response is a success and its
/// `Set-Cookie` headers are the session.
pub struct FormLoginProvider {
    credentials: Credentials,
    base_url: String,
    login_path: String,
    booking_path: String,
}

impl FormLoginProvider {
    pub fn new(credentials: Credentials, session: &SessionConfig) -> Self {
        Self {
            credentials,
            base_url: session.base_url.clone(),
            login_path: session.login_path.clone(),
            booking_path: session.booking_path.clone(),
        }
    }

    fn login_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.login_path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl SessionProvider for FormLoginProvider {
    fn name(&self) -> &str {
        "form-login"
    }

    async fn initialize(&self) -> Result<Session, SessionError> {
        let Credentials { username, password } = &self.credentials;
        if username.trim().is_empty() || password.is_empty() {
            return Err(SessionError::MissingCredentials);
        }
        if *username == Credentials::default().username {
            warn!("credentials still hold the placeholder username");
        }

        let endpoint = booking_endpoint(&self.base_url, &self.booking_path)?;
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(LOGIN_TIMEOUT)
            .build()
            .map_err(|e| SessionError::Http(e.to_string()))?;

        let url = self.login_url();
        info!(%url, "logging in");
        let resp = client
            .post(&url)
            .form(&[("username", username.as_str()), ("password", password.as_str())])
            .send()
            .await
            .map_err(|e| SessionError::Http(e.to_string()))?;

        let status = resp.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(SessionError::LoginRejected {
                status: status.as_u16(),
            });
        }

        let cookies: Vec<(String, String)> = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(set_cookie_pair)
            .collect();
        if cookies.is_empty() {
            return Err(SessionError::NoCredentialMaterial);
        }

        debug!(cookies = cookies.len(), %endpoint, "login complete");
        Ok(Session::new(endpoint, cookies))
    }
}

/// Name and value of a `Set-Cookie` header; attributes are dropped.
fn set_cookie_pair(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::http::{header, StatusCode};
    use axum::response::{AppendHeaders, IntoResponse, Response};
    use axum::routing::post;
    use axum::{Form, Router};

    async fn login(Form(form): Form<HashMap<String, String>>) -> Response {
        let ok = form.get("username").map(String::as_str) == Some("alice")
            && form.get("password").map(String::as_str) == Some("hunter2");
        if !ok {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        (
            StatusCode::FOUND,
            AppendHeaders([
                (header::SET_COOKIE, "sid=abc; Path=/; HttpOnly"),
                (header::SET_COOKIE, "csrf=x1"),
                (header::LOCATION, "/members"),
            ]),
        )
            .into_response()
    }

    async fn login_without_cookies() -> StatusCode {
        StatusCode::OK
    }

    async fn serve() -> String {
        let app = Router::new()
            .route("/login", post(login))
            .route("/bare-login", post(login_without_cookies));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn provider(base_url: &str, login_path: &str, username: &str, password: &str) -> FormLoginProvider {
        let session = SessionConfig {
            base_url: base_url.to_string(),
            login_path: login_path.to_string(),
            ..SessionConfig::default()
        };
        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        FormLoginProvider::new(credentials, &session)
    }

    #[test]
    fn set_cookie_drops_attributes() {
        assert_eq!(
            set_cookie_pair("sid=abc; Path=/; HttpOnly"),
            Some(("sid".into(), "abc".into()))
        );
        assert_eq!(set_cookie_pair("flag"), None);
    }

    #[tokio::test]
    async fn login_collects_cookies_and_derives_endpoint() {
        let base = serve().await;
        let session = provider(&base, "/login", "alice", "hunter2")
            .initialize()
            .await
            .unwrap();

        assert_eq!(session.cookie_header(), "sid=abc; csrf=x1");
        assert_eq!(session.endpoint, format!("{base}/api/booking/book"));
    }

    #[tokio::test]
    async fn wrong_password_is_login_rejected() {
        let base = serve().await;
        let err = provider(&base, "/login", "alice", "nope")
            .initialize()
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::LoginRejected { status: 401 }));
    }

    #[tokio::test]
    async fn login_without_cookies_has_no_credential_material() {
        let base = serve().await;
        let err = provider(&base, "bare-login", "alice", "hunter2")
            .initialize()
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NoCredentialMaterial));
    }

    #[tokio::test]
    async fn empty_credentials_fail_before_any_request() {
        let err = provider("http://127.0.0.1:9", "/login", "", "")
            .initialize()
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::MissingCredentials));
    }

    #[tokio::test]
    async fn unreachable_site_is_http_error() {
        let err = provider("http://127.0.0.1:9", "/login", "alice", "hunter2")
            .initialize()
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Http(_)));
    }
}
