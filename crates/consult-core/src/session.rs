use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::SessionError;

/// Time-limited transport credentials for one join attempt.
///
/// Tokens expire, so credentials are requested fresh on every join and
/// never cached across attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub app_id: String,
    pub channel: String,
    pub token: String,
}

/// Obtains transport credentials for a visit.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn fetch_session(&self, visit_id: &str) -> Result<SessionCredentials, SessionError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSessionResponse {
    app_id: String,
    channel: String,
    token: String,
}

/// Requests video session credentials from the clinic API.
pub struct SessionService {
    base_url: String,
    http: reqwest::Client,
}

impl SessionService {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn session_url(&self, visit_id: &str) -> String {
        format!(
            "{}/api/v1/visits/{}/video-session",
            self.base_url,
            urlencoding::encode(visit_id)
        )
    }
}

#[async_trait]
impl SessionProvider for SessionService {
    async fn fetch_session(&self, visit_id: &str) -> Result<SessionCredentials, SessionError> {
        let url = self.session_url(visit_id);
        tracing::info!("requesting video session for visit {visit_id}");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SessionError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SessionError::Unavailable(format!(
                "session service returned status {}",
                resp.status()
            )));
        }

        let data: VideoSessionResponse = resp
            .json()
            .await
            .map_err(|e| SessionError::Unavailable(format!("invalid session response: {e}")))?;

        if data.app_id.is_empty() || data.channel.is_empty() || data.token.is_empty() {
            return Err(SessionError::Unavailable(
                "session response missing appId, channel or token".into(),
            ));
        }

        Ok(SessionCredentials {
            app_id: data.app_id,
            channel: data.channel,
            token: data.token,
        })
    }
}
