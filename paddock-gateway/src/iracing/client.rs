//! HTTP client for the iRacing /data API.
//!
//! Authentication is a cookie session: POST the email plus an encoded
//! credential to /auth, then reuse the cookie jar for every data call. A
//! 401 mid-session triggers exactly one re-auth and retry; there is no
//! general retry loop; any other failure is terminal for the calling
//! command.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::types::{
    AuthResponse, LinkEnvelope, MemberGetResponse, MemberProfile, RaceGuideResponse,
    RecentRacesResponse, SeriesData, SeriesSeason, SubsessionResultResponse,
};

const DEFAULT_BASE_URL: &str = "https://members-ng.iracing.com";

/// iRacing API errors, kept distinct so the command layer can answer each
/// kind with its own message.
#[derive(Debug, thiserror::Error)]
pub enum IracingError {
    #[error("authentication with the racing service failed")]
    Auth,

    #[error("the racing service is down for maintenance")]
    Maintenance,

    #[error("not found on the racing service: {0}")]
    NotFound(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    InvalidFormat(String),
}

/// iRacing /data API client with a shared cookie session.
pub struct IracingClient {
    http: reqwest::Client,
    email: String,
    password: String,
    base_url: String,
}

/// The /auth endpoint takes base64(sha256(password + lowercase(email)))
/// instead of the raw password.
pub(crate) fn encode_credentials(email: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(email.to_lowercase().as_bytes());
    BASE64.encode(hasher.finalize())
}

impl IracingClient {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            email: email.into(),
            password: password.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Establish (or refresh) the cookie session.
    pub async fn authenticate(&self) -> Result<(), IracingError> {
        let url = format!("{}/auth", self.base_url);
        let body = serde_json::json!({
            "email": self.email,
            "password": encode_credentials(&self.email, &self.password),
        });

        let response = self.http.post(&url).json(&body).send().await?;
        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return Err(IracingError::Maintenance);
        }
        if !response.status().is_success() {
            return Err(IracingError::Auth);
        }

        let auth: AuthResponse = response.json().await?;
        if !auth.succeeded() {
            return Err(IracingError::Auth);
        }

        info!("Authenticated with the racing service");
        Ok(())
    }

    /// GET a /data endpoint, following the link envelope to the payload.
    /// A 401 re-authenticates once and retries.
    async fn get_linked<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, IracingError> {
        let url = format!("{}{}", self.base_url, path);

        let mut response = self.http.get(&url).query(params).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("Session expired, re-authenticating");
            self.authenticate().await?;
            response = self.http.get(&url).query(params).send().await?;
        }

        match response.status() {
            StatusCode::SERVICE_UNAVAILABLE => return Err(IracingError::Maintenance),
            StatusCode::NOT_FOUND => return Err(IracingError::NotFound(path.to_string())),
            StatusCode::UNAUTHORIZED => return Err(IracingError::Auth),
            status if !status.is_success() => {
                let text = response.text().await.unwrap_or_default();
                return Err(IracingError::InvalidFormat(format!(
                    "HTTP {status} from {path}: {text}"
                )));
            }
            _ => {}
        }

        let envelope: LinkEnvelope = response
            .json()
            .await
            .map_err(|e| IracingError::InvalidFormat(format!("{path}: {e}")))?;

        let payload = self.http.get(&envelope.link).send().await?;
        if !payload.status().is_success() {
            warn!("Link fetch for {} failed: {}", path, payload.status());
            return Err(IracingError::InvalidFormat(format!(
                "link fetch for {path} returned {}",
                payload.status()
            )));
        }
        payload
            .json()
            .await
            .map_err(|e| IracingError::InvalidFormat(format!("{path} payload: {e}")))
    }

    /// Look up one member profile by customer id.
    pub async fn member_profile(&self, cust_id: i64) -> Result<MemberProfile, IracingError> {
        let response: MemberGetResponse = self
            .get_linked("/data/member/get", &[("cust_ids", cust_id.to_string())])
            .await?;
        response
            .members
            .into_iter()
            .next()
            .ok_or_else(|| IracingError::NotFound(format!("member {cust_id}")))
    }

    /// A member's recent races (the cache-fill feed).
    pub async fn recent_races(&self, cust_id: i64) -> Result<RecentRacesResponse, IracingError> {
        self.get_linked(
            "/data/stats/member_recent_races",
            &[("cust_id", cust_id.to_string())],
        )
        .await
    }

    /// Full result of one subsession.
    pub async fn subsession_result(
        &self,
        subsession_id: i64,
    ) -> Result<SubsessionResultResponse, IracingError> {
        self.get_linked(
            "/data/results/get",
            &[("subsession_id", subsession_id.to_string())],
        )
        .await
    }

    /// All series the service currently lists.
    pub async fn series_list(&self) -> Result<Vec<SeriesData>, IracingError> {
        self.get_linked("/data/series/get", &[]).await
    }

    /// The currently running season of every series.
    pub async fn series_seasons(&self) -> Result<Vec<SeriesSeason>, IracingError> {
        self.get_linked("/data/series/seasons", &[]).await
    }

    /// Near-term session schedule across series.
    pub async fn race_guide(&self) -> Result<RaceGuideResponse, IracingError> {
        self.get_linked("/data/season/race_guide", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_are_stable_and_base64_sized() {
        let a = encode_credentials("driver@example.com", "hunter2");
        let b = encode_credentials("driver@example.com", "hunter2");
        assert_eq!(a, b);
        // base64 of a 32-byte digest
        assert_eq!(a.len(), 44);
    }

    #[test]
    fn credential_email_is_case_insensitive() {
        assert_eq!(
            encode_credentials("Driver@Example.COM", "hunter2"),
            encode_credentials("driver@example.com", "hunter2"),
        );
    }

    #[test]
    fn different_passwords_differ() {
        assert_ne!(
            encode_credentials("driver@example.com", "hunter2"),
            encode_credentials("driver@example.com", "hunter3"),
        );
    }

    #[test]
    fn base_url_override() {
        let client = IracingClient::new("a@b.c", "pw").with_base_url("http://127.0.0.1:9999");
        assert_eq!(client.base_url, "http://127.0.0.1:9999");
    }
}
