//! Vault API client
//!
//! Verifies corporation numbers and creates profiles over HTTP.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::types::{CorporationNumberResponse, ErrorBody, ProfileDetails};

/// Longest response excerpt embedded in an error
const SNIPPET_LEN: usize = 200;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout, ...)
    #[error("{0}")]
    Transport(String),
    /// A response arrived but its body was not what the endpoint documents
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// Non-ok status from POST /profile-details
    #[error("request rejected with status {status}")]
    Rejected { status: u16, message: Option<String> },
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

/// The two remote operations the form depends on
#[async_trait]
pub trait VaultApi: Send + Sync {
    /// GET /corporation-number/{number}
    async fn check_corporation_number(
        &self,
        number: &str,
    ) -> Result<CorporationNumberResponse, ApiError>;

    /// POST /profile-details
    async fn create_profile(&self, profile: &ProfileDetails) -> Result<(), ApiError>;
}

#[async_trait]
impl<T: VaultApi + ?Sized> VaultApi for Arc<T> {
    async fn check_corporation_number(
        &self,
        number: &str,
    ) -> Result<CorporationNumberResponse, ApiError> {
        (**self).check_corporation_number(number).await
    }

    async fn create_profile(&self, profile: &ProfileDetails) -> Result<(), ApiError> {
        (**self).create_profile(profile).await
    }
}

/// [`VaultApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpVaultApi {
    client: Client,
    api_url: String,
}

impl HttpVaultApi {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }
}

#[async_trait]
impl VaultApi for HttpVaultApi {
    async fn check_corporation_number(
        &self,
        number: &str,
    ) -> Result<CorporationNumberResponse, ApiError> {
        let url = self.url(&format!("corporation-number/{}", number));
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        // Rejections come back as 4xx with the same body shape, so the body
        // is parsed whatever the status.
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            ApiError::InvalidResponse(format!(
                "{} (status {}, body: {})",
                e,
                status.as_u16(),
                snippet(&body)
            ))
        })
    }

    async fn create_profile(&self, profile: &ProfileDetails) -> Result<(), ApiError> {
        let url = self.url("profile-details");
        let body_bytes =
            serde_json::to_vec(profile).map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body_bytes)
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            info!("Profile created (status {})", status.as_u16());
            return Ok(());
        }

        let body = response.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|error| error.message);
        debug!(
            "Profile rejected (status {}): {}",
            status.as_u16(),
            snippet(&body)
        );

        Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

fn snippet(body: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(&body[..body.len().min(SNIPPET_LEN)])
}
