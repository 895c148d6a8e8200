use reqwest::Response;
use std::time::Duration;

use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::{CheckRequest, CheckResponse, MunicipalitiesResponse, MunicipalityInfo};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the fines-check backend.
///
/// Streaming checks use a separate connection pool without a total request
/// timeout, since the body of `/check-stream` stays open while municipalities
/// are being scanned.
#[derive(Clone)]
pub struct FinesApiClient {
    client: reqwest::Client,
    stream_client: reqwest::Client,
    base_url: String,
}

impl FinesApiClient {
    /// Creates a new `FinesApiClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the backend.
    /// * `request_timeout` - Total timeout for non-streaming requests.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create API client: {}", e)))?;

        let stream_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create stream client: {}", e)))?;

        Ok(Self {
            client,
            stream_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(&config.api_base_url, config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists the municipalities the backend checks.
    pub async fn fetch_municipalities(&self) -> Result<Vec<MunicipalityInfo>, AppError> {
        let url = format!("{}/municipalities", self.base_url);
        tracing::debug!("Fetching municipalities: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Municipalities request failed")?;
        let response = ensure_success(response).await?;

        let data: MunicipalitiesResponse = response
            .json()
            .await
            .context("Failed to parse municipalities response")?;

        tracing::info!("Backend checks {} municipalities", data.municipalities.len());
        Ok(data.municipalities)
    }

    /// Runs a whole check and waits for the complete response.
    pub async fn check(&self, request: &CheckRequest) -> Result<CheckResponse, AppError> {
        let url = format!("{}/check", self.base_url);
        tracing::info!("Running check for car {}", request.car_number);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Check request for car {} failed", request.car_number))?;
        let response = ensure_success(response).await?;

        let data: CheckResponse = response
            .json()
            .await
            .context("Failed to parse check response")?;

        tracing::info!(
            "Check finished: {} clean, {} with fines, {} failed",
            data.summary.clean,
            data.summary.fine,
            data.summary.failed
        );
        Ok(data)
    }

    /// Starts a streaming check and returns the response once headers arrive.
    ///
    /// The body is left unread; hand it to [`crate::stream_parser::consume_response`].
    pub async fn open_check_stream(&self, request: &CheckRequest) -> Result<Response, AppError> {
        let url = format!("{}/check-stream", self.base_url);
        tracing::info!("Opening check stream for car {}", request.car_number);

        let response = self
            .stream_client
            .post(&url)
            .json(request)
            .send()
            .await
            .with_context(|| {
                format!("Check stream request for car {} failed", request.car_number)
            })?;

        ensure_success(response).await
    }
}

/// Passes successful responses through; turns anything else into `AppError::Api`.
async fn ensure_success(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let err = AppError::from_error_body(status.as_u16(), &body);
    tracing::warn!("Backend returned {}: {}", status, err);
    Err(err)
}
