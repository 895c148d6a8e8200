use std::time::Duration;

use crate::location::Coordinates;

pub const DEFAULT_VEHICLE_REGISTRY_URL: &str = "https://data.gov.il";
pub const DEFAULT_WIKIPEDIA_API_URL: &str = "https://he.wikipedia.org/w/api.php";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the fines-check backend, without trailing slash.
    pub api_base_url: String,
    /// Limit for a whole streaming check. `None` waits indefinitely.
    pub stream_timeout: Option<Duration>,
    /// Limit for non-streaming requests.
    pub request_timeout: Duration,
    pub vehicle_registry_url: String,
    pub wikipedia_api_url: String,
    pub location: Option<Coordinates>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::load(None)
    }

    /// Loads configuration from the environment, with an optional backend URL
    /// that takes precedence over `FINES_API_URL`.
    pub fn load(api_url_override: Option<String>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            api_base_url: match api_url_override {
                Some(url) => validate_url("--api-url", url)?,
                None => std::env::var("FINES_API_URL")
                    .map_err(|_| anyhow::anyhow!("FINES_API_URL environment variable required"))
                    .and_then(|url| validate_url("FINES_API_URL", url))?,
            },
            stream_timeout: std::env::var("STREAM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse::<u64>()
                .map(|secs| (secs > 0).then(|| Duration::from_secs(secs)))
                .map_err(|_| anyhow::anyhow!("STREAM_TIMEOUT_SECS must be a whole number of seconds"))?,
            request_timeout: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u64>()
                .map_err(|_| anyhow::anyhow!("REQUEST_TIMEOUT_SECS must be a whole number of seconds"))
                .and_then(|secs| {
                    if secs == 0 {
                        anyhow::bail!("REQUEST_TIMEOUT_SECS must be greater than 0");
                    }
                    Ok(Duration::from_secs(secs))
                })?,
            vehicle_registry_url: std::env::var("VEHICLE_REGISTRY_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| validate_url("VEHICLE_REGISTRY_URL", url))
                .transpose()?
                .unwrap_or_else(|| DEFAULT_VEHICLE_REGISTRY_URL.to_string()),
            wikipedia_api_url: std::env::var("WIKIPEDIA_API_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| validate_url("WIKIPEDIA_API_URL", url))
                .transpose()?
                .unwrap_or_else(|| DEFAULT_WIKIPEDIA_API_URL.to_string()),
            location: parse_location(
                std::env::var("USER_LATITUDE").ok(),
                std::env::var("USER_LONGITUDE").ok(),
            )?,
        };

        tracing::debug!("Fines API URL: {}", config.api_base_url);
        tracing::debug!("Stream timeout: {:?}", config.stream_timeout);
        tracing::debug!("Vehicle registry URL: {}", config.vehicle_registry_url);
        tracing::debug!("Wikipedia API URL: {}", config.wikipedia_api_url);

        Ok(config)
    }

    /// Configuration with defaults for everything but the backend URL.
    pub fn with_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            stream_timeout: Some(Duration::from_secs(120)),
            request_timeout: Duration::from_secs(30),
            vehicle_registry_url: DEFAULT_VEHICLE_REGISTRY_URL.to_string(),
            wikipedia_api_url: DEFAULT_WIKIPEDIA_API_URL.to_string(),
            location: None,
        }
    }
}

pub fn validate_url(name: &str, url: String) -> anyhow::Result<String> {
    let url = url.trim();
    if url.is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn parse_location(
    latitude: Option<String>,
    longitude: Option<String>,
) -> anyhow::Result<Option<Coordinates>> {
    let latitude = latitude.filter(|s| !s.trim().is_empty());
    let longitude = longitude.filter(|s| !s.trim().is_empty());

    match (latitude, longitude) {
        (None, None) => Ok(None),
        (Some(lat), Some(lon)) => {
            let latitude: f64 = lat
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("USER_LATITUDE must be a number"))?;
            let longitude: f64 = lon
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("USER_LONGITUDE must be a number"))?;
            if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                anyhow::bail!("USER_LATITUDE/USER_LONGITUDE out of range");
            }
            Ok(Some(Coordinates {
                latitude,
                longitude,
            }))
        }
        _ => anyhow::bail!("USER_LATITUDE and USER_LONGITUDE must be set together"),
    }
}
