//! Read-only third-party lookups shown next to a check: the public vehicle
//! registry and municipality images from Hebrew Wikipedia.
//!
//! Neither lookup may fail a check. Both return explicit results and the
//! call site decides whether to log and move on.

use moka::future::Cache;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use crate::circuit_breaker::{create_lookup_circuit_breaker, guarded, LookupBreaker};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{RegistrySearchResponse, VehicleInfo};

/// Datastore resource holding private and commercial vehicle registrations.
pub const VEHICLE_RESOURCE_ID: &str = "053cea08-09bc-40ec-8f7a-156f0677aff3";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
const THUMBNAIL_SIZE: &str = "200";

/// Hand-picked logos for municipalities whose Wikipedia image is missing or poor.
const IMAGE_OVERRIDES: &[(&str, &str)] = &[
    ("עיריית הרצליה", "https://www.herzliya.muni.il/content/images/logo_he_if.png"),
    ("עיריית רמת גן", "https://forms.ramat-gan.muni.il/content/images/wide-logo.png"),
    ("עיריית ערד", "https://encrypted-tbn0.gstatic.com/images?q=tbn:ANd9GcTab2VSREY1MOVhSE1Bm9Pi0YC-EJ5vROFL9A&s"),
    ("מועצה אזורית גוש עציון", "https://upload.wikimedia.org/wikipedia/he/9/91/%D7%9E%D7%95%D7%A2%D7%A6%D7%94_%D7%90%D7%96%D7%95%D7%A8%D7%99%D7%AA_%D7%92%D7%95%D7%A9_%D7%A2%D7%A6%D7%99%D7%95%D7%9F.jpg"),
    ("עיריית גני תקווה", "https://www.ganeytikva.org.il/content/images/logo2020.png?v=1a"),
    ("מ.מ. מזכרת בתיה", "https://mazkeret-batya.muni.il/wp-content/uploads/2024/01/Capture.png"),
    ("מ.א עמק יזרעאל", "https://www.emekyizrael.org.il/content/images/logo.png"),
    ("עיריית שדרות", "https://sderot.muni.gov.il/media/wablgxsq/logo.png"),
];

fn admin_prefix() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| {
        Regex::new(r"^(עיריית |מועצה מקומית |מועצה אזורית |מ\.א\.? |מ\.מ\.? |רשות )")
            .expect("static regex is valid")
    })
}

/// Strips the administrative prefix ("municipality of", "local council", ...)
/// so the remainder matches a Wikipedia article title.
pub fn strip_admin_prefix(name: &str) -> &str {
    match admin_prefix().find(name) {
        Some(m) => &name[m.end()..],
        None => name,
    }
}

fn lookup_client(service: &str) -> Result<Client, AppError> {
    Client::builder()
        .timeout(LOOKUP_TIMEOUT)
        .build()
        .map_err(|e| AppError::Config(format!("Failed to create {} client: {}", service, e)))
}

// ============ Vehicle Registry ============

pub struct VehicleRegistryService {
    client: Client,
    base_url: String,
    breaker: LookupBreaker,
    cache: Cache<u64, VehicleInfo>,
}

impl VehicleRegistryService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Self::with_base_url(&config.vehicle_registry_url)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, AppError> {
        Ok(Self {
            client: lookup_client("vehicle registry")?,
            base_url: base_url.trim_end_matches('/').to_string(),
            breaker: create_lookup_circuit_breaker(),
            cache: Cache::builder()
                .time_to_live(Duration::from_secs(3600))
                .max_capacity(1_000)
                .build(),
        })
    }

    /// Looks up a vehicle by plate number.
    ///
    /// Returns `NotFound` when the registry has no record for the plate.
    pub async fn lookup(&self, car_number: &str) -> Result<VehicleInfo, AppError> {
        let plate: u64 = car_number.trim().parse().map_err(|_| {
            AppError::BadRequest(format!("car number '{}' is not numeric", car_number.trim()))
        })?;

        if let Some(cached) = self.cache.get(&plate).await {
            tracing::debug!("Vehicle cache hit for {}", plate);
            return Ok(cached);
        }

        let vehicle = guarded(&self.breaker, "vehicle registry", self.fetch(plate)).await?;
        self.cache.insert(plate, vehicle.clone()).await;
        Ok(vehicle)
    }

    async fn fetch(&self, plate: u64) -> Result<VehicleInfo, AppError> {
        let filters = serde_json::json!({ "mispar_rechev": plate }).to_string();
        let url = url::Url::parse_with_params(
            &format!("{}/api/3/action/datastore_search", self.base_url),
            &[
                ("resource_id", VEHICLE_RESOURCE_ID),
                ("filters", filters.as_str()),
            ],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::info!("Looking up vehicle {} in registry", plate);

        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("Vehicle registry request failed: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "Vehicle registry returned status {}",
                response.status().as_u16()
            )));
        }

        let data: RegistrySearchResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse registry response: {}", e))
        })?;

        if !data.success {
            return Err(AppError::NotFound(format!("vehicle {} not in registry", plate)));
        }

        data.result
            .and_then(|r| r.records.into_iter().next())
            .map(VehicleInfo::from)
            .ok_or_else(|| AppError::NotFound(format!("vehicle {} not in registry", plate)))
    }
}

// ============ Municipality Images ============

#[derive(Debug, Deserialize)]
struct WikiResponse {
    query: Option<WikiQuery>,
}

#[derive(Debug, Deserialize)]
struct WikiQuery {
    #[serde(default)]
    pages: HashMap<String, WikiPage>,
}

#[derive(Debug, Deserialize)]
struct WikiPage {
    title: Option<String>,
    thumbnail: Option<WikiThumbnail>,
}

#[derive(Debug, Deserialize)]
struct WikiThumbnail {
    source: Option<String>,
}

pub struct MunicipalityImageService {
    client: Client,
    api_url: String,
    breaker: LookupBreaker,
    overrides: HashMap<String, String>,
    cache: Cache<String, String>,
}

impl MunicipalityImageService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Self::with_api_url(&config.wikipedia_api_url)
    }

    pub fn with_api_url(api_url: &str) -> Result<Self, AppError> {
        Ok(Self {
            client: lookup_client("wikipedia")?,
            api_url: api_url.to_string(),
            breaker: create_lookup_circuit_breaker(),
            overrides: IMAGE_OVERRIDES
                .iter()
                .map(|(name, url)| (name.to_string(), url.to_string()))
                .collect(),
            cache: Cache::builder()
                .time_to_live(Duration::from_secs(86400))
                .max_capacity(500)
                .build(),
        })
    }

    /// Maps municipality names to image URLs.
    ///
    /// Overrides and cached images are always returned. Names that need a
    /// Wikipedia lookup are resolved in one batched request; if that request
    /// fails the failure is logged and those names are simply left out.
    pub async fn fetch_images(&self, names: &[String]) -> HashMap<String, String> {
        let mut images = HashMap::new();
        let mut pending = Vec::new();

        for name in names {
            if let Some(url) = self.overrides.get(name) {
                images.insert(name.clone(), url.clone());
            } else if let Some(url) = self.cache.get(name).await {
                images.insert(name.clone(), url);
            } else {
                pending.push(name.clone());
            }
        }

        if pending.is_empty() {
            return images;
        }

        match guarded(&self.breaker, "wikipedia", self.lookup_thumbnails(&pending)).await {
            Ok(found) => {
                for (name, url) in found {
                    self.cache.insert(name.clone(), url.clone()).await;
                    images.insert(name, url);
                }
            }
            Err(e) => tracing::warn!("Municipality image lookup failed: {}", e),
        }

        images
    }

    /// Looks up Wikipedia thumbnails for `names` in a single request.
    pub async fn lookup_thumbnails(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, String>, AppError> {
        let mut search_to_name: HashMap<&str, &str> = HashMap::new();
        let mut search_terms = Vec::new();
        for name in names {
            let term = strip_admin_prefix(name);
            if search_to_name.insert(term, name.as_str()).is_none() {
                search_terms.push(term);
            }
        }
        let titles = search_terms.join("|");

        let url = url::Url::parse_with_params(
            &self.api_url,
            &[
                ("action", "query"),
                ("titles", titles.as_str()),
                ("prop", "pageimages"),
                ("format", "json"),
                ("pithumbsize", THUMBNAIL_SIZE),
                ("origin", "*"),
            ],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::debug!("Looking up {} municipality images", search_to_name.len());

        let response =
            self.client.get(url).send().await.map_err(|e| {
                AppError::ExternalApiError(format!("Wikipedia request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "Wikipedia returned status {}",
                response.status().as_u16()
            )));
        }

        let data: WikiResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Wikipedia response: {}", e))
        })?;

        let mut found = HashMap::new();
        for page in data.query.map(|q| q.pages).unwrap_or_default().into_values() {
            let source = page.thumbnail.and_then(|t| t.source);
            let name = page
                .title
                .as_deref()
                .and_then(|title| search_to_name.get(title));
            if let (Some(source), Some(name)) = (source, name) {
                found.insert(name.to_string(), source);
            }
        }

        Ok(found)
    }
}
