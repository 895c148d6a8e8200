use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::location::Coordinates;

// ============ Lenient Fields ============
//
// Municipality scrapers are loose about secondary fields. A null or
// numeric value where text is expected must not drop the whole result.

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_text(deserializer).map(Option::unwrap_or_default)
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    })
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|c| u32::try_from(c).ok()).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

// ============ Check Results ============

/// One open parking citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fine {
    /// Citation number, when the municipality exposes one.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub number: Option<String>,
    /// Amount due.
    #[serde(
        default,
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<f64>,
    /// Price already formatted by the backend (e.g. "₪100").
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub price_display: Option<String>,
    /// Date of the offence.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,
    /// Time of the offence.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<String>,
    /// Street or area of the offence.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<String>,
    /// Free-text remarks attached to the citation.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub comments: Option<String>,
}

impl Fine {
    /// Price to show for this fine: the backend's display string, else the raw amount.
    pub fn display_price(&self) -> Option<String> {
        self.price_display
            .clone()
            .or_else(|| self.amount.map(|amount| format!("₪{}", amount)))
    }
}

/// Outcome status of one municipality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Clean,
    Fine,
    Failed,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Clean => "clean",
            CheckStatus::Fine => "fine",
            CheckStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clean" => Ok(CheckStatus::Clean),
            "fine" => Ok(CheckStatus::Fine),
            "failed" => Ok(CheckStatus::Failed),
            other => Err(format!(
                "unknown status '{}' (expected clean, fine or failed)",
                other
            )),
        }
    }
}

/// Status-tagged payload of a municipality result.
///
/// Fine details and failure reasons live on different variants, so a result
/// can never carry both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// No open fines.
    Clean,
    /// One or more open fines.
    Fine {
        #[serde(default, deserialize_with = "lenient_count")]
        count: u32,
        /// Total amount as formatted by the backend.
        #[serde(default, deserialize_with = "text_or_empty")]
        amount: String,
        #[serde(default)]
        fines: Vec<Fine>,
    },
    /// The municipality could not be checked.
    Failed {
        #[serde(default, deserialize_with = "text_or_empty")]
        error: String,
    },
}

impl Outcome {
    pub fn status(&self) -> CheckStatus {
        match self {
            Outcome::Clean => CheckStatus::Clean,
            Outcome::Fine { .. } => CheckStatus::Fine,
            Outcome::Failed { .. } => CheckStatus::Failed,
        }
    }
}

/// One municipality's outcome for a given (ID, plate) query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityResult {
    /// Municipality name; unique within a single check.
    pub name: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Name of the fine holder as reported by the municipality.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub person_name: Option<String>,
    /// Link to the municipality's payment page.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_url: Option<String>,
}

impl MunicipalityResult {
    pub fn clean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::Clean,
            person_name: None,
            payment_url: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::Failed {
                error: error.into(),
            },
            person_name: None,
            payment_url: None,
        }
    }

    pub fn with_fines(name: impl Into<String>, amount: impl Into<String>, fines: Vec<Fine>) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::Fine {
                count: fines.len() as u32,
                amount: amount.into(),
                fines,
            },
            person_name: None,
            payment_url: None,
        }
    }

    pub fn status(&self) -> CheckStatus {
        self.outcome.status()
    }
}

/// Counts of municipality results by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub clean: usize,
    #[serde(default)]
    pub fine: usize,
    #[serde(default)]
    pub failed: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.clean + self.fine + self.failed
    }

    pub fn record(&mut self, status: CheckStatus) {
        match status {
            CheckStatus::Clean => self.clean += 1,
            CheckStatus::Fine => self.fine += 1,
            CheckStatus::Failed => self.failed += 1,
        }
    }
}

/// Terminal value of a completed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResponse {
    /// Results in order of arrival.
    pub results: Vec<MunicipalityResult>,
    pub summary: Summary,
}

impl CheckResponse {
    /// Results whose status matches `status`, or all of them when `None`.
    pub fn filtered(&self, status: Option<CheckStatus>) -> Vec<&MunicipalityResult> {
        self.results
            .iter()
            .filter(|r| status.map_or(true, |s| r.status() == s))
            .collect()
    }
}

// ============ Wire Types ============

/// Request body for `/check` and `/check-stream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub id_number: String,
    pub car_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl CheckRequest {
    pub fn new(id_number: &str, car_number: &str, location: Option<Coordinates>) -> Self {
        Self {
            id_number: id_number.trim().to_string(),
            car_number: car_number.trim().to_string(),
            latitude: location.map(|c| c.latitude),
            longitude: location.map(|c| c.longitude),
        }
    }
}

/// One record of the `/check-stream` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// A single municipality finished.
    Result { result: MunicipalityResult },
    /// The server finished the whole check.
    Done { summary: Summary },
}

/// A municipality the backend knows how to check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MunicipalityInfo {
    pub name: String,
    pub id: String,
    pub initials: String,
    pub color: String,
}

#[derive(Debug, Deserialize)]
pub struct MunicipalitiesResponse {
    pub municipalities: Vec<MunicipalityInfo>,
}

// ============ Vehicle Registry ============

/// Vehicle details from the public registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub found: bool,
    pub car_number: Option<u64>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub model_code: Option<String>,
    pub trim: Option<String>,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub fuel: Option<String>,
    pub ownership: Option<String>,
    pub engine: Option<String>,
    pub last_test: Option<String>,
    pub test_expiry: Option<String>,
    pub on_road_since: Option<String>,
    pub front_tire: Option<String>,
    pub rear_tire: Option<String>,
    pub chassis: Option<String>,
}

impl VehicleInfo {
    /// True when the annual roadworthiness test expired before `today`.
    ///
    /// A missing or unparseable expiry date is treated as not expired.
    pub fn test_expired(&self, today: NaiveDate) -> bool {
        self.test_expiry
            .as_deref()
            .and_then(|raw| {
                let date = raw.get(..10).unwrap_or(raw);
                NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
            })
            .map_or(false, |expiry| expiry < today)
    }
}

/// Raw record from the registry datastore (Hebrew transliterated column names).
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryRecord {
    pub mispar_rechev: Option<u64>,
    pub tozeret_nm: Option<String>,
    pub kinuy_mishari: Option<String>,
    pub degem_nm: Option<String>,
    pub ramat_gimur: Option<String>,
    pub shnat_yitzur: Option<i32>,
    pub tzeva_rechev: Option<String>,
    pub sug_delek_nm: Option<String>,
    pub baalut: Option<String>,
    pub degem_manoa: Option<String>,
    pub mivchan_acharon_dt: Option<String>,
    pub tokef_dt: Option<String>,
    pub moed_aliya_lakvish: Option<String>,
    pub zmig_kidmi: Option<String>,
    pub zmig_ahori: Option<String>,
    pub misgeret: Option<String>,
}

impl From<RegistryRecord> for VehicleInfo {
    fn from(rec: RegistryRecord) -> Self {
        Self {
            found: true,
            car_number: rec.mispar_rechev,
            manufacturer: rec.tozeret_nm,
            model: rec.kinuy_mishari,
            model_code: rec.degem_nm,
            trim: rec.ramat_gimur,
            year: rec.shnat_yitzur,
            color: rec.tzeva_rechev,
            fuel: rec.sug_delek_nm,
            ownership: rec.baalut,
            engine: rec.degem_manoa,
            last_test: rec.mivchan_acharon_dt,
            test_expiry: rec.tokef_dt,
            on_road_since: rec.moed_aliya_lakvish,
            front_tire: rec.zmig_kidmi,
            rear_tire: rec.zmig_ahori,
            chassis: rec.misgeret,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegistrySearchResponse {
    #[serde(default)]
    pub success: bool,
    pub result: Option<RegistrySearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct RegistrySearchResult {
    #[serde(default)]
    pub records: Vec<RegistryRecord>,
}
