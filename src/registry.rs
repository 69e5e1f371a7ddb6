// 🌐 Race Registry - where raw race results come from
//
// The registry (ORIS for Czech orienteering) publishes event metadata and
// per-runner result rows. Everything here is "raw": values exactly as the
// registry sent them, normalized later by the race ingestor.

use crate::config::RegistryConfig;
use crate::error::{Result, SeasonError};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Event metadata shown next to a race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceMetadata {
    pub name: String,
    pub date: Option<NaiveDate>,
}

/// RawRaceRow - one result line as the registry reports it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRaceRow {
    #[serde(rename = "ID", default, deserialize_with = "lenient_string")]
    pub id: Option<String>,

    #[serde(rename = "ClassDesc", default, deserialize_with = "lenient_string")]
    pub class_desc: Option<String>,

    #[serde(rename = "Place", default, deserialize_with = "lenient_string")]
    pub place: Option<String>,

    #[serde(rename = "Name", default, deserialize_with = "lenient_string")]
    pub name: Option<String>,

    #[serde(rename = "RegNo", default, deserialize_with = "lenient_string")]
    pub reg_no: Option<String>,

    #[serde(rename = "UserID", default, deserialize_with = "lenient_string")]
    pub user_id: Option<String>,

    #[serde(rename = "Time", default, deserialize_with = "lenient_string")]
    pub time: Option<String>,
}

/// Registry values arrive as strings, numbers or null
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

// ============================================================================
// REGISTRY TRAIT
// ============================================================================

/// RaceRegistry - source of race metadata and raw results
///
/// Failures are per race: the caller reports them and moves on.
pub trait RaceRegistry {
    fn event(&self, race_id: u32) -> Result<RaceMetadata>;

    fn results(&self, race_id: u32) -> Result<Vec<RawRaceRow>>;

    /// Registry name for log messages
    fn name(&self) -> &str {
        "registry"
    }
}

// ============================================================================
// ORIS CLIENT
// ============================================================================

#[derive(Debug, Deserialize)]
struct OrisEnvelope {
    #[serde(rename = "Status")]
    status: String,

    #[serde(rename = "Data", default)]
    data: serde_json::Value,
}

pub struct OrisClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl OrisClient {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SeasonError::Registry(format!("Failed to build HTTP client: {}", e)))?;

        Ok(OrisClient {
            base_url: config.base_url.clone(),
            client,
        })
    }

    fn call(&self, method: &str, id_param: &str, race_id: u32) -> Result<serde_json::Value> {
        let race_id = race_id.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("format", "json"), ("method", method), (id_param, race_id.as_str())])
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                SeasonError::Registry(format!("Communication with ORIS failed ({}): {}", method, e))
            })?;

        let envelope: OrisEnvelope = response
            .json()
            .map_err(|e| SeasonError::Registry(format!("ORIS returned invalid JSON: {}", e)))?;

        if envelope.status != "OK" {
            return Err(SeasonError::Registry(format!(
                "ORIS status '{}' for {} of race {}",
                envelope.status, method, race_id
            )));
        }

        Ok(envelope.data)
    }
}

impl RaceRegistry for OrisClient {
    fn event(&self, race_id: u32) -> Result<RaceMetadata> {
        parse_event(self.call("getEvent", "id", race_id)?)
    }

    fn results(&self, race_id: u32) -> Result<Vec<RawRaceRow>> {
        parse_results(self.call("getEventResults", "eventid", race_id)?)
    }

    fn name(&self) -> &str {
        "ORIS"
    }
}

/// Event payload: `{"Name": ..., "Date": "YYYY-MM-DD", ...}`
pub fn parse_event(data: serde_json::Value) -> Result<RaceMetadata> {
    let name = data
        .get("Name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| SeasonError::Registry("Event has no name".to_string()))?
        .to_string();

    let date = data
        .get("Date")
        .and_then(|v| v.as_str())
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    Ok(RaceMetadata { name, date })
}

/// Results payload: an object of `"Result_<n>": {row}` entries in registry
/// order (an empty array when the race has no results yet)
pub fn parse_results(data: serde_json::Value) -> Result<Vec<RawRaceRow>> {
    match data {
        serde_json::Value::Object(entries) => entries
            .into_iter()
            .map(|(key, row)| {
                let raw: RawRaceRow = serde_json::from_value(row).map_err(|e| {
                    SeasonError::Registry(format!("Result '{}' has a wrong format: {}", key, e))
                })?;
                if raw.id.is_none() {
                    return Err(SeasonError::Registry(format!(
                        "Result '{}' is missing its ID. Please check that you used the correct race id.",
                        key
                    )));
                }
                Ok(raw)
            })
            .collect(),
        serde_json::Value::Array(items) if items.is_empty() => Ok(Vec::new()),
        serde_json::Value::Null => Ok(Vec::new()),
        other => Err(SeasonError::Registry(format!(
            "Unexpected results payload: {}",
            other
        ))),
    }
}

// ============================================================================
// TESTS
// ============================================================================
