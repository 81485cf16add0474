//! Remote spawn feed: fetching the community spawn list and decoding its
//! elements into [`SpawnRecord`]s.
//!
//! The provider returns a JSON array whose elements look like:
//! ```json
//! {
//!   "Id": 1021,
//!   "Name": "Foul, Young - Mature",
//!   "Planet": { "Name": "Calypso" },
//!   "Properties": {
//!     "Type": "Mob", "Shape": "Circle",
//!     "Coordinates": { "Longitude": 79085, "Latitude": 67537 },
//!     "Density": "Medium", "IsShared": false, "IsEvent": false, "Notes": null
//!   }
//! }
//! ```
//! A document that is not an array is fatal. An element that deviates from
//! this shape only fails its own decode.

use crate::error::{ArtemisError, Result};
use crate::geo::Coordinate;
use crate::models::SpawnRecord;
use serde::Deserialize;
use serde_json::value::RawValue;
use std::time::Duration;

/// One undecoded element of the feed array, holding its exact source text.
pub type RawSpawnRecord = Box<RawValue>;

pub const UNKNOWN_SPAWN_NAME: &str = "Unknown Spawn";
pub const UNKNOWN_PLANET: &str = "Unknown";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FeedSpawn {
    id: Option<i64>,
    name: Option<String>,
    planet: Option<FeedPlanet>,
    properties: Option<FeedProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FeedPlanet {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FeedProperties {
    #[serde(rename = "Type")]
    spawn_type: Option<String>,
    shape: Option<String>,
    coordinates: Option<FeedCoordinates>,
    density: Option<FeedLabel>,
    is_shared: Option<bool>,
    is_event: Option<bool>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FeedCoordinates {
    longitude: Option<f64>,
    latitude: Option<f64>,
}

/// Density is free-form; some entries carry a number instead of a word.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedLabel {
    Text(String),
    Number(serde_json::Number),
}

impl FeedLabel {
    fn into_string(self) -> String {
        match self {
            FeedLabel::Text(s) => s,
            FeedLabel::Number(n) => n.to_string(),
        }
    }
}

/// Split a feed document into its elements.
///
/// Fails when the body is not JSON or its top level is not an array.
pub fn parse_feed(body: &str) -> Result<Vec<RawSpawnRecord>> {
    let document: &RawValue = serde_json::from_str(body)
        .map_err(|e| ArtemisError::Feed(format!("Undecodable feed document: {}", e)))?;

    if !document.get().starts_with('[') {
        return Err(ArtemisError::Feed(format!(
            "Expected a JSON array at top level, got {}",
            json_kind(document.get())
        )));
    }

    let records: Vec<RawSpawnRecord> = serde_json::from_str(document.get())
        .map_err(|e| ArtemisError::Feed(format!("Undecodable feed document: {}", e)))?;
    Ok(records)
}

fn json_kind(text: &str) -> &'static str {
    match text.chars().next() {
        Some('n') => "null",
        Some('t') | Some('f') => "a boolean",
        Some('"') => "a string",
        Some('[') => "an array",
        Some('{') => "an object",
        _ => "a number",
    }
}

/// Id of a raw element, if it carries an integer `Id`.
pub fn raw_spawn_id(raw: &RawValue) -> Option<i64> {
    let value: serde_json::Value = serde_json::from_str(raw.get()).ok()?;
    value.get("Id")?.as_i64()
}

/// Decode one feed element. The returned record has no timestamps yet.
pub fn spawn_from_feed(raw: &RawValue) -> Result<SpawnRecord> {
    let feed: FeedSpawn = serde_json::from_str(raw.get())?;

    let id = feed
        .id
        .ok_or_else(|| ArtemisError::MissingField("Id".to_string()))?;

    let planet = feed
        .planet
        .and_then(|p| p.name)
        .unwrap_or_else(|| UNKNOWN_PLANET.to_string());
    let props = feed.properties.unwrap_or_default();
    let center = props
        .coordinates
        .and_then(|c| Coordinate::from_parts(c.longitude, c.latitude));

    Ok(SpawnRecord {
        id,
        name: feed.name.unwrap_or_else(|| UNKNOWN_SPAWN_NAME.to_string()),
        planet,
        spawn_type: props.spawn_type,
        shape: props.shape,
        center,
        density: props.density.map(FeedLabel::into_string),
        is_shared: props.is_shared.unwrap_or(false),
        is_event: props.is_event.unwrap_or(false),
        notes: props.notes,
        data_json: raw.get().to_string(),
        created_at: None,
        updated_at: None,
    })
}

/// HTTP client for the spawn provider.
pub struct FeedClient {
    client: reqwest::Client,
    url: String,
}

impl FeedClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download and split the feed. Any transport, status or top-level
    /// decode failure is returned as-is; nothing is retried.
    pub async fn fetch(&self) -> Result<Vec<RawSpawnRecord>> {
        tracing::info!("Fetching spawn data from {}", self.url);

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ArtemisError::Feed(format!(
                "{} returned HTTP {}",
                self.url, status
            )));
        }

        let body = response.text().await?;
        let records = parse_feed(&body)?;
        tracing::info!("Received {} spawn records", records.len());
        Ok(records)
    }
}

/// Wrap a JSON value as a feed element.
#[cfg(test)]
pub(crate) fn raw_record(value: serde_json::Value) -> RawSpawnRecord {
    serde_json::value::to_raw_value(&value).unwrap()
}
