//! Data models for spawn, mob catalog and session data.

use crate::geo::Coordinate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Community-reported spawn area, as stored in the nexus_spawns table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRecord {
    pub id: i64,
    pub name: String,
    pub planet: String,
    pub spawn_type: Option<String>,
    pub shape: Option<String>,
    pub center: Option<Coordinate>,
    pub density: Option<String>,
    pub is_shared: bool,
    pub is_event: bool,
    pub notes: Option<String>,
    pub data_json: String,        // Verbatim feed element
    pub created_at: Option<i64>,  // First seen, unix seconds; None until stored
    pub updated_at: Option<i64>,  // Last sync that wrote the row
}

impl SpawnRecord {
    pub fn first_seen(&self) -> Option<DateTime<Utc>> {
        self.created_at.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.updated_at.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

/// Database model for mobs table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobDefinition {
    pub id: i64,
    pub name: String,
    pub hp: f64,
    pub maturity: Option<String>, // "Young", "Mature", "Old", ...
    pub planet: String,
}

/// Mob catalog row read from an import CSV (name,hp,maturity,planet)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MobCatalogEntry {
    pub name: String,
    pub hp: f64,
    pub maturity: Option<String>,
    pub planet: String,
}

/// A ranked match: the entity plus its distance or HP delta.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate<T> {
    pub entity: T,
    pub score: f64,
}

impl<T> MatchCandidate<T> {
    pub fn new(entity: T, score: f64) -> Self {
        Self { entity, score }
    }

    /// Score rounded to the nearest whole unit, for display only.
    pub fn rounded_score(&self) -> f64 {
        self.score.round()
    }
}

/// Options for a spawn sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Delete stored spawns whose ids are absent from the feed.
    pub prune_missing: bool,
}

/// Aggregate counts of a spawn sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub inserted: usize,
    pub skipped: usize,
    pub pruned: usize,
}

/// Result of a catalog CSV import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Stats blob stored on a session row by the session tracker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionStats {
    #[serde(deserialize_with = "null_as_default")]
    pub total_kills: u64,
    #[serde(rename = "totalLootTTValue", deserialize_with = "null_as_default")]
    pub total_loot_tt_value: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_ammo_cost: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub profit: f64,
}

/// The tracker writes NaN as `null`; read it as zero instead of failing the blob.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Cost breakdown stored on a loadout row by the session tracker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadoutCostBreakdown {
    pub total_per_shot: Option<f64>,
    pub manual_cost_override: Option<f64>,
}

/// Loadout cost context for a session report
#[derive(Debug, Clone, PartialEq)]
pub struct LoadoutCosts {
    pub id: String,
    pub name: String,
    pub total_per_shot: Option<f64>,
    pub use_manual_cost: bool,
    pub manual_cost_override: Option<f64>,
    pub json_manual_cost_override: Option<f64>,
}

/// One line of a recent-sessions listing
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOverview {
    pub id: String,
    pub name: String,
    pub loadout_id: Option<String>,
    pub duration_seconds: i64,
    pub event_count: u64,
}

/// Read-only profit/activity summary of one hunting session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub name: String,
    pub loadout_id: Option<String>,
    pub duration_seconds: i64,
    pub has_stats: bool,
    pub kill_count: u64,
    pub loot_value: f64,
    pub ammo_cost: f64,
    pub profit: f64,
    pub event_counts_by_type: BTreeMap<String, u64>,
    pub total_events: u64,
    pub gps_sample_count: u64,
    pub loadout: Option<LoadoutCosts>,
}
