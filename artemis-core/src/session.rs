//! Read-only reports over the session tracker's database.
//!
//! The sessions, events and loadouts tables belong to the companion app.
//! Nothing here writes to them or checks their schema beyond the columns
//! each query reads.

use crate::error::{ArtemisError, Result};
use crate::geo::Coordinate;
use crate::models::{
    LoadoutCostBreakdown, LoadoutCosts, SessionOverview, SessionStats, SessionSummary,
};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OpenFlags, OptionalExtension, params};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

pub const GPS_EVENT_TYPE: &str = "GPS_UPDATE";

#[derive(Debug, Deserialize)]
struct GpsPayload {
    location: Option<GpsLocation>,
}

#[derive(Debug, Deserialize)]
struct GpsLocation {
    lon: Option<f64>,
    lat: Option<f64>,
}

/// Decode an optional JSON text column, treating NULL, blank and
/// undecodable values as absent.
fn decode_blob<T: DeserializeOwned>(raw: Option<&str>, what: &str) -> Option<T> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring undecodable {}: {}", what, e);
            None
        }
    }
}

/// Read-only handle to the session tracker database.
pub struct SessionStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SessionStore {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ArtemisError::NotFound(format!(
                "Session database not found: {}",
                path.display()
            )));
        }

        let manager = SqliteConnectionManager::file(path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX);
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(ArtemisError::Pool)?;

        Ok(Self { pool })
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(ArtemisError::Pool)
    }

    /// Id of the most recently started session, if any.
    pub fn latest_session_id(&self) -> Result<Option<String>> {
        let conn = self.connection()?;
        let id = conn
            .query_row(
                "SELECT CAST(id AS TEXT) FROM sessions ORDER BY start_time DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Most recent sessions with their event counts, newest first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionOverview>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT CAST(s.id AS TEXT), s.name, CAST(s.loadout_id AS TEXT),
                    CAST(COALESCE(s.duration, 0) AS INTEGER),
                    (SELECT COUNT(*) FROM events e WHERE e.session_id = s.id)
             FROM sessions s
             ORDER BY s.start_time DESC
             LIMIT ?1",
        )?;

        let sessions = stmt
            .query_map(params![limit as i64], |row| {
                let name: Option<String> = row.get(1)?;
                let event_count: i64 = row.get(4)?;
                Ok(SessionOverview {
                    id: row.get(0)?,
                    name: name.unwrap_or_default(),
                    loadout_id: row.get(2)?,
                    duration_seconds: row.get(3)?,
                    event_count: event_count as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Profit and activity summary for one session.
    ///
    /// A session without stats reports zeros with `has_stats == false`; an
    /// unknown session id is an error.
    pub fn summarize(&self, session_id: &str) -> Result<SessionSummary> {
        let conn = self.connection()?;

        let (name, loadout_id, duration_seconds, stats_json): (
            Option<String>,
            Option<String>,
            i64,
            Option<String>,
        ) = conn
            .query_row(
                "SELECT name, CAST(loadout_id AS TEXT),
                        CAST(COALESCE(duration, 0) AS INTEGER), stats
                 FROM sessions WHERE id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?
            .ok_or_else(|| ArtemisError::NotFound(format!("Session {}", session_id)))?;

        let stats: Option<SessionStats> =
            decode_blob(stats_json.as_deref(), &format!("stats of session {}", session_id));
        let has_stats = stats.is_some();
        let stats = stats.unwrap_or_default();

        let event_counts_by_type: BTreeMap<String, u64> = {
            let mut stmt = conn.prepare(
                "SELECT COALESCE(type, ''), COUNT(*) FROM events WHERE session_id = ?1 GROUP BY type",
            )?;
            let counts = stmt
                .query_map(params![session_id], |row| {
                    let count: i64 = row.get(1)?;
                    Ok((row.get::<_, String>(0)?, count as u64))
                })?
                .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
            counts
        };
        let total_events = event_counts_by_type.values().sum();
        let gps_sample_count = event_counts_by_type.get(GPS_EVENT_TYPE).copied().unwrap_or(0);

        drop(conn);
        let loadout = match loadout_id.as_deref() {
            Some(id) => self.loadout_costs(id)?,
            None => None,
        };

        Ok(SessionSummary {
            session_id: session_id.to_string(),
            name: name.unwrap_or_default(),
            loadout_id,
            duration_seconds,
            has_stats,
            kill_count: stats.total_kills,
            loot_value: stats.total_loot_tt_value,
            ammo_cost: stats.total_ammo_cost,
            profit: stats.profit,
            event_counts_by_type,
            total_events,
            gps_sample_count,
            loadout,
        })
    }

    /// Cost context of a loadout. Missing cost fields come back as `None`.
    pub fn loadout_costs(&self, loadout_id: &str) -> Result<Option<LoadoutCosts>> {
        let conn = self.connection()?;
        let row: Option<(String, Option<String>, Option<String>, Option<bool>, Option<f64>)> = conn
            .query_row(
                "SELECT CAST(id AS TEXT), name, costs, use_manual_cost, manual_cost_override
                 FROM loadouts WHERE id = ?1",
                params![loadout_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;

        let Some((id, name, costs_json, use_manual_cost, manual_cost_override)) = row else {
            return Ok(None);
        };

        let costs: LoadoutCostBreakdown =
            decode_blob(costs_json.as_deref(), &format!("costs of loadout {}", id))
                .unwrap_or_default();

        Ok(Some(LoadoutCosts {
            id,
            name: name.unwrap_or_default(),
            total_per_shot: costs.total_per_shot,
            use_manual_cost: use_manual_cost.unwrap_or(false),
            manual_cost_override,
            json_manual_cost_override: costs.manual_cost_override,
        }))
    }

    /// First `limit` GPS positions recorded in a session, in recording order.
    /// Payloads without a full location are skipped.
    pub fn gps_samples(&self, session_id: &str, limit: usize) -> Result<Vec<Coordinate>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT payload FROM events
             WHERE session_id = ?1 AND type = ?2
             ORDER BY rowid
             LIMIT ?3",
        )?;

        let payloads = stmt
            .query_map(params![session_id, GPS_EVENT_TYPE, limit as i64], |row| {
                row.get::<_, Option<String>>(0)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let samples = payloads
            .iter()
            .filter_map(|payload| decode_blob::<GpsPayload>(payload.as_deref(), "GPS payload"))
            .filter_map(|gps| {
                let location = gps.location?;
                Coordinate::from_parts(location.lon, location.lat)
            })
            .collect();
        Ok(samples)
    }
}
