use crate::error::{ArtemisError, Result};
use crate::geo::Coordinate;
use crate::models::SpawnRecord;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::time::Duration;

/// Column list matching [`spawn_from_row`].
pub(crate) const SPAWN_COLUMNS: &str = "id, name, planet, type, shape, center_lon, center_lat, \
     density, is_shared, is_event, notes, data_json, created_at, updated_at";

/// Handle to the spawn store and mob catalog.
///
/// Opened per command and passed explicitly to whatever needs it; the
/// schema is created on first use.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    pub fn new(path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(ArtemisError::Pool)?;

        let db = Self { pool };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(ArtemisError::Pool)
    }

    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.connection()?;

        let tx = conn.transaction()?;

        tx.execute_batch(
            r#"
            -- Community spawn feed
            CREATE TABLE IF NOT EXISTS nexus_spawns (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                planet TEXT NOT NULL,
                type TEXT,
                shape TEXT,
                center_lon REAL,
                center_lat REAL,
                density TEXT,
                is_shared INTEGER,
                is_event INTEGER,
                notes TEXT,
                data_json TEXT,
                created_at INTEGER DEFAULT (strftime('%s', 'now')),
                updated_at INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_nexus_spawns_planet ON nexus_spawns(planet);

            -- Mob catalog, populated out of band
            CREATE TABLE IF NOT EXISTS mobs (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                hp REAL NOT NULL,
                maturity TEXT,
                planet TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_mobs_planet_hp ON mobs(planet, hp);
            "#,
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Insert a spawn or replace every modeled field of an existing one.
    /// created_at keeps its first-seen value; updated_at is set to `synced_at`.
    pub(crate) fn upsert_spawn(
        &self,
        conn: &Connection,
        spawn: &SpawnRecord,
        synced_at: i64,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO nexus_spawns (
                id, name, planet, type, shape, center_lon, center_lat,
                density, is_shared, is_event, notes, data_json, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                planet = excluded.planet,
                type = excluded.type,
                shape = excluded.shape,
                center_lon = excluded.center_lon,
                center_lat = excluded.center_lat,
                density = excluded.density,
                is_shared = excluded.is_shared,
                is_event = excluded.is_event,
                notes = excluded.notes,
                data_json = excluded.data_json,
                updated_at = excluded.updated_at",
            params![
                spawn.id,
                spawn.name,
                spawn.planet,
                spawn.spawn_type,
                spawn.shape,
                spawn.center.map(|c| c.lon),
                spawn.center.map(|c| c.lat),
                spawn.density,
                spawn.is_shared,
                spawn.is_event,
                spawn.notes,
                spawn.data_json,
                synced_at,
            ],
        )?;
        Ok(())
    }

    /// Fetch a single spawn by its feed id.
    pub fn get_spawn(&self, id: i64) -> Result<Option<SpawnRecord>> {
        let conn = self.connection()?;
        let spawn = conn
            .query_row(
                &format!("SELECT {} FROM nexus_spawns WHERE id = ?", SPAWN_COLUMNS),
                params![id],
                spawn_from_row,
            )
            .optional()?;
        Ok(spawn)
    }

    /// All spawn ids currently stored, ascending.
    pub fn spawn_ids(&self) -> Result<Vec<i64>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT id FROM nexus_spawns ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    pub fn count_spawns(&self) -> Result<usize> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM nexus_spawns", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// `LIKE` pattern matching names that contain `fragment` literally.
/// Use with `ESCAPE '\'`.
pub(crate) fn contains_pattern(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Map a row selected with [`SPAWN_COLUMNS`] to a [`SpawnRecord`].
pub(crate) fn spawn_from_row(row: &Row<'_>) -> rusqlite::Result<SpawnRecord> {
    let lon: Option<f64> = row.get(5)?;
    let lat: Option<f64> = row.get(6)?;
    let is_shared: Option<bool> = row.get(8)?;
    let is_event: Option<bool> = row.get(9)?;
    let data_json: Option<String> = row.get(11)?;

    Ok(SpawnRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        planet: row.get(2)?,
        spawn_type: row.get(3)?,
        shape: row.get(4)?,
        center: Coordinate::from_parts(lon, lat),
        density: row.get(7)?,
        is_shared: is_shared.unwrap_or(false),
        is_event: is_event.unwrap_or(false),
        notes: row.get(10)?,
        data_json: data_json.unwrap_or_default(),
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spawn(id: i64) -> SpawnRecord {
        SpawnRecord {
            id,
            name: "Foul, Young - Mature".to_string(),
            planet: "Calypso".to_string(),
            spawn_type: Some("Mob".to_string()),
            shape: Some("Circle".to_string()),
            center: Some(Coordinate::new(79085.0, 67537.0)),
            density: Some("Medium".to_string()),
            is_shared: false,
            is_event: true,
            notes: None,
            data_json: "{}".to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("Foul"), "%Foul%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("a_b\\c"), "%a\\_b\\\\c%");
    }

    #[test]
    fn test_schema_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entropia.db");

        let db = Database::new(&path).unwrap();
        drop(db);
        let db = Database::new(&path).unwrap();
        assert_eq!(db.count_spawns().unwrap(), 0);
    }

    #[test]
    fn test_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("entropia.db");

        Database::new(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_upsert_and_get_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("entropia.db")).unwrap();
        let conn = db.connection().unwrap();

        db.upsert_spawn(&conn, &sample_spawn(7), 1_700_000_000).unwrap();

        let stored = db.get_spawn(7).unwrap().unwrap();
        assert_eq!(stored.name, "Foul, Young - Mature");
        assert_eq!(stored.center, Some(Coordinate::new(79085.0, 67537.0)));
        assert!(stored.is_event);
        assert!(!stored.is_shared);
        assert_eq!(stored.updated_at, Some(1_700_000_000));
        assert!(stored.created_at.is_some());
        assert!(db.get_spawn(8).unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_fields_and_keeps_created_at() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("entropia.db")).unwrap();
        let conn = db.connection().unwrap();

        db.upsert_spawn(&conn, &sample_spawn(7), 100).unwrap();
        conn.execute("UPDATE nexus_spawns SET created_at = 42 WHERE id = 7", []).unwrap();

        let mut changed = sample_spawn(7);
        changed.name = "Foul, Old".to_string();
        changed.center = None;
        changed.density = None;
        db.upsert_spawn(&conn, &changed, 200).unwrap();

        let stored = db.get_spawn(7).unwrap().unwrap();
        assert_eq!(stored.name, "Foul, Old");
        assert_eq!(stored.center, None);
        assert_eq!(stored.density, None);
        assert_eq!(stored.created_at, Some(42));
        assert_eq!(stored.updated_at, Some(200));
        assert_eq!(db.count_spawns().unwrap(), 1);
    }
}
