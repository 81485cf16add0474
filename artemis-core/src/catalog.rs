//! Mob catalog: out-of-band population and lookup by name.

use crate::database::{Database, contains_pattern};
use crate::error::{ArtemisError, Result};
use crate::models::{ImportSummary, MobCatalogEntry, MobDefinition};
use rusqlite::{Row, params};
use std::io::Read;
use std::path::Path;

pub(crate) const MOB_COLUMNS: &str = "id, name, hp, maturity, planet";

pub(crate) fn mob_from_row(row: &Row<'_>) -> rusqlite::Result<MobDefinition> {
    Ok(MobDefinition {
        id: row.get(0)?,
        name: row.get(1)?,
        hp: row.get(2)?,
        maturity: row.get(3)?,
        planet: row.get(4)?,
    })
}

/// Read catalog rows (`name,hp,maturity,planet`) from a CSV file.
///
/// Rows that do not deserialize are logged and counted, not fatal.
pub fn read_catalog_csv(path: &Path) -> Result<(Vec<MobCatalogEntry>, usize)> {
    let file = std::fs::File::open(path).map_err(|e| {
        ArtemisError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open mob catalog {:?}: {}", path, e),
        ))
    })?;
    read_catalog_from(file)
}

pub fn read_catalog_from<R: Read>(reader: R) -> Result<(Vec<MobCatalogEntry>, usize)> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut entries = Vec::new();
    let mut bad_rows = 0;

    for (line, result) in reader.deserialize::<MobCatalogEntry>().enumerate() {
        match result {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                bad_rows += 1;
                tracing::warn!("Skipping catalog row {}: {}", line + 2, e);
            }
        }
    }

    Ok((entries, bad_rows))
}

fn validate_entry(entry: &MobCatalogEntry) -> Result<()> {
    if entry.name.trim().is_empty() {
        return Err(ArtemisError::MissingField("name".to_string()));
    }
    if entry.planet.trim().is_empty() {
        return Err(ArtemisError::MissingField("planet".to_string()));
    }
    if !entry.hp.is_finite() || entry.hp <= 0.0 {
        return Err(ArtemisError::Validation(format!(
            "HP must be positive, got {} for {}",
            entry.hp, entry.name
        )));
    }
    Ok(())
}

impl Database {
    /// Insert catalog entries in one transaction, optionally clearing the
    /// catalog first. Invalid entries are skipped and counted.
    pub fn insert_mobs(&self, entries: &[MobCatalogEntry], replace: bool) -> Result<ImportSummary> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        if replace {
            tx.execute("DELETE FROM mobs", ())?;
        }

        let mut summary = ImportSummary::default();

        for entry in entries {
            if let Err(e) = validate_entry(entry) {
                summary.skipped += 1;
                tracing::warn!("Skipping mob {:?}: {}", entry.name, e);
                continue;
            }

            tx.execute(
                "INSERT INTO mobs (name, hp, maturity, planet) VALUES (?1, ?2, ?3, ?4)",
                params![entry.name, entry.hp, entry.maturity, entry.planet],
            )?;
            summary.imported += 1;
        }

        tx.commit()?;
        Ok(summary)
    }

    /// Catalog entries on `planet` whose name contains `fragment`, by HP.
    pub fn mobs_by_name(&self, planet: &str, fragment: &str) -> Result<Vec<MobDefinition>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM mobs
             WHERE planet = ?1 AND name LIKE ?2 ESCAPE '\\'
             ORDER BY hp, id",
            MOB_COLUMNS
        ))?;

        let mobs = stmt
            .query_map(params![planet, contains_pattern(fragment)], mob_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(mobs)
    }

    pub fn count_mobs(&self) -> Result<usize> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM mobs", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
