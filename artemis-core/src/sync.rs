//! Spawn synchronization: upserting a fetched feed into the spawn store.

use crate::database::Database;
use crate::error::Result;
use crate::feed::{RawSpawnRecord, raw_spawn_id, spawn_from_feed};
use crate::models::{SyncOptions, SyncResult};
use chrono::Utc;
use std::collections::HashSet;

impl Database {
    /// Upsert every feed element in one transaction.
    ///
    /// Elements that fail to decode or to write are counted in `skipped` and
    /// do not abort the batch; each write runs under its own savepoint so a
    /// failed one leaves no trace. An error that ends the enclosing
    /// transaction (disk full, I/O, a trigger rollback) is returned, as is a
    /// failure to open, prune or commit, and the store is left as it was
    /// before the call.
    pub fn sync_spawns(&self, feed: &[RawSpawnRecord], options: &SyncOptions) -> Result<SyncResult> {
        let mut conn = self.connection()?;
        let mut tx = conn.transaction()?;

        let synced_at = Utc::now().timestamp();
        let mut result = SyncResult::default();
        let mut seen_ids = HashSet::new();

        for raw in feed {
            // Keep ids of broken elements too, so pruning never drops them.
            if let Some(id) = raw_spawn_id(raw) {
                seen_ids.insert(id);
            }

            let spawn = match spawn_from_feed(raw) {
                Ok(spawn) => spawn,
                Err(e) => {
                    result.skipped += 1;
                    tracing::warn!("Skipping spawn {:?}: {}", raw_spawn_id(raw), e);
                    continue;
                }
            };

            let savepoint = tx.savepoint()?;
            match self.upsert_spawn(&savepoint, &spawn, synced_at) {
                Ok(()) => {
                    savepoint.commit()?;
                    result.inserted += 1;
                    if result.inserted % 100 == 0 {
                        tracing::debug!("Progress: {} spawn records upserted", result.inserted);
                    }
                }
                Err(e) => {
                    // Dropping rolls back to the savepoint
                    drop(savepoint);
                    if tx.is_autocommit() {
                        tracing::error!("Spawn {} aborted the sync transaction: {}", spawn.id, e);
                        return Err(e);
                    }
                    result.skipped += 1;
                    tracing::warn!("Failed to upsert spawn {}: {}", spawn.id, e);
                }
            }
        }

        if options.prune_missing {
            let stored: Vec<i64> = {
                let mut stmt = tx.prepare("SELECT id FROM nexus_spawns")?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                ids
            };

            for id in stored.into_iter().filter(|id| !seen_ids.contains(id)) {
                tx.execute("DELETE FROM nexus_spawns WHERE id = ?", [id])?;
                result.pruned += 1;
            }
        }

        tx.commit()?;

        tracing::debug!(
            "Spawn sync committed: {} upserted, {} skipped, {} pruned",
            result.inserted,
            result.skipped,
            result.pruned
        );
        Ok(result)
    }
}
