//! Ranking stored spawns by distance from a player position.

use crate::database::{Database, SPAWN_COLUMNS, contains_pattern, spawn_from_row};
use crate::error::Result;
use crate::geo::Coordinate;
use crate::models::{MatchCandidate, SpawnRecord};
use rusqlite::params;

impl Database {
    /// The `limit` spawns on `planet` closest to `origin`, nearest first.
    ///
    /// Spawns without a full center coordinate never match. Equal distances
    /// keep id order. An empty list means nothing is mapped on that planet.
    pub fn nearest(
        &self,
        planet: &str,
        origin: Coordinate,
        limit: usize,
    ) -> Result<Vec<MatchCandidate<SpawnRecord>>> {
        self.nearest_matching(planet, origin, None, limit)
    }

    /// Like [`Database::nearest`], restricted to spawn names containing
    /// `name_contains` (case-insensitive for ASCII).
    pub fn nearest_matching(
        &self,
        planet: &str,
        origin: Coordinate,
        name_contains: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MatchCandidate<SpawnRecord>>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM nexus_spawns
             WHERE planet = ?1
               AND center_lon IS NOT NULL
               AND center_lat IS NOT NULL
               AND (?2 IS NULL OR name LIKE ?2 ESCAPE '\\')
             ORDER BY id",
            SPAWN_COLUMNS
        ))?;

        let pattern = name_contains.map(contains_pattern);
        let spawns = stmt
            .query_map(params![planet, pattern], spawn_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut ranked: Vec<MatchCandidate<SpawnRecord>> = spawns
            .into_iter()
            .filter_map(|spawn| {
                let distance = spawn.center?.distance_to(&origin);
                Some(MatchCandidate::new(spawn, distance))
            })
            .collect();

        // Stable sort, so ties stay in id order
        ranked.sort_by(|a, b| a.score.total_cmp(&b.score));
        ranked.truncate(limit);

        tracing::debug!(
            "Found {} spawns near {} on {}",
            ranked.len(),
            origin,
            planet
        );
        Ok(ranked)
    }

    /// Spawns on `planet` whose name contains `fragment`, ordered by name.
    pub fn spawns_by_name(&self, planet: &str, fragment: &str) -> Result<Vec<SpawnRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM nexus_spawns
             WHERE planet = ?1 AND name LIKE ?2 ESCAPE '\\'
             ORDER BY name, id",
            SPAWN_COLUMNS
        ))?;

        let spawns = stmt
            .query_map(params![planet, contains_pattern(fragment)], spawn_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(spawns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncOptions;
    use proptest::prelude::*;
    use crate::feed::{RawSpawnRecord, raw_record};
    use serde_json::json;

    fn spawn_json(
        id: i64,
        name: &str,
        planet: &str,
        lon: Option<f64>,
        lat: Option<f64>,
    ) -> RawSpawnRecord {
        raw_record(json!({
            "Id": id,
            "Name": name,
            "Planet": { "Name": planet },
            "Properties": { "Coordinates": { "Longitude": lon, "Latitude": lat } }
        }))
    }

    fn seeded_db(dir: &tempfile::TempDir, feed: &[RawSpawnRecord]) -> Database {
        let db = Database::new(&dir.path().join("entropia.db")).unwrap();
        db.sync_spawns(feed, &SyncOptions::default()).unwrap();
        db
    }

    #[test]
    fn test_nearest_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let db = seeded_db(&dir, &[spawn_json(1, "A", "Calypso", Some(100.0), Some(100.0))]);

        let results = db.nearest("Calypso", Coordinate::new(100.0, 103.0), 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entity.id, 1);
        assert_eq!(results[0].score, 3.0);
        assert_eq!(results[0].rounded_score(), 3.0);
    }

    #[test]
    fn test_nearest_orders_filters_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        let db = seeded_db(
            &dir,
            &[
                spawn_json(1, "Far", "Calypso", Some(1000.0), Some(0.0)),
                spawn_json(2, "Near", "Calypso", Some(3.0), Some(4.0)),
                spawn_json(3, "No coords", "Calypso", None, None),
                spawn_json(4, "Half coords", "Calypso", Some(0.0), None),
                spawn_json(5, "Other planet", "Arkadia", Some(0.0), Some(0.0)),
                spawn_json(6, "Middle", "Calypso", Some(0.0), Some(50.0)),
            ],
        );

        let results = db.nearest("Calypso", Coordinate::new(0.0, 0.0), 10).unwrap();
        let ids: Vec<i64> = results.iter().map(|c| c.entity.id).collect();
        assert_eq!(ids, vec![2, 6, 1]);
        assert_eq!(results[0].score, 5.0);

        let top = db.nearest("Calypso", Coordinate::new(0.0, 0.0), 2).unwrap();
        assert_eq!(top.len(), 2);
    }

    #[test]
    fn test_nearest_ties_keep_id_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = seeded_db(
            &dir,
            &[
                spawn_json(9, "East", "Calypso", Some(10.0), Some(0.0)),
                spawn_json(4, "West", "Calypso", Some(-10.0), Some(0.0)),
                spawn_json(7, "North", "Calypso", Some(0.0), Some(10.0)),
            ],
        );

        let ids: Vec<i64> = db
            .nearest("Calypso", Coordinate::new(0.0, 0.0), 3)
            .unwrap()
            .iter()
            .map(|c| c.entity.id)
            .collect();
        assert_eq!(ids, vec![4, 7, 9]);
    }

    #[test]
    fn test_nearest_empty_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = seeded_db(&dir, &[spawn_json(1, "A", "Calypso", Some(1.0), Some(1.0))]);

        assert!(db.nearest("Rocktropia", Coordinate::new(0.0, 0.0), 5).unwrap().is_empty());
        assert!(db.nearest("Calypso", Coordinate::new(0.0, 0.0), 0).unwrap().is_empty());
    }

    #[test]
    fn test_nearest_matching_name_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let db = seeded_db(
            &dir,
            &[
                spawn_json(1, "Foul, Young - Mature", "Calypso", Some(79354.0), Some(67537.0)),
                spawn_json(2, "Atrox, Old", "Calypso", Some(79085.0), Some(67538.0)),
                spawn_json(3, "Foul, Old - Provider", "Calypso", Some(80000.0), Some(67537.0)),
            ],
        );

        let origin = Coordinate::new(79085.0, 67537.0);
        let results = db.nearest_matching("Calypso", origin, Some("foul"), 5).unwrap();
        let ids: Vec<i64> = results.iter().map(|c| c.entity.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(results[0].rounded_score(), 269.0);
    }

    #[test]
    fn test_spawns_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let db = seeded_db(
            &dir,
            &[
                spawn_json(1, "Foul, Old", "Calypso", None, None),
                spawn_json(2, "Atrox", "Calypso", None, None),
                spawn_json(3, "Foul, Young", "Calypso", Some(1.0), Some(1.0)),
                spawn_json(4, "Foul, Young", "Arkadia", Some(1.0), Some(1.0)),
            ],
        );

        let names: Vec<String> = db
            .spawns_by_name("Calypso", "Foul")
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Foul, Old", "Foul, Young"]);
    }

    #[test]
    fn test_name_wildcards_match_literally() {
        let dir = tempfile::tempdir().unwrap();
        let db = seeded_db(
            &dir,
            &[
                spawn_json(1, "100% Foul", "Calypso", Some(0.0), Some(0.0)),
                spawn_json(2, "1000 Foul", "Calypso", Some(1.0), Some(1.0)),
                spawn_json(3, "Foul_Old", "Calypso", Some(2.0), Some(2.0)),
                spawn_json(4, "FoulXOld", "Calypso", Some(3.0), Some(3.0)),
            ],
        );

        let ids: Vec<i64> = db
            .spawns_by_name("Calypso", "0%")
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![1]);

        let origin = Coordinate::new(0.0, 0.0);
        let ids: Vec<i64> = db
            .nearest_matching("Calypso", origin, Some("l_O"), 5)
            .unwrap()
            .iter()
            .map(|c| c.entity.id)
            .collect();
        assert_eq!(ids, vec![3]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn nearest_is_sorted_and_filtered(
            points in prop::collection::vec(
                (
                    prop::option::of(-1000.0f64..1000.0),
                    prop::option::of(-1000.0f64..1000.0),
                    prop::bool::ANY,
                ),
                0..20,
            ),
            origin_lon in -1000.0f64..1000.0,
            origin_lat in -1000.0f64..1000.0,
            limit in 0usize..25,
        ) {
            let feed: Vec<RawSpawnRecord> = points
                .iter()
                .enumerate()
                .map(|(i, (lon, lat, on_calypso))| {
                    let planet = if *on_calypso { "Calypso" } else { "Arkadia" };
                    spawn_json(i as i64 + 1, "Spawn", planet, *lon, *lat)
                })
                .collect();
            let dir = tempfile::tempdir().unwrap();
            let db = seeded_db(&dir, &feed);
            let origin = Coordinate::new(origin_lon, origin_lat);

            let results = db.nearest("Calypso", origin, limit).unwrap();

            let eligible = points
                .iter()
                .filter(|(lon, lat, on_calypso)| *on_calypso && lon.is_some() && lat.is_some())
                .count();
            prop_assert_eq!(results.len(), eligible.min(limit));
            for pair in results.windows(2) {
                prop_assert!(pair[0].score <= pair[1].score);
            }
            for candidate in &results {
                prop_assert_eq!(candidate.entity.planet.as_str(), "Calypso");
                let center = candidate.entity.center.unwrap();
                prop_assert_eq!(candidate.score, center.distance_to(&origin));
            }
        }
    }
}
