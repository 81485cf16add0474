//! Ranking catalog mobs by how well their HP explains an observed value.
//!
//! Mob HP grows multiplicatively with maturity, so candidates are admitted
//! by a relative band rather than a fixed HP window.

use crate::catalog::{MOB_COLUMNS, mob_from_row};
use crate::database::Database;
use crate::error::{ArtemisError, Result};
use crate::models::{MatchCandidate, MobDefinition};
use rusqlite::params;

/// Relative slack applied to both band edges so values on the edge survive
/// float rounding of `hp * (1 ± t)`.
const BAND_EPSILON: f64 = 1e-9;

/// Inclusive HP band `[hp * (1 - t), hp * (1 + t)]`, each edge widened by
/// [`BAND_EPSILON`].
pub fn tolerance_band(observed_hp: f64, tolerance: f64) -> (f64, f64) {
    (
        observed_hp * (1.0 - tolerance) * (1.0 - BAND_EPSILON),
        observed_hp * (1.0 + tolerance) * (1.0 + BAND_EPSILON),
    )
}

fn validate(observed_hp: f64, tolerance: f64) -> Result<()> {
    if !observed_hp.is_finite() || observed_hp <= 0.0 {
        return Err(ArtemisError::Validation(format!(
            "Observed HP must be a positive number, got {}",
            observed_hp
        )));
    }
    if !tolerance.is_finite() || !(0.0..1.0).contains(&tolerance) {
        return Err(ArtemisError::Validation(format!(
            "Tolerance must be in [0, 1), got {}",
            tolerance
        )));
    }
    Ok(())
}

impl Database {
    /// Catalog mobs on `planet` whose HP lies in the tolerance band around
    /// `observed_hp`, closest HP first, at most `limit` of them.
    ///
    /// An empty list means nothing on that planet explains the value; widen
    /// the tolerance or identify the mob by hand.
    pub fn match_by_hp(
        &self,
        planet: &str,
        observed_hp: f64,
        tolerance: f64,
        limit: usize,
    ) -> Result<Vec<MatchCandidate<MobDefinition>>> {
        validate(observed_hp, tolerance)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let (min_hp, max_hp) = tolerance_band(observed_hp, tolerance);

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM mobs
             WHERE planet = ?1 AND hp BETWEEN ?2 AND ?3
             ORDER BY ABS(hp - ?4) ASC, id ASC
             LIMIT ?5",
            MOB_COLUMNS
        ))?;

        let candidates = stmt
            .query_map(
                params![planet, min_hp, max_hp, observed_hp, limit as i64],
                mob_from_row,
            )?
            .map(|mob| mob.map(|mob| {
                let delta = (mob.hp - observed_hp).abs();
                MatchCandidate::new(mob, delta)
            }))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::debug!(
            "HP {} on {}: {} candidates in [{:.0}, {:.0}]",
            observed_hp,
            planet,
            candidates.len(),
            min_hp,
            max_hp
        );
        Ok(candidates)
    }
}
