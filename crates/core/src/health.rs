//! Crew health effects of room atmosphere
//!
//! Scores are on a 0-100 scale. Symptoms (headache, dizziness) start at 0 and
//! rise as O₂ drops below 19.5 % / 16 % or CO₂ climbs above 1000 / 5000 ppm;
//! productivity and morale start at 100 and fall.

use serde::{Deserialize, Serialize};

// ============================================================================
// THRESHOLDS
// ============================================================================

/// O₂ below which dizziness sets in, percent
pub const O2_MILD_HYPOXIA: f64 = 19.5;

/// O₂ below which headaches and morale loss set in, percent
pub const O2_SEVERE_HYPOXIA: f64 = 16.0;

/// CO₂ above which headaches set in, ppm
pub const CO2_ELEVATED: f64 = 1000.0;

/// CO₂ above which dizziness sets in, ppm
pub const CO2_DANGEROUS: f64 = 5000.0;

/// Crew condition scores, each clamped to [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthEffects {
    /// Headache severity
    pub headache: f64,
    /// Dizziness severity
    pub dizziness: f64,
    /// Work capacity
    pub productivity: f64,
    /// Crew morale
    pub morale: f64,
}

impl Default for HealthEffects {
    /// A crew breathing nominal air
    fn default() -> Self {
        Self {
            headache: 0.0,
            dizziness: 0.0,
            productivity: 100.0,
            morale: 100.0,
        }
    }
}

impl HealthEffects {
    /// Effects of breathing air at the given levels
    #[must_use]
    pub fn from_levels(o2_percent: f64, co2_ppm: f64) -> Self {
        let mut e = Self::default();

        if o2_percent < O2_MILD_HYPOXIA {
            let deficit = O2_MILD_HYPOXIA - o2_percent;
            e.dizziness = 20.0 * deficit;
            e.productivity -= 10.0 * deficit;
        }
        if o2_percent < O2_SEVERE_HYPOXIA {
            let deficit = O2_SEVERE_HYPOXIA - o2_percent;
            e.headache = 30.0 * deficit;
            e.productivity -= 30.0 * deficit;
            e.morale -= 20.0 * deficit;
        }

        if co2_ppm > CO2_ELEVATED {
            let excess = co2_ppm - CO2_ELEVATED;
            e.headache += excess / 500.0 * 10.0;
            e.productivity -= excess / 500.0 * 5.0;
            e.morale -= excess / 1000.0 * 10.0;
        }
        if co2_ppm > CO2_DANGEROUS {
            e.dizziness += (co2_ppm - CO2_DANGEROUS) / 1000.0 * 20.0;
        }

        e.clamped()
    }

    /// Mean of several rooms' effects, `None` for an empty set
    pub fn average<I>(effects: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        let (sum, count) = effects.into_iter().fold(
            (
                Self {
                    headache: 0.0,
                    dizziness: 0.0,
                    productivity: 0.0,
                    morale: 0.0,
                },
                0_u32,
            ),
            |(acc, n), e| {
                (
                    Self {
                        headache: acc.headache + e.headache,
                        dizziness: acc.dizziness + e.dizziness,
                        productivity: acc.productivity + e.productivity,
                        morale: acc.morale + e.morale,
                    },
                    n + 1,
                )
            },
        );
        (count > 0).then(|| {
            let n = f64::from(count);
            Self {
                headache: sum.headache / n,
                dizziness: sum.dizziness / n,
                productivity: sum.productivity / n,
                morale: sum.morale / n,
            }
        })
    }

    fn clamped(self) -> Self {
        Self {
            headache: self.headache.clamp(0.0, 100.0),
            dizziness: self.dizziness.clamp(0.0, 100.0),
            productivity: self.productivity.clamp(0.0, 100.0),
            morale: self.morale.clamp(0.0, 100.0),
        }
    }
}
