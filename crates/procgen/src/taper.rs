//! Radius taper profile along a branch.

use plant_core::{PlantError, PlantResult};
use serde::{Deserialize, Serialize};

/// One key of a [`TaperProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaperKey {
    /// Normalized position along the branch (0 = base, 1 = tip).
    pub position: f32,
    /// Radius multiplier at that position.
    pub value: f32,
}

/// Piecewise-linear curve mapping branch position to a radius multiplier.
///
/// Positions outside the key range clamp to the first/last key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaperProfile {
    keys: Vec<TaperKey>,
}

impl Default for TaperProfile {
    fn default() -> Self {
        Self {
            keys: vec![
                TaperKey { position: 0.0, value: 0.12 },
                TaperKey { position: 1.0, value: 0.02 },
            ],
        }
    }
}

impl TaperProfile {
    /// Profile from keys sorted by position.
    pub fn new(keys: Vec<TaperKey>) -> PlantResult<Self> {
        let profile = Self { keys };
        profile.validate()?;
        Ok(profile)
    }

    /// Constant radius multiplier.
    pub fn constant(value: f32) -> Self {
        Self {
            keys: vec![TaperKey { position: 0.0, value }],
        }
    }

    /// Require at least one key, sorted by position.
    pub fn validate(&self) -> PlantResult<()> {
        if self.keys.is_empty() {
            return Err(PlantError::EmptyTaperProfile);
        }
        for (index, pair) in self.keys.windows(2).enumerate() {
            if !(pair[1].position >= pair[0].position) {
                return Err(PlantError::UnsortedTaperProfile { index: index + 1 });
            }
        }
        Ok(())
    }

    /// Keys in position order.
    pub fn keys(&self) -> &[TaperKey] {
        &self.keys
    }

    /// Radius multiplier at normalized `position`.
    pub fn evaluate(&self, position: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if position <= first.position {
            return first.value;
        }
        if position >= last.position {
            return last.value;
        }
        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if position <= b.position {
                let span = b.position - a.position;
                if span <= f32::EPSILON {
                    return b.value;
                }
                let t = (position - a.position) / span;
                return a.value + (b.value - a.value) * t;
            }
        }
        last.value
    }

    /// Whether the radius never grows toward the tip.
    pub fn is_non_increasing(&self) -> bool {
        self.keys.windows(2).all(|pair| pair[1].value <= pair[0].value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_linearly_between_keys() {
        let profile = TaperProfile::new(vec![
            TaperKey { position: 0.0, value: 1.0 },
            TaperKey { position: 0.5, value: 0.5 },
            TaperKey { position: 1.0, value: 0.0 },
        ])
        .unwrap();
        assert!((profile.evaluate(0.25) - 0.75).abs() < 1e-6);
        assert!((profile.evaluate(0.75) - 0.25).abs() < 1e-6);
        assert_eq!(profile.evaluate(-1.0), 1.0);
        assert_eq!(profile.evaluate(2.0), 0.0);
    }

    #[test]
    fn rejects_empty_and_unsorted() {
        assert_eq!(TaperProfile::new(Vec::new()).unwrap_err(), PlantError::EmptyTaperProfile);
        let err = TaperProfile::new(vec![
            TaperKey { position: 0.6, value: 1.0 },
            TaperKey { position: 0.2, value: 0.5 },
        ])
        .unwrap_err();
        assert_eq!(err, PlantError::UnsortedTaperProfile { index: 1 });
    }

    #[test]
    fn default_profile_tapers() {
        let profile = TaperProfile::default();
        assert!(profile.is_non_increasing());
        assert!(profile.evaluate(0.0) > profile.evaluate(1.0));
        assert_eq!(TaperProfile::constant(0.3).evaluate(0.9), 0.3);
    }
}
