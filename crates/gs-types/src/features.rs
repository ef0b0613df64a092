//! Feature catalogs and the combinations drawn from them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::{GsError, GsResult};

/// Largest universe a `u64` mask can address.
pub const MAX_UNIVERSE_SIZE: usize = 63;

/// A named input signal with its stable catalog identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub id: u32,
}

impl Feature {
    pub fn new(name: impl Into<String>, id: u32) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.name, self.id)
    }
}

/// The two built-in feature catalogs a sweep can run over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniverseKind {
    /// Flow and timing features only.
    Narrow,
    /// Flow and timing features plus volume and pressure features.
    Broad,
}

impl UniverseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Narrow => "narrow",
            Self::Broad => "broad",
        }
    }

    /// Materialize the catalog for this kind.
    pub fn universe(&self) -> FeatureUniverse {
        let mut features = vec![
            Feature::new("mean_flow_from_pef", 38),
            Feature::new("inst_RR", 8),
            Feature::new("minF_to_zero", 36),
            Feature::new("pef_+0.16_to_zero", 37),
            Feature::new("iTime", 6),
            Feature::new("eTime", 7),
            Feature::new("I:E ratio", 5),
            Feature::new("dyn_compliance", 39),
            Feature::new("TVratio", 11),
        ];
        if *self == Self::Broad {
            features.extend([
                Feature::new("TVi", 9),
                Feature::new("PIP", 15),
                Feature::new("PEEP", 17),
                Feature::new("vol_at_76", 41),
                Feature::new("min_pressure", 35),
            ]);
        }
        FeatureUniverse {
            name: self.as_str().to_string(),
            features,
        }
    }
}

impl fmt::Display for UniverseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UniverseKind {
    type Err = GsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "narrow" | "flow_time" => Ok(Self::Narrow),
            "broad" => Ok(Self::Broad),
            other => Err(GsError::Validation(format!(
                "unknown feature universe '{other}' (expected 'narrow' or 'broad')"
            ))),
        }
    }
}

/// An ordered, immutable catalog of features.
///
/// The position of a feature in the catalog is its bit in every
/// [`FeatureCombination`] mask drawn from the universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureUniverse {
    name: String,
    features: Vec<Feature>,
}

impl FeatureUniverse {
    /// Build a universe, rejecting duplicate ids and catalogs too large to mask.
    pub fn new(name: impl Into<String>, features: Vec<Feature>) -> GsResult<Self> {
        if features.len() > MAX_UNIVERSE_SIZE {
            return Err(GsError::Validation(format!(
                "feature universe has {} features; at most {} are supported",
                features.len(),
                MAX_UNIVERSE_SIZE
            )));
        }

        let mut seen = HashSet::with_capacity(features.len());
        for feature in &features {
            if !seen.insert(feature.id) {
                return Err(GsError::Validation(format!(
                    "duplicate feature id {} ({})",
                    feature.id, feature.name
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            features,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of subsets of this universe (2^k).
    pub fn combination_count(&self) -> u64 {
        1u64 << self.features.len()
    }

    /// The subset selected by the binary representation of `mask`.
    ///
    /// Bit `j` selects the `j`-th feature. Bits above the universe size are
    /// ignored.
    pub fn combination(&self, mask: u64) -> FeatureCombination {
        let mask = mask & (self.combination_count() - 1);
        let features = self
            .features
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1u64 << bit) != 0)
            .map(|(_, feature)| feature.clone())
            .collect();
        FeatureCombination { mask, features }
    }
}

/// A subset of a [`FeatureUniverse`], identified by its bitmask.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureCombination {
    mask: u64,
    features: Vec<Feature>,
}

impl FeatureCombination {
    pub fn mask(&self) -> u64 {
        self.mask
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }
}

impl fmt::Display for FeatureCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.names().join(", "))
    }
}
