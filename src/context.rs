//! Generation context: the immutable descriptor every layer reads.
//!
//! A [`Context`] can only be built through [`Context::new`] (or the builder
//! helpers on it), which rejects physically meaningless combinations such as
//! a desert crossed by a permanent river.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::features::FeatureType;

/// Lowercase and unify separators so `"HIGH-LAND"`, `"high_land"` and `"High Land"` compare equal.
pub(crate) fn normalize_token(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Broad biome of the battlemap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Biome {
    Forest,
    Grassland,
    Desert,
    Mountain,
    Swamp,
    Coastal,
    Tundra,
    Jungle,
    Underground,
}

impl Biome {
    pub const ALL: [Biome; 9] = [
        Biome::Forest,
        Biome::Grassland,
        Biome::Desert,
        Biome::Mountain,
        Biome::Swamp,
        Biome::Coastal,
        Biome::Tundra,
        Biome::Jungle,
        Biome::Underground,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Biome::Forest => "forest",
            Biome::Grassland => "grassland",
            Biome::Desert => "desert",
            Biome::Mountain => "mountain",
            Biome::Swamp => "swamp",
            Biome::Coastal => "coastal",
            Biome::Tundra => "tundra",
            Biome::Jungle => "jungle",
            Biome::Underground => "underground",
        }
    }

    /// Base moisture the biome contributes before hydrology is applied (0-1).
    pub fn base_moisture(&self) -> f32 {
        match self {
            Biome::Forest => 0.5,
            Biome::Grassland => 0.35,
            Biome::Desert => 0.05,
            Biome::Mountain => 0.35,
            Biome::Swamp => 0.8,
            Biome::Coastal => 0.5,
            Biome::Tundra => 0.3,
            Biome::Jungle => 0.75,
            Biome::Underground => 0.4,
        }
    }
}

/// Elevation band the map sits in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElevationZone {
    Lowland,
    Foothills,
    Highland,
    Alpine,
}

impl ElevationZone {
    pub const ALL: [ElevationZone; 4] = [
        ElevationZone::Lowland,
        ElevationZone::Foothills,
        ElevationZone::Highland,
        ElevationZone::Alpine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElevationZone::Lowland => "lowland",
            ElevationZone::Foothills => "foothills",
            ElevationZone::Highland => "highland",
            ElevationZone::Alpine => "alpine",
        }
    }

    /// Base elevation of the zone in feet.
    pub fn base_elevation(&self) -> f32 {
        match self {
            ElevationZone::Lowland => 50.0,
            ElevationZone::Foothills => 800.0,
            ElevationZone::Highland => 2500.0,
            ElevationZone::Alpine => 7000.0,
        }
    }

    /// Relief multiplier applied to the noise field (feet of local relief).
    pub fn relief(&self) -> f32 {
        match self {
            ElevationZone::Lowland => 6.0,
            ElevationZone::Foothills => 14.0,
            ElevationZone::Highland => 28.0,
            ElevationZone::Alpine => 55.0,
        }
    }
}

/// Surface water regime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HydrologyType {
    Arid,
    Seasonal,
    Springs,
    Stream,
    River,
    Lake,
    Wetland,
    Coastal,
}

impl HydrologyType {
    pub const ALL: [HydrologyType; 8] = [
        HydrologyType::Arid,
        HydrologyType::Seasonal,
        HydrologyType::Springs,
        HydrologyType::Stream,
        HydrologyType::River,
        HydrologyType::Lake,
        HydrologyType::Wetland,
        HydrologyType::Coastal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HydrologyType::Arid => "arid",
            HydrologyType::Seasonal => "seasonal",
            HydrologyType::Springs => "springs",
            HydrologyType::Stream => "stream",
            HydrologyType::River => "river",
            HydrologyType::Lake => "lake",
            HydrologyType::Wetland => "wetland",
            HydrologyType::Coastal => "coastal",
        }
    }

    /// Whether the regime implies year-round standing or flowing water.
    pub fn is_permanent_water(&self) -> bool {
        matches!(
            self,
            HydrologyType::River | HydrologyType::Lake | HydrologyType::Wetland
        )
    }
}

/// How built-up the map is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DevelopmentLevel {
    Wilderness,
    Frontier,
    Rural,
    Settled,
    Urban,
}

impl DevelopmentLevel {
    pub const ALL: [DevelopmentLevel; 5] = [
        DevelopmentLevel::Wilderness,
        DevelopmentLevel::Frontier,
        DevelopmentLevel::Rural,
        DevelopmentLevel::Settled,
        DevelopmentLevel::Urban,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DevelopmentLevel::Wilderness => "wilderness",
            DevelopmentLevel::Frontier => "frontier",
            DevelopmentLevel::Rural => "rural",
            DevelopmentLevel::Settled => "settled",
            DevelopmentLevel::Urban => "urban",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Autumn, Season::Winter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        }
    }

    /// Additive moisture shift for the season.
    pub fn moisture_shift(&self) -> f32 {
        match self {
            Season::Spring => 0.1,
            Season::Summer => -0.1,
            Season::Autumn => 0.0,
            Season::Winter => 0.05,
        }
    }
}

macro_rules! impl_token_traits {
    ($ty:ty, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = normalize_token(s);
                <$ty>::ALL
                    .iter()
                    .copied()
                    .find(|v| normalize_token(v.as_str()) == wanted)
                    .ok_or_else(|| ValidationError::UnknownValue {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

impl_token_traits!(Biome, "biome");
impl_token_traits!(ElevationZone, "elevation zone");
impl_token_traits!(HydrologyType, "hydrology type");
impl_token_traits!(DevelopmentLevel, "development level");
impl_token_traits!(Season, "season");

/// Immutable generation context.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Context {
    biome: Biome,
    elevation: ElevationZone,
    hydrology: HydrologyType,
    development: DevelopmentLevel,
    season: Season,
    required_features: Vec<FeatureType>,
}

impl Context {
    /// Build a context, rejecting incompatible combinations.
    pub fn new(
        biome: Biome,
        elevation: ElevationZone,
        hydrology: HydrologyType,
        development: DevelopmentLevel,
        season: Season,
    ) -> Result<Self, ValidationError> {
        Self::with_required_features(biome, elevation, hydrology, development, season, Vec::new())
    }

    /// Build a context that also demands specific features be placed when possible.
    pub fn with_required_features(
        biome: Biome,
        elevation: ElevationZone,
        hydrology: HydrologyType,
        development: DevelopmentLevel,
        season: Season,
        mut required_features: Vec<FeatureType>,
    ) -> Result<Self, ValidationError> {
        check_compatibility(biome, elevation, hydrology)?;
        required_features.sort();
        required_features.dedup();
        Ok(Self {
            biome,
            elevation,
            hydrology,
            development,
            season,
            required_features,
        })
    }

    pub fn biome(&self) -> Biome {
        self.biome
    }

    pub fn elevation(&self) -> ElevationZone {
        self.elevation
    }

    pub fn hydrology(&self) -> HydrologyType {
        self.hydrology
    }

    pub fn development(&self) -> DevelopmentLevel {
        self.development
    }

    pub fn season(&self) -> Season {
        self.season
    }

    pub fn required_features(&self) -> &[FeatureType] {
        &self.required_features
    }
}

/// Raw, unchecked form used for deserialization; converted through [`Context::new`].
#[derive(Deserialize)]
struct RawContext {
    biome: Biome,
    elevation: ElevationZone,
    hydrology: HydrologyType,
    development: DevelopmentLevel,
    season: Season,
    #[serde(default)]
    required_features: Vec<FeatureType>,
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawContext::deserialize(deserializer)?;
        Context::with_required_features(
            raw.biome,
            raw.elevation,
            raw.hydrology,
            raw.development,
            raw.season,
            raw.required_features,
        )
        .map_err(serde::de::Error::custom)
    }
}

fn check_compatibility(
    biome: Biome,
    elevation: ElevationZone,
    hydrology: HydrologyType,
) -> Result<(), ValidationError> {
    let hydrology_conflict = match (biome, hydrology) {
        (Biome::Desert, h) if h.is_permanent_water() => {
            Some("deserts cannot sustain permanent surface water")
        }
        (Biome::Coastal, h) if h != HydrologyType::Coastal => {
            Some("coastal maps require coastal hydrology")
        }
        (Biome::Swamp, h) if h != HydrologyType::Wetland => {
            Some("swamps require wetland hydrology")
        }
        (Biome::Underground, HydrologyType::Coastal) => {
            Some("underground maps have no shoreline")
        }
        _ => None,
    };
    if let Some(reason) = hydrology_conflict {
        return Err(ValidationError::IncompatibleHydrology {
            biome,
            hydrology,
            reason,
        });
    }

    let elevation_conflict = match (biome, elevation) {
        (Biome::Underground, ElevationZone::Alpine) => {
            Some("cave systems are not generated above the treeline")
        }
        (Biome::Coastal, ElevationZone::Alpine) => Some("shorelines do not reach alpine elevations"),
        (Biome::Swamp, ElevationZone::Alpine) => Some("wetlands do not form at alpine elevations"),
        (Biome::Jungle, ElevationZone::Alpine) => Some("jungle canopy does not reach alpine elevations"),
        _ => None,
    };
    if let Some(reason) = elevation_conflict {
        return Err(ValidationError::IncompatibleElevation {
            biome,
            elevation,
            reason,
        });
    }

    Ok(())
}
