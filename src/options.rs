use serde::Deserialize;

/// Options for track conversion.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOptions {
    /// Douglas-Peucker tolerance in feet; 0 disables simplification (default: 0)
    #[serde(default)]
    pub max_point_deviation_feet: f64,

    /// Speeds above this (mph) are left out of track speed statistics;
    /// 0 disables filtering (default: 0)
    #[serde(default)]
    pub max_possible_speed: f64,

    /// Drop GPX points near `privacy_center` (default: false)
    #[serde(default)]
    pub check_privacy: bool,

    /// `[longitude, latitude]` of the location to hide
    #[serde(default)]
    pub privacy_center: Option<[f64; 2]>,

    /// Radius around `privacy_center` in miles (default: 1)
    #[serde(default = "default_privacy_miles")]
    pub privacy_miles: f64,

    /// Unit for distances and speeds (default: miles)
    #[serde(default)]
    pub distance_unit: DistanceUnit,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            max_point_deviation_feet: 0.0,
            max_possible_speed: 0.0,
            check_privacy: false,
            privacy_center: None,
            privacy_miles: default_privacy_miles(),
            distance_unit: DistanceUnit::default(),
        }
    }
}

impl ConvertOptions {
    /// Privacy center when redaction is active.
    pub fn privacy_center(&self) -> Option<[f64; 2]> {
        if self.check_privacy {
            self.privacy_center
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Miles,
    Kilometers,
}

impl DistanceUnit {
    pub const fn earth_radius(self) -> f64 {
        match self {
            Self::Miles => 3958.756,
            Self::Kilometers => 6371.0,
        }
    }
}

/// A named KML/KMZ layer and the provider whose property names it uses.
#[derive(Debug, Clone, Deserialize)]
pub struct MapSource {
    pub name: String,
    pub provider: String,
    pub url: String,
}

impl MapSource {
    pub fn is_kmz(&self) -> bool {
        self.url.to_ascii_lowercase().ends_with(".kmz")
    }
}

fn default_privacy_miles() -> f64 {
    1.0
}
