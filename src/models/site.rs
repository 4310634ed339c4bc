use crate::utils::coordinates::{deserialize_coordinate, haversine_distance};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Site {
    #[validate(length(min = 1))]
    pub id: String,

    /// Decimal degrees or `DD:MM:SS[E|W]`
    #[validate(range(min = -180.0, max = 180.0))]
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub longitude: f64,

    #[validate(range(min = -90.0, max = 90.0))]
    #[serde(deserialize_with = "deserialize_coordinate")]
    pub latitude: f64,

    /// Metres above sea level; only feeds the station-pressure estimate in the VPD calculation.
    #[serde(default)]
    pub elevation: f64,
}

impl Site {
    pub fn new(id: String, longitude: f64, latitude: f64, elevation: f64) -> Self {
        Self {
            id,
            longitude,
            latitude,
            elevation,
        }
    }

    /// Great-circle distance in kilometres to a grid-cell centre.
    pub fn distance_to(&self, longitude: f64, latitude: f64) -> f64 {
        haversine_distance(self.latitude, self.longitude, latitude, longitude)
    }
}
