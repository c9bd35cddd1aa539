// Vehicle record for the rental inventory

use serde::{Deserialize, Serialize};

/// One rentable car. `name` is the natural key used for update, delete and
/// duplicate detection; the store itself does not enforce uniqueness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Vehicle {
    pub name: String,
    pub available: bool,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub rating: f64,
    pub image_path: String,
    /// Free-form, e.g. "12 km/l"
    pub mileage: String,
    pub max_speed: String,
    pub seats: String,
    pub transmission: String,
    pub vehicle_class: String,
    pub price: f64,
    /// Not parsed
    pub release_date: String,
}

impl Vehicle {
    /// Shorthand for building a record with the fields most callers care about.
    /// Everything else starts empty.
    pub fn new(name: impl Into<String>, vehicle_type: impl Into<String>, rating: f64, price: f64) -> Self {
        Self {
            name: name.into(),
            vehicle_type: vehicle_type.into(),
            rating,
            price,
            ..Self::default()
        }
    }
}
