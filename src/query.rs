// Query parameters for searching, filtering and sorting vehicles

use crate::vehicle::Vehicle;
use std::cmp::Ordering;
use std::str::FromStr;

/// String field a search can match against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Name,
    Type,
    VehicleClass,
    Transmission,
    Mileage,
    MaxSpeed,
    Seats,
    ReleaseDate,
    ImagePath,
}

impl SearchField {
    /// Resolve a wire field name. Unknown names give `None`, which searches
    /// treat as an empty value for every record.
    pub fn from_name(name: &str) -> Option<Self> {
        let field = match name {
            "name" => SearchField::Name,
            "type" => SearchField::Type,
            "vehicleClass" => SearchField::VehicleClass,
            "transmission" => SearchField::Transmission,
            "mileage" => SearchField::Mileage,
            "maxSpeed" => SearchField::MaxSpeed,
            "seats" => SearchField::Seats,
            "releaseDate" => SearchField::ReleaseDate,
            "imagePath" => SearchField::ImagePath,
            _ => return None,
        };
        Some(field)
    }

    pub fn value(self, vehicle: &Vehicle) -> &str {
        match self {
            SearchField::Name => &vehicle.name,
            SearchField::Type => &vehicle.vehicle_type,
            SearchField::VehicleClass => &vehicle.vehicle_class,
            SearchField::Transmission => &vehicle.transmission,
            SearchField::Mileage => &vehicle.mileage,
            SearchField::MaxSpeed => &vehicle.max_speed,
            SearchField::Seats => &vehicle.seats,
            SearchField::ReleaseDate => &vehicle.release_date,
            SearchField::ImagePath => &vehicle.image_path,
        }
    }
}

/// Conjunction of the four filter predicates
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    /// Exact type match; empty disables the check
    pub type_filter: String,
    pub min_rating: f64,
    pub max_price: f64,
    pub available_only: bool,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            type_filter: String::new(),
            min_rating: 0.0,
            max_price: f64::INFINITY,
            available_only: false,
        }
    }
}

impl FilterCriteria {
    pub fn matches(&self, vehicle: &Vehicle) -> bool {
        (self.type_filter.is_empty() || vehicle.vehicle_type == self.type_filter)
            && vehicle.rating >= self.min_rating
            && vehicle.price <= self.max_price
            && (!self.available_only || vehicle.available)
    }
}

/// Key a listing can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Price,
    Rating,
}

impl SortKey {
    pub const NAMES: [&'static str; 3] = ["name", "price", "rating"];

    /// Ascending comparison of two vehicles on this key
    pub fn compare(self, a: &Vehicle, b: &Vehicle) -> Ordering {
        match self {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Price => a.price.total_cmp(&b.price),
            SortKey::Rating => a.rating.total_cmp(&b.rating),
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(SortKey::Name),
            "price" => Ok(SortKey::Price),
            "rating" => Ok(SortKey::Rating),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortKey::Name => write!(f, "name"),
            SortKey::Price => write!(f, "price"),
            SortKey::Rating => write!(f, "rating"),
        }
    }
}
