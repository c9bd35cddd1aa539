// Conversions between vehicles and their persisted / wire representations

use crate::vehicle::Vehicle;
use serde_json::{Map, Value};

/// Field separator of the flat-file format
pub const DELIMITER: char = '|';

/// Number of fields in one flat-file line
pub const FIELD_COUNT: usize = 12;

/// A flat-file line that does not split into exactly [`FIELD_COUNT`] fields
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected 12 fields, found {found}")]
pub struct FieldCountError {
    pub found: usize,
}

/// Encode a vehicle as one pipe-delimited line (without the trailing newline).
///
/// Field order: name, available, type, rating, imagePath, mileage, maxSpeed,
/// seats, transmission, vehicleClass, price, releaseDate. Embedded `|` or
/// newlines are written as-is and will not survive a reload.
pub fn encode_line(vehicle: &Vehicle) -> String {
    let available = if vehicle.available { "1" } else { "0" };
    let rating = vehicle.rating.to_string();
    let price = vehicle.price.to_string();

    [
        vehicle.name.as_str(),
        available,
        vehicle.vehicle_type.as_str(),
        rating.as_str(),
        vehicle.image_path.as_str(),
        vehicle.mileage.as_str(),
        vehicle.max_speed.as_str(),
        vehicle.seats.as_str(),
        vehicle.transmission.as_str(),
        vehicle.vehicle_class.as_str(),
        price.as_str(),
        vehicle.release_date.as_str(),
    ]
    .join("|")
}

/// Decode one pipe-delimited line.
///
/// Unparsable `rating`/`price` fall back to 0.0; only a wrong field count is
/// rejected.
pub fn decode_line(line: &str) -> Result<Vehicle, FieldCountError> {
    let fields: Vec<&str> = line.split(DELIMITER).collect();
    if fields.len() != FIELD_COUNT {
        return Err(FieldCountError { found: fields.len() });
    }

    Ok(Vehicle {
        name: fields[0].to_string(),
        available: fields[1] == "1",
        vehicle_type: fields[2].to_string(),
        rating: parse_number(fields[3]),
        image_path: fields[4].to_string(),
        mileage: fields[5].to_string(),
        max_speed: fields[6].to_string(),
        seats: fields[7].to_string(),
        transmission: fields[8].to_string(),
        vehicle_class: fields[9].to_string(),
        price: parse_number(fields[10]),
        release_date: fields[11].to_string(),
    })
}

fn parse_number(field: &str) -> f64 {
    field.trim().parse().unwrap_or(0.0)
}

/// Encode a vehicle as a JSON object with camelCase field names
pub fn encode_object(vehicle: &Vehicle) -> Value {
    let mut map = Map::new();
    map.insert("name".into(), vehicle.name.clone().into());
    map.insert("available".into(), vehicle.available.into());
    map.insert("type".into(), vehicle.vehicle_type.clone().into());
    map.insert("rating".into(), number(vehicle.rating));
    map.insert("imagePath".into(), vehicle.image_path.clone().into());
    map.insert("mileage".into(), vehicle.mileage.clone().into());
    map.insert("maxSpeed".into(), vehicle.max_speed.clone().into());
    map.insert("seats".into(), vehicle.seats.clone().into());
    map.insert("transmission".into(), vehicle.transmission.clone().into());
    map.insert("vehicleClass".into(), vehicle.vehicle_class.clone().into());
    map.insert("price".into(), number(vehicle.price));
    map.insert("releaseDate".into(), vehicle.release_date.clone().into());
    Value::Object(map)
}

// JSON has no NaN or infinity
fn number(n: f64) -> Value {
    serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// Decode a vehicle from a JSON value.
///
/// Never fails: a missing or wrongly typed field takes its default (empty
/// string, `false`, `0.0`), and a non-object yields an all-default vehicle.
pub fn decode_object(value: &Value) -> Vehicle {
    let text = |key: &str| value.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let float = |key: &str| value.get(key).and_then(Value::as_f64).unwrap_or(0.0);

    Vehicle {
        name: text("name"),
        available: value.get("available").and_then(Value::as_bool).unwrap_or(false),
        vehicle_type: text("type"),
        rating: float("rating"),
        image_path: text("imagePath"),
        mileage: text("mileage"),
        max_speed: text("maxSpeed"),
        seats: text("seats"),
        transmission: text("transmission"),
        vehicle_class: text("vehicleClass"),
        price: float("price"),
        release_date: text("releaseDate"),
    }
}
