// Command/response envelopes and dispatch onto the inventory

use crate::codec;
use crate::query::{FilterCriteria, SortKey};
use crate::store::Inventory;
use crate::vehicle::Vehicle;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// Contents that mean "no command pending"
pub const EMPTY_ENVELOPE: &str = "{}";

/// Operation selected by a command's `action`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    GetAllCars,
    AddCar,
    UpdateCar,
    DeleteCar,
    SearchCars,
    FilterCars,
    SortCars,
    Unknown(String),
}

impl Action {
    pub fn parse(action: &str) -> Self {
        match action {
            "GET_ALL_CARS" => Action::GetAllCars,
            "ADD_CAR" => Action::AddCar,
            "UPDATE_CAR" => Action::UpdateCar,
            "DELETE_CAR" => Action::DeleteCar,
            "SEARCH_CARS" => Action::SearchCars,
            "FILTER_CARS" => Action::FilterCars,
            "SORT_CARS" => Action::SortCars,
            other => Action::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::GetAllCars => "GET_ALL_CARS",
            Action::AddCar => "ADD_CAR",
            Action::UpdateCar => "UPDATE_CAR",
            Action::DeleteCar => "DELETE_CAR",
            Action::SearchCars => "SEARCH_CARS",
            Action::FilterCars => "FILTER_CARS",
            Action::SortCars => "SORT_CARS",
            Action::Unknown(other) => other,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inbound command envelope.
///
/// Action-specific fields stay in the raw body and are read leniently by the
/// handler that needs them.
#[derive(Debug, Clone)]
pub struct Command {
    pub id: String,
    pub action: Action,
    body: Value,
}

impl Command {
    /// Build a command from a decoded envelope. Returns `None` when the
    /// envelope carries no usable `id` (missing, empty or not a string).
    pub fn from_value(body: Value) -> Option<Self> {
        let id = body.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())?.to_string();
        let action = Action::parse(body.get("action").and_then(Value::as_str).unwrap_or_default());
        Some(Self { id, action, body })
    }

    fn str_field(&self, key: &str) -> &str {
        self.body.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    fn f64_field(&self, key: &str, default: f64) -> f64 {
        self.body.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    fn bool_field(&self, key: &str, default: bool) -> bool {
        self.body.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    fn car(&self) -> Result<Vehicle, DispatchError> {
        match self.body.get("car") {
            Some(car) if car.is_object() => Ok(codec::decode_object(car)),
            _ => Err(DispatchError::MissingCar),
        }
    }

    fn filter_criteria(&self) -> FilterCriteria {
        let defaults = FilterCriteria::default();
        FilterCriteria {
            type_filter: self.str_field("typeFilter").to_string(),
            min_rating: self.f64_field("minRating", defaults.min_rating),
            max_price: self.f64_field("maxPrice", defaults.max_price),
            available_only: self.bool_field("availableOnly", defaults.available_only),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Outbound response envelope: `data` for queries, `message` otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Vehicle>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    pub fn data(id: impl Into<String>, vehicles: Vec<Vehicle>) -> Self {
        Self {
            id: id.into(),
            status: Status::Success,
            data: Some(vehicles),
            message: None,
        }
    }

    pub fn ok(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: Status::Success,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: Status::Error,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Render with four-space indentation
    pub fn to_pretty_json(&self) -> eyre::Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Domain failures reported back to the caller as `status = "error"`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("Command is missing the 'car' object.")]
    MissingCar,
    #[error("Car with this name already exists.")]
    DuplicateName,
    #[error("Car not found for update.")]
    NotFoundForUpdate,
    #[error("Car name for deletion cannot be empty.")]
    EmptyName,
    #[error("Car not found for deletion.")]
    NotFoundForDeletion,
    #[error("Unknown sort key '{0}'; expected one of: name, price, rating.")]
    UnknownSortKey(String),
    #[error("Unknown action '{0}'.")]
    UnknownAction(String),
}

/// Run one command against the inventory and build its response.
///
/// Never fails: every problem becomes an error response. Failed commands
/// leave the inventory unchanged.
pub fn dispatch(inventory: &mut Inventory, command: &Command) -> Response {
    info!(id = %command.id, action = %command.action, "Received command");

    match handle(inventory, command) {
        Ok(response) => response,
        Err(e) => {
            warn!(id = %command.id, action = %command.action, error = %e, "Command failed");
            Response::error(&command.id, e.to_string())
        }
    }
}

fn handle(inventory: &mut Inventory, command: &Command) -> Result<Response, DispatchError> {
    let id = command.id.as_str();

    match &command.action {
        Action::GetAllCars => Ok(Response::data(id, inventory.get_all())),
        Action::AddCar => {
            let car = command.car()?;
            if inventory.contains(&car.name) {
                return Err(DispatchError::DuplicateName);
            }
            inventory.add(car);
            Ok(Response::ok(id, "Car added successfully."))
        }
        Action::UpdateCar => {
            let car = command.car()?;
            if !inventory.update(car) {
                return Err(DispatchError::NotFoundForUpdate);
            }
            Ok(Response::ok(id, "Car updated successfully."))
        }
        Action::DeleteCar => {
            let name = command.str_field("carName");
            if name.is_empty() {
                return Err(DispatchError::EmptyName);
            }
            if !inventory.delete(name) {
                return Err(DispatchError::NotFoundForDeletion);
            }
            Ok(Response::ok(id, "Car deleted successfully."))
        }
        Action::SearchCars => {
            let results = inventory.search(command.str_field("query"), command.str_field("searchField"));
            Ok(Response::data(id, results))
        }
        Action::FilterCars => Ok(Response::data(id, inventory.filter(&command.filter_criteria()))),
        Action::SortCars => {
            let key: SortKey = command.str_field("sortBy").parse().map_err(DispatchError::UnknownSortKey)?;
            let ascending = command.bool_field("ascending", true);
            Ok(Response::data(id, inventory.sort(key, ascending)))
        }
        Action::Unknown(action) => Err(DispatchError::UnknownAction(action.clone())),
    }
}
