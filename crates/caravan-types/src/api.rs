use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Location, RequestSize, RequestVisibility};

// -- Requests --

/// Input for creating a request. New requests always start in OPEN.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestInput {
    pub title: String,
    pub description: Option<String>,
    pub size: RequestSize,
    #[serde(default = "default_visibility")]
    pub visibility: RequestVisibility,
    pub kilograms: Option<f64>,
    pub url: Option<String>,
    pub needed_before: Option<NaiveDate>,
    pub organization_id: i64,
    pub destination: Location,
    pub origin: Option<Location>,
    pub meeting_id: Option<i64>,
    /// Defaults to the creator when absent.
    pub receiver_id: Option<i64>,
}

fn default_visibility() -> RequestVisibility {
    RequestVisibility::All
}

/// Partial update of a request's mutable fields. `None` leaves a field
/// unchanged; status is never part of this, status moves go through
/// the lifecycle engine's transition operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub size: Option<RequestSize>,
    pub visibility: Option<RequestVisibility>,
    pub kilograms: Option<f64>,
    pub url: Option<String>,
    pub needed_before: Option<NaiveDate>,
    pub destination: Option<Location>,
    pub origin: Option<Location>,
}

// -- Watches --

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchInput {
    pub name: String,
    pub destination: Option<Location>,
    pub origin: Option<Location>,
    pub meeting_id: Option<i64>,
    pub search_text: Option<String>,
    pub size: Option<RequestSize>,
}
