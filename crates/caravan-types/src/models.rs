use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fulfillment status of a request. Transitions between statuses are
/// governed by the lifecycle engine, never set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Open,
    Committed,
    Accepted,
    Delivered,
    Received,
    Completed,
    Removed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Committed => "COMMITTED",
            Self::Accepted => "ACCEPTED",
            Self::Delivered => "DELIVERED",
            Self::Received => "RECEIVED",
            Self::Completed => "COMPLETED",
            Self::Removed => "REMOVED",
        }
    }

    /// Lowercase form used in notification template keys.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Committed => "committed",
            Self::Accepted => "accepted",
            Self::Delivered => "delivered",
            Self::Received => "received",
            Self::Completed => "completed",
            Self::Removed => "removed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(Self::Open),
            "COMMITTED" => Some(Self::Committed),
            "ACCEPTED" => Some(Self::Accepted),
            "DELIVERED" => Some(Self::Delivered),
            "RECEIVED" => Some(Self::Received),
            "COMPLETED" => Some(Self::Completed),
            "REMOVED" => Some(Self::Removed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item size, totally ordered. Variant order is the comparison order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestSize {
    Tiny,
    Small,
    Medium,
    Large,
    Xlarge,
}

impl RequestSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tiny => "TINY",
            Self::Small => "SMALL",
            Self::Medium => "MEDIUM",
            Self::Large => "LARGE",
            Self::Xlarge => "XLARGE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "TINY" => Some(Self::Tiny),
            "SMALL" => Some(Self::Small),
            "MEDIUM" => Some(Self::Medium),
            "LARGE" => Some(Self::Large),
            "XLARGE" => Some(Self::Xlarge),
            _ => None,
        }
    }

    pub fn is_larger_or_same(&self, other: RequestSize) -> bool {
        *self >= other
    }
}

/// Who may see a request outside its owning organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestVisibility {
    All,
    Same,
    Trusted,
}

impl RequestVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Same => "SAME",
            Self::Trusted => "TRUSTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ALL" => Some(Self::All),
            "SAME" => Some(Self::Same),
            "TRUSTED" => Some(Self::Trusted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserAdminRole {
    User,
    Admin,
    SuperAdmin,
}

impl UserAdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
            Self::SuperAdmin => "SUPERADMIN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(Self::User),
            "ADMIN" => Some(Self::Admin),
            "SUPERADMIN" => Some(Self::SuperAdmin),
            _ => None,
        }
    }
}

/// A user as resolved by the identity collaborator. The engine trusts the
/// resolved identity and does no authentication of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub uuid: Uuid,
    pub nickname: String,
    pub email: String,
    pub admin_role: UserAdminRole,
}

impl User {
    pub fn is_super_admin(&self) -> bool {
        self.admin_role == UserAdminRole::SuperAdmin
    }
}

/// A geocoded place. Coordinates come from the external geocoding
/// collaborator; a location with no coordinates never passes a proximity
/// check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub description: String,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    pub fn new(description: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            description: description.into(),
            country: None,
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }
}

/// The central marketplace entity: an item someone needs carried.
///
/// `id` is the internal numeric key, `uuid` the stable external ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: i64,
    pub uuid: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub size: RequestSize,
    pub status: RequestStatus,
    pub visibility: RequestVisibility,
    pub kilograms: Option<f64>,
    pub url: Option<String>,
    pub needed_before: Option<NaiveDate>,
    /// Set exactly while status is COMPLETED, cleared on leaving it.
    pub completed_on: Option<NaiveDate>,
    pub created_by: i64,
    /// The committed fulfiller, set once the request reaches ACCEPTED.
    pub provider_id: Option<i64>,
    /// Defaults to the creator.
    pub receiver_id: Option<i64>,
    pub organization_id: i64,
    pub destination: Location,
    pub origin: Option<Location>,
    pub meeting_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit entry: one row per distinct status the request has
/// held, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestHistory {
    pub id: i64,
    pub request_id: i64,
    pub status: RequestStatus,
    pub receiver_id: Option<i64>,
    pub provider_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A candidate fulfiller who expressed interest before one was accepted.
/// The whole roster for a request is dropped when it reaches ACCEPTED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotentialProvider {
    pub id: i64,
    pub request_id: i64,
    pub user_id: i64,
    pub delivery_after: NaiveDate,
    pub delivery_before: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A standing subscription that fires alerts when matching requests appear.
/// Every criterion is optional; an absent criterion always matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watch {
    pub id: i64,
    pub uuid: Uuid,
    pub owner_id: i64,
    pub name: String,
    pub destination: Option<Location>,
    pub origin: Option<Location>,
    pub meeting_id: Option<i64>,
    pub search_text: Option<String>,
    pub size: Option<RequestSize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_ordering() {
        assert!(RequestSize::Tiny < RequestSize::Small);
        assert!(RequestSize::Small < RequestSize::Medium);
        assert!(RequestSize::Medium < RequestSize::Large);
        assert!(RequestSize::Large < RequestSize::Xlarge);
        assert!(RequestSize::Large.is_larger_or_same(RequestSize::Medium));
        assert!(RequestSize::Medium.is_larger_or_same(RequestSize::Medium));
        assert!(!RequestSize::Small.is_larger_or_same(RequestSize::Medium));
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            RequestStatus::Open,
            RequestStatus::Committed,
            RequestStatus::Accepted,
            RequestStatus::Delivered,
            RequestStatus::Received,
            RequestStatus::Completed,
            RequestStatus::Removed,
        ] {
            assert_eq!(RequestStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(RequestStatus::from_str("bogus"), None);
    }
}
