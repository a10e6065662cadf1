//! Database row types. These map directly to SQLite rows and convert to
//! the shared domain models at the edge. Kept distinct so the schema can
//! drift without touching caravan-types.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use caravan_types::models::{
    Location, PotentialProvider, Request, RequestHistory, RequestSize, RequestStatus,
    RequestVisibility, User, UserAdminRole, Watch,
};

pub struct UserRow {
    pub id: i64,
    pub uuid: String,
    pub nickname: String,
    pub email: String,
    pub admin_role: String,
}

pub struct RequestRow {
    pub id: i64,
    pub uuid: String,
    pub title: String,
    pub description: Option<String>,
    pub size: String,
    pub status: String,
    pub visibility: String,
    pub kilograms: Option<f64>,
    pub url: Option<String>,
    pub needed_before: Option<String>,
    pub completed_on: Option<String>,
    pub created_by: i64,
    pub provider_id: Option<i64>,
    pub receiver_id: Option<i64>,
    pub organization_id: i64,
    pub destination: LocationColumns,
    pub origin: LocationColumns,
    pub meeting_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct HistoryRow {
    pub id: i64,
    pub request_id: i64,
    pub status: String,
    pub receiver_id: Option<i64>,
    pub provider_id: Option<i64>,
    pub created_at: String,
}

pub struct PotentialProviderRow {
    pub id: i64,
    pub request_id: i64,
    pub user_id: i64,
    pub delivery_after: String,
    pub delivery_before: String,
    pub created_at: String,
}

pub struct WatchRow {
    pub id: i64,
    pub uuid: String,
    pub owner_id: i64,
    pub name: String,
    pub destination: LocationColumns,
    pub origin: LocationColumns,
    pub meeting_id: Option<i64>,
    pub search_text: Option<String>,
    pub size: Option<String>,
}

/// The four nullable columns a location flattens into. A location is
/// present iff its description column is non-null.
#[derive(Default)]
pub struct LocationColumns {
    pub description: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl LocationColumns {
    pub fn from_location(loc: Option<&Location>) -> Self {
        match loc {
            Some(l) => Self {
                description: Some(l.description.clone()),
                country: l.country.clone(),
                latitude: l.latitude,
                longitude: l.longitude,
            },
            None => Self::default(),
        }
    }

    pub fn into_location(self) -> Option<Location> {
        self.description.map(|description| Location {
            description,
            country: self.country,
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: self.id,
            uuid: parse_uuid(&self.uuid)?,
            admin_role: UserAdminRole::from_str(&self.admin_role)
                .ok_or_else(|| anyhow!("unknown admin role '{}'", self.admin_role))?,
            nickname: self.nickname,
            email: self.email,
        })
    }
}

impl RequestRow {
    pub fn into_request(self) -> Result<Request> {
        let destination = self
            .destination
            .into_location()
            .ok_or_else(|| anyhow!("request {} has no destination", self.id))?;

        Ok(Request {
            id: self.id,
            uuid: parse_uuid(&self.uuid)?,
            size: parse_size(&self.size)?,
            status: parse_status(&self.status)?,
            visibility: RequestVisibility::from_str(&self.visibility)
                .ok_or_else(|| anyhow!("unknown visibility '{}'", self.visibility))?,
            needed_before: self.needed_before.as_deref().map(parse_date).transpose()?,
            completed_on: self.completed_on.as_deref().map(parse_date).transpose()?,
            created_by: self.created_by,
            provider_id: self.provider_id,
            receiver_id: self.receiver_id,
            organization_id: self.organization_id,
            destination,
            origin: self.origin.into_location(),
            meeting_id: self.meeting_id,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            title: self.title,
            description: self.description,
            kilograms: self.kilograms,
            url: self.url,
        })
    }
}

impl HistoryRow {
    pub fn into_history(self) -> Result<RequestHistory> {
        Ok(RequestHistory {
            id: self.id,
            request_id: self.request_id,
            status: parse_status(&self.status)?,
            receiver_id: self.receiver_id,
            provider_id: self.provider_id,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl PotentialProviderRow {
    pub fn into_potential_provider(self) -> Result<PotentialProvider> {
        Ok(PotentialProvider {
            id: self.id,
            request_id: self.request_id,
            user_id: self.user_id,
            delivery_after: parse_date(&self.delivery_after)?,
            delivery_before: parse_date(&self.delivery_before)?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl WatchRow {
    pub fn into_watch(self) -> Result<Watch> {
        Ok(Watch {
            id: self.id,
            uuid: parse_uuid(&self.uuid)?,
            owner_id: self.owner_id,
            destination: self.destination.into_location(),
            origin: self.origin.into_location(),
            meeting_id: self.meeting_id,
            search_text: self.search_text,
            size: self.size.as_deref().map(parse_size).transpose()?,
            name: self.name,
        })
    }
}

/// Insert payload for a new request row. Status is always written as OPEN
/// by the lifecycle engine; it is a field here so tests can seed other
/// shapes directly.
pub struct NewRequest {
    pub uuid: String,
    pub title: String,
    pub description: Option<String>,
    pub size: RequestSize,
    pub status: RequestStatus,
    pub visibility: RequestVisibility,
    pub kilograms: Option<f64>,
    pub url: Option<String>,
    pub needed_before: Option<String>,
    pub created_by: i64,
    pub receiver_id: Option<i64>,
    pub organization_id: i64,
    pub destination: LocationColumns,
    pub origin: LocationColumns,
    pub meeting_id: Option<i64>,
}

pub struct NewWatch {
    pub uuid: String,
    pub owner_id: i64,
    pub name: String,
    pub destination: LocationColumns,
    pub origin: LocationColumns,
    pub meeting_id: Option<i64>,
    pub search_text: Option<String>,
    pub size: Option<RequestSize>,
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    s.parse().with_context(|| format!("corrupt uuid '{}'", s))
}

fn parse_status(s: &str) -> Result<RequestStatus> {
    RequestStatus::from_str(s).ok_or_else(|| anyhow!("unknown status '{}'", s))
}

fn parse_size(s: &str) -> Result<RequestSize> {
    RequestSize::from_str(s).ok_or_else(|| anyhow!("unknown size '{}'", s))
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("corrupt date '{}'", s))
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Accept RFC 3339 too, for values written by the application.
pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{}'", s))
}
