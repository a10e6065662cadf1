use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};

use caravan_types::models::{RequestSize, RequestStatus, UserAdminRole};

use crate::Database;
use crate::models::{
    HistoryRow, LocationColumns, NewRequest, NewWatch, PotentialProviderRow, RequestRow, UserRow,
    WatchRow,
};

/// Convenience wrappers for single reads and writes. The lifecycle engine
/// composes the free `query_*` functions below inside `Database::transaction`
/// instead, so its side effects commit as one unit.
impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        uuid: &str,
        nickname: &str,
        email: &str,
        admin_role: UserAdminRole,
    ) -> Result<i64> {
        self.with_conn(|conn| insert_user(conn, uuid, nickname, email, admin_role))
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    pub fn get_user_by_uuid(&self, uuid: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_uuid(conn, uuid))
    }

    // -- Requests --

    pub fn get_request(&self, id: i64) -> Result<Option<RequestRow>> {
        self.with_conn(|conn| query_request(conn, "id = ?1", &[&id]))
    }

    pub fn get_request_by_uuid(&self, uuid: &str) -> Result<Option<RequestRow>> {
        self.with_conn(|conn| query_request(conn, "uuid = ?1", &[&uuid]))
    }

    // -- History --

    pub fn history_for_request(&self, request_id: i64) -> Result<Vec<HistoryRow>> {
        self.with_conn(|conn| query_history(conn, request_id))
    }

    // -- Potential providers --

    pub fn potential_providers(&self, request_id: i64) -> Result<Vec<PotentialProviderRow>> {
        self.with_conn(|conn| query_potential_providers(conn, request_id))
    }

    // -- Watches --

    pub fn create_watch(&self, watch: &NewWatch) -> Result<i64> {
        self.with_conn(|conn| insert_watch(conn, watch))
    }

    pub fn update_watch(&self, id: i64, watch: &NewWatch) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE watches SET
                    name = ?2, dest_description = ?3, dest_country = ?4,
                    dest_lat = ?5, dest_lon = ?6, orig_description = ?7,
                    orig_country = ?8, orig_lat = ?9, orig_lon = ?10,
                    meeting_id = ?11, search_text = ?12, size = ?13,
                    updated_at = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    watch.name,
                    watch.destination.description,
                    watch.destination.country,
                    watch.destination.latitude,
                    watch.destination.longitude,
                    watch.origin.description,
                    watch.origin.country,
                    watch.origin.latitude,
                    watch.origin.longitude,
                    watch.meeting_id,
                    watch.search_text,
                    watch.size.map(|s| s.as_str()),
                ],
            )?;
            Ok(())
        })
    }

    pub fn delete_watch(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM watches WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn get_watch_by_uuid(&self, uuid: &str) -> Result<Option<WatchRow>> {
        self.with_conn(|conn| query_watch(conn, "uuid = ?1", &[&uuid]))
    }

    pub fn watches_for_owner(&self, owner_id: i64) -> Result<Vec<WatchRow>> {
        self.with_conn(|conn| query_watches(conn, "WHERE owner_id = ?1", &[&owner_id]))
    }

    pub fn all_watches(&self) -> Result<Vec<WatchRow>> {
        self.with_conn(|conn| query_watches(conn, "", &[]))
    }
}

// -- Users --

pub fn insert_user(
    conn: &Connection,
    uuid: &str,
    nickname: &str,
    email: &str,
    admin_role: UserAdminRole,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (uuid, nickname, email, admin_role) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![uuid, nickname, email, admin_role.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn query_user(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            "SELECT id, uuid, nickname, email, admin_role FROM users WHERE id = ?1",
            [id],
            read_user_row,
        )
        .optional()?;

    Ok(row)
}

pub fn query_user_by_uuid(conn: &Connection, uuid: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            "SELECT id, uuid, nickname, email, admin_role FROM users WHERE uuid = ?1",
            [uuid],
            read_user_row,
        )
        .optional()?;

    Ok(row)
}

fn read_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        uuid: row.get(1)?,
        nickname: row.get(2)?,
        email: row.get(3)?,
        admin_role: row.get(4)?,
    })
}

// -- Requests --

const REQUEST_COLUMNS: &str = "id, uuid, title, description, size, status, visibility, \
     kilograms, url, needed_before, completed_on, created_by, provider_id, receiver_id, \
     organization_id, dest_description, dest_country, dest_lat, dest_lon, \
     orig_description, orig_country, orig_lat, orig_lon, meeting_id, created_at, updated_at";

pub fn insert_request(conn: &Connection, req: &NewRequest) -> Result<i64> {
    conn.execute(
        "INSERT INTO requests (
            uuid, title, description, size, status, visibility, kilograms, url,
            needed_before, created_by, receiver_id, organization_id,
            dest_description, dest_country, dest_lat, dest_lon,
            orig_description, orig_country, orig_lat, orig_lon, meeting_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
        rusqlite::params![
            req.uuid,
            req.title,
            req.description,
            req.size.as_str(),
            req.status.as_str(),
            req.visibility.as_str(),
            req.kilograms,
            req.url,
            req.needed_before,
            req.created_by,
            req.receiver_id,
            req.organization_id,
            req.destination.description,
            req.destination.country,
            req.destination.latitude,
            req.destination.longitude,
            req.origin.description,
            req.origin.country,
            req.origin.latitude,
            req.origin.longitude,
            req.meeting_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn query_request(
    conn: &Connection,
    where_clause: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Option<RequestRow>> {
    let sql = format!("SELECT {} FROM requests WHERE {}", REQUEST_COLUMNS, where_clause);
    let row = conn.query_row(&sql, params, read_request_row).optional()?;
    Ok(row)
}

fn read_request_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get(0)?,
        uuid: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        size: row.get(4)?,
        status: row.get(5)?,
        visibility: row.get(6)?,
        kilograms: row.get(7)?,
        url: row.get(8)?,
        needed_before: row.get(9)?,
        completed_on: row.get(10)?,
        created_by: row.get(11)?,
        provider_id: row.get(12)?,
        receiver_id: row.get(13)?,
        organization_id: row.get(14)?,
        destination: LocationColumns {
            description: row.get(15)?,
            country: row.get(16)?,
            latitude: row.get(17)?,
            longitude: row.get(18)?,
        },
        origin: LocationColumns {
            description: row.get(19)?,
            country: row.get(20)?,
            latitude: row.get(21)?,
            longitude: row.get(22)?,
        },
        meeting_id: row.get(23)?,
        created_at: row.get(24)?,
        updated_at: row.get(25)?,
    })
}

/// Writes the status-bearing columns in one statement. The engine computes
/// the new provider and completed_on values; they are written
/// unconditionally so a transition back to OPEN clears the provider.
pub fn set_request_status(
    conn: &Connection,
    id: i64,
    status: RequestStatus,
    provider_id: Option<i64>,
    completed_on: Option<NaiveDate>,
) -> Result<()> {
    conn.execute(
        "UPDATE requests SET status = ?2, provider_id = ?3, completed_on = ?4,
             updated_at = datetime('now')
         WHERE id = ?1",
        rusqlite::params![
            id,
            status.as_str(),
            provider_id,
            completed_on.map(|d| d.format("%Y-%m-%d").to_string()),
        ],
    )?;
    Ok(())
}

/// Writes the mutable (non-status) columns from an already-modified row.
pub fn update_request_fields(conn: &Connection, req: &RequestRow) -> Result<()> {
    conn.execute(
        "UPDATE requests SET
            title = ?2, description = ?3, size = ?4, visibility = ?5,
            kilograms = ?6, url = ?7, needed_before = ?8,
            dest_description = ?9, dest_country = ?10, dest_lat = ?11, dest_lon = ?12,
            orig_description = ?13, orig_country = ?14, orig_lat = ?15, orig_lon = ?16,
            updated_at = datetime('now')
         WHERE id = ?1",
        rusqlite::params![
            req.id,
            req.title,
            req.description,
            req.size,
            req.visibility,
            req.kilograms,
            req.url,
            req.needed_before,
            req.destination.description,
            req.destination.country,
            req.destination.latitude,
            req.destination.longitude,
            req.origin.description,
            req.origin.country,
            req.origin.latitude,
            req.origin.longitude,
        ],
    )?;
    Ok(())
}

// -- History --

pub fn insert_history(
    conn: &Connection,
    request_id: i64,
    status: RequestStatus,
    receiver_id: Option<i64>,
    provider_id: Option<i64>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO request_histories (request_id, status, receiver_id, provider_id)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![request_id, status.as_str(), receiver_id, provider_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn last_history(conn: &Connection, request_id: i64) -> Result<Option<HistoryRow>> {
    let row = conn
        .query_row(
            "SELECT id, request_id, status, receiver_id, provider_id, created_at
             FROM request_histories WHERE request_id = ?1
             ORDER BY id DESC LIMIT 1",
            [request_id],
            read_history_row,
        )
        .optional()?;
    Ok(row)
}

pub fn query_history(conn: &Connection, request_id: i64) -> Result<Vec<HistoryRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, request_id, status, receiver_id, provider_id, created_at
         FROM request_histories WHERE request_id = ?1
         ORDER BY id",
    )?;

    let rows = stmt
        .query_map([request_id], read_history_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn read_history_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRow> {
    Ok(HistoryRow {
        id: row.get(0)?,
        request_id: row.get(1)?,
        status: row.get(2)?,
        receiver_id: row.get(3)?,
        provider_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

// -- Potential providers --

pub fn insert_potential_provider(
    conn: &Connection,
    request_id: i64,
    user_id: i64,
    delivery_after: NaiveDate,
    delivery_before: NaiveDate,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO potential_providers (request_id, user_id, delivery_after, delivery_before)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            request_id,
            user_id,
            delivery_after.format("%Y-%m-%d").to_string(),
            delivery_before.format("%Y-%m-%d").to_string(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn potential_provider_exists(conn: &Connection, request_id: i64, user_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM potential_providers WHERE request_id = ?1 AND user_id = ?2",
            [request_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn query_potential_providers(
    conn: &Connection,
    request_id: i64,
) -> Result<Vec<PotentialProviderRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, request_id, user_id, delivery_after, delivery_before, created_at
         FROM potential_providers WHERE request_id = ?1 ORDER BY id",
    )?;

    let rows = stmt
        .query_map([request_id], |row| {
            Ok(PotentialProviderRow {
                id: row.get(0)?,
                request_id: row.get(1)?,
                user_id: row.get(2)?,
                delivery_after: row.get(3)?,
                delivery_before: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn delete_potential_providers(conn: &Connection, request_id: i64) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM potential_providers WHERE request_id = ?1",
        [request_id],
    )?;
    Ok(deleted)
}

// -- Watches --

const WATCH_COLUMNS: &str = "id, uuid, owner_id, name, dest_description, dest_country, \
     dest_lat, dest_lon, orig_description, orig_country, orig_lat, orig_lon, \
     meeting_id, search_text, size";

pub fn insert_watch(conn: &Connection, watch: &NewWatch) -> Result<i64> {
    conn.execute(
        "INSERT INTO watches (
            uuid, owner_id, name,
            dest_description, dest_country, dest_lat, dest_lon,
            orig_description, orig_country, orig_lat, orig_lon,
            meeting_id, search_text, size
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        rusqlite::params![
            watch.uuid,
            watch.owner_id,
            watch.name,
            watch.destination.description,
            watch.destination.country,
            watch.destination.latitude,
            watch.destination.longitude,
            watch.origin.description,
            watch.origin.country,
            watch.origin.latitude,
            watch.origin.longitude,
            watch.meeting_id,
            watch.search_text,
            watch.size.map(|s| s.as_str()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn query_watch(
    conn: &Connection,
    where_clause: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Option<WatchRow>> {
    let sql = format!("SELECT {} FROM watches WHERE {}", WATCH_COLUMNS, where_clause);
    let row = conn.query_row(&sql, params, read_watch_row).optional()?;
    Ok(row)
}

pub fn query_watches(
    conn: &Connection,
    where_clause: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<WatchRow>> {
    let sql = format!(
        "SELECT {} FROM watches {} ORDER BY updated_at DESC, id DESC",
        WATCH_COLUMNS, where_clause
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, read_watch_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn read_watch_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WatchRow> {
    Ok(WatchRow {
        id: row.get(0)?,
        uuid: row.get(1)?,
        owner_id: row.get(2)?,
        name: row.get(3)?,
        destination: LocationColumns {
            description: row.get(4)?,
            country: row.get(5)?,
            latitude: row.get(6)?,
            longitude: row.get(7)?,
        },
        origin: LocationColumns {
            description: row.get(8)?,
            country: row.get(9)?,
            latitude: row.get(10)?,
            longitude: row.get(11)?,
        },
        meeting_id: row.get(12)?,
        search_text: row.get(13)?,
        size: row.get(14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use caravan_types::models::RequestVisibility;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_user(db: &Database, nickname: &str) -> i64 {
        db.create_user(
            &uuid::Uuid::new_v4().to_string(),
            nickname,
            &format!("{}@example.com", nickname),
            UserAdminRole::User,
        )
        .unwrap()
    }

    fn seed_request(db: &Database, created_by: i64) -> i64 {
        db.with_conn(|conn| {
            insert_request(
                conn,
                &NewRequest {
                    uuid: uuid::Uuid::new_v4().to_string(),
                    title: "bicycle pump".into(),
                    description: None,
                    size: RequestSize::Small,
                    status: RequestStatus::Open,
                    visibility: RequestVisibility::All,
                    kilograms: None,
                    url: None,
                    needed_before: None,
                    created_by,
                    receiver_id: Some(created_by),
                    organization_id: 1,
                    destination: LocationColumns {
                        description: Some("Nairobi".into()),
                        country: Some("KE".into()),
                        latitude: Some(-1.29),
                        longitude: Some(36.82),
                    },
                    origin: LocationColumns::default(),
                    meeting_id: None,
                },
            )
        })
        .unwrap()
    }

    #[test]
    fn test_request_round_trip() {
        let db = test_db();
        let user_id = seed_user(&db, "alice");
        let request_id = seed_request(&db, user_id);

        let row = db.get_request(request_id).unwrap().unwrap();
        let request = row.into_request().unwrap();
        assert_eq!(request.title, "bicycle pump");
        assert_eq!(request.status, RequestStatus::Open);
        assert_eq!(request.destination.description, "Nairobi");
        assert!(request.origin.is_none());
        assert_eq!(request.receiver_id, Some(user_id));
    }

    #[test]
    fn test_history_ordering_and_last() {
        let db = test_db();
        let user_id = seed_user(&db, "alice");
        let request_id = seed_request(&db, user_id);

        db.with_conn(|conn| {
            insert_history(conn, request_id, RequestStatus::Open, Some(user_id), None)?;
            insert_history(conn, request_id, RequestStatus::Committed, Some(user_id), None)?;
            Ok(())
        })
        .unwrap();

        let history = db.history_for_request(request_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, "OPEN");
        assert_eq!(history[1].status, "COMMITTED");

        let last = db
            .with_conn(|conn| last_history(conn, request_id))
            .unwrap()
            .unwrap();
        assert_eq!(last.status, "COMMITTED");
    }

    #[test]
    fn test_potential_provider_uniqueness() {
        let db = test_db();
        let creator = seed_user(&db, "alice");
        let candidate = seed_user(&db, "bob");
        let request_id = seed_request(&db, creator);

        let after = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let before = NaiveDate::from_ymd_opt(2026, 9, 15).unwrap();

        db.with_conn(|conn| insert_potential_provider(conn, request_id, candidate, after, before))
            .unwrap();
        assert!(
            db.with_conn(|conn| potential_provider_exists(conn, request_id, candidate))
                .unwrap()
        );

        // Second insert for the same (request, user) pair violates UNIQUE
        let dup = db
            .with_conn(|conn| insert_potential_provider(conn, request_id, candidate, after, before));
        assert!(dup.is_err());
    }

    #[test]
    fn test_delete_potential_providers() {
        let db = test_db();
        let creator = seed_user(&db, "alice");
        let request_id = seed_request(&db, creator);

        let after = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let before = NaiveDate::from_ymd_opt(2026, 9, 15).unwrap();
        for name in ["bob", "carol", "dave"] {
            let uid = seed_user(&db, name);
            db.with_conn(|conn| insert_potential_provider(conn, request_id, uid, after, before))
                .unwrap();
        }

        assert_eq!(db.potential_providers(request_id).unwrap().len(), 3);
        let deleted = db
            .with_conn(|conn| delete_potential_providers(conn, request_id))
            .unwrap();
        assert_eq!(deleted, 3);
        assert!(db.potential_providers(request_id).unwrap().is_empty());
    }

    #[test]
    fn test_watch_crud() {
        let db = test_db();
        let owner = seed_user(&db, "alice");

        let uuid = uuid::Uuid::new_v4().to_string();
        let id = db
            .create_watch(&NewWatch {
                uuid: uuid.clone(),
                owner_id: owner,
                name: "bikes to Nairobi".into(),
                destination: LocationColumns {
                    description: Some("Nairobi".into()),
                    country: Some("KE".into()),
                    latitude: Some(-1.29),
                    longitude: Some(36.82),
                },
                origin: LocationColumns::default(),
                meeting_id: None,
                search_text: Some("bike".into()),
                size: Some(RequestSize::Medium),
            })
            .unwrap();

        let watch = db.get_watch_by_uuid(&uuid).unwrap().unwrap().into_watch().unwrap();
        assert_eq!(watch.search_text.as_deref(), Some("bike"));
        assert_eq!(watch.size, Some(RequestSize::Medium));
        assert!(watch.destination.is_some());
        assert!(watch.origin.is_none());

        assert_eq!(db.watches_for_owner(owner).unwrap().len(), 1);
        db.delete_watch(id).unwrap();
        assert!(db.all_watches().unwrap().is_empty());
    }
}
