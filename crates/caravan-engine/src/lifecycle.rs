//! The request lifecycle engine. Validates transitions against the static
//! table and the acting user, then applies the side effects (status
//! write, history append, roster deletion, completed_on bookkeeping) in
//! one database transaction. Notification intents are returned to the
//! caller for dispatch after commit, never emitted from inside the
//! transaction.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use caravan_db::models::{LocationColumns, NewRequest, NewWatch};
use caravan_db::{Database, queries};
use caravan_types::api::{RequestInput, RequestUpdate, WatchInput};
use caravan_types::events::NotificationIntent;
use caravan_types::models::{
    PotentialProvider, Request, RequestHistory, RequestStatus, User, Watch,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::templates::{self, Recipient};
use crate::transitions;
use crate::watch;

/// A committed lifecycle change plus the notifications it calls for.
#[derive(Debug)]
pub struct Outcome {
    pub request: Request,
    pub intents: Vec<NotificationIntent>,
}

pub struct Engine {
    db: Arc<Database>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(db: Arc<Database>, config: EngineConfig) -> Self {
        Self { db, config }
    }

    /// Creates a request. New requests always start in OPEN; the starting
    /// status is always logged to history. The returned intents alert every
    /// watcher whose criteria the new request satisfies.
    pub fn create_request(&self, input: RequestInput, acting: &User) -> Result<Outcome, EngineError> {
        if input.title.trim().is_empty() {
            return Err(EngineError::InvalidInput("title must not be blank".into()));
        }

        let uuid = Uuid::new_v4();
        let receiver_id = input.receiver_id.unwrap_or(acting.id);

        let request = self
            .db
            .transaction(|conn| {
                let id = queries::insert_request(
                    conn,
                    &NewRequest {
                        uuid: uuid.to_string(),
                        title: input.title.clone(),
                        description: input.description.clone(),
                        size: input.size,
                        status: RequestStatus::Open,
                        visibility: input.visibility,
                        kilograms: input.kilograms,
                        url: input.url.clone(),
                        needed_before: input.needed_before.map(format_date),
                        created_by: acting.id,
                        receiver_id: Some(receiver_id),
                        organization_id: input.organization_id,
                        destination: LocationColumns::from_location(Some(&input.destination)),
                        origin: LocationColumns::from_location(input.origin.as_ref()),
                        meeting_id: input.meeting_id,
                    },
                )?;
                queries::insert_history(conn, id, RequestStatus::Open, Some(receiver_id), None)?;
                reload_request(conn, id)
            })
            .map_err(EngineError::from_db)?;

        info!(request = %request.uuid, title = %request.title, "request created");

        let intents = self.watch_intents(&request, acting)?;
        Ok(Outcome { request, intents })
    }

    /// Edits a request's mutable fields without touching its status. Only
    /// the creator or a super-admin may edit.
    pub fn update_request(
        &self,
        request_uuid: Uuid,
        update: RequestUpdate,
        acting: &User,
    ) -> Result<Request, EngineError> {
        let uuid_s = request_uuid.to_string();

        self.db
            .transaction(|conn| {
                let mut row = queries::query_request(conn, "uuid = ?1", &[&uuid_s])?
                    .ok_or_else(|| engine_err(not_found_request(&uuid_s)))?;

                if !(acting.is_super_admin() || acting.id == row.created_by) {
                    return Err(engine_err(EngineError::Unauthorized(
                        "not allowed to edit this request".into(),
                    )));
                }

                if let Some(title) = &update.title {
                    if title.trim().is_empty() {
                        return Err(engine_err(EngineError::InvalidInput(
                            "title must not be blank".into(),
                        )));
                    }
                    row.title = title.clone();
                }
                if let Some(description) = &update.description {
                    row.description = Some(description.clone());
                }
                if let Some(size) = update.size {
                    row.size = size.as_str().to_string();
                }
                if let Some(visibility) = update.visibility {
                    row.visibility = visibility.as_str().to_string();
                }
                if let Some(kilograms) = update.kilograms {
                    row.kilograms = Some(kilograms);
                }
                if let Some(url) = &update.url {
                    row.url = Some(url.clone());
                }
                if let Some(needed_before) = update.needed_before {
                    row.needed_before = Some(format_date(needed_before));
                }
                if let Some(destination) = &update.destination {
                    row.destination = LocationColumns::from_location(Some(destination));
                }
                if let Some(origin) = &update.origin {
                    row.origin = LocationColumns::from_location(Some(origin));
                }

                let id = row.id;
                queries::update_request_fields(conn, &row)?;
                reload_request(conn, id)
            })
            .map_err(EngineError::from_db)
    }

    /// Moves a request to `new_status`, applying every side effect of the
    /// transition atomically. `provider_uuid` names the accepted provider
    /// when entering ACCEPTED (required there) or an early committer when
    /// entering COMMITTED (optional).
    pub fn set_status(
        &self,
        request_uuid: Uuid,
        new_status: RequestStatus,
        acting: &User,
        provider_uuid: Option<Uuid>,
    ) -> Result<Outcome, EngineError> {
        self.transition_plan(request_uuid, acting, provider_uuid, |_| Ok(vec![new_status]))
    }

    /// Provider-only shortcut: an ACCEPTED request the acting user is
    /// providing moves to DELIVERED. The precondition is checked on the
    /// state read inside the transaction, never on a stale snapshot.
    pub fn mark_delivered(&self, request_uuid: Uuid, acting: &User) -> Result<Outcome, EngineError> {
        let acting_id = acting.id;
        self.transition_plan(request_uuid, acting, None, move |request| {
            if request.status != RequestStatus::Accepted || request.provider_id != Some(acting_id) {
                return Err(EngineError::Unauthorized(
                    "only the provider of an accepted request may mark it delivered".into(),
                ));
            }
            Ok(vec![RequestStatus::Delivered])
        })
    }

    /// Creator-only shortcut: confirms receipt and completes the request.
    /// From ACCEPTED this passes through RECEIVED so the audit trail shows
    /// the receipt; from DELIVERED it completes directly. Both hops of the
    /// ACCEPTED path commit in one transaction.
    pub fn mark_received(&self, request_uuid: Uuid, acting: &User) -> Result<Outcome, EngineError> {
        let acting_id = acting.id;
        self.transition_plan(request_uuid, acting, None, move |request| {
            if acting_id != request.created_by {
                return Err(EngineError::Unauthorized(
                    "only the request creator may confirm receipt".into(),
                ));
            }

            match request.status {
                RequestStatus::Accepted => {
                    Ok(vec![RequestStatus::Received, RequestStatus::Completed])
                }
                RequestStatus::Delivered => Ok(vec![RequestStatus::Completed]),
                _ => Err(EngineError::Unauthorized(
                    "receipt can only be confirmed for an accepted or delivered request".into(),
                )),
            }
        })
    }

    /// Loads the request, lets `plan` pick the transition steps from its
    /// current state, and applies them all inside one transaction. Intents
    /// are collected per hop after the commit.
    fn transition_plan<P>(
        &self,
        request_uuid: Uuid,
        acting: &User,
        provider_uuid: Option<Uuid>,
        plan: P,
    ) -> Result<Outcome, EngineError>
    where
        P: FnOnce(&Request) -> Result<Vec<RequestStatus>, EngineError>,
    {
        let uuid_s = request_uuid.to_string();

        let (request, hops) = self
            .db
            .transaction(|conn| {
                let row = queries::query_request(conn, "uuid = ?1", &[&uuid_s])?
                    .ok_or_else(|| engine_err(not_found_request(&uuid_s)))?;
                let mut request = row.into_request()?;

                let steps = plan(&request).map_err(engine_err)?;
                let mut hops = Vec::with_capacity(steps.len());
                for step in steps {
                    let from = request.status;
                    request = apply_transition(conn, &request, step, acting, provider_uuid)?;
                    hops.push((from, request.clone()));
                }

                Ok((request, hops))
            })
            .map_err(EngineError::from_db)?;

        let mut intents = Vec::new();
        for (from, after) in &hops {
            debug!(
                request = %after.uuid,
                from = %from,
                to = %after.status,
                actor = %acting.uuid,
                "status set"
            );

            intents.extend(self.direct_party_intents(after, *from, after.status, acting)?);
            if self.config.is_reopen_transition(*from, after.status) {
                let creator = self.load_user(after.created_by)?;
                intents.extend(self.watch_intents(after, &creator)?);
            }
        }

        Ok(Outcome { request, intents })
    }

    /// Registers the acting user's interest in providing for a request.
    /// Allowed only while the request is OPEN or COMMITTED, never for the
    /// request's own creator, and at most once per user and request.
    pub fn add_potential_provider(
        &self,
        request_uuid: Uuid,
        acting: &User,
        delivery_after: NaiveDate,
        delivery_before: NaiveDate,
    ) -> Result<PotentialProvider, EngineError> {
        if delivery_after >= delivery_before {
            return Err(EngineError::InvalidInput(
                "delivery window start must precede its end".into(),
            ));
        }

        let uuid_s = request_uuid.to_string();
        let acting_id = acting.id;

        self.db
            .transaction(|conn| {
                let row = queries::query_request(conn, "uuid = ?1", &[&uuid_s])?
                    .ok_or_else(|| engine_err(not_found_request(&uuid_s)))?;
                let request = row.into_request()?;

                if request.created_by == acting_id {
                    return Err(engine_err(EngineError::InvalidInput(
                        "the request creator cannot express interest in their own request".into(),
                    )));
                }
                if !matches!(request.status, RequestStatus::Open | RequestStatus::Committed) {
                    return Err(engine_err(EngineError::InvalidInput(
                        "interest can only be expressed while a request is open or committed".into(),
                    )));
                }
                if queries::potential_provider_exists(conn, request.id, acting_id)? {
                    return Err(engine_err(EngineError::InvalidInput(
                        "interest was already expressed for this request".into(),
                    )));
                }

                let id = queries::insert_potential_provider(
                    conn,
                    request.id,
                    acting_id,
                    delivery_after,
                    delivery_before,
                )?;

                queries::query_potential_providers(conn, request.id)?
                    .into_iter()
                    .find(|r| r.id == id)
                    .ok_or_else(|| anyhow::anyhow!("potential provider {} vanished after insert", id))?
                    .into_potential_provider()
            })
            .map_err(EngineError::from_db)
    }

    // -- Watches --

    /// Creates a standing watch owned by the acting user.
    pub fn create_watch(&self, input: WatchInput, acting: &User) -> Result<Watch, EngineError> {
        if input.name.trim().is_empty() {
            return Err(EngineError::InvalidInput("watch name must not be blank".into()));
        }

        let uuid = Uuid::new_v4();
        self.db
            .create_watch(&new_watch(uuid, acting.id, &input))
            .map_err(EngineError::Persistence)?;

        info!(watch = %uuid, owner = %acting.uuid, "watch created");
        self.load_watch(uuid)
    }

    /// Replaces a watch's criteria. Only its owner or a super-admin may.
    pub fn update_watch(
        &self,
        watch_uuid: Uuid,
        input: WatchInput,
        acting: &User,
    ) -> Result<Watch, EngineError> {
        if input.name.trim().is_empty() {
            return Err(EngineError::InvalidInput("watch name must not be blank".into()));
        }

        let watch = self.load_watch(watch_uuid)?;
        if !(acting.is_super_admin() || watch.owner_id == acting.id) {
            return Err(EngineError::Unauthorized(
                "only the watch owner may modify it".into(),
            ));
        }

        self.db
            .update_watch(watch.id, &new_watch(watch.uuid, watch.owner_id, &input))
            .map_err(EngineError::Persistence)?;
        self.load_watch(watch_uuid)
    }

    pub fn delete_watch(&self, watch_uuid: Uuid, acting: &User) -> Result<(), EngineError> {
        let watch = self.load_watch(watch_uuid)?;
        if !(acting.is_super_admin() || watch.owner_id == acting.id) {
            return Err(EngineError::Unauthorized(
                "only the watch owner may delete it".into(),
            ));
        }

        self.db.delete_watch(watch.id).map_err(EngineError::Persistence)
    }

    pub fn watches_for_user(&self, acting: &User) -> Result<Vec<Watch>, EngineError> {
        let rows = self
            .db
            .watches_for_owner(acting.id)
            .map_err(EngineError::Persistence)?;
        rows.into_iter()
            .map(|r| r.into_watch().map_err(EngineError::Persistence))
            .collect()
    }

    // -- Reads --

    pub fn get_request(&self, request_uuid: Uuid) -> Result<Request, EngineError> {
        self.load_request(request_uuid)
    }

    pub fn history(&self, request: &Request) -> Result<Vec<RequestHistory>, EngineError> {
        let rows = self
            .db
            .history_for_request(request.id)
            .map_err(EngineError::Persistence)?;
        rows.into_iter()
            .map(|r| r.into_history().map_err(EngineError::Persistence))
            .collect()
    }

    pub fn potential_providers(&self, request: &Request) -> Result<Vec<PotentialProvider>, EngineError> {
        let rows = self
            .db
            .potential_providers(request.id)
            .map_err(EngineError::Persistence)?;
        rows.into_iter()
            .map(|r| r.into_potential_provider().map_err(EngineError::Persistence))
            .collect()
    }

    // -- Internals --

    fn load_request(&self, request_uuid: Uuid) -> Result<Request, EngineError> {
        let uuid_s = request_uuid.to_string();
        let row = self
            .db
            .get_request_by_uuid(&uuid_s)
            .map_err(EngineError::Persistence)?
            .ok_or_else(|| not_found_request(&uuid_s))?;
        row.into_request().map_err(EngineError::Persistence)
    }

    fn load_user(&self, id: i64) -> Result<User, EngineError> {
        let row = self
            .db
            .get_user(id)
            .map_err(EngineError::Persistence)?
            .ok_or(EngineError::NotFound {
                kind: "user",
                id: id.to_string(),
            })?;
        row.into_user().map_err(EngineError::Persistence)
    }

    fn load_watch(&self, watch_uuid: Uuid) -> Result<Watch, EngineError> {
        let uuid_s = watch_uuid.to_string();
        let row = self
            .db
            .get_watch_by_uuid(&uuid_s)
            .map_err(EngineError::Persistence)?
            .ok_or(EngineError::NotFound {
                kind: "watch",
                id: uuid_s,
            })?;
        row.into_watch().map_err(EngineError::Persistence)
    }

    /// Intents for the direct parties of a (from, to) change. The actor is
    /// never notified about their own action.
    fn direct_party_intents(
        &self,
        request: &Request,
        from: RequestStatus,
        to: RequestStatus,
        acting: &User,
    ) -> Result<Vec<NotificationIntent>, EngineError> {
        if from == to {
            return Ok(Vec::new());
        }

        let mut intents = Vec::new();
        for recipient in templates::direct_parties(from, to) {
            let user_id = match recipient {
                Recipient::Receiver => request.receiver_id.or(Some(request.created_by)),
                Recipient::Provider => request.provider_id,
            };
            let Some(user_id) = user_id else { continue };
            if user_id == acting.id {
                continue;
            }

            let to_user = self.load_user(user_id)?;
            intents.push(NotificationIntent {
                template_key: templates::template_key(from, to, *recipient),
                from_user: Some(acting.uuid),
                to_user: to_user.uuid,
                payload: request_payload(request),
            });
        }

        Ok(intents)
    }

    /// Intents for every watcher whose standing criteria the request now
    /// satisfies. Watch owners are never alerted about their own requests.
    fn watch_intents(&self, request: &Request, creator: &User) -> Result<Vec<NotificationIntent>, EngineError> {
        let rows = self.db.all_watches().map_err(EngineError::Persistence)?;
        let mut watches: Vec<Watch> = Vec::with_capacity(rows.len());
        for row in rows {
            watches.push(row.into_watch().map_err(EngineError::Persistence)?);
        }

        let mut intents = Vec::new();
        for matched in watch::matching_watches(request, creator, &watches, self.config.geo) {
            if matched.owner_id == request.created_by {
                continue;
            }
            let owner = self.load_user(matched.owner_id)?;
            intents.push(NotificationIntent {
                template_key: templates::TEMPLATE_NEW_REQUEST.to_string(),
                from_user: Some(creator.uuid),
                to_user: owner.uuid,
                payload: request_payload(request),
            });
        }

        Ok(intents)
    }
}

fn request_payload(request: &Request) -> serde_json::Value {
    json!({
        "request_uuid": request.uuid,
        "title": request.title,
        "status": request.status,
    })
}

/// One validated (from, to) hop and its side effects, run inside the
/// caller's transaction. Returns the reloaded request.
fn apply_transition(
    conn: &rusqlite::Connection,
    request: &Request,
    new_status: RequestStatus,
    acting: &User,
    provider_uuid: Option<Uuid>,
) -> anyhow::Result<Request> {
    let from = request.status;

    // Fail fast, before any mutation
    if !transitions::is_transition_valid(from, new_status) {
        return Err(engine_err(EngineError::InvalidTransition {
            from,
            to: new_status,
        }));
    }
    if !transitions::can_change_status(request, acting, new_status) {
        return Err(engine_err(EngineError::Unauthorized(
            "user is not allowed to change the status of this request".into(),
        )));
    }

    let provider_id = if new_status == RequestStatus::Accepted && from != RequestStatus::Accepted {
        let provider_uuid = provider_uuid.ok_or_else(|| engine_err(EngineError::MissingProvider))?;
        let provider_row = queries::query_user_by_uuid(conn, &provider_uuid.to_string())?
            .ok_or_else(|| {
                engine_err(EngineError::NotFound {
                    kind: "user",
                    id: provider_uuid.to_string(),
                })
            })?;
        // One candidate became the provider; the roster is no
        // longer relevant.
        queries::delete_potential_providers(conn, request.id)?;
        Some(provider_row.id)
    } else if let (RequestStatus::Committed, Some(committer_uuid)) = (new_status, provider_uuid) {
        let committer_row = queries::query_user_by_uuid(conn, &committer_uuid.to_string())?
            .ok_or_else(|| {
                engine_err(EngineError::NotFound {
                    kind: "user",
                    id: committer_uuid.to_string(),
                })
            })?;
        Some(committer_row.id)
    } else if new_status == RequestStatus::Open && from != RequestStatus::Open {
        // Only an explicit move back to OPEN clears the provider
        None
    } else {
        request.provider_id
    };

    let completed_on = if new_status == RequestStatus::Completed {
        // Idempotent: re-entering COMPLETED keeps the original date
        request.completed_on.or_else(|| Some(Utc::now().date_naive()))
    } else if from == RequestStatus::Completed {
        None
    } else {
        request.completed_on
    };

    queries::set_request_status(conn, request.id, new_status, provider_id, completed_on)?;

    // One history row per distinct status; a repeat is a no-op
    let last = queries::last_history(conn, request.id)?;
    if last.map_or(true, |h| h.status != new_status.as_str()) {
        queries::insert_history(conn, request.id, new_status, request.receiver_id, provider_id)?;
    }

    reload_request(conn, request.id)
}

fn new_watch(uuid: Uuid, owner_id: i64, input: &WatchInput) -> NewWatch {
    NewWatch {
        uuid: uuid.to_string(),
        owner_id,
        name: input.name.clone(),
        destination: LocationColumns::from_location(input.destination.as_ref()),
        origin: LocationColumns::from_location(input.origin.as_ref()),
        meeting_id: input.meeting_id,
        search_text: input.search_text.clone(),
        size: input.size,
    }
}

fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn not_found_request(uuid: &str) -> EngineError {
    EngineError::NotFound {
        kind: "request",
        id: uuid.to_string(),
    }
}

fn engine_err(err: EngineError) -> anyhow::Error {
    err.into()
}

fn reload_request(conn: &rusqlite::Connection, id: i64) -> anyhow::Result<Request> {
    queries::query_request(conn, "id = ?1", &[&id])?
        .ok_or_else(|| anyhow::anyhow!("request {} vanished mid-transaction", id))?
        .into_request()
}
