//! Watch matching: which standing subscriptions a request satisfies.
//! Pure and side-effect free; the lifecycle engine turns matches into
//! notification intents and skips the request's own creator.

use caravan_types::models::{Request, User, Watch};

use crate::geo::{GeoParams, is_near};

/// True when every present criterion of `watch` holds for `request`.
/// Absent criteria always match, so a watch with none matches everything.
pub fn watch_matches(watch: &Watch, request: &Request, creator: &User, geo: GeoParams) -> bool {
    size_matches(watch, request)
        && text_matches(watch, request, creator)
        && meeting_matches(watch, request)
        && destination_matches(watch, request, geo)
        && origin_matches(watch, request, geo)
}

/// Filters `watches` down to those matching `request`.
pub fn matching_watches<'a>(
    request: &Request,
    creator: &User,
    watches: &'a [Watch],
    geo: GeoParams,
) -> Vec<&'a Watch> {
    watches
        .iter()
        .filter(|w| watch_matches(w, request, creator, geo))
        .collect()
}

/// The watch size is a floor: it matches requests of that size or larger.
fn size_matches(watch: &Watch, request: &Request) -> bool {
    match watch.size {
        Some(floor) => request.size.is_larger_or_same(floor),
        None => true,
    }
}

/// Case-sensitive substring search over title, description and the
/// creator's nickname; any one hit satisfies the criterion.
fn text_matches(watch: &Watch, request: &Request, creator: &User) -> bool {
    let Some(text) = watch.search_text.as_deref() else {
        return true;
    };

    if request.title.contains(text) {
        return true;
    }
    if request.description.as_deref().is_some_and(|d| d.contains(text)) {
        return true;
    }
    creator.nickname.contains(text)
}

/// A meeting-scoped watch never matches a request without a meeting.
fn meeting_matches(watch: &Watch, request: &Request) -> bool {
    match watch.meeting_id {
        Some(meeting_id) => request.meeting_id == Some(meeting_id),
        None => true,
    }
}

fn destination_matches(watch: &Watch, request: &Request, geo: GeoParams) -> bool {
    match &watch.destination {
        Some(dest) => is_near(dest, &request.destination, geo),
        None => true,
    }
}

fn origin_matches(watch: &Watch, request: &Request, geo: GeoParams) -> bool {
    let Some(watch_origin) = &watch.origin else {
        return true;
    };
    match &request.origin {
        Some(request_origin) => is_near(watch_origin, request_origin, geo),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caravan_types::models::{
        Location, RequestSize, RequestStatus, RequestVisibility, UserAdminRole,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn creator() -> User {
        User {
            id: 1,
            uuid: Uuid::new_v4(),
            nickname: "wanderer".into(),
            email: "wanderer@example.com".into(),
            admin_role: UserAdminRole::User,
        }
    }

    fn request(size: RequestSize, title: &str, description: Option<&str>) -> Request {
        Request {
            id: 10,
            uuid: Uuid::new_v4(),
            title: title.into(),
            description: description.map(String::from),
            size,
            status: RequestStatus::Open,
            visibility: RequestVisibility::All,
            kilograms: None,
            url: None,
            needed_before: None,
            completed_on: None,
            created_by: 1,
            provider_id: None,
            receiver_id: Some(1),
            organization_id: 1,
            destination: Location::new("Nairobi", -1.2921, 36.8219),
            origin: None,
            meeting_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn open_watch() -> Watch {
        Watch {
            id: 100,
            uuid: Uuid::new_v4(),
            owner_id: 2,
            name: "everything".into(),
            destination: None,
            origin: None,
            meeting_id: None,
            search_text: None,
            size: None,
        }
    }

    const GEO: GeoParams = GeoParams {
        near_distance_km: 100.0,
    };

    #[test]
    fn test_empty_watch_matches_everything() {
        let w = open_watch();
        let r = request(RequestSize::Tiny, "anything at all", None);
        assert!(watch_matches(&w, &r, &creator(), GEO));
    }

    #[test]
    fn test_size_is_a_floor() {
        let mut w = open_watch();
        w.size = Some(RequestSize::Medium);

        let c = creator();
        assert!(watch_matches(&w, &request(RequestSize::Large, "t", None), &c, GEO));
        assert!(watch_matches(&w, &request(RequestSize::Medium, "t", None), &c, GEO));
        assert!(!watch_matches(&w, &request(RequestSize::Small, "t", None), &c, GEO));
    }

    #[test]
    fn test_text_matches_title_description_or_nickname() {
        let mut w = open_watch();
        w.search_text = Some("bike".into());

        let c = creator();
        assert!(watch_matches(&w, &request(RequestSize::Small, "need a bike", None), &c, GEO));
        assert!(watch_matches(
            &w,
            &request(RequestSize::Small, "help", Some("a bike pump really")),
            &c,
            GEO
        ));
        assert!(!watch_matches(&w, &request(RequestSize::Small, "a ladder", None), &c, GEO));

        // nickname hit
        w.search_text = Some("wander".into());
        assert!(watch_matches(&w, &request(RequestSize::Small, "a ladder", None), &c, GEO));
    }

    #[test]
    fn test_text_match_is_case_sensitive() {
        let mut w = open_watch();
        w.search_text = Some("Bike".into());
        assert!(!watch_matches(
            &w,
            &request(RequestSize::Small, "need a bike", None),
            &creator(),
            GEO
        ));
    }

    #[test]
    fn test_meeting_scoped_watch() {
        let mut w = open_watch();
        w.meeting_id = Some(7);

        let c = creator();
        let mut r = request(RequestSize::Small, "t", None);
        assert!(!watch_matches(&w, &r, &c, GEO), "request without meeting never matches");

        r.meeting_id = Some(7);
        assert!(watch_matches(&w, &r, &c, GEO));

        r.meeting_id = Some(8);
        assert!(!watch_matches(&w, &r, &c, GEO));
    }

    #[test]
    fn test_destination_proximity() {
        let mut w = open_watch();
        w.destination = Some(Location::new("Thika", -1.0333, 37.0693)); // ~40 km from Nairobi

        let c = creator();
        let r = request(RequestSize::Small, "t", None);
        assert!(watch_matches(&w, &r, &c, GEO));

        w.destination = Some(Location::new("Mombasa", -4.0435, 39.6682));
        assert!(!watch_matches(&w, &r, &c, GEO));
    }

    #[test]
    fn test_origin_watch_requires_request_origin() {
        let mut w = open_watch();
        w.origin = Some(Location::new("Thika", -1.0333, 37.0693));

        let c = creator();
        let mut r = request(RequestSize::Small, "t", None);
        assert!(!watch_matches(&w, &r, &c, GEO), "no request origin, origin-scoped watch fails");

        r.origin = Some(Location::new("Nairobi", -1.2921, 36.8219));
        assert!(watch_matches(&w, &r, &c, GEO));
    }

    #[test]
    fn test_all_criteria_must_hold() {
        let mut w = open_watch();
        w.size = Some(RequestSize::Small);
        w.search_text = Some("bike".into());

        let c = creator();
        // text matches but size does not
        assert!(!watch_matches(&w, &request(RequestSize::Tiny, "need a bike", None), &c, GEO));
        // size matches but text does not
        assert!(!watch_matches(&w, &request(RequestSize::Large, "a ladder", None), &c, GEO));
        // both match
        assert!(watch_matches(&w, &request(RequestSize::Large, "need a bike", None), &c, GEO));
    }

    #[test]
    fn test_matching_watches_filters() {
        let mut sized = open_watch();
        sized.size = Some(RequestSize::Xlarge);
        let open = open_watch();

        let watches = vec![sized, open];
        let r = request(RequestSize::Medium, "t", None);
        let matches = matching_watches(&r, &creator(), &watches, GEO);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, watches[1].id);
    }
}
