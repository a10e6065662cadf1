use caravan_types::models::RequestStatus;
use tracing::warn;

use crate::geo::{DEFAULT_NEAR_DISTANCE_KM, GeoParams};

/// Tunables for the lifecycle and watch-matching engines, injected rather
/// than read from globals.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub geo: GeoParams,
    /// Transitions after which a request is considered newly visible to
    /// watchers again. Creation always alerts watchers regardless of this
    /// set.
    pub reopen_transitions: Vec<(RequestStatus, RequestStatus)>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        use RequestStatus::*;
        Self {
            geo: GeoParams::default(),
            reopen_transitions: vec![(Committed, Open), (Accepted, Open), (Accepted, Committed)],
        }
    }
}

impl EngineConfig {
    /// Load overrides from the environment (and `.env` if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Ok(raw) = std::env::var("CARAVAN_NEAR_DISTANCE_KM") {
            match raw.parse::<f64>() {
                Ok(km) if km > 0.0 => config.geo.near_distance_km = km,
                _ => warn!(
                    "ignoring CARAVAN_NEAR_DISTANCE_KM='{}', keeping {} km",
                    raw, DEFAULT_NEAR_DISTANCE_KM
                ),
            }
        }

        if let Ok(raw) = std::env::var("CARAVAN_REOPEN_TRANSITIONS") {
            match parse_reopen_transitions(&raw) {
                Some(set) => config.reopen_transitions = set,
                None => warn!(
                    "ignoring CARAVAN_REOPEN_TRANSITIONS='{}', keeping the default set",
                    raw
                ),
            }
        }

        config
    }

    pub fn is_reopen_transition(&self, from: RequestStatus, to: RequestStatus) -> bool {
        from != to && self.reopen_transitions.contains(&(from, to))
    }
}

/// Parses a comma-separated list of `FROM:TO` status pairs, e.g.
/// `"COMMITTED:OPEN,ACCEPTED:OPEN"`. Returns `None` on any malformed
/// pair so a typo never silently shrinks the set.
fn parse_reopen_transitions(raw: &str) -> Option<Vec<(RequestStatus, RequestStatus)>> {
    let mut set = Vec::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (from, to) = pair.split_once(':')?;
        set.push((
            RequestStatus::from_str(from.trim())?,
            RequestStatus::from_str(to.trim())?,
        ));
    }
    Some(set)
}
