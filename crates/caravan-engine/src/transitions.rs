//! The static legal-transition table and the authorization predicate for
//! status changes.

use caravan_types::models::{Request, RequestStatus, User};

/// Legal (from, to) pairs. A self-loop is legal on every status: re-setting
/// the same status is a harmless no-op. REMOVED is terminal; COMPLETED can
/// only go back to DELIVERED or RECEIVED to correct an erroneous completion.
pub fn is_transition_valid(from: RequestStatus, to: RequestStatus) -> bool {
    use RequestStatus::*;

    if from == to {
        return true;
    }

    matches!(
        (from, to),
        (Open, Committed)
            | (Open, Removed)
            | (Committed, Open)
            | (Committed, Accepted)
            | (Committed, Delivered)
            | (Committed, Removed)
            | (Accepted, Open)
            | (Accepted, Delivered)
            | (Accepted, Received)
            | (Accepted, Removed)
            | (Delivered, Completed)
            | (Received, Accepted)
            | (Received, Delivered)
            | (Received, Completed)
            | (Completed, Delivered)
            | (Completed, Received)
    )
}

/// The provider's limited allow-list: a provider may advance delivery and
/// receipt state but may not open, commit, accept, remove or revert.
pub fn provider_can_transition(from: RequestStatus, to: RequestStatus) -> bool {
    use RequestStatus::*;

    matches!(
        (from, to),
        (Accepted, Delivered) | (Delivered, Received) | (Committed, Delivered)
    )
}

/// Whether `actor` may move `request` to `to`. Creators and super-admins
/// may trigger any legal transition; the current provider only those on
/// the allow-list.
pub fn can_change_status(request: &Request, actor: &User, to: RequestStatus) -> bool {
    if actor.is_super_admin() {
        return true;
    }

    if actor.id == request.created_by {
        return true;
    }

    if request.provider_id == Some(actor.id) {
        return provider_can_transition(request.status, to);
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use RequestStatus::*;

    const ALL: [RequestStatus; 7] = [
        Open, Committed, Accepted, Delivered, Received, Completed, Removed,
    ];

    #[test]
    fn test_self_loops_always_legal() {
        for s in ALL {
            assert!(is_transition_valid(s, s), "{s} -> {s} should be legal");
        }
    }

    #[test]
    fn test_removed_is_terminal() {
        for to in ALL {
            if to != Removed {
                assert!(!is_transition_valid(Removed, to), "REMOVED -> {to} should be illegal");
            }
        }
    }

    #[test]
    fn test_completed_only_reverts_to_delivered_or_received() {
        for to in ALL {
            let expected = matches!(to, Delivered | Received | Completed);
            assert_eq!(is_transition_valid(Completed, to), expected, "COMPLETED -> {to}");
        }
    }

    // The full matrix, row by row.
    #[test]
    fn test_transition_matrix_exhaustive() {
        let legal: &[(RequestStatus, &[RequestStatus])] = &[
            (Open, &[Open, Committed, Removed]),
            (Committed, &[Open, Committed, Accepted, Delivered, Removed]),
            (Accepted, &[Open, Accepted, Delivered, Received, Removed]),
            (Delivered, &[Delivered, Completed]),
            (Received, &[Accepted, Delivered, Received, Completed]),
            (Completed, &[Delivered, Received, Completed]),
            (Removed, &[Removed]),
        ];

        for (from, allowed) in legal {
            for to in ALL {
                assert_eq!(
                    is_transition_valid(*from, to),
                    allowed.contains(&to),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_provider_allow_list() {
        assert!(provider_can_transition(Accepted, Delivered));
        assert!(provider_can_transition(Delivered, Received));
        assert!(provider_can_transition(Committed, Delivered));

        assert!(!provider_can_transition(Accepted, Received));
        assert!(!provider_can_transition(Delivered, Accepted));
        assert!(!provider_can_transition(Open, Committed));
        assert!(!provider_can_transition(Accepted, Removed));
    }
}
