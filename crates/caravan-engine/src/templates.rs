//! Notification template resolution. Pure lookup from
//! (from, to, recipient) to a template key; rendering belongs to the
//! external delivery collaborator.

use caravan_types::models::RequestStatus;

/// Which direct party a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    /// The request's receiver (defaults to its creator).
    Receiver,
    /// The committed provider.
    Provider,
}

pub const TEMPLATE_NEW_REQUEST: &str = "new_request";
pub const TEMPLATE_REQUEST_DELIVERED: &str = "request_delivered";
pub const TEMPLATE_REQUEST_RECEIVED: &str = "request_received";
pub const TEMPLATE_REQUEST_NOT_RECEIVED: &str = "request_not_received_after_all";

/// The fallback key when no override applies.
pub fn default_key(from: RequestStatus, to: RequestStatus) -> String {
    format!("status_change_from_{}_to_{}", from.slug(), to.slug())
}

/// Template key for notifying `recipient` about a (from, to) change. A
/// fixed override table collapses several transitions onto a smaller set
/// of human-meaningful templates; everything else gets the default key.
pub fn template_key(from: RequestStatus, to: RequestStatus, recipient: Recipient) -> String {
    use Recipient::*;
    use RequestStatus::*;

    match (from, to, recipient) {
        (Accepted, Delivered, Receiver) | (Committed, Delivered, Receiver) => {
            TEMPLATE_REQUEST_DELIVERED.to_string()
        }
        (Accepted, Received, Provider)
        | (Accepted, Completed, Provider)
        | (Delivered, Completed, Provider)
        | (Committed, Received, Provider) => TEMPLATE_REQUEST_RECEIVED.to_string(),
        (Completed, Accepted, Provider) | (Completed, Delivered, Provider) => {
            TEMPLATE_REQUEST_NOT_RECEIVED.to_string()
        }
        _ => default_key(from, to),
    }
}

/// The direct parties to notify for a (from, to) change. Transitions with
/// no entry notify nobody directly (the actor already knows, and there is
/// no other party yet).
pub fn direct_parties(from: RequestStatus, to: RequestStatus) -> &'static [Recipient] {
    use Recipient::*;
    use RequestStatus::*;

    match (from, to) {
        (Accepted, Delivered) | (Committed, Delivered) => &[Receiver],
        (Accepted, Received) | (Accepted, Completed) | (Delivered, Completed) => &[Provider],
        (Completed, Accepted) | (Completed, Delivered) | (Completed, Received) => &[Provider],
        (Accepted, Committed)
        | (Accepted, Open)
        | (Accepted, Removed)
        | (Committed, Accepted)
        | (Committed, Removed) => &[Provider],
        (Delivered, Accepted)
        | (Delivered, Committed)
        | (Open, Committed)
        | (Committed, Open) => &[Receiver],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RequestStatus::*;

    #[test]
    fn test_delivered_overrides() {
        assert_eq!(
            template_key(Accepted, Delivered, Recipient::Receiver),
            "request_delivered"
        );
        assert_eq!(
            template_key(Committed, Delivered, Recipient::Receiver),
            "request_delivered"
        );
    }

    #[test]
    fn test_received_overrides() {
        assert_eq!(
            template_key(Accepted, Received, Recipient::Provider),
            "request_received"
        );
        assert_eq!(
            template_key(Delivered, Completed, Recipient::Provider),
            "request_received"
        );
    }

    #[test]
    fn test_completion_reversion_overrides() {
        assert_eq!(
            template_key(Completed, Delivered, Recipient::Provider),
            "request_not_received_after_all"
        );
        assert_eq!(
            template_key(Completed, Accepted, Recipient::Provider),
            "request_not_received_after_all"
        );
    }

    #[test]
    fn test_default_key_fallback() {
        assert_eq!(
            template_key(Open, Committed, Recipient::Receiver),
            "status_change_from_open_to_committed"
        );
        assert_eq!(
            template_key(Accepted, Open, Recipient::Provider),
            "status_change_from_accepted_to_open"
        );
        // Recipient is part of the key: the same transition resolves to the
        // default for the party the override does not name.
        assert_eq!(
            template_key(Accepted, Delivered, Recipient::Provider),
            "status_change_from_accepted_to_delivered"
        );
    }

    #[test]
    fn test_direct_parties() {
        assert_eq!(direct_parties(Accepted, Delivered), &[Recipient::Receiver]);
        assert_eq!(direct_parties(Delivered, Completed), &[Recipient::Provider]);
        assert_eq!(direct_parties(Open, Committed), &[Recipient::Receiver]);
        assert!(direct_parties(Open, Removed).is_empty());
        assert!(direct_parties(Open, Open).is_empty());
    }
}
