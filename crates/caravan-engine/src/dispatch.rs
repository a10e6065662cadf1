//! The delivery boundary. The engine returns notification intents; the
//! caller hands them to a [`Delivery`] implementation (mail, queue) or
//! fans them out through the [`Dispatcher`] after the transaction commits.
//! A delivery failure is logged and never unwinds the committed change.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::warn;

use caravan_types::events::NotificationIntent;
use caravan_types::models::RequestStatus;

use crate::error::EngineError;
use crate::templates;
use crate::transitions::is_transition_valid;

pub trait Delivery: Send + Sync {
    fn deliver(&self, intent: &NotificationIntent) -> Result<(), EngineError>;
}

/// Send every intent, logging failures and carrying on. The status change
/// that produced these intents has already committed; nothing here may
/// block or fail it.
pub fn deliver_all(delivery: &dyn Delivery, intents: &[NotificationIntent]) {
    for intent in intents {
        if let Err(err) = delivery.deliver(intent) {
            warn!(
                template = %intent.template_key,
                to = %intent.to_user,
                "notification skipped: {err}"
            );
        }
    }
}

/// Broadcast-channel fan-out for intents, for callers that dispatch
/// asynchronously. Subscribers that lag simply miss intents; delivery
/// retries belong to the external collaborator.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    tx: broadcast::Sender<NotificationIntent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { tx }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationIntent> {
        self.inner.tx.subscribe()
    }

    pub fn dispatch_all(&self, intents: &[NotificationIntent]) {
        for intent in intents {
            // Fire-and-forget: no subscribers is fine
            let _ = self.inner.tx.send(intent.clone());
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-memory delivery collaborator that records what it was asked to
/// send. It knows the full set of renderable template keys and rejects
/// anything else with `UnknownTemplate`, the way a real renderer would at
/// send time.
pub struct RecordingDelivery {
    known_templates: HashSet<String>,
    sent: Mutex<Vec<NotificationIntent>>,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self {
            known_templates: renderable_templates(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn sent(&self) -> Vec<NotificationIntent> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last_template(&self) -> Option<String> {
        self.sent
            .lock()
            .ok()
            .and_then(|s| s.last().map(|i| i.template_key.clone()))
    }

    pub fn clear(&self) {
        if let Ok(mut s) = self.sent.lock() {
            s.clear();
        }
    }
}

impl Default for RecordingDelivery {
    fn default() -> Self {
        Self::new()
    }
}

impl Delivery for RecordingDelivery {
    fn deliver(&self, intent: &NotificationIntent) -> Result<(), EngineError> {
        if !self.known_templates.contains(&intent.template_key) {
            return Err(EngineError::UnknownTemplate(intent.template_key.clone()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(intent.clone());
        }
        Ok(())
    }
}

/// Every key the engine can emit: the named templates plus the default
/// key for each legal transition.
fn renderable_templates() -> HashSet<String> {
    use RequestStatus::*;

    let mut known: HashSet<String> = [
        templates::TEMPLATE_NEW_REQUEST,
        templates::TEMPLATE_REQUEST_DELIVERED,
        templates::TEMPLATE_REQUEST_RECEIVED,
        templates::TEMPLATE_REQUEST_NOT_RECEIVED,
    ]
    .into_iter()
    .map(String::from)
    .collect();

    let all = [Open, Committed, Accepted, Delivered, Received, Completed, Removed];
    for from in all {
        for to in all {
            if from != to && is_transition_valid(from, to) {
                known.insert(templates::default_key(from, to));
            }
        }
    }

    known
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn intent(template_key: &str) -> NotificationIntent {
        NotificationIntent {
            template_key: template_key.into(),
            from_user: None,
            to_user: Uuid::new_v4(),
            payload: json!({}),
        }
    }

    #[test]
    fn test_recording_delivery_accepts_known_templates() {
        let delivery = RecordingDelivery::new();
        delivery.deliver(&intent("new_request")).unwrap();
        delivery.deliver(&intent("request_delivered")).unwrap();
        delivery
            .deliver(&intent("status_change_from_open_to_committed"))
            .unwrap();
        assert_eq!(delivery.sent_count(), 3);
    }

    #[test]
    fn test_recording_delivery_rejects_unknown_template() {
        let delivery = RecordingDelivery::new();
        let err = delivery.deliver(&intent("no_such_template")).unwrap_err();
        assert!(matches!(err, EngineError::UnknownTemplate(_)));
        assert_eq!(delivery.sent_count(), 0);
    }

    #[test]
    fn test_deliver_all_skips_failures() {
        let delivery = RecordingDelivery::new();
        let intents = vec![
            intent("new_request"),
            intent("no_such_template"),
            intent("request_received"),
        ];
        deliver_all(&delivery, &intents);
        // The bad one is skipped, the rest go through
        assert_eq!(delivery.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_dispatcher_fan_out() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        dispatcher.dispatch_all(&[intent("new_request"), intent("request_delivered")]);

        assert_eq!(rx.recv().await.unwrap().template_key, "new_request");
        assert_eq!(rx.recv().await.unwrap().template_key, "request_delivered");
    }

    #[test]
    fn test_dispatch_without_subscribers_is_fine() {
        let dispatcher = Dispatcher::new();
        dispatcher.dispatch_all(&[intent("new_request")]);
    }
}
