use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A notification the engine has decided to send. The engine only picks the
/// template and the parties; rendering and transport belong to the external
/// delivery collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub template_key: String,
    /// The user the notification is "from", when there is a natural sender
    /// (e.g. the actor who changed the status).
    pub from_user: Option<Uuid>,
    pub to_user: Uuid,
    /// Template data as loose JSON; the renderer owns the schema.
    pub payload: serde_json::Value,
}
