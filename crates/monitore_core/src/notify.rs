//! Change-feed contract. The core only defines the event shape; transport
//! (fan-out to admin dashboards) lives in the server. Delivery is advisory:
//! at-least-once, roughly commit order, and consumers may always re-fetch
//! authoritative state.

use crate::schema::Occurrence;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// Full new image of the inserted row.
    Insert { occurrence: Occurrence },
    /// Full new image of the updated row.
    Update { occurrence: Occurrence },
    /// Identifying key only.
    Delete { id: String },
}

impl ChangeEvent {
    pub fn occurrence_id(&self) -> &str {
        match self {
            ChangeEvent::Insert { occurrence } | ChangeEvent::Update { occurrence } => {
                &occurrence.id
            }
            ChangeEvent::Delete { id } => id,
        }
    }
}
