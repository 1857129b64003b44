//! Events pushed by the backend

use serde::{Deserialize, Serialize};

use crate::{CallServiceEvent, Entity};

/// One message on the backend's event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HassEvent {
    /// An entity changed; carries both the previous and the new snapshot
    EntityChanged(Entity),
    /// Someone invoked a service on the backend
    ServiceInvoked(CallServiceEvent),
    /// The connection to the backend went up or down
    ConnectivityChanged { connected: bool },
}

impl HassEvent {
    /// Short name for log output
    pub fn kind(&self) -> &'static str {
        match self {
            HassEvent::EntityChanged(_) => "entity_changed",
            HassEvent::ServiceInvoked(_) => "service_invoked",
            HassEvent::ConnectivityChanged { .. } => "connectivity_changed",
        }
    }
}
