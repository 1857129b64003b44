//! Entity snapshots as delivered by the backend

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{attributes, STATE_UNKNOWN};

/// One state of an entity at a point in time
///
/// The state value is always a string (e.g., "on", "home", "23.5"); anything
/// richer lives in the attribute bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// The state value. Empty for the synthetic "no previous state" snapshot.
    pub state: String,

    /// Additional attributes associated with the state
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state value last changed
    #[serde(default)]
    pub last_changed: DateTime<Utc>,

    /// When the state was last written, even if the value didn't change
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
}

impl EntityState {
    /// Create a new state stamped with the current time
    pub fn new(state: impl Into<String>, attributes: HashMap<String, serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
        }
    }

    /// The state used for entities the backend does not know about
    pub fn unknown() -> Self {
        Self::new(STATE_UNKNOWN, HashMap::new())
    }

    /// Create the state that follows this one, preserving `last_changed` if
    /// the value is the same
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: HashMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        let new_state = new_state.into();
        let state_changed = self.state != new_state;

        Self {
            last_changed: if state_changed {
                now
            } else {
                self.last_changed
            },
            state: new_state,
            attributes: new_attributes,
            last_updated: now,
        }
    }

    /// True for the empty snapshot that stands in for "no previous state"
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Check if the state value represents an unknown state
    pub fn is_unknown(&self) -> bool {
        self.state == STATE_UNKNOWN
    }

    /// Get an attribute value by key
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// The tracker source type, if the entity reports one
    pub fn source_type(&self) -> Option<&str> {
        self.attributes
            .get(attributes::SOURCE_TYPE)
            .and_then(|v| v.as_str())
    }

    /// Whether this state comes from a coordinate-reporting tracker
    pub fn is_gps(&self) -> bool {
        self.source_type()
            .is_some_and(|s| s.eq_ignore_ascii_case(attributes::SOURCE_TYPE_GPS))
    }
}

/// An entity as seen by the daemon: its id plus the previous and current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity id as reported by the backend
    pub id: String,

    /// Display name
    pub name: String,

    /// The state before the change. Empty on the first snapshot.
    #[serde(default)]
    pub old: EntityState,

    /// The current state
    pub new: EntityState,
}

impl Entity {
    /// Create an entity snapshot with a previous and a current state
    pub fn new(id: impl Into<String>, old: EntityState, new: EntityState) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            old,
            new,
        }
    }

    /// Create an entity that has no previous state
    pub fn with_state(id: impl Into<String>, new: EntityState) -> Self {
        Self::new(id, EntityState::default(), new)
    }

    /// Placeholder for an id the backend has never reported
    pub fn unknown(id: impl Into<String>) -> Self {
        Self::with_state(id, EntityState::unknown())
    }

    /// Current state value
    pub fn state(&self) -> &str {
        &self.new.state
    }

    /// Current attributes
    pub fn attributes(&self) -> &HashMap<String, serde_json::Value> {
        &self.new.attributes
    }

    /// Whether the state value differs from the previous snapshot
    pub fn state_changed(&self) -> bool {
        self.old.state != self.new.state
    }
}
