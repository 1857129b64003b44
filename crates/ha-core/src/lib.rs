//! Core types for the Home Assistant app daemon
//!
//! This crate provides the fundamental types shared by every other crate in
//! the workspace: entity ids, entity snapshots, the events pushed by the
//! backend, service-call events, and the [`HassClient`] trait describing the
//! upstream backend collaborator.

mod client;
mod entity_id;
mod event;
mod location;
mod service_call;
mod state;

pub use client::HassClient;
pub use entity_id::{domain_of, EntityId, EntityIdError};
pub use event::HassEvent;
pub use location::Location;
pub use service_call::CallServiceEvent;
pub use state::{Entity, EntityState};

/// State value used when an entity is not known to the backend
pub const STATE_UNKNOWN: &str = "unknown";

/// Entity holding the next sunrise/sunset times
pub const SUN_ENTITY: &str = "sun.sun";

/// Well-known attribute keys
pub mod attributes {
    /// How a device tracker reports its position (`gps`, `router`, `bluetooth`, ...)
    pub const SOURCE_TYPE: &str = "source_type";
    /// `source_type` value of coordinate-reporting trackers
    pub const SOURCE_TYPE_GPS: &str = "gps";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const GPS_ACCURACY: &str = "gps_accuracy";
    pub const BATTERY_LEVEL: &str = "battery_level";
    pub const ENTITY_PICTURE: &str = "entity_picture";
    pub const ADDRESS: &str = "address";
    pub const FRIENDLY_NAME: &str = "friendly_name";
    pub const DISTANCE: &str = "distance";
    /// `sun.sun` attribute with the next sunrise (RFC 3339)
    pub const NEXT_RISING: &str = "next_rising";
    /// `sun.sun` attribute with the next sunset (RFC 3339)
    pub const NEXT_SETTING: &str = "next_setting";
}

/// Service names used by the convenience helpers
pub mod services {
    pub const TURN_ON: &str = "turn_on";
    pub const TURN_OFF: &str = "turn_off";
    pub const TOGGLE: &str = "toggle";
}
