//! Event dispatcher for the app daemon
//!
//! The [`EventDispatcher`] is the central routing table between the backend
//! event stream and the applications. Applications register bounded channels
//! under subscription keys:
//!
//! - an entity id (`light.kitchen`)
//! - a domain (`light`), which receives every entity of that domain
//! - a `(domain, service)` pair for service-call events
//!
//! Delivery runs on the publisher's task. Each send waits at most
//! [`DEFAULT_SEND_TIMEOUT`] for room in the channel; a subscriber that can't
//! keep up loses that one event and the miss is logged.

mod command;
mod dispatcher;

pub use command::DaemonCommand;
pub use dispatcher::{EntitySender, EventDispatcher, ServiceSender, DEFAULT_SEND_TIMEOUT};

use std::sync::Arc;

/// Thread-safe wrapper for EventDispatcher
pub type SharedEventDispatcher = Arc<EventDispatcher>;
