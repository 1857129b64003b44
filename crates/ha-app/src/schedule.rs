//! Cancellable one-shot tasks and solar event times

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ha_core::{attributes, Entity};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Sun events applications can schedule against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolarEvent {
    Sunrise,
    Sunset,
}

impl SolarEvent {
    /// `sun.sun` attribute holding the next occurrence
    pub fn attribute(self) -> &'static str {
        match self {
            SolarEvent::Sunrise => attributes::NEXT_RISING,
            SolarEvent::Sunset => attributes::NEXT_SETTING,
        }
    }
}

impl fmt::Display for SolarEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolarEvent::Sunrise => write!(f, "sunrise"),
            SolarEvent::Sunset => write!(f, "sunset"),
        }
    }
}

/// Next occurrence of `event` shifted by `offset`, read from the sun entity
///
/// A shifted time already in the past moves one day ahead. Missing or
/// malformed attributes are logged and yield `None`.
pub fn next_solar_time(
    sun: &Entity,
    event: SolarEvent,
    offset: chrono::Duration,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let Some(raw) = sun
        .attributes()
        .get(event.attribute())
        .and_then(|v| v.as_str())
    else {
        error!(
            entity_id = %sun.id,
            attribute = event.attribute(),
            "Missing attribute, cannot schedule {}", event
        );
        return None;
    };

    let parsed = match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(e) => {
            error!(value = raw, "Failed to parse {} time: {}", event, e);
            return None;
        }
    };

    let mut at = parsed + offset;
    if at < now {
        debug!("Shifted {} time is in the past, adding one day", event);
        at += chrono::Duration::hours(24);
    }
    Some(at)
}

/// A delayed task bound to a cancellation scope
///
/// Dropping the handle does not cancel the task; cancelling the parent
/// token or calling [`ScheduledTask::cancel`] does.
#[derive(Debug)]
pub struct ScheduledTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Prevent the task from running if it hasn't yet
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the task has run, or has been cancelled and cleaned up
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Run `task` after `delay`, unless `parent` (or the returned handle) is
/// cancelled first
pub fn schedule_after<F>(delay: Duration, parent: &CancellationToken, task: F) -> ScheduledTask
where
    F: Future<Output = ()> + Send + 'static,
{
    let token = parent.child_token();
    let task_token = token.clone();

    let handle = tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = task_token.cancelled() => {
                trace!("Scheduled task cancelled");
            }
            _ = async {
                tokio::time::sleep(delay).await;
                task.await;
            } => {}
        }
    });

    ScheduledTask { token, handle }
}
