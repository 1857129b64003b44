//! Per-person presence aggregation
//!
//! The tracker owns every person record. It is driven by exactly one task,
//! so aggregation runs never overlap. Debounce timers don't touch the
//! records; they only queue a [`DebounceExpired`] message for that task.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use ha_app::{schedule_after, ScheduledTask, SharedHelper};
use ha_config::{PersonConfig, TrackingSettings};
use ha_core::{attributes, Entity, EntityState};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use super::distance::distance;
use super::label::{next_label, translate_state, PresenceLabel, Trigger, HOME, NOT_HOME};
use super::{PresenceError, PresenceResult};

/// How recent (minutes) a GPS "home" report must be to count on its own
pub const GPS_FRESHNESS_MINUTES: i64 = 60;

/// Attributes copied from the most recent GPS tracker
const GPS_ATTRIBUTES: [&str; 6] = [
    attributes::LONGITUDE,
    attributes::LATITUDE,
    attributes::ENTITY_PICTURE,
    attributes::ADDRESS,
    attributes::BATTERY_LEVEL,
    attributes::GPS_ACCURACY,
];

/// Queued by a debounce timer when it fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceExpired {
    pub person: String,
    /// The label that armed the timer
    pub label: PresenceLabel,
}

/// Id of the synthetic entity carrying a person's presence
pub fn presence_entity_id(person: &str) -> String {
    format!("sensor.{}_presence", person.to_lowercase())
}

/// Resolve the aggregate signal of a person's devices
///
/// `devices` may be in any order.
pub fn aggregate_state(devices: &[Entity], now: DateTime<Utc>) -> String {
    aggregate_in_order(&by_recency(devices), now)
}

/// Devices, most recently updated first; ties keep their configured order
fn by_recency(devices: &[Entity]) -> Vec<&Entity> {
    let mut ordered: Vec<&Entity> = devices.iter().collect();
    ordered.sort_by(|a, b| b.new.last_updated.cmp(&a.new.last_updated));
    ordered
}

fn aggregate_in_order(by_update: &[&Entity], now: DateTime<Utc>) -> String {
    let fresh = chrono::Duration::minutes(GPS_FRESHNESS_MINUTES);

    if by_update.iter().any(|d| !d.new.is_gps() && is_home(d)) {
        return HOME.to_string();
    }

    if by_update
        .iter()
        .any(|d| d.new.is_gps() && is_home(d) && now - d.new.last_updated <= fresh)
    {
        return HOME.to_string();
    }

    if let Some(gps) = by_update.iter().find(|d| d.new.is_gps()) {
        return translate_state(gps.state());
    }

    by_update
        .iter()
        .max_by_key(|d| d.new.last_changed)
        .map(|d| translate_state(d.state()))
        .unwrap_or_else(|| NOT_HOME.to_string())
}

fn is_home(device: &Entity) -> bool {
    translate_state(device.state()) == HOME
}

/// One tracked person
#[derive(Debug)]
pub struct PersonRecord {
    pub friendly_name: String,
    pub devices: Vec<String>,
    pub label: PresenceLabel,
    pub attributes: HashMap<String, Value>,
    timer: Option<ScheduledTask>,
}

impl PersonRecord {
    fn from_config(config: &PersonConfig, settings: &TrackingSettings) -> Self {
        Self {
            friendly_name: config.friendly_name.clone(),
            devices: config.devices.clone(),
            label: config
                .state
                .as_deref()
                .map(|s| PresenceLabel::from_display(s, settings))
                .unwrap_or_default(),
            attributes: config.attributes.clone(),
            timer: None,
        }
    }
}

/// Result of one aggregation run
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceUpdate {
    pub person: String,
    pub aggregate: String,
    pub label: PresenceLabel,
    /// Configured devices the backend doesn't know
    pub missing_devices: Vec<String>,
}

/// Presence state of every configured person
pub struct PresenceTracker {
    helper: SharedHelper,
    settings: TrackingSettings,
    people: BTreeMap<String, PersonRecord>,
    /// Lowercased device id to the people it belongs to
    owners: HashMap<String, Vec<String>>,
    timeouts: mpsc::Sender<DebounceExpired>,
    cancel: CancellationToken,
}

impl PresenceTracker {
    pub fn new(
        helper: SharedHelper,
        people: &BTreeMap<String, PersonConfig>,
        settings: TrackingSettings,
        timeouts: mpsc::Sender<DebounceExpired>,
        cancel: CancellationToken,
    ) -> Self {
        let mut owners: HashMap<String, Vec<String>> = HashMap::new();
        for (person, config) in people {
            for device in &config.devices {
                owners
                    .entry(device.to_lowercase())
                    .or_default()
                    .push(person.clone());
            }
        }

        let people = people
            .iter()
            .map(|(name, config)| (name.clone(), PersonRecord::from_config(config, &settings)))
            .collect();

        Self {
            helper,
            settings,
            people,
            owners,
            timeouts,
            cancel,
        }
    }

    /// Every configured device id
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.people
            .values()
            .flat_map(|p| p.devices.iter().map(String::as_str))
    }

    pub fn people(&self) -> impl Iterator<Item = &str> {
        self.people.keys().map(String::as_str)
    }

    pub fn person(&self, person: &str) -> Option<&PersonRecord> {
        self.people.get(person)
    }

    pub fn label(&self, person: &str) -> Option<&PresenceLabel> {
        self.people.get(person).map(|p| &p.label)
    }

    /// Whether a debounce timer is pending for a person
    pub fn has_pending_timer(&self, person: &str) -> bool {
        self.people
            .get(person)
            .and_then(|p| p.timer.as_ref())
            .is_some_and(|t| !t.is_finished() && !t.is_cancelled())
    }

    /// Evaluate every person, as after startup
    pub fn refresh_all(&mut self) -> Vec<PresenceUpdate> {
        let people: Vec<String> = self.people.keys().cloned().collect();
        people
            .iter()
            .filter_map(|person| match self.update_person(person, Trigger::Device) {
                Ok(update) => Some(update),
                Err(e) => {
                    error!("{}", e);
                    None
                }
            })
            .collect()
    }

    /// A device changed: re-evaluate everyone who owns it
    pub fn handle_device(&mut self, device_id: &str) -> PresenceResult<Vec<PresenceUpdate>> {
        let owners = self
            .owners
            .get(&device_id.to_lowercase())
            .cloned()
            .ok_or_else(|| PresenceError::UnknownDevice(device_id.to_string()))?;

        owners
            .iter()
            .map(|person| self.update_person(person, Trigger::Device))
            .collect()
    }

    /// A debounce timer fired
    ///
    /// Ignored (`Ok(None)`) when the person has left the label that armed it.
    pub fn handle_timeout(
        &mut self,
        expired: &DebounceExpired,
    ) -> PresenceResult<Option<PresenceUpdate>> {
        let record = self
            .people
            .get(&expired.person)
            .ok_or_else(|| PresenceError::UnknownPerson(expired.person.clone()))?;

        if record.label != expired.label {
            trace!(person = %expired.person, "Stale debounce timer ignored");
            return Ok(None);
        }

        self.update_person(&expired.person, Trigger::Timeout)
            .map(Some)
    }

    /// Run the aggregation for one person and publish the result
    #[instrument(skip(self), fields(person = %person))]
    pub fn update_person(
        &mut self,
        person: &str,
        trigger: Trigger,
    ) -> PresenceResult<PresenceUpdate> {
        let device_ids = self
            .people
            .get(person)
            .map(|p| p.devices.clone())
            .ok_or_else(|| PresenceError::UnknownPerson(person.to_string()))?;

        let mut devices = Vec::with_capacity(device_ids.len());
        let mut missing_devices = Vec::new();
        for id in device_ids {
            match self.helper.get_entity(&id) {
                Some(entity) => devices.push(entity),
                None => {
                    error!(device = %id, "Device does not exist");
                    missing_devices.push(id);
                }
            }
        }

        let by_update = by_recency(&devices);
        let aggregate = aggregate_in_order(&by_update, Utc::now());
        let location = self.helper.location();

        let Some(record) = self.people.get_mut(person) else {
            return Err(PresenceError::UnknownPerson(person.to_string()));
        };

        let label = next_label(&record.label, &aggregate, trigger);
        if label != record.label {
            info!(
                from = %record.label.display(&self.settings),
                to = %label.display(&self.settings),
                "Presence changed"
            );
        }

        if record.label.is_transient() && label != record.label {
            if let Some(timer) = record.timer.take() {
                timer.cancel();
            }
        }

        // A transient label always has a timer, including one configured as
        // the starting state.
        let arm = label.is_transient() && (label != record.label || record.timer.is_none());
        record.label = label.clone();

        if arm {
            let delay = match label {
                PresenceLabel::JustArrived => self.settings.just_arrived_delay(),
                _ => self.settings.just_left_delay(),
            };
            if let Some(previous) = record.timer.take() {
                previous.cancel();
            }

            let timeouts = self.timeouts.clone();
            let expired = DebounceExpired {
                person: person.to_string(),
                label: label.clone(),
            };
            debug!(delay_secs = delay.as_secs(), "Arming debounce timer");
            record.timer = Some(schedule_after(delay, &self.cancel, async move {
                if timeouts.send(expired).await.is_err() {
                    trace!("Presence loop gone, debounce dropped");
                }
            }));
        }

        copy_gps_attributes(&by_update, &mut record.attributes);
        record.attributes.insert(
            attributes::FRIENDLY_NAME.to_string(),
            Value::String(record.friendly_name.clone()),
        );

        let coordinates = (
            record
                .attributes
                .get(attributes::LATITUDE)
                .and_then(Value::as_f64),
            record
                .attributes
                .get(attributes::LONGITUDE)
                .and_then(Value::as_f64),
        );
        if let (Some(latitude), Some(longitude)) = coordinates {
            let away = distance(
                latitude,
                longitude,
                location.latitude,
                location.longitude,
                self.settings.distance_unit,
            );
            record
                .attributes
                .insert(attributes::DISTANCE.to_string(), Value::from(away.round()));
        }

        let entity = Entity::with_state(
            presence_entity_id(person),
            EntityState::new(label.display(&self.settings), record.attributes.clone()),
        );
        if !self.helper.set_entity(&entity) {
            warn!(entity_id = %entity.id, "Backend rejected presence entity");
        }

        Ok(PresenceUpdate {
            person: person.to_string(),
            aggregate,
            label,
            missing_devices,
        })
    }
}

/// Copy location details from the first GPS tracker in recency order
fn copy_gps_attributes(by_update: &[&Entity], target: &mut HashMap<String, Value>) {
    let Some(gps) = by_update.iter().find(|d| d.new.is_gps()) else {
        return;
    };

    for key in GPS_ATTRIBUTES {
        if let Some(value) = gps.attributes().get(key) {
            target.insert(key.to_string(), value.clone());
        }
    }
}
