//! Presence labels and device state translation

use ha_config::TrackingSettings;

/// Normalized "at home" device signal
pub const HOME: &str = "home";

/// Normalized "away" device signal
pub const NOT_HOME: &str = "not_home";

/// Map a raw device state onto `home`/`not_home`
///
/// `home`, `on` and `true` mean home; `not_home`, `off` and `false` mean
/// away (case-insensitive). Anything else, such as a zone name, is kept.
pub fn translate_state(raw: &str) -> String {
    match raw.to_lowercase().as_str() {
        "home" | "on" | "true" => HOME.to_string(),
        "not_home" | "off" | "false" => NOT_HOME.to_string(),
        _ => raw.to_string(),
    }
}

/// A person's presence
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PresenceLabel {
    /// Not evaluated yet
    #[default]
    Unset,
    Home,
    Away,
    /// Arrived recently, debounce timer pending
    JustArrived,
    /// Left recently, debounce timer pending
    JustLeft,
    /// A raw aggregate that is neither home nor away (e.g. a zone)
    Other(String),
}

impl PresenceLabel {
    /// Label for an aggregate device signal
    pub fn from_aggregate(aggregate: &str) -> Self {
        match aggregate {
            HOME => PresenceLabel::Home,
            NOT_HOME => PresenceLabel::Away,
            other => PresenceLabel::Other(other.to_string()),
        }
    }

    /// Parse a configured starting label
    pub fn from_display(value: &str, settings: &TrackingSettings) -> Self {
        if value.is_empty() {
            PresenceLabel::Unset
        } else if value == settings.home_state {
            PresenceLabel::Home
        } else if value == settings.away_state {
            PresenceLabel::Away
        } else if value == settings.just_arrived_state {
            PresenceLabel::JustArrived
        } else if value == settings.just_left_state {
            PresenceLabel::JustLeft
        } else {
            PresenceLabel::Other(value.to_string())
        }
    }

    /// Text published as the presence entity's state
    pub fn display(&self, settings: &TrackingSettings) -> String {
        match self {
            PresenceLabel::Unset => String::new(),
            PresenceLabel::Home => settings.home_state.clone(),
            PresenceLabel::Away => settings.away_state.clone(),
            PresenceLabel::JustArrived => settings.just_arrived_state.clone(),
            PresenceLabel::JustLeft => settings.just_left_state.clone(),
            PresenceLabel::Other(value) => value.clone(),
        }
    }

    /// Whether a debounce timer belongs with this label
    pub fn is_transient(&self) -> bool {
        matches!(self, PresenceLabel::JustArrived | PresenceLabel::JustLeft)
    }
}

/// What started an aggregation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A device reported a change
    Device,
    /// A debounce timer fired
    Timeout,
}

/// Next label for a person, given the previous one and the aggregate signal
///
/// Transient labels absorb device events until their timer fires. Leaving
/// home and arriving home go through a transient label first.
pub fn next_label(prior: &PresenceLabel, aggregate: &str, trigger: Trigger) -> PresenceLabel {
    let at_home = aggregate == HOME;

    match prior {
        PresenceLabel::Unset => PresenceLabel::from_aggregate(aggregate),
        label if label.is_transient() => match trigger {
            Trigger::Device => label.clone(),
            Trigger::Timeout => PresenceLabel::from_aggregate(aggregate),
        },
        PresenceLabel::Home if !at_home => PresenceLabel::JustLeft,
        label if *label != PresenceLabel::Home && at_home => PresenceLabel::JustArrived,
        _ => PresenceLabel::from_aggregate(aggregate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_state() {
        assert_eq!(translate_state("home"), HOME);
        assert_eq!(translate_state("ON"), HOME);
        assert_eq!(translate_state("True"), HOME);
        assert_eq!(translate_state("not_home"), NOT_HOME);
        assert_eq!(translate_state("off"), NOT_HOME);
        assert_eq!(translate_state("FALSE"), NOT_HOME);
        assert_eq!(translate_state("Work"), "Work");
    }

    #[test]
    fn test_first_evaluation_adopts_aggregate() {
        let unset = PresenceLabel::Unset;
        assert_eq!(
            next_label(&unset, HOME, Trigger::Device),
            PresenceLabel::Home
        );
        assert_eq!(
            next_label(&unset, NOT_HOME, Trigger::Device),
            PresenceLabel::Away
        );
        assert_eq!(
            next_label(&unset, "work", Trigger::Device),
            PresenceLabel::Other("work".into())
        );
    }

    #[test]
    fn test_leaving_and_arriving_are_debounced() {
        assert_eq!(
            next_label(&PresenceLabel::Home, NOT_HOME, Trigger::Device),
            PresenceLabel::JustLeft
        );
        assert_eq!(
            next_label(&PresenceLabel::Home, "work", Trigger::Device),
            PresenceLabel::JustLeft
        );
        assert_eq!(
            next_label(&PresenceLabel::Away, HOME, Trigger::Device),
            PresenceLabel::JustArrived
        );
        assert_eq!(
            next_label(&PresenceLabel::Other("work".into()), HOME, Trigger::Device),
            PresenceLabel::JustArrived
        );
    }

    #[test]
    fn test_transient_labels_hold_until_timeout() {
        for transient in [PresenceLabel::JustLeft, PresenceLabel::JustArrived] {
            assert_eq!(next_label(&transient, HOME, Trigger::Device), transient);
            assert_eq!(next_label(&transient, NOT_HOME, Trigger::Device), transient);
        }
        assert_eq!(
            next_label(&PresenceLabel::JustLeft, NOT_HOME, Trigger::Timeout),
            PresenceLabel::Away
        );
        assert_eq!(
            next_label(&PresenceLabel::JustLeft, HOME, Trigger::Timeout),
            PresenceLabel::Home
        );
        assert_eq!(
            next_label(&PresenceLabel::JustArrived, HOME, Trigger::Timeout),
            PresenceLabel::Home
        );
    }

    #[test]
    fn test_steady_states() {
        assert_eq!(
            next_label(&PresenceLabel::Home, HOME, Trigger::Device),
            PresenceLabel::Home
        );
        assert_eq!(
            next_label(&PresenceLabel::Away, NOT_HOME, Trigger::Device),
            PresenceLabel::Away
        );
        assert_eq!(
            next_label(&PresenceLabel::Away, "work", Trigger::Device),
            PresenceLabel::Other("work".into())
        );
    }

    #[test]
    fn test_display_round_trip_with_custom_labels() {
        let settings = TrackingSettings {
            home_state: "hemma".into(),
            away_state: "borta".into(),
            ..TrackingSettings::default()
        };

        assert_eq!(PresenceLabel::Home.display(&settings), "hemma");
        assert_eq!(
            PresenceLabel::from_display("borta", &settings),
            PresenceLabel::Away
        );
        assert_eq!(
            PresenceLabel::from_display("Just left", &settings),
            PresenceLabel::JustLeft
        );
        assert_eq!(
            PresenceLabel::from_display("", &settings),
            PresenceLabel::Unset
        );
        assert_eq!(
            PresenceLabel::from_display("Work", &settings),
            PresenceLabel::Other("Work".into())
        );
    }
}
