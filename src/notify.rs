//! Notification gating between geofence/listing events and alert dispatch.
//!
//! The gate never errors: absent or disabled preferences deliver nothing
//! (fail closed). Distance gating against `max_distance_km` stays with the
//! caller, which knows the event's listing distance;
//! [`within_notify_distance`] is provided for it.

use chrono::{NaiveTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

/// The five notification kinds the app dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    NewNearby,
    Expiring,
    Reserved,
    Message,
    SystemAnnouncement,
}

/// A time-of-day window `[start, end)` during which alert-type
/// notifications are suppressed. When `start > end` the window wraps past
/// midnight; `start == end` is an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuietHours {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    pub fn new(enabled: bool, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            enabled,
            start,
            end,
        }
    }

    /// True iff quiet hours are enabled and `now` falls in the window.
    pub fn contains(&self, now: NaiveTime) -> bool {
        if !self.enabled {
            return false;
        }
        if self.start < self.end {
            now >= self.start && now < self.end
        } else if self.start > self.end {
            // Overnight window, e.g. 22:00 -> 08:00
            now >= self.start || now < self.end
        } else {
            false
        }
    }
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: NaiveTime::MIN,
            end: NaiveTime::MIN,
        }
    }
}

/// User notification preferences, externally owned and mutated by the
/// settings UI; read on every gating decision.
///
/// The `Default` is fail closed: nothing is delivered until the settings
/// store supplies a real value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPreferences {
    pub enabled: bool,
    pub new_nearby: bool,
    pub expiring: bool,
    pub reserved: bool,
    pub messages: bool,
    pub system_announcements: bool,
    pub quiet_hours: QuietHours,
    pub max_distance_km: f64,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            enabled: false,
            new_nearby: false,
            expiring: false,
            reserved: false,
            messages: false,
            system_announcements: false,
            quiet_hours: QuietHours::default(),
            max_distance_km: 5.0,
        }
    }
}

/// Decide whether an event of `kind` may proceed to alert dispatch at
/// time-of-day `now`. Absent preferences reject everything.
pub fn should_deliver(
    kind: NotificationKind,
    prefs: Option<&NotificationPreferences>,
    now: NaiveTime,
) -> bool {
    let Some(prefs) = prefs else {
        debug!("no preferences available, suppressing {:?}", kind);
        return false;
    };
    if !prefs.enabled {
        return false;
    }
    if prefs.quiet_hours.contains(now) {
        debug!("quiet hours active, suppressing {:?}", kind);
        return false;
    }
    match kind {
        NotificationKind::NewNearby => prefs.new_nearby,
        NotificationKind::Expiring => prefs.expiring,
        NotificationKind::Reserved => prefs.reserved,
        NotificationKind::Message => prefs.messages,
        NotificationKind::SystemAnnouncement => prefs.system_announcements,
    }
}

/// [`should_deliver`] against the current UTC time of day.
pub fn should_deliver_now(kind: NotificationKind, prefs: Option<&NotificationPreferences>) -> bool {
    should_deliver(kind, prefs, Utc::now().time())
}

/// Caller-side distance gate for events that carry a listing distance.
pub fn within_notify_distance(prefs: &NotificationPreferences, distance_meters: f64) -> bool {
    distance_meters <= prefs.max_distance_km * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn permissive_prefs() -> NotificationPreferences {
        NotificationPreferences {
            enabled: true,
            new_nearby: true,
            expiring: true,
            reserved: true,
            messages: true,
            system_announcements: true,
            ..Default::default()
        }
    }

    #[test]
    fn absent_preferences_fail_closed() {
        assert!(!should_deliver(NotificationKind::NewNearby, None, time(12, 0)));
    }

    #[test]
    fn default_preferences_deliver_nothing() {
        let prefs = NotificationPreferences::default();
        for kind in [
            NotificationKind::NewNearby,
            NotificationKind::Expiring,
            NotificationKind::Reserved,
            NotificationKind::Message,
            NotificationKind::SystemAnnouncement,
        ] {
            assert!(!should_deliver(kind, Some(&prefs), time(12, 0)));
        }
    }

    #[test]
    fn master_switch_rejects_everything() {
        let prefs = NotificationPreferences {
            enabled: false,
            ..permissive_prefs()
        };
        assert!(!should_deliver(NotificationKind::Message, Some(&prefs), time(12, 0)));
    }

    #[test]
    fn per_type_toggles_are_independent() {
        let prefs = NotificationPreferences {
            expiring: false,
            ..permissive_prefs()
        };
        assert!(!should_deliver(NotificationKind::Expiring, Some(&prefs), time(12, 0)));
        assert!(should_deliver(NotificationKind::NewNearby, Some(&prefs), time(12, 0)));
    }

    #[test]
    fn overnight_quiet_hours_wrap_midnight() {
        let prefs = NotificationPreferences {
            quiet_hours: QuietHours::new(true, time(22, 0), time(8, 0)),
            ..permissive_prefs()
        };
        assert!(!should_deliver(NotificationKind::NewNearby, Some(&prefs), time(23, 30)));
        assert!(!should_deliver(NotificationKind::NewNearby, Some(&prefs), time(3, 0)));
        assert!(should_deliver(NotificationKind::NewNearby, Some(&prefs), time(12, 0)));
    }

    #[test]
    fn quiet_hours_window_is_half_open() {
        let quiet = QuietHours::new(true, time(13, 0), time(14, 0));
        assert!(quiet.contains(time(13, 0)), "start is inclusive");
        assert!(!quiet.contains(time(14, 0)), "end is exclusive");
        assert!(quiet.contains(time(13, 59)));
    }

    #[test]
    fn disabled_or_empty_quiet_hours_never_match() {
        let disabled = QuietHours::new(false, time(22, 0), time(8, 0));
        assert!(!disabled.contains(time(23, 0)));
        let empty = QuietHours::new(true, time(9, 0), time(9, 0));
        assert!(!empty.contains(time(9, 0)));
    }

    #[test]
    fn distance_gate_uses_kilometers() {
        let prefs = NotificationPreferences {
            max_distance_km: 2.0,
            ..permissive_prefs()
        };
        assert!(within_notify_distance(&prefs, 1999.0));
        assert!(within_notify_distance(&prefs, 2000.0));
        assert!(!within_notify_distance(&prefs, 2001.0));
    }

    #[test]
    fn preferences_deserialize_from_settings_json() {
        let json = serde_json::json!({
            "enabled": true,
            "newNearby": true,
            "quietHours": {"enabled": true, "start": "22:00:00", "end": "08:00:00"},
            "maxDistanceKm": 3.5
        });
        let prefs: NotificationPreferences = serde_json::from_value(json).unwrap();
        assert!(prefs.enabled);
        assert!(prefs.new_nearby);
        assert!(!prefs.expiring, "unspecified toggles default closed");
        assert_eq!(prefs.max_distance_km, 3.5);
        assert!(prefs.quiet_hours.contains(time(23, 0)));
    }
}
