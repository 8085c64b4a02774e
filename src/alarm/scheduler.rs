//! Background alarm firing
//!
//! The daemon polls the scheduler every 10 seconds. Each enabled alarm
//! whose `HH:MM` matches the current wall-clock minute fires at most
//! once in that minute: a per-alarm dedup set is cleared when the
//! minute rolls over, so the alarm fires again on the next day's
//! matching minute. Whether the notification is actually spoken is the
//! caller's decision — it checks the shared recording flag and skips
//! (never queues) the tick when a capture is in progress.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use super::Alarm;

/// Cadence at which the daemon polls for due alarms
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Tracks which alarms already fired in the current minute
#[derive(Debug, Default)]
pub struct AlarmScheduler {
    fired: HashSet<u64>,
    minute_key: Option<(NaiveDate, u32, u32)>,
}

impl AlarmScheduler {
    /// Create an idle scheduler
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Alarms due at `now` that have not fired in this minute yet
    ///
    /// Marks the returned alarms as fired for the current minute.
    pub fn due(&mut self, alarms: &[Alarm], now: NaiveDateTime) -> Vec<Alarm> {
        let key = (now.date(), now.time().hour(), now.time().minute());
        if self.minute_key != Some(key) {
            self.fired.clear();
            self.minute_key = Some(key);
        }

        let mut due = Vec::new();
        for a in alarms {
            if a.enabled
                && a.hour == key.1
                && a.minute == key.2
                && !self.fired.contains(&a.id)
            {
                self.fired.insert(a.id);
                due.push(a.clone());
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn alarm(id: u64, hour: u32, minute: u32, enabled: bool) -> Alarm {
        Alarm {
            id,
            hour,
            minute,
            label: "test".to_string(),
            message: "it is time".to_string(),
            enabled,
            created_at: Utc::now(),
        }
    }

    fn at(day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    #[test]
    fn fires_once_per_minute() {
        let mut sched = AlarmScheduler::new();
        let alarms = vec![alarm(1, 7, 0, true)];

        // Several 10s polls inside the same minute
        assert_eq!(sched.due(&alarms, at(1, 7, 0, 0)).len(), 1);
        assert_eq!(sched.due(&alarms, at(1, 7, 0, 10)).len(), 0);
        assert_eq!(sched.due(&alarms, at(1, 7, 0, 50)).len(), 0);

        // Minute rolled over, still not a match
        assert_eq!(sched.due(&alarms, at(1, 7, 1, 0)).len(), 0);
    }

    #[test]
    fn fires_again_next_day() {
        let mut sched = AlarmScheduler::new();
        let alarms = vec![alarm(1, 7, 0, true)];

        assert_eq!(sched.due(&alarms, at(1, 7, 0, 0)).len(), 1);
        assert_eq!(sched.due(&alarms, at(2, 7, 0, 0)).len(), 1);
    }

    #[test]
    fn disabled_alarms_never_fire() {
        let mut sched = AlarmScheduler::new();
        let alarms = vec![alarm(1, 7, 0, false)];

        assert!(sched.due(&alarms, at(1, 7, 0, 0)).is_empty());
    }

    #[test]
    fn non_matching_minute_is_quiet() {
        let mut sched = AlarmScheduler::new();
        let alarms = vec![alarm(1, 7, 30, true)];

        assert!(sched.due(&alarms, at(1, 7, 29, 59)).is_empty());
        assert!(sched.due(&alarms, at(1, 7, 31, 0)).is_empty());
        assert_eq!(sched.due(&alarms, at(1, 7, 30, 5)).len(), 1);
    }

    #[test]
    fn multiple_alarms_same_minute_all_fire() {
        let mut sched = AlarmScheduler::new();
        let alarms = vec![alarm(1, 7, 0, true), alarm(2, 7, 0, true), alarm(3, 8, 0, true)];

        let due = sched.due(&alarms, at(1, 7, 0, 0));
        let ids: Vec<u64> = due.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn skipped_tick_is_not_retried_later_in_minute() {
        // The caller may decide not to speak a due alarm (recording in
        // progress). Scheduler-side the alarm still counts as fired for
        // that minute - skipped means skipped, not queued.
        let mut sched = AlarmScheduler::new();
        let alarms = vec![alarm(1, 7, 0, true)];

        let due = sched.due(&alarms, at(1, 7, 0, 0));
        assert_eq!(due.len(), 1);
        assert!(sched.due(&alarms, at(1, 7, 0, 30)).is_empty());
    }
}
