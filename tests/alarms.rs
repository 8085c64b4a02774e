//! Alarm coordination tests
//!
//! Exercises the scheduler/recording-flag interplay the daemon's
//! background loop relies on, and alarm persistence through the tool
//! dispatcher.

use chrono::{NaiveDate, NaiveDateTime};
use pendant::recording::RecordingFlag;
use pendant::toolcall::extract_tool_call;
use pendant::{Alarm, AlarmScheduler, AlarmStore, ToolDispatcher};

mod common;
use common::ScriptedChat;

fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 2)
        .expect("valid date")
        .and_hms_opt(hour, minute, second)
        .expect("valid time")
}

fn wake_alarm() -> Alarm {
    Alarm {
        id: 1,
        hour: 7,
        minute: 0,
        label: "wake".to_string(),
        message: "Good morning!".to_string(),
        enabled: true,
        created_at: chrono::Utc::now(),
    }
}

#[test]
fn due_alarm_during_recording_is_skipped_for_the_minute() {
    let mut scheduler = AlarmScheduler::new();
    let flag = RecordingFlag::new();
    let alarms = vec![wake_alarm()];

    // A capture is in flight when the alarm comes due
    let guard = flag.begin();
    let due = scheduler.due(&alarms, at(7, 0, 0));
    assert_eq!(due.len(), 1);
    assert!(flag.is_recording(), "notification must be suppressed");

    // The capture ends; later polls in the same minute stay quiet
    drop(guard);
    assert!(!flag.is_recording());
    assert!(scheduler.due(&alarms, at(7, 0, 30)).is_empty());
    assert!(scheduler.due(&alarms, at(7, 0, 50)).is_empty());
}

#[test]
fn recording_that_starts_after_the_due_tick_still_suppresses_playback() {
    // The flag can flip between a due tick and the speaker being
    // touched (a capture starting while the notification is being
    // synthesized). The playback gate reads the flag last, so the
    // notification is dropped and not retried within the minute.
    let mut scheduler = AlarmScheduler::new();
    let flag = RecordingFlag::new();
    let alarms = vec![wake_alarm()];

    let due = scheduler.due(&alarms, at(7, 0, 0));
    assert_eq!(due.len(), 1);
    assert!(!flag.is_recording(), "clear at tick time");

    // Capture begins before playback would start
    let guard = flag.begin();
    assert!(flag.is_recording(), "playback gate sees the capture");

    drop(guard);
    assert!(scheduler.due(&alarms, at(7, 0, 40)).is_empty());
}

#[test]
fn alarm_fires_when_no_recording_is_active() {
    let mut scheduler = AlarmScheduler::new();
    let flag = RecordingFlag::new();
    let alarms = vec![wake_alarm()];

    let due = scheduler.due(&alarms, at(7, 0, 10));
    assert_eq!(due.len(), 1);
    assert!(!flag.is_recording(), "notification goes through");
    assert_eq!(due[0].message, "Good morning!");
}

#[tokio::test]
async fn alarms_set_by_tools_survive_a_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("alarms.json");
    let chat = ScriptedChat::new(vec![]);

    {
        let store = AlarmStore::load(path.clone()).expect("fresh store");
        let mut tools = ToolDispatcher::new(None, None, store);

        let call = extract_tool_call(
            r#"{"tool": "alarm_set", "params": {"time": "06:45", "label": "run", "message": "Time to run."}}"#,
        )
        .expect("call parses");
        let result = tools.dispatch(&call, &chat).await;
        assert!(result.contains("06:45"), "got {result:?}");
    }

    let store = AlarmStore::load(path).expect("reloaded store");
    assert_eq!(store.list().len(), 1);
    assert_eq!(store.list()[0].time_string(), "06:45");
    assert_eq!(store.list()[0].message, "Time to run.");
}

#[tokio::test]
async fn deleting_a_missing_alarm_reads_back_cleanly() {
    let chat = ScriptedChat::new(vec![]);
    let mut tools = ToolDispatcher::new(None, None, AlarmStore::in_memory());

    let call = extract_tool_call(r#"{"tool": "alarm_delete", "params": {"id": 42}}"#)
        .expect("call parses");
    let result = tools.dispatch(&call, &chat).await;
    assert_eq!(result, "There is no alarm with id 42.");
}
