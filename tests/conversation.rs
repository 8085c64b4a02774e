//! End-to-end conversation flow tests
//!
//! Drives the session/tool pipeline the way the daemon does, with
//! scripted chat and mailer stubs standing in for the network.

use std::sync::Arc;

use pendant::{AlarmStore, ConversationSession, Mailer, ToolDispatcher};

mod common;
use common::{RecordingMailer, ScriptedChat};

#[tokio::test]
async fn setting_an_alarm_by_voice() {
    let chat = ScriptedChat::new(vec![
        r#"{"tool": "alarm_set", "params": {"time": "07:00", "label": "wake", "message": "Good morning!"}}"#,
        "Your alarm is set for seven in the morning.",
    ]);
    let mut session = ConversationSession::new("assistant prompt");
    let mut tools = ToolDispatcher::new(None, None, AlarmStore::in_memory());

    let reply = session
        .respond("set an alarm for 7:00 called wake", &chat, &mut tools)
        .await
        .expect("turn succeeds");

    assert_eq!(reply, "Your alarm is set for seven in the morning.");

    let alarms = tools.shared_alarms();
    let alarms = alarms.lock().expect("store lock");
    assert_eq!(alarms.list().len(), 1);
    assert_eq!(alarms.list()[0].id, 1);
    assert_eq!(alarms.list()[0].time_string(), "07:00");
    assert!(alarms.list()[0].enabled);
}

#[tokio::test]
async fn listing_then_reading_by_index_across_turns() {
    let chat = ScriptedChat::new(vec![
        r#"{"tool": "gmail_list", "params": {"query": "is:unread", "max_results": 5}}"#,
        "You have mail from Ada and Bram.",
        r#"{"tool": "gmail_read", "params": {"message_id": 2}}"#,
        "Bram says the build is all green.",
    ]);
    let mut session = ConversationSession::new("assistant prompt");
    let mut tools = ToolDispatcher::new(
        Some(Arc::new(RecordingMailer::new())),
        None,
        AlarmStore::in_memory(),
    );

    let first = session
        .respond("any new email?", &chat, &mut tools)
        .await
        .expect("list turn succeeds");
    assert_eq!(first, "You have mail from Ada and Bram.");

    // "the second one" resolves against the listing from the last turn
    let second = session
        .respond("read the second one", &chat, &mut tools)
        .await
        .expect("read turn succeeds");
    assert_eq!(second, "Bram says the build is all green.");
}

#[tokio::test]
async fn replying_goes_to_the_listed_sender() {
    let mailer = Arc::new(RecordingMailer::new());
    let chat = ScriptedChat::new(vec![
        r#"{"tool": "gmail_list", "params": {}}"#,
        "You have mail from Ada and Bram.",
        r#"{"tool": "gmail_reply", "params": {"message_id": 1, "body": "Noon works, see you then."}}"#,
        "I replied to Ada.",
    ]);
    let mut session = ConversationSession::new("assistant prompt");
    let mut tools = ToolDispatcher::new(Some(Arc::clone(&mailer) as Arc<dyn Mailer>), None, AlarmStore::in_memory());

    session
        .respond("check my email", &chat, &mut tools)
        .await
        .expect("list turn succeeds");
    let reply = session
        .respond("reply to the first that noon works", &chat, &mut tools)
        .await
        .expect("reply turn succeeds");

    assert_eq!(reply, "I replied to Ada.");
    let sent = mailer.sent.lock().expect("sent lock");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "Ada");
    assert_eq!(sent[0].body, "Noon works, see you then.");
}

#[tokio::test]
async fn plain_chat_needs_no_tools() {
    let chat = ScriptedChat::new(vec!["It's about twenty degrees and sunny."]);
    let mut session = ConversationSession::new("assistant prompt");
    let mut tools = ToolDispatcher::new(None, None, AlarmStore::in_memory());

    let reply = session
        .respond("what's the weather like", &chat, &mut tools)
        .await
        .expect("turn succeeds");

    assert_eq!(reply, "It's about twenty degrees and sunny.");
    assert!(tools.shared_alarms().lock().expect("store lock").list().is_empty());
}

#[tokio::test]
async fn tool_failure_is_spoken_not_fatal() {
    // No mailer configured, yet the model asks for one
    let chat = ScriptedChat::new(vec![
        r#"{"tool": "gmail_list", "params": {}}"#,
        "Email isn't set up on this device.",
    ]);
    let mut session = ConversationSession::new("assistant prompt");
    let mut tools = ToolDispatcher::new(None, None, AlarmStore::in_memory());

    let reply = session
        .respond("check my email", &chat, &mut tools)
        .await
        .expect("turn still succeeds");
    assert_eq!(reply, "Email isn't set up on this device.");
}
