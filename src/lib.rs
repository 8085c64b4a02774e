//! Pendant - voice assistant daemon for wearable and embedded hosts
//!
//! This library provides the core functionality for the pendant daemon:
//! - Press-to-talk and silence-gated audio capture
//! - Free-text tool-call extraction and dispatch (email, alarms, camera)
//! - Bounded conversation history with two-pass tool-aware replies
//! - Background alarm scheduler coordinated with live recording
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Hardware                          │
//! │   Microphone  │  Button (GPIO)  │  Speaker  │ Camera │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Pendant Daemon                       │
//! │   Recorder  │  Session  │  Tools  │  Alarm loop     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Cloud collaborators                     │
//! │   Whisper STT  │  Chat  │  TTS  │  Gmail REST       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod alarm;
pub mod audio;
pub mod button;
pub mod camera;
pub mod config;
pub mod daemon;
pub mod email;
pub mod error;
pub mod recording;
pub mod session;
pub mod speech;
pub mod toolcall;
pub mod tools;

pub use alarm::{Alarm, AlarmScheduler, AlarmStore};
pub use config::Config;
pub use daemon::{Daemon, Running};
pub use email::{EmailSummary, Mailer};
pub use error::{Error, Result};
pub use recording::{RecordingFlag, Recorder, StopCause, TriggerPolicy};
pub use session::{ChatApi, ConversationSession, Role, Turn};
pub use toolcall::{ToolCall, extract_tool_call};
pub use tools::ToolDispatcher;
