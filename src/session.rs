//! Conversation session management
//!
//! Bounded rolling history driving two-pass (tool-result-aware) chat
//! calls. Tool execution happens between the passes: the first reply
//! may embed a tool call; its result is fed back as a synthetic user
//! turn asking for a spoken-style summary.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::Result;
use crate::toolcall::extract_tool_call;
use crate::tools::ToolDispatcher;

/// Most-recent turns retained; bounded memory, not correctness-critical
const MAX_TURNS: usize = 10;

/// Token budget for the first chat pass
const FIRST_PASS_TOKENS: u32 = 500;

/// Token budget for the tool-result summary pass
const SUMMARY_TOKENS: u32 = 300;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name used by the chat API
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged message in the conversation history
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    /// A user turn
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// An assistant turn
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Chat-completion collaborator
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// One completion over system prompt + ordered history
    async fn complete(&self, system_prompt: &str, turns: &[Turn], max_tokens: u32)
    -> Result<String>;

    /// Describe an image (used by the camera tools)
    async fn describe_image(&self, image: &[u8], prompt: &str) -> Result<String>;
}

/// Bounded conversation history and the two-pass turn flow
pub struct ConversationSession {
    system_prompt: String,
    turns: VecDeque<Turn>,
}

impl ConversationSession {
    /// Create an empty session
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            turns: VecDeque::new(),
        }
    }

    /// Current history, oldest first
    #[must_use]
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Number of retained turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn push(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > MAX_TURNS {
            self.turns.pop_front();
        }
    }

    fn history(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Run one full turn: chat, optional tool dispatch, optional
    /// summary pass. Returns the text to speak.
    ///
    /// Every assistant-visible reply is appended to history exactly
    /// once; when a tool ran, both the tool-invoking reply and the
    /// final summary are retained so later turns keep context.
    ///
    /// # Errors
    ///
    /// Returns error if a chat call fails; tool failures do not error,
    /// they surface as the dispatcher's textual result
    pub async fn respond(
        &mut self,
        user_text: &str,
        chat: &dyn ChatApi,
        tools: &mut ToolDispatcher,
    ) -> Result<String> {
        self.push(Turn::user(user_text));

        let reply = chat
            .complete(&self.system_prompt, &self.history(), FIRST_PASS_TOKENS)
            .await?;

        let Some(call) = extract_tool_call(&reply) else {
            self.push(Turn::assistant(reply.clone()));
            return Ok(reply);
        };

        tracing::info!(tool = %call.tool, "tool call extracted");
        let result = tools.dispatch(&call, chat).await;
        tracing::debug!(result = %result, "tool result");

        self.push(Turn::assistant(reply));
        self.push(Turn::user(format!(
            "Tool result:\n{result}\n\nSummarize this result in one or two short sentences \
             suitable for being read aloud."
        )));

        let summary = chat
            .complete(&self.system_prompt, &self.history(), SUMMARY_TOKENS)
            .await?;
        self.push(Turn::assistant(summary.clone()));

        Ok(summary)
    }
}
