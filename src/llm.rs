use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const SYSTEM_PROMPT: &str = "You are a helpful, polite, and intelligent assistant. Answer all questions clearly and with context.";

/// Number of most recent messages sent alongside the system prompt.
const RECENT_MESSAGES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: &str) -> Self {
        Self {
            role: MessageRole::System,
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: MessageRole::User,
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.to_string(),
        }
    }
}

/// Anything that can answer a chat request with a single message.
pub trait ChatBackend {
    fn chat(&self, model: &str, messages: &[&Message]) -> Result<Message>;
}

/// Full conversation history. The system message at index 0 is permanent.
#[derive(Debug)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new(system_prompt: &str) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages().len()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The system message followed by the last few messages of the
    /// transcript. While the transcript is short the tail still reaches back
    /// to index 0, so the system message appears twice. The window never
    /// holds more than `RECENT_MESSAGES + 1` entries.
    pub fn context_window(&self) -> Vec<&Message> {
        let start = self.messages.len().saturating_sub(RECENT_MESSAGES);

        std::iter::once(&self.messages[0])
            .chain(&self.messages[start..])
            .collect()
    }
}

pub struct Chatbot {
    backend: Box<dyn ChatBackend>,
    model: String,
    transcript: Transcript,
}

impl Chatbot {
    pub fn new(backend: Box<dyn ChatBackend>, model: &str, system_prompt: &str) -> Self {
        Self {
            backend,
            model: model.to_string(),
            transcript: Transcript::new(system_prompt),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Runs one turn and returns the text to show the user. Backend failures
    /// come back as `Error: <cause>` and leave the user message unanswered in
    /// the transcript.
    pub fn submit_turn(&mut self, user_text: &str) -> String {
        match self.exchange(user_text) {
            Ok(reply) => reply,
            Err(e) => {
                let cause = format!("{e:#}");
                tracing::warn!(error = %cause, "backend call failed");
                format!("Error: {cause}")
            }
        }
    }

    fn exchange(&mut self, user_text: &str) -> Result<String> {
        self.transcript.push(Message::user(user_text));

        let window = self.transcript.context_window();
        tracing::debug!(
            window = window.len(),
            transcript = self.transcript.len(),
            model = %self.model,
            "sending turn"
        );

        let response = self.backend.chat(&self.model, &window)?;
        let reply = response.content.trim().to_string();

        self.transcript.push(Message::assistant(&reply));

        Ok(reply)
    }
}
