use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One element of a message body, mirroring the model wire format.
///
/// A `ToolUse` block is a tool invocation emitted by the model; `id` is the
/// correlation identifier its `ToolResult` must echo back in `tool_use_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: vec![ContentBlock::Text { text: text.into() }] }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: vec![ContentBlock::Text { text: text.into() }] }
    }

    pub fn assistant_blocks(content: Vec<ContentBlock>) -> Self {
        Self { role: Role::Assistant, content }
    }

    /// Tool results travel back to the model in a user-role message; this is
    /// the wire representation of a tool-result turn.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self { role: Role::User, content: results }
    }

    pub fn is_tool_result(&self) -> bool {
        self.content.iter().any(|block| matches!(block, ContentBlock::ToolResult { .. }))
    }

    /// Concatenated text content, ignoring non-text blocks.
    pub fn text(&self) -> String {
        let mut combined = String::new();
        for block in &self.content {
            if let ContentBlock::Text { text } = block {
                combined.push_str(text);
            }
        }
        combined
    }
}

/// Append-only conversation history for one call. Messages are never edited
/// or removed; the whole transcript is discarded when the session ends.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user_text(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user_text(text));
    }

    pub fn push_assistant_text(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant_text(text));
    }

    pub fn push_assistant_blocks(&mut self, content: Vec<ContentBlock>) {
        self.messages.push(Message::assistant_blocks(content));
    }

    pub fn push_tool_results(&mut self, results: Vec<ContentBlock>) {
        self.messages.push(Message::tool_results(results));
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
