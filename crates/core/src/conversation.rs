use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single turn in a slot's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub text: String,
}

impl ConversationEntry {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, text: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    /// Assistant entries record the JSON-serialized structured output, not
    /// the display text, so later turns can recover the full call shape.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, text: text.into() }
    }
}

/// An ordered sequence of `{system|user|assistant, text}` entries for one
/// slot. Created lazily on first use with one system entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    entries: Vec<ConversationEntry>,
}

impl Conversation {
    pub fn new(system_preamble: impl Into<String>) -> Self {
        Self { entries: vec![ConversationEntry::system(system_preamble)] }
    }

    pub fn push(&mut self, entry: ConversationEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn turn_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.role, Role::User))
            .count()
    }

    /// Reset clears a slot's conversation back to empty; the caller is
    /// responsible for reseeding the system preamble on next use.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Abstracts the conversation-history store so the turn engine never
/// depends on the request-surface crate that owns it — mirrors how
/// `ControllerSink` keeps the events crate transport-agnostic.
pub trait ConversationAccess: Send + Sync {
    fn get_or_create(&self, slot_id: crate::SlotId, system_preamble: &str) -> Conversation;
    fn append(&self, slot_id: crate::SlotId, entry: ConversationEntry);
}
