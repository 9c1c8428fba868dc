//! Conversation Log (C2): per-slot history, process-wide, in-memory only
//! (spec.md Non-goals: "no persistence across restarts").
//!
//! Grounded in the teacher's `server/src/session.rs` shared-map pattern
//! (`DashMap` behind a handle cloned into collaborators) and
//! `original_source/backend/conversations.py`.

use dashmap::DashMap;
use resonance_core::{Conversation, ConversationAccess, ConversationEntry, SlotId};

/// `get_or_create`/`append` satisfy [`ConversationAccess`] for the turn
/// engine; `reset_all` is an inherent method only the request surface calls
/// (`POST /v1/reset`), since resetting isn't part of the engine's contract.
#[derive(Default)]
pub struct ConversationStore {
    slots: DashMap<SlotId, Conversation>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears every slot with recorded history and returns which slots were
    /// cleared, sorted ascending. Idempotent: with no activity between two
    /// calls, the second returns an empty list (Testable Property 8).
    pub fn reset_all(&self) -> Vec<SlotId> {
        let mut cleared: Vec<SlotId> = self.slots.iter().map(|entry| *entry.key()).collect();
        for slot_id in &cleared {
            self.slots.remove(slot_id);
        }
        cleared.sort();
        cleared
    }
}

impl ConversationAccess for ConversationStore {
    fn get_or_create(&self, slot_id: SlotId, system_preamble: &str) -> Conversation {
        self.slots.entry(slot_id).or_insert_with(|| Conversation::new(system_preamble)).clone()
    }

    fn append(&self, slot_id: SlotId, entry: ConversationEntry) {
        self.slots.entry(slot_id).or_insert_with(|| Conversation::new("")).push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_all_is_idempotent() {
        let store = ConversationStore::new();
        let slot = SlotId::new(3).unwrap();
        store.get_or_create(slot, "preamble");
        store.append(slot, ConversationEntry::user("hi"));

        let first = store.reset_all();
        assert_eq!(first, vec![slot]);

        let second = store.reset_all();
        assert!(second.is_empty());
    }

    #[test]
    fn get_or_create_reuses_existing_history() {
        let store = ConversationStore::new();
        let slot = SlotId::new(1).unwrap();
        store.get_or_create(slot, "preamble");
        store.append(slot, ConversationEntry::user("hello"));

        let conversation = store.get_or_create(slot, "preamble");
        assert_eq!(conversation.entries().len(), 2);
    }
}
