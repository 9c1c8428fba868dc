use serde::{Deserialize, Serialize};
use std::fmt;

use crate::AgentId;

/// One of the six logical positions in a broadcast.
///
/// Always in `1..=6`; validated on construction so nothing downstream needs
/// to re-check the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotId(u8);

#[derive(Debug, thiserror::Error)]
#[error("slot id {0} out of range 1..=6")]
pub struct SlotIdError(pub u8);

impl SlotId {
    pub fn new(value: u8) -> Result<Self, SlotIdError> {
        if (1..=6).contains(&value) {
            Ok(Self(value))
        } else {
            Err(SlotIdError(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// The physical-routing wrap used for `wave2TargetSlotId`: next slot,
    /// wrapping 6 -> 1.
    pub fn next_wrapping(self) -> SlotId {
        SlotId((self.0 % 6) + 1)
    }

    pub fn all() -> impl Iterator<Item = SlotId> {
        (1..=6).map(|n| SlotId(n))
    }
}

impl TryFrom<u8> for SlotId {
    type Error = SlotIdError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SlotId::new(value)
    }
}

impl From<SlotId> for u8 {
    fn from(value: SlotId) -> Self {
        value.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `(slot_id, agent_id)` pair carried in a broadcast request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    #[serde(rename = "slotId")]
    pub slot_id: SlotId,
    #[serde(rename = "agentId")]
    pub agent_id: AgentId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range() {
        assert!(SlotId::new(0).is_err());
        assert!(SlotId::new(7).is_err());
        assert!(SlotId::new(1).is_ok());
        assert!(SlotId::new(6).is_ok());
    }

    #[test]
    fn wrap_mapping_matches_physical_routing_contract() {
        // wave2TargetSlotId = (slot_id mod 6) + 1
        let expected = [(1, 2), (2, 3), (3, 4), (4, 5), (5, 6), (6, 1)];
        for (slot, next) in expected {
            let s = SlotId::new(slot).unwrap();
            assert_eq!(s.next_wrapping().get(), next);
        }
    }
}
