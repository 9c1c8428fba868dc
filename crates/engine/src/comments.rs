//! Turn-2 -> Turn-3 comment routing: group by target, cap at
//! `MAX_COMMENTS_PER_TARGET` via uniform sampling without replacement.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use resonance_core::{ReceivedComment, SlotId, TurnResult, MAX_COMMENTS_PER_TARGET};

pub fn route_comments(turn2_results: &[TurnResult]) -> HashMap<SlotId, Vec<ReceivedComment>> {
    let mut by_target: HashMap<SlotId, Vec<ReceivedComment>> = HashMap::new();

    for result in turn2_results {
        let TurnResult::Comment { slot_id, agent_id, comment, target_slot_id, outcome } = result else {
            continue;
        };
        if !outcome.success {
            continue;
        }
        by_target.entry(*target_slot_id).or_default().push(ReceivedComment {
            from_slot_id: *slot_id,
            from_agent_id: agent_id.clone(),
            comment: comment.clone(),
        });
    }

    let mut rng = rand::thread_rng();
    for comments in by_target.values_mut() {
        if comments.len() > MAX_COMMENTS_PER_TARGET {
            comments.shuffle(&mut rng);
            comments.truncate(MAX_COMMENTS_PER_TARGET);
        }
    }

    by_target
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_core::Outcome;

    fn comment(slot: u8, target: u8) -> TurnResult {
        TurnResult::Comment {
            slot_id: SlotId::new(slot).unwrap(),
            agent_id: format!("agent-{slot}"),
            comment: format!("comment from {slot}"),
            voice_profile: "warm_professional".to_string(),
            target_slot_id: SlotId::new(target).unwrap(),
            outcome: Outcome::ok(format!("path-{slot}.wav")),
        }
    }

    #[test]
    fn groups_by_target_slot() {
        let results = vec![comment(1, 3), comment(2, 3), comment(4, 5)];
        let routed = route_comments(&results);
        assert_eq!(routed[&SlotId::new(3).unwrap()].len(), 2);
        assert_eq!(routed[&SlotId::new(5).unwrap()].len(), 1);
    }

    #[test]
    fn caps_at_max_comments_per_target() {
        let results: Vec<TurnResult> = (1..=6).filter(|&s| s != 4).map(|s| comment(s, 4)).collect();
        let routed = route_comments(&results);
        assert_eq!(routed[&SlotId::new(4).unwrap()].len(), MAX_COMMENTS_PER_TARGET);
    }

    #[test]
    fn failed_comments_are_excluded() {
        let mut results = vec![comment(1, 2)];
        if let TurnResult::Comment { outcome, .. } = &mut results[0] {
            *outcome = Outcome::failed();
        }
        let routed = route_comments(&results);
        assert!(routed.is_empty());
    }
}
