//! Effect queue gate.
//!
//! Purchased upgrade effects are processed by an external collaborator; the
//! engine only tracks entry status so the buy-wait phase can gate on "is
//! anything still queued or processing".

use serde::{Deserialize, Serialize};

use crate::player::PlayerId;

/// Processing status of one queued effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectStatus {
    Queued,
    Processing,
    Resolved,
    Failed,
}

/// One effect enqueued by a purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectQueueEntry {
    pub id: u64,
    pub player: PlayerId,
    pub card_id: String,
    pub effect: serde_json::Value,
    pub status: EffectStatus,
}

/// Queue contents mirrored from the external processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EffectQueue {
    entries: Vec<EffectQueueEntry>,
    next_id: u64,
}

impl EffectQueue {
    /// Enqueue an effect needing a confirmation window.
    pub fn enqueue(&mut self, player: PlayerId, card_id: &str, effect: serde_json::Value) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(EffectQueueEntry {
            id,
            player,
            card_id: card_id.to_string(),
            effect,
            status: EffectStatus::Queued,
        });
        id
    }

    /// External processor reports a status change.
    pub fn set_status(&mut self, id: u64, status: EffectStatus) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[EffectQueueEntry] {
        &self.entries
    }

    /// The buy-wait exit gate: nothing queued and nothing in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        !self
            .entries
            .iter()
            .any(|entry| matches!(entry.status, EffectStatus::Queued | EffectStatus::Processing))
    }

    /// Drop settled entries; called at turn cleanup.
    pub fn prune_settled(&mut self) {
        self.entries
            .retain(|entry| matches!(entry.status, EffectStatus::Queued | EffectStatus::Processing));
    }
}
