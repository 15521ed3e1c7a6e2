//! The contested zone and its two occupancy slots.

use serde::{Deserialize, Serialize};

use crate::player::PlayerId;

/// Occupancy position inside the zone. The secondary slot only opens at
/// larger table sizes (see `GameConfig::secondary_slot_allowed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneSlot {
    Primary,
    Secondary,
}

/// Zone occupancy. Invariant: the two slots never hold the same player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ZoneState {
    pub primary: Option<PlayerId>,
    pub secondary: Option<PlayerId>,
}

impl ZoneState {
    #[must_use]
    pub const fn occupant_of(&self, slot: ZoneSlot) -> Option<PlayerId> {
        match slot {
            ZoneSlot::Primary => self.primary,
            ZoneSlot::Secondary => self.secondary,
        }
    }

    /// The slot a player currently holds, if any.
    #[must_use]
    pub fn slot_of(&self, player: PlayerId) -> Option<ZoneSlot> {
        if self.primary == Some(player) {
            Some(ZoneSlot::Primary)
        } else if self.secondary == Some(player) {
            Some(ZoneSlot::Secondary)
        } else {
            None
        }
    }

    #[must_use]
    pub fn contains(&self, player: PlayerId) -> bool {
        self.slot_of(player).is_some()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_none()
    }

    /// First open slot, primary before secondary; the secondary is only
    /// offered when the table size allows it.
    #[must_use]
    pub const fn first_open_slot(&self, secondary_allowed: bool) -> Option<ZoneSlot> {
        if self.primary.is_none() {
            Some(ZoneSlot::Primary)
        } else if self.secondary.is_none() && secondary_allowed {
            Some(ZoneSlot::Secondary)
        } else {
            None
        }
    }

    /// Occupied slots in resolution order, filtered to legal slots.
    #[must_use]
    pub fn occupied_slots(&self, secondary_allowed: bool) -> Vec<(ZoneSlot, PlayerId)> {
        let mut slots = Vec::with_capacity(2);
        if let Some(id) = self.primary {
            slots.push((ZoneSlot::Primary, id));
        }
        if secondary_allowed && let Some(id) = self.secondary {
            slots.push((ZoneSlot::Secondary, id));
        }
        slots
    }

    /// Place a player into a slot. Returns false (and changes nothing) when
    /// the slot is taken or the player already occupies the other slot.
    pub fn enter(&mut self, slot: ZoneSlot, player: PlayerId) -> bool {
        if self.contains(player) || self.occupant_of(slot).is_some() {
            return false;
        }
        match slot {
            ZoneSlot::Primary => self.primary = Some(player),
            ZoneSlot::Secondary => self.secondary = Some(player),
        }
        true
    }

    /// Vacate whatever slot the player holds. Returns the freed slot.
    pub fn vacate(&mut self, player: PlayerId) -> Option<ZoneSlot> {
        let slot = self.slot_of(player)?;
        match slot {
            ZoneSlot::Primary => self.primary = None,
            ZoneSlot::Secondary => self.secondary = None,
        }
        Some(slot)
    }
}
