//! Players and the turn rotation roster.

use serde::{Deserialize, Serialize};

use crate::config::SeatConfig;
use crate::constants::MAX_HEALTH;

/// Stable seat index identifying a player for the whole match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

/// One monster at the table. Mutated only by resolution and orchestration
/// operations; collaborators observe it through events and read access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub health: i32,
    pub max_health: i32,
    pub energy: u32,
    pub victory_points: u32,
    pub alive: bool,
    pub autonomous: bool,
    /// Set once the elimination event has been emitted for this player.
    #[serde(default)]
    pub elimination_announced: bool,
}

impl Player {
    #[must_use]
    pub fn from_seat(id: PlayerId, seat: &SeatConfig) -> Self {
        Self {
            id,
            name: seat.name.clone(),
            health: MAX_HEALTH,
            max_health: MAX_HEALTH,
            energy: 0,
            victory_points: 0,
            alive: true,
            autonomous: seat.autonomous,
            elimination_announced: false,
        }
    }

    /// Apply damage, marking the player destroyed at zero health.
    pub fn apply_damage(&mut self, amount: i32) {
        if !self.alive || amount <= 0 {
            return;
        }
        self.health = (self.health - amount).max(0);
        if self.health == 0 {
            self.alive = false;
        }
    }

    /// Heal up to max health. Returns the health actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        if !self.alive || amount <= 0 {
            return 0;
        }
        let before = self.health;
        self.health = (self.health + amount).min(self.max_health);
        self.health - before
    }
}

/// Owns the player list and the turn rotation.
///
/// Eliminated players stay in the list for display but are skipped by the
/// rotation and excluded from zone eligibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    #[must_use]
    pub fn from_seats(seats: &[SeatConfig]) -> Self {
        let players = seats
            .iter()
            .enumerate()
            .map(|(index, seat)| {
                Player::from_seat(PlayerId(u32::try_from(index).unwrap_or(u32::MAX)), seat)
            })
            .collect();
        Self { players }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    #[must_use]
    pub fn by_index(&self, index: usize) -> Option<&Player> {
        self.players.get(index)
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    #[must_use]
    pub fn living(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.alive)
    }

    #[must_use]
    pub fn living_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    /// Next rotation index after `current`, skipping eliminated players.
    /// Returns `current` unchanged when nobody else is alive.
    #[must_use]
    pub fn next_active_index(&self, current: usize) -> usize {
        let count = self.players.len();
        if count == 0 {
            return current;
        }
        let mut index = current;
        for _ in 0..count {
            index = (index + 1) % count;
            if self.players[index].alive {
                return index;
            }
        }
        current
    }

    /// The sole living player, when exactly one remains.
    #[must_use]
    pub fn sole_survivor(&self) -> Option<PlayerId> {
        let mut living = self.players.iter().filter(|p| p.alive);
        let first = living.next()?;
        if living.next().is_none() {
            Some(first.id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_of(count: usize) -> Roster {
        let seats: Vec<SeatConfig> = (0..count)
            .map(|i| SeatConfig::cpu(&format!("M{i}")))
            .collect();
        Roster::from_seats(&seats)
    }

    #[test]
    fn damage_destroys_at_zero() {
        let mut roster = roster_of(2);
        let player = roster.get_mut(PlayerId(0)).unwrap();
        player.apply_damage(MAX_HEALTH);
        assert!(!player.alive);
        assert_eq!(player.health, 0);
        // Further damage is inert on a destroyed player.
        player.apply_damage(3);
        assert_eq!(player.health, 0);
    }

    #[test]
    fn heal_caps_at_max_health() {
        let mut roster = roster_of(2);
        let player = roster.get_mut(PlayerId(1)).unwrap();
        assert_eq!(player.heal(2), 0);
        player.apply_damage(3);
        assert_eq!(player.heal(5), 3);
        assert_eq!(player.health, player.max_health);
    }

    #[test]
    fn rotation_skips_eliminated_players() {
        let mut roster = roster_of(3);
        roster.get_mut(PlayerId(1)).unwrap().apply_damage(MAX_HEALTH);
        assert_eq!(roster.next_active_index(0), 2);
        assert_eq!(roster.next_active_index(2), 0);
    }

    #[test]
    fn sole_survivor_detected() {
        let mut roster = roster_of(3);
        assert!(roster.sole_survivor().is_none());
        roster.get_mut(PlayerId(0)).unwrap().apply_damage(MAX_HEALTH);
        roster.get_mut(PlayerId(2)).unwrap().apply_damage(MAX_HEALTH);
        assert_eq!(roster.sole_survivor(), Some(PlayerId(1)));
    }
}
