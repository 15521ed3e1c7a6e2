//! Dice faces, roll-sequence state, and triple scoring.

use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::constants::REROLLS_PER_TURN;

/// Inline capacity covers the standard six dice plus upgrade extras.
pub type FaceSet = SmallVec<[Face; 8]>;
pub type KeepSet = SmallVec<[bool; 8]>;

/// Symbolic die face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Face {
    One,
    Two,
    Three,
    Attack,
    Energy,
    Heart,
}

impl Face {
    pub const ALL: [Self; 6] = [
        Self::One,
        Self::Two,
        Self::Three,
        Self::Attack,
        Self::Energy,
        Self::Heart,
    ];

    /// Numeric value for triple scoring; non-numeric faces score nothing.
    #[must_use]
    pub const fn numeric_value(self) -> Option<u32> {
        match self {
            Self::One => Some(1),
            Self::Two => Some(2),
            Self::Three => Some(3),
            _ => None,
        }
    }

    fn roll(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// Lifecycle of one roll sequence within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DicePhase {
    #[default]
    Idle,
    Rolling,
    Resolved,
    SequenceComplete,
}

/// Dice state for the active turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceState {
    pub faces: FaceSet,
    /// Kept dice survive a reroll untouched.
    pub kept: KeepSet,
    pub phase: DicePhase,
    pub rerolls_remaining: u8,
    /// One-shot latch: resolution effects apply at most once per sequence.
    pub accepted: bool,
}

impl Default for DiceState {
    fn default() -> Self {
        Self {
            faces: FaceSet::new(),
            kept: KeepSet::new(),
            phase: DicePhase::Idle,
            rerolls_remaining: REROLLS_PER_TURN,
            accepted: false,
        }
    }
}

impl DiceState {
    /// Reset for a fresh turn.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Roll `count` dice, filling only non-kept positions. The first roll of
    /// a sequence sizes the face set; rerolls preserve kept faces.
    pub fn roll(&mut self, count: usize, rng: &mut impl Rng) {
        if self.faces.len() != count {
            self.faces.clear();
            self.kept.clear();
            self.faces.resize(count, Face::One);
            self.kept.resize(count, false);
            for slot in self.faces.iter_mut() {
                *slot = Face::roll(rng);
            }
        } else {
            for (slot, kept) in self.faces.iter_mut().zip(self.kept.iter()) {
                if !*kept {
                    *slot = Face::roll(rng);
                }
            }
        }
        self.phase = DicePhase::Resolved;
    }

    /// Mark dice to keep across the next reroll; out-of-range indices are
    /// ignored.
    pub fn keep(&mut self, indices: &[usize]) {
        for kept in self.kept.iter_mut() {
            *kept = false;
        }
        for &index in indices {
            if let Some(flag) = self.kept.get_mut(index) {
                *flag = true;
            }
        }
    }

    /// Consume one reroll credit. Returns false when none remain.
    pub fn consume_reroll(&mut self) -> bool {
        if self.rerolls_remaining == 0 {
            return false;
        }
        self.rerolls_remaining -= 1;
        true
    }

    /// Count of a given face in the current roll.
    #[must_use]
    pub fn count_of(&self, face: Face) -> usize {
        self.faces.iter().filter(|&&f| f == face).count()
    }

    #[must_use]
    pub const fn sequence_complete(&self) -> bool {
        matches!(self.phase, DicePhase::SequenceComplete)
    }
}

/// Victory points from numeric triples: a triple of N scores N, and each
/// matching die beyond the third scores one more.
#[must_use]
pub fn triple_score(faces: &[Face]) -> u32 {
    let mut total = 0;
    for value in 1..=3u32 {
        let count = faces
            .iter()
            .filter(|f| f.numeric_value() == Some(value))
            .count() as u32;
        if count >= 3 {
            total += value + (count - 3);
        }
    }
    total
}
