//! Deterministic RNG layer.
//!
//! Every random draw in the engine flows through an [`RngSuite`]. In seeded
//! mode the suite derives a fresh, reproducible generator per call site from
//! stable identifiers (turn cycle, roll index, player id); same inputs give a
//! bit-identical output sequence across process restarts. In free mode the
//! suite hands out entropy-seeded generators and the reproducibility contract
//! is off.

use hmac::{Hmac, Mac};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::Sha256;
use twox_hash::XxHash64;

use crate::config::DeterminismMode;
use crate::player::PlayerId;

/// One component of a combined seed. Order matters when folding.
#[derive(Debug, Clone, Copy)]
pub enum SeedPart<'a> {
    Num(u64),
    Text(&'a str),
}

/// Fold heterogeneous identifiers into one seed, order-sensitively.
///
/// Text parts are hashed with XxHash64 so arbitrary identifiers fold into a
/// stable word; numeric parts fold directly.
#[must_use]
pub fn combine_seed(base: u64, parts: &[SeedPart<'_>]) -> u64 {
    let mut acc = base;
    for part in parts {
        let word = match part {
            SeedPart::Num(n) => *n,
            SeedPart::Text(s) => XxHash64::oneshot(0, s.as_bytes()),
        };
        // Order-sensitive mix: rotate before folding so (a, b) != (b, a).
        acc = acc.rotate_left(17) ^ word.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    }
    acc
}

/// Seed for the dice stream of a specific roll within a specific turn.
#[must_use]
pub fn derive_turn_seed(base: u64, turn_cycle_id: u64, roll_index: u32) -> u64 {
    combine_seed(
        derive_stream_seed(base, b"dice"),
        &[
            SeedPart::Num(turn_cycle_id),
            SeedPart::Num(u64::from(roll_index)),
        ],
    )
}

/// Seed for a single yield/roll decision, tagged by prefix and actor.
#[must_use]
pub fn derive_decision_seed(
    base: u64,
    prefix: &str,
    turn_cycle_id: u64,
    decision_index: u32,
    player: PlayerId,
) -> u64 {
    combine_seed(
        derive_stream_seed(base, b"decision"),
        &[
            SeedPart::Text(prefix),
            SeedPart::Num(turn_cycle_id),
            SeedPart::Num(u64::from(decision_index)),
            SeedPart::Num(u64::from(player.0)),
        ],
    )
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}

/// Generator handed out by the suite.
///
/// ChaCha8 is portable and version-stable, which the seeded replay contract
/// needs; free mode uses the cheaper `SmallRng`.
#[derive(Debug, Clone)]
pub enum EngineRng {
    Seeded(ChaCha8Rng),
    Free(SmallRng),
}

impl RngCore for EngineRng {
    fn next_u32(&mut self) -> u32 {
        match self {
            Self::Seeded(rng) => rng.next_u32(),
            Self::Free(rng) => rng.next_u32(),
        }
    }

    fn next_u64(&mut self) -> u64 {
        match self {
            Self::Seeded(rng) => rng.next_u64(),
            Self::Free(rng) => rng.next_u64(),
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        match self {
            Self::Seeded(rng) => rng.fill_bytes(dest),
            Self::Free(rng) => rng.fill_bytes(dest),
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        match self {
            Self::Seeded(rng) => rng.try_fill_bytes(dest),
            Self::Free(rng) => rng.try_fill_bytes(dest),
        }
    }
}

/// Per-match source of generators, constructed once and injected.
#[derive(Debug, Clone)]
pub struct RngSuite {
    mode: DeterminismMode,
}

impl RngSuite {
    #[must_use]
    pub const fn new(mode: DeterminismMode) -> Self {
        Self { mode }
    }

    /// Whether all draws are seed-derived.
    #[must_use]
    pub const fn is_deterministic(&self) -> bool {
        self.mode.is_seeded()
    }

    /// Generator for the faces of one roll.
    #[must_use]
    pub fn dice_rng(&self, turn_cycle_id: u64, roll_index: u32) -> EngineRng {
        match self.mode {
            DeterminismMode::Seeded(base) => EngineRng::Seeded(ChaCha8Rng::seed_from_u64(
                derive_turn_seed(base, turn_cycle_id, roll_index),
            )),
            DeterminismMode::Free => EngineRng::Free(SmallRng::from_entropy()),
        }
    }

    /// Generator for one advisory/decision evaluation.
    #[must_use]
    pub fn decision_rng(
        &self,
        prefix: &str,
        turn_cycle_id: u64,
        decision_index: u32,
        player: PlayerId,
    ) -> EngineRng {
        match self.mode {
            DeterminismMode::Seeded(base) => {
                EngineRng::Seeded(ChaCha8Rng::seed_from_u64(derive_decision_seed(
                    base,
                    prefix,
                    turn_cycle_id,
                    decision_index,
                    player,
                )))
            }
            DeterminismMode::Free => EngineRng::Free(SmallRng::from_entropy()),
        }
    }

    /// The derived decision seed, when one exists, for advisory tagging.
    #[must_use]
    pub fn decision_seed(
        &self,
        prefix: &str,
        turn_cycle_id: u64,
        decision_index: u32,
        player: PlayerId,
    ) -> Option<u64> {
        match self.mode {
            DeterminismMode::Seeded(base) => Some(derive_decision_seed(
                base,
                prefix,
                turn_cycle_id,
                decision_index,
                player,
            )),
            DeterminismMode::Free => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_seed_is_order_sensitive() {
        let ab = combine_seed(7, &[SeedPart::Num(1), SeedPart::Num(2)]);
        let ba = combine_seed(7, &[SeedPart::Num(2), SeedPart::Num(1)]);
        assert_ne!(ab, ba);
    }

    #[test]
    fn combine_seed_hashes_text_stably() {
        let a = combine_seed(0, &[SeedPart::Text("yield"), SeedPart::Num(3)]);
        let b = combine_seed(0, &[SeedPart::Text("yield"), SeedPart::Num(3)]);
        assert_eq!(a, b);
        assert_ne!(a, combine_seed(0, &[SeedPart::Text("roll"), SeedPart::Num(3)]));
    }

    #[test]
    fn dice_and_decision_streams_are_domain_separated() {
        assert_ne!(
            derive_stream_seed(42, b"dice"),
            derive_stream_seed(42, b"decision"),
        );
    }

    #[test]
    fn seeded_suite_replays_bit_identically() {
        let suite_a = RngSuite::new(DeterminismMode::Seeded(0xFEED));
        let suite_b = RngSuite::new(DeterminismMode::Seeded(0xFEED));
        let mut rng_a = suite_a.dice_rng(4, 1);
        let mut rng_b = suite_b.dice_rng(4, 1);
        for _ in 0..32 {
            assert_eq!(rng_a.next_u64(), rng_b.next_u64());
        }
    }

    #[test]
    fn different_roll_index_diverges() {
        let suite = RngSuite::new(DeterminismMode::Seeded(0xFEED));
        let mut first = suite.dice_rng(4, 0);
        let mut second = suite.dice_rng(4, 1);
        assert_ne!(first.next_u64(), second.next_u64());
    }

    #[test]
    fn decision_seed_absent_in_free_mode() {
        let suite = RngSuite::new(DeterminismMode::Free);
        assert!(
            suite
                .decision_seed("yield", 1, 0, PlayerId(2))
                .is_none()
        );
    }
}
