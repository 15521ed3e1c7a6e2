//! Named ruleset and pacing constants.
//!
//! Rule numbers live here rather than inline so a variant ruleset can adjust
//! them without touching engine code.

/// Dice rolled per player each turn.
pub const DICE_PER_PLAYER: usize = 6;

/// Reroll credits granted at the start of each roll sequence.
pub const REROLLS_PER_TURN: u8 = 2;

/// Starting and maximum health for a monster.
pub const MAX_HEALTH: i32 = 10;

/// Victory points required to win outright.
pub const VICTORY_POINT_GOAL: u32 = 20;

/// Victory points awarded for entering an empty zone slot.
pub const ZONE_ENTRY_BONUS_VP: u32 = 1;

/// Victory points awarded for holding the primary slot at turn start.
pub const ZONE_HOLD_BONUS_VP: u32 = 2;

/// Minimum total player count before the secondary zone slot opens.
pub const SECONDARY_SLOT_MIN_PLAYERS: usize = 5;

/// Minimum attack faces before an attack resolves.
pub const ATTACK_FACE_THRESHOLD: usize = 1;

/// Bounded attempts for the start-game command before the forced fallback.
pub const START_GAME_MAX_ATTEMPTS: u8 = 3;

/// CPU kickoff retry attempts before the watchdog takes over.
pub const CPU_KICKOFF_MAX_RETRIES: u8 = 3;

/// Delay between CPU kickoff retries, in virtual milliseconds.
pub const CPU_KICKOFF_RETRY_MS: u64 = 50;

/// Watchdog bound forcing a CPU turn to start, in virtual milliseconds.
pub const CPU_KICKOFF_WATCHDOG_MS: u64 = 1_000;

/// Pacing delay per CPU roll at slow speed, in virtual milliseconds.
pub const CPU_ROLL_DELAY_SLOW_MS: u64 = 1_200;

/// Pacing delay per CPU roll at normal speed, in virtual milliseconds.
pub const CPU_ROLL_DELAY_NORMAL_MS: u64 = 600;

/// Pacing delay per CPU roll at fast speed, in virtual milliseconds.
pub const CPU_ROLL_DELAY_FAST_MS: u64 = 150;

/// Delay before the buy window closes on its own, in virtual milliseconds.
pub const BUY_WINDOW_MS: u64 = 400;

/// Polling interval while waiting on the effect queue, in virtual milliseconds.
pub const BUY_WAIT_POLL_MS: u64 = 100;
