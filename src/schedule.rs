//! Epoch-keyed cooperative task scheduler.
//!
//! The engine is single-threaded: pacing delays, kickoff retries, and
//! watchdogs are tasks on a virtual clock rather than OS timers. Every task
//! carries the turn epoch it was scheduled in; when the scheduler drains, a
//! task whose epoch no longer matches the live epoch is dropped, making
//! stale continuations provably inert instead of relying on re-checks
//! scattered across callbacks.

use serde::{Deserialize, Serialize};

use crate::phase::PhaseTrigger;
use crate::player::PlayerId;

/// Work item kinds the orchestrator schedules for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Attempt to kick off an autonomous turn; retries carry the attempt
    /// number.
    CpuKickoff { attempt: u8 },
    /// Watchdog that forces an autonomous turn to start.
    CpuKickoffWatchdog,
    /// Continue the autonomous roll/keep/reroll loop after a pacing delay.
    CpuRollStep,
    /// Close the buy window for the active player.
    BuyWindowClose,
    /// Re-check the effect queue gate while in the buy-wait phase.
    BuyWaitPoll,
    /// Re-request a transition that a minimum dwell deferred.
    PhaseRetry { trigger: PhaseTrigger },
}

/// Identifier for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledTask {
    id: TaskId,
    epoch: u64,
    due_ms: u64,
    kind: TaskKind,
    actor: PlayerId,
}

/// A task that became due and survived the epoch check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTask {
    pub id: TaskId,
    pub kind: TaskKind,
    pub actor: PlayerId,
}

/// A task dropped because its epoch went stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleTask {
    pub id: TaskId,
    pub kind: TaskKind,
    pub epoch: u64,
}

/// Virtual-clock scheduler. Time only moves when the driver advances it.
#[derive(Debug, Clone, Default)]
pub struct TaskScheduler {
    now_ms: u64,
    next_id: u64,
    queue: Vec<ScheduledTask>,
}

impl TaskScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Schedule a task `delay_ms` from now, bound to `epoch` and `actor`.
    pub fn schedule(&mut self, epoch: u64, delay_ms: u64, kind: TaskKind, actor: PlayerId) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.queue.push(ScheduledTask {
            id,
            epoch,
            due_ms: self.now_ms.saturating_add(delay_ms),
            kind,
            actor,
        });
        log::debug!("scheduled {kind:?} for epoch {epoch} at +{delay_ms}ms");
        id
    }

    /// Cancel a specific task. Returns true when it was still queued.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|task| task.id != id);
        self.queue.len() != before
    }

    /// Drop every queued task belonging to an earlier epoch.
    pub fn cancel_stale(&mut self, current_epoch: u64) -> Vec<StaleTask> {
        let mut dropped = Vec::new();
        self.queue.retain(|task| {
            if task.epoch == current_epoch {
                true
            } else {
                dropped.push(StaleTask {
                    id: task.id,
                    kind: task.kind,
                    epoch: task.epoch,
                });
                false
            }
        });
        dropped
    }

    /// Earliest due time among queued tasks.
    #[must_use]
    pub fn next_due_ms(&self) -> Option<u64> {
        self.queue.iter().map(|task| task.due_ms).min()
    }

    /// Advance the clock to `at_ms` and pull everything that became due.
    /// Tasks from stale epochs are dropped and reported separately; they
    /// never fire.
    pub fn advance_to(&mut self, at_ms: u64, current_epoch: u64) -> (Vec<DueTask>, Vec<StaleTask>) {
        self.now_ms = self.now_ms.max(at_ms);
        let now = self.now_ms;
        let mut due = Vec::new();
        let mut stale = Vec::new();
        self.queue.retain(|task| {
            if task.due_ms > now {
                return true;
            }
            if task.epoch == current_epoch {
                due.push(DueTask {
                    id: task.id,
                    kind: task.kind,
                    actor: task.actor,
                });
            } else {
                stale.push(StaleTask {
                    id: task.id,
                    kind: task.kind,
                    epoch: task.epoch,
                });
            }
            false
        });
        due.sort_by_key(|task| task.id.0);
        (due, stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTOR: PlayerId = PlayerId(0);

    #[test]
    fn tasks_fire_in_schedule_order_at_due_time() {
        let mut scheduler = TaskScheduler::new();
        scheduler.schedule(1, 100, TaskKind::CpuKickoff { attempt: 0 }, ACTOR);
        scheduler.schedule(1, 50, TaskKind::BuyWindowClose, ACTOR);

        let (due, stale) = scheduler.advance_to(49, 1);
        assert!(due.is_empty() && stale.is_empty());

        let (due, _) = scheduler.advance_to(100, 1);
        assert_eq!(due.len(), 2);
        assert!(scheduler.pending() == 0);
    }

    #[test]
    fn stale_epoch_tasks_never_fire() {
        let mut scheduler = TaskScheduler::new();
        scheduler.schedule(1, 10, TaskKind::CpuRollStep, ACTOR);
        let (due, stale) = scheduler.advance_to(10, 2);
        assert!(due.is_empty());
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].epoch, 1);
    }

    #[test]
    fn cancel_removes_queued_task() {
        let mut scheduler = TaskScheduler::new();
        let id = scheduler.schedule(1, 10, TaskKind::CpuKickoffWatchdog, ACTOR);
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        let (due, _) = scheduler.advance_to(10, 1);
        assert!(due.is_empty());
    }

    #[test]
    fn cancel_stale_sweeps_earlier_epochs() {
        let mut scheduler = TaskScheduler::new();
        scheduler.schedule(1, 500, TaskKind::CpuKickoffWatchdog, ACTOR);
        scheduler.schedule(2, 500, TaskKind::CpuRollStep, ACTOR);
        let dropped = scheduler.cancel_stale(2);
        assert_eq!(dropped.len(), 1);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn clock_never_runs_backwards() {
        let mut scheduler = TaskScheduler::new();
        scheduler.advance_to(100, 0);
        scheduler.advance_to(50, 0);
        assert_eq!(scheduler.now_ms(), 100);
    }
}
