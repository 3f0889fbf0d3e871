//! Delayed task execution for the batcher's debounce window.
//!
//! The batcher never touches a global timer. It is handed a [`Scheduler`]:
//! [`TokioScheduler`] in production, [`ManualScheduler`] wherever time needs
//! to be driven by hand (tests, simulations).

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Work queued to run once its delay elapses.
pub type ScheduledTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub trait Scheduler: Send + Sync {
    /// Run `task` after `delay`. A zero delay runs it on the next available turn.
    ///
    /// Scheduled tasks are never cancelled.
    fn schedule(&self, delay: Duration, task: ScheduledTask);
}

/// Spawns each task on the current tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) {
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task.await;
        });
    }
}

struct PendingTask {
    due: Duration,
    seq: u64,
    task: ScheduledTask,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_seq: u64,
    pending: Vec<PendingTask>,
}

/// Virtual-clock scheduler. Nothing runs until [`ManualScheduler::advance`].
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<ManualClock>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since creation.
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }

    /// Number of tasks waiting for their deadline.
    pub fn pending(&self) -> usize {
        self.clock.lock().pending.len()
    }

    /// Move the clock forward and run every task now due, earliest first.
    ///
    /// Tasks scheduled by a running task are picked up if they fall due
    /// within the same advance.
    pub async fn advance(&self, by: Duration) {
        let target = {
            let mut clock = self.clock.lock();
            clock.now += by;
            clock.now
        };

        while let Some(next) = self.take_next_due(target) {
            next.task.await;
        }
    }

    fn take_next_due(&self, target: Duration) -> Option<PendingTask> {
        let mut clock = self.clock.lock();
        let idx = clock
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= target)
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(idx, _)| idx)?;
        Some(clock.pending.swap_remove(idx))
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) {
        let mut clock = self.clock.lock();
        let seq = clock.next_seq;
        clock.next_seq += 1;
        let due = clock.now + delay;
        clock.pending.push(PendingTask { due, seq, task });
    }
}
