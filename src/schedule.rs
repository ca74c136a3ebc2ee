//! Deferred tasks on a caller-driven clock.
//!
//! Nothing here reads the wall clock: time only moves when the owner calls
//! [`TimerQueue::set_now`] or [`TimerQueue::advance_to`], so the same queue
//! runs under a real event loop and under a simulated clock in tests.

use anyhow::Result;
use std::collections::BTreeMap;

pub type Task = Box<dyn FnOnce() -> Result<()>>;

#[derive(Default)]
pub struct TimerQueue {
    now_ms: u64,
    seq: u64,
    // (due, insertion order) keeps same-deadline tasks FIFO
    tasks: BTreeMap<(u64, u64), Task>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Move the clock forward without running anything. Never goes backwards.
    pub fn set_now(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    /// Run `task` once the clock reaches `now + delay_ms`.
    pub fn schedule(&mut self, delay_ms: u64, task: Task) {
        let due = self.now_ms.saturating_add(delay_ms);
        self.tasks.insert((due, self.seq), task);
        self.seq += 1;
    }

    /// Advance the clock and run every task that became due, in deadline
    /// order. Returns how many ran. A failing task stops the run; tasks after
    /// it stay queued.
    pub fn advance_to(&mut self, now_ms: u64) -> Result<usize> {
        self.set_now(now_ms);
        let mut ran = 0;
        while let Some(entry) = self.tasks.first_entry() {
            if entry.key().0 > self.now_ms {
                break;
            }
            let task = entry.remove();
            task()?;
            ran += 1;
        }
        Ok(ran)
    }
}
