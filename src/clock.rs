// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Timers for simulated transit.
//!
//! [`SystemClock`] runs every scheduled task on its own thread after sleeping
//! for the requested delay. [`ManualClock`] is a virtual clock: tasks only run
//! when the clock is advanced past their due time, on the advancing thread.

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::thread;
use std::time::Duration;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Schedules tasks to run after a delay.
pub trait Clock: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task);
}

/// Wall-clock timer backed by one sleeping thread per task.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn schedule(&self, delay: Duration, task: Task) {
        thread::spawn(move || {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            task();
        });
    }
}

struct Scheduled {
    due: Duration,
    seq: u64,
    task: Task,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by due time,
        // with scheduling order breaking ties.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    pending: BinaryHeap<Scheduled>,
}

/// Virtual clock for deterministic tests.
#[derive(Default)]
pub struct ManualClock {
    inner: Mutex<ManualState>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since construction.
    pub fn now(&self) -> Duration {
        self.inner.lock().now
    }

    /// Number of tasks waiting for their due time.
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Moves virtual time forward by `by`, running every task that falls due
    /// in order. Returns the number of tasks run.
    ///
    /// Tasks run on the calling thread with the clock unlocked, so they may
    /// schedule further tasks.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.inner.lock().now.saturating_add(by);
        let mut ran = 0;
        loop {
            let task = {
                let mut state = self.inner.lock();
                let due_now = state.pending.peek().is_some_and(|next| next.due <= target);
                if !due_now {
                    state.now = state.now.max(target);
                    break;
                }
                let Some(next) = state.pending.pop() else {
                    break;
                };
                state.now = next.due;
                next.task
            };
            task();
            ran += 1;
        }
        ran
    }

    /// Advances until no task is pending. Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let step = {
                let state = self.inner.lock();
                match state.pending.peek() {
                    Some(next) => next.due.saturating_sub(state.now),
                    None => break,
                }
            };
            ran += self.advance(step);
        }
        ran
    }
}

impl Clock for ManualClock {
    fn schedule(&self, delay: Duration, task: Task) {
        let mut state = self.inner.lock();
        let due = state.now.saturating_add(delay);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push(Scheduled { due, seq, task });
    }
}

impl std::fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("ManualClock")
            .field("now", &state.now)
            .field("pending", &state.pending.len())
            .finish()
    }
}
