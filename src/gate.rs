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

//! Counting gate over the number of available workers.
//!
//! The permit count is a field of the locked [`FleetState`] rather than a
//! separate semaphore, and waiting happens on a [`Condvar`] bound to the same
//! mutex. Acquiring or releasing a permit is therefore always part of the
//! critical section that flips the corresponding worker's status.

use crate::DispatchError;
use crate::config::DispatchMode;
use crate::store::FleetState;
use parking_lot::{Condvar, MutexGuard};
use std::time::Instant;
use tracing::warn;

#[derive(Debug, Default)]
pub(crate) struct AvailabilityGate {
    freed: Condvar,
}

impl AvailabilityGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Takes one permit, waiting according to `mode` while none is free.
    ///
    /// The lock is released while waiting and held again on return. On
    /// timeout no permit has been consumed.
    pub(crate) fn acquire(
        &self,
        state: &mut MutexGuard<'_, FleetState>,
        mode: DispatchMode,
    ) -> Result<(), DispatchError> {
        if state.workers.is_empty() {
            // No fleet yet: nothing will ever release a permit.
            return Err(DispatchError::NoCapacityAvailable);
        }

        state.waiting += 1;
        let acquired = match mode {
            DispatchMode::Blocking => {
                while state.permits == 0 {
                    self.freed.wait(state);
                }
                true
            }
            DispatchMode::BoundedWait { timeout } => match Instant::now().checked_add(timeout) {
                Some(deadline) => {
                    while state.permits == 0 {
                        if self.freed.wait_until(state, deadline).timed_out() {
                            break;
                        }
                    }
                    state.permits > 0
                }
                // Timeout too large to represent: wait without one.
                None => {
                    while state.permits == 0 {
                        self.freed.wait(state);
                    }
                    true
                }
            },
        };
        state.waiting -= 1;

        if !acquired {
            warn!(?mode, "timed out waiting for an available worker");
            return Err(DispatchError::NoCapacityAvailable);
        }
        state.permits -= 1;
        Ok(())
    }

    /// Returns one permit and wakes one waiting dispatcher.
    pub(crate) fn release(&self, state: &mut FleetState) {
        state.permits += 1;
        self.freed.notify_one();
    }

    /// Sets the permit count for a freshly reset fleet and wakes every
    /// waiting dispatcher.
    pub(crate) fn reset(&self, state: &mut FleetState, permits: usize) {
        state.permits = permits;
        self.freed.notify_all();
    }
}
