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

//! Asynchronous trip finalization.
//!
//! One [`TripCompletion`] is scheduled on the [`Clock`] for every trip the
//! dispatcher creates. When it fires it finishes the trip, frees the worker at
//! the drop-off point and returns one availability permit, all in a single
//! critical section. The permit is never visible before the worker's new
//! position and earnings.

use crate::base::TripId;
use crate::clock::Clock;
use crate::pricing::RevenueSplit;
use crate::store::StateStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct TripCompletion {
    store: Arc<StateStore>,
    split: RevenueSplit,
    epoch: u64,
    trip_id: TripId,
}

impl TripCompletion {
    pub(crate) fn new(store: Arc<StateStore>, split: RevenueSplit, epoch: u64, trip_id: TripId) -> Self {
        Self {
            store,
            split,
            epoch,
            trip_id,
        }
    }

    pub(crate) fn schedule(self, clock: &dyn Clock, transit: Duration) {
        clock.schedule(transit, Box::new(move || {
            self.run();
        }));
    }

    /// Finalizes the trip. Returns `false` without touching any state when the
    /// trip no longer exists, e.g. because the fleet was reset meanwhile.
    pub fn run(self) -> bool {
        let mut state = self.store.lock();
        let trip = match state.finish_trip(self.epoch, self.trip_id, &self.split) {
            Ok(trip) => trip,
            Err(_) => {
                debug!(trip_id = %self.trip_id, epoch = self.epoch, "completion for unknown trip ignored");
                return false;
            }
        };
        self.store.gate().release(&mut state);
        state.assert_invariants();
        self.store.notify_if_idle(&state);
        drop(state);

        debug!(
            trip_id = %trip.id,
            worker_id = %trip.worker_id,
            fare = %trip.fare,
            "trip finished"
        );
        true
    }
}
