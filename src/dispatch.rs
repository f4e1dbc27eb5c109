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

//! Nearest-available-worker dispatch.
//!
//! # Algorithm
//!
//! Within one critical section on the [`StateStore`]:
//!
//! 1. Take an availability permit, waiting per [`DispatchMode`].
//! 2. Pick the available worker closest to the pickup point; ties go to the
//!    lowest worker ID.
//! 3. Price the trip and mark the worker `Assigned`; a failure here returns
//!    the permit and leaves no trace.
//! 4. Resolve the requester by name and commit the trip as `Active`.
//!
//! The trip's [`TripCompletion`] is scheduled once the lock is released.

use crate::base::{Position, WorkerId};
use crate::clock::Clock;
use crate::completion::TripCompletion;
use crate::config::{DispatchMode, FleetConfig};
use crate::store::StateStore;
use crate::trip::{RideRequest, Trip, TripStatus};
use crate::worker::Worker;
use crate::DispatchError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Returns the available worker closest to `origin` and its distance.
///
/// Equidistant workers resolve to the lowest ID.
pub fn nearest_available(workers: &[Worker], origin: Position) -> Option<(WorkerId, f64)> {
    workers
        .iter()
        .filter(|worker| worker.is_available())
        .map(|worker| (worker.id, worker.position.distance_to(origin)))
        .min_by(|(a_id, a_distance), (b_id, b_distance)| {
            a_distance
                .total_cmp(b_distance)
                .then_with(|| a_id.cmp(b_id))
        })
}

pub struct Dispatcher {
    store: Arc<StateStore>,
    config: Arc<FleetConfig>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(store: Arc<StateStore>, config: Arc<FleetConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Assigns the nearest available worker to `request`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::InvalidRequest`] - request failed validation (no lock
    ///   taken), or its fare is not representable (the permit is returned).
    /// - [`DispatchError::NoCapacityAvailable`] - no fleet, wait timed out, or a
    ///   permit was held without a free worker (the permit is returned).
    pub fn assign(&self, request: &RideRequest, mode: DispatchMode) -> Result<Trip, DispatchError> {
        request.validate()?;

        let mut state = self.store.lock();
        let gate = self.store.gate();
        gate.acquire(&mut state, mode)?;

        let Some((worker_id, pickup_distance)) = nearest_available(&state.workers, request.origin)
        else {
            gate.release(&mut state);
            warn!("availability permit held but no worker is free; permit returned");
            return Err(DispatchError::NoCapacityAvailable);
        };

        let distance = request.trip_distance();
        let fare = match self.config.pricing.fare(distance, pickup_distance) {
            Ok(fare) => fare,
            Err(error) => {
                gate.release(&mut state);
                return Err(error);
            }
        };
        if let Err(error) = state.assign_worker(worker_id) {
            gate.release(&mut state);
            return Err(error);
        }
        let requester_id = self
            .store
            .resolve_requester(&mut state, &request.requester_name);
        let trip = Trip {
            id: self.store.next_trip_id(),
            requester_id,
            worker_id,
            origin: request.origin,
            destination: request.destination,
            distance,
            pickup_distance,
            fare,
            status: TripStatus::Active,
        };
        state.record_trip(trip.clone());
        state.assert_invariants();
        let epoch = state.epoch;
        drop(state);

        debug!(
            trip_id = %trip.id,
            worker_id = %worker_id,
            requester = %request.requester_name,
            pickup_distance,
            distance,
            fare = %trip.fare,
            "trip dispatched"
        );

        TripCompletion::new(Arc::clone(&self.store), self.config.split, epoch, trip.id)
            .schedule(self.clock.as_ref(), self.config.transit_time(distance));

        Ok(trip)
    }
}
