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

//! Authoritative fleet state.
//!
//! The [`StateStore`] owns every worker, requester and trip together with the
//! availability permit count, all behind a single [`parking_lot::Mutex`].
//! Dispatch, trip completion, rating and snapshot reads each run as one
//! critical section on that mutex.
//!
//! # Invariants
//!
//! Checked in debug builds at the end of every mutating critical section:
//!
//! - A worker is `Available` iff no `Active` trip references it.
//! - `available workers + active trips == fleet size`.
//! - The permit count equals the number of `Available` workers.

use crate::DispatchError;
use crate::base::{IdSequence, RequesterId, TripId, WorkerId};
use crate::gate::AvailabilityGate;
use crate::placement::Placement;
use crate::pricing::RevenueSplit;
use crate::trip::{Requester, Trip, TripStatus};
use crate::worker::{Rating, Worker};
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// Point-in-time counts derived from the fleet state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FleetMetrics {
    pub total_workers: usize,
    pub available_workers: usize,
    pub assigned_workers: usize,
    pub active_trips: usize,
    pub finished_trips: usize,
    pub total_requesters: usize,
    /// Dispatch calls currently blocked on the availability gate.
    pub waiting_requests: usize,
}

/// A consistent copy of the fleet state, taken under the store lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetSnapshot {
    /// Incremented by every fleet reset.
    pub epoch: u64,
    pub workers: Vec<Worker>,
    pub requesters: Vec<Requester>,
    pub trips: Vec<Trip>,
    pub metrics: FleetMetrics,
}

impl FleetSnapshot {
    pub fn worker(&self, id: WorkerId) -> Option<&Worker> {
        self.workers.iter().find(|worker| worker.id == id)
    }

    pub fn trip(&self, id: TripId) -> Option<&Trip> {
        self.trips.iter().find(|trip| trip.id == id)
    }
}

#[derive(Debug)]
pub(crate) struct FleetState {
    pub(crate) epoch: u64,
    /// Indexed by `WorkerId - 1`.
    pub(crate) workers: Vec<Worker>,
    pub(crate) requesters: Vec<Requester>,
    requester_index: HashMap<String, RequesterId>,
    pub(crate) trips: BTreeMap<TripId, Trip>,
    pub(crate) active_trips: usize,
    /// Availability permits, owned by the gate.
    pub(crate) permits: usize,
    /// Dispatchers blocked in the gate.
    pub(crate) waiting: usize,
}

impl FleetState {
    pub(crate) fn new() -> Self {
        Self {
            epoch: 0,
            workers: Vec::new(),
            requesters: Vec::new(),
            requester_index: HashMap::new(),
            trips: BTreeMap::new(),
            active_trips: 0,
            permits: 0,
            waiting: 0,
        }
    }

    pub(crate) fn assert_invariants(&self) {
        if !cfg!(debug_assertions) {
            return;
        }
        let available = self.workers.iter().filter(|w| w.is_available()).count();
        let active = self.trips.values().filter(|t| t.is_active()).count();
        debug_assert_eq!(
            self.permits, available,
            "Invariant violated: {} permits for {} available workers",
            self.permits, available
        );
        debug_assert_eq!(
            self.active_trips, active,
            "Invariant violated: active trip counter {} but {} active trips",
            self.active_trips, active
        );
        debug_assert_eq!(
            available + active,
            self.workers.len(),
            "Invariant violated: {} available + {} active != fleet of {}",
            available,
            active,
            self.workers.len()
        );
    }

    fn find_worker(workers: &mut [Worker], id: WorkerId) -> Option<&mut Worker> {
        let index = (id.0 as usize).checked_sub(1)?;
        workers.get_mut(index).filter(|worker| worker.id == id)
    }

    pub(crate) fn worker_mut(&mut self, id: WorkerId) -> Option<&mut Worker> {
        Self::find_worker(&mut self.workers, id)
    }

    /// Marks `worker_id` assigned ahead of [`FleetState::record_trip`].
    pub(crate) fn assign_worker(&mut self, worker_id: WorkerId) -> Result<(), DispatchError> {
        let worker =
            Self::find_worker(&mut self.workers, worker_id).ok_or(DispatchError::UnknownEntity)?;
        worker.assign();
        Ok(())
    }

    /// Records a new active trip whose worker is already assigned.
    pub(crate) fn record_trip(&mut self, trip: Trip) {
        self.trips.insert(trip.id, trip);
        self.active_trips += 1;
    }

    /// Finishes an active trip of the current epoch: the worker moves to the
    /// destination, becomes available and is credited its share of the fare.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownEntity`] if the epoch is stale or the trip or
    /// its worker is missing or already finished. Nothing is modified then.
    pub(crate) fn finish_trip(
        &mut self,
        epoch: u64,
        trip_id: TripId,
        split: &RevenueSplit,
    ) -> Result<Trip, DispatchError> {
        if epoch != self.epoch {
            return Err(DispatchError::UnknownEntity);
        }
        let trip = self
            .trips
            .get_mut(&trip_id)
            .filter(|trip| trip.is_active())
            .ok_or(DispatchError::UnknownEntity)?;
        let worker =
            Self::find_worker(&mut self.workers, trip.worker_id).ok_or(DispatchError::UnknownEntity)?;

        trip.finish();
        worker.finish_trip(trip.destination, split.driver_cut(trip.fare));
        self.active_trips -= 1;
        Ok(trip.clone())
    }

    pub(crate) fn metrics(&self) -> FleetMetrics {
        let available_workers = self.workers.iter().filter(|w| w.is_available()).count();
        FleetMetrics {
            total_workers: self.workers.len(),
            available_workers,
            assigned_workers: self.workers.len() - available_workers,
            active_trips: self.active_trips,
            finished_trips: self
                .trips
                .values()
                .filter(|trip| trip.status == TripStatus::Finished)
                .count(),
            total_requesters: self.requesters.len(),
            waiting_requests: self.waiting,
        }
    }

    fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot {
            epoch: self.epoch,
            workers: self.workers.clone(),
            requesters: self.requesters.clone(),
            trips: self.trips.values().cloned().collect(),
            metrics: self.metrics(),
        }
    }
}

/// Lock-guarded owner of workers, requesters and trips.
#[derive(Debug)]
pub struct StateStore {
    state: Mutex<FleetState>,
    gate: AvailabilityGate,
    /// Signalled when the last active trip finishes.
    idle: Condvar,
    worker_ids: IdSequence,
    requester_ids: IdSequence,
    trip_ids: IdSequence,
}

impl StateStore {
    /// Creates a store with no fleet.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FleetState::new()),
            gate: AvailabilityGate::new(),
            idle: Condvar::new(),
            worker_ids: IdSequence::default(),
            requester_ids: IdSequence::default(),
            trip_ids: IdSequence::default(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, FleetState> {
        self.state.lock()
    }

    pub(crate) fn gate(&self) -> &AvailabilityGate {
        &self.gate
    }

    /// Discards all workers, requesters and trips and seeds `size` available
    /// workers positioned by `placement`.
    ///
    /// In-flight trip completions of the previous epoch become no-ops.
    pub fn reset(&self, size: NonZeroUsize, placement: &mut dyn Placement) -> FleetSnapshot {
        let mut state = self.state.lock();

        self.worker_ids.reset();
        self.requester_ids.reset();
        self.trip_ids.reset();

        state.epoch += 1;
        state.requesters.clear();
        state.requester_index.clear();
        state.trips.clear();
        state.active_trips = 0;
        state.workers = (0..size.get())
            .map(|_| {
                let id = WorkerId(self.worker_ids.next());
                Worker::new(id, placement.place(id))
            })
            .collect();
        self.gate.reset(&mut state, size.get());
        self.idle.notify_all();

        state.assert_invariants();
        state.snapshot()
    }

    /// Returns a consistent copy of the whole fleet state.
    pub fn snapshot(&self) -> FleetSnapshot {
        self.state.lock().snapshot()
    }

    pub fn metrics(&self) -> FleetMetrics {
        self.state.lock().metrics()
    }

    /// Returns the requester registered under `name`, creating it on first use.
    pub(crate) fn resolve_requester(&self, state: &mut FleetState, name: &str) -> RequesterId {
        if let Some(id) = state.requester_index.get(name) {
            return *id;
        }
        let id = RequesterId(self.requester_ids.next());
        state.requesters.push(Requester {
            id,
            name: name.to_string(),
        });
        state.requester_index.insert(name.to_string(), id);
        id
    }

    pub(crate) fn next_trip_id(&self) -> TripId {
        TripId(self.trip_ids.next())
    }

    /// Wakes [`StateStore::wait_until_idle`] callers once no trip is active.
    pub(crate) fn notify_if_idle(&self, state: &FleetState) {
        if state.active_trips == 0 {
            self.idle.notify_all();
        }
    }

    /// Adds a rating to a worker's aggregate.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::InvalidRating`] - score outside 1..=5 (checked before locking).
    /// - [`DispatchError::UnknownEntity`] - no such worker in the current fleet.
    pub fn record_rating(&self, worker_id: WorkerId, score: u8) -> Result<(), DispatchError> {
        Rating::validate(score)?;

        let mut state = self.state.lock();
        let worker = state
            .worker_mut(worker_id)
            .ok_or(DispatchError::UnknownEntity)?;
        worker.rate(score)
    }

    /// Blocks until no trip is active or `timeout` elapses. Returns whether
    /// the fleet is idle.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            while state.active_trips > 0 {
                self.idle.wait(&mut state);
            }
            return true;
        };
        while state.active_trips > 0 {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return state.active_trips == 0;
            }
        }
        true
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
