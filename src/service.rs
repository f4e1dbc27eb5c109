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

//! Dispatch service.
//!
//! The [`DispatchService`] is the entry point for embedding the engine. It
//! wires the state store, fleet controller, dispatcher and financial
//! aggregator together and exposes the operations a transport layer needs.
//!
//! # Operations
//!
//! | Operation | Result |
//! |-----------|--------|
//! | [`initialize_fleet`](DispatchService::initialize_fleet) | Fresh fleet snapshot |
//! | [`submit_request`](DispatchService::submit_request) | The dispatched trip |
//! | [`query_status`](DispatchService::query_status) | Consistent fleet snapshot |
//! | [`query_financials`](DispatchService::query_financials) | Revenue totals and per-worker earnings |
//! | [`record_rating`](DispatchService::record_rating) | `()` |
//!
//! # Thread Safety
//!
//! Every operation takes `&self`; share the service across threads with an
//! [`Arc`]. Submissions block according to their [`DispatchMode`].

use crate::DispatchError;
use crate::base::{Position, WorkerId};
use crate::clock::{Clock, SystemClock};
use crate::config::{DispatchMode, DispatchStrategy, FleetConfig};
use crate::controller::FleetController;
use crate::dispatch::Dispatcher;
use crate::finance::{FinancialAggregator, FinancialSummary};
use crate::placement::{Placement, RandomPlacement};
use crate::queue::RequestQueue;
use crate::store::{FleetSnapshot, StateStore};
use crate::trip::{RideRequest, Trip};
use std::sync::Arc;
use std::time::Duration;

pub struct DispatchService {
    config: Arc<FleetConfig>,
    store: Arc<StateStore>,
    controller: FleetController,
    dispatcher: Arc<Dispatcher>,
    /// Present only with [`DispatchStrategy::Queued`].
    queue: Option<RequestQueue>,
    aggregator: FinancialAggregator,
}

impl DispatchService {
    /// Creates a service with the default configuration, wall-clock transit
    /// times and random placement. No fleet exists until
    /// [`initialize_fleet`](Self::initialize_fleet) is called.
    pub fn new() -> Self {
        let config = FleetConfig::default();
        let placement = RandomPlacement::from_entropy(config.map_extent);
        Self::assemble(config, Arc::new(SystemClock), Box::new(placement))
    }

    /// Creates a service from explicit collaborators.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidConfiguration`] if `config` fails validation.
    pub fn with_parts(
        config: FleetConfig,
        clock: Arc<dyn Clock>,
        placement: Box<dyn Placement>,
    ) -> Result<Self, DispatchError> {
        config.validate()?;
        Ok(Self::assemble(config, clock, placement))
    }

    fn assemble(config: FleetConfig, clock: Arc<dyn Clock>, placement: Box<dyn Placement>) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(StateStore::new());
        let controller = FleetController::new(Arc::clone(&store), placement);
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&store),
            Arc::clone(&config),
            clock,
        ));
        let queue = match config.strategy {
            DispatchStrategy::Direct => None,
            DispatchStrategy::Queued => Some(RequestQueue::spawn(Arc::clone(&dispatcher))),
        };
        let aggregator = FinancialAggregator::new(config.split, config.revenue_recognition);

        Self {
            config,
            store,
            controller,
            dispatcher,
            queue,
            aggregator,
        }
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Discards the current fleet and creates `size` available workers.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidConfiguration`] for a non-positive or oversized
    /// fleet. Existing state is kept in that case.
    pub fn initialize_fleet(&self, size: i64) -> Result<FleetSnapshot, DispatchError> {
        self.controller.initialize(size)
    }

    /// Dispatches a ride using the configured default [`DispatchMode`].
    pub fn submit_request(
        &self,
        requester_name: &str,
        origin: Position,
        destination: Position,
    ) -> Result<Trip, DispatchError> {
        self.submit_request_with_mode(requester_name, origin, destination, self.config.dispatch_mode)
    }

    /// Dispatches a ride to the nearest available worker.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::InvalidRequest`] - empty name or unusable coordinates.
    /// - [`DispatchError::NoCapacityAvailable`] - no fleet, or no worker freed
    ///   up within the bounded wait.
    pub fn submit_request_with_mode(
        &self,
        requester_name: &str,
        origin: Position,
        destination: Position,
        mode: DispatchMode,
    ) -> Result<Trip, DispatchError> {
        let request = RideRequest::new(requester_name, origin, destination);
        match &self.queue {
            Some(queue) => queue.submit(request, mode),
            None => self.dispatcher.assign(&request, mode),
        }
    }

    pub fn query_status(&self) -> FleetSnapshot {
        self.store.snapshot()
    }

    /// Revenue totals computed from one consistent snapshot.
    pub fn query_financials(&self) -> FinancialSummary {
        self.aggregator.summarize(&self.store.snapshot())
    }

    /// Adds a 1..=5 rating to a worker.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::InvalidRating`] - score out of range.
    /// - [`DispatchError::UnknownEntity`] - no such worker.
    pub fn record_rating(&self, worker_id: WorkerId, score: u8) -> Result<(), DispatchError> {
        self.store.record_rating(worker_id, score)
    }

    /// Blocks until no trip is active or `timeout` elapses. Returns whether
    /// the fleet drained.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.store.wait_until_idle(timeout)
    }
}

impl Default for DispatchService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::placement::FixedPlacement;
    use crate::pricing::RevenueSplit;
    use rust_decimal_macros::dec;

    fn service(config: FleetConfig) -> (DispatchService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let placement = FixedPlacement::new([(0.0, 0.0), (4.0, 0.0)]);
        let service = DispatchService::with_parts(config, clock.clone(), Box::new(placement)).unwrap();
        (service, clock)
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = FleetConfig {
            split: RevenueSplit {
                driver_share: dec!(0.0),
                company_share: dec!(1.0),
            },
            ..FleetConfig::default()
        };
        let result = DispatchService::with_parts(
            config,
            Arc::new(ManualClock::new()),
            Box::new(FixedPlacement::default()),
        );
        assert!(matches!(result, Err(DispatchError::InvalidConfiguration(_))));
    }

    #[test]
    fn submit_before_initialize_fails() {
        let (service, _clock) = service(FleetConfig::default());
        assert_eq!(
            service.submit_request("Ana", Position::new(0.0, 0.0), Position::new(1.0, 0.0)),
            Err(DispatchError::NoCapacityAvailable)
        );
    }

    #[test]
    fn queued_strategy_dispatches_through_queue() {
        let config = FleetConfig {
            strategy: DispatchStrategy::Queued,
            ..FleetConfig::default()
        };
        let (service, clock) = service(config);
        assert_eq!(service.config().strategy, DispatchStrategy::Queued);
        service.initialize_fleet(2).unwrap();

        let trip = service
            .submit_request("Ana", Position::new(3.0, 0.0), Position::new(3.0, 2.0))
            .unwrap();
        assert_eq!(trip.worker_id, WorkerId(2));
        assert_eq!(trip.fare, dec!(4.00));

        clock.run_until_idle();
        assert!(service.wait_until_idle(Duration::ZERO));
        let summary = service.query_financials();
        assert_eq!(summary.total_fares, dec!(4.00));
        assert_eq!(summary.per_worker[1].earnings, dec!(3.20));
    }

    #[test]
    fn default_mode_comes_from_config() {
        let config = FleetConfig {
            dispatch_mode: DispatchMode::FAIL_FAST,
            ..FleetConfig::default()
        };
        let (service, _clock) = service(config);
        service.initialize_fleet(1).unwrap();

        service
            .submit_request("Ana", Position::new(0.0, 0.0), Position::new(1.0, 0.0))
            .unwrap();
        assert_eq!(
            service.submit_request("Bruno", Position::new(0.0, 0.0), Position::new(1.0, 0.0)),
            Err(DispatchError::NoCapacityAvailable)
        );
    }
}
