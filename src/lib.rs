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

//! # Taxi Dispatch
//!
//! This library provides a concurrent dispatch engine that matches ride
//! requests to the nearest free worker of a fixed fleet, simulates each trip's
//! transit and keeps revenue accounts for the operator and the drivers.
//!
//! ## Core Components
//!
//! - [`DispatchService`]: Entry point wiring all components together
//! - [`StateStore`]: Lock-guarded owner of workers, requesters and trips
//! - [`Dispatcher`]: Nearest-available-worker matching
//! - [`TripCompletion`]: Deferred trip finalization on a [`Clock`]
//! - [`FinancialAggregator`]: Revenue totals and per-worker earnings
//! - [`DispatchError`]: Error types for dispatch failures
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use taxi_dispatch::{
//!     DispatchService, FixedPlacement, FleetConfig, ManualClock, Position, WorkerId,
//! };
//! use rust_decimal_macros::dec;
//!
//! let clock = Arc::new(ManualClock::new());
//! let service = DispatchService::with_parts(
//!     FleetConfig::default(),
//!     clock.clone(),
//!     Box::new(FixedPlacement::new([(0.0, 0.0)])),
//! )
//! .unwrap();
//! service.initialize_fleet(1).unwrap();
//!
//! // Dispatch a ride
//! let trip = service
//!     .submit_request("Ana", Position::new(0.0, 0.0), Position::new(3.0, 4.0))
//!     .unwrap();
//! assert_eq!(trip.worker_id, WorkerId(1));
//! assert_eq!(trip.fare, dec!(10.00));
//!
//! // Let the trip finish
//! clock.run_until_idle();
//! let status = service.query_status();
//! assert_eq!(status.workers[0].position, Position::new(3.0, 4.0));
//! assert_eq!(status.workers[0].total_earnings, dec!(8.00));
//! ```
//!
//! ## Thread Safety
//!
//! All fleet state lives behind one mutex. The count of available workers is
//! kept in that same state, so a dispatcher waiting for a free worker and a
//! trip completion releasing one always observe a consistent fleet.

mod base;
pub mod clock;
pub mod completion;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod finance;
mod gate;
pub mod placement;
pub mod pricing;
mod queue;
mod service;
pub mod store;
mod trip;
pub mod worker;

pub use base::{Position, RequesterId, TripId, WorkerId};
pub use clock::{Clock, ManualClock, SystemClock, Task};
pub use completion::TripCompletion;
pub use config::{DispatchMode, DispatchStrategy, FleetConfig, RevenueRecognition};
pub use controller::{FleetController, MAX_FLEET_SIZE};
pub use dispatch::{Dispatcher, nearest_available};
pub use error::DispatchError;
pub use finance::{FinancialAggregator, FinancialSummary, WorkerEarnings};
pub use placement::{FixedPlacement, Placement, RandomPlacement};
pub use pricing::{PricingPolicy, RevenueSplit};
pub use queue::RequestQueue;
pub use service::DispatchService;
pub use store::{FleetMetrics, FleetSnapshot, StateStore};
pub use trip::{Requester, RideRequest, Trip, TripStatus};
pub use worker::{Rating, Worker, WorkerStatus};
