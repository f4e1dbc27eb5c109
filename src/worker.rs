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

//! Worker (taxi) records.
//!
//! Implemented State Machine
//!
//! ```text
//!  Available ──dispatch──► Assigned ──trip completion──► Available
//! ```
//!
//! Workers are only created and removed by a fleet reset.
//!
//! # Example
//!
//! ```
//! use taxi_dispatch::{Position, Worker, WorkerId, WorkerStatus};
//! use rust_decimal::Decimal;
//!
//! let worker = Worker::new(WorkerId(1), Position::new(2.0, 3.0));
//! assert_eq!(worker.status, WorkerStatus::Available);
//! assert_eq!(worker.total_earnings, Decimal::ZERO);
//! assert_eq!(worker.rating.mean(), None);
//! ```

use crate::DispatchError;
use crate::base::{Position, WorkerId};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Available,
    Assigned,
}

/// Running rating aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rating {
    sum: u32,
    count: u32,
}

impl Rating {
    pub const MIN_SCORE: u8 = 1;
    pub const MAX_SCORE: u8 = 5;

    pub fn validate(score: u8) -> Result<(), DispatchError> {
        if (Self::MIN_SCORE..=Self::MAX_SCORE).contains(&score) {
            Ok(())
        } else {
            Err(DispatchError::InvalidRating(score))
        }
    }

    fn record(&mut self, score: u8) {
        self.sum += u32::from(score);
        self.count += 1;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Mean score, or `None` when no rating has been recorded.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| f64::from(self.sum) / f64::from(self.count))
    }
}

/// A worker of the fleet.
#[derive(Debug, Clone, PartialEq)]
pub struct Worker {
    pub id: WorkerId,
    pub position: Position,
    pub status: WorkerStatus,
    /// Driver-share sum of the fares of every finished trip.
    pub total_earnings: Decimal,
    pub trips_completed: u32,
    pub rating: Rating,
}

impl Worker {
    const DECIMAL_PRECISION: u32 = 4;

    pub fn new(id: WorkerId, position: Position) -> Self {
        Self {
            id,
            position,
            status: WorkerStatus::Available,
            total_earnings: Decimal::ZERO,
            trips_completed: 0,
            rating: Rating::default(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == WorkerStatus::Available
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.total_earnings >= Decimal::ZERO,
            "Invariant violated: worker {} earnings went negative: {}",
            self.id,
            self.total_earnings
        );
    }

    /// Available → Assigned.
    pub(crate) fn assign(&mut self) {
        debug_assert!(
            self.is_available(),
            "Invariant violated: worker {} assigned while busy",
            self.id
        );
        self.status = WorkerStatus::Assigned;
    }

    /// Assigned → Available, moving the worker to the drop-off point and
    /// crediting its share of the fare.
    pub(crate) fn finish_trip(&mut self, destination: Position, earnings: Decimal) {
        debug_assert!(
            !self.is_available(),
            "Invariant violated: worker {} released while already available",
            self.id
        );
        self.position = destination;
        self.status = WorkerStatus::Available;
        self.total_earnings += earnings;
        self.trips_completed += 1;
        self.assert_invariants();
    }

    pub(crate) fn rate(&mut self, score: u8) -> Result<(), DispatchError> {
        Rating::validate(score)?;
        self.rating.record(score);
        Ok(())
    }
}

impl Serialize for Worker {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Worker", 7)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("x", &self.position.x)?;
        state.serialize_field("y", &self.position.y)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field(
            "total_earnings",
            &self.total_earnings.round_dp(Worker::DECIMAL_PRECISION),
        )?;
        state.serialize_field("trips_completed", &self.trips_completed)?;
        state.serialize_field("rating", &self.rating.mean())?;
        state.end()
    }
}
