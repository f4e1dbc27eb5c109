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

//! Trips, requesters and ride requests.
//!
//! Trips follow a state machine:
//! - [`Active`] → [`Finished`] (via trip completion, exactly once)
//!
//! [`Active`]: TripStatus::Active
//! [`Finished`]: TripStatus::Finished

use crate::DispatchError;
use crate::base::{Position, RequesterId, TripId, WorkerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Active,
    Finished,
}

/// The record of one worker servicing one request.
///
/// Origin, destination, distances and fare are fixed at creation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Trip {
    pub id: TripId,
    pub requester_id: RequesterId,
    pub worker_id: WorkerId,
    pub origin: Position,
    pub destination: Position,
    /// Euclidean distance origin → destination.
    pub distance: f64,
    /// Distance the worker drove to reach the origin.
    pub pickup_distance: f64,
    pub fare: Decimal,
    pub status: TripStatus,
}

impl Trip {
    pub fn is_active(&self) -> bool {
        self.status == TripStatus::Active
    }

    /// Active → Finished. Returns `false` if the trip was already finished.
    pub(crate) fn finish(&mut self) -> bool {
        if self.status == TripStatus::Finished {
            return false;
        }
        self.status = TripStatus::Finished;
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Requester {
    pub id: RequesterId,
    pub name: String,
}

/// An inbound ride request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RideRequest {
    pub requester_name: String,
    pub origin: Position,
    pub destination: Position,
}

impl RideRequest {
    /// Largest accepted coordinate magnitude.
    pub const MAX_COORDINATE: f64 = 1e9;

    pub fn new(
        requester_name: impl Into<String>,
        origin: impl Into<Position>,
        destination: impl Into<Position>,
    ) -> Self {
        Self {
            requester_name: requester_name.into(),
            origin: origin.into(),
            destination: destination.into(),
        }
    }

    /// Checks the request before any shared state is touched.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.requester_name.trim().is_empty() {
            return Err(DispatchError::InvalidRequest(
                "requester name is empty".to_string(),
            ));
        }
        for (label, point) in [("origin", self.origin), ("destination", self.destination)] {
            let in_range = point.is_finite()
                && point.x.abs() <= Self::MAX_COORDINATE
                && point.y.abs() <= Self::MAX_COORDINATE;
            if !in_range {
                return Err(DispatchError::InvalidRequest(format!(
                    "{label} {point} is not a finite coordinate within ±{}",
                    Self::MAX_COORDINATE
                )));
            }
        }
        Ok(())
    }

    pub fn trip_distance(&self) -> f64 {
        self.origin.distance_to(self.destination)
    }
}
