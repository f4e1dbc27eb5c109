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

//! Revenue accounting over a fleet snapshot.

use crate::base::WorkerId;
use crate::config::RevenueRecognition;
use crate::pricing::RevenueSplit;
use crate::store::FleetSnapshot;
use crate::trip::TripStatus;
use rust_decimal::Decimal;
use serde::Serialize;

/// Earnings of one worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerEarnings {
    pub worker_id: WorkerId,
    pub earnings: Decimal,
    /// Operator income attributable to this worker's trips.
    pub company_contribution: Decimal,
    pub trips_completed: u32,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialSummary {
    pub total_trips: usize,
    pub total_fares: Decimal,
    pub company_income: Decimal,
    pub driver_income: Decimal,
    pub per_worker: Vec<WorkerEarnings>,
}

#[derive(Debug, Clone, Copy)]
pub struct FinancialAggregator {
    split: RevenueSplit,
    recognition: RevenueRecognition,
}

impl FinancialAggregator {
    pub fn new(split: RevenueSplit, recognition: RevenueRecognition) -> Self {
        Self { split, recognition }
    }

    /// Computes totals and per-worker earnings from one snapshot.
    pub fn summarize(&self, snapshot: &FleetSnapshot) -> FinancialSummary {
        let counted = snapshot.trips.iter().filter(|trip| match self.recognition {
            RevenueRecognition::AllTrips => true,
            RevenueRecognition::FinishedOnly => trip.status == TripStatus::Finished,
        });
        let (total_trips, total_fares) = counted.fold((0, Decimal::ZERO), |(count, sum), trip| {
            (count + 1, sum + trip.fare)
        });

        let per_worker = snapshot
            .workers
            .iter()
            .map(|worker| WorkerEarnings {
                worker_id: worker.id,
                earnings: worker.total_earnings,
                company_contribution: self.split.company_contribution(worker.total_earnings),
                trips_completed: worker.trips_completed,
                rating: worker.rating.mean(),
            })
            .collect();

        FinancialSummary {
            total_trips,
            total_fares,
            company_income: self.split.company_cut(total_fares),
            driver_income: self.split.driver_cut(total_fares),
            per_worker,
        }
    }
}
