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

//! Service configuration.
//!
//! Every field has a default matching the reference deployment: fares of 2.00
//! per distance unit with no base fare, an 80/20 driver/company split, 50 ms of
//! simulated transit per distance unit and a 10×10 placement grid.

use crate::DispatchError;
use crate::pricing::{PricingPolicy, RevenueSplit};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a dispatch call waits for a free worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DispatchMode {
    /// Wait until a worker frees up, however long that takes.
    #[default]
    Blocking,
    /// Wait at most `timeout`, then fail with `NoCapacityAvailable`.
    BoundedWait { timeout: Duration },
}

impl DispatchMode {
    /// Fail immediately when no worker is free.
    pub const FAIL_FAST: DispatchMode = DispatchMode::BoundedWait {
        timeout: Duration::ZERO,
    };
}

/// How ride requests reach the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStrategy {
    /// Each submitting thread dispatches its own request.
    #[default]
    Direct,
    /// Requests are queued and dispatched in arrival order by a single
    /// consumer thread.
    Queued,
}

/// Which trips count towards revenue totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RevenueRecognition {
    /// Every trip ever created, active or finished.
    #[default]
    AllTrips,
    FinishedOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub pricing: PricingPolicy,
    pub split: RevenueSplit,
    /// Simulated transit time per unit of trip distance.
    pub transit_time_per_unit: Duration,
    /// Default mode for [`crate::DispatchService::submit_request`].
    pub dispatch_mode: DispatchMode,
    pub strategy: DispatchStrategy,
    pub revenue_recognition: RevenueRecognition,
    /// Workers are placed on the integer grid `0..=map_extent` in both axes.
    pub map_extent: u32,
}

impl FleetConfig {
    /// Upper bound for [`FleetConfig::transit_time_per_unit`].
    pub const MAX_TRANSIT_TIME_PER_UNIT: Duration = Duration::from_secs(60);

    pub fn validate(&self) -> Result<(), DispatchError> {
        self.pricing.validate()?;
        self.split.validate()?;
        if self.transit_time_per_unit > Self::MAX_TRANSIT_TIME_PER_UNIT {
            return Err(DispatchError::InvalidConfiguration(format!(
                "transit time per unit {:?} exceeds {:?}",
                self.transit_time_per_unit,
                Self::MAX_TRANSIT_TIME_PER_UNIT
            )));
        }
        Ok(())
    }

    /// Simulated transit duration for a trip of `distance` units. Saturates
    /// at [`Duration::MAX`].
    pub fn transit_time(&self, distance: f64) -> Duration {
        let secs = self.transit_time_per_unit.as_secs_f64() * distance.max(0.0);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            split: RevenueSplit::default(),
            transit_time_per_unit: Duration::from_millis(50),
            dispatch_mode: DispatchMode::default(),
            strategy: DispatchStrategy::default(),
            revenue_recognition: RevenueRecognition::default(),
            map_extent: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_config_is_valid() {
        let config = FleetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dispatch_mode, DispatchMode::Blocking);
        assert_eq!(config.strategy, DispatchStrategy::Direct);
        assert_eq!(config.revenue_recognition, RevenueRecognition::AllTrips);
        assert!(!config.pricing.include_pickup_leg);
    }

    #[test]
    fn invalid_split_fails_validation() {
        let config = FleetConfig {
            split: RevenueSplit {
                driver_share: dec!(0.5),
                company_share: dec!(0.6),
            },
            ..FleetConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DispatchError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn transit_time_scales_with_distance() {
        let config = FleetConfig {
            transit_time_per_unit: Duration::from_millis(100),
            ..FleetConfig::default()
        };
        assert_eq!(config.transit_time(5.0), Duration::from_millis(500));
        assert_eq!(config.transit_time(0.0), Duration::ZERO);
    }

    #[test]
    fn transit_time_saturates_instead_of_panicking() {
        let config = FleetConfig {
            transit_time_per_unit: Duration::MAX,
            ..FleetConfig::default()
        };
        assert_eq!(config.transit_time(1e9), Duration::MAX);
        assert_eq!(config.transit_time(f64::INFINITY), Duration::MAX);
        assert_eq!(config.transit_time(-3.0), Duration::ZERO);
    }

    #[test]
    fn excessive_transit_time_fails_validation() {
        let config = FleetConfig {
            transit_time_per_unit: FleetConfig::MAX_TRANSIT_TIME_PER_UNIT + Duration::from_nanos(1),
            ..FleetConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DispatchError::InvalidConfiguration(_))
        ));

        let config = FleetConfig {
            transit_time_per_unit: FleetConfig::MAX_TRANSIT_TIME_PER_UNIT,
            ..FleetConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn fail_fast_is_zero_timeout() {
        assert_eq!(
            DispatchMode::FAIL_FAST,
            DispatchMode::BoundedWait {
                timeout: Duration::ZERO
            }
        );
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let json = r#"{
            "pricing": { "base_fare": "1.50" },
            "dispatch_mode": { "mode": "bounded_wait", "timeout": { "secs": 2, "nanos": 0 } },
            "strategy": "queued"
        }"#;
        let config: FleetConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.pricing.base_fare, dec!(1.50));
        assert_eq!(config.pricing.rate_per_unit, dec!(2.00));
        assert_eq!(
            config.dispatch_mode,
            DispatchMode::BoundedWait {
                timeout: Duration::from_secs(2)
            }
        );
        assert_eq!(config.strategy, DispatchStrategy::Queued);
        assert_eq!(config.split, RevenueSplit::default());
        assert_eq!(config.map_extent, 10);
    }
}
