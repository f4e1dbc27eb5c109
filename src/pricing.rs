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

//! Fare computation and the driver/company revenue split.
//!
//! Formula: `fare = base_fare + rate_per_unit * billable_distance`, rounded to
//! cents. The billable distance is the trip distance, plus the pickup leg when
//! [`PricingPolicy::include_pickup_leg`] is set.

use crate::DispatchError;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Fare constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingPolicy {
    pub base_fare: Decimal,
    pub rate_per_unit: Decimal,
    /// Bill the leg from the worker's position to the pickup point as well.
    pub include_pickup_leg: bool,
}

impl PricingPolicy {
    pub const FARE_PRECISION: u32 = 2;
    /// Upper bound for `base_fare` and `rate_per_unit`.
    pub const MAX_PRICE: Decimal = dec!(1000000);

    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.base_fare < Decimal::ZERO {
            return Err(DispatchError::InvalidConfiguration(format!(
                "base fare must not be negative, got {}",
                self.base_fare
            )));
        }
        if self.rate_per_unit < Decimal::ZERO {
            return Err(DispatchError::InvalidConfiguration(format!(
                "rate per unit must not be negative, got {}",
                self.rate_per_unit
            )));
        }
        if self.base_fare > Self::MAX_PRICE || self.rate_per_unit > Self::MAX_PRICE {
            return Err(DispatchError::InvalidConfiguration(format!(
                "base fare and rate per unit must not exceed {}",
                Self::MAX_PRICE
            )));
        }
        Ok(())
    }

    /// Distance the requester is billed for.
    pub fn billable_distance(&self, trip_distance: f64, pickup_distance: f64) -> f64 {
        if self.include_pickup_leg {
            trip_distance + pickup_distance
        } else {
            trip_distance
        }
    }

    /// Computes the fare for a trip. Computed once at dispatch, never updated.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidRequest`] if the fare is not representable.
    pub fn fare(&self, trip_distance: f64, pickup_distance: f64) -> Result<Decimal, DispatchError> {
        let distance = self.billable_distance(trip_distance, pickup_distance);
        let out_of_range =
            || DispatchError::InvalidRequest(format!("fare for {distance} units is out of range"));
        let units = Decimal::from_f64(distance).ok_or_else(out_of_range)?;
        let fare = self
            .rate_per_unit
            .checked_mul(units)
            .and_then(|charge| charge.checked_add(self.base_fare))
            .ok_or_else(out_of_range)?;
        Ok(fare.round_dp(Self::FARE_PRECISION))
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            base_fare: Decimal::ZERO,
            rate_per_unit: dec!(2.00),
            include_pickup_leg: false,
        }
    }
}

/// Fractional split of every fare between the worker and the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevenueSplit {
    pub driver_share: Decimal,
    pub company_share: Decimal,
}

impl RevenueSplit {
    pub fn validate(&self) -> Result<(), DispatchError> {
        let in_unit_range = |share: Decimal| share >= Decimal::ZERO && share <= Decimal::ONE;
        if !in_unit_range(self.driver_share) || !in_unit_range(self.company_share) {
            return Err(DispatchError::InvalidConfiguration(format!(
                "shares must lie in [0, 1], got driver {} and company {}",
                self.driver_share, self.company_share
            )));
        }
        if self.driver_share + self.company_share != Decimal::ONE {
            return Err(DispatchError::InvalidConfiguration(format!(
                "driver and company shares must sum to 1, got {}",
                self.driver_share + self.company_share
            )));
        }
        if self.driver_share.is_zero() {
            return Err(DispatchError::InvalidConfiguration(
                "driver share must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn driver_cut(&self, fare: Decimal) -> Decimal {
        fare * self.driver_share
    }

    pub fn company_cut(&self, fare: Decimal) -> Decimal {
        fare * self.company_share
    }

    /// Operator income attributable to a worker's driver-side earnings.
    ///
    /// Only meaningful because `driver_share + company_share == 1`.
    pub fn company_contribution(&self, driver_earnings: Decimal) -> Decimal {
        if driver_earnings.is_zero() {
            return Decimal::ZERO;
        }
        (driver_earnings * self.company_share)
            .checked_div(self.driver_share)
            .unwrap_or(Decimal::ZERO)
    }
}

impl Default for RevenueSplit {
    fn default() -> Self {
        Self {
            driver_share: dec!(0.80),
            company_share: dec!(0.20),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fare_includes_base_and_distance() {
        let pricing = PricingPolicy {
            base_fare: dec!(2.50),
            rate_per_unit: dec!(1.50),
            include_pickup_leg: false,
        };
        assert_eq!(pricing.fare(5.0, 100.0), Ok(dec!(10.00)));
    }

    #[test]
    fn default_fare_is_two_per_unit() {
        let pricing = PricingPolicy::default();
        assert_eq!(pricing.fare(5.0, 3.0), Ok(dec!(10.00)));
        assert_eq!(pricing.fare(0.0, 3.0), Ok(Decimal::ZERO));
    }

    #[test]
    fn pickup_leg_is_billed_only_when_enabled() {
        let mut pricing = PricingPolicy::default();
        assert_eq!(pricing.billable_distance(5.0, 2.0), 5.0);

        pricing.include_pickup_leg = true;
        assert_eq!(pricing.billable_distance(5.0, 2.0), 7.0);
        assert_eq!(pricing.fare(5.0, 2.0), Ok(dec!(14.00)));
    }

    #[test]
    fn fare_rounds_to_cents() {
        let pricing = PricingPolicy::default();
        // sqrt(2) * 2 = 2.828427...
        assert_eq!(pricing.fare(2f64.sqrt(), 0.0), Ok(dec!(2.83)));
    }

    #[test]
    fn negative_pricing_is_rejected() {
        let pricing = PricingPolicy {
            base_fare: dec!(-1),
            ..PricingPolicy::default()
        };
        assert!(matches!(
            pricing.validate(),
            Err(DispatchError::InvalidConfiguration(_))
        ));

        let pricing = PricingPolicy {
            rate_per_unit: dec!(-0.5),
            ..PricingPolicy::default()
        };
        assert!(pricing.validate().is_err());
    }

    #[test]
    fn excessive_pricing_is_rejected() {
        let pricing = PricingPolicy {
            rate_per_unit: Decimal::MAX,
            ..PricingPolicy::default()
        };
        assert!(matches!(
            pricing.validate(),
            Err(DispatchError::InvalidConfiguration(_))
        ));

        let pricing = PricingPolicy {
            base_fare: PricingPolicy::MAX_PRICE + Decimal::ONE,
            ..PricingPolicy::default()
        };
        assert!(pricing.validate().is_err());
        assert!(PricingPolicy {
            base_fare: PricingPolicy::MAX_PRICE,
            rate_per_unit: PricingPolicy::MAX_PRICE,
            include_pickup_leg: true,
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn overflowing_fare_is_an_error() {
        let pricing = PricingPolicy {
            rate_per_unit: Decimal::MAX,
            ..PricingPolicy::default()
        };
        assert!(matches!(
            pricing.fare(1e9, 0.0),
            Err(DispatchError::InvalidRequest(_))
        ));
        assert!(PricingPolicy::default().fare(f64::MAX, f64::MAX).is_err());
    }

    #[test]
    fn split_must_sum_to_one() {
        assert!(RevenueSplit::default().validate().is_ok());

        let split = RevenueSplit {
            driver_share: dec!(0.7),
            company_share: dec!(0.2),
        };
        assert!(matches!(
            split.validate(),
            Err(DispatchError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn split_rejects_zero_driver_share() {
        let split = RevenueSplit {
            driver_share: Decimal::ZERO,
            company_share: Decimal::ONE,
        };
        assert!(split.validate().is_err());
    }

    #[test]
    fn split_rejects_out_of_range_shares() {
        let split = RevenueSplit {
            driver_share: dec!(1.5),
            company_share: dec!(-0.5),
        };
        assert!(split.validate().is_err());
    }

    #[test]
    fn cuts_add_up_to_fare() {
        let split = RevenueSplit::default();
        let fare = dec!(10.00);
        assert_eq!(split.driver_cut(fare), dec!(8.00));
        assert_eq!(split.company_cut(fare), dec!(2.00));
        assert_eq!(split.driver_cut(fare) + split.company_cut(fare), fare);
    }

    #[test]
    fn company_contribution_is_proportional() {
        let split = RevenueSplit::default();
        assert_eq!(split.company_contribution(dec!(8.00)), dec!(2.00));
        assert_eq!(split.company_contribution(Decimal::ZERO), Decimal::ZERO);
    }
}
