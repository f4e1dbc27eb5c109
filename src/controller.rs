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

//! Fleet (re)initialization.

use crate::DispatchError;
use crate::placement::Placement;
use crate::store::{FleetSnapshot, StateStore};
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::info;

/// Upper bound on the fleet size accepted by [`FleetController::initialize`].
pub const MAX_FLEET_SIZE: i64 = 1_000_000;

pub struct FleetController {
    store: Arc<StateStore>,
    placement: Mutex<Box<dyn Placement>>,
}

impl FleetController {
    pub fn new(store: Arc<StateStore>, placement: Box<dyn Placement>) -> Self {
        Self {
            store,
            placement: Mutex::new(placement),
        }
    }

    /// Replaces the fleet with `size` fresh, available workers.
    ///
    /// All requesters and trips are discarded and ID counters restart at 1.
    /// Trips still in transit finish against the old fleet and are ignored.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidConfiguration`] if `size` is not in
    /// `1..=MAX_FLEET_SIZE`. The current fleet is left untouched.
    pub fn initialize(&self, size: i64) -> Result<FleetSnapshot, DispatchError> {
        if size > MAX_FLEET_SIZE {
            return Err(DispatchError::InvalidConfiguration(format!(
                "fleet size {size} exceeds the maximum of {MAX_FLEET_SIZE}"
            )));
        }
        let size = usize::try_from(size)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| {
                DispatchError::InvalidConfiguration(format!(
                    "fleet size must be positive, got {size}"
                ))
            })?;

        let mut placement = self.placement.lock();
        let snapshot = self.store.reset(size, &mut **placement);
        drop(placement);

        info!(workers = size.get(), epoch = snapshot.epoch, "fleet initialized");
        Ok(snapshot)
    }
}
