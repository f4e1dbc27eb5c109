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

//! Initial worker placement.

use crate::base::{Position, WorkerId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Chooses the starting position of each worker at fleet reset.
pub trait Placement: Send {
    fn place(&mut self, worker: WorkerId) -> Position;
}

/// Uniform random placement on the integer grid `0..=extent` in both axes.
#[derive(Debug, Clone)]
pub struct RandomPlacement {
    rng: ChaCha8Rng,
    extent: u32,
}

impl RandomPlacement {
    /// Reproducible placement: equal seeds yield equal fleets.
    pub fn seeded(seed: u64, extent: u32) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            extent,
        }
    }

    pub fn from_entropy(extent: u32) -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
            extent,
        }
    }
}

impl Placement for RandomPlacement {
    fn place(&mut self, _worker: WorkerId) -> Position {
        let x = self.rng.gen_range(0..=self.extent);
        let y = self.rng.gen_range(0..=self.extent);
        Position::new(f64::from(x), f64::from(y))
    }
}

/// Places workers at a fixed list of positions, cycling when the fleet is
/// larger than the list. An empty list places everyone at the origin.
#[derive(Debug, Clone, Default)]
pub struct FixedPlacement {
    positions: Vec<Position>,
}

impl FixedPlacement {
    pub fn new(positions: impl IntoIterator<Item = impl Into<Position>>) -> Self {
        Self {
            positions: positions.into_iter().map(Into::into).collect(),
        }
    }
}

impl Placement for FixedPlacement {
    fn place(&mut self, worker: WorkerId) -> Position {
        if self.positions.is_empty() {
            return Position::default();
        }
        let index = (worker.0.saturating_sub(1) as usize) % self.positions.len();
        self.positions[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_placement_is_reproducible() {
        let mut first = RandomPlacement::seeded(7, 10);
        let mut second = RandomPlacement::seeded(7, 10);
        for id in 1..=20 {
            assert_eq!(first.place(WorkerId(id)), second.place(WorkerId(id)));
        }
    }

    #[test]
    fn random_placement_stays_on_grid() {
        let mut placement = RandomPlacement::seeded(99, 10);
        for id in 1..=200 {
            let position = placement.place(WorkerId(id));
            assert!((0.0..=10.0).contains(&position.x));
            assert!((0.0..=10.0).contains(&position.y));
            assert_eq!(position.x.fract(), 0.0);
            assert_eq!(position.y.fract(), 0.0);
        }
    }

    #[test]
    fn zero_extent_places_everyone_at_origin() {
        let mut placement = RandomPlacement::seeded(1, 0);
        assert_eq!(placement.place(WorkerId(1)), Position::default());
    }

    #[test]
    fn fixed_placement_cycles() {
        let mut placement = FixedPlacement::new([(1.0, 1.0), (2.0, 2.0)]);
        assert_eq!(placement.place(WorkerId(1)), Position::new(1.0, 1.0));
        assert_eq!(placement.place(WorkerId(2)), Position::new(2.0, 2.0));
        assert_eq!(placement.place(WorkerId(3)), Position::new(1.0, 1.0));
    }

    #[test]
    fn empty_fixed_placement_uses_origin() {
        let mut placement = FixedPlacement::default();
        assert_eq!(placement.place(WorkerId(5)), Position::default());
    }
}
