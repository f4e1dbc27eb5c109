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

//! Error types for dispatch operations.

use thiserror::Error;

/// Dispatch errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Fleet size is not positive, or the fleet configuration is inconsistent
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No worker could be assigned (fail-fast mode or wait timed out)
    #[error("no capacity available")]
    NoCapacityAvailable,

    /// Referenced worker or trip does not exist
    #[error("unknown entity")]
    UnknownEntity,

    /// Rating score outside 1..=5
    #[error("invalid rating {0} (must be between 1 and 5)")]
    InvalidRating(u8),

    /// Ride request failed validation
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[cfg(test)]
mod tests {
    use super::DispatchError;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            DispatchError::InvalidConfiguration("fleet size must be positive, got 0".into())
                .to_string(),
            "invalid configuration: fleet size must be positive, got 0"
        );
        assert_eq!(
            DispatchError::NoCapacityAvailable.to_string(),
            "no capacity available"
        );
        assert_eq!(DispatchError::UnknownEntity.to_string(), "unknown entity");
        assert_eq!(
            DispatchError::InvalidRating(6).to_string(),
            "invalid rating 6 (must be between 1 and 5)"
        );
        assert_eq!(
            DispatchError::InvalidRequest("requester name is empty".into()).to_string(),
            "invalid request: requester name is empty"
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = DispatchError::NoCapacityAvailable;
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
