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

//! Pending-request queue drained by a single dispatcher thread.
//!
//! Submitters push their request onto an unbounded FIFO channel and block on
//! a per-request reply channel. The consumer thread dispatches requests one at
//! a time in arrival order, so a request at the head of the queue that is
//! waiting for a free worker holds back everything behind it.
//!
//! A [`DispatchMode::BoundedWait`] timeout covers the whole submission, time
//! spent queued included. When it runs out before the consumer reaches the
//! request, the submitter withdraws it and makes one last fail-fast attempt
//! of its own; the consumer later skips the withdrawn job.

use crate::DispatchError;
use crate::config::DispatchMode;
use crate::dispatch::Dispatcher;
use crate::trip::{RideRequest, Trip};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;
use tracing::debug;

struct Job {
    request: RideRequest,
    mode: DispatchMode,
    /// End of a bounded wait; `None` waits indefinitely.
    deadline: Option<Instant>,
    /// Set by whichever side handles the job first: the consumer or a
    /// submitter giving up.
    claimed: Arc<AtomicBool>,
    reply: Sender<Result<Trip, DispatchError>>,
}

impl Job {
    fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }

    /// The mode to dispatch with now, shortened by the time already spent queued.
    fn remaining_mode(&self) -> DispatchMode {
        match self.deadline {
            Some(deadline) => DispatchMode::BoundedWait {
                timeout: deadline.saturating_duration_since(Instant::now()),
            },
            None => self.mode,
        }
    }
}

/// FIFO front-end to a [`Dispatcher`].
///
/// Dropping the queue lets the consumer thread exit once it has drained the
/// jobs already queued.
pub struct RequestQueue {
    dispatcher: Arc<Dispatcher>,
    jobs: Sender<Job>,
}

impl RequestQueue {
    /// Starts the consumer thread.
    pub fn spawn(dispatcher: Arc<Dispatcher>) -> Self {
        let (jobs, pending) = channel::unbounded();
        let consumer = Arc::clone(&dispatcher);
        thread::spawn(move || Self::drain(&consumer, pending));
        Self { dispatcher, jobs }
    }

    fn drain(dispatcher: &Dispatcher, pending: Receiver<Job>) {
        for job in pending {
            if !job.claim() {
                debug!(requester = %job.request.requester_name, "skipping withdrawn request");
                continue;
            }
            let outcome = dispatcher.assign(&job.request, job.remaining_mode());
            // The submitter only goes away if its thread died.
            let _ = job.reply.send(outcome);
        }
        debug!("request queue closed");
    }

    /// Queues `request` and waits for the dispatcher's answer.
    ///
    /// The request is validated before queueing. With a bounded-wait `mode`
    /// the call returns within roughly `timeout` even if requests ahead of
    /// this one are still waiting for a worker.
    pub fn submit(&self, request: RideRequest, mode: DispatchMode) -> Result<Trip, DispatchError> {
        request.validate()?;

        let deadline = match mode {
            DispatchMode::Blocking => None,
            DispatchMode::BoundedWait { timeout } => Instant::now().checked_add(timeout),
        };
        let claimed = Arc::new(AtomicBool::new(false));
        let (reply, outcome) = channel::bounded(1);
        self.jobs
            .send(Job {
                request: request.clone(),
                mode,
                deadline,
                claimed: Arc::clone(&claimed),
                reply,
            })
            .map_err(|_| DispatchError::NoCapacityAvailable)?;

        let Some(deadline) = deadline else {
            return outcome
                .recv()
                .map_err(|_| DispatchError::NoCapacityAvailable)?;
        };
        match outcome.recv_deadline(deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Disconnected) => Err(DispatchError::NoCapacityAvailable),
            Err(RecvTimeoutError::Timeout) => {
                if claimed.swap(true, Ordering::AcqRel) {
                    // The consumer already holds the job; its wait is capped
                    // by the same deadline.
                    return outcome
                        .recv()
                        .map_err(|_| DispatchError::NoCapacityAvailable)?;
                }
                debug!(requester = %request.requester_name, "queued request withdrawn at deadline");
                self.dispatcher.assign(&request, DispatchMode::FAIL_FAST)
            }
        }
    }

    /// Number of queued requests the consumer has not picked up yet, withdrawn
    /// ones included.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::WorkerId;
    use crate::clock::ManualClock;
    use crate::config::FleetConfig;
    use crate::placement::FixedPlacement;
    use crate::store::StateStore;
    use std::num::NonZeroUsize;
    use std::time::Duration;

    fn queue(workers: usize) -> (RequestQueue, Arc<StateStore>, Arc<ManualClock>) {
        let store = Arc::new(StateStore::new());
        store.reset(
            NonZeroUsize::new(workers).unwrap(),
            &mut FixedPlacement::new([(0.0, 0.0), (10.0, 0.0)]),
        );
        let clock = Arc::new(ManualClock::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            Arc::new(FleetConfig::default()),
            clock.clone(),
        );
        (RequestQueue::spawn(Arc::new(dispatcher)), store, clock)
    }

    #[test]
    fn queued_requests_are_dispatched() {
        let (queue, store, _clock) = queue(2);

        let first = queue
            .submit(RideRequest::new("Ana", (1.0, 0.0), (2.0, 0.0)), DispatchMode::Blocking)
            .unwrap();
        let second = queue
            .submit(RideRequest::new("Bruno", (1.0, 0.0), (2.0, 0.0)), DispatchMode::Blocking)
            .unwrap();

        assert_eq!(first.worker_id, WorkerId(1));
        assert_eq!(second.worker_id, WorkerId(2));
        assert_eq!(store.metrics().active_trips, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn invalid_request_is_not_queued() {
        let (queue, store, _clock) = queue(1);
        let result = queue.submit(
            RideRequest::new("", (0.0, 0.0), (1.0, 0.0)),
            DispatchMode::Blocking,
        );
        assert!(matches!(result, Err(DispatchError::InvalidRequest(_))));
        assert_eq!(store.metrics().active_trips, 0);
    }

    #[test]
    fn bounded_wait_applies_to_queued_requests() {
        let (queue, _store, clock) = queue(1);
        queue
            .submit(RideRequest::new("Ana", (0.0, 0.0), (2.0, 0.0)), DispatchMode::Blocking)
            .unwrap();

        let busy = queue.submit(
            RideRequest::new("Bruno", (0.0, 0.0), (1.0, 0.0)),
            DispatchMode::BoundedWait {
                timeout: Duration::from_millis(20),
            },
        );
        assert_eq!(busy, Err(DispatchError::NoCapacityAvailable));

        clock.run_until_idle();
        let trip = queue
            .submit(RideRequest::new("Bruno", (0.0, 0.0), (1.0, 0.0)), DispatchMode::Blocking)
            .unwrap();
        assert_eq!(trip.worker_id, WorkerId(1));
    }

    #[test]
    fn fail_fast_succeeds_through_idle_queue() {
        let (queue, _store, _clock) = queue(1);
        let trip = queue
            .submit(RideRequest::new("Ana", (0.0, 0.0), (1.0, 0.0)), DispatchMode::FAIL_FAST)
            .unwrap();
        assert_eq!(trip.worker_id, WorkerId(1));
    }

    #[test]
    fn bounded_wait_does_not_wait_behind_blocked_head() {
        let (queue, store, clock) = queue(1);
        let queue = Arc::new(queue);
        queue
            .submit(RideRequest::new("Ana", (0.0, 0.0), (2.0, 0.0)), DispatchMode::Blocking)
            .unwrap();

        // Carla reaches the head of the queue and blocks the consumer.
        let head = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                queue.submit(RideRequest::new("Carla", (0.0, 0.0), (1.0, 0.0)), DispatchMode::Blocking)
            })
        };
        let started = Instant::now();
        while store.metrics().waiting_requests == 0 || !queue.is_empty() {
            assert!(started.elapsed() < Duration::from_secs(5), "head never blocked");
            thread::sleep(Duration::from_millis(1));
        }

        let started = Instant::now();
        let busy = queue.submit(
            RideRequest::new("Bruno", (0.0, 0.0), (1.0, 0.0)),
            DispatchMode::BoundedWait {
                timeout: Duration::from_millis(20),
            },
        );
        assert_eq!(busy, Err(DispatchError::NoCapacityAvailable));
        assert!(started.elapsed() < Duration::from_secs(1));
        // The withdrawn job stays in the channel until the consumer skips it.
        assert_eq!(queue.len(), 1);

        clock.run_until_idle();
        let carla = head.join().unwrap().unwrap();
        assert_eq!(carla.worker_id, WorkerId(1));

        let started = Instant::now();
        while !queue.is_empty() {
            assert!(started.elapsed() < Duration::from_secs(5), "withdrawn job never skipped");
            thread::sleep(Duration::from_millis(1));
        }
        let snapshot = store.snapshot();
        assert_eq!(snapshot.trips.len(), 2);
        assert!(snapshot
            .requesters
            .iter()
            .all(|requester| requester.name != "Bruno"));
    }
}
