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

use clap::Parser;
use crossbeam::channel;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use taxi_dispatch::{
    DispatchMode, DispatchService, DispatchStrategy, FleetConfig, PricingPolicy, RandomPlacement,
    RevenueRecognition, RideRequest, SystemClock,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Taxi Dispatch - Replay ride request CSV files against a simulated fleet
///
/// Reads ride requests from a CSV file, dispatches them concurrently to the
/// nearest free taxi and writes each taxi's earnings to stdout once every
/// trip has finished.
#[derive(Parser, Debug)]
#[command(name = "taxi-dispatch")]
#[command(about = "A taxi dispatch engine that replays ride request CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with ride requests
    ///
    /// Expected format: name,origin_x,origin_y,dest_x,dest_y
    /// Example: cargo run -- requests.csv > earnings.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Number of taxis in the fleet
    #[arg(long, default_value_t = 5)]
    taxis: i64,

    /// Seed for taxi placement; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Give up on a request after waiting this long for a free taxi
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Dispatch through a single FIFO queue instead of per-requester threads
    #[arg(long)]
    queued: bool,

    /// Also bill the distance from the taxi to the pickup point
    #[arg(long)]
    include_pickup: bool,

    /// Only count finished trips towards revenue
    #[arg(long)]
    finished_only: bool,

    /// Flat amount added to every fare
    #[arg(long, default_value = "0")]
    base_fare: Decimal,

    /// Fare per unit of distance
    #[arg(long, default_value = "2.00")]
    rate: Decimal,

    /// Simulated transit time per unit of distance
    #[arg(long, value_name = "MS", default_value_t = 50)]
    time_per_unit_ms: u64,

    /// Number of concurrent requester threads
    #[arg(long, default_value_t = 8)]
    requesters: usize,
}

impl Args {
    fn config(&self) -> FleetConfig {
        FleetConfig {
            pricing: PricingPolicy {
                base_fare: self.base_fare,
                rate_per_unit: self.rate,
                include_pickup_leg: self.include_pickup,
            },
            transit_time_per_unit: Duration::from_millis(self.time_per_unit_ms),
            dispatch_mode: match self.timeout_ms {
                Some(ms) => DispatchMode::BoundedWait {
                    timeout: Duration::from_millis(ms),
                },
                None => DispatchMode::Blocking,
            },
            strategy: if self.queued {
                DispatchStrategy::Queued
            } else {
                DispatchStrategy::Direct
            },
            revenue_recognition: if self.finished_only {
                RevenueRecognition::FinishedOnly
            } else {
                RevenueRecognition::AllTrips
            },
            ..FleetConfig::default()
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = args.config();
    let placement = match args.seed {
        Some(seed) => RandomPlacement::seeded(seed, config.map_extent),
        None => RandomPlacement::from_entropy(config.map_extent),
    };
    let service = match DispatchService::with_parts(config, Arc::new(SystemClock), Box::new(placement))
    {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };
    if let Err(e) = service.initialize_fleet(args.taxis) {
        eprintln!("Error: {}", e);
        process::exit(2);
    }

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let stats = match process_requests(&service, BufReader::new(file), args.requesters) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("Error processing requests: {}", e);
            process::exit(1);
        }
    };

    while !service.wait_until_idle(Duration::from_secs(5)) {
        info!(
            active_trips = service.query_status().metrics.active_trips,
            "waiting for trips to finish"
        );
    }

    let summary = service.query_financials();
    info!(
        dispatched = stats.dispatched,
        rejected = stats.rejected,
        total_fares = %summary.total_fares,
        company_income = %summary.company_income,
        driver_income = %summary.driver_income,
        "all trips finished"
    );

    if let Err(e) = write_earnings(&service, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `name, origin_x, origin_y, dest_x, dest_y`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    name: String,
    origin_x: f64,
    origin_y: f64,
    dest_x: f64,
    dest_y: f64,
}

impl CsvRecord {
    fn into_request(self) -> RideRequest {
        RideRequest::new(
            self.name,
            (self.origin_x, self.origin_y),
            (self.dest_x, self.dest_y),
        )
    }
}

/// Outcome counts of one replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub dispatched: usize,
    pub rejected: usize,
}

/// Dispatch ride requests from a CSV reader.
///
/// Rows are parsed on the calling thread and handed to `requesters` threads
/// that submit them concurrently, each one blocking or timing out according
/// to the service's dispatch mode. Malformed rows are skipped.
///
/// # CSV Format
///
/// Expected columns: `name, origin_x, origin_y, dest_x, dest_y`
///
/// # Example
///
/// ```csv
/// name,origin_x,origin_y,dest_x,dest_y
/// Ana,0,0,3,4
/// Bruno,2.5,1,7,7
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_requests<R: Read>(
    service: &DispatchService,
    reader: R,
    requesters: usize,
) -> Result<ReplayStats, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);

    let (requests, pending) = channel::unbounded::<RideRequest>();

    thread::scope(|scope| {
        let handles: Vec<_> = (0..requesters.max(1))
            .map(|_| {
                let pending = pending.clone();
                scope.spawn(move || {
                    let mut stats = ReplayStats::default();
                    for request in pending {
                        match service.submit_request(
                            &request.requester_name,
                            request.origin,
                            request.destination,
                        ) {
                            Ok(trip) => {
                                debug!(trip_id = %trip.id, worker_id = %trip.worker_id, "request served");
                                stats.dispatched += 1;
                            }
                            Err(e) => {
                                warn!(requester = %request.requester_name, error = %e, "request rejected");
                                stats.rejected += 1;
                            }
                        }
                    }
                    stats
                })
            })
            .collect();

        let mut parsed = Ok(());
        for result in rdr.deserialize::<CsvRecord>() {
            match result {
                Ok(record) => {
                    // Receivers live until the scope ends.
                    let _ = requests.send(record.into_request());
                }
                Err(e) if e.is_io_error() => {
                    parsed = Err(e);
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "skipping malformed row");
                }
            }
        }
        drop(requests);

        let stats = handles.into_iter().fold(ReplayStats::default(), |total, handle| {
            let stats = handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            ReplayStats {
                dispatched: total.dispatched + stats.dispatched,
                rejected: total.rejected + stats.rejected,
            }
        });
        parsed.map(|()| stats)
    })
}

/// Write per-taxi earnings to a CSV writer
///
/// # CSV Format
///
/// Columns: `worker_id, earnings, company_contribution, trips_completed, rating`
///
/// # Example
///
/// ```csv
/// worker_id,earnings,company_contribution,trips_completed,rating
/// 1,8.0000,2.0000,1,
/// 2,0,0,0,
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_earnings<W: Write>(service: &DispatchService, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for worker in service.query_financials().per_worker {
        wtr.serialize(&worker)?;
    }

    wtr.flush()?;
    Ok(())
}
