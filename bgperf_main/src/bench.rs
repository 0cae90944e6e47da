// BgPerf: Benchmarking BGP Router Implementations
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Drive a router through a benchmark run and print its state after every poll.

use bgperf::adapter::{BuildOptions, RouterAdapter, Target, TargetOptions};
use bgperf::poll::poll_all;
use bgperf::quagga::Quagga;
use bgperf::scenario::ScenarioConfig;
use docker::DockerClient;

use log::*;
use serde_json::json;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Options of a benchmark run
#[derive(Debug, Clone)]
pub struct BenchOptions {
    pub host_dir: PathBuf,
    pub polls: usize,
    pub interval: f64,
    pub timeout: u64,
    pub network: Option<String>,
    pub keep: bool,
}

/// Build, configure and start the router, poll it `options.polls` times and stop it again.
pub fn bench(
    scenario: ScenarioConfig,
    build: BuildOptions,
    options: BenchOptions,
) -> Result<(), Box<dyn Error>> {
    let identity = scenario.identity()?;

    let mut target_options = TargetOptions::new(&options.host_dir);
    target_options.exec_timeout = Duration::from_secs(options.timeout);
    target_options.network = options.network.clone();
    let target = Target::new(Quagga, Arc::new(DockerClient::new()?), target_options)?;
    let mut adapters: Vec<Box<dyn RouterAdapter>> = vec![Box::new(target)];

    for adapter in adapters.iter_mut() {
        adapter.build_image(&build)?;
        adapter.write_config(&scenario, &identity)?;
        adapter.start()?;
    }

    let result = poll_loop(&adapters, scenario.neighbors().count(), &options);

    if !options.keep {
        for adapter in adapters.iter_mut() {
            if let Err(e) = adapter.stop() {
                error!("Cannot stop {}: {}", adapter.name(), e);
            }
        }
    }

    result
}

fn poll_loop(
    adapters: &[Box<dyn RouterAdapter>],
    num_neighbors: usize,
    options: &BenchOptions,
) -> Result<(), Box<dyn Error>> {
    for adapter in adapters {
        match adapter.exec_version_cmd() {
            Ok(version) => info!("{}: {}", adapter.name(), version),
            Err(e) if e.is_recoverable() => {
                warn!("{}: cannot get the version: {}", adapter.name(), e)
            }
            Err(e) => return Err(e.into()),
        }
    }

    let interval = Duration::from_secs_f64(options.interval.max(0.0));
    let start = Instant::now();
    for i in 0..options.polls {
        if i > 0 {
            sleep(interval);
        }
        let elapsed = start.elapsed().as_secs_f64();
        for (adapter, result) in adapters.iter().zip(poll_all(adapters)) {
            match result {
                Ok(state) => {
                    debug!(
                        "{}: {} of {} neighbors accepted routes",
                        adapter.name(),
                        state.accepted.len(),
                        num_neighbors
                    );
                    let line = json!({
                        "elapsed": elapsed,
                        "router": adapter.name(),
                        "accepted": state.accepted,
                        "received": state.received,
                    });
                    println!("{}", line);
                }
                Err(e) if e.is_recoverable() => {
                    warn!("{}: poll {} failed: {}", adapter.name(), i, e)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}
