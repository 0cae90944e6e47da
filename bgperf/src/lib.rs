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

#![deny(missing_docs)]

//! # BgPerf: Benchmarking BGP Router Implementations
//! This library drives containerized BGP routers through the steps of a benchmark: build the
//! image, generate the configuration from a scenario, start the daemon, and scrape its state while
//! the testers announce their routes.
//!
//! ## Structure
//!
//! - **[`Scenario`](scenario)**: The scenario file, describing the testers, their neighbors, the
//!   monitor and the policies. See [`ScenarioConfig`](scenario::ScenarioConfig).
//!
//! - **[`Config`](config)**: Router configuration generator, transforming the scenario into a
//!   sequence of typed stanzas, which are rendered to a `bgpd` configuration.
//!
//! - **[`Adapter`](adapter)**: The [`RouterAdapter`](adapter::RouterAdapter) trait, which is the
//!   uniform interface of all router implementations, and [`Target`](adapter::Target), which
//!   implements it for every [`RouterFlavor`](adapter::RouterFlavor) on top of a
//!   [`ContainerRuntime`](docker::ContainerRuntime).
//!
//! - **[`Quagga`](quagga)**: The Quagga flavor.
//!
//! - **[`Poll`](poll)**: Poll the state of many routers in parallel.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use bgperf::adapter::{BuildOptions, RouterAdapter, Target, TargetOptions};
//! use bgperf::quagga::Quagga;
//! use bgperf::scenario::ScenarioConfig;
//! use bgperf::Error;
//! use docker::DockerClient;
//!
//! fn main() -> Result<(), Error> {
//!     let scenario = ScenarioConfig::from_file("scenario.json")?;
//!     let identity = scenario.identity()?;
//!
//!     let options = TargetOptions::new("/tmp/bgperf");
//!     let mut target = Target::new(Quagga, Arc::new(DockerClient::new()?), options)?;
//!     target.build_image(&BuildOptions::default())?;
//!     target.write_config(&scenario, &identity)?;
//!     target.start()?;
//!     println!("{}", target.exec_version_cmd()?);
//!     println!("{:?}", target.neighbors_state()?.accepted);
//!     target.stop()
//! }
//! ```

pub mod adapter;
pub mod config;
mod error;
pub mod poll;
pub mod quagga;
pub mod scenario;

pub use error::*;

// test modules
mod test;
