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

use bgperf::adapter::{BuildOptions, RouterFlavor, DEFAULT_GUEST_DIR};
use bgperf::config::{render, write_atomic};
use bgperf::quagga::Quagga;
use bgperf::scenario::ScenarioConfig;
use textfsm::Template;

use clap::{Parser, Subcommand};
use log::*;
use serde_json::json;
use std::error::Error;
use std::fs::read_to_string;
use std::path::PathBuf;

mod bench;
use bench::*;

fn main() -> Result<(), Box<dyn Error>> {
    // run clap
    let args = CommandLineArguments::parse();

    // initialize the env logger
    pretty_env_logger::init();

    // match on the action
    match args.cmd {
        MainCommand::Render { scenario, asn, router_id, output } => {
            let scenario = ScenarioConfig::from_file(scenario)?;
            let mut target = scenario.target.clone().unwrap_or_default();
            target.asn = asn.or(target.asn);
            target.router_id = router_id.or(target.router_id);
            let config = render(&scenario, &target.identity()?)?;
            match output {
                Some(path) => {
                    write_atomic(&path, &config)?;
                    info!("Configuration written to {}", path.display());
                }
                None => print!("{}", config),
            }
        }
        MainCommand::Startup { guest_dir } => println!("{}", Quagga.startup_cmd(&guest_dir)),
        MainCommand::Extract { template, input } => {
            let template = Template::parse(read_to_string(template)?)?;
            let records = template.extract(read_to_string(input)?)?;
            info!("Extracted {} records", records.len());
            let result = json!({"header": template.header(), "records": records});
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        MainCommand::Bench {
            scenario,
            host_dir,
            polls,
            interval,
            timeout,
            force_build,
            no_cache,
            tag,
            checkout,
            network,
            keep,
        } => {
            let build = BuildOptions { force: force_build, tag, checkout, no_cache };
            let options = BenchOptions { host_dir, polls, interval, timeout, network, keep };
            bench(ScenarioConfig::from_file(scenario)?, build, options)?
        }
    }

    Ok(())
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct CommandLineArguments {
    /// Action to perform
    #[command(subcommand)]
    cmd: MainCommand,
}

#[derive(Subcommand, Debug)]
enum MainCommand {
    /// Render the Quagga configuration of a scenario
    Render {
        /// Scenario file (JSON)
        #[arg(short, long)]
        scenario: PathBuf,
        /// AS number of the router under test. Overwrites the value of the scenario.
        #[arg(long = "as")]
        asn: Option<u32>,
        /// Router ID of the router under test. Overwrites the value of the scenario.
        #[arg(long)]
        router_id: Option<String>,
        /// Write the configuration to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the startup script of Quagga
    Startup {
        /// Directory in the container where the configuration is mounted
        #[arg(short, long, default_value = DEFAULT_GUEST_DIR)]
        guest_dir: String,
    },
    /// Parse a text file with an extraction template, and print the records as JSON
    Extract {
        /// Template file
        #[arg(short, long)]
        template: PathBuf,
        /// Text to parse
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Build, configure and start Quagga, and poll its neighbor state
    Bench {
        /// Scenario file (JSON)
        #[arg(short, long)]
        scenario: PathBuf,
        /// Directory where the configuration is written
        #[arg(short = 'd', long, default_value = "/tmp/bgperf")]
        host_dir: PathBuf,
        /// Number of polls
        #[arg(short = 'n', long, default_value_t = 10)]
        polls: usize,
        /// Time between two polls in seconds
        #[arg(short, long, default_value_t = 1.0)]
        interval: f64,
        /// Timeout of every command executed in the container, in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
        /// Build the image even if it already exists
        #[arg(short, long)]
        force_build: bool,
        /// Build the image without cache
        #[arg(long)]
        no_cache: bool,
        /// Tag of the image
        #[arg(long)]
        tag: Option<String>,
        /// Revision of the router sources
        #[arg(long, default_value = "HEAD")]
        checkout: String,
        /// Network to attach the container to
        #[arg(long)]
        network: Option<String>,
        /// Keep the container running after the last poll
        #[arg(short, long)]
        keep: bool,
    },
}
