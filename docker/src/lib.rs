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

//! # Docker Client
//!
//! This is a very simple crate to interact with the docker daemon, building images, starting
//! containers and executing commands inside of them. It talks to the daemon API using `bollard`,
//! but exposes a blocking interface.
//!
//! ```no_run
//! use docker::{ContainerRuntime, DockerClient, Dockerfile, RunOptions};
//! use std::time::Duration;
//!
//! fn main() -> Result<(), docker::Error> {
//!     let client = DockerClient::new()?;
//!
//!     // build the image
//!     let recipe = Dockerfile::from("ubuntu:latest").run("apt-get update");
//!     if !client.image_exists("example/ubuntu")? {
//!         client.build_image("example/ubuntu", &recipe, false)?;
//!     }
//!
//!     // start a container and execute something
//!     let container = client.run(&RunOptions::new("example", "example/ubuntu").command(vec![
//!         "sleep".to_string(),
//!         "infinity".to_string(),
//!     ]))?;
//!     let output = client.exec(&container, &["uname".to_string()], Duration::from_secs(5))?;
//!     println!("{}", output);
//!
//!     client.remove(&container)?;
//!     Ok(())
//! }
//! ```
#![deny(missing_docs)]

mod client;
mod dockerfile;
mod types;
pub use client::{ContainerRuntime, DockerClient};
pub use dockerfile::{Dockerfile, Instruction};
pub use types::*;

use std::time::Duration;
use thiserror::Error;

/// # Docker Error type
#[derive(Debug, Error)]
pub enum Error {
    /// IO Error, e.g., the async runtime cannot be created.
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    /// The docker daemon returned an error, or cannot be reached.
    #[error("Docker API error: {0}")]
    ApiError(#[from] bollard::errors::Error),
    /// The output of the command is not valid UTF-8
    #[error("Cannot decode the output: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
    /// The container or image does not exist.
    #[error("No such object: {0}")]
    NotFound(String),
    /// The command returned with a non-zero exit status
    #[error("Command `{cmd}` failed with exit code {code:?}:\n{stderr}")]
    CommandFailed {
        /// The command that was executed
        cmd: String,
        /// Exit code, if the daemon reported one.
        code: Option<i64>,
        /// Output written to stderr
        stderr: String,
    },
    /// The command did not finish in time, and was abandoned.
    #[error("Command `{cmd}` did not finish within {timeout:?}")]
    Timeout {
        /// The command that was executed
        cmd: String,
        /// The timeout that was exceeded
        timeout: Duration,
    },
}

impl Error {
    /// Returns `true` if the daemon reported that the container or image does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Docker Result type
pub type Result<T> = core::result::Result<T, Error>;
