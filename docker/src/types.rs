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

//! # Docker Types

use bollard::container::Config;
use bollard::service::HostConfig;
use std::fmt;
use std::path::PathBuf;

/// Handle of a started container
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Container {
    /// ID of the container, as returned by docker
    pub id: String,
    /// Name of the container
    pub name: String,
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Options to start a new container. The container is always started in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Name of the container
    pub name: String,
    /// Image (tag) from which to start
    pub image: String,
    /// Volumes to mount, as pairs of host path and guest path.
    pub volumes: Vec<(PathBuf, String)>,
    /// Start the container in privileged mode
    pub privileged: bool,
    /// Network to which the container is connected
    pub network: Option<String>,
    /// Command to execute. If empty, the default command of the image is used.
    pub command: Vec<String>,
}

impl RunOptions {
    /// Create new options for the container `name`, using the `image`.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            volumes: Vec::new(),
            privileged: true,
            network: None,
            command: Vec::new(),
        }
    }

    /// Mount a host directory into the container
    pub fn volume(mut self, host: impl Into<PathBuf>, guest: impl Into<String>) -> Self {
        self.volumes.push((host.into(), guest.into()));
        self
    }

    /// Set whether the container is privileged.
    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Connect the container to a network
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Set the command to execute
    pub fn command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    /// Container configuration passed to the daemon
    pub(crate) fn to_config(&self) -> Config<String> {
        let binds: Vec<String> = self
            .volumes
            .iter()
            .map(|(host, guest)| format!("{}:{}", host.display(), guest))
            .collect();
        Config {
            image: Some(self.image.clone()),
            cmd: if self.command.is_empty() { None } else { Some(self.command.clone()) },
            host_config: Some(HostConfig {
                privileged: Some(self.privileged),
                network_mode: self.network.clone(),
                binds: if binds.is_empty() { None } else { Some(binds) },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}
