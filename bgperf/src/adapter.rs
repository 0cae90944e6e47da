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

//! # Router Adapter
//!
//! A router adapter drives one router implementation through its lifecycle:
//!
//! ```text
//! Unbuilt -> ImageBuilt -> Configured -> Running -> Stopped
//!                              ^                       |
//!                              +-----------------------+
//! ```
//!
//! The orchestrator only sees the object-safe [`RouterAdapter`] trait. Every router implementation
//! is described by a [`RouterFlavor`] (image recipe, startup script, commands and the template to
//! parse their output), and driven by the generic [`Target`].

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use docker::{Container, ContainerRuntime, Dockerfile, RunOptions};
use log::*;
use serde::Serialize;
use textfsm::{Record, Template};

use crate::config::{self, RenderedConfig};
use crate::scenario::{RouterIdentity, ScenarioConfig};
use crate::{ConfigRenderError, Error, LifecycleError};

/// Default timeout for executing a command inside the container
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(30);
/// Default directory inside the container where the host directory is mounted
pub const DEFAULT_GUEST_DIR: &str = "/root/config";
/// File name of the startup script, next to the configuration
pub const STARTUP_SCRIPT_NAME: &str = "start.sh";

/// Lifecycle state of a router adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LifecycleState {
    /// The image is not yet built
    Unbuilt,
    /// The image exists, but no configuration is written
    ImageBuilt,
    /// The configuration is written, but the container is not running
    Configured,
    /// The container is running
    Running,
    /// The container was stopped and removed
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbuilt => write!(f, "unbuilt"),
            Self::ImageBuilt => write!(f, "image-built"),
            Self::Configured => write!(f, "configured"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Options for building the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Build the image even if the tag already exists
    pub force: bool,
    /// Tag of the image. If `None`, the tag of the target options is used.
    pub tag: Option<String>,
    /// Revision of the router sources, for flavors that build from source
    pub checkout: String,
    /// Do not use the cache of the container runtime
    pub no_cache: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { force: false, tag: None, checkout: "HEAD".to_string(), no_cache: false }
    }
}

/// BGP neighbor state, obtained by a single poll. The values are never merged with earlier polls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NeighborsState {
    /// Number of prefixes received from each neighbor
    pub received: BTreeMap<String, u64>,
    /// Number of prefixes accepted from each neighbor
    pub accepted: BTreeMap<String, u64>,
}

/// Capabilities of a router adapter. The orchestrator holds a `Vec<Box<dyn RouterAdapter>>`.
pub trait RouterAdapter: fmt::Debug + Send + Sync {
    /// Name of the adapter (the container name)
    fn name(&self) -> &str;

    /// Current lifecycle state
    fn state(&self) -> LifecycleState;

    /// Build the image of the router. The build is skipped if the image already exists, unless
    /// `opts.force` is set. Not allowed while the router is running.
    fn build_image(&mut self, opts: &BuildOptions) -> Result<(), Error>;

    /// Render the configuration and persist it in the host directory. Returns the path of the
    /// written file. Allowed after the image is built, and whenever the router is not running.
    fn write_config(
        &mut self,
        scenario: &ScenarioConfig,
        identity: &RouterIdentity,
    ) -> Result<PathBuf, Error>;

    /// Script that starts the daemon inside the container.
    fn startup_cmd(&self) -> String;

    /// Command that prints the version of the router.
    fn version_cmd(&self) -> Vec<String>;

    /// Execute the version command and return the first line of its output, trimmed.
    fn exec_version_cmd(&self) -> Result<String, Error>;

    /// Poll the neighbor state of the running router.
    fn neighbors_state(&self) -> Result<NeighborsState, Error>;

    /// Start the container. Requires a written configuration.
    fn start(&mut self) -> Result<(), Error>;

    /// Stop and remove the container. A container that no longer exists counts as stopped.
    fn stop(&mut self) -> Result<(), Error>;
}

/// Static description of a router implementation.
pub trait RouterFlavor: fmt::Debug + Send + Sync {
    /// Name of the flavor, used for logging
    fn name(&self) -> &'static str;

    /// Default tag of the image
    fn default_tag(&self) -> &'static str;

    /// Default name of the container
    fn container_name(&self) -> &'static str;

    /// File name of the configuration, both on the host and in the guest directory
    fn config_file_name(&self) -> &'static str;

    /// Recipe of the image
    fn image_recipe(&self, checkout: &str) -> Dockerfile;

    /// Render the configuration.
    fn render_config(
        &self,
        scenario: &ScenarioConfig,
        identity: &RouterIdentity,
    ) -> Result<RenderedConfig, ConfigRenderError> {
        config::render(scenario, identity)
    }

    /// Startup script, given the directory in the guest where the configuration is mounted.
    fn startup_cmd(&self, guest_dir: &str) -> String;

    /// Command printing the version
    fn version_cmd(&self) -> Vec<String>;

    /// Command printing the neighbor summary
    fn neighbors_cmd(&self) -> Vec<String>;

    /// Template used to parse the output of the neighbor summary
    fn neighbors_template(&self) -> &'static str;

    /// Build the neighbor state from the records extracted from the summary.
    fn parse_neighbors(&self, records: Vec<Record>) -> NeighborsState;
}

/// Options of a [`Target`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOptions {
    /// Directory on the host where the configuration and the startup script are written
    pub host_dir: PathBuf,
    /// Directory in the container where `host_dir` is mounted
    pub guest_dir: String,
    /// Name of the container. If `None`, the default name of the flavor is used.
    pub name: Option<String>,
    /// Tag of the image. If `None`, the default tag of the flavor is used.
    pub tag: Option<String>,
    /// Network the container is attached to
    pub network: Option<String>,
    /// Timeout for every command executed inside the container
    pub exec_timeout: Duration,
}

impl TargetOptions {
    /// Create the default options for a given host directory.
    pub fn new(host_dir: impl Into<PathBuf>) -> Self {
        Self {
            host_dir: host_dir.into(),
            guest_dir: DEFAULT_GUEST_DIR.to_string(),
            name: None,
            tag: None,
            network: None,
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
        }
    }
}

/// Router adapter for a given flavor, running in a container.
#[derive(Debug)]
pub struct Target<F: RouterFlavor> {
    flavor: F,
    name: String,
    image: String,
    host_dir: PathBuf,
    guest_dir: String,
    network: Option<String>,
    exec_timeout: Duration,
    runtime: Arc<dyn ContainerRuntime>,
    template: Arc<Template>,
    container: Option<Container>,
    state: LifecycleState,
}

impl<F: RouterFlavor> Target<F> {
    /// Create a new target. The template of the flavor is compiled here, such that a malformed
    /// template is detected before anything else happens.
    pub fn new(
        flavor: F,
        runtime: Arc<dyn ContainerRuntime>,
        options: TargetOptions,
    ) -> Result<Self, Error> {
        let template = Arc::new(Template::parse(flavor.neighbors_template())?);
        Ok(Self::with_template(flavor, runtime, template, options))
    }

    /// Create a new target using an already compiled template, shared with other targets.
    pub fn with_template(
        flavor: F,
        runtime: Arc<dyn ContainerRuntime>,
        template: Arc<Template>,
        options: TargetOptions,
    ) -> Self {
        Self {
            name: options.name.unwrap_or_else(|| flavor.container_name().to_string()),
            image: options.tag.unwrap_or_else(|| flavor.default_tag().to_string()),
            host_dir: options.host_dir,
            guest_dir: options.guest_dir,
            network: options.network,
            exec_timeout: options.exec_timeout,
            flavor,
            runtime,
            template,
            container: None,
            state: LifecycleState::Unbuilt,
        }
    }

    /// Tag of the image used to start the container
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Path of the configuration file on the host
    pub fn config_path(&self) -> PathBuf {
        self.host_dir.join(self.flavor.config_file_name())
    }

    /// Path of the startup script on the host
    pub fn startup_script_path(&self) -> PathBuf {
        self.host_dir.join(STARTUP_SCRIPT_NAME)
    }

    /// Handle of the running container
    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    /// The flavor
    pub fn flavor(&self) -> &F {
        &self.flavor
    }

    fn require(
        &self,
        operation: &'static str,
        allowed: &[LifecycleState],
    ) -> Result<(), LifecycleError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(LifecycleError { operation, state: self.state })
        }
    }

    fn running_container(&self, operation: &'static str) -> Result<&Container, LifecycleError> {
        self.require(operation, &[LifecycleState::Running])?;
        self.container.as_ref().ok_or(LifecycleError { operation, state: self.state })
    }

    fn exec(&self, operation: &'static str, cmd: &[String]) -> Result<String, Error> {
        let container = self.running_container(operation)?;
        trace!("{}: exec {:?}", self.name, cmd);
        Ok(self.runtime.exec(container, cmd, self.exec_timeout)?)
    }
}

impl<F: RouterFlavor> RouterAdapter for Target<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> LifecycleState {
        self.state
    }

    fn build_image(&mut self, opts: &BuildOptions) -> Result<(), Error> {
        use LifecycleState::*;
        self.require("build the image", &[Unbuilt, ImageBuilt, Configured, Stopped])?;
        if let Some(tag) = opts.tag.as_ref() {
            self.image = tag.clone();
        }

        if !opts.force && self.runtime.image_exists(&self.image)? {
            info!("{}: image {} already exists, skip build", self.name, self.image);
        } else {
            info!("{}: building {} image {}", self.name, self.flavor.name(), self.image);
            let recipe = self.flavor.image_recipe(&opts.checkout);
            self.runtime.build_image(&self.image, &recipe, opts.no_cache)?;
        }

        if self.state == Unbuilt {
            self.state = ImageBuilt;
        }
        Ok(())
    }

    fn write_config(
        &mut self,
        scenario: &ScenarioConfig,
        identity: &RouterIdentity,
    ) -> Result<PathBuf, Error> {
        use LifecycleState::*;
        self.require("write the config", &[ImageBuilt, Configured, Stopped])?;
        let rendered = self.flavor.render_config(scenario, identity)?;
        debug!("{}: rendered config with {}", self.name, config::summary(&rendered));

        fs::create_dir_all(&self.host_dir)?;
        let path = self.config_path();
        config::write_atomic(&path, &rendered)?;
        info!("{}: config written to {}", self.name, path.display());

        self.state = Configured;
        Ok(path)
    }

    fn startup_cmd(&self) -> String {
        self.flavor.startup_cmd(&self.guest_dir)
    }

    fn version_cmd(&self) -> Vec<String> {
        self.flavor.version_cmd()
    }

    fn exec_version_cmd(&self) -> Result<String, Error> {
        let output = self.exec("get the version", &self.flavor.version_cmd())?;
        Ok(output.lines().next().unwrap_or_default().trim().to_string())
    }

    fn neighbors_state(&self) -> Result<NeighborsState, Error> {
        let output = self.exec("get the neighbors state", &self.flavor.neighbors_cmd())?;
        let records = self.template.extract(&output)?;
        trace!("{}: extracted {} neighbor records", self.name, records.len());
        Ok(self.flavor.parse_neighbors(records))
    }

    fn start(&mut self) -> Result<(), Error> {
        self.require("start the router", &[LifecycleState::Configured])?;
        let script = self.startup_script_path();
        config::write_atomic(&script, self.startup_cmd())?;

        // docker only mounts absolute host paths
        let host_dir = fs::canonicalize(&self.host_dir)?;
        let entrypoint = guest_path(&self.guest_dir, STARTUP_SCRIPT_NAME);
        let mut options = RunOptions::new(&self.name, &self.image)
            .volume(host_dir, &self.guest_dir)
            .command(vec![
                "bash".to_string(),
                "-c".to_string(),
                format!("bash {} && sleep infinity", entrypoint),
            ]);
        if let Some(network) = self.network.as_ref() {
            options = options.network(network);
        }

        info!("{}: starting container from image {}", self.name, self.image);
        let container = self.runtime.run(&options)?;
        debug!("{}: container {} is running", self.name, container);
        self.container = Some(container);
        self.state = LifecycleState::Running;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        let container = self.running_container("stop the router")?;
        info!("{}: stopping container {}", self.name, container);
        // remove forcefully, even if the container did not stop gracefully
        match self.runtime.stop(container) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => warn!("{}: container {} is gone", self.name, container),
            Err(e) => warn!("{}: cannot stop container {}: {}", self.name, container, e),
        }
        match self.runtime.remove(container) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!("{}: container {} is gone", self.name, container),
            Err(e) => return Err(e.into()),
        }
        self.container = None;
        self.state = LifecycleState::Stopped;
        Ok(())
    }
}

/// Join a directory and a file name inside the guest, which always uses forward slashes.
pub(crate) fn guest_path(dir: &str, file: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), file)
}
