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

use crate::{Container, Dockerfile, Error, Result, RunOptions};

use bollard::container::{
    CreateContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::BuildImageOptions;
use bollard::Docker;
use bytes::Bytes;
use futures::StreamExt;
use log::*;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Timeout for calls that have no explicit timeout, e.g., starting or stopping a container.
const DEFAULT_TIMEOUT_S: u64 = 120;
/// Building an image can take a long time.
const BUILD_TIMEOUT_S: u64 = 3600;
/// Seconds the daemon waits after SIGTERM before killing the container.
const STOP_GRACE_PERIOD_S: i64 = 10;

/// # Container Runtime
///
/// Boundary to the container runtime. All calls are blocking. Implementations must be thread
/// safe, because multiple routers are driven at the same time, all using the same runtime.
pub trait ContainerRuntime: fmt::Debug + Send + Sync {
    /// Check if an image with the given tag already exists.
    fn image_exists(&self, tag: &str) -> Result<bool>;

    /// Build an image from the recipe, and tag it.
    fn build_image(&self, tag: &str, recipe: &Dockerfile, no_cache: bool) -> Result<()>;

    /// Start a new container in the background.
    fn run(&self, options: &RunOptions) -> Result<Container>;

    /// Execute a command inside a running container, and return its standard output. If the
    /// command does not finish within `timeout`, [`Error::Timeout`] is returned.
    fn exec(&self, container: &Container, cmd: &[String], timeout: Duration) -> Result<String>;

    /// Stop a running container.
    fn stop(&self, container: &Container) -> Result<()>;

    /// Remove a container (also if it is still running).
    fn remove(&self, container: &Container) -> Result<()>;
}

/// # Docker Client
///
/// Implementation of [`ContainerRuntime`] talking to the local docker daemon. The client owns a
/// tokio runtime, on which every call is driven to completion.
pub struct DockerClient {
    docker: Docker,
    runtime: Runtime,
}

impl fmt::Debug for DockerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerClient").finish_non_exhaustive()
    }
}

impl DockerClient {
    /// Connect to the daemon using the local defaults (`DOCKER_HOST`, or the unix socket).
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
        let docker = {
            let _guard = runtime.enter();
            Docker::connect_with_local_defaults()?
        };
        Ok(Self { docker, runtime })
    }

    /// Drive `fut` on the runtime, giving up after `timeout`.
    fn call<T, F>(&self, cmd: &str, timeout: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        trace!("{}", cmd);
        self.runtime.block_on(with_timeout(cmd, timeout, fut)).map_err(not_found)
    }

    async fn exec_output(&self, container: &Container, cmd: &[String]) -> Result<ExecOutput> {
        let options = CreateExecOptions {
            cmd: Some(cmd.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };
        let exec = self.docker.create_exec(&container.name, options).await?;

        let mut output = ExecOutput::default();
        if let StartExecResults::Attached { output: mut stream, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = stream.next().await {
                match chunk? {
                    LogOutput::StdOut { message } => output.stdout.extend_from_slice(&message),
                    LogOutput::StdErr { message } => output.stderr.extend_from_slice(&message),
                    _ => {}
                }
            }
        }

        output.exit_code = self.docker.inspect_exec(&exec.id).await?.exit_code;
        Ok(output)
    }
}

/// Await `fut`, and return [`Error::Timeout`] if it does not complete within `timeout`.
async fn with_timeout<T, F>(cmd: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Command did not finish within {:?}: {}", timeout, cmd);
            Err(Error::Timeout { cmd: cmd.to_string(), timeout })
        }
    }
}

/// Map a 404 response of the daemon to [`Error::NotFound`].
fn not_found(e: Error) -> Error {
    match e {
        Error::ApiError(bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message,
        }) => Error::NotFound(message),
        e => e,
    }
}

/// Collected output of an exec instance
#[derive(Debug, Default)]
struct ExecOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<i64>,
}

impl ExecOutput {
    fn into_result(self, cmd: String) -> Result<String> {
        match self.exit_code {
            Some(0) => Ok(String::from_utf8(self.stdout)?),
            code => Err(Error::CommandFailed {
                cmd,
                code,
                stderr: String::from_utf8_lossy(&self.stderr).trim().to_string(),
            }),
        }
    }
}

/// The build context: a tar archive containing only the `Dockerfile`.
fn build_context(recipe: &Dockerfile) -> Result<Bytes> {
    let content = recipe.to_string();
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    let mut archive = tar::Builder::new(Vec::new());
    archive.append_data(&mut header, "Dockerfile", content.as_bytes())?;
    Ok(Bytes::from(archive.into_inner()?))
}

impl ContainerRuntime for DockerClient {
    fn image_exists(&self, tag: &str) -> Result<bool> {
        let cmd = format!("image inspect {}", tag);
        let inspect = async { Ok::<_, Error>(self.docker.inspect_image(tag).await?) };
        match self.call(&cmd, default_timeout(), inspect) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn build_image(&self, tag: &str, recipe: &Dockerfile, no_cache: bool) -> Result<()> {
        info!("Building image {}", tag);
        let context = build_context(recipe)?;
        let options = BuildImageOptions {
            dockerfile: "Dockerfile",
            t: tag,
            nocache: no_cache,
            rm: true,
            ..Default::default()
        };
        let cmd = format!("build {}", tag);
        self.call(&cmd, Duration::from_secs(BUILD_TIMEOUT_S), async {
            let mut stream = self.docker.build_image(options, None, Some(context));
            while let Some(info) = stream.next().await {
                let info = info?;
                if let Some(stderr) = info.error {
                    return Err(Error::CommandFailed { cmd: cmd.clone(), code: None, stderr });
                }
                if let Some(line) = info.stream {
                    debug!("{}", line.trim_end());
                }
            }
            Ok::<_, Error>(())
        })
    }

    fn run(&self, options: &RunOptions) -> Result<Container> {
        let name = options.name.as_str();
        let cmd = format!("run {} {}", name, options.image);
        let id = self.call(&cmd, default_timeout(), async {
            let create = CreateContainerOptions { name, platform: None };
            let response = self.docker.create_container(Some(create), options.to_config()).await?;
            self.docker.start_container(name, None::<StartContainerOptions<String>>).await?;
            Ok::<_, Error>(response.id)
        })?;
        info!("Started container {} ({})", name, id);
        Ok(Container { id, name: name.to_string() })
    }

    fn exec(&self, container: &Container, cmd: &[String], timeout: Duration) -> Result<String> {
        let cmd_str = format!("exec {} {}", container.name, cmd.join(" "));
        self.call(&cmd_str, timeout, self.exec_output(container, cmd))?.into_result(cmd_str)
    }

    fn stop(&self, container: &Container) -> Result<()> {
        let cmd = format!("stop {}", container.name);
        let options = StopContainerOptions { t: STOP_GRACE_PERIOD_S };
        self.call(&cmd, default_timeout(), async {
            Ok::<_, Error>(self.docker.stop_container(&container.name, Some(options)).await?)
        })?;
        info!("Stopped container {}", container.name);
        Ok(())
    }

    fn remove(&self, container: &Container) -> Result<()> {
        let cmd = format!("rm -f {}", container.name);
        let options = RemoveContainerOptions { force: true, ..Default::default() };
        self.call(&cmd, default_timeout(), async {
            Ok::<_, Error>(self.docker.remove_container(&container.name, Some(options)).await?)
        })?;
        debug!("Removed container {}", container.name);
        Ok(())
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(DEFAULT_TIMEOUT_S)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Read;
    use std::time::Instant;

    #[test]
    fn exec_output_success() {
        let output = ExecOutput {
            stdout: b"BGP router identifier 10.10.0.1\n".to_vec(),
            stderr: Vec::new(),
            exit_code: Some(0),
        };
        assert_eq!(
            output.into_result(String::from("vtysh")).unwrap(),
            "BGP router identifier 10.10.0.1\n"
        );
    }

    #[test]
    fn exec_output_failure() {
        let output =
            ExecOutput { stdout: Vec::new(), stderr: b"oops\n".to_vec(), exit_code: Some(3) };
        match output.into_result(String::from("vtysh")) {
            Err(Error::CommandFailed { cmd, code, stderr }) => {
                assert_eq!(cmd, "vtysh");
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "oops");
            }
            r => panic!("unexpected result: {:?}", r),
        }
    }

    #[test]
    fn exec_output_without_exit_code() {
        let output = ExecOutput::default();
        assert!(matches!(
            output.into_result(String::from("vtysh")),
            Err(Error::CommandFailed { code: None, .. })
        ));
    }

    #[test]
    fn exec_output_invalid_utf8() {
        let output =
            ExecOutput { stdout: vec![0xff, 0xfe], stderr: Vec::new(), exit_code: Some(0) };
        assert!(matches!(output.into_result(String::from("cat")), Err(Error::Utf8Error(_))));
    }

    #[tokio::test]
    async fn timeout_elapsed() {
        let now = Instant::now();
        let result = with_timeout("sleep 10", Duration::from_millis(200), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, Error>(())
        })
        .await;
        match result {
            Err(Error::Timeout { cmd, timeout }) => {
                assert_eq!(cmd, "sleep 10");
                assert_eq!(timeout, Duration::from_millis(200));
            }
            r => panic!("unexpected result: {:?}", r),
        }
        assert!(now.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn timeout_not_reached() {
        let result =
            with_timeout("echo", Duration::from_secs(5), async { Ok::<_, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn timeout_keeps_inner_error() {
        let result: Result<()> = with_timeout("false", Duration::from_secs(5), async {
            Err(Error::CommandFailed {
                cmd: String::from("false"),
                code: Some(1),
                stderr: String::new(),
            })
        })
        .await;
        assert!(matches!(result, Err(Error::CommandFailed { code: Some(1), .. })));
    }

    #[test]
    fn context_holds_dockerfile() {
        let recipe = Dockerfile::from("ubuntu:latest").run("apt-get update");
        let context = build_context(&recipe).unwrap();
        let mut archive = tar::Archive::new(context.as_ref());
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str(), Some("Dockerfile"));
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, recipe.to_string());
        assert!(entries.next().is_none());
    }

    #[test]
    fn not_found_response() {
        let missing = not_found(Error::from(bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: String::from("No such container: bgperf_quagga_target"),
        }));
        assert!(missing.is_not_found());
        assert_eq!(
            missing.to_string(),
            "No such object: No such container: bgperf_quagga_target"
        );
        let conflict = not_found(Error::from(bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            message: String::from("container is not running"),
        }));
        assert!(!conflict.is_not_found());
        assert!(matches!(conflict, Error::ApiError(_)));
        assert!(!Error::Timeout { cmd: String::new(), timeout: Duration::ZERO }.is_not_found());
    }
}
