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

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use maplit::btreemap;
use tempfile::tempdir;

use crate::adapter::*;
use crate::config::render;
use crate::quagga::{Quagga, CONTAINER_NAME, IMAGE_TAG};
use crate::scenario::{RouterIdentity, ScenarioConfig};
use crate::test::*;
use crate::{ConfigRenderError, Error, LifecycleError};

const VERSION_OUTPUT: &str =
    "Quagga 0.99.24.1 (bgpd).  \nCopyright 1996-2005 Kunihiro Ishiguro, et al.\n";

fn target(runtime: &Arc<MockRuntime>, host_dir: &Path) -> Target<Quagga> {
    Target::new(Quagga, runtime.clone(), TargetOptions::new(host_dir)).unwrap()
}

fn scenario() -> (ScenarioConfig, RouterIdentity) {
    let scenario = ScenarioConfig::from_json(SCENARIO).unwrap();
    let identity = scenario.identity().unwrap();
    (scenario, identity)
}

fn assert_lifecycle_error<T: std::fmt::Debug>(
    result: Result<T, Error>,
    operation: &'static str,
    state: LifecycleState,
) {
    match result {
        Err(Error::LifecycleError(e)) => assert_eq!(e, LifecycleError { operation, state }),
        r => panic!("expected a lifecycle error, got {:?}", r),
    }
}

#[test]
fn defaults() {
    let runtime = Arc::new(MockRuntime::default());
    let t = target(&runtime, Path::new("/tmp/unused"));
    assert_eq!(t.name(), CONTAINER_NAME);
    assert_eq!(t.image(), IMAGE_TAG);
    assert_eq!(t.state(), LifecycleState::Unbuilt);
    assert_eq!(t.config_path(), Path::new("/tmp/unused/bgpd.conf"));
    assert!(t.container().is_none());
    assert!(t.startup_cmd().contains("cp /root/config/bgpd.conf /etc/quagga/bgpd.conf"));
    assert!(runtime.calls().is_empty());
}

#[test]
fn out_of_order_calls() {
    let runtime = Arc::new(MockRuntime::default());
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("router");
    let (scenario, identity) = scenario();
    let mut t = target(&runtime, &dir);

    assert_lifecycle_error(
        t.write_config(&scenario, &identity),
        "write the config",
        LifecycleState::Unbuilt,
    );
    assert_lifecycle_error(t.start(), "start the router", LifecycleState::Unbuilt);
    assert_lifecycle_error(t.stop(), "stop the router", LifecycleState::Unbuilt);
    assert_lifecycle_error(t.exec_version_cmd(), "get the version", LifecycleState::Unbuilt);
    assert_lifecycle_error(
        t.neighbors_state(),
        "get the neighbors state",
        LifecycleState::Unbuilt,
    );

    t.build_image(&BuildOptions::default()).unwrap();
    assert_lifecycle_error(t.start(), "start the router", LifecycleState::ImageBuilt);

    assert!(!dir.exists());
    assert_eq!(t.state(), LifecycleState::ImageBuilt);
}

#[test]
fn build_skipped_if_image_exists() {
    let runtime = Arc::new(MockRuntime::with_image(IMAGE_TAG));
    let mut t = target(&runtime, Path::new("/tmp/unused"));
    t.build_image(&BuildOptions::default()).unwrap();
    assert_eq!(runtime.calls(), vec!["image_exists bgperf/quagga"]);
    assert!(runtime.builds.lock().unwrap().is_empty());
    assert_eq!(t.state(), LifecycleState::ImageBuilt);
}

#[test]
fn build_forced() {
    let runtime = Arc::new(MockRuntime::with_image(IMAGE_TAG));
    let mut t = target(&runtime, Path::new("/tmp/unused"));
    let opts = BuildOptions { force: true, no_cache: true, ..Default::default() };
    t.build_image(&opts).unwrap();
    assert_eq!(runtime.calls(), vec!["build bgperf/quagga no_cache=true"]);
    let builds = runtime.builds.lock().unwrap();
    assert_eq!(builds.len(), 1);
    assert!(builds[0].starts_with("FROM ubuntu:latest\n"));
}

#[test]
fn build_with_tag() {
    let runtime = Arc::new(MockRuntime::default());
    let mut t = target(&runtime, Path::new("/tmp/unused"));
    let opts = BuildOptions { tag: Some("bgperf/quagga:test".to_string()), ..Default::default() };
    t.build_image(&opts).unwrap();
    assert_eq!(t.image(), "bgperf/quagga:test");
    assert_eq!(
        runtime.calls(),
        vec!["image_exists bgperf/quagga:test", "build bgperf/quagga:test no_cache=false"]
    );
}

#[test]
fn full_lifecycle() {
    let runtime = Arc::new(MockRuntime::with_image(IMAGE_TAG));
    runtime.respond(&["vtysh", "-c", "show version"], Response::Output(VERSION_OUTPUT.into()));
    runtime.respond(&["vtysh", "-c", "sh ip bgp summary"], Response::Output(SUMMARY_OUTPUT.into()));
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("router");
    let (scenario, identity) = scenario();
    let mut t = target(&runtime, &dir);

    t.build_image(&BuildOptions::default()).unwrap();

    // configure
    let path = t.write_config(&scenario, &identity).unwrap();
    assert_eq!(path, dir.join("bgpd.conf"));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        render(&scenario, &identity).unwrap().to_string()
    );
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);
    assert_eq!(t.state(), LifecycleState::Configured);

    // start
    t.start().unwrap();
    assert_eq!(t.state(), LifecycleState::Running);
    assert_eq!(std::fs::read_to_string(t.startup_script_path()).unwrap(), t.startup_cmd());
    assert_eq!(t.container().map(|c| c.name.as_str()), Some(CONTAINER_NAME));
    assert_lifecycle_error(
        t.build_image(&BuildOptions::default()),
        "build the image",
        LifecycleState::Running,
    );
    assert_lifecycle_error(
        t.write_config(&scenario, &identity),
        "write the config",
        LifecycleState::Running,
    );

    // poll
    assert_eq!(t.exec_version_cmd().unwrap(), "Quagga 0.99.24.1 (bgpd).");
    let state = t.neighbors_state().unwrap();
    assert_eq!(state.accepted, btreemap! {"10.10.0.3".to_string() => 3});
    assert!(state.received.is_empty());

    // stop
    t.stop().unwrap();
    assert_eq!(t.state(), LifecycleState::Stopped);
    assert!(t.container().is_none());
    assert_lifecycle_error(t.neighbors_state(), "get the neighbors state", LifecycleState::Stopped);

    // reconfigure and restart
    t.write_config(&scenario, &identity).unwrap();
    assert_eq!(t.state(), LifecycleState::Configured);
    t.start().unwrap();
    assert_eq!(t.state(), LifecycleState::Running);

    assert_eq!(
        runtime.calls(),
        vec![
            "image_exists bgperf/quagga",
            "run bgperf_quagga_target bgperf/quagga",
            "exec bgperf_quagga_target vtysh -c show version",
            "exec bgperf_quagga_target vtysh -c sh ip bgp summary",
            "stop bgperf_quagga_target",
            "remove bgperf_quagga_target",
            "run bgperf_quagga_target bgperf/quagga",
        ]
    );

}

#[test]
fn exec_errors_are_recoverable() {
    let runtime = Arc::new(MockRuntime::with_image(IMAGE_TAG));
    runtime.respond(
        &["vtysh", "-c", "show version"],
        Response::Fail(1, "Exiting: failed to connect to any daemons.".into()),
    );
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("router");
    let (scenario, identity) = scenario();
    let mut t = target(&runtime, &dir);
    t.build_image(&BuildOptions::default()).unwrap();
    t.write_config(&scenario, &identity).unwrap();
    t.start().unwrap();

    match t.exec_version_cmd() {
        Err(e @ Error::ExecutionError(docker::Error::CommandFailed { .. })) => {
            assert!(e.is_recoverable())
        }
        r => panic!("expected a failed command, got {:?}", r),
    }
    match t.neighbors_state() {
        Err(e @ Error::ExecutionError(docker::Error::Timeout { .. })) => {
            assert!(e.is_recoverable())
        }
        r => panic!("expected a timeout, got {:?}", r),
    }

    // the adapter is still usable
    assert_eq!(t.state(), LifecycleState::Running);
    runtime.respond(&["vtysh", "-c", "sh ip bgp summary"], Response::Output(String::new()));
    assert_eq!(t.neighbors_state().unwrap(), NeighborsState::default());

}

#[test]
fn exec_timeout_is_forwarded() {
    let runtime = Arc::new(MockRuntime::with_image(IMAGE_TAG));
    runtime.respond(&["vtysh", "-c", "show version"], Response::Timeout);
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("router");
    let (scenario, identity) = scenario();
    let options =
        TargetOptions { exec_timeout: Duration::from_secs(5), ..TargetOptions::new(&dir) };
    let mut t = Target::new(Quagga, runtime.clone(), options).unwrap();
    t.build_image(&BuildOptions::default()).unwrap();
    t.write_config(&scenario, &identity).unwrap();
    t.start().unwrap();

    match t.exec_version_cmd() {
        Err(Error::ExecutionError(docker::Error::Timeout { timeout, .. })) => {
            assert_eq!(timeout, Duration::from_secs(5))
        }
        r => panic!("expected a timeout, got {:?}", r),
    }

}

fn running(runtime: &Arc<MockRuntime>, dir: &Path) -> Target<Quagga> {
    let (scenario, identity) = scenario();
    let mut t = target(runtime, dir);
    t.build_image(&BuildOptions::default()).unwrap();
    t.write_config(&scenario, &identity).unwrap();
    t.start().unwrap();
    t
}

#[test]
fn stop_container_removed_externally() {
    let runtime = Arc::new(MockRuntime::with_image(IMAGE_TAG));
    let tmp = tempdir().unwrap();
    let mut t = running(&runtime, tmp.path());
    runtime.fail("stop", Failure::NotFound);
    runtime.fail("remove", Failure::NotFound);

    t.stop().unwrap();
    assert_eq!(t.state(), LifecycleState::Stopped);
    assert!(t.container().is_none());
    assert_eq!(
        runtime.calls()[2..],
        ["stop bgperf_quagga_target", "remove bgperf_quagga_target"]
    );
}

#[test]
fn stop_failure_still_removes() {
    let runtime = Arc::new(MockRuntime::with_image(IMAGE_TAG));
    let tmp = tempdir().unwrap();
    let mut t = running(&runtime, tmp.path());
    runtime.fail("stop", Failure::Timeout);

    t.stop().unwrap();
    assert_eq!(t.state(), LifecycleState::Stopped);
    assert!(t.container().is_none());
    assert_eq!(runtime.calls().last().map(String::as_str), Some("remove bgperf_quagga_target"));
}

#[test]
fn remove_failure_keeps_running() {
    let runtime = Arc::new(MockRuntime::with_image(IMAGE_TAG));
    let tmp = tempdir().unwrap();
    let mut t = running(&runtime, tmp.path());
    runtime.fail("remove", Failure::Timeout);

    match t.stop() {
        Err(e @ Error::ExecutionError(docker::Error::Timeout { .. })) => {
            assert!(e.is_recoverable())
        }
        r => panic!("expected a timeout, got {:?}", r),
    }
    assert_eq!(t.state(), LifecycleState::Running);
    assert!(t.container().is_some());

    // retrying succeeds once the runtime recovers
    runtime.heal("remove");
    t.stop().unwrap();
    assert_eq!(t.state(), LifecycleState::Stopped);
}

#[test]
fn render_error_writes_nothing() {
    let runtime = Arc::new(MockRuntime::with_image(IMAGE_TAG));
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("router");
    let scenario = ScenarioConfig::from_json(
        r#"{
            "monitor": {"as": 1001, "local-address": "10.10.0.2"},
            "policy": {"p": {"match": [{"type": "ext-community", "value": ["65000"]}]}}
        }"#,
    )
    .unwrap();
    let identity = RouterIdentity::new(1000, "10.10.0.1").unwrap();
    let mut t = target(&runtime, &dir);
    t.build_image(&BuildOptions::default()).unwrap();

    match t.write_config(&scenario, &identity) {
        Err(Error::ConfigRenderError(ConfigRenderError::InvalidExtCommunity { .. })) => {}
        r => panic!("expected a render error, got {:?}", r),
    }
    assert!(!t.config_path().exists());
    assert_eq!(t.state(), LifecycleState::ImageBuilt);
}

#[test]
fn custom_name_and_guest_dir() {
    let runtime = Arc::new(MockRuntime::with_image(IMAGE_TAG));
    let options = TargetOptions {
        name: Some("quagga_2".to_string()),
        guest_dir: "/config".to_string(),
        ..TargetOptions::new("/tmp/unused")
    };
    let t = Target::new(Quagga, runtime, options).unwrap();
    assert_eq!(t.name(), "quagga_2");
    assert!(t.startup_cmd().contains("cp /config/bgpd.conf /etc/quagga/bgpd.conf"));
}

#[test]
fn adapters_as_trait_objects() {
    let runtime = Arc::new(MockRuntime::with_image(IMAGE_TAG));
    let adapters: Vec<Box<dyn RouterAdapter>> = vec![
        Box::new(target(&runtime, Path::new("/tmp/unused"))),
        Box::new(target(&runtime, Path::new("/tmp/unused"))),
    ];
    for a in adapters.iter() {
        assert_eq!(a.version_cmd(), vec!["vtysh", "-c", "show version"]);
        assert_eq!(a.state(), LifecycleState::Unbuilt);
    }
}
