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

#[cfg(test)]
mod test_adapter;

#[cfg(test)]
pub(crate) use mock::*;

#[cfg(test)]
mod mock {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    use docker::{Container, ContainerRuntime, Dockerfile, RunOptions};

    /// Scenario used by most tests: two testers with neighbors A, B and C, the monitor M, and
    /// three policies, the second one without any match clause.
    pub(crate) const SCENARIO: &str = r#"{
        "target": {"as": 1000, "router-id": "10.10.0.1", "local-address": "10.10.0.1"},
        "monitor": {"as": 1001, "local-address": "10.10.0.2", "check-points": [10]},
        "testers": {
            "tester1": {
                "neighbors": {
                    "A": {"as": 1002, "local-address": "10.10.0.3", "paths": 100,
                          "filter": {"in": ["p1", "p3"]}},
                    "B": {"as": 1003, "local-address": "10.10.0.4"}
                }
            },
            "tester2": {
                "neighbors": {
                    "C": {"as": 1004, "local-address": "10.10.0.5", "filter": {"in": []}}
                }
            }
        },
        "policy": {
            "p1": {"match": [
                {"type": "prefix", "value": ["10.0.0.0/8", "20.0.0.0/8"]},
                {"type": "geo", "value": ["eu"]},
                {"type": "as-path", "value": ["65001"]}
            ]},
            "p2": {"match": []},
            "p3": {"match": [
                {"type": "community", "value": ["100:1", "100:2"]},
                {"type": "ext-community", "value": ["rt:65000:100"]}
            ]}
        }
    }"#;

    /// Output of `sh ip bgp summary` with one established and one active session.
    pub(crate) const SUMMARY_OUTPUT: &str = "BGP router identifier 10.10.0.1, local AS number 1000
RIB entries 3, using 336 bytes of memory
Peers 2, using 9120 bytes of memory

Neighbor        V         AS MsgRcvd MsgSent   TblVer  InQ OutQ Up/Down  State/PfxRcd
10.10.0.3       4       1002      12      14        0    0    0 00:04:21        3
10.10.0.4       4       1003       2       3        0    0    0 00:00:12 Active

Total number of neighbors 2
";

    /// Response of the mock runtime to an exec call
    #[derive(Debug, Clone)]
    pub(crate) enum Response {
        Output(String),
        Fail(i64, String),
        Timeout,
    }

    /// Failure of the mock runtime when stopping or removing a container
    #[derive(Debug, Clone, Copy)]
    pub(crate) enum Failure {
        NotFound,
        Timeout,
    }

    /// Container runtime that records every call and answers exec calls from a table.
    #[derive(Debug, Default)]
    pub(crate) struct MockRuntime {
        pub calls: Mutex<Vec<String>>,
        pub images: Mutex<HashSet<String>>,
        pub responses: Mutex<HashMap<Vec<String>, Response>>,
        pub builds: Mutex<Vec<String>>,
        pub failures: Mutex<HashMap<&'static str, Failure>>,
    }

    impl MockRuntime {
        pub fn with_image(tag: &str) -> Self {
            let runtime = Self::default();
            runtime.images.lock().unwrap().insert(tag.to_string());
            runtime
        }

        pub fn respond(&self, cmd: &[&str], response: Response) {
            let cmd = cmd.iter().map(|s| s.to_string()).collect();
            self.responses.lock().unwrap().insert(cmd, response);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        /// Let every subsequent `stop` or `remove` call fail.
        pub fn fail(&self, operation: &'static str, failure: Failure) {
            self.failures.lock().unwrap().insert(operation, failure);
        }

        pub fn heal(&self, operation: &'static str) {
            self.failures.lock().unwrap().remove(operation);
        }

        fn injected(&self, operation: &'static str, container: &Container) -> docker::Result<()> {
            self.record(format!("{} {}", operation, container.name));
            match self.failures.lock().unwrap().get(operation) {
                None => Ok(()),
                Some(Failure::NotFound) => Err(docker::Error::NotFound(format!(
                    "No such container: {}",
                    container.name
                ))),
                Some(Failure::Timeout) => Err(docker::Error::Timeout {
                    cmd: format!("{} {}", operation, container.name),
                    timeout: Duration::from_secs(120),
                }),
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl ContainerRuntime for MockRuntime {
        fn image_exists(&self, tag: &str) -> docker::Result<bool> {
            self.record(format!("image_exists {}", tag));
            Ok(self.images.lock().unwrap().contains(tag))
        }

        fn build_image(
            &self,
            tag: &str,
            recipe: &Dockerfile,
            no_cache: bool,
        ) -> docker::Result<()> {
            self.record(format!("build {} no_cache={}", tag, no_cache));
            self.builds.lock().unwrap().push(recipe.to_string());
            self.images.lock().unwrap().insert(tag.to_string());
            Ok(())
        }

        fn run(&self, options: &RunOptions) -> docker::Result<Container> {
            self.record(format!("run {} {}", options.name, options.image));
            Ok(Container { id: format!("id-{}", options.name), name: options.name.clone() })
        }

        fn exec(
            &self,
            container: &Container,
            cmd: &[String],
            timeout: Duration,
        ) -> docker::Result<String> {
            self.record(format!("exec {} {}", container.name, cmd.join(" ")));
            match self.responses.lock().unwrap().get(cmd).cloned() {
                Some(Response::Output(s)) => Ok(s),
                Some(Response::Fail(code, stderr)) => Err(docker::Error::CommandFailed {
                    cmd: cmd.join(" "),
                    code: Some(code),
                    stderr,
                }),
                Some(Response::Timeout) | None => {
                    Err(docker::Error::Timeout { cmd: cmd.join(" "), timeout })
                }
            }
        }

        fn stop(&self, container: &Container) -> docker::Result<()> {
            self.injected("stop", container)
        }

        fn remove(&self, container: &Container) -> docker::Result<()> {
            self.injected("remove", container)
        }
    }
}
