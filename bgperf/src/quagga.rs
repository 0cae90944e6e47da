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

//! Quagga flavor: `bgpd` managed through `vtysh`.

use docker::Dockerfile;
use log::*;
use textfsm::Record;

use crate::adapter::{guest_path, NeighborsState, RouterFlavor};

/// Default tag of the Quagga image
pub const IMAGE_TAG: &str = "bgperf/quagga";
/// Default name of the Quagga container
pub const CONTAINER_NAME: &str = "bgperf_quagga_target";
/// File name of the configuration
pub const CONFIG_FILE_NAME: &str = "bgpd.conf";

/// Template parsing the output of `sh ip bgp summary`
pub const SHOW_BGP_TEXTFSM_TEMPLATE: &str = r"Value Neighbor (\d+.\d+.\d+.\d+.)
Value Spk (\d+)
Value AS (\d+)
Value MsgRcvd (\d+)
Value MsgSent (\d+)
Value TblVer (\d+)
Value InQ (\d+)
Value OutQ (\d+)
Value up_down (\d+:\d+:\d+)
Value St (\S+)

Start
  ^${Neighbor}\s+${Spk}+\s+${AS}+\s+${MsgRcvd}\s+${MsgSent}+\s+${TblVer}+\s+${InQ}\s+${OutQ}+\s+${up_down}+\s+${St} -> Record

EOF";

/// Field of the summary holding the neighbor address
const NEIGHBOR_FIELD: usize = 0;
/// Field of the summary holding the number of accepted prefixes. The last column of the summary
/// (`State/PfxRcd`) contains the session state instead, as long as the session is not established.
const ACCEPTED_FIELD: usize = 9;

/// The Quagga router
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quagga;

impl RouterFlavor for Quagga {
    fn name(&self) -> &'static str {
        "quagga"
    }

    fn default_tag(&self) -> &'static str {
        IMAGE_TAG
    }

    fn container_name(&self) -> &'static str {
        CONTAINER_NAME
    }

    fn config_file_name(&self) -> &'static str {
        CONFIG_FILE_NAME
    }

    /// Quagga is installed from the distribution packages, so `checkout` is ignored.
    fn image_recipe(&self, _checkout: &str) -> Dockerfile {
        Dockerfile::from("ubuntu:latest")
            .workdir("/root")
            .run("apt-get update; apt-get upgrade -y")
            .run("apt-get install -y quagga python3 python3-pip sudo")
            .run("pip3 install matplotlib jtextfsm")
            .run("mkdir /var/run/quagga && chown quagga:quagga /var/run/quagga")
            .run("mkdir /var/log/quagga && chown quagga:quagga /var/log/quagga")
            .run("chown -R quagga /etc/quagga")
            .env("PATH", "/usr/lib/quagga/:/sbin:/bin:/usr/sbin:/usr/bin")
    }

    fn startup_cmd(&self, guest_dir: &str) -> String {
        format!(
            "#!/bin/bash\nulimit -n 65536\ncp {} /etc/quagga/{}\nservice bgpd start",
            guest_path(guest_dir, CONFIG_FILE_NAME),
            CONFIG_FILE_NAME
        )
    }

    fn version_cmd(&self) -> Vec<String> {
        vec!["vtysh".to_string(), "-c".to_string(), "show version".to_string()]
    }

    fn neighbors_cmd(&self) -> Vec<String> {
        vec!["vtysh".to_string(), "-c".to_string(), "sh ip bgp summary".to_string()]
    }

    fn neighbors_template(&self) -> &'static str {
        SHOW_BGP_TEXTFSM_TEMPLATE
    }

    /// Only the accepted prefixes are available from the summary. `received` stays empty.
    fn parse_neighbors(&self, records: Vec<Record>) -> NeighborsState {
        let mut state = NeighborsState::default();
        for record in records {
            let neighbor = record.get(NEIGHBOR_FIELD).map(|n| n.trim()).unwrap_or_default();
            let accepted = record.get(ACCEPTED_FIELD).map(|x| x.trim()).unwrap_or_default();
            match accepted.parse::<u64>() {
                Ok(n) if !neighbor.is_empty() => {
                    state.accepted.insert(neighbor.to_string(), n);
                }
                _ => debug!("Skip neighbor {:?} in state {:?}", neighbor, accepted),
            }
        }
        state
    }
}
