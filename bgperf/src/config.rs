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

//! # Router Configuration Generator
//!
//! This module transforms a [`ScenarioConfig`] and the [`RouterIdentity`] of the router under test
//! into a `bgpd` configuration. The configuration is first built as a sequence of typed
//! [`Stanza`]s, and only turned into text lines at the very end. The order of the stanzas is:
//!
//! 1. The [`Header`].
//! 2. One [`NeighborBlock`] per neighbor of all testers (tester order, then neighbor order), and
//!    the monitor last.
//! 3. For every policy in declaration order, the [`MatchList`]s of all its match clauses followed
//!    by its [`RouteMapStanza`]. Route-maps have sequence numbers 10, 20, 30, ...
//!
//! Rendering the same input twice produces byte-identical output.

use std::fmt;
use std::io::{BufWriter, Write};
use std::path::Path;

use itertools::Itertools;
use log::*;
use tempfile::NamedTempFile;

use crate::scenario::{MatchClause, MatchType, NeighborSpec, RouterIdentity, ScenarioConfig};
use crate::ConfigRenderError;

/// Hostname written into the header
pub const HOSTNAME: &str = "bgpd";
/// Password written into the header
pub const PASSWORD: &str = "zebra";
/// Sequence number of the first route-map, and the step between two route-maps
pub const ROUTE_MAP_SEQ_STEP: u32 = 10;

/// Render the configuration of the router under test. Nothing is written to disk.
pub fn render(
    scenario: &ScenarioConfig,
    identity: &RouterIdentity,
) -> Result<RenderedConfig, ConfigRenderError> {
    if identity.router_id.trim().is_empty() {
        return Err(ConfigRenderError::MissingIdentity("router-id"));
    }

    let mut stanzas = vec![Stanza::Header(Header::new(identity))];
    stanzas.extend(scenario.neighbors().map(|n| Stanza::Neighbor(NeighborBlock::new(n))));

    let seqs = (1..).map(|i| i * ROUTE_MAP_SEQ_STEP);
    for (seq, (policy, spec)) in seqs.zip(scenario.policies()) {
        let mut route_map = RouteMapStanza::new(policy, seq);
        for (i, clause) in spec.matches.iter().enumerate() {
            let name = format!("{}_match_{}", policy, i);
            match MatchList::new(policy, name, clause)? {
                Some(list) => {
                    route_map.matches.push((list.kind, list.name.clone()));
                    stanzas.push(Stanza::MatchList(list));
                }
                None => debug!("Policy {}: ignoring match of type {:?}", policy, clause.kind),
            }
        }
        stanzas.push(Stanza::RouteMap(route_map));
    }

    Ok(RenderedConfig { stanzas })
}

/// Write `content` to `path` atomically: the content is written to a fresh temporary file in the
/// same directory, flushed and synced, and then renamed to `path`. If anything fails, `path` is
/// left untouched and the temporary file is removed.
pub fn write_atomic(path: impl AsRef<Path>, content: impl fmt::Display) -> std::io::Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    trace!("Writing {} through {}", path.display(), file.path().display());
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        write!(writer, "{}", content)?;
        writer.flush()?;
    }
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}

/// Rendered configuration, as an ordered sequence of stanzas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    stanzas: Vec<Stanza>,
}

impl RenderedConfig {
    /// All stanzas, in order
    pub fn stanzas(&self) -> &[Stanza] {
        &self.stanzas
    }

    /// Flat text lines of the configuration, without line terminators
    pub fn lines(&self) -> Vec<String> {
        self.stanzas.iter().flat_map(|s| s.lines()).collect()
    }

    /// Addresses of all configured neighbors, in the order of their blocks
    pub fn neighbor_addrs(&self) -> Vec<&str> {
        self.stanzas
            .iter()
            .filter_map(|s| match s {
                Stanza::Neighbor(n) => Some(n.addr.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Name and sequence number of all route-maps
    pub fn route_maps(&self) -> Vec<(&str, u32)> {
        self.stanzas
            .iter()
            .filter_map(|s| match s {
                Stanza::RouteMap(r) => Some((r.name.as_str(), r.seq)),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for RenderedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.lines().iter().try_for_each(|l| writeln!(f, "{}", l))
    }
}

/// A block of the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stanza {
    /// Header of the configuration, including the `router bgp` line
    Header(Header),
    /// Neighbor configuration
    Neighbor(NeighborBlock),
    /// Prefix list, AS path access list, community list or extended community list
    MatchList(MatchList),
    /// Route-map entry
    RouteMap(RouteMapStanza),
}

impl Stanza {
    /// Text lines of this stanza
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Header(h) => h.lines(),
            Self::Neighbor(n) => n.lines(),
            Self::MatchList(m) => m.lines(),
            Self::RouteMap(r) => r.lines(),
        }
    }
}

/// Configuration header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Hostname
    pub hostname: String,
    /// Password for the vty
    pub password: String,
    /// AS number
    pub asn: u32,
    /// Router ID
    pub router_id: String,
}

impl Header {
    fn new(identity: &RouterIdentity) -> Self {
        Self {
            hostname: HOSTNAME.to_string(),
            password: PASSWORD.to_string(),
            asn: identity.asn,
            router_id: identity.router_id.clone(),
        }
    }

    fn lines(&self) -> Vec<String> {
        vec![
            format!("hostname {}", self.hostname),
            format!("password {}", self.password),
            format!("router bgp {}", self.asn),
            format!("bgp router-id {}", self.router_id),
        ]
    }
}

/// Configuration of a single neighbor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborBlock {
    /// Address of the neighbor
    pub addr: String,
    /// AS number of the neighbor
    pub remote_as: u32,
    /// Advertisement interval in seconds
    pub advertisement_interval: u32,
    /// Keepalive timer in seconds
    pub keepalive: u32,
    /// Hold timer in seconds
    pub hold: u32,
    /// Route-maps applied to the neighbor
    pub route_maps: Vec<String>,
}

impl NeighborBlock {
    fn new(spec: &NeighborSpec) -> Self {
        Self {
            addr: spec.local_address.clone(),
            remote_as: spec.asn,
            advertisement_interval: 1,
            keepalive: 30,
            hold: 90,
            route_maps: spec.filter_in().to_vec(),
        }
    }

    fn lines(&self) -> Vec<String> {
        let addr = &self.addr;
        let mut lines = vec![
            format!("neighbor {} remote-as {}", addr, self.remote_as),
            format!("neighbor {} advertisement-interval {}", addr, self.advertisement_interval),
            format!("neighbor {} route-server-client", addr),
            format!("neighbor {} timers {} {}", addr, self.keepalive, self.hold),
        ];
        lines.extend(
            self.route_maps.iter().map(|p| format!("neighbor {} route-map {} export", addr, p)),
        );
        lines
    }
}

/// Kind of a match list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchListKind {
    /// `ip prefix-list`
    PrefixList,
    /// `ip as-path access-list`
    AsPathAccessList,
    /// `ip community-list standard`
    CommunityList,
    /// `ip extcommunity-list standard`
    ExtCommunityList,
}

impl MatchListKind {
    /// Command that declares an entry of a list with this kind
    pub fn list_cmd(&self) -> &'static str {
        match self {
            Self::PrefixList => "ip prefix-list",
            Self::AsPathAccessList => "ip as-path access-list",
            Self::CommunityList => "ip community-list standard",
            Self::ExtCommunityList => "ip extcommunity-list standard",
        }
    }

    /// Command that references a list of this kind inside a route-map
    pub fn match_cmd(&self) -> &'static str {
        match self {
            Self::PrefixList => "match ip address prefix-list",
            Self::AsPathAccessList => "match as-path",
            Self::CommunityList => "match community",
            Self::ExtCommunityList => "match extcommunity",
        }
    }
}

/// Whether an entry permits or denies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListAction {
    /// `permit`
    Permit,
    /// `deny`
    Deny,
}

impl fmt::Display for ListAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permit => write!(f, "permit"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

/// A named list generated from a single match clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchList {
    /// Name of the list
    pub name: String,
    /// Kind of the list
    pub kind: MatchListKind,
    /// Entries of the list, in order
    pub entries: Vec<(ListAction, String)>,
}

impl MatchList {
    /// Build the list for a match clause. Returns `Ok(None)` if the match type is not known.
    fn new(
        policy: &str,
        name: String,
        clause: &MatchClause,
    ) -> Result<Option<Self>, ConfigRenderError> {
        use ListAction::*;
        let values = clause.value.iter();
        let (kind, entries): (_, Vec<_>) = match &clause.kind {
            MatchType::Prefix => (
                MatchListKind::PrefixList,
                values
                    .map(|p| (Deny, p.clone()))
                    .chain(std::iter::once((Permit, "any".to_string())))
                    .collect(),
            ),
            MatchType::AsPath => (
                MatchListKind::AsPathAccessList,
                values
                    .map(|a| (Deny, format!("_{}_", a)))
                    .chain(std::iter::once((Permit, ".*".to_string())))
                    .collect(),
            ),
            MatchType::Community => {
                (MatchListKind::CommunityList, values.map(|c| (Permit, c.clone())).collect())
            }
            MatchType::ExtCommunity => (
                MatchListKind::ExtCommunityList,
                values
                    .map(|c| match c.split_once(':') {
                        Some((kind, value)) => Ok((Permit, format!("{} {}", kind, value))),
                        None => Err(ConfigRenderError::InvalidExtCommunity {
                            policy: policy.to_string(),
                            value: c.clone(),
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            MatchType::Other(_) => return Ok(None),
        };
        Ok(Some(Self { name, kind, entries }))
    }

    fn lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(action, v)| format!("{} {} {} {}", self.kind.list_cmd(), self.name, action, v))
            .collect()
    }
}

/// Route-map entry of a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMapStanza {
    /// Name of the route-map (the policy name)
    pub name: String,
    /// Sequence number
    pub seq: u32,
    /// Lists referenced by match lines, in order
    pub matches: Vec<(MatchListKind, String)>,
}

impl RouteMapStanza {
    fn new(name: &str, seq: u32) -> Self {
        Self { name: name.to_string(), seq, matches: Vec::new() }
    }

    fn lines(&self) -> Vec<String> {
        std::iter::once(format!("route-map {} {} {}", self.name, ListAction::Permit, self.seq))
            .chain(self.matches.iter().map(|(kind, list)| format!("{} {}", kind.match_cmd(), list)))
            .collect()
    }
}

/// Human readable summary of a rendered config, used for logging.
pub(crate) fn summary(config: &RenderedConfig) -> String {
    format!(
        "{} neighbors [{}], route-maps [{}]",
        config.neighbor_addrs().len(),
        config.neighbor_addrs().iter().join(", "),
        config.route_maps().iter().map(|(n, s)| format!("{} {}", n, s)).join(", ")
    )
}
