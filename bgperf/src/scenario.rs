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

//! # Scenario
//!
//! The scenario describes the BGP sessions the router under test has to establish: the testers
//! with their neighbors, the monitor, and the policies applied to routes of the testers. It is
//! loaded from a JSON document and never modified afterwards.
//!
//! ```
//! use bgperf::scenario::ScenarioConfig;
//!
//! let scenario = ScenarioConfig::from_json(r#"{
//!     "monitor": {"as": 1001, "local-address": "10.10.0.2"},
//!     "testers": {"t1": {"neighbors": {"n1": {"as": 1002, "local-address": "10.10.0.3"}}}}
//! }"#).unwrap();
//! let addrs: Vec<&str> = scenario.neighbors().map(|n| n.local_address.as_str()).collect();
//! assert_eq!(addrs, vec!["10.10.0.3", "10.10.0.2"]);
//! ```

use std::fs::read_to_string;
use std::path::Path;

use indexmap::IndexMap;
use log::*;
use serde::{Deserialize, Serialize};

use crate::{ConfigRenderError, Error};

/// Complete description of a benchmark scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Identity of the router under test, if declared in the scenario.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetSpec>,
    /// The monitor, always configured as the last neighbor.
    pub monitor: NeighborSpec,
    /// Testers, in declaration order.
    #[serde(default)]
    pub testers: IndexMap<String, TesterSpec>,
    /// Policies, in declaration order.
    #[serde(default, rename = "policy", skip_serializing_if = "Option::is_none")]
    pub policies: Option<IndexMap<String, PolicySpec>>,
}

impl ScenarioConfig {
    /// Parse the scenario from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse the scenario file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        debug!("Loading scenario from {}", path.display());
        Self::from_json(&read_to_string(path)?)
    }

    /// Iterate over all neighbors of the router under test: first the neighbors of all testers
    /// (tester order, then neighbor order), and the monitor last.
    pub fn neighbors(&self) -> impl Iterator<Item = &NeighborSpec> {
        self.testers
            .values()
            .flat_map(|t| t.neighbors.values())
            .chain(std::iter::once(&self.monitor))
    }

    /// Iterate over all policies in declaration order. Yields nothing if no policy is declared.
    pub fn policies(&self) -> impl Iterator<Item = (&str, &PolicySpec)> {
        self.policies.iter().flat_map(|p| p.iter().map(|(name, spec)| (name.as_str(), spec)))
    }

    /// Get the identity of the router under test from the `target` section.
    pub fn identity(&self) -> Result<RouterIdentity, ConfigRenderError> {
        match self.target.as_ref() {
            Some(target) => target.identity(),
            None => Err(ConfigRenderError::MissingIdentity("as")),
        }
    }
}

/// A tester and the neighbors it emulates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TesterSpec {
    /// Neighbors of this tester, in declaration order.
    #[serde(default)]
    pub neighbors: IndexMap<String, NeighborSpec>,
}

/// A single BGP neighbor of the router under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborSpec {
    /// Address of the neighbor, as seen by the router under test.
    #[serde(rename = "local-address")]
    pub local_address: String,
    /// AS number of the neighbor
    #[serde(rename = "as")]
    pub asn: u32,
    /// Filter applied to the neighbor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterSpec>,
}

impl NeighborSpec {
    /// Names of the policies applied to routes of this neighbor, in declaration order.
    pub fn filter_in(&self) -> &[String] {
        self.filter.as_ref().map(|f| f.inbound.as_slice()).unwrap_or_default()
    }
}

/// Filter of a neighbor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Policy names
    #[serde(default, rename = "in")]
    pub inbound: Vec<String>,
}

/// Policy, made of a sequence of match clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySpec {
    /// Match clauses, in declaration order
    #[serde(default, rename = "match")]
    pub matches: Vec<MatchClause>,
}

/// Single match clause of a policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchClause {
    /// Kind of the match
    #[serde(rename = "type")]
    pub kind: MatchType,
    /// Values to match
    #[serde(default)]
    pub value: Vec<String>,
}

/// Kind of a match clause. Types that are not known are kept as [`MatchType::Other`], such that the
/// scenario can still be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MatchType {
    /// `prefix`
    Prefix,
    /// `as-path`
    AsPath,
    /// `community`
    Community,
    /// `ext-community`
    ExtCommunity,
    /// Any other type
    Other(String),
}

impl From<String> for MatchType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "prefix" => Self::Prefix,
            "as-path" => Self::AsPath,
            "community" => Self::Community,
            "ext-community" => Self::ExtCommunity,
            _ => Self::Other(s),
        }
    }
}

impl From<MatchType> for String {
    fn from(t: MatchType) -> Self {
        match t {
            MatchType::Prefix => "prefix".to_string(),
            MatchType::AsPath => "as-path".to_string(),
            MatchType::Community => "community".to_string(),
            MatchType::ExtCommunity => "ext-community".to_string(),
            MatchType::Other(s) => s,
        }
    }
}

/// Identity of the router under test, as declared in the scenario. Both fields are optional while
/// loading, and checked only when the identity is needed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// AS number
    #[serde(default, rename = "as", skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    /// Router ID
    #[serde(default, rename = "router-id", skip_serializing_if = "Option::is_none")]
    pub router_id: Option<String>,
    /// Address of the router under test
    #[serde(default, rename = "local-address", skip_serializing_if = "Option::is_none")]
    pub local_address: Option<String>,
}

impl TargetSpec {
    /// Check that both the AS number and the router ID are present.
    pub fn identity(&self) -> Result<RouterIdentity, ConfigRenderError> {
        let asn = self.asn.ok_or(ConfigRenderError::MissingIdentity("as"))?;
        let router_id = self.router_id.as_deref().unwrap_or_default();
        RouterIdentity::new(asn, router_id)
    }
}

/// Identity of the router under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouterIdentity {
    /// AS number
    pub asn: u32,
    /// Router ID
    pub router_id: String,
}

impl RouterIdentity {
    /// Create a new identity. Fails if the router id is empty.
    pub fn new(asn: u32, router_id: impl Into<String>) -> Result<Self, ConfigRenderError> {
        let router_id = router_id.into();
        if router_id.trim().is_empty() {
            return Err(ConfigRenderError::MissingIdentity("router-id"));
        }
        Ok(Self { asn, router_id })
    }
}
