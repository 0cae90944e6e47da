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

//! Module containing all error types

use crate::adapter::LifecycleState;
use textfsm::{ExtractError, TemplateError};
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// The extraction template is malformed. The adapter cannot be used.
    #[error("Template Error: {0}")]
    TemplateError(#[from] TemplateError),
    /// The output of the router could not be parsed
    #[error("Cannot parse the router output: {0}")]
    ExtractError(#[from] ExtractError),
    /// The configuration cannot be rendered
    #[error("Config Error: {0}")]
    ConfigRenderError(#[from] ConfigRenderError),
    /// An operation was called in the wrong state
    #[error("Lifecycle Error: {0}")]
    LifecycleError(#[from] LifecycleError),
    /// Executing a command in the container failed, or did not finish in time.
    #[error("Execution Error: {0}")]
    ExecutionError(#[from] docker::Error),
    /// IO Error while writing files for the container
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    /// The scenario file cannot be parsed
    #[error("Cannot parse the scenario: {0}")]
    ScenarioError(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if the error does not invalidate the adapter. Executing the operation again
    /// might succeed. All other errors are fatal for the adapter.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ExecutionError(_) | Self::ExtractError(_))
    }
}

/// Error while rendering the configuration. It is always raised before any file is written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigRenderError {
    /// A field of the router identity is missing or empty
    #[error("The router identity is missing the field `{0}`")]
    MissingIdentity(&'static str),
    /// An extended community without a colon
    #[error("Policy {policy}: extended community `{value}` must have the form `<type>:<value>`")]
    InvalidExtCommunity {
        /// Name of the policy
        policy: String,
        /// The offending value
        value: String,
    },
}

/// An operation was called before its preceding lifecycle step.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Cannot {operation} while the router is {state}")]
pub struct LifecycleError {
    /// Operation that was called
    pub operation: &'static str,
    /// State of the adapter at the time of the call
    pub state: LifecycleState,
}
