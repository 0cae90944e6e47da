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

//! # TextFSM Templates
//!
//! This is a small crate to extract structured records from the semi-structured output of router
//! command line interfaces, using the template language of TextFSM. A template declares the
//! values to capture, followed by a set of states with line rules:
//!
//! ```text
//! Value Neighbor (\d+\.\d+\.\d+\.\d+)
//! Value State (\S+)
//!
//! Start
//!   ^${Neighbor}\s+${State} -> Record
//!
//! EOF
//! ```
//!
//! The template is parsed once, and can then be used (also from multiple threads at the same time)
//! to extract records from any number of inputs:
//!
//! ```
//! use textfsm::Template;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let template = Template::parse(
//!         "Value Neighbor (\\d+\\.\\d+\\.\\d+\\.\\d+)\nValue State (\\S+)\n\nStart\n  ^${Neighbor}\\s+${State} -> Record\n\nEOF\n",
//!     )?;
//!
//!     let records = template.extract("Neighbor  State\n10.0.0.1  Active\n10.0.0.2  Idle\n")?;
//!     assert_eq!(records, vec![vec!["10.0.0.1", "Active"], vec!["10.0.0.2", "Idle"]]);
//!     Ok(())
//! }
//! ```
#![deny(missing_docs)]

mod fsm;
mod template;
pub use template::*;

use thiserror::Error;

/// A single extracted record, with one entry per declared value (in declaration order).
pub type Record = Vec<String>;

/// # Template Error
///
/// Raised while parsing a template. A template is either valid as a whole, or rejected.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// General syntax error on a specific line
    #[error("Syntax error on line {line}: {msg}")]
    Syntax {
        /// Line number (starting at 1)
        line: usize,
        /// Description of the problem
        msg: String,
    },
    /// A rule references a variable that was not declared with `Value`.
    #[error("Line {line} references the undeclared value `{name}`")]
    UndeclaredValue {
        /// Line number (starting at 1)
        line: usize,
        /// Name of the variable
        name: String,
    },
    /// A value is declared twice
    #[error("Line {line} declares the value `{name}` a second time")]
    DuplicateValue {
        /// Line number (starting at 1)
        line: usize,
        /// Name of the value
        name: String,
    },
    /// Unknown option of a value declaration
    #[error("Line {line}: unknown value option `{option}`")]
    UnknownOption {
        /// Line number (starting at 1)
        line: usize,
        /// The option as written in the template
        option: String,
    },
    /// The value option exists in TextFSM, but records cannot represent it.
    #[error("Line {line}: the value option `{option}` is not supported")]
    UnsupportedOption {
        /// Line number (starting at 1)
        line: usize,
        /// The option as written in the template
        option: String,
    },
    /// The regular expression (after substitution of the variables) is invalid.
    #[error("Line {line}: invalid regular expression: {source}")]
    Regex {
        /// Line number (starting at 1)
        line: usize,
        /// Error returned by the regex crate
        source: regex::Error,
    },
    /// A state is declared twice
    #[error("Line {line} declares the state `{name}` a second time")]
    DuplicateState {
        /// Line number (starting at 1)
        line: usize,
        /// Name of the state
        name: String,
    },
    /// A rule transitions into a state that does not exist.
    #[error("Line {line} transitions into the undeclared state `{name}`")]
    UndeclaredState {
        /// Line number (starting at 1)
        line: usize,
        /// Name of the state
        name: String,
    },
    /// The template has no `Start` state.
    #[error("The template does not declare a `Start` state")]
    MissingStart,
}

/// # Extraction Error
///
/// The only way the extraction can fail is by reaching a rule with the `Error` action.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// An `Error` action was triggered
    #[error("Error action triggered in state {state} on input line {line}: {message}")]
    ErrorAction {
        /// State in which the rule was triggered
        state: String,
        /// Input line number (starting at 1)
        line: usize,
        /// Message attached to the action, or the input line if there is none.
        message: String,
    },
}
