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

//! # Dockerfile
//!
//! Structured representation of a build recipe. It is only rendered to text when it is passed to
//! `docker build`.

use std::fmt;

/// Single instruction of a Dockerfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `FROM <image>`
    From(String),
    /// `WORKDIR <dir>`
    Workdir(String),
    /// `RUN <command>`
    Run(String),
    /// `ENV <key> "<value>"`
    Env(String, String),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::From(image) => write!(f, "FROM {}", image),
            Instruction::Workdir(dir) => write!(f, "WORKDIR {}", dir),
            Instruction::Run(cmd) => write!(f, "RUN {}", cmd),
            Instruction::Env(key, value) => write!(f, "ENV {} \"{}\"", key, value),
        }
    }
}

/// # Dockerfile
///
/// ```
/// use docker::Dockerfile;
/// let recipe = Dockerfile::from("ubuntu:latest").workdir("/root").env("PATH", "/bin");
/// assert_eq!(recipe.to_string(), "FROM ubuntu:latest\nWORKDIR /root\nENV PATH \"/bin\"\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dockerfile {
    instructions: Vec<Instruction>,
}

impl Dockerfile {
    /// Start a new recipe from the base image
    pub fn from(image: impl Into<String>) -> Self {
        Self { instructions: vec![Instruction::From(image.into())] }
    }

    /// Set the working directory
    pub fn workdir(mut self, dir: impl Into<String>) -> Self {
        self.instructions.push(Instruction::Workdir(dir.into()));
        self
    }

    /// Execute a command during the build
    pub fn run(mut self, cmd: impl Into<String>) -> Self {
        self.instructions.push(Instruction::Run(cmd.into()));
        self
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.instructions.push(Instruction::Env(key.into(), value.into()));
        self
    }

    /// Returns all instructions
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

impl fmt::Display for Dockerfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in self.instructions.iter() {
            writeln!(f, "{}", i)?;
        }
        Ok(())
    }
}
