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

//! Poll the neighbor state of many routers in parallel.

use std::thread;
use std::time::Instant;

use log::*;

use crate::adapter::{NeighborsState, RouterAdapter};
use crate::Error;

/// Poll the neighbor state of all adapters, each on its own thread. The result at position `i`
/// belongs to `adapters[i]`. A failing adapter does not affect the result of the others, and a
/// hanging daemon only delays the call up to the exec timeout of its adapter.
pub fn poll_all(adapters: &[Box<dyn RouterAdapter>]) -> Vec<Result<NeighborsState, Error>> {
    let start = Instant::now();
    let results = thread::scope(|s| {
        let handles = adapters
            .iter()
            .map(|a| s.spawn(move || a.neighbors_state()))
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .zip(adapters)
            .map(|(handle, adapter)| match handle.join() {
                Ok(result) => {
                    if let Err(e) = result.as_ref() {
                        warn!("{}: cannot get the neighbors state: {}", adapter.name(), e);
                    }
                    result
                }
                Err(_) => panic!("The polling thread of {} panicked!", adapter.name()),
            })
            .collect::<Vec<_>>()
    });
    debug!("Polled {} routers in {:?}", adapters.len(), start.elapsed());
    results
}
