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

//! # Extraction
//!
//! Runs a compiled template over the input, line by line.

use crate::template::{LineAction, RecordAction, Target, Template, ValueOption};
use crate::{ExtractError, Record};

use log::*;

impl Template {
    /// Extract all records from the text. Lines that do not match any rule of the current state
    /// are skipped. Each record has exactly one entry per declared value, in declaration order,
    /// with surrounding whitespace removed.
    pub fn extract(&self, text: impl AsRef<str>) -> Result<Vec<Record>, ExtractError> {
        let mut buffer: Record = vec![String::new(); self.values.len()];
        let mut records: Vec<Record> = Vec::new();
        let mut state = self.start;

        'lines: for (i, line) in text.as_ref().lines().enumerate() {
            let line = line.trim_end();
            for rule in self.states[state].rules.iter() {
                let caps = match rule.regex.captures(line) {
                    Some(caps) => caps,
                    None => continue,
                };

                for &idx in rule.captures.iter() {
                    buffer[idx] = caps
                        .name(&self.values[idx].name)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default();
                    if self.values[idx].has_option(ValueOption::Fillup) {
                        fill_up(&mut records, idx, &buffer[idx]);
                    }
                }

                if let Some(msg) = rule.action.error.as_ref() {
                    return Err(ExtractError::ErrorAction {
                        state: self.states[state].name.clone(),
                        line: i + 1,
                        message: msg.clone().unwrap_or_else(|| line.to_string()),
                    });
                }

                match rule.action.record {
                    RecordAction::NoRecord => {}
                    RecordAction::Record => self.record(&mut buffer, &mut records),
                    RecordAction::Clear => self.clear(&mut buffer, false),
                    RecordAction::Clearall => self.clear(&mut buffer, true),
                }

                match rule.target {
                    Some(Target::State(s)) => {
                        state = s;
                        continue 'lines;
                    }
                    Some(Target::Eof) => break 'lines,
                    Some(Target::End) => return Ok(records),
                    None => {}
                }

                match rule.action.line {
                    LineAction::Next => continue 'lines,
                    LineAction::Continue => {}
                }
            }
        }

        if self.explicit_eof {
            if buffer.iter().any(|v| !v.is_empty()) {
                trace!("Discard the values pending at the end of the input");
            }
        } else {
            self.record(&mut buffer, &mut records);
        }

        Ok(records)
    }

    /// Append the current buffer to the records (if it is complete), and clear it.
    fn record(&self, buffer: &mut Record, records: &mut Vec<Record>) {
        let missing_required = self
            .values
            .iter()
            .zip(buffer.iter())
            .any(|(v, x)| v.has_option(ValueOption::Required) && x.trim().is_empty());
        let all_empty = buffer.iter().all(|x| x.trim().is_empty());

        if !(missing_required || all_empty) {
            records.push(buffer.iter().map(|x| x.trim().to_string()).collect());
        }

        self.clear(buffer, false);
    }

    /// Clear the buffer. Values with `Filldown` are only cleared if `all` is set.
    fn clear(&self, buffer: &mut Record, all: bool) {
        for (v, x) in self.values.iter().zip(buffer.iter_mut()) {
            if all || !v.has_option(ValueOption::Filldown) {
                x.clear();
            }
        }
    }
}

/// Copy `value` into field `idx` of the previous records, walking backwards until a record
/// already holds a value.
fn fill_up(records: &mut [Record], idx: usize, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    for record in records.iter_mut().rev() {
        if !record[idx].is_empty() {
            break;
        }
        record[idx] = value.to_string();
    }
}
