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

//! # Template parser
//!
//! Parser for the template language. Parsing is done with a small hand-written line-oriented
//! state machine: first the `Value` declarations, then the state blocks.

use crate::TemplateError;

use log::*;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;

/// Name of the initial state
pub const START_STATE: &str = "Start";
/// Name of the state executed at the end of the input
pub const EOF_STATE: &str = "EOF";
/// Name of the reserved state that terminates the processing
pub const END_STATE: &str = "End";

/// # Compiled Template
///
/// The template does not hold any state about a specific extraction, and can therefore be shared
/// between threads.
#[derive(Debug, Clone)]
pub struct Template {
    pub(crate) values: Vec<Value>,
    pub(crate) states: Vec<State>,
    pub(crate) start: usize,
    pub(crate) explicit_eof: bool,
}

/// Declared value (capture variable) of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    /// Name of the value
    pub name: String,
    /// Regular expression of the value, without the surrounding parenthesis
    pub regex: String,
    /// Options of the value
    pub options: Vec<ValueOption>,
}

impl Value {
    /// Returns `true` if the value has the given option
    pub fn has_option(&self, option: ValueOption) -> bool {
        self.options.contains(&option)
    }
}

/// Options that may be attached to a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueOption {
    /// The value is kept after a record.
    Filldown,
    /// The record is only emitted if this value is non-empty.
    Required,
    /// The value identifies a record. This is only metadata.
    Key,
    /// Once assigned, the value is copied upwards into the previous records where it is empty.
    Fillup,
}

impl ValueOption {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "Filldown" => Some(Self::Filldown),
            "Required" => Some(Self::Required),
            "Key" => Some(Self::Key),
            "Fillup" => Some(Self::Fillup),
            _ => None,
        }
    }
}

/// A named state with its ordered rules
#[derive(Debug, Clone)]
pub(crate) struct State {
    pub name: String,
    pub rules: Vec<Rule>,
}

/// A single line rule inside a state
#[derive(Debug, Clone)]
pub(crate) struct Rule {
    /// Line of the rule in the template
    pub line: usize,
    /// Compiled regex, with all variables substituted by named capture groups.
    pub regex: Regex,
    /// Indices of the values captured by this rule. The capture group is named after the value.
    pub captures: Vec<usize>,
    pub action: Action,
    /// Resolved state transition of the action
    pub target: Option<Target>,
}

/// Resolved state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    State(usize),
    Eof,
    End,
}

/// What happens after a rule has matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Action {
    pub line: LineAction,
    pub record: RecordAction,
    pub new_state: Option<String>,
    pub error: Option<Option<String>>,
}

impl Default for Action {
    fn default() -> Self {
        Self { line: LineAction::Next, record: RecordAction::NoRecord, new_state: None, error: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineAction {
    Next,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordAction {
    NoRecord,
    Record,
    Clear,
    Clearall,
}

impl Template {
    /// Parse the template. This fails fast, if anything is malformed.
    pub fn parse(text: impl AsRef<str>) -> Result<Self, TemplateError> {
        let mut lines = text.as_ref().lines().enumerate().map(|(i, l)| (i + 1, l)).peekable();

        // parse all value declarations, until the first empty line.
        let mut values: Vec<Value> = Vec::new();
        while let Some((line, l)) = lines.peek().copied() {
            if is_comment(l) {
                lines.next();
                continue;
            }
            if !l.starts_with("Value ") {
                break;
            }
            lines.next();
            let value = parse_value(line, l)?;
            if values.iter().any(|v| v.name == value.name) {
                return Err(TemplateError::DuplicateValue { line, name: value.name });
            }
            values.push(value);
        }

        // parse all states
        let mut states: Vec<State> = Vec::new();
        let mut current: Option<State> = None;
        let mut explicit_eof = false;
        for (line, l) in lines {
            if is_comment(l) {
                continue;
            }
            if l.trim().is_empty() {
                // a blank line terminates the current state
                if let Some(state) = current.take() {
                    states.push(state);
                }
                continue;
            }
            if l.starts_with(' ') || l.starts_with('\t') {
                let state = current.as_mut().ok_or_else(|| TemplateError::Syntax {
                    line,
                    msg: String::from("rule outside of a state"),
                })?;
                state.rules.push(parse_rule(line, l.trim(), &values)?);
                continue;
            }
            // new state
            let name = l.trim();
            if !is_identifier(name) {
                return Err(TemplateError::Syntax {
                    line,
                    msg: format!("invalid state name `{}`", name),
                });
            }
            if name == END_STATE {
                return Err(TemplateError::Syntax {
                    line,
                    msg: format!("the state `{}` is reserved", END_STATE),
                });
            }
            if let Some(state) = current.take() {
                states.push(state);
            }
            if states.iter().any(|s| s.name == name) {
                return Err(TemplateError::DuplicateState { line, name: name.to_string() });
            }
            if name == EOF_STATE {
                explicit_eof = true;
            }
            current = Some(State { name: name.to_string(), rules: Vec::new() });
        }
        if let Some(state) = current.take() {
            states.push(state);
        }

        let start =
            states.iter().position(|s| s.name == START_STATE).ok_or(TemplateError::MissingStart)?;

        // resolve all state transitions
        let names = states.iter().map(|s| s.name.clone()).collect::<Vec<_>>();
        for rule in states.iter_mut().flat_map(|s| s.rules.iter_mut()) {
            if let Some(name) = rule.action.new_state.as_ref() {
                rule.target = Some(match name.as_str() {
                    END_STATE => Target::End,
                    EOF_STATE if !explicit_eof => Target::Eof,
                    _ => Target::State(names.iter().position(|n| n == name).ok_or_else(|| {
                        TemplateError::UndeclaredState { line: rule.line, name: name.clone() }
                    })?),
                });
            }
        }

        debug!("Parsed template with {} values and {} states", values.len(), states.len());

        Ok(Self { values, states, start, explicit_eof })
    }

    /// Returns the names of all declared values, in declaration order. This is the order of the
    /// fields in every extracted record.
    pub fn header(&self) -> Vec<&str> {
        self.values.iter().map(|v| v.name.as_str()).collect()
    }

    /// Returns all declared values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the index of a value in the record, or `None` if it is not declared.
    pub fn value_index(&self, name: impl AsRef<str>) -> Option<usize> {
        self.values.iter().position(|v| v.name == name.as_ref())
    }

    /// Returns the names of all states, in declaration order.
    pub fn state_names(&self) -> Vec<&str> {
        self.states.iter().map(|s| s.name.as_str()).collect()
    }

    /// Returns `true` if the template declares the `EOF` state explicitly. In this case, values
    /// still pending at the end of the input are discarded.
    pub fn has_explicit_eof(&self) -> bool {
        self.explicit_eof
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.options.is_empty() {
            write!(f, "Value {} ({})", self.name, self.regex)
        } else {
            let options = self.options.iter().map(|o| format!("{:?}", o)).collect::<Vec<_>>();
            write!(f, "Value {} {} ({})", options.join(","), self.name, self.regex)
        }
    }
}

fn is_comment(l: &str) -> bool {
    l.trim_start().starts_with('#')
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split off the first whitespace-separated word, returning the word and the remainder.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

fn parse_value(line: usize, l: &str) -> Result<Value, TemplateError> {
    let (_, rest) = split_word(l);
    let (first, rest) = split_word(rest);
    let (options, name, regex) = if rest.starts_with('(') {
        (None, first, rest)
    } else {
        let (name, regex) = split_word(rest);
        (Some(first), name, regex)
    };

    if !is_identifier(name) {
        return Err(TemplateError::Syntax { line, msg: format!("invalid value name `{}`", name) });
    }

    let regex = regex.trim_end();
    if !(regex.len() >= 2 && regex.starts_with('(') && regex.ends_with(')')) {
        return Err(TemplateError::Syntax {
            line,
            msg: format!("the regex of `{}` must be enclosed in parenthesis", name),
        });
    }
    let regex = &regex[1..regex.len() - 1];
    // check that the regex itself is valid.
    Regex::new(regex).map_err(|source| TemplateError::Regex { line, source })?;

    let mut parsed_options = Vec::new();
    if let Some(options) = options {
        for option in options.split(',') {
            // a record holds a single string per value
            if option == "List" {
                return Err(TemplateError::UnsupportedOption { line, option: option.to_string() });
            }
            let o = ValueOption::from_str(option)
                .ok_or_else(|| TemplateError::UnknownOption { line, option: option.to_string() })?;
            if !parsed_options.contains(&o) {
                parsed_options.push(o);
            }
        }
    }

    Ok(Value { name: name.to_string(), regex: regex.to_string(), options: parsed_options })
}

fn parse_rule(line: usize, l: &str, values: &[Value]) -> Result<Rule, TemplateError> {
    if !l.starts_with('^') {
        return Err(TemplateError::Syntax {
            line,
            msg: String::from("rules must start with `^`"),
        });
    }

    // the action is separated by the last ` -> `
    let (pattern, action) = match find_arrow(l) {
        Some(pos) => (l[..pos].trim_end(), parse_action(line, l[pos + 2..].trim())?),
        None => (l, Action::default()),
    };

    let mut used = HashSet::new();
    let mut captures = Vec::new();
    let mut regex = String::with_capacity(pattern.len() * 2);
    let mut chars = pattern.char_indices().peekable();
    while let Some((pos, c)) = chars.next() {
        if c != '$' {
            regex.push(c);
            continue;
        }
        let name = match chars.peek().copied() {
            Some((_, '$')) => {
                chars.next();
                regex.push('$');
                continue;
            }
            Some((start, '{')) => {
                let end = pattern[start..].find('}').ok_or_else(|| TemplateError::Syntax {
                    line,
                    msg: format!("unterminated variable at position {}", pos),
                })? + start;
                while chars.peek().map(|(p, _)| *p <= end).unwrap_or(false) {
                    chars.next();
                }
                &pattern[start + 1..end]
            }
            Some((start, c)) if c.is_ascii_alphanumeric() || c == '_' => {
                let mut end = start;
                while let Some((p, c)) = chars.peek().copied() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        end = p + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                &pattern[start..end]
            }
            // a lone `$` is an end anchor
            _ => {
                regex.push('$');
                continue;
            }
        };

        let idx = values
            .iter()
            .position(|v| v.name == name)
            .ok_or_else(|| TemplateError::UndeclaredValue { line, name: name.to_string() })?;
        if used.insert(idx) {
            regex.push_str(&format!("(?P<{}>{})", name, values[idx].regex));
            captures.push(idx);
        } else {
            // the same value twice in one rule cannot be a second named group.
            regex.push_str(&format!("(?:{})", values[idx].regex));
        }
    }

    let regex = Regex::new(&regex).map_err(|source| TemplateError::Regex { line, source })?;

    Ok(Rule { line, regex, captures, action, target: None })
}

/// Find the position of the `->` that separates the pattern and the action. It must be preceded
/// by whitespace.
fn find_arrow(l: &str) -> Option<usize> {
    let mut search = l.len();
    while let Some(pos) = l[..search].rfind("->") {
        if l[..pos].ends_with(char::is_whitespace) {
            return Some(pos);
        }
        search = pos;
    }
    None
}

fn parse_action(line: usize, s: &str) -> Result<Action, TemplateError> {
    let mut action = Action::default();
    let (first, rest) = split_word(s);

    let syntax = |msg: String| TemplateError::Syntax { line, msg };

    if first == "Error" {
        let msg = rest.trim().trim_matches('"');
        action.error = Some(if msg.is_empty() { None } else { Some(msg.to_string()) });
        return Ok(action);
    }

    let mut state_token = None;
    match first.split_once('.') {
        Some((l, r)) => {
            action.line = parse_line_action(l)
                .ok_or_else(|| syntax(format!("unknown line action `{}`", l)))?;
            action.record = parse_record_action(r)
                .ok_or_else(|| syntax(format!("unknown record action `{}`", r)))?;
        }
        None => {
            if let Some(l) = parse_line_action(first) {
                action.line = l;
            } else if let Some(r) = parse_record_action(first) {
                action.record = r;
            } else if is_identifier(first) {
                state_token = Some(first);
            } else {
                return Err(syntax(format!("unknown action `{}`", first)));
            }
        }
    }

    if state_token.is_none() && !rest.is_empty() {
        let (state, tail) = split_word(rest);
        if !tail.is_empty() || !is_identifier(state) {
            return Err(syntax(format!("invalid action `{}`", s)));
        }
        state_token = Some(state);
    } else if state_token.is_some() && !rest.is_empty() {
        return Err(syntax(format!("invalid action `{}`", s)));
    }

    if let Some(state) = state_token {
        if action.line == LineAction::Continue {
            return Err(syntax(String::from("`Continue` cannot be combined with a state change")));
        }
        action.new_state = Some(state.to_string());
    }

    Ok(action)
}

fn parse_line_action(s: &str) -> Option<LineAction> {
    match s {
        "Next" => Some(LineAction::Next),
        "Continue" => Some(LineAction::Continue),
        _ => None,
    }
}

fn parse_record_action(s: &str) -> Option<RecordAction> {
    match s {
        "NoRecord" => Some(RecordAction::NoRecord),
        "Record" => Some(RecordAction::Record),
        "Clear" => Some(RecordAction::Clear),
        "Clearall" => Some(RecordAction::Clearall),
        _ => None,
    }
}
