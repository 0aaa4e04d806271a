//! Observable state container
//!
//! Wraps the room's current value. Every `set` compares the old and new
//! values structurally and reports each changed leaf to listeners as a
//! [`DataChange`], so application code can react to single fields instead
//! of re-reading the whole state.

use crate::signal::ListenerId;
use rmpv::Value;
use std::collections::HashMap;
use tracing::trace;

/// Kind of change at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Replace,
    Remove,
}

/// One change produced by [`StateContainer::set`]
#[derive(Debug, Clone, PartialEq)]
pub struct DataChange {
    /// Map keys and array indices leading to the changed value
    pub path: Vec<String>,
    pub operation: Operation,
    /// New value for adds and replaces, the removed value for removals
    pub value: Value,
}

/// Placeholder captures from a pattern listener, e.g. `id` for `players/:id`
pub type Captures = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Capture(String),
    Any,
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s {
            "*" => Segment::Any,
            _ => match s.strip_prefix(':') {
                Some(name) => Segment::Capture(name.to_string()),
                None => Segment::Literal(s.to_string()),
            },
        })
        .collect()
}

fn match_path(pattern: &[Segment], path: &[String]) -> Option<Captures> {
    if pattern.len() != path.len() {
        return None;
    }

    let mut captures = Captures::new();
    for (segment, part) in pattern.iter().zip(path) {
        match segment {
            Segment::Literal(lit) if lit != part => return None,
            Segment::Capture(name) => {
                captures.insert(name.clone(), part.clone());
            }
            _ => {}
        }
    }
    Some(captures)
}

struct Listener {
    id: ListenerId,
    pattern: Option<Vec<Segment>>,
    callback: Box<dyn FnMut(&DataChange, &Captures)>,
}

/// Holds the current state and notifies listeners of per-field changes
pub struct StateContainer {
    data: Value,
    listeners: Vec<Listener>,
    next_id: u64,
}

impl StateContainer {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    /// Current value
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Replace the tracked value, notifying listeners of every change
    pub fn set(&mut self, value: Value) {
        let mut changes = Vec::new();
        compare(&self.data, &value, &mut Vec::new(), &mut changes);
        self.data = value;

        trace!("State set with {} changes", changes.len());

        for change in &changes {
            for listener in &mut self.listeners {
                let captures = match &listener.pattern {
                    None => Captures::new(),
                    Some(pattern) => match match_path(pattern, &change.path) {
                        Some(captures) => captures,
                        None => continue,
                    },
                };
                (listener.callback)(change, &captures);
            }
        }
    }

    /// Listen to every change
    pub fn listen_all(&mut self, mut callback: impl FnMut(&DataChange) + 'static) -> ListenerId {
        self.push(None, Box::new(move |change, _| callback(change)))
    }

    /// Listen to changes whose path matches `pattern`.
    ///
    /// Segments are separated by `/`; `:name` matches any segment and
    /// captures it under `name`, `*` matches any segment.
    pub fn listen(
        &mut self,
        pattern: &str,
        callback: impl FnMut(&DataChange, &Captures) + 'static,
    ) -> ListenerId {
        self.push(Some(parse_pattern(pattern)), Box::new(callback))
    }

    fn push(
        &mut self,
        pattern: Option<Vec<Segment>>,
        callback: Box<dyn FnMut(&DataChange, &Captures)>,
    ) -> ListenerId {
        let id = ListenerId::from_raw(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            pattern,
            callback,
        });
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    pub fn remove_all_listeners(&mut self) {
        self.listeners.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for StateContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateContainer")
            .field("data", &self.data)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn key_segment(key: &Value) -> String {
    match key.as_str() {
        Some(s) => s.to_string(),
        None => key.to_string(),
    }
}

fn lookup<'a>(entries: &'a [(Value, Value)], key: &Value) -> Option<&'a Value> {
    entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn record(path: &[String], operation: Operation, value: &Value, changes: &mut Vec<DataChange>) {
    changes.push(DataChange {
        path: path.to_vec(),
        operation,
        value: value.clone(),
    });
}

/// Structural compare: maps by key, arrays by index, anything else by value
fn compare(old: &Value, new: &Value, path: &mut Vec<String>, changes: &mut Vec<DataChange>) {
    match (old, new) {
        (Value::Map(old_entries), Value::Map(new_entries)) => {
            for (key, old_value) in old_entries {
                path.push(key_segment(key));
                match lookup(new_entries, key) {
                    Some(new_value) => compare(old_value, new_value, path, changes),
                    None => record(path, Operation::Remove, old_value, changes),
                }
                path.pop();
            }
            for (key, new_value) in new_entries {
                if lookup(old_entries, key).is_none() {
                    path.push(key_segment(key));
                    record(path, Operation::Add, new_value, changes);
                    path.pop();
                }
            }
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            let common = old_items.len().min(new_items.len());
            for i in 0..old_items.len().max(new_items.len()) {
                path.push(i.to_string());
                if i < common {
                    compare(&old_items[i], &new_items[i], path, changes);
                } else if i < old_items.len() {
                    record(path, Operation::Remove, &old_items[i], changes);
                } else {
                    record(path, Operation::Add, &new_items[i], changes);
                }
                path.pop();
            }
        }
        _ if old != new => record(path, Operation::Replace, new, changes),
        _ => {}
    }
}
