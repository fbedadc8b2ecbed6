//! The profile accumulator.
//!
//! A [`ProfileBuilder`] is the one record every fragment reads and writes.
//! It is passed by `&mut` through the fold over a composition plan; nothing
//! about it is global. Writes are last-write-wins: a later fragment silently
//! replaces what an earlier one set. The builder remembers which statement
//! last wrote each root key so overwrites can be logged and diagnosed.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::Location;
use crate::value::{Object, Value};

/// One step of a path below `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKey {
    Key(String),
    Index(i64),
}

impl std::fmt::Display for PathKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathKey::Key(k) => write!(f, ".{}", k),
            PathKey::Index(i) => write!(f, "[{}]", i),
        }
    }
}

fn render(path: &[PathKey]) -> String {
    let mut s = String::from("root");
    for key in path {
        s.push_str(&key.to_string());
    }
    s
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaceError {
    #[error("{path} is not defined")]
    Undefined { path: String },

    #[error("cannot assign to {path}: {parent} is {actual}, not an {expected}")]
    NotAContainer {
        path: String,
        parent: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("index {index} is out of range for {parent} (length {len})")]
    IndexOutOfRange {
        parent: String,
        index: i64,
        len: usize,
    },

    #[error("cannot replace root itself")]
    WholeRoot,
}

#[derive(Debug, Default, Clone)]
pub struct ProfileBuilder {
    root: Object,
    origins: BTreeMap<String, Location>,
    writes: usize,
}

impl ProfileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top-level key lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Number of assignments applied so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// The statement that last wrote `key` (or something beneath it).
    pub fn origin(&self, key: &str) -> Option<&Location> {
        self.origins.get(key)
    }

    /// Read `root` followed by `path`.
    pub fn lookup(&self, path: &[PathKey]) -> Result<&Value, PlaceError> {
        let Some((first, rest)) = path.split_first() else {
            return Err(PlaceError::WholeRoot);
        };
        let PathKey::Key(first) = first else {
            return Err(PlaceError::Undefined {
                path: render(&path[..1]),
            });
        };
        let mut cur = self.root.get(first).ok_or_else(|| PlaceError::Undefined {
            path: render(&path[..1]),
        })?;
        for (depth, key) in rest.iter().enumerate() {
            let found = match (key, cur) {
                (PathKey::Key(k), Value::Object(o)) => o.get(k),
                (PathKey::Index(i), Value::Array(a)) => usize::try_from(*i).ok().and_then(|i| a.get(i)),
                _ => None,
            };
            cur = found.ok_or_else(|| PlaceError::Undefined {
                path: render(&path[..depth + 2]),
            })?;
        }
        Ok(cur)
    }

    /// Write `value` at `root` followed by `path`. Intermediate containers
    /// must already exist. Returns the value that was replaced, if any.
    pub fn assign(
        &mut self,
        path: &[PathKey],
        value: Value,
        origin: Location,
    ) -> Result<Option<Value>, PlaceError> {
        let Some((last, parents)) = path.split_last() else {
            return Err(PlaceError::WholeRoot);
        };
        let top = match &path[0] {
            PathKey::Key(k) => k.clone(),
            PathKey::Index(_) => {
                return Err(PlaceError::NotAContainer {
                    path: render(path),
                    parent: "root".into(),
                    expected: "Array",
                    actual: "Object",
                })
            }
        };

        let previous = if parents.is_empty() {
            self.root.insert(top.clone(), value)
        } else {
            let full = render(path);
            let mut cur = self
                .root
                .get_mut(&top)
                .ok_or_else(|| PlaceError::Undefined {
                    path: render(&path[..1]),
                })?;
            for (depth, key) in parents[1..].iter().enumerate() {
                let here = render(&path[..depth + 1]);
                cur = descend(cur, key, &here, &full)?.ok_or_else(|| PlaceError::Undefined {
                    path: render(&path[..depth + 2]),
                })?;
            }
            let parent = render(parents);
            insert_into(cur, last, value, &parent, &full)?
        };

        self.writes += 1;
        match self.origins.get(&top) {
            Some(prev) if previous.is_some() && prev.fragment != origin.fragment => {
                warn!(
                    target: "playbill::accumulator",
                    key = %render(path),
                    previous = %prev,
                    by = %origin,
                    "overwriting value set by another fragment"
                );
            }
            Some(prev) if previous.is_some() => {
                debug!(key = %render(path), previous = %prev, by = %origin, "overwriting value");
            }
            _ => {}
        }
        self.origins.insert(top, origin);
        Ok(previous)
    }

    /// Freeze the accumulated state.
    pub fn finish(self) -> ProfileRecord {
        ProfileRecord {
            root: Value::Object(self.root),
            origins: self.origins,
        }
    }
}

fn descend<'v>(
    cur: &'v mut Value,
    key: &PathKey,
    here: &str,
    full: &str,
) -> Result<Option<&'v mut Value>, PlaceError> {
    match (key, cur) {
        (PathKey::Key(k), Value::Object(o)) => Ok(o.get_mut(k)),
        (PathKey::Index(i), Value::Array(a)) => Ok(usize::try_from(*i).ok().and_then(|i| a.get_mut(i))),
        (PathKey::Key(_), other) => Err(PlaceError::NotAContainer {
            path: full.to_string(),
            parent: here.to_string(),
            expected: "Object",
            actual: other.type_name(),
        }),
        (PathKey::Index(_), other) => Err(PlaceError::NotAContainer {
            path: full.to_string(),
            parent: here.to_string(),
            expected: "Array",
            actual: other.type_name(),
        }),
    }
}

fn insert_into(
    parent_val: &mut Value,
    key: &PathKey,
    value: Value,
    parent: &str,
    full: &str,
) -> Result<Option<Value>, PlaceError> {
    match (key, parent_val) {
        (PathKey::Key(k), Value::Object(o)) => Ok(o.insert(k.clone(), value)),
        (PathKey::Index(i), Value::Array(a)) => {
            let len = a.len();
            match usize::try_from(*i) {
                Ok(idx) if idx < len => Ok(Some(std::mem::replace(&mut a[idx], value))),
                // Writing one past the end appends.
                Ok(idx) if idx == len => {
                    a.push(value);
                    Ok(None)
                }
                _ => Err(PlaceError::IndexOutOfRange {
                    parent: parent.to_string(),
                    index: *i,
                    len,
                }),
            }
        }
        (PathKey::Key(_), other) => Err(PlaceError::NotAContainer {
            path: full.to_string(),
            parent: parent.to_string(),
            expected: "Object",
            actual: other.type_name(),
        }),
        (PathKey::Index(_), other) => Err(PlaceError::NotAContainer {
            path: full.to_string(),
            parent: parent.to_string(),
            expected: "Array",
            actual: other.type_name(),
        }),
    }
}

/// The composed record, frozen once the top-level fragment finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    root: Value,
    origins: BTreeMap<String, Location>,
}

impl ProfileRecord {
    /// The whole record as an object value, for use with the `access` readers.
    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root
            .as_object()
            .into_iter()
            .flat_map(|o| o.keys().map(String::as_str))
    }

    /// The statement that last wrote `key`.
    pub fn origin(&self, key: &str) -> Option<&Location> {
        self.origins.get(key)
    }
}
