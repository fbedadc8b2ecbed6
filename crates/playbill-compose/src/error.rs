//! Bootstrap error types.
//!
//! Every variant aborts the whole bootstrap. Where a statement is to blame the
//! error carries its [`Location`].

use std::fmt;

use serde::Serialize;

use crate::feature::GameFeature;

/// A statement position inside a fragment: `mo6tw/game.js:14:1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub fragment: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.fragment, self.line, self.column)
    }
}

fn origin_prefix(location: &Option<Location>) -> String {
    match location {
        Some(loc) => format!("{}: ", loc),
        None => String::new(),
    }
}

fn required_by_suffix(feature: &Option<GameFeature>) -> String {
    match feature {
        Some(f) => format!(" (required by {})", f),
        None => String::new(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The target fragment does not exist, cannot be read, or escapes the root.
    #[error("{}unresolved include '{path}': {reason}", origin_prefix(.included_from))]
    UnresolvedInclude {
        path: String,
        reason: String,
        included_from: Option<Location>,
    },

    /// An include tree revisits one of its own ancestors.
    #[error("{location}: cyclic include: {}", .chain.join(" -> "))]
    CyclicInclude { chain: Vec<String>, location: Location },

    #[error("{location}: include depth limit ({limit}) exceeded at '{path}'")]
    IncludeDepthExceeded {
        path: String,
        limit: usize,
        location: Location,
    },

    #[error("{}fragment '{path}' is {size} bytes, limit is {limit}", origin_prefix(.included_from))]
    FragmentTooLarge {
        path: String,
        size: u64,
        limit: u64,
        included_from: Option<Location>,
    },

    /// A statement could not be parsed or executed.
    #[error("{location}: {message}")]
    MalformedStatement { location: Location, message: String },

    /// The composed record lacks something an enabled subsystem needs.
    #[error("missing required field 'root.{field}'{}", required_by_suffix(.required_by))]
    MissingRequiredField {
        field: String,
        required_by: Option<GameFeature>,
    },

    /// A core field is present but has the wrong type or range.
    #[error("{}invalid field 'root.{field}': {message}", origin_prefix(.location))]
    InvalidField {
        field: String,
        message: String,
        location: Option<Location>,
    },

    #[error("subsystem {feature} failed to initialize: {message}")]
    Subsystem {
        feature: GameFeature,
        message: String,
    },

    #[error("cannot {operation} while bootstrap is {state}")]
    InvalidState {
        operation: &'static str,
        state: crate::bootstrap::BootstrapState,
    },

    #[error("cannot open profile root '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl BootstrapError {
    /// The statement position the error points at, if any.
    pub fn location(&self) -> Option<&Location> {
        match self {
            BootstrapError::UnresolvedInclude { included_from, .. }
            | BootstrapError::FragmentTooLarge { included_from, .. } => included_from.as_ref(),
            BootstrapError::CyclicInclude { location, .. }
            | BootstrapError::IncludeDepthExceeded { location, .. }
            | BootstrapError::MalformedStatement { location, .. } => Some(location),
            BootstrapError::InvalidField { location, .. } => location.as_ref(),
            BootstrapError::MissingRequiredField { .. }
            | BootstrapError::Subsystem { .. }
            | BootstrapError::InvalidState { .. }
            | BootstrapError::Io { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
