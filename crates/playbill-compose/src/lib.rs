//! Profile composition for game engine bootstrap.
//!
//! A profile is a tree of script fragments under one root directory. The
//! entry fragment writes to a shared `root` record and pulls in others with
//! `include('path')`; the composed record is then validated into an
//! [`EngineConfig`] and handed to every enabled subsystem.
//!
//! ```no_run
//! use playbill_compose::{bootstrap, BootstrapOptions, RecordingInitializer};
//!
//! let mut engine = RecordingInitializer::default();
//! let config = bootstrap("profiles", "mo6tw/game.js", BootstrapOptions::default(), &mut engine)?;
//! println!("{}x{}", config.design_width(), config.design_height());
//! # Ok::<(), playbill_compose::BootstrapError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

pub mod access;
mod bootstrap;
mod builder;
mod config;
mod error;
pub mod eval;
mod feature;
mod instruction_set;
mod resolver;
mod value;

pub use bootstrap::{bootstrap, Bootstrap, BootstrapState, RecordingInitializer, SubsystemInitializer};
pub use builder::{PathKey, PlaceError, ProfileBuilder, ProfileRecord};
pub use config::{
    BootstrapOptions, EngineConfig, RequirementTable, VmStartupConfig, CORE_KEYS,
    DEFAULT_MAX_FRAGMENT_BYTES, DEFAULT_MAX_INCLUDE_DEPTH, KEY_DESIGN_HEIGHT, KEY_DESIGN_WIDTH,
    KEY_GAME_FEATURES, KEY_LAYER_COUNT, KEY_VM,
};
pub use error::{BootstrapError, Location, Result};
pub use feature::{FeatureMask, GameFeature, ALL_FEATURES};
pub use instruction_set::{InstructionSet, ALL_INSTRUCTION_SETS};
pub use resolver::{resolve, CompositionPlan, IncludeNode, LoadedFragment, ProfileRoot, Step};
pub use value::{Object, Value};
