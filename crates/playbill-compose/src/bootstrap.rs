//! Bootstrap lifecycle.
//!
//! ```text
//! Uninitialized --compose--> Composing --ok--> Composed --emit--> Emitted
//!                                |                |
//!                                +-----error------+----> Aborted
//! ```
//!
//! Composition resolves the include tree into a plan and folds it into a
//! fresh [`ProfileBuilder`]. Emission validates the record into an
//! [`EngineConfig`] and only then hands it to each enabled subsystem. Both
//! steps run at most once; any failure is terminal.

use std::fmt;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::builder::{ProfileBuilder, ProfileRecord};
use crate::config::{BootstrapOptions, EngineConfig};
use crate::error::{BootstrapError, Result};
use crate::eval::fold_plan;
use crate::feature::GameFeature;
use crate::resolver::{resolve, IncludeNode, ProfileRoot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Uninitialized,
    Composing,
    Composed,
    Emitted,
    Aborted,
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BootstrapState::Uninitialized => "uninitialized",
            BootstrapState::Composing => "composing",
            BootstrapState::Composed => "composed",
            BootstrapState::Emitted => "emitted",
            BootstrapState::Aborted => "aborted",
        })
    }
}

/// The engine side of emission: one call per enabled feature, in bit order.
///
/// If any feature fails to start, every feature already started is shut down
/// again in reverse order before emission reports the failure.
pub trait SubsystemInitializer {
    fn init_subsystem(
        &mut self,
        feature: GameFeature,
        config: &EngineConfig,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn shutdown_subsystem(&mut self, _feature: GameFeature, _config: &EngineConfig) {}
}

/// An initializer that accepts every feature and remembers the order.
/// `initialized` holds the features currently running.
#[derive(Debug, Default, Clone)]
pub struct RecordingInitializer {
    pub initialized: Vec<GameFeature>,
    pub shut_down: Vec<GameFeature>,
}

impl SubsystemInitializer for RecordingInitializer {
    fn init_subsystem(
        &mut self,
        feature: GameFeature,
        _config: &EngineConfig,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.initialized.push(feature);
        Ok(())
    }

    fn shutdown_subsystem(&mut self, feature: GameFeature, _config: &EngineConfig) {
        self.initialized.retain(|f| *f != feature);
        self.shut_down.push(feature);
    }
}

#[derive(Debug)]
pub struct Bootstrap {
    root: ProfileRoot,
    options: BootstrapOptions,
    state: BootstrapState,
    record: Option<ProfileRecord>,
    tree: Option<IncludeNode>,
}

impl Bootstrap {
    pub fn new(root: ProfileRoot, options: BootstrapOptions) -> Self {
        Self {
            root,
            options,
            state: BootstrapState::Uninitialized,
            record: None,
            tree: None,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    pub fn options(&self) -> &BootstrapOptions {
        &self.options
    }

    /// The composed record, once composition has succeeded.
    pub fn record(&self) -> Option<&ProfileRecord> {
        self.record.as_ref()
    }

    /// The include tree of the last successful composition.
    pub fn include_tree(&self) -> Option<&IncludeNode> {
        self.tree.as_ref()
    }

    /// Run `entry` and everything it includes.
    pub fn compose(&mut self, entry: &str) -> Result<&ProfileRecord> {
        self.expect_state("compose", BootstrapState::Uninitialized)?;
        self.state = BootstrapState::Composing;
        info!(root = %self.root.dir().display(), entry, "composing profile");

        match self.compose_inner(entry) {
            Ok((record, tree)) => {
                info!(
                    keys = record.keys().count(),
                    fragments = tree.execution_count(),
                    "profile composed"
                );
                self.state = BootstrapState::Composed;
                self.tree = Some(tree);
                Ok(&*self.record.insert(record))
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    fn compose_inner(&self, entry: &str) -> Result<(ProfileRecord, IncludeNode)> {
        let plan = resolve(&self.root, entry, &self.options)?;
        debug!(
            fragments = plan.fragments.len(),
            statements = plan.steps.len(),
            "include tree resolved"
        );
        let mut builder = ProfileBuilder::new();
        fold_plan(&plan, &mut builder)?;
        Ok((builder.finish(), plan.tree))
    }

    /// Validate the record and initialize each enabled subsystem.
    pub fn emit(&mut self, engine: &mut dyn SubsystemInitializer) -> Result<EngineConfig> {
        self.expect_state("emit", BootstrapState::Composed)?;
        let Some(record) = self.record.as_ref() else {
            return Err(BootstrapError::InvalidState {
                operation: "emit",
                state: self.state,
            });
        };

        let config = match EngineConfig::from_record(record, &self.options.requirements) {
            Ok(config) => config,
            Err(e) => return Err(self.abort(e)),
        };

        let mut started: Vec<GameFeature> = Vec::new();
        for feature in config.features().iter() {
            debug!(%feature, "initializing subsystem");
            if let Err(e) = engine.init_subsystem(feature, &config) {
                for running in started.iter().rev() {
                    debug!(feature = %running, "shutting down subsystem");
                    engine.shutdown_subsystem(*running, &config);
                }
                return Err(self.abort(BootstrapError::Subsystem {
                    feature,
                    message: e.to_string(),
                }));
            }
            started.push(feature);
        }

        self.state = BootstrapState::Emitted;
        info!(
            features = %config.features(),
            width = config.design_width(),
            height = config.design_height(),
            "bootstrap complete"
        );
        Ok(config)
    }

    fn expect_state(&self, operation: &'static str, wanted: BootstrapState) -> Result<()> {
        if self.state == wanted {
            Ok(())
        } else {
            Err(BootstrapError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn abort(&mut self, err: BootstrapError) -> BootstrapError {
        warn!(error = %err, "bootstrap aborted");
        self.state = BootstrapState::Aborted;
        err
    }
}

/// Compose `entry` under `root_dir` and emit it into `engine` in one go.
pub fn bootstrap(
    root_dir: impl AsRef<Path>,
    entry: &str,
    options: BootstrapOptions,
    engine: &mut dyn SubsystemInitializer,
) -> Result<EngineConfig> {
    let mut session = Bootstrap::new(ProfileRoot::new(root_dir)?, options);
    session.compose(entry)?;
    session.emit(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (rel, text) in files {
            let p = dir.path().join(rel);
            std::fs::create_dir_all(p.parent().unwrap()).unwrap();
            std::fs::write(p, text).unwrap();
        }
        dir
    }

    const MINIMAL: &str = "root.LayerCount = 10;\nroot.GameFeatures = GameFeature.Input;\nroot.DesignWidth = 640;\nroot.DesignHeight = 480;\n";

    #[test]
    fn lifecycle_runs_once() {
        let dir = profile(&[("game.js", MINIMAL)]);
        let mut b = Bootstrap::new(ProfileRoot::new(dir.path()).unwrap(), BootstrapOptions::default());
        assert_eq!(b.state(), BootstrapState::Uninitialized);

        b.compose("game.js").unwrap();
        assert_eq!(b.state(), BootstrapState::Composed);
        assert!(matches!(
            b.compose("game.js"),
            Err(BootstrapError::InvalidState { operation: "compose", .. })
        ));

        let mut engine = RecordingInitializer::default();
        let cfg = b.emit(&mut engine).unwrap();
        assert_eq!(b.state(), BootstrapState::Emitted);
        assert_eq!(engine.initialized, vec![GameFeature::Input]);
        assert_eq!(cfg.design_width(), 640);

        let err = b.emit(&mut engine).unwrap_err();
        assert_eq!(err.to_string(), "cannot emit while bootstrap is emitted");
        assert_eq!(engine.initialized.len(), 1);
    }

    #[test]
    fn emit_before_compose_is_rejected() {
        let dir = profile(&[("game.js", MINIMAL)]);
        let mut b = Bootstrap::new(ProfileRoot::new(dir.path()).unwrap(), BootstrapOptions::default());
        let err = b.emit(&mut RecordingInitializer::default()).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::InvalidState {
                state: BootstrapState::Uninitialized,
                ..
            }
        ));
    }

    #[test]
    fn compose_failure_aborts() {
        let dir = profile(&[("game.js", "include('missing.js');\n")]);
        let mut b = Bootstrap::new(ProfileRoot::new(dir.path()).unwrap(), BootstrapOptions::default());
        assert!(b.compose("game.js").is_err());
        assert_eq!(b.state(), BootstrapState::Aborted);
        assert!(b.record().is_none());
    }

    struct Refuses {
        refuse: GameFeature,
        log: RecordingInitializer,
    }

    impl Refuses {
        fn new(refuse: GameFeature) -> Self {
            Self {
                refuse,
                log: RecordingInitializer::default(),
            }
        }
    }

    impl SubsystemInitializer for Refuses {
        fn init_subsystem(
            &mut self,
            feature: GameFeature,
            config: &EngineConfig,
        ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if feature == self.refuse {
                Err("device unavailable".into())
            } else {
                self.log.init_subsystem(feature, config)
            }
        }

        fn shutdown_subsystem(&mut self, feature: GameFeature, config: &EngineConfig) {
            self.log.shutdown_subsystem(feature, config);
        }
    }

    #[test]
    fn subsystem_failure_aborts() {
        let dir = profile(&[("game.js", MINIMAL)]);
        let mut b = Bootstrap::new(ProfileRoot::new(dir.path()).unwrap(), BootstrapOptions::default());
        b.compose("game.js").unwrap();
        let err = b.emit(&mut Refuses::new(GameFeature::Input)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "subsystem Input failed to initialize: device unavailable"
        );
        assert_eq!(b.state(), BootstrapState::Aborted);
    }

    #[test]
    fn subsystem_failure_shuts_down_started_features_in_reverse() {
        let dir = profile(&[(
            "game.js",
            "root.LayerCount = 10;\nroot.GameFeatures = GameFeature.Renderer2D | GameFeature.Input | GameFeature.Audio;\nroot.DesignWidth = 640;\nroot.DesignHeight = 480;\n",
        )]);
        let mut b = Bootstrap::new(ProfileRoot::new(dir.path()).unwrap(), BootstrapOptions::default());
        b.compose("game.js").unwrap();

        let mut engine = Refuses::new(GameFeature::Audio);
        let err = b.emit(&mut engine).unwrap_err();
        assert_eq!(err.to_string(), "subsystem Audio failed to initialize: device unavailable");
        assert_eq!(b.state(), BootstrapState::Aborted);
        assert!(engine.log.initialized.is_empty(), "{:?}", engine.log.initialized);
        assert_eq!(
            engine.log.shut_down,
            vec![GameFeature::Input, GameFeature::Renderer2D]
        );
    }

    #[test]
    fn first_feature_failure_shuts_nothing_down() {
        let dir = profile(&[("game.js", MINIMAL)]);
        let mut b = Bootstrap::new(ProfileRoot::new(dir.path()).unwrap(), BootstrapOptions::default());
        b.compose("game.js").unwrap();
        let mut engine = Refuses::new(GameFeature::Input);
        assert!(b.emit(&mut engine).is_err());
        assert!(engine.log.shut_down.is_empty());
    }
}
