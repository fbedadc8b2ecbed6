//! Bootstrap options and the configuration handed to engine subsystems.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::access::{self, AccessError};
use crate::builder::ProfileRecord;
use crate::error::{BootstrapError, Result};
use crate::feature::{FeatureMask, GameFeature};
use crate::instruction_set::InstructionSet;
use crate::value::Value;

pub const KEY_LAYER_COUNT: &str = "LayerCount";
pub const KEY_GAME_FEATURES: &str = "GameFeatures";
pub const KEY_DESIGN_WIDTH: &str = "DesignWidth";
pub const KEY_DESIGN_HEIGHT: &str = "DesignHeight";
pub const KEY_VM: &str = "Vm";

/// Root keys with a dedicated field in [`EngineConfig`]. Everything else is a
/// subsystem section.
pub const CORE_KEYS: &[&str] = &[
    KEY_LAYER_COUNT,
    KEY_GAME_FEATURES,
    KEY_DESIGN_WIDTH,
    KEY_DESIGN_HEIGHT,
    KEY_VM,
];

/// Default include nesting limit: the number of nested `include`s allowed
/// below the entry fragment.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

/// Default maximum fragment size in bytes (1MB).
pub const DEFAULT_MAX_FRAGMENT_BYTES: u64 = 1_000_000;

/// Root keys a feature needs in order to initialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementTable {
    required: BTreeMap<GameFeature, Vec<String>>,
}

impl Default for RequirementTable {
    /// The script VM needs its startup block; nothing else is assumed.
    fn default() -> Self {
        let mut table = Self::empty();
        table.require(GameFeature::ScriptVm, KEY_VM);
        table
    }
}

impl RequirementTable {
    pub fn empty() -> Self {
        Self {
            required: BTreeMap::new(),
        }
    }

    pub fn require(&mut self, feature: GameFeature, key: impl Into<String>) -> &mut Self {
        let key = key.into();
        let keys = self.required.entry(feature).or_default();
        if !keys.contains(&key) {
            keys.push(key);
        }
        self
    }

    pub fn required_for(&self, feature: GameFeature) -> &[String] {
        self.required.get(&feature).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Nested `include`s allowed below the entry fragment.
    pub max_include_depth: usize,
    pub max_fragment_bytes: u64,
    pub requirements: RequirementTable,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            max_fragment_bytes: DEFAULT_MAX_FRAGMENT_BYTES,
            requirements: RequirementTable::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VmStartupConfig {
    pub start_script: u32,
    pub start_script_buffer: u32,
    pub instruction_set: InstructionSet,
    pub use_return_ids: bool,
}

impl VmStartupConfig {
    pub fn from_value(vm: &Value) -> std::result::Result<Self, AccessError> {
        Ok(Self {
            start_script: access::ensure_member_uint(vm, KEY_VM, "StartScript")?,
            start_script_buffer: access::ensure_member_uint(vm, KEY_VM, "StartScriptBuffer")?,
            instruction_set: access::ensure_member_instruction_set(vm, KEY_VM, "GameInstructionSet")?,
            use_return_ids: access::ensure_member_bool(vm, KEY_VM, "UseReturnIds")?,
        })
    }
}

/// The validated, immutable configuration an engine starts from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    layer_count: u32,
    features: FeatureMask,
    design_width: u32,
    design_height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    vm: Option<VmStartupConfig>,
    sections: BTreeMap<String, Value>,
}

impl EngineConfig {
    /// Validate a composed record against the emission contract.
    pub fn from_record(record: &ProfileRecord, requirements: &RequirementTable) -> Result<Self> {
        let root = record.root();
        let invalid = |key: &str, err: AccessError| BootstrapError::InvalidField {
            field: key.to_string(),
            message: err.to_string(),
            location: record.origin(key).cloned(),
        };

        let raw_features = required(record, KEY_GAME_FEATURES, None)?;
        if let Value::Int(bits) = raw_features {
            check_feature_bits(*bits).map_err(|message| BootstrapError::InvalidField {
                field: KEY_GAME_FEATURES.to_string(),
                message,
                location: record.origin(KEY_GAME_FEATURES).cloned(),
            })?;
        }
        let features = access::ensure_as(
            raw_features,
            KEY_GAME_FEATURES,
            "GameFeature mask",
            access::try_get_features,
        )
        .map_err(|e| invalid(KEY_GAME_FEATURES, e))?;

        let layer_count = access::ensure_uint(required(record, KEY_LAYER_COUNT, None)?, KEY_LAYER_COUNT)
            .map_err(|e| invalid(KEY_LAYER_COUNT, e))?;

        let mut dims = [0u32; 2];
        for (slot, key) in dims.iter_mut().zip([KEY_DESIGN_WIDTH, KEY_DESIGN_HEIGHT]) {
            let v = access::ensure_uint(required(record, key, None)?, key).map_err(|e| invalid(key, e))?;
            if v == 0 {
                return Err(BootstrapError::InvalidField {
                    field: key.to_string(),
                    message: "design resolution must be greater than zero".into(),
                    location: record.origin(key).cloned(),
                });
            }
            *slot = v;
        }

        for feature in features.iter() {
            for key in requirements.required_for(feature) {
                required(record, key, Some(feature))?;
            }
        }

        let vm = if features.contains(GameFeature::ScriptVm) {
            let block = required(record, KEY_VM, Some(GameFeature::ScriptVm))?;
            Some(VmStartupConfig::from_value(block).map_err(|e| invalid(KEY_VM, e))?)
        } else {
            None
        };

        let sections = root
            .as_object()
            .map(|o| {
                o.iter()
                    .filter(|(k, _)| !CORE_KEYS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            layer_count,
            features,
            design_width: dims[0],
            design_height: dims[1],
            vm,
            sections,
        })
    }

    pub fn layer_count(&self) -> u32 {
        self.layer_count
    }

    pub fn features(&self) -> FeatureMask {
        self.features
    }

    pub fn design_width(&self) -> u32 {
        self.design_width
    }

    pub fn design_height(&self) -> u32 {
        self.design_height
    }

    /// Present exactly when the script VM is enabled.
    pub fn vm(&self) -> Option<&VmStartupConfig> {
        self.vm.as_ref()
    }

    /// A subsystem-owned root key, e.g. `Dialogue` or `SaveIcon`.
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }

    pub fn sections(&self) -> &BTreeMap<String, Value> {
        &self.sections
    }

    /// Canonical JSON encoding. Sorted keys make it stable across runs.
    pub fn to_canonical_json(&self) -> String {
        // Every field serializes infallibly (no maps with non-string keys).
        serde_json::to_string(self).unwrap_or_default()
    }

    /// `sha256:<hex>` over the canonical JSON encoding.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.to_canonical_json().as_bytes());
        format!("sha256:{:x}", hasher.finalize())
    }
}

/// Integer masks are accepted as long as every set bit names a feature.
fn check_feature_bits(bits: i64) -> std::result::Result<(), String> {
    let Ok(bits) = u64::try_from(bits) else {
        return Err(format!("feature mask {} is negative", bits));
    };
    let unknown = bits & !FeatureMask::all().bits();
    if unknown == 0 {
        Ok(())
    } else {
        Err(format!(
            "feature mask {:#x} has unknown feature bits {:#x}",
            bits, unknown
        ))
    }
}

fn required<'r>(
    record: &'r ProfileRecord,
    key: &str,
    feature: Option<GameFeature>,
) -> Result<&'r Value> {
    record
        .get(key)
        .ok_or_else(|| BootstrapError::MissingRequiredField {
            field: key.to_string(),
            required_by: feature,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{PathKey, ProfileBuilder};
    use crate::error::Location;
    use crate::value::Object;

    fn record(entries: Vec<(&str, Value)>) -> ProfileRecord {
        let mut b = ProfileBuilder::new();
        for (i, (k, v)) in entries.into_iter().enumerate() {
            b.assign(
                &[PathKey::Key(k.into())],
                v,
                Location {
                    fragment: "game.js".into(),
                    line: i as u32 + 1,
                    column: 1,
                },
            )
            .unwrap();
        }
        b.finish()
    }

    fn vm_block() -> Value {
        let mut o = Object::new();
        o.insert("StartScript".into(), Value::Int(0));
        o.insert("StartScriptBuffer".into(), Value::Int(0));
        o.insert(
            "GameInstructionSet".into(),
            Value::InstructionSet(InstructionSet::Mo6tw),
        );
        o.insert("UseReturnIds".into(), Value::Bool(false));
        Value::Object(o)
    }

    fn base(features: FeatureMask) -> Vec<(&'static str, Value)> {
        vec![
            (KEY_LAYER_COUNT, Value::Int(100)),
            (KEY_GAME_FEATURES, Value::Features(features)),
            (KEY_DESIGN_WIDTH, Value::Int(1280)),
            (KEY_DESIGN_HEIGHT, Value::Int(720)),
        ]
    }

    #[test]
    fn vm_block_is_parsed_when_enabled() {
        let mut e = base(FeatureMask::from(GameFeature::ScriptVm));
        e.push((KEY_VM, vm_block()));
        e.push(("Dialogue", Value::empty_object()));
        let cfg = EngineConfig::from_record(&record(e), &RequirementTable::default()).unwrap();
        assert_eq!(
            cfg.vm(),
            Some(&VmStartupConfig {
                start_script: 0,
                start_script_buffer: 0,
                instruction_set: InstructionSet::Mo6tw,
                use_return_ids: false,
            })
        );
        assert!(cfg.section("Dialogue").is_some());
        assert!(cfg.section(KEY_VM).is_none());
    }

    #[test]
    fn vm_not_required_when_disabled() {
        let e = base(FeatureMask::from(GameFeature::Renderer2D));
        let cfg = EngineConfig::from_record(&record(e), &RequirementTable::default()).unwrap();
        assert!(cfg.vm().is_none());
    }

    #[test]
    fn missing_vm_when_enabled() {
        let e = base(FeatureMask::from(GameFeature::ScriptVm));
        let err = EngineConfig::from_record(&record(e), &RequirementTable::default()).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::MissingRequiredField {
                ref field,
                required_by: Some(GameFeature::ScriptVm)
            } if field == KEY_VM
        ));
    }

    #[test]
    fn extra_requirement_only_applies_to_enabled_feature() {
        let mut reqs = RequirementTable::default();
        reqs.require(GameFeature::Audio, "Audio");

        let without = base(FeatureMask::from(GameFeature::Input));
        assert!(EngineConfig::from_record(&record(without), &reqs).is_ok());

        let with = base(FeatureMask::from(GameFeature::Audio));
        let err = EngineConfig::from_record(&record(with), &reqs).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required field 'root.Audio' (required by Audio)"
        );
    }

    #[test]
    fn zero_width_is_invalid_and_located() {
        let mut e = base(FeatureMask::empty());
        e[2] = (KEY_DESIGN_WIDTH, Value::Int(0));
        let err = EngineConfig::from_record(&record(e), &RequirementTable::default()).unwrap_err();
        match err {
            BootstrapError::InvalidField { field, location, .. } => {
                assert_eq!(field, KEY_DESIGN_WIDTH);
                assert_eq!(location.map(|l| l.line), Some(3));
            }
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn negative_layer_count_is_invalid() {
        let mut e = base(FeatureMask::empty());
        e[0] = (KEY_LAYER_COUNT, Value::Int(-1));
        let err = EngineConfig::from_record(&record(e), &RequirementTable::default()).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidField { ref field, .. } if field == KEY_LAYER_COUNT));
    }

    #[test]
    fn raw_integer_feature_bits_are_accepted() {
        let mut e = base(FeatureMask::empty());
        e[1] = (
            KEY_GAME_FEATURES,
            Value::Int((GameFeature::Input.bit() | GameFeature::Audio.bit()) as i64),
        );
        let cfg = EngineConfig::from_record(&record(e), &RequirementTable::default()).unwrap();
        assert_eq!(cfg.features().len(), 2);
    }

    #[test]
    fn unknown_integer_feature_bits_are_named() {
        let mut e = base(FeatureMask::empty());
        e[1] = (KEY_GAME_FEATURES, Value::Int(1024));
        let err = EngineConfig::from_record(&record(e), &RequirementTable::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "game.js:2:1: invalid field 'root.GameFeatures': feature mask 0x400 has unknown feature bits 0x400"
        );

        let mut e = base(FeatureMask::empty());
        e[1] = (KEY_GAME_FEATURES, Value::Int(-1));
        let err = EngineConfig::from_record(&record(e), &RequirementTable::default()).unwrap_err();
        assert!(err.to_string().ends_with("feature mask -1 is negative"), "{err}");
    }

    #[test]
    fn non_mask_feature_value_reports_type() {
        let mut e = base(FeatureMask::empty());
        e[1] = (KEY_GAME_FEATURES, Value::Str("Audio".into()));
        let err = EngineConfig::from_record(&record(e), &RequirementTable::default()).unwrap_err();
        assert!(err.to_string().ends_with("actual type String"), "{err}");
    }

    #[test]
    fn fingerprint_is_stable() {
        let a = EngineConfig::from_record(
            &record(base(FeatureMask::from(GameFeature::Input))),
            &RequirementTable::default(),
        )
        .unwrap();
        let b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert!(a.fingerprint().starts_with("sha256:"));
        assert!(a.to_canonical_json().contains(r#""features":["Input"]"#));
    }
}
