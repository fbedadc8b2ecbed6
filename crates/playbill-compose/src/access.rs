//! Typed readers over composed profile values.
//!
//! Subsystems pull their configuration out of the record with these. The
//! `try_get_*` family answers "is it there and of the right shape", the
//! `ensure_*` family turns a miss into an [`AccessError`] naming the value's
//! path (`Vm/StartScript`) so an authoring mistake can be traced back.

use serde::Serialize;

use crate::feature::FeatureMask;
use crate::instruction_set::InstructionSet;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccessError {
    #[error("expected {path} to have member {member}")]
    MissingMember { path: String, member: String },

    #[error("expected {path} to be {expected}, actual type {actual}")]
    WrongType {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl AccessError {
    /// Slash-separated path of the value that failed.
    pub fn path(&self) -> String {
        match self {
            AccessError::MissingMember { path, member } => format!("{}/{}", path, member),
            AccessError::WrongType { path, .. } => path.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

// ---------------------------------------------------------------------------
// try_get_*
// ---------------------------------------------------------------------------

pub fn try_get_member<'v>(val: &'v Value, member: &str) -> Option<&'v Value> {
    val.get(member)
}

pub fn try_get_bool(val: &Value) -> Option<bool> {
    match val {
        Value::Bool(b) => Some(*b),
        _ => None,
    }
}

/// Integers, integral floats and numeric strings are all accepted.
pub fn try_get_int(val: &Value) -> Option<i64> {
    match val {
        Value::Int(i) => Some(*i),
        Value::Float(x) if x.fract() == 0.0 && x.abs() < i64::MAX as f64 => Some(*x as i64),
        Value::Str(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn try_get_uint(val: &Value) -> Option<u32> {
    try_get_int(val).and_then(|i| u32::try_from(i).ok())
}

pub fn try_get_float(val: &Value) -> Option<f32> {
    match val {
        Value::Float(x) => Some(*x as f32),
        Value::Int(i) => Some(*i as f32),
        _ => None,
    }
}

pub fn try_get_str(val: &Value) -> Option<&str> {
    match val {
        Value::Str(s) => Some(s),
        _ => None,
    }
}

/// `{X, Y}` or `[x, y]`.
pub fn try_get_vec2(val: &Value) -> Option<Vec2> {
    match val {
        Value::Object(_) => Some(Vec2 {
            x: try_get_float(val.get("X")?)?,
            y: try_get_float(val.get("Y")?)?,
        }),
        Value::Array(elems) if elems.len() == 2 => Some(Vec2 {
            x: try_get_float(&elems[0])?,
            y: try_get_float(&elems[1])?,
        }),
        _ => None,
    }
}

/// `{X, Y, Width, Height}`.
pub fn try_get_rect(val: &Value) -> Option<RectF> {
    Some(RectF {
        x: try_get_float(val.get("X")?)?,
        y: try_get_float(val.get("Y")?)?,
        width: try_get_float(val.get("Width")?)?,
        height: try_get_float(val.get("Height")?)?,
    })
}

/// A feature mask, or a raw integer whose bits all name known features.
pub fn try_get_features(val: &Value) -> Option<FeatureMask> {
    match val {
        Value::Features(mask) => Some(*mask),
        Value::Int(bits) => u64::try_from(*bits).ok().and_then(FeatureMask::from_bits),
        _ => None,
    }
}

pub fn try_get_instruction_set(val: &Value) -> Option<InstructionSet> {
    match val {
        Value::InstructionSet(set) => Some(*set),
        Value::Str(s) => InstructionSet::from_name(s),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// ensure_*
// ---------------------------------------------------------------------------

pub fn ensure_member<'v>(val: &'v Value, path: &str, member: &str) -> Result<&'v Value, AccessError> {
    if !matches!(val, Value::Object(_)) {
        return Err(AccessError::WrongType {
            path: path.to_string(),
            expected: "Object",
            actual: val.type_name(),
        });
    }
    val.get(member).ok_or_else(|| AccessError::MissingMember {
        path: path.to_string(),
        member: member.to_string(),
    })
}

/// Apply a `try_get_*` reader, reporting `expected` on a miss.
pub fn ensure_as<T>(
    val: &Value,
    path: &str,
    expected: &'static str,
    get: impl FnOnce(&Value) -> Option<T>,
) -> Result<T, AccessError> {
    get(val).ok_or_else(|| AccessError::WrongType {
        path: path.to_string(),
        expected,
        actual: val.type_name(),
    })
}

pub fn ensure_member_as<T>(
    val: &Value,
    path: &str,
    member: &str,
    expected: &'static str,
    get: impl FnOnce(&Value) -> Option<T>,
) -> Result<T, AccessError> {
    let inner = ensure_member(val, path, member)?;
    ensure_as(inner, &format!("{}/{}", path, member), expected, get)
}

pub fn ensure_bool(val: &Value, path: &str) -> Result<bool, AccessError> {
    ensure_as(val, path, "boolean", try_get_bool)
}

pub fn ensure_int(val: &Value, path: &str) -> Result<i64, AccessError> {
    ensure_as(val, path, "integer convertible", try_get_int)
}

pub fn ensure_uint(val: &Value, path: &str) -> Result<u32, AccessError> {
    ensure_as(val, path, "unsigned integer convertible", try_get_uint)
}

pub fn ensure_float(val: &Value, path: &str) -> Result<f32, AccessError> {
    ensure_as(val, path, "number", try_get_float)
}

pub fn ensure_str<'v>(val: &'v Value, path: &str) -> Result<&'v str, AccessError> {
    match val {
        Value::Str(s) => Ok(s),
        other => Err(AccessError::WrongType {
            path: path.to_string(),
            expected: "String",
            actual: other.type_name(),
        }),
    }
}

pub fn ensure_vec2(val: &Value, path: &str) -> Result<Vec2, AccessError> {
    ensure_as(val, path, "vec2", try_get_vec2)
}

pub fn ensure_rect(val: &Value, path: &str) -> Result<RectF, AccessError> {
    ensure_as(val, path, "rect", try_get_rect)
}

pub fn ensure_member_bool(val: &Value, path: &str, member: &str) -> Result<bool, AccessError> {
    ensure_member_as(val, path, member, "boolean", try_get_bool)
}

pub fn ensure_member_int(val: &Value, path: &str, member: &str) -> Result<i64, AccessError> {
    ensure_member_as(val, path, member, "integer convertible", try_get_int)
}

pub fn ensure_member_uint(val: &Value, path: &str, member: &str) -> Result<u32, AccessError> {
    ensure_member_as(val, path, member, "unsigned integer convertible", try_get_uint)
}

pub fn ensure_member_float(val: &Value, path: &str, member: &str) -> Result<f32, AccessError> {
    ensure_member_as(val, path, member, "number", try_get_float)
}

pub fn ensure_member_str<'v>(val: &'v Value, path: &str, member: &str) -> Result<&'v str, AccessError> {
    let inner = ensure_member(val, path, member)?;
    ensure_str(inner, &format!("{}/{}", path, member))
}

pub fn ensure_member_vec2(val: &Value, path: &str, member: &str) -> Result<Vec2, AccessError> {
    ensure_member_as(val, path, member, "vec2", try_get_vec2)
}

pub fn ensure_member_rect(val: &Value, path: &str, member: &str) -> Result<RectF, AccessError> {
    ensure_member_as(val, path, member, "rect", try_get_rect)
}

pub fn ensure_member_features(
    val: &Value,
    path: &str,
    member: &str,
) -> Result<FeatureMask, AccessError> {
    ensure_member_as(val, path, member, "GameFeature mask", try_get_features)
}

pub fn ensure_member_instruction_set(
    val: &Value,
    path: &str,
    member: &str,
) -> Result<InstructionSet, AccessError> {
    ensure_member_as(val, path, member, "InstructionSet", try_get_instruction_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;

    fn obj(fields: &[(&str, Value)]) -> Value {
        Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<Object>(),
        )
    }

    #[test]
    fn int_accepts_numeric_strings_and_integral_floats() {
        assert_eq!(try_get_int(&Value::Str(" 42 ".into())), Some(42));
        assert_eq!(try_get_int(&Value::Float(3.0)), Some(3));
        assert_eq!(try_get_int(&Value::Float(3.5)), None);
        assert_eq!(try_get_int(&Value::Str("abc".into())), None);
    }

    #[test]
    fn uint_rejects_negative() {
        assert_eq!(try_get_uint(&Value::Int(-1)), None);
        assert_eq!(try_get_uint(&Value::Int(7)), Some(7));
    }

    #[test]
    fn missing_member_names_path() {
        let vm = obj(&[("StartScript", Value::Int(0))]);
        let err = ensure_member_uint(&vm, "Vm", "StartScriptBuffer").unwrap_err();
        assert_eq!(err.to_string(), "expected Vm to have member StartScriptBuffer");
        assert_eq!(err.path(), "Vm/StartScriptBuffer");
    }

    #[test]
    fn wrong_type_names_expected_and_actual() {
        let vm = obj(&[("UseReturnIds", Value::Int(1))]);
        let err = ensure_member_bool(&vm, "Vm", "UseReturnIds").unwrap_err();
        assert_eq!(
            err.to_string(),
            "expected Vm/UseReturnIds to be boolean, actual type Number"
        );
    }

    #[test]
    fn member_of_non_object() {
        let err = ensure_member(&Value::Int(1), "Vm", "X").unwrap_err();
        assert!(matches!(err, AccessError::WrongType { expected: "Object", .. }));
    }

    #[test]
    fn vec2_and_rect_shapes() {
        let v = obj(&[("X", Value::Int(3)), ("Y", Value::Float(4.5))]);
        assert_eq!(try_get_vec2(&v), Some(Vec2 { x: 3.0, y: 4.5 }));
        assert_eq!(
            try_get_vec2(&Value::Array(vec![Value::Int(1), Value::Int(2)])),
            Some(Vec2 { x: 1.0, y: 2.0 })
        );
        let r = obj(&[
            ("X", Value::Int(0)),
            ("Y", Value::Int(0)),
            ("Width", Value::Int(1280)),
            ("Height", Value::Int(720)),
        ]);
        assert_eq!(
            ensure_rect(&r, "Box").unwrap(),
            RectF {
                x: 0.0,
                y: 0.0,
                width: 1280.0,
                height: 720.0
            }
        );
        assert!(ensure_rect(&v, "Box").is_err());
    }

    #[test]
    fn features_from_raw_bits() {
        assert_eq!(
            try_get_features(&Value::Int(0b11)).map(|m| m.len()),
            Some(2)
        );
        assert_eq!(try_get_features(&Value::Int(-1)), None);
    }

    #[test]
    fn instruction_set_from_symbol_or_name() {
        assert_eq!(
            try_get_instruction_set(&Value::Str("MO7".into())),
            Some(InstructionSet::Mo7)
        );
        assert_eq!(
            try_get_instruction_set(&Value::InstructionSet(InstructionSet::Rne)),
            Some(InstructionSet::Rne)
        );
    }
}
