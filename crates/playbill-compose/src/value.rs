//! Runtime values produced by evaluating profile expressions.

use std::collections::BTreeMap;

use crate::feature::FeatureMask;
use crate::instruction_set::InstructionSet;

/// Object members are kept sorted so that two compositions of the same tree
/// serialize identically.
pub type Object = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Object(Object),
    Features(FeatureMask),
    InstructionSet(InstructionSet),
}

impl Value {
    pub fn empty_object() -> Value {
        Value::Object(Object::new())
    }

    /// Type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) | Value::Float(_) => "Number",
            Value::Str(_) => "String",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
            Value::Features(_) => "Features",
            Value::InstructionSet(_) => "InstructionSet",
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Member lookup on objects; `None` for every other type.
    pub fn get(&self, member: &str) -> Option<&Value> {
        self.as_object().and_then(|o| o.get(member))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Array(elems) => {
                write!(f, "[")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, "]")
            }
            Value::Object(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", k, v)?;
                }
                if !fields.is_empty() {
                    write!(f, " ")?;
                }
                write!(f, "}}")
            }
            Value::Features(mask) => write!(f, "GameFeature{}", mask),
            Value::InstructionSet(set) => write!(f, "InstructionSet.{}", set),
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Array(elems) => elems.serialize(serializer),
            Value::Object(fields) => fields.serialize(serializer),
            Value::Features(mask) => mask.serialize(serializer),
            Value::InstructionSet(set) => set.serialize(serializer),
        }
    }
}
