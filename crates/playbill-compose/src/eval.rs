//! Evaluator for profile statements.
//!
//! Folds a [`CompositionPlan`] left to right into a [`ProfileBuilder`]. Each
//! assignment sees everything earlier statements wrote, whichever fragment
//! they came from.

use playbill_ast::ast::{BinOp, Expr, Lit, Place, Segment, Stmt, UnOp};
use playbill_ast::span::Span;
use tracing::trace;

use crate::builder::{PathKey, ProfileBuilder};
use crate::error::{BootstrapError, Result};
use crate::feature::{FeatureMask, GameFeature};
use crate::instruction_set::InstructionSet;
use crate::resolver::{CompositionPlan, LoadedFragment};
use crate::value::{Object, Value};

/// The name every assignment target must start with.
pub const ROOT_NAME: &str = "root";

/// Evaluation failure; the span is mapped to a fragment location by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub message: String,
    pub span: Span,
}

type EvalResult<T> = std::result::Result<T, EvalError>;

fn fail<T>(span: Span, message: impl Into<String>) -> EvalResult<T> {
    Err(EvalError {
        message: message.into(),
        span,
    })
}

/// Run every planned statement against `builder`, stopping at the first error.
pub fn fold_plan(plan: &CompositionPlan, builder: &mut ProfileBuilder) -> Result<()> {
    for (fragment, stmt) in plan.statements() {
        apply_stmt(builder, fragment, stmt)?;
    }
    Ok(())
}

/// Execute one statement of `fragment`.
pub fn apply_stmt(builder: &mut ProfileBuilder, fragment: &LoadedFragment, stmt: &Stmt) -> Result<()> {
    let malformed = |e: EvalError| BootstrapError::MalformedStatement {
        location: fragment.location(e.span),
        message: e.message,
    };
    match stmt {
        Stmt::Assign {
            target,
            value,
            span,
        } => {
            let path = target_path(target).map_err(malformed)?;
            let value = eval_expr(builder, value).map_err(malformed)?;
            trace!(fragment = %fragment.path, place = %target, "assign");
            builder
                .assign(&path, value, fragment.location(*span))
                .map_err(|e| malformed(EvalError {
                    message: e.to_string(),
                    span: target.span,
                }))?;
            Ok(())
        }
        // Includes are expanded by the resolver before folding.
        Stmt::Include { span, path } => Err(malformed(EvalError {
            message: format!("include('{}') was not expanded before evaluation", path),
            span: *span,
        })),
    }
}

fn target_path(place: &Place) -> EvalResult<Vec<PathKey>> {
    if place.head.text != ROOT_NAME {
        return fail(
            place.head.span,
            format!(
                "assignment target must start with `{}`, found `{}`",
                ROOT_NAME, place.head.text
            ),
        );
    }
    if place.segments.is_empty() {
        return fail(place.span, "cannot assign to `root` itself");
    }
    Ok(segments_to_path(&place.segments))
}

fn segments_to_path(segments: &[Segment]) -> Vec<PathKey> {
    segments
        .iter()
        .map(|seg| match seg {
            Segment::Field(id) => PathKey::Key(id.text.clone()),
            Segment::Key(k, _) => PathKey::Key(k.clone()),
            Segment::Index(i, _) => PathKey::Index(*i),
        })
        .collect()
}

pub fn eval_expr(builder: &ProfileBuilder, expr: &Expr) -> EvalResult<Value> {
    match expr {
        Expr::Lit(Lit::Int(v), _) => Ok(Value::Int(*v)),
        Expr::Lit(Lit::Float(v), _) => Ok(Value::Float(*v)),
        Expr::Lit(Lit::Bool(b), _) => Ok(Value::Bool(*b)),
        Expr::Lit(Lit::Str(s), _) => Ok(Value::Str(s.clone())),
        Expr::Lit(Lit::Null, _) => Ok(Value::Null),

        Expr::Place(place) => eval_place(builder, place),

        Expr::Paren { inner, .. } => eval_expr(builder, inner),

        Expr::Object { fields, .. } => {
            let mut obj = Object::new();
            for field in fields {
                // Duplicate keys: the later one wins, as in script object literals.
                obj.insert(field.key.clone(), eval_expr(builder, &field.value)?);
            }
            Ok(Value::Object(obj))
        }

        Expr::Array { elems, .. } => elems
            .iter()
            .map(|e| eval_expr(builder, e))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::Array),

        Expr::Unary {
            op: UnOp::Neg,
            expr,
            span,
        } => match eval_expr(builder, expr)? {
            Value::Int(i) => match i.checked_neg() {
                Some(v) => Ok(Value::Int(v)),
                None => fail(*span, "integer overflow in negation"),
            },
            Value::Float(x) => Ok(Value::Float(-x)),
            other => fail(
                *span,
                format!("unary `-` expects a number, found {}", other.type_name()),
            ),
        },

        Expr::Binary { lhs, op, rhs, span } => {
            let l = eval_expr(builder, lhs)?;
            let r = eval_expr(builder, rhs)?;
            eval_binary(*op, l, r, *span)
        }
    }
}

/// `root...` reads the record; `GameFeature.X` and `InstructionSet.X` name
/// engine enumerations.
fn eval_place(builder: &ProfileBuilder, place: &Place) -> EvalResult<Value> {
    match place.head.text.as_str() {
        ROOT_NAME => {
            let path = segments_to_path(&place.segments);
            builder
                .lookup(&path)
                .cloned()
                .or_else(|e| fail(place.span, e.to_string()))
        }
        "GameFeature" => {
            let name = enum_member(place)?;
            match GameFeature::from_name(name) {
                Some(f) => Ok(Value::Features(FeatureMask::singleton(f))),
                None => fail(place.span, format!("unknown GameFeature `{}`", name)),
            }
        }
        "InstructionSet" => {
            let name = enum_member(place)?;
            match InstructionSet::from_name(name) {
                Some(set) => Ok(Value::InstructionSet(set)),
                None => fail(place.span, format!("unknown InstructionSet `{}`", name)),
            }
        }
        other => fail(place.head.span, format!("undefined identifier `{}`", other)),
    }
}

fn enum_member(place: &Place) -> EvalResult<&str> {
    match place.segments.as_slice() {
        [Segment::Field(id)] => Ok(&id.text),
        _ => fail(
            place.span,
            format!("expected `{}.<Member>`, found `{}`", place.head.text, place),
        ),
    }
}

fn eval_binary(op: BinOp, l: Value, r: Value, span: Span) -> EvalResult<Value> {
    use Value::{Features, Float, Int, Str};

    let mismatch = |l: &Value, r: &Value| {
        fail(
            span,
            format!(
                "operator `{}` cannot combine {} and {}",
                op.symbol(),
                l.type_name(),
                r.type_name()
            ),
        )
    };
    let overflow = || fail(span, format!("integer overflow in `{}`", op.symbol()));

    match op {
        BinOp::BitOr => match (&l, &r) {
            (Features(a), Features(b)) => Ok(Features(*a | *b)),
            (Int(a), Int(b)) => Ok(Int(a | b)),
            _ => mismatch(&l, &r),
        },
        BinOp::Add => match (&l, &r) {
            (Int(a), Int(b)) => a.checked_add(*b).map(Int).map_or_else(overflow, Ok),
            (Str(a), Str(b)) => Ok(Str(format!("{}{}", a, b))),
            (Str(a), Int(_) | Float(_)) => Ok(Str(format!("{}{}", a, r))),
            (Int(_) | Float(_), Str(b)) => Ok(Str(format!("{}{}", l, b))),
            _ => float_op(&l, &r, |a, b| a + b).map_or_else(|| mismatch(&l, &r), Ok),
        },
        BinOp::Sub => match (&l, &r) {
            (Int(a), Int(b)) => a.checked_sub(*b).map(Int).map_or_else(overflow, Ok),
            _ => float_op(&l, &r, |a, b| a - b).map_or_else(|| mismatch(&l, &r), Ok),
        },
        BinOp::Mul => match (&l, &r) {
            (Int(a), Int(b)) => a.checked_mul(*b).map(Int).map_or_else(overflow, Ok),
            _ => float_op(&l, &r, |a, b| a * b).map_or_else(|| mismatch(&l, &r), Ok),
        },
        BinOp::Div => match (&l, &r) {
            (_, Int(0)) => fail(span, "division by zero"),
            (_, Float(b)) if *b == 0.0 => fail(span, "division by zero"),
            // Integral quotients stay integers; otherwise the result is a float.
            (Int(a), Int(b)) if a.checked_rem(*b) == Some(0) => a.checked_div(*b).map(Int).map_or_else(overflow, Ok),
            _ => float_op(&l, &r, |a, b| a / b).map_or_else(|| mismatch(&l, &r), Ok),
        },
    }
}

fn float_op(l: &Value, r: &Value, f: impl Fn(f64, f64) -> f64) -> Option<Value> {
    let as_f = |v: &Value| match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    };
    Some(Value::Float(f(as_f(l)?, as_f(r)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Location;

    fn run(src: &str) -> Result<ProfileBuilder> {
        let program = playbill_parse::parse_str("test.js", src).expect("parse failed");
        let fragment = LoadedFragment::new("test.js", src.to_string(), program);
        let mut b = ProfileBuilder::new();
        for stmt in &fragment.program.stmts {
            apply_stmt(&mut b, &fragment, stmt)?;
        }
        Ok(b)
    }

    fn run_err(src: &str) -> (Location, String) {
        match run(src) {
            Err(BootstrapError::MalformedStatement { location, message }) => (location, message),
            Err(other) => panic!("expected MalformedStatement, got {other:?}"),
            Ok(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn feature_union() {
        let b = run(
            "root.GameFeatures = GameFeature.Sc3VirtualMachine | GameFeature.Renderer2D | GameFeature.Input | GameFeature.Audio;",
        )
        .unwrap();
        let Some(Value::Features(mask)) = b.get("GameFeatures") else {
            panic!("expected feature mask");
        };
        assert_eq!(mask.len(), 4);
        assert!(mask.contains(GameFeature::ScriptVm));
    }

    #[test]
    fn features_accumulate_through_reads() {
        let b = run(
            "root.GameFeatures = GameFeature.Input;\nroot.GameFeatures = root.GameFeatures | GameFeature.Audio;",
        )
        .unwrap();
        assert_eq!(
            b.get("GameFeatures"),
            Some(&Value::Features(
                FeatureMask::from(GameFeature::Input) | GameFeature::Audio
            ))
        );
    }

    #[test]
    fn vm_object_literal() {
        let b = run(
            "root.Vm = { StartScript: 0, StartScriptBuffer: 0, GameInstructionSet: InstructionSet.MO6TW, UseReturnIds: false };",
        )
        .unwrap();
        let vm = b.get("Vm").unwrap();
        assert_eq!(
            vm.get("GameInstructionSet"),
            Some(&Value::InstructionSet(InstructionSet::Mo6tw))
        );
        assert_eq!(vm.get("UseReturnIds"), Some(&Value::Bool(false)));
    }

    #[test]
    fn arithmetic_follows_script_numbers() {
        let b = run("root.A = 1280 / 2;\nroot.B = 5 / 2;\nroot.C = root.A - 40 * 2;\nroot.D = 'font' + 1;").unwrap();
        assert_eq!(b.get("A"), Some(&Value::Int(640)));
        assert_eq!(b.get("B"), Some(&Value::Float(2.5)));
        assert_eq!(b.get("C"), Some(&Value::Int(560)));
        assert_eq!(b.get("D"), Some(&Value::Str("font1".into())));
    }

    #[test]
    fn indexed_table_registration() {
        let b = run("root.Sprites = {};\nroot.Sprites[\"SaveIcon\"] = { X: 1, Y: 2 };").unwrap();
        assert_eq!(
            b.get("Sprites").and_then(|s| s.get("SaveIcon")).and_then(|s| s.get("Y")),
            Some(&Value::Int(2))
        );
    }

    #[test]
    fn unknown_feature_is_malformed() {
        let (loc, msg) = run_err("root.A = 1;\nroot.GameFeatures = GameFeature.Teleporter;");
        assert_eq!((loc.line, loc.column), (2, 21));
        assert_eq!(msg, "unknown GameFeature `Teleporter`");
    }

    #[test]
    fn reading_undefined_root_key() {
        let (loc, msg) = run_err("root.B = root.A + 1;");
        assert_eq!(loc.column, 10);
        assert_eq!(msg, "root.A is not defined");
    }

    #[test]
    fn target_must_be_root() {
        let (_, msg) = run_err("config.A = 1;");
        assert!(msg.contains("must start with `root`"));
    }

    #[test]
    fn mixing_flags_and_strings_is_rejected() {
        let (_, msg) = run_err("root.F = GameFeature.Input | 'x';");
        assert_eq!(msg, "operator `|` cannot combine Features and String");
    }

    #[test]
    fn division_by_zero() {
        let (_, msg) = run_err("root.F = 1 / 0;");
        assert_eq!(msg, "division by zero");
    }

    #[test]
    fn missing_parent_reports_target() {
        let (loc, msg) = run_err("root.Hud.SaveIcon = {};");
        assert_eq!(loc.column, 1);
        assert_eq!(msg, "root.Hud is not defined");
    }
}
