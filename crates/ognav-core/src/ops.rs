//! Value coercion and operator semantics.
//!
//! This is the engine's standalone type-coercion policy: boolean and numeric
//! nodes in the evaluator and the cast-insertion logic in the compiler both
//! go through these functions, never through ad-hoc truthiness.
//!
//! Boolean coercion: `null` is false, numbers are non-zero, strings are true
//! unless empty or exactly `"false"` (so `!'false'` evaluates to true),
//! arrays and objects are always true.

use std::cmp::Ordering;

use crate::error::OgnavError;
use crate::value::Value;

/// Binary operators over values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
        )
    }
}

/// Coerce a value to boolean.
pub fn boolean_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(n) => *n != 0.0,
        Value::String(s) => !s.is_empty() && s != "false",
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Coerce a value to a float for mixed-mode arithmetic and comparison.
pub fn double_value(value: &Value) -> Result<f64, OgnavError> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(n) => Ok(*n),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| OgnavError::inappropriate(format!("'{s}' is not numeric"))),
        other => Err(OgnavError::inappropriate(format!(
            "cannot treat {} as a number",
            other.type_name()
        ))),
    }
}

/// Structural/coercing equality: numbers compare across `Int`/`Float`,
/// objects compare by identity (see `Value::eq`).
pub fn equal(left: &Value, right: &Value) -> bool {
    left == right
}

/// Ordering for relational operators. Numbers order numerically across
/// `Int`/`Float`, strings lexicographically.
pub fn compare(left: &Value, right: &Value) -> Result<Ordering, OgnavError> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (a, b) if a.tag().is_numeric() && b.tag().is_numeric() => {
            let (a, b) = (double_value(a)?, double_value(b)?);
            a.partial_cmp(&b).ok_or_else(|| {
                OgnavError::inappropriate("NaN is not ordered".to_string())
            })
        }
        (a, b) => Err(OgnavError::inappropriate(format!(
            "cannot order {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Apply a binary operator with the engine's coercion rules.
///
/// `Int op Int` stays integral (including division); any float operand
/// widens the whole operation. `+` on a string operand concatenates.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, OgnavError> {
    match op {
        BinaryOp::Equal => return Ok(Value::Bool(equal(left, right))),
        BinaryOp::NotEqual => return Ok(Value::Bool(!equal(left, right))),
        BinaryOp::Less => return Ok(Value::Bool(compare(left, right)? == Ordering::Less)),
        BinaryOp::LessEqual => {
            return Ok(Value::Bool(compare(left, right)? != Ordering::Greater));
        }
        BinaryOp::Greater => {
            return Ok(Value::Bool(compare(left, right)? == Ordering::Greater));
        }
        BinaryOp::GreaterEqual => {
            return Ok(Value::Bool(compare(left, right)? != Ordering::Less));
        }
        _ => {}
    }

    if op == BinaryOp::Add
        && (matches!(left, Value::String(_)) || matches!(right, Value::String(_)))
    {
        return Ok(Value::String(format!("{left}{right}")));
    }

    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b),
        _ => {
            let (a, b) = (double_value(left)?, double_value(right)?);
            float_arith(op, a, b)
        }
    }
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<Value, OgnavError> {
    let checked = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Rem => a.checked_rem(b),
        _ => unreachable!("comparisons handled above"),
    };
    checked.map(Value::Int).ok_or_else(|| {
        OgnavError::inappropriate(format!("integer overflow or division by zero in {a} {} {b}", op.symbol()))
    })
}

fn float_arith(op: BinaryOp, a: f64, b: f64) -> Result<Value, OgnavError> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => unreachable!("comparisons handled above"),
    };
    Ok(Value::Float(result))
}

/// Arithmetic negation.
pub fn negate(value: &Value) -> Result<Value, OgnavError> {
    match value {
        Value::Int(n) => Ok(Value::Int(-n)),
        Value::Float(n) => Ok(Value::Float(-n)),
        other => Err(OgnavError::inappropriate(format!(
            "cannot negate {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_coercion() {
        assert!(!boolean_value(&Value::Null));
        assert!(!boolean_value(&Value::String("".into())));
        assert!(!boolean_value(&Value::String("false".into())));
        assert!(boolean_value(&Value::String("true".into())));
        assert!(boolean_value(&Value::String("anything".into())));
        assert!(!boolean_value(&Value::Int(0)));
        assert!(boolean_value(&Value::Float(0.5)));
        assert!(boolean_value(&Value::array(vec![])));
    }

    #[test]
    fn test_integer_division_stays_integral() {
        assert_eq!(
            binary(BinaryOp::Div, &Value::Int(7), &Value::Int(2)).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            binary(BinaryOp::Div, &Value::Int(7), &Value::Float(2.0)).unwrap(),
            Value::Float(3.5)
        );
        assert!(binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)).is_err());
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            binary(BinaryOp::Add, &Value::from("a"), &Value::Int(1)).unwrap(),
            Value::from("a1")
        );
    }

    #[test]
    fn test_comparisons_coerce_numerics() {
        assert_eq!(
            binary(BinaryOp::Less, &Value::Int(1), &Value::Float(1.5)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            binary(BinaryOp::Equal, &Value::Int(2), &Value::Float(2.0)).unwrap(),
            Value::Bool(true)
        );
        assert!(binary(BinaryOp::Less, &Value::Bool(true), &Value::Null).is_err());
    }
}
