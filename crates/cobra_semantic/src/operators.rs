//! Pure operator evaluation over [`Value`], per `operators.py`.
//!
//! Every function here is total: an operator applied to operands it
//! doesn't support folds to [`Value::Unknown`] rather than panicking,
//! mirroring `operators.py::operator_evaluate`'s `except (TypeError,
//! ValueError): return UnknownValue()`.

use cobra_ast::{BoolOp, CmpOp, Operator, UnaryOp};

use crate::value::Value;

fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Unknown => None,
        Value::None => Some(false),
        Value::Bool(b) => Some(*b),
        Value::Num(n) => Some(n.0 != 0.0),
        Value::Str(s) => Some(!s.is_empty()),
        Value::List(items) | Value::Set(items) | Value::Tuple(items) => Some(!items.is_empty()),
        Value::Dict(items) => Some(!items.is_empty()),
    }
}

pub fn eval_bool_op(op: BoolOp, values: &[Value]) -> Value {
    let truths: Vec<Option<bool>> = values.iter().map(truthy).collect();
    match op {
        BoolOp::And => {
            if truths.iter().any(|t| *t == Some(false)) {
                Value::Bool(false)
            } else if truths.iter().all(|t| *t == Some(true)) {
                Value::Bool(true)
            } else {
                Value::Unknown
            }
        }
        BoolOp::Or => {
            if truths.iter().any(|t| *t == Some(true)) {
                Value::Bool(true)
            } else if truths.iter().all(|t| *t == Some(false)) {
                Value::Bool(false)
            } else {
                Value::Unknown
            }
        }
    }
}

fn num_binop(left: f64, right: f64, op: Operator) -> Value {
    let result = match op {
        Operator::Add => left + right,
        Operator::Sub => left - right,
        Operator::Mult => left * right,
        Operator::Div => {
            if right == 0.0 {
                return Value::Unknown;
            }
            left / right
        }
        Operator::Mod => {
            if right == 0.0 {
                return Value::Unknown;
            }
            left.rem_euclid(right)
        }
        Operator::Pow => left.powf(right),
        Operator::FloorDiv => {
            if right == 0.0 {
                return Value::Unknown;
            }
            (left / right).floor()
        }
        Operator::LShift | Operator::RShift | Operator::BitAnd | Operator::BitXor | Operator::BitOr => {
            return int_bitop(left, right, op);
        }
    };
    Value::num(result)
}

fn int_bitop(left: f64, right: f64, op: Operator) -> Value {
    if left.fract() != 0.0 || right.fract() != 0.0 {
        return Value::Unknown;
    }
    let (Some(l), Some(r)) = (to_i64(left), to_i64(right)) else {
        return Value::Unknown;
    };
    let result = match op {
        Operator::LShift => l.checked_shl(r as u32),
        Operator::RShift => l.checked_shr(r as u32),
        Operator::BitAnd => Some(l & r),
        Operator::BitXor => Some(l ^ r),
        Operator::BitOr => Some(l | r),
        _ => unreachable!("int_bitop only called for bitwise operators"),
    };
    result.map_or(Value::Unknown, |v| Value::num(v as f64))
}

fn to_i64(n: f64) -> Option<i64> {
    if n.is_finite() && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

fn repeat_sequence(times: f64, repeat: impl Fn(usize) -> Value) -> Value {
    if times.fract() != 0.0 || times < 0.0 {
        return Value::Unknown;
    }
    repeat(times as usize)
}

/// `+`, `-`, `*`, `/`, `%`, `**`, `<<`, `>>`, `&`, `^`, `|`, `//`.
pub fn eval_bin_op(op: Operator, left: &Value, right: &Value) -> Value {
    match (left, right, op) {
        (Value::Unknown, _, _) | (_, Value::Unknown, _) => Value::Unknown,
        (Value::Num(l), Value::Num(r), _) => num_binop(l.0, r.0, op),
        (Value::Str(l), Value::Str(r), Operator::Add) => Value::Str(format!("{l}{r}").into()),
        (Value::List(l), Value::List(r), Operator::Add) => {
            Value::List(l.iter().cloned().chain(r.iter().cloned()).collect())
        }
        (Value::Tuple(l), Value::Tuple(r), Operator::Add) => {
            Value::Tuple(l.iter().cloned().chain(r.iter().cloned()).collect())
        }
        (Value::Str(s), Value::Num(n), Operator::Mult) | (Value::Num(n), Value::Str(s), Operator::Mult) => {
            repeat_sequence(n.0, |count| Value::Str(s.repeat(count).into()))
        }
        (Value::List(items), Value::Num(n), Operator::Mult) | (Value::Num(n), Value::List(items), Operator::Mult) => {
            repeat_sequence(n.0, |count| Value::List(items.iter().cloned().cycle().take(items.len() * count).collect()))
        }
        _ => Value::Unknown,
    }
}

/// `not`, unary `-`, unary `+`, `~`.
pub fn eval_unary_op(op: UnaryOp, operand: &Value) -> Value {
    match op {
        UnaryOp::Not => truthy(operand).map_or(Value::Unknown, |t| Value::Bool(!t)),
        UnaryOp::USub => match operand {
            Value::Num(n) => Value::num(-n.0),
            _ => Value::Unknown,
        },
        UnaryOp::UAdd => match operand {
            Value::Num(n) => Value::num(n.0),
            _ => Value::Unknown,
        },
        UnaryOp::Invert => match operand {
            Value::Num(n) if n.0.fract() == 0.0 => to_i64(n.0).map_or(Value::Unknown, |i| Value::num(!i as f64)),
            _ => Value::Unknown,
        },
    }
}

fn contains(container: &Value, item: &Value) -> Option<bool> {
    match container {
        Value::List(items) | Value::Set(items) | Value::Tuple(items) => Some(items.contains(item)),
        Value::Dict(items) => Some(items.iter().any(|(k, _)| k == item)),
        Value::Str(haystack) => match item {
            Value::Str(needle) => Some(haystack.contains(needle.as_str())),
            _ => None,
        },
        Value::Unknown => None,
        _ => None,
    }
}

/// A single comparison operator applied to two operands -- not a chain.
/// Chain-level semantics (and warning about chained `is`/`in`) live in
/// the expression typer, which calls this once per adjacent pair.
pub fn eval_cmp_op(op: CmpOp, left: &Value, right: &Value) -> Value {
    if matches!(left, Value::Unknown) || matches!(right, Value::Unknown) {
        return Value::Unknown;
    }
    match op {
        CmpOp::Eq => Value::Bool(left == right),
        CmpOp::NotEq => Value::Bool(left != right),
        CmpOp::Is => match (left, right) {
            (Value::None, Value::None) => Value::Bool(true),
            (Value::Bool(a), Value::Bool(b)) => Value::Bool(a == b),
            (Value::None, _) | (_, Value::None) => Value::Bool(false),
            _ => Value::Unknown,
        },
        CmpOp::IsNot => match eval_cmp_op(CmpOp::Is, left, right) {
            Value::Bool(b) => Value::Bool(!b),
            _ => Value::Unknown,
        },
        CmpOp::In => contains(right, left).map_or(Value::Unknown, Value::Bool),
        CmpOp::NotIn => contains(right, left).map_or(Value::Unknown, |b| Value::Bool(!b)),
        CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => match (left, right) {
            (Value::Num(l), Value::Num(r)) => Value::Bool(match op {
                CmpOp::Lt => l.0 < r.0,
                CmpOp::LtE => l.0 <= r.0,
                CmpOp::Gt => l.0 > r.0,
                CmpOp::GtE => l.0 >= r.0,
                _ => unreachable!("matched above"),
            }),
            (Value::Str(l), Value::Str(r)) => Value::Bool(match op {
                CmpOp::Lt => l < r,
                CmpOp::LtE => l <= r,
                CmpOp::Gt => l > r,
                CmpOp::GtE => l >= r,
                _ => unreachable!("matched above"),
            }),
            _ => Value::Unknown,
        },
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(Operator::Add, 2.0, 3.0, 5.0; "add")]
    #[test_case(Operator::Sub, 5.0, 3.0, 2.0; "sub")]
    #[test_case(Operator::Mult, 2.0, 3.0, 6.0; "mult")]
    #[test_case(Operator::Div, 6.0, 3.0, 2.0; "div")]
    #[test_case(Operator::FloorDiv, 7.0, 2.0, 3.0; "floor_div")]
    #[test_case(Operator::Pow, 2.0, 3.0, 8.0; "pow")]
    fn numeric_binops_fold_to_their_arithmetic_result(op: Operator, left: f64, right: f64, expected: f64) {
        assert_eq!(eval_bin_op(op, &Value::num(left), &Value::num(right)), Value::num(expected));
    }

    #[test_case(Operator::Div; "div")]
    #[test_case(Operator::Mod; "mod")]
    #[test_case(Operator::FloorDiv; "floor_div")]
    fn division_family_by_zero_is_unknown(op: Operator) {
        assert_eq!(eval_bin_op(op, &Value::num(1.0), &Value::num(0.0)), Value::Unknown);
    }

    #[test]
    fn and_short_circuits_to_false() {
        let result = eval_bool_op(BoolOp::And, &[Value::Bool(true), Value::Bool(false), Value::Unknown]);
        assert_eq!(result, Value::Bool(false));
    }

    #[test]
    fn and_with_unresolved_operand_is_unknown() {
        let result = eval_bool_op(BoolOp::And, &[Value::Bool(true), Value::Unknown]);
        assert_eq!(result, Value::Unknown);
    }

    #[test]
    fn string_repetition() {
        let result = eval_bin_op(Operator::Mult, &Value::Str("ab".into()), &Value::num(3.0));
        assert_eq!(result, Value::Str("ababab".into()));
    }

    #[test]
    fn mismatched_operands_are_unknown() {
        assert_eq!(eval_bin_op(Operator::Add, &Value::num(1.0), &Value::Str("a".into())), Value::Unknown);
    }

    #[test]
    fn membership_over_list() {
        let list = Value::List(vec![Value::num(1.0), Value::num(2.0)]);
        assert_eq!(eval_cmp_op(CmpOp::In, &Value::num(1.0), &list), Value::Bool(true));
        assert_eq!(eval_cmp_op(CmpOp::NotIn, &Value::num(3.0), &list), Value::Bool(true));
    }

    #[test]
    fn is_none_identity() {
        assert_eq!(eval_cmp_op(CmpOp::Is, &Value::None, &Value::None), Value::Bool(true));
        assert_eq!(eval_cmp_op(CmpOp::Is, &Value::None, &Value::num(0.0)), Value::Bool(false));
    }
}
