//! Best-effort static constant evaluation.
//!
//! [`static_evaluate`] never raises: anything it can't work out folds to
//! [`Value::Unknown`].

use cobra_ast::{CmpOp, Expr, Slice};

use crate::context::Context;
use crate::operators::{eval_bin_op, eval_bool_op, eval_cmp_op, eval_unary_op};
use crate::types::{self, Type};
use crate::value::Value;

pub fn static_evaluate(expr: &Expr, context: &Context) -> Value {
    match expr {
        Expr::Num(num) => Value::num(num.value),
        Expr::Str(s) => Value::Str(s.value.clone()),
        Expr::Name(name) => context.lookup(name.id.as_str()).map(|symbol| symbol.value).unwrap_or(Value::Unknown),
        Expr::BoolOp(boolop) => {
            let values: Vec<Value> = boolop.values.iter().map(|v| static_evaluate(v, context)).collect();
            eval_bool_op(boolop.op, &values)
        }
        Expr::UnaryOp(unaryop) => eval_unary_op(unaryop.op, &static_evaluate(&unaryop.operand, context)),
        Expr::BinOp(binop) => {
            eval_bin_op(binop.op, &static_evaluate(&binop.left, context), &static_evaluate(&binop.right, context))
        }
        Expr::Compare(compare) => {
            let mut operands: Vec<&Expr> = vec![&compare.left];
            operands.extend(compare.comparators.iter());
            let values: Vec<Value> = operands.iter().map(|e| static_evaluate(e, context)).collect();
            let results: Vec<Value> = compare
                .ops
                .iter()
                .zip(operands.windows(2))
                .zip(values.windows(2))
                .map(|((op, operand_pair), value_pair)| {
                    decisive_by_type(*op, operand_pair[0], operand_pair[1], context)
                        .unwrap_or_else(|| eval_cmp_op(*op, &value_pair[0], &value_pair[1]))
                })
                .collect();
            eval_bool_op(cobra_ast::BoolOp::And, &results)
        }
        Expr::List(list) => Value::List(list.elts.iter().map(|e| static_evaluate(e, context)).collect()),
        Expr::Set(set) => Value::Set(set.elts.iter().map(|e| static_evaluate(e, context)).collect()),
        Expr::Tuple(tuple) => Value::Tuple(tuple.elts.iter().map(|e| static_evaluate(e, context)).collect()),
        Expr::Dict(dict) => Value::Dict(
            dict.keys
                .iter()
                .zip(&dict.values)
                .map(|(k, v)| (static_evaluate(k, context), static_evaluate(v, context)))
                .collect(),
        ),
        Expr::IfExp(ifexp) => match static_evaluate(&ifexp.test, context) {
            Value::Bool(true) => static_evaluate(&ifexp.body, context),
            Value::Bool(false) => static_evaluate(&ifexp.orelse, context),
            _ => Value::Unknown,
        },
        Expr::Attribute(attribute) => {
            let value_type = crate::typer::probe_type(&attribute.value, context);
            if let Type::Instance(instance) = value_type {
                instance
                    .attributes
                    .borrow()
                    .get(attribute.attr.as_str())
                    .map(|symbol| symbol.value.clone())
                    .unwrap_or(Value::Unknown)
            } else {
                Value::Unknown
            }
        }
        Expr::Subscript(subscript) => {
            let container = static_evaluate(&subscript.value, context);
            match (&container, subscript.slice.as_ref()) {
                (Value::List(items) | Value::Tuple(items), Slice::Index(index)) => {
                    match static_evaluate(index, context) {
                        Value::Num(n) if n.0.fract() == 0.0 => {
                            index_into(items, n.0 as i64).cloned().unwrap_or(Value::Unknown)
                        }
                        _ => Value::Unknown,
                    }
                }
                (Value::Dict(items), Slice::Index(index)) => {
                    let key = static_evaluate(index, context);
                    items.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone()).unwrap_or(Value::Unknown)
                }
                _ => Value::Unknown,
            }
        }
        _ => Value::Unknown,
    }
}

/// Comparing two operands whose *types* are statically known and
/// provably disjoint is decisive (`false` for `==`/`is`,
/// `true` for `!=`/`is not`) even when neither operand's concrete value
/// is known -- `Value::Unknown` carries no type, so this can only be
/// decided by asking the typer, not by comparing the evaluated values.
fn decisive_by_type(op: CmpOp, left: &Expr, right: &Expr, context: &Context) -> Option<Value> {
    if !matches!(op, CmpOp::Eq | CmpOp::NotEq | CmpOp::Is | CmpOp::IsNot) {
        return None;
    }
    let left_type = crate::typer::probe_type(left, context);
    let right_type = crate::typer::probe_type(right, context);
    if left_type.is_unknown() || right_type.is_unknown() {
        return None;
    }
    if types::intersect(&left_type, &right_type).is_some() {
        return None;
    }
    Some(Value::Bool(matches!(op, CmpOp::NotEq | CmpOp::IsNot)))
}

fn index_into(items: &[Value], index: i64) -> Option<&Value> {
    let len = items.len() as i64;
    let normalized = if index < 0 { index + len } else { index };
    usize::try_from(normalized).ok().and_then(|i| items.get(i))
}

#[cfg(test)]
mod tests {
    use cobra_ast::{Expr, NodePos, Operator};
    use text_size::{TextRange, TextSize};

    use super::*;

    fn pos() -> NodePos {
        NodePos::new(TextRange::new(TextSize::from(0), TextSize::from(0)), 1, 0)
    }

    fn num(value: f64) -> Expr {
        Expr::Num(cobra_ast::expr::ExprNum { pos: pos(), value })
    }

    #[test]
    fn evaluates_arithmetic() {
        let context = Context::new();
        let expr = Expr::BinOp(cobra_ast::expr::ExprBinOp {
            pos: pos(),
            left: Box::new(num(2.0)),
            op: Operator::Add,
            right: Box::new(num(3.0)),
        });
        assert_eq!(static_evaluate(&expr, &context), Value::num(5.0));
    }

    #[test]
    fn unknown_name_is_unknown_value() {
        let context = Context::new();
        let expr = Expr::name("missing", pos());
        assert_eq!(static_evaluate(&expr, &context), Value::Unknown);
    }
}
