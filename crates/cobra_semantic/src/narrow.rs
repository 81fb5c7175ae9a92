//! Branch refinement ("maybe inferences").
//!
//! Given an `if`/`while` test expression, work out which `Maybe<T>`-typed
//! names it implicitly narrows on the true branch and on the false
//! branch, by probing the test twice under substitution: once assuming
//! the name is `NoneType`, once assuming it's the wrapped `T` (with an
//! unknown value). If a substitution statically forces the test to a
//! known boolean, that tells us something about which branch is
//! reachable under which assumption.

use std::collections::HashMap;

use cobra_ast::{Expr, Name};
use smallvec::SmallVec;

use crate::context::Context;
use crate::eval::static_evaluate;
use crate::symbol::Symbol;
use crate::types::Type;
use crate::value::Value;

/// Most test expressions mention only a handful of names; a test like
/// `a is not None and b is not None and c < d` still fits comfortably
/// inline without spilling to the heap.
type NameBuf = SmallVec<[Name; 8]>;

fn collect_names(expr: &Expr, out: &mut NameBuf) {
    match expr {
        Expr::Name(name) => out.push(name.id.clone()),
        Expr::BoolOp(e) => e.values.iter().for_each(|v| collect_names(v, out)),
        Expr::BinOp(e) => {
            collect_names(&e.left, out);
            collect_names(&e.right, out);
        }
        Expr::UnaryOp(e) => collect_names(&e.operand, out),
        Expr::Compare(e) => {
            collect_names(&e.left, out);
            e.comparators.iter().for_each(|c| collect_names(c, out));
        }
        Expr::Call(e) => {
            collect_names(&e.func, out);
            e.args.iter().for_each(|a| collect_names(a, out));
            e.keywords.iter().for_each(|k| collect_names(&k.value, out));
        }
        Expr::Attribute(e) => collect_names(&e.value, out),
        Expr::Subscript(e) => collect_names(&e.value, out),
        Expr::IfExp(e) => {
            collect_names(&e.test, out);
            collect_names(&e.body, out);
            collect_names(&e.orelse, out);
        }
        Expr::List(e) => e.elts.iter().for_each(|x| collect_names(x, out)),
        Expr::Tuple(e) => e.elts.iter().for_each(|x| collect_names(x, out)),
        Expr::Set(e) => e.elts.iter().for_each(|x| collect_names(x, out)),
        Expr::Dict(e) => {
            e.keys.iter().for_each(|x| collect_names(x, out));
            e.values.iter().for_each(|x| collect_names(x, out));
        }
        _ => {}
    }
}

/// Names appearing anywhere inside `expr` (the original's `get_names`,
/// driven by a plain `Name`-collecting AST walk).
pub fn get_names(expr: &Expr) -> NameBuf {
    let mut names = NameBuf::new();
    collect_names(expr, &mut names);
    names
}

pub type Inferences = HashMap<Name, Type>;

pub fn maybe_inferences(test: &Expr, context: &Context) -> (Inferences, Inferences) {
    let mut if_inferences = Inferences::new();
    let mut else_inferences = Inferences::new();

    for name in get_names(test) {
        let Some(symbol) = context.lookup(name.as_str()) else { continue };
        let Type::Maybe(subtype) = symbol.inferred_type else { continue };

        let none_value = probe_with_override(test, context, &name, Type::NoneType, Value::None);
        if none_value == Some(false) {
            if_inferences.insert(name.clone(), (*subtype).clone());
        }
        if none_value == Some(true) {
            else_inferences.insert(name.clone(), (*subtype).clone());
        }

        let non_none_value = probe_with_override(test, context, &name, (*subtype).clone(), Value::Unknown);
        if non_none_value == Some(false) {
            if_inferences.insert(name.clone(), Type::NoneType);
        }
        if non_none_value == Some(true) {
            else_inferences.insert(name.clone(), Type::NoneType);
        }
    }

    (if_inferences, else_inferences)
}

/// Statically evaluate `test` with `name` temporarily rebound to
/// `(override_type, override_value)`, restoring the override stack
/// afterwards regardless of what `static_evaluate` does.
fn probe_with_override(test: &Expr, context: &Context, name: &Name, override_type: Type, override_value: Value) -> Option<bool> {
    context.push_override(name.clone(), Symbol::new(override_type, override_value));
    let result = static_evaluate(test, context);
    context.pop_override();
    result.as_bool()
}
