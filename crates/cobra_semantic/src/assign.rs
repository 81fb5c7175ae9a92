//! Assignment targets, including tuple/list unpacking.

use cobra_ast::{Expr, Name};

use crate::context::Context;
use crate::symbol::Symbol;
use crate::types::Type;
use crate::value::Value;

/// One binding an assignment produced, carrying whatever the name was
/// previously bound to (if anything) -- the statement visitor turns
/// `old.is_some()` into a `reassignment` warning and a type change into
/// a `type-change` warning.
pub struct Assignment {
    pub name: Name,
    pub old: Option<Symbol>,
    pub new: Symbol,
}

/// Bind `target` to `(assigned_type, assigned_value)`, recursing into
/// `Tuple`/`List` targets to unpack element-wise. Subscript targets
/// aren't modeled.
pub fn assign(target: &Expr, assigned_type: Type, assigned_value: Value, context: &Context) -> Vec<Assignment> {
    match target {
        Expr::Name(name) => {
            let old = context.lookup(name.id.as_str());
            let new = Symbol::new(assigned_type, assigned_value);
            context.bind_local(name.id.clone(), new.clone());
            vec![Assignment { name: name.id.clone(), old, new }]
        }
        Expr::Attribute(attribute) => {
            let instance_type = crate::typer::probe_type(&attribute.value, context);
            let Type::Instance(instance) = instance_type else {
                return Vec::new();
            };
            let mut attributes = instance.attributes.borrow_mut();
            let old = attributes.get(attribute.attr.as_str()).cloned();
            let new = Symbol::new(assigned_type, assigned_value);
            attributes.set(attribute.attr.clone(), new.clone());
            vec![Assignment { name: attribute.attr.clone(), old, new }]
        }
        Expr::Tuple(tuple) => unpack(&tuple.elts, assigned_type, assigned_value, context),
        Expr::List(list) => unpack(&list.elts, assigned_type, assigned_value, context),
        // `a[i] = ...` is a recognized target shape that's deliberately left
        // unchecked -- no subscript-assignment protocol is modeled.
        Expr::Subscript(_) => Vec::new(),
        // Anything else reaching here would mean a producer handed us a
        // node that was never a valid assignment target to begin with;
        // nothing in this crate's own visitor ever does that.
        _ => Vec::new(),
    }
}

fn unpack(elements: &[Expr], assigned_type: Type, assigned_value: Value, context: &Context) -> Vec<Assignment> {
    let element_values: Vec<Value> = match &assigned_value {
        Value::Tuple(items) | Value::List(items) => items.clone(),
        _ => Vec::new(),
    };

    elements
        .iter()
        .enumerate()
        .flat_map(|(i, element)| {
            let element_type = match &assigned_type {
                Type::Tuple(items) => items.get(i).cloned().unwrap_or(Type::Unknown),
                Type::List(item) | Type::Set(item) => (**item).clone(),
                _ => Type::Unknown,
            };
            let element_value = element_values.get(i).cloned().unwrap_or(Value::Unknown);
            assign(element, element_type, element_value, context)
        })
        .collect()
}

/// `for x in iterable` / comprehension-clause binding: derive the loop
/// variable's type from `iterable_type`'s item type and assign it with
/// an unknown static value (the per-iteration value isn't known
/// statically even when the whole iterable is).
pub fn assign_from_iterable(target: &Expr, iterable_type: &Type, context: &Context) -> Vec<Assignment> {
    let item_type = match iterable_type {
        Type::List(item) | Type::Set(item) => (**item).clone(),
        Type::Tuple(_) => return Vec::new(),
        _ => Type::Unknown,
    };
    assign(target, item_type, Value::Unknown, context)
}

#[cfg(test)]
mod tests {
    use cobra_ast::NodePos;
    use text_size::{TextRange, TextSize};

    use super::*;

    fn pos() -> NodePos {
        NodePos::new(TextRange::new(TextSize::from(0), TextSize::from(0)), 1, 0)
    }

    #[test]
    fn tuple_unpack_assigns_each_element() {
        let context = Context::new();
        let target = Expr::Tuple(cobra_ast::expr::ExprTuple {
            pos: pos(),
            elts: vec![Expr::name("a", pos()), Expr::name("b", pos())],
        });
        let assigned_type = Type::Tuple(vec![Type::Num, Type::Str]);
        let assigned_value = Value::Tuple(vec![Value::num(1.0), Value::Str("x".into())]);
        let assignments = assign(&target, assigned_type, assigned_value, &context);
        assert_eq!(assignments.len(), 2);
        assert_eq!(context.lookup("a").unwrap().inferred_type, Type::Num);
        assert_eq!(context.lookup("b").unwrap().inferred_type, Type::Str);
    }

    #[test]
    fn reassignment_reports_old_symbol() {
        let context = Context::new();
        let target = Expr::name("x", pos());
        assign(&target, Type::Num, Value::num(1.0), &context);
        let assignments = assign(&target, Type::Str, Value::Unknown, &context);
        assert!(assignments[0].old.is_some());
    }
}
