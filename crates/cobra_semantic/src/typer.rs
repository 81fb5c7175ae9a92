//! The bidirectional expression typer.
//!
//! `visit` infers a node's type while checking it against an expected
//! type (emitting a `type-error` warning on mismatch); `probe_type` asks
//! the same question silently, for call sites that need to look ahead
//! without committing to a warning (e.g. picking which operand type an
//! operator should be constrained to).

use std::rc::Rc;

use cobra_ast::expr::{ExprBinOp, ExprCall, ExprCompare, ExprLambda, ExprSubscript};
use cobra_ast::{Comprehension, Expr, Name, Operator, Ranged, Slice, UnaryOp};

use crate::context::Context;
use crate::eval::static_evaluate;
use crate::scope::Scope;
use crate::signature::{Parameter, Signature};
use crate::symbol::Symbol;
use crate::types::{self, FunctionType, Type};
use crate::value::Value;
use crate::warning::{expr_label, NullWarningSink, WarningKind, WarningSink};

pub fn probe_type(node: &Expr, context: &Context) -> Type {
    visit(node, &Type::Unknown, context, &mut NullWarningSink, "")
}

/// Infer `node`'s type, constrained by `expected`, reporting a
/// `type-error` if the inferred type doesn't fit (unless inference
/// already gave up with `Unknown`).
pub fn visit(node: &Expr, expected: &Type, context: &Context, sink: &mut dyn WarningSink, filepath: &str) -> Type {
    let inferred = visit_inner(node, expected, context, sink, filepath);
    if !types::subset(&inferred, expected) && !inferred.is_unknown() {
        let details = format!("{inferred} vs {expected}");
        sink.warn(filepath, node.line(), WarningKind::TypeError, expr_label(node), Some(details));
    }
    inferred
}

fn recur(node: &Expr, expected: Type, context: &Context, sink: &mut dyn WarningSink, filepath: &str) -> Type {
    visit(node, &expected, context, sink, filepath)
}

fn comprehension_type(
    elt: &Expr,
    generators: &[Comprehension],
    expected_element_type: Type,
    context: &Context,
    sink: &mut dyn WarningSink,
    filepath: &str,
) -> Type {
    let guard = context.push_scope();
    for generator in generators {
        let iter_type = recur(&generator.iter, Type::Unknown, context, sink, filepath);
        crate::assign::assign_from_iterable(&generator.target, &iter_type, context);
        for condition in &generator.ifs {
            recur(condition, Type::Bool, context, sink, filepath);
        }
    }
    let element_type = recur(elt, expected_element_type, context, sink, filepath);
    context.pop_scope(guard);
    element_type
}

fn visit_inner(node: &Expr, expected_type: &Type, context: &Context, sink: &mut dyn WarningSink, filepath: &str) -> Type {
    match node {
        Expr::Num(_) => Type::Num,
        Expr::Str(_) => Type::Str,
        Expr::Repr(_) => Type::Str,

        Expr::Name(name) => {
            let Some(symbol) = context.lookup(name.id.as_str()) else {
                sink.warn(filepath, node.line(), WarningKind::Undefined, name.id.to_string(), None);
                return Type::Unknown;
            };
            let inferred = symbol.inferred_type;
            if !inferred.is_unknown() {
                sink.annotate(filepath, node.line(), node.column(), name.id.as_str(), &inferred.to_string());
            }
            // Constraint recording: narrow the name's
            // stored type in place so later reads in the same scope see
            // the tightened type, even when the narrower type doesn't
            // fully subsume `inferred` (the generic `visit` wrapper
            // above already reports the `type-error` for that case).
            if !expected_type.is_unknown() {
                if let Some(narrowed) = types::intersect(&inferred, expected_type) {
                    context.narrow(name.id.as_str(), narrowed);
                }
            }
            inferred
        }

        Expr::BoolOp(boolop) => {
            for value in &boolop.values {
                recur(value, Type::Bool, context, sink, filepath);
            }
            Type::Bool
        }

        Expr::UnaryOp(unaryop) => {
            if unaryop.op == UnaryOp::Not {
                recur(&unaryop.operand, Type::Bool, context, sink, filepath);
                Type::Bool
            } else {
                recur(&unaryop.operand, Type::Num, context, sink, filepath);
                Type::Num
            }
        }

        Expr::BinOp(binop) => visit_binop(binop, context, sink, filepath),

        Expr::IfExp(ifexp) => {
            recur(&ifexp.test, Type::Bool, context, sink, filepath);
            let body = recur(&ifexp.body, expected_type.clone(), context, sink, filepath);
            let orelse = recur(&ifexp.orelse, expected_type.clone(), context, sink, filepath);
            types::unify(&body, &orelse)
        }

        Expr::Dict(dict) => {
            let key_types: Vec<Type> =
                dict.keys.iter().map(|k| recur(k, Type::Unknown, context, sink, filepath)).collect();
            let value_types: Vec<Type> =
                dict.values.iter().map(|v| recur(v, Type::Unknown, context, sink, filepath)).collect();
            let key_type = types::reduce(key_types);
            if matches!(key_type, Type::Union(_)) {
                sink.warn(filepath, node.line(), WarningKind::InconsistentTypes, expr_label(node), None);
            }
            Type::dict(key_type, types::reduce(value_types))
        }

        Expr::Set(set) => {
            let subtype = if let Type::Set(item) = expected_type { (**item).clone() } else { Type::Unknown };
            let element_types: Vec<Type> =
                set.elts.iter().map(|e| recur(e, subtype.clone(), context, sink, filepath)).collect();
            Type::set(types::reduce(element_types))
        }

        Expr::ListComp(comp) => {
            let subtype = if let Type::List(item) = expected_type { (**item).clone() } else { Type::Unknown };
            Type::list(comprehension_type(&comp.elt, &comp.generators, subtype, context, sink, filepath))
        }

        Expr::SetComp(comp) => {
            let subtype = if let Type::Set(item) = expected_type { (**item).clone() } else { Type::Unknown };
            Type::set(comprehension_type(&comp.elt, &comp.generators, subtype, context, sink, filepath))
        }

        Expr::DictComp(comp) => {
            let (expected_key, expected_value) = if let Type::Dict(key, value) = expected_type {
                ((**key).clone(), (**value).clone())
            } else {
                (Type::Unknown, Type::Unknown)
            };
            let key_type = comprehension_type(&comp.key, &comp.generators, expected_key, context, sink, filepath);
            let value_type = comprehension_type(&comp.value, &comp.generators, expected_value, context, sink, filepath);
            Type::dict(key_type, value_type)
        }

        Expr::GeneratorExp(comp) => {
            let subtype = if let Type::List(item) = expected_type { (**item).clone() } else { Type::Unknown };
            Type::list(comprehension_type(&comp.elt, &comp.generators, subtype, context, sink, filepath))
        }

        Expr::Yield(y) => {
            let inner = match &y.value {
                Some(v) => recur(v, Type::Unknown, context, sink, filepath),
                None => Type::NoneType,
            };
            Type::list(inner)
        }

        Expr::Compare(compare) => visit_compare(node, compare, context, sink, filepath),

        Expr::Call(call) => visit_call(node, call, context, sink, filepath),

        Expr::Attribute(attribute) => {
            let value_type = recur(&attribute.value, Type::Unknown, context, sink, filepath);
            match &value_type {
                Type::Instance(instance) => instance
                    .attributes
                    .borrow()
                    .get(attribute.attr.as_str())
                    .map(|symbol| symbol.inferred_type.clone())
                    .unwrap_or(Type::Unknown),
                Type::Unknown => Type::Unknown,
                _ => {
                    sink.warn(filepath, node.line(), WarningKind::NotAnInstance, expr_label(node), None);
                    Type::Unknown
                }
            }
        }

        Expr::Subscript(subscript) => visit_subscript(subscript, context, sink, filepath),

        Expr::List(list) => {
            let subtype = if let Type::List(item) = expected_type { (**item).clone() } else { Type::Unknown };
            let element_types: Vec<Type> =
                list.elts.iter().map(|e| recur(e, subtype.clone(), context, sink, filepath)).collect();
            Type::list(types::reduce(element_types))
        }

        Expr::Tuple(tuple) => {
            if let Type::Tuple(expected_items) = expected_type {
                if expected_items.len() == tuple.elts.len() {
                    let items: Vec<Type> = tuple
                        .elts
                        .iter()
                        .zip(expected_items)
                        .map(|(e, t)| recur(e, t.clone(), context, sink, filepath))
                        .collect();
                    return Type::Tuple(items);
                }
            }
            Type::Tuple(tuple.elts.iter().map(|e| recur(e, Type::Unknown, context, sink, filepath)).collect())
        }

        Expr::Lambda(lambda) => visit_lambda(lambda, context, filepath),
    }
}

fn visit_binop(binop: &ExprBinOp, context: &Context, sink: &mut dyn WarningSink, filepath: &str) -> Type {
    match binop.op {
        Operator::Add => {
            let left_probe = probe_type(&binop.left, context);
            let right_probe = probe_type(&binop.right, context);
            if matches!(left_probe, Type::Tuple(_)) || matches!(right_probe, Type::Tuple(_)) {
                let left = recur(&binop.left, Type::BaseTuple, context, sink, filepath);
                let right = recur(&binop.right, Type::BaseTuple, context, sink, filepath);
                return match (left, right) {
                    (Type::Tuple(mut l), Type::Tuple(r)) => {
                        l.extend(r);
                        Type::Tuple(l)
                    }
                    _ => Type::Unknown,
                };
            }
            let union_type = types::reduce(vec![Type::Num, Type::Str, Type::list(Type::Unknown)]);
            let left_intersect = types::intersect(&left_probe, &union_type);
            let right_intersect = types::intersect(&right_probe, &union_type);
            let both =
                left_intersect.as_ref().and_then(|l| right_intersect.as_ref().and_then(|r| types::intersect(l, r)));
            if let Some(common) = both {
                recur(&binop.left, common.clone(), context, sink, filepath);
                recur(&binop.right, common.clone(), context, sink, filepath);
                common
            } else if let Some(left) = left_intersect {
                recur(&binop.left, left.clone(), context, sink, filepath);
                recur(&binop.right, left.clone(), context, sink, filepath);
                left
            } else if let Some(right) = right_intersect {
                recur(&binop.left, right.clone(), context, sink, filepath);
                recur(&binop.right, right.clone(), context, sink, filepath);
                right
            } else {
                recur(&binop.left, union_type.clone(), context, sink, filepath);
                recur(&binop.right, union_type.clone(), context, sink, filepath);
                union_type
            }
        }
        Operator::Mult => {
            let left_probe = probe_type(&binop.left, context);
            let right_probe = probe_type(&binop.right, context);
            if matches!(left_probe, Type::Str) {
                recur(&binop.left, Type::Str, context, sink, filepath);
                recur(&binop.right, Type::Num, context, sink, filepath);
                return Type::Str;
            }
            if matches!(right_probe, Type::Str) {
                recur(&binop.left, Type::Num, context, sink, filepath);
                recur(&binop.right, Type::Str, context, sink, filepath);
                return Type::Str;
            }
            if matches!(left_probe, Type::Num) && matches!(right_probe, Type::Num) {
                recur(&binop.left, Type::Num, context, sink, filepath);
                recur(&binop.right, Type::Num, context, sink, filepath);
                return Type::Num;
            }
            let union_type = types::reduce(vec![Type::Num, Type::Str]);
            recur(&binop.left, union_type.clone(), context, sink, filepath);
            recur(&binop.right, union_type.clone(), context, sink, filepath);
            union_type
        }
        Operator::Mod => {
            let left_probe = probe_type(&binop.left, context);
            if types::subset(&Type::Str, &left_probe) && !types::subset(&Type::Num, &left_probe) {
                recur(&binop.left, Type::Str, context, sink, filepath);
                recur(&binop.right, Type::Unknown, context, sink, filepath);
                Type::Str
            } else if types::subset(&Type::Num, &left_probe) && !types::subset(&Type::Str, &left_probe) {
                recur(&binop.left, Type::Num, context, sink, filepath);
                recur(&binop.right, Type::Num, context, sink, filepath);
                Type::Num
            } else {
                let union_type = types::reduce(vec![Type::Num, Type::Str]);
                recur(&binop.left, union_type.clone(), context, sink, filepath);
                recur(&binop.right, Type::Unknown, context, sink, filepath);
                union_type
            }
        }
        _ => {
            recur(&binop.left, Type::Num, context, sink, filepath);
            recur(&binop.right, Type::Num, context, sink, filepath);
            Type::Num
        }
    }
}

fn visit_compare(node: &Expr, compare: &ExprCompare, context: &Context, sink: &mut dyn WarningSink, filepath: &str) -> Type {
    let op = compare.ops[0];
    if compare.ops.len() > 1 {
        let category = if op.is_membership() {
            WarningKind::InOperatorChaining
        } else if op.is_identity() {
            WarningKind::IsOperatorChaining
        } else {
            WarningKind::ComparisonOperatorChaining
        };
        sink.warn(filepath, node.line(), category, expr_label(node), None);
    }

    if op.is_equality_or_ordering() {
        let left_probe = probe_type(&compare.left, context);
        let right_probe = probe_type(&compare.comparators[0], context);
        match types::intersect(&left_probe, &right_probe) {
            Some(intersection) => {
                recur(&compare.left, intersection.clone(), context, sink, filepath);
                recur(&compare.comparators[0], intersection, context, sink, filepath);
            }
            None => {
                recur(&compare.left, right_probe, context, sink, filepath);
                recur(&compare.comparators[0], left_probe, context, sink, filepath);
            }
        }
    } else if op.is_identity() {
        recur(&compare.left, Type::maybe(Type::Unknown), context, sink, filepath);
        recur(&compare.comparators[0], Type::NoneType, context, sink, filepath);
    } else if op.is_membership() {
        let left_probe = probe_type(&compare.left, context);
        let union_type = types::reduce(vec![
            Type::list(left_probe.clone()),
            Type::set(left_probe.clone()),
            Type::dict(left_probe, Type::Unknown),
        ]);
        let constrained_right = recur(&compare.comparators[0], union_type, context, sink, filepath);
        match constrained_right {
            Type::List(item) | Type::Set(item) => {
                recur(&compare.left, *item, context, sink, filepath);
            }
            Type::Dict(key, _) => {
                recur(&compare.left, *key, context, sink, filepath);
            }
            Type::Unknown => {}
            _ => {
                sink.warn(filepath, node.line(), WarningKind::InOperatorArgumentNotListOrDict, expr_label(node), None);
            }
        }
    }
    Type::Bool
}

fn visit_subscript(subscript: &ExprSubscript, context: &Context, sink: &mut dyn WarningSink, filepath: &str) -> Type {
    let union_type =
        types::reduce(vec![Type::list(Type::Unknown), Type::dict(Type::Unknown, Type::Unknown), Type::BaseTuple]);
    let value_type = recur(&subscript.value, union_type, context, sink, filepath);
    match subscript.slice.as_ref() {
        Slice::Index(index) => match &value_type {
            Type::Tuple(items) => match static_evaluate(index, context) {
                Value::Num(n) if n.0.fract() == 0.0 => {
                    let i = n.0 as i64;
                    let normalized = if i < 0 { i + items.len() as i64 } else { i };
                    usize::try_from(normalized).ok().and_then(|i| items.get(i)).cloned().unwrap_or(Type::Unknown)
                }
                _ => Type::Unknown,
            },
            Type::List(item) => (**item).clone(),
            Type::Dict(_, value) => (**value).clone(),
            _ => Type::Unknown,
        },
        Slice::Slice { lower, upper, step } => {
            if let Some(lower) = lower {
                recur(lower, Type::Num, context, sink, filepath);
            }
            if let Some(upper) = upper {
                recur(upper, Type::Num, context, sink, filepath);
            }
            if let Some(step) = step {
                recur(step, Type::Num, context, sink, filepath);
            }
            value_type
        }
    }
}

fn visit_lambda(lambda: &ExprLambda, context: &Context, filepath: &str) -> Type {
    let mut sink = NullWarningSink;
    let params: Vec<Parameter> = lambda
        .args
        .args
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let has_default = i + lambda.args.defaults.len() >= lambda.args.args.len();
            Parameter { name: name.clone(), declared_type: Type::Unknown, has_default }
        })
        .collect();
    let signature = Rc::new(Signature {
        params,
        vararg: lambda.args.vararg.clone(),
        kwarg: lambda.args.kwarg.clone(),
        return_type: Type::Unknown,
    });

    let closure = context.snapshot();
    let guard = closure.push_scope();
    for param in &signature.params {
        closure.bind_local(param.name.clone(), Symbol::of_type(Type::Unknown));
    }
    let body_type = visit(&lambda.body, &Type::Unknown, &closure, &mut sink, filepath);
    closure.pop_scope(guard);

    let def = Rc::new(cobra_ast::StmtFunctionDef {
        pos: lambda.pos,
        name: Name::new("<lambda>"),
        args: lambda.args.clone(),
        body: Vec::new(),
        decorator_list: Vec::new(),
        returns: None,
    });
    let evaluator = Rc::new(crate::call::FunctionEvaluator::new(def, Rc::from(filepath), context.snapshot()));

    Type::Function(FunctionType {
        id: context.fresh_function_id(),
        signature,
        return_type: Box::new(body_type),
        evaluator,
        bound_instance: None,
    })
}

fn visit_call(node: &Expr, call: &ExprCall, context: &Context, sink: &mut dyn WarningSink, filepath: &str) -> Type {
    let function_type = recur(&call.func, Type::Unknown, context, sink, filepath);
    let (signature, evaluator, bound_instance) = match &function_type {
        Type::Function(f) => (f.signature.clone(), Some(f.evaluator.clone()), f.bound_instance.clone()),
        // A class's own call signature is already `__init__` minus `self`,
        // so calling it never needs to run a body a
        // second time -- it always produces the instance `__init__`
        // already populated, even for a class with no `__init__` at all.
        Type::Class(c) => (c.signature.clone(), None, None),
        Type::Unknown => return Type::Unknown,
        _ => {
            sink.warn(filepath, node.line(), WarningKind::NotAFunction, expr_label(node), None);
            return Type::Unknown;
        }
    };

    // A class's own signature already has `self` dropped (see
    // `def::build_class_type`), so only a bound method call (where
    // `self` is filled from the receiver rather than a call argument)
    // needs its positional arguments shifted by one.
    let offset = usize::from(bound_instance.is_some());
    let mut argument_scope = Scope::new();
    if let Some(instance) = &bound_instance {
        if let Some(first) = signature.params.first() {
            argument_scope.set(first.name.clone(), Symbol::of_type((**instance).clone()));
        }
    }

    let no_spread = call.starargs.is_none() && call.kwargs.is_none();
    if no_spread {
        let start = offset + call.args.len();
        let kwarg_names: Vec<&str> = call.keywords.iter().filter_map(|k| k.arg.as_deref()).collect();
        for missing in signature.params.iter().skip(start).filter(|p| !p.has_default) {
            if !kwarg_names.contains(&missing.name.as_str()) {
                sink.warn(filepath, node.line(), WarningKind::MissingArgument, expr_label(node), Some(missing.name.to_string()));
            }
        }
        if signature.vararg.is_none() && offset + call.args.len() + call.keywords.len() > signature.params.len() {
            sink.warn(filepath, node.line(), WarningKind::TooManyArguments, expr_label(node), None);
        }
    }

    for (i, arg) in call.args.iter().enumerate() {
        let index = i + offset;
        if index >= signature.params.len() {
            break;
        }
        let expected = signature.params[index].declared_type.clone();
        let arg_type = recur(arg, expected, context, sink, filepath);
        let value = static_evaluate(arg, context);
        argument_scope.set(signature.params[index].name.clone(), Symbol::new(arg_type, value));
    }

    for keyword in &call.keywords {
        let Some(name) = &keyword.arg else { continue };
        match signature.param_named(name.as_str()) {
            None => {
                sink.warn(filepath, node.line(), WarningKind::ExtraKeyword, expr_label(node), Some(name.to_string()));
            }
            Some(param) => {
                let declared = param.declared_type.clone();
                let arg_type = recur(&keyword.value, declared, context, sink, filepath);
                let value = static_evaluate(&keyword.value, context);
                argument_scope.set(name.clone(), Symbol::new(arg_type, value));
            }
        }
    }

    if let Some(starargs) = &call.starargs {
        let ty = probe_type(starargs, context);
        if !matches!(ty, Type::List(_) | Type::Tuple(_) | Type::Unknown) {
            sink.warn(filepath, node.line(), WarningKind::InvalidVarargType, expr_label(node), None);
        }
        recur(starargs, Type::list(Type::Unknown), context, sink, filepath);
    }
    if let Some(kwargs) = &call.kwargs {
        let ty = probe_type(kwargs, context);
        if !matches!(ty, Type::Dict(_, _) | Type::Unknown) {
            sink.warn(filepath, node.line(), WarningKind::InvalidKwargType, expr_label(node), None);
        }
        recur(kwargs, Type::dict(Type::Unknown, Type::Unknown), context, sink, filepath);
    }

    if let Type::Class(class) = &function_type {
        return (*class.instance_type).clone();
    }
    match evaluator {
        Some(evaluator) => {
            let outcome = evaluator.evaluate(argument_scope);
            for warning in &outcome.warnings {
                sink.warn(&warning.filepath, warning.line, warning.category, warning.label.clone(), warning.details.clone());
            }
            outcome.return_type
        }
        None => Type::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use cobra_ast::NodePos;
    use text_size::{TextRange, TextSize};

    use super::*;
    use crate::warning::CollectingWarningSink;

    fn pos() -> NodePos {
        NodePos::new(TextRange::new(TextSize::from(0), TextSize::from(0)), 1, 0)
    }

    #[test]
    fn undefined_name_warns() {
        let context = Context::new();
        let mut sink = CollectingWarningSink::default();
        let node = Expr::name("missing", pos());
        let ty = visit(&node, &Type::Unknown, &context, &mut sink, "t.py");
        assert!(ty.is_unknown());
        assert_eq!(sink.warnings.len(), 1);
        assert_eq!(sink.warnings[0].category, WarningKind::Undefined);
    }

    #[test]
    fn bool_op_forces_bool_operands() {
        let context = Context::new();
        context.assign(Name::new("x"), Symbol::of_type(Type::Bool));
        let mut sink = CollectingWarningSink::default();
        let node = Expr::BoolOp(cobra_ast::expr::ExprBoolOp {
            pos: pos(),
            op: cobra_ast::BoolOp::And,
            values: vec![Expr::name("x", pos())],
        });
        let ty = visit(&node, &Type::Unknown, &context, &mut sink, "t.py");
        assert_eq!(ty, Type::Bool);
        assert!(sink.warnings.is_empty());
    }

    #[test]
    fn add_of_two_numbers_is_number() {
        let context = Context::new();
        let mut sink = CollectingWarningSink::default();
        let node = Expr::BinOp(ExprBinOp {
            pos: pos(),
            left: Box::new(Expr::Num(cobra_ast::expr::ExprNum { pos: pos(), value: 1.0 })),
            op: Operator::Add,
            right: Box::new(Expr::Num(cobra_ast::expr::ExprNum { pos: pos(), value: 2.0 })),
        });
        let ty = visit(&node, &Type::Unknown, &context, &mut sink, "t.py");
        assert_eq!(ty, Type::Num);
    }

    #[test]
    fn not_an_instance_attribute_access_warns() {
        let context = Context::new();
        context.assign(Name::new("x"), Symbol::of_type(Type::Num));
        let mut sink = CollectingWarningSink::default();
        let node = Expr::Attribute(cobra_ast::expr::ExprAttribute {
            pos: pos(),
            value: Box::new(Expr::name("x", pos())),
            attr: Name::new("field"),
        });
        let ty = visit(&node, &Type::Unknown, &context, &mut sink, "t.py");
        assert!(ty.is_unknown());
        assert_eq!(sink.warnings[0].category, WarningKind::NotAnInstance);
    }
}
