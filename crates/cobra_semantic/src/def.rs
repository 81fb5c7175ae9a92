//! Function- and class-signature construction, including the two-pass
//! evaluator attachment that sharpens a generic signature from how the
//! body actually uses its parameters.
//!
//! A `@types(...)` decorator's arguments are themselves example-value
//! expressions, not type names (e.g. a builtins module might declare
//! `number = 0` and then write `@types(number)`): the declared type of
//! the parameter they annotate is whatever the expression typer infers
//! for that example expression, probed in the scope the `def`/`class`
//! appears in.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use cobra_ast::{Expr, Name, StmtClassDef, StmtFunctionDef};

use crate::context::Context;
use crate::scope::Scope;
use crate::signature::{Parameter, Signature};
use crate::symbol::Symbol;
use crate::types::{self, ClassType, FunctionType, InstanceType, Type};
use crate::warning::{NullWarningSink, WarningKind, WarningSink};

/// Per-parameter bookkeeping gathered straight off the `def`, before
/// folding `explicit`/`default` down to one `declared_type` per
/// parameter -- kept split out so the default-vs-annotation consistency
/// check (`default-argument-type-error`) has both halves to compare.
struct RawSignature {
    params: Vec<Name>,
    min_count: usize,
    explicit_types: Vec<Type>,
    default_types: Vec<Type>,
    vararg: Option<Name>,
    kwarg: Option<Name>,
}

fn extract_types_decorator(decorator_list: &[Expr], context: &Context) -> (Vec<Type>, HashMap<String, Type>) {
    for decorator in decorator_list {
        let Expr::Call(call) = decorator else { continue };
        let Expr::Name(name) = call.func.as_ref() else { continue };
        if name.id.as_str() != "types" {
            continue;
        }
        let positional = call.args.iter().map(|a| crate::typer::probe_type(a, context)).collect();
        let keyword = call
            .keywords
            .iter()
            .filter_map(|k| k.arg.as_ref().map(|n| (n.to_string(), crate::typer::probe_type(&k.value, context))))
            .collect();
        return (positional, keyword);
    }
    (Vec::new(), HashMap::new())
}

fn raw_signature(
    params: &cobra_ast::Parameters,
    decorator_list: &[Expr],
    context: &Context,
) -> RawSignature {
    let min_count = params.min_count();
    let mut default_types = vec![Type::Unknown; params.args.len()];
    let defaults_start = params.args.len() - params.defaults.len();
    for (i, expr) in params.defaults.iter().enumerate() {
        default_types[defaults_start + i] = crate::typer::probe_type(expr, context);
    }

    let (explicit_positional, explicit_keyword) = extract_types_decorator(decorator_list, context);
    let mut explicit_types = vec![Type::Unknown; params.args.len()];
    for (i, ty) in explicit_positional.into_iter().enumerate() {
        if i < explicit_types.len() {
            explicit_types[i] = ty;
        }
    }
    for (i, name) in params.args.iter().enumerate() {
        if let Some(ty) = explicit_keyword.get(name.as_str()) {
            explicit_types[i] = ty.clone();
        }
    }

    RawSignature {
        params: params.args.clone(),
        min_count,
        explicit_types,
        default_types,
        vararg: params.vararg.clone(),
        kwarg: params.kwarg.clone(),
    }
}

fn fold_signature(raw: &RawSignature) -> Signature {
    let params = raw
        .params
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let explicit = &raw.explicit_types[i];
            let declared_type =
                if !explicit.is_unknown() { explicit.clone() } else { raw.default_types[i].clone() };
            Parameter { name: name.clone(), declared_type, has_default: i >= raw.min_count }
        })
        .collect();
    Signature { params, vararg: raw.vararg.clone(), kwarg: raw.kwarg.clone(), return_type: Type::Unknown }
}

fn check_default_argument_types(raw: &RawSignature, line: u32, sink: &mut dyn WarningSink, filepath: &str) {
    for (i, name) in raw.params.iter().enumerate() {
        let annotated = &raw.explicit_types[i];
        let default = &raw.default_types[i];
        if !annotated.is_unknown() && !default.is_unknown() && annotated != default {
            sink.warn(filepath, line, WarningKind::DefaultArgumentTypeError, name.to_string(), None);
        }
    }
}

/// A scope binding every parameter to its effective (pre-sharpening)
/// type with an unknown static value, for the generic first pass.
fn generic_scope(signature: &Signature) -> Scope {
    let mut scope = Scope::new();
    for param in &signature.params {
        scope.set(param.name.clone(), Symbol::of_type(param.declared_type.clone()));
    }
    if let Some(vararg) = &signature.vararg {
        scope.set(vararg.clone(), Symbol::of_type(Type::list(Type::Unknown)));
    }
    if let Some(kwarg) = &signature.kwarg {
        scope.set(kwarg.clone(), Symbol::of_type(Type::dict(Type::Unknown, Type::Unknown)));
    }
    scope
}

/// Run `body` once, silently, under `signature`'s generic scope merged
/// on top of `context`'s definition-time bindings, then read the
/// (possibly narrowed) parameter types and return slot back out of the
/// scope the body ran in. This is the silent first pass that sharpens
/// the signature before a real, per-call-site `FunctionEvaluator` is
/// attached.
fn sharpen_signature(body: &[cobra_ast::Stmt], filepath: &str, context: &Context, signature: &Signature) -> (Signature, Type) {
    let generic = generic_scope(signature);
    let snapshot = context.snapshot();
    let guard = snapshot.push_scope();
    for (name, symbol) in generic.iter() {
        snapshot.bind_local(name.clone(), symbol.clone());
    }
    let mut sink = NullWarningSink;
    crate::visitor::visit_body(body, &snapshot, &mut sink, filepath);

    let mut sharpened = signature.clone();
    {
        let scope_ref = snapshot.current_scope();
        let scope = scope_ref.borrow();
        for param in &mut sharpened.params {
            if let Some(symbol) = scope.get(param.name.as_str()) {
                param.declared_type = symbol.inferred_type.clone();
            }
        }
    }
    let return_type = snapshot.get_return_type().unwrap_or(Type::NoneType);
    snapshot.pop_scope(guard);
    (sharpened, return_type)
}

/// Build the [`Type::Function`] for a `def`. `bound_instance` is `Some`
/// for a method defined inside a class body,
/// forcing its first parameter (`self`) to the enclosing instance type
/// instead of whatever `@types(...)`/default would otherwise apply.
pub fn build_function_type(
    def: &Rc<StmtFunctionDef>,
    context: &Context,
    filepath: &str,
    sink: &mut dyn WarningSink,
    bound_instance: Option<Type>,
) -> Type {
    let mut raw = raw_signature(&def.args, &def.decorator_list, context);
    if let Some(instance) = &bound_instance {
        if let Some(first) = raw.explicit_types.first_mut() {
            *first = instance.clone();
        }
    }
    check_default_argument_types(&raw, def.pos.line, sink, filepath);

    let base_signature = fold_signature(&raw);
    let (sharpened, generic_return_type) = sharpen_signature(&def.body, filepath, context, &base_signature);
    let signature = Rc::new(sharpened);

    let evaluator = Rc::new(crate::call::FunctionEvaluator::new(def.clone(), Rc::from(filepath), context.snapshot()));

    Type::Function(FunctionType {
        id: context.fresh_function_id(),
        signature,
        return_type: Box::new(generic_return_type),
        evaluator,
        bound_instance: bound_instance.map(Box::new),
    })
}

/// Drop a bound method's leading `self` parameter, producing the call
/// signature a class exposes to its own instantiation site: a class's
/// signature minus the first parameter becomes its call signature.
fn drop_first_parameter(signature: &Signature) -> Signature {
    let mut params = signature.params.clone();
    if !params.is_empty() {
        params.remove(0);
    }
    Signature { params, vararg: signature.vararg.clone(), kwarg: signature.kwarg.clone(), return_type: Type::Unknown }
}

/// Build the [`Type::Class`] for a `class`: the class body is analyzed
/// in its own scope (becoming the class's attributes); if `__init__` is
/// present, running it eagerly
/// (as part of the generic first pass over its own body) populates a
/// shared `Instance`'s attribute scope in place, and `__init__`'s
/// signature minus `self` becomes the class's call signature.
pub fn build_class_type(class_def: &StmtClassDef, context: &Context, filepath: &str, sink: &mut dyn WarningSink) -> Type {
    let instance_id = context.fresh_instance_id();
    let instance_attributes = Rc::new(RefCell::new(Scope::new()));
    let instance_type = Type::Instance(InstanceType {
        id: instance_id,
        class_name: class_def.name.clone(),
        attributes: instance_attributes,
    });

    let guard = context.push_scope();
    for stmt in &class_def.body {
        match stmt {
            cobra_ast::Stmt::FunctionDef(method) => {
                let method_rc = Rc::new(method.clone());
                let function_type =
                    build_function_type(&method_rc, context, filepath, sink, Some(instance_type.clone()));
                context.bind_local(method.name.clone(), Symbol::of_type(function_type));
            }
            other => crate::visitor::visit_stmt(other, context, sink, filepath),
        }
    }
    let class_scope = context.pop_scope(guard);

    let init_signature = match class_scope.borrow().get("__init__") {
        Some(Symbol { inferred_type: Type::Function(f), .. }) => Some(f.signature.clone()),
        _ => None,
    };
    let call_signature = init_signature
        .map(|signature| drop_first_parameter(&signature))
        .unwrap_or_else(|| Signature { params: Vec::new(), vararg: None, kwarg: None, return_type: Type::Unknown });

    Type::Class(ClassType {
        id: context.fresh_class_id(),
        name: class_def.name.clone(),
        signature: Rc::new(call_signature),
        instance_type: Box::new(instance_type),
        evaluator: None,
        class_attributes: class_scope,
    })
}
