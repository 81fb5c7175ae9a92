//! The statement visitor -- the piece that ties the typer, evaluator,
//! assigner and branch-refinement machinery together into whole-module
//! analysis.

use std::collections::HashSet;
use std::rc::Rc;

use cobra_ast::expr::ExprBinOp;
use cobra_ast::{
    Expr, Module, Name, Ranged, Stmt, StmtAugAssign, StmtExpr, StmtFor, StmtIf, StmtReturn, StmtWhile, StmtWith,
};

use crate::assign::{self, Assignment};
use crate::context::Context;
use crate::error::AnalysisError;
use crate::eval::static_evaluate;
use crate::narrow::{self, Inferences};
use crate::scope::Scope;
use crate::symbol::Symbol;
use crate::types::{self, ScopeRef, Type};
use crate::value::Value;
use crate::warning::{self, CollectingWarningSink, WarningKind, WarningSink};

/// Everything module-level analysis produces: the module's final scope
/// (for the out-of-scope HTML/scope-dump rendering), every warning
/// raised, and every per-`Name`-occurrence annotation collected.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub scope: Scope,
    pub warnings: Vec<crate::warning::Warning>,
    pub annotations: Vec<crate::annotation::Annotation>,
}

/// Analyze a whole module: a fresh builtins-seeded [`Context`], one
/// pushed module scope, the statement visitor run top to bottom.
///
/// `cobra_ast`'s node enums are closed and exhaustive, so there is no
/// runtime path that actually produces [`AnalysisError`] today -- see
/// `error.rs`. The `Result` shape is kept because it's the honest public
/// contract for a function whose input (a `Module`) this crate doesn't
/// itself construct.
pub fn analyze_module(module: &Module, filepath: &str) -> Result<AnalysisOutcome, AnalysisError> {
    let _span = tracing::debug_span!("analyze_module", filepath, statements = module.body.len()).entered();
    let context = Context::with_builtins();
    let guard = context.push_scope();
    let mut sink = CollectingWarningSink::default();
    visit_body(&module.body, &context, &mut sink, filepath);
    let module_scope = context.pop_scope(guard);
    let scope = module_scope.borrow().clone();
    tracing::debug!(warnings = sink.warnings.len(), symbols = scope.len(), "analysis complete");
    Ok(AnalysisOutcome { scope, warnings: sink.warnings, annotations: sink.annotations })
}

/// Run a function body for one call's bound arguments. Called from
/// [`crate::call::FunctionEvaluator::evaluate`].
pub(crate) fn analyze_function_body(
    body: &[Stmt],
    filepath: &str,
    closure: &Context,
    argument_scope: Scope,
) -> crate::call::EvaluationOutcome {
    let guard = closure.push_scope();
    for (name, symbol) in argument_scope.iter() {
        closure.bind_local(name.clone(), symbol.clone());
    }
    let mut sink = CollectingWarningSink::default();
    visit_body(body, closure, &mut sink, filepath);
    let body_scope = closure.pop_scope(guard);
    let return_type = body_scope.borrow().get_return_type().unwrap_or(Type::NoneType);
    crate::call::EvaluationOutcome { return_type, warnings: sink.warnings }
}

pub(crate) fn visit_body(body: &[Stmt], context: &Context, sink: &mut dyn WarningSink, filepath: &str) {
    for stmt in body {
        visit_stmt(stmt, context, sink, filepath);
    }
}

pub(crate) fn visit_stmt(stmt: &Stmt, context: &Context, sink: &mut dyn WarningSink, filepath: &str) {
    match stmt {
        Stmt::Assign(node) => {
            let value_type = crate::typer::visit(&node.value, &Type::Unknown, context, sink, filepath);
            let value_value = static_evaluate(&node.value, context);
            for target in &node.targets {
                let assignments = assign::assign(target, value_type.clone(), value_value.clone(), context);
                report_assignments(sink, filepath, stmt.line(), &assignments);
            }
        }
        Stmt::AugAssign(node) => visit_aug_assign(node, stmt, context, sink, filepath),
        Stmt::Return(node) => visit_return(node, stmt, context, sink, filepath),
        Stmt::Expr(node) => visit_expr_stmt(node, context, sink, filepath),
        Stmt::If(node) => visit_if(node, stmt, context, sink, filepath),
        Stmt::While(node) => visit_while(node, context, sink, filepath),
        Stmt::For(node) => visit_for(node, context, sink, filepath),
        Stmt::With(node) => visit_with(node, context, sink, filepath),
        Stmt::Delete(_) => {
            // Not supported in the functional subset -- the targets
            // aren't visited, so `del` never itself produces
            // `undefined`/annotation side effects.
            sink.warn(filepath, stmt.line(), WarningKind::Delete, warning::stmt_label(stmt), None);
        }
        Stmt::FunctionDef(def) => {
            let def_rc = Rc::new(def.clone());
            // Bind a placeholder for the function's own name before building
            // its signature/evaluator, so a self-call inside the body (direct
            // recursion) resolves to `Unknown` instead of `undefined` -- both
            // the generic sharpening pass and the evaluator's closure snapshot
            // `context` at this point, before the real type exists.
            context.bind_local(def.name.clone(), Symbol::of_type(Type::Unknown));
            let function_type = crate::def::build_function_type(&def_rc, context, filepath, sink, None);
            context.bind_local(def.name.clone(), Symbol::of_type(function_type));
        }
        Stmt::ClassDef(class_def) => visit_class_def(class_def, stmt, context, sink, filepath),
        Stmt::Import(_) | Stmt::ImportFrom(_) => {
            // Module-scope imports are resolved by the (out-of-scope)
            // import collaborator; anywhere deeper, they're flagged.
            if context.depth() > 2 {
                sink.warn(filepath, stmt.line(), WarningKind::NonGlobalImport, warning::stmt_label(stmt), None);
            }
        }
    }
}

/// Turn a batch of bindings into `reassignment`/`type-change` warnings:
/// every binding that replaced an existing one is a reassignment, and
/// one whose type actually moved is additionally a type change.
fn report_assignments(sink: &mut dyn WarningSink, filepath: &str, line: u32, assignments: &[Assignment]) {
    for assignment in assignments {
        let Some(old) = &assignment.old else { continue };
        sink.warn(filepath, line, WarningKind::Reassignment, assignment.name.to_string(), None);
        if old.inferred_type != assignment.new.inferred_type {
            let details = format!("{} -> {}", old.inferred_type, assignment.new.inferred_type);
            sink.warn(filepath, line, WarningKind::TypeChange, assignment.name.to_string(), Some(details));
        }
    }
}

fn visit_aug_assign(node: &StmtAugAssign, stmt: &Stmt, context: &Context, sink: &mut dyn WarningSink, filepath: &str) {
    // `x += 1` types exactly as `x = x + 1` would -- there's no separate
    // augmented-assignment operator semantics to model.
    let synthetic = Expr::BinOp(ExprBinOp {
        pos: node.pos,
        left: Box::new(node.target.clone()),
        op: node.op,
        right: Box::new(node.value.clone()),
    });
    let result_type = crate::typer::visit(&synthetic, &Type::Unknown, context, sink, filepath);
    let result_value = static_evaluate(&synthetic, context);
    let assignments = assign::assign(&node.target, result_type, result_value, context);
    report_assignments(sink, filepath, stmt.line(), &assignments);
}

fn visit_return(node: &StmtReturn, stmt: &Stmt, context: &Context, sink: &mut dyn WarningSink, filepath: &str) {
    let (return_type, return_value) = match &node.value {
        Some(value) => {
            (crate::typer::visit(value, &Type::Unknown, context, sink, filepath), static_evaluate(value, context))
        }
        None => (Type::NoneType, Value::None),
    };
    record_return(context, sink, filepath, stmt.line(), return_type, return_value);
}

/// Unify a newly-seen `return`/`yield` type into the enclosing scope's
/// return slot, warning when two returns disagree badly enough to
/// collapse the unified type to `Unknown`.
fn record_return(context: &Context, sink: &mut dyn WarningSink, filepath: &str, line: u32, return_type: Type, value: Value) {
    match context.get_return_type() {
        None => context.set_return(Symbol::new(return_type, value)),
        Some(previous) => {
            let unified = types::unify(&previous, &return_type);
            if unified.is_unknown() && !previous.is_unknown() && !return_type.is_unknown() {
                let details = format!("{previous} -> {return_type}");
                sink.warn(filepath, line, WarningKind::MultipleReturnTypes, "return".to_string(), Some(details));
            }
            context.set_return(Symbol::new(unified, value));
        }
    }
}

/// A bare expression statement. `yield value` is modeled as an `Expr`
/// statement wrapping an `Expr::Yield` (there's no dedicated `Yield`
/// statement node), so it's special-cased here to additionally feed the
/// enclosing function's return slot as `List(value_type)`, mirroring
/// the expression typer's own `Expr::Yield` case.
fn visit_expr_stmt(node: &StmtExpr, context: &Context, sink: &mut dyn WarningSink, filepath: &str) {
    if let Expr::Yield(yield_expr) = &node.value {
        let (inner_type, inner_value) = match &yield_expr.value {
            Some(value) => {
                (crate::typer::visit(value, &Type::Unknown, context, sink, filepath), static_evaluate(value, context))
            }
            None => (Type::NoneType, Value::None),
        };
        record_return(context, sink, filepath, node.pos.line, Type::list(inner_type), Value::List(vec![inner_value]));
        return;
    }
    crate::typer::visit(&node.value, &Type::Unknown, context, sink, filepath);
}

fn visit_while(node: &StmtWhile, context: &Context, sink: &mut dyn WarningSink, filepath: &str) {
    crate::typer::visit(&node.test, &Type::Bool, context, sink, filepath);
    visit_body(&node.body, context, sink, filepath);
    visit_body(&node.orelse, context, sink, filepath);
}

fn visit_for(node: &StmtFor, context: &Context, sink: &mut dyn WarningSink, filepath: &str) {
    let guard = context.push_scope();
    let iter_type = crate::typer::visit(&node.iter, &Type::Unknown, context, sink, filepath);
    let assignments = assign::assign_from_iterable(&node.target, &iter_type, context);
    report_assignments(sink, filepath, node.pos.line, &assignments);
    visit_body(&node.body, context, sink, filepath);
    context.pop_scope(guard);
    visit_body(&node.orelse, context, sink, filepath);
}

fn visit_with(node: &StmtWith, context: &Context, sink: &mut dyn WarningSink, filepath: &str) {
    let guard = context.push_scope();
    let context_type = crate::typer::visit(&node.context_expr, &Type::Unknown, context, sink, filepath);
    if let Some(target) = &node.optional_vars {
        let context_value = static_evaluate(&node.context_expr, context);
        let assignments = assign::assign(target, context_type, context_value, context);
        report_assignments(sink, filepath, node.pos.line, &assignments);
    }
    visit_body(&node.body, context, sink, filepath);
    context.pop_scope(guard);
}

/// Run `body` under a two-layer scope: an outer layer holding whatever
/// `maybe_inferences` narrowed for this branch, an inner layer for the
/// branch's own real bindings. Only the inner layer is returned, so
/// names bound in the branch can be told apart from names that merely
/// got narrowed by the test.
fn visit_branch(body: &[Stmt], inferences: &Inferences, context: &Context, sink: &mut dyn WarningSink, filepath: &str) -> ScopeRef {
    let inference_guard = context.push_scope();
    for (name, ty) in inferences {
        context.bind_local(name.clone(), Symbol::of_type(ty.clone()));
    }
    let body_guard = context.push_scope();
    visit_body(body, context, sink, filepath);
    let body_scope = context.pop_scope(body_guard);
    context.pop_scope(inference_guard);
    body_scope
}

fn visit_if(node: &StmtIf, stmt: &Stmt, context: &Context, sink: &mut dyn WarningSink, filepath: &str) {
    crate::typer::visit(&node.test, &Type::Bool, context, sink, filepath);
    let decided = static_evaluate(&node.test, context).as_bool();
    if decided.is_some() {
        sink.warn(filepath, stmt.line(), WarningKind::ConstantIfCondition, warning::stmt_label(stmt), None);
    }

    let (if_inferences, else_inferences) = narrow::maybe_inferences(&node.test, context);
    let if_scope = visit_branch(&node.body, &if_inferences, context, sink, filepath);
    let else_scope = visit_branch(&node.orelse, &else_inferences, context, sink, filepath);

    // A statically-decided test makes the other branch dead code: its
    // bindings (and any warnings it produced during `visit_branch`
    // above) still get analyzed, but only the live branch's bindings
    // -- types *and* values -- are merged back in, rather than a
    // conditional-assignment/type-divergence unify across branches that
    // both actually run.
    match decided {
        Some(true) => return merge_branch_into(context, &if_scope),
        Some(false) => return merge_branch_into(context, &else_scope),
        None => {}
    }

    // A name touched by only one branch still merges against whatever
    // it was bound to *before* the `if` (read now, since neither
    // branch's pushed scopes have been popped into `context` yet) --
    // that's what makes `x = None; if cond: x = 3` produce `Maybe(Num)`
    // rather than silently keeping the pre-if `NoneType` untouched.
    let if_names: HashSet<Name> = if_scope.borrow().names().cloned().collect();
    let else_names: HashSet<Name> = else_scope.borrow().names().cloned().collect();
    let touched: HashSet<Name> = if_names.union(&else_names).cloned().collect();

    for name in touched {
        let outer = context.lookup(name.as_str());
        let if_symbol = if_scope.borrow().get(name.as_str()).cloned().or_else(|| outer.clone());
        let else_symbol = else_scope.borrow().get(name.as_str()).cloned().or_else(|| outer.clone());

        match (if_symbol, else_symbol) {
            (Some(a), Some(b)) => {
                let unified_type = types::unify(&a.inferred_type, &b.inferred_type);
                let unified_value = if a.value == b.value { a.value.clone() } else { Value::Unknown };
                context.bind_local(name.clone(), Symbol::new(unified_type.clone(), unified_value));
                if unified_type.is_unknown() && !a.inferred_type.is_unknown() && !b.inferred_type.is_unknown() {
                    sink.warn(filepath, stmt.line(), WarningKind::ConditionalType, name.to_string(), None);
                }
            }
            _ => {
                sink.warn(filepath, stmt.line(), WarningKind::ConditionallyAssigned, name.to_string(), None);
            }
        }
    }

    let if_return = if_scope.borrow().get_return_type().unwrap_or(Type::Unknown);
    let else_return = else_scope.borrow().get_return_type().unwrap_or(Type::Unknown);
    let unified_return = types::unify(&if_return, &else_return);
    context.set_return(Symbol::of_type(unified_return.clone()));
    if unified_return.is_unknown() && !if_return.is_unknown() && !else_return.is_unknown() {
        sink.warn(filepath, stmt.line(), WarningKind::ConditionalReturnType, warning::stmt_label(stmt), None);
    }
}

/// Copy every binding (type and static value both) and the return slot
/// straight from a statically-decided branch's scope into the enclosing
/// scope -- used instead of the unify-both-branches merge when the test
/// itself was constant.
fn merge_branch_into(context: &Context, branch_scope: &ScopeRef) {
    for (name, symbol) in branch_scope.borrow().iter() {
        context.bind_local(name.clone(), symbol.clone());
    }
    if let Some(return_symbol) = branch_scope.borrow().get_return() {
        context.set_return(return_symbol.clone());
    }
}

fn visit_class_def(class_def: &cobra_ast::StmtClassDef, stmt: &Stmt, context: &Context, sink: &mut dyn WarningSink, filepath: &str) {
    let class_type = crate::def::build_class_type(class_def, context, filepath, sink);
    if let Type::Class(new_class) = &class_type {
        let new_names: HashSet<Name> = new_class.class_attributes.borrow().names().cloned().collect();
        let overlapping: Vec<Name> = context
            .current_scope()
            .borrow()
            .iter()
            .filter_map(|(existing_name, existing_symbol)| match &existing_symbol.inferred_type {
                Type::Class(other) if other.id != new_class.id => {
                    let shares_attribute =
                        other.class_attributes.borrow().names().any(|name| new_names.contains(name));
                    shares_attribute.then(|| existing_name.clone())
                }
                _ => None,
            })
            .collect();
        for other_name in overlapping {
            let details = format!("{other_name} / {}", class_def.name);
            sink.warn(filepath, stmt.line(), WarningKind::OverlappingClassNames, class_def.name.to_string(), Some(details));
        }
    }
    context.bind_local(class_def.name.clone(), Symbol::of_type(class_type));
}

#[cfg(test)]
mod tests {
    use cobra_ast::expr::{ExprCompare, ExprNum, ExprStr};
    use cobra_ast::stmt::{StmtAssign, StmtIf};
    use cobra_ast::{CmpOp, NodePos};
    use text_size::{TextRange, TextSize};

    use super::*;
    use crate::context::Context;

    fn pos() -> NodePos {
        NodePos::new(TextRange::new(TextSize::from(0), TextSize::from(0)), 1, 0)
    }

    fn assign_stmt(name: &str, value: Expr) -> Stmt {
        Stmt::Assign(StmtAssign { pos: pos(), targets: vec![Expr::name(name, pos())], value })
    }

    #[test]
    fn reassignment_with_type_change_warns_twice() {
        let context = Context::new();
        let mut sink = CollectingWarningSink::default();
        visit_stmt(&assign_stmt("x", Expr::Num(ExprNum { pos: pos(), value: 1.0 })), &context, &mut sink, "t.py");
        visit_stmt(
            &assign_stmt("x", Expr::Str(ExprStr { pos: pos(), value: "a".into() })),
            &context,
            &mut sink,
            "t.py",
        );
        assert_eq!(sink.warnings[0].category, WarningKind::Reassignment);
        assert_eq!(sink.warnings[1].category, WarningKind::TypeChange);
    }

    #[test]
    fn if_without_else_makes_branch_only_binding_conditional() {
        let context = Context::new();
        let mut sink = CollectingWarningSink::default();
        let if_stmt = Stmt::If(StmtIf {
            pos: pos(),
            test: Expr::Compare(ExprCompare {
                pos: pos(),
                left: Box::new(Expr::Num(ExprNum { pos: pos(), value: 1.0 })),
                ops: vec![CmpOp::Eq],
                comparators: vec![Expr::Num(ExprNum { pos: pos(), value: 1.0 })],
            }),
            body: vec![assign_stmt("y", Expr::Num(ExprNum { pos: pos(), value: 2.0 }))],
            orelse: Vec::new(),
        });
        visit_stmt(&if_stmt, &context, &mut sink, "t.py");
        assert!(sink.warnings.iter().any(|w| w.category == WarningKind::ConditionallyAssigned));
        assert!(context.lookup("y").is_none());
    }

    #[test]
    fn if_reassigns_an_already_outer_bound_name_to_maybe() {
        let context = Context::new();
        context.bind_local(Name::new("x"), Symbol::of_type(Type::NoneType));
        let mut sink = CollectingWarningSink::default();
        let if_stmt = Stmt::If(StmtIf {
            pos: pos(),
            test: Expr::Compare(ExprCompare {
                pos: pos(),
                left: Box::new(Expr::Num(ExprNum { pos: pos(), value: 1.0 })),
                ops: vec![CmpOp::Eq],
                comparators: vec![Expr::Num(ExprNum { pos: pos(), value: 1.0 })],
            }),
            body: vec![assign_stmt("x", Expr::Num(ExprNum { pos: pos(), value: 3.0 }))],
            orelse: Vec::new(),
        });
        visit_stmt(&if_stmt, &context, &mut sink, "t.py");
        // `x` is reassigned inside the branch's own scope, not the outer
        // one the reassignment is merged back into -- a name already
        // bound outside the `if` merges against its pre-if type, so
        // `NoneType` unified with `Num` comes out `Maybe(Num)`, not `Num`.
        assert_eq!(context.lookup("x").unwrap().inferred_type, Type::maybe(Type::Num));
        assert!(!sink.warnings.iter().any(|w| w.category == WarningKind::ConditionallyAssigned));
    }

    #[test]
    fn constant_if_condition_warns() {
        let context = Context::new();
        let mut sink = CollectingWarningSink::default();
        let if_stmt = Stmt::If(StmtIf {
            pos: pos(),
            test: Expr::Compare(ExprCompare {
                pos: pos(),
                left: Box::new(Expr::Num(ExprNum { pos: pos(), value: 1.0 })),
                ops: vec![CmpOp::Eq],
                comparators: vec![Expr::Num(ExprNum { pos: pos(), value: 1.0 })],
            }),
            body: Vec::new(),
            orelse: Vec::new(),
        });
        visit_stmt(&if_stmt, &context, &mut sink, "t.py");
        assert!(sink.warnings.iter().any(|w| w.category == WarningKind::ConstantIfCondition));
    }
}
