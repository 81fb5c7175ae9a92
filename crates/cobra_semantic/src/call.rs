//! Lazy, cached, recursion-guarded function body evaluation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cobra_ast::StmtFunctionDef;
use rustc_hash::FxHashMap;

use crate::context::Context;
use crate::scope::Scope;
use crate::types::Type;
use crate::warning::Warning;

/// The result of evaluating a function body against one particular
/// argument scope: the inferred return type plus whatever warnings that
/// evaluation produced.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationOutcome {
    pub return_type: Type,
    pub warnings: Vec<Warning>,
}

/// Evaluates a function's body for a given bound-argument [`Scope`],
/// caching results keyed by that scope's contents (two calls with
/// structurally equal arguments reuse the first's result) and guarding
/// against unbounded recursion on self-calls.
pub struct FunctionEvaluator {
    def: Rc<StmtFunctionDef>,
    filepath: Rc<str>,
    closure: RefCell<Context>,
    cache: RefCell<FxHashMap<Scope, EvaluationOutcome>>,
    evaluating: Cell<bool>,
}

impl FunctionEvaluator {
    pub fn new(def: Rc<StmtFunctionDef>, filepath: Rc<str>, closure: Context) -> Self {
        FunctionEvaluator {
            def,
            filepath,
            closure: RefCell::new(closure),
            cache: RefCell::new(FxHashMap::default()),
            evaluating: Cell::new(false),
        }
    }

    /// Evaluate (or fetch the cached evaluation of) this function's body
    /// given `argument_scope`. A recursive self-call (detected via
    /// `evaluating`) returns `Unknown` with no warnings rather than
    /// looping forever.
    ///
    /// The first evaluation of a given `argument_scope` (a cache miss)
    /// returns its warnings so the call site can surface them; every
    /// later call with an equal `argument_scope` (a cache hit) returns
    /// the same `return_type` with its warning list blanked, so the same
    /// body isn't re-reported at every call site that happens to supply
    /// the same argument types.
    pub fn evaluate(&self, argument_scope: Scope) -> EvaluationOutcome {
        let name = self.def.name.as_str();
        if let Some(cached) = self.cache.borrow().get(&argument_scope) {
            tracing::trace!(function = name, return_type = %cached.return_type, "evaluator cache hit");
            return EvaluationOutcome { return_type: cached.return_type.clone(), warnings: Vec::new() };
        }
        if self.evaluating.get() {
            tracing::debug!(function = name, "recursion guard tripped, returning Unknown");
            return EvaluationOutcome { return_type: Type::Unknown, warnings: Vec::new() };
        }

        tracing::trace!(function = name, "evaluator cache miss");
        let _guard = EvaluatingGuard::enter(&self.evaluating);
        let outcome = crate::visitor::analyze_function_body(
            &self.def.body,
            &self.filepath,
            &self.closure.borrow(),
            argument_scope.clone(),
        );

        self.cache.borrow_mut().insert(argument_scope, outcome.clone());
        outcome
    }
}

/// Clears `evaluating` on drop, including on an unwind out of
/// `analyze_function_body` -- a bare `Cell` set/unset pair around that
/// call would leave the flag stuck `true` forever if the body analysis
/// panicked partway through.
struct EvaluatingGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> EvaluatingGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        EvaluatingGuard { flag }
    }
}

impl Drop for EvaluatingGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

impl std::fmt::Debug for FunctionEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionEvaluator").field("name", &self.def.name).finish_non_exhaustive()
    }
}
