//! The lexical scope stack, plus the read-through overlay used for
//! non-mutating probes.
//!
//! The scope stack is interior-mutable (`RefCell`-backed) rather than
//! requiring `&mut Context` at every call site: the statement visitor
//! and expression typer pass a shared `&Context` down through deeply
//! recursive, mutually-recursive call graphs (an expression can contain
//! a lambda that opens its own scopes; a call's argument can itself be
//! a comprehension), and threading unique borrows through that shape
//! would force awkward re-borrowing at nearly every recursive call.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cobra_ast::Name;
use drop_bomb::DebugDropBomb;

use crate::scope::Scope;
use crate::symbol::Symbol;
use crate::types::{ClassId, FunctionId, InstanceId, ScopeRef};

/// A stack of scopes, innermost last. Lookups walk from the innermost
/// scope outward; new bindings are written into the innermost scope.
#[derive(Debug)]
pub struct Context {
    scopes: RefCell<Vec<ScopeRef>>,
    /// A stack of temporary single-name rebindings, consulted by
    /// `lookup` before the scope stack. Used by branch-refinement
    /// probing (`crate::narrow::maybe_inferences`) to ask "what would
    /// this expression statically evaluate to if `name` were bound to
    /// this type/value instead?" without disturbing any real scope.
    overrides: RefCell<Vec<(Name, Symbol)>>,
    /// Shared across every [`Context::snapshot`] taken from the same
    /// root, so `Instance`/`Class`/`Function` handles minted anywhere
    /// during one analysis run never collide.
    next_id: Rc<Cell<u32>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A bare context: a single empty scope 0, no `None`/`True`/`False`
    /// bound yet. Most callers want [`Context::with_builtins`] instead;
    /// this is exposed for tests that want full control over scope 0.
    pub fn new() -> Self {
        Context {
            scopes: RefCell::new(vec![Rc::new(RefCell::new(Scope::new()))]),
            overrides: RefCell::new(Vec::new()),
            next_id: Rc::new(Cell::new(0)),
        }
    }

    /// Scope 0 pre-bound with the three names the core always seeds
    /// regardless of what an out-of-scope builtins-file loader adds on
    /// top: `None`, `True`, `False`.
    pub fn with_builtins() -> Self {
        let context = Self::new();
        context.bind_local(Name::new("None"), Symbol::new(crate::types::Type::NoneType, crate::value::Value::None));
        context.bind_local(Name::new("True"), Symbol::new(crate::types::Type::Bool, crate::value::Value::Bool(true)));
        context.bind_local(
            Name::new("False"),
            Symbol::new(crate::types::Type::Bool, crate::value::Value::Bool(false)),
        );
        context
    }

    /// A context sharing no scope state with `self` (but the same id
    /// allocator), seeded with a fresh copy of `self`'s currently-visible
    /// bindings flattened into a single global scope -- used to give a
    /// nested function body its own independent scope stack rooted at
    /// its definition-time closure.
    pub fn snapshot(&self) -> Context {
        let fresh = Context { next_id: self.next_id.clone(), ..Context::new() };
        for scope in self.scopes.borrow().iter() {
            for (name, symbol) in scope.borrow().iter() {
                fresh.bind_local(name.clone(), symbol.clone());
            }
        }
        fresh
    }

    fn next_id(&self) -> usize {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id as usize
    }

    pub fn fresh_instance_id(&self) -> InstanceId {
        InstanceId::new(self.next_id())
    }

    pub fn fresh_class_id(&self) -> ClassId {
        ClassId::new(self.next_id())
    }

    pub fn fresh_function_id(&self) -> FunctionId {
        FunctionId::new(self.next_id())
    }

    /// Push a scratch override, most-recently-pushed wins. Must be
    /// matched by a [`Context::pop_override`].
    pub fn push_override(&self, name: Name, symbol: Symbol) {
        self.overrides.borrow_mut().push((name, symbol));
    }

    pub fn pop_override(&self) {
        self.overrides.borrow_mut().pop().expect("pop_override called with no pushed override");
    }

    /// Push a fresh inner scope and return a guard that must be consumed
    /// by [`Context::pop_scope`]. An unconsumed guard panics on drop in
    /// debug builds, catching unbalanced push/pop pairs in tests.
    #[must_use]
    pub fn push_scope(&self) -> ScopeGuard {
        self.scopes.borrow_mut().push(Rc::new(RefCell::new(Scope::new())));
        tracing::trace!(depth = self.depth(), "push_scope");
        ScopeGuard { bomb: DebugDropBomb::new("ScopeGuard dropped without a matching Context::pop_scope") }
    }

    pub fn pop_scope(&self, mut guard: ScopeGuard) -> ScopeRef {
        guard.bomb.defuse();
        let popped = self.scopes.borrow_mut().pop().expect("pop_scope called with no pushed scope");
        tracing::trace!(depth = self.depth(), symbols = popped.borrow().len(), "pop_scope");
        popped
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        if let Some((_, symbol)) = self.overrides.borrow().iter().rev().find(|(n, _)| n.as_str() == name) {
            return Some(symbol.clone());
        }
        self.scopes.borrow().iter().rev().find_map(|scope| scope.borrow().get(name).cloned())
    }

    /// The innermost scope currently bound to `name`, if any -- used to
    /// narrow an existing binding in place rather than shadowing it.
    pub fn owning_scope(&self, name: &str) -> Option<ScopeRef> {
        self.scopes.borrow().iter().rev().find(|scope| scope.borrow().contains(name)).cloned()
    }

    /// Rewrite `name` in whichever scope already owns it, or bind it
    /// fresh in the current scope if it isn't bound anywhere yet. Narrows
    /// an existing binding in place rather than shadowing it -- callers
    /// that want an `Assign`/branch-merge target to always land in the
    /// current scope (so a branch's own reassignments stay distinguishable
    /// from its enclosing scope) want [`Context::bind_local`] instead.
    pub fn assign(&self, name: Name, symbol: Symbol) {
        if let Some(scope) = self.owning_scope(name.as_str()) {
            scope.borrow_mut().set(name, symbol);
        } else {
            self.current_scope().borrow_mut().set(name, symbol);
        }
    }

    /// Bind `name` in the innermost scope regardless of whether it's
    /// already bound further out -- used for parameters and loop/
    /// comprehension targets, which always shadow rather than narrow.
    pub fn bind_local(&self, name: Name, symbol: Symbol) {
        self.current_scope().borrow_mut().set(name, symbol);
    }

    /// Narrow an already-bound name's type without disturbing its value.
    /// A no-op if the name isn't bound anywhere on the stack.
    pub fn narrow(&self, name: &str, narrowed_type: crate::types::Type) {
        if let Some(scope) = self.owning_scope(name) {
            let mut scope = scope.borrow_mut();
            if let Some(symbol) = scope.get(name) {
                tracing::trace!(name, from = %symbol.inferred_type, to = %narrowed_type, "narrow constraint");
                let narrowed = symbol.with_type(narrowed_type);
                scope.set(Name::new(name), narrowed);
            }
        }
    }

    /// Record `symbol` in the current scope's return slot.
    pub fn set_return(&self, symbol: Symbol) {
        self.current_scope().borrow_mut().set_return(symbol);
    }

    /// The current scope's return slot type, if any `return`/`yield`
    /// has been visited yet.
    pub fn get_return_type(&self) -> Option<crate::types::Type> {
        self.current_scope().borrow().get_return_type()
    }

    pub fn current_scope(&self) -> ScopeRef {
        self.scopes.borrow().last().expect("Context always holds at least the global scope").clone()
    }

    pub fn global_scope(&self) -> ScopeRef {
        self.scopes.borrow().first().expect("Context always holds at least the global scope").clone()
    }

    pub fn depth(&self) -> usize {
        self.scopes.borrow().len()
    }
}

/// Enforces that every [`Context::push_scope`] is matched by a
/// [`Context::pop_scope`], via a `drop_bomb::DebugDropBomb` that catches
/// unbalanced scope bookkeeping in debug/test builds.
pub struct ScopeGuard {
    bomb: DebugDropBomb,
}

/// A frozen base [`Context`] with one mutable overlay scope on top, so a
/// speculative type substitution never leaks into the real analysis
/// state.
pub struct ExtendedContext<'a> {
    base: &'a Context,
    overlay: RefCell<Scope>,
}

impl<'a> ExtendedContext<'a> {
    pub fn new(base: &'a Context) -> Self {
        ExtendedContext { base, overlay: RefCell::new(Scope::new()) }
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.overlay.borrow().get(name).cloned().or_else(|| self.base.lookup(name))
    }

    pub fn assign(&self, name: Name, symbol: Symbol) {
        self.overlay.borrow_mut().set(name, symbol);
    }

    pub fn narrow(&self, name: &str, narrowed_type: crate::types::Type) {
        let symbol = self
            .overlay
            .borrow()
            .get(name)
            .cloned()
            .or_else(|| self.base.lookup(name))
            .unwrap_or_else(|| Symbol::of_type(narrowed_type.clone()));
        self.overlay.borrow_mut().set(Name::new(name), symbol.with_type(narrowed_type));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn lookup_walks_outward() {
        let ctx = Context::new();
        ctx.assign(Name::new("x"), Symbol::of_type(Type::Num));
        let guard = ctx.push_scope();
        assert_eq!(ctx.lookup("x").unwrap().inferred_type, Type::Num);
        ctx.pop_scope(guard);
    }

    #[test]
    fn assign_in_inner_scope_shadows() {
        let ctx = Context::new();
        ctx.assign(Name::new("x"), Symbol::of_type(Type::Num));
        let guard = ctx.push_scope();
        ctx.bind_local(Name::new("x"), Symbol::of_type(Type::Str));
        assert_eq!(ctx.lookup("x").unwrap().inferred_type, Type::Str);
        ctx.pop_scope(guard);
        assert_eq!(ctx.lookup("x").unwrap().inferred_type, Type::Num);
    }

    #[test]
    fn extended_context_overlay_does_not_mutate_base() {
        let ctx = Context::new();
        ctx.assign(Name::new("x"), Symbol::of_type(Type::maybe(Type::Num)));
        let extended = ExtendedContext::new(&ctx);
        extended.narrow("x", Type::Num);
        assert_eq!(extended.lookup("x").unwrap().inferred_type, Type::Num);
        assert_eq!(ctx.lookup("x").unwrap().inferred_type, Type::maybe(Type::Num));
    }
}
