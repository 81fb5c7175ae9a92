//! A lexical scope: an insertion-ordered map of bound names to
//! [`Symbol`]s.

use std::fmt;
use std::hash::{Hash, Hasher};

use cobra_ast::Name;
use indexmap::IndexMap;
use itertools::Itertools;
use static_assertions::assert_impl_all;

use crate::symbol::Symbol;
use crate::types::Type;

// `spec.md` §9's "memoization cache keyed by scope equality" requires a
// `Scope` to be usable directly as a `HashMap` key (`call.rs`'s
// `FunctionEvaluator::cache`); assert that invariant at compile time
// rather than relying on a trait bound error surfacing far away in
// `call.rs` if it's ever accidentally dropped.
assert_impl_all!(Scope: Eq, std::hash::Hash, Clone);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scope {
    symbols: IndexMap<Name, Symbol>,
    /// The designated "return" slot: the unified type/value
    /// of every `return`/`yield` seen so far in the scope this `Scope`
    /// belongs to. Not a regular name, so it never shows up in `names()`
    /// or the scope dump.
    return_symbol: Option<Symbol>,
}

impl Scope {
    pub fn new() -> Self {
        Scope { symbols: IndexMap::new(), return_symbol: None }
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.symbols.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn set(&mut self, name: Name, symbol: Symbol) {
        self.symbols.insert(name, symbol);
    }

    pub fn set_type(&mut self, name: Name, inferred_type: Type) {
        self.set(name, Symbol::of_type(inferred_type));
    }

    pub fn remove(&mut self, name: &str) -> Option<Symbol> {
        self.symbols.shift_remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &Name> {
        self.symbols.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Symbol)> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn set_return(&mut self, symbol: Symbol) {
        self.return_symbol = Some(symbol);
    }

    pub fn get_return(&self) -> Option<&Symbol> {
        self.return_symbol.as_ref()
    }

    pub fn get_return_type(&self) -> Option<Type> {
        self.return_symbol.as_ref().map(|symbol| symbol.inferred_type.clone())
    }

    /// `name type[ value]` lines, one per symbol, sorted by name.
    pub fn render(&self) -> String {
        self.symbols
            .keys()
            .sorted_by(|a, b| a.as_str().cmp(b.as_str()))
            .map(|name| format!("{name} {}", self.symbols[name]))
            .join("\n")
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl Hash for Scope {
    /// `IndexMap`'s own `PartialEq` treats two maps holding the same
    /// key-value pairs as equal regardless of insertion order, so this
    /// sorts by key before hashing to stay consistent with that `Eq` --
    /// required since `Scope` is a `FunctionEvaluator` cache key.
    fn hash<H: Hasher>(&self, state: &mut H) {
        let items: Vec<(&Name, &Symbol)> = self.symbols.iter().sorted_by(|a, b| a.0.as_str().cmp(b.0.as_str())).collect();
        items.len().hash(state);
        for (name, symbol) in items {
            name.hash(state);
            symbol.hash(state);
        }
        self.return_symbol.hash(state);
    }
}
