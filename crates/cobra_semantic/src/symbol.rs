//! A single bound name.

use std::fmt;

use crate::types::Type;
use crate::value::Value;

/// A name bound in some [`Scope`](crate::scope::Scope), together with its
/// inferred type and (when known) its statically evaluated value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub inferred_type: Type,
    pub value: Value,
}

impl Symbol {
    pub fn new(inferred_type: Type, value: Value) -> Self {
        Symbol { inferred_type, value }
    }

    pub fn of_type(inferred_type: Type) -> Self {
        Symbol { inferred_type, value: Value::Unknown }
    }

    /// Narrow this symbol's type in place, keeping its value untouched.
    /// Used by constraint narrowing at use sites.
    pub fn with_type(&self, inferred_type: Type) -> Self {
        Symbol { inferred_type, value: self.value.clone() }
    }
}

impl fmt::Display for Symbol {
    /// `name type[ value]`, value omitted when unknown -- the scope-dump
    /// line format without the leading name (the caller prepends it).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_unknown() {
            write!(f, "{}", self.inferred_type)
        } else {
            write!(f, "{} {}", self.inferred_type, self.value)
        }
    }
}
