//! Function/class-constructor signatures.

use std::fmt;

use cobra_ast::Name;

use crate::types::Type;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: Name,
    pub declared_type: Type,
    pub has_default: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<Parameter>,
    pub vararg: Option<Name>,
    pub kwarg: Option<Name>,
    pub return_type: Type,
}

impl Signature {
    pub fn min_required(&self) -> usize {
        self.params.iter().filter(|p| !p.has_default).count()
    }

    pub fn max_positional(&self) -> usize {
        self.params.len()
    }

    pub fn accepts_unbounded_positional(&self) -> bool {
        self.vararg.is_some()
    }

    pub fn accepts_unbounded_keyword(&self) -> bool {
        self.kwarg.is_some()
    }

    pub fn param_named(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name.as_str() == name)
    }
}

impl fmt::Display for Signature {
    /// `a: Num, b: Str, args: List(Unknown), kwargs: Dict(Unknown,Unknown)`
    /// -- defaults don't get their own marker; a defaulted parameter's
    /// declared type is rendered the same as a required one.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> =
            self.params.iter().map(|p| format!("{}: {}", p.name, p.declared_type)).collect();
        if let Some(vararg) = &self.vararg {
            parts.push(format!("{vararg}: {}", Type::list(Type::Unknown)));
        }
        if let Some(kwarg) = &self.kwarg {
            parts.push(format!("{kwarg}: {}", Type::dict(Type::Unknown, Type::Unknown)));
        }
        write!(f, "{}", parts.join(", "))
    }
}
