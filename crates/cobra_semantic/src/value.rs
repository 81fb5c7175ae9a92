//! Best-effort static values.
//!
//! A [`Value`] is produced by the static evaluator. It is always total:
//! operations that cannot be carried out (mismatched operand kinds,
//! unsupported node shapes) fold to [`Value::Unknown`] rather than
//! raising.

use std::fmt;

use ordered_float::OrderedFloat;

/// An ordered, hashable value produced by the static evaluator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Value {
    /// "No static information available."
    #[default]
    Unknown,
    None,
    Bool(bool),
    Num(OrderedFloat<f64>),
    Str(compact_str::CompactString),
    List(Vec<Value>),
    Set(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Tuple(Vec<Value>),
}

impl Value {
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    pub fn num(n: f64) -> Self {
        Value::Num(OrderedFloat(n))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(n.0),
            _ => None,
        }
    }

    /// `true` if the Python-domain notion of "this type supports `==`
    /// against that type" holds -- used by the comparison evaluator to
    /// decide whether `==`/`is` may statically be `false` (and `!=`/`is
    /// not` may statically be `true`) even without knowing the concrete
    /// values. Mirrors `util.comparable_types` restricted to the value
    /// domain: `None` is only comparable with `None`, scalars only with
    /// their own kind, containers only with their own kind.
    pub fn kind_comparable(&self, other: &Value) -> bool {
        use Value::{Bool, Dict, List, None as VNone, Num, Set, Str, Tuple, Unknown};
        match (self, other) {
            (Unknown, _) | (_, Unknown) => true,
            (VNone, VNone) => true,
            (Bool(_), Bool(_)) => true,
            (Num(_), Num(_)) => true,
            (Str(_), Str(_)) => true,
            (List(_), List(_)) => true,
            (Set(_), Set(_)) => true,
            (Dict(_), Dict(_)) => true,
            (Tuple(_), Tuple(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unknown => write!(f, "Unknown"),
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{}", n.0),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[{}]", items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))
            }
            Value::Set(items) => {
                write!(f, "{{{}}}", items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))
            }
            Value::Dict(items) => write!(
                f,
                "{{{}}}",
                items
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Value::Tuple(items) => {
                write!(f, "({})", items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))
            }
        }
    }
}

/// A minimal total order/hash wrapper over `f64`, needed because `Value`
/// derives `Eq`/`Hash` and `f64` implements neither directly.
pub mod ordered_float {
    use std::hash::{Hash, Hasher};

    #[derive(Clone, Copy, Debug, Default)]
    pub struct OrderedFloat(pub f64);

    impl PartialEq for OrderedFloat {
        fn eq(&self, other: &Self) -> bool {
            self.0.to_bits() == other.0.to_bits()
        }
    }
    impl Eq for OrderedFloat {}

    impl Hash for OrderedFloat {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.0.to_bits().hash(state);
        }
    }

    impl PartialOrd for OrderedFloat {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }

    impl Ord for OrderedFloat {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            self.0.total_cmp(&other.0)
        }
    }
}
