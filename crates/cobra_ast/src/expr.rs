use text_size::TextRange;

use crate::name::Name;
use crate::operator::{BoolOp, CmpOp, Operator, UnaryOp};
use crate::Ranged;

/// Source position carried by every node: a byte range plus the
/// one-indexed line/column pair diagnostics are reported against.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct NodePos {
    pub range: TextRange,
    pub line: u32,
    pub column: u32,
}

impl NodePos {
    pub const fn new(range: TextRange, line: u32, column: u32) -> Self {
        Self {
            range,
            line,
            column,
        }
    }
}

/// A single `for` clause of a comprehension (`for target in iter if ifs...`).
#[derive(Clone, Debug, PartialEq)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
    pub is_async: bool,
}

/// A call keyword argument. `arg: None` represents a `**mapping` spread.
#[derive(Clone, Debug, PartialEq)]
pub struct Keyword {
    pub arg: Option<Name>,
    pub value: Expr,
}

/// The target of a `Subscript`.
#[derive(Clone, Debug, PartialEq)]
pub enum Slice {
    Index(Box<Expr>),
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
}

macro_rules! expr_nodes {
    ($($variant:ident($struct_name:ident) { $($field:ident : $ty:ty),* $(,)? }),* $(,)?) => {
        #[derive(Clone, Debug, PartialEq)]
        pub enum Expr {
            $($variant($struct_name),)*
        }

        $(
            #[derive(Clone, Debug, PartialEq)]
            pub struct $struct_name {
                pub pos: NodePos,
                $(pub $field: $ty,)*
            }

            impl From<$struct_name> for Expr {
                fn from(node: $struct_name) -> Expr {
                    Expr::$variant(node)
                }
            }
        )*

        impl Expr {
            /// The node kind label used in `show_node`-style warning rendering.
            pub fn kind_name(&self) -> &'static str {
                match self {
                    $(Expr::$variant(_) => stringify!($variant),)*
                }
            }
        }

        impl Ranged for Expr {
            fn pos(&self) -> NodePos {
                match self {
                    $(Expr::$variant(node) => node.pos,)*
                }
            }
        }
    };
}

expr_nodes! {
    BoolOp(ExprBoolOp) { op: BoolOp, values: Vec<Expr> },
    BinOp(ExprBinOp) { left: Box<Expr>, op: Operator, right: Box<Expr> },
    UnaryOp(ExprUnaryOp) { op: UnaryOp, operand: Box<Expr> },
    Lambda(ExprLambda) { args: crate::stmt::Parameters, body: Box<Expr> },
    IfExp(ExprIfExp) { test: Box<Expr>, body: Box<Expr>, orelse: Box<Expr> },
    Dict(ExprDict) { keys: Vec<Expr>, values: Vec<Expr> },
    Set(ExprSet) { elts: Vec<Expr> },
    ListComp(ExprListComp) { elt: Box<Expr>, generators: Vec<Comprehension> },
    SetComp(ExprSetComp) { elt: Box<Expr>, generators: Vec<Comprehension> },
    DictComp(ExprDictComp) { key: Box<Expr>, value: Box<Expr>, generators: Vec<Comprehension> },
    GeneratorExp(ExprGeneratorExp) { elt: Box<Expr>, generators: Vec<Comprehension> },
    Yield(ExprYield) { value: Option<Box<Expr>> },
    Compare(ExprCompare) { left: Box<Expr>, ops: Vec<CmpOp>, comparators: Vec<Expr> },
    Call(ExprCall) {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
        starargs: Option<Box<Expr>>,
        kwargs: Option<Box<Expr>>,
    },
    Attribute(ExprAttribute) { value: Box<Expr>, attr: Name },
    Subscript(ExprSubscript) { value: Box<Expr>, slice: Box<Slice> },
    Name(ExprName) { id: Name },
    List(ExprList) { elts: Vec<Expr> },
    Tuple(ExprTuple) { elts: Vec<Expr> },
    Num(ExprNum) { value: f64 },
    Str(ExprStr) { value: compact_str::CompactString },
    Repr(ExprRepr) { value: Box<Expr> },
}

impl Expr {
    pub fn name(id: impl Into<Name>, pos: NodePos) -> Self {
        Expr::Name(ExprName { pos, id: id.into() })
    }
}
