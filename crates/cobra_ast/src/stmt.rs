use crate::expr::{Expr, NodePos};
use crate::name::Name;
use crate::operator::Operator;
use crate::Ranged;

/// `import foo` / `import foo as bar`.
#[derive(Clone, Debug, PartialEq)]
pub struct Alias {
    pub name: Name,
    pub asname: Option<Name>,
}

/// A function or lambda parameter list.
///
/// `defaults` aligns with the *trailing* `args` entries, so the number
/// of required parameters is `len(args) - len(defaults)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Parameters {
    pub args: Vec<Name>,
    pub defaults: Vec<Expr>,
    pub vararg: Option<Name>,
    pub kwarg: Option<Name>,
}

impl Parameters {
    pub fn min_count(&self) -> usize {
        self.args.len() - self.defaults.len()
    }
}

macro_rules! stmt_nodes {
    ($($variant:ident($struct_name:ident) { $($field:ident : $ty:ty),* $(,)? }),* $(,)?) => {
        #[derive(Clone, Debug, PartialEq)]
        pub enum Stmt {
            $($variant($struct_name),)*
        }

        $(
            #[derive(Clone, Debug, PartialEq)]
            pub struct $struct_name {
                pub pos: NodePos,
                $(pub $field: $ty,)*
            }

            impl From<$struct_name> for Stmt {
                fn from(node: $struct_name) -> Stmt {
                    Stmt::$variant(node)
                }
            }
        )*

        impl Stmt {
            pub fn kind_name(&self) -> &'static str {
                match self {
                    $(Stmt::$variant(_) => stringify!($variant),)*
                }
            }
        }

        impl Ranged for Stmt {
            fn pos(&self) -> NodePos {
                match self {
                    $(Stmt::$variant(node) => node.pos,)*
                }
            }
        }
    };
}

stmt_nodes! {
    Import(StmtImport) { names: Vec<Alias> },
    ImportFrom(StmtImportFrom) { module: Option<Name>, names: Vec<Alias>, level: u32 },
    ClassDef(StmtClassDef) { name: Name, bases: Vec<Expr>, body: Vec<Stmt>, decorator_list: Vec<Expr> },
    FunctionDef(StmtFunctionDef) {
        name: Name,
        args: Parameters,
        body: Vec<Stmt>,
        decorator_list: Vec<Expr>,
        returns: Option<Expr>,
    },
    Return(StmtReturn) { value: Option<Expr> },
    Assign(StmtAssign) { targets: Vec<Expr>, value: Expr },
    AugAssign(StmtAugAssign) { target: Expr, op: Operator, value: Expr },
    Delete(StmtDelete) { targets: Vec<Expr> },
    If(StmtIf) { test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt> },
    While(StmtWhile) { test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt> },
    For(StmtFor) { target: Expr, iter: Expr, body: Vec<Stmt>, orelse: Vec<Stmt> },
    With(StmtWith) { context_expr: Expr, optional_vars: Option<Expr>, body: Vec<Stmt> },
    Expr(StmtExpr) { value: Expr },
}

/// The whole-program root. Not itself a `Stmt` variant since a module
/// only ever appears at the top of the tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub pos: NodePos,
    pub body: Vec<Stmt>,
}
