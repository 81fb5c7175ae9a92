//! The closed abstract-syntax-tree vocabulary the analyzer is built against.
//!
//! Parsing itself is out of scope: this crate only defines the node shapes
//! listed as the analyzer's external interface, named after the tags the
//! upstream parser is expected to produce. It deliberately carries none of
//! a real concrete-syntax-tree's trivia, comments or parenthesization
//! bookkeeping.

pub mod expr;
pub mod name;
pub mod operator;
pub mod stmt;

pub use expr::{Comprehension, Expr, Keyword, NodePos, Slice};
pub use name::Name;
pub use operator::{BoolOp, CmpOp, Operator, UnaryOp};
pub use text_size::{TextRange, TextSize};
pub use stmt::{
    Alias, Module, Parameters, Stmt, StmtAssign, StmtAugAssign, StmtClassDef, StmtDelete, StmtExpr, StmtFor,
    StmtFunctionDef, StmtIf, StmtImport, StmtImportFrom, StmtReturn, StmtWhile, StmtWith,
};

/// Implemented by every AST node so diagnostics can be anchored to a
/// location without threading a separate line/column pair through every
/// call site.
pub trait Ranged {
    fn pos(&self) -> NodePos;

    fn range(&self) -> TextRange {
        self.pos().range
    }

    fn line(&self) -> u32 {
        self.pos().line
    }

    fn column(&self) -> u32 {
        self.pos().column
    }
}
