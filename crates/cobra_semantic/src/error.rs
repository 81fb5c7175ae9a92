//! The one hard-failure mode the core analyzer can raise.
//!
//! `cobra_ast::Stmt`/`Expr` are closed, exhaustive Rust enums, so every
//! match over them in this crate is checked at compile time -- there is
//! no runtime "unrecognized node tag" an analysis pass can hit the way
//! a dynamically-typed visitor over a string-tagged AST can. This error
//! type still exists because `analyze_module` needs a `Result`-shaped
//! public interface (a future out-of-tree AST producer could construct
//! nodes this crate doesn't expect to see), but nothing in this crate
//! ever constructs `AnalysisError::UnrecognizedNode` itself.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("{filepath}:{line}: unrecognized AST node \"{label}\"")]
    UnrecognizedNode { filepath: String, line: u32, label: String },
}
