//! A static semantic analyzer for a small dynamically-typed, Python-like
//! language: a type lattice, a bidirectional expression typer, a
//! best-effort constant evaluator, branch-sensitive optional-type
//! refinement, and a statement visitor tying them together into
//! whole-module analysis. See `SPEC_FULL.md` for the full module map.
//!
//! The crate never parses source text itself -- [`cobra_ast`] defines
//! the closed node vocabulary this analyzer runs against, and
//! [`analyze_module`] is the single entry point a caller owning a
//! parser hands a [`cobra_ast::Module`] to.

pub mod annotation;
pub mod assign;
pub mod call;
pub mod context;
pub mod def;
pub mod error;
pub mod eval;
pub mod narrow;
pub mod operators;
pub mod scope;
pub mod signature;
pub mod symbol;
pub mod typer;
pub mod types;
pub mod value;
pub mod visitor;
pub mod warning;

pub use annotation::Annotation;
pub use context::Context;
pub use error::AnalysisError;
pub use scope::Scope;
pub use signature::{Parameter, Signature};
pub use symbol::Symbol;
pub use types::Type;
pub use value::Value;
pub use visitor::{analyze_module, AnalysisOutcome};
pub use warning::{CollectingWarningSink, Warning, WarningKind, WarningSink};
