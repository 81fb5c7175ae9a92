//! Structural warnings and their rendering.

use std::fmt;

use cobra_ast::{Expr, Ranged, Stmt};
use strum_macros::Display as StrumDisplay;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "kebab-case")]
pub enum WarningKind {
    /// A name already bound in an enclosing or the same scope is bound
    /// again, narrowing or widening its type.
    Reassignment,
    /// A reassignment whose new type differs from the old one.
    TypeChange,
    /// A name is only bound on some paths through an `if`/`while`/`for`.
    ConditionallyAssigned,
    /// A name's type differs between the branches of a conditional.
    ConditionalType,
    /// A function's `return` statements disagree on type across branches.
    ConditionalReturnType,
    /// A comparison chain mixes incompatible operand types.
    InconsistentTypes,
    /// An expression's inferred type doesn't fit where it's used.
    TypeError,
    /// A function body contains `return` statements of incompatible types.
    MultipleReturnTypes,
    /// A name is read before any binding reaches it.
    Undefined,
    /// Two sibling class definitions share attribute names.
    OverlappingClassNames,
    /// A parameter default's type doesn't match its declared type.
    DefaultArgumentTypeError,
    /// A call target doesn't resolve to any known function.
    UndefinedFunction,
    /// A call target resolves to something that isn't callable.
    NotAFunction,
    /// A call omits a required positional argument.
    MissingArgument,
    /// A call supplies more positional arguments than the signature accepts.
    TooManyArguments,
    /// A call's `*args` spread isn't a list/tuple-typed value.
    InvalidVarargType,
    /// A call's `**kwargs` spread isn't a dict-typed value.
    InvalidKwargType,
    /// A call's keyword argument doesn't match any declared parameter.
    ExtraKeyword,
    /// A chained `in`/`not in` comparison (`a in b in c`).
    InOperatorChaining,
    /// The right-hand side of `in`/`not in` isn't a list, set, dict or tuple.
    InOperatorArgumentNotListOrDict,
    /// A chained `is`/`is not` comparison (`a is b is c`).
    IsOperatorChaining,
    /// A chained `==`/`<`/... comparison mixing incompatible operand kinds.
    ComparisonOperatorChaining,
    /// An attribute access on a value known not to carry that attribute.
    NotAnInstance,
    /// `del` applied to a name the analyzer can't confirm is safe to remove.
    Delete,
    /// An `if`/`while` test whose truthiness is statically known, making
    /// one branch unreachable.
    ConstantIfCondition,
    /// The (out-of-scope) module-resolution collaborator couldn't load
    /// an imported module. The core never raises this itself -- it's
    /// part of the closed category set so a caller wiring in a real
    /// import resolver has somewhere to report the failure.
    ImportFailed,
    /// An `import`/`from ... import` appearing anywhere but module scope.
    NonGlobalImport,
}

/// A single finding, anchored to the AST node that produced it.
#[derive(Clone, Debug)]
pub struct Warning {
    pub filepath: String,
    pub line: u32,
    pub category: WarningKind,
    pub label: String,
    pub details: Option<String>,
}

impl Warning {
    pub fn new(filepath: impl Into<String>, line: u32, category: WarningKind, label: impl Into<String>) -> Self {
        Warning { filepath: filepath.into(), line, category, label: label.into(), details: None }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for Warning {
    /// `filepath:line category "node-label"[ (details)]` -- matches
    /// `warning.py`'s `NodeWarning.__str__`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {} \"{}\"", self.filepath, self.line, self.category, self.label)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

/// A sink warnings (and, for `Name` nodes, annotations) are emitted to.
/// [`NullWarningSink`] mirrors the original's `NullWarnings` no-op used
/// while probing speculatively -- silent probes never need annotations
/// either, so `annotate` defaults to doing nothing.
pub trait WarningSink {
    fn warn(&mut self, filepath: &str, line: u32, category: WarningKind, label: String, details: Option<String>);

    fn annotate(&mut self, _filepath: &str, _line: u32, _column: u32, _name: &str, _label: &str) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullWarningSink;

impl WarningSink for NullWarningSink {
    fn warn(&mut self, _filepath: &str, _line: u32, _category: WarningKind, _label: String, _details: Option<String>) {}
}

#[derive(Clone, Debug, Default)]
pub struct CollectingWarningSink {
    pub warnings: Vec<Warning>,
    pub annotations: Vec<crate::annotation::Annotation>,
}

impl WarningSink for CollectingWarningSink {
    fn warn(&mut self, filepath: &str, line: u32, category: WarningKind, label: String, details: Option<String>) {
        tracing::debug!(%category, %label, line, "warning emitted");
        let mut warning = Warning::new(filepath, line, category, label);
        warning.details = details;
        self.warnings.push(warning);
    }

    fn annotate(&mut self, filepath: &str, line: u32, column: u32, name: &str, label: &str) {
        self.annotations.push(crate::annotation::Annotation::new(filepath, line, column, name, label));
    }
}

/// A short label identifying `expr` for a warning message, e.g.
/// `"x"` for a bare name or `".attr"` for an attribute access. Mirrors
/// `warning.py`'s `show_node`.
pub fn expr_label(expr: &Expr) -> String {
    match expr {
        Expr::Name(name) => name.id.to_string(),
        Expr::Call(call) => expr_label(&call.func),
        Expr::Attribute(attribute) => format!(".{}", attribute.attr),
        Expr::BoolOp(boolop) => boolop.op.to_string(),
        Expr::BinOp(binop) => binop.op.to_string(),
        Expr::UnaryOp(unaryop) => unaryop.op.to_string(),
        Expr::Compare(compare) => compare.ops.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "),
        other => other.kind_name().to_string(),
    }
}

/// The statement-level analogue of [`expr_label`], for warnings anchored
/// to a statement rather than an expression.
pub fn stmt_label(stmt: &Stmt) -> String {
    match stmt {
        Stmt::Assign(assign) => format!("{} = ...", expr_label(&assign.targets[0])),
        Stmt::AugAssign(aug) => format!("{} = ...", expr_label(&aug.target)),
        Stmt::Expr(expr) => expr_label(&expr.value),
        other => other.kind_name().to_string(),
    }
}

pub fn stmt_line(stmt: &Stmt) -> u32 {
    stmt.line()
}

pub fn expr_line(expr: &Expr) -> u32 {
    expr.line()
}
