//! Per-occurrence name annotations.
//!
//! Every `Name` node the typer resolves to a non-`Unknown` type also
//! produces one of these, so that a downstream consumer (the
//! out-of-scope HTML source annotator) can render the inferred type
//! next to each identifier without re-running the analysis.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotation {
    pub filepath: String,
    pub line: u32,
    pub column: u32,
    pub name: String,
    pub label: String,
}

impl Annotation {
    pub fn new(filepath: impl Into<String>, line: u32, column: u32, name: impl Into<String>, label: impl Into<String>) -> Self {
        Annotation { filepath: filepath.into(), line, column, name: name.into(), label: label.into() }
    }
}
