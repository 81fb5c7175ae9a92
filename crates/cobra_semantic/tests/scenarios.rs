//! End-to-end scenarios run against hand-built `cobra_ast` fixtures.
//!
//! There's no parser in this workspace, so each test constructs its
//! little program directly as AST nodes rather than from source text.

use cobra_ast::expr::{ExprAttribute, ExprBinOp, ExprCall, ExprCompare, ExprDict, ExprList, ExprNum, ExprStr, NodePos};
use cobra_ast::operator::{CmpOp, Operator};
use cobra_ast::stmt::{Parameters, StmtAssign, StmtClassDef, StmtExpr, StmtFor, StmtFunctionDef, StmtIf, StmtReturn};
use cobra_ast::{Expr, Module, Name, Stmt};
use cobra_semantic::{analyze_module, Type, Value, WarningKind};
use text_size::{TextRange, TextSize};

/// Surfaces the crate's `tracing` output (scope push/pop, cache hits,
/// warning emission) when a test is run with `RUST_LOG` set; a no-op
/// otherwise. Safe to call from every test -- only the first call in
/// the process actually installs a subscriber.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("trace").try_init();
}

fn pos(line: u32) -> NodePos {
    NodePos::new(TextRange::new(TextSize::from(0), TextSize::from(0)), line, 0)
}

fn module(body: Vec<Stmt>) -> Module {
    Module { pos: pos(1), body }
}

fn num(line: u32, value: f64) -> Expr {
    Expr::Num(ExprNum { pos: pos(line), value })
}

fn string(line: u32, value: &str) -> Expr {
    Expr::Str(ExprStr { pos: pos(line), value: value.into() })
}

fn name(line: u32, id: &str) -> Expr {
    Expr::name(id, pos(line))
}

fn list(line: u32, elts: Vec<Expr>) -> Expr {
    Expr::List(ExprList { pos: pos(line), elts })
}

fn dict(line: u32, keys: Vec<Expr>, values: Vec<Expr>) -> Expr {
    Expr::Dict(ExprDict { pos: pos(line), keys, values })
}

fn binop(line: u32, left: Expr, op: Operator, right: Expr) -> Expr {
    Expr::BinOp(ExprBinOp { pos: pos(line), left: Box::new(left), op, right: Box::new(right) })
}

fn compare(line: u32, left: Expr, op: CmpOp, right: Expr) -> Expr {
    Expr::Compare(ExprCompare { pos: pos(line), left: Box::new(left), ops: vec![op], comparators: vec![right] })
}

fn call(line: u32, func: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call(ExprCall { pos: pos(line), func: Box::new(func), args, keywords: vec![], starargs: None, kwargs: None })
}

fn assign(line: u32, target: &str, value: Expr) -> Stmt {
    Stmt::Assign(StmtAssign { pos: pos(line), targets: vec![name(line, target)], value })
}

fn expr_stmt(line: u32, value: Expr) -> Stmt {
    Stmt::Expr(StmtExpr { pos: pos(line), value })
}

fn if_stmt(line: u32, test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Stmt {
    Stmt::If(StmtIf { pos: pos(line), test, body, orelse })
}

fn for_stmt(line: u32, target: Expr, iter: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::For(StmtFor { pos: pos(line), target, iter, body, orelse: Vec::new() })
}

fn function_def(line: u32, name_: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
    Stmt::FunctionDef(StmtFunctionDef {
        pos: pos(line),
        name: Name::new(name_),
        args: Parameters { args: params.iter().map(|p| Name::new(*p)).collect(), defaults: Vec::new(), vararg: None, kwarg: None },
        body,
        decorator_list: Vec::new(),
        returns: None,
    })
}

fn return_stmt(line: u32, value: Expr) -> Stmt {
    Stmt::Return(StmtReturn { pos: pos(line), value: Some(value) })
}

fn attribute(line: u32, base: Expr, attr: &str) -> Expr {
    Expr::Attribute(ExprAttribute { pos: pos(line), value: Box::new(base), attr: Name::new(attr) })
}

fn attr_assign(line: u32, base: &str, attr: &str, value: Expr) -> Stmt {
    Stmt::Assign(StmtAssign { pos: pos(line), targets: vec![attribute(line, name(line, base), attr)], value })
}

fn class_def(line: u32, name_: &str, body: Vec<Stmt>) -> Stmt {
    Stmt::ClassDef(StmtClassDef { pos: pos(line), name: Name::new(name_), bases: Vec::new(), body, decorator_list: Vec::new() })
}

/// S1: reassigning a name to an incompatible type reports both findings.
#[test]
fn reassignment_with_type_change_is_flagged() {
    init_tracing();
    let m = module(vec![assign(1, "x", num(1, 1.0)), assign(2, "x", string(2, "a"))]);
    let outcome = analyze_module(&m, "s1.py").unwrap();

    assert_eq!(outcome.scope.get("x").unwrap().inferred_type, Type::Str);
    assert!(outcome.warnings.iter().any(|w| w.category == WarningKind::Reassignment));
    assert!(outcome.warnings.iter().any(|w| w.category == WarningKind::TypeChange));
}

/// S2: calling a two-parameter function with one argument reports the
/// missing parameter by name.
#[test]
fn calling_with_a_missing_argument_is_flagged() {
    init_tracing();
    let body = vec![return_stmt(1, binop(1, name(1, "a"), Operator::Add, name(1, "b")))];
    let m = module(vec![
        function_def(1, "f", &["a", "b"], body),
        expr_stmt(2, call(2, name(2, "f"), vec![num(2, 1.0)])),
    ]);
    let outcome = analyze_module(&m, "s2.py").unwrap();

    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.category == WarningKind::MissingArgument && w.details.as_deref() == Some("b")));
}

/// S3: narrowing a `Maybe(Num)` via `is not None` resolves the guarded
/// use to the bare wrapped type, with no type error on it.
#[test]
fn is_not_none_refines_optional_to_wrapped_type() {
    init_tracing();
    let after_first_if = module(vec![
        assign(1, "x", name(1, "None")),
        if_stmt(2, name(2, "cond"), vec![assign(2, "x", num(2, 3.0))], Vec::new()),
    ]);
    let outcome = analyze_module(&after_first_if, "s3.py").unwrap();
    // `x` is only assigned `3` on one side of the branch, so merging it
    // against the pre-if `None` binding must produce `Maybe(Num)`, not
    // collapse straight to `Num` -- the whole point of the second `if`
    // below is narrowing that optional back down.
    assert_eq!(outcome.scope.get("x").unwrap().inferred_type, Type::maybe(Type::Num));

    let m = module(vec![
        assign(1, "x", name(1, "None")),
        if_stmt(2, name(2, "cond"), vec![assign(2, "x", num(2, 3.0))], Vec::new()),
        if_stmt(
            3,
            compare(3, name(3, "x"), CmpOp::IsNot, name(3, "None")),
            vec![assign(3, "y", binop(3, name(3, "x"), Operator::Add, num(3, 1.0)))],
            Vec::new(),
        ),
    ]);
    let outcome = analyze_module(&m, "s3.py").unwrap();

    assert!(!outcome.warnings.iter().any(|w| w.category == WarningKind::TypeError));
    let refined = outcome.annotations.iter().find(|a| a.name == "x" && a.line == 3);
    assert_eq!(refined.map(|a| a.label.as_str()), Some("Num"));
}

/// S4: a list-accumulator `for` loop infers the container's element
/// type and the accumulator's type without any type-level warning.
#[test]
fn for_loop_accumulator_infers_container_and_element_types() {
    init_tracing();
    let m = module(vec![
        assign(1, "xs", list(1, vec![num(1, 1.0), num(1, 2.0), num(1, 3.0)])),
        assign(2, "s", num(2, 0.0)),
        for_stmt(3, name(3, "v"), name(3, "xs"), vec![assign(3, "s", binop(3, name(3, "s"), Operator::Add, name(3, "v")))]),
    ]);
    let outcome = analyze_module(&m, "s4.py").unwrap();

    assert_eq!(outcome.scope.get("xs").unwrap().inferred_type, Type::list(Type::Num));
    assert_eq!(outcome.scope.get("s").unwrap().inferred_type, Type::Num);
    assert!(!outcome
        .warnings
        .iter()
        .any(|w| matches!(w.category, WarningKind::TypeError | WarningKind::TypeChange | WarningKind::InconsistentTypes)));
}

/// S5: a dict literal whose keys don't share a type is flagged.
#[test]
fn dict_with_inconsistent_key_types_is_flagged() {
    init_tracing();
    let m = module(vec![expr_stmt(1, dict(1, vec![num(1, 1.0), string(1, "b")], vec![string(1, "a"), string(1, "c")]))]);
    let outcome = analyze_module(&m, "s5.py").unwrap();

    assert!(outcome.warnings.iter().any(|w| w.category == WarningKind::InconsistentTypes));
}

/// S6: a statically-true `if` condition is flagged, and only the live
/// branch's binding (with its static value) survives into the merge.
#[test]
fn statically_true_condition_takes_only_the_live_branch() {
    init_tracing();
    let m = module(vec![if_stmt(
        1,
        name(1, "True"),
        vec![assign(1, "a", num(1, 1.0))],
        vec![assign(1, "a", num(1, 2.0))],
    )]);
    let outcome = analyze_module(&m, "s6.py").unwrap();

    assert!(outcome.warnings.iter().any(|w| w.category == WarningKind::ConstantIfCondition));
    let a = outcome.scope.get("a").unwrap();
    assert_eq!(a.inferred_type, Type::Num);
    assert_eq!(a.value, Value::num(1.0));
}

/// A class instantiation call's positional arguments line up against
/// `__init__`'s own parameters one-for-one -- the class's call signature
/// already has `self` dropped (see `def::build_class_type`), so
/// `Point(1, "y")` against `__init__(self, x, y)` is a fully-supplied,
/// correct-arity call and must not be flagged as passing too many
/// arguments (a prior bug double-counted the dropped `self` as a
/// positional-argument offset on top of the class's already-`self`-less
/// signature).
#[test]
fn class_instantiation_does_not_double_offset_for_dropped_self() {
    init_tracing();
    let init_body = vec![attr_assign(2, "self", "x", name(2, "x")), attr_assign(3, "self", "y", name(3, "y"))];
    let init = function_def(1, "__init__", &["self", "x", "y"], init_body);
    let m = module(vec![
        class_def(1, "Point", vec![init]),
        assign(5, "p", call(5, name(5, "Point"), vec![num(5, 1.0), string(5, "y")])),
    ]);
    let outcome = analyze_module(&m, "class_offset.py").unwrap();

    assert!(!outcome.warnings.iter().any(|w| w.category == WarningKind::TooManyArguments));
    assert!(!outcome.warnings.iter().any(|w| w.category == WarningKind::MissingArgument));
    assert!(matches!(outcome.scope.get("p").unwrap().inferred_type, Type::Instance(_)));
}
