//! Recognises the `if __name__ == "__main__":` guard in Python scripts.
//!
//! The guard is the script-side version of the entry-point gate: statements inside
//! it only run when the file is executed as a command, never when it is imported.

use crate::walk;
use rustpython_ast::{Constant, Expr, Stmt};
use std::collections::BTreeSet;

/// Returns true when `stmt` is an `if __name__ == "__main__":` guard.
///
/// Both operand orders are accepted.
pub fn is_main_guard(stmt: &Stmt) -> bool {
    let Stmt::If(if_stmt) = stmt else {
        return false;
    };
    let Expr::Compare(compare) = &*if_stmt.test else {
        return false;
    };
    if compare.ops.len() != 1 || compare.comparators.len() != 1 {
        return false;
    }
    if !matches!(compare.ops[0], rustpython_ast::CmpOp::Eq) {
        return false;
    }

    let left = &*compare.left;
    let right = &compare.comparators[0];
    (is_name_dunder(left) && is_main_string(right)) || (is_name_dunder(right) && is_main_string(left))
}

/// Returns true when any top-level statement is a main guard.
pub fn has_main_guard(stmts: &[Stmt]) -> bool {
    stmts.iter().any(is_main_guard)
}

/// Names of the functions called inside top-level main guards, sorted.
pub fn detect_entry_point_calls(stmts: &[Stmt]) -> BTreeSet<String> {
    let mut calls = BTreeSet::new();
    for stmt in stmts.iter().filter(|s| is_main_guard(s)) {
        if let Stmt::If(if_stmt) = stmt {
            for body_stmt in &if_stmt.body {
                collect_function_calls(body_stmt, &mut calls);
            }
        }
    }
    calls
}

fn is_name_dunder(expr: &Expr) -> bool {
    matches!(expr, Expr::Name(name) if name.id.as_str() == "__name__")
}

fn is_main_string(expr: &Expr) -> bool {
    matches!(expr, Expr::Constant(c) if matches!(&c.value, Constant::Str(s) if s.as_str() == "__main__"))
}

/// Collects the calls made by a statement inside the guard, descending into blocks.
fn collect_function_calls(stmt: &Stmt, calls: &mut BTreeSet<String>) {
    let mut record = |expr: &Expr| {
        walk::for_each_call(expr, &mut |call| calls.extend(walk::call_name(call)));
    };
    match stmt {
        Stmt::Expr(node) => record(&node.value),
        Stmt::Assign(node) => record(&node.value),
        Stmt::AugAssign(node) => record(&node.value),
        Stmt::AnnAssign(node) => {
            if let Some(value) = &node.value {
                record(value);
            }
        }
        Stmt::Return(node) => {
            if let Some(value) = &node.value {
                record(value);
            }
        }
        Stmt::If(node) => {
            record(&node.test);
            for s in node.body.iter().chain(&node.orelse) {
                collect_function_calls(s, calls);
            }
        }
        Stmt::For(node) => {
            record(&node.iter);
            for s in node.body.iter().chain(&node.orelse) {
                collect_function_calls(s, calls);
            }
        }
        Stmt::While(node) => {
            record(&node.test);
            for s in node.body.iter().chain(&node.orelse) {
                collect_function_calls(s, calls);
            }
        }
        Stmt::With(node) => {
            for item in &node.items {
                record(&item.context_expr);
            }
            for s in &node.body {
                collect_function_calls(s, calls);
            }
        }
        Stmt::Try(node) => {
            for s in node.body.iter().chain(&node.orelse).chain(&node.finalbody) {
                collect_function_calls(s, calls);
            }
        }
        _ => {}
    }
}
