//! Walks Python expressions for the calls they would make when evaluated.
//!
//! Used both to name the calls inside a main guard and to decide whether a
//! top-level expression runs code on load.

use rustpython_ast::{Arguments, Comprehension, Expr, ExprCall};

/// Visits every call reachable from `expr`, outermost first.
///
/// Lambda bodies are skipped because they only run when the lambda is called;
/// their default arguments are visited because those are evaluated immediately.
pub fn for_each_call<'a, F>(expr: &'a Expr, visit: &mut F)
where
    F: FnMut(&'a ExprCall),
{
    match expr {
        Expr::Call(call) => {
            visit(call);
            for_each_call(&call.func, visit);
            // Arguments can hold calls too: `sys.exit(main())`
            for arg in &call.args {
                for_each_call(arg, visit);
            }
            for keyword in &call.keywords {
                for_each_call(&keyword.value, visit);
            }
        }
        Expr::Attribute(node) => for_each_call(&node.value, visit),
        Expr::Subscript(node) => {
            for_each_call(&node.value, visit);
            for_each_call(&node.slice, visit);
        }
        Expr::Slice(node) => {
            for bound in [&node.lower, &node.upper, &node.step].into_iter().flatten() {
                for_each_call(bound, visit);
            }
        }
        Expr::BinOp(node) => {
            for_each_call(&node.left, visit);
            for_each_call(&node.right, visit);
        }
        Expr::UnaryOp(node) => for_each_call(&node.operand, visit),
        Expr::BoolOp(node) => node.values.iter().for_each(|v| for_each_call(v, visit)),
        Expr::Compare(node) => {
            for_each_call(&node.left, visit);
            node.comparators.iter().for_each(|c| for_each_call(c, visit));
        }
        Expr::IfExp(node) => {
            for_each_call(&node.test, visit);
            for_each_call(&node.body, visit);
            for_each_call(&node.orelse, visit);
        }
        Expr::NamedExpr(node) => for_each_call(&node.value, visit),
        Expr::Starred(node) => for_each_call(&node.value, visit),
        Expr::Await(node) => for_each_call(&node.value, visit),
        Expr::List(node) => node.elts.iter().for_each(|e| for_each_call(e, visit)),
        Expr::Tuple(node) => node.elts.iter().for_each(|e| for_each_call(e, visit)),
        Expr::Set(node) => node.elts.iter().for_each(|e| for_each_call(e, visit)),
        Expr::Dict(node) => {
            node.keys.iter().flatten().for_each(|k| for_each_call(k, visit));
            node.values.iter().for_each(|v| for_each_call(v, visit));
        }
        Expr::ListComp(node) => {
            for_each_call(&node.elt, visit);
            for_each_call_in_generators(&node.generators, visit);
        }
        Expr::SetComp(node) => {
            for_each_call(&node.elt, visit);
            for_each_call_in_generators(&node.generators, visit);
        }
        Expr::GeneratorExp(node) => {
            for_each_call(&node.elt, visit);
            for_each_call_in_generators(&node.generators, visit);
        }
        Expr::DictComp(node) => {
            for_each_call(&node.key, visit);
            for_each_call(&node.value, visit);
            for_each_call_in_generators(&node.generators, visit);
        }
        // f-strings
        Expr::JoinedStr(node) => node.values.iter().for_each(|v| for_each_call(v, visit)),
        Expr::FormattedValue(node) => {
            for_each_call(&node.value, visit);
            if let Some(spec) = &node.format_spec {
                for_each_call(spec, visit);
            }
        }
        Expr::Lambda(node) => for_each_call_in_arguments(&node.args, visit),
        _ => {}
    }
}

/// Visits the calls in default values and annotations of a parameter list.
pub fn for_each_call_in_arguments<'a, F>(args: &'a Arguments, visit: &mut F)
where
    F: FnMut(&'a ExprCall),
{
    let with_defaults = args
        .posonlyargs
        .iter()
        .chain(&args.args)
        .chain(&args.kwonlyargs);
    for arg in with_defaults {
        if let Some(default) = &arg.default {
            for_each_call(default, visit);
        }
        if let Some(annotation) = &arg.def.annotation {
            for_each_call(annotation, visit);
        }
    }
    for arg in [&args.vararg, &args.kwarg].into_iter().flatten() {
        if let Some(annotation) = &arg.annotation {
            for_each_call(annotation, visit);
        }
    }
}

fn for_each_call_in_generators<'a, F>(generators: &'a [Comprehension], visit: &mut F)
where
    F: FnMut(&'a ExprCall),
{
    for generator in generators {
        for_each_call(&generator.iter, visit);
        generator.ifs.iter().for_each(|cond| for_each_call(cond, visit));
    }
}

/// Returns true when evaluating `expr` would call anything.
pub fn contains_call(expr: &Expr) -> bool {
    let mut found = false;
    for_each_call(expr, &mut |_| found = true);
    found
}

/// Name of the called function. Method calls report the method name only.
pub fn call_name(call: &ExprCall) -> Option<String> {
    match &*call.func {
        Expr::Name(name) => Some(name.id.to_string()),
        Expr::Attribute(attr) => Some(attr.attr.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustpython_parser::{parse, Mode};

    fn expr(source: &str) -> Expr {
        match parse(source, Mode::Expression, "<expr>").expect("Failed to parse") {
            rustpython_ast::Mod::Expression(e) => *e.body,
            _ => panic!("expected an expression"),
        }
    }

    fn names(source: &str) -> Vec<String> {
        let parsed = expr(source);
        let mut out = Vec::new();
        for_each_call(&parsed, &mut |call| out.extend(call_name(call)));
        out
    }

    #[test]
    fn test_nested_and_keyword_calls() {
        assert_eq!(names("sys.exit(main(level=roll()))"), vec!["exit", "main", "roll"]);
    }

    #[test]
    fn test_comprehensions_and_fstrings() {
        assert!(contains_call(&expr("[fetch(i) for i in range(3)]")));
        assert!(contains_call(&expr("{k: v for k, v in items if check(k)}")));
        assert!(contains_call(&expr("(x for x in source())")));
        assert!(contains_call(&expr("f\"{boom()}\"")));
        assert!(contains_call(&expr("f\"{level:{width()}}\"")));
    }

    #[test]
    fn test_walrus_and_starred() {
        assert!(contains_call(&expr("(n := compute())")));
        assert!(contains_call(&expr("[*load(), 1]")));
    }

    #[test]
    fn test_lambda_body_does_not_run() {
        assert!(!contains_call(&expr("lambda: boom()")));
        assert!(contains_call(&expr("lambda x=boom(): x")));
    }

    #[test]
    fn test_plain_literals() {
        assert!(!contains_call(&expr("{'Hero': ('Cmdlet Crusader', 99)}")));
        assert!(!contains_call(&expr("LEVELS[1:3]")));
    }
}
