//! Loads a script's definitions without running it and reports whether doing so is safe.
//!
//! Setup runs in three steps: locate the file, load its callable units, then analyze
//! its top level. The first two are fatal; analysis is diagnostic and only logged.

use crate::entry_point;
use crate::error::HarnessError;
use crate::utils::{get_allowed_lines, LineIndex};
use crate::walk;
use rustpython_ast::{Arguments, Constant, Expr, Ranged, Stmt};
use rustpython_parser::{parse, Mode};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Explicit configuration for a harness run.
#[derive(Debug, Clone, Default)]
pub struct SetupContext {
    /// Script to load.
    pub script: PathBuf,
    /// Tolerate process-wide flag assignments used as test scaffolding.
    pub test_mode: bool,
    /// Callable units the script is expected to define.
    pub expected_units: Vec<String>,
}

impl SetupContext {
    /// Context for `script` with test mode off and no expected units.
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    /// Sets whether flag scaffolding is tolerated.
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// Adds callable units the script must define.
    pub fn expect_units<I, S>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_units.extend(units.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Function,
    Class,
}

/// A named callable defined at the top level of a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallableUnit {
    pub name: String,
    pub kind: UnitKind,
    pub line: usize,
}

/// A parsed script. Nothing in it has been executed.
#[derive(Debug)]
pub struct LoadedScript {
    pub path: PathBuf,
    pub source: String,
    pub body: Vec<Stmt>,
    pub units: Vec<CallableUnit>,
}

impl LoadedScript {
    /// Looks up a loaded unit by name.
    pub fn unit(&self, name: &str) -> Option<&CallableUnit> {
        self.units.iter().find(|u| u.name == name)
    }
}

/// A top-level statement that would execute when the script is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSideEffect {
    pub line: usize,
    pub description: String,
}

/// Structural diagnostics for a loaded script.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptReport {
    pub file: PathBuf,
    pub callable_units: Vec<CallableUnit>,
    pub has_main_guard: bool,
    /// Functions called from inside the main guard.
    pub guarded_calls: Vec<String>,
    pub load_side_effects: Vec<LoadSideEffect>,
    /// True when loading the script runs nothing but definitions.
    pub define_only_safe: bool,
}

/// Filesystem probe. Fails fast when the script is absent.
pub fn locate_script(path: &Path) -> Result<PathBuf, HarnessError> {
    if path.exists() {
        Ok(path.to_path_buf())
    } else {
        Err(HarnessError::ScriptNotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Reads and parses `path`, collecting its top-level functions and classes.
pub fn load_definitions(path: &Path) -> Result<LoadedScript, HarnessError> {
    let load_error = |reason: String| HarnessError::LoadError {
        path: path.to_path_buf(),
        reason,
    };

    let source = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
    let module = parse(&source, Mode::Module, &path.to_string_lossy())
        .map_err(|e| load_error(e.to_string()))?;
    let rustpython_ast::Mod::Module(module) = module else {
        return Err(load_error("not a module".to_string()));
    };

    let line_index = LineIndex::new(&source);
    let units = module
        .body
        .iter()
        .filter_map(|stmt| {
            let (name, kind) = match stmt {
                Stmt::FunctionDef(node) => (node.name.to_string(), UnitKind::Function),
                Stmt::AsyncFunctionDef(node) => (node.name.to_string(), UnitKind::Function),
                Stmt::ClassDef(node) => (node.name.to_string(), UnitKind::Class),
                _ => return None,
            };
            Some(CallableUnit {
                name,
                kind,
                line: line_index.line_index(stmt.range().start()),
            })
        })
        .collect::<Vec<_>>();

    tracing::debug!(path = %path.display(), units = units.len(), "loaded definitions");

    Ok(LoadedScript {
        path: path.to_path_buf(),
        source,
        body: module.body,
        units,
    })
}

/// Reports what loading `script` would execute and which units it defines.
///
/// Fails with `AnalysisError` when units listed in `context.expected_units` are missing.
pub fn analyze(script: &LoadedScript, context: &SetupContext) -> Result<ScriptReport, HarnessError> {
    let defined: HashSet<&str> = script.units.iter().map(|u| u.name.as_str()).collect();
    let missing: Vec<&str> = context
        .expected_units
        .iter()
        .map(String::as_str)
        .filter(|name| !defined.contains(name))
        .collect();
    if !missing.is_empty() {
        return Err(HarnessError::AnalysisError {
            reason: format!(
                "{} does not define: {}",
                script.path.display(),
                missing.join(", ")
            ),
        });
    }

    let line_index = LineIndex::new(&script.source);
    let allowed = get_allowed_lines(&script.source);

    let load_side_effects = script
        .body
        .iter()
        .filter_map(|stmt| {
            let line = line_index.line_index(stmt.range().start());
            if allowed.contains(&line) {
                return None;
            }
            classify_on_load(stmt, context.test_mode, true).map(|description| LoadSideEffect {
                line,
                description: description.to_string(),
            })
        })
        .collect::<Vec<_>>();

    Ok(ScriptReport {
        file: script.path.clone(),
        callable_units: script.units.clone(),
        has_main_guard: entry_point::has_main_guard(&script.body),
        guarded_calls: entry_point::detect_entry_point_calls(&script.body)
            .into_iter()
            .collect(),
        define_only_safe: load_side_effects.is_empty(),
        load_side_effects,
    })
}

/// A script loaded for testing, with its diagnostics if analysis succeeded.
#[derive(Debug)]
pub struct Harness {
    pub context: SetupContext,
    pub script: LoadedScript,
    pub report: Option<ScriptReport>,
}

impl Harness {
    /// Locates and loads the script, then analyzes it.
    ///
    /// Locate and load failures abort setup. Analysis failures are logged and
    /// leave `report` empty.
    pub fn setup(context: SetupContext) -> Result<Self, HarnessError> {
        let path = locate_script(&context.script)?;
        let script = load_definitions(&path)?;

        let report = match analyze(&script, &context) {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(error = %e, "continuing without structural analysis");
                None
            }
        };

        Ok(Self {
            context,
            script,
            report,
        })
    }
}

/// Describes what a statement does when its module is loaded, or `None` if it only defines.
///
/// `top_level` is false inside class bodies, which run on load but never hold a main guard.
fn classify_on_load(stmt: &Stmt, test_mode: bool, top_level: bool) -> Option<&'static str> {
    match stmt {
        Stmt::FunctionDef(node) => {
            classify_function(&node.decorator_list, &node.args, node.returns.as_deref())
        }
        Stmt::AsyncFunctionDef(node) => {
            classify_function(&node.decorator_list, &node.args, node.returns.as_deref())
        }
        Stmt::ClassDef(node) => {
            if node.decorator_list.iter().any(|d| !is_builtin_decorator(d)) {
                return Some("decorator executed on load");
            }
            let bases_call = node.bases.iter().any(walk::contains_call)
                || node.keywords.iter().any(|k| walk::contains_call(&k.value));
            if bases_call {
                return Some("call executed on load");
            }
            // The class body itself runs when the class statement does.
            node.body
                .iter()
                .find_map(|s| classify_on_load(s, test_mode, false))
                .map(|_| "class body executed on load")
        }
        Stmt::Import(_) | Stmt::ImportFrom(_) | Stmt::Pass(_) | Stmt::Global(_) => None,
        // Only the guarded body waits for `__main__`; `else:` runs on import.
        Stmt::If(node) if top_level && entry_point::is_main_guard(stmt) => node
            .orelse
            .iter()
            .find_map(|s| classify_on_load(s, test_mode, true))
            .map(|_| "main guard else branch executed on load"),
        Stmt::Expr(node) => match &*node.value {
            // docstring
            Expr::Constant(c) if matches!(c.value, Constant::Str(_)) => None,
            Expr::Call(_) => Some("call executed on load"),
            _ => Some("expression evaluated on load"),
        },
        Stmt::Assign(node) => {
            classify_assignment(node.targets.iter(), Some(&*node.value), test_mode)
        }
        Stmt::AnnAssign(node) => {
            classify_assignment(std::iter::once(&*node.target), node.value.as_deref(), test_mode)
        }
        Stmt::AugAssign(node) => {
            classify_assignment(std::iter::once(&*node.target), Some(&*node.value), test_mode)
        }
        Stmt::If(_)
        | Stmt::For(_)
        | Stmt::AsyncFor(_)
        | Stmt::While(_)
        | Stmt::With(_)
        | Stmt::AsyncWith(_)
        | Stmt::Try(_)
        | Stmt::TryStar(_)
        | Stmt::Match(_) => Some("control flow executed on load"),
        _ => Some("statement executed on load"),
    }
}

/// Decorators, defaults and annotations of a `def` are evaluated when the `def` runs.
fn classify_function(
    decorators: &[Expr],
    args: &Arguments,
    returns: Option<&Expr>,
) -> Option<&'static str> {
    if decorators.iter().any(|d| !is_builtin_decorator(d)) {
        return Some("decorator executed on load");
    }

    let mut evaluates_call = returns.is_some_and(walk::contains_call);
    walk::for_each_call_in_arguments(args, &mut |_| evaluates_call = true);
    evaluates_call.then_some("default or annotation evaluated on load")
}

/// `staticmethod`, `classmethod`, `property` and `prop.setter` style accessors.
fn is_builtin_decorator(decorator: &Expr) -> bool {
    match decorator {
        Expr::Name(name) => BUILTIN_DECORATORS.contains(&name.id.as_str()),
        Expr::Attribute(attr) => {
            matches!(attr.attr.as_str(), "setter" | "getter" | "deleter")
                && matches!(&*attr.value, Expr::Name(_))
        }
        _ => false,
    }
}

const BUILTIN_DECORATORS: [&str; 3] = ["staticmethod", "classmethod", "property"];

fn classify_assignment<'a>(
    mut targets: impl Iterator<Item = &'a Expr>,
    value: Option<&Expr>,
    test_mode: bool,
) -> Option<&'static str> {
    let mutates_shared = targets.any(|t| matches!(t, Expr::Attribute(_) | Expr::Subscript(_)));
    let literal = value.map_or(true, |v| matches!(v, Expr::Constant(_)));

    if mutates_shared && !(test_mode && literal) {
        Some("process-wide state mutated on load")
    } else if value.is_some_and(walk::contains_call) {
        Some("call executed on load")
    } else {
        None
    }
}
