use herald_rs::error::HarnessError;
use herald_rs::harness::{analyze, load_definitions, locate_script, Harness, SetupContext, UnitKind};
use std::fs::File;
use std::io::Write;
use tempfile::tempdir;

const GUARDED_SCRIPT: &str = r#"
"""Builds a hero record."""
import random
from datetime import datetime

def new_record(category):
    return {"category": category, "level": random.randint(1, 98) + datetime.now().day}

class Record:
    pass

if __name__ == "__main__":
    import sys
    print(new_record(sys.argv[1]))
"#;

const UNGUARDED_SCRIPT: &str = r#"
import sys

def new_record(category):
    return category

print(new_record(sys.argv[1]))
"#;

fn write_script(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = File::create(&path).unwrap();
    write!(file, "{}", content).unwrap();
    path
}

#[test]
fn test_missing_script_is_fatal() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.py");

    let err = locate_script(&missing).unwrap_err();
    assert!(matches!(err, HarnessError::ScriptNotFound { ref path } if path == &missing));

    let err = Harness::setup(SetupContext::new(&missing)).unwrap_err();
    assert!(err.to_string().contains("nope.py"));
}

#[test]
fn test_malformed_script_is_load_error() {
    let dir = tempdir().unwrap();
    let path = write_script(&dir, "broken.py", "def broken(:\n    pass\n");

    let err = Harness::setup(SetupContext::new(&path)).unwrap_err();
    match err {
        HarnessError::LoadError { path: p, .. } => assert_eq!(p, path),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_load_collects_callable_units() {
    let dir = tempdir().unwrap();
    let path = write_script(&dir, "hero.py", GUARDED_SCRIPT);

    let script = load_definitions(&path).unwrap();
    assert_eq!(script.units.len(), 2);

    let func = script.unit("new_record").expect("new_record should be loaded");
    assert_eq!(func.kind, UnitKind::Function);
    assert_eq!(func.line, 6);

    let class = script.unit("Record").expect("Record should be loaded");
    assert_eq!(class.kind, UnitKind::Class);
    assert_eq!(class.line, 9);
}

#[test]
fn test_guarded_script_is_define_only_safe() {
    let dir = tempdir().unwrap();
    let path = write_script(&dir, "hero.py", GUARDED_SCRIPT);

    let harness = Harness::setup(SetupContext::new(&path).expect_units(["new_record"])).unwrap();
    let report = harness.report.expect("analysis should succeed");

    assert!(report.has_main_guard);
    assert!(report.define_only_safe);
    assert!(report.load_side_effects.is_empty());
    assert!(report.guarded_calls.contains(&"new_record".to_string()));
}

#[test]
fn test_unguarded_script_reports_side_effects() {
    let dir = tempdir().unwrap();
    let path = write_script(&dir, "loose.py", UNGUARDED_SCRIPT);

    let script = load_definitions(&path).unwrap();
    let report = analyze(&script, &SetupContext::new(&path)).unwrap();

    assert!(!report.has_main_guard);
    assert!(!report.define_only_safe);
    assert_eq!(report.load_side_effects.len(), 1);
    assert_eq!(report.load_side_effects[0].line, 7);
    assert_eq!(report.load_side_effects[0].description, "call executed on load");
}

#[test]
fn test_allow_load_pragma() {
    let dir = tempdir().unwrap();
    let source = "import sys\nsys.path.insert(0, '.')  # pragma: herald allow-load\n";
    let path = write_script(&dir, "setup_path.py", source);

    let script = load_definitions(&path).unwrap();
    let report = analyze(&script, &SetupContext::new(&path)).unwrap();
    assert!(report.define_only_safe);
}

#[test]
fn test_test_mode_tolerates_flag_scaffolding() {
    let dir = tempdir().unwrap();
    let source = "import builtins\nbuiltins.IS_TEST_MODE = True\n\ndef new_record(category):\n    return category\n";
    let path = write_script(&dir, "flagged.py", source);
    let script = load_definitions(&path).unwrap();

    let strict = analyze(&script, &SetupContext::new(&path)).unwrap();
    assert!(!strict.define_only_safe);
    assert_eq!(strict.load_side_effects[0].description, "process-wide state mutated on load");

    let relaxed = analyze(&script, &SetupContext::new(&path).with_test_mode(true)).unwrap();
    assert!(relaxed.define_only_safe);
}

#[test]
fn test_missing_expected_unit_does_not_abort_setup() {
    let dir = tempdir().unwrap();
    let path = write_script(&dir, "hero.py", GUARDED_SCRIPT);
    let context = SetupContext::new(&path).expect_units(["new_record", "remove_record"]);

    let script = load_definitions(&path).unwrap();
    let err = analyze(&script, &context).unwrap_err();
    assert!(matches!(err, HarnessError::AnalysisError { ref reason } if reason.contains("remove_record")));

    let harness = Harness::setup(context).unwrap();
    assert!(harness.report.is_none());
    assert_eq!(harness.script.units.len(), 2);
}

fn is_define_only_safe(dir: &tempfile::TempDir, name: &str, source: &str) -> bool {
    let path = write_script(dir, name, source);
    let script = load_definitions(&path).unwrap();
    analyze(&script, &SetupContext::new(&path))
        .unwrap()
        .define_only_safe
}

#[test]
fn test_decorator_call_runs_on_load() {
    let dir = tempdir().unwrap();
    let source = "@register(connect())\ndef f():\n    pass\n";
    assert!(!is_define_only_safe(&dir, "decorated.py", source));
}

#[test]
fn test_class_body_runs_on_load() {
    let dir = tempdir().unwrap();
    let source = "class A:\n    print('boom')\n";
    assert!(!is_define_only_safe(&dir, "class_body.py", source));
}

#[test]
fn test_default_argument_runs_on_load() {
    let dir = tempdir().unwrap();
    let source = "def f(x=launch()):\n    return x\n";
    assert!(!is_define_only_safe(&dir, "defaults.py", source));
}

#[test]
fn test_comprehension_runs_on_load() {
    let dir = tempdir().unwrap();
    let source = "DATA = [fetch(i) for i in range(3)]\n";
    assert!(!is_define_only_safe(&dir, "comprehension.py", source));
}

#[test]
fn test_fstring_runs_on_load() {
    let dir = tempdir().unwrap();
    let source = "X = f\"{boom()}\"\n";
    assert!(!is_define_only_safe(&dir, "fstring.py", source));
}

#[test]
fn test_main_guard_else_branch_runs_on_load() {
    let dir = tempdir().unwrap();
    let source = "if __name__ == '__main__':\n    pass\nelse:\n    boom()\n";
    let path = write_script(&dir, "guard_else.py", source);

    let script = load_definitions(&path).unwrap();
    let report = analyze(&script, &SetupContext::new(&path)).unwrap();
    assert!(report.has_main_guard);
    assert!(!report.define_only_safe);
    assert_eq!(report.load_side_effects[0].line, 1);
    assert_eq!(
        report.load_side_effects[0].description,
        "main guard else branch executed on load"
    );
}

#[test]
fn test_plain_class_and_property_stay_safe() {
    let dir = tempdir().unwrap();
    let source = "class Record:\n    LIMIT = 99\n\n    @property\n    def name(self):\n        return 'Pipeline Paladin'\n";
    assert!(is_define_only_safe(&dir, "plain.py", source));
}
