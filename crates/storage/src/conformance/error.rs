use super::{doc, TestResult};
use crate::{content_hash, DocumentStore, Expected, StorageError};

pub(super) fn run_error_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    vec![
        TestResult::from_result("error", "read_nonexistent", read_nonexistent(factory)),
        TestResult::from_result(
            "error",
            "read_optional_nonexistent_is_none",
            read_optional_nonexistent(factory),
        ),
        TestResult::from_result("error", "escape_is_rejected", escape_rejected(factory)),
        TestResult::from_result(
            "error",
            "hash_against_missing_document_conflicts",
            hash_against_missing(factory),
        ),
        TestResult::from_result(
            "error",
            "conflict_carries_expected_and_actual",
            conflict_fields(factory),
        ),
    ]
}

// ── 1. NotFound ─────────────────────────────────────────────────────────────

fn read_nonexistent<S: DocumentStore, F: Fn() -> S>(factory: &F) -> Result<(), String> {
    let s = factory();
    match s.read("missing.oct.md") {
        Err(StorageError::NotFound { path }) if path == "missing.oct.md" => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

fn read_optional_nonexistent<S: DocumentStore, F: Fn() -> S>(factory: &F) -> Result<(), String> {
    let s = factory();
    match s.read_optional("missing.oct.md") {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None), got {:?}", other)),
    }
}

// ── 2. OutsideRoot ──────────────────────────────────────────────────────────

fn escape_rejected<S: DocumentStore, F: Fn() -> S>(factory: &F) -> Result<(), String> {
    let s = factory();
    for path in ["../escape.oct.md", "/abs.oct.md", "a/../../b.oct.md"] {
        match s.write(path, &doc("A", ""), &Expected::Any) {
            Err(StorageError::OutsideRoot { .. }) => {}
            other => return Err(format!("{path}: expected OutsideRoot, got {:?}", other)),
        }
        match s.read(path) {
            Err(StorageError::OutsideRoot { .. }) => {}
            other => return Err(format!("{path}: expected OutsideRoot, got {:?}", other)),
        }
    }
    Ok(())
}

// ── 3. ConcurrentConflict details ───────────────────────────────────────────

fn hash_against_missing<S: DocumentStore, F: Fn() -> S>(factory: &F) -> Result<(), String> {
    let s = factory();
    match s.write("new.oct.md", &doc("A", ""), &Expected::Hash(content_hash("old"))) {
        Err(StorageError::ConcurrentConflict { actual: None, .. }) => Ok(()),
        other => Err(format!("expected ConcurrentConflict with no actual, got {:?}", other)),
    }
}

fn conflict_fields<S: DocumentStore, F: Fn() -> S>(factory: &F) -> Result<(), String> {
    let s = factory();
    let stored = s
        .write("a.oct.md", &doc("A", ""), &Expected::Any)
        .map_err(|e| format!("write: {e}"))?;
    let stale = content_hash("stale");
    match s.write("a.oct.md", &doc("B", ""), &Expected::Hash(stale.clone())) {
        Err(StorageError::ConcurrentConflict {
            path,
            expected,
            actual,
        }) => {
            if path != "a.oct.md" {
                return Err(format!("expected path \"a.oct.md\", got \"{}\"", path));
            }
            if expected != stale {
                return Err(format!("expected hash {stale}, got {expected}"));
            }
            if actual.as_deref() != Some(stored.hash.as_str()) {
                return Err(format!("expected actual {}, got {:?}", stored.hash, actual));
            }
            Ok(())
        }
        other => Err(format!("expected ConcurrentConflict, got {:?}", other)),
    }
}
