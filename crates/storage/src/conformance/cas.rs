use super::{doc, TestResult};
use crate::{content_hash, DocumentStore, Expected, StorageError};

pub(super) fn run_cas_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    vec![
        TestResult::from_result(
            "cas",
            "create_then_read_returns_same_content_and_hash",
            create_then_read(factory),
        ),
        TestResult::from_result(
            "cas",
            "matching_hash_replaces_content",
            matching_hash_replaces(factory),
        ),
        TestResult::from_result("cas", "stale_hash_is_rejected", stale_hash_rejected(factory)),
        TestResult::from_result(
            "cas",
            "absent_precondition_refuses_existing",
            absent_refuses_existing(factory),
        ),
        TestResult::from_result("cas", "any_overwrites", any_overwrites(factory)),
        TestResult::from_result(
            "cas",
            "equivalent_paths_address_one_document",
            equivalent_paths(factory),
        ),
    ]
}

// ── 1. create then read ─────────────────────────────────────────────────────

fn create_then_read<S: DocumentStore, F: Fn() -> S>(factory: &F) -> Result<(), String> {
    let s = factory();
    let body = doc("A", "K::1\n");
    let written = s
        .write("a.oct.md", &body, &Expected::Absent)
        .map_err(|e| format!("write: {e}"))?;
    let read = s.read("a.oct.md").map_err(|e| format!("read: {e}"))?;
    if read.content != body {
        return Err(format!("content mismatch: {:?}", read.content));
    }
    if read.hash != content_hash(&body) || written.hash != read.hash {
        return Err(format!("hash mismatch: {} vs {}", written.hash, read.hash));
    }
    Ok(())
}

// ── 2. hash-guarded replace ─────────────────────────────────────────────────

fn matching_hash_replaces<S: DocumentStore, F: Fn() -> S>(factory: &F) -> Result<(), String> {
    let s = factory();
    let first = s
        .write("a.oct.md", &doc("A", "K::1\n"), &Expected::Absent)
        .map_err(|e| format!("write 1: {e}"))?;
    let second = s
        .write("a.oct.md", &doc("A", "K::2\n"), &Expected::Hash(first.hash))
        .map_err(|e| format!("write 2: {e}"))?;
    let read = s.read("a.oct.md").map_err(|e| format!("read: {e}"))?;
    if read.hash != second.hash {
        return Err("stored hash does not match the returned one".into());
    }
    Ok(())
}

// ── 3. stale hash ───────────────────────────────────────────────────────────

fn stale_hash_rejected<S: DocumentStore, F: Fn() -> S>(factory: &F) -> Result<(), String> {
    let s = factory();
    let first = s
        .write("a.oct.md", &doc("A", "K::1\n"), &Expected::Absent)
        .map_err(|e| format!("write 1: {e}"))?;
    s.write("a.oct.md", &doc("A", "K::2\n"), &Expected::Hash(first.hash.clone()))
        .map_err(|e| format!("write 2: {e}"))?;
    match s.write("a.oct.md", &doc("A", "K::3\n"), &Expected::Hash(first.hash)) {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        other => return Err(format!("expected ConcurrentConflict, got {:?}", other)),
    }
    let read = s.read("a.oct.md").map_err(|e| format!("read: {e}"))?;
    if read.content != doc("A", "K::2\n") {
        return Err(format!("rejected write changed content: {:?}", read.content));
    }
    Ok(())
}

// ── 4. create-only ──────────────────────────────────────────────────────────

fn absent_refuses_existing<S: DocumentStore, F: Fn() -> S>(factory: &F) -> Result<(), String> {
    let s = factory();
    s.write("a.oct.md", &doc("A", ""), &Expected::Absent)
        .map_err(|e| format!("write 1: {e}"))?;
    match s.write("a.oct.md", &doc("B", ""), &Expected::Absent) {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        other => Err(format!("expected ConcurrentConflict, got {:?}", other)),
    }
}

// ── 5. unconditional overwrite ──────────────────────────────────────────────

fn any_overwrites<S: DocumentStore, F: Fn() -> S>(factory: &F) -> Result<(), String> {
    let s = factory();
    s.write("a.oct.md", &doc("A", ""), &Expected::Any)
        .map_err(|e| format!("write 1: {e}"))?;
    s.write("a.oct.md", &doc("B", ""), &Expected::Any)
        .map_err(|e| format!("write 2: {e}"))?;
    let read = s.read("a.oct.md").map_err(|e| format!("read: {e}"))?;
    if read.content != doc("B", "") {
        return Err(format!("overwrite lost: {:?}", read.content));
    }
    Ok(())
}

// ── 6. path normalization ───────────────────────────────────────────────────

fn equivalent_paths<S: DocumentStore, F: Fn() -> S>(factory: &F) -> Result<(), String> {
    let s = factory();
    s.write("dir/./a.oct.md", &doc("A", ""), &Expected::Absent)
        .map_err(|e| format!("write: {e}"))?;
    let read = s
        .read("dir/sub/../a.oct.md")
        .map_err(|e| format!("read: {e}"))?;
    if read.path != "dir/a.oct.md" {
        return Err(format!("expected normalized path, got {}", read.path));
    }
    Ok(())
}
