use std::sync::{Arc, Barrier};
use std::thread;

use super::{doc, TestResult};
use crate::{DocumentStore, Expected, StorageError};

/// Number of concurrent writers in each test.
const N: usize = 10;

pub(super) fn run_concurrent_tests<S, F>(factory: &F) -> Vec<TestResult>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_writes_same_hash_exactly_one_wins",
            same_hash_exactly_one_wins(factory),
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_creates_exactly_one_wins",
            creates_exactly_one_wins(factory),
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_writes_different_paths_all_succeed",
            different_paths_all_succeed(factory),
        ),
    ]
}

/// Spawn N threads released together by a barrier; each writes `content(i)`
/// to `path(i)` under `expected`. Returns (winners, losers, final contents).
fn race<S, P, C>(store: Arc<S>, expected: Expected, path: P, content: C) -> Result<(usize, usize), String>
where
    S: DocumentStore,
    P: Fn(usize) -> String + Send + Sync + 'static,
    C: Fn(usize) -> String + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(N));
    let path = Arc::new(path);
    let content = Arc::new(content);
    let handles: Vec<_> = (0..N)
        .map(|i| {
            let (s, b, p, c, e) = (
                store.clone(),
                barrier.clone(),
                path.clone(),
                content.clone(),
                expected.clone(),
            );
            thread::spawn(move || {
                b.wait();
                match s.write(&p(i), &c(i), &e) {
                    Ok(_) => Ok(true),
                    Err(StorageError::ConcurrentConflict { .. }) => Ok(false),
                    Err(other) => Err(other),
                }
            })
        })
        .collect();

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .join()
            .map_err(|_| "writer thread panicked".to_string())?
            .map_err(|e| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }
    Ok((winners, losers))
}

// ── Stale hash race: exactly one wins ───────────────────────────────────────

/// N writers all present the hash of the same original document. Exactly one
/// replaces it; the rest get ConcurrentConflict and the file holds exactly
/// the winner's content.
fn same_hash_exactly_one_wins<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let store = Arc::new(factory());
    let base = store
        .write("shared.oct.md", &doc("SHARED", "N::0\n"), &Expected::Absent)
        .map_err(|e| format!("seed: {e}"))?;

    let (winners, losers) = race(
        store.clone(),
        Expected::Hash(base.hash),
        |_| "shared.oct.md".to_string(),
        |i| doc("SHARED", &format!("N::{}\n", i + 1)),
    )?;
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }

    let final_doc = store.read("shared.oct.md").map_err(|e| format!("read: {e}"))?;
    let intact = (1..=N).any(|i| final_doc.content == doc("SHARED", &format!("N::{i}\n")));
    if !intact {
        return Err(format!("final content corrupted: {:?}", final_doc.content));
    }
    Ok(())
}

// ── Create race: exactly one wins ───────────────────────────────────────────

fn creates_exactly_one_wins<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let store = Arc::new(factory());
    let (winners, losers) = race(
        store,
        Expected::Absent,
        |_| "fresh.oct.md".to_string(),
        |i| doc(&format!("D{i}"), ""),
    )?;
    if winners != 1 || losers != N - 1 {
        return Err(format!("expected 1 winner and {} losers, got {winners}/{losers}", N - 1));
    }
    Ok(())
}

// ── No false conflicts ──────────────────────────────────────────────────────

fn different_paths_all_succeed<S, F>(factory: &F) -> Result<(), String>
where
    S: DocumentStore,
    F: Fn() -> S,
{
    let store = Arc::new(factory());
    let (winners, _) = race(
        store.clone(),
        Expected::Absent,
        |i| format!("docs/d{i}.oct.md"),
        |i| doc(&format!("D{i}"), ""),
    )?;
    if winners != N {
        return Err(format!("expected {N} successful writes, got {winners}"));
    }
    for i in 0..N {
        store
            .read(&format!("docs/d{i}.oct.md"))
            .map_err(|e| format!("read d{i}: {e}"))?;
    }
    Ok(())
}
