//! Hygiene: enforces coding standards at test time
//!
//! Scans the canvas crate's production sources for patterns the engine must
//! not contain. Each pattern has a budget (zero). The engine is synchronous
//! and host-agnostic, so besides panics and silent discards it must not read
//! the clock, print, or spawn threads: time is injected and logging goes
//! through `tracing`.

use std::fs;
use std::path::Path;

struct Budget {
    pattern: &'static str,
    max: usize,
    why: &'static str,
}

const BUDGETS: &[Budget] = &[
    // Panics.
    Budget { pattern: ".unwrap()", max: 0, why: "propagate or handle the None/Err" },
    Budget { pattern: ".expect(", max: 0, why: "propagate or handle the None/Err" },
    Budget { pattern: "panic!(", max: 0, why: "the engine never aborts the host" },
    Budget { pattern: "unreachable!(", max: 0, why: "model the state so it can't happen" },
    Budget { pattern: "todo!(", max: 0, why: "no stubs in shipped code" },
    Budget { pattern: "unimplemented!(", max: 0, why: "no stubs in shipped code" },
    // Silent loss.
    Budget { pattern: "let _ =", max: 0, why: "inspect the value or return it" },
    Budget { pattern: ".ok()", max: 0, why: "inspect the error instead of dropping it" },
    // Host boundary.
    Budget { pattern: "Instant::now", max: 0, why: "time is passed in as now_ms" },
    Budget { pattern: "SystemTime::now", max: 0, why: "time is passed in as now_ms" },
    Budget { pattern: "println!(", max: 0, why: "log through tracing" },
    Budget { pattern: "eprintln!(", max: 0, why: "log through tracing" },
    Budget { pattern: "thread::spawn", max: 0, why: "handlers run to completion on the caller" },
    // Style.
    Budget { pattern: "#[allow(dead_code)]", max: 0, why: "delete unused code" },
];

struct SourceFile {
    path: String,
    content: String,
}

/// Production `.rs` files under `src/`, excluding `_test.rs` siblings.
fn source_files() -> Vec<SourceFile> {
    let mut files = Vec::new();
    collect_rs_files(Path::new("src"), &mut files);
    files
}

fn collect_rs_files(dir: &Path, out: &mut Vec<SourceFile>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rs_files(&path, out);
        } else if path.extension().is_some_and(|e| e == "rs") {
            let path_str = path.to_string_lossy().to_string();
            if path_str.ends_with("_test.rs") {
                continue;
            }
            if let Ok(content) = fs::read_to_string(&path) {
                out.push(SourceFile { path: path_str, content });
            }
        }
    }
}

/// Per-file counts of lines containing `pattern`, skipping `//` comment lines.
fn hits(files: &[SourceFile], pattern: &str) -> Vec<(String, usize)> {
    files
        .iter()
        .filter_map(|file| {
            let count = file
                .content
                .lines()
                .filter(|line| !line.trim_start().starts_with("//"))
                .filter(|line| line.contains(pattern))
                .count();
            (count > 0).then(|| (file.path.clone(), count))
        })
        .collect()
}

fn check(pattern: &str) {
    let Some(budget) = BUDGETS.iter().find(|b| b.pattern == pattern) else {
        panic!("no budget registered for {pattern}");
    };
    let files = source_files();
    assert!(!files.is_empty(), "no sources found; run from the canvas crate root");
    let found = hits(&files, budget.pattern);
    let count: usize = found.iter().map(|(_, c)| c).sum();
    let listing = found
        .iter()
        .map(|(path, c)| format!("  {path}: {c}"))
        .collect::<Vec<_>>()
        .join("\n");
    assert!(
        count <= budget.max,
        "{} budget exceeded: found {count}, max {} ({}).\n{listing}",
        budget.pattern,
        budget.max,
        budget.why
    );
}

#[test]
fn unwrap_budget() {
    check(".unwrap()");
}

#[test]
fn expect_budget() {
    check(".expect(");
}

#[test]
fn panic_budget() {
    check("panic!(");
}

#[test]
fn unreachable_budget() {
    check("unreachable!(");
}

#[test]
fn todo_budget() {
    check("todo!(");
}

#[test]
fn unimplemented_budget() {
    check("unimplemented!(");
}

#[test]
fn silent_discard_budget() {
    check("let _ =");
}

#[test]
fn dot_ok_budget() {
    check(".ok()");
}

#[test]
fn no_wall_clock() {
    check("Instant::now");
    check("SystemTime::now");
}

#[test]
fn no_stdout_logging() {
    check("println!(");
    check("eprintln!(");
}

#[test]
fn no_thread_spawn() {
    check("thread::spawn");
}

#[test]
fn allow_dead_code_budget() {
    check("#[allow(dead_code)]");
}

