//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async code in the listener crates MUST NOT block the runtime.
//! **Required**: Use `tokio::fs`, `tokio::net`, `tokio::time::sleep` and the
//! async `reqwest` client inside `async fn`.
//!
//! Synchronous helpers that run before the runtime starts (config loading)
//! may use `std::fs`.

use architectural_enforcement::production_lines;

const FORBIDDEN_IN_ASYNC: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::TcpStream", "Blocking network I/O"),
    ("std::net::TcpListener", "Blocking network I/O"),
    ("std::thread::sleep", "Blocking sleep"),
    ("std::io::stdin()", "Blocking stdin"),
];

const FORBIDDEN_ANYWHERE: &[(&str, &str)] = &[
    ("reqwest::blocking", "Blocking HTTP client"),
    ("block_on(", "Nested runtime"),
];

#[test]
fn test_no_blocking_io_in_async_code() {
    let mut violations = Vec::new();

    for line in production_lines() {
        for (pattern, what) in FORBIDDEN_ANYWHERE {
            if line.code.contains(pattern) {
                violations.push(line.describe(what));
            }
        }
        if line.in_async_fn {
            for (pattern, what) in FORBIDDEN_IN_ASYNC {
                if line.code.contains(pattern) {
                    violations.push(line.describe(what));
                }
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ Blocking calls found in async production code:");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Use tokio::fs, tokio::net and tokio::time::sleep instead");
        panic!(
            "\nFound {} blocking I/O violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_production_sources_found() {
    let lines = production_lines();
    assert!(
        lines.iter().any(|l| l.path.ends_with("gateway/handler.rs")),
        "gateway sources not scanned; is the workspace layout intact?"
    );
    assert!(
        lines.iter().any(|l| l.path.ends_with("main.rs")),
        "daemon sources not scanned"
    );
}
