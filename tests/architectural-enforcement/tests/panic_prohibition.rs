//! Integration Test: Panic Prohibition
//!
//! **Policy**: Production code propagates errors with `?` and `Result`.
//! A provider hiccup must end one chat turn, never the daemon.
//!
//! `unwrap_or`, `unwrap_or_default` and `unwrap_or_else` are fine; bare
//! `unwrap()`, `expect(..)` and `panic!` are not. Test modules are exempt.

use architectural_enforcement::production_lines;

const FORBIDDEN: &[(&str, &str)] = &[
    (".unwrap()", "unwrap() in production code"),
    (".expect(", "expect() in production code"),
    ("panic!(", "panic! in production code"),
    ("unimplemented!(", "unimplemented! in production code"),
    ("todo!(", "todo! in production code"),
];

#[test]
fn test_no_panicking_shortcuts_in_production_code() {
    let violations: Vec<String> = production_lines()
        .iter()
        .flat_map(|line| {
            FORBIDDEN
                .iter()
                .filter(|(pattern, _)| line.code.contains(pattern))
                .map(|(_, what)| line.describe(what))
                .collect::<Vec<_>>()
        })
        .collect();

    if !violations.is_empty() {
        eprintln!("\n❌ Panicking calls found in production code:");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        panic!(
            "\nFound {} panic violation(s) in production code.",
            violations.len()
        );
    }
}
