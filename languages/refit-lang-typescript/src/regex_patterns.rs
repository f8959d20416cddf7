//! Import patterns used when a file does not parse
//!
//! Group 2 of every pattern is the specifier without its quotes.

use regex::Regex;
use std::sync::LazyLock;

/// `import x from '...'`, `import { a } from '...'`, `import type T from '...'`, `import '...'`
pub static ES6_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimport\s+(?:type\s+)?(?:[\w$*{}\s,]+?\s+from\s*)?(['"])([^'"\n]+)['"]"#)
        .unwrap()
});

/// `export * from '...'`, `export * as ns from '...'`, `export { a } from '...'`
pub static REEXPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\bexport\s+(?:type\s+)?(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s*(['"])([^'"\n]+)['"]"#,
    )
    .unwrap()
});

/// `require('...')`
pub static REQUIRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\brequire\s*\(\s*(['"])([^'"\n]+)['"]\s*\)"#).unwrap()
});

/// `import('...')`
pub static DYNAMIC_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimport\s*\(\s*(['"])([^'"\n]+)['"]\s*\)"#).unwrap()
});
