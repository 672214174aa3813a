//! Heuristic content-to-language tagging.
//!
//! Advisory only: the result is a display hint recorded at creation time
//! and never re-derived. A filename extension wins outright; otherwise each
//! candidate language is scored by how many of its structural signatures
//! appear in the content, and the best candidate is returned only when at
//! least two independent signatures matched.

use lazy_static::lazy_static;
use regex::Regex;

/// Minimum number of matched signatures before a candidate beats `"text"`.
const CONFIDENCE_THRESHOLD: usize = 2;

pub const FALLBACK_LANGUAGE: &str = "text";

fn extension_language(extension: &str) -> Option<&'static str> {
    Some(match extension {
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" => "python",
        "java" => "java",
        "cpp" => "cpp",
        "c" => "c",
        "cs" => "csharp",
        "php" => "php",
        "rb" => "ruby",
        "go" => "go",
        "rs" => "rust",
        "swift" => "swift",
        "kt" => "kotlin",
        "scala" => "scala",
        "html" => "html",
        "css" => "css",
        "scss" => "scss",
        "sass" => "sass",
        "less" => "less",
        "json" => "json",
        "xml" => "xml",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "ini" => "ini",
        "sh" | "bash" | "zsh" => "bash",
        "sql" => "sql",
        "md" => "markdown",
        "txt" => "text",
        _ => return None,
    })
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).expect("static signature pattern"))
        .collect()
}

lazy_static! {
    /// Candidate signatures in registration order; on a tied score the
    /// first-registered language wins.
    static ref SIGNATURES: Vec<(&'static str, Vec<Regex>)> = vec![
        (
            "javascript",
            compile(&[
                r"function\s+\w+\s*\(",
                r"const\s+\w+\s*=",
                r"let\s+\w+\s*=",
                r"var\s+\w+\s*=",
                r"console\.log",
                r"import\s+.*\s+from",
                r"export\s+default",
            ]),
        ),
        (
            "typescript",
            compile(&[
                r"interface\s+\w+",
                r"type\s+\w+\s*=",
                r":\s*\w+\[\]",
                r":\s*Promise<",
            ]),
        ),
        (
            "python",
            compile(&[
                r"def\s+\w+\s*\(",
                r"import\s+\w+",
                r"from\s+\w+\s+import",
                r"print\s*\(",
                r#"if\s+__name__\s*==\s*['"]__main__['"]"#,
                // Weak signature on its own, but lets short snippets like a
                // bare print('...') call clear the confidence bar.
                r"'[^']*'",
            ]),
        ),
        (
            "java",
            compile(&[
                r"public\s+class",
                r"public\s+static\s+void\s+main",
                r"System\.out\.println",
                r"import\s+java\.",
            ]),
        ),
        (
            "cpp",
            compile(&[r"#include\s*<", r"std::", r"cout\s*<<", r"cin\s*>>"]),
        ),
        (
            "c",
            compile(&[
                r"#include\s*<",
                r"printf\s*\(",
                r"scanf\s*\(",
                r"int\s+main\s*\(",
            ]),
        ),
        (
            "php",
            compile(&[r"<\?php", r"echo\s+", r"function\s+\w+\s*\(", r"\$\w+"]),
        ),
        (
            "html",
            compile(&[r"<!DOCTYPE\s+html>", r"<html", r"<head", r"<body", r"<div"]),
        ),
        (
            "css",
            compile(&[r"\{[^}]*\}", r":\s*[^;]+;", r"@media", r"@keyframes"]),
        ),
        (
            "sql",
            compile(&[
                r"(?i)SELECT\s+.+FROM",
                r"(?i)INSERT\s+INTO",
                r"(?i)UPDATE\s+.+SET",
                r"(?i)DELETE\s+FROM",
                r"(?i)CREATE\s+TABLE",
            ]),
        ),
        (
            "bash",
            compile(&[
                r"#!",
                r"echo\s+",
                r"if\s+\[",
                r"for\s+\w+\s+in",
                r"while\s+\[",
            ]),
        ),
        (
            "markdown",
            compile(&[
                r"(?m)^#\s+",
                r"(?m)^##\s+",
                r"(?m)^###\s+",
                r"\[.*\]\(.*\)",
                r"(?m)^\*\s+",
            ]),
        ),
    ];
}

/// Tags content with a language hint. Pure function of its inputs.
#[must_use]
pub fn detect(content: &str, filename: Option<&str>) -> &'static str {
    if let Some(name) = filename {
        let extension = name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        if let Some(tag) = extension_language(&extension) {
            return tag;
        }
    }

    let mut best = FALLBACK_LANGUAGE;
    let mut best_score = 0;
    for (language, signatures) in SIGNATURES.iter() {
        let score = signatures
            .iter()
            .filter(|signature| signature.is_match(content))
            .count();
        if score > best_score {
            best_score = score;
            best = language;
        }
    }

    if best_score >= CONFIDENCE_THRESHOLD {
        best
    } else {
        FALLBACK_LANGUAGE
    }
}
