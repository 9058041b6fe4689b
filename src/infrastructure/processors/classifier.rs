// CommonJS sniffing.
//
// Purely lexical: the source is masked (see `scanner`) and a handful of
// regexes look for `require(`, CommonJS export assignments and ES module
// syntax. `require` hidden behind indirection (`const r = require; r('x')`)
// is not detected.

use super::scanner::{
    ends_token, find_matching_bracket, is_standalone, mask_source, read_string_literal,
    skip_whitespace,
};
use crate::core::models::Classification;
use once_cell::sync::Lazy;
use regex::Regex;

pub(super) static REQUIRE_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"require\s*\(").expect("valid require regex"));

static MODULE_EXPORTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"module\s*\.\s*exports\b").expect("valid module.exports regex"));

static MODULE_EXPORTS_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"module\s*\.\s*exports\s*=").expect("valid assignment regex"));

static EXPORTS_MEMBER_ASSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:module\s*\.\s*)?exports\s*\.\s*([\p{L}_$][\p{L}\p{N}_$]*)\s*=")
        .expect("valid exports member regex")
});

static EXPORTS_INDEX_ASSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:module\s*\.\s*)?exports\s*\[\s*['"`]"#).expect("valid exports index regex")
});

static DEFINE_PROPERTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"Object\s*\.\s*defineProperty\s*\(\s*(?:module\s*\.\s*)?exports\s*,\s*['"`]"#)
        .expect("valid defineProperty regex")
});

static ESM_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"import(?:\s+type\s|\s+[\p{L}_$][\p{L}\p{N}_$]*\s*(?:,|from\b)|\s*(?:\*|\{|['"])|\s*\.\s*meta\b)"#,
    )
    .expect("valid import regex")
});

static ESM_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s*(?:\{|\*|default\b|(?:async\s+)?function\b|let\b|const\b|var\b|class\b)")
        .expect("valid export regex")
});

/// Names that never become named ESM exports
const SKIPPED_EXPORT_NAMES: &[&str] = &["default", "__esModule"];

/// Raw lexical markers found in a source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModuleSignals {
    pub has_require: bool,
    pub has_exports: bool,
    pub has_esm: bool,
}

impl ModuleSignals {
    pub fn from_masked(masked: &str) -> Self {
        Self {
            has_require: REQUIRE_CALL
                .find_iter(masked)
                .any(|m| is_standalone(masked, m.start())),
            has_exports: has_commonjs_exports(masked),
            has_esm: ESM_IMPORT
                .find_iter(masked)
                .chain(ESM_EXPORT.find_iter(masked))
                .any(|m| is_standalone(masked, m.start())),
        }
    }

    pub fn classification(&self, source: &str, masked: &str) -> Classification {
        match (self.has_require, self.has_exports, self.has_esm) {
            (false, false, _) => Classification::NotCommonjs,
            (_, true, false) => Classification::PureCommonjs {
                exports: collect_export_names(source, masked),
            },
            (_, true, true) | (true, false, _) => Classification::MixedModule,
        }
    }
}

pub fn scan_signals(source: &str) -> ModuleSignals {
    ModuleSignals::from_masked(&mask_source(source))
}

/// Classifies `source`. Deterministic in the text alone.
pub fn classify(source: &str) -> Classification {
    let masked = mask_source(source);
    ModuleSignals::from_masked(&masked).classification(source, &masked)
}

/// Cheap pre-check: any CommonJS marker at all
pub fn maybe_commonjs_module(source: &str) -> bool {
    let signals = scan_signals(source);
    signals.has_require || signals.has_exports
}

/// CommonJS markers next to ES module syntax
pub fn maybe_mixed_module(source: &str) -> bool {
    let signals = scan_signals(source);
    signals.has_esm && (signals.has_require || signals.has_exports)
}

fn has_commonjs_exports(masked: &str) -> bool {
    MODULE_EXPORTS
        .find_iter(masked)
        .any(|m| is_standalone(masked, m.start()))
        || EXPORTS_MEMBER_ASSIGN
            .find_iter(masked)
            .any(|m| is_standalone(masked, m.start()) && is_assignment(masked, m.end()))
        || EXPORTS_INDEX_ASSIGN
            .find_iter(masked)
            .chain(DEFINE_PROPERTY.find_iter(masked))
            .any(|m| is_standalone(masked, m.start()))
}

/// `=` just matched at `end - 1` is a plain assignment, not `==`/`=>`.
fn is_assignment(masked: &str, end: usize) -> bool {
    !matches!(masked.as_bytes().get(end), Some(b'=') | Some(b'>'))
}

/// Statically named exports in first-appearance order, duplicates collapsed.
pub fn collect_export_names(source: &str, masked: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for caps in EXPORTS_MEMBER_ASSIGN.captures_iter(masked) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if is_standalone(masked, whole.start()) && is_assignment(masked, whole.end()) {
            found.push((whole.start(), name.as_str().to_string()));
        }
    }

    for m in EXPORTS_INDEX_ASSIGN.find_iter(masked) {
        if !is_standalone(masked, m.start()) {
            continue;
        }
        let Some(literal) = read_string_literal(source, masked, m.end() - 1) else {
            continue;
        };
        let close = skip_whitespace(masked, literal.end);
        if masked.as_bytes().get(close) != Some(&b']') {
            continue;
        }
        let eq = skip_whitespace(masked, close + 1);
        if masked.as_bytes().get(eq) == Some(&b'=') && is_assignment(masked, eq + 1) {
            found.push((m.start(), literal.value));
        }
    }

    for m in DEFINE_PROPERTY.find_iter(masked) {
        if !is_standalone(masked, m.start()) {
            continue;
        }
        if let Some(literal) = read_string_literal(source, masked, m.end() - 1) {
            found.push((m.start(), literal.value));
        }
    }

    for m in MODULE_EXPORTS_ASSIGN.find_iter(masked) {
        if !is_standalone(masked, m.start()) || !is_assignment(masked, m.end()) {
            continue;
        }
        let open = skip_whitespace(masked, m.end());
        if masked.as_bytes().get(open) != Some(&b'{') {
            continue;
        }
        if let Some(close) = find_matching_bracket(masked, open) {
            found.extend(object_literal_keys(source, masked, open, close));
        }
    }

    found.sort_by_key(|(pos, _)| *pos);

    let mut names: Vec<String> = Vec::new();
    for (_, name) in found {
        if is_identifier(&name)
            && !SKIPPED_EXPORT_NAMES.contains(&name.as_str())
            && !names.contains(&name)
        {
            names.push(name);
        }
    }
    names
}

/// Statically named keys of the object literal spanning `open..=close`.
fn object_literal_keys(source: &str, masked: &str, open: usize, close: usize) -> Vec<(usize, String)> {
    let mut keys = Vec::new();
    let mut pos = open + 1;

    while pos < close {
        let start = skip_whitespace(masked, pos);
        let end = property_end(masked, start, close);
        if let Some(key) = property_key(source, masked, start, end) {
            keys.push((start, key));
        }
        pos = end + 1;
    }

    keys
}

/// Next top-level `,` of the property starting at `start`, or `close`.
fn property_end(masked: &str, start: usize, close: usize) -> usize {
    let bytes = masked.as_bytes();
    let mut depth = 0usize;
    let mut pos = start;

    while pos < close {
        match bytes[pos] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => return pos,
            _ => {}
        }
        pos += 1;
    }

    close
}

fn property_key(source: &str, masked: &str, start: usize, end: usize) -> Option<String> {
    let bytes = masked.as_bytes();
    if start >= end || masked[start..end].starts_with("...") || bytes[start] == b'[' {
        return None;
    }

    if matches!(bytes[start], b'\'' | b'"') {
        let literal = read_string_literal(source, masked, start)?;
        let after = skip_whitespace(masked, literal.end);
        return matches!(bytes.get(after), Some(b':') | Some(b'(')).then_some(literal.value);
    }

    let mut cursor = start;
    if bytes[cursor] == b'*' {
        cursor = skip_whitespace(masked, cursor + 1);
    }
    let (mut key, mut after) = read_word(masked, cursor)?;

    // `get x() {}`, `set x(v) {}`, `async x() {}`, `async *x() {}`
    if matches!(key.as_str(), "get" | "set" | "async") {
        let mut next = skip_whitespace(masked, after);
        if bytes.get(next) == Some(&b'*') {
            next = skip_whitespace(masked, next + 1);
        }
        if let Some((inner, inner_after)) = read_word(masked, next).filter(|_| next < end) {
            key = inner;
            after = inner_after;
        }
    }

    let after = skip_whitespace(masked, after);
    if after >= end || matches!(bytes[after], b':' | b'(') {
        Some(key)
    } else {
        None
    }
}

fn read_word(masked: &str, start: usize) -> Option<(String, usize)> {
    let mut end = start;
    while end < masked.len() && !ends_token(masked, end) {
        end += 1;
    }
    (end > start).then(|| (masked[start..end].to_string(), end))
}

/// ASCII/Unicode identifier name check used for export names
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first == '$' || first.is_alphabetic() => {
            chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric())
        }
        _ => false,
    }
}
