// CommonJS → ESM rewriting.
//
// Pure CommonJS bodies are wrapped in a function and run against a synthetic
// `module`/`exports`/`require`; mixed modules are patched in place. In both
// cases static `require('x')` specifiers become hoisted namespace imports and
// the body keeps its original line count, so line mappings are exact.

use super::classifier::{ModuleSignals, REQUIRE_CALL};
use super::scanner::{
    find_matching_bracket, is_standalone, mask_source, read_string_literal, skip_whitespace,
    try_block_ranges,
};
use crate::core::interfaces::{SyntaxGoal, SyntaxValidator};
use crate::core::models::{Classification, RewriteOptions, RewriteOutput, SourceMapMode};
use crate::infrastructure::syntax::OxcSyntaxValidator;
use crate::utils::{Result, SourceMap, SourceMapGenerator};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

static DECLARES_MODULE_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:var|let|const|function|class)\s+(?:module|exports)\b")
        .expect("valid declaration regex")
});

static ES_DEFAULT_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s+default\b|export\s*\{[^}]*\bdefault\b").expect("valid default regex")
});

const DEFAULT_SOURCE_NAME: &str = "<stdin>";

const INTEROP_HELPER: &str = "function __cjs_default(ns) { return ns && typeof ns === 'object' && 'default' in ns ? ns.default : ns; }";

const REQUIRE_HELPER: &str = "function __cjs_require(specifier) { if (Object.prototype.hasOwnProperty.call(__cjs_modules, specifier)) return __cjs_default(__cjs_modules[specifier]); if (typeof require === 'function') return require(specifier); throw new Error(\"Cannot find module '\" + specifier + \"'\"); }";

const DYNAMIC_REQUIRE_HELPER: &str = "var __cjs_dynamic_cache = new Map(); function __cjs_dynamic_require(specifier) { if (!__cjs_dynamic_cache.has(specifier)) __cjs_dynamic_cache.set(specifier, import(specifier).then(__cjs_default)); return __cjs_dynamic_cache.get(specifier); }";

/// Words that cannot be used as `export const <name>` bindings
const RESERVED_WORDS: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let", "new",
    "null", "package", "private", "protected", "public", "return", "static", "super", "switch",
    "this", "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Module-scope names the generated prologue declares or reads at runtime
const PROLOGUE_GLOBALS: &[&str] = &["require", "Object", "Error"];

/// Whether `name` must be exported through a `__cjs_export_N` alias rather
/// than its own `export const` binding.
fn needs_export_alias(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
        || PROLOGUE_GLOBALS.contains(&name)
        || name.starts_with("__cjs_")
}

/// A `require(…)` call site
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequireCall {
    /// Offset of `require`
    start: usize,
    /// Offset just past `require`
    callee_end: usize,
    /// Offset just past the closing parenthesis
    end: usize,
    /// Set when the only argument is a plain string literal
    specifier: Option<String>,
    in_try: bool,
}

/// Byte range of the original text replaced during the rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

/// Generated position → original position, lines relative to the body, UTF-16 columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Anchor {
    generated: (u32, u32),
    original: (u32, u32),
}

/// Hoisted `import * as __cjs_import_N` bindings in first-appearance order
#[derive(Debug, Default)]
struct HoistedImports {
    specifiers: Vec<String>,
    index: HashMap<String, usize>,
}

impl HoistedImports {
    fn binding(&mut self, specifier: &str) -> String {
        let next = self.specifiers.len();
        let index = *self.index.entry(specifier.to_string()).or_insert_with(|| {
            self.specifiers.push(specifier.to_string());
            next
        });
        format!("__cjs_import_{}", index)
    }

    fn import_lines(&self) -> Vec<String> {
        self.specifiers
            .iter()
            .enumerate()
            .map(|(i, specifier)| {
                format!("import * as __cjs_import_{} from {};", i, js_string(specifier))
            })
            .collect()
    }
}

pub struct ModuleRewriter {
    options: RewriteOptions,
    validator: Arc<dyn SyntaxValidator>,
}

impl ModuleRewriter {
    pub fn new(options: RewriteOptions) -> Self {
        Self {
            options,
            validator: Arc::new(OxcSyntaxValidator),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn SyntaxValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Rewrites `source` according to `classification`. `NotCommonjs` input
    /// comes back untouched. The source is parsed first; a syntax error aborts
    /// the rewrite with a located `Parse` error.
    pub fn rewrite(&self, source: &str, classification: &Classification) -> Result<RewriteOutput> {
        match classification {
            Classification::NotCommonjs => Ok(RewriteOutput {
                code: source.to_string(),
                map: None,
                specifiers: Vec::new(),
            }),
            Classification::PureCommonjs { exports } => self.rewrite_commonjs(source, exports),
            Classification::MixedModule => {
                self.validator
                    .validate(source, self.options.source.as_deref(), SyntaxGoal::Module)?;
                self.rewrite_mixed(source)
            }
        }
    }

    fn rewrite_commonjs(&self, source: &str, exports: &[String]) -> Result<RewriteOutput> {
        // Same byte offsets as `source`; only a hashbang is neutralised
        let (body, anchors) = apply_edits(source, &hashbang_edit(source));
        self.validator
            .validate(&body, self.options.source.as_deref(), SyntaxGoal::FunctionBody)?;

        let masked = mask_source(source);
        let mut imports = HoistedImports::default();

        for call in find_require_calls(source, &masked) {
            if let Some(specifier) = self.hoistable(&call) {
                imports.binding(specifier);
            }
        }

        let mut header = imports.import_lines();
        header.push(INTEROP_HELPER.to_string());
        header.push(format!(
            "var __cjs_modules = {{ {} }};",
            imports
                .specifiers
                .iter()
                .enumerate()
                .map(|(i, specifier)| format!("{}: __cjs_import_{}", js_string(specifier), i))
                .collect::<Vec<_>>()
                .join(", ")
        ));
        header.push(REQUIRE_HELPER.to_string());
        header.push("var __cjs_module = { exports: {} };".to_string());
        header.push("(function (module, exports, require) {".to_string());

        let mut footer = vec![
            "}).call(__cjs_module.exports, __cjs_module, __cjs_module.exports, __cjs_require);"
                .to_string(),
            "var __cjs_exports = __cjs_module.exports;".to_string(),
        ];
        for (i, name) in exports.iter().enumerate() {
            if needs_export_alias(name) {
                footer.push(format!(
                    "const __cjs_export_{i} = __cjs_exports[{}]; export {{ __cjs_export_{i} as {} }};",
                    js_string(name),
                    name
                ));
            } else {
                footer.push(format!("export const {0} = __cjs_exports.{0};", name));
            }
        }
        footer.push("export default __cjs_exports;".to_string());

        self.assemble(source, header, body, anchors, footer, imports.specifiers)
    }

    fn rewrite_mixed(&self, source: &str) -> Result<RewriteOutput> {
        let masked = mask_source(source);
        let signals = ModuleSignals::from_masked(&masked);
        let mut imports = HoistedImports::default();
        let mut edits = hashbang_edit(source);
        let mut dynamic = false;

        for call in find_require_calls(source, &masked) {
            if let Some(specifier) = self.hoistable(&call) {
                let binding = imports.binding(specifier);
                edits.push(Edit {
                    start: call.start,
                    end: call.end,
                    replacement: format!("__cjs_default({})", binding),
                });
            } else if call.specifier.is_none() && !(self.options.ignore_try_catch && call.in_try) {
                dynamic = true;
                edits.push(Edit {
                    start: call.start,
                    end: call.callee_end,
                    replacement: "__cjs_dynamic_require".to_string(),
                });
            }
        }
        edits.sort_by_key(|edit| edit.start);

        let needs_shim = signals.has_exports
            && !DECLARES_MODULE_BINDING
                .find_iter(&masked)
                .any(|m| is_standalone(&masked, m.start()));

        let mut header = imports.import_lines();
        if !imports.specifiers.is_empty() || dynamic {
            header.push(INTEROP_HELPER.to_string());
        }
        if dynamic {
            header.push(DYNAMIC_REQUIRE_HELPER.to_string());
        }
        if needs_shim {
            header.push("var module = { exports: {} }; var exports = module.exports;".to_string());
        }

        let (body, anchors) = apply_edits(source, &edits);

        let mut footer = Vec::new();
        let has_es_default = ES_DEFAULT_EXPORT
            .find_iter(&masked)
            .any(|m| is_standalone(&masked, m.start()));
        if needs_shim && !has_es_default {
            footer.push("export default module.exports;".to_string());
        }

        self.assemble(source, header, body, anchors, footer, imports.specifiers)
    }

    /// Static specifier of `call`, unless configuration keeps it a runtime require.
    fn hoistable<'a>(&self, call: &'a RequireCall) -> Option<&'a str> {
        let specifier = call.specifier.as_deref()?;
        if self.options.ignore_try_catch && call.in_try {
            return None;
        }
        if self.options.ignore.iter().any(|ignored| ignored == specifier) {
            return None;
        }
        Some(specifier)
    }

    fn assemble(
        &self,
        source: &str,
        header: Vec<String>,
        mut body: String,
        anchors: Vec<Anchor>,
        footer: Vec<String>,
        specifiers: Vec<String>,
    ) -> Result<RewriteOutput> {
        let mut code = String::with_capacity(source.len() + 1024);
        for line in &header {
            code.push_str(line);
            code.push('\n');
        }
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }
        code.push_str(&body);
        for line in &footer {
            code.push_str(line);
            code.push('\n');
        }

        let map = if self.options.sourcemap.is_enabled() {
            Some(self.build_map(source, header.len() as u32, &anchors))
        } else {
            None
        };

        if let (SourceMapMode::Inline, Some(map)) = (self.options.sourcemap, map.as_ref()) {
            code.push_str(&map.inline_comment()?);
            code.push('\n');
        }

        Ok(RewriteOutput {
            code,
            map,
            specifiers,
        })
    }

    fn build_map(&self, source: &str, line_offset: u32, anchors: &[Anchor]) -> SourceMap {
        let source_name = self.options.source.as_deref().unwrap_or(DEFAULT_SOURCE_NAME);
        let content = self.options.sources_content.then(|| source.to_string());

        let mut generator = SourceMapGenerator::new();
        let index = generator.add_source(source_name, content);
        for anchor in anchors {
            generator.add_mapping(
                (anchor.generated.0 + line_offset, anchor.generated.1),
                index,
                anchor.original,
                None,
            );
        }

        let file = Path::new(source_name)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        generator.generate(file)
    }
}

/// Rewrites with the default oxc-backed validator.
pub fn rewrite(source: &str, classification: &Classification, options: &RewriteOptions) -> Result<RewriteOutput> {
    ModuleRewriter::new(options.clone()).rewrite(source, classification)
}

/// Classifies and rewrites in one go.
pub fn transform(source: &str, options: &RewriteOptions) -> Result<(Classification, RewriteOutput)> {
    let classification = super::classifier::classify(source);
    let output = rewrite(source, &classification, options)?;
    Ok((classification, output))
}

fn find_require_calls(source: &str, masked: &str) -> Vec<RequireCall> {
    let tries = try_block_ranges(masked);
    let bytes = masked.as_bytes();

    REQUIRE_CALL
        .find_iter(masked)
        .filter(|m| is_standalone(masked, m.start()))
        .map(|m| {
            let open = m.end() - 1;
            let argument = skip_whitespace(masked, m.end());
            let literal = read_string_literal(source, masked, argument).and_then(|literal| {
                let close = skip_whitespace(masked, literal.end);
                (bytes.get(close) == Some(&b')')).then_some((literal.value, close + 1))
            });

            let (specifier, end) = match literal {
                Some((value, end)) => (Some(value), end),
                None => (
                    None,
                    find_matching_bracket(masked, open).map_or(m.end(), |close| close + 1),
                ),
            };

            RequireCall {
                start: m.start(),
                callee_end: m.start() + "require".len(),
                end,
                specifier,
                in_try: tries
                    .iter()
                    .any(|&(open, close)| open < m.start() && m.start() < close),
            }
        })
        .collect()
}

/// `#!` is only legal at the very top of a file; once anything is prepended
/// it has to become a comment.
fn hashbang_edit(source: &str) -> Vec<Edit> {
    if source.starts_with("#!") {
        vec![Edit {
            start: 0,
            end: 2,
            replacement: "//".to_string(),
        }]
    } else {
        Vec::new()
    }
}

/// Applies non-overlapping `edits` (sorted by start) and records anchors at
/// every line start and around every edit. Line breaks inside a replaced
/// range are re-emitted after the replacement.
fn apply_edits(source: &str, edits: &[Edit]) -> (String, Vec<Anchor>) {
    let mut cursor = Cursor {
        out: String::with_capacity(source.len()),
        anchors: vec![Anchor {
            generated: (0, 0),
            original: (0, 0),
        }],
        generated: (0, 0),
        original: (0, 0),
    };
    let mut pos = 0;

    for edit in edits {
        if edit.start < pos {
            continue;
        }
        cursor.copy(&source[pos..edit.start]);
        cursor.anchor();
        cursor.replace(&edit.replacement, &source[edit.start..edit.end]);
        cursor.anchor();
        pos = edit.end;
    }
    cursor.copy(&source[pos..]);

    let Cursor {
        out, mut anchors, ..
    } = cursor;

    // Later anchors at the same generated position win; an anchor on the
    // empty line after a trailing newline points nowhere.
    let mut deduped: Vec<Anchor> = Vec::with_capacity(anchors.len());
    for anchor in anchors.drain(..) {
        match deduped.last_mut() {
            Some(last) if last.generated == anchor.generated => *last = anchor,
            _ => deduped.push(anchor),
        }
    }
    if out.ends_with('\n') {
        let last_line = out.matches('\n').count() as u32;
        deduped.retain(|anchor| anchor.generated.0 < last_line);
    }

    (out, deduped)
}

struct Cursor {
    out: String,
    anchors: Vec<Anchor>,
    generated: (u32, u32),
    original: (u32, u32),
}

impl Cursor {
    fn anchor(&mut self) {
        self.anchors.push(Anchor {
            generated: self.generated,
            original: self.original,
        });
    }

    fn copy(&mut self, text: &str) {
        for c in text.chars() {
            self.out.push(c);
            if c == '\n' {
                self.generated = (self.generated.0 + 1, 0);
                self.original = (self.original.0 + 1, 0);
                self.anchor();
            } else {
                let width = c.len_utf16() as u32;
                self.generated.1 += width;
                self.original.1 += width;
            }
        }
    }

    fn replace(&mut self, replacement: &str, replaced: &str) {
        self.out.push_str(replacement);
        self.generated.1 += replacement.encode_utf16().count() as u32;

        for c in replaced.chars() {
            if c == '\n' {
                self.out.push('\n');
                self.generated = (self.generated.0 + 1, 0);
                self.original = (self.original.0 + 1, 0);
                self.anchor();
            } else {
                self.original.1 += c.len_utf16() as u32;
            }
        }
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}
