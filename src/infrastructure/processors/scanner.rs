// Lexical masking for heuristic module analysis.
// Comments, string/template text and regex literals are blanked out so that
// plain regexes can look for `require(`, `module.exports` and `import`/`export`
// without tripping over occurrences inside literals. Byte offsets and line
// breaks of the masked text match the original exactly.

use once_cell::sync::Lazy;
use regex::Regex;
use std::iter::Peekable;
use std::str::Chars;

static TRY_BLOCK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"try\s*\{").expect("valid try regex"));

/// Keywords after which a `/` starts a regular expression, not a division.
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// Keywords whose parenthesised head ends in statement position, so the `/`
/// after its `)` starts a regular expression.
const CONTROL_KEYWORDS: &[&str] = &["if", "while", "for", "with"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    LineComment,
    BlockComment,
    Str(char),
    Template,
    Regex { in_class: bool },
}

/// Returns a copy of `source` where every byte that belongs to a comment, to
/// the body of a string or template literal, or to a regex literal is
/// replaced by a space. Quote characters, template `${`/`}` delimiters and
/// line breaks are kept.
pub fn mask_source(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut mode = if source.starts_with("#!") {
        Mode::LineComment
    } else {
        Mode::Code
    };
    let mut template_depths: Vec<usize> = Vec::new();
    let mut prev_operand = false;
    let mut word = String::new();
    let mut after_control = false;
    // one entry per open `(`: whether it follows a control keyword
    let mut parens: Vec<bool> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match mode {
            Mode::Code => {
                if is_ident_char(c) {
                    word.push(c);
                    out.push(c);
                    i += 1;
                    continue;
                }
                if !word.is_empty() {
                    let property = follows_dot(&chars[..i - word.chars().count()]);
                    prev_operand = property || !REGEX_PRECEDING_KEYWORDS.contains(&word.as_str());
                    after_control = !property && CONTROL_KEYWORDS.contains(&word.as_str());
                    word.clear();
                } else if !c.is_whitespace() && c != '(' && c != '/' {
                    after_control = false;
                }

                match c {
                    '/' if next == Some('/') => {
                        mode = Mode::LineComment;
                        push_masked(&mut out, c);
                    }
                    '/' if next == Some('*') => {
                        mode = Mode::BlockComment;
                        push_masked(&mut out, c);
                        push_masked(&mut out, '*');
                        i += 2;
                        continue;
                    }
                    '/' if !prev_operand => {
                        mode = Mode::Regex { in_class: false };
                        push_masked(&mut out, c);
                    }
                    '\'' | '"' => {
                        mode = Mode::Str(c);
                        out.push(c);
                    }
                    '`' => {
                        mode = Mode::Template;
                        out.push(c);
                    }
                    '{' => {
                        if let Some(depth) = template_depths.last_mut() {
                            *depth += 1;
                        }
                        prev_operand = false;
                        out.push(c);
                    }
                    '}' => {
                        match template_depths.last_mut() {
                            Some(0) => {
                                template_depths.pop();
                                mode = Mode::Template;
                            }
                            Some(depth) => *depth -= 1,
                            None => {}
                        }
                        prev_operand = false;
                        out.push(c);
                    }
                    '(' => {
                        parens.push(after_control);
                        after_control = false;
                        prev_operand = false;
                        out.push(c);
                    }
                    ')' => {
                        prev_operand = !parens.pop().unwrap_or(false);
                        out.push(c);
                    }
                    ']' => {
                        prev_operand = true;
                        out.push(c);
                    }
                    c if c.is_whitespace() => out.push(c),
                    _ => {
                        prev_operand = false;
                        out.push(c);
                    }
                }
            }
            Mode::LineComment => {
                if c == '\n' || c == '\r' {
                    mode = Mode::Code;
                    out.push(c);
                } else {
                    push_masked(&mut out, c);
                }
            }
            Mode::BlockComment => {
                if c == '*' && next == Some('/') {
                    push_masked(&mut out, c);
                    push_masked(&mut out, '/');
                    mode = Mode::Code;
                    i += 2;
                    continue;
                }
                push_masked(&mut out, c);
            }
            Mode::Str(quote) => {
                if c == '\\' {
                    push_masked(&mut out, c);
                    if let Some(escaped) = next {
                        push_masked(&mut out, escaped);
                        i += 2;
                        continue;
                    }
                } else if c == quote {
                    out.push(c);
                    mode = Mode::Code;
                    prev_operand = true;
                } else if c == '\n' {
                    // unterminated literal
                    out.push(c);
                    mode = Mode::Code;
                } else {
                    push_masked(&mut out, c);
                }
            }
            Mode::Template => {
                if c == '\\' {
                    push_masked(&mut out, c);
                    if let Some(escaped) = next {
                        push_masked(&mut out, escaped);
                        i += 2;
                        continue;
                    }
                } else if c == '`' {
                    out.push(c);
                    mode = Mode::Code;
                    prev_operand = true;
                } else if c == '$' && next == Some('{') {
                    out.push_str("${");
                    template_depths.push(0);
                    mode = Mode::Code;
                    prev_operand = false;
                    i += 2;
                    continue;
                } else {
                    push_masked(&mut out, c);
                }
            }
            Mode::Regex { in_class } => {
                if c == '\\' {
                    push_masked(&mut out, c);
                    if let Some(escaped) = next {
                        push_masked(&mut out, escaped);
                        i += 2;
                        continue;
                    }
                } else if c == '\n' {
                    // a regex never spans lines: this was a division after all
                    out.push(c);
                    mode = Mode::Code;
                } else if c == '[' && !in_class {
                    push_masked(&mut out, c);
                    mode = Mode::Regex { in_class: true };
                } else if c == ']' && in_class {
                    push_masked(&mut out, c);
                    mode = Mode::Regex { in_class: false };
                } else if c == '/' && !in_class {
                    push_masked(&mut out, c);
                    mode = Mode::Code;
                    prev_operand = true;
                } else {
                    push_masked(&mut out, c);
                }
            }
        }

        i += 1;
    }

    out
}

fn push_masked(out: &mut String, c: char) {
    if c == '\n' || c == '\r' {
        out.push(c);
    } else {
        out.extend(std::iter::repeat(' ').take(c.len_utf8()));
    }
}

fn follows_dot(before: &[char]) -> bool {
    before.iter().rev().find(|c| !c.is_whitespace()) == Some(&'.')
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

fn is_ident_byte(b: u8) -> bool {
    b == b'_' || b == b'$' || b.is_ascii_alphanumeric() || b >= 0x80
}

/// True when the token starting at `start` is not glued to a preceding
/// identifier and is not a property access (`foo.require`).
pub fn is_standalone(masked: &str, start: usize) -> bool {
    match masked.as_bytes()[..start].last() {
        None => true,
        Some(&b) => b != b'.' && !is_ident_byte(b),
    }
}

/// True when the byte at `end` does not continue an identifier.
pub fn ends_token(masked: &str, end: usize) -> bool {
    masked.as_bytes().get(end).map_or(true, |&b| !is_ident_byte(b))
}

pub fn skip_whitespace(masked: &str, mut pos: usize) -> usize {
    let bytes = masked.as_bytes();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Position of the bracket closing the one at `open`. Only code brackets
/// survive masking, so a plain depth count is enough.
pub fn find_matching_bracket(masked: &str, open: usize) -> Option<usize> {
    let bytes = masked.as_bytes();
    let mut depth = 0usize;

    for (pos, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
        }
    }

    None
}

/// A string literal found in the original source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    pub value: String,
    /// Offset of the opening quote
    pub start: usize,
    /// Offset just past the closing quote
    pub end: usize,
}

/// Reads the string literal whose opening quote sits at `start`. Template
/// literals only count when they have no substitutions, and a literal whose
/// escapes do not decode is not read at all.
pub fn read_string_literal(source: &str, masked: &str, start: usize) -> Option<StringLiteral> {
    let quote = *masked.as_bytes().get(start)?;
    if !matches!(quote, b'\'' | b'"' | b'`') {
        return None;
    }

    let close = start + 1 + masked[start + 1..].find(quote as char)?;
    let body_masked = &masked[start + 1..close];
    if quote == b'`' && body_masked.contains("${") {
        return None;
    }
    if body_masked.contains('\n') && quote != b'`' {
        return None;
    }

    Some(StringLiteral {
        value: unescape(&source[start + 1..close])?,
        start,
        end: close + 1,
    })
}

/// Cooked value of a literal body. `None` for escapes a module may not
/// contain (legacy octal) or that do not form a valid code point.
fn unescape(raw: &str) -> Option<String> {
    let mut value = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next()? {
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            'b' => value.push('\u{8}'),
            'f' => value.push('\u{c}'),
            'v' => value.push('\u{b}'),
            '0' if !chars.peek().is_some_and(char::is_ascii_digit) => value.push('\0'),
            '0'..='9' => return None,
            'x' => value.push(char::from_u32(read_hex(&mut chars, 2)?)?),
            'u' => value.push(read_unicode_escape(&mut chars)?),
            // line continuations
            '\r' => {
                chars.next_if_eq(&'\n');
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => value.push(other),
        }
    }

    Some(value)
}

fn read_hex(chars: &mut Peekable<Chars<'_>>, digits: usize) -> Option<u32> {
    (0..digits).try_fold(0u32, |acc, _| Some(acc * 16 + chars.next()?.to_digit(16)?))
}

/// Reads what follows `\u`: `XXXX`, a `\uXXXX\uXXXX` surrogate pair or `{X…}`.
fn read_unicode_escape(chars: &mut Peekable<Chars<'_>>) -> Option<char> {
    if chars.next_if_eq(&'{').is_some() {
        let mut code = 0u32;
        let mut digits = 0;
        loop {
            let c = chars.next()?;
            if c == '}' && digits > 0 {
                return char::from_u32(code);
            }
            code = code.checked_mul(16)?.checked_add(c.to_digit(16)?)?;
            if code > 0x10FFFF {
                return None;
            }
            digits += 1;
        }
    }

    let unit = read_hex(chars, 4)?;
    if !(0xD800..=0xDBFF).contains(&unit) {
        return char::from_u32(unit);
    }

    // a lone surrogate has no `char`
    let mut ahead = chars.clone();
    if ahead.next()? != '\\' || ahead.next()? != 'u' {
        return None;
    }
    let low = read_hex(&mut ahead, 4)?;
    if !(0xDC00..=0xDFFF).contains(&low) {
        return None;
    }
    *chars = ahead;
    char::from_u32(0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00))
}

/// Byte ranges `(open_brace, close_brace)` of every `try { … }` block.
pub fn try_block_ranges(masked: &str) -> Vec<(usize, usize)> {
    TRY_BLOCK_REGEX
        .find_iter(masked)
        .filter(|m| is_standalone(masked, m.start()))
        .filter_map(|m| {
            let open = m.end() - 1;
            find_matching_bracket(masked, open).map(|close| (open, close))
        })
        .collect()
}
