//! The unified scanner, or fragment dispatcher.
//!
//! Decides, without fully parsing, which sub-language owns each span of
//! the source: CHTL itself, CHTL-JS, raw CSS, or raw JavaScript.  The
//! parser proper only ever sees CHTL; script and style bodies are
//! classified here so the pipeline knows whether a body needs CHTL-JS
//! lowering or is pass-through.
//!
//! The scanner works on windows: a slice that does not close within the
//! current window grows by [`limits::SLICE_EXPANSION_STEP`] until it
//! closes or reaches [`limits::MAX_SLICE_SIZE`].  Beyond that the slice
//! is emitted as [`FragmentKind::Mixed`], a recoverable diagnostic is
//! reported, and scanning resumes after the window.
//!
//! Recognition is heuristic by design.  A `script` body is JavaScript
//! unless it contains `{{…}}`, `->` at method-call position, or one of
//! the helper calls, in which case it is CHTL-JS.  A `style` body is
//! CSS unless it contains CHTL constructs (`@Style`, `@Var`,
//! `inherit`, `delete`, namespace `from`).  `[Origin]` bodies are
//! opaque pass-through of their named kind.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::chtl_log;
use crate::error::{DiagnosticKind, Diagnostics};
use crate::limits;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    Chtl,
    ChtlJs,
    Css,
    JavaScript,
    Mixed,
    Unknown,
}

/// A typed slice of the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub kind: FragmentKind,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Slice {
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// An aggregatable minimal unit within a slice: one attribute
/// assignment, one element header, or one selector-and-body pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimalUnit {
    pub kind: FragmentKind,
    pub start: usize,
    pub end: usize,
    pub can_aggregate: bool,
}

static CHTL_JS_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{|->\s*[A-Za-z_$]|\b(?:listen|delegate|animate|vir)\b")
        .expect("known-good regex")
});

static CHTL_IN_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@Style\b|@Var\b|\binherit\b|\bdelete\b|\bfrom\b").expect("known-good regex")
});

/// Classifies the body of a `script { ... }` block.
pub fn classify_script(body: &str) -> FragmentKind {
    if CHTL_JS_SYNTAX.is_match(body) {
        FragmentKind::ChtlJs
    } else {
        FragmentKind::JavaScript
    }
}

/// Classifies the body of a `style { ... }` block.
pub fn classify_style(body: &str) -> FragmentKind {
    if CHTL_IN_STYLE.is_match(body) {
        FragmentKind::Chtl
    } else {
        FragmentKind::Css
    }
}

pub struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
    file: String,
    session: Session,
    diagnostics: Diagnostics,
}

impl<'a> Scanner<'a> {
    pub fn new(
        src: &'a str,
        file: &str,
        session: Session,
        diagnostics: Diagnostics,
    ) -> Scanner<'a> {
        Scanner {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            file: file.to_string(),
            session,
            diagnostics,
        }
    }

    /// Scans the whole source into a sequence of typed slices.
    pub fn scan(mut self) -> Vec<Slice> {
        let mut slices = Vec::new();
        let mut chtl_start = 0;
        let mut chtl_line = 1;
        let mut chtl_column = 1;

        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];

            match c {
                b'"' | b'\'' => {
                    self.skip_string(c);
                    continue;
                }
                b'/' if self.peek(1) == b'/' => {
                    self.skip_line();
                    continue;
                }
                b'-' if self.peek(1) == b'-' => {
                    self.skip_line();
                    continue;
                }
                b'/' if self.peek(1) == b'*' => {
                    self.skip_block_comment();
                    continue;
                }
                _ => {}
            }

            if let Some((word, after)) = self.word_at(self.pos) {
                let is_script = word == "script";
                let is_style = word == "style";
                let is_origin = word == "[Origin]";

                let body_open = if is_script || is_style || is_origin {
                    self.body_brace_after(after)
                } else {
                    None
                };

                if let Some(body_open) = body_open {
                    // Everything up to and including the `{` stays CHTL.
                    self.advance_to(body_open + 1);
                    push_slice(
                        &mut slices,
                        FragmentKind::Chtl,
                        chtl_start,
                        self.pos,
                        chtl_line,
                        chtl_column,
                    );

                    let (body_line, body_column) = (self.line, self.column);
                    let body_start = self.pos;

                    match self.find_body_end(body_start) {
                        Some(body_end) => {
                            let body = &self.src[body_start..body_end];
                            let kind = if is_script {
                                classify_script(body)
                            } else if is_style {
                                classify_style(body)
                            } else {
                                origin_kind(&self.src[..body_open], body_open)
                            };
                            self.advance_to(body_end);
                            push_slice(
                                &mut slices,
                                kind,
                                body_start,
                                body_end,
                                body_line,
                                body_column,
                            );
                        }
                        None => {
                            // Could not close within the hard maximum;
                            // emit Mixed and resume after the window.
                            let window_end =
                                (body_start + limits::MAX_SLICE_SIZE).min(self.src.len());
                            let window_end = floor_char_boundary(self.src, window_end);
                            self.diagnostics.error(
                                DiagnosticKind::UnclosedFragment,
                                self.file.clone(),
                                crate::token::Position::new(body_line, body_column, body_start),
                                crate::error::ImplementationLimit::SliceTooLarge.to_string(),
                            );
                            self.advance_to(window_end);
                            push_slice(
                                &mut slices,
                                FragmentKind::Mixed,
                                body_start,
                                window_end,
                                body_line,
                                body_column,
                            );
                        }
                    }

                    chtl_start = self.pos;
                    chtl_line = self.line;
                    chtl_column = self.column;
                    continue;
                }

                self.advance_to(after);
                continue;
            }

            self.advance();
        }

        push_slice(
            &mut slices,
            FragmentKind::Chtl,
            chtl_start,
            self.pos,
            chtl_line,
            chtl_column,
        );

        chtl_log!(
            self.session,
            "scanner: {} slices over {} bytes",
            slices.len(),
            self.src.len()
        );

        slices
    }

    fn peek(&self, offset: usize) -> u8 {
        *self.bytes.get(self.pos + offset).unwrap_or(&0)
    }

    fn advance(&mut self) {
        if self.pos >= self.bytes.len() {
            return;
        }
        if self.bytes[self.pos] == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.pos += 1;
    }

    fn advance_to(&mut self, target: usize) {
        while self.pos < target {
            self.advance();
        }
    }

    fn skip_line(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        self.advance();
        self.advance();
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'*' && self.peek(1) == b'/' {
                self.advance();
                self.advance();
                return;
            }
            self.advance();
        }
    }

    fn skip_string(&mut self, quote: u8) {
        self.advance();
        while self.pos < self.bytes.len() && self.bytes[self.pos] != quote {
            if self.bytes[self.pos] == b'\\' {
                self.advance();
            }
            self.advance();
        }
        self.advance();
    }

    /// The word starting at `at`, if it begins one: an identifier or a
    /// `[...]` bracket keyword.  Returns the word and the offset just
    /// past it.
    fn word_at(&self, at: usize) -> Option<(&'a str, usize)> {
        let c = *self.bytes.get(at)?;

        if c == b'[' {
            let mut end = at + 1;
            while end < self.bytes.len() && self.bytes[end].is_ascii_alphabetic() {
                end += 1;
            }
            if end < self.bytes.len() && self.bytes[end] == b']' {
                return Some((&self.src[at..end + 1], end + 1));
            }
            return None;
        }

        if !(c.is_ascii_alphabetic() || c == b'_') {
            return None;
        }
        // Word must begin here, not continue a longer identifier.
        if at > 0 {
            let prev = self.bytes[at - 1];
            if prev.is_ascii_alphanumeric() || prev == b'_' || prev == b'-' || prev == b'.' {
                return None;
            }
        }

        let mut end = at;
        while end < self.bytes.len()
            && (self.bytes[end].is_ascii_alphanumeric() || self.bytes[end] == b'_')
        {
            end += 1;
        }
        Some((&self.src[at..end], end))
    }

    /// For `script`/`style`: the offset of the `{` that opens the body,
    /// if the word is directly followed by one.  For `[Origin]`: skips
    /// the type tag and optional name first.
    fn body_brace_after(&self, mut at: usize) -> Option<usize> {
        // Skip whitespace, an optional `@Tag`, and an optional name.
        let mut allow_words = 2;
        loop {
            while at < self.bytes.len() && self.bytes[at].is_ascii_whitespace() {
                at += 1;
            }
            match self.bytes.get(at) {
                Some(b'{') => return Some(at),
                Some(b'@') if allow_words > 0 => {
                    at += 1;
                    while at < self.bytes.len()
                        && (self.bytes[at].is_ascii_alphanumeric() || self.bytes[at] == b'_')
                    {
                        at += 1;
                    }
                    allow_words -= 1;
                }
                Some(c) if allow_words == 1 && (c.is_ascii_alphanumeric() || *c == b'_') => {
                    while at < self.bytes.len()
                        && (self.bytes[at].is_ascii_alphanumeric() || self.bytes[at] == b'_')
                    {
                        at += 1;
                    }
                    allow_words -= 1;
                }
                _ => return None,
            }
        }
    }

    /// Finds the end of a brace body starting at `body_start` (just
    /// past the opening `{`), honoring strings and comments, growing
    /// the window in steps up to the hard maximum.
    fn find_body_end(&self, body_start: usize) -> Option<usize> {
        let mut window = limits::INITIAL_SLICE_SIZE;

        loop {
            let end_limit = (body_start + window).min(self.src.len());

            if let Some(end) = scan_for_close(self.bytes, body_start, end_limit) {
                return Some(end);
            }

            if end_limit == self.src.len() || window >= limits::MAX_SLICE_SIZE {
                return None;
            }
            window = (window + limits::SLICE_EXPANSION_STEP).min(limits::MAX_SLICE_SIZE);
        }
    }
}

fn push_slice(
    slices: &mut Vec<Slice>,
    kind: FragmentKind,
    start: usize,
    end: usize,
    line: usize,
    column: usize,
) {
    if end > start {
        slices.push(Slice {
            kind,
            start,
            end,
            line,
            column,
        });
    }
}

/// Scans for the `}` closing the body begun just before `start`,
/// looking no further than `limit`.  Returns the offset of the `}`.
fn scan_for_close(bytes: &[u8], start: usize, limit: usize) -> Option<usize> {
    let mut depth: i32 = 0;
    let mut i = start;

    while i < limit {
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                let quote = bytes[i];
                i += 1;
                while i < limit && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'/' if i + 1 < limit && bytes[i + 1] == b'/' => {
                while i < limit && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if i + 1 < limit && bytes[i + 1] == b'*' => {
                i += 2;
                while i + 1 < limit && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 2;
            }
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
                i += 1;
            }
            _ => i += 1,
        }
    }

    None
}

/// The pass-through kind of an `[Origin]` body, judged from the type
/// tag that precedes the opening brace.
fn origin_kind(before_brace: &str, _open: usize) -> FragmentKind {
    let tail: String = before_brace
        .chars()
        .rev()
        .take(64)
        .collect::<String>()
        .chars()
        .rev()
        .collect();

    if tail.contains("@Style") {
        FragmentKind::Css
    } else if tail.contains("@JavaScript") {
        FragmentKind::JavaScript
    } else {
        FragmentKind::Chtl
    }
}

fn floor_char_boundary(s: &str, mut at: usize) -> usize {
    while at > 0 && !s.is_char_boundary(at) {
        at -= 1;
    }
    at
}

/// Cuts a CHTL slice into aggregatable minimal units: statements ending
/// in `;` at depth 0, and `header { body }` groups.
pub fn minimal_units(src: &str, slice: &Slice) -> Vec<MinimalUnit> {
    let bytes = src.as_bytes();
    let mut units = Vec::new();
    let mut unit_start = slice.start;
    let mut depth: i32 = 0;
    let mut i = slice.start;

    while i < slice.end {
        match bytes[i] {
            b'"' | b'\'' => {
                let quote = bytes[i];
                i += 1;
                while i < slice.end && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                i += 1;
                if depth <= 0 {
                    push_unit(&mut units, slice.kind, unit_start, i, src);
                    unit_start = i;
                    depth = depth.max(0);
                }
            }
            b';' if depth == 0 => {
                i += 1;
                push_unit(&mut units, slice.kind, unit_start, i, src);
                unit_start = i;
            }
            _ => i += 1,
        }
    }

    push_unit(&mut units, slice.kind, unit_start, slice.end, src);
    units
}

fn push_unit(
    units: &mut Vec<MinimalUnit>,
    kind: FragmentKind,
    start: usize,
    end: usize,
    src: &str,
) {
    if src[start..end].trim().is_empty() {
        return;
    }
    units.push(MinimalUnit {
        kind,
        start,
        end,
        can_aggregate: end - start <= limits::MAX_AGGREGATION_SIZE,
    });
}

/// Merges adjacent units of the same kind greedily, up to the maximum
/// aggregation size.
pub fn aggregate_units(units: &[MinimalUnit]) -> Vec<MinimalUnit> {
    let mut out: Vec<MinimalUnit> = Vec::new();

    for unit in units {
        match out.last_mut() {
            Some(last)
                if last.kind == unit.kind
                    && last.can_aggregate
                    && unit.can_aggregate
                    && unit.end - last.start <= limits::MAX_AGGREGATION_SIZE =>
            {
                last.end = unit.end;
            }
            _ => out.push(unit.clone()),
        }
    }

    out
}

/// Per-compilation cache from fragment content hash to its compiled
/// output.  Within one run it is accessed sequentially, so no locking.
#[derive(Default)]
pub struct FragmentCache {
    map: HashMap<u64, String>,
    hits: usize,
}

impl FragmentCache {
    pub fn new() -> FragmentCache {
        FragmentCache::default()
    }

    pub fn hash(content: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        hasher.finish()
    }

    pub fn get(&mut self, content: &str) -> Option<String> {
        let key = Self::hash(content);
        let hit = self.map.get(&key).cloned();
        if hit.is_some() {
            self.hits += 1;
        }
        hit
    }

    pub fn insert(&mut self, content: &str, compiled: String) {
        self.map.insert(Self::hash(content), compiled);
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_kinds(src: &str) -> Vec<(FragmentKind, String)> {
        let diag = Diagnostics::new();
        let scanner = Scanner::new(src, "test.chtl", Session::new_for_test_suite(), diag);
        scanner
            .scan()
            .into_iter()
            .map(|s| (s.kind, s.text(src).to_string()))
            .collect()
    }

    #[test]
    fn plain_document_is_one_chtl_slice() {
        let slices = scan_kinds("div { id: main; }");
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].0, FragmentKind::Chtl);
    }

    #[test]
    fn script_body_is_javascript() {
        let slices = scan_kinds("div { script { console.log(1); } }");
        assert_eq!(slices[1].0, FragmentKind::JavaScript);
        assert!(slices[1].1.contains("console.log"));
    }

    #[test]
    fn script_body_with_selector_is_chtl_js() {
        let slices = scan_kinds("div { script { {{box}}->listen({}); } }");
        assert_eq!(slices[1].0, FragmentKind::ChtlJs);
    }

    #[test]
    fn style_body_is_css_unless_chtl_constructs() {
        let slices = scan_kinds("div { style { color: red; } }");
        assert_eq!(slices[1].0, FragmentKind::Css);

        let slices = scan_kinds("div { style { @Style Base; } }");
        assert_eq!(slices[1].0, FragmentKind::Chtl);
    }

    #[test]
    fn origin_style_body_is_css() {
        let slices = scan_kinds("[Origin] @Style { .x { color: red } }");
        assert_eq!(slices[1].0, FragmentKind::Css);
    }

    #[test]
    fn unclosed_script_becomes_mixed() {
        let mut src = String::from("div { script { if (x) { ");
        // No closing braces at all; pad past the hard window.
        src.push_str(&"x = 1; ".repeat(2000));
        let diag = Diagnostics::new();
        let scanner = Scanner::new(
            &src,
            "test.chtl",
            Session::new_for_test_suite(),
            diag.clone(),
        );
        let slices = scanner.scan();
        assert!(slices.iter().any(|s| s.kind == FragmentKind::Mixed));
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn minimal_units_split_statements() {
        let src = "id: main; class: box; div { x: y; }";
        let slice = Slice {
            kind: FragmentKind::Chtl,
            start: 0,
            end: src.len(),
            line: 1,
            column: 1,
        };
        let units = minimal_units(src, &slice);
        assert_eq!(units.len(), 3);
        assert!(units.iter().all(|u| u.can_aggregate));

        let aggregated = aggregate_units(&units);
        assert_eq!(aggregated.len(), 1);
        assert_eq!(aggregated[0].start, 0);
        assert_eq!(aggregated[0].end, src.len());
    }

    #[test]
    fn fragment_cache_round_trip() {
        let mut cache = FragmentCache::new();
        assert!(cache.get("abc").is_none());
        cache.insert("abc", "lowered".to_string());
        assert_eq!(cache.get("abc").as_deref(), Some("lowered"));
        assert_eq!(cache.hits(), 1);
    }
}
