//! Lowering of CHTL-JS to plain JavaScript.
//!
//! Script bodies are text, not an AST: the rewriter walks the content
//! with a cursor, copying strings and comments verbatim, and rewrites
//! the CHTL-JS constructs it meets:
//!
//! * `{{sel}}` becomes a DOM query expression;
//! * `->` in method-call position becomes `.` (this is also all that
//!   `animate` needs — it lowers to the Web Animations API call on the
//!   queried element);
//! * `{{X}}->listen({ evt: handler, ... })` becomes a guarded
//!   `addEventListener` chain;
//! * `{{P}}->delegate({ target: {{T}}, evt: handler })` becomes one
//!   listener on `P` that filters by `event.target.matches(...)`;
//! * `vir Name = fn({ key: body, ... })` emits one free function per
//!   key, named `Name_key`, holding the body.

use once_cell::sync::Lazy;
use regex::Regex;

use super::expand::{resolve_var_calls, ExpansionContext};
use crate::util::escape_js_string;

static INDEXED_SELECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_-]*)\[(\d+)\]$").expect("known-good regex"));

/// Lowers one script body.  `resolve_vars` is set for local scripts,
/// where `Group(member)` variable references are allowed.
pub fn lower_script(content: &str, cx: &ExpansionContext<'_>, resolve_vars: bool) -> String {
    let lowered = Lowerer::new(content).run();
    if resolve_vars {
        resolve_var_calls(cx, &lowered, &[])
    } else {
        lowered
    }
}

/// Lowers a `{{...}}` selector to a query expression.
pub fn lower_selector(selector: &str) -> String {
    let s = selector.trim();

    if let Some(caps) = INDEXED_SELECTOR.captures(s) {
        return format!(
            "document.querySelectorAll('{}')[{}]",
            escape_js_string(&caps[1]),
            &caps[2]
        );
    }

    if s.starts_with('.') || s.starts_with('#') || s.contains(' ') || s.contains('[') {
        return format!("document.querySelector('{}')", escape_js_string(s));
    }

    // A bare name is ambiguous: id, class, or tag.  Try them in that
    // order at runtime.
    let e = escape_js_string(s);
    format!(
        "(function () {{ var el = document.getElementById('{e}'); if (el) return el; \
         el = document.querySelector('.{e}'); if (el) return el; \
         return document.querySelector('{e}'); }})()"
    )
}

struct Lowerer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    out: String,
}

impl<'a> Lowerer<'a> {
    fn new(src: &'a str) -> Lowerer<'a> {
        Lowerer {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            out: String::with_capacity(src.len()),
        }
    }

    fn run(mut self) -> String {
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];

            match c {
                b'"' | b'\'' | b'`' => self.copy_string(c),
                b'/' if self.peek(1) == b'/' => self.copy_line(),
                b'/' if self.peek(1) == b'*' => self.copy_block_comment(),
                b'{' if self.peek(1) == b'{' => self.rewrite_selector(),
                b'-' if self.peek(1) == b'>' => self.rewrite_arrow(),
                b'v' if self.word_here("vir") => {
                    if !self.rewrite_vir() {
                        self.copy_char();
                    }
                }
                _ => self.copy_char(),
            }
        }
        self.out
    }

    fn peek(&self, offset: usize) -> u8 {
        *self.bytes.get(self.pos + offset).unwrap_or(&0)
    }

    fn copy_char(&mut self) {
        let start = self.pos;
        let mut end = start + 1;
        while end < self.src.len() && !self.src.is_char_boundary(end) {
            end += 1;
        }
        self.out.push_str(&self.src[start..end]);
        self.pos = end;
    }

    fn copy_string(&mut self, quote: u8) {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != quote {
            if self.bytes[self.pos] == b'\\' {
                self.pos += 1;
            }
            self.pos += 1;
        }
        self.pos = (self.pos + 1).min(self.bytes.len());
        self.out.push_str(&self.src[start..self.pos]);
    }

    fn copy_line(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        self.out.push_str(&self.src[start..self.pos]);
    }

    fn copy_block_comment(&mut self) {
        let start = self.pos;
        self.pos += 2;
        while self.pos < self.bytes.len() && !(self.bytes[self.pos] == b'*' && self.peek(1) == b'/')
        {
            self.pos += 1;
        }
        self.pos = (self.pos + 2).min(self.bytes.len());
        self.out.push_str(&self.src[start..self.pos]);
    }

    fn word_here(&self, word: &str) -> bool {
        if !self.src[self.pos..].starts_with(word) {
            return false;
        }
        let before_ok = self.pos == 0 || {
            let b = self.bytes[self.pos - 1];
            !(b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
        };
        let after = *self.bytes.get(self.pos + word.len()).unwrap_or(&0);
        before_ok && !(after.is_ascii_alphanumeric() || after == b'_' || after == b'$')
    }

    fn skip_ws(&self, mut at: usize) -> usize {
        while at < self.bytes.len() && self.bytes[at].is_ascii_whitespace() {
            at += 1;
        }
        at
    }

    fn ident_at(&self, at: usize) -> Option<(&'a str, usize)> {
        let c = *self.bytes.get(at)?;
        if !(c.is_ascii_alphabetic() || c == b'_' || c == b'$') {
            return None;
        }
        let mut end = at;
        while end < self.bytes.len()
            && (self.bytes[end].is_ascii_alphanumeric()
                || self.bytes[end] == b'_'
                || self.bytes[end] == b'$')
        {
            end += 1;
        }
        Some((&self.src[at..end], end))
    }

    /// `{{sel}}`, possibly followed by a helper call.
    fn rewrite_selector(&mut self) {
        let Some(close) = self.src[self.pos + 2..].find("}}") else {
            self.copy_char();
            return;
        };
        let selector = &self.src[self.pos + 2..self.pos + 2 + close];
        let after = self.pos + 2 + close + 2;

        let arrow_at = self.skip_ws(after);
        if self.src[arrow_at..].starts_with("->") {
            let helper_at = self.skip_ws(arrow_at + 2);
            if let Some((name, name_end)) = self.ident_at(helper_at) {
                let paren_at = self.skip_ws(name_end);
                if self.bytes.get(paren_at) == Some(&b'(') && matches!(name, "listen" | "delegate")
                {
                    if let Some((args, call_end)) = self.balanced(paren_at) {
                        let emitted = match name {
                            "listen" => lower_listen(selector, &args),
                            _ => lower_delegate(selector, &args),
                        };
                        self.out.push_str(&emitted);
                        self.pos = self.consume_semicolon(call_end);
                        return;
                    }
                }
            }
        }

        self.out.push_str(&lower_selector(selector));
        self.pos = after;
    }

    /// `->` becomes `.` in method-call position.
    fn rewrite_arrow(&mut self) {
        let prev_ok = self
            .out
            .trim_end()
            .chars()
            .last()
            .map(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | ')' | ']'))
            .unwrap_or(false);
        let next = self
            .bytes
            .get(self.skip_ws(self.pos + 2))
            .copied()
            .unwrap_or(0);
        let next_ok = next.is_ascii_alphabetic() || next == b'_' || next == b'$';

        if prev_ok && next_ok {
            self.out.push('.');
            self.pos += 2;
        } else {
            self.out.push_str("->");
            self.pos += 2;
        }
    }

    /// `vir Name = fn({ key: body, ... })` — returns false when the
    /// shape does not match and the word should be copied through.
    fn rewrite_vir(&mut self) -> bool {
        let name_at = self.skip_ws(self.pos + 3);
        let Some((name, name_end)) = self.ident_at(name_at) else {
            return false;
        };

        let eq_at = self.skip_ws(name_end);
        if self.bytes.get(eq_at) != Some(&b'=') {
            return false;
        }

        let fn_at = self.skip_ws(eq_at + 1);
        let Some((fn_word, fn_end)) = self.ident_at(fn_at) else {
            return false;
        };
        if fn_word != "fn" {
            return false;
        }

        let paren_at = self.skip_ws(fn_end);
        if self.bytes.get(paren_at) != Some(&b'(') {
            return false;
        }
        let Some((args, call_end)) = self.balanced(paren_at) else {
            return false;
        };

        let mut emitted = String::new();
        for (key, body) in parse_object(&args) {
            let terminated = body.ends_with(';') || body.ends_with('}');
            emitted.push_str(&format!(
                "function {name}_{key}() {{ {body}{} }}\n",
                if terminated { "" } else { ";" }
            ));
        }

        self.out.push_str(emitted.trim_end());
        self.pos = self.consume_semicolon(call_end);
        true
    }

    /// The text between balanced parens starting at `open`, and the
    /// offset just past the `)`.
    fn balanced(&self, open: usize) -> Option<(String, usize)> {
        let mut depth = 0;
        let mut i = open;

        while i < self.bytes.len() {
            match self.bytes[i] {
                b'"' | b'\'' | b'`' => {
                    let quote = self.bytes[i];
                    i += 1;
                    while i < self.bytes.len() && self.bytes[i] != quote {
                        if self.bytes[i] == b'\\' {
                            i += 1;
                        }
                        i += 1;
                    }
                }
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((self.src[open + 1..i].to_string(), i + 1));
                    }
                }
                _ => {}
            }
            i += 1;
        }
        None
    }

    fn consume_semicolon(&self, at: usize) -> usize {
        let at = self.skip_ws(at);
        if self.bytes.get(at) == Some(&b';') {
            at + 1
        } else {
            at
        }
    }
}

/// Splits `{ key: value, ... }` into entries at top-level commas.
fn parse_object(args: &str) -> Vec<(String, String)> {
    let inner = args.trim();
    let inner = inner
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(inner);

    let bytes = inner.as_bytes();
    let mut entries = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    let mut i = 0;

    let mut push_entry = |piece: &str| {
        let piece = piece.trim();
        if piece.is_empty() {
            return;
        }
        if let Some(colon) = find_top_level_colon(piece) {
            let key = piece[..colon]
                .trim()
                .trim_matches(&['"', '\''][..])
                .to_string();
            let value = piece[colon + 1..].trim().to_string();
            entries.push((key, value));
        }
    };

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'(' | b'{' | b'[' => depth += 1,
            b')' | b'}' | b']' => depth -= 1,
            b',' if depth == 0 => {
                push_entry(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    push_entry(&inner[start..]);

    entries
}

fn find_top_level_colon(piece: &str) -> Option<usize> {
    let bytes = piece.as_bytes();
    let mut depth = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' | b'`' => {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'(' | b'{' | b'[' => depth += 1,
            b')' | b'}' | b']' => depth -= 1,
            b':' if depth == 0 => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn lower_listen(selector: &str, args: &str) -> String {
    let query = lower_selector(selector);
    let mut body = String::new();
    for (event, handler) in parse_object(args) {
        body.push_str(&format!(
            "__target.addEventListener('{}', {handler}); ",
            escape_js_string(&event)
        ));
    }
    format!("(function () {{ var __target = {query}; if (__target) {{ {body}}} }})();")
}

fn lower_delegate(selector: &str, args: &str) -> String {
    let parent = lower_selector(selector);
    let entries = parse_object(args);

    let target_selector = entries
        .iter()
        .find(|(k, _)| k == "target")
        .map(|(_, v)| delegate_target_selector(v))
        .unwrap_or_default();

    let mut body = String::new();
    for (event, handler) in entries.iter().filter(|(k, _)| k != "target") {
        body.push_str(&format!(
            "__parent.addEventListener('{}', function (event) {{ \
             if (event.target.matches('{}')) {{ ({handler})(event); }} }}); ",
            escape_js_string(event),
            escape_js_string(&target_selector)
        ));
    }

    format!("(function () {{ var __parent = {parent}; if (__parent) {{ {body}}} }})();")
}

/// The CSS selector string for a delegate target: the inside of a
/// `{{...}}` if present, else the raw value with quotes stripped.
fn delegate_target_selector(value: &str) -> String {
    let v = value.trim();
    if let Some(inner) = v.strip_prefix("{{").and_then(|s| s.strip_suffix("}}")) {
        return inner.trim().to_string();
    }
    v.trim_matches(&['"', '\''][..]).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(content: &str) -> String {
        Lowerer::new(content).run()
    }

    #[test]
    fn class_selector_uses_query_selector() {
        assert_eq!(lower_selector(".box"), "document.querySelector('.box')");
        assert_eq!(lower_selector("#app"), "document.querySelector('#app')");
        assert_eq!(
            lower_selector("div span"),
            "document.querySelector('div span')"
        );
    }

    #[test]
    fn indexed_selector_uses_query_selector_all() {
        assert_eq!(
            lower_selector("button[2]"),
            "document.querySelectorAll('button')[2]"
        );
    }

    #[test]
    fn bare_selector_tries_id_class_tag() {
        let lowered = lower_selector("box");
        assert!(lowered.contains("getElementById('box')"));
        assert!(lowered.contains("querySelector('.box')"));
        assert!(lowered.contains("querySelector('box')"));
    }

    #[test]
    fn arrow_in_method_position_becomes_dot() {
        assert_eq!(lower("a->b()"), "a.b()");
        assert_eq!(lower("f(x)->g()"), "f(x).g()");
    }

    #[test]
    fn arrow_inside_string_is_untouched() {
        assert_eq!(lower("var s = 'a->b';"), "var s = 'a->b';");
    }

    #[test]
    fn selector_then_method_call() {
        assert_eq!(
            lower("{{.box}}->focus();"),
            "document.querySelector('.box').focus();"
        );
    }

    #[test]
    fn animate_lowers_by_the_generic_arrow_rule() {
        let lowered = lower("{{.box}}->animate({ opacity: 0 });");
        assert_eq!(
            lowered,
            "document.querySelector('.box').animate({ opacity: 0 });"
        );
    }

    #[test]
    fn listen_lowers_to_guarded_add_event_listener() {
        let lowered = lower("{{.box}}->listen({ click: () => { console.log(1); } });");
        assert_eq!(
            lowered,
            "(function () { var __target = document.querySelector('.box'); \
             if (__target) { __target.addEventListener('click', () => { console.log(1); }); } })();"
        );
    }

    #[test]
    fn listen_with_two_events() {
        let lowered = lower("{{btn}}->listen({ click: onClick, focus: onFocus });");
        assert!(lowered.contains("addEventListener('click', onClick);"));
        assert!(lowered.contains("addEventListener('focus', onFocus);"));
    }

    #[test]
    fn delegate_filters_on_target() {
        let lowered = lower("{{.list}}->delegate({ target: {{.item}}, click: handle });");
        assert!(lowered.contains("var __parent = document.querySelector('.list');"));
        assert!(lowered.contains("addEventListener('click', function (event)"));
        assert!(lowered.contains("event.target.matches('.item')"));
        assert!(lowered.contains("(handle)(event);"));
    }

    #[test]
    fn vir_emits_one_function_per_key() {
        let lowered =
            lower("vir Handlers = fn({ open: console.log('o'), close: console.log('c') });");
        assert!(lowered.contains("function Handlers_open() { console.log('o'); }"));
        assert!(lowered.contains("function Handlers_close() { console.log('c'); }"));
    }

    #[test]
    fn vir_without_fn_shape_is_copied() {
        assert_eq!(lower("var environ = vir + 1;"), "var environ = vir + 1;");
    }

    #[test]
    fn plain_javascript_is_untouched() {
        let src = "const o = { a: 1 };\nif (o.a > 0) { go(o); }";
        assert_eq!(lower(src), src);
    }
}
