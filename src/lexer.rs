//! The CHTL lexer.
//!
//! The lexer is context free: it does not know whether it is inside a
//! style block or a template body.  The parser drives it pull-style and
//! decides what the tokens mean.  Two things look context sensitive but
//! are not:
//!
//! * `{{` / `}}` / `->` are always tokenized as units; only the parser,
//!   inside script contexts, routes them to CHTL-JS handling.
//!
//! * Raw captures: for positions whose content is opaque (script and
//!   origin bodies) or free-form (attribute and property values), the
//!   parser asks for a raw capture instead of tokens.  The capture
//!   tracks strings, comments and brace depth so that a `}` inside a
//!   JavaScript string does not end a script block.
//!
//! `//` and `/* */` comments are dropped here.  `--` comments survive
//! as [`TokenKind::GeneratorComment`] tokens because the generator
//! turns them into HTML comments.

use crate::config::Config;
use crate::error::{DiagnosticKind, Diagnostics};
use crate::token::{AtTag, Position, Token, TokenKind, AT_TAGS, BRACKET_KEYWORDS, KEYWORDS};

pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
    file: String,
    config: &'a Config,
    diagnostics: Diagnostics,
}

impl<'a> Lexer<'a> {
    pub fn new(
        src: &'a str,
        file: &str,
        config: &'a Config,
        diagnostics: Diagnostics,
    ) -> Lexer<'a> {
        Lexer {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            file: file.to_string(),
            config,
            diagnostics,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column, self.pos)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn current(&self) -> u8 {
        if self.at_end() {
            0
        } else {
            self.bytes[self.pos]
        }
    }

    fn peek_at(&self, offset: usize) -> u8 {
        *self.bytes.get(self.pos + offset).unwrap_or(&0)
    }

    fn advance(&mut self) {
        if self.at_end() {
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

    fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    /// A short excerpt around the current position, for diagnostics.
    pub fn context_excerpt(&self) -> String {
        const RADIUS: usize = 20;
        let start = self.pos.saturating_sub(RADIUS);
        let end = (self.pos + RADIUS).min(self.src.len());

        // Clamp to char boundaries; the radius is advisory.
        let mut start = start;
        while start > 0 && !self.src.is_char_boundary(start) {
            start -= 1;
        }
        let mut end = end;
        while end < self.src.len() && !self.src.is_char_boundary(end) {
            end += 1;
        }

        self.src[start..end].trim().to_string()
    }

    fn skip_whitespace(&mut self) {
        while !self.at_end() && self.current().is_ascii_whitespace() {
            self.advance();
        }
    }

    /// Skips `//` and `/* */` comments; those never reach the parser.
    fn skip_dropped_comments(&mut self) -> bool {
        if self.current() == b'/' && self.peek_at(1) == b'/' {
            while !self.at_end() && self.current() != b'\n' {
                self.advance();
            }
            return true;
        }

        if self.current() == b'/' && self.peek_at(1) == b'*' {
            self.advance_n(2);
            while !self.at_end() {
                if self.current() == b'*' && self.peek_at(1) == b'/' {
                    self.advance_n(2);
                    return true;
                }
                self.advance();
            }
            return true;
        }

        false
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();
            if self.at_end() {
                return Token::eof(self.position());
            }
            if !self.skip_dropped_comments() {
                break;
            }
        }

        let pos = self.position();
        let c = self.current();

        // Generator comment; unlike the other two kinds it is a token.
        if c == b'-' && self.peek_at(1) == b'-' {
            let start = self.pos;
            while !self.at_end() && self.current() != b'\n' {
                self.advance();
            }
            return Token::new(TokenKind::GeneratorComment, &self.src[start..self.pos], pos);
        }

        // Double symbols.
        if c == b'{' && self.peek_at(1) == b'{' {
            self.advance_n(2);
            return Token::new(TokenKind::DoubleLBrace, "{{", pos);
        }
        if c == b'}' && self.peek_at(1) == b'}' {
            self.advance_n(2);
            return Token::new(TokenKind::DoubleRBrace, "}}", pos);
        }
        if c == b'-' && self.peek_at(1) == b'>' {
            self.advance_n(2);
            return Token::new(TokenKind::Arrow, "->", pos);
        }

        if c == b'[' {
            return self.read_bracket(pos);
        }
        if c == b'@' {
            return self.read_at_tag(pos);
        }
        if c == b'"' || c == b'\'' {
            return self.read_string(pos, c);
        }
        if c.is_ascii_digit() {
            return self.read_number(pos);
        }
        if c.is_ascii_alphabetic() || c == b'_' {
            return self.read_identifier(pos);
        }

        let single = match c {
            b'{' => Some(TokenKind::LBrace),
            b'}' => Some(TokenKind::RBrace),
            b'(' => Some(TokenKind::LParen),
            b')' => Some(TokenKind::RParen),
            b']' => Some(TokenKind::RBracket),
            b';' => Some(TokenKind::Semicolon),
            b':' => Some(TokenKind::Colon),
            b',' => Some(TokenKind::Comma),
            b'.' => Some(TokenKind::Dot),
            b'=' => Some(TokenKind::Equal),
            b'&' => Some(TokenKind::Ampersand),
            _ => None,
        };
        if let Some(kind) = single {
            let start = self.pos;
            self.advance();
            return Token::new(kind, &self.src[start..self.pos], pos);
        }

        if !c.is_ascii_control() {
            return self.read_unquoted(pos);
        }

        let mut d = crate::error::Diagnostic {
            kind: DiagnosticKind::UnknownCharacter,
            severity: crate::error::Severity::Error,
            file: self.file.clone(),
            pos,
            message: format!("unknown character 0x{c:02x}"),
            excerpt: None,
        };
        d.excerpt = Some(self.context_excerpt());
        self.diagnostics.push(d);
        self.advance();
        self.next_token()
    }

    /// `[Template]`, `[Custom]`, ... matched as single lexemes; any
    /// other `[` is punctuation.
    fn read_bracket(&mut self, pos: Position) -> Token {
        let start = self.pos;
        let mut scan = self.pos + 1;
        while scan < self.bytes.len() && self.bytes[scan].is_ascii_alphabetic() {
            scan += 1;
        }

        if scan < self.bytes.len() && self.bytes[scan] == b']' {
            let lexeme = &self.src[start..scan + 1];
            if let Some(&kw) = BRACKET_KEYWORDS.get(lexeme) {
                self.advance_n(lexeme.len());
                return Token::new(TokenKind::Bracket(kw), lexeme, pos);
            }
        }

        self.advance();
        Token::new(TokenKind::LBracket, "[", pos)
    }

    fn read_at_tag(&mut self, pos: Position) -> Token {
        let start = self.pos;
        self.advance(); // '@'
        while !self.at_end() && (self.current().is_ascii_alphanumeric() || self.current() == b'_') {
            self.advance();
        }
        let lexeme = &self.src[start..self.pos];

        // `[Name]` rebindings extend the built-in spellings.
        if let Some(kind) = self.config.rebound_kind(lexeme) {
            return Token::new(kind, lexeme, pos);
        }
        match AT_TAGS.get(lexeme) {
            Some(&tag) => Token::new(TokenKind::At(tag), lexeme, pos),
            None => Token::new(TokenKind::At(AtTag::Other), lexeme, pos),
        }
    }

    fn read_string(&mut self, pos: Position, quote: u8) -> Token {
        let start = self.pos;
        self.advance(); // opening quote

        while !self.at_end() && self.current() != quote {
            if self.current() == b'\\' {
                self.advance();
                if !self.at_end() {
                    self.advance();
                }
            } else {
                self.advance();
            }
        }

        if self.at_end() {
            let mut d = crate::error::Diagnostic {
                kind: DiagnosticKind::UnterminatedString,
                severity: crate::error::Severity::Error,
                file: self.file.clone(),
                pos,
                message: "unterminated string literal".to_string(),
                excerpt: None,
            };
            d.excerpt = Some(self.context_excerpt());
            self.diagnostics.push(d);
            return Token::new(TokenKind::StringLiteral, &self.src[start..self.pos], pos);
        }

        self.advance(); // closing quote
        Token::new(TokenKind::StringLiteral, &self.src[start..self.pos], pos)
    }

    fn read_number(&mut self, pos: Position) -> Token {
        let start = self.pos;
        let mut seen_dot = false;
        while !self.at_end() {
            let c = self.current();
            if c.is_ascii_digit() {
                self.advance();
            } else if c == b'.' && !seen_dot && self.peek_at(1).is_ascii_digit() {
                seen_dot = true;
                self.advance();
            } else {
                break;
            }
        }
        Token::new(TokenKind::Number, &self.src[start..self.pos], pos)
    }

    fn read_identifier(&mut self, pos: Position) -> Token {
        let start = self.pos;
        while !self.at_end() {
            let c = self.current();
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.advance();
            } else if c == b'-' && self.peek_at(1).is_ascii_alphanumeric() {
                // CSS-style names like `line-height`; `->` never enters
                // here because `>` is not alphanumeric.
                self.advance();
            } else {
                break;
            }
        }
        let lexeme = &self.src[start..self.pos];

        if let Some(kind) = self.config.rebound_kind(lexeme) {
            return Token::new(kind, lexeme, pos);
        }
        match KEYWORDS.get(lexeme) {
            Some(&kw) => Token::new(TokenKind::Keyword(kw), lexeme, pos),
            None => Token::new(TokenKind::Identifier, lexeme, pos),
        }
    }

    /// Bare word terminated by `; , { } ( )` or whitespace.
    fn read_unquoted(&mut self, pos: Position) -> Token {
        let start = self.pos;
        while !self.at_end() {
            let c = self.current();
            if c.is_ascii_whitespace() || matches!(c, b';' | b',' | b'{' | b'}' | b'(' | b')') {
                break;
            }
            self.advance();
        }
        Token::new(TokenKind::UnquotedLiteral, &self.src[start..self.pos], pos)
    }

    /// Captures a free-form value: raw source text from the current
    /// position up to a `;`, `}` or `{` at paren depth 0.  Strings are
    /// honored so the terminators may appear inside them.  Used for
    /// attribute values, style declaration values and variable values,
    /// where almost anything (colors, URLs, font stacks) is legal.
    pub fn capture_value(&mut self) -> (String, Position) {
        self.skip_whitespace();
        let pos = self.position();
        let start = self.pos;
        let mut parens: i32 = 0;

        while !self.at_end() {
            let c = self.current();
            match c {
                b'"' | b'\'' => {
                    self.read_string(self.position(), c);
                }
                b'(' => {
                    parens += 1;
                    self.advance();
                }
                b')' => {
                    if parens == 0 {
                        break;
                    }
                    parens -= 1;
                    self.advance();
                }
                b';' | b'}' | b'{' if parens == 0 => break,
                _ => self.advance(),
            }
        }

        (self.src[start..self.pos].trim_end().to_string(), pos)
    }

    /// Captures an opaque `{ ... }` body.  Must be called right after
    /// the opening `{` has been consumed; returns the raw content and
    /// consumes the matching `}`.  Tracks strings (including template
    /// literals) and both dropped comment kinds so braces inside them
    /// do not count toward nesting.
    pub fn capture_block(&mut self) -> (String, Position) {
        let pos = self.position();
        let start = self.pos;
        let mut depth: i32 = 0;

        while !self.at_end() {
            let c = self.current();
            match c {
                b'"' | b'\'' | b'`' => {
                    self.capture_raw_string(c);
                }
                b'/' if self.peek_at(1) == b'/' => {
                    while !self.at_end() && self.current() != b'\n' {
                        self.advance();
                    }
                }
                b'/' if self.peek_at(1) == b'*' => {
                    self.advance_n(2);
                    while !self.at_end() && !(self.current() == b'*' && self.peek_at(1) == b'/') {
                        self.advance();
                    }
                    self.advance_n(2);
                }
                b'{' => {
                    depth += 1;
                    self.advance();
                }
                b'}' => {
                    if depth == 0 {
                        let content = self.src[start..self.pos].to_string();
                        self.advance(); // the closing '}'
                        return (content, pos);
                    }
                    depth -= 1;
                    self.advance();
                }
                _ => self.advance(),
            }
        }

        self.diagnostics.error(
            DiagnosticKind::UnexpectedEof,
            self.file.clone(),
            pos,
            "unterminated block; expected '}'",
        );
        (self.src[start..self.pos].to_string(), pos)
    }

    /// Captures an import path: raw text up to whitespace or `;`.
    ///
    /// Paths go through a raw capture because `/` is meaningful in
    /// them: `base/*` would otherwise open a block comment, and
    /// `./dir/file.chtl` would shatter into a dozen tokens.  A quoted
    /// path is accepted and unwrapped.
    pub fn capture_path(&mut self) -> (String, Position) {
        self.skip_whitespace();
        let pos = self.position();

        let c = self.current();
        if c == b'"' || c == b'\'' {
            let token = self.read_string(pos, c);
            return (token.unquoted(), pos);
        }

        let start = self.pos;
        while !self.at_end() {
            let c = self.current();
            if c.is_ascii_whitespace() || c == b';' {
                break;
            }
            self.advance();
        }
        (self.src[start..self.pos].to_string(), pos)
    }

    /// Like [`read_string`] but without producing a token; template
    /// literals (`` ` ``) are accepted since this is used inside script
    /// bodies.
    fn capture_raw_string(&mut self, quote: u8) {
        self.advance();
        while !self.at_end() && self.current() != quote {
            if self.current() == b'\\' {
                self.advance();
            }
            self.advance();
        }
        self.advance();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{BracketKeyword, Keyword};

    fn lex_all(src: &str) -> Vec<Token> {
        let config = Config::default();
        let diag = Diagnostics::new();
        let mut lexer = Lexer::new(src, "test.chtl", &config, diag);
        let mut out = Vec::new();
        loop {
            let t = lexer.next_token();
            let done = t.kind == TokenKind::Eof;
            out.push(t);
            if done {
                break;
            }
        }
        out
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex_all(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn basic_element_tokens() {
        assert_eq!(
            kinds("div { id : main ; }"),
            vec![
                TokenKind::Identifier,
                TokenKind::LBrace,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::Semicolon,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn bracket_keywords_are_single_lexemes() {
        let tokens = lex_all("[Template] [0]");
        assert_eq!(tokens[0].kind, TokenKind::Bracket(BracketKeyword::Template));
        assert_eq!(tokens[1].kind, TokenKind::LBracket);
        assert_eq!(tokens[2].kind, TokenKind::Number);
        assert_eq!(tokens[3].kind, TokenKind::RBracket);
    }

    #[test]
    fn at_tags_and_unknown_tags() {
        let tokens = lex_all("@Style @Vue");
        assert_eq!(tokens[0].kind, TokenKind::At(AtTag::Style));
        assert_eq!(tokens[1].kind, TokenKind::At(AtTag::Other));
        assert_eq!(tokens[1].value, "@Vue");
    }

    #[test]
    fn double_symbols() {
        assert_eq!(
            kinds("{{ box }} ->"),
            vec![
                TokenKind::DoubleLBrace,
                TokenKind::Identifier,
                TokenKind::DoubleRBrace,
                TokenKind::Arrow,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn hyphenated_identifier_is_one_token() {
        let tokens = lex_all("line-height");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].value, "line-height");
    }

    #[test]
    fn comments_are_dropped_except_generator() {
        let tokens = lex_all("// gone\n/* gone\ntoo */\n-- kept\ndiv");
        assert_eq!(tokens[0].kind, TokenKind::GeneratorComment);
        assert_eq!(tokens[0].value, "-- kept");
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn string_spans_lines_and_keeps_escapes() {
        let tokens = lex_all("\"a\\\"b\nc\"");
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].unquoted(), "a\"b\nc");
    }

    #[test]
    fn unterminated_string_reports() {
        let config = Config::default();
        let diag = Diagnostics::new();
        let mut lexer = Lexer::new("\"oops", "test.chtl", &config, diag.clone());
        let t = lexer.next_token();
        assert_eq!(t.kind, TokenKind::StringLiteral);
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn token_positions_round_trip() {
        let src = "div {\n  id: main;\n}";
        for t in lex_all(src) {
            if t.kind == TokenKind::Eof {
                continue;
            }
            assert_eq!(
                &src[t.pos.offset..t.pos.offset + t.value.len()],
                t.value,
                "token at {} does not round trip",
                t.pos
            );
        }
    }

    #[test]
    fn capture_value_stops_at_semicolon_outside_parens() {
        let config = Config::default();
        let diag = Diagnostics::new();
        let mut lexer = Lexer::new("rgb(1, 2, 3); rest", "test.chtl", &config, diag);
        let (value, _) = lexer.capture_value();
        assert_eq!(value, "rgb(1, 2, 3)");
    }

    #[test]
    fn capture_block_ignores_braces_in_strings_and_comments() {
        let config = Config::default();
        let diag = Diagnostics::new();
        let src = "if (x) { s = \"}\"; } // }\n} trailing";
        let mut lexer = Lexer::new(src, "test.chtl", &config, diag);
        let (content, _) = lexer.capture_block();
        assert_eq!(content, "if (x) { s = \"}\"; } // }\n");
    }

    #[test]
    fn rebound_spelling_resolves() {
        use crate::ast::{ConfigBlock, NameEntry};
        use crate::token::Position;

        let diag = Diagnostics::new();
        let mut config = Config::default();
        config.apply_block(
            &ConfigBlock {
                name: None,
                options: vec![],
                name_entries: vec![NameEntry {
                    key: "CUSTOM_STYLE".to_string(),
                    spellings: vec!["@CSS".to_string()],
                    pos: Position::default(),
                }],
                origin_entries: vec![],
                pos: Position::default(),
            },
            "test.chtl",
            &diag,
        );

        let mut lexer = Lexer::new("@CSS", "test.chtl", &config, diag);
        let t = lexer.next_token();
        assert_eq!(t.kind, TokenKind::At(AtTag::Style));
        assert_eq!(t.value, "@CSS");
    }

    #[test]
    fn unquoted_literal_for_selector_like_text() {
        let tokens = lex_all("#main");
        assert_eq!(tokens[0].kind, TokenKind::UnquotedLiteral);
        assert_eq!(tokens[0].value, "#main");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Every emitted token's lexeme equals the source slice at
            /// its recorded offset (strings normalize escapes, so they
            /// are checked for offset sanity only).
            #[test]
            fn token_positions_round_trip(
                src in "[a-zA-Z0-9 \t\n{};:=.,()@\\[\\]&#/'\"_-]{0,80}"
            ) {
                let config = Config::default();
                let diag = Diagnostics::new();
                let mut lexer = Lexer::new(&src, "prop.chtl", &config, diag);

                loop {
                    let t = lexer.next_token();
                    if t.kind == TokenKind::Eof {
                        break;
                    }
                    prop_assert!(t.pos.offset + t.value.len() <= src.len());
                    if t.kind != TokenKind::StringLiteral {
                        prop_assert_eq!(
                            &src[t.pos.offset..t.pos.offset + t.value.len()],
                            t.value.as_str()
                        );
                    }
                }
            }
        }
    }
}
