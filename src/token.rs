//! Token kinds and the static keyword tables consulted by the lexer.

use std::collections::{HashMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;

/// A position in the source text.
///
/// `offset` is a byte offset; `line` and `column` are 1-based and are
/// what diagnostics print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Position {
        Position {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The reserved `[...]` keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BracketKeyword {
    Template,
    Custom,
    Origin,
    Import,
    Namespace,
    Configuration,
    Info,
    Export,
}

/// The `@`-prefixed type tags.
///
/// `Other` covers custom origin types declared through
/// `[Configuration].[OriginType]`; the token's `value` carries the
/// spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtTag {
    Style,
    Element,
    Var,
    Html,
    JavaScript,
    Chtl,
    CJmod,
    Config,
    Other,
}

/// Contextual keywords.
///
/// These only act as keywords in the positions the parser gives them;
/// every keyword token still carries its spelling in `value`, so the
/// parser can treat one as a plain identifier (e.g. an attribute named
/// `from`) where the grammar calls for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Text,
    Style,
    Script,
    Inherit,
    Delete,
    Insert,
    After,
    Before,
    Replace,
    At,
    Top,
    Bottom,
    From,
    As,
    Except,
    Listen,
    Delegate,
    Animate,
    Vir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    StringLiteral,
    UnquotedLiteral,

    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semicolon,
    Colon,
    Comma,
    Dot,
    Equal,
    Ampersand,

    DoubleLBrace,
    DoubleRBrace,
    Arrow,

    Bracket(BracketKeyword),
    At(AtTag),
    Keyword(Keyword),

    /// A `-- ...` comment; unlike the other two comment kinds this one
    /// survives into the AST and the generated HTML.
    GeneratorComment,

    Eof,
}

/// A single token.  Immutable after the lexer emits it.
///
/// `value` is the raw lexeme: string literals keep their quotes (use
/// [`Token::unquoted`]), generator comments keep the leading `--`.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub pos: Position,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, pos: Position) -> Token {
        Token {
            kind,
            value: value.into(),
            pos,
        }
    }

    pub fn eof(pos: Position) -> Token {
        Token::new(TokenKind::Eof, "", pos)
    }

    /// Whether this token may stand where the grammar wants a name:
    /// identifiers, numbers, and contextual keywords all qualify.
    pub fn is_name(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Identifier | TokenKind::Number | TokenKind::Keyword(_)
        )
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// For a string literal, the content between the quotes with escape
    /// sequences resolved.  For every other kind, the raw lexeme.
    pub fn unquoted(&self) -> String {
        if self.kind != TokenKind::StringLiteral {
            return self.value.clone();
        }

        let inner = if self.value.len() >= 2 {
            &self.value[1..self.value.len() - 1]
        } else {
            &self.value[..]
        };

        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        }
        out
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end of input"),
            _ => write!(f, "'{}'", self.value),
        }
    }
}

/// Spellings of the contextual keywords.
pub static KEYWORDS: Lazy<HashMap<&'static str, Keyword>> = Lazy::new(|| {
    use Keyword::*;

    let mut m = HashMap::new();
    m.insert("text", Text);
    m.insert("style", Style);
    m.insert("script", Script);
    m.insert("inherit", Inherit);
    m.insert("delete", Delete);
    m.insert("insert", Insert);
    m.insert("after", After);
    m.insert("before", Before);
    m.insert("replace", Replace);
    m.insert("at", At);
    m.insert("top", Top);
    m.insert("bottom", Bottom);
    m.insert("from", From);
    m.insert("as", As);
    m.insert("except", Except);
    m.insert("listen", Listen);
    m.insert("delegate", Delegate);
    m.insert("animate", Animate);
    m.insert("vir", Vir);
    m
});

/// Spellings of the reserved bracket keywords.  A `[` that does not open
/// one of these is an ordinary punctuation token.
pub static BRACKET_KEYWORDS: Lazy<HashMap<&'static str, BracketKeyword>> = Lazy::new(|| {
    use BracketKeyword::*;

    let mut m = HashMap::new();
    m.insert("[Template]", Template);
    m.insert("[Custom]", Custom);
    m.insert("[Origin]", Origin);
    m.insert("[Import]", Import);
    m.insert("[Namespace]", Namespace);
    m.insert("[Configuration]", Configuration);
    m.insert("[Info]", Info);
    m.insert("[Export]", Export);
    m
});

/// Built-in spellings of the `@` type tags.  `[Name]` rebindings extend
/// this set (they never shadow it); see the `config` module.
pub static AT_TAGS: Lazy<HashMap<&'static str, AtTag>> = Lazy::new(|| {
    use AtTag::*;

    let mut m = HashMap::new();
    m.insert("@Style", Style);
    m.insert("@Element", Element);
    m.insert("@Var", Var);
    m.insert("@Html", Html);
    m.insert("@JavaScript", JavaScript);
    m.insert("@Chtl", Chtl);
    m.insert("@CJmod", CJmod);
    m.insert("@Config", Config);
    m
});

/// The HTML void elements; these are emitted self-closing and may not
/// have a body.
pub static VOID_ELEMENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ]
    .iter()
    .copied()
    .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquoted_resolves_escapes() {
        let t = Token::new(
            TokenKind::StringLiteral,
            r#""a\"b\nc""#,
            Position::default(),
        );
        assert_eq!(t.unquoted(), "a\"b\nc");
    }

    #[test]
    fn keywords_are_names_too() {
        let t = Token::new(
            TokenKind::Keyword(Keyword::From),
            "from",
            Position::default(),
        );
        assert!(t.is_name());
    }

    #[test]
    fn bracket_keyword_table_is_complete() {
        assert_eq!(BRACKET_KEYWORDS.len(), 8);
        assert_eq!(BRACKET_KEYWORDS["[Template]"], BracketKeyword::Template);
    }
}
