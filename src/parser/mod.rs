//! The CHTL parser.
//!
//! Recursive descent with one token of lookahead over the pull-based
//! lexer.  The grammar for definitions (`[Template]`, `[Custom]`,
//! `[Import]`, ...) lives in the `definitions` child module; style-block
//! grammar lives in `style`.
//!
//! On a diagnostic the parser synchronizes to the next `;`, `}` or
//! bracket-keyword/`@`-tag and keeps going, so one malformed statement
//! does not hide the errors after it.  Every construct the parser
//! enters — file, element, attribute, style block, script block,
//! definition, namespace, comment — pushes a typed scope on the
//! compilation's [`StateManager`] through a guard that pops on drop,
//! so the scope stack is as deep on exit as on entry for every parsed
//! file, on every path including recovery.  Error messages are
//! decorated with the innermost scope's name.

mod definitions;
mod style;

use crate::ast::{self, Node, Separator, Value};
use crate::config::Config;
use crate::error::{DiagnosticKind, Diagnostics};
use crate::lexer::Lexer;
use crate::limits;
use crate::state::{ScopeKind, StateManager};
use crate::token::{AtTag, BracketKeyword, Keyword, Position, Token, TokenKind, VOID_ELEMENTS};

/// Parses one source file into a syntax tree.
///
/// Never fails as a whole: problems become diagnostics and the tree
/// contains whatever could be salvaged.  `states` is the compilation's
/// state manager; the parser records its scope nesting there.
pub fn parse_document(
    source: &str,
    file: &str,
    config: &Config,
    diagnostics: &Diagnostics,
    states: &StateManager,
) -> ast::Document {
    let lexer = Lexer::new(source, file, config, diagnostics.clone());
    let mut parser = Parser::new(lexer, file, diagnostics.clone(), states.clone());
    parser.run()
}

pub(crate) struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    peeked: Option<Token>,
    file: String,
    diagnostics: Diagnostics,
    depth: usize,

    /// Shared per-compilation scope/phase/node tracker.
    states: StateManager,
}

/// Which grammar position a `delete` statement occurred in; the same
/// surface syntax targets different things in style and element bodies.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeleteContext {
    Style,
    Element,
}

impl<'a> Parser<'a> {
    fn new(
        mut lexer: Lexer<'a>,
        file: &str,
        diagnostics: Diagnostics,
        states: StateManager,
    ) -> Parser<'a> {
        let current = lexer.next_token();
        Parser {
            lexer,
            current,
            peeked: None,
            file: file.to_string(),
            diagnostics,
            depth: 0,
            states,
        }
    }

    fn run(&mut self) -> ast::Document {
        let mut doc = ast::Document {
            filename: self.file.clone(),
            children: Vec::new(),
        };

        let entry_depth = self.states.scope_depth();
        {
            let _file_scope = self
                .states
                .push_scope(ScopeKind::File, Some(self.file.clone()));
            while !self.at(TokenKind::Eof) {
                if let Some(node) = self.parse_top_level(false) {
                    doc.children.push(node);
                }
            }
        }

        debug_assert_eq!(
            self.states.scope_depth(),
            entry_depth,
            "leaked parser scope"
        );
        doc
    }

    // ----- token plumbing -------------------------------------------------

    fn bump(&mut self) -> Token {
        let next = match self.peeked.take() {
            Some(t) => t,
            None => self.lexer.next_token(),
        };
        std::mem::replace(&mut self.current, next)
    }

    fn peek(&mut self) -> &Token {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token());
        }
        self.peeked.as_ref().unwrap()
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> bool {
        if self.eat(kind) {
            return true;
        }
        self.error_here(
            DiagnosticKind::MissingToken,
            format!("expected {what}, found {}", self.current),
        );
        false
    }

    fn error_here(&self, kind: DiagnosticKind, message: impl Into<String>) {
        let mut message = message.into();
        if let Some(scope) = self.states.current_scope_name() {
            message = format!("{message} (in {scope})");
        }
        if self.current.kind == TokenKind::Eof {
            self.diagnostics.error(
                DiagnosticKind::UnexpectedEof,
                &self.file,
                self.current.pos,
                message,
            );
        } else {
            self.diagnostics
                .error(kind, &self.file, self.current.pos, message);
        }
    }

    /// Skips to the next statement boundary: past a `;`, or up to a
    /// `}`, bracket keyword, or `@` tag.
    fn synchronize(&mut self) {
        loop {
            match self.current.kind {
                TokenKind::Semicolon => {
                    self.bump();
                    return;
                }
                TokenKind::RBrace | TokenKind::Bracket(_) | TokenKind::At(_) | TokenKind::Eof => {
                    return
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Raw-captures the body of the block whose `{` is the current
    /// token, then resumes normal tokenization after the matching `}`.
    fn capture_block_body(&mut self) -> (String, Position) {
        debug_assert!(self.at(TokenKind::LBrace));
        debug_assert!(self.peeked.is_none(), "raw capture with a pending token");
        let result = self.lexer.capture_block();
        self.current = self.lexer.next_token();
        result
    }

    /// Raw-captures a free-form value.  The current token must be the
    /// separator (`:` or `=`) just consumed from the lexer.
    fn take_raw_value(&mut self) -> (String, Position) {
        debug_assert!(self.peeked.is_none(), "raw capture with a pending token");
        let result = self.lexer.capture_value();
        self.current = self.lexer.next_token();
        result
    }

    /// Raw-captures an import path.
    fn take_raw_path(&mut self) -> (String, Position) {
        debug_assert!(self.peeked.is_none(), "raw capture with a pending token");
        let result = self.lexer.capture_path();
        self.current = self.lexer.next_token();
        result
    }

    /// Name of the current token when it can serve as a name.
    fn expect_name(&mut self, what: &str) -> Option<Token> {
        if self.current.is_name() || self.at(TokenKind::UnquotedLiteral) {
            return Some(self.bump());
        }
        self.error_here(
            DiagnosticKind::MissingToken,
            format!("expected {what}, found {}", self.current),
        );
        None
    }

    // ----- top level ------------------------------------------------------

    fn parse_top_level(&mut self, in_namespace: bool) -> Option<Node> {
        let current_kind = self.current.kind;
        match current_kind {
            TokenKind::GeneratorComment => Some(self.parse_generator_comment()),

            TokenKind::Bracket(BracketKeyword::Template) => self.parse_template(),
            TokenKind::Bracket(BracketKeyword::Custom) => self.parse_custom(),
            TokenKind::Bracket(BracketKeyword::Origin) => self.parse_origin().map(Node::Origin),
            TokenKind::Bracket(BracketKeyword::Import) => self.parse_import().map(Node::Import),
            TokenKind::Bracket(BracketKeyword::Namespace) => self.parse_namespace(in_namespace),
            TokenKind::Bracket(BracketKeyword::Configuration) => self.parse_configuration(),
            TokenKind::Bracket(BracketKeyword::Info) => self.parse_info(),
            TokenKind::Bracket(BracketKeyword::Export) => self.parse_export(),

            TokenKind::At(AtTag::Element) => self.parse_element_ref().map(Node::ElementRef),

            TokenKind::Keyword(Keyword::Style) if self.peek().kind == TokenKind::LBrace => {
                self.bump();
                self.parse_style_block(false).map(Node::Style)
            }
            TokenKind::Keyword(Keyword::Script) if self.peek().kind == TokenKind::LBrace => {
                Some(Node::Script(self.parse_script_block(false)))
            }
            TokenKind::Keyword(Keyword::Text) if self.peek().kind == TokenKind::LBrace => {
                Some(Node::Text(self.parse_text_block()))
            }
            TokenKind::Keyword(Keyword::Except) => self.parse_except().map(Node::Except),

            _ if self.current.is_name()
                && matches!(self.peek().kind, TokenKind::LBrace | TokenKind::Semicolon) =>
            {
                self.parse_element().map(Node::Element)
            }

            TokenKind::Eof => None,

            _ => {
                self.error_here(
                    DiagnosticKind::UnexpectedToken,
                    format!("unexpected {}", self.current),
                );
                self.bump();
                self.synchronize();
                None
            }
        }
    }

    fn parse_generator_comment(&mut self) -> Node {
        let token = self.bump();
        let _scope = self.states.push_scope(ScopeKind::Comment, None);
        let text = token.value.trim_start_matches('-').trim().to_string();
        Node::Comment(ast::Comment {
            kind: ast::CommentKind::Generator,
            text,
            pos: token.pos,
        })
    }

    // ----- elements -------------------------------------------------------

    fn parse_element(&mut self) -> Option<ast::Element> {
        let tag_token = self.bump();
        let pos = tag_token.pos;
        let tag = tag_token.value;

        let mut element = ast::Element::new(tag, pos);
        element.self_closing = VOID_ELEMENTS.contains(element.tag.as_str());

        // `br;` — an explicitly body-less element.
        if self.eat(TokenKind::Semicolon) {
            element.self_closing = true;
            return Some(element);
        }

        if !self.expect(TokenKind::LBrace, "'{'") {
            self.synchronize();
            return None;
        }

        if self.depth >= limits::MAX_BLOCK_NESTING_DEPTH {
            self.error_here(
                DiagnosticKind::UnexpectedToken,
                crate::error::ImplementationLimit::NestingTooDeep.to_string(),
            );
            // Skip the whole body instead of recursing into it.
            let mut depth = 1;
            while depth > 0 && !self.at(TokenKind::Eof) {
                match self.current.kind {
                    TokenKind::LBrace => depth += 1,
                    TokenKind::RBrace => depth -= 1,
                    _ => {}
                }
                self.bump();
            }
            return None;
        }

        self.depth += 1;
        let _element_scope = self
            .states
            .push_scope(ScopeKind::Element, Some(element.tag.clone()));
        self.parse_element_body(&mut element);
        self.depth -= 1;

        if !self.eat(TokenKind::RBrace) {
            self.error_here(DiagnosticKind::UnexpectedEof, "expected '}'");
        }

        Some(element)
    }

    fn parse_element_body(&mut self, element: &mut ast::Element) {
        loop {
            let current_kind = self.current.kind;
            match current_kind {
                TokenKind::RBrace | TokenKind::Eof => return,

                TokenKind::GeneratorComment => {
                    let comment = self.parse_generator_comment();
                    element.children.push(comment);
                }

                TokenKind::Keyword(Keyword::Text) if self.peek().kind == TokenKind::LBrace => {
                    let text = self.parse_text_block();
                    element.children.push(Node::Text(text));
                }

                TokenKind::Keyword(Keyword::Style) if self.peek().kind == TokenKind::LBrace => {
                    let pos = self.current.pos;
                    self.bump();
                    if let Some(block) = self.parse_style_block(true) {
                        if element.style.is_some() {
                            self.diagnostics.error(
                                DiagnosticKind::DuplicateDefinition,
                                &self.file,
                                pos,
                                format!(
                                    "element '{}' already has a local style block",
                                    element.tag
                                ),
                            );
                        } else {
                            element.style = Some(block);
                        }
                    }
                }

                TokenKind::Keyword(Keyword::Script) if self.peek().kind == TokenKind::LBrace => {
                    let pos = self.current.pos;
                    let block = self.parse_script_block(true);
                    if element.script.is_some() {
                        self.diagnostics.error(
                            DiagnosticKind::DuplicateDefinition,
                            &self.file,
                            pos,
                            format!("element '{}' already has a local script block", element.tag),
                        );
                    } else {
                        element.script = Some(block);
                    }
                }

                TokenKind::Bracket(BracketKeyword::Origin) => {
                    if let Some(origin) = self.parse_origin() {
                        element.children.push(Node::Origin(origin));
                    }
                }

                TokenKind::At(AtTag::Element) => {
                    if let Some(r) = self.parse_element_ref() {
                        element.children.push(Node::ElementRef(r));
                    }
                }

                TokenKind::At(_) => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!(
                            "{} is not allowed directly in an element body",
                            self.current
                        ),
                    );
                    self.bump();
                    self.synchronize();
                }

                TokenKind::Keyword(Keyword::Except) => {
                    if let Some(e) = self.parse_except() {
                        element.children.push(Node::Except(e));
                    }
                }

                _ if self.current.is_name() => match self.peek().kind {
                    TokenKind::Colon | TokenKind::Equal => {
                        if let Some(attr) = self.parse_attribute() {
                            element.attributes.push(attr);
                        }
                    }
                    TokenKind::LBrace | TokenKind::Semicolon => {
                        if let Some(child) = self.parse_element() {
                            element.children.push(Node::Element(child));
                        }
                    }
                    _ => {
                        self.error_here(
                            DiagnosticKind::UnexpectedToken,
                            format!("unexpected {} in element body", self.current),
                        );
                        self.bump();
                        self.synchronize();
                    }
                },

                _ => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected {} in element body", self.current),
                    );
                    self.bump();
                    self.synchronize();
                }
            }
        }
    }

    fn parse_attribute(&mut self) -> Option<ast::Attribute> {
        let name_token = self.bump();
        let _scope = self
            .states
            .push_scope(ScopeKind::Attribute, Some(name_token.value.clone()));
        let separator = match self.current.kind {
            TokenKind::Colon => Separator::Colon,
            TokenKind::Equal => Separator::Equal,
            _ => unreachable!("caller checked the separator"),
        };

        let (raw, _) = self.take_raw_value();
        let value = Value::from_raw(&raw);

        if !self.at(TokenKind::RBrace) {
            self.expect(TokenKind::Semicolon, "';'");
        }

        Some(ast::Attribute {
            name: name_token.value,
            value,
            separator,
            pos: name_token.pos,
        })
    }

    fn parse_text_block(&mut self) -> ast::Text {
        let text_token = self.bump(); // `text`
        debug_assert!(self.at(TokenKind::LBrace));
        let (content, _) = self.capture_block_body();

        ast::Text {
            value: Value::from_raw(&content),
            pos: text_token.pos,
        }
    }

    fn parse_script_block(&mut self, is_local: bool) -> ast::ScriptBlock {
        let script_token = self.bump(); // `script`
        let _scope = self
            .states
            .push_scope(ScopeKind::ScriptBlock, Some("script".to_string()));
        debug_assert!(self.at(TokenKind::LBrace));
        let (content, _) = self.capture_block_body();

        ast::ScriptBlock {
            is_local,
            content,
            pos: script_token.pos,
        }
    }

    // ----- shared small grammars -----------------------------------------

    /// `a.b` or `a::b`, normalized to `a::b`.
    fn parse_namespace_path(&mut self) -> Option<String> {
        let first = self.expect_name("a namespace name")?;
        let mut parts = vec![first.value];

        loop {
            if self.at(TokenKind::Dot) {
                self.bump();
            } else if self.at(TokenKind::Colon) && self.peek().kind == TokenKind::Colon {
                self.bump();
                self.bump();
            } else {
                break;
            }
            let part = self.expect_name("a namespace name")?;
            parts.push(part.value);
        }

        Some(parts.join("::"))
    }

    /// `name` or `name[index]`.
    fn parse_child_selector(&mut self) -> Option<ast::ChildSelector> {
        let name = self.expect_name("a child selector")?;
        let index = self.parse_index_suffix();
        Some(ast::ChildSelector {
            name: name.value,
            index,
        })
    }

    fn parse_index_suffix(&mut self) -> Option<usize> {
        if !self.at(TokenKind::LBracket) {
            return None;
        }
        self.bump();
        let index = if self.at(TokenKind::Number) {
            self.bump().value.parse::<usize>().ok()
        } else {
            self.error_here(DiagnosticKind::MissingToken, "expected an index");
            None
        };
        self.expect(TokenKind::RBracket, "']'");
        index
    }

    /// A node list inside `{ }` for element-like bodies: template
    /// element bodies, insert payloads, and so on.  Consumes the
    /// closing `}`.
    fn parse_node_list_until_rbrace(&mut self) -> Vec<Node> {
        let mut nodes = Vec::new();

        loop {
            let current_kind = self.current.kind;
            match current_kind {
                TokenKind::RBrace => {
                    self.bump();
                    return nodes;
                }
                TokenKind::Eof => {
                    self.error_here(DiagnosticKind::UnexpectedEof, "expected '}'");
                    return nodes;
                }
                TokenKind::GeneratorComment => {
                    let c = self.parse_generator_comment();
                    nodes.push(c);
                }
                TokenKind::Keyword(Keyword::Text) if self.peek().kind == TokenKind::LBrace => {
                    let t = self.parse_text_block();
                    nodes.push(Node::Text(t));
                }
                TokenKind::Bracket(BracketKeyword::Origin) => {
                    if let Some(o) = self.parse_origin() {
                        nodes.push(Node::Origin(o));
                    }
                }
                TokenKind::At(AtTag::Element) => {
                    if let Some(r) = self.parse_element_ref() {
                        nodes.push(Node::ElementRef(r));
                    }
                }
                _ if self.current.is_name()
                    && matches!(self.peek().kind, TokenKind::LBrace | TokenKind::Semicolon) =>
                {
                    if let Some(e) = self.parse_element() {
                        nodes.push(Node::Element(e));
                    }
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected {}", self.current),
                    );
                    self.bump();
                    self.synchronize();
                }
            }
        }
    }

    /// `@Element Name [from ns] ;` or with a specialization body.
    fn parse_element_ref(&mut self) -> Option<ast::ElementReference> {
        let at_token = self.bump(); // `@Element`
        let name = self.expect_name("an element template name")?;

        let mut reference = ast::ElementReference {
            name: name.value,
            namespace: None,
            specializations: Vec::new(),
            inserts: Vec::new(),
            deletes: Vec::new(),
            pos: at_token.pos,
        };

        if self.at(TokenKind::Keyword(Keyword::From)) {
            self.bump();
            reference.namespace = self.parse_namespace_path();
        }

        if self.eat(TokenKind::Semicolon) {
            return Some(reference);
        }

        if !self.expect(TokenKind::LBrace, "';' or '{'") {
            self.synchronize();
            return Some(reference);
        }

        let _scope = self.states.push_scope(
            ScopeKind::Element,
            Some(format!("@Element {}", reference.name)),
        );
        loop {
            match self.current.kind {
                TokenKind::RBrace => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => {
                    self.error_here(DiagnosticKind::UnexpectedEof, "expected '}'");
                    break;
                }
                TokenKind::GeneratorComment => {
                    self.bump();
                }
                TokenKind::Keyword(Keyword::Insert) => {
                    if let Some(i) = self.parse_insert() {
                        reference.inserts.push(i);
                    }
                }
                TokenKind::Keyword(Keyword::Delete) => {
                    if let Some(d) = self.parse_delete(DeleteContext::Element) {
                        reference.deletes.push(d);
                    }
                }
                _ if self.current.is_name() => {
                    if let Some(specialization) = self.parse_element_specialization() {
                        reference.specializations.push(specialization);
                    }
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected {} in element specialization", self.current),
                    );
                    self.bump();
                    self.synchronize();
                }
            }
        }

        Some(reference)
    }

    /// `div[0] { ... }` inside an element-reference body.
    fn parse_element_specialization(&mut self) -> Option<ast::ElementSpecialization> {
        let pos = self.current.pos;
        let selector = self.parse_child_selector()?;

        if !self.expect(TokenKind::LBrace, "'{'") {
            self.synchronize();
            return None;
        }

        let mut element = ast::Element::new(selector.name.clone(), pos);
        self.depth += 1;
        self.parse_element_body(&mut element);
        self.depth -= 1;

        if !self.eat(TokenKind::RBrace) {
            self.error_here(DiagnosticKind::UnexpectedEof, "expected '}'");
        }

        Some(ast::ElementSpecialization {
            selector,
            element,
            pos,
        })
    }

    /// `insert after div[0] { ... }` and friends.
    fn parse_insert(&mut self) -> Option<ast::Insert> {
        let insert_token = self.bump(); // `insert`

        let position = match self.current.kind {
            TokenKind::Keyword(Keyword::After) => {
                self.bump();
                ast::InsertPosition::After
            }
            TokenKind::Keyword(Keyword::Before) => {
                self.bump();
                ast::InsertPosition::Before
            }
            TokenKind::Keyword(Keyword::Replace) => {
                self.bump();
                ast::InsertPosition::Replace
            }
            TokenKind::Keyword(Keyword::At) => {
                self.bump();
                match self.current.kind {
                    TokenKind::Keyword(Keyword::Top) => {
                        self.bump();
                        ast::InsertPosition::AtTop
                    }
                    TokenKind::Keyword(Keyword::Bottom) => {
                        self.bump();
                        ast::InsertPosition::AtBottom
                    }
                    _ => {
                        self.error_here(
                            DiagnosticKind::MissingToken,
                            "expected 'top' or 'bottom' after 'at'",
                        );
                        self.synchronize();
                        return None;
                    }
                }
            }
            _ => {
                self.error_here(
                    DiagnosticKind::MissingToken,
                    "expected 'after', 'before', 'replace', 'at top' or 'at bottom'",
                );
                self.synchronize();
                return None;
            }
        };

        let target = match position {
            ast::InsertPosition::AtTop | ast::InsertPosition::AtBottom => None,
            _ => Some(self.parse_child_selector()?),
        };

        if !self.expect(TokenKind::LBrace, "'{'") {
            self.synchronize();
            return None;
        }

        let content = self.parse_node_list_until_rbrace();

        Some(ast::Insert {
            position,
            target,
            content,
            pos: insert_token.pos,
        })
    }

    /// `delete x, y;` — target interpretation depends on context.
    fn parse_delete(&mut self, context: DeleteContext) -> Option<ast::Delete> {
        let delete_token = self.bump(); // `delete`
        let mut targets = Vec::new();

        loop {
            match self.current.kind {
                TokenKind::At(AtTag::Style) => {
                    self.bump();
                    if let Some(name) = self.expect_name("a style name") {
                        targets.push(match context {
                            DeleteContext::Style => {
                                ast::DeleteTarget::Inheritance(ast::DefKind::Style, name.value)
                            }
                            DeleteContext::Element => ast::DeleteTarget::StyleRef(name.value),
                        });
                    }
                }
                TokenKind::At(AtTag::Element) => {
                    self.bump();
                    if let Some(name) = self.expect_name("an element name") {
                        targets.push(ast::DeleteTarget::ElementRef(name.value));
                    }
                }
                TokenKind::At(AtTag::Var) => {
                    self.bump();
                    if let Some(name) = self.expect_name("a variable group name") {
                        targets.push(ast::DeleteTarget::Inheritance(
                            ast::DefKind::Var,
                            name.value,
                        ));
                    }
                }
                _ if self.current.is_name() || self.at(TokenKind::UnquotedLiteral) => {
                    let name = self.bump();
                    let index = self.parse_index_suffix();
                    targets.push(match context {
                        DeleteContext::Style => ast::DeleteTarget::Property(name.value),
                        DeleteContext::Element => ast::DeleteTarget::Element(ast::ChildSelector {
                            name: name.value,
                            index,
                        }),
                    });
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::MissingToken,
                        format!("expected a delete target, found {}", self.current),
                    );
                    self.synchronize();
                    break;
                }
            }

            if self.eat(TokenKind::Comma) {
                continue;
            }
            if !self.at(TokenKind::RBrace) {
                self.expect(TokenKind::Semicolon, "';'");
            }
            break;
        }

        if targets.is_empty() {
            return None;
        }

        Some(ast::Delete {
            targets,
            pos: delete_token.pos,
        })
    }

    /// `except span, @Html, [Custom] @Element Box;`
    fn parse_except(&mut self) -> Option<ast::Except> {
        let except_token = self.bump(); // `except`
        let mut targets = Vec::new();

        loop {
            match self.current.kind {
                TokenKind::Bracket(kw @ (BracketKeyword::Custom | BracketKeyword::Template)) => {
                    let is_custom = kw == BracketKeyword::Custom;
                    let group = self.bump().value;

                    let kind = match self.current.kind {
                        TokenKind::At(AtTag::Style) => Some(ast::DefKind::Style),
                        TokenKind::At(AtTag::Element) => Some(ast::DefKind::Element),
                        TokenKind::At(AtTag::Var) => Some(ast::DefKind::Var),
                        _ => None,
                    };

                    match kind {
                        Some(kind) => {
                            self.bump();
                            if let Some(name) = self.expect_name("a definition name") {
                                targets.push(ast::ExceptTarget::Specific {
                                    is_custom,
                                    kind,
                                    name: name.value,
                                });
                            }
                        }
                        None => targets.push(ast::ExceptTarget::Type(group)),
                    }
                }
                TokenKind::At(_) => {
                    let tag = self.bump();
                    targets.push(ast::ExceptTarget::Type(tag.value));
                }
                _ if self.current.is_name() => {
                    let name = self.bump();
                    targets.push(ast::ExceptTarget::Element(name.value));
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::MissingToken,
                        format!("expected a constraint target, found {}", self.current),
                    );
                    self.synchronize();
                    break;
                }
            }

            if self.eat(TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::Semicolon, "';'");
            break;
        }

        if targets.is_empty() {
            return None;
        }

        Some(ast::Except {
            targets,
            pos: except_token.pos,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;

    pub(crate) fn parse_ok(src: &str) -> ast::Document {
        let config = Config::default();
        let diag = Diagnostics::new();
        let states = StateManager::new();
        let doc = parse_document(src, "test.chtl", &config, &diag, &states);
        assert_eq!(states.scope_depth(), 0, "leaked parser scope");
        let errors = diag.snapshot();
        assert!(
            errors.is_empty(),
            "unexpected diagnostics: {:?}",
            errors.iter().map(|d| d.to_string()).collect::<Vec<_>>()
        );
        doc
    }

    pub(crate) fn parse_with_diagnostics(src: &str) -> (ast::Document, Diagnostics) {
        let config = Config::default();
        let diag = Diagnostics::new();
        let states = StateManager::new();
        let doc = parse_document(src, "test.chtl", &config, &diag, &states);
        assert_eq!(states.scope_depth(), 0, "leaked parser scope");
        (doc, diag)
    }

    fn first_element(doc: &ast::Document) -> &ast::Element {
        doc.children
            .iter()
            .find_map(|n| match n {
                Node::Element(e) => Some(e),
                _ => None,
            })
            .expect("no element parsed")
    }

    #[test]
    fn attribute_with_colon_and_equal_parse_the_same() {
        let a = parse_ok(r#"div { id : "main" ; }"#);
        let b = parse_ok(r#"div { id = "main" ; }"#);

        let ea = first_element(&a);
        let eb = first_element(&b);
        assert_eq!(ea.attributes[0].name, "id");
        assert_eq!(ea.attributes[0].value.text, "main");
        assert!(ea.attributes[0].value.quoted);
        assert_eq!(ea.attributes[0].value, eb.attributes[0].value);
        assert_eq!(ea.attributes[0].separator, Separator::Colon);
        assert_eq!(eb.attributes[0].separator, Separator::Equal);
    }

    #[test]
    fn unquoted_attribute_value() {
        let doc = parse_ok("a { href: https://example.com/x?y=1; }");
        let e = first_element(&doc);
        assert_eq!(e.attributes[0].value.text, "https://example.com/x?y=1");
        assert!(!e.attributes[0].value.quoted);
    }

    #[test]
    fn nested_elements_and_text() {
        let doc = parse_ok("div { span { text { \"hi\" } } }");
        let e = first_element(&doc);
        assert_eq!(e.children.len(), 1);
        match &e.children[0] {
            Node::Element(span) => match &span.children[0] {
                Node::Text(t) => {
                    assert_eq!(t.value.text, "hi");
                    assert!(t.value.quoted);
                }
                other => panic!("expected text, got {other:?}"),
            },
            other => panic!("expected span, got {other:?}"),
        }
    }

    #[test]
    fn void_element_takes_attributes_but_is_self_closing() {
        let doc = parse_ok("img { src: x.png; }");
        let e = first_element(&doc);
        assert!(e.self_closing);
        assert_eq!(e.attributes[0].name, "src");
    }

    #[test]
    fn semicolon_element_is_self_closing() {
        let doc = parse_ok("div { br; }");
        let e = first_element(&doc);
        match &e.children[0] {
            Node::Element(br) => assert!(br.self_closing),
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn script_block_content_is_opaque() {
        let doc = parse_ok("div { script { let a = { b: 1 }; if (a) { f(a); } } }");
        let e = first_element(&doc);
        let script = e.script.as_ref().expect("script");
        assert!(script.is_local);
        assert!(script.content.contains("let a = { b: 1 };"));
        assert!(script.content.contains("if (a) { f(a); }"));
    }

    #[test]
    fn duplicate_local_style_reports() {
        let (_, diag) = parse_with_diagnostics("div { style { } style { } }");
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn recovery_continues_after_bad_statement() {
        let (doc, diag) = parse_with_diagnostics("div { ??? ; id: main; }");
        assert!(diag.error_count() >= 1);
        let e = first_element(&doc);
        assert!(e.attributes.iter().any(|a| a.name == "id"));
    }

    #[test]
    fn element_ref_with_specialization() {
        let doc = parse_ok(
            "body { @Element Box { div[1] { id: second; } insert after div[0] { span { } } delete p; } }",
        );
        let e = first_element(&doc);
        match &e.children[0] {
            Node::ElementRef(r) => {
                assert_eq!(r.name, "Box");
                assert_eq!(r.specializations.len(), 1);
                assert_eq!(r.specializations[0].selector.index, Some(1));
                assert_eq!(r.inserts.len(), 1);
                assert_eq!(r.deletes.len(), 1);
            }
            other => panic!("expected element ref, got {other:?}"),
        }
    }

    #[test]
    fn except_targets() {
        let doc = parse_ok("div { except span, @Html, [Custom] @Element Box; }");
        let e = first_element(&doc);
        match &e.children[0] {
            Node::Except(x) => {
                assert_eq!(x.targets.len(), 3);
                assert_eq!(x.targets[0], ast::ExceptTarget::Element("span".into()));
                assert_eq!(x.targets[1], ast::ExceptTarget::Type("@Html".into()));
                assert_eq!(
                    x.targets[2],
                    ast::ExceptTarget::Specific {
                        is_custom: true,
                        kind: ast::DefKind::Element,
                        name: "Box".into()
                    }
                );
            }
            other => panic!("expected except, got {other:?}"),
        }
    }

    #[test]
    fn global_script_is_a_node() {
        let doc = parse_ok("script { console.log(1); }");
        assert!(matches!(doc.children[0], Node::Script(ref s) if !s.is_local));
    }
}
