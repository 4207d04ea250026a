//! Grammar for the bracket-keyword definitions: `[Template]`,
//! `[Custom]`, `[Origin]`, `[Import]`, `[Namespace]`,
//! `[Configuration]`, `[Info]` and `[Export]`.

use super::{DeleteContext, Parser};
use crate::ast::{
    self, ConfigBlock, ConfigOption, Custom, DefBody, DefKind, ExportBlock, ExportEntry, Import,
    ImportKind, InfoBlock, Inherit, NameEntry, Node, Origin, OriginType, StyleDefBody, Template,
    Value, Variable,
};
use crate::error::DiagnosticKind;
use crate::state::ScopeKind;
use crate::token::{AtTag, BracketKeyword, Keyword, TokenKind};

impl<'a> Parser<'a> {
    fn parse_def_kind(&mut self) -> Option<DefKind> {
        let kind = match self.current.kind {
            TokenKind::At(AtTag::Style) => DefKind::Style,
            TokenKind::At(AtTag::Element) => DefKind::Element,
            TokenKind::At(AtTag::Var) => DefKind::Var,
            _ => {
                self.error_here(
                    DiagnosticKind::MalformedDefinition,
                    format!(
                        "expected '@Style', '@Element' or '@Var', found {}",
                        self.current
                    ),
                );
                self.synchronize();
                return None;
            }
        };
        self.bump();
        Some(kind)
    }

    pub(super) fn parse_template(&mut self) -> Option<Node> {
        self.bump(); // `[Template]`
        let kind = self.parse_def_kind()?;
        let name = self.expect_name("a template name")?;

        if !self.expect(TokenKind::LBrace, "'{'") {
            self.synchronize();
            return None;
        }

        let _scope = self.states.push_scope(
            ScopeKind::Template,
            Some(format!("[Template] {} {}", kind.as_str(), name.value)),
        );

        let mut template = Template {
            kind,
            name: name.value,
            inherits: Vec::new(),
            body: DefBody::Var(Vec::new()),
            pos: name.pos,
        };

        match kind {
            DefKind::Style => {
                let mut body = StyleDefBody::default();
                self.parse_style_def_body(&mut body, None, &mut template.inherits);

                // In a template body, every property must carry a value.
                for d in &body.declarations {
                    if d.value.is_none() {
                        self.diagnostics.error(
                            DiagnosticKind::MalformedDefinition,
                            &self.file,
                            d.pos,
                            format!(
                                "value-less property '{}' is only allowed in a [Custom] style",
                                d.property
                            ),
                        );
                    }
                }

                // A bare `@Style X;` in the body is inheritance; the
                // references list is that record.  `inherits` carries
                // only explicit `inherit` statements, which have no
                // specialization payload.
                template.body = DefBody::Style(body);
            }
            DefKind::Element => {
                let children = self.parse_node_list_until_rbrace();
                template.body = DefBody::Element(children);
            }
            DefKind::Var => {
                template.body = DefBody::Var(self.parse_variable_list(&mut template.inherits));
            }
        }

        Some(Node::Template(template))
    }

    pub(super) fn parse_custom(&mut self) -> Option<Node> {
        self.bump(); // `[Custom]`
        let kind = self.parse_def_kind()?;
        let name = self.expect_name("a custom name")?;

        if !self.expect(TokenKind::LBrace, "'{'") {
            self.synchronize();
            return None;
        }

        let _scope = self.states.push_scope(
            ScopeKind::Custom,
            Some(format!("[Custom] {} {}", kind.as_str(), name.value)),
        );

        let mut custom = Custom {
            kind,
            name: name.value,
            inherits: Vec::new(),
            body: DefBody::Var(Vec::new()),
            inserts: Vec::new(),
            deletes: Vec::new(),
            pos: name.pos,
        };

        match kind {
            DefKind::Style => {
                let mut body = StyleDefBody::default();
                let mut deletes = Vec::new();
                self.parse_style_def_body(&mut body, Some(&mut deletes), &mut custom.inherits);
                custom.body = DefBody::Style(body);
                custom.deletes = deletes;
            }
            DefKind::Element => {
                self.parse_custom_element_body(&mut custom);
            }
            DefKind::Var => {
                let mut inherits = std::mem::take(&mut custom.inherits);
                custom.body = DefBody::Var(self.parse_variable_list(&mut inherits));
                custom.inherits = inherits;
            }
        }

        Some(Node::Custom(custom))
    }

    /// Shared body for `[Template] @Style` and `[Custom] @Style`.
    /// Deletes are only collected when the caller passes a sink
    /// (customs); otherwise they are reported.  Explicit `inherit`
    /// statements go straight to `inherits`.
    fn parse_style_def_body(
        &mut self,
        body: &mut StyleDefBody,
        mut deletes: Option<&mut Vec<ast::Delete>>,
        inherits: &mut Vec<Inherit>,
    ) {
        loop {
            match self.current.kind {
                TokenKind::RBrace => {
                    self.bump();
                    return;
                }
                TokenKind::Eof => {
                    self.error_here(DiagnosticKind::UnexpectedEof, "expected '}'");
                    return;
                }
                TokenKind::GeneratorComment => {
                    self.bump();
                }
                TokenKind::At(AtTag::Style) => {
                    if let Some(r) = self.parse_style_reference(false) {
                        body.references.push(r);
                    }
                }
                TokenKind::Keyword(Keyword::Inherit) => {
                    self.bump();
                    self.parse_inherit_tail(DefKind::Style, inherits);
                }
                TokenKind::Keyword(Keyword::Delete) => match deletes.as_mut() {
                    Some(sink) => {
                        if let Some(d) = self.parse_delete(DeleteContext::Style) {
                            sink.push(d);
                        }
                    }
                    None => {
                        self.error_here(
                            DiagnosticKind::DisallowedInContext,
                            "'delete' is only allowed in a [Custom] style body",
                        );
                        let _ = self.parse_delete(DeleteContext::Style);
                    }
                },
                _ if self.current.is_name() || self.at(TokenKind::UnquotedLiteral) => {
                    if let Some(d) = self.parse_declaration() {
                        body.declarations.push(d);
                    }
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected {} in style definition", self.current),
                    );
                    self.bump();
                    self.synchronize();
                }
            }
        }
    }

    /// The tail of `inherit [Template|Custom] @Kind Name;`.
    fn parse_inherit_tail(&mut self, expected_kind: DefKind, inherits: &mut Vec<Inherit>) {
        let is_template = match self.current.kind {
            TokenKind::Bracket(BracketKeyword::Template) => {
                self.bump();
                true
            }
            TokenKind::Bracket(BracketKeyword::Custom) => {
                self.bump();
                false
            }
            _ => true,
        };

        let kind = match self.parse_def_kind() {
            Some(k) => k,
            None => return,
        };
        if kind != expected_kind {
            self.error_here(
                DiagnosticKind::SymbolKindMismatch,
                format!(
                    "cannot inherit {} into a {} definition",
                    kind.as_str(),
                    expected_kind.as_str()
                ),
            );
        }

        let Some(name) = self.expect_name("a definition name") else {
            self.synchronize();
            return;
        };
        self.expect(TokenKind::Semicolon, "';'");

        inherits.push(Inherit {
            kind,
            name: name.value,
            is_template,
            pos: name.pos,
        });
    }

    fn parse_custom_element_body(&mut self, custom: &mut Custom) {
        let mut children = Vec::new();

        loop {
            let current_kind = self.current.kind;
            match current_kind {
                TokenKind::RBrace => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => {
                    self.error_here(DiagnosticKind::UnexpectedEof, "expected '}'");
                    break;
                }
                TokenKind::GeneratorComment => {
                    let c = self.parse_generator_comment();
                    children.push(c);
                }
                TokenKind::Keyword(Keyword::Insert) => {
                    if let Some(i) = self.parse_insert() {
                        custom.inserts.push(i);
                    }
                }
                TokenKind::Keyword(Keyword::Delete) => {
                    if let Some(d) = self.parse_delete(DeleteContext::Element) {
                        custom.deletes.push(d);
                    }
                }
                TokenKind::Keyword(Keyword::Inherit) => {
                    self.bump();
                    self.parse_inherit_tail(DefKind::Element, &mut custom.inherits);
                }
                TokenKind::Keyword(Keyword::Except) => {
                    if let Some(e) = self.parse_except() {
                        children.push(Node::Except(e));
                    }
                }
                TokenKind::Keyword(Keyword::Text) if self.peek().kind == TokenKind::LBrace => {
                    let t = self.parse_text_block();
                    children.push(Node::Text(t));
                }
                TokenKind::At(AtTag::Element) => {
                    if let Some(r) = self.parse_element_ref() {
                        children.push(Node::ElementRef(r));
                    }
                }
                TokenKind::Bracket(BracketKeyword::Origin) => {
                    if let Some(o) = self.parse_origin() {
                        children.push(Node::Origin(o));
                    }
                }
                _ if self.current.is_name()
                    && matches!(self.peek().kind, TokenKind::LBrace | TokenKind::Semicolon) =>
                {
                    if let Some(e) = self.parse_element() {
                        children.push(Node::Element(e));
                    }
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected {} in custom element body", self.current),
                    );
                    self.bump();
                    self.synchronize();
                }
            }
        }

        custom.body = DefBody::Element(children);
    }

    /// `name: value; ...` until `}`.  A `@Var Other;` entry records
    /// group inheritance.  Consumes the closing brace.
    fn parse_variable_list(&mut self, inherits: &mut Vec<Inherit>) -> Vec<Variable> {
        let mut variables = Vec::new();

        loop {
            match self.current.kind {
                TokenKind::RBrace => {
                    self.bump();
                    return variables;
                }
                TokenKind::Eof => {
                    self.error_here(DiagnosticKind::UnexpectedEof, "expected '}'");
                    return variables;
                }
                TokenKind::GeneratorComment => {
                    self.bump();
                }
                TokenKind::At(AtTag::Var) => {
                    self.bump();
                    if let Some(name) = self.expect_name("a variable group name") {
                        self.expect(TokenKind::Semicolon, "';'");
                        inherits.push(Inherit {
                            kind: DefKind::Var,
                            name: name.value,
                            is_template: true,
                            pos: name.pos,
                        });
                    }
                }
                TokenKind::Keyword(Keyword::Inherit) => {
                    self.bump();
                    self.parse_inherit_tail(DefKind::Var, inherits);
                }
                _ if self.current.is_name() => {
                    if let Some(d) = self.parse_declaration() {
                        let value = match d.value {
                            Some(raw) => Value::from_raw(&raw),
                            None => {
                                self.diagnostics.error(
                                    DiagnosticKind::MalformedDefinition,
                                    &self.file,
                                    d.pos,
                                    format!("variable '{}' needs a value", d.property),
                                );
                                Value::unquoted("")
                            }
                        };
                        variables.push(Variable {
                            name: d.property,
                            value,
                            pos: d.pos,
                        });
                    }
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected {} in variable group", self.current),
                    );
                    self.bump();
                    self.synchronize();
                }
            }
        }
    }

    /// `[Origin] @Type [name] { raw }` or the reference form
    /// `[Origin] @Type name;`.
    pub(super) fn parse_origin(&mut self) -> Option<Origin> {
        let origin_token = self.bump(); // `[Origin]`

        let type_tag = match self.current.kind {
            TokenKind::At(_) => self.bump().value,
            _ => {
                self.error_here(
                    DiagnosticKind::MalformedDefinition,
                    "expected a type tag after [Origin]",
                );
                self.synchronize();
                return None;
            }
        };

        let name = if self.current.is_name() {
            Some(self.bump().value)
        } else {
            None
        };

        if self.eat(TokenKind::Semicolon) {
            if name.is_none() {
                self.error_here(
                    DiagnosticKind::MalformedDefinition,
                    "an origin reference needs a name",
                );
                return None;
            }
            return Some(Origin {
                origin_type: OriginType::from_tag(&type_tag),
                name,
                content: String::new(),
                is_reference: true,
                pos: origin_token.pos,
            });
        }

        if !self.at(TokenKind::LBrace) {
            self.error_here(DiagnosticKind::MissingToken, "expected '{' or ';'");
            self.synchronize();
            return None;
        }
        let (content, _) = self.capture_block_body();

        Some(Origin {
            origin_type: OriginType::from_tag(&type_tag),
            name,
            content,
            is_reference: false,
            pos: origin_token.pos,
        })
    }

    /// `[Import] [modifier] @Tag [name] from path [as alias];`
    pub(super) fn parse_import(&mut self) -> Option<Import> {
        let import_token = self.bump(); // `[Import]`

        let mut is_template = false;
        let mut is_custom = false;
        let mut is_origin = false;
        let mut is_config = false;

        match self.current.kind {
            TokenKind::Bracket(BracketKeyword::Template) => {
                is_template = true;
                self.bump();
            }
            TokenKind::Bracket(BracketKeyword::Custom) => {
                is_custom = true;
                self.bump();
            }
            TokenKind::Bracket(BracketKeyword::Origin) => {
                is_origin = true;
                self.bump();
            }
            TokenKind::Bracket(BracketKeyword::Configuration) => {
                is_config = true;
                self.bump();
            }
            _ => {}
        }

        let mut tag = None;
        let mut origin_type = None;
        match self.current.kind {
            TokenKind::At(t) => {
                if is_origin {
                    origin_type = Some(self.current.value.clone());
                }
                tag = Some(t);
                self.bump();
            }
            _ => {}
        }

        let specific_name =
            if self.current.is_name() && self.current.kind != TokenKind::Keyword(Keyword::From) {
                Some(self.bump().value)
            } else {
                None
            };

        if !self.at(TokenKind::Keyword(Keyword::From)) {
            self.error_here(DiagnosticKind::MissingToken, "expected 'from'");
            self.synchronize();
            return None;
        }
        // `from` is current; the raw path capture consumes it.
        let (path, _) = self.take_raw_path();
        if path.is_empty() {
            self.error_here(DiagnosticKind::MissingToken, "expected an import path");
            self.synchronize();
            return None;
        }

        let alias = if self.at(TokenKind::Keyword(Keyword::As)) {
            self.bump();
            self.expect_name("an alias").map(|t| t.value)
        } else {
            None
        };

        self.expect(TokenKind::Semicolon, "';'");

        let specific_kind = match tag {
            Some(AtTag::Style) => Some(DefKind::Style),
            Some(AtTag::Element) => Some(DefKind::Element),
            Some(AtTag::Var) => Some(DefKind::Var),
            _ => None,
        };

        let kind = if is_template || is_custom || is_origin {
            if specific_name.is_some() {
                ImportKind::Specific
            } else if is_template {
                ImportKind::TemplateAll
            } else if is_custom {
                ImportKind::CustomAll
            } else {
                ImportKind::OriginAll
            }
        } else if is_config {
            ImportKind::Config
        } else {
            match tag {
                Some(AtTag::Html) => ImportKind::Html,
                Some(AtTag::Style) => ImportKind::Style,
                Some(AtTag::JavaScript) => ImportKind::JavaScript,
                Some(AtTag::Chtl) | None => ImportKind::Chtl,
                Some(AtTag::CJmod) => ImportKind::CJmod,
                Some(AtTag::Config) => ImportKind::Config,
                Some(_) => {
                    self.diagnostics.error(
                        DiagnosticKind::MalformedDefinition,
                        &self.file,
                        import_token.pos,
                        "unrecognized import type tag",
                    );
                    ImportKind::Chtl
                }
            }
        };

        Some(Import {
            kind,
            path,
            alias: alias.or(if kind == ImportKind::Specific {
                None
            } else {
                specific_name.clone()
            }),
            specific_kind,
            specific_name,
            is_template,
            is_custom,
            is_origin,
            origin_type,
            pos: import_token.pos,
        })
    }

    /// `[Namespace] name { ... }` or `[Namespace] name;`
    pub(super) fn parse_namespace(&mut self, in_namespace: bool) -> Option<Node> {
        self.bump(); // `[Namespace]`
        let name = self.expect_name("a namespace name")?;

        let mut block = ast::NamespaceBlock {
            name: name.value,
            children: Vec::new(),
            is_nested: in_namespace,
            pos: name.pos,
        };

        if self.eat(TokenKind::Semicolon) {
            return Some(Node::Namespace(block));
        }

        if !self.expect(TokenKind::LBrace, "'{' or ';'") {
            self.synchronize();
            return None;
        }

        let _scope = self.states.push_scope(
            ScopeKind::Namespace,
            Some(format!("[Namespace] {}", block.name)),
        );
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            if let Some(node) = self.parse_top_level(true) {
                block.children.push(node);
            }
        }
        if !self.eat(TokenKind::RBrace) {
            self.error_here(DiagnosticKind::UnexpectedEof, "expected '}'");
        }

        Some(Node::Namespace(block))
    }

    /// `[Configuration] [@Config] [name] { ... }`
    pub(super) fn parse_configuration(&mut self) -> Option<Node> {
        let config_token = self.bump(); // `[Configuration]`

        if self.at(TokenKind::At(AtTag::Config)) {
            self.bump();
        }
        let name = if self.current.is_name() {
            Some(self.bump().value)
        } else {
            None
        };

        if !self.expect(TokenKind::LBrace, "'{'") {
            self.synchronize();
            return None;
        }

        let mut block = ConfigBlock {
            name,
            options: Vec::new(),
            name_entries: Vec::new(),
            origin_entries: Vec::new(),
            pos: config_token.pos,
        };

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
                TokenKind::LBracket => {
                    self.parse_configuration_subblock(&mut block);
                }
                _ if self.current.is_name() => {
                    if let Some(d) = self.parse_declaration() {
                        block.options.push(ConfigOption {
                            key: d.property,
                            value: d.value.unwrap_or_default(),
                            pos: d.pos,
                        });
                    }
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected {} in configuration", self.current),
                    );
                    self.bump();
                    self.synchronize();
                }
            }
        }

        Some(Node::Configuration(block))
    }

    /// `[Name] { ... }` or `[OriginType] { ... }` inside a
    /// configuration block.  These are not reserved bracket keywords,
    /// so they arrive as plain punctuation.
    fn parse_configuration_subblock(&mut self, block: &mut ConfigBlock) {
        self.bump(); // `[`
        let label = match self.expect_name("a block label") {
            Some(t) => t.value,
            None => {
                self.synchronize();
                return;
            }
        };
        self.expect(TokenKind::RBracket, "']'");
        if !self.expect(TokenKind::LBrace, "'{'") {
            self.synchronize();
            return;
        }

        match label.as_str() {
            "Name" => loop {
                match self.current.kind {
                    TokenKind::RBrace => {
                        self.bump();
                        return;
                    }
                    TokenKind::Eof => {
                        self.error_here(DiagnosticKind::UnexpectedEof, "expected '}'");
                        return;
                    }
                    _ if self.current.is_name() => {
                        let key = self.bump();
                        if !self.expect(TokenKind::Colon, "':'") {
                            self.synchronize();
                            continue;
                        }
                        let mut spellings = Vec::new();
                        loop {
                            match self.current.kind {
                                TokenKind::At(_)
                                | TokenKind::Identifier
                                | TokenKind::Keyword(_)
                                | TokenKind::UnquotedLiteral => {
                                    spellings.push(self.bump().value);
                                }
                                _ => break,
                            }
                            if !self.eat(TokenKind::Comma) {
                                break;
                            }
                        }
                        self.expect(TokenKind::Semicolon, "';'");
                        block.name_entries.push(NameEntry {
                            key: key.value,
                            spellings,
                            pos: key.pos,
                        });
                    }
                    _ => {
                        self.error_here(
                            DiagnosticKind::UnexpectedToken,
                            format!("unexpected {} in [Name] block", self.current),
                        );
                        self.bump();
                        self.synchronize();
                    }
                }
            },
            "OriginType" => loop {
                match self.current.kind {
                    TokenKind::RBrace => {
                        self.bump();
                        return;
                    }
                    TokenKind::Eof => {
                        self.error_here(DiagnosticKind::UnexpectedEof, "expected '}'");
                        return;
                    }
                    TokenKind::At(_) => {
                        let key = self.bump();
                        if !self.expect(TokenKind::Colon, "':'") {
                            self.synchronize();
                            continue;
                        }
                        let value = match self.current.kind {
                            TokenKind::At(_) | TokenKind::Identifier => self.bump().value,
                            _ => {
                                self.error_here(
                                    DiagnosticKind::MissingToken,
                                    "expected a stream tag",
                                );
                                self.synchronize();
                                continue;
                            }
                        };
                        self.expect(TokenKind::Semicolon, "';'");
                        block.origin_entries.push(ConfigOption {
                            key: key.value,
                            value,
                            pos: key.pos,
                        });
                    }
                    _ => {
                        self.error_here(
                            DiagnosticKind::UnexpectedToken,
                            format!("unexpected {} in [OriginType] block", self.current),
                        );
                        self.bump();
                        self.synchronize();
                    }
                }
            },
            other => {
                self.error_here(
                    DiagnosticKind::MalformedDefinition,
                    format!("unknown configuration sub-block [{other}]"),
                );
                // Skip the whole block body.
                let mut depth = 1;
                while depth > 0 && !self.at(TokenKind::Eof) {
                    match self.current.kind {
                        TokenKind::LBrace => depth += 1,
                        TokenKind::RBrace => depth -= 1,
                        _ => {}
                    }
                    self.bump();
                }
            }
        }
    }

    /// `[Info] { key: value; ... }`
    pub(super) fn parse_info(&mut self) -> Option<Node> {
        let info_token = self.bump(); // `[Info]`
        if !self.expect(TokenKind::LBrace, "'{'") {
            self.synchronize();
            return None;
        }

        let mut entries = Vec::new();
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
                _ if self.current.is_name() => {
                    if let Some(d) = self.parse_declaration() {
                        entries.push(ConfigOption {
                            key: d.property,
                            value: Value::from_raw(&d.value.unwrap_or_default()).text,
                            pos: d.pos,
                        });
                    }
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected {} in [Info] block", self.current),
                    );
                    self.bump();
                    self.synchronize();
                }
            }
        }

        Some(Node::Info(InfoBlock {
            entries,
            pos: info_token.pos,
        }))
    }

    /// `[Export] { @Style a, b; [Custom] @Element c; }`
    pub(super) fn parse_export(&mut self) -> Option<Node> {
        let export_token = self.bump(); // `[Export]`
        if !self.expect(TokenKind::LBrace, "'{'") {
            self.synchronize();
            return None;
        }

        let mut entries = Vec::new();
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
                TokenKind::Bracket(BracketKeyword::Custom)
                | TokenKind::Bracket(BracketKeyword::Template)
                | TokenKind::At(_) => {
                    let is_custom = self.eat(TokenKind::Bracket(BracketKeyword::Custom));
                    if !is_custom {
                        self.eat(TokenKind::Bracket(BracketKeyword::Template));
                    }

                    let pos = self.current.pos;
                    let Some(kind) = self.parse_def_kind() else {
                        continue;
                    };

                    let mut names = Vec::new();
                    loop {
                        match self.expect_name("an exported name") {
                            Some(t) => names.push(t.value),
                            None => break,
                        }
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::Semicolon, "';'");

                    entries.push(ExportEntry {
                        kind,
                        is_custom,
                        names,
                        pos,
                    });
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected {} in [Export] block", self.current),
                    );
                    self.bump();
                    self.synchronize();
                }
            }
        }

        Some(Node::Export(ExportBlock {
            entries,
            pos: export_token.pos,
        }))
    }
}
