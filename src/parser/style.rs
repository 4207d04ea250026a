//! Style-block grammar.
//!
//! A `style { }` block mixes four entry shapes: inline declarations
//! (`color: red;`), selector rules (`.x { }`, `#y { }`, `& { }`,
//! `div { }`, complex), style references (`@Style Name;`, possibly with
//! a specialization body), and variable-group uses (`@Var Group;`).
//! Class and id selectors are recorded as auto names while parsing;
//! they become attributes on the owning element during generation.

use super::{DeleteContext, Parser};
use crate::ast::{
    Declaration, SelectorKind, StyleBlock, StyleReference, StyleRule, VarUse, Variable,
};
use crate::error::DiagnosticKind;
use crate::state::ScopeKind;
use crate::token::{AtTag, Keyword, TokenKind};

impl<'a> Parser<'a> {
    /// Current token must be the `{` of the block (the `style` keyword
    /// has been consumed by the caller).  Consumes the closing `}`.
    pub(crate) fn parse_style_block(&mut self, is_local: bool) -> Option<StyleBlock> {
        let pos = self.current.pos;
        if !self.expect(TokenKind::LBrace, "'{'") {
            self.synchronize();
            return None;
        }

        let mut block = StyleBlock {
            is_local,
            pos,
            ..StyleBlock::default()
        };

        let _scope = self
            .states
            .push_scope(ScopeKind::StyleBlock, Some("style".to_string()));
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

                TokenKind::At(AtTag::Style) => {
                    if let Some(r) = self.parse_style_reference(false) {
                        block.references.push(r);
                    }
                }
                TokenKind::At(AtTag::Var) => {
                    if let Some(v) = self.parse_var_use() {
                        block.var_uses.push(v);
                    }
                }
                TokenKind::Keyword(Keyword::Inherit) => {
                    self.bump();
                    if self.at(TokenKind::At(AtTag::Style)) {
                        if let Some(r) = self.parse_style_reference(true) {
                            block.references.push(r);
                        }
                    } else {
                        self.error_here(
                            DiagnosticKind::MissingToken,
                            "expected '@Style' after 'inherit'",
                        );
                        self.synchronize();
                    }
                }
                TokenKind::Keyword(Keyword::Delete) => {
                    self.error_here(
                        DiagnosticKind::DisallowedInContext,
                        "'delete' is only allowed inside a specialization body",
                    );
                    let _ = self.parse_delete(DeleteContext::Style);
                }

                TokenKind::Dot | TokenKind::Ampersand => {
                    if let Some(rule) = self.parse_selector_rule(&mut block) {
                        block.rules.push(rule);
                    }
                }
                TokenKind::UnquotedLiteral if self.current.value.starts_with('#') => {
                    if let Some(rule) = self.parse_selector_rule(&mut block) {
                        block.rules.push(rule);
                    }
                }

                _ if self.current.is_name() => match self.peek().kind {
                    TokenKind::LBrace => {
                        if let Some(rule) = self.parse_selector_rule(&mut block) {
                            block.rules.push(rule);
                        }
                    }
                    TokenKind::Colon | TokenKind::Equal => {
                        self.parse_declaration_or_pseudo_rule(&mut block);
                    }
                    TokenKind::Semicolon | TokenKind::Comma => {
                        let name = self.bump();
                        self.bump(); // the separator
                        block.inline.push(Declaration {
                            property: name.value,
                            value: None,
                            pos: name.pos,
                        });
                    }
                    _ => {
                        if let Some(rule) = self.parse_selector_rule(&mut block) {
                            block.rules.push(rule);
                        }
                    }
                },

                _ => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected {} in style block", self.current),
                    );
                    self.bump();
                    self.synchronize();
                }
            }
        }

        Some(block)
    }

    /// `prop: value;` — with one wrinkle: `div:hover { ... }` starts
    /// the same way.  The raw value capture stops at `{`, so when the
    /// token after the captured text is `{` this was a selector after
    /// all, and we reinterpret.
    fn parse_declaration_or_pseudo_rule(&mut self, block: &mut StyleBlock) {
        let name = self.bump();
        // Current is now the separator; the raw capture consumes it.
        let (raw, _) = self.take_raw_value();

        if self.at(TokenKind::LBrace) {
            let selector = format!("{}:{}", name.value, raw);
            let declarations = self.parse_declarations_block();
            block.rules.push(StyleRule {
                selector,
                kind: SelectorKind::Complex,
                declarations,
                pos: name.pos,
            });
            return;
        }

        if !self.at(TokenKind::RBrace) {
            self.expect(TokenKind::Semicolon, "';'");
        }
        block.inline.push(Declaration {
            property: name.value,
            value: Some(raw),
            pos: name.pos,
        });
    }

    /// A selector followed by a declaration block.  Records auto
    /// class/id names on the way.
    fn parse_selector_rule(&mut self, block: &mut StyleBlock) -> Option<StyleRule> {
        let pos = self.current.pos;
        let mut selector = String::new();
        let mut kind = None;
        let mut prev_end: Option<usize> = None;

        loop {
            match self.current.kind {
                TokenKind::LBrace => break,
                TokenKind::RBrace | TokenKind::Eof | TokenKind::Semicolon => {
                    self.error_here(DiagnosticKind::MissingToken, "expected '{' after selector");
                    self.synchronize();
                    return None;
                }
                _ => {}
            }

            // A gap between tokens is a descendant combinator.
            if let Some(end) = prev_end {
                if self.current.pos.offset > end && !selector.is_empty() {
                    selector.push(' ');
                }
            }

            let token = self.bump();
            prev_end = Some(token.pos.offset + token.value.len());

            match token.kind {
                TokenKind::Dot => {
                    selector.push('.');
                    if self.current.is_name() {
                        let name = self.bump();
                        prev_end = Some(name.pos.offset + name.value.len());
                        selector.push_str(&name.value);
                        if kind.is_none() {
                            kind = Some(SelectorKind::Class);
                            block.auto_classes.push(name.value);
                        }
                    }
                }
                TokenKind::Ampersand => {
                    selector.push('&');
                    if kind.is_none() {
                        kind = Some(SelectorKind::Ampersand);
                    }
                }
                TokenKind::UnquotedLiteral if token.value.starts_with('#') => {
                    selector.push_str(&token.value);
                    if kind.is_none() {
                        kind = Some(SelectorKind::Id);
                        let name = token.value[1..].split(':').next().unwrap_or("").to_string();
                        if !name.is_empty() {
                            block.auto_ids.push(name);
                        }
                    }
                }
                TokenKind::Colon => selector.push(':'),
                _ if token.is_name() || token.kind == TokenKind::UnquotedLiteral => {
                    selector.push_str(&token.value);
                    if kind.is_none() {
                        kind = Some(SelectorKind::Tag);
                    }
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected {} in selector", token),
                    );
                    self.synchronize();
                    return None;
                }
            }
        }

        // More than one simple selector, or anything after the first
        // with a combinator, makes it complex.
        let kind = match kind {
            Some(k) if !selector.contains(' ') => k,
            _ => SelectorKind::Complex,
        };

        let declarations = self.parse_declarations_block();

        Some(StyleRule {
            selector,
            kind,
            declarations,
            pos,
        })
    }

    /// `{ prop: value; ... }` — consumes both braces.
    fn parse_declarations_block(&mut self) -> Vec<Declaration> {
        let mut declarations = Vec::new();

        if !self.expect(TokenKind::LBrace, "'{'") {
            self.synchronize();
            return declarations;
        }

        loop {
            match self.current.kind {
                TokenKind::RBrace => {
                    self.bump();
                    return declarations;
                }
                TokenKind::Eof => {
                    self.error_here(DiagnosticKind::UnexpectedEof, "expected '}'");
                    return declarations;
                }
                TokenKind::GeneratorComment => {
                    self.bump();
                }
                _ if self.current.is_name() || self.at(TokenKind::UnquotedLiteral) => {
                    if let Some(d) = self.parse_declaration() {
                        declarations.push(d);
                    }
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected {} in declaration block", self.current),
                    );
                    self.bump();
                    self.synchronize();
                }
            }
        }
    }

    /// One declaration; `prop;` and `prop,` are value-less slots.
    pub(crate) fn parse_declaration(&mut self) -> Option<Declaration> {
        let name = self.bump();

        match self.current.kind {
            TokenKind::Colon | TokenKind::Equal => {
                let (raw, _) = self.take_raw_value();
                if !self.at(TokenKind::RBrace) {
                    self.expect(TokenKind::Semicolon, "';'");
                }
                Some(Declaration {
                    property: name.value,
                    value: Some(raw),
                    pos: name.pos,
                })
            }
            TokenKind::Semicolon | TokenKind::Comma => {
                self.bump();
                Some(Declaration {
                    property: name.value,
                    value: None,
                    pos: name.pos,
                })
            }
            _ => {
                self.error_here(
                    DiagnosticKind::MissingToken,
                    format!("expected ':' after property '{}'", name.value),
                );
                self.synchronize();
                None
            }
        }
    }

    /// `@Style Name [from ns]` followed by `;` or a specialization
    /// body.
    pub(crate) fn parse_style_reference(
        &mut self,
        explicit_inherit: bool,
    ) -> Option<StyleReference> {
        let at_token = self.bump(); // `@Style`
        let name = self.expect_name("a style template name")?;

        let mut reference = StyleReference::new(name.value, at_token.pos);
        reference.explicit_inherit = explicit_inherit;

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
                TokenKind::Keyword(Keyword::Delete) => {
                    self.parse_reference_delete(&mut reference);
                }
                _ if self.current.is_name() || self.at(TokenKind::UnquotedLiteral) => {
                    if let Some(d) = self.parse_declaration() {
                        reference.overrides.push(d);
                    }
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected {} in style specialization", self.current),
                    );
                    self.bump();
                    self.synchronize();
                }
            }
        }

        Some(reference)
    }

    /// `delete a, b;` or `delete @Style Base;` inside a style
    /// specialization.
    fn parse_reference_delete(&mut self, reference: &mut StyleReference) {
        self.bump(); // `delete`

        loop {
            match self.current.kind {
                TokenKind::At(AtTag::Style) => {
                    self.bump();
                    if let Some(name) = self.expect_name("a style name") {
                        reference.deleted_inheritance.push(name.value);
                    }
                }
                _ if self.current.is_name() || self.at(TokenKind::UnquotedLiteral) => {
                    let name = self.bump();
                    reference.deleted_properties.push(name.value);
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::MissingToken,
                        format!("expected a delete target, found {}", self.current),
                    );
                    self.synchronize();
                    return;
                }
            }

            if self.eat(TokenKind::Comma) {
                continue;
            }
            if !self.at(TokenKind::RBrace) {
                self.expect(TokenKind::Semicolon, "';'");
            }
            return;
        }
    }

    /// `@Var Group [from ns]` followed by `;` or `{ member: value; }`.
    fn parse_var_use(&mut self) -> Option<VarUse> {
        let at_token = self.bump(); // `@Var`
        let group = self.expect_name("a variable group name")?;

        let mut var_use = VarUse {
            group: group.value,
            namespace: None,
            overrides: Vec::new(),
            pos: at_token.pos,
        };

        if self.at(TokenKind::Keyword(Keyword::From)) {
            self.bump();
            var_use.namespace = self.parse_namespace_path();
        }

        if self.eat(TokenKind::Semicolon) {
            return Some(var_use);
        }

        if !self.expect(TokenKind::LBrace, "';' or '{'") {
            self.synchronize();
            return Some(var_use);
        }

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
                        var_use.overrides.push(Variable {
                            name: d.property,
                            value: crate::ast::Value::from_raw(d.value.as_deref().unwrap_or("")),
                            pos: d.pos,
                        });
                    }
                }
                _ => {
                    self.error_here(
                        DiagnosticKind::UnexpectedToken,
                        format!("unexpected {} in variable specialization", self.current),
                    );
                    self.bump();
                    self.synchronize();
                }
            }
        }

        Some(var_use)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Node, SelectorKind};
    use crate::parser::tests::{parse_ok, parse_with_diagnostics};

    fn style_of(src: &str) -> crate::ast::StyleBlock {
        let doc = parse_ok(src);
        match &doc.children[0] {
            Node::Element(e) => e.style.clone().expect("style block"),
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn inline_properties_and_rules() {
        let style = style_of("div { style { color: red; .card { padding: 8px; } } }");
        assert_eq!(style.inline.len(), 1);
        assert_eq!(style.inline[0].property, "color");
        assert_eq!(style.inline[0].value.as_deref(), Some("red"));
        assert_eq!(style.rules.len(), 1);
        assert_eq!(style.rules[0].selector, ".card");
        assert_eq!(style.rules[0].kind, SelectorKind::Class);
        assert_eq!(style.auto_classes, vec!["card"]);
    }

    #[test]
    fn id_and_ampersand_selectors() {
        let style = style_of("div { style { #main { margin: 0; } &:hover { color: blue; } } }");
        assert_eq!(style.rules[0].selector, "#main");
        assert_eq!(style.rules[0].kind, SelectorKind::Id);
        assert_eq!(style.auto_ids, vec!["main"]);
        assert_eq!(style.rules[1].selector, "&:hover");
        assert_eq!(style.rules[1].kind, SelectorKind::Ampersand);
    }

    #[test]
    fn complex_selector_keeps_descendant_spaces() {
        let style = style_of("div { style { .a .b { color: red; } } }");
        assert_eq!(style.rules[0].selector, ".a .b");
        assert_eq!(style.rules[0].kind, SelectorKind::Complex);
        // Only the first simple selector contributes an auto class.
        assert_eq!(style.auto_classes, vec!["a"]);
    }

    #[test]
    fn pseudo_tag_selector_is_reinterpreted() {
        let style = style_of("div { style { a:hover { color: red; } } }");
        assert_eq!(style.rules[0].selector, "a:hover");
        assert_eq!(style.rules[0].kind, SelectorKind::Complex);
        assert!(style.inline.is_empty());
    }

    #[test]
    fn style_reference_with_specialization() {
        let style = style_of(
            "div { style { @Style Card { delete margin, padding; delete @Style Base; width: 10px; } } }",
        );
        let r = &style.references[0];
        assert_eq!(r.name, "Card");
        assert_eq!(r.deleted_properties, vec!["margin", "padding"]);
        assert_eq!(r.deleted_inheritance, vec!["Base"]);
        assert_eq!(r.overrides[0].property, "width");
    }

    #[test]
    fn style_reference_with_namespace() {
        let style = style_of("div { style { @Style Card from ui.widgets; } }");
        assert_eq!(
            style.references[0].namespace.as_deref(),
            Some("ui::widgets")
        );
    }

    #[test]
    fn valueless_property_is_recorded() {
        let style = style_of("div { style { color; } }");
        assert_eq!(style.inline[0].property, "color");
        assert!(style.inline[0].value.is_none());
    }

    #[test]
    fn var_use_with_overrides() {
        let style = style_of("div { style { @Var Theme { primary: #fff; } } }");
        assert_eq!(style.var_uses[0].group, "Theme");
        assert_eq!(style.var_uses[0].overrides[0].name, "primary");
        assert_eq!(style.var_uses[0].overrides[0].value.text, "#fff");
    }

    #[test]
    fn delete_outside_specialization_reports() {
        let (_, diag) = parse_with_diagnostics("div { style { delete color; } }");
        assert!(diag.error_count() >= 1);
    }
}
