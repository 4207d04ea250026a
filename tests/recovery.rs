//! Tests for crashes and recovery in the loading stage.
//!
//! Ensures that compiling a hostile or malformed document never
//! panics, reports at least one diagnostic, and keeps compiling past
//! the bad spot.

use chtl::Compiler;

fn recovers(source: &str) {
    // We only check that compilation terminates and reports; the
    // output content is the other suites' business.
    let output = Compiler::new()
        .compile_str(source, "recovery.chtl")
        .expect("must not abort");
    assert!(
        !output.errors.is_empty() || !output.warnings.is_empty(),
        "expected at least one diagnostic for {source:?}"
    );
}

macro_rules! t {
    ($test_name:ident, $source:expr) => {
        #[test]
        fn $test_name() {
            recovers($source);
        }
    };
}

#[rustfmt::skip]
mod cases {
    use super::*;

    t!(unterminated_string,            r#"div { id: "oops }"#);
    t!(unterminated_block,             "div { span {");
    t!(unterminated_style,             "div { style { .x { color: red; }");
    t!(unterminated_script,            "div { script { if (x) {");
    t!(stray_close_brace,              "} div { }");
    t!(bad_statement_then_good,        "div { ??? ; id: main; }");
    t!(template_without_name,          "[Template] @Style { color: red; }");
    t!(template_without_kind,          "[Template] Card { color: red; }");
    t!(import_without_from,            "[Import] @Chtl ./lib.chtl;");
    t!(origin_without_tag,             "[Origin] { raw }");
    t!(insert_without_position,        "[Custom] @Element X { insert div { } }");
    t!(delete_without_target,          "[Custom] @Element X { delete ; }");
    t!(except_without_target,          "div { except ; }");
    t!(unknown_style_reference,        "div { style { @Style Nope; } }");
    t!(unknown_element_reference,      "body { @Element Nope; }");
    t!(duplicate_template,             "[Template] @Style S { color: red; }\n[Template] @Style S { color: blue; }");
    t!(inheritance_cycle,              "[Template] @Style A { @Style B; }\n[Template] @Style B { @Style A; }\ndiv { style { @Style A; } }");
    t!(deeply_nested_blocks,           &format!("{}{}", "div { ".repeat(300), "}".repeat(300)));
    t!(config_with_too_many_spellings, "[Configuration] { [Name] { CUSTOM_STYLE: @a, @b, @c, @d; } }");
}

#[test]
fn empty_input_is_fine() {
    let output = Compiler::new().compile_str("", "empty.chtl").unwrap();
    assert!(output.success);
    assert!(output.html.is_empty());
}

#[test]
fn comment_only_input_is_fine() {
    let output = Compiler::new()
        .compile_str("// nothing\n/* here */", "comments.chtl")
        .unwrap();
    assert!(output.success);
}

#[test]
fn error_positions_are_one_based() {
    let output = Compiler::new()
        .compile_str("div {\n  ??? ;\n}", "pos.chtl")
        .unwrap();
    let first = &output.errors[0];
    assert_eq!(first.pos.line, 2);
    assert!(first.pos.column >= 1);
}
