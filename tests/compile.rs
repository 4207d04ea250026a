//! End-to-end compilation tests: source in, three streams out.

use chtl::{CompileOptions, Compiler, DiagnosticKind};
use pretty_assertions::assert_eq;

fn compile(source: &str) -> chtl::CompilationOutput {
    Compiler::new()
        .compile_str(source, "test.chtl")
        .expect("compilation should not abort")
}

fn compile_ok(source: &str) -> chtl::CompilationOutput {
    let output = compile(source);
    assert!(
        output.errors.is_empty(),
        "unexpected errors: {:?}",
        output
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
    );
    output
}

#[test]
fn attribute_with_colon() {
    let output = compile_ok(r#"div { id : "main" ; }"#);
    assert!(output.html.contains(r#"<div id="main"></div>"#));
}

#[test]
fn colon_and_equal_compile_byte_identically() {
    let with_colon = compile_ok(r#"div { id : "main" ; }"#);
    let with_equal = compile_ok(r#"div { id = "main" ; }"#);

    assert_eq!(with_colon.html, with_equal.html);
    assert_eq!(with_colon.css, with_equal.css);
    assert_eq!(with_colon.js, with_equal.js);
}

#[test]
fn local_style_auto_class_and_ampersand() {
    let output = compile_ok(
        "div {\n\
           style {\n\
             .card { color: red; }\n\
             & { padding: 8px; }\n\
           }\n\
         }",
    );

    assert!(output.html.contains(r#"class="card""#));
    assert!(output.css.contains(".card {\n  color: red;\n}"));
    // `&` expands to the first auto class.
    assert!(output.css.contains(".card {\n  padding: 8px;\n}"));
    assert_eq!(output.generated_classes, vec!["card".to_string()]);
}

#[test]
fn template_style_expansion() {
    let output = compile_ok(
        "[Template] @Style DefaultText { color: black; line-height: 1.6; }\n\
         p { style { @Style DefaultText; } }",
    );

    assert!(output
        .html
        .contains(r#"<p style="color: black; line-height: 1.6"></p>"#));
}

#[test]
fn constraint_violation_in_global_script() {
    let output = compile(r"script { @Style X; }");

    assert_eq!(output.errors.len(), 1);
    assert_eq!(output.errors[0].kind, DiagnosticKind::DisallowedInContext);
    assert!(output.js.trim().is_empty());
    assert!(!output.success);

    // The structured violation carries the advisory repair suggestion.
    assert_eq!(output.violations.len(), 1);
    let violation = &output.violations[0];
    assert_eq!(violation.context, chtl::BlockContext::GlobalScript);
    assert!(violation.suggestion.is_some());
}

#[test]
fn chtl_js_listen_lowering() {
    let output = compile_ok(
        "div { class: box; script {\n\
           {{.box}}->listen({ click: () => { console.log(1); } });\n\
         } }",
    );

    let squashed: String = output.js.split_whitespace().collect::<Vec<_>>().join(" ");
    assert!(squashed.contains("var __target = document.querySelector('.box');"));
    assert!(squashed.contains(
        "if (__target) { __target.addEventListener('click', () => { console.log(1); }); }"
    ));
    assert!(output.js.contains("\"use strict\""));
}

#[test]
fn auto_names_are_stable_across_recompilation() {
    let source = "div { style { .card { color: red; } } }\n\
                  section { style { .card { color: blue; } #app { margin: 0; } } }";

    let first = compile_ok(source);
    let second = compile_ok(source);

    assert_eq!(first.generated_classes, second.generated_classes);
    assert_eq!(first.generated_ids, second.generated_ids);
    assert_eq!(first.html, second.html);
    assert_eq!(first.css, second.css);
}

#[test]
fn repeated_auto_class_gets_counter_suffix() {
    let output = compile_ok(
        "div { style { .card { color: red; } } }\n\
         section { style { .card { color: blue; } } }",
    );

    assert_eq!(
        output.generated_classes,
        vec!["card".to_string(), "card2".to_string()]
    );
    assert!(
        output.html.contains(r#"<div class="card">"#) || output.html.contains(r#"class="card""#)
    );
    assert!(output.css.contains(".card2 {"));
}

#[test]
fn text_content_is_escaped() {
    let output = compile_ok(r#"div { text { "<b>&'\"</b>" } }"#);

    assert!(!output.html.contains("<b>"));
    assert!(output.html.contains("&lt;b&gt;&amp;&#39;&quot;&lt;/b&gt;"));
}

#[test]
fn attribute_values_are_escaped_and_double_quoted() {
    let output = compile_ok(r#"div { title: "a \"b\" <c>"; }"#);
    assert!(output.html.contains(r#"title="a &quot;b&quot; &lt;c&gt;""#));
}

#[test]
fn void_elements_self_close() {
    let output = compile_ok("div { img { src: x.png; } br; }");
    assert!(output.html.contains(r#"<img src="x.png" />"#));
    assert!(output.html.contains("<br />"));
}

#[test]
fn origin_blocks_pass_through_verbatim() {
    let output = compile_ok(
        "[Origin] @Html { <video controls></video> }\n\
         [Origin] @Style { .raw { color : red } }\n\
         [Origin] @JavaScript { var raw = 1; }",
    );

    assert!(output.html.contains("<video controls></video>"));
    assert!(output.css.contains(".raw { color : red }"));
    assert!(output.js.contains("var raw = 1;"));
}

#[test]
fn named_origin_reference() {
    let output = compile_ok(
        "[Origin] @JavaScript analytics { track(); }\n\
         div { }\n\
         [Origin] @JavaScript analytics;",
    );

    assert!(output.js.contains("track();"));
}

#[test]
fn generator_comment_survives_into_html() {
    let output = compile_ok("-- above the fold\ndiv { }");
    assert!(output.html.contains("<!-- above the fold -->"));

    let silent = Compiler::with_options(CompileOptions::new().with_comments(false))
        .compile_str("-- above the fold\ndiv { }", "test.chtl")
        .unwrap();
    assert!(!silent.html.contains("above the fold"));
}

#[test]
fn variable_group_resolution_in_style() {
    let output = compile_ok(
        "[Template] @Var Theme { tableColor: \"rgb(255, 192, 203)\"; }\n\
         table { style { color: Theme(tableColor); } }",
    );

    assert!(output.html.contains(r#"style="color: rgb(255, 192, 203)""#));
}

#[test]
fn custom_style_valueless_slot_filled_at_use_site() {
    let output = compile_ok(
        "[Custom] @Style Flex { display: flex; gap; }\n\
         div { style { @Style Flex { gap: 8px; } } }",
    );

    assert!(output.html.contains(r#"style="display: flex; gap: 8px""#));
}

#[test]
fn custom_style_unfilled_slot_reports() {
    let output = compile(
        "[Custom] @Style Flex { display: flex; gap; }\n\
         div { style { @Style Flex; } }",
    );

    assert!(output
        .errors
        .iter()
        .any(|e| e.kind == DiagnosticKind::UnfilledValueSlot));
    assert!(output.html.contains("display: flex"));
}

#[test]
fn element_template_expansion_with_specialization() {
    let output = compile_ok(
        "[Custom] @Element Page { header { } main { } footer { } }\n\
         body {\n\
           @Element Page {\n\
             insert after header[0] { nav { } }\n\
             delete footer;\n\
             main[0] { id: content; }\n\
           }\n\
         }",
    );

    let header = output.html.find("<header").expect("header missing");
    let nav = output.html.find("<nav").expect("nav missing");
    let main = output.html.find("<main").expect("main missing");
    assert!(header < nav && nav < main);
    assert!(!output.html.contains("<footer"));
    assert!(
        output.html.contains(r#"<main id="content">"#)
            || output.html.contains(r#"<main id="content"></main>"#)
    );
}

#[test]
fn full_document_assembly() {
    let output = Compiler::with_options(
        CompileOptions::new()
            .with_full_document(true)
            .with_title("Demo"),
    )
    .compile_str(
        "div { style { .a { color: red; } } script { console.log(1); } }",
        "test.chtl",
    )
    .unwrap();

    assert!(output.html.starts_with("<!DOCTYPE html>"));
    assert!(output.html.contains("<meta charset=\"UTF-8\">"));
    assert!(output.html.contains("<title>Demo</title>"));
    assert!(output.html.contains("<style>"));
    assert!(output.html.contains("<script>"));
    assert!(output.html.ends_with("</html>\n"));
}

#[test]
fn minified_output_has_no_pretty_whitespace() {
    let output = Compiler::with_options(
        CompileOptions::new()
            .with_pretty_print(false)
            .with_minify(true, true)
            .with_comments(false),
    )
    .compile_str(
        "div { id: a; span { } style { .x { color: red; } } script { go(); } }",
        "test.chtl",
    )
    .unwrap();

    assert!(!output.html.contains('\n'));
    assert_eq!(output.css, ".x{color:red}");
    assert!(output.js.starts_with("(function(){\"use strict\";"));
}

#[test]
fn strict_mode_fails_on_violation() {
    let output = Compiler::with_options(CompileOptions::new().with_strict(true))
        .compile_str("script { @Style X; }", "test.chtl")
        .unwrap();

    assert!(!output.success);
    assert!(output.html.is_empty());
    assert!(!output.violations.is_empty());
}

#[test]
fn configuration_rebinds_keyword_spelling() {
    let output = compile_ok(
        "[Configuration] { [Name] { CUSTOM_STYLE: @CSS; } }\n\
         [Template] @CSS Base { color: red; }\n\
         div { style { @CSS Base; } }",
    );

    assert!(output.html.contains(r#"style="color: red""#));
}

#[test]
fn stats_are_reported() {
    let output = compile_ok("div { script { console.log(1); } style { color: red; } }");
    assert!(output.stats.slices >= 3);
    assert!(output.stats.js_fragments >= 1);
    assert!(output.stats.aggregated_units >= 1);
    assert_eq!(output.stats.files_loaded, 1);
}

#[test]
fn global_style_rules_are_emitted() {
    let output = compile_ok("style { .page { margin: 0 auto; } }\ndiv { }");
    assert!(output.css.contains(".page {\n  margin: 0 auto;\n}"));
}

#[test]
fn identical_script_bodies_hit_the_fragment_cache() {
    let output = compile_ok(
        "div { script { ping(); } }\n\
         section { script { ping(); } }",
    );
    assert_eq!(output.stats.cache_hits, 1);
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Swapping `:` for `=` in an attribute never changes any of
        /// the three output streams.
        #[test]
        fn ce_equivalence(name in "[a-z][a-z0-9]{0,7}", value in "[a-zA-Z0-9]{1,12}") {
            let with_colon = compile(&format!("div {{ {name} : {value}; }}"));
            let with_equal = compile(&format!("div {{ {name} = {value}; }}"));

            prop_assert_eq!(with_colon.html, with_equal.html);
            prop_assert_eq!(with_colon.css, with_equal.css);
            prop_assert_eq!(with_colon.js, with_equal.js);
        }

        /// Recompiling any single-element document is deterministic.
        #[test]
        fn recompilation_is_stable(class in "[a-z][a-z0-9]{0,7}") {
            let source = format!("div {{ style {{ .{class} {{ color: red; }} }} }}");
            let first = compile(&source);
            let second = compile(&source);
            prop_assert_eq!(first.generated_classes, second.generated_classes);
            prop_assert_eq!(first.html, second.html);
        }
    }
}
