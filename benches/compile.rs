use criterion::{criterion_group, criterion_main, Criterion};

use chtl::Compiler;

const DOCUMENT: &str = r##"
[Template] @Style DefaultText { color: black; line-height: 1.6; }
[Template] @Var Theme { primary: "#3366ff"; spacing: 8px; }

[Custom] @Element Card {
    div {
        class: card;
        style {
            .card { padding: Theme(spacing); color: Theme(primary); }
            &:hover { opacity: 0.9; }
        }
        h2 { text { "Title" } }
        p { style { @Style DefaultText; } text { "Body copy" } }
    }
}

body {
    @Element Card;
    @Element Card;
    @Element Card;

    section {
        id: actions;
        script {
            {{.card}}->listen({ click: () => { console.log("card"); } });
        }
    }
}
"##;

fn compile_document(c: &mut Criterion) {
    c.bench_function("compile_document", |b| {
        let compiler = Compiler::new();
        b.iter(|| {
            let output = compiler.compile_str(DOCUMENT, "bench.chtl").unwrap();
            assert!(output.success, "{:?}", output.errors);
            output
        });
    });
}

criterion_group!(benches, compile_document);
criterion_main!(benches);
