//! Public Rust API for the CHTL compiler.
//!
//! This gets re-exported from the toplevel `lib.rs`.

#![warn(missing_docs)]

pub use crate::constraint::{BlockContext, ConstructKind, Violation};
pub use crate::error::{
    CompileError, Diagnostic, DiagnosticKind, ImplementationLimit, InternalError, LoadingError,
    Severity,
};

use std::path::Path;
use std::time::{Duration, Instant};

use crate::constraint::ConstraintChecker;
use crate::document::{self, Resources};
use crate::error::Diagnostics;
use crate::generator::{self, GeneratorOptions};
use crate::scanner::{FragmentKind, Scanner};
use crate::session::Session;
use crate::state::{Phase, ScopeKind, StateManager};

/// Options for one compilation.
///
/// This struct implements a builder pattern: call the `with_*` methods
/// in sequence, then hand the result to [`Compiler::with_options`].
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Indent output and separate it with newlines.  Defaults to
    /// `true`.
    pub pretty_print: bool,

    /// Spaces per indent level in pretty-printed HTML.  Defaults to 2.
    pub indent_width: usize,

    /// Emit generator comments (`-- ...`) and informational comments.
    /// Defaults to `true`.
    pub generate_comments: bool,

    /// Minify the CSS stream.  Defaults to `false`.
    pub minify_css: bool,

    /// Minify the JS stream.  Defaults to `false`.
    pub minify_js: bool,

    /// Prefix for auto-generated class names.  Defaults to empty.
    pub css_class_prefix: String,

    /// Elevate constraint violations to compilation failures.
    /// Defaults to `false`.
    pub strict: bool,

    /// Wrap the output in a full HTML document shell instead of
    /// returning the three streams as fragments.  Defaults to `false`.
    pub full_document: bool,

    /// `<title>` for full-document output.
    pub title: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            pretty_print: true,
            indent_width: 2,
            generate_comments: true,
            minify_css: false,
            minify_js: false,
            css_class_prefix: String::new(),
            strict: false,
            full_document: false,
            title: "CHTL Document".to_string(),
        }
    }
}

impl CompileOptions {
    /// Creates options with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`CompileOptions::pretty_print`].
    pub fn with_pretty_print(mut self, value: bool) -> Self {
        self.pretty_print = value;
        self
    }

    /// See [`CompileOptions::generate_comments`].
    pub fn with_comments(mut self, value: bool) -> Self {
        self.generate_comments = value;
        self
    }

    /// See [`CompileOptions::minify_css`] and
    /// [`CompileOptions::minify_js`].
    pub fn with_minify(mut self, css: bool, js: bool) -> Self {
        self.minify_css = css;
        self.minify_js = js;
        self
    }

    /// See [`CompileOptions::css_class_prefix`].
    pub fn with_css_class_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.css_class_prefix = prefix.into();
        self
    }

    /// See [`CompileOptions::strict`].
    pub fn with_strict(mut self, value: bool) -> Self {
        self.strict = value;
        self
    }

    /// See [`CompileOptions::full_document`].
    pub fn with_full_document(mut self, value: bool) -> Self {
        self.full_document = value;
        self
    }

    /// See [`CompileOptions::title`].
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            pretty_print: self.pretty_print,
            indent_width: self.indent_width,
            generate_comments: self.generate_comments,
            minify_css: self.minify_css,
            minify_js: self.minify_js,
            css_class_prefix: self.css_class_prefix.clone(),
            full_document: self.full_document,
            title: self.title.clone(),
        }
    }
}

/// Timing and fragment statistics for one compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileStats {
    /// Total scanner slices.
    pub slices: usize,
    /// Slices per fragment kind.
    pub chtl_fragments: usize,
    /// See [`CompileStats::chtl_fragments`].
    pub chtl_js_fragments: usize,
    /// See [`CompileStats::chtl_fragments`].
    pub css_fragments: usize,
    /// See [`CompileStats::chtl_fragments`].
    pub js_fragments: usize,
    /// See [`CompileStats::chtl_fragments`].
    pub mixed_fragments: usize,
    /// Aggregated minimal units across the CHTL slices.
    pub aggregated_units: usize,
    /// Fragment-cache hits during generation.
    pub cache_hits: usize,
    /// Files loaded, imports included.
    pub files_loaded: usize,
    /// Wall-clock time of the compilation.
    pub elapsed: Duration,
}

/// Everything one compilation produces.
#[derive(Debug, Default)]
pub struct CompilationOutput {
    /// Whether compilation finished without errors.
    pub success: bool,

    /// The HTML stream (a full document in full-document mode).
    pub html: String,
    /// The CSS stream.
    pub css: String,
    /// The JavaScript stream.
    pub js: String,

    /// Class names the generator invented from local style blocks.
    pub generated_classes: Vec<String>,
    /// Id names the generator invented from local style blocks.
    pub generated_ids: Vec<String>,

    /// Error diagnostics, in source order per file.
    pub errors: Vec<Diagnostic>,
    /// Warning diagnostics, in source order per file.
    pub warnings: Vec<Diagnostic>,

    /// Constraint violations, each with an advisory repair
    /// suggestion.  The corresponding diagnostics also appear in
    /// `errors`; this list carries the structured form.
    pub violations: Vec<Violation>,

    /// Timing and fragment statistics.
    pub stats: CompileStats,
}

/// The compiler entry point.
///
/// ```
/// let output = chtl::Compiler::new()
///     .compile_str("div { id: main; }", "example.chtl")
///     .unwrap();
/// assert!(output.success);
/// assert!(output.html.contains("<div id=\"main\"></div>"));
/// ```
pub struct Compiler {
    session: Session,
    options: CompileOptions,
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

impl Compiler {
    /// Creates a compiler with default options.
    pub fn new() -> Self {
        Compiler {
            session: Session::new(),
            options: CompileOptions::default(),
        }
    }

    /// Creates a compiler with the given options.
    pub fn with_options(options: CompileOptions) -> Self {
        Compiler {
            session: Session::new(),
            options,
        }
    }

    /// Compiles a file on disk.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<CompilationOutput, CompileError> {
        let path = path.as_ref();
        let source = crate::io::read_source(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        self.compile(&source, &path.display().to_string(), base_dir)
    }

    /// Compiles an in-memory string.  `filename` is nominal and used
    /// for diagnostics; relative imports resolve against the current
    /// directory.
    pub fn compile_str(
        &self,
        source: &str,
        filename: &str,
    ) -> Result<CompilationOutput, CompileError> {
        self.compile(source, filename, Path::new("."))
    }

    fn compile(
        &self,
        source: &str,
        filename: &str,
        base_dir: &Path,
    ) -> Result<CompilationOutput, CompileError> {
        let start = Instant::now();
        let diagnostics = Diagnostics::new();
        let states = StateManager::new();
        let _global_scope = states.push_scope(ScopeKind::Global, None);

        // Scan: fragment boundaries and statistics.
        states.enter_phase(Phase::Lex)?;
        let scanner = Scanner::new(source, filename, self.session.clone(), diagnostics.clone());
        let slices = scanner.scan();

        let mut stats = CompileStats {
            slices: slices.len(),
            ..CompileStats::default()
        };
        for slice in &slices {
            match slice.kind {
                FragmentKind::Chtl => {
                    stats.chtl_fragments += 1;
                    let units = crate::scanner::minimal_units(source, slice);
                    stats.aggregated_units += crate::scanner::aggregate_units(&units).len();
                }
                FragmentKind::ChtlJs => stats.chtl_js_fragments += 1,
                FragmentKind::Css => stats.css_fragments += 1,
                FragmentKind::JavaScript => stats.js_fragments += 1,
                FragmentKind::Mixed | FragmentKind::Unknown => stats.mixed_fragments += 1,
            }
        }

        // Parse the entry file and everything it imports.
        states.enter_phase(Phase::Parse)?;
        let mut resources = Resources::new();
        let mut document = document::load_entry(
            source,
            filename,
            base_dir,
            &self.session,
            &diagnostics,
            &mut resources,
            &states,
        );
        stats.files_loaded = resources.loaded_count() + 1;

        // Constraint checking; violating constructs are dropped.
        states.enter_phase(Phase::Semantic)?;
        let namespace = document.namespace.clone();
        let mut checker = ConstraintChecker::new(
            filename,
            self.options.strict,
            &namespace,
            diagnostics.clone(),
        );
        checker.check_document(&mut document.tree);

        let violations = checker.violations().to_vec();
        let strict_abort = checker.strict() && !violations.is_empty();

        // Generate, unless strict mode already failed the run.
        let generated = if strict_abort {
            states.enter_phase(Phase::Finalize)?;
            generator::Output::default()
        } else {
            states.enter_phase(Phase::Generate)?;
            let generator_options = self.options.generator_options();
            let output = generator::generate(
                &document,
                &generator_options,
                &self.session,
                &diagnostics,
                &states,
            )?;
            states.enter_phase(Phase::Finalize)?;
            output
        };

        diagnostics.sort_for_output(resources.completion_order());
        let (errors, warnings): (Vec<_>, Vec<_>) = diagnostics
            .take()
            .into_iter()
            .partition(|d| d.severity == Severity::Error);

        stats.cache_hits = generated.cache_hits;
        stats.elapsed = start.elapsed();

        Ok(CompilationOutput {
            success: errors.is_empty() && !strict_abort,
            html: generated.html,
            css: generated.css,
            js: generated.js,
            generated_classes: generated.generated_classes,
            generated_ids: generated.generated_ids,
            errors,
            warnings,
            violations,
            stats,
        })
    }
}
