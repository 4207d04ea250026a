//! Compile CHTL documents to HTML, CSS and JavaScript.
//!
//! CHTL is a source language that describes a document tree with a
//! brace-block syntax, embeds scoped style and script blocks, and
//! offers reusable definitions (`[Template]`, `[Custom]`), imports,
//! namespaces, configuration overrides, and verbatim `[Origin]`
//! pass-through blocks.  Inside script blocks a companion sub-language,
//! CHTL-JS, extends JavaScript with enhanced selectors (`{{…}}`), an
//! arrow operator (`->`) and helpers (`listen`, `delegate`, `animate`,
//! `vir`).
//!
//! # Basic usage
//!
//! * Create a [`Compiler`], optionally via [`CompileOptions`].
//! * Call [`Compiler::compile_file`] or [`Compiler::compile_str`].
//! * Read the three streams and the diagnostics off the returned
//!   [`CompilationOutput`].
//!
//! # Example
//!
//! ```
//! let source = r#"
//!     div {
//!         id: main;
//!         style {
//!             .card { color: red; }
//!         }
//!         text { "hello" }
//!     }
//! "#;
//!
//! let output = chtl::Compiler::new()
//!     .compile_str(source, "example.chtl")
//!     .unwrap();
//!
//! assert!(output.success);
//! assert!(output.html.contains("class=\"card\""));
//! assert!(output.css.contains(".card {"));
//! ```
//!
//! # Pipeline
//!
//! A compilation makes the following passes; each one is a module:
//!
//! 1. The unified scanner ([`scanner`]) splits the source into typed
//!    fragments and decides where one sub-language ends and another
//!    begins.
//! 2. The lexer ([`lexer`]) turns CHTL fragments into tokens; the
//!    parser ([`parser`]) builds the syntax tree ([`ast`]).
//! 3. Semantic passes resolve names and imports: symbol tables and
//!    namespace merging in [`namespace`], import resolution in
//!    [`module_resolver`] and [`document`], module archives in
//!    [`modules`].
//! 4. The constrainer ([`constraint`]) enforces which constructs may
//!    appear in which block context.
//! 5. The generator ([`generator`]) expands templates and customs,
//!    applies specializations, lowers CHTL-JS, and assembles the
//!    HTML/CSS/JS streams.
//!
//! Compilation state (phases, scopes, per-node states) is tracked by
//! [`state`]; diagnostics carry `file:line:col` and a machine-stable
//! kind tag (see [`error`]).
//!
//! # Imports and the module directory
//!
//! `[Import] @Chtl` and `[Import] @CJmod` statements search the
//! official module directory (the `CHTL_MODULE_PATH` environment
//! variable), then a `module/` sub-directory next to the importing
//! file, then the importing file's own directory.  Asset imports
//! (`@Html`, `@Style`, `@JavaScript`) only look next to the importing
//! file.  All loaded paths are canonicalized; the import graph is kept
//! acyclic and a cycle is reported with its full chain.

#![allow(rustdoc::private_intra_doc_links)]
#![warn(nonstandard_style, rust_2018_idioms, unused)]
#![warn(trivial_casts, trivial_numeric_casts)]

// The public API is exported here
pub use crate::api::*;

#[macro_use]
pub mod log;

mod api;
pub mod ast;
pub mod config;
pub mod constraint;
pub mod document;
pub mod error;
pub mod generator;
mod io;
pub mod lexer;
mod limits;
pub mod module_resolver;
pub mod modules;
pub mod namespace;
pub mod parser;
pub mod scanner;
mod session;
pub mod state;
pub mod token;
mod util;

pub use crate::session::Session;

#[doc(hidden)]
pub mod bench_only {
    pub use crate::lexer::Lexer;
    pub use crate::scanner::Scanner;
}
