//! Processing limits to mitigate hostile CHTL documents.

/// Initial window size, in bytes, for the unified scanner's slices.
///
/// The scanner reads the source in windows; a slice that does not close
/// within the current window is grown by [`SLICE_EXPANSION_STEP`] until it
/// either closes or reaches [`MAX_SLICE_SIZE`].
pub const INITIAL_SLICE_SIZE: usize = 1024;

/// How much a scanner window grows when a slice ends inside an unbalanced
/// construct.
pub const SLICE_EXPANSION_STEP: usize = 512;

/// Hard maximum for a single scanner slice.
///
/// Beyond this the slice is emitted as `Mixed` and the parser is asked to
/// continue on partial input.  Without a hard maximum, a single unclosed
/// brace near the top of a large file would make the scanner buffer the
/// whole rest of the document as one slice.
pub const MAX_SLICE_SIZE: usize = 8192;

/// Maximum size of an aggregated run of minimal units.
///
/// Adjacent minimal units of the same kind are merged greedily up to this
/// many bytes; see the scanner's aggregation pass.
pub const MAX_AGGREGATION_SIZE: usize = 2048;

/// Maximum nesting depth of `{}` blocks the parser will follow.
///
/// This is a mitigation for documents which open thousands of nested
/// blocks in an attempt to exhaust the stack; the recursive-descent
/// parser recurses once per block.
pub const MAX_BLOCK_NESTING_DEPTH: usize = 200;

/// Maximum number of files that a single compilation may load through
/// imports, including the entry file.
///
/// Imagine the XML billion laughs attack, but done with `[Import]`
/// statements: each imported file imports ten more.  The import graph is
/// deduplicated by canonical path, so this limit is only reachable with
/// that many distinct files, but it still bounds the work.
pub const MAX_IMPORTED_FILES: usize = 1000;

/// Maximum depth of the import chain (A imports B imports C ...).
pub const MAX_IMPORT_DEPTH: usize = 20;

/// Maximum recursion depth when expanding template and custom
/// inheritance.
///
/// Inheritance cycles are detected and reported separately; this bounds
/// legitimate but pathologically deep chains.
pub const MAX_EXPANSION_DEPTH: usize = 64;

/// Maximum number of alternative spellings a `[Name]` rebinding may
/// declare for one logical token, unless overridden by the
/// `OPTION_COUNT` configuration option.
pub const DEFAULT_OPTION_COUNT: usize = 3;
