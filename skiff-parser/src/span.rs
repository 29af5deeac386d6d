// skiff-parser - Source locations and spans
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Source locations and spans.
//!
//! Every token and AST node carries a [`SourceSpan`] so later phases can
//! point diagnostics back at the source text.

use std::fmt;
use std::rc::Rc;

/// A line/column position in a source file. Both are 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    /// Create a new location.
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Advance the column within the current line.
    #[inline]
    pub fn advance_by(&mut self, by: u32) {
        self.column += by;
    }

    /// Move to the start of the next line.
    #[inline]
    pub fn newline(&mut self) {
        self.column = 1;
        self.line += 1;
    }
}

impl Default for Location {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

/// A contiguous region of source text: file, consumed length in characters,
/// and the start/end positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpan {
    pub file: Rc<str>,
    pub length: u32,
    pub start: Location,
    pub end: Location,
}

impl SourceSpan {
    /// Create a new span.
    pub fn new(file: Rc<str>, length: u32, start: Location, end: Location) -> Self {
        Self {
            file,
            length,
            start,
            end,
        }
    }

    /// An empty span pointing nowhere. Used for synthesised instructions
    /// that have no source counterpart.
    pub fn empty() -> Self {
        Self {
            file: Rc::from(""),
            length: 0,
            start: Location::new(0, 0),
            end: Location::new(0, 0),
        }
    }

    /// Extend this span to end where `other` ends (span union).
    pub fn extend(&self, other: &SourceSpan) -> SourceSpan {
        SourceSpan {
            file: Rc::clone(&self.file),
            length: self.length,
            start: self.start,
            end: other.end,
        }
    }

}

impl Default for SourceSpan {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}:{}..{}:{}]",
            self.file, self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}
