//! Immutable source text with byte offset to line/column mapping.
//!
//! Error reporting works with byte offsets internally; the document keeps
//! a line index so diagnostics can be rendered as 1-based line/column
//! positions with the offending source line.

/// A 1-based line/column position inside a [`SourceDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCol {
    pub line: usize,
    pub column: usize,
}

/// Input text plus a precomputed index of line start offsets. Constructed
/// once per invocation and read-only thereafter.
#[derive(Debug)]
pub struct SourceDocument {
    text: String,
    line_starts: Vec<usize>,
}

impl SourceDocument {
    pub fn new(text: String) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { text, line_starts }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Map a byte offset to a line/column pair. Offsets past the end of
    /// the document clamp to the final position.
    pub fn locate(&self, offset: usize) -> LineCol {
        let offset = offset.min(self.text.len());
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        LineCol {
            line: line_idx + 1,
            column: offset - self.line_starts[line_idx] + 1,
        }
    }

    /// The full source line containing `offset`, without its terminator.
    pub fn line_at(&self, offset: usize) -> &str {
        let lc = self.locate(offset);
        let start = self.line_starts[lc.line - 1];
        let end = self
            .line_starts
            .get(lc.line)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        self.text[start..end].trim_end_matches('\r')
    }
}
