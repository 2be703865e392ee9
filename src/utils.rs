//! Source position helpers shared by the script harness.

use rustpython_ast::TextSize;
use std::collections::HashSet;

/// Marker comment that tolerates a top-level statement running on load.
pub const ALLOW_LOAD_PRAGMA: &str = "pragma: herald allow-load";

/// Maps byte offsets from the parser to 1-indexed line numbers.
pub struct LineIndex {
    /// Byte offset of the start of each line.
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Records where each line of `source` starts.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .char_indices()
                .filter(|(_, ch)| *ch == '\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    /// Converts a byte offset to a 1-indexed line number.
    pub fn line_index(&self, offset: TextSize) -> usize {
        let offset = offset.to_usize();
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line + 1,
            Err(line) => line,
        }
    }
}

/// Lines (1-indexed) carrying the allow-load pragma.
pub fn get_allowed_lines(source: &str) -> HashSet<usize> {
    source
        .lines()
        .enumerate()
        .filter(|(_, line)| line.contains(ALLOW_LOAD_PRAGMA))
        .map(|(i, _)| i + 1)
        .collect()
}
