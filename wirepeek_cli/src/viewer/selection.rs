//! Mapping between rendered line/column positions and text offsets
//!
//! The detail pane renders the current text line by line. A selection is
//! made with a caret, so both its ends are line/column pairs that must be
//! turned back into char offsets into the whole text. Each line's offset is
//! the sum of the lengths of the lines before it plus their newlines.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Line layout of one text, in chars
#[derive(Debug, Clone)]
pub struct TextSurface {
    starts: Vec<usize>,
    lengths: Vec<usize>,
    total: usize,
}

impl TextSurface {
    pub fn new(text: &str) -> Self {
        let mut starts = Vec::new();
        let mut lengths = Vec::new();
        let mut offset = 0;

        for line in text.split('\n') {
            let len = line.chars().count();
            starts.push(offset);
            lengths.push(len);
            offset += len + 1;
        }

        Self {
            starts,
            lengths,
            total: text.chars().count(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lengths.len()
    }

    pub fn line_len(&self, line: usize) -> Option<usize> {
        self.lengths.get(line).copied()
    }

    /// Char length of the whole text
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Global offset of a position; columns past the line end clamp to it
    pub fn to_offset(&self, position: Position) -> Option<usize> {
        let start = *self.starts.get(position.line)?;
        let len = self.lengths[position.line];
        Some(start + position.column.min(len))
    }

    pub fn position_of(&self, offset: usize) -> Position {
        let offset = offset.min(self.total);
        let line = match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        };
        Position {
            line,
            column: offset - self.starts[line],
        }
    }

    /// Ordered `[start, end)` between two positions
    ///
    /// `None` when either position is off the surface or the range is empty.
    pub fn selection_range(&self, anchor: Position, caret: Position) -> Option<(usize, usize)> {
        let a = self.to_offset(anchor)?;
        let b = self.to_offset(caret)?;
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        (start < end).then_some((start, end))
    }

    /// Keep a caret on the surface
    pub fn clamp(&self, position: Position) -> Position {
        let line = position.line.min(self.line_count().saturating_sub(1));
        let column = position.column.min(self.lengths.get(line).copied().unwrap_or(0));
        Position { line, column }
    }

    pub fn left(&self, position: Position) -> Position {
        let offset = self.to_offset(self.clamp(position)).unwrap_or(0);
        self.position_of(offset.saturating_sub(1))
    }

    pub fn right(&self, position: Position) -> Position {
        let offset = self.to_offset(self.clamp(position)).unwrap_or(0);
        self.position_of(offset + 1)
    }

    pub fn up(&self, position: Position, rows: usize) -> Position {
        self.clamp(Position {
            line: position.line.saturating_sub(rows),
            column: position.column,
        })
    }

    pub fn down(&self, position: Position, rows: usize) -> Position {
        self.clamp(Position {
            line: position.line + rows,
            column: position.column,
        })
    }
}
