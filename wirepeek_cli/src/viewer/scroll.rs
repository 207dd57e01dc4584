//! Follow-the-tail scrolling for the entry list
//!
//! Everything is measured in rows. The list follows new entries only while
//! the viewport sits within `threshold` rows of the bottom.

/// Rows from the bottom that still count as "at the bottom"
pub const DEFAULT_THRESHOLD: usize = 2;

#[derive(Debug, Clone)]
pub struct AutoScroll {
    offset: usize,
    viewport: usize,
    content: usize,
    threshold: usize,
}

impl Default for AutoScroll {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl AutoScroll {
    pub fn new(threshold: usize) -> Self {
        Self {
            offset: 0,
            viewport: 0,
            content: 0,
            threshold,
        }
    }

    /// First visible row
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn viewport(&self) -> usize {
        self.viewport
    }

    fn max_offset(&self) -> usize {
        self.content.saturating_sub(self.viewport)
    }

    /// Rows hidden below the viewport
    pub fn rows_below(&self) -> usize {
        self.content.saturating_sub(self.offset + self.viewport)
    }

    pub fn is_near_bottom(&self) -> bool {
        self.rows_below() <= self.threshold
    }

    /// Content grew to `new_len` rows
    ///
    /// Jumps to the bottom only if the view was near the bottom before.
    pub fn on_append(&mut self, new_len: usize) {
        let follow = self.is_near_bottom();
        self.content = new_len;
        if follow {
            self.to_bottom();
        } else {
            self.clamp();
        }
    }

    /// Content changed for a reason other than an append (filter, eviction)
    pub fn set_content_len(&mut self, len: usize) {
        self.content = len;
        self.clamp();
    }

    pub fn set_viewport(&mut self, rows: usize) {
        let follow = self.is_near_bottom();
        self.viewport = rows;
        if follow {
            self.to_bottom();
        } else {
            self.clamp();
        }
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.offset = self.offset.saturating_sub(rows);
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.offset = (self.offset + rows).min(self.max_offset());
    }

    pub fn to_top(&mut self) {
        self.offset = 0;
    }

    pub fn to_bottom(&mut self) {
        self.offset = self.max_offset();
    }

    /// Scroll the minimum needed to bring `row` into view
    pub fn ensure_visible(&mut self, row: usize) {
        if row < self.offset {
            self.offset = row;
        } else if self.viewport > 0 && row >= self.offset + self.viewport {
            self.offset = row + 1 - self.viewport;
        }
        self.clamp();
    }

    fn clamp(&mut self) {
        self.offset = self.offset.min(self.max_offset());
    }
}
