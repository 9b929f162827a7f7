//! Scroll tracking for the message list.
//!
//! All measurements are in rendered lines. The view always follows new
//! content: any change in visible message count or busy state issues a
//! scroll-to-bottom, whether or not the reader had scrolled away.

/// Distance from the bottom, in lines, under which the reader counts as
/// being at the bottom.
pub const NEAR_BOTTOM_THRESHOLD: u16 = 2;

#[derive(Debug, Clone, Default)]
pub struct ViewSync {
    offset: u16,
    viewport_height: u16,
    content_height: u16,
    seen_len: usize,
    seen_busy: bool,
    pending_jump: bool,
}

impl ViewSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare against the last observation and jump to the bottom if the
    /// visible message count or busy state changed. Returns whether a jump
    /// was issued.
    pub fn observe(&mut self, visible_len: usize, busy: bool) -> bool {
        let changed = visible_len != self.seen_len || busy != self.seen_busy;
        self.seen_len = visible_len;
        self.seen_busy = busy;
        if changed {
            self.scroll_to_bottom();
        }
        changed
    }

    /// Jump to the newest content. Resolved against the real content height
    /// on the next [`ViewSync::set_geometry`].
    pub fn scroll_to_bottom(&mut self) {
        self.offset = self.max_offset();
        self.pending_jump = true;
    }

    /// Record the viewport and content size after layout.
    pub fn set_geometry(&mut self, viewport_height: u16, content_height: u16) {
        self.viewport_height = viewport_height;
        self.content_height = content_height;
        if self.pending_jump {
            self.offset = self.max_offset();
            self.pending_jump = false;
        } else {
            self.offset = self.offset.min(self.max_offset());
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.pending_jump = false;
        self.offset = self.offset.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.pending_jump = false;
        self.offset = self.offset.saturating_add(lines).min(self.max_offset());
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.page());
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.page());
    }

    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn max_offset(&self) -> u16 {
        self.content_height.saturating_sub(self.viewport_height)
    }

    pub fn distance_from_bottom(&self) -> u16 {
        if self.pending_jump {
            0
        } else {
            self.max_offset().saturating_sub(self.offset)
        }
    }

    pub fn is_near_bottom(&self) -> bool {
        self.distance_from_bottom() < NEAR_BOTTOM_THRESHOLD
    }

    /// Whether the manual "scroll to bottom" control should be shown.
    pub fn show_jump_control(&self) -> bool {
        !self.is_near_bottom()
    }

    fn page(&self) -> u16 {
        self.viewport_height.saturating_sub(1).max(1)
    }
}
