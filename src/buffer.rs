//! Transcript text buffer with width-aware wrapping and reflow.
//!
//! Received (and locally echoed) text lives in two rings: the *store* of
//! logical lines, one per received line, and the *visual* ring derived from
//! it by wrapping against the current viewport width. The visual ring is
//! never edited in place; a resize throws it away and rewraps the whole
//! store. Scrolling is an index into the visual ring, clamped so the
//! viewport never runs past the ends.

use std::collections::VecDeque;

use unicode_width::UnicodeWidthChar;

/// Maximum logical lines kept in the store ring.
pub const STORE_LIMIT: usize = 20_000;

/// Maximum wrapped lines kept in the visual ring.
pub const VISUAL_LIMIT: usize = 200_000;

/// Tab stop in display columns.
const TAB_STOP: usize = 8;

/// Display-cell width of one codepoint; unmeasurable codepoints count as 1.
pub fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(1)
}

/// Display-cell width of a string.
pub fn display_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

/// Expand tabs to spaces at `TAB_STOP`-column stops, measured in display
/// columns rather than codepoint count.
pub fn expand_tabs(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut col = 0;
    for ch in input.chars() {
        if ch == '\t' {
            let next = (col / TAB_STOP + 1) * TAB_STOP;
            for _ in col..next {
                out.push(' ');
            }
            col = next;
        } else {
            out.push(ch);
            col += char_width(ch);
        }
    }
    out
}

/// Scrollback store plus the derived wrapped view.
pub struct TextBuffer {
    /// Logical lines, oldest first, tabs already expanded.
    store: VecDeque<String>,
    /// Wrapped lines derived from `store` at the current width.
    visual: VecDeque<String>,
    /// Index of the first visible visual line.
    view_top: usize,
    /// Wrap width in display columns.
    width: usize,
    /// Viewport height in rows.
    height: usize,
    store_limit: usize,
    visual_limit: usize,
}

impl TextBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            store: VecDeque::new(),
            visual: VecDeque::new(),
            view_top: 0,
            width: width.max(1),
            height: height.max(1),
            store_limit: STORE_LIMIT,
            visual_limit: VISUAL_LIMIT,
        }
    }

    #[cfg(test)]
    fn with_limits(width: usize, height: usize, store_limit: usize, visual_limit: usize) -> Self {
        let mut buf = Self::new(width, height);
        buf.store_limit = store_limit;
        buf.visual_limit = visual_limit;
        buf
    }

    /// Whether the viewport is anchored at (or within one line of) the
    /// bottom, i.e. new content should stay visible.
    pub fn is_following(&self) -> bool {
        self.view_top + self.height >= self.visual.len().saturating_sub(1)
    }

    /// Append one logical line: expand tabs, store it (evicting the oldest
    /// on overflow), and wrap it into the visual ring. With `follow` the
    /// viewport is re-anchored to the bottom afterwards.
    pub fn append_line(&mut self, line: &str, follow: bool) {
        let expanded = expand_tabs(line);

        if self.store.len() == self.store_limit {
            self.store.pop_front();
        }
        for seg in wrap_line(&expanded, self.width) {
            self.push_visual(seg);
        }
        self.store.push_back(expanded);

        if follow {
            self.view_top = self.max_top();
        }
    }

    fn push_visual(&mut self, seg: String) {
        if self.visual.len() == self.visual_limit {
            self.visual.pop_front();
            // The head eviction shifts everything up one; keep the anchor
            // pointing at the same content
            if self.view_top > 0 {
                self.view_top -= 1;
            }
        }
        self.visual.push_back(seg);
    }

    /// Change viewport dimensions. Callers follow up with [`reflow`],
    /// since wrap boundaries depend on the width.
    ///
    /// [`reflow`]: TextBuffer::reflow
    pub fn set_viewport(&mut self, width: usize, height: usize) {
        self.width = width.max(1);
        self.height = height.max(1);
    }

    /// Discard the visual ring and rewrap every stored line at the current
    /// width. `keep_bottom` re-anchors to the bottom; otherwise the old
    /// scroll position is clamped into the new valid range.
    pub fn reflow(&mut self, keep_bottom: bool) {
        self.visual.clear();
        for i in 0..self.store.len() {
            // Indexed loop: push_visual needs &mut self
            let segs = wrap_line(&self.store[i], self.width);
            for seg in segs {
                self.push_visual(seg);
            }
        }
        if keep_bottom {
            self.view_top = self.max_top();
        } else {
            self.view_top = self.view_top.min(self.max_top());
        }
    }

    fn max_top(&self) -> usize {
        self.visual.len().saturating_sub(self.height)
    }

    /// The visual lines currently in the viewport, top to bottom.
    pub fn visible_lines(&self) -> impl Iterator<Item = &str> {
        self.visual
            .iter()
            .skip(self.view_top)
            .take(self.height)
            .map(String::as_str)
    }

    pub fn page_up(&mut self) {
        self.view_top = self.view_top.saturating_sub(self.height / 2);
    }

    pub fn page_down(&mut self) {
        self.view_top = (self.view_top + self.height / 2).min(self.max_top());
    }

    pub fn line_up(&mut self) {
        self.view_top = self.view_top.saturating_sub(1);
    }

    pub fn line_down(&mut self) {
        self.view_top = (self.view_top + 1).min(self.max_top());
    }

    pub fn scroll_home(&mut self) {
        self.view_top = 0;
    }

    pub fn scroll_end(&mut self) {
        self.view_top = self.max_top();
    }

    #[cfg(test)]
    fn visual_lines(&self) -> Vec<&str> {
        self.visual.iter().map(String::as_str).collect()
    }
}

/// Wrap one logical line against `width` display columns.
///
/// Scans codepoints accumulating display width, remembering the last break
/// opportunity (space or ASCII punctuation). On overflow the cut lands just
/// after the last break when one exists, else at the current position, and
/// always takes at least one codepoint so a codepoint wider than the whole
/// width still makes progress. Space runs after a cut are elided so no
/// visual line starts with a space.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let chars: Vec<char> = line.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }

    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let start = i;
        let mut col = 0;
        let mut overflow = false;
        let mut last_break: Option<usize> = None;

        while i < chars.len() {
            let ch = chars[i];
            let w = char_width(ch);
            if ch == ' ' || ch.is_ascii_punctuation() {
                last_break = Some(i);
            }
            if col + w > width {
                overflow = true;
                break;
            }
            col += w;
            i += 1;
            if col == width {
                break;
            }
        }

        let mut end = i;
        if overflow {
            if let Some(bp) = last_break {
                end = bp + 1;
            } else if end == start {
                // Single codepoint wider than the viewport: take it anyway
                end = start + 1;
            }
        }

        out.push(chars[start..end].iter().collect());

        // Don't start the next visual line with the spaces the break ate
        while end < chars.len() && chars[end] == ' ' {
            end += 1;
        }
        i = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaks_at_space_and_elides_it() {
        assert_eq!(wrap_line("hello world", 5), vec!["hello", "world"]);
    }

    #[test]
    fn short_line_is_one_visual_line() {
        assert_eq!(wrap_line("hi", 80), vec!["hi"]);
    }

    #[test]
    fn empty_line_is_one_empty_visual_line() {
        assert_eq!(wrap_line("", 10), vec![""]);
    }

    #[test]
    fn hard_cut_without_break_opportunity() {
        assert_eq!(wrap_line("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn backtracks_to_punctuation_on_overflow() {
        // The wide codepoint overflows width 4, so the cut backtracks to
        // just after the comma
        assert_eq!(wrap_line("ab,漢x", 4), vec!["ab,", "漢x"]);
    }

    #[test]
    fn wide_codepoint_never_splits() {
        // '漢' is two columns wide; at width 3 only one fits per row
        // alongside an ASCII char
        assert_eq!(wrap_line("a漢b漢", 3), vec!["a漢", "b漢"]);
    }

    #[test]
    fn codepoint_wider_than_width_still_progresses() {
        assert_eq!(wrap_line("漢字", 1), vec!["漢", "字"]);
    }

    #[test]
    fn multiple_spaces_after_break_are_skipped() {
        assert_eq!(wrap_line("hello   world", 5), vec!["hello", "world"]);
    }

    #[test]
    fn wrap_width_property() {
        let samples = [
            "the quick brown fox jumps over the lazy dog",
            "no-breaks-here-except-punctuation",
            "漢字と ascii の mixture です",
            "trailing spaces   ",
            "a",
        ];
        for line in samples {
            for width in 1..=12 {
                for seg in wrap_line(line, width) {
                    // A forced single codepoint may exceed the width; any
                    // multi-codepoint segment must fit
                    if seg.chars().count() > 1 {
                        assert!(
                            display_width(&seg) <= width,
                            "{:?} too wide for {}",
                            seg,
                            width
                        );
                    }
                    assert!(!seg.is_empty(), "empty segment for {:?}", line);
                }
            }
        }
    }

    #[test]
    fn wrap_reassembles_content_modulo_elided_spaces() {
        let line = "alpha beta  gamma delta";
        for width in 3..=10 {
            let joined: String = wrap_line(line, width).concat();
            let without_spaces: String = line.chars().filter(|c| *c != ' ').collect();
            let joined_without: String = joined.chars().filter(|c| *c != ' ').collect();
            assert_eq!(joined_without, without_spaces, "width {}", width);
        }
    }

    #[test]
    fn tabs_expand_to_display_columns() {
        assert_eq!(expand_tabs("a\tb"), "a       b");
        assert_eq!(expand_tabs("\tx"), "        x");
        // '漢' occupies two columns, so the tab pads six
        assert_eq!(expand_tabs("漢\tx"), "漢      x");
        assert_eq!(expand_tabs("12345678\tx"), "12345678        x");
    }

    #[test]
    fn append_follow_keeps_bottom_visible() {
        let mut buf = TextBuffer::new(10, 3);
        for i in 0..10 {
            buf.append_line(&format!("line {}", i), true);
        }
        let visible: Vec<&str> = buf.visible_lines().collect();
        assert_eq!(visible, vec!["line 7", "line 8", "line 9"]);
    }

    #[test]
    fn append_without_follow_holds_position() {
        let mut buf = TextBuffer::new(10, 3);
        for i in 0..6 {
            buf.append_line(&format!("line {}", i), true);
        }
        buf.scroll_home();
        buf.append_line("line 6", false);
        let visible: Vec<&str> = buf.visible_lines().collect();
        assert_eq!(visible, vec!["line 0", "line 1", "line 2"]);
    }

    #[test]
    fn store_eviction_caps_count_and_drops_oldest() {
        let mut buf = TextBuffer::with_limits(10, 3, 4, 100);
        for i in 0..8 {
            buf.append_line(&format!("L{}", i), true);
        }
        assert_eq!(buf.store.len(), 4);
        assert_eq!(buf.store.front().map(String::as_str), Some("L4"));
        // Reflow only sees the surviving store lines
        buf.reflow(true);
        assert_eq!(buf.visual_lines(), vec!["L4", "L5", "L6", "L7"]);
    }

    #[test]
    fn visual_eviction_shifts_anchor() {
        let mut buf = TextBuffer::with_limits(10, 2, 100, 4);
        for i in 0..4 {
            buf.append_line(&format!("V{}", i), false);
        }
        buf.view_top = 2;
        buf.append_line("V4", false);
        // Head eviction removed one line before the anchor
        assert_eq!(buf.visual.len(), 4);
        assert_eq!(buf.view_top, 1);
        let visible: Vec<&str> = buf.visible_lines().collect();
        assert_eq!(visible, vec!["V2", "V3"]);
    }

    #[test]
    fn view_top_never_exceeds_valid_range_after_eviction() {
        let mut buf = TextBuffer::with_limits(10, 2, 100, 3);
        for i in 0..20 {
            buf.append_line(&format!("x{}", i), true);
        }
        assert!(buf.visual.len() <= 3);
        assert!(buf.view_top <= buf.max_top());
    }

    #[test]
    fn reflow_is_deterministic() {
        let mut buf = TextBuffer::new(7, 3);
        buf.append_line("the quick brown fox", true);
        buf.append_line("jumps over the lazy dog", true);
        buf.reflow(true);
        let first = buf
            .visual_lines()
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        buf.reflow(true);
        let second = buf
            .visual_lines()
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        assert_eq!(first, second);
    }

    #[test]
    fn reflow_rewraps_at_new_width() {
        let mut buf = TextBuffer::new(80, 3);
        buf.append_line("hello world", true);
        assert_eq!(buf.visual_lines(), vec!["hello world"]);
        buf.set_viewport(5, 3);
        buf.reflow(true);
        assert_eq!(buf.visual_lines(), vec!["hello", "world"]);
    }

    #[test]
    fn reflow_without_keep_bottom_clamps_position() {
        let mut buf = TextBuffer::new(5, 2);
        for i in 0..8 {
            buf.append_line(&format!("w{}", i), true);
        }
        buf.view_top = 6;
        // Wider viewport shrinks the visual count; position must clamp
        buf.set_viewport(80, 6);
        buf.reflow(false);
        assert!(buf.view_top <= buf.max_top());
    }

    #[test]
    fn scrolling_clamps_at_both_ends() {
        let mut buf = TextBuffer::new(10, 4);
        for i in 0..10 {
            buf.append_line(&format!("s{}", i), true);
        }
        buf.scroll_home();
        buf.line_up();
        assert_eq!(buf.view_top, 0);
        buf.page_up();
        assert_eq!(buf.view_top, 0);
        buf.scroll_end();
        assert_eq!(buf.view_top, buf.max_top());
        buf.line_down();
        assert_eq!(buf.view_top, buf.max_top());
        buf.page_down();
        assert_eq!(buf.view_top, buf.max_top());
        buf.page_up();
        assert_eq!(buf.view_top, buf.max_top() - 2);
        buf.line_up();
        buf.line_down();
        assert_eq!(buf.view_top, buf.max_top() - 2);
    }

    #[test]
    fn following_is_detected_at_bottom() {
        let mut buf = TextBuffer::new(10, 3);
        assert!(buf.is_following());
        for i in 0..10 {
            buf.append_line(&format!("f{}", i), true);
        }
        assert!(buf.is_following());
        buf.scroll_home();
        assert!(!buf.is_following());
        buf.scroll_end();
        assert!(buf.is_following());
    }
}
