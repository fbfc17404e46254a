//! Vertical flow and pagination.

use crate::canvas::{Color, Font, Page, PAGE_HEIGHT, PAGE_WIDTH};
use crate::format::{text_width, wrap};

pub const MARGIN: f32 = 36.0;
pub const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const FOOTER_HEIGHT: f32 = 24.0;
const FOOTER_SIZE: f32 = 8.0;
/// Lowest y any block may reach before the page must break.
const CONTENT_BOTTOM: f32 = PAGE_HEIGHT - MARGIN - FOOTER_HEIGHT;

pub const TITLE_SIZE: f32 = 18.0;
pub const HEADING_SIZE: f32 = 14.0;
pub const SUBHEADING_SIZE: f32 = 12.0;
pub const BODY_SIZE: f32 = 10.0;

/// A top-down cursor over a growing list of pages.
pub struct Layout {
    pages: Vec<Page>,
    cursor: f32,
}

impl Layout {
    pub fn new() -> Self {
        Self {
            pages: vec![Page::new()],
            cursor: MARGIN,
        }
    }

    pub fn page(&mut self) -> &mut Page {
        // `new` seeds one page and pages are only ever pushed.
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn cursor(&self) -> f32 {
        self.cursor
    }

    pub fn advance(&mut self, height: f32) {
        self.cursor += height;
    }

    /// Vertical room left above the footer.
    pub fn remaining(&self) -> f32 {
        CONTENT_BOTTOM - self.cursor
    }

    /// Height available on a fresh page.
    pub fn page_capacity() -> f32 {
        CONTENT_BOTTOM - MARGIN
    }

    pub fn break_page(&mut self) {
        self.pages.push(Page::new());
        self.cursor = MARGIN;
    }

    /// Start a new page unless `height` still fits. Returns whether it broke.
    pub fn ensure(&mut self, height: f32) -> bool {
        if height > self.remaining() && self.cursor > MARGIN {
            self.break_page();
            return true;
        }
        false
    }

    fn line_height(size: f32) -> f32 {
        size * 1.2
    }

    pub fn heading(&mut self, text: &str, size: f32) {
        // keep a heading together with at least a couple of body lines
        self.heading_above(text, size, 3.0 * Self::line_height(BODY_SIZE));
    }

    /// Heading that moves to a new page together with the `block` drawn
    /// right after it.
    pub fn heading_above(&mut self, text: &str, size: f32, block: f32) {
        let height = Self::line_height(size) + size * 0.5;
        self.ensure(height + block);
        let baseline = self.cursor + size;
        self.page()
            .text(MARGIN, baseline, Font::Bold, size, Color::BLACK, text);
        self.advance(height);
    }

    /// Centered title line.
    pub fn title(&mut self, text: &str) {
        let width = text_width(text, TITLE_SIZE).min(CONTENT_WIDTH);
        let x = MARGIN + (CONTENT_WIDTH - width) / 2.0;
        let baseline = self.cursor + TITLE_SIZE;
        self.page()
            .text(x, baseline, Font::Bold, TITLE_SIZE, Color::BLACK, text);
        self.advance(Self::line_height(TITLE_SIZE) + 12.0);
    }

    pub fn paragraph(&mut self, text: &str, size: f32, color: Color) {
        let height = Self::line_height(size);
        for line in wrap(text, CONTENT_WIDTH, size) {
            self.ensure(height);
            let baseline = self.cursor + size;
            self.page()
                .text(MARGIN, baseline, Font::Regular, size, color, &line);
            self.advance(height);
        }
    }

    /// Stamp `Page i of n` on every page and hand the pages over.
    pub fn finish(mut self) -> Vec<Page> {
        let total = self.pages.len();
        for (i, page) in self.pages.iter_mut().enumerate() {
            let label = format!("Page {} of {}", i + 1, total);
            let x = PAGE_WIDTH - MARGIN - text_width(&label, FOOTER_SIZE);
            let baseline = PAGE_HEIGHT - MARGIN + FOOTER_SIZE / 2.0;
            page.text(x, baseline, Font::Regular, FOOTER_SIZE, Color::MUTED, &label);
        }
        self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_paragraphs_flow_onto_new_pages() {
        let mut layout = Layout::new();
        let text = "lorem ipsum dolor sit amet ".repeat(600);
        layout.paragraph(&text, BODY_SIZE, Color::BLACK);
        let pages = layout.finish();
        assert!(pages.len() > 1);
        for (i, page) in pages.iter().enumerate() {
            let footer = page.texts().last().unwrap();
            assert_eq!(footer, &format!("Page {} of {}", i + 1, pages.len()));
        }
    }

    #[test]
    fn ensure_never_breaks_an_empty_page() {
        let mut layout = Layout::new();
        assert!(!layout.ensure(Layout::page_capacity() * 2.0));
        layout.advance(10.0);
        assert!(layout.ensure(Layout::page_capacity()));
        assert_eq!(layout.cursor(), MARGIN);
    }
}
