use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Widget};

use crate::app::ListPane;
use crate::list::optimistic::PostCard;
use crate::ui::post::{PostCardView, post_card_height};

/// A scrollable list of posts with selection highlight.
///
/// Used by the feed and every profile tab.
pub struct PostListView<'a> {
    pub title: &'a str,
    pub pane: &'a ListPane<PostCard>,
    pub bordered: bool,
    pub empty_message: &'a str,
}

impl<'a> PostListView<'a> {
    pub fn new(title: &'a str, pane: &'a ListPane<PostCard>) -> Self {
        Self {
            title,
            pane,
            bordered: true,
            empty_message: "No posts to display",
        }
    }

    pub fn bordered(mut self, bordered: bool) -> Self {
        self.bordered = bordered;
        self
    }

    pub fn empty_message(mut self, message: &'a str) -> Self {
        self.empty_message = message;
        self
    }
}

impl Widget for PostListView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = if self.bordered {
            let block = Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", self.title))
                .title_style(
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                )
                .border_style(Style::default().fg(Color::DarkGray));
            let inner = block.inner(area);
            block.render(area, buf);
            inner
        } else {
            area
        };

        let list = &self.pane.list;
        let cards = list.items();
        if cards.is_empty() {
            let msg = if list.is_empty_set() {
                self.empty_message
            } else if list.is_loading() || !list.is_initialized() {
                "Loading..."
            } else {
                "Posts could not be loaded (r to retry)"
            };
            buf.set_string(
                inner.x + 1,
                inner.y,
                msg,
                Style::default().fg(Color::DarkGray),
            );
            return;
        }

        let content_width = inner.width.saturating_sub(1); // 1 char left margin
        let available_height = inner.height;
        let selected = self.pane.selected;

        // Pre-compute heights for each card (including separator).
        let heights: Vec<u16> = cards
            .iter()
            .map(|c| post_card_height(c, content_width) + 1)
            .collect();

        let scroll_start = compute_scroll_start(&heights, selected, available_height);

        let mut y = inner.y;
        let mut idx = scroll_start;
        while idx < cards.len() && y < inner.y + inner.height {
            let card_h = heights[idx];
            let remaining = inner.y + inner.height - y;
            let render_h = card_h.min(remaining);

            let card_area = Rect::new(inner.x + 1, y, content_width, render_h.saturating_sub(1));
            PostCardView::new(&cards[idx])
                .selected(idx == selected)
                .render(card_area, buf);

            y += render_h;

            // Draw separator line
            if y < inner.y + inner.height && idx + 1 < cards.len() {
                let sep = "\u{2500}".repeat(content_width as usize);
                buf.set_string(
                    inner.x + 1,
                    y.saturating_sub(1),
                    &sep,
                    Style::default().fg(Color::DarkGray),
                );
            }

            idx += 1;
        }

        let footer = if list.is_loading() {
            Some("Loading more...")
        } else if list.is_exhausted() && idx == cards.len() {
            Some("End of list")
        } else {
            None
        };
        if let Some(footer) = footer
            && y < inner.y + inner.height
        {
            buf.set_string(
                inner.x + 1,
                y,
                footer,
                Style::default().fg(Color::DarkGray),
            );
        }
    }
}

/// Find the smallest scroll start index so that the selected item fits
/// within the available height.
pub fn compute_scroll_start(heights: &[u16], selected: usize, available: u16) -> usize {
    if heights.is_empty() {
        return 0;
    }

    let selected = selected.min(heights.len() - 1);
    if available == 0 {
        return selected;
    }

    // Keep the selected card visible and pack as many earlier cards above it
    // as fit.
    let mut start = selected;
    let mut used = heights[selected];

    while start > 0 {
        let next = used.saturating_add(heights[start - 1]);
        if next > available {
            break;
        }
        start -= 1;
        used = next;
    }

    start
}
