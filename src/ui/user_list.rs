use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Widget};

use crate::api::types::{FollowStatus, UserSummary};
use crate::app::ListPane;

/// One row per user: name, relationship and a follow button.
pub struct UserListView<'a> {
    pub title: &'a str,
    pub pane: &'a ListPane<UserSummary>,
    pub viewer: Option<u64>,
    pub border_color: Color,
}

impl<'a> UserListView<'a> {
    pub fn new(title: &'a str, pane: &'a ListPane<UserSummary>, viewer: Option<u64>) -> Self {
        Self {
            title,
            pane,
            viewer,
            border_color: Color::DarkGray,
        }
    }

    pub fn border_color(mut self, color: Color) -> Self {
        self.border_color = color;
        self
    }
}

impl Widget for UserListView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", self.title))
            .title_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .border_style(Style::default().fg(self.border_color));

        let inner = block.inner(area);
        block.render(area, buf);

        let list = &self.pane.list;
        let users = list.items();
        if users.is_empty() {
            let msg = if list.is_empty_set() {
                "No users to display"
            } else if list.is_loading() || !list.is_initialized() {
                "Loading..."
            } else {
                "Users could not be loaded (r to retry)"
            };
            buf.set_string(
                inner.x + 1,
                inner.y,
                msg,
                Style::default().fg(Color::DarkGray),
            );
            return;
        }

        let height = inner.height as usize;
        if height == 0 {
            return;
        }
        let selected = self.pane.selected.min(users.len() - 1);
        let start = selected.saturating_sub(height - 1);

        for (row, (idx, user)) in users.iter().enumerate().skip(start).take(height).enumerate() {
            let y = inner.y + row as u16;
            let is_selected = idx == selected;
            let line = user_row(user, is_selected, Some(user.id) == self.viewer);
            buf.set_line(inner.x + 1, y, &line, inner.width.saturating_sub(1));
        }

        let shown = start + height;
        if list.is_loading() && shown > users.len() {
            let y = inner.y + (users.len() - start) as u16;
            buf.set_string(
                inner.x + 1,
                y,
                "Loading more...",
                Style::default().fg(Color::DarkGray),
            );
        }
    }
}

fn user_row(user: &UserSummary, selected: bool, is_viewer: bool) -> Line<'_> {
    let marker = if selected { "\u{25B8} " } else { "  " };
    let name_style = if selected {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };

    let mut spans = vec![
        Span::styled(marker, Style::default().fg(Color::Cyan)),
        Span::styled(user.name.as_str(), name_style),
        Span::styled(format!(" #{}", user.id), Style::default().fg(Color::DarkGray)),
    ];

    if is_viewer {
        spans.push(Span::styled(" (you)", Style::default().fg(Color::DarkGray)));
        return Line::from(spans);
    }

    if user.follows_back {
        spans.push(Span::styled(
            " follows you",
            Style::default().fg(Color::DarkGray),
        ));
    }

    let status = FollowStatus {
        follows: user.follows,
        follows_back: user.follows_back,
    };
    let button_style = if user.follows {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Yellow)
    };
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
        format!("[{}]", status.button_label()),
        button_style,
    ));
    Line::from(spans)
}
