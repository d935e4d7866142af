use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};

use crate::app::FailedRequest;
use crate::ui::post::wrap_text;

const MAX_WIDTH: u16 = 64;

/// Overlay with the context, time and full error text of the last failed request.
pub struct ErrorPanel<'a> {
    failure: &'a FailedRequest,
}

impl<'a> ErrorPanel<'a> {
    pub fn new(failure: &'a FailedRequest) -> Self {
        Self { failure }
    }

    fn lines(&self, width: usize) -> Vec<Line<'a>> {
        let label = Style::default().fg(Color::DarkGray);
        let mut lines = vec![
            Line::from(vec![
                Span::styled(
                    self.failure.context.as_str(),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("  at {}", self.failure.at.format("%H:%M:%S")),
                    label,
                ),
            ]),
            Line::from(""),
        ];
        lines.extend(
            wrap_text(&self.failure.message, width)
                .into_iter()
                .map(|row| Line::from(Span::styled(row, Style::default().fg(Color::Red)))),
        );
        if self.failure.is_auth_failure() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Run `fixit login` to sign in again.",
                Style::default().fg(Color::Yellow),
            )));
        }
        lines
    }
}

impl Widget for ErrorPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = MAX_WIDTH.min(area.width.saturating_sub(4));
        let text_width = width.saturating_sub(4) as usize;
        let lines = self.lines(text_width);

        // Borders plus a blank row above the dismiss hint.
        let wanted = lines.len() as u16 + 3;
        let height = wanted.min(area.height.saturating_sub(2));
        if height < 4 {
            return;
        }
        let x = area.x + (area.width.saturating_sub(width)) / 2;
        let y = area.y + (area.height.saturating_sub(height)) / 2;
        let panel = Rect::new(x, y, width, height);

        Clear.render(panel, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Request failed ")
            .title_bottom(Line::from(" Esc/Enter to dismiss ").right_aligned())
            .title_style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
            .border_style(Style::default().fg(Color::Red));
        let inner = block.inner(panel);
        block.render(panel, buf);

        let text_area = Rect::new(
            inner.x + 1,
            inner.y,
            inner.width.saturating_sub(2),
            inner.height,
        );
        Paragraph::new(lines).render(text_area, buf);
    }
}
