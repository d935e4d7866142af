use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;
use unicode_width::UnicodeWidthStr;

use crate::app::{App, AppMode};
use crate::event::ViewKind;

/// Bottom status bar showing mode, current view, viewer and status messages.
pub struct StatusBar<'a> {
    pub app: &'a App,
}

impl<'a> StatusBar<'a> {
    pub fn new(app: &'a App) -> Self {
        Self { app }
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        // Background
        let bg_style = Style::default().bg(Color::DarkGray).fg(Color::White);
        for x in area.x..area.x + area.width {
            buf[(x, area.y)].set_style(bg_style);
        }

        let mut spans = Vec::new();

        // Mode indicator
        let (mode_str, mode_bg) = match self.app.mode {
            AppMode::Normal => (" NORMAL ", Color::Blue),
            AppMode::Command => (" COMMAND ", Color::Magenta),
        };
        let mode_style = Style::default()
            .bg(mode_bg)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);
        spans.push(Span::styled(mode_str, mode_style));
        spans.push(Span::raw(" "));

        // Current view
        let view_name = match self.app.current_view() {
            Some(ViewKind::Feed) => "Feed".to_string(),
            Some(ViewKind::Explore) => "Explore".to_string(),
            Some(ViewKind::Profile(id)) => {
                let loaded = self.app.profile.as_ref().and_then(|p| p.data.as_ref());
                match loaded {
                    Some(data) => format!("Profile: {}", data.name),
                    None => format!("Profile: #{id}"),
                }
            }
            Some(ViewKind::Help) => "Help".to_string(),
            None => "fixit".to_string(),
        };
        spans.push(Span::styled(view_name, bg_style));

        // Viewer
        let viewer = match self.app.session.current_user() {
            Some(user) => format!(" | {}", user.name),
            None => " | not logged in".to_string(),
        };
        spans.push(Span::styled(
            viewer,
            Style::default().bg(Color::DarkGray).fg(Color::Gray),
        ));

        // Loading indicator
        if self.app.is_loading() {
            spans.push(Span::styled(
                " [loading...]",
                Style::default().bg(Color::DarkGray).fg(Color::Yellow),
            ));
        }

        // Status message (right-aligned)
        if let Some(ref msg) = self.app.status_message {
            let left_width: usize = spans.iter().map(|s| s.width()).sum();
            let room = (area.width as usize).saturating_sub(left_width + 1);
            let visible = truncate_to_width(msg, room);
            let padding = (area.width as usize).saturating_sub(left_width + visible.width());
            if padding > 0 {
                spans.push(Span::styled(" ".repeat(padding), bg_style));
            }
            let color = if self
                .app
                .last_error
                .as_ref()
                .is_some_and(|e| e.summary() == *msg)
            {
                Color::Red
            } else {
                Color::Green
            };
            spans.push(Span::styled(
                visible,
                Style::default().bg(Color::DarkGray).fg(color),
            ));
        }

        let line = Line::from(spans);
        buf.set_line(area.x, area.y, &line, area.width);
    }
}

fn truncate_to_width(text: &str, max: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > max {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::truncate_to_width;

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_to_width("héllo", 3), "hél");
        assert_eq!(truncate_to_width("修理", 3), "修");
        assert_eq!(truncate_to_width("ok", 10), "ok");
    }
}
