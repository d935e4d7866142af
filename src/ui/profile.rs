use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};

use crate::app::{ProfileState, ProfileTab};
use crate::ui::post::format_count;
use crate::ui::post_list::PostListView;

/// Profile view: header with counts and follow button, then tabbed posts.
pub struct ProfileView<'a> {
    pub profile: &'a ProfileState,
}

impl<'a> ProfileView<'a> {
    pub fn new(profile: &'a ProfileState) -> Self {
        Self { profile }
    }
}

impl Widget for ProfileView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let profile = self.profile;
        let title = match &profile.data {
            Some(data) if profile.own => format!(" {} (you) ", data.name),
            Some(data) => format!(" {} ", data.name),
            None => format!(" User #{} ", profile.user_id),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .title_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .border_style(Style::default().fg(Color::DarkGray));

        let inner = block.inner(area);
        block.render(area, buf);

        let Some(data) = &profile.data else {
            buf.set_string(
                inner.x + 1,
                inner.y,
                "Loading...",
                Style::default().fg(Color::DarkGray),
            );
            return;
        };

        let [info_area, tabs_area, posts_area] = Layout::vertical([
            Constraint::Length(4),
            Constraint::Length(2),
            Constraint::Min(1),
        ])
        .areas(inner);

        // -- Info section --
        let header = profile.header.value();
        let count_style = Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);
        let label_style = Style::default().fg(Color::DarkGray);

        let follower_count = if profile.own {
            data.follower_count
        } else {
            header.follower_count
        };

        let mut lines = vec![
            Line::from(Span::styled(
                data.name.as_str(),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(vec![
                Span::styled(format_count(follower_count), count_style),
                Span::styled(" Followers (F)  ", label_style),
                Span::styled(format_count(data.following_count), count_style),
                Span::styled(" Following (G)  ", label_style),
                Span::styled(format_count(data.owned_post_ids.len() as u64), count_style),
                Span::styled(" Posts", label_style),
            ]),
        ];

        if !profile.own {
            let mut spans = vec![Span::styled(
                format!("[{}]", header.status.button_label()),
                if header.status.follows {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Yellow)
                },
            )];
            if profile.header.is_pending() {
                spans.push(Span::styled(" ...", label_style));
            }
            if header.status.follows_back {
                spans.push(Span::styled("  follows you", label_style));
            }
            lines.push(Line::from(spans));
        }

        let info_area = Rect::new(
            info_area.x + 1,
            info_area.y,
            info_area.width.saturating_sub(1),
            info_area.height,
        );
        Paragraph::new(lines).render(info_area, buf);

        // -- Tabs --
        let mut tab_spans = Vec::new();
        for tab in ProfileTab::available(profile.own) {
            let style = if *tab == profile.tab {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                label_style
            };
            tab_spans.push(Span::styled(format!(" {} ", tab.title()), style));
            tab_spans.push(Span::raw(" "));
        }
        tab_spans.push(Span::styled("(t to switch)", label_style));
        buf.set_line(
            tabs_area.x + 1,
            tabs_area.y,
            &Line::from(tab_spans),
            tabs_area.width.saturating_sub(1),
        );

        // -- Posts --
        let empty = match profile.tab {
            ProfileTab::Posts => "No posts yet",
            ProfileTab::Saved => "No saved posts",
            ProfileTab::Liked => "No liked posts",
        };
        PostListView::new(profile.tab.title(), &profile.posts)
            .bordered(false)
            .empty_message(empty)
            .render(posts_area, buf);
    }
}
