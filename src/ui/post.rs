use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;
use unicode_width::UnicodeWidthStr;

use crate::list::optimistic::PostCard;

/// Renders a single post as a compact card.
///
/// Layout:
///   author · 2h ago                          [2 images]
///   Description (may wrap) ...
///   ♥ 12  💬 5  🔖 saved
pub struct PostCardView<'a> {
    pub card: &'a PostCard,
    pub selected: bool,
}

impl<'a> PostCardView<'a> {
    pub fn new(card: &'a PostCard) -> Self {
        Self {
            card,
            selected: false,
        }
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

impl Widget for PostCardView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let post = &self.card.post;
        let highlight_style = if self.selected {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };

        let mut y = area.y;

        // -- Line 1: author, age and attachments --
        let author = if post.created_by.is_empty() {
            post.author_id
                .map(|id| format!("user #{id}"))
                .unwrap_or_else(|| "unknown".into())
        } else {
            post.created_by.clone()
        };

        let mut header_spans = vec![Span::styled(
            author,
            highlight_style.add_modifier(Modifier::BOLD),
        )];

        if let Some(age) = post.created_at.as_deref().and_then(format_time_ago) {
            header_spans.push(Span::styled(
                format!(" · {age}"),
                Style::default().fg(Color::DarkGray),
            ));
        }

        match post.image_urls.len() {
            0 => {}
            1 => header_spans.push(Span::styled(" [image]", Style::default().fg(Color::Yellow))),
            n => header_spans.push(Span::styled(
                format!(" [{n} images]"),
                Style::default().fg(Color::Yellow),
            )),
        }

        buf.set_line(area.x, y, &Line::from(header_spans), area.width);
        y += 1;

        if y >= area.y + area.height {
            return;
        }

        // -- Line 2+: description (wrapped) --
        let width = area.width as usize;
        let max_text_lines = (area.height - (y - area.y) - 1).max(1) as usize; // Reserve 1 line for metrics
        let text_style = if self.selected {
            Style::default().fg(Color::White)
        } else {
            Style::default()
        };

        for (i, line_text) in wrap_text(&post.description, width).into_iter().enumerate() {
            if i >= max_text_lines || y >= area.y + area.height {
                break;
            }
            buf.set_string(area.x, y, &line_text, text_style);
            y += 1;
        }

        if y >= area.y + area.height {
            return;
        }

        // -- Last line: metrics --
        let heart = if self.card.liked { "\u{2665}" } else { "\u{2661}" };
        let mut metrics = vec![
            Span::styled(
                format!("{heart} {}", format_count(post.like_count)),
                Style::default().fg(Color::Red),
            ),
            Span::raw("  "),
            Span::styled(
                format!("\u{1F4AC} {}", format_count(post.comment_count)),
                Style::default().fg(Color::Blue),
            ),
        ];
        if self.card.saved {
            metrics.push(Span::raw("  "));
            metrics.push(Span::styled(
                "\u{1F516} saved",
                Style::default().fg(Color::Green),
            ));
        }
        buf.set_line(area.x, y, &Line::from(metrics), area.width);
    }
}

/// Height in lines needed for a post card.
pub fn post_card_height(card: &PostCard, width: u16) -> u16 {
    let text_lines = wrap_text(&card.post.description, width as usize).len() as u16;
    // header + text + metrics
    1 + text_lines + 1
}

/// Greedy word wrap by display width; words wider than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![];
    }
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        if paragraph.is_empty() {
            lines.push(String::new());
            continue;
        }
        let mut current = String::new();
        let mut current_width = 0;
        for word in paragraph.split_whitespace() {
            for piece in split_word(word, width) {
                let piece_width = piece.width();
                if current.is_empty() {
                    current = piece;
                    current_width = piece_width;
                } else if current_width + 1 + piece_width <= width {
                    current.push(' ');
                    current.push_str(&piece);
                    current_width += 1 + piece_width;
                } else {
                    lines.push(std::mem::take(&mut current));
                    current = piece;
                    current_width = piece_width;
                }
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn split_word(word: &str, width: usize) -> Vec<String> {
    if word.width() <= width {
        return vec![word.to_string()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;
    for ch in word.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if current_width + w > width && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
            current_width = 0;
        }
        current.push(ch);
        current_width += w;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Accepts RFC 3339 or a naive `YYYY-MM-DDTHH:MM:SS` timestamp taken as UTC.
fn parse_timestamp(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn format_time_ago(raw: &str) -> Option<String> {
    let dt = parse_timestamp(raw)?;
    Some(format_age(chrono::Utc::now().signed_duration_since(dt), dt))
}

fn format_age(diff: chrono::TimeDelta, dt: chrono::DateTime<chrono::Utc>) -> String {
    if diff.num_seconds() < 60 {
        format!("{}s", diff.num_seconds().max(0))
    } else if diff.num_minutes() < 60 {
        format!("{}m", diff.num_minutes())
    } else if diff.num_hours() < 24 {
        format!("{}h", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d", diff.num_days())
    } else {
        dt.format("%b %d").to_string()
    }
}

pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::PostSummary;

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(
            wrap_text("fix the sink today", 8),
            vec!["fix the", "sink", "today"]
        );
    }

    #[test]
    fn splits_words_longer_than_the_line() {
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn wide_characters_count_double() {
        // Each CJK character is two columns wide.
        assert_eq!(wrap_text("修理 修理", 4), vec!["修理", "修理"]);
    }

    #[test]
    fn empty_description_still_takes_a_line() {
        let card = PostCard::new(PostSummary::default(), None);
        assert_eq!(post_card_height(&card, 40), 3);
    }

    #[test]
    fn parses_both_timestamp_shapes() {
        assert!(parse_timestamp("2024-03-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-03-01T10:00:00.123").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn age_buckets() {
        let dt = chrono::Utc::now();
        assert_eq!(format_age(chrono::TimeDelta::seconds(5), dt), "5s");
        assert_eq!(format_age(chrono::TimeDelta::minutes(3), dt), "3m");
        assert_eq!(format_age(chrono::TimeDelta::hours(5), dt), "5h");
        assert_eq!(format_age(chrono::TimeDelta::days(2), dt), "2d");
    }

    #[test]
    fn counts_are_abbreviated() {
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_500), "1.5K");
        assert_eq!(format_count(2_000_000), "2.0M");
    }
}
