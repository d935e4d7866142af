use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::widgets::{Clear, Widget};

use crate::app::FollowPopup;
use crate::ui::user_list::UserListView;

/// Centered overlay listing a profile's followers or followings.
pub struct FollowPopupView<'a> {
    popup: &'a FollowPopup,
    viewer: Option<u64>,
}

impl<'a> FollowPopupView<'a> {
    pub fn new(popup: &'a FollowPopup, viewer: Option<u64>) -> Self {
        Self { popup, viewer }
    }
}

impl Widget for FollowPopupView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = 56u16.min(area.width.saturating_sub(4));
        let height = (area.height * 3 / 4).max(6).min(area.height.saturating_sub(2));
        let x = area.x + (area.width.saturating_sub(width)) / 2;
        let y = area.y + (area.height.saturating_sub(height)) / 2;
        let panel = Rect::new(x, y, width, height);

        Clear.render(panel, buf);

        let title = format!("{} (f follow, Esc close)", self.popup.kind.title());
        UserListView::new(&title, &self.popup.users, self.viewer)
            .border_color(Color::Cyan)
            .render(panel, buf);
    }
}
