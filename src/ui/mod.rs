pub mod command_bar;
pub mod error_panel;
pub mod follow_popup;
pub mod help;
pub mod input;
pub mod post;
pub mod post_list;
pub mod profile;
pub mod status_bar;
pub mod user_list;

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::app::{App, AppMode};
use crate::auth::Credentials;
use crate::event::ViewKind;

use command_bar::CommandBar;
use error_panel::ErrorPanel;
use follow_popup::FollowPopupView;
use help::HelpView;
use post_list::PostListView;
use profile::ProfileView;
use status_bar::StatusBar;
use user_list::UserListView;

pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Nothing session-dependent renders until restore has finished.
    if app.session_state.is_pending() {
        draw_splash(frame, area);
        return;
    }

    // Layout: main content + status bar + optional command bar
    let bottom_height = if app.mode != AppMode::Normal { 2 } else { 1 };

    let [main_area, bottom_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(bottom_height)]).areas(area);

    if app.mode != AppMode::Normal {
        let [status_area, cmd_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(bottom_area);
        frame.render_widget(StatusBar::new(app), status_area);
        frame.render_widget(CommandBar::new(app), cmd_area);
    } else {
        frame.render_widget(StatusBar::new(app), bottom_area);
    }

    match app.current_view() {
        Some(ViewKind::Help) => {
            // Render the view underneath first, then overlay help.
            if let Some(below) = app.view_stack.iter().rev().nth(1) {
                render_view(frame, app, *below, main_area);
            }
            frame.render_widget(HelpView::new(), main_area);
        }
        Some(kind) => render_view(frame, app, *kind, main_area),
        None => {}
    }

    if let Some(ref popup) = app.popup {
        frame.render_widget(FollowPopupView::new(popup, app.session.user_id()), main_area);
    }

    // Failed request details render on top of everything.
    if app.show_error
        && let Some(ref failure) = app.last_error
    {
        frame.render_widget(ErrorPanel::new(failure), frame.area());
    }
}

fn render_view(frame: &mut Frame, app: &App, kind: ViewKind, area: Rect) {
    match kind {
        ViewKind::Feed => {
            frame.render_widget(PostListView::new("Feed", &app.feed), area);
        }
        ViewKind::Explore => {
            frame.render_widget(
                UserListView::new("Explore", &app.explore, app.session.user_id()),
                area,
            );
        }
        ViewKind::Profile(user_id) => match app.profile.as_ref() {
            Some(profile) if profile.user_id == user_id => {
                frame.render_widget(ProfileView::new(profile), area);
            }
            _ => {
                let block = Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" User #{user_id} "))
                    .border_style(Style::default().fg(Color::DarkGray));
                frame.render_widget(
                    Paragraph::new(" Loading...")
                        .style(Style::default().fg(Color::DarkGray))
                        .block(block),
                    area,
                );
            }
        },
        ViewKind::Help => {}
    }
}

fn draw_splash(frame: &mut Frame, area: Rect) {
    let [_, middle, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(3),
        Constraint::Fill(1),
    ])
    .areas(area);

    let splash = Paragraph::new("Restoring session...")
        .centered()
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::NONE).title(" fixit "));
    frame.render_widget(splash, middle);
}
