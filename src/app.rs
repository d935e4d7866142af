use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::DefaultTerminal;
use tokio::sync::watch;

use crate::api::types::{ProfileData, UserSummary};
use crate::api::{ApiClient, ApiClientError};
use crate::auth::Credentials;
use crate::auth::session::{SessionManager, SessionState};
use crate::auth::storage::FileStore;
use crate::command::{self, Command};
use crate::config::{AppConfig, DefaultView};
use crate::event::{ApiResult, AppEvent, Event, EventHandler, ListKey, ViewKind};
use crate::list::optimistic::{
    FollowAction, FollowHeader, OptimisticFlag, PostAction, PostCard,
};
use crate::list::pending::PendingActions;
use crate::list::scroll::ScrollTrigger;
use crate::list::sources::{PostSource, UserSource};
use crate::list::{
    ActionSink, BatchRequest, IncrementalList, ListItem, MutationOutcome, fetch_batch,
};
use crate::ui;

pub type AppSession = SessionManager<ApiClient, FileStore>;

fn api_error(e: ApiClientError) -> Arc<String> {
    Arc::new(e.to_string())
}

// ---------------------------------------------------------------------------
// List pane: an incremental list plus selection and scroll debounce
// ---------------------------------------------------------------------------

pub struct ListPane<T> {
    pub list: IncrementalList<T>,
    pub selected: usize,
    pub ids_loading: bool,
    trigger: ScrollTrigger,
}

impl<T: ListItem> ListPane<T> {
    pub fn new(batch_size: usize, threshold: usize, debounce: Duration) -> Self {
        Self {
            list: IncrementalList::new(batch_size, threshold),
            selected: 0,
            ids_loading: false,
            trigger: ScrollTrigger::new(debounce),
        }
    }

    pub fn selected_item(&self) -> Option<&T> {
        self.list.items().get(self.selected)
    }

    /// Loaded items below the selection.
    pub fn remaining(&self) -> usize {
        self.list.len().saturating_sub(self.selected + 1)
    }

    /// True if the ID set has neither been loaded nor requested.
    pub fn needs_ids(&self) -> bool {
        !self.ids_loading && !self.list.is_initialized()
    }

    fn initialize(&mut self, ids: Vec<u64>) -> Option<BatchRequest> {
        self.selected = 0;
        self.trigger.cancel();
        self.list.initialize(ids)
    }

    fn clear(&mut self) {
        self.selected = 0;
        self.trigger.cancel();
        self.list.clear();
    }

    fn step(&mut self, down: bool, now: Instant) {
        if down {
            if self.selected + 1 < self.list.len() {
                self.selected += 1;
            }
        } else {
            self.selected = self.selected.saturating_sub(1);
        }
        self.trigger.on_scroll(self.remaining(), now);
    }

    /// Fire the debounced near-bottom check.
    fn poll(&mut self, now: Instant) -> Option<BatchRequest> {
        let remaining = self.trigger.poll(now)?;
        self.list.on_scroll_near_bottom(remaining)
    }
}

// ---------------------------------------------------------------------------
// Profile and popup state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileTab {
    Posts,
    Saved,
    Liked,
}

impl ProfileTab {
    pub fn title(self) -> &'static str {
        match self {
            Self::Posts => "Posts",
            Self::Saved => "Saved",
            Self::Liked => "Liked",
        }
    }

    pub fn ids(self, data: &ProfileData) -> Vec<u64> {
        match self {
            Self::Posts => data.owned_post_ids.clone(),
            Self::Saved => data.saved_post_ids.clone(),
            Self::Liked => data.liked_post_ids.clone(),
        }
    }

    /// Saved posts are private, so other profiles skip that tab.
    pub fn next(self, own: bool) -> Self {
        match self {
            Self::Posts if own => Self::Saved,
            Self::Posts | Self::Saved => Self::Liked,
            Self::Liked => Self::Posts,
        }
    }

    pub fn available(own: bool) -> &'static [ProfileTab] {
        if own {
            &[Self::Posts, Self::Saved, Self::Liked]
        } else {
            &[Self::Posts, Self::Liked]
        }
    }
}

pub struct ProfileState {
    pub user_id: u64,
    pub own: bool,
    pub data: Option<ProfileData>,
    pub header: OptimisticFlag<FollowHeader>,
    pub tab: ProfileTab,
    pub posts: ListPane<PostCard>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupKind {
    Followers,
    Following,
}

impl PopupKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::Followers => "Followers",
            Self::Following => "Following",
        }
    }
}

pub struct FollowPopup {
    pub kind: PopupKind,
    pub users: ListPane<UserSummary>,
    pending: PendingActions<FollowAction>,
}

/// The most recent request that failed, shown in full with `e`.
#[derive(Debug, Clone)]
pub struct FailedRequest {
    /// What the app was doing, e.g. "Loading feed".
    pub context: String,
    pub message: String,
    pub at: chrono::DateTime<chrono::Local>,
}

impl FailedRequest {
    /// One-line form used by the status bar.
    pub fn summary(&self) -> String {
        format!("{} failed: {}", self.context, self.message)
    }

    pub fn is_auth_failure(&self) -> bool {
        self.message.starts_with("unauthorized") || self.message == "not logged in"
    }
}

// ---------------------------------------------------------------------------
// App mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppMode {
    Normal,
    Command,
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    pub running: bool,
    pub events: EventHandler,
    pub config: AppConfig,

    // View system
    pub view_stack: Vec<ViewKind>,
    pub mode: AppMode,

    // Session
    pub session: AppSession,
    pub session_state: SessionState,
    session_rx: watch::Receiver<SessionState>,
    started: bool,

    // Data state
    pub feed: ListPane<PostCard>,
    pub explore: ListPane<UserSummary>,
    pub profile: Option<ProfileState>,
    pub popup: Option<FollowPopup>,

    // Input state
    pub command_input: String,

    // API access shared with spawned tasks
    api: Arc<ApiClient>,
    post_source: PostSource,
    user_source: UserSource,

    // Status
    pub status_message: Option<String>,
    pub last_error: Option<FailedRequest>,
    pub show_error: bool,
}

impl App {
    pub fn new(config: AppConfig, api: Arc<ApiClient>, session: AppSession) -> Self {
        let credentials: Arc<dyn Credentials> = Arc::new(session.clone());
        let post_source = PostSource::new(Arc::clone(&api), Arc::clone(&credentials));
        let user_source = UserSource::new(Arc::clone(&api), credentials);
        let session_rx = session.subscribe();

        let feed = ListPane::new(
            config.post_batch_size,
            config.near_bottom_items,
            config.post_debounce(),
        );
        let explore = ListPane::new(
            config.user_batch_size,
            config.near_bottom_items,
            config.user_debounce(),
        );

        Self {
            running: true,
            events: EventHandler::new(config.tick_rate_fps),
            view_stack: vec![ViewKind::Feed],
            mode: AppMode::Normal,
            session_state: session.state(),
            session,
            session_rx,
            started: false,
            feed,
            explore,
            profile: None,
            popup: None,
            command_input: String::new(),
            api,
            post_source,
            user_source,
            status_message: None,
            last_error: None,
            show_error: false,
            config,
        }
    }

    // -- Main event loop ----------------------------------------------------

    pub async fn run(mut self, mut terminal: DefaultTerminal) -> color_eyre::Result<()> {
        // Views stay gated until this resolves; see `tick`.
        let session = self.session.clone();
        tokio::spawn(async move {
            session.restore().await;
        });

        while self.running {
            terminal.draw(|frame| self.draw(frame))?;
            match self.events.next().await? {
                Event::Tick => self.tick(),
                Event::Crossterm(event) => {
                    if let crossterm::event::Event::Key(key) = event
                        && key.kind == crossterm::event::KeyEventKind::Press
                    {
                        self.handle_key_event(key);
                    }
                }
                Event::App(app_event) => self.handle_app_event(*app_event),
            }
        }
        Ok(())
    }

    fn draw(&self, frame: &mut ratatui::Frame) {
        ui::draw(frame, self);
    }

    fn tick(&mut self) {
        if self.session_rx.has_changed().unwrap_or(false) {
            let state = *self.session_rx.borrow_and_update();
            self.on_session_state(state);
        }
        if !self.started {
            return;
        }

        let now = Instant::now();
        if let Some(req) = self.feed.poll(now) {
            self.fetch_posts(ListKey::Feed, req);
        }
        if let Some(req) = self.explore.poll(now) {
            self.fetch_users(ListKey::Explore, req);
        }
        if let Some(req) = self.profile.as_mut().and_then(|p| p.posts.poll(now)) {
            self.fetch_posts(ListKey::ProfilePosts, req);
        }
        if let Some(req) = self.popup.as_mut().and_then(|p| p.users.poll(now)) {
            self.fetch_users(ListKey::Popup, req);
        }
    }

    fn on_session_state(&mut self, state: SessionState) {
        let previous = std::mem::replace(&mut self.session_state, state);
        if state.is_pending() {
            return;
        }

        if !self.started {
            self.started = true;
            self.start();
            return;
        }

        if previous == SessionState::Authenticated && state == SessionState::Anonymous {
            self.status_message =
                Some("Session ended. Run `fixit login` to sign in again.".to_string());
            self.reload();
        }
    }

    /// Open the configured first view once the session is known.
    fn start(&mut self) {
        match self.config.default_view {
            DefaultView::Feed => self.switch_view(ViewKind::Feed),
            DefaultView::Explore => self.switch_view(ViewKind::Explore),
            DefaultView::Profile => {
                self.switch_view(ViewKind::Feed);
                if let Some(user_id) = self.session.user_id() {
                    self.open_profile(user_id);
                }
            }
        }
        if self.session_state == SessionState::Anonymous {
            self.status_message =
                Some("Not logged in. Run `fixit login` to like, save and follow.".to_string());
        }
    }

    /// Drop every loaded list and fetch the current view again.
    fn reload(&mut self) {
        self.feed.clear();
        self.explore.clear();
        self.close_popup();
        if let Some(user_id) = self.profile.as_ref().map(|p| p.user_id) {
            self.profile = None;
            if self.current_view() == Some(&ViewKind::Profile(user_id)) {
                self.open_profile(user_id);
            }
        }
        if let Some(kind) = self.current_view().copied() {
            self.fetch_for_view(kind);
        }
    }

    pub fn is_loading(&self) -> bool {
        let profile_loading = self
            .profile
            .as_ref()
            .is_some_and(|p| p.data.is_none() || p.posts.list.is_loading());
        let popup_loading = self
            .popup
            .as_ref()
            .is_some_and(|p| p.users.list.is_loading());
        self.feed.ids_loading
            || self.feed.list.is_loading()
            || self.explore.ids_loading
            || self.explore.list.is_loading()
            || profile_loading
            || popup_loading
    }

    // -- View stack ---------------------------------------------------------

    pub fn current_view(&self) -> Option<&ViewKind> {
        self.view_stack.last()
    }

    pub fn push_view(&mut self, kind: ViewKind) {
        self.view_stack.push(kind);
    }

    pub fn pop_view(&mut self) {
        if self.view_stack.len() > 1 {
            self.view_stack.pop();
        }
        // Only one profile is cached; returning to an older one reloads it.
        if let Some(ViewKind::Profile(user_id)) = self.current_view().copied()
            && self.profile.as_ref().map(|p| p.user_id) != Some(user_id)
        {
            self.open_profile(user_id);
        }
    }

    fn switch_view(&mut self, kind: ViewKind) {
        // Replace the root view or push if stack is deeper.
        if self.view_stack.len() <= 1 {
            self.view_stack.clear();
        }
        self.push_view(kind);
        self.fetch_for_view(kind);
    }

    fn fetch_for_view(&mut self, kind: ViewKind) {
        match kind {
            ViewKind::Feed if self.feed.needs_ids() => self.load_ids(ListKey::Feed),
            ViewKind::Explore if self.explore.needs_ids() => self.load_ids(ListKey::Explore),
            _ => {}
        }
    }

    /// The list that receives selection and item actions.
    pub fn active_list(&self) -> Option<ListKey> {
        if self.popup.is_some() {
            return Some(ListKey::Popup);
        }
        match self.current_view() {
            Some(ViewKind::Feed) => Some(ListKey::Feed),
            Some(ViewKind::Explore) => Some(ListKey::Explore),
            Some(ViewKind::Profile(_)) => Some(ListKey::ProfilePosts),
            Some(ViewKind::Help) | None => None,
        }
    }

    fn post_pane(&mut self, key: ListKey) -> Option<&mut ListPane<PostCard>> {
        match key {
            ListKey::Feed => Some(&mut self.feed),
            ListKey::ProfilePosts => self.profile.as_mut().map(|p| &mut p.posts),
            ListKey::Explore | ListKey::Popup => None,
        }
    }

    fn user_pane(&mut self, key: ListKey) -> Option<&mut ListPane<UserSummary>> {
        match key {
            ListKey::Explore => Some(&mut self.explore),
            ListKey::Popup => self.popup.as_mut().map(|p| &mut p.users),
            ListKey::Feed | ListKey::ProfilePosts => None,
        }
    }

    // -- Key event routing --------------------------------------------------

    fn handle_key_event(&mut self, key: KeyEvent) {
        // Ctrl-C always quits.
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c' | 'C'))
        {
            self.events.send(AppEvent::Quit);
            return;
        }

        if self.show_error {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                self.show_error = false;
            }
            return;
        }

        match self.mode {
            AppMode::Normal => self.handle_normal_key(key),
            AppMode::Command => self.handle_command_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        // Nothing but quitting until the session is known.
        if !self.started {
            if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                self.events.send(AppEvent::Quit);
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                if self.popup.is_some() {
                    self.close_popup();
                } else if self.view_stack.len() > 1 {
                    self.events.send(AppEvent::PopView);
                } else {
                    self.events.send(AppEvent::Quit);
                }
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(true),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(false),
            KeyCode::Enter => self.open_selected(),
            KeyCode::Char(':') => {
                self.mode = AppMode::Command;
                self.command_input.clear();
            }
            KeyCode::Char('?') => {
                self.events.send(AppEvent::PushView(ViewKind::Help));
            }
            KeyCode::Char('1') => {
                self.events.send(AppEvent::SwitchView(ViewKind::Feed));
            }
            KeyCode::Char('2') => {
                self.events.send(AppEvent::SwitchView(ViewKind::Explore));
            }
            KeyCode::Char('3') => self.open_own_profile(),
            KeyCode::Char('l') => self.toggle_post_flag(true),
            KeyCode::Char('s') => self.toggle_post_flag(false),
            KeyCode::Char('f') => self.toggle_follow(),
            KeyCode::Char('t') => self.cycle_tab(),
            KeyCode::Char('F') => self.open_popup(PopupKind::Followers),
            KeyCode::Char('G') => self.open_popup(PopupKind::Following),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('e') => {
                self.show_error = self.last_error.is_some();
            }
            _ => {}
        }
    }

    fn handle_command_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = AppMode::Normal;
                self.command_input.clear();
            }
            KeyCode::Enter => {
                self.execute_command();
                self.mode = AppMode::Normal;
            }
            KeyCode::Backspace => {
                self.command_input.pop();
            }
            KeyCode::Char(c) => {
                self.command_input.push(c);
            }
            _ => {}
        }
    }

    // -- Command execution --------------------------------------------------

    fn execute_command(&mut self) {
        let input = self.command_input.clone();
        match command::parse_command(&input) {
            Some(Command::Feed) => {
                self.events.send(AppEvent::SwitchView(ViewKind::Feed));
            }
            Some(Command::Explore) => {
                self.events.send(AppEvent::SwitchView(ViewKind::Explore));
            }
            Some(Command::Profile(user_id)) => {
                self.events.send(AppEvent::OpenProfile(user_id));
            }
            Some(Command::Me) => self.open_own_profile(),
            Some(Command::Logout) => self.logout(),
            Some(Command::Help) => {
                self.events.send(AppEvent::PushView(ViewKind::Help));
            }
            Some(Command::Quit) => {
                self.events.send(AppEvent::Quit);
            }
            None => {
                self.status_message = Some(format!("Unknown command: {input}"));
            }
        }
        self.command_input.clear();
    }

    fn logout(&mut self) {
        self.session.logout();
        // Mark the transition as seen so `tick` does not report it as expiry.
        self.session_state = *self.session_rx.borrow_and_update();
        self.status_message = Some("Logged out".to_string());
        self.reload();
    }

    fn open_own_profile(&mut self) {
        match self.session.user_id() {
            Some(user_id) => self.open_profile(user_id),
            None => {
                self.status_message = Some("Not logged in. Run `fixit login`.".to_string());
            }
        }
    }

    // -- Selection and item actions -----------------------------------------

    fn move_selection(&mut self, down: bool) {
        let now = Instant::now();
        match self.active_list() {
            Some(key @ (ListKey::Feed | ListKey::ProfilePosts)) => {
                if let Some(pane) = self.post_pane(key) {
                    pane.step(down, now);
                }
            }
            Some(key @ (ListKey::Explore | ListKey::Popup)) => {
                if let Some(pane) = self.user_pane(key) {
                    pane.step(down, now);
                }
            }
            None => {}
        }
    }

    fn open_selected(&mut self) {
        match self.active_list() {
            Some(key @ (ListKey::Feed | ListKey::ProfilePosts)) => {
                let author = self
                    .post_pane(key)
                    .and_then(|pane| pane.selected_item())
                    .map(|card| card.post.author_id);
                match author {
                    Some(Some(user_id)) => self.open_profile(user_id),
                    Some(None) => {
                        self.status_message = Some("Post has no known author".to_string());
                    }
                    None => {}
                }
            }
            Some(ListKey::Explore) => {
                if let Some(user_id) = self.explore.selected_item().map(|u| u.id) {
                    self.open_profile(user_id);
                }
            }
            Some(ListKey::Popup) => {
                let selected = self
                    .popup
                    .as_ref()
                    .and_then(|p| p.users.selected_item())
                    .map(|u| u.id);
                if let Some(user_id) = selected {
                    self.close_popup();
                    self.open_profile(user_id);
                }
            }
            None => {}
        }
    }

    fn require_login(&mut self, what: &str) -> bool {
        if self.session.access_token().is_some() {
            return true;
        }
        self.status_message = Some(format!("Log in to {what} (run `fixit login`)"));
        false
    }

    /// Like/unlike (`like == true`) or save/unsave the selected post.
    fn toggle_post_flag(&mut self, like: bool) {
        let Some(key @ (ListKey::Feed | ListKey::ProfilePosts)) = self.active_list() else {
            return;
        };
        if !self.require_login(if like { "like posts" } else { "save posts" }) {
            return;
        }

        let viewer = self.session.user_id();
        let Some(pane) = self.post_pane(key) else {
            return;
        };
        let Some((id, action)) = pane.selected_item().map(|card| {
            let action = if like {
                PostAction::toggle_like(card.liked)
            } else {
                PostAction::toggle_save(card.saved)
            };
            (card.post.id, action)
        }) else {
            return;
        };
        let Some(pending) = pane.list.begin_mutation(id, action, viewer) else {
            return;
        };

        let source = self.post_source.clone();
        let sender = self.events.sender();
        tokio::spawn(async move {
            let result = source.commit(id, &pending.action).await;
            sender.send(AppEvent::PostMutated {
                list: key,
                pending,
                result,
            });
        });
    }

    fn toggle_follow(&mut self) {
        match self.active_list() {
            Some(key @ (ListKey::Explore | ListKey::Popup)) => self.follow_in_list(key),
            Some(ListKey::ProfilePosts) => self.follow_profile(),
            _ => {}
        }
    }

    fn follow_in_list(&mut self, key: ListKey) {
        if !self.require_login("follow users") {
            return;
        }
        let viewer = self.session.user_id();
        let Some(pane) = self.user_pane(key) else {
            return;
        };
        let Some((id, action)) = pane
            .selected_item()
            .map(|u| (u.id, FollowAction::toggle(u.follows)))
        else {
            return;
        };
        if Some(id) == viewer {
            self.status_message = Some("You cannot follow yourself".to_string());
            return;
        }
        let Some(pending) = pane.list.begin_mutation(id, action, viewer) else {
            return;
        };

        let source = self.user_source.clone();
        let sender = self.events.sender();
        tokio::spawn(async move {
            let result = source.commit(id, &pending.action).await;
            sender.send(AppEvent::UserMutated {
                list: key,
                pending,
                result,
            });
        });
    }

    /// The follow button in the profile header.
    fn follow_profile(&mut self) {
        if !self.require_login("follow users") {
            return;
        }
        let Some(token) = self.session.access_token() else {
            return;
        };
        let Some(profile) = self.profile.as_mut() else {
            return;
        };
        if profile.own || profile.data.is_none() {
            return;
        }

        let current = profile.header.value();
        let action = FollowAction::toggle(current.status.follows);
        let ticket = profile.header.begin(current.after(action));
        let user_id = profile.user_id;

        let api = Arc::clone(&self.api);
        let sender = self.events.sender();
        tokio::spawn(async move {
            let result = match action {
                FollowAction::Follow => api.follow_user(user_id, &token).await,
                FollowAction::Unfollow => api.unfollow_user(user_id, &token).await,
            };
            sender.send(AppEvent::HeaderFollowSettled {
                user_id,
                action,
                ticket,
                result: result.map_err(api_error),
            });
        });
    }

    fn cycle_tab(&mut self) {
        if self.popup.is_some() {
            return;
        }
        let Some(profile) = self.profile.as_mut() else {
            return;
        };
        let Some(data) = profile.data.as_ref() else {
            return;
        };
        profile.tab = profile.tab.next(profile.own);
        let ids = profile.tab.ids(data);
        if let Some(req) = profile.posts.initialize(ids) {
            self.fetch_posts(ListKey::ProfilePosts, req);
        }
    }

    fn open_popup(&mut self, kind: PopupKind) {
        let Some(data) = self.profile.as_ref().and_then(|p| p.data.as_ref()) else {
            return;
        };
        let ids = match kind {
            PopupKind::Followers => data.follower_ids.clone(),
            PopupKind::Following => data.following_ids.clone(),
        };

        let mut users = ListPane::new(
            self.config.user_batch_size,
            self.config.near_bottom_items,
            self.config.user_debounce(),
        );
        let request = users.initialize(ids);
        self.popup = Some(FollowPopup {
            kind,
            users,
            pending: PendingActions::new(),
        });
        if let Some(req) = request {
            self.fetch_users(ListKey::Popup, req);
        }
    }

    /// Close the popup, replaying its follow changes onto the viewer's profile.
    fn close_popup(&mut self) {
        let Some(mut popup) = self.popup.take() else {
            return;
        };
        if popup.pending.is_empty() {
            return;
        }
        if let Some(profile) = self.profile.as_mut()
            && profile.own
            && let Some(data) = profile.data.as_mut()
        {
            popup.pending.reconcile(data);
        }
    }

    // -- API dispatch -------------------------------------------------------

    fn load_ids(&mut self, key: ListKey) {
        let token = self.session.access_token();
        let viewer = self.session.user_id();
        match key {
            ListKey::Feed => self.feed.ids_loading = true,
            ListKey::Explore => self.explore.ids_loading = true,
            ListKey::ProfilePosts | ListKey::Popup => return,
        }

        let api = Arc::clone(&self.api);
        let sender = self.events.sender();
        tokio::spawn(async move {
            let result: Result<Vec<u64>, ApiClientError> = match key {
                ListKey::Explore => api.get_user_ids(token.as_deref()).await.map(|ids| {
                    ids.into_iter()
                        .filter(|id| Some(*id) != viewer)
                        .collect()
                }),
                _ => api.get_post_ids().await,
            };
            sender.send(AppEvent::IdsLoaded {
                list: key,
                result: result.map_err(api_error),
            });
        });
    }

    fn fetch_posts(&self, key: ListKey, request: BatchRequest) {
        let source = self.post_source.clone();
        let sender = self.events.sender();
        tokio::spawn(async move {
            let batch = fetch_batch(&source, request).await;
            sender.send(AppEvent::PostsLoaded { list: key, batch });
        });
    }

    fn fetch_users(&self, key: ListKey, request: BatchRequest) {
        let source = self.user_source.clone();
        let sender = self.events.sender();
        tokio::spawn(async move {
            let batch = fetch_batch(&source, request).await;
            sender.send(AppEvent::UsersLoaded { list: key, batch });
        });
    }

    fn open_profile(&mut self, user_id: u64) {
        let token = self.session.access_token();
        let own = self.session.user_id() == Some(user_id);

        self.close_popup();
        self.profile = Some(ProfileState {
            user_id,
            own,
            data: None,
            header: OptimisticFlag::new(FollowHeader::default()),
            tab: ProfileTab::Posts,
            posts: ListPane::new(
                self.config.post_batch_size,
                self.config.near_bottom_items,
                self.config.post_debounce(),
            ),
        });
        if self.current_view() != Some(&ViewKind::Profile(user_id)) {
            self.push_view(ViewKind::Profile(user_id));
        }

        let api = Arc::clone(&self.api);
        let sender = self.events.sender();
        tokio::spawn(async move {
            let result = match (&token, own) {
                (Some(token), true) => api.get_own_profile(user_id, token).await,
                _ => api.get_profile(user_id).await,
            };
            let follow = match (&token, own) {
                (Some(token), false) => api.get_follow_status(user_id, token).await.ok(),
                _ => None,
            };
            sender.send(AppEvent::ProfileLoaded {
                user_id,
                result: result.map_err(api_error),
                follow,
            });
        });
    }

    // -- App event handling -------------------------------------------------

    fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            // Navigation
            AppEvent::Quit => {
                self.running = false;
            }
            AppEvent::PushView(kind) => {
                self.push_view(kind);
            }
            AppEvent::PopView => {
                self.pop_view();
            }
            AppEvent::SwitchView(kind) => {
                self.close_popup();
                self.switch_view(kind);
            }
            AppEvent::OpenProfile(user_id) => {
                self.open_profile(user_id);
            }

            // API response events
            AppEvent::IdsLoaded { list, result } => self.on_ids_loaded(list, result),
            AppEvent::PostsLoaded { list, batch } => {
                if let Some(pane) = self.post_pane(list) {
                    pane.list.complete_batch(batch);
                }
            }
            AppEvent::UsersLoaded { list, batch } => {
                if let Some(pane) = self.user_pane(list) {
                    pane.list.complete_batch(batch);
                }
            }
            AppEvent::ProfileLoaded {
                user_id,
                result,
                follow,
            } => self.on_profile_loaded(user_id, result, follow),
            AppEvent::PostMutated {
                list,
                pending,
                result,
            } => {
                let Some(pane) = self.post_pane(list) else {
                    return;
                };
                match pane.list.finish_mutation(pending, result) {
                    MutationOutcome::Committed { id, action } => {
                        self.status_message = Some(format!("Post {id} {}", action.past_tense()));
                    }
                    MutationOutcome::RolledBack { id, error } => {
                        self.report_error(format!("Updating post {id}"), error);
                    }
                    MutationOutcome::Stale => {}
                }
            }
            AppEvent::UserMutated {
                list,
                pending,
                result,
            } => {
                let Some(pane) = self.user_pane(list) else {
                    return;
                };
                match pane.list.finish_mutation(pending, result) {
                    MutationOutcome::Committed { id, action } => {
                        if list == ListKey::Popup
                            && let Some(popup) = self.popup.as_mut()
                        {
                            popup.pending.record(id, action);
                        }
                        self.status_message = Some(follow_message(id, action));
                    }
                    MutationOutcome::RolledBack { id, error } => {
                        self.report_error(format!("Updating follow for user {id}"), error);
                    }
                    MutationOutcome::Stale => {}
                }
            }
            AppEvent::HeaderFollowSettled {
                user_id,
                action,
                ticket,
                result,
            } => {
                if let Some(profile) = self.profile.as_mut()
                    && profile.user_id == user_id
                {
                    profile.header.resolve(ticket, result.is_ok());
                }
                match result {
                    Ok(()) => self.status_message = Some(follow_message(user_id, action)),
                    Err(e) => self.report_error(format!("Updating follow for user {user_id}"), e),
                }
            }
        }
    }

    fn on_ids_loaded(&mut self, key: ListKey, result: ApiResult<Vec<u64>>) {
        let label = match key {
            ListKey::Feed => "feed",
            ListKey::Explore => "users",
            ListKey::ProfilePosts | ListKey::Popup => return,
        };
        match (key, result) {
            (ListKey::Feed, Ok(ids)) => {
                self.feed.ids_loading = false;
                if let Some(req) = self.feed.initialize(ids) {
                    self.fetch_posts(ListKey::Feed, req);
                }
            }
            (ListKey::Explore, Ok(ids)) => {
                self.explore.ids_loading = false;
                if let Some(req) = self.explore.initialize(ids) {
                    self.fetch_users(ListKey::Explore, req);
                }
            }
            (_, Err(e)) => {
                self.feed.ids_loading &= key != ListKey::Feed;
                self.explore.ids_loading &= key != ListKey::Explore;
                self.report_error(format!("Loading {label}"), e);
            }
            _ => {}
        }
    }

    fn on_profile_loaded(
        &mut self,
        user_id: u64,
        result: ApiResult<ProfileData>,
        follow: Option<crate::api::types::FollowStatus>,
    ) {
        let Some(profile) = self.profile.as_mut().filter(|p| p.user_id == user_id) else {
            return;
        };
        match result {
            Ok(data) => {
                profile.header = OptimisticFlag::new(FollowHeader {
                    status: follow.unwrap_or_default(),
                    follower_count: data.follower_count,
                });
                let ids = profile.tab.ids(&data);
                profile.data = Some(data);
                if let Some(req) = profile.posts.initialize(ids) {
                    self.fetch_posts(ListKey::ProfilePosts, req);
                }
            }
            Err(e) => {
                self.report_error(format!("Loading profile {user_id}"), e);
            }
        }
    }

    // -- Helpers ------------------------------------------------------------

    fn report_error(&mut self, context: String, error: impl std::fmt::Display) {
        let failure = FailedRequest {
            context,
            message: error.to_string(),
            at: chrono::Local::now(),
        };
        tracing::warn!(context = %failure.context, "{}", failure.message);
        self.status_message = Some(failure.summary());
        self.last_error = Some(failure);
    }
}

fn follow_message(user_id: u64, action: FollowAction) -> String {
    match action {
        FollowAction::Follow => format!("Following user {user_id}"),
        FollowAction::Unfollow => format!("Unfollowed user {user_id}"),
    }
}
