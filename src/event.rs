use color_eyre::eyre::OptionExt;
use crossterm::event::Event as CrosstermEvent;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::api::ApiClientError;
use crate::api::types::{FollowStatus, ProfileData, UserSummary};
use crate::list::optimistic::{
    FlagTicket, FollowAction, FollowHeader, PostAction, PostCard, PostSnapshot,
};
use crate::list::{BatchResult, PendingMutation};

/// Representation of all possible events.
#[derive(Debug)]
pub enum Event {
    /// An event that is emitted on a regular schedule.
    Tick,
    /// Crossterm events from the terminal.
    Crossterm(CrosstermEvent),
    /// Application-level events.
    App(Box<AppEvent>),
}

/// Application events for navigation and API responses.
#[derive(Debug)]
pub enum AppEvent {
    // -- Navigation --
    Quit,
    PushView(ViewKind),
    PopView,
    SwitchView(ViewKind),
    OpenProfile(u64),

    // -- API response events (sent from async tasks back to the event loop) --
    IdsLoaded {
        list: ListKey,
        result: ApiResult<Vec<u64>>,
    },
    PostsLoaded {
        list: ListKey,
        batch: BatchResult<PostCard>,
    },
    UsersLoaded {
        list: ListKey,
        batch: BatchResult<UserSummary>,
    },
    ProfileLoaded {
        user_id: u64,
        result: ApiResult<ProfileData>,
        follow: Option<FollowStatus>,
    },
    PostMutated {
        list: ListKey,
        pending: PendingMutation<PostAction, PostSnapshot>,
        result: Result<(), ApiClientError>,
    },
    UserMutated {
        list: ListKey,
        pending: PendingMutation<FollowAction, bool>,
        result: Result<(), ApiClientError>,
    },
    HeaderFollowSettled {
        user_id: u64,
        action: FollowAction,
        ticket: FlagTicket<FollowHeader>,
        result: ApiResult<()>,
    },
}

/// API result type using `Arc<String>` so errors are `Clone`.
pub type ApiResult<T> = Result<T, Arc<String>>;

/// Identifies a view for the view-stack navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Feed,
    Explore,
    Profile(u64),
    Help,
}

/// Identifies which incremental list an async result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKey {
    Feed,
    Explore,
    ProfilePosts,
    Popup,
}

/// Terminal event handler.
///
/// Spawns a background task that emits tick and crossterm events, and exposes
/// an unbounded channel for application events.
#[derive(Debug)]
pub struct EventHandler {
    /// Event sender channel.
    sender: mpsc::UnboundedSender<Event>,
    /// Event receiver channel.
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Constructs a new instance of [`EventHandler`] and spawns the event task.
    pub fn new(tick_rate_fps: f64) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let actor = EventTask::new(sender.clone(), tick_rate_fps);
        tokio::spawn(async { actor.run().await });
        Self { sender, receiver }
    }

    /// Receives the next event, blocking until one is available.
    pub async fn next(&mut self) -> color_eyre::Result<Event> {
        self.receiver
            .recv()
            .await
            .ok_or_eyre("Failed to receive event")
    }

    /// Queue an app event to be processed by the event loop.
    pub fn send(&self, app_event: AppEvent) {
        let _ = self.sender.send(Event::App(Box::new(app_event)));
    }

    /// Clone the underlying sender for use in spawned async tasks.
    pub fn sender(&self) -> AppSender {
        AppSender(self.sender.clone())
    }
}

/// Sending half handed to spawned API tasks.
#[derive(Debug, Clone)]
pub struct AppSender(mpsc::UnboundedSender<Event>);

impl AppSender {
    pub fn send(&self, app_event: AppEvent) {
        let _ = self.0.send(Event::App(Box::new(app_event)));
    }
}

/// Background task that reads crossterm events and emits ticks.
struct EventTask {
    sender: mpsc::UnboundedSender<Event>,
    tick_rate: Duration,
}

impl EventTask {
    fn new(sender: mpsc::UnboundedSender<Event>, tick_rate_fps: f64) -> Self {
        let fps = if tick_rate_fps > 0.0 {
            tick_rate_fps
        } else {
            30.0
        };
        Self {
            sender,
            tick_rate: Duration::from_secs_f64(1.0 / fps),
        }
    }

    async fn run(self) -> color_eyre::Result<()> {
        let mut reader = crossterm::event::EventStream::new();
        let mut tick = tokio::time::interval(self.tick_rate);
        loop {
            let tick_delay = tick.tick();
            let crossterm_event = reader.next().fuse();
            tokio::select! {
                _ = self.sender.closed() => {
                    break;
                }
                _ = tick_delay => {
                    self.send(Event::Tick);
                }
                Some(Ok(evt)) = crossterm_event => {
                    self.send(Event::Crossterm(evt));
                }
            };
        }
        Ok(())
    }

    fn send(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}
