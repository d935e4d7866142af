//! Optimistic state changes: apply locally, confirm remotely, revert on failure.

use serde::Serialize;

use crate::api::types::{FollowStatus, PostSummary, UserSummary};
use crate::list::ListItem;

/// An item that can be changed optimistically by an action of type `A`.
///
/// `snapshot` captures exactly the attributes `apply` touches, so `restore`
/// returns the item to its pre-mutation state.
pub trait Mutate<A> {
    type Snapshot;

    fn snapshot(&self, action: &A) -> Self::Snapshot;
    fn apply(&mut self, action: &A, viewer: Option<u64>);
    fn restore(&mut self, snapshot: Self::Snapshot);
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

/// A post plus the viewer's local like/save flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostCard {
    #[serde(flatten)]
    pub post: PostSummary,
    pub liked: bool,
    pub saved: bool,
}

impl PostCard {
    pub fn new(post: PostSummary, viewer: Option<u64>) -> Self {
        let liked = viewer.is_some_and(|v| post.like_ids.contains(&v));
        let saved = viewer.is_some_and(|v| post.saved_ids.contains(&v));
        Self { post, liked, saved }
    }
}

impl ListItem for PostCard {
    fn id(&self) -> u64 {
        self.post.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostAction {
    Like,
    Unlike,
    Save,
    Unsave,
}

impl PostAction {
    pub fn toggle_like(liked: bool) -> Self {
        if liked { Self::Unlike } else { Self::Like }
    }

    pub fn toggle_save(saved: bool) -> Self {
        if saved { Self::Unsave } else { Self::Save }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Like => "liked",
            Self::Unlike => "unliked",
            Self::Save => "saved",
            Self::Unsave => "unsaved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostSnapshot {
    Like {
        liked: bool,
        like_count: u64,
        like_ids: Vec<u64>,
    },
    Save {
        saved: bool,
        saved_ids: Vec<u64>,
    },
}

impl Mutate<PostAction> for PostCard {
    type Snapshot = PostSnapshot;

    fn snapshot(&self, action: &PostAction) -> PostSnapshot {
        match action {
            PostAction::Like | PostAction::Unlike => PostSnapshot::Like {
                liked: self.liked,
                like_count: self.post.like_count,
                like_ids: self.post.like_ids.clone(),
            },
            PostAction::Save | PostAction::Unsave => PostSnapshot::Save {
                saved: self.saved,
                saved_ids: self.post.saved_ids.clone(),
            },
        }
    }

    fn apply(&mut self, action: &PostAction, viewer: Option<u64>) {
        match action {
            PostAction::Like => {
                if !self.liked {
                    self.liked = true;
                    self.post.like_count += 1;
                }
                if let Some(v) = viewer
                    && !self.post.like_ids.contains(&v)
                {
                    self.post.like_ids.push(v);
                }
            }
            PostAction::Unlike => {
                if self.liked {
                    self.liked = false;
                    self.post.like_count = self.post.like_count.saturating_sub(1);
                }
                self.post.like_ids.retain(|id| Some(*id) != viewer);
            }
            PostAction::Save => {
                self.saved = true;
                if let Some(v) = viewer
                    && !self.post.saved_ids.contains(&v)
                {
                    self.post.saved_ids.push(v);
                }
            }
            PostAction::Unsave => {
                self.saved = false;
                self.post.saved_ids.retain(|id| Some(*id) != viewer);
            }
        }
    }

    fn restore(&mut self, snapshot: PostSnapshot) {
        match snapshot {
            PostSnapshot::Like {
                liked,
                like_count,
                like_ids,
            } => {
                self.liked = liked;
                self.post.like_count = like_count;
                self.post.like_ids = like_ids;
            }
            PostSnapshot::Save { saved, saved_ids } => {
                self.saved = saved;
                self.post.saved_ids = saved_ids;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

impl ListItem for UserSummary {
    fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowAction {
    Follow,
    Unfollow,
}

impl FollowAction {
    pub fn toggle(follows: bool) -> Self {
        if follows {
            Self::Unfollow
        } else {
            Self::Follow
        }
    }
}

impl Mutate<FollowAction> for UserSummary {
    type Snapshot = bool;

    fn snapshot(&self, _action: &FollowAction) -> bool {
        self.follows
    }

    fn apply(&mut self, action: &FollowAction, _viewer: Option<u64>) {
        self.follows = matches!(action, FollowAction::Follow);
    }

    fn restore(&mut self, follows: bool) {
        self.follows = follows;
    }
}

// ---------------------------------------------------------------------------
// Standalone flags
// ---------------------------------------------------------------------------

/// A single optimistically-updated value outside any list.
///
/// `Idle(v)` → [`begin`](Self::begin) → `Pending` → [`resolve`](Self::resolve)
/// → `Idle(new or previous)`. Overlapping actions are allowed; whichever
/// resolves last decides the visible value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimisticFlag<V> {
    value: V,
    outstanding: usize,
}

/// Returned by `begin`; carries what to revert to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct FlagTicket<V> {
    value: V,
    previous: V,
}

impl<V: Copy> OptimisticFlag<V> {
    pub fn new(value: V) -> Self {
        Self {
            value,
            outstanding: 0,
        }
    }

    pub fn value(&self) -> V {
        self.value
    }

    pub fn is_pending(&self) -> bool {
        self.outstanding > 0
    }

    /// Show `value` immediately.
    pub fn begin(&mut self, value: V) -> FlagTicket<V> {
        let previous = self.value;
        self.value = value;
        self.outstanding += 1;
        FlagTicket { value, previous }
    }

    pub fn resolve(&mut self, ticket: FlagTicket<V>, ok: bool) {
        self.outstanding = self.outstanding.saturating_sub(1);
        self.value = if ok { ticket.value } else { ticket.previous };
    }
}

/// The profile header's follow button and the follower count it drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowHeader {
    pub status: FollowStatus,
    pub follower_count: u64,
}

impl FollowHeader {
    pub fn after(self, action: FollowAction) -> Self {
        match action {
            FollowAction::Follow if !self.status.follows => Self {
                status: FollowStatus {
                    follows: true,
                    ..self.status
                },
                follower_count: self.follower_count + 1,
            },
            FollowAction::Unfollow if self.status.follows => Self {
                status: FollowStatus {
                    follows: false,
                    ..self.status
                },
                follower_count: self.follower_count.saturating_sub(1),
            },
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(like_ids: Vec<u64>, saved_ids: Vec<u64>, viewer: Option<u64>) -> PostCard {
        let like_count = like_ids.len() as u64;
        PostCard::new(
            PostSummary {
                id: 1,
                like_ids,
                like_count,
                saved_ids,
                ..PostSummary::default()
            },
            viewer,
        )
    }

    #[test]
    fn viewer_flags_come_from_id_lists() {
        let post = card(vec![2, 9], vec![9], Some(9));
        assert!(post.liked && post.saved);

        let anonymous = card(vec![2, 9], vec![9], None);
        assert!(!anonymous.liked && !anonymous.saved);
    }

    #[test]
    fn like_then_restore_is_identity() {
        let mut post = card(vec![2], vec![], Some(9));
        let before = post.clone();

        let snapshot = post.snapshot(&PostAction::Like);
        post.apply(&PostAction::Like, Some(9));
        assert!(post.liked);
        assert_eq!(post.post.like_count, 2);

        post.restore(snapshot);
        assert_eq!(post, before);
    }

    #[test]
    fn unlike_never_underflows() {
        let mut post = card(vec![], vec![], Some(9));
        post.liked = true;
        post.apply(&PostAction::Unlike, Some(9));
        assert_eq!(post.post.like_count, 0);
        assert!(!post.liked);
    }

    #[test]
    fn save_snapshot_leaves_likes_alone() {
        let mut post = card(vec![9], vec![], Some(9));
        let snapshot = post.snapshot(&PostAction::Save);
        post.apply(&PostAction::Save, Some(9));
        assert_eq!(post.post.saved_ids, vec![9]);

        post.restore(snapshot);
        assert!(!post.saved);
        assert!(post.liked);
        assert!(post.post.saved_ids.is_empty());
    }

    #[test]
    fn toggles_pick_the_opposite_action() {
        assert_eq!(PostAction::toggle_like(true), PostAction::Unlike);
        assert_eq!(PostAction::toggle_save(false), PostAction::Save);
        assert_eq!(FollowAction::toggle(false), FollowAction::Follow);
    }

    #[test]
    fn flag_reverts_on_failure() {
        let mut flag = OptimisticFlag::new(false);
        let ticket = flag.begin(true);
        assert!(flag.value());
        assert!(flag.is_pending());

        flag.resolve(ticket, false);
        assert!(!flag.value());
        assert!(!flag.is_pending());
    }

    #[test]
    fn flag_last_resolved_wins() {
        let mut flag = OptimisticFlag::new(false);
        let follow = flag.begin(true);
        let unfollow = flag.begin(false);

        flag.resolve(unfollow, true);
        assert!(flag.is_pending());
        flag.resolve(follow, true);
        assert!(flag.value());
        assert!(!flag.is_pending());
    }

    #[test]
    fn follow_header_tracks_count() {
        let header = FollowHeader {
            status: FollowStatus {
                follows: false,
                follows_back: true,
            },
            follower_count: 4,
        };

        let followed = header.after(FollowAction::Follow);
        assert!(followed.status.follows);
        assert!(followed.status.follows_back);
        assert_eq!(followed.follower_count, 5);

        assert_eq!(followed.after(FollowAction::Follow), followed);
        assert_eq!(followed.after(FollowAction::Unfollow), header);
    }
}
