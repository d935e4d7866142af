use std::collections::HashMap;

use crate::api::types::ProfileData;
use crate::list::optimistic::FollowAction;

/// Actions committed inside a child view, replayed onto the parent on close.
///
/// Holds at most one action per ID; a later action replaces the earlier one.
#[derive(Debug, Clone)]
pub struct PendingActions<A> {
    entries: HashMap<u64, A>,
}

impl<A> Default for PendingActions<A> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<A> PendingActions<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: u64, action: A) {
        self.entries.insert(id, action);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (u64, A)> + '_ {
        self.entries.drain()
    }
}

impl PendingActions<FollowAction> {
    /// Apply queued follow changes to the viewer's cached profile and empty the queue.
    pub fn reconcile(&mut self, profile: &mut ProfileData) {
        for (id, action) in self.drain() {
            match action {
                FollowAction::Follow => {
                    if !profile.following_ids.contains(&id) {
                        profile.following_ids.push(id);
                        profile.following_count += 1;
                    }
                }
                FollowAction::Unfollow => {
                    if let Some(pos) = profile.following_ids.iter().position(|f| *f == id) {
                        profile.following_ids.remove(pos);
                        profile.following_count = profile.following_count.saturating_sub(1);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_action_overwrites_earlier() {
        let mut profile = ProfileData {
            following_ids: vec![4],
            following_count: 1,
            ..ProfileData::default()
        };
        let mut pending = PendingActions::new();
        pending.record(4, FollowAction::Follow);
        pending.record(4, FollowAction::Unfollow);
        pending.record(5, FollowAction::Follow);

        pending.reconcile(&mut profile);
        assert_eq!(profile.following_ids, vec![5]);
        assert_eq!(profile.following_count, 1);
    }

    #[test]
    fn reconcile_updates_following_list_and_count() {
        let mut profile = ProfileData {
            following_ids: vec![1, 2],
            following_count: 2,
            ..ProfileData::default()
        };
        let mut pending = PendingActions::new();
        pending.record(2, FollowAction::Unfollow);
        pending.record(3, FollowAction::Follow);
        // Already following: no double count.
        pending.record(1, FollowAction::Follow);

        pending.reconcile(&mut profile);

        let mut following = profile.following_ids.clone();
        following.sort_unstable();
        assert_eq!(following, vec![1, 3]);
        assert_eq!(profile.following_count, 2);
        assert!(pending.is_empty());
    }

    #[test]
    fn follow_then_unfollow_in_popup_is_a_no_op() {
        let mut profile = ProfileData {
            following_ids: vec![1],
            following_count: 1,
            ..ProfileData::default()
        };
        let before = profile.clone();
        let mut pending = PendingActions::new();
        pending.record(8, FollowAction::Follow);
        pending.record(8, FollowAction::Unfollow);

        pending.reconcile(&mut profile);
        assert_eq!(profile, before);
    }
}
