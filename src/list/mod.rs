//! Incremental batch-loading list with optimistic item mutation.
//!
//! One controller serves every scrolling list in the app (feed, explore,
//! profile tabs, followers/following). Detail fetches and remote mutations are
//! injected through [`ItemSource`] and [`ActionSink`].
//!
//! The controller itself is synchronous: it hands out [`BatchRequest`]s and
//! [`PendingMutation`]s, and the caller performs the I/O wherever it likes
//! (the TUI does it on spawned tasks) and feeds the results back. Every
//! request carries the list generation, so results for a replaced ID set (or
//! for another list instance) are discarded instead of being attached to the
//! wrong list.

pub mod optimistic;
pub mod pending;
pub mod scroll;
pub mod sources;

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;

use crate::api::ApiClientError;
use crate::list::optimistic::Mutate;

/// Generations are unique across every list in the process.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Items are keyed by their numeric ID.
pub trait ListItem {
    fn id(&self) -> u64;
}

/// Fetches one detail record.
pub trait ItemSource<T>: Send + Sync {
    fn fetch(&self, id: u64) -> impl Future<Output = Result<T, ApiClientError>> + Send;
}

/// Commits one mutation remotely.
pub trait ActionSink<A>: Send + Sync {
    fn commit(&self, id: u64, action: &A)
    -> impl Future<Output = Result<(), ApiClientError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub generation: u64,
    pub ids: Vec<u64>,
}

/// Per-ID fetch results, in completion-independent request order.
#[derive(Debug)]
pub struct BatchResult<T> {
    pub generation: u64,
    pub results: Vec<(u64, Result<T, ApiClientError>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Applied { appended: usize },
    Stale,
}

/// An applied-but-unconfirmed mutation and what it overwrote.
#[derive(Debug, Clone)]
pub struct PendingMutation<A, S> {
    pub generation: u64,
    pub id: u64,
    pub action: A,
    snapshot: S,
}

#[derive(Debug)]
pub enum MutationOutcome<A> {
    Committed { id: u64, action: A },
    RolledBack { id: u64, error: ApiClientError },
    /// The list was re-initialized while the call was in flight.
    Stale,
}

#[derive(Debug)]
pub struct IncrementalList<T> {
    ids: Vec<u64>,
    items: Vec<T>,
    loaded: HashSet<u64>,
    requested: HashSet<u64>,
    cursor: usize,
    batch_size: usize,
    threshold: usize,
    generation: u64,
    in_flight: bool,
    initialized: bool,
}

impl<T: ListItem> IncrementalList<T> {
    /// `threshold` is how many items from the end counts as "near the bottom".
    pub fn new(batch_size: usize, threshold: usize) -> Self {
        Self {
            ids: Vec::new(),
            items: Vec::new(),
            loaded: HashSet::new(),
            requested: HashSet::new(),
            cursor: 0,
            batch_size: batch_size.max(1),
            threshold,
            generation: next_generation(),
            in_flight: false,
            initialized: false,
        }
    }

    /// Replace the ID set, dropping everything loaded so far.
    ///
    /// Returns the first batch to fetch, or `None` for an empty set.
    pub fn initialize(&mut self, ids: Vec<u64>) -> Option<BatchRequest> {
        self.reset();
        self.ids = ids;
        self.initialized = true;
        self.next_batch()
    }

    /// Forget the ID set; in-flight results become stale.
    pub fn clear(&mut self) {
        self.reset();
        self.ids.clear();
    }

    fn reset(&mut self) {
        self.generation = next_generation();
        self.items.clear();
        self.loaded.clear();
        self.requested.clear();
        self.cursor = 0;
        self.in_flight = false;
        self.initialized = false;
    }

    /// Next slice of unrequested IDs, unless a batch is in flight or the end
    /// has been reached.
    pub fn next_batch(&mut self) -> Option<BatchRequest> {
        if self.in_flight {
            return None;
        }

        while self.cursor < self.ids.len() {
            let end = (self.cursor + self.batch_size).min(self.ids.len());
            let ids: Vec<u64> = self.ids[self.cursor..end]
                .iter()
                .copied()
                .filter(|id| self.requested.insert(*id))
                .collect();
            self.cursor = end;

            // A slice made only of repeated IDs has nothing to fetch.
            if ids.is_empty() {
                continue;
            }

            self.in_flight = true;
            tracing::debug!(
                generation = self.generation,
                cursor = self.cursor,
                count = ids.len(),
                "requesting batch"
            );
            return Some(BatchRequest {
                generation: self.generation,
                ids,
            });
        }
        None
    }

    /// Scroll notification carrying how many items remain below the viewport.
    pub fn on_scroll_near_bottom(&mut self, remaining: usize) -> Option<BatchRequest> {
        if remaining >= self.threshold {
            return None;
        }
        self.next_batch()
    }

    /// Append the successful results of a batch.
    pub fn complete_batch(&mut self, result: BatchResult<T>) -> BatchOutcome {
        if result.generation != self.generation {
            tracing::debug!(
                stale = result.generation,
                current = self.generation,
                "discarding stale batch"
            );
            return BatchOutcome::Stale;
        }

        self.in_flight = false;
        let mut appended = 0;
        for (id, fetched) in result.results {
            match fetched {
                Ok(item) => {
                    if self.loaded.insert(id) {
                        self.items.push(item);
                        appended += 1;
                    }
                }
                Err(e) => tracing::warn!(id, "dropping item that failed to load: {e}"),
            }
        }
        BatchOutcome::Applied { appended }
    }

    /// Request, fetch and append the next batch in one step.
    pub async fn load_next<S: ItemSource<T>>(&mut self, source: &S) -> Option<BatchOutcome> {
        let request = self.next_batch()?;
        let result = fetch_batch(source, request).await;
        Some(self.complete_batch(result))
    }

    /// Apply `action` to a loaded item immediately.
    ///
    /// Returns `None` if the item is not loaded.
    pub fn begin_mutation<A>(
        &mut self,
        id: u64,
        action: A,
        viewer: Option<u64>,
    ) -> Option<PendingMutation<A, <T as Mutate<A>>::Snapshot>>
    where
        T: Mutate<A>,
    {
        let generation = self.generation;
        let item = self.get_mut(id)?;
        let snapshot = item.snapshot(&action);
        item.apply(&action, viewer);
        Some(PendingMutation {
            generation,
            id,
            action,
            snapshot,
        })
    }

    /// Settle a mutation with the remote result, rolling back on failure.
    pub fn finish_mutation<A>(
        &mut self,
        pending: PendingMutation<A, <T as Mutate<A>>::Snapshot>,
        result: Result<(), ApiClientError>,
    ) -> MutationOutcome<A>
    where
        T: Mutate<A>,
    {
        if pending.generation != self.generation {
            return MutationOutcome::Stale;
        }

        let PendingMutation {
            id,
            action,
            snapshot,
            ..
        } = pending;
        match result {
            Ok(()) => MutationOutcome::Committed { id, action },
            Err(error) => {
                tracing::warn!(id, "mutation failed, rolling back: {error}");
                if let Some(item) = self.get_mut(id) {
                    item.restore(snapshot);
                }
                MutationOutcome::RolledBack { id, error }
            }
        }
    }

    /// Optimistically mutate, commit remotely and reconcile.
    ///
    /// `on_action` runs once, and only if the remote call succeeded.
    pub async fn mutate<A, S, F>(
        &mut self,
        id: u64,
        action: A,
        viewer: Option<u64>,
        sink: &S,
        on_action: F,
    ) -> Option<MutationOutcome<A>>
    where
        T: Mutate<A>,
        S: ActionSink<A>,
        F: FnOnce(u64, &A),
    {
        let pending = self.begin_mutation(id, action, viewer)?;
        let result = sink.commit(id, &pending.action).await;
        let outcome = self.finish_mutation(pending, result);
        if let MutationOutcome::Committed { id, action } = &outcome {
            on_action(*id, action);
        }
        Some(outcome)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut T> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    /// Every ID has been requested and nothing is in flight.
    pub fn is_exhausted(&self) -> bool {
        !self.in_flight && self.cursor >= self.ids.len()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The list was initialized with no IDs at all ("no items").
    pub fn is_empty_set(&self) -> bool {
        self.initialized && self.ids.is_empty()
    }
}

/// Fetch every ID of a batch concurrently.
///
/// A failed fetch does not affect its siblings.
pub async fn fetch_batch<T, S>(source: &S, request: BatchRequest) -> BatchResult<T>
where
    S: ItemSource<T> + ?Sized,
{
    let fetches = request
        .ids
        .iter()
        .map(|&id| async move { (id, source.fetch(id).await) });
    BatchResult {
        generation: request.generation,
        results: join_all(fetches).await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::api::types::{PostSummary, UserSummary};
    use crate::list::optimistic::{FollowAction, PostAction, PostCard};

    /// Serves users 1..=N, failing the IDs in `failing`.
    #[derive(Default)]
    struct FakeUsers {
        failing: HashSet<u64>,
        fetched: Mutex<Vec<u64>>,
    }

    impl FakeUsers {
        fn failing(ids: &[u64]) -> Self {
            Self {
                failing: ids.iter().copied().collect(),
                ..Self::default()
            }
        }

        fn fetched(&self) -> Vec<u64> {
            self.fetched.lock().unwrap().clone()
        }
    }

    impl ItemSource<UserSummary> for FakeUsers {
        async fn fetch(&self, id: u64) -> Result<UserSummary, ApiClientError> {
            self.fetched.lock().unwrap().push(id);
            if self.failing.contains(&id) {
                return Err(ApiClientError::ApiError {
                    status: 500,
                    detail: "boom".into(),
                });
            }
            Ok(user(id, false))
        }
    }

    struct FakeSink {
        ok: bool,
        commits: Mutex<usize>,
    }

    impl FakeSink {
        fn new(ok: bool) -> Self {
            Self {
                ok,
                commits: Mutex::new(0),
            }
        }
    }

    impl<A: Sync> ActionSink<A> for FakeSink {
        async fn commit(&self, _id: u64, _action: &A) -> Result<(), ApiClientError> {
            *self.commits.lock().unwrap() += 1;
            if self.ok {
                Ok(())
            } else {
                Err(ApiClientError::Rejected)
            }
        }
    }

    fn user(id: u64, follows: bool) -> UserSummary {
        UserSummary {
            id,
            name: format!("user{id}"),
            profile_pic: None,
            follows,
            follows_back: false,
        }
    }

    fn loaded_ids(list: &IncrementalList<UserSummary>) -> Vec<u64> {
        list.items().iter().map(|u| u.id).collect()
    }

    fn item<T: ListItem>(list: &IncrementalList<T>, id: u64) -> &T {
        list.items().iter().find(|item| item.id() == id).unwrap()
    }

    #[tokio::test]
    async fn seven_ids_in_batches_of_five() {
        let source = FakeUsers::default();
        let mut list: IncrementalList<UserSummary> = IncrementalList::new(5, 3);

        let first = list.initialize((1..=7).collect()).unwrap();
        assert_eq!(first.ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(list.cursor, 5);
        list.complete_batch(fetch_batch(&source, first).await);
        assert_eq!(loaded_ids(&list), vec![1, 2, 3, 4, 5]);

        let second = list.on_scroll_near_bottom(0).unwrap();
        assert_eq!(second.ids, vec![6, 7]);
        assert_eq!(list.cursor, 7);
        list.complete_batch(fetch_batch(&source, second).await);

        assert_eq!(loaded_ids(&list), vec![1, 2, 3, 4, 5, 6, 7]);
        assert!(list.on_scroll_near_bottom(0).is_none());
        assert!(list.is_exhausted());
    }

    #[tokio::test]
    async fn issues_ceil_n_over_b_batches() {
        for (n, b) in [(0u64, 5usize), (1, 5), (5, 5), (6, 5), (23, 4), (10, 1)] {
            let source = FakeUsers::default();
            let mut list: IncrementalList<UserSummary> = IncrementalList::new(b, 3);
            let mut batches = 0;

            let mut request = list.initialize((1..=n).collect());
            while let Some(req) = request {
                batches += 1;
                list.complete_batch(fetch_batch(&source, req).await);
                request = list.on_scroll_near_bottom(0);
            }

            assert_eq!(batches, (n as usize).div_ceil(b), "n={n} b={b}");
            assert_eq!(list.len(), n as usize);
            assert!(list.cursor <= n as usize);
        }
    }

    #[tokio::test]
    async fn failed_fetches_are_omitted() {
        let source = FakeUsers::failing(&[2, 4]);
        let mut list: IncrementalList<UserSummary> = IncrementalList::new(5, 3);

        let request = list.initialize(vec![1, 2, 3, 4, 5]).unwrap();
        let outcome = list.complete_batch(fetch_batch(&source, request).await);

        assert_eq!(outcome, BatchOutcome::Applied { appended: 3 });
        assert_eq!(loaded_ids(&list), vec![1, 3, 5]);
        assert_eq!(source.fetched().len(), 5);
        assert!(!list.is_loading());
    }

    #[tokio::test]
    async fn repeated_ids_are_fetched_and_shown_once() {
        let source = FakeUsers::default();
        let mut list: IncrementalList<UserSummary> = IncrementalList::new(3, 3);

        let mut request = list.initialize(vec![1, 2, 1, 3, 2, 2, 4]);
        while let Some(req) = request {
            list.complete_batch(fetch_batch(&source, req).await);
            request = list.next_batch();
        }

        assert_eq!(loaded_ids(&list), vec![1, 2, 3, 4]);
        let mut fetched = source.fetched();
        fetched.sort_unstable();
        assert_eq!(fetched, vec![1, 2, 3, 4]);
    }

    #[test]
    fn overlapping_results_do_not_duplicate_items() {
        let mut list: IncrementalList<UserSummary> = IncrementalList::new(2, 3);
        let first = list.initialize(vec![1, 2, 3]).unwrap();
        list.complete_batch(BatchResult {
            generation: first.generation,
            results: vec![(1, Ok(user(1, false))), (2, Ok(user(2, false)))],
        });

        let second = list.next_batch().unwrap();
        let outcome = list.complete_batch(BatchResult {
            generation: second.generation,
            results: vec![(2, Ok(user(2, true))), (3, Ok(user(3, false)))],
        });

        assert_eq!(outcome, BatchOutcome::Applied { appended: 1 });
        assert_eq!(loaded_ids(&list), vec![1, 2, 3]);
        assert!(!item(&list, 2).follows);
    }

    #[test]
    fn triggers_while_in_flight_are_dropped() {
        let mut list: IncrementalList<UserSummary> = IncrementalList::new(2, 3);
        list.initialize(vec![1, 2, 3, 4]).unwrap();

        assert!(list.is_loading());
        assert!(list.on_scroll_near_bottom(0).is_none());
        assert!(list.next_batch().is_none());
        assert_eq!(list.cursor, 2);
    }

    #[test]
    fn scroll_far_from_bottom_does_nothing() {
        let mut list: IncrementalList<UserSummary> = IncrementalList::new(2, 3);
        let first = list.initialize(vec![1, 2, 3, 4]).unwrap();
        list.complete_batch(BatchResult {
            generation: first.generation,
            results: vec![],
        });

        assert!(list.on_scroll_near_bottom(3).is_none());
        assert!(list.on_scroll_near_bottom(2).is_some());
    }

    #[tokio::test]
    async fn results_for_a_replaced_id_set_are_discarded() {
        let source = FakeUsers::default();
        let mut list: IncrementalList<UserSummary> = IncrementalList::new(5, 3);

        let old = list.initialize(vec![1, 2, 3]).unwrap();
        let fresh = list.initialize(vec![7, 8]).unwrap();

        let outcome = list.complete_batch(fetch_batch(&source, old).await);
        assert_eq!(outcome, BatchOutcome::Stale);
        assert!(list.is_empty());
        // The new generation's batch is still outstanding.
        assert!(list.is_loading());

        list.complete_batch(fetch_batch(&source, fresh).await);
        assert_eq!(loaded_ids(&list), vec![7, 8]);
    }

    #[test]
    fn empty_id_set_issues_no_fetch() {
        let mut list: IncrementalList<UserSummary> = IncrementalList::new(5, 3);
        assert!(!list.is_empty_set());

        assert!(list.initialize(Vec::new()).is_none());
        assert!(list.is_empty_set());
        assert!(list.is_exhausted());
        assert!(list.on_scroll_near_bottom(0).is_none());
    }

    #[tokio::test]
    async fn failed_follow_rolls_back() {
        let mut list: IncrementalList<UserSummary> = IncrementalList::new(5, 3);
        let request = list.initialize(vec![1, 2]).unwrap();
        list.complete_batch(fetch_batch(&FakeUsers::default(), request).await);

        let sink = FakeSink::new(false);
        let mut calls = 0;
        let outcome = list
            .mutate(2, FollowAction::Follow, Some(9), &sink, |_, _| calls += 1)
            .await
            .unwrap();

        assert!(matches!(outcome, MutationOutcome::RolledBack { id: 2, .. }));
        assert!(!item(&list, 2).follows);
        assert_eq!(*sink.commits.lock().unwrap(), 1);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn successful_follow_fires_one_callback() {
        let mut list: IncrementalList<UserSummary> = IncrementalList::new(5, 3);
        let request = list.initialize(vec![1, 2]).unwrap();
        list.complete_batch(fetch_batch(&FakeUsers::default(), request).await);

        let sink = FakeSink::new(true);
        let mut seen = Vec::new();
        let outcome = list
            .mutate(1, FollowAction::Follow, Some(9), &sink, |id, action| {
                seen.push((id, *action))
            })
            .await
            .unwrap();

        assert!(matches!(outcome, MutationOutcome::Committed { id: 1, .. }));
        assert!(item(&list, 1).follows);
        assert_eq!(seen, vec![(1, FollowAction::Follow)]);
    }

    #[test]
    fn failed_like_restores_counters_exactly() {
        let mut list: IncrementalList<PostCard> = IncrementalList::new(5, 3);
        let request = list.initialize(vec![10]).unwrap();
        let post = PostSummary {
            id: 10,
            like_ids: vec![3, 4],
            like_count: 2,
            ..PostSummary::default()
        };
        list.complete_batch(BatchResult {
            generation: request.generation,
            results: vec![(10, Ok(PostCard::new(post, Some(9))))],
        });
        let before = item(&list, 10).clone();

        let pending = list.begin_mutation(10, PostAction::Like, Some(9)).unwrap();
        let liked = item(&list, 10);
        assert!(liked.liked);
        assert_eq!(liked.post.like_count, 3);
        assert_eq!(liked.post.like_ids, vec![3, 4, 9]);

        list.finish_mutation(pending, Err(ApiClientError::Rejected));
        assert_eq!(item(&list, 10), &before);
    }

    #[test]
    fn mutation_settling_after_reset_is_stale() {
        let mut list: IncrementalList<UserSummary> = IncrementalList::new(5, 3);
        let request = list.initialize(vec![1]).unwrap();
        list.complete_batch(BatchResult {
            generation: request.generation,
            results: vec![(1, Ok(user(1, false)))],
        });

        let pending = list.begin_mutation(1, FollowAction::Follow, None).unwrap();
        list.clear();

        let outcome = list.finish_mutation(pending, Err(ApiClientError::Rejected));
        assert!(matches!(outcome, MutationOutcome::Stale));
    }

    #[test]
    fn mutating_an_unloaded_item_is_a_no_op() {
        let mut list: IncrementalList<UserSummary> = IncrementalList::new(5, 3);
        list.initialize(vec![1, 2]);
        assert!(list.begin_mutation(1, FollowAction::Follow, None).is_none());
    }
}
