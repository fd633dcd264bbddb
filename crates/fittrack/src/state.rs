//! The published auth state and the container that owns it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use fittrack_model::{Role, UserRecord};
use tokio::sync::watch;

/// What UI surfaces observe: who is signed in, and whether the first
/// reconciliation has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    /// The reconciled directory record, never a suspended one.
    pub current_user: Option<UserRecord>,
    /// `false` until the first write lands; never goes back to `false`.
    pub is_ready: bool,
    pub(crate) generation: u64,
}

impl AuthState {
    pub fn is_signed_in(&self) -> bool {
        self.current_user.is_some()
    }

    pub fn role(&self) -> Option<Role> {
        self.current_user.as_ref().map(|u| u.role)
    }

    /// The generation of the write that produced this state.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Owns the [`AuthState`] and arbitrates every write to it.
///
/// Writers first take a generation with [`next_generation`](Self::next_generation),
/// do their async work, then [`publish`](Self::publish). A write whose
/// generation is older than the last applied one is discarded, as is any
/// write after [`unmount`](Self::unmount).
pub(crate) struct StateCell {
    tx: watch::Sender<AuthState>,
    generation: AtomicU64,
    mounted: AtomicBool,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(AuthState::default());
        Self {
            tx,
            generation: AtomicU64::new(0),
            mounted: AtomicBool::new(true),
        }
    }

    pub(crate) fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Applies a write. Returns `true` if it was applied.
    pub(crate) fn publish(&self, generation: u64, user: Option<UserRecord>) -> bool {
        if !self.is_mounted() {
            tracing::debug!(generation, "dropping state write after teardown");
            return false;
        }
        let applied = self.tx.send_if_modified(|state| {
            if generation < state.generation {
                return false;
            }
            state.generation = generation;
            state.current_user = user;
            state.is_ready = true;
            true
        });
        if !applied {
            tracing::debug!(generation, "dropping stale state write");
        }
        applied
    }

    pub(crate) fn snapshot(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    /// Waits until a write at or after `generation` has been applied, or
    /// the cell is unmounted. Returns the state at that point.
    pub(crate) async fn settled(&self, generation: u64) -> AuthState {
        let mut rx = self.tx.subscribe();
        match rx
            .wait_for(|state| state.generation >= generation || !self.is_mounted())
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => self.snapshot(),
        }
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Stops accepting writes and wakes every [`settled`](Self::settled)
    /// waiter. Returns `false` if already unmounted.
    pub(crate) fn unmount(&self) -> bool {
        let was_mounted = self.mounted.swap(false, Ordering::SeqCst);
        if was_mounted {
            self.tx.send_modify(|_| {});
        }
        was_mounted
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use fittrack_model::{NewUserRecord, UserId};

    use super::*;

    fn record(email: &str) -> UserRecord {
        NewUserRecord::customer(UserId::new_v4(), email).into_record(Utc::now())
    }

    #[test]
    fn test_new_cell_is_not_ready() {
        let cell = StateCell::new();
        let state = cell.snapshot();
        assert!(!state.is_ready);
        assert!(state.current_user.is_none());
    }

    #[test]
    fn test_publish_sets_ready_even_without_user() {
        let cell = StateCell::new();
        let generation = cell.next_generation();
        assert!(cell.publish(generation, None));
        assert!(cell.snapshot().is_ready);
    }

    #[test]
    fn test_publish_discards_older_generation() {
        let cell = StateCell::new();
        let older = cell.next_generation();
        let newer = cell.next_generation();

        assert!(cell.publish(newer, Some(record("new@x.com"))));
        assert!(!cell.publish(older, Some(record("old@x.com"))));

        let state = cell.snapshot();
        assert_eq!(state.current_user.as_ref().unwrap().email, "new@x.com");
        assert_eq!(state.generation(), newer);
    }

    #[test]
    fn test_publish_after_unmount_is_dropped() {
        let cell = StateCell::new();
        assert!(cell.unmount());
        assert!(!cell.unmount());
        let generation = cell.next_generation();
        assert!(!cell.publish(generation, Some(record("a@x.com"))));
        assert!(!cell.snapshot().is_ready);
    }

    #[tokio::test]
    async fn test_settled_resolves_on_later_generation() {
        let cell = std::sync::Arc::new(StateCell::new());
        let first = cell.next_generation();
        let second = cell.next_generation();

        let waiter = {
            let cell = std::sync::Arc::clone(&cell);
            tokio::spawn(async move { cell.settled(first).await })
        };
        tokio::task::yield_now().await;
        cell.publish(second, None);

        let state = waiter.await.unwrap();
        assert!(state.is_ready);
        assert_eq!(state.generation(), second);
    }

    #[tokio::test]
    async fn test_settled_resolves_on_unmount() {
        let cell = std::sync::Arc::new(StateCell::new());
        let generation = cell.next_generation();

        let waiter = {
            let cell = std::sync::Arc::clone(&cell);
            tokio::spawn(async move { cell.settled(generation).await })
        };
        tokio::task::yield_now().await;
        cell.unmount();

        let state = waiter.await.unwrap();
        assert!(!state.is_ready);
    }

    #[test]
    fn test_auth_state_role() {
        let mut state = AuthState::default();
        assert_eq!(state.role(), None);
        state.current_user = Some(record("a@x.com"));
        assert_eq!(state.role(), Some(Role::Customer));
        assert!(state.is_signed_in());
    }
}
