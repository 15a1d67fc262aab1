//! Lazily computed, at-most-once cache cell.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::OnceCell;

/// Observable state of a [`MemoCell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Empty,
    Pending,
    Ready,
}

/// Cache slot moving `Empty -> Pending -> Ready`.
///
/// Concurrent callers of [`MemoCell::get_or_init`] share a single initializer run: the first
/// caller claims the slot, the rest wait for its value. If the running initializer is
/// dropped before finishing, the slot falls back to `Empty` and the next caller retries.
#[derive(Debug)]
pub struct MemoCell<T> {
    pending: AtomicBool,
    value: OnceCell<T>,
}

impl<T> Default for MemoCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoCell<T> {
    pub fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            value: OnceCell::new(),
        }
    }

    pub fn state(&self) -> CellState {
        if self.value.initialized() {
            CellState::Ready
        } else if self.pending.load(Ordering::Acquire) {
            CellState::Pending
        } else {
            CellState::Empty
        }
    }

    pub async fn get_or_init<F, Fut>(&self, init: F) -> &T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let pending = &self.pending;
        self.value
            .get_or_init(move || async move {
                let guard = PendingGuard::claim(pending);
                let value = init().await;
                guard.settle();
                value
            })
            .await
    }
}

/// Resets the pending flag unless the initializer ran to completion.
struct PendingGuard<'a> {
    flag: &'a AtomicBool,
    settled: bool,
}

impl<'a> PendingGuard<'a> {
    fn claim(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self {
            flag,
            settled: false,
        }
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.flag.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn concurrent_callers_share_one_run() {
        let cell: MemoCell<usize> = MemoCell::new();
        let counter = AtomicUsize::new(0);
        let runs = &counter;
        let init = move || async move {
            runs.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            7
        };

        let (a, b) = tokio::join!(cell.get_or_init(init), cell.get_or_init(init));
        assert_eq!((*a, *b), (7, 7));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(cell.state(), CellState::Ready);
    }

    #[tokio::test]
    async fn reports_pending_while_initializing() {
        let cell: MemoCell<CellState> = MemoCell::new();
        assert_eq!(cell.state(), CellState::Empty);

        let this = &cell;
        let observed = cell.get_or_init(move || async move { this.state() }).await;
        assert_eq!(*observed, CellState::Pending);
        assert_eq!(cell.state(), CellState::Ready);
    }

    #[tokio::test]
    async fn cancelled_initializer_returns_slot_to_empty() {
        let cell: MemoCell<u8> = MemoCell::new();
        {
            let pending = cell.get_or_init(|| std::future::pending::<u8>());
            let timed_out =
                tokio::time::timeout(std::time::Duration::from_millis(5), pending).await;
            assert!(timed_out.is_err());
        }
        assert_eq!(cell.state(), CellState::Empty);

        assert_eq!(*cell.get_or_init(|| async { 3 }).await, 3);
    }
}
