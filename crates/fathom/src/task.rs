//! One-shot, single-consumer task handles.
//!
//! [`Task`] is the engine's future primitive: a handle to a computation
//! that will be fulfilled exactly once with a value or an error. It
//! supports three consumption styles, all observing the same shared state:
//!
//! - blocking [`Task::get`], a cooperative yield loop over the fulfilled
//!   flag with acquire ordering;
//! - `.await`, via the [`Future`] impl (the stored waker doubles as the
//!   continuation);
//! - [`Task::on_complete`], a continuation hook invoked exactly once at
//!   fulfillment.
//!
//! The producing side holds a [`Completer`]. Dropping a `Completer`
//! without fulfilling it fails the task with a [`ErrorKind::Resource`]
//! error, so consumers never hang on abandoned work.
//!
//! [`ErrorKind::Resource`]: crate::error::ErrorKind::Resource

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Context, Poll, Waker},
};

use parking_lot::Mutex;

use crate::error::ErrorState;

enum Continuation {
    Empty,
    Waker(Waker),
    Hook(Box<dyn FnOnce() + Send>),
    Fired,
}

struct Shared<T> {
    slot: Mutex<Option<Result<T, ErrorState>>>,
    fulfilled: AtomicBool,
    continuation: Mutex<Continuation>,
}

impl<T> Shared<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            fulfilled: AtomicBool::new(false),
            continuation: Mutex::new(Continuation::Empty),
        }
    }

    fn fulfill(&self, result: Result<T, ErrorState>) {
        {
            let mut slot = self.slot.lock();
            if slot.is_some() {
                return;
            }
            *slot = Some(result);
        }

        self.fulfilled.store(true, Ordering::Release);

        let continuation = std::mem::replace(
            &mut *self.continuation.lock(),
            Continuation::Fired,
        );

        match continuation {
            Continuation::Waker(waker) => waker.wake(),
            Continuation::Hook(hook) => hook(),
            Continuation::Empty | Continuation::Fired => {}
        }
    }
}

/// The consuming handle of a one-shot computation.
///
/// A task is fulfilled at most once; consuming it (via [`Task::get`] or by
/// polling it to completion) yields `Result<T, ErrorState>`, where the
/// error arm covers task-level failures such as worker panics or pool
/// shutdown.
pub struct Task<T> {
    shared: Arc<Shared<T>>,
}

/// The producing handle paired with a pending [`Task`].
pub struct Completer<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Task<T> {
    /// Creates an unfulfilled task together with its completer.
    pub fn pending() -> (Self, Completer<T>) {
        let shared = Arc::new(Shared::new());
        (Self { shared: shared.clone() }, Completer { shared: Some(shared) })
    }

    /// Creates a task already fulfilled with `value`.
    pub fn ready(value: T) -> Self {
        let shared = Arc::new(Shared::new());
        shared.fulfill(Ok(value));
        Self { shared }
    }

    /// Creates a task already fulfilled with `error`.
    pub fn failed(error: ErrorState) -> Self {
        let shared = Arc::new(Shared::new());
        shared.fulfill(Err(error));
        Self { shared }
    }

    /// True once the task has been fulfilled with a value or an error.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        self.shared.fulfilled.load(Ordering::Acquire)
    }

    /// Blocks until the task is fulfilled and returns its outcome.
    ///
    /// The wait is a cooperative yield loop: no locks are held while
    /// spinning, and the fulfilled flag is observed with acquire ordering
    /// so the result written by the producer is visible.
    pub fn get(self) -> Result<T, ErrorState> {
        while !self.shared.fulfilled.load(Ordering::Acquire) {
            std::hint::spin_loop();
            std::thread::yield_now();
        }

        self.shared
            .slot
            .lock()
            .take()
            .expect("fulfilled task must hold a result")
    }

    /// Registers a continuation invoked exactly once when the task is
    /// fulfilled; if it already is, the hook runs immediately.
    ///
    /// The continuation slot is single-occupancy: registering a hook and
    /// then awaiting the task (or registering twice) replaces the earlier
    /// continuation.
    pub fn on_complete(&self, hook: impl FnOnce() + Send + 'static) {
        let mut continuation = self.shared.continuation.lock();

        if self.shared.fulfilled.load(Ordering::Acquire) {
            drop(continuation);
            hook();
            return;
        }

        *continuation = Continuation::Hook(Box::new(hook));
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, ErrorState>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.shared.fulfilled.load(Ordering::Acquire) {
            return Poll::Ready(
                self.shared
                    .slot
                    .lock()
                    .take()
                    .expect("task polled to completion twice"),
            );
        }

        let mut continuation = self.shared.continuation.lock();

        // re-check under the continuation lock so a concurrent fulfill
        // cannot slip between the flag load and the waker registration
        if self.shared.fulfilled.load(Ordering::Acquire) {
            drop(continuation);
            return Poll::Ready(
                self.shared
                    .slot
                    .lock()
                    .take()
                    .expect("task polled to completion twice"),
            );
        }

        *continuation = Continuation::Waker(cx.waker().clone());
        Poll::Pending
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("fulfilled", &self.is_fulfilled())
            .finish_non_exhaustive()
    }
}

impl<T> Completer<T> {
    /// Fulfills the paired task with a value.
    pub fn complete(mut self, value: T) {
        if let Some(shared) = self.shared.take() {
            shared.fulfill(Ok(value));
        }
    }

    /// Fulfills the paired task with an error.
    pub fn fail(mut self, error: ErrorState) {
        if let Some(shared) = self.shared.take() {
            shared.fulfill(Err(error));
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.fulfill(Err(ErrorState::resource(
                "task abandoned before completion",
            )));
        }
    }
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("consumed", &self.shared.is_none())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test;
