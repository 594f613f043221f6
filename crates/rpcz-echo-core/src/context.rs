//! Ambient cancellation and deadline propagation.
//!
//! A [`Context`] pairs a [`CancellationToken`] with an optional absolute
//! deadline. Contexts form a tree: a derived context is cancelled whenever its
//! parent is, and its deadline is never later than the parent's. Both signals
//! are irreversible once fired.
//!
//! The deadline is not backed by a background timer. A timer only exists
//! while somebody awaits [`Context::done`], and it is released as soon as that
//! future completes or is dropped.

use crate::error::Error;
use core::{future::Future, time::Duration};
use tokio::time::{self, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Why a [`Context`] is done.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Done {
    Cancelled,
    DeadlineExceeded,
}

impl From<Done> for Error {
    fn from(done: Done) -> Self {
        match done {
            Done::Cancelled => Error::Cancelled,
            Done::DeadlineExceeded => Error::DeadlineExceeded,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A root context: never cancelled unless [`Context::cancel`] is called,
    /// and without a deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a context that is cancelled together with `self` but can also
    /// be cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derives a child whose deadline is the earlier of `self`'s and `at`.
    pub fn with_deadline(&self, at: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(at),
            None => at,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derives a child that expires no later than `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancels this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns a guard that cancels this context when dropped.
    pub fn drop_guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, saturating at zero.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reports whether the context is already done, without waiting.
    pub fn err(&self) -> Option<Done> {
        if self.token.is_cancelled() {
            Some(Done::Cancelled)
        } else if self.deadline.is_some_and(|at| at <= Instant::now()) {
            Some(Done::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    ///
    /// Cancellation wins when both are ready at the same time.
    pub async fn done(&self) {
        self.done_reason().await;
    }

    /// Like [`Context::done`], but reports which signal fired.
    pub async fn done_reason(&self) -> Done {
        match self.deadline {
            Some(at) => tokio::select! {
                biased;
                () = self.token.cancelled() => Done::Cancelled,
                () = time::sleep_until(at) => Done::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                Done::Cancelled
            }
        }
    }

    /// Races `fut` against this context.
    ///
    /// When the context finishes first, `fut` is dropped and the reason is
    /// returned as an [`Error`].
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Error>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            done = self.done_reason() => Err(done.into()),
            out = fut => Ok(out),
        }
    }
}
