//! One-shot engine signals.
//!
//! Every engine call that completes asynchronously hands back either a
//! [`Request`] (success or error of a single request) or a [`Completion`]
//! (the terminal signal of a whole transaction). Both are plain futures, so
//! a browser engine can complete them from event callbacks and the memory
//! engine can complete them from lock acquisition.

use crate::error::EngineResult;
use crate::EngineError;
use futures::future::{self, BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The pending outcome of one engine request.
#[must_use = "requests do nothing unless awaited"]
pub struct Request<T> {
    inner: BoxFuture<'static, EngineResult<T>>,
}

impl<T> Request<T> {
    /// Wraps a future that yields the request's outcome.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = EngineResult<T>> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }

    /// A request whose outcome is already known.
    pub fn ready(result: EngineResult<T>) -> Self
    where
        T: Send + 'static,
    {
        Self::new(future::ready(result))
    }
}

impl<T> Future for Request<T> {
    type Output = EngineResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl<T> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request").finish_non_exhaustive()
    }
}

/// Terminal signal of a transaction.
///
/// Exactly one of these is delivered per transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionSignal {
    /// Every request succeeded and the transaction committed.
    Complete,
    /// The transaction failed before it could commit.
    Error(EngineError),
    /// The transaction was rolled back.
    Abort(EngineError),
}

/// The pending terminal signal of a transaction.
#[must_use = "completions do nothing unless awaited"]
pub struct Completion {
    inner: BoxFuture<'static, TransactionSignal>,
}

impl Completion {
    /// Wraps a future that yields the terminal signal.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = TransactionSignal> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }

    /// A completion whose signal is already known.
    pub fn ready(signal: TransactionSignal) -> Self {
        Self::new(future::ready(signal))
    }
}

impl Future for Completion {
    type Output = TransactionSignal;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}
