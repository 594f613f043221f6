//! Client-side request dispatcher.
//!
//! A [`Dispatcher`] issues a fixed number of echo requests, with payloads
//! `"0"` through `"N-1"`, and folds their outcomes into a [`Summary`]. Failed
//! requests are logged one by one and never abort the batch.
//!
//! ## Modes
//!
//! - [`Mode::Sync`]: requests are made one after another with
//!   [`Transport::call`].
//! - [`Mode::Async`]: every request runs in its own task. Each task fires
//!   [`Transport::go`] and races the returned [`Call`] against the ambient
//!   context. On cancellation the call is abandoned (not stopped) and the
//!   outcome carries the cancellation error.
//!
//! In async mode outcomes flow over a bounded channel. The tasks are tracked
//! by a [`TaskTracker`], and a separate aggregator task owns the original
//! sender: it waits for the tracker to drain and only then drops the sender,
//! so the channel closes exactly once, after the last outcome was sent.
//!
//! [`Call`]: crate::transport::Call

use crate::{
    context::Context,
    error::{Error, Result},
    promise::Settled,
    proto::EchoRequest,
    transport::Transport,
};
use core::{fmt, time::Duration};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Sync,
    Async,
}

/// The terminal result of one dispatched request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub sent: String,
    /// The echoed payload, or why the request failed.
    pub result: Result<String>,
}

/// Batch-level tally of a [`Dispatcher::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Summary {
    pub mode: Mode,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl Summary {
    fn new(mode: Mode, total: usize) -> Self {
        Self {
            mode,
            total,
            succeeded: 0,
            failed: 0,
        }
    }

    fn record(&mut self, outcome: &Outcome) {
        match &outcome.result {
            Ok(received) => {
                tracing::info!("sent => {}; received => {}", outcome.sent, received);
                self.succeeded += 1;
            }
            Err(e) => {
                tracing::warn!(kind = e.kind().as_str(), "failed to make request: {e}");
                self.failed += 1;
            }
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.mode {
            Mode::Sync => "made",
            Mode::Async => "handled",
        };
        write!(
            f,
            "successfully {verb}: {} out of {} requests",
            self.succeeded, self.total
        )
    }
}

/// Capacity of the async completion channel for a batch of `requests`.
///
/// Only throughput depends on it: producers park on a full channel and the
/// consumer keeps draining it.
fn completion_buffer(requests: usize) -> usize {
    (requests / 2).max(1)
}

pub struct Dispatcher<T> {
    transport: T,
    requests: usize,
    mode: Mode,
    delay: Option<Duration>,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T, requests: usize, mode: Mode) -> Self {
        Self {
            transport,
            requests,
            mode,
            delay: None,
        }
    }

    /// Asks the server to delay every request by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = (!delay.is_zero()).then_some(delay);
        self
    }

    fn request(&self, i: usize) -> EchoRequest {
        let req = EchoRequest::new(i.to_string());
        match self.delay {
            Some(delay) => req.with_delay(delay),
            None => req,
        }
    }

    /// Issues every request and returns the tally.
    ///
    /// Returns after the slowest request completes, or right after `ctx` is
    /// done for requests still in flight in async mode.
    pub async fn run(&self, ctx: &Context) -> Summary {
        let summary = match self.mode {
            Mode::Sync => self.run_sync(ctx).await,
            Mode::Async => self.run_async(ctx).await,
        };
        tracing::info!("{summary}");
        summary
    }

    async fn run_sync(&self, ctx: &Context) -> Summary {
        let mut summary = Summary::new(Mode::Sync, self.requests);

        for i in 0..self.requests {
            let outcome = call_one(&self.transport, ctx, self.request(i)).await;
            summary.record(&outcome);
        }

        summary
    }

    async fn run_async(&self, ctx: &Context) -> Summary {
        let mut summary = Summary::new(Mode::Async, self.requests);
        let (tx, mut rx) = mpsc::channel(completion_buffer(self.requests));
        let tracker = TaskTracker::new();

        for i in 0..self.requests {
            let req = self.request(i);
            let transport = self.transport.clone();
            let ctx = ctx.clone();
            let tx = tx.clone();

            tracker.spawn(async move {
                let outcome = dispatch_one(&transport, &ctx, req).await;
                if tx.send(outcome).await.is_err() {
                    tracing::debug!("Outcome dropped, consumer is gone");
                }
            });
        }
        tracker.close();

        // Sole closer: the channel closes once this sender and every worker's
        // clone are gone, and the worker clones are gone once the tracker is
        // empty.
        tokio::spawn(async move {
            tracker.wait().await;
            drop(tx);
        });

        while let Some(outcome) = rx.recv().await {
            summary.record(&outcome);
        }

        summary
    }
}

/// One synchronous request: wait for the call to return.
async fn call_one<T>(transport: &T, ctx: &Context, req: EchoRequest) -> Outcome
where
    T: Transport,
{
    let sent = req.msg.clone();
    let result = transport.call(ctx, req).await.map(|resp| resp.msg);
    Outcome { sent, result }
}

/// One asynchronous request: fire it, then wait for whichever comes first of
/// its completion and the context.
async fn dispatch_one<T>(transport: &T, ctx: &Context, req: EchoRequest) -> Outcome
where
    T: Transport,
{
    let sent = req.msg.clone();
    let call = transport.go(ctx, req);

    let result = tokio::select! {
        biased;
        done = ctx.done_reason() => {
            call.abandon();
            Err(Error::from(done))
        }
        settled = call.wait() => match settled {
            Settled::Ready(res) => res.map(|resp| resp.msg),
            Settled::Abandoned => Err(Error::Cancelled),
            Settled::Broken => Err(Error::Internal {
                context: "call dropped before completion".to_string(),
            }),
        },
    };

    Outcome { sent, result }
}
