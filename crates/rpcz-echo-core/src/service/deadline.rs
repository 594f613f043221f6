//! Deadline-guarded echo handler.
//!
//! [`DeadlineEcho`] wraps a base [`Handler`] and enforces a hard ceiling on
//! the wall-clock time of every call, including the artificial delay a
//! request may ask for. The ceiling composes with the caller's own deadline
//! by taking the earlier of the two.
//!
//! ## Per-call state machine
//!
//! 1. **Start**: derive a bounded context from the caller's context and the
//!    ceiling, and reject invalid requests up front.
//! 2. **Delay-wait**: if the request asks for a delay, race it against the
//!    bounded context.
//! 3. **Execute**: run the base handler in a detached task and race its
//!    completion against the bounded context. When the context wins, the task
//!    is abandoned: it keeps running to completion and its result is dropped.
//! 4. **Teardown**: the bounded context is cancelled on every exit path, which
//!    also tells an abandoned base handler that nobody is waiting any more.

use super::{Echo, Handler};
use crate::{
    context::{Context, Done},
    error::{Error, Result},
    proto::{EchoRequest, EchoResponse},
};
use core::time::Duration;
use std::sync::Arc;
use tokio::time::{self, Instant};

/// Ceiling used when the configured timeout is zero.
pub const DEFAULT_ECHO_TIMEOUT: Duration = Duration::from_secs(30);

/// Replies with the message it receives, after the requested delay, but never
/// later than its configured timeout.
pub struct DeadlineEcho<H = Echo> {
    inner: Arc<H>,
    timeout: Duration,
}

impl DeadlineEcho<Echo> {
    pub fn new(timeout: Duration) -> Self {
        Self::wrap(Echo::new(), timeout)
    }
}

impl<H: Handler> DeadlineEcho<H> {
    /// Guards `inner` with `timeout`, or [`DEFAULT_ECHO_TIMEOUT`] if zero.
    pub fn wrap(inner: H, timeout: Duration) -> Self {
        let timeout = if timeout.is_zero() {
            DEFAULT_ECHO_TIMEOUT
        } else {
            timeout
        };

        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Maps the bounded context's expiry to an error by origin.
    fn expired(&self, caller: &Context, ceiling: Instant, done: Done) -> Error {
        match done {
            Done::Cancelled => Error::Cancelled,
            Done::DeadlineExceeded => match caller.deadline() {
                Some(at) if at < ceiling => Error::DeadlineExceeded,
                _ => Error::Timeout {
                    limit: self.timeout,
                },
            },
        }
    }
}

impl<H: Handler> Handler for DeadlineEcho<H> {
    fn validate(&self, req: &EchoRequest) -> Result<()> {
        self.inner.validate(req)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(delay_ms = req.delay_ms))]
    async fn echo(&self, ctx: Context, req: EchoRequest) -> Result<EchoResponse> {
        let ceiling = Instant::now() + self.timeout;
        let bounded = ctx.with_deadline(ceiling);
        let _teardown = bounded.drop_guard();

        self.validate(&req)?;

        if let Some(delay) = req.delay() {
            tokio::select! {
                biased;
                done = bounded.done_reason() => {
                    let err = self.expired(&ctx, ceiling, done);
                    tracing::debug!("Expired during delay: {err}");
                    return Err(err);
                }
                () = time::sleep(delay) => {}
            }
        }

        let inner = Arc::clone(&self.inner);
        let exec_ctx = bounded.clone();
        let mut exec = tokio::spawn(async move { inner.echo(exec_ctx, req).await });

        tokio::select! {
            biased;
            done = bounded.done_reason() => {
                let err = self.expired(&ctx, ceiling, done);
                tracing::debug!("Abandoning base handler: {err}");
                Err(err)
            }
            joined = &mut exec => match joined {
                Ok(res) => res,
                Err(e) => Err(Error::Internal {
                    context: format!("echo handler failed: {e}"),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use core::sync::atomic::{AtomicBool, Ordering};

    const CEILING: Duration = Duration::from_millis(500);

    fn delayed(msg: &str, delay: Duration) -> EchoRequest {
        EchoRequest::new(msg).with_delay(delay)
    }

    fn assert_near(elapsed: Duration, expected: Duration) {
        assert!(elapsed >= expected, "{elapsed:?} < {expected:?}");
        assert!(
            elapsed < expected + Duration::from_millis(10),
            "{elapsed:?} too late for {expected:?}"
        );
    }

    /// Base handler that ignores its context and flags when it finishes.
    struct Stubborn {
        takes: Duration,
        finished: Arc<AtomicBool>,
    }

    impl Handler for Stubborn {
        async fn echo(&self, _ctx: Context, req: EchoRequest) -> Result<EchoResponse> {
            time::sleep(self.takes).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(EchoResponse { msg: req.msg })
        }
    }

    /// Base handler that waits for its context and flags that it saw it end.
    struct Cooperative {
        observed: Arc<AtomicBool>,
    }

    impl Handler for Cooperative {
        async fn echo(&self, ctx: Context, _req: EchoRequest) -> Result<EchoResponse> {
            ctx.done().await;
            self.observed.store(true, Ordering::SeqCst);
            Err(Error::Cancelled)
        }
    }

    struct Panicking;

    impl Handler for Panicking {
        async fn echo(&self, _ctx: Context, _req: EchoRequest) -> Result<EchoResponse> {
            panic!("boom")
        }
    }

    #[test]
    fn zero_timeout_uses_default() {
        assert_eq!(
            DeadlineEcho::new(Duration::ZERO).timeout(),
            DEFAULT_ECHO_TIMEOUT
        );
        assert_eq!(DeadlineEcho::new(CEILING).timeout(), CEILING);
    }

    #[tokio::test(start_paused = true)]
    async fn short_delay_echoes_after_delay() {
        let svc = DeadlineEcho::new(CEILING);
        let start = Instant::now();

        let resp = svc
            .echo(Context::background(), delayed("3", Duration::from_millis(200)))
            .await
            .unwrap();

        assert_eq!(resp.msg, "3");
        assert_near(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn long_delay_times_out_at_ceiling() {
        let svc = DeadlineEcho::new(CEILING);

        for delay in [CEILING, CEILING * 2, Duration::from_secs(60)] {
            let start = Instant::now();
            let err = svc
                .echo(Context::background(), delayed("x", delay))
                .await
                .unwrap_err();

            assert_eq!(err, Error::Timeout { limit: CEILING });
            assert_near(start.elapsed(), CEILING);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn tighter_caller_deadline_wins() {
        let svc = DeadlineEcho::new(CEILING);
        let ctx = Context::background().with_timeout(Duration::from_millis(100));
        let start = Instant::now();

        let err = svc
            .echo(ctx, delayed("x", Duration::from_secs(5)))
            .await
            .unwrap_err();

        assert_eq!(err, Error::DeadlineExceeded);
        assert_eq!(err.kind(), ErrorKind::Cancellation);
        assert_near(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn looser_caller_deadline_does_not_extend_ceiling() {
        let svc = DeadlineEcho::new(CEILING);
        let ctx = Context::background().with_timeout(Duration::from_secs(30));
        let start = Instant::now();

        let err = svc
            .echo(ctx, delayed("x", Duration::from_secs(5)))
            .await
            .unwrap_err();

        assert_eq!(err, Error::Timeout { limit: CEILING });
        assert_near(start.elapsed(), CEILING);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_delay_yields_one_cancellation() {
        let svc = Arc::new(DeadlineEcho::new(CEILING));
        let ctx = Context::background().child();

        let call = {
            let svc = Arc::clone(&svc);
            let ctx = ctx.clone();
            tokio::spawn(async move {
                svc.echo(ctx, delayed("x", Duration::from_millis(300)))
                    .await
            })
        };

        time::sleep(Duration::from_millis(50)).await;
        ctx.cancel();

        assert_eq!(call.await.unwrap(), Err(Error::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_context_yields_cancellation() {
        let svc = DeadlineEcho::new(CEILING);
        let ctx = Context::background().child();
        ctx.cancel();

        let res = svc.echo(ctx, EchoRequest::new("x")).await;
        assert_eq!(res, Err(Error::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_base_handler_is_abandoned_not_stopped() {
        let finished = Arc::new(AtomicBool::new(false));
        let svc = DeadlineEcho::wrap(
            Stubborn {
                takes: Duration::from_secs(2),
                finished: Arc::clone(&finished),
            },
            CEILING,
        );
        let start = Instant::now();

        let err = svc
            .echo(Context::background(), EchoRequest::new("x"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::Timeout { limit: CEILING });
        assert_near(start.elapsed(), CEILING);
        assert!(!finished.load(Ordering::SeqCst));

        // The detached execution runs to completion on its own.
        time::sleep(Duration::from_secs(3)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_handler_sees_its_context_end() {
        let observed = Arc::new(AtomicBool::new(false));
        let svc = DeadlineEcho::wrap(
            Cooperative {
                observed: Arc::clone(&observed),
            },
            CEILING,
        );

        let err = svc
            .echo(Context::background(), EchoRequest::new("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        time::sleep(Duration::from_millis(10)).await;
        assert!(observed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_payload_is_rejected_regardless_of_timing() {
        let svc = DeadlineEcho::new(CEILING);
        let expected = Error::invalid("msg", "must not be empty");

        for delay in [Duration::ZERO, Duration::from_millis(100), CEILING * 4] {
            let start = Instant::now();
            let err = svc
                .echo(Context::background(), delayed("", delay))
                .await
                .unwrap_err();
            assert_eq!(err, expected);
            assert_eq!(start.elapsed(), Duration::ZERO);
        }

        let expired = Context::background().child();
        expired.cancel();
        let err = svc.echo(expired, EchoRequest::new("")).await.unwrap_err();
        assert_eq!(err, expected);
    }

    #[tokio::test]
    async fn panicking_base_handler_is_internal() {
        let svc = DeadlineEcho::wrap(Panicking, CEILING);
        let err = svc
            .echo(Context::background(), EchoRequest::new("x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
