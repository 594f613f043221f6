//! The call primitives the dispatcher is written against.
//!
//! [`Transport`] is the black-box RPC collaborator: a synchronous
//! [`Transport::call`] and an asynchronous [`Transport::go`] that returns a
//! [`Call`] handle immediately. Two implementations ship with the crate:
//!
//! - [`Loopback`], which invokes a registered [`Handler`] in-process.
//! - [`EchoClient<Channel>`], the generated gRPC client.

use crate::{
    context::Context,
    error::{Error, Result},
    promise::Promise,
    proto::{EchoRequest, EchoResponse, echo_client::EchoClient},
    service::Handler,
};
use core::future::Future;
use std::sync::Arc;
use tonic::transport::Channel;

/// Completion handle of an asynchronous call.
pub type Call = Promise<Result<EchoResponse>>;

pub trait Transport: Clone + Send + Sync + 'static {
    /// Performs one echo call and waits for its result.
    ///
    /// Implementations honor `ctx`: once it is done the call returns
    /// [`Error::Cancelled`] or [`Error::DeadlineExceeded`].
    fn call(
        &self,
        ctx: &Context,
        req: EchoRequest,
    ) -> impl Future<Output = Result<EchoResponse>> + Send;

    /// Fires one echo call in a detached task and returns its completion
    /// handle right away.
    ///
    /// Abandoning the handle does not stop the call; its result is dropped.
    fn go(&self, ctx: &Context, req: EchoRequest) -> Call {
        let (resolver, call) = Call::pending();
        let transport = self.clone();
        let ctx = ctx.clone();

        tokio::spawn(async move {
            let res = transport.call(&ctx, req).await;
            if let Err(_discarded) = resolver.resolve(res) {
                tracing::trace!("Call abandoned before completion, result discarded");
            }
        });

        call
    }
}

/// In-process transport that hands requests straight to a [`Handler`].
pub struct Loopback<H> {
    handler: Arc<H>,
}

impl<H> Clone for Loopback<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<H: Handler> Loopback<H> {
    /// Registers `handler` as the service behind this transport.
    pub fn register(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl<H: Handler> Transport for Loopback<H> {
    fn call(
        &self,
        ctx: &Context,
        req: EchoRequest,
    ) -> impl Future<Output = Result<EchoResponse>> + Send {
        let handler = Arc::clone(&self.handler);
        // The "server" side gets its own derived context, as it would after a
        // network hop.
        let server_ctx = ctx.child();
        let ctx = ctx.clone();

        async move { ctx.run(handler.echo(server_ctx, req)).await? }
    }
}

impl Transport for EchoClient<Channel> {
    fn call(
        &self,
        ctx: &Context,
        req: EchoRequest,
    ) -> impl Future<Output = Result<EchoResponse>> + Send {
        let mut client = self.clone();
        let ctx = ctx.clone();

        async move {
            let mut request = tonic::Request::new(req);
            if let Some(remaining) = ctx.remaining() {
                request.set_timeout(remaining);
            }

            match ctx.run(client.echo(request)).await? {
                Ok(resp) => Ok(resp.into_inner()),
                Err(status) => Err(Error::from(status)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{promise::Settled, service::Echo};
    use core::time::Duration;
    use tokio::time::Instant;

    /// Handler that sleeps before echoing and ignores its context.
    struct Slow(Duration);

    impl Handler for Slow {
        async fn echo(&self, _ctx: Context, req: EchoRequest) -> Result<EchoResponse> {
            tokio::time::sleep(self.0).await;
            Ok(EchoResponse { msg: req.msg })
        }
    }

    #[tokio::test]
    async fn loopback_call_echoes() {
        let transport = Loopback::register(Echo::new());
        let resp = transport
            .call(&Context::background(), EchoRequest::new("hello"))
            .await
            .unwrap();
        assert_eq!(resp.msg, "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn call_honors_caller_deadline() {
        let transport = Loopback::register(Slow(Duration::from_secs(10)));
        let ctx = Context::background().with_timeout(Duration::from_millis(100));

        let res = transport.call(&ctx, EchoRequest::new("x")).await;
        assert_eq!(res, Err(Error::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn go_returns_before_completion() {
        let transport = Loopback::register(Slow(Duration::from_secs(1)));
        let start = Instant::now();

        let call = transport.go(&Context::background(), EchoRequest::new("7"));
        assert!(!call.is_settled());
        assert_eq!(start.elapsed(), Duration::ZERO);

        let settled = call.wait().await;
        assert_eq!(
            settled,
            Settled::Ready(Ok(EchoResponse { msg: "7".into() }))
        );
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_call_still_runs() {
        let transport = Loopback::register(Slow(Duration::from_millis(200)));
        let call = transport.go(&Context::background(), EchoRequest::new("a"));

        assert!(call.abandon());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(call.peek(), Some(Settled::Abandoned));
    }
}
