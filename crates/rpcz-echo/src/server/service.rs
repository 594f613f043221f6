//! gRPC adapter that exposes a [`Handler`] as the generated `echo.Echo`
//! service.
//!
//! Each incoming call gets its own [`Context`], derived from the service's
//! root context:
//!
//! - the `grpc-timeout` header, when present, becomes the caller's deadline;
//! - the context is cancelled when the call's future is dropped, which is what
//!   tonic does when the client disconnects;
//! - cancelling the root context (on shutdown) cancels every in-flight call.

use crate::telemetry::{InflightGuard, increment_requests, record_call_duration, record_error};
use core::time::Duration;
use rpcz_echo_core::{
    Context, Error, Handler,
    proto::{EchoRequest, EchoResponse, echo_server},
};
use std::sync::Arc;
use tokio::time::Instant;
use tonic::{Request, Response, Status, metadata::MetadataMap};

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

pub struct EchoService<H> {
    handler: Arc<H>,
    root: Context,
}

impl<H> Clone for EchoService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            root: self.root.clone(),
        }
    }
}

impl<H: Handler> EchoService<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            root: Context::background(),
        }
    }

    /// Cancels every in-flight call and refuses new ones with
    /// [`Error::ServiceShutdown`].
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.root.is_cancelled()
    }

    fn request_context(&self, metadata: &MetadataMap) -> Context {
        match grpc_timeout(metadata) {
            Some(timeout) => self.root.with_timeout(timeout),
            None => self.root.child(),
        }
    }
}

#[tonic::async_trait]
impl<H: Handler> echo_server::Echo for EchoService<H> {
    #[tracing::instrument(skip_all, fields(delay_ms = request.get_ref().delay_ms))]
    async fn echo(&self, request: Request<EchoRequest>) -> Result<Response<EchoResponse>, Status> {
        increment_requests();

        if self.is_shutdown() {
            record_error(Error::ServiceShutdown.kind());
            return Err(Error::ServiceShutdown.into());
        }

        let ctx = self.request_context(request.metadata());
        let _disconnect = ctx.drop_guard();
        let _inflight = InflightGuard::enter();
        let start = Instant::now();

        let res = self.handler.echo(ctx, request.into_inner()).await;
        record_call_duration(start.elapsed().as_secs_f64() * 1000.0);

        match res {
            Ok(resp) => Ok(Response::new(resp)),
            Err(e) => {
                record_error(e.kind());
                tracing::debug!(kind = e.kind().as_str(), "Echo failed: {e}");
                Err(e.into())
            }
        }
    }
}

fn grpc_timeout(metadata: &MetadataMap) -> Option<Duration> {
    let raw = metadata.get(GRPC_TIMEOUT_HEADER)?.to_str().ok()?;
    let timeout = parse_grpc_timeout(raw);
    if timeout.is_none() {
        tracing::debug!("Ignoring malformed {GRPC_TIMEOUT_HEADER} header: {raw:?}");
    }
    timeout
}

/// Parses a `grpc-timeout` value: at most 8 ASCII digits followed by one of
/// the units `H`, `M`, `S`, `m`, `u` or `n`.
pub fn parse_grpc_timeout(raw: &str) -> Option<Duration> {
    if !raw.is_ascii() || raw.len() < 2 {
        return None;
    }

    let (digits, unit) = raw.split_at(raw.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u64 = digits.parse().ok()?;

    let timeout = match unit {
        "H" => Duration::from_secs(value * 60 * 60),
        "M" => Duration::from_secs(value * 60),
        "S" => Duration::from_secs(value),
        "m" => Duration::from_millis(value),
        "u" => Duration::from_micros(value),
        "n" => Duration::from_nanos(value),
        _ => return None,
    };
    Some(timeout)
}
