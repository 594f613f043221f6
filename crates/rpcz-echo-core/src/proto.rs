//! Wire messages and generated gRPC bindings for the `echo.Echo` service.
//!
//! The messages are declared directly with `prost` derives; the service
//! client (`echo_client::EchoClient`) and server (`echo_server::EchoServer`,
//! `echo_server::Echo`) are generated by the build script.

use core::time::Duration;

/// A request to echo `msg` back, optionally after waiting `delay_ms`.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct EchoRequest {
    #[prost(string, tag = "1")]
    pub msg: String,
    /// Artificial server-side delay in milliseconds. Zero disables it.
    #[prost(uint64, tag = "2")]
    pub delay_ms: u64,
}

impl EchoRequest {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            delay_ms: 0,
        }
    }

    /// Sets the requested delay, saturating at `u64::MAX` milliseconds.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// The requested delay, or `None` when the request asks for none.
    pub fn delay(&self) -> Option<Duration> {
        (self.delay_ms > 0).then(|| Duration::from_millis(self.delay_ms))
    }
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct EchoResponse {
    #[prost(string, tag = "1")]
    pub msg: String,
}

include!(concat!(env!("OUT_DIR"), "/echo.Echo.rs"));
