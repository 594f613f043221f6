//! Server-side echo handlers.
//!
//! ## Structure
//!
//! - [`echo`] - the base handler (`Echo`), validation included.
//! - [`deadline`] - the deadline-guarded wrapper (`DeadlineEcho`).

pub mod deadline;
pub mod echo;

pub use deadline::DeadlineEcho;
pub use echo::Echo;

use crate::{
    context::Context,
    error::Result,
    proto::{EchoRequest, EchoResponse},
};
use core::future::Future;

/// A service object answering echo calls.
///
/// `ctx` is the request's context: it is cancelled when the caller goes away
/// and carries the caller's deadline, if any.
pub trait Handler: Send + Sync + 'static {
    /// Rejects requests that can never succeed, independently of timing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidRequest`] naming the offending field.
    fn validate(&self, _req: &EchoRequest) -> Result<()> {
        Ok(())
    }

    fn echo(
        &self,
        ctx: Context,
        req: EchoRequest,
    ) -> impl Future<Output = Result<EchoResponse>> + Send;
}
