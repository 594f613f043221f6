#![doc = include_str!("../README.md")]

pub mod context;
pub mod dispatch;
pub mod error;
pub mod promise;
pub mod proto;
pub mod service;
pub mod transport;

pub use context::{Context, Done};
pub use dispatch::{Dispatcher, Mode, Outcome, Summary};
pub use error::{Error, ErrorKind, Result};
pub use promise::{Promise, Resolver, Settled};
pub use service::{DeadlineEcho, Echo, Handler};
pub use transport::{Call, Loopback, Transport};
