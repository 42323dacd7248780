//! Transport boundary for scriptwire.
//!
//! The host delivers short, size-limited string messages to every peer in
//! the group, the sender included. This crate defines that boundary:
//! - [`TransportMessage`]: an event id plus a string body
//! - [`Transport`]: the send/receive primitive a host must provide
//! - [`quote_argument`]/[`unquote_argument`]: escaping for command-like hosts
//! - [`LoopbackBus`]: an in-process broadcast bus for tests and simulation
//!
//! This is the lowest layer of scriptwire. Everything else builds on top of
//! the [`Transport`] trait provided here.

pub mod error;
pub mod loopback;
pub mod traits;

pub use error::{Result, TransportError};
pub use loopback::{LoopbackBus, LoopbackEndpoint};
pub use traits::{quote_argument, unquote_argument, Transport, TransportMessage};
