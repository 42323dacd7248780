//! Peer protocol over a broadcast string transport.
//!
//! Peers sharing one [`Transport`](scriptwire_transport::Transport) agree
//! on numeric ids for schemas, wait for each other at startup, and send
//! packets that may be split into chunks and confirmed one at a time.
//!
//! - [`Peer`]: owns the transport and all protocol state; driven by [`Peer::tick`]
//! - [`Registry`]: signature to id assignment and the startup barrier
//! - [`Outbox`] and [`Reassembler`]: chunked sending and receiving
//! - [`TickDriver`]: tokio interval driver (feature `async`)

pub mod channel;
pub mod config;
#[cfg(feature = "async")]
pub mod driver;
pub mod error;
pub mod fragment;
pub mod header;
pub mod peer;
pub mod registry;

pub use channel::{split_payload, Outbox, PacketChannel, SendReport, SendTicket};
pub use config::PeerConfig;
#[cfg(feature = "async")]
pub use driver::TickDriver;
pub use error::{PeerError, Result};
pub use fragment::{FragmentBuffer, Reassembler};
pub use header::{
    Fragment, PacketHeader, RequestId, PACKET_NAMESPACE, REGISTRY_LOADED, REGISTRY_NAMESPACE,
    REGISTRY_REGISTER,
};
pub use peer::Peer;
pub use registry::{Registration, RegistrationKind, Registry, Ticket};
