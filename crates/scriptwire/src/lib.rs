//! Compact binary packets over string-only host transports.
//!
//! scriptwire encodes typed records into a dense binary form, carries the
//! bytes as strings through a host that only forwards text, and lets a
//! group of peers agree on numeric ids for every declared type.
//!
//! # Crate Structure
//!
//! - [`transport`]: the string transport boundary and an in-process loopback bus
//! - [`wire`]: varints, charsets and per-primitive codecs
//! - [`schema`]: schemas, records, the schema codec and JSON declarations
//! - [`peer`]: type registry, startup barrier and packet channels (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use scriptwire_transport::*;
}

/// Re-export wire codec types.
pub mod wire {
    pub use scriptwire_wire::*;
}

/// Re-export schema types.
pub mod schema {
    pub use scriptwire_schema::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use scriptwire_peer::*;
}
