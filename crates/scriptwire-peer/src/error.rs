use scriptwire_schema::TypeId;

/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] scriptwire_transport::TransportError),

    /// Primitive codec error outside any record.
    #[error("wire error: {0}")]
    Wire(#[from] scriptwire_wire::WireError),

    /// Schema construction, encoding or decoding error.
    #[error("schema error: {0}")]
    Schema(#[from] scriptwire_schema::SchemaError),

    /// No id arrived for a registration before its deadline.
    #[error("registration of `{signature}` timed out")]
    RegistrationTimeout { signature: String },

    /// A chunk was never confirmed.
    #[error("chunk {order} of request {request_id} unconfirmed after {attempts} attempts")]
    SendRetriesExhausted {
        request_id: String,
        order: usize,
        attempts: u32,
    },

    /// A packet needs more chunks than allowed.
    #[error("packet needs {chunks} chunks, limit is {max}")]
    MaxPacketSizeExceeded { chunks: usize, max: usize },

    /// No schema is bound to the id on this peer.
    #[error("unknown type id {0}")]
    UnknownType(TypeId),

    /// The id belongs to a plain type, not a packet.
    #[error("type id {0} is not a packet")]
    NotAPacket(TypeId),

    /// The id counter reached the end of its range.
    #[error("type id space exhausted ({max} ids)")]
    IdSpaceExhausted { max: u64 },

    /// An inbound packet id could not be parsed.
    #[error("malformed packet header: {0}")]
    MalformedHeader(String),
}

pub type Result<T> = std::result::Result<T, PeerError>;
