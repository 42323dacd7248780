/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The message body exceeds what the host accepts in one message.
    #[error("message too long ({len} chars, max {max})")]
    MessageTooLong { len: usize, max: usize },

    /// The host refused to deliver the message.
    #[error("message rejected by host: {0}")]
    Rejected(String),

    /// A quoted argument was not terminated or had a dangling escape.
    #[error("malformed quoted argument: {0}")]
    MalformedQuoting(String),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
