use std::fmt;

use scriptwire_peer::PeerError;
use scriptwire_schema::SchemaError;
use scriptwire_wire::WireError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn wire_error(context: &str, err: WireError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn schema_error(context: &str, err: SchemaError) -> CliError {
    match err {
        SchemaError::LoadFailed(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Schema(err) => schema_error(context, err),
        PeerError::Wire(err) => wire_error(context, err),
        PeerError::RegistrationTimeout { .. } | PeerError::SendRetriesExhausted { .. } => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        PeerError::MaxPacketSizeExceeded { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        PeerError::IdSpaceExhausted { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_exit_codes() {
        let timeout = PeerError::RegistrationTimeout {
            signature: "Pos ".to_string(),
        };
        assert_eq!(peer_error("register", timeout).code, TIMEOUT);

        let load = SchemaError::LoadFailed("missing".to_string());
        assert_eq!(peer_error("load", PeerError::Schema(load)).code, FAILURE);

        let reference = SchemaError::InvalidTypeReference("Nope".to_string());
        assert_eq!(schema_error("load", reference).code, DATA_INVALID);

        let eof = WireError::UnexpectedEof {
            offset: 0,
            needed: 4,
            available: 1,
        };
        let err = peer_error("decode", PeerError::Wire(eof));
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("decode: "));
    }
}
