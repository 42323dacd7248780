//! Message ids used on the transport.
//!
//! Packet chunks travel as `packet:<packetId>-<requestId>` when the packet
//! fits one message and `packet:<packetId>-<requestId>-<order>.<count>`
//! otherwise. `packetId` is the four-character rendering of the packet's
//! [`TypeId`]; `requestId` is twelve random ID-charset characters. Both may
//! contain `-` and `.`, so the header is split by character position.

use std::fmt;

use rand::Rng;
use scriptwire_schema::TypeId;
use scriptwire_wire::ID_CHARSET;

use crate::error::{PeerError, Result};

/// Registration request; the body is a canonical signature.
pub const REGISTRY_REGISTER: &str = "registry:register";
/// Startup liveness announcement; empty body.
pub const REGISTRY_LOADED: &str = "registry:loaded";
/// Namespace of registry messages.
pub const REGISTRY_NAMESPACE: &str = "registry";
/// Namespace of packet chunks.
pub const PACKET_NAMESPACE: &str = "packet";

const PACKET_PREFIX: &str = "packet:";

/// Random identifier shared by all chunks of one send.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Width in ID-charset characters.
    pub const LEN: usize = 12;

    /// Draw a fresh id.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; Self::LEN];
        rng.fill(&mut bytes[..]);
        RequestId(ID_CHARSET.encode(&bytes))
    }

    /// Validate an id taken from the wire.
    pub fn parse(text: &str) -> Option<Self> {
        let valid = text.chars().count() == Self::LEN && text.chars().all(|c| ID_CHARSET.contains(c));
        valid.then(|| RequestId(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a chunk within a multi-chunk send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    /// Chunk order; the first chunk of the payload carries `count - 1`.
    pub order: usize,
    /// Total chunks of the send.
    pub count: usize,
}

/// Parsed id of a packet chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet: TypeId,
    pub request_id: RequestId,
    pub fragment: Option<Fragment>,
}

impl PacketHeader {
    /// Render as a transport message id.
    pub fn to_message_id(&self) -> String {
        let mut id = format!(
            "{PACKET_PREFIX}{}-{}",
            self.packet.to_wire(),
            self.request_id
        );
        if let Some(fragment) = self.fragment {
            id.push_str(&format!("-{}.{}", fragment.order, fragment.count));
        }
        id
    }

    /// Parse a transport message id.
    pub fn parse(id: &str) -> Result<Self> {
        let malformed = || PeerError::MalformedHeader(id.to_string());

        let rest = id.strip_prefix(PACKET_PREFIX).ok_or_else(malformed)?;
        let (packet, rest) = split_chars(rest, TypeId::WIRE_LEN).ok_or_else(malformed)?;
        let packet = TypeId::from_wire(packet).ok_or_else(malformed)?;
        let rest = rest.strip_prefix('-').ok_or_else(malformed)?;
        let (request_id, rest) = split_chars(rest, RequestId::LEN).ok_or_else(malformed)?;
        let request_id = RequestId::parse(request_id).ok_or_else(malformed)?;

        let fragment = if rest.is_empty() {
            None
        } else {
            let (order, count) = rest
                .strip_prefix('-')
                .and_then(|f| f.split_once('.'))
                .ok_or_else(malformed)?;
            let order: usize = order.parse().map_err(|_| malformed())?;
            let count: usize = count.parse().map_err(|_| malformed())?;
            if count < 2 || order >= count {
                return Err(malformed());
            }
            Some(Fragment { order, count })
        };

        Ok(Self {
            packet,
            request_id,
            fragment,
        })
    }
}

fn split_chars(text: &str, n: usize) -> Option<(&str, &str)> {
    let end = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .nth(n)?;
    Some(text.split_at(end))
}
