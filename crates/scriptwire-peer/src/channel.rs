//! Packet channels: encode, split, send with confirmation, and dispatch.
//!
//! A send is a sequence of chunks sent one after the other. The transport
//! echoes every message back to its sender, and that echo is the delivery
//! confirmation for the chunk. A chunk whose echo does not arrive within
//! `confirmation_timeout_ticks` is resent, up to `max_send_attempts` times.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use scriptwire_schema::{Record, Schema, TypeId};
use scriptwire_transport::{quote_argument, Transport, TransportMessage};
use scriptwire_wire::DATA_CHARSET;

use crate::config::PeerConfig;
use crate::error::{PeerError, Result};
use crate::header::{Fragment, PacketHeader, RequestId};

type Listener = Box<dyn FnMut(&Record) + Send>;

/// A registered packet schema with its listeners.
pub struct PacketChannel {
    id: TypeId,
    schema: Arc<Schema>,
    listeners: Vec<Listener>,
}

impl PacketChannel {
    pub fn new(id: TypeId, schema: Arc<Schema>) -> Self {
        Self {
            id,
            schema,
            listeners: Vec::new(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Append a listener. Listeners run in registration order.
    pub fn listen<F>(&mut self, listener: F)
    where
        F: FnMut(&Record) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Encode `record` and split it into chunk messages in send order.
    pub fn prepare(
        &self,
        record: &Record,
        request_id: &RequestId,
        config: &PeerConfig,
    ) -> Result<Vec<TransportMessage>> {
        let bytes = self
            .schema
            .encode_with_capacity(record, config.default_encode_buffer_size)?;
        split_payload(self.id, request_id, &bytes, config)
    }

    /// Decode a complete payload and hand it to every listener.
    pub fn dispatch(&mut self, payload: &str) -> Result<Record> {
        let bytes = Bytes::from(DATA_CHARSET.decode(payload)?);
        let (record, _) = self.schema.decode(&bytes, 0)?;
        tracing::debug!(
            packet = %self.schema.name(),
            listeners = self.listeners.len(),
            "dispatching packet"
        );
        for listener in &mut self.listeners {
            listener(&record);
        }
        Ok(record)
    }
}

impl fmt::Debug for PacketChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketChannel")
            .field("id", &self.id)
            .field("schema", &self.schema.name())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Quotes around every chunk body.
const QUOTE_OVERHEAD: usize = 2;

/// Width of the widest quoted character.
const MAX_QUOTED_WIDTH: usize = 2;

fn quoted_width(ch: char) -> usize {
    match ch {
        '"' | '\\' => 2,
        _ => 1,
    }
}

/// Split an encoded payload into chunk messages (at least one). The first
/// chunk carries the highest order.
///
/// Chunks are cut so that every quoted body, quotes and escapes included,
/// stays within `max_message_size` characters. A payload without escaped
/// characters splits into `ceil(len / (max_message_size - 2))` chunks.
/// Limits below 4 are treated as 4.
pub fn split_payload(
    packet: TypeId,
    request_id: &RequestId,
    bytes: &[u8],
    config: &PeerConfig,
) -> Result<Vec<TransportMessage>> {
    let budget = config
        .max_message_size
        .saturating_sub(QUOTE_OVERHEAD)
        .max(MAX_QUOTED_WIDTH);
    let fewest = bytes.len().div_ceil(budget);
    if fewest > config.max_fragments {
        return Err(PeerError::MaxPacketSizeExceeded {
            chunks: fewest,
            max: config.max_fragments,
        });
    }

    let mut bodies = Vec::with_capacity(fewest.max(1));
    let mut body = String::with_capacity(budget);
    let mut width = 0;
    for ch in DATA_CHARSET.encode(bytes).chars() {
        let w = quoted_width(ch);
        if width + w > budget {
            bodies.push(quote_argument(&body));
            body.clear();
            width = 0;
        }
        body.push(ch);
        width += w;
    }
    if !body.is_empty() || bodies.is_empty() {
        bodies.push(quote_argument(&body));
    }

    let count = bodies.len();
    if count > config.max_fragments {
        return Err(PeerError::MaxPacketSizeExceeded {
            chunks: count,
            max: config.max_fragments,
        });
    }

    let messages = bodies
        .into_iter()
        .enumerate()
        .map(|(i, body)| {
            let header = PacketHeader {
                packet,
                request_id: request_id.clone(),
                fragment: (count > 1).then_some(Fragment {
                    order: count - 1 - i,
                    count,
                }),
            };
            TransportMessage::new(header.to_message_id(), body)
        })
        .collect();
    Ok(messages)
}

/// Handle for the outcome of one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SendTicket(pub(crate) u64);

/// Summary of a confirmed send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub request_id: RequestId,
    pub chunks: usize,
    /// Transport sends used, resends included.
    pub attempts: u32,
}

#[derive(Debug)]
struct OutboundSend {
    ticket: SendTicket,
    request_id: RequestId,
    current: TransportMessage,
    remaining: VecDeque<TransportMessage>,
    chunk_index: usize,
    chunks: usize,
    attempts: u32,
    total_attempts: u32,
    deadline: u64,
}

/// In-flight sends and their outcomes.
#[derive(Debug, Default)]
pub struct Outbox {
    sends: Vec<OutboundSend>,
    outcomes: HashMap<SendTicket, Result<SendReport>>,
    finished: HashMap<RequestId, u64>,
    next_ticket: u64,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send the first chunk and track the rest.
    pub fn start<T: Transport + ?Sized>(
        &mut self,
        request_id: RequestId,
        messages: Vec<TransportMessage>,
        config: &PeerConfig,
        now: u64,
        transport: &mut T,
    ) -> SendTicket {
        let ticket = SendTicket(self.next_ticket);
        self.next_ticket += 1;

        let chunks = messages.len();
        let mut remaining: VecDeque<TransportMessage> = messages.into();
        let Some(current) = remaining.pop_front() else {
            self.finish(ticket, request_id, Ok(0), 0, now);
            return ticket;
        };

        tracing::debug!(%request_id, chunks, "starting packet send");
        let mut send = OutboundSend {
            ticket,
            request_id,
            current,
            remaining,
            chunk_index: 0,
            chunks,
            attempts: 0,
            total_attempts: 0,
            deadline: now,
        };
        match transmit(&mut send, config, now, transport) {
            Ok(()) => self.sends.push(send),
            Err(err) => self.finish(ticket, send.request_id, Err(err), send.total_attempts, now),
        }
        ticket
    }

    /// Handle a packet message with one of our request ids.
    ///
    /// Returns `true` if the message was our own echo (and so must not be
    /// dispatched). An echo of the chunk awaiting confirmation advances that
    /// send to its next chunk.
    pub fn confirm<T: Transport + ?Sized>(
        &mut self,
        message_id: &str,
        request_id: &RequestId,
        config: &PeerConfig,
        now: u64,
        transport: &mut T,
    ) -> bool {
        if self.finished.contains_key(request_id) {
            return true;
        }
        let Some(index) = self.sends.iter().position(|s| &s.request_id == request_id) else {
            return false;
        };

        let send = &mut self.sends[index];
        if send.current.id != message_id {
            tracing::trace!(%request_id, "stale echo ignored");
            return true;
        }
        tracing::trace!(%request_id, chunk = send.chunk_index, "chunk confirmed");

        let Some(next) = send.remaining.pop_front() else {
            let send = self.sends.remove(index);
            tracing::debug!(request_id = %send.request_id, chunks = send.chunks, "packet send confirmed");
            self.finish(send.ticket, send.request_id, Ok(send.chunks), send.total_attempts, now);
            return true;
        };

        send.current = next;
        send.chunk_index += 1;
        send.attempts = 0;
        if let Err(err) = transmit(send, config, now, transport) {
            let send = self.sends.remove(index);
            self.finish(send.ticket, send.request_id, Err(err), send.total_attempts, now);
        }
        true
    }

    /// Resend overdue chunks and fail sends that ran out of attempts.
    pub fn poll<T: Transport + ?Sized>(&mut self, config: &PeerConfig, now: u64, transport: &mut T) {
        let mut index = 0;
        while index < self.sends.len() {
            let send = &mut self.sends[index];
            if now < send.deadline {
                index += 1;
                continue;
            }

            let result = if send.attempts >= config.max_send_attempts {
                let order = send.chunks - 1 - send.chunk_index;
                tracing::warn!(
                    request_id = %send.request_id,
                    order,
                    attempts = send.attempts,
                    "chunk never confirmed, aborting send"
                );
                Err(PeerError::SendRetriesExhausted {
                    request_id: send.request_id.to_string(),
                    order,
                    attempts: send.attempts,
                })
            } else {
                tracing::warn!(
                    request_id = %send.request_id,
                    attempt = send.attempts + 1,
                    "resending unconfirmed chunk"
                );
                transmit(send, config, now, transport)
            };

            match result {
                Ok(()) => index += 1,
                Err(err) => {
                    let send = self.sends.remove(index);
                    self.finish(send.ticket, send.request_id, Err(err), send.total_attempts, now);
                }
            }
        }

        let window = config.fragment_timeout_ticks;
        self.finished
            .retain(|_, finished_at| now.saturating_sub(*finished_at) <= window);
    }

    /// Take the outcome of a finished send.
    pub fn take(&mut self, ticket: SendTicket) -> Option<Result<SendReport>> {
        self.outcomes.remove(&ticket)
    }

    /// Sends still waiting for confirmation.
    pub fn in_flight(&self) -> usize {
        self.sends.len()
    }

    pub fn clear(&mut self) {
        self.sends.clear();
        self.outcomes.clear();
        self.finished.clear();
    }

    fn finish(
        &mut self,
        ticket: SendTicket,
        request_id: RequestId,
        outcome: Result<usize>,
        attempts: u32,
        now: u64,
    ) {
        let outcome = outcome.map(|chunks| SendReport {
            request_id: request_id.clone(),
            chunks,
            attempts,
        });
        self.finished.insert(request_id, now);
        self.outcomes.insert(ticket, outcome);
    }
}

fn transmit<T: Transport + ?Sized>(
    send: &mut OutboundSend,
    config: &PeerConfig,
    now: u64,
    transport: &mut T,
) -> Result<()> {
    send.attempts += 1;
    send.total_attempts += 1;
    send.deadline = now + config.confirmation_timeout_ticks;
    tracing::trace!(id = %send.current.id, attempt = send.attempts, "sending chunk");
    transport.send(&send.current)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use scriptwire_schema::{Value, WireType};
    use scriptwire_transport::{unquote_argument, LoopbackBus};
    use scriptwire_wire::Primitive;

    use super::*;

    fn request_id() -> RequestId {
        RequestId::random(&mut StdRng::seed_from_u64(1))
    }

    fn small_config() -> PeerConfig {
        PeerConfig {
            max_message_size: 5,
            max_send_attempts: 2,
            confirmation_timeout_ticks: 3,
            ..PeerConfig::default()
        }
    }

    #[test]
    fn split_counts_and_orders() {
        let config = small_config();
        let id = request_id();
        let payload: Vec<u8> = (10..=18).collect();
        let messages = split_payload(TypeId(5), &id, &payload, &config).unwrap();
        assert_eq!(messages.len(), 3);

        let orders: Vec<Fragment> = messages
            .iter()
            .map(|m| PacketHeader::parse(&m.id).unwrap().fragment.unwrap())
            .collect();
        assert_eq!(
            orders,
            [
                Fragment { order: 2, count: 3 },
                Fragment { order: 1, count: 3 },
                Fragment { order: 0, count: 3 }
            ]
        );

        let joined: String = messages
            .iter()
            .map(|m| unquote_argument(&m.body).unwrap())
            .collect();
        assert_eq!(DATA_CHARSET.decode(&joined).unwrap(), payload);
    }

    #[test]
    fn escaped_bytes_count_against_the_body_limit() {
        let config = PeerConfig {
            max_message_size: 6,
            ..PeerConfig::default()
        };
        // Bytes 2 and 59 transcode to `"` and `\`, which quote to two characters.
        let payload = [2, 59, 2, 7, 59, 2, 2];
        let messages = split_payload(TypeId(5), &request_id(), &payload, &config).unwrap();
        assert_eq!(messages.len(), 4);
        for message in &messages {
            assert!(message.body.chars().count() <= config.max_message_size, "{:?}", message.body);
        }

        let joined: String = messages
            .iter()
            .map(|m| unquote_argument(&m.body).unwrap())
            .collect();
        assert_eq!(DATA_CHARSET.decode(&joined).unwrap(), payload);
    }

    #[test]
    fn small_and_empty_payloads_use_one_unnumbered_chunk() {
        let config = small_config();
        for payload in [&[][..], &[10, 11, 12][..]] {
            let messages = split_payload(TypeId(5), &request_id(), payload, &config).unwrap();
            assert_eq!(messages.len(), 1);
            assert_eq!(PacketHeader::parse(&messages[0].id).unwrap().fragment, None);
        }
    }

    #[test]
    fn too_many_chunks_is_rejected() {
        let config = PeerConfig {
            max_message_size: 4,
            max_fragments: 3,
            ..PeerConfig::default()
        };
        assert!(matches!(
            split_payload(TypeId(1), &request_id(), &[0; 8], &config),
            Err(PeerError::MaxPacketSizeExceeded { chunks: 4, max: 3 })
        ));
        // Escapes push the count past the limit even when the raw length fits.
        assert!(matches!(
            split_payload(TypeId(1), &request_id(), &[2; 6], &config),
            Err(PeerError::MaxPacketSizeExceeded { chunks: 6, max: 3 })
        ));
    }

    #[test]
    fn echo_advances_through_chunks() {
        let bus = LoopbackBus::new();
        let mut endpoint = bus.endpoint();
        let config = small_config();
        let id = request_id();
        let messages = split_payload(TypeId(9), &id, &[0; 9], &config).unwrap();
        assert_eq!(messages.len(), 3);

        let mut outbox = Outbox::new();
        let ticket = outbox.start(id.clone(), messages, &config, 0, &mut endpoint);
        assert_eq!(bus.history().len(), 1);

        while let Some(echo) = endpoint.try_recv() {
            assert!(outbox.confirm(&echo.id, &id, &config, 0, &mut endpoint));
        }
        assert_eq!(bus.history().len(), 3);
        assert_eq!(
            outbox.take(ticket).unwrap().unwrap(),
            SendReport {
                request_id: id.clone(),
                chunks: 3,
                attempts: 3
            }
        );
        assert_eq!(outbox.in_flight(), 0);

        // late duplicates of a finished send are still recognised as ours
        let late = bus.history()[0].1.clone();
        assert!(outbox.confirm(&late.id, &id, &config, 1, &mut endpoint));
    }

    #[test]
    fn unconfirmed_chunk_is_resent_then_fails() {
        let bus = LoopbackBus::new();
        bus.set_drop_filter(|_, _| true);
        let mut endpoint = bus.endpoint();
        let config = small_config();
        let id = request_id();
        let messages = split_payload(TypeId(9), &id, &[1], &config).unwrap();

        let mut outbox = Outbox::new();
        let ticket = outbox.start(id.clone(), messages, &config, 0, &mut endpoint);
        outbox.poll(&config, 2, &mut endpoint);
        assert_eq!(bus.dropped(), 1);
        outbox.poll(&config, 3, &mut endpoint);
        assert_eq!(bus.dropped(), 2);
        outbox.poll(&config, 5, &mut endpoint);
        assert!(outbox.take(ticket).is_none());
        outbox.poll(&config, 6, &mut endpoint);

        assert!(matches!(
            outbox.take(ticket),
            Some(Err(PeerError::SendRetriesExhausted { order: 0, attempts: 2, .. }))
        ));
        assert_eq!(bus.dropped(), 2);
    }

    #[test]
    fn foreign_request_ids_are_not_ours() {
        let bus = LoopbackBus::new();
        let mut endpoint = bus.endpoint();
        let mut outbox = Outbox::new();
        let other = RequestId::parse("ZZZZZZZZZZZZ").unwrap();
        assert!(!outbox.confirm("packet:x", &other, &small_config(), 0, &mut endpoint));
    }

    #[test]
    fn dispatch_runs_listeners_in_order() {
        let schema = Arc::new(Schema::named("Ping", [("n", WireType::from(Primitive::UInt8))]).unwrap());
        let mut channel = PacketChannel::new(TypeId(3), schema.clone());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = seen.clone();
            channel.listen(move |record| {
                seen.lock().unwrap().push((tag, record.get("n").cloned()));
            });
        }

        let record = Record::named([("n", Value::UInt(42))]);
        let messages = channel.prepare(&record, &request_id(), &PeerConfig::default()).unwrap();
        assert_eq!(messages.len(), 1);
        let payload = unquote_argument(&messages[0].body).unwrap();
        assert_eq!(channel.dispatch(&payload).unwrap(), record);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![("first", Some(Value::UInt(42))), ("second", Some(Value::UInt(42)))]
        );
    }
}
