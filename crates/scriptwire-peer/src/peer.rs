use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use scriptwire_schema::{Record, Schema, TypeId};
use scriptwire_transport::{unquote_argument, Transport, TransportMessage};

use crate::channel::{Outbox, PacketChannel, SendReport, SendTicket};
use crate::config::PeerConfig;
use crate::error::{PeerError, Result};
use crate::fragment::Reassembler;
use crate::header::{PacketHeader, RequestId, PACKET_NAMESPACE, REGISTRY_NAMESPACE};
use crate::registry::{Registration, RegistrationKind, Registry, Ticket};

/// One participant in a peer group.
///
/// The peer owns its transport endpoint and all protocol state. Nothing
/// happens on its own: the host calls [`Peer::tick`] once per scheduler
/// tick, which drains inbound messages and then runs every timer.
pub struct Peer<T: Transport> {
    transport: T,
    config: PeerConfig,
    registry: Registry,
    channels: HashMap<TypeId, PacketChannel>,
    outbox: Outbox,
    reassembler: Reassembler,
    rng: StdRng,
    now: u64,
}

impl<T: Transport> Peer<T> {
    /// Create a peer with default config, starting at tick 0.
    pub fn new(transport: T) -> Result<Self> {
        Self::with_config(transport, PeerConfig::default())
    }

    /// Create a peer with explicit config, starting at tick 0.
    pub fn with_config(transport: T, config: PeerConfig) -> Result<Self> {
        Self::with_config_at(transport, config, 0)
    }

    /// Create a peer whose clock starts at `now`, and announce it.
    pub fn with_config_at(mut transport: T, config: PeerConfig, now: u64) -> Result<Self> {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut registry = Registry::new(config.clone(), now);
        registry.announce(&mut transport)?;

        Ok(Self {
            transport,
            registry,
            channels: HashMap::new(),
            outbox: Outbox::new(),
            reassembler: Reassembler::new(config.fragment_timeout_ticks, config.max_fragments),
            rng,
            now,
            config,
        })
    }

    /// Drain inbound messages, then advance every timer.
    ///
    /// Problems with individual inbound messages are logged and skipped.
    /// Only id space exhaustion is returned, since no further registration
    /// can succeed after it.
    pub fn tick(&mut self, now: u64) -> Result<()> {
        self.now = now;
        while let Some(message) = self.transport.try_recv() {
            match self.handle_message(&message) {
                Ok(()) => {}
                Err(err @ PeerError::IdSpaceExhausted { .. }) => return Err(err),
                Err(err) => {
                    tracing::warn!(id = %message.id, error = %err, "dropping inbound message");
                }
            }
        }

        self.registry.poll(now, &mut self.transport)?;
        self.outbox.poll(&self.config, now, &mut self.transport);
        self.reassembler.evict_stale(now);
        Ok(())
    }

    /// Route one inbound message by namespace.
    pub fn handle_message(&mut self, message: &TransportMessage) -> Result<()> {
        match message.namespace() {
            REGISTRY_NAMESPACE => {
                self.registry
                    .handle_message(message, self.now, &mut self.transport)
            }
            PACKET_NAMESPACE => self.handle_packet(message),
            other => {
                tracing::trace!(namespace = other, "ignoring message outside protocol namespaces");
                Ok(())
            }
        }
    }

    /// Register a plain type. Its id resolves through [`Peer::take_registration`].
    pub fn register_type(&mut self, schema: impl Into<Arc<Schema>>) -> Result<Ticket> {
        self.registry.register(
            schema.into(),
            RegistrationKind::Type,
            self.now,
            &mut self.transport,
        )
    }

    /// Register a packet type, which can then be sent and listened to.
    pub fn register_packet(&mut self, schema: impl Into<Arc<Schema>>) -> Result<Ticket> {
        self.registry.register(
            schema.into(),
            RegistrationKind::Packet,
            self.now,
            &mut self.transport,
        )
    }

    /// Take the outcome of a registration once it has resolved.
    pub fn take_registration(&mut self, ticket: Ticket) -> Option<Result<Registration>> {
        self.registry.take(ticket)
    }

    /// Schema bound to `id` on this peer.
    pub fn get_type(&self, id: TypeId) -> Result<Arc<Schema>> {
        self.registry.get_type(id)
    }

    /// Encode `record` as packet `id` and start sending it.
    ///
    /// Encoding errors are returned directly; delivery failures surface
    /// through [`Peer::take_send_outcome`].
    pub fn send(&mut self, id: TypeId, record: &Record) -> Result<SendTicket> {
        let request_id = RequestId::random(&mut self.rng);
        let channel = channel_for(&mut self.channels, &self.registry, id)?;
        let messages = channel.prepare(record, &request_id, &self.config)?;
        Ok(self.outbox.start(
            request_id,
            messages,
            &self.config,
            self.now,
            &mut self.transport,
        ))
    }

    /// Take the outcome of a send once it has finished.
    pub fn take_send_outcome(&mut self, ticket: SendTicket) -> Option<Result<SendReport>> {
        self.outbox.take(ticket)
    }

    /// Call `listener` for every packet `id` received from other peers.
    pub fn listen<F>(&mut self, id: TypeId, listener: F) -> Result<()>
    where
        F: FnMut(&Record) + Send + 'static,
    {
        channel_for(&mut self.channels, &self.registry, id)?.listen(listener);
        Ok(())
    }

    /// Whether registrations are being processed.
    pub fn is_ready(&self) -> bool {
        self.registry.is_ready()
    }

    /// Last tick seen.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Sends waiting for confirmation.
    pub fn in_flight(&self) -> usize {
        self.outbox.in_flight()
    }

    /// Incomplete inbound packets.
    pub fn pending_fragments(&self) -> usize {
        self.reassembler.pending()
    }

    /// Drop all protocol state and announce again, restarting the barrier.
    pub fn reset(&mut self) -> Result<()> {
        self.registry.reset(self.now);
        self.channels.clear();
        self.outbox.clear();
        self.reassembler.clear();
        self.registry.announce(&mut self.transport)
    }

    fn handle_packet(&mut self, message: &TransportMessage) -> Result<()> {
        let header = PacketHeader::parse(&message.id)?;
        let request_id = &header.request_id;

        if self.outbox.confirm(
            &message.id,
            request_id,
            &self.config,
            self.now,
            &mut self.transport,
        ) {
            return Ok(());
        }
        if self.reassembler.is_finished(request_id) {
            tracing::trace!(%request_id, "duplicate packet ignored");
            return Ok(());
        }

        let body = unquote_argument(&message.body)?;
        let payload = match header.fragment {
            None => body,
            Some(fragment) => {
                match self.reassembler.accept(request_id, fragment, body, self.now)? {
                    Some(payload) => payload,
                    None => return Ok(()),
                }
            }
        };
        self.reassembler.mark_finished(header.request_id.clone(), self.now);

        match self.channels.get_mut(&header.packet) {
            Some(channel) => {
                channel.dispatch(&payload)?;
            }
            None => {
                // the schema is still checked so that unknown or non-packet ids are reported
                self.registry.packet_schema(header.packet)?;
                tracing::trace!(packet = %header.packet, "no listeners for packet");
            }
        }
        Ok(())
    }
}

fn channel_for<'a>(
    channels: &'a mut HashMap<TypeId, PacketChannel>,
    registry: &Registry,
    id: TypeId,
) -> Result<&'a mut PacketChannel> {
    let schema = registry.packet_schema(id)?;
    Ok(channels
        .entry(id)
        .or_insert_with(|| PacketChannel::new(id, schema)))
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for Peer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("transport", &self.transport)
            .field("now", &self.now)
            .field("ready", &self.registry.is_ready())
            .field("channels", &self.channels.len())
            .field("in_flight", &self.outbox.in_flight())
            .finish()
    }
}
