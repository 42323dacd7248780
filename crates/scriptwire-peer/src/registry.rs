//! Distributed type-id registry.
//!
//! Every peer observes every `registry:register` message, its own included,
//! in the same order. The first observation of a signature mints the next id
//! from a counter that each peer advances identically, so all peers agree on
//! the signature to id mapping without a coordinator.
//!
//! Registrations wait behind a startup barrier: each peer announces itself
//! with `registry:loaded`, and the barrier opens once no announcement has
//! been seen for `startup_quiescence_ticks`. The built-in types register
//! next, and only then do parked requests proceed, in submission order.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use scriptwire_schema::{signature, Builtin, BuiltinIds, Schema, TypeId};
use scriptwire_transport::{Transport, TransportMessage};

use crate::config::PeerConfig;
use crate::error::{PeerError, Result};
use crate::header::{REGISTRY_LOADED, REGISTRY_REGISTER};

/// Whether a registration binds a plain type or a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationKind {
    Type,
    Packet,
}

/// Handle for the outcome of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(pub(crate) u64);

/// A completed registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub id: TypeId,
    /// The registered schema, bound to `id`.
    pub schema: Arc<Schema>,
    pub kind: RegistrationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requester {
    Caller(Ticket),
    Builtin(Builtin),
}

#[derive(Debug)]
struct Request {
    requester: Requester,
    schema: Arc<Schema>,
    kind: RegistrationKind,
}

#[derive(Debug)]
struct PendingRegistration {
    waiters: Vec<Request>,
    deadline: u64,
}

#[derive(Debug)]
struct RegistryEntry {
    schema: Arc<Schema>,
    is_packet: bool,
}

/// Per-peer registry state.
#[derive(Debug)]
pub struct Registry {
    config: PeerConfig,
    last_activity: u64,
    barrier_open: bool,
    ready: bool,
    builtins: BuiltinIds,
    parked: VecDeque<Request>,
    cache: HashMap<String, TypeId>,
    entries: HashMap<TypeId, RegistryEntry>,
    pending: HashMap<String, PendingRegistration>,
    outcomes: HashMap<Ticket, Result<Registration>>,
    next_id: u64,
    next_ticket: u64,
}

impl Registry {
    /// Fresh registry whose barrier clock starts at `now`.
    pub fn new(config: PeerConfig, now: u64) -> Self {
        Self {
            config,
            last_activity: now,
            barrier_open: false,
            ready: false,
            builtins: BuiltinIds::new(),
            parked: VecDeque::new(),
            cache: HashMap::new(),
            entries: HashMap::new(),
            pending: HashMap::new(),
            outcomes: HashMap::new(),
            next_id: 0,
            next_ticket: 0,
        }
    }

    /// Broadcast the startup announcement.
    pub fn announce<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<()> {
        transport.send(&TransportMessage::new(REGISTRY_LOADED, ""))?;
        Ok(())
    }

    /// Request an id for `schema`.
    ///
    /// Before the registry is ready the request is parked and its errors
    /// surface through the ticket. Afterwards, schema errors (such as an
    /// unregistered nested composite) are returned directly.
    pub fn register<T: Transport + ?Sized>(
        &mut self,
        schema: Arc<Schema>,
        kind: RegistrationKind,
        now: u64,
        transport: &mut T,
    ) -> Result<Ticket> {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        let request = Request {
            requester: Requester::Caller(ticket),
            schema,
            kind,
        };

        if self.ready {
            self.submit(request, now, transport)?;
        } else {
            tracing::debug!(name = %request.schema.name(), "registry not ready, parking registration");
            self.parked.push_back(request);
        }
        Ok(ticket)
    }

    /// Route an inbound `registry:*` message.
    pub fn handle_message<T: Transport + ?Sized>(
        &mut self,
        message: &TransportMessage,
        now: u64,
        transport: &mut T,
    ) -> Result<()> {
        match message.id.as_str() {
            REGISTRY_REGISTER => self.observe(&message.body, now, transport),
            REGISTRY_LOADED => {
                if !self.barrier_open {
                    self.last_activity = now;
                }
                Ok(())
            }
            other => {
                tracing::trace!(id = other, "ignoring unknown registry message");
                Ok(())
            }
        }
    }

    /// Advance timers: open the barrier and expire registrations.
    pub fn poll<T: Transport + ?Sized>(&mut self, now: u64, transport: &mut T) -> Result<()> {
        if !self.barrier_open
            && now.saturating_sub(self.last_activity) > self.config.startup_quiescence_ticks
        {
            self.barrier_open = true;
            tracing::debug!(now, "startup barrier open, registering built-in types");
            for builtin in Builtin::ALL {
                let request = Request {
                    requester: Requester::Builtin(builtin),
                    schema: builtin.schema(),
                    kind: RegistrationKind::Type,
                };
                self.submit(request, now, transport)?;
            }
        }

        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, pending)| now > pending.deadline)
            .map(|(signature, _)| signature.clone())
            .collect();
        for signature in expired {
            let Some(pending) = self.pending.remove(&signature) else {
                continue;
            };
            tracing::warn!(%signature, waiters = pending.waiters.len(), "registration timed out");
            for request in pending.waiters {
                match request.requester {
                    Requester::Builtin(_) => self.submit(request, now, transport)?,
                    Requester::Caller(ticket) => {
                        self.outcomes.insert(
                            ticket,
                            Err(PeerError::RegistrationTimeout {
                                signature: signature.clone(),
                            }),
                        );
                    }
                }
            }
        }

        self.check_ready(now, transport);
        Ok(())
    }

    /// Take the outcome of a resolved registration.
    pub fn take(&mut self, ticket: Ticket) -> Option<Result<Registration>> {
        self.outcomes.remove(&ticket)
    }

    /// Schema bound to `id` on this peer.
    pub fn get_type(&self, id: TypeId) -> Result<Arc<Schema>> {
        self.entries
            .get(&id)
            .map(|entry| entry.schema.clone())
            .ok_or(PeerError::UnknownType(id))
    }

    /// Schema bound to `id`, which must be registered as a packet.
    pub fn packet_schema(&self, id: TypeId) -> Result<Arc<Schema>> {
        match self.entries.get(&id) {
            Some(entry) if entry.is_packet => Ok(entry.schema.clone()),
            Some(_) => Err(PeerError::NotAPacket(id)),
            None => Err(PeerError::UnknownType(id)),
        }
    }

    /// Id minted for a signature, if it has been observed.
    pub fn lookup(&self, signature: &str) -> Option<TypeId> {
        self.cache.get(signature).copied()
    }

    /// Every observed signature with its id, in id order.
    pub fn assignments(&self) -> Vec<(TypeId, &str)> {
        let mut all: Vec<(TypeId, &str)> = self
            .cache
            .iter()
            .map(|(signature, id)| (*id, signature.as_str()))
            .collect();
        all.sort_unstable_by_key(|(id, _)| *id);
        all
    }

    /// Whether the barrier is open and the built-ins are registered.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_barrier_open(&self) -> bool {
        self.barrier_open
    }

    /// Registrations currently waiting for an id.
    pub fn pending(&self) -> usize {
        self.pending.values().map(|p| p.waiters.len()).sum::<usize>() + self.parked.len()
    }

    /// Drop all state and restart the barrier clock at `now`.
    pub fn reset(&mut self, now: u64) {
        *self = Self::new(self.config.clone(), now);
    }

    fn submit<T: Transport + ?Sized>(
        &mut self,
        request: Request,
        now: u64,
        transport: &mut T,
    ) -> Result<()> {
        let signature = signature(&request.schema, &self.builtins)?;

        if let Some(id) = self.cache.get(&signature).copied() {
            self.bind(request, id);
            return Ok(());
        }
        if let Some(pending) = self.pending.get_mut(&signature) {
            tracing::debug!(%signature, "joining pending registration");
            pending.waiters.push(request);
            return Ok(());
        }

        tracing::debug!(%signature, "broadcasting registration");
        transport.send(&TransportMessage::new(REGISTRY_REGISTER, signature.clone()))?;
        self.pending.insert(
            signature,
            PendingRegistration {
                waiters: vec![request],
                deadline: now + self.config.registration_timeout_ticks,
            },
        );
        Ok(())
    }

    fn observe<T: Transport + ?Sized>(
        &mut self,
        signature: &str,
        now: u64,
        transport: &mut T,
    ) -> Result<()> {
        if self.cache.contains_key(signature) {
            return Ok(());
        }

        let max = self.config.max_type_ids.min(1 << 32);
        if self.next_id >= max {
            if let Some(pending) = self.pending.remove(signature) {
                for request in pending.waiters {
                    if let Requester::Caller(ticket) = request.requester {
                        self.outcomes
                            .insert(ticket, Err(PeerError::IdSpaceExhausted { max }));
                    }
                }
            }
            return Err(PeerError::IdSpaceExhausted { max });
        }

        let id = TypeId(self.next_id as u32);
        self.next_id += 1;
        self.cache.insert(signature.to_string(), id);
        tracing::debug!(%signature, %id, "type id assigned");

        if let Some(pending) = self.pending.remove(signature) {
            for request in pending.waiters {
                self.bind(request, id);
            }
        }
        self.check_ready(now, transport);
        Ok(())
    }

    /// A type and a packet whose schemas differ only in field keys share a
    /// signature and therefore an id. The first packet registration decides
    /// the schema inbound packets decode with.
    fn bind(&mut self, request: Request, id: TypeId) {
        let schema = Arc::new(request.schema.with_id(id));
        let entry = self.entries.entry(id).or_insert_with(|| RegistryEntry {
            schema: schema.clone(),
            is_packet: false,
        });
        if request.kind == RegistrationKind::Packet && !entry.is_packet {
            entry.schema = schema.clone();
            entry.is_packet = true;
        }

        match request.requester {
            Requester::Builtin(builtin) => self.builtins.set(builtin, id),
            Requester::Caller(ticket) => {
                self.outcomes.insert(
                    ticket,
                    Ok(Registration {
                        id,
                        schema,
                        kind: request.kind,
                    }),
                );
            }
        }
    }

    fn check_ready<T: Transport + ?Sized>(&mut self, now: u64, transport: &mut T) {
        if self.ready || !self.barrier_open || !self.builtins.is_complete() {
            return;
        }
        self.ready = true;
        tracing::debug!(parked = self.parked.len(), "registry ready");

        while let Some(request) = self.parked.pop_front() {
            let requester = request.requester;
            if let Err(err) = self.submit(request, now, transport) {
                if let Requester::Caller(ticket) = requester {
                    self.outcomes.insert(ticket, Err(err));
                }
            }
        }
    }
}
