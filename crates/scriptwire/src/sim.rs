//! Loopback peer groups for commands that need registered ids.

use std::collections::HashMap;
use std::sync::Arc;

use scriptwire_peer::{Peer, PeerConfig, PeerError, Registration};
use scriptwire_schema::{DeclKind, Declarations, Schema, TypeId};
use scriptwire_transport::{LoopbackBus, LoopbackEndpoint};

use crate::exit::{peer_error, schema_error, CliError, CliResult, FAILURE};

/// One declaration after registration on every peer of a group.
#[derive(Debug, Clone)]
pub struct Registered {
    pub name: String,
    pub kind: DeclKind,
    pub id: TypeId,
    pub schema: Arc<Schema>,
    pub signature: String,
}

/// Peers sharing one loopback bus, ticked in lockstep.
pub struct Group {
    peers: Vec<Peer<LoopbackEndpoint>>,
    config: PeerConfig,
    now: u64,
}

impl Group {
    pub fn new(size: usize, config: PeerConfig) -> CliResult<Self> {
        if size == 0 {
            return Err(CliError::usage("a group needs at least one peer"));
        }
        let bus = LoopbackBus::new();
        let mut peers = Vec::with_capacity(size);
        for i in 0..size {
            let config = PeerConfig {
                rng_seed: config.rng_seed.map(|seed| seed.wrapping_add(i as u64)),
                ..config.clone()
            };
            let peer = Peer::with_config(bus.endpoint(), config)
                .map_err(|err| peer_error("peer start failed", err))?;
            peers.push(peer);
        }
        Ok(Self {
            peers,
            config,
            now: 0,
        })
    }

    fn tick(&mut self) -> CliResult<()> {
        self.now += 1;
        for peer in &mut self.peers {
            peer.tick(self.now)
                .map_err(|err| peer_error("tick failed", err))?;
        }
        Ok(())
    }

    /// Tick until every peer has passed the startup barrier.
    pub fn wait_ready(&mut self) -> CliResult<()> {
        let limit = self.config.startup_quiescence_ticks + self.config.registration_timeout_ticks;
        for _ in 0..limit {
            if self.peers.iter().all(Peer::is_ready) {
                return Ok(());
            }
            self.tick()?;
        }
        Err(peer_error(
            "startup",
            PeerError::RegistrationTimeout {
                signature: "built-in types".to_string(),
            },
        ))
    }

    /// Register every declaration on every peer, in file order.
    ///
    /// Nested types resolve to the schema each peer registered earlier, so
    /// signatures carry the agreed ids.
    pub fn register_all(&mut self, declarations: &Declarations) -> CliResult<Vec<Registered>> {
        self.wait_ready()?;

        let mut known: Vec<HashMap<String, Arc<Schema>>> = vec![HashMap::new(); self.peers.len()];
        let mut out = Vec::with_capacity(declarations.len());
        for decl in declarations.entries() {
            let context = format!("registering {}", decl.name);
            let mut tickets = Vec::with_capacity(self.peers.len());
            for (peer, known) in self.peers.iter_mut().zip(&known) {
                let schema = decl
                    .build(|name| known.get(name).cloned())
                    .map_err(|err| schema_error(&context, err))?;
                let ticket = match decl.kind {
                    DeclKind::Type => peer.register_type(schema),
                    DeclKind::Packet => peer.register_packet(schema),
                }
                .map_err(|err| peer_error(&context, err))?;
                tickets.push(ticket);
            }

            let registrations = self.await_tickets(&tickets, &context)?;
            let id = registrations[0].id;
            if let Some(other) = registrations.iter().find(|r| r.id != id) {
                return Err(CliError::new(
                    FAILURE,
                    format!("peers disagree on the id of {}: {id} and {}", decl.name, other.id),
                ));
            }
            for (known, registration) in known.iter_mut().zip(&registrations) {
                known.insert(decl.name.clone(), registration.schema.clone());
            }

            let signature = self.peers[0]
                .registry()
                .assignments()
                .into_iter()
                .find(|(assigned, _)| *assigned == id)
                .map(|(_, signature)| signature.to_string())
                .unwrap_or_default();
            tracing::debug!(name = %decl.name, %id, "declaration registered");
            out.push(Registered {
                name: decl.name.clone(),
                kind: decl.kind,
                id,
                schema: registrations[0].schema.clone(),
                signature,
            });
        }
        Ok(out)
    }

    fn await_tickets(
        &mut self,
        tickets: &[scriptwire_peer::Ticket],
        context: &str,
    ) -> CliResult<Vec<Registration>> {
        let mut outcomes: Vec<Option<Registration>> = vec![None; tickets.len()];
        for _ in 0..=self.config.registration_timeout_ticks + 1 {
            for ((peer, ticket), slot) in self.peers.iter_mut().zip(tickets).zip(&mut outcomes) {
                if slot.is_none() {
                    if let Some(outcome) = peer.take_registration(*ticket) {
                        *slot = Some(outcome.map_err(|err| peer_error(context, err))?);
                    }
                }
            }
            if outcomes.iter().all(Option::is_some) {
                return Ok(outcomes.into_iter().flatten().collect());
            }
            self.tick()?;
        }
        Err(CliError::new(
            crate::exit::TIMEOUT,
            format!("{context}: no id assigned"),
        ))
    }
}
