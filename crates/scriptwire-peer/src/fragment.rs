//! Reassembly of multi-chunk packets.
//!
//! Chunks of one send share a request id and may arrive in any order.
//! A buffer is complete once every order `0..count` is present; the payload
//! is the concatenation from the highest order down. Buffers that never
//! complete are evicted after `fragment_timeout_ticks`.

use std::collections::HashMap;

use crate::error::{PeerError, Result};
use crate::header::{Fragment, RequestId};

/// Chunks received so far for one request id.
#[derive(Debug)]
pub struct FragmentBuffer {
    chunks: Vec<Option<String>>,
    received: usize,
    created_at: u64,
}

impl FragmentBuffer {
    /// Empty buffer expecting `count` chunks.
    pub fn new(count: usize, created_at: u64) -> Self {
        Self {
            chunks: vec![None; count],
            received: 0,
            created_at,
        }
    }

    /// Store a chunk. Returns `false` if this order was already present.
    pub fn insert(&mut self, order: usize, body: String) -> bool {
        match self.chunks.get_mut(order) {
            Some(slot @ None) => {
                *slot = Some(body);
                self.received += 1;
                true
            }
            _ => false,
        }
    }

    /// Expected number of chunks.
    pub fn count(&self) -> usize {
        self.chunks.len()
    }

    /// Whether every order has arrived.
    pub fn is_complete(&self) -> bool {
        self.received == self.chunks.len()
    }

    /// Tick at which the first chunk arrived.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Concatenate chunk bodies from the highest order down.
    ///
    /// Returns `None` while chunks are missing.
    pub fn assemble(&self) -> Option<String> {
        if !self.is_complete() {
            return None;
        }
        let mut payload = String::with_capacity(self.chunks.iter().flatten().map(String::len).sum());
        for chunk in self.chunks.iter().rev().flatten() {
            payload.push_str(chunk);
        }
        Some(payload)
    }
}

/// Fragment buffers keyed by request id, plus recently finished ids.
#[derive(Debug)]
pub struct Reassembler {
    buffers: HashMap<RequestId, FragmentBuffer>,
    finished: HashMap<RequestId, u64>,
    timeout_ticks: u64,
    max_fragments: usize,
}

impl Reassembler {
    pub fn new(timeout_ticks: u64, max_fragments: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            finished: HashMap::new(),
            timeout_ticks,
            max_fragments,
        }
    }

    /// Add one chunk. Returns the full payload when this chunk completes it.
    pub fn accept(
        &mut self,
        request_id: &RequestId,
        fragment: Fragment,
        body: String,
        now: u64,
    ) -> Result<Option<String>> {
        if fragment.count > self.max_fragments {
            return Err(PeerError::MaxPacketSizeExceeded {
                chunks: fragment.count,
                max: self.max_fragments,
            });
        }

        let buffer = self
            .buffers
            .entry(request_id.clone())
            .or_insert_with(|| FragmentBuffer::new(fragment.count, now));
        if buffer.count() != fragment.count {
            return Err(PeerError::MalformedHeader(format!(
                "request {request_id} announced {} chunks, chunk {} says {}",
                buffer.count(),
                fragment.order,
                fragment.count
            )));
        }
        if !buffer.insert(fragment.order, body) {
            tracing::trace!(%request_id, order = fragment.order, "duplicate chunk ignored");
            return Ok(None);
        }

        let Some(payload) = buffer.assemble() else {
            return Ok(None);
        };
        self.buffers.remove(request_id);
        Ok(Some(payload))
    }

    /// Remember a finished request so that late duplicates are ignored.
    pub fn mark_finished(&mut self, request_id: RequestId, now: u64) {
        self.finished.insert(request_id, now);
    }

    /// Whether a request finished within the timeout window.
    pub fn is_finished(&self, request_id: &RequestId) -> bool {
        self.finished.contains_key(request_id)
    }

    /// Number of incomplete buffers.
    pub fn pending(&self) -> usize {
        self.buffers.len()
    }

    /// Drop buffers and finished ids older than the timeout.
    ///
    /// Returns the number of incomplete buffers evicted.
    pub fn evict_stale(&mut self, now: u64) -> usize {
        let timeout = self.timeout_ticks;
        let before = self.buffers.len();
        self.buffers.retain(|request_id, buffer| {
            let stale = now.saturating_sub(buffer.created_at()) > timeout;
            if stale {
                tracing::warn!(
                    %request_id,
                    received = buffer.received,
                    expected = buffer.count(),
                    "evicting incomplete packet"
                );
            }
            !stale
        });
        self.finished
            .retain(|_, finished_at| now.saturating_sub(*finished_at) <= timeout);
        before - self.buffers.len()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.buffers.clear();
        self.finished.clear();
    }
}
