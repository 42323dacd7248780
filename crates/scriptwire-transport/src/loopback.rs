use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, TransportError};
use crate::traits::{Transport, TransportMessage};

type DropFilter = Box<dyn FnMut(usize, &TransportMessage) -> bool + Send>;

/// In-process broadcast bus.
///
/// Every message sent by any endpoint is appended, in send order, to the
/// inbox of every endpoint attached at that moment, the sender included.
/// This is the delivery model the registration and packet protocols rely on.
#[derive(Clone, Default)]
pub struct LoopbackBus {
    state: Arc<Mutex<BusState>>,
}

#[derive(Default)]
struct BusState {
    inboxes: Vec<VecDeque<TransportMessage>>,
    history: Vec<(usize, TransportMessage)>,
    max_body_len: Option<usize>,
    drop_filter: Option<DropFilter>,
    dropped: usize,
}

impl LoopbackBus {
    /// Create an empty bus with no message size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus that rejects bodies longer than `max_body_len` chars.
    pub fn with_max_body_len(max_body_len: usize) -> Self {
        let bus = Self::default();
        bus.lock().max_body_len = Some(max_body_len);
        bus
    }

    /// Attach a new endpoint. It only sees messages sent after it joined.
    pub fn endpoint(&self) -> LoopbackEndpoint {
        let mut state = self.lock();
        state.inboxes.push(VecDeque::new());
        LoopbackEndpoint {
            index: state.inboxes.len() - 1,
            bus: self.clone(),
        }
    }

    /// Install a filter deciding which messages the host silently loses.
    ///
    /// The filter receives the sender index and the message; returning
    /// `true` drops it before any endpoint sees it.
    pub fn set_drop_filter<F>(&self, filter: F)
    where
        F: FnMut(usize, &TransportMessage) -> bool + Send + 'static,
    {
        self.lock().drop_filter = Some(Box::new(filter));
    }

    /// Remove any installed drop filter.
    pub fn clear_drop_filter(&self) {
        self.lock().drop_filter = None;
    }

    /// Every delivered message with its sender index, in delivery order.
    pub fn history(&self) -> Vec<(usize, TransportMessage)> {
        self.lock().history.clone()
    }

    /// Number of delivered messages whose id equals `id`.
    pub fn count_sent(&self, id: &str) -> usize {
        self.lock()
            .history
            .iter()
            .filter(|(_, msg)| msg.id == id)
            .count()
    }

    /// Number of messages lost through the drop filter.
    pub fn dropped(&self) -> usize {
        self.lock().dropped
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for LoopbackBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("LoopbackBus")
            .field("endpoints", &state.inboxes.len())
            .field("delivered", &state.history.len())
            .field("max_body_len", &state.max_body_len)
            .finish()
    }
}

/// One peer's attachment to a [`LoopbackBus`].
#[derive(Debug)]
pub struct LoopbackEndpoint {
    index: usize,
    bus: LoopbackBus,
}

impl LoopbackEndpoint {
    /// Position of this endpoint on the bus.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Messages waiting in this endpoint's inbox.
    pub fn pending(&self) -> usize {
        self.bus.lock().inboxes[self.index].len()
    }
}

impl Transport for LoopbackEndpoint {
    fn send(&mut self, message: &TransportMessage) -> Result<()> {
        let mut state = self.bus.lock();

        if let Some(max) = state.max_body_len {
            let len = message.body.chars().count();
            if len > max {
                return Err(TransportError::MessageTooLong { len, max });
            }
        }

        let sender = self.index;
        if let Some(filter) = state.drop_filter.as_mut() {
            if filter(sender, message) {
                state.dropped += 1;
                tracing::trace!(id = %message.id, sender, "loopback dropped message");
                return Ok(());
            }
        }

        for inbox in state.inboxes.iter_mut() {
            inbox.push_back(message.clone());
        }
        state.history.push((sender, message.clone()));
        Ok(())
    }

    fn try_recv(&mut self) -> Option<TransportMessage> {
        self.bus.lock().inboxes[self.index].pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_reaches_every_endpoint_including_sender() {
        let bus = LoopbackBus::new();
        let mut a = bus.endpoint();
        let mut b = bus.endpoint();

        a.send(&TransportMessage::new("registry:loaded", "")).unwrap();

        assert_eq!(a.try_recv().unwrap().id, "registry:loaded");
        assert_eq!(b.try_recv().unwrap().id, "registry:loaded");
        assert!(a.try_recv().is_none());
        assert!(b.try_recv().is_none());
    }

    #[test]
    fn delivery_order_is_identical_for_all_endpoints() {
        let bus = LoopbackBus::new();
        let mut a = bus.endpoint();
        let mut b = bus.endpoint();

        a.send(&TransportMessage::new("x:1", "")).unwrap();
        b.send(&TransportMessage::new("x:2", "")).unwrap();
        a.send(&TransportMessage::new("x:3", "")).unwrap();

        let seen_a: Vec<String> = std::iter::from_fn(|| a.try_recv()).map(|m| m.id).collect();
        let seen_b: Vec<String> = std::iter::from_fn(|| b.try_recv()).map(|m| m.id).collect();
        assert_eq!(seen_a, vec!["x:1", "x:2", "x:3"]);
        assert_eq!(seen_a, seen_b);
    }

    #[test]
    fn late_endpoint_misses_earlier_messages() {
        let bus = LoopbackBus::new();
        let mut a = bus.endpoint();
        a.send(&TransportMessage::new("x:early", "")).unwrap();

        let mut late = bus.endpoint();
        assert!(late.try_recv().is_none());
        assert_eq!(a.pending(), 1);
    }

    #[test]
    fn oversized_body_is_rejected() {
        let bus = LoopbackBus::with_max_body_len(4);
        let mut a = bus.endpoint();

        assert!(a.send(&TransportMessage::new("x:ok", "abcd")).is_ok());
        assert!(matches!(
            a.send(&TransportMessage::new("x:big", "abcde")),
            Err(TransportError::MessageTooLong { len: 5, max: 4 })
        ));
        assert_eq!(bus.count_sent("x:big"), 0);
    }

    #[test]
    fn drop_filter_loses_messages_silently() {
        let bus = LoopbackBus::new();
        let mut a = bus.endpoint();
        let mut b = bus.endpoint();

        let mut remaining = 1;
        bus.set_drop_filter(move |_, _| {
            if remaining > 0 {
                remaining -= 1;
                true
            } else {
                false
            }
        });

        a.send(&TransportMessage::new("x:lost", "")).unwrap();
        a.send(&TransportMessage::new("x:kept", "")).unwrap();

        assert_eq!(bus.dropped(), 1);
        assert_eq!(b.try_recv().unwrap().id, "x:kept");
        assert!(b.try_recv().is_none());

        bus.clear_drop_filter();
        a.send(&TransportMessage::new("x:after", "")).unwrap();
        assert_eq!(bus.history().len(), 2);
    }
}
