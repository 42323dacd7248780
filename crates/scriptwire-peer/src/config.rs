/// Tunables for one peer. All durations are in host ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// Ticks without a `registry:loaded` message before the startup barrier opens.
    pub startup_quiescence_ticks: u64,
    /// Ticks a registration may wait for its id before failing.
    pub registration_timeout_ticks: u64,
    /// Maximum body characters per transport message, quotes and escapes
    /// included.
    pub max_message_size: usize,
    /// Send attempts per chunk, the first send included.
    pub max_send_attempts: u32,
    /// Ticks to wait for a chunk's echo before resending it.
    pub confirmation_timeout_ticks: u64,
    /// Starting capacity of the encode buffer.
    pub default_encode_buffer_size: usize,
    /// Ticks an incomplete fragment buffer is kept, and how long finished
    /// request ids are remembered for duplicate suppression.
    pub fragment_timeout_ticks: u64,
    /// Maximum chunks per packet, sent or received.
    pub max_fragments: usize,
    /// Size of the type id space.
    pub max_type_ids: u64,
    /// Seed for request id generation. `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            startup_quiescence_ticks: 20,
            registration_timeout_ticks: 1000,
            max_message_size: 2048,
            max_send_attempts: 5,
            confirmation_timeout_ticks: 10,
            default_encode_buffer_size: scriptwire_wire::DEFAULT_ENCODE_BUFFER_SIZE,
            fragment_timeout_ticks: 1200,
            max_fragments: 4096,
            max_type_ids: 1 << 32,
            rng_seed: None,
        }
    }
}
