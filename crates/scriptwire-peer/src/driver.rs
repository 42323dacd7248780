//! Drive a [`Peer`] from a tokio interval.

use std::time::Duration;

use scriptwire_transport::Transport;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::peer::Peer;

/// Calls [`Peer::tick`] once per `period` until cancelled.
#[derive(Debug, Clone)]
pub struct TickDriver {
    period: Duration,
    token: CancellationToken,
}

impl TickDriver {
    pub fn new(period: Duration) -> Self {
        Self::with_token(period, CancellationToken::new())
    }

    pub fn with_token(period: Duration, token: CancellationToken) -> Self {
        Self { period, token }
    }

    /// Token that stops [`TickDriver::run`] when cancelled.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Tick until the token is cancelled. Returns the last tick number.
    pub async fn run<T: Transport>(&self, peer: &mut Peer<T>) -> Result<u64> {
        self.run_until(peer, |_| false).await
    }

    /// Tick until `done` returns true after a tick, or the token is cancelled.
    pub async fn run_until<T, F>(&self, peer: &mut Peer<T>, mut done: F) -> Result<u64>
    where
        T: Transport,
        F: FnMut(&Peer<T>) -> bool,
    {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut now = peer.now();

        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    tracing::debug!(tick = now, "tick driver cancelled");
                    return Ok(now);
                }
                _ = interval.tick() => {
                    now += 1;
                    peer.tick(now)?;
                    if done(&*peer) {
                        return Ok(now);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeerConfig;
    use scriptwire_transport::LoopbackBus;

    fn config() -> PeerConfig {
        PeerConfig {
            startup_quiescence_ticks: 2,
            rng_seed: Some(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn runs_until_ready() {
        let bus = LoopbackBus::new();
        let mut peer = Peer::with_config(bus.endpoint(), config()).unwrap();
        let driver = TickDriver::new(Duration::from_millis(1));

        let tick = driver.run_until(&mut peer, |p| p.is_ready()).await.unwrap();
        assert!(peer.is_ready());
        assert_eq!(tick, peer.now());
        assert!(tick > 2);
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let bus = LoopbackBus::new();
        let mut peer = Peer::with_config(bus.endpoint(), config()).unwrap();
        let driver = TickDriver::new(Duration::from_millis(1));
        driver.token().cancel();

        let tick = driver.run(&mut peer).await.unwrap();
        assert_eq!(tick, 0);
    }
}
