//! Emulated loss channel for the receiver endpoint.
//!
//! Real networks drop datagrams; to exercise retransmission without
//! depending on actual network conditions, the receiver filters traffic
//! through a [`LossChannel`]: every inbound DATA/SYN/FIN segment is dropped
//! with probability `flp`, every outbound ACK with probability `rlp`.
//! RESET segments are exempt — the call sites never consult the channel for
//! them.
//!
//! The PRNG is seeded once at construction.  [`LossChannel::with_seed`]
//! makes a run reproducible, which the integration tests rely on.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Probabilistic drop filter applied at the receiver.
#[derive(Debug)]
pub struct LossChannel {
    rng: StdRng,
    /// Forward loss probability (inbound DATA, SYN, FIN).
    flp: f64,
    /// Reverse loss probability (outbound ACK).
    rlp: f64,
}

impl LossChannel {
    /// Channel seeded from the operating system.
    ///
    /// Both probabilities must lie in `[0, 1]`; the CLI validates this.
    pub fn new(flp: f64, rlp: f64) -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            flp,
            rlp,
        }
    }

    /// Deterministic channel for reproducible runs.
    pub fn with_seed(flp: f64, rlp: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            flp,
            rlp,
        }
    }

    /// Bernoulli trial for one inbound segment: `true` means drop it.
    pub fn drop_inbound(&mut self) -> bool {
        self.flp > 0.0 && self.rng.random_bool(self.flp)
    }

    /// Bernoulli trial for one outbound ACK: `true` means drop it.
    pub fn drop_outbound(&mut self) -> bool {
        self.rlp > 0.0 && self.rng.random_bool(self.rlp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_probability_never_drops() {
        let mut ch = LossChannel::with_seed(0.0, 0.0, 7);
        assert!((0..1000).all(|_| !ch.drop_inbound()));
        assert!((0..1000).all(|_| !ch.drop_outbound()));
    }

    #[test]
    fn unit_probability_always_drops() {
        let mut ch = LossChannel::with_seed(1.0, 1.0, 7);
        assert!((0..100).all(|_| ch.drop_inbound()));
        assert!((0..100).all(|_| ch.drop_outbound()));
    }

    #[test]
    fn same_seed_same_decisions() {
        let mut a = LossChannel::with_seed(0.5, 0.5, 42);
        let mut b = LossChannel::with_seed(0.5, 0.5, 42);
        let from_a: Vec<bool> = (0..64).map(|_| a.drop_inbound()).collect();
        let from_b: Vec<bool> = (0..64).map(|_| b.drop_inbound()).collect();
        assert_eq!(from_a, from_b);
    }

    #[test]
    fn drop_rate_tracks_the_probability() {
        let mut ch = LossChannel::with_seed(0.1, 0.0, 1);
        let drops = (0..10_000).filter(|_| ch.drop_inbound()).count();
        // 10% ± a generous margin.
        assert!((500..1500).contains(&drops), "drops = {drops}");
    }
}
