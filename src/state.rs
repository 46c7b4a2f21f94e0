//! Connection finite-state-machine (FSM) types.
//!
//! This module defines every state the two endpoints can occupy.  State
//! transitions are *not* implemented here — they live in [`crate::sender`]
//! and [`crate::receiver`] — but each variant documents its legal exits.
//!
//! The protocol is uni-directional, so the two endpoints have asymmetric
//! state machines rather than the full TCP diagram: the sender actively
//! opens and closes; the receiver passively mirrors it.

use std::fmt;

/// States of the sender's connection FSM.
///
/// ```text
///  CLOSED ──start──▶ SYN_SENT ──ACK(isn+1)──▶ ESTABLISHED
///    ▲                   │                         │
///    │       3 retries   │              all bytes  │
///    │       exhausted   ▼              acked      ▼
///    └──── (RESET) ◀─────┘              CLOSING ──FIN──▶ FIN_WAIT
///    ▲                                                      │
///    └───────────────── ACK(fin+1) or 3 retries ────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    /// No connection; initial and terminal state.
    #[default]
    Closed,
    /// SYN transmitted; waiting for its acknowledgement.
    SynSent,
    /// Handshake complete; data transfer in progress.
    Established,
    /// Every file byte acknowledged; FIN not yet sent.
    Closing,
    /// FIN transmitted; waiting for its acknowledgement.
    FinWait,
}

/// States of the receiver's connection FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverState {
    /// No connection; initial and terminal state.
    #[default]
    Closed,
    /// Socket bound; waiting for the sender's SYN.
    Listen,
    /// SYN acknowledged; accepting DATA segments.
    Established,
    /// FIN acknowledged; absorbing retransmitted FINs for 2 seconds.
    TimeWait,
}

impl fmt::Display for SenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
