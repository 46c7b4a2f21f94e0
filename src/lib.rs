//! `stp` — the Simple Transport Protocol: reliable, in-order delivery of a
//! bounded file over lossy UDP.
//!
//! # Architecture
//!
//! ```text
//!  input file                                  output file
//!      │                                            ▲
//!  ┌───▼──────────┐  DATA / SYN / FIN  ┌────────────┴─────┐
//!  │   Sender     │───────────────────▶│ Loss channel     │  drops forward
//!  │ (window +    │                    │ (flp)            │  segments
//!  │  one timer)  │                    └────────┬─────────┘
//!  └───▲──────────┘                    ┌────────▼─────────┐
//!      │            cumulative ACKs    │   Receiver       │
//!      └───────────────────────────────│ (reassembly +    │
//!           (rlp drops ACKs)           │  cumulative ACK) │
//!                                      └──────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`segment`]    — wire format (encode / decode the 4-byte header)
//! - [`seq`]        — modular 16-bit sequence-number arithmetic
//! - [`state`]      — finite-state-machine types for both endpoints
//! - [`socket`]     — async UDP socket abstraction speaking segments
//! - [`timer`]      — the sender's single retransmission timer
//! - [`window`]     — sliding send window and duplicate-ACK detection
//! - [`reassembly`] — out-of-order buffering and cumulative-ACK generation
//! - [`loss`]       — probabilistic drop emulation at the receiver
//! - [`trace`]      — per-endpoint segment trace log and statistics
//! - [`sender`]     — sender endpoint (lifecycle + transmit engine)
//! - [`receiver`]   — receiver endpoint (lifecycle + ACK generation)

pub mod loss;
pub mod reassembly;
pub mod receiver;
pub mod segment;
pub mod sender;
pub mod seq;
pub mod socket;
pub mod state;
pub mod timer;
pub mod trace;
pub mod window;
