//! Sliding send window and duplicate-ACK detection.
//!
//! [`SendWindow`] owns the sender's in-flight state: the send buffer (one
//! entry per unacknowledged DATA segment), the `send_base`/`next_seq` window
//! edges, and the duplicate-ACK counter.  It performs no I/O and holds no
//! timer — it classifies each cumulative ACK as advancing, duplicate, or
//! stale, and the transmit engine reacts.  This keeps fast-retransmit
//! detection a pure function of the ACK stream.
//!
//! # Protocol contract
//!
//! - The window is byte-granular: at most `max_win` bytes may be in flight,
//!   and a new segment may only enter while `in_flight + MSS ≤ max_win`.
//! - ACKs are **cumulative**: `ack = K` means the receiver holds every byte
//!   before sequence number `K`.
//! - The **third** consecutive duplicate of the current `send_base` ACK
//!   requests a fast retransmission of the oldest unacked segment; the
//!   counter then restarts from zero.
//! - Sequence numbers live in the 16-bit wrap-around space of [`crate::seq`].

use std::collections::VecDeque;
use std::time::Instant;

use crate::segment::MSS;
use crate::seq;

// ---------------------------------------------------------------------------
// SendEntry
// ---------------------------------------------------------------------------

/// A single in-flight DATA segment occupying part of the send window.
#[derive(Debug, Clone)]
pub struct SendEntry {
    /// Sequence number of the first payload byte.
    pub seq: u16,
    /// The payload bytes, kept until cumulatively acknowledged.
    pub payload: Vec<u8>,
    /// Total number of times this segment has been transmitted.
    pub tx_count: u32,
    /// Wall-clock time of the most recent transmission.
    pub sent_at: Instant,
}

// ---------------------------------------------------------------------------
// AckOutcome
// ---------------------------------------------------------------------------

/// Classification of one inbound cumulative ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// `send_base` moved forward, retiring `segments` buffer entries.
    Advanced { segments: usize },
    /// The ACK repeats the current `send_base` while data is in flight.
    /// `fast_retransmit` is `true` on exactly the third repetition.
    Duplicate { fast_retransmit: bool },
    /// Behind `send_base` or beyond `next_seq`; carries no information.
    Stale,
}

// ---------------------------------------------------------------------------
// SendWindow
// ---------------------------------------------------------------------------

/// Send-side window state for one connection.
///
/// # Sequence-number layout
///
/// ```text
///  send_base           next_seq
///      │                  │
///  ────┼──────────────────┼────────────────▶ seq space (mod 2^16)
///      │ ◀── in flight ──▶│ ◀── sendable while in_flight + MSS ≤ max_win
/// ```
#[derive(Debug)]
pub struct SendWindow {
    /// Sequence number of the oldest unacknowledged byte (left window edge).
    send_base: u16,
    /// Sequence number for the next new DATA segment.
    next_seq: u16,
    /// Window capacity in bytes.
    max_win: u32,
    /// In-flight segments ordered by sequence number (front = oldest).
    entries: VecDeque<SendEntry>,
    /// The most recent ACK sequence number processed.
    last_ack: u16,
    /// Consecutive repetitions of a non-advancing `send_base` ACK.
    dup_acks: u32,
}

impl SendWindow {
    /// Create a window whose first data byte is `first_seq` (`isn + 1`).
    pub fn new(first_seq: u16, max_win: u32) -> Self {
        Self {
            send_base: first_seq,
            next_seq: first_seq,
            max_win,
            entries: VecDeque::new(),
            last_ack: first_seq,
            dup_acks: 0,
        }
    }

    /// Left window edge: the oldest unacknowledged sequence number.
    pub fn send_base(&self) -> u16 {
        self.send_base
    }

    /// Sequence number the next new DATA segment will carry.
    pub fn next_seq(&self) -> u16 {
        self.next_seq
    }

    /// Bytes currently in flight: `(next_seq − send_base) mod 2^16`.
    pub fn in_flight(&self) -> u32 {
        u32::from(seq::distance(self.send_base, self.next_seq))
    }

    /// `true` while a further MSS-sized segment fits in the window.
    pub fn has_room(&self) -> bool {
        self.in_flight() + MSS as u32 <= self.max_win
    }

    /// `true` when at least one segment awaits acknowledgement.
    pub fn has_unacked(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Record a just-transmitted segment and advance `next_seq`.
    ///
    /// Returns the sequence number assigned to the segment.
    pub fn push(&mut self, payload: Vec<u8>) -> u16 {
        debug_assert!(self.has_room(), "push on a full window");
        let seq = self.next_seq;
        self.next_seq = seq::add(seq, payload.len());
        self.entries.push_back(SendEntry {
            seq,
            payload,
            tx_count: 1,
            sent_at: Instant::now(),
        });
        seq
    }

    /// Process one cumulative ACK and classify it.
    pub fn on_ack(&mut self, ack: u16) -> AckOutcome {
        let flight = seq::distance(self.send_base, self.next_seq);
        let dist = seq::distance(self.send_base, ack);

        if dist == 0 {
            // Non-advancing. It only counts as a duplicate while data is in
            // flight and it repeats the last cumulative ACK seen.
            if self.entries.is_empty() || ack != self.last_ack {
                self.last_ack = ack;
                return AckOutcome::Stale;
            }
            self.dup_acks += 1;
            let fast_retransmit = self.dup_acks == 3;
            if fast_retransmit {
                self.dup_acks = 0;
            }
            return AckOutcome::Duplicate { fast_retransmit };
        }

        if dist > flight {
            // Beyond next_seq (or behind send_base, which wraps to a huge
            // forward distance): ignore.
            return AckOutcome::Stale;
        }

        // Advancing: retire every entry whose last byte precedes `ack`.
        let mut segments = 0usize;
        while let Some(front) = self.entries.front() {
            let end_offset =
                u32::from(seq::distance(self.send_base, seq::add(front.seq, front.payload.len())));
            if end_offset <= u32::from(dist) {
                self.entries.pop_front();
                segments += 1;
            } else {
                break;
            }
        }
        self.send_base = ack;
        self.last_ack = ack;
        self.dup_acks = 0;
        AckOutcome::Advanced { segments }
    }

    /// The oldest unacknowledged segment, if any.
    pub fn oldest(&self) -> Option<&SendEntry> {
        self.entries.front()
    }

    /// Bump the transmission count of the oldest unacked segment after it
    /// has been retransmitted.
    pub fn mark_retransmitted(&mut self) {
        if let Some(entry) = self.entries.front_mut() {
            entry.tx_count += 1;
            entry.sent_at = Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with(first_seq: u16, max_win: u32, segments: &[usize]) -> SendWindow {
        let mut w = SendWindow::new(first_seq, max_win);
        for &len in segments {
            w.push(vec![0u8; len]);
        }
        w
    }

    #[test]
    fn initial_state() {
        let w = SendWindow::new(100, 3000);
        assert_eq!(w.send_base(), 100);
        assert_eq!(w.next_seq(), 100);
        assert_eq!(w.in_flight(), 0);
        assert!(w.has_room());
        assert!(!w.has_unacked());
    }

    #[test]
    fn push_advances_next_seq() {
        let mut w = SendWindow::new(0, 3000);
        let seq = w.push(vec![1u8; 1000]);
        assert_eq!(seq, 0);
        assert_eq!(w.next_seq(), 1000);
        assert_eq!(w.send_base(), 0);
        assert_eq!(w.in_flight(), 1000);
    }

    #[test]
    fn room_is_byte_granular() {
        // max_win 3000: room for three full segments, not a fourth.
        let mut w = window_with(0, 3000, &[1000, 1000]);
        assert!(w.has_room());
        w.push(vec![0u8; 1000]);
        assert!(!w.has_room());
    }

    #[test]
    fn short_final_segment_still_requires_full_mss_room() {
        let w = window_with(0, 3000, &[1000, 1000, 500]);
        // 2500 in flight + MSS > 3000.
        assert!(!w.has_room());
    }

    #[test]
    fn advancing_ack_retires_covered_entries() {
        let mut w = window_with(0, 5000, &[1000, 1000, 1000]);
        assert_eq!(w.on_ack(2000), AckOutcome::Advanced { segments: 2 });
        assert_eq!(w.send_base(), 2000);
        assert_eq!(w.in_flight(), 1000);
        assert_eq!(w.oldest().unwrap().seq, 2000);
    }

    #[test]
    fn ack_of_everything_empties_the_window() {
        let mut w = window_with(10, 5000, &[1000, 700]);
        assert_eq!(w.on_ack(1710), AckOutcome::Advanced { segments: 2 });
        assert!(!w.has_unacked());
        assert_eq!(w.in_flight(), 0);
    }

    #[test]
    fn third_duplicate_requests_exactly_one_fast_retransmit() {
        let mut w = window_with(0, 5000, &[1000, 1000]);
        assert_eq!(
            w.on_ack(0),
            AckOutcome::Duplicate { fast_retransmit: false }
        );
        assert_eq!(
            w.on_ack(0),
            AckOutcome::Duplicate { fast_retransmit: false }
        );
        assert_eq!(w.on_ack(0), AckOutcome::Duplicate { fast_retransmit: true });
        // Fourth and fifth duplicates alone do not re-trigger.
        assert_eq!(
            w.on_ack(0),
            AckOutcome::Duplicate { fast_retransmit: false }
        );
        assert_eq!(
            w.on_ack(0),
            AckOutcome::Duplicate { fast_retransmit: false }
        );
    }

    #[test]
    fn advancing_ack_resets_the_duplicate_counter() {
        let mut w = window_with(0, 5000, &[1000, 1000, 1000]);
        w.on_ack(0);
        w.on_ack(0);
        assert_eq!(w.on_ack(1000), AckOutcome::Advanced { segments: 1 });
        // Counter restarted: two duplicates of the new base do not trigger.
        assert_eq!(
            w.on_ack(1000),
            AckOutcome::Duplicate { fast_retransmit: false }
        );
        assert_eq!(
            w.on_ack(1000),
            AckOutcome::Duplicate { fast_retransmit: false }
        );
        assert_eq!(
            w.on_ack(1000),
            AckOutcome::Duplicate { fast_retransmit: true }
        );
    }

    #[test]
    fn non_advancing_ack_with_empty_window_is_stale() {
        let mut w = SendWindow::new(500, 3000);
        assert_eq!(w.on_ack(500), AckOutcome::Stale);
        assert_eq!(w.on_ack(500), AckOutcome::Stale);
    }

    #[test]
    fn ack_behind_send_base_is_stale() {
        let mut w = window_with(1000, 5000, &[1000]);
        w.on_ack(2000);
        assert_eq!(w.on_ack(1500), AckOutcome::Stale);
        assert_eq!(w.send_base(), 2000);
    }

    #[test]
    fn ack_beyond_next_seq_is_stale() {
        let mut w = window_with(0, 5000, &[1000]);
        assert_eq!(w.on_ack(4000), AckOutcome::Stale);
        assert_eq!(w.send_base(), 0);
    }

    #[test]
    fn mark_retransmitted_bumps_tx_count() {
        let mut w = window_with(0, 3000, &[1000]);
        assert_eq!(w.oldest().unwrap().tx_count, 1);
        w.mark_retransmitted();
        assert_eq!(w.oldest().unwrap().tx_count, 2);
    }

    #[test]
    fn window_arithmetic_survives_sequence_wrap() {
        // ISN 65000 → first data byte 65001; the transfer crosses 65535.
        let mut w = SendWindow::new(65_001, 5000);
        let s1 = w.push(vec![0u8; 1000]); // 65001..464
        let s2 = w.push(vec![0u8; 1000]); // 465..1464
        assert_eq!(s1, 65_001);
        assert_eq!(s2, 465);
        assert_eq!(w.in_flight(), 2000);

        assert_eq!(w.on_ack(465), AckOutcome::Advanced { segments: 1 });
        assert_eq!(w.send_base(), 465);
        assert_eq!(w.on_ack(1465), AckOutcome::Advanced { segments: 1 });
        assert!(!w.has_unacked());
    }
}
