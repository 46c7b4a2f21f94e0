//! Per-endpoint segment trace log and transfer statistics.
//!
//! Each endpoint writes a log file recording every segment it sends,
//! receives, or (receiver only) drops, one tab-separated line per segment:
//!
//! ```text
//! snd	0.00	SYN	63283	0
//! rcv	1.84	ACK	63284	0
//! snd	1.92	DATA	63284	1000
//! ```
//!
//! Times are milliseconds since the clock origin — the first recorded
//! segment.  The sender's origin is therefore its initial SYN transmission;
//! the receiver calls [`TraceLog::reset_origin`] when a SYN arrives so its
//! clock starts at SYN reception even when the loss channel drops it.
//!
//! A statistics footer is appended on every exit path, normal or not, so the
//! log always reflects the final state of the transfer.
//!
//! This file is a protocol artifact, not diagnostics — debug output goes
//! through the `log` facade instead.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::segment::SegmentKind;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// What happened to the segment being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Transmitted to the peer.
    Snd,
    /// Received from the peer.
    Rcv,
    /// Discarded by the emulated loss channel.
    Drp,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Snd => "snd",
            Self::Rcv => "rcv",
            Self::Drp => "drp",
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Counters reported in the sender's footer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Unique file bytes transmitted (retransmissions not re-counted).
    pub bytes_sent: u64,
    /// Unique DATA segments transmitted.
    pub segments_sent: u64,
    /// DATA retransmissions (timer and fast retransmit).
    pub retransmissions: u64,
    /// Duplicate acknowledgements observed.
    pub dup_acks: u64,
}

/// Counters reported in the receiver's footer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Unique data bytes accepted (delivered or buffered).
    pub bytes_received: u64,
    /// Unique DATA segments accepted.
    pub segments_received: u64,
    /// DATA segments whose bytes were already held.
    pub dup_segments: u64,
    /// DATA segments discarded by the loss channel.
    pub data_dropped: u64,
    /// ACK segments discarded by the loss channel.
    pub acks_dropped: u64,
}

// ---------------------------------------------------------------------------
// TraceLog
// ---------------------------------------------------------------------------

/// Buffered writer for one endpoint's trace file.
#[derive(Debug)]
pub struct TraceLog {
    out: BufWriter<File>,
    origin: Option<Instant>,
}

impl TraceLog {
    /// Create (truncating) the trace file at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self {
            out: BufWriter::new(File::create(path)?),
            origin: None,
        })
    }

    /// Restart the clock: the next recorded segment reads `0.00`.
    pub fn reset_origin(&mut self) {
        self.origin = None;
    }

    fn elapsed_ms(&mut self) -> f64 {
        match self.origin {
            Some(origin) => origin.elapsed().as_secs_f64() * 1000.0,
            None => {
                self.origin = Some(Instant::now());
                0.0
            }
        }
    }

    /// Record one segment event.
    pub fn segment(
        &mut self,
        dir: Direction,
        kind: SegmentKind,
        seq: u16,
        payload_len: usize,
    ) -> io::Result<()> {
        let t = self.elapsed_ms();
        writeln!(
            self.out,
            "{}\t{:.2}\t{}\t{}\t{}",
            dir.as_str(),
            t,
            kind,
            seq,
            payload_len
        )
    }

    /// Append the sender's statistics footer.
    pub fn sender_footer(&mut self, stats: &SenderStats) -> io::Result<()> {
        writeln!(self.out, "Data Transferred: {} bytes", stats.bytes_sent)?;
        writeln!(self.out, "Data Segments Sent: {}", stats.segments_sent)?;
        writeln!(
            self.out,
            "Retransmitted Data Segments: {}",
            stats.retransmissions
        )?;
        writeln!(self.out, "Duplicate Acknowledgements: {}", stats.dup_acks)
    }

    /// Append the receiver's statistics footer.
    pub fn receiver_footer(&mut self, stats: &ReceiverStats) -> io::Result<()> {
        writeln!(self.out, "Data Received: {} bytes", stats.bytes_received)?;
        writeln!(
            self.out,
            "Data Segments Received: {}",
            stats.segments_received
        )?;
        writeln!(
            self.out,
            "Duplicate Data Segments Received: {}",
            stats.dup_segments
        )?;
        writeln!(self.out, "Data Segments Dropped: {}", stats.data_dropped)?;
        writeln!(self.out, "ACK Segments Dropped: {}", stats.acks_dropped)
    }

    /// Flush buffered lines to disk.
    pub fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn temp_path(name: &str) -> std::path::PathBuf {
        static SERIAL: AtomicU32 = AtomicU32::new(0);
        let n = SERIAL.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("stp-trace-{}-{}-{}", std::process::id(), n, name))
    }

    #[test]
    fn first_line_reads_zero_and_fields_are_tab_separated() {
        let path = temp_path("first.txt");
        let mut log = TraceLog::create(&path).unwrap();
        log.segment(Direction::Snd, SegmentKind::Syn, 63_283, 0).unwrap();
        log.segment(Direction::Rcv, SegmentKind::Ack, 63_284, 0).unwrap();
        log.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "snd\t0.00\tSYN\t63283\t0");
        let second: Vec<&str> = lines.next().unwrap().split('\t').collect();
        assert_eq!(second[0], "rcv");
        assert_eq!(second[2], "ACK");
        assert_eq!(second[3], "63284");
        assert_eq!(second[4], "0");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn reset_origin_restarts_the_clock() {
        let path = temp_path("reset.txt");
        let mut log = TraceLog::create(&path).unwrap();
        log.segment(Direction::Drp, SegmentKind::Syn, 1, 0).unwrap();
        log.reset_origin();
        log.segment(Direction::Rcv, SegmentKind::Syn, 1, 0).unwrap();
        log.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        for line in text.lines() {
            assert!(line.starts_with("drp\t0.00") || line.starts_with("rcv\t0.00"));
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn footers_match_the_expected_wording() {
        let path = temp_path("footer.txt");
        let mut log = TraceLog::create(&path).unwrap();
        log.sender_footer(&SenderStats {
            bytes_sent: 3500,
            segments_sent: 4,
            retransmissions: 1,
            dup_acks: 2,
        })
        .unwrap();
        log.receiver_footer(&ReceiverStats {
            bytes_received: 3500,
            segments_received: 4,
            dup_segments: 1,
            data_dropped: 1,
            acks_dropped: 0,
        })
        .unwrap();
        log.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Data Transferred: 3500 bytes"));
        assert!(text.contains("Data Segments Sent: 4"));
        assert!(text.contains("Retransmitted Data Segments: 1"));
        assert!(text.contains("Duplicate Acknowledgements: 2"));
        assert!(text.contains("Data Received: 3500 bytes"));
        assert!(text.contains("Data Segments Received: 4"));
        assert!(text.contains("Duplicate Data Segments Received: 1"));
        assert!(text.contains("Data Segments Dropped: 1"));
        assert!(text.contains("ACK Segments Dropped: 0"));
        std::fs::remove_file(&path).ok();
    }
}
