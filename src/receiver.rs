//! Receiver endpoint: loss emulation, reassembly, ACK generation, lifecycle.
//!
//! One `select!` loop multiplexes the two things that can wake the
//! receiver: an inbound datagram, and the 2-second TIME_WAIT deadline after
//! the FIN is acknowledged.  Every inbound DATA/SYN/FIN segment first passes
//! the emulated loss channel; survivors drive the FSM, the reassembly
//! buffer, and the write-through to the output file.  ACKs are emitted
//! directly in response to received segments, so this loop is the only
//! writer to the socket.
//!
//! Segments inconsistent with the current state (DATA before the handshake,
//! a FIN ahead of the contiguous prefix, traffic after FIN) are answered
//! with a RESET and terminate the endpoint; an inbound RESET flushes what
//! was received and terminates.  Both paths still write the statistics
//! footer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::loss::LossChannel;
use crate::reassembly::{Disposition, ReassemblyBuffer};
use crate::segment::{Segment, SegmentKind};
use crate::seq;
use crate::socket::{SocketError, StpSocket};
use crate::state::ReceiverState;
use crate::timer::RetransmitTimer;
use crate::trace::{Direction, ReceiverStats, TraceLog};

/// Hard post-FIN wait before releasing the port and exiting.
const TIME_WAIT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Configuration and errors
// ---------------------------------------------------------------------------

/// Everything the receiver endpoint needs to run one transfer.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// UDP port the receiver binds on.
    pub local_port: u16,
    /// UDP port the sender transmits from.
    pub peer_port: u16,
    /// Where the received bytes are written.
    pub file: PathBuf,
    /// Where the segment trace log is written.
    pub log_path: PathBuf,
}

/// Failures that terminate the receiver.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// The peer aborted the connection.
    #[error("connection reset by peer")]
    PeerReset,
    /// A segment inconsistent with the current state arrived.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Run the receiver endpoint to completion.
///
/// The loss channel is passed in so callers control its seed.  Returns the
/// final statistics after TIME_WAIT elapses; the trace footer and output
/// flush happen on every exit path.
pub async fn run(
    config: ReceiverConfig,
    loss: LossChannel,
) -> Result<ReceiverStats, ReceiverError> {
    let socket = StpSocket::bind(config.local_port, config.peer_port).await?;
    let out = BufWriter::new(File::create(&config.file)?);
    let trace = TraceLog::create(&config.log_path)?;
    log::info!(
        "receiver on {} ← 127.0.0.1:{}",
        socket.local_addr,
        config.peer_port
    );

    let mut endpoint = Endpoint {
        socket,
        out,
        trace,
        loss,
        stats: ReceiverStats::default(),
        state: ReceiverState::Listen,
        peer_isn: 0,
        // Placeholder until the SYN carries the real ISN.
        reassembly: ReassemblyBuffer::new(0),
        fin_ack: 0,
        timer: RetransmitTimer::new(),
    };

    let result = endpoint.serve().await;

    // Whatever was delivered in order must reach the file, and the footer
    // must reflect the final state, even on abort paths.
    let _ = endpoint.out.flush();
    let _ = endpoint.trace.receiver_footer(&endpoint.stats);
    let _ = endpoint.trace.finish();

    result.map(|()| endpoint.stats)
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

struct Endpoint {
    socket: StpSocket,
    out: BufWriter<File>,
    trace: TraceLog,
    loss: LossChannel,
    stats: ReceiverStats,
    state: ReceiverState,
    /// The sender's ISN, learned from the SYN.
    peer_isn: u16,
    reassembly: ReassemblyBuffer,
    /// Acknowledgement number for the (possibly retransmitted) FIN.
    fin_ack: u16,
    /// Drives the TIME_WAIT deadline; disarmed until the FIN is ACKed.
    timer: RetransmitTimer,
}

impl Endpoint {
    /// Main loop: datagrams versus the TIME_WAIT deadline.
    async fn serve(&mut self) -> Result<(), ReceiverError> {
        loop {
            tokio::select! {
                _ = self.timer.expired(), if self.timer.is_armed() => {
                    self.state = ReceiverState::Closed;
                    log::info!("TIME_WAIT elapsed; closed");
                    return Ok(());
                }
                received = self.socket.recv() => {
                    let segment = match received {
                        Ok(segment) => segment,
                        Err(SocketError::Malformed(err)) => {
                            log::debug!("ignoring malformed datagram: {err}");
                            continue;
                        }
                        Err(err @ SocketError::Io(_)) => return Err(err.into()),
                    };
                    self.handle(segment).await?;
                }
            }
        }
    }

    /// Process one decoded inbound segment.
    async fn handle(&mut self, segment: Segment) -> Result<(), ReceiverError> {
        let kind = segment.kind;
        let seg_seq = segment.seq;
        let len = segment.payload.len();

        // The log clock starts at the first SYN sighting, dropped or not.
        if kind == SegmentKind::Syn && self.state == ReceiverState::Listen {
            self.trace.reset_origin();
        }

        // Emulated forward loss; RESET is exempt.
        if matches!(
            kind,
            SegmentKind::Data | SegmentKind::Syn | SegmentKind::Fin
        ) && self.loss.drop_inbound()
        {
            self.trace.segment(Direction::Drp, kind, seg_seq, len)?;
            if kind == SegmentKind::Data {
                self.stats.data_dropped += 1;
            }
            return Ok(());
        }

        self.trace.segment(Direction::Rcv, kind, seg_seq, len)?;

        if kind == SegmentKind::Reset {
            log::warn!("reset by peer in {}", self.state);
            self.state = ReceiverState::Closed;
            return Err(ReceiverError::PeerReset);
        }

        match self.state {
            ReceiverState::Listen => match kind {
                SegmentKind::Syn => {
                    self.peer_isn = seg_seq;
                    self.reassembly = ReassemblyBuffer::new(seq::add(seg_seq, 1));
                    self.state = ReceiverState::Established;
                    log::info!("established; peer isn={seg_seq}");
                    self.send_ack(self.reassembly.expected_seq()).await
                }
                _ => self.violation("segment before the handshake").await,
            },

            ReceiverState::Established => match kind {
                SegmentKind::Data => {
                    match self.reassembly.insert(seg_seq, segment.payload) {
                        Disposition::Delivered(run) => {
                            self.stats.segments_received += 1;
                            self.stats.bytes_received += len as u64;
                            for payload in &run {
                                self.out.write_all(payload)?;
                            }
                            self.out.flush()?;
                        }
                        Disposition::Buffered => {
                            self.stats.segments_received += 1;
                            self.stats.bytes_received += len as u64;
                        }
                        Disposition::Duplicate => {
                            log::debug!("duplicate DATA at {seg_seq}");
                            self.stats.dup_segments += 1;
                        }
                    }
                    self.send_ack(self.reassembly.expected_seq()).await
                }
                // The handshake ACK was lost; acknowledge the SYN again.
                SegmentKind::Syn if seg_seq == self.peer_isn => {
                    self.send_ack(self.reassembly.expected_seq()).await
                }
                SegmentKind::Syn => self.violation("SYN with a different ISN").await,
                SegmentKind::Fin if seg_seq == self.reassembly.expected_seq() => {
                    self.fin_ack = seq::add(seg_seq, 1);
                    self.send_ack(self.fin_ack).await?;
                    self.state = ReceiverState::TimeWait;
                    self.timer.arm(TIME_WAIT);
                    log::info!("FIN acknowledged; entering TIME_WAIT");
                    Ok(())
                }
                SegmentKind::Fin => self.violation("FIN ahead of contiguous data").await,
                _ => self.violation("unexpected segment type").await,
            },

            ReceiverState::TimeWait => match kind {
                // Our ACK of the FIN was lost; acknowledge again.  The
                // 2-second deadline keeps running.
                SegmentKind::Fin => self.send_ack(self.fin_ack).await,
                _ => self.violation("segment after FIN").await,
            },

            // Not reached: serve() returns as soon as the state closes.
            ReceiverState::Closed => Ok(()),
        }
    }

    /// Emit one cumulative ACK, subject to the reverse loss probability.
    async fn send_ack(&mut self, ack_seq: u16) -> Result<(), ReceiverError> {
        if self.loss.drop_outbound() {
            self.trace
                .segment(Direction::Drp, SegmentKind::Ack, ack_seq, 0)?;
            self.stats.acks_dropped += 1;
            return Ok(());
        }
        self.socket
            .send(&Segment::control(SegmentKind::Ack, ack_seq))
            .await?;
        self.trace
            .segment(Direction::Snd, SegmentKind::Ack, ack_seq, 0)?;
        Ok(())
    }

    /// Abort on a state-inconsistent segment: RESET, close, report.
    ///
    /// The RESET is never subject to the loss channel.
    async fn violation(&mut self, why: &'static str) -> Result<(), ReceiverError> {
        log::warn!("protocol violation in {}: {why}", self.state);
        self.socket
            .send(&Segment::control(SegmentKind::Reset, 0))
            .await?;
        self.trace
            .segment(Direction::Snd, SegmentKind::Reset, 0, 0)?;
        self.state = ReceiverState::Closed;
        Err(ReceiverError::ProtocolViolation(why))
    }
}
