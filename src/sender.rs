//! Sender endpoint: connection lifecycle plus the transmit engine.
//!
//! # Architecture
//!
//! ```text
//!              ┌───────────────────┐   PeerEvent (mpsc)   ┌───────────────┐
//!  socket ────▶│   receive task    │─────────────────────▶│ transmit loop │
//!              │ (decode ACK/RESET)│                      │ (select!)     │
//!              └───────────────────┘                      │  ├ fill window│
//!                                                         │  ├ ACK events │
//!                                                         │  └ one timer  │
//!              socket ◀───────────────────────────────────┴───────────────┘
//! ```
//!
//! The receive task blocks on the socket, decodes inbound segments, and
//! forwards ACK/RESET events over a channel; the transmit loop owns every
//! piece of window state and consumes those events between sends and timer
//! expirations.  Handing parsed events across a channel instead of sharing
//! the window behind a lock keeps `send_base` monotonic by construction and
//! makes fast-retransmit detection a pure function of the ACK stream.
//!
//! The connection lifecycle wraps the transmit loop: a SYN exchange before
//! (at most 4 transmissions at `rto` spacing), a FIN exchange after, and a
//! RESET plus non-success exit when either exchange is exhausted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

use crate::segment::{Segment, SegmentKind, MSS};
use crate::seq;
use crate::socket::{SocketError, StpSocket};
use crate::state::SenderState;
use crate::timer::RetransmitTimer;
use crate::trace::{Direction, SenderStats, TraceLog};
use crate::window::{AckOutcome, SendWindow};

/// Largest input file accepted, in bytes.
pub const MAX_FILE_LEN: usize = 800 * 1024;

/// SYN/FIN transmission budget: one initial copy plus three retransmissions.
const MAX_CONTROL_TRANSMISSIONS: u32 = 4;

/// Depth of the receive-task → transmit-loop event queue.
const EVENT_QUEUE: usize = 64;

// ---------------------------------------------------------------------------
// Configuration and errors
// ---------------------------------------------------------------------------

/// Everything the sender endpoint needs to run one transfer.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// UDP port the sender binds on.
    pub local_port: u16,
    /// UDP port the receiver listens on.
    pub peer_port: u16,
    /// File to transmit (at most [`MAX_FILE_LEN`] bytes).
    pub file: PathBuf,
    /// Window capacity in bytes; a positive multiple of MSS.
    pub max_win: u32,
    /// Retransmission timeout.
    pub rto: Duration,
    /// Where the segment trace log is written.
    pub log_path: PathBuf,
    /// Fixed ISN for reproducible runs; drawn at random when `None`.
    pub isn: Option<u16>,
}

/// Failures that terminate the sender.
#[derive(Debug, Error)]
pub enum SenderError {
    /// The input file exceeds [`MAX_FILE_LEN`].
    #[error("input file of {0} bytes exceeds the {MAX_FILE_LEN}-byte limit")]
    FileTooLarge(usize),
    /// No ACK of the SYN after every transmission attempt.
    #[error("no ACK of SYN after {MAX_CONTROL_TRANSMISSIONS} transmissions")]
    HandshakeExhausted,
    /// No ACK of the FIN after every transmission attempt.
    #[error("no ACK of FIN after {MAX_CONTROL_TRANSMISSIONS} transmissions")]
    TeardownExhausted,
    /// The peer aborted the connection.
    #[error("connection reset by peer")]
    PeerReset,
    /// The receive task stopped while the connection was still live.
    #[error("receive path terminated unexpectedly")]
    ReceivePathClosed,
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Peer events
// ---------------------------------------------------------------------------

/// A decoded inbound segment relevant to the sender.
#[derive(Debug, Clone, Copy)]
enum PeerEvent {
    /// Cumulative acknowledgement carrying its sequence number.
    Ack(u16),
    /// Connection abort; carries the (nominally zero) sequence number.
    Reset(u16),
}

/// Receive context: block on the socket, decode, forward ACK/RESET events.
///
/// Malformed datagrams and segment types the sender never expects are
/// dropped here.  The task ends after forwarding a RESET, when the transmit
/// loop goes away, or on a socket-level failure.
async fn receive_loop(socket: Arc<StpSocket>, events: mpsc::Sender<PeerEvent>) {
    loop {
        match socket.recv().await {
            Ok(segment) => {
                let event = match segment.kind {
                    SegmentKind::Ack => PeerEvent::Ack(segment.seq),
                    SegmentKind::Reset => PeerEvent::Reset(segment.seq),
                    other => {
                        log::debug!("ignoring unexpected {other} segment");
                        continue;
                    }
                };
                let last = matches!(event, PeerEvent::Reset(_));
                if events.send(event).await.is_err() || last {
                    break;
                }
            }
            Err(SocketError::Malformed(err)) => {
                log::debug!("ignoring malformed datagram: {err}");
            }
            Err(SocketError::Io(err)) => {
                log::warn!("receive path failed: {err}");
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Run the sender endpoint to completion.
///
/// Returns the final statistics on a clean close.  The trace footer is
/// written on every exit path, including RESET-triggered ones.
pub async fn run(config: SenderConfig) -> Result<SenderStats, SenderError> {
    let data = tokio::fs::read(&config.file).await?;
    if data.len() > MAX_FILE_LEN {
        return Err(SenderError::FileTooLarge(data.len()));
    }

    let socket = Arc::new(StpSocket::bind(config.local_port, config.peer_port).await?);
    let trace = TraceLog::create(&config.log_path)?;
    let isn = config.isn.unwrap_or_else(|| rand::rng().random());
    log::info!(
        "sender on {} → 127.0.0.1:{}, {} bytes, isn={isn}",
        socket.local_addr,
        config.peer_port,
        data.len()
    );

    let (event_tx, events) = mpsc::channel(EVENT_QUEUE);
    let receive_task = tokio::spawn(receive_loop(Arc::clone(&socket), event_tx));

    let mut endpoint = Endpoint {
        socket,
        events,
        trace,
        stats: SenderStats::default(),
        state: SenderState::Closed,
        rto: config.rto,
        isn,
    };

    let result = endpoint.connection(&data, config.max_win).await;
    receive_task.abort();

    // The footer must reflect the final state even on failure paths.
    let _ = endpoint.trace.sender_footer(&endpoint.stats);
    let _ = endpoint.trace.finish();

    result.map(|()| endpoint.stats)
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Transmit context: owns the window, the timer, the trace, and the FSM.
struct Endpoint {
    socket: Arc<StpSocket>,
    events: mpsc::Receiver<PeerEvent>,
    trace: TraceLog,
    stats: SenderStats,
    state: SenderState,
    rto: Duration,
    isn: u16,
}

impl Endpoint {
    /// Drive one complete connection: handshake, data transfer, teardown.
    async fn connection(&mut self, data: &[u8], max_win: u32) -> Result<(), SenderError> {
        self.state = SenderState::SynSent;
        if !self.control_exchange(SegmentKind::Syn, self.isn).await? {
            return Err(SenderError::HandshakeExhausted);
        }
        self.state = SenderState::Established;
        log::info!("established");

        self.pump(data, max_win).await?;

        self.state = SenderState::Closing;
        let fin_seq = seq::add(self.isn, data.len() + 1);
        if !self.control_exchange(SegmentKind::Fin, fin_seq).await? {
            return Err(SenderError::TeardownExhausted);
        }
        self.state = SenderState::Closed;
        log::info!("closed");
        Ok(())
    }

    /// SYN or FIN exchange: transmit, then wait `rto` for the matching ACK,
    /// retransmitting up to the budget.
    ///
    /// Returns `Ok(true)` on the expected ACK and `Ok(false)` once the
    /// budget is exhausted — a RESET has then been sent and the connection
    /// is closed.
    async fn control_exchange(
        &mut self,
        kind: SegmentKind,
        seg_seq: u16,
    ) -> Result<bool, SenderError> {
        let want = seq::add(seg_seq, 1);
        for attempt in 0..MAX_CONTROL_TRANSMISSIONS {
            if attempt > 0 {
                log::debug!("{kind} retransmission {attempt}");
            }
            self.socket.send(&Segment::control(kind, seg_seq)).await?;
            self.trace.segment(Direction::Snd, kind, seg_seq, 0)?;
            if kind == SegmentKind::Fin {
                self.state = SenderState::FinWait;
            }

            let deadline = Instant::now() + self.rto;
            loop {
                let event = match timeout_at(deadline, self.events.recv()).await {
                    Err(_) => break, // rto elapsed — retransmit
                    Ok(None) => return Err(SenderError::ReceivePathClosed),
                    Ok(Some(event)) => event,
                };
                match event {
                    PeerEvent::Ack(ack) => {
                        self.trace.segment(Direction::Rcv, SegmentKind::Ack, ack, 0)?;
                        if ack == want {
                            return Ok(true);
                        }
                        // Stale ACK (a late data re-acknowledgement): keep
                        // waiting out the current deadline.
                    }
                    PeerEvent::Reset(rseq) => {
                        self.trace
                            .segment(Direction::Rcv, SegmentKind::Reset, rseq, 0)?;
                        self.state = SenderState::Closed;
                        return Err(SenderError::PeerReset);
                    }
                }
            }
        }

        self.send_reset().await?;
        self.state = SenderState::Closed;
        Ok(false)
    }

    /// The transmit engine: move every file byte through the window.
    ///
    /// Each iteration first fills the window with new segments, then waits
    /// on whichever comes first — a peer event or the retransmission timer.
    /// The timer is armed iff at least one segment is unacknowledged.
    async fn pump(&mut self, data: &[u8], max_win: u32) -> Result<(), SenderError> {
        let mut window = SendWindow::new(seq::add(self.isn, 1), max_win);
        let mut timer = RetransmitTimer::new();
        let mut offset = 0usize;

        while offset < data.len() || window.has_unacked() {
            while offset < data.len() && window.has_room() {
                let len = MSS.min(data.len() - offset);
                let payload = data[offset..offset + len].to_vec();
                let seg_seq = window.push(payload.clone());
                self.socket.send(&Segment::data(seg_seq, payload)).await?;
                self.trace
                    .segment(Direction::Snd, SegmentKind::Data, seg_seq, len)?;
                self.stats.segments_sent += 1;
                self.stats.bytes_sent += len as u64;
                offset += len;
                if !timer.is_armed() {
                    timer.arm(self.rto);
                }
            }

            tokio::select! {
                event = self.events.recv() => match event {
                    None => return Err(SenderError::ReceivePathClosed),
                    Some(PeerEvent::Reset(rseq)) => {
                        self.trace.segment(Direction::Rcv, SegmentKind::Reset, rseq, 0)?;
                        self.state = SenderState::Closed;
                        return Err(SenderError::PeerReset);
                    }
                    Some(PeerEvent::Ack(ack)) => {
                        self.trace.segment(Direction::Rcv, SegmentKind::Ack, ack, 0)?;
                        match window.on_ack(ack) {
                            AckOutcome::Advanced { segments } => {
                                log::debug!("ack {ack} retired {segments} segment(s)");
                                if window.has_unacked() {
                                    // Restart for the new oldest segment.
                                    timer.arm(self.rto);
                                } else {
                                    timer.disarm();
                                }
                            }
                            AckOutcome::Duplicate { fast_retransmit } => {
                                self.stats.dup_acks += 1;
                                if fast_retransmit {
                                    log::debug!("fast retransmit at {}", window.send_base());
                                    self.retransmit_oldest(&mut window).await?;
                                    timer.arm(self.rto);
                                }
                            }
                            AckOutcome::Stale => {}
                        }
                    }
                },
                _ = timer.expired(), if timer.is_armed() => {
                    log::debug!("timeout at {}", window.send_base());
                    self.retransmit_oldest(&mut window).await?;
                    timer.arm(self.rto);
                }
            }
        }
        Ok(())
    }

    /// Retransmit the oldest unacknowledged segment, if any.
    async fn retransmit_oldest(&mut self, window: &mut SendWindow) -> Result<(), SenderError> {
        let segment = match window.oldest() {
            Some(entry) => Segment::data(entry.seq, entry.payload.clone()),
            None => return Ok(()),
        };
        let len = segment.payload.len();
        let seg_seq = segment.seq;
        self.socket.send(&segment).await?;
        self.trace
            .segment(Direction::Snd, SegmentKind::Data, seg_seq, len)?;
        self.stats.retransmissions += 1;
        window.mark_retransmitted();
        Ok(())
    }

    /// Abort the connection: RESET always carries sequence number 0.
    async fn send_reset(&mut self) -> Result<(), SenderError> {
        log::warn!("transmission budget exhausted in {}; resetting", self.state);
        self.socket
            .send(&Segment::control(SegmentKind::Reset, 0))
            .await?;
        self.trace
            .segment(Direction::Snd, SegmentKind::Reset, 0, 0)?;
        Ok(())
    }
}
