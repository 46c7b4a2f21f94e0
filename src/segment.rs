//! Wire-format definitions for protocol segments.
//!
//! Every datagram exchanged between peers is a [`Segment`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (type, sequence number, payload).
//! - Serialising a [`Segment`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Segment`], returning errors
//!   for malformed or truncated input.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! The header is 4 bytes: a big-endian `u16` segment type followed by a
//! big-endian `u16` sequence number.  Only DATA segments carry a payload,
//! of 1 to [`MSS`] bytes.  There is no checksum; the substrate is assumed
//! not to corrupt datagrams.

use std::fmt;

use thiserror::Error;

/// Maximum segment size: the largest DATA payload in bytes.
pub const MSS: usize = 1000;

/// Fixed header length in bytes.
pub const HEADER_LEN: usize = 4;

// ---------------------------------------------------------------------------
// SegmentKind
// ---------------------------------------------------------------------------

/// The five segment types, with their on-wire numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SegmentKind {
    /// Carries file bytes; the only type with a payload.
    Data = 0,
    /// Cumulative acknowledgement; `seq` is the next expected byte.
    Ack = 1,
    /// Handshake initiation; `seq` is the sender's ISN.
    Syn = 2,
    /// Teardown; `seq` is `isn + 1 + file_length`.
    Fin = 3,
    /// Abort the connection; always sent with `seq` 0.
    Reset = 4,
}

impl SegmentKind {
    fn from_wire(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Data),
            1 => Some(Self::Ack),
            2 => Some(Self::Syn),
            3 => Some(Self::Fin),
            4 => Some(Self::Reset),
            _ => None,
        }
    }

    /// Upper-case name as it appears in the trace log.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => "DATA",
            Self::Ack => "ACK",
            Self::Syn => "SYN",
            Self::Fin => "FIN",
            Self::Reset => "RESET",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// A complete protocol datagram: 4-byte header plus optional payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub seq: u16,
    pub payload: Vec<u8>,
}

impl Segment {
    /// Build a DATA segment.  `payload` must be 1..=[`MSS`] bytes.
    pub fn data(seq: u16, payload: Vec<u8>) -> Self {
        debug_assert!(!payload.is_empty() && payload.len() <= MSS);
        Self {
            kind: SegmentKind::Data,
            seq,
            payload,
        }
    }

    /// Build a payload-less control segment (ACK, SYN, FIN, RESET).
    pub fn control(kind: SegmentKind, seq: u16) -> Self {
        debug_assert!(kind != SegmentKind::Data);
        Self {
            kind,
            seq,
            payload: Vec::new(),
        }
    }

    /// Serialise this segment into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&(self.kind as u16).to_be_bytes());
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse a [`Segment`] from a raw datagram.
    ///
    /// Returns `Err` if the buffer is shorter than the header, the type is
    /// unknown, a control segment carries a payload, or a DATA payload is
    /// empty or longer than [`MSS`].
    pub fn decode(buf: &[u8]) -> Result<Self, SegmentError> {
        if buf.len() < HEADER_LEN {
            return Err(SegmentError::TooShort(buf.len()));
        }
        let raw_kind = u16::from_be_bytes([buf[0], buf[1]]);
        let kind = SegmentKind::from_wire(raw_kind).ok_or(SegmentError::UnknownKind(raw_kind))?;
        let seq = u16::from_be_bytes([buf[2], buf[3]]);
        let payload = &buf[HEADER_LEN..];

        match kind {
            SegmentKind::Data => {
                if payload.is_empty() || payload.len() > MSS {
                    return Err(SegmentError::PayloadLength(payload.len()));
                }
            }
            _ => {
                if !payload.is_empty() {
                    return Err(SegmentError::UnexpectedPayload(kind));
                }
            }
        }

        Ok(Self {
            kind,
            seq,
            payload: payload.to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    /// Datagram shorter than the fixed 4-byte header.
    #[error("datagram of {0} bytes is shorter than the 4-byte header")]
    TooShort(usize),
    /// The type field holds a value outside 0..=4.
    #[error("unknown segment type {0}")]
    UnknownKind(u16),
    /// A DATA payload outside 1..=MSS bytes.
    #[error("DATA payload of {0} bytes outside 1..={MSS}")]
    PayloadLength(usize),
    /// A control segment carried payload bytes.
    #[error("{0} segment must not carry a payload")]
    UnexpectedPayload(SegmentKind),
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let seg = Segment::data(517, vec![7u8; 42]);
        let decoded = Segment::decode(&seg.encode()).unwrap();
        assert_eq!(decoded, seg);
    }

    #[test]
    fn control_segment_is_four_bytes() {
        let seg = Segment::control(SegmentKind::Syn, 0xBEEF);
        let bytes = seg.encode();
        assert_eq!(bytes, vec![0x00, 0x02, 0xBE, 0xEF]);
        assert_eq!(Segment::decode(&bytes).unwrap(), seg);
    }

    #[test]
    fn decode_empty_buffer_returns_error() {
        assert_eq!(Segment::decode(&[]), Err(SegmentError::TooShort(0)));
        assert_eq!(Segment::decode(&[0, 1, 2]), Err(SegmentError::TooShort(3)));
    }

    #[test]
    fn decode_unknown_type_returns_error() {
        let bytes = [0x00, 0x05, 0x00, 0x00];
        assert_eq!(Segment::decode(&bytes), Err(SegmentError::UnknownKind(5)));
    }

    #[test]
    fn decode_ack_with_payload_returns_error() {
        let mut bytes = Segment::control(SegmentKind::Ack, 9).encode();
        bytes.push(0xFF);
        assert_eq!(
            Segment::decode(&bytes),
            Err(SegmentError::UnexpectedPayload(SegmentKind::Ack))
        );
    }

    #[test]
    fn decode_empty_data_returns_error() {
        let bytes = [0x00, 0x00, 0x01, 0x02];
        assert_eq!(Segment::decode(&bytes), Err(SegmentError::PayloadLength(0)));
    }

    #[test]
    fn decode_oversized_data_returns_error() {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x00];
        bytes.extend(std::iter::repeat(1u8).take(MSS + 1));
        assert_eq!(
            Segment::decode(&bytes),
            Err(SegmentError::PayloadLength(MSS + 1))
        );
    }

    #[test]
    fn header_is_big_endian() {
        let seg = Segment::data(0x0102, vec![0xAA]);
        assert_eq!(seg.encode(), vec![0x00, 0x00, 0x01, 0x02, 0xAA]);
    }
}
