//! # MBAP Codec
//!
//! Framing of Modbus/TCP application data units.
//!
//! ```text
//! +----------------+-------------+--------+---------+---------------+
//! | Transaction ID | Protocol ID | Length | Unit ID | PDU           |
//! | 2 bytes (BE)   | 2 bytes = 0 | 2 (BE) | 1 byte  | Length-1 bytes|
//! +----------------+-------------+--------+---------+---------------+
//! ```
//!
//! TCP delivers a byte stream, so [`FrameDecoder`] buffers partial input
//! and only yields a frame once all `Length` bytes following the 6-byte
//! prefix have arrived.

use bytes::{Buf, BufMut, BytesMut};
use tracing::trace;

use crate::constants::{
    MAX_MBAP_LENGTH, MBAP_HEADER_LEN, MBAP_HEADER_WITH_UNIT_LEN, MIN_MBAP_LENGTH,
    MODBUS_PROTOCOL_ID,
};
use crate::error::{ModbusError, ModbusResult};
use crate::pdu::ModbusPdu;
use crate::protocol::{SlaveId, TransactionId};

/// Decoded MBAP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: TransactionId,
    pub protocol_id: u16,
    /// Bytes following the length field (Unit ID + PDU)
    pub length: u16,
    pub unit_id: SlaveId,
}

impl MbapHeader {
    /// Parse the 7-byte header
    ///
    /// Fails with [`ModbusError::Frame`] on a non-zero protocol id or a
    /// length field outside `2..=254`.
    pub fn decode(bytes: &[u8]) -> ModbusResult<Self> {
        if bytes.len() < MBAP_HEADER_WITH_UNIT_LEN {
            return Err(ModbusError::frame(format!(
                "truncated MBAP header: {} bytes",
                bytes.len()
            )));
        }

        let header = Self {
            transaction_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            protocol_id: u16::from_be_bytes([bytes[2], bytes[3]]),
            length: u16::from_be_bytes([bytes[4], bytes[5]]),
            unit_id: bytes[6],
        };
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> ModbusResult<()> {
        if self.protocol_id != MODBUS_PROTOCOL_ID {
            return Err(ModbusError::frame(format!(
                "invalid protocol id {} (transaction {})",
                self.protocol_id, self.transaction_id
            )));
        }
        let length = self.length as usize;
        if !(MIN_MBAP_LENGTH..=MAX_MBAP_LENGTH).contains(&length) {
            return Err(ModbusError::frame(format!(
                "invalid MBAP length {} (expected {}..={})",
                length, MIN_MBAP_LENGTH, MAX_MBAP_LENGTH
            )));
        }
        Ok(())
    }

    /// Total frame size on the wire
    #[inline]
    pub fn frame_len(&self) -> usize {
        MBAP_HEADER_LEN + self.length as usize
    }
}

/// One complete request frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: MbapHeader,
    /// Function code followed by its payload
    pub pdu: Vec<u8>,
}

impl Frame {
    #[inline]
    pub fn transaction_id(&self) -> TransactionId {
        self.header.transaction_id
    }

    #[inline]
    pub fn unit_id(&self) -> SlaveId {
        self.header.unit_id
    }

    /// Raw function code byte
    #[inline]
    pub fn function_code(&self) -> u8 {
        self.pdu[0]
    }
}

/// Incremental MBAP frame extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder;

impl FrameDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Split one complete frame off the front of `buf`
    ///
    /// Returns `Ok(None)` while the frame is still incomplete; the buffer
    /// is left untouched so the caller can append more bytes and retry.
    /// A malformed header is reported as soon as its seven bytes are
    /// available.
    pub fn decode(&mut self, buf: &mut BytesMut) -> ModbusResult<Option<Frame>> {
        if buf.len() < MBAP_HEADER_WITH_UNIT_LEN {
            return Ok(None);
        }

        let header = MbapHeader::decode(&buf[..MBAP_HEADER_WITH_UNIT_LEN])?;
        let frame_len = header.frame_len();
        if buf.len() < frame_len {
            trace!(
                "Partial frame: have {} of {} bytes (transaction {})",
                buf.len(),
                frame_len,
                header.transaction_id
            );
            return Ok(None);
        }

        let mut frame = buf.split_to(frame_len);
        frame.advance(MBAP_HEADER_WITH_UNIT_LEN);
        Ok(Some(Frame {
            header,
            pdu: frame.to_vec(),
        }))
    }
}

/// Encode a response ADU
///
/// The length field is `1 + pdu.len()`, i.e. unit id + function code +
/// payload.
pub fn encode_frame(
    transaction_id: TransactionId,
    unit_id: SlaveId,
    pdu: &ModbusPdu,
    dst: &mut BytesMut,
) {
    dst.reserve(MBAP_HEADER_WITH_UNIT_LEN + pdu.len());
    dst.put_u16(transaction_id);
    dst.put_u16(MODBUS_PROTOCOL_ID);
    dst.put_u16((pdu.len() + 1) as u16);
    dst.put_u8(unit_id);
    dst.put_slice(pdu.as_slice());
}

#[cfg(test)]
mod tests {
    use super::*;

    const READ_HOLDING: [u8; 12] = [
        0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x0A,
    ];

    #[test]
    fn test_header_decode() {
        let header = MbapHeader::decode(&READ_HOLDING).unwrap();
        assert_eq!(header.transaction_id, 1);
        assert_eq!(header.length, 6);
        assert_eq!(header.unit_id, 1);
        assert_eq!(header.frame_len(), 12);
    }

    #[test]
    fn test_header_rejects_protocol_id() {
        let mut bytes = READ_HOLDING;
        bytes[3] = 0x01;
        assert!(matches!(
            MbapHeader::decode(&bytes),
            Err(ModbusError::Frame { .. })
        ));
    }

    #[test]
    fn test_header_rejects_length() {
        let mut bytes = READ_HOLDING;
        bytes[5] = 0x01;
        assert!(MbapHeader::decode(&bytes).is_err());

        bytes[4] = 0x01;
        bytes[5] = 0x00;
        assert!(MbapHeader::decode(&bytes).is_err());
    }

    #[test]
    fn test_decode_waits_for_full_frame() {
        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::new();

        buf.extend_from_slice(&READ_HOLDING[..5]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(&READ_HOLDING[5..10]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 10);

        buf.extend_from_slice(&READ_HOLDING[10..]);
        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.transaction_id(), 1);
        assert_eq!(frame.unit_id(), 1);
        assert_eq!(frame.pdu, vec![0x03, 0x00, 0x00, 0x00, 0x0A]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_pipelined_frames() {
        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&READ_HOLDING);
        let mut second = READ_HOLDING;
        second[1] = 0x02;
        buf.extend_from_slice(&second);
        buf.extend_from_slice(&READ_HOLDING[..3]);

        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap().transaction_id(), 1);
        assert_eq!(decoder.decode(&mut buf).unwrap().unwrap().transaction_id(), 2);
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_encode_frame() {
        let pdu = ModbusPdu::from_slice(&[0x03, 0x02, 0x00, 0x7B]).unwrap();
        let mut out = BytesMut::new();
        encode_frame(0x1234, 1, &pdu, &mut out);
        assert_eq!(
            &out[..],
            &[0x12, 0x34, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x7B]
        );
    }
}
