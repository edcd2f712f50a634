//! WebSocket frame encoding and decoding (RFC 6455), client side.
//!
//! Only what a benchmark client needs: single-buffer parsing that reports
//! "need more data" as `Ok(None)`, and serialization with an optional
//! masking key. Extensions are never negotiated, so RSV bits are rejected.

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};

/// Maximum payload size for control frames.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Largest payload accepted from the peer.
pub const MAX_FRAME_PAYLOAD: usize = 16 * 1024 * 1024;

/// WebSocket frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Continuation of a fragmented message.
    Continuation = 0x0,
    /// UTF-8 text.
    Text = 0x1,
    /// Arbitrary bytes.
    Binary = 0x2,
    /// Close handshake.
    Close = 0x8,
    /// Keepalive request.
    Ping = 0x9,
    /// Keepalive response.
    Pong = 0xA,
}

impl OpCode {
    /// Decode the low nibble of the first header byte.
    ///
    /// # Errors
    ///
    /// Returns `Error::Frame` for reserved opcodes.
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(Error::Frame(format!("reserved opcode {:#x}", other))),
        }
    }

    /// Raw opcode value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Close, Ping and Pong are control opcodes.
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        (self as u8) & 0x8 != 0
    }
}

/// XOR `data` in place with the 4-byte masking key.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// A single WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Whether the frame arrived masked. Always `false` for outgoing frames;
    /// the mask is chosen at write time.
    pub masked: bool,
    /// Unmasked payload.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create an unfragmented frame.
    #[must_use]
    pub fn new(opcode: OpCode, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            fin: true,
            opcode,
            masked: false,
            payload: payload.into(),
        }
    }

    /// Create a text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(OpCode::Text, data)
    }

    /// Create a binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(OpCode::Binary, data)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(OpCode::Ping, data)
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(OpCode::Pong, data)
    }

    /// Create a close frame carrying a status code.
    #[must_use]
    pub fn close(code: u16) -> Self {
        Self::new(OpCode::Close, code.to_be_bytes().to_vec())
    }

    /// Status code of a close frame, if it carries one.
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match (self.opcode, self.payload.as_slice()) {
            (OpCode::Close, [hi, lo, ..]) => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Parse one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` when `buf` does not yet hold a complete frame,
    /// otherwise the frame and the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// - `Error::Frame` on reserved bits, reserved opcodes, fragmented or
    ///   oversized control frames, or payloads above [`MAX_FRAME_PAYLOAD`]
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>> {
        if buf.len() < 2 {
            return Ok(None);
        }

        let byte0 = buf[0];
        let byte1 = buf[1];

        if byte0 & 0x70 != 0 {
            return Err(Error::Frame("reserved bits set".into()));
        }
        let fin = byte0 & 0x80 != 0;
        let opcode = OpCode::from_u8(byte0 & 0x0F)?;
        let masked = byte1 & 0x80 != 0;

        let (payload_len, mut offset) = match byte1 & 0x7F {
            len @ 0..=125 => (len as u64, 2),
            126 => {
                if buf.len() < 4 {
                    return Ok(None);
                }
                (u16::from_be_bytes([buf[2], buf[3]]) as u64, 4)
            }
            _ => {
                if buf.len() < 10 {
                    return Ok(None);
                }
                let mut len = [0u8; 8];
                len.copy_from_slice(&buf[2..10]);
                (u64::from_be_bytes(len), 10)
            }
        };

        if payload_len > MAX_FRAME_PAYLOAD as u64 {
            return Err(Error::Frame(format!(
                "payload of {} bytes exceeds {}",
                payload_len, MAX_FRAME_PAYLOAD
            )));
        }
        let payload_len = payload_len as usize;

        if opcode.is_control() {
            if !fin {
                return Err(Error::Frame("fragmented control frame".into()));
            }
            if payload_len > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::Frame(format!(
                    "control frame payload of {} bytes",
                    payload_len
                )));
            }
        }

        let mask = if masked {
            if buf.len() < offset + 4 {
                return Ok(None);
            }
            let key = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
            offset += 4;
            Some(key)
        } else {
            None
        };

        let total = offset + payload_len;
        if buf.len() < total {
            return Ok(None);
        }

        let mut payload = buf[offset..total].to_vec();
        if let Some(key) = mask {
            apply_mask(&mut payload, key);
        }

        Ok(Some((
            Self {
                fin,
                opcode,
                masked,
                payload,
            },
            total,
        )))
    }

    /// Append the wire form of this frame to `buf`, masking the payload
    /// when `mask` is given.
    pub fn write_to(&self, buf: &mut BytesMut, mask: Option<[u8; 4]>) {
        buf.reserve(self.wire_size(mask.is_some()));

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        buf.put_u8(byte0);

        let mask_bit = if mask.is_some() { 0x80 } else { 0 };
        let len = self.payload.len();
        if len <= 125 {
            buf.put_u8(mask_bit | len as u8);
        } else if len <= u16::MAX as usize {
            buf.put_u8(mask_bit | 126);
            buf.put_u16(len as u16);
        } else {
            buf.put_u8(mask_bit | 127);
            buf.put_u64(len as u64);
        }

        match mask {
            Some(key) => {
                buf.put_slice(&key);
                let start = buf.len();
                buf.put_slice(&self.payload);
                apply_mask(&mut buf[start..], key);
            }
            None => buf.put_slice(&self.payload),
        }
    }

    /// Number of bytes [`write_to`](Frame::write_to) appends.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let len = self.payload.len();
        let extended = if len <= 125 {
            0
        } else if len <= u16::MAX as usize {
            2
        } else {
            8
        };
        2 + extended + if masked { 4 } else { 0 } + len
    }
}
