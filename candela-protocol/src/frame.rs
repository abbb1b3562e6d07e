//! Frame encoding and the resumable frame parser
//!
//! Frame format:
//! - START (1 byte): 0x01
//! - LENGTH (2 bytes, LE): payload length + 2 (the checksum is counted)
//! - PAYLOAD: opcode byte followed by a command-specific body
//! - CHECKSUM (2 bytes, LE): modular 16-bit sum of LENGTH and PAYLOAD bytes
//! - END (1 byte): 0x02

use heapless::Vec;

use crate::checksum;

/// Frame start marker
pub const FRAME_START: u8 = 0x01;

/// Frame end marker
pub const FRAME_END: u8 = 0x02;

/// Maximum payload size in bytes (opcode + body); the device buffer limit
pub const MAX_PAYLOAD_SIZE: usize = 8192;

/// Maximum body size (payload minus the opcode byte)
pub const MAX_BODY_SIZE: usize = MAX_PAYLOAD_SIZE - 1;

/// Maximum complete frame size (START + LENGTH + PAYLOAD + CHECKSUM + END)
pub const MAX_FRAME_SIZE: usize = 1 + 2 + MAX_PAYLOAD_SIZE + 2 + 1;

/// Smallest legal length field value: checksum plus an opcode byte
const MIN_LENGTH: u16 = 3;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds the device buffer limit
    PayloadTooLarge,
    /// Frame checksum does not match its contents
    ChecksumMismatch,
    /// End marker missing where one was expected
    UnexpectedEndMarker,
    /// Declared length outside the legal range
    InvalidLength,
    /// Buffer too small for encoding
    BufferTooSmall,
}

/// A parsed or constructed frame: one opcode plus its body
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    /// Command opcode (first payload byte)
    pub command: u8,
    /// Command-specific body (remaining payload bytes)
    pub body: Vec<u8, MAX_BODY_SIZE>,
}

impl Frame {
    /// Create a new frame with the given opcode and body
    pub fn new(command: u8, body: &[u8]) -> Result<Self, FrameError> {
        let mut body_vec = Vec::new();
        body_vec
            .extend_from_slice(body)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self {
            command,
            body: body_vec,
        })
    }

    /// Create a frame with an opcode and no body
    pub fn empty(command: u8) -> Self {
        Self {
            command,
            body: Vec::new(),
        }
    }

    /// Value of the wire length field: payload plus checksum bytes
    pub fn length_field(&self) -> u16 {
        (1 + self.body.len() + 2) as u16
    }

    /// Total encoded size of this frame in bytes
    pub fn encoded_len(&self) -> usize {
        1 + 2 + 1 + self.body.len() + 2 + 1
    }

    /// Checksum over the length bytes and payload
    fn compute_checksum(length: u16, command: u8, body: &[u8]) -> u16 {
        checksum::compute(&[(length & 0xff) as u8, (length >> 8) as u8, command])
            .wrapping_add(checksum::compute(body))
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written.
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let total = self.encoded_len();
        if buffer.len() < total {
            return Err(FrameError::BufferTooSmall);
        }

        let length = self.length_field();
        let sum = Self::compute_checksum(length, self.command, &self.body);

        buffer[0] = FRAME_START;
        buffer[1] = (length & 0xff) as u8;
        buffer[2] = (length >> 8) as u8;
        buffer[3] = self.command;
        buffer[4..4 + self.body.len()].copy_from_slice(&self.body);
        buffer[4 + self.body.len()] = (sum & 0xff) as u8;
        buffer[5 + self.body.len()] = (sum >> 8) as u8;
        buffer[total - 1] = FRAME_END;

        Ok(total)
    }

    /// Encode this frame into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut vec = Vec::new();
        vec.resize_default(self.encoded_len())
            .map_err(|_| FrameError::BufferTooSmall)?;
        self.encode(&mut vec)?;
        Ok(vec)
    }
}

/// State machine for parsing incoming frames
///
/// The transport delivers bytes with arbitrary fragmentation; the parser
/// keeps its partial state between calls and resynchronizes at the next
/// start marker after any corrupted frame. One instance per connection.
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParseState,
    buffer: Vec<u8, MAX_BODY_SIZE>,
    length: u16,
    command: u8,
    claimed_checksum: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Discarding bytes until a start marker appears
    SeekStart,
    /// Collecting the low length byte
    ReadLengthLow,
    /// Collecting the high length byte
    ReadLengthHigh,
    /// Collecting the opcode (first payload byte)
    ReadOpcode,
    /// Collecting the body
    ReadBody,
    /// Collecting the low checksum byte
    ReadChecksumLow,
    /// Collecting the high checksum byte
    ReadChecksumHigh,
    /// Expecting the end marker, then verify and emit
    ReadEnd,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a new frame parser
    pub fn new() -> Self {
        Self {
            state: ParseState::SeekStart,
            buffer: Vec::new(),
            length: 0,
            command: 0,
            claimed_checksum: 0,
        }
    }

    /// Reset the parser state, discarding any buffered frame
    pub fn reset(&mut self) {
        self.state = ParseState::SeekStart;
        self.buffer.clear();
        self.length = 0;
        self.command = 0;
        self.claimed_checksum = 0;
    }

    /// Body length implied by the wire length field
    fn body_len(&self) -> usize {
        self.length as usize - MIN_LENGTH as usize
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(frame))` when a complete valid frame is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` when the frame in
    /// progress was discarded. Errors are recoverable: the parser has
    /// already resynchronized and the caller may keep feeding bytes.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        match self.state {
            ParseState::SeekStart => {
                if byte == FRAME_START {
                    self.state = ParseState::ReadLengthLow;
                }
                // Silently discard bytes between frames
                Ok(None)
            }
            ParseState::ReadLengthLow => {
                self.length = byte as u16;
                self.state = ParseState::ReadLengthHigh;
                Ok(None)
            }
            ParseState::ReadLengthHigh => {
                self.length |= (byte as u16) << 8;
                if self.length < MIN_LENGTH || self.length as usize > MAX_PAYLOAD_SIZE + 2 {
                    self.reset();
                    return Err(FrameError::InvalidLength);
                }
                self.state = ParseState::ReadOpcode;
                Ok(None)
            }
            ParseState::ReadOpcode => {
                self.command = byte;
                self.buffer.clear();
                if self.body_len() == 0 {
                    self.state = ParseState::ReadChecksumLow;
                } else {
                    self.state = ParseState::ReadBody;
                }
                Ok(None)
            }
            ParseState::ReadBody => {
                // Length was bounds-checked, push cannot fail
                let _ = self.buffer.push(byte);
                if self.buffer.len() == self.body_len() {
                    self.state = ParseState::ReadChecksumLow;
                }
                Ok(None)
            }
            ParseState::ReadChecksumLow => {
                self.claimed_checksum = byte as u16;
                self.state = ParseState::ReadChecksumHigh;
                Ok(None)
            }
            ParseState::ReadChecksumHigh => {
                self.claimed_checksum |= (byte as u16) << 8;
                self.state = ParseState::ReadEnd;
                Ok(None)
            }
            ParseState::ReadEnd => {
                if byte != FRAME_END {
                    self.reset();
                    return Err(FrameError::UnexpectedEndMarker);
                }

                let expected =
                    Frame::compute_checksum(self.length, self.command, &self.buffer);
                if self.claimed_checksum != expected {
                    self.reset();
                    return Err(FrameError::ChecksumMismatch);
                }

                let frame = Frame {
                    command: self.command,
                    body: self.buffer.clone(),
                };
                self.reset();
                Ok(Some(frame))
            }
        }
    }

    /// Feed multiple bytes to the parser
    ///
    /// Returns the first complete frame found, if any. Bytes after that
    /// frame are not consumed; feed them again to continue.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<Option<Frame>, FrameError> {
        for &byte in bytes {
            if let Some(frame) = self.feed(byte)? {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}
