//! Events decoded from device-originated frames

use crate::command::CommandError;
use crate::frame::{Frame, FrameError};

/// Opcode of acknowledgement frames sent by the device
pub const RSP_ACK: u8 = 0x04;

/// Status byte the device reports for successful commands
const STATUS_OK: u8 = 0x55;

/// Outcome carried in an acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AckStatus {
    /// Command accepted
    Ok,
    /// Command rejected; the raw device status byte is preserved
    Error(u8),
}

impl AckStatus {
    /// Parse a status from its wire format byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            STATUS_OK => AckStatus::Ok,
            other => AckStatus::Error(other),
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            AckStatus::Ok => STATUS_OK,
            AckStatus::Error(byte) => byte,
        }
    }

    pub fn is_ok(self) -> bool {
        matches!(self, AckStatus::Ok)
    }
}

/// A validated event received from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceEvent {
    /// Acknowledgement of a previously sent command
    Ack {
        /// Opcode of the command being acknowledged
        command: u8,
        status: AckStatus,
    },
}

impl DeviceEvent {
    /// Decode an event from a received frame
    pub fn from_frame(frame: &Frame) -> Result<Self, CommandError> {
        match frame.command {
            RSP_ACK => {
                if frame.body.len() != 2 {
                    return Err(CommandError::InvalidPayload);
                }
                Ok(DeviceEvent::Ack {
                    command: frame.body[0],
                    status: AckStatus::from_byte(frame.body[1]),
                })
            }
            _ => Err(CommandError::UnknownCommand),
        }
    }

    /// Encode this event into a frame (for tests and device simulation)
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        match self {
            DeviceEvent::Ack { command, status } => {
                Frame::new(RSP_ACK, &[*command, status.to_byte()])
            }
        }
    }
}
