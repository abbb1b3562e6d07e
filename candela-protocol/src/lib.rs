//! Candela display wire protocol
//!
//! This crate encodes application intents (display an image, switch mode,
//! set brightness, play an animation) into the framed binary packets the
//! device accepts, and decodes received bytes back into typed commands and
//! acknowledgements.
//!
//! # Frame format
//!
//! All packets use one marker-delimited, checksummed frame:
//! ```text
//! ┌───────┬────────┬──────────────────┬──────────┬─────┐
//! │ START │ LENGTH │ PAYLOAD          │ CHECKSUM │ END │
//! │ 0x01  │ u16 LE │ opcode + body    │ u16 LE   │ 0x02│
//! └───────┴────────┴──────────────────┴──────────┴─────┘
//! ```
//!
//! The length field counts the payload plus the two checksum bytes; the
//! checksum is the 16-bit modular sum of the length bytes and the payload.
//! Both conventions are pinned against packets captured from real hardware.

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(unsafe_code)]

pub mod checksum;
pub mod command;
pub mod events;
pub mod frame;

pub use command::{
    Animation, Command, CommandError, DateTime, DisplayMode, ImageFrame, MAX_ANIMATION_FRAMES,
};
pub use events::{AckStatus, DeviceEvent};
pub use frame::{Frame, FrameError, FrameParser, FRAME_END, FRAME_START, MAX_PAYLOAD_SIZE};
