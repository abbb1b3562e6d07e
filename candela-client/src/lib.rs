//! High-level client for Candela LED matrix displays
//!
//! Wraps a byte transport (Bluetooth serial, a UART, a loopback in tests)
//! and drives the protocol crate: intents go in, framed packets go out,
//! acknowledgement frames come back through one resumable parser.
//!
//! Connection establishment, pairing and trust are the transport's
//! business; anything implementing [`Transport`] (or the `embedded-io`
//! traits) plugs in here.

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(unsafe_code)]

pub mod device;
pub mod transport;

pub use device::{Device, DeviceError};
pub use transport::Transport;
