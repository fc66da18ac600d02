//! Protocol module - wire format, command codes, and frame types.
//!
//! This module implements the QAP1 message layer:
//! - 16-byte header encoding/decoding
//! - Command code table
//! - Frame struct with typed accessors

mod command;
mod frame;
mod wire_format;

pub use command::Command;
pub use frame::{build_frame, Frame};
pub use wire_format::{status, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
