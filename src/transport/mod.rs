//! Transport module - connected streams and message I/O.
//!
//! Provides:
//! - [`Connector`] / [`TcpConnector`] to open a stream to a server
//! - [`FrameTransport`] to read and write whole messages on it

mod frame_io;
mod tcp;

pub use frame_io::FrameTransport;
pub use tcp::{Connector, TcpConnector};
