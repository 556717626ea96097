//! A network abstraction layer for embedded systems
//!
//! This module provides the small set of traits the MQTT session needs from a
//! platform network stack: a byte stream that can be read, written, closed and
//! polled for readability, a connector that opens such streams, and a Wi-Fi
//! station that can scan for and associate with access points.
//!
//! Nothing in here blocks waiting for data. A session asks
//! [`Readable::poll_readable`] on every scheduler tick and only reads once the
//! connection reports that bytes are pending.

#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// Wi-Fi station abstraction
pub mod wifi;

/// Protocol implementations built on the network traits
pub mod application;

/// `std::net` implementations of the network traits
#[cfg(feature = "std")]
pub mod std_tcp;

/// Re-exports of common traits
pub mod prelude {
    pub use super::wifi::Station;
    pub use super::{Close, Connect, Connection, Read, Readable, Write};
}

/// A byte stream that can be read.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read data from the connection
    ///
    /// Returns `Ok(0)` once the peer has closed the stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// A byte stream that can be written.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// A connection that can be shut down.
pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// Non-blocking readiness check for a connection.
pub trait Readable {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Returns `true` when a subsequent [`Read::read`] will not wait for data,
    /// including the case where the peer has closed the stream.
    fn poll_readable(&mut self) -> Result<bool, Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close + Readable {}

/// A synchronous connector (client)
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Resolve `host` and open a TCP connection to `port`
    fn connect(&mut self, host: &str, port: u16) -> Result<Self::Connection, Self::Error>;
}
