//! Transport-level errors shared by connections, connectors and the Wi-Fi
//! station.

use core::fmt;

/// A failure below the MQTT protocol.
///
/// Platform drivers map their own error types onto these variants so the
/// session can log them the same way on every target.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The connection is not open.
    NotOpen,
    /// Writing to the connection failed or made no progress.
    WriteError,
    /// Reading from the connection failed.
    ReadError,
    /// The broker refused the TCP connection.
    ConnectionRefused,
    /// The connection did not deliver data in time.
    Timeout,
    /// The peer closed the connection, possibly in the middle of a packet.
    ConnectionClosed,
    /// The broker host name could not be resolved.
    InvalidAddress,
    /// The station could not scan for access points.
    ScanFailed,
    /// No configured network was in range, or association was rejected.
    AssociationFailed,
}

impl Error {
    /// Short name of the error, used for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Error::NotOpen => "not open",
            Error::WriteError => "write failed",
            Error::ReadError => "read failed",
            Error::ConnectionRefused => "connection refused",
            Error::Timeout => "timed out",
            Error::ConnectionClosed => "connection closed",
            Error::InvalidAddress => "invalid address",
            Error::ScanFailed => "scan failed",
            Error::AssociationFailed => "association failed",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str())
    }
}
