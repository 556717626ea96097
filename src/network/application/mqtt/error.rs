//! Error types for the MQTT codec and session.

use crate::network::error::Error as NetworkError;

/// Return code carried by a `CONNACK` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReturnCode {
    /// The connection was accepted.
    Accepted,
    /// The broker does not support protocol level 4.
    UnacceptableProtocolVersion,
    /// The client identifier is not allowed.
    IdentifierRejected,
    /// The MQTT service is unavailable.
    ServerUnavailable,
    /// The username or password is malformed or wrong.
    BadUserNameOrPassword,
    /// The client is not authorized to connect.
    NotAuthorized,
    /// A code outside the MQTT 3.1.1 table.
    Other(u8),
}

impl From<u8> for ReturnCode {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Accepted,
            1 => Self::UnacceptableProtocolVersion,
            2 => Self::IdentifierRejected,
            3 => Self::ServerUnavailable,
            4 => Self::BadUserNameOrPassword,
            5 => Self::NotAuthorized,
            other => Self::Other(other),
        }
    }
}

impl From<ReturnCode> for u8 {
    fn from(code: ReturnCode) -> Self {
        match code {
            ReturnCode::Accepted => 0,
            ReturnCode::UnacceptableProtocolVersion => 1,
            ReturnCode::IdentifierRejected => 2,
            ReturnCode::ServerUnavailable => 3,
            ReturnCode::BadUserNameOrPassword => 4,
            ReturnCode::NotAuthorized => 5,
            ReturnCode::Other(other) => other,
        }
    }
}

/// Violations of the MQTT wire format or of the session protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// The remaining-length field used more than four bytes.
    MalformedRemainingLength,
    /// A packet type the client does not accept from a broker.
    UnexpectedPacketType(u8),
    /// The declared remaining length does not fit the packet's fields.
    InvalidSize {
        /// Packet type from the fixed header.
        packet_type: u8,
        /// Declared remaining length.
        size: usize,
    },
    /// The broker refused the connection.
    ConnectionRefused(ReturnCode),
    /// A field or packet exceeds what the encoding or the fixed buffers allow.
    PacketTooLarge,
    /// A string field was not valid UTF-8.
    InvalidUtf8,
    /// A valid packet arrived where the session expected a different one.
    UnexpectedResponse,
}

/// Error returned by codec operations and session steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The connection failed underneath the protocol.
    Transport(NetworkError),
    /// The peer violated the protocol.
    Protocol(ProtocolError),
}

impl From<NetworkError> for Error {
    fn from(err: NetworkError) -> Self {
        Error::Transport(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Transport(e) => defmt::write!(f, "Transport({})", e),
            Error::Protocol(e) => defmt::write!(f, "Protocol({})", e),
        }
    }
}

/// Reasons a publish request is rejected before it is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishError {
    /// The topic is longer than the outbox can hold.
    TopicTooLong,
    /// The JSON encoding of the payload does not fit the outbox.
    PayloadTooLarge,
    /// Every outbox slot holds a pending message.
    OutboxFull,
    /// The scheduler had no room for the delivery and expiry race.
    SchedulerFull,
}

/// Reasons a listener cannot be registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// The registry already holds its maximum number of listeners.
    Full,
    /// The topic is longer than a registry entry can hold.
    TopicTooLong,
}
