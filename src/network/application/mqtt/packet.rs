//! MQTT 3.1.1 control packet codec.
//!
//! Outgoing packets are [`Request`]s and incoming packets are [`Response`]s;
//! the client never decodes what it sends or encodes what it receives. Every
//! packet is framed as
//!
//! ```text
//! +-----------------+---------------------+----------------------+
//! | type << 4|flags | remaining length    | body                 |
//! | 1 byte          | 1-4 bytes (varint)  | remaining length     |
//! +-----------------+---------------------+----------------------+
//! ```
//!
//! The remaining length is written seven bits at a time, least significant
//! group first, with `0x80` set on every group but the last. Strings are a
//! two byte big-endian length followed by the raw bytes.

use super::error::{Error, ProtocolError, ReturnCode};
use crate::network::error::Error as NetworkError;
use crate::network::{Read, Write};
use heapless::{String, Vec};

/// Longest topic accepted in an inbound `PUBLISH`.
pub const MAX_TOPIC_LEN: usize = 128;

/// Largest inbound `PUBLISH` payload kept in memory.
pub const MAX_PAYLOAD_LEN: usize = 512;

/// Largest value the four byte remaining-length field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Keep-alive interval sent in `CONNECT`, in seconds.
pub const DEFAULT_KEEP_ALIVE: u16 = 600;

const PROTOCOL_NAME: &str = "MQTT";
const PROTOCOL_LEVEL: u8 = 4; // MQTT 3.1.1

// Control packet types (high nibble of the fixed header)
const CONNECT: u8 = 1;
const CONNACK: u8 = 2;
const PUBLISH: u8 = 3;
const PUBACK: u8 = 4;
const SUBSCRIBE: u8 = 8;
const SUBACK: u8 = 9;
const PINGREQ: u8 = 12;
const PINGRESP: u8 = 13;

// CONNECT flag bits
const CLEAN_SESSION: u8 = 0x02;
const PASSWORD: u8 = 0x40;
const USERNAME: u8 = 0x80;

// PUBLISH fixed header flag bits
const RETAIN: u8 = 0x01;
const QOS_MASK: u8 = 0x06;
const DUP: u8 = 0x08;

const SUBACK_FAILURE: u8 = 0x80;

/// Quality of service levels used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QoS {
    /// At most once delivery.
    AtMostOnce = 0,
    /// At least once delivery.
    AtLeastOnce = 1,
}

/// An outgoing control packet.
///
/// A request only borrows what it needs for its wire form and is consumed by
/// [`Request::write_to`] or [`Request::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    /// Open an MQTT session.
    Connect {
        /// Client identifier.
        client_id: &'a str,
        /// Optional username; sets the username flag when present.
        username: Option<&'a str>,
        /// Optional password; sets the password flag when present.
        password: Option<&'a str>,
        /// Keep-alive interval in seconds.
        keep_alive: u16,
        /// Ask the broker to discard earlier session state.
        clean_session: bool,
    },
    /// Publish an application message at QoS 0.
    Publish {
        /// Topic name.
        topic: &'a str,
        /// Raw payload, written without a length prefix.
        payload: &'a [u8],
        /// Ask the broker to retain the message.
        retain: bool,
    },
    /// Acknowledge a QoS 1 message from the broker.
    PublishAck {
        /// Packet identifier being acknowledged.
        packet_id: u16,
    },
    /// Subscribe to a single topic filter.
    Subscribe {
        /// Packet identifier echoed by the matching `SUBACK`.
        packet_id: u16,
        /// Topic filter.
        topic_filter: &'a str,
        /// Maximum QoS requested for this subscription.
        qos: QoS,
    },
    /// Keep-alive probe.
    Ping,
}

impl<'a> Request<'a> {
    /// Build the `CONNECT` packet the session sends: clean session, username
    /// and password always present.
    pub fn connect(client_id: &'a str, username: &'a str, password: &'a str, keep_alive: u16) -> Self {
        Request::Connect {
            client_id,
            username: Some(username),
            password: Some(password),
            keep_alive,
            clean_session: true,
        }
    }

    fn header_byte(&self) -> u8 {
        let (packet_type, flags) = match self {
            Request::Connect { .. } => (CONNECT, 0),
            Request::Publish { retain, .. } => (PUBLISH, if *retain { RETAIN } else { 0 }),
            Request::PublishAck { .. } => (PUBACK, 0),
            Request::Subscribe { .. } => (SUBSCRIBE, 0x02),
            Request::Ping => (PINGREQ, 0),
        };
        (packet_type << 4) | (flags & 0x0F)
    }

    fn body_len(&self) -> usize {
        match self {
            Request::Connect {
                client_id,
                username,
                password,
                ..
            } => {
                let mut len = 2 + PROTOCOL_NAME.len() + 1 + 1 + 2 + 2 + client_id.len();
                if let Some(username) = username {
                    len += 2 + username.len();
                }
                if let Some(password) = password {
                    len += 2 + password.len();
                }
                len
            }
            Request::Publish { topic, payload, .. } => 2 + topic.len() + payload.len(),
            Request::PublishAck { .. } => 2,
            Request::Subscribe { topic_filter, .. } => 2 + 2 + topic_filter.len() + 1,
            Request::Ping => 0,
        }
    }

    /// Size of the complete frame, fixed header included.
    pub fn encoded_len(&self) -> Result<usize, Error> {
        let body = self.body_len();
        Ok(1 + encode_remaining_length(body)?.len() + body)
    }

    /// Serialize the packet into `stream` and flush it.
    pub fn write_to<W: Write>(self, stream: &mut W) -> Result<(), Error> {
        let mut sink = StreamSink { stream };
        self.emit(&mut sink)?;
        sink.stream
            .flush()
            .map_err(|_| Error::Transport(NetworkError::WriteError))
    }

    /// Serialize the packet into `buf`, returning the number of bytes used.
    pub fn encode(self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut sink = SliceSink { buf, pos: 0 };
        self.emit(&mut sink)?;
        Ok(sink.pos)
    }

    fn emit<K: Sink>(self, sink: &mut K) -> Result<(), Error> {
        let remaining = encode_remaining_length(self.body_len())?;
        sink.put(&[self.header_byte()])?;
        sink.put(&remaining)?;

        match self {
            Request::Connect {
                client_id,
                username,
                password,
                keep_alive,
                clean_session,
            } => {
                put_string(sink, PROTOCOL_NAME)?;
                sink.put(&[PROTOCOL_LEVEL])?;
                let mut flags = 0;
                if clean_session {
                    flags |= CLEAN_SESSION;
                }
                if password.is_some() {
                    flags |= PASSWORD;
                }
                if username.is_some() {
                    flags |= USERNAME;
                }
                sink.put(&[flags])?;
                sink.put(&keep_alive.to_be_bytes())?;
                put_string(sink, client_id)?;
                if let Some(username) = username {
                    put_string(sink, username)?;
                }
                if let Some(password) = password {
                    put_string(sink, password)?;
                }
            }
            Request::Publish { topic, payload, .. } => {
                put_string(sink, topic)?;
                sink.put(payload)?;
            }
            Request::PublishAck { packet_id } => {
                sink.put(&packet_id.to_be_bytes())?;
            }
            Request::Subscribe {
                packet_id,
                topic_filter,
                qos,
            } => {
                sink.put(&packet_id.to_be_bytes())?;
                put_string(sink, topic_filter)?;
                sink.put(&[qos as u8])?;
            }
            Request::Ping => {}
        }
        Ok(())
    }
}

/// Body of a `CONNACK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectAck {
    /// Whether the broker resumed an earlier session.
    pub session_present: bool,
    /// The broker's verdict.
    pub return_code: ReturnCode,
}

impl ConnectAck {
    /// Whether the broker accepted the connection.
    pub fn is_accepted(&self) -> bool {
        self.return_code == ReturnCode::Accepted
    }
}

/// Body of a `SUBACK` for a single-topic `SUBSCRIBE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubscribeAck {
    /// Packet identifier of the acknowledged `SUBSCRIBE`.
    pub packet_id: u16,
    /// Granted QoS, or `0x80` on failure.
    pub return_code: u8,
}

impl SubscribeAck {
    /// Whether the broker granted the subscription.
    pub fn is_accepted(&self) -> bool {
        self.return_code != SUBACK_FAILURE
    }
}

/// An application message delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishNotification {
    /// Topic the message was published on.
    pub topic: String<MAX_TOPIC_LEN>,
    /// Present only when the message was sent with QoS 1 or higher.
    pub packet_id: Option<u16>,
    /// Raw payload bytes.
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
    /// The broker delivered a retained message.
    pub retain: bool,
    /// The broker is redelivering the message.
    pub dup: bool,
}

/// An incoming control packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `CONNACK`
    ConnectAck(ConnectAck),
    /// `PUBLISH` from the broker
    PublishNotification(PublishNotification),
    /// `SUBACK`
    SubscribeAck(SubscribeAck),
    /// `PINGRESP`
    PingResponse,
}

impl Response {
    /// Read exactly one packet from `stream`.
    ///
    /// Reads the fixed header, then exactly the declared remaining length.
    /// Packet types a broker does not send to this client are fatal; the
    /// stream cannot be resynchronized afterwards.
    pub fn read_from<R: Read>(stream: &mut R) -> Result<Self, Error> {
        let first = read_byte(stream)?;
        let flags = first & 0x0F;
        let packet_type = first >> 4;
        let size = decode_remaining_length_with(|| read_byte(stream))?;

        match packet_type {
            CONNACK => {
                expect_size(packet_type, size, 2)?;
                let mut body = [0u8; 2];
                read_exact(stream, &mut body)?;
                Ok(Response::ConnectAck(ConnectAck {
                    session_present: body[0] & 0x01 != 0,
                    return_code: ReturnCode::from(body[1]),
                }))
            }
            PUBLISH => read_publish(stream, flags, size).map(Response::PublishNotification),
            SUBACK => {
                expect_size(packet_type, size, 3)?;
                let mut body = [0u8; 3];
                read_exact(stream, &mut body)?;
                Ok(Response::SubscribeAck(SubscribeAck {
                    packet_id: u16::from_be_bytes([body[0], body[1]]),
                    return_code: body[2],
                }))
            }
            PINGRESP => {
                expect_size(packet_type, size, 0)?;
                Ok(Response::PingResponse)
            }
            other => Err(Error::Protocol(ProtocolError::UnexpectedPacketType(other))),
        }
    }
}

fn read_publish<R: Read>(stream: &mut R, flags: u8, size: usize) -> Result<PublishNotification, Error> {
    let invalid = Error::Protocol(ProtocolError::InvalidSize {
        packet_type: PUBLISH,
        size,
    });
    if size < 2 {
        return Err(invalid);
    }
    let mut prefix = [0u8; 2];
    read_exact(stream, &mut prefix)?;
    let topic_len = u16::from_be_bytes(prefix) as usize;

    let has_packet_id = flags & QOS_MASK != 0;
    let fixed = 2 + topic_len + if has_packet_id { 2 } else { 0 };
    if fixed > size {
        return Err(invalid);
    }
    if topic_len > MAX_TOPIC_LEN {
        return Err(Error::Protocol(ProtocolError::PacketTooLarge));
    }

    let mut raw_topic: Vec<u8, MAX_TOPIC_LEN> = Vec::new();
    raw_topic
        .resize(topic_len, 0)
        .map_err(|_| Error::Protocol(ProtocolError::PacketTooLarge))?;
    read_exact(stream, &mut raw_topic)?;
    let topic =
        String::from_utf8(raw_topic).map_err(|_| Error::Protocol(ProtocolError::InvalidUtf8))?;

    let packet_id = if has_packet_id {
        let mut id = [0u8; 2];
        read_exact(stream, &mut id)?;
        Some(u16::from_be_bytes(id))
    } else {
        None
    };

    let mut payload: Vec<u8, MAX_PAYLOAD_LEN> = Vec::new();
    payload
        .resize(size - fixed, 0)
        .map_err(|_| Error::Protocol(ProtocolError::PacketTooLarge))?;
    read_exact(stream, &mut payload)?;

    Ok(PublishNotification {
        topic,
        packet_id,
        payload,
        retain: flags & RETAIN != 0,
        dup: flags & DUP != 0,
    })
}

fn expect_size(packet_type: u8, size: usize, expected: usize) -> Result<(), Error> {
    if size == expected {
        Ok(())
    } else {
        Err(Error::Protocol(ProtocolError::InvalidSize { packet_type, size }))
    }
}

/// Encode `value` as an MQTT remaining-length field.
pub fn encode_remaining_length(mut value: usize) -> Result<Vec<u8, 4>, Error> {
    if value > MAX_REMAINING_LENGTH {
        return Err(Error::Protocol(ProtocolError::PacketTooLarge));
    }
    let mut encoded = Vec::new();
    loop {
        let mut byte = (value % 128) as u8;
        value /= 128;
        if value > 0 {
            byte |= 0x80;
        }
        // At most four groups for values up to MAX_REMAINING_LENGTH.
        encoded
            .push(byte)
            .map_err(|_| Error::Protocol(ProtocolError::PacketTooLarge))?;
        if value == 0 {
            break;
        }
    }
    Ok(encoded)
}

/// Decode a remaining-length field from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_remaining_length(bytes: &[u8]) -> Result<(usize, usize), Error> {
    let mut consumed = 0;
    let value = decode_remaining_length_with(|| {
        let byte = bytes
            .get(consumed)
            .copied()
            .ok_or(Error::Protocol(ProtocolError::MalformedRemainingLength))?;
        consumed += 1;
        Ok(byte)
    })?;
    Ok((value, consumed))
}

fn decode_remaining_length_with<F>(mut next: F) -> Result<usize, Error>
where
    F: FnMut() -> Result<u8, Error>,
{
    let mut value = 0usize;
    let mut shift = 0;
    for _ in 0..4 {
        let byte = next()?;
        value |= ((byte & 0x7F) as usize) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
    Err(Error::Protocol(ProtocolError::MalformedRemainingLength))
}

fn read_byte<R: Read>(stream: &mut R) -> Result<u8, Error> {
    let mut byte = [0u8; 1];
    read_exact(stream, &mut byte)?;
    Ok(byte[0])
}

fn read_exact<R: Read>(stream: &mut R, mut buf: &mut [u8]) -> Result<(), Error> {
    while !buf.is_empty() {
        match stream.read(buf) {
            Ok(0) => return Err(Error::Transport(NetworkError::ConnectionClosed)),
            Ok(n) => buf = &mut buf[n..],
            Err(_) => return Err(Error::Transport(NetworkError::ReadError)),
        }
    }
    Ok(())
}

/// Destination for encoded bytes.
trait Sink {
    fn put(&mut self, bytes: &[u8]) -> Result<(), Error>;
}

struct StreamSink<'w, W: Write> {
    stream: &'w mut W,
}

impl<W: Write> Sink for StreamSink<'_, W> {
    fn put(&mut self, mut bytes: &[u8]) -> Result<(), Error> {
        while !bytes.is_empty() {
            match self.stream.write(bytes) {
                Ok(0) | Err(_) => return Err(Error::Transport(NetworkError::WriteError)),
                Ok(n) => bytes = &bytes[n..],
            }
        }
        Ok(())
    }
}

struct SliceSink<'b> {
    buf: &'b mut [u8],
    pos: usize,
}

impl Sink for SliceSink<'_> {
    fn put(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let end = self.pos + bytes.len();
        self.buf
            .get_mut(self.pos..end)
            .ok_or(Error::Protocol(ProtocolError::PacketTooLarge))?
            .copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }
}

fn put_string<K: Sink>(sink: &mut K, value: &str) -> Result<(), Error> {
    let len =
        u16::try_from(value.len()).map_err(|_| Error::Protocol(ProtocolError::PacketTooLarge))?;
    sink.put(&len.to_be_bytes())?;
    sink.put(value.as_bytes())
}
