//! MQTT 3.1.1 client for devices on an unreliable Wi-Fi link.
//!
//! The client is split in two layers:
//!
//! - [`packet`]: a stateless codec for the control packets a device sends
//!   (`CONNECT`, `PUBLISH`, `PUBACK`, `SUBSCRIBE`, `PINGREQ`) and receives
//!   (`CONNACK`, `PUBLISH`, `SUBACK`, `PINGRESP`).
//! - [`session`]: a [`Task`](crate::system::tasks::Task) that joins Wi-Fi,
//!   opens the socket, performs the handshake, subscribes, dispatches inbound
//!   messages to [`TopicListener`]s and keeps the connection alive. Every
//!   failure tears the socket down and schedules a reconnect.
//!
//! Only QoS 0 publishing and QoS 1 subscriptions are supported. Topics are
//! matched by exact string comparison; wildcards are not expanded.
//!
//! # Usage
//!
//! ```rust,no_run
//! use mqtt_uplink::network::application::mqtt::{Json, Options, Session, Step, Condition};
//! use mqtt_uplink::network::wifi::WifiCredentials;
//! use mqtt_uplink::system::tasks::TaskList;
//! # use mqtt_uplink::network::{Close, Connect, Connection, Read, Readable, Write};
//! # use mqtt_uplink::network::wifi::{AccessPoint, Station, MAX_ACCESS_POINTS};
//! # struct Radio;
//! # impl Station for Radio {
//! #     type Error = ();
//! #     fn activate(&mut self, _hostname: &str) -> Result<(), ()> { Ok(()) }
//! #     fn scan(&mut self) -> Result<heapless::Vec<AccessPoint, MAX_ACCESS_POINTS>, ()> { Ok(heapless::Vec::new()) }
//! #     fn associate(&mut self, _ssid: &str, _password: &str) -> Result<(), ()> { Ok(()) }
//! # }
//! # struct Socket;
//! # impl Read for Socket { type Error = (); fn read(&mut self, _b: &mut [u8]) -> Result<usize, ()> { Ok(0) } }
//! # impl Write for Socket {
//! #     type Error = ();
//! #     fn write(&mut self, b: &[u8]) -> Result<usize, ()> { Ok(b.len()) }
//! #     fn flush(&mut self) -> Result<(), ()> { Ok(()) }
//! # }
//! # impl Close for Socket { type Error = (); fn close(self) -> Result<(), ()> { Ok(()) } }
//! # impl Readable for Socket { type Error = (); fn poll_readable(&mut self) -> Result<bool, ()> { Ok(false) } }
//! # impl Connection for Socket {}
//! # struct Tcp;
//! # impl Connect for Tcp {
//! #     type Connection = Socket;
//! #     type Error = ();
//! #     fn connect(&mut self, _host: &str, _port: u16) -> Result<Socket, ()> { Ok(Socket) }
//! # }
//! # fn now_ms() -> u64 { 0 }
//!
//! fn on_temperature(topic: &str, payload: Option<Json<'_>>) {
//!     let _celsius = payload.and_then(|json| json.parse::<f32>().ok());
//!     let _ = topic;
//! }
//!
//! let networks = [WifiCredentials { ssid: "home", password: "secret" }];
//! let options = Options::new("broker.local", "sensor-1", "sensor-1", "password");
//! let mut session: Session<'_, _, _, fn(&str, Option<Json<'_>>)> =
//!     Session::new(Radio, Tcp, options);
//! session.activate_wlan(&networks).unwrap();
//! session.subscribe("sensors/temp/set", on_temperature).unwrap();
//!
//! let mut tasks: TaskList<Step, Condition, 16> = TaskList::new();
//! session.start(&mut tasks).unwrap();
//! session.publish(&mut tasks, "sensors/temp", &21.5f32).unwrap();
//! loop {
//!     tasks.tick(now_ms(), &mut session);
//! }
//! ```

/// Error types for the codec and the session.
pub mod error;

/// Listener registry and the JSON payload view handed to listeners.
pub mod listener;

/// Pending outbound publishes.
pub mod outbox;

/// Control packet encoding and decoding.
pub mod packet;

/// The connection lifecycle state machine.
pub mod session;

pub use error::{Error, ProtocolError, PublishError, RegistryError, ReturnCode};
pub use listener::{Json, Listeners, TopicListener, MAX_LISTENERS};
pub use outbox::{Outbox, Pending, OUTBOX_DEPTH};
pub use packet::{
    ConnectAck, PublishNotification, QoS, Request, Response, SubscribeAck, MAX_PAYLOAD_LEN,
    MAX_TOPIC_LEN,
};
pub use session::{Condition, Options, Session, State, Step, Timeouts, DEFAULT_PORT};
