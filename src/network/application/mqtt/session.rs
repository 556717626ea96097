//! Connection lifecycle of an MQTT client on a Wi-Fi station.
//!
//! A [`Session`] is a [`Task`]: each [`Step`] does a bounded amount of work,
//! then schedules its successor. The normal path is
//!
//! ```text
//! ScanWifi -> CreateSocket -> SendConnect -> AcknowledgeConnect -> Subscribe
//!          -> Receive <-> Ping
//! ```
//!
//! Any transport or protocol failure after the socket is open schedules
//! [`Step::CloseSocket`], which drops the connection and tries
//! [`Step::CreateSocket`] again after the retry delay. A failed socket connect
//! starts over from a fresh Wi-Fi scan.
//!
//! If the scheduler has no room for a successor, the session closes its
//! socket and parks in [`State::Halted`] until [`Session::start`] is called
//! again.

use super::error::{Error, ProtocolError, PublishError, RegistryError};
use super::listener::{Listeners, TopicListener, MAX_LISTENERS};
use super::outbox::{Outbox, Pending, OUTBOX_DEPTH};
use super::packet::{QoS, Request, Response, DEFAULT_KEEP_ALIVE};
use crate::network::error::Error as NetworkError;
use crate::network::wifi::{select_network, Station, WifiCredentials};
use crate::network::{Close, Connect, Readable};
use crate::system::tasks::{Item, Priority, QueueFull, Scheduler, Task};
use serde::Serialize;

/// Default MQTT port.
pub const DEFAULT_PORT: u16 = 1883;

/// Outcome of queueing a step's successor.
type Scheduled = Result<(), QueueFull>;

/// Delays used by the session, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Time given to Wi-Fi association before opening a socket.
    pub settle_ms: u32,
    /// Delay before any reconnect attempt.
    pub retry_ms: u32,
    /// How long to wait for `CONNACK` or the first `SUBACK`.
    pub ack_ms: u32,
    /// Idle time on a healthy connection before sending `PINGREQ`.
    pub ping_interval_ms: u32,
    /// How long to wait for any packet after `PINGREQ`.
    pub ping_timeout_ms: u32,
    /// Default lifetime of a queued publish.
    pub publish_ms: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            settle_ms: 3_000,
            retry_ms: 30_000,
            ack_ms: 3_000,
            ping_interval_ms: 120_000,
            ping_timeout_ms: 30_000,
            publish_ms: 60_000,
        }
    }
}

/// Broker address and identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options<'a> {
    /// Broker host name or address.
    pub hostname: &'a str,
    /// Broker port.
    pub port: u16,
    /// MQTT client identifier.
    pub client_id: &'a str,
    /// MQTT username, also announced as the DHCP host name.
    pub username: &'a str,
    /// MQTT password.
    pub password: &'a str,
    /// Keep-alive interval sent in `CONNECT`, in seconds.
    pub keep_alive: u16,
    /// Session delays.
    pub timeouts: Timeouts,
}

impl<'a> Options<'a> {
    /// Options for `hostname` with the default port, keep-alive and delays.
    pub fn new(hostname: &'a str, client_id: &'a str, username: &'a str, password: &'a str) -> Self {
        Self {
            hostname,
            port: DEFAULT_PORT,
            client_id,
            username,
            password,
            keep_alive: DEFAULT_KEEP_ALIVE,
            timeouts: Timeouts::default(),
        }
    }
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// No socket. Either not started or waiting for the next reconnect step.
    Disconnected,
    /// Looking for a configured access point.
    ScanningWifi,
    /// Association requested, waiting before opening a socket.
    AwaitingAssociation,
    /// Opening the TCP connection.
    ConnectingSocket,
    /// `CONNECT` sent.
    AwaitingConnectAck,
    /// `SUBSCRIBE` packets sent.
    Subscribing,
    /// Steady state.
    Listening,
    /// `PINGREQ` sent.
    Pinging,
    /// Tearing the connection down.
    Closing,
    /// A successor step could not be scheduled. Nothing is pending for the
    /// connection until [`Session::start`] runs again.
    Halted,
}

/// Continuations scheduled by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// Scan for a configured network and associate with it.
    ScanWifi,
    /// Open the TCP connection to the broker.
    CreateSocket,
    /// Send `CONNECT`.
    SendConnect,
    /// Read the broker's answer to `CONNECT`.
    AcknowledgeConnect,
    /// Send one `SUBSCRIBE` per registered listener.
    Subscribe,
    /// Read and dispatch one packet.
    Receive,
    /// Send `PINGREQ`.
    Ping,
    /// Send `PUBACK` for a packet id.
    AcknowledgePublish(u16),
    /// Send the outbox entry in a slot.
    Publish(usize),
    /// Drop the outbox entry in a slot.
    ExpirePublish(usize),
    /// Drop the connection and schedule a reconnect.
    CloseSocket,
}

/// Conditions the session asks the scheduler to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Condition {
    /// The socket has bytes pending (or the peer closed it).
    SocketReadable,
    /// The broker accepted the connection and it has not been closed since.
    Connected,
}

/// An MQTT client session over a Wi-Fi station.
///
/// Generic over the radio driver `W`, the TCP connector `C` and the listener
/// type `L` shared by every subscription.
pub struct Session<'a, W, C, L>
where
    W: Station,
    C: Connect,
{
    station: W,
    connector: C,
    connection: Option<C::Connection>,
    options: Options<'a>,
    credentials: &'a [WifiCredentials<'a>],
    state: State,
    connected: bool,
    next_packet_id: u16,
    listeners: Listeners<L, MAX_LISTENERS>,
    outbox: Outbox<OUTBOX_DEPTH>,
}

impl<'a, W, C, L> Session<'a, W, C, L>
where
    W: Station,
    C: Connect,
    L: TopicListener,
{
    /// Create a disconnected session.
    pub fn new(station: W, connector: C, options: Options<'a>) -> Self {
        Self {
            station,
            connector,
            connection: None,
            options,
            credentials: &[],
            state: State::Disconnected,
            connected: false,
            next_packet_id: 1,
            listeners: Listeners::new(),
            outbox: Outbox::new(),
        }
    }

    /// Bring the station up and remember the networks to join, most
    /// preferred first. The MQTT username doubles as the DHCP host name.
    pub fn activate_wlan(&mut self, credentials: &'a [WifiCredentials<'a>]) -> Result<(), W::Error> {
        self.credentials = credentials;
        self.station.activate(self.options.username)
    }

    /// Register `listener` for messages on `topic`.
    ///
    /// Subscriptions are sent on every successful connect, so register before
    /// [`Session::start`].
    pub fn subscribe(&mut self, topic: &str, listener: L) -> Result<(), RegistryError> {
        self.listeners.register(topic, listener)
    }

    /// Schedule the first Wi-Fi scan.
    ///
    /// Also restarts a session in [`State::Halted`].
    pub fn start<S>(&mut self, scheduler: &mut S) -> Result<(), QueueFull>
    where
        S: Scheduler<Step, Condition>,
    {
        scheduler.now(Step::ScanWifi, Priority::Normal)?;
        self.state = State::Disconnected;
        Ok(())
    }

    /// Whether the broker has accepted the current connection.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Registered listeners.
    pub fn listeners(&self) -> &Listeners<L, MAX_LISTENERS> {
        &self.listeners
    }

    /// Publish `value` as JSON once connected, retained, with the default
    /// timeout.
    pub fn publish<S, T>(&mut self, scheduler: &mut S, topic: &str, value: &T) -> Result<(), PublishError>
    where
        S: Scheduler<Step, Condition>,
        T: Serialize + ?Sized,
    {
        let timeout_ms = self.options.timeouts.publish_ms;
        self.publish_with(scheduler, topic, value, true, timeout_ms)
    }

    /// Publish `value` as JSON once connected.
    ///
    /// The message is dropped silently if the session is not connected
    /// within `timeout_ms`. Errors are returned only when the message cannot
    /// be queued at all, in which case nothing is kept.
    pub fn publish_with<S, T>(
        &mut self,
        scheduler: &mut S,
        topic: &str,
        value: &T,
        retain: bool,
        timeout_ms: u32,
    ) -> Result<(), PublishError>
    where
        S: Scheduler<Step, Condition>,
        T: Serialize + ?Sized,
    {
        let slot = self.outbox.insert(Pending::new(topic, value, retain)?)?;
        let raced = scheduler.race(
            Item::When(Condition::Connected, Step::Publish(slot)),
            Item::After(timeout_ms, Step::ExpirePublish(slot)),
        );
        if raced.is_err() {
            self.outbox.take(slot);
            return Err(PublishError::SchedulerFull);
        }
        Ok(())
    }

    fn scan_wifi<S: Scheduler<Step, Condition>>(&mut self, scheduler: &mut S) -> Scheduled {
        self.state = State::ScanningWifi;
        match self.join_network() {
            Ok(()) => {
                self.state = State::AwaitingAssociation;
                scheduler.after(self.options.timeouts.settle_ms, Step::CreateSocket)
            }
            Err(e) => {
                warn!("wifi not joined: {:?}, rescanning later", e);
                self.state = State::Disconnected;
                scheduler.after(self.options.timeouts.retry_ms, Step::ScanWifi)
            }
        }
    }

    fn join_network(&mut self) -> Result<(), NetworkError> {
        let access_points = self.station.scan().map_err(|_| NetworkError::ScanFailed)?;
        let credentials = self.credentials;
        let Some(network) = select_network(credentials, &access_points) else {
            debug!("none of {} known networks in range", credentials.len());
            return Err(NetworkError::AssociationFailed);
        };
        info!("associating with {}", network.ssid);
        self.station
            .associate(network.ssid, network.password)
            .map_err(|_| NetworkError::AssociationFailed)
    }

    fn create_socket<S: Scheduler<Step, Condition>>(&mut self, scheduler: &mut S) -> Scheduled {
        self.state = State::ConnectingSocket;
        if let Some(stale) = self.connection.take() {
            let _ = stale.close();
        }
        match self.connector.connect(self.options.hostname, self.options.port) {
            Ok(connection) => {
                debug!("socket open to {}:{}", self.options.hostname, self.options.port);
                self.connection = Some(connection);
                scheduler.now(Step::SendConnect, Priority::Normal)
            }
            Err(_) => {
                warn!("connect to {} failed, rescanning later", self.options.hostname);
                self.state = State::Disconnected;
                scheduler.after(self.options.timeouts.retry_ms, Step::ScanWifi)
            }
        }
    }

    fn send_connect<S: Scheduler<Step, Condition>>(&mut self, scheduler: &mut S) -> Scheduled {
        self.state = State::AwaitingConnectAck;
        self.next_packet_id = 1;
        let request = Request::connect(
            self.options.client_id,
            self.options.username,
            self.options.password,
            self.options.keep_alive,
        );
        match self.send(request) {
            Ok(()) => scheduler.race(
                Item::When(Condition::SocketReadable, Step::AcknowledgeConnect),
                Item::After(self.options.timeouts.ack_ms, Step::CloseSocket),
            ),
            Err(e) => self.fail(e, scheduler),
        }
    }

    fn acknowledge_connect<S: Scheduler<Step, Condition>>(&mut self, scheduler: &mut S) -> Scheduled {
        match self.receive() {
            Ok(Response::ConnectAck(ack)) if ack.is_accepted() => {
                info!("connected to {}", self.options.hostname);
                self.connected = true;
                scheduler.now(Step::Subscribe, Priority::Normal)
            }
            Ok(Response::ConnectAck(ack)) => {
                self.fail(ProtocolError::ConnectionRefused(ack.return_code).into(), scheduler)
            }
            Ok(_) => self.fail(ProtocolError::UnexpectedResponse.into(), scheduler),
            Err(e) => self.fail(e, scheduler),
        }
    }

    fn subscribe_all<S: Scheduler<Step, Condition>>(&mut self, scheduler: &mut S) -> Scheduled {
        self.state = State::Subscribing;
        if self.listeners.is_empty() {
            return self.listen(scheduler);
        }
        match self.send_subscriptions() {
            // SUBACKs are consumed by the receive loop without matching ids.
            Ok(()) => scheduler.race(
                Item::When(Condition::SocketReadable, Step::Receive),
                Item::After(self.options.timeouts.ack_ms, Step::CloseSocket),
            ),
            Err(e) => self.fail(e, scheduler),
        }
    }

    fn send_subscriptions(&mut self) -> Result<(), Error> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(Error::Transport(NetworkError::NotOpen))?;
        for topic in self.listeners.topics() {
            let packet_id = self.next_packet_id;
            self.next_packet_id = if packet_id == u16::MAX { 1 } else { packet_id + 1 };
            debug!("subscribing to {} as {}", topic, packet_id);
            Request::Subscribe {
                packet_id,
                topic_filter: topic,
                qos: QoS::AtLeastOnce,
            }
            .write_to(connection)?;
        }
        Ok(())
    }

    fn receive_one<S: Scheduler<Step, Condition>>(&mut self, scheduler: &mut S) -> Scheduled {
        match self.receive() {
            Ok(Response::SubscribeAck(ack)) => {
                if !ack.is_accepted() {
                    warn!("subscription {} refused by broker", ack.packet_id);
                }
            }
            Ok(Response::PingResponse) => trace!("ping answered"),
            Ok(Response::PublishNotification(publish)) => {
                if let Some(packet_id) = publish.packet_id {
                    // The broker redelivers an unacknowledged message.
                    if scheduler
                        .now(Step::AcknowledgePublish(packet_id), Priority::High)
                        .is_err()
                    {
                        warn!("no room to acknowledge {}", packet_id);
                    }
                }
                if !self.listeners.dispatch(&publish.topic, &publish.payload) {
                    debug!("no listener for {}", publish.topic.as_str());
                }
            }
            Ok(Response::ConnectAck(_)) => {
                return self.fail(ProtocolError::UnexpectedResponse.into(), scheduler);
            }
            Err(e) => return self.fail(e, scheduler),
        }
        self.listen(scheduler)
    }

    fn listen<S: Scheduler<Step, Condition>>(&mut self, scheduler: &mut S) -> Scheduled {
        self.state = State::Listening;
        scheduler.race(
            Item::When(Condition::SocketReadable, Step::Receive),
            Item::After(self.options.timeouts.ping_interval_ms, Step::Ping),
        )
    }

    fn ping<S: Scheduler<Step, Condition>>(&mut self, scheduler: &mut S) -> Scheduled {
        self.state = State::Pinging;
        match self.send(Request::Ping) {
            Ok(()) => scheduler.race(
                Item::When(Condition::SocketReadable, Step::Receive),
                Item::After(self.options.timeouts.ping_timeout_ms, Step::CloseSocket),
            ),
            Err(e) => self.fail(e, scheduler),
        }
    }

    fn acknowledge_publish(&mut self, packet_id: u16) {
        if let Err(e) = self.send(Request::PublishAck { packet_id }) {
            debug!("PUBACK {} not sent: {:?}", packet_id, e);
        }
    }

    fn send_pending(&mut self, slot: usize) {
        let Some(pending) = self.outbox.take(slot) else {
            return;
        };
        let request = Request::Publish {
            topic: pending.topic(),
            payload: pending.payload(),
            retain: pending.retain(),
        };
        if let Err(e) = self.send(request) {
            debug!("publish to {} lost: {:?}", pending.topic(), e);
        }
    }

    fn expire_pending(&mut self, slot: usize) {
        if let Some(pending) = self.outbox.take(slot) {
            debug!("publish to {} expired", pending.topic());
        }
    }

    fn close_socket<S: Scheduler<Step, Condition>>(&mut self, scheduler: &mut S) -> Scheduled {
        let Some(connection) = self.connection.take() else {
            // Already closed; the reconnect that close scheduled is pending.
            self.connected = false;
            if self.state == State::Disconnected || self.state == State::Halted {
                return Ok(());
            }
            self.state = State::Disconnected;
            return scheduler.after(self.options.timeouts.retry_ms, Step::CreateSocket);
        };
        self.state = State::Closing;
        if connection.close().is_err() {
            debug!("socket close reported an error");
        }
        self.connected = false;
        self.state = State::Disconnected;
        info!("disconnected, reconnecting in {} ms", self.options.timeouts.retry_ms);
        scheduler.after(self.options.timeouts.retry_ms, Step::CreateSocket)
    }

    fn fail<S: Scheduler<Step, Condition>>(&mut self, error: Error, scheduler: &mut S) -> Scheduled {
        warn!("{:?} in state {:?}, closing", error, self.state);
        scheduler.now(Step::CloseSocket, Priority::Normal)
    }

    fn halt(&mut self) {
        error!("no room for the step after {:?}, halting", self.state);
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
        self.connected = false;
        self.state = State::Halted;
    }

    fn send(&mut self, request: Request<'_>) -> Result<(), Error> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(Error::Transport(NetworkError::NotOpen))?;
        request.write_to(connection)
    }

    fn receive(&mut self) -> Result<Response, Error> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(Error::Transport(NetworkError::NotOpen))?;
        Response::read_from(connection)
    }
}

impl<W, C, L> core::fmt::Debug for Session<'_, W, C, L>
where
    W: Station,
    C: Connect,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("hostname", &self.options.hostname)
            .field("state", &self.state)
            .field("connected", &self.connected)
            .field("next_packet_id", &self.next_packet_id)
            .field("queued", &self.outbox.len())
            .finish_non_exhaustive()
    }
}

impl<W, C, L> Task for Session<'_, W, C, L>
where
    W: Station,
    C: Connect,
    L: TopicListener,
{
    type Step = Step;
    type Condition = Condition;

    fn run<S>(&mut self, step: Step, scheduler: &mut S)
    where
        S: Scheduler<Step, Condition>,
    {
        trace!("step {:?}", step);
        let scheduled = match step {
            Step::ScanWifi => self.scan_wifi(scheduler),
            Step::CreateSocket => self.create_socket(scheduler),
            Step::SendConnect => self.send_connect(scheduler),
            Step::AcknowledgeConnect => self.acknowledge_connect(scheduler),
            Step::Subscribe => self.subscribe_all(scheduler),
            Step::Receive => self.receive_one(scheduler),
            Step::Ping => self.ping(scheduler),
            Step::AcknowledgePublish(packet_id) => {
                self.acknowledge_publish(packet_id);
                Ok(())
            }
            Step::Publish(slot) => {
                self.send_pending(slot);
                Ok(())
            }
            Step::ExpirePublish(slot) => {
                self.expire_pending(slot);
                Ok(())
            }
            Step::CloseSocket => self.close_socket(scheduler),
        };
        if scheduled.is_err() {
            self.halt();
        }
    }

    fn poll(&mut self, condition: &Condition) -> bool {
        match condition {
            Condition::SocketReadable => self
                .connection
                .as_mut()
                .is_some_and(|connection| connection.poll_readable().unwrap_or(false)),
            Condition::Connected => self.connected,
        }
    }
}
