//! In-memory radio, broker socket and connector shared through `Rc<RefCell<_>>`
//! so tests can script the broker while the session owns the endpoints.

use mqtt_uplink::network::application::mqtt::packet::{
    decode_remaining_length, encode_remaining_length,
};
use mqtt_uplink::network::error::Error;
use mqtt_uplink::network::wifi::{AccessPoint, MAX_ACCESS_POINTS, Station};
use mqtt_uplink::network::{Close, Connect, Connection, Read, Readable, Write};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct Radio {
    pub visible: Vec<&'static str>,
    pub hostname: Option<String>,
    pub associated: Option<String>,
    pub scans: usize,
    pub fail_scan: bool,
}

#[derive(Debug)]
pub struct MockStation {
    pub radio: Rc<RefCell<Radio>>,
}

impl Station for MockStation {
    type Error = Error;

    fn activate(&mut self, hostname: &str) -> Result<(), Self::Error> {
        self.radio.borrow_mut().hostname = Some(hostname.to_string());
        Ok(())
    }

    fn scan(&mut self) -> Result<heapless::Vec<AccessPoint, MAX_ACCESS_POINTS>, Self::Error> {
        let mut radio = self.radio.borrow_mut();
        radio.scans += 1;
        if radio.fail_scan {
            return Err(Error::ScanFailed);
        }
        Ok(radio
            .visible
            .iter()
            .filter_map(|ssid| AccessPoint::new(ssid, -60))
            .collect())
    }

    fn associate(&mut self, ssid: &str, _password: &str) -> Result<(), Self::Error> {
        self.radio.borrow_mut().associated = Some(ssid.to_string());
        Ok(())
    }
}

/// Both directions of the broker socket, as seen from the test.
#[derive(Debug, Default)]
pub struct Broker {
    /// Bytes the broker has sent and the device has not read yet.
    pub inbound: VecDeque<u8>,
    /// Bytes the device has written.
    pub outbound: Vec<u8>,
    pub open: bool,
    pub connects: usize,
    pub closes: usize,
    pub refuse_connect: bool,
    pub fail_writes: bool,
}

impl Broker {
    pub fn send(&mut self, frame: &[u8]) {
        self.inbound.extend(frame.iter().copied());
    }

    /// Packets written by the device since the last call, as (header, body).
    pub fn take_packets(&mut self) -> Vec<(u8, Vec<u8>)> {
        let written = std::mem::take(&mut self.outbound);
        split_packets(&written)
    }
}

#[derive(Debug)]
pub struct MockConnection {
    broker: Rc<RefCell<Broker>>,
}

impl Read for MockConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut broker = self.broker.borrow_mut();
        if !broker.open {
            return Err(Error::NotOpen);
        }
        let len = buf.len().min(broker.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(broker.inbound.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }
}

impl Write for MockConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut broker = self.broker.borrow_mut();
        if !broker.open || broker.fail_writes {
            return Err(Error::WriteError);
        }
        broker.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Readable for MockConnection {
    type Error = Error;

    fn poll_readable(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.broker.borrow().inbound.is_empty())
    }
}

impl Close for MockConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        let mut broker = self.broker.borrow_mut();
        broker.open = false;
        broker.closes += 1;
        Ok(())
    }
}

impl Connection for MockConnection {}

#[derive(Debug)]
pub struct MockConnector {
    pub broker: Rc<RefCell<Broker>>,
}

impl Connect for MockConnector {
    type Connection = MockConnection;
    type Error = Error;

    fn connect(&mut self, _host: &str, port: u16) -> Result<Self::Connection, Self::Error> {
        assert_eq!(port, 1883);
        let mut broker = self.broker.borrow_mut();
        if broker.refuse_connect {
            return Err(Error::ConnectionRefused);
        }
        broker.connects += 1;
        broker.open = true;
        broker.inbound.clear();
        Ok(MockConnection {
            broker: self.broker.clone(),
        })
    }
}

pub fn connack(return_code: u8) -> Vec<u8> {
    vec![0x20, 0x02, 0x00, return_code]
}

pub fn suback(packet_id: u16, return_code: u8) -> Vec<u8> {
    let [high, low] = packet_id.to_be_bytes();
    vec![0x90, 0x03, high, low, return_code]
}

pub fn pingresp() -> Vec<u8> {
    vec![0xD0, 0x00]
}

pub fn publish(topic: &str, payload: &[u8], packet_id: Option<u16>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    body.extend_from_slice(topic.as_bytes());
    if let Some(id) = packet_id {
        body.extend_from_slice(&id.to_be_bytes());
    }
    body.extend_from_slice(payload);

    let mut frame = vec![if packet_id.is_some() { 0x32 } else { 0x30 }];
    frame.extend_from_slice(&encode_remaining_length(body.len()).unwrap());
    frame.extend_from_slice(&body);
    frame
}

pub fn split_packets(mut bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut packets = Vec::new();
    while !bytes.is_empty() {
        let (len, used) = decode_remaining_length(&bytes[1..]).unwrap();
        let start = 1 + used;
        packets.push((bytes[0], bytes[start..start + len].to_vec()));
        bytes = &bytes[start + len..];
    }
    packets
}
