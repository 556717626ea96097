//! TCP connections over `std::net`, for hosts and Linux-class devices.

use super::error::Error;
use super::{Close, Connect, Connection, Read, Readable, Write};
use ::std::io::{ErrorKind, Read as StdRead, Write as StdWrite};
use ::std::net::{Shutdown, TcpStream, ToSocketAddrs};
use ::std::time::Duration;

/// Opens [`TcpConnection`]s with `std::net::TcpStream`.
#[derive(Debug, Clone, Copy)]
pub struct StdConnector {
    /// Upper bound on the TCP handshake with each resolved address. Zero
    /// leaves the bound to the operating system.
    pub connect_timeout: Duration,
    /// Read timeout applied to each stream, bounding how long the rest of a
    /// started packet may take to arrive.
    pub read_timeout: Duration,
}

impl Default for StdConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// A TCP stream implementing the crate's connection traits.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
}

impl TcpConnection {
    /// Wrap an already connected stream.
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl Connect for StdConnector {
    type Connection = TcpConnection;
    type Error = Error;

    /// Name resolution uses the system resolver and is not bounded by
    /// `connect_timeout`.
    fn connect(&mut self, host: &str, port: u16) -> Result<Self::Connection, Self::Error> {
        let mut last = Error::InvalidAddress;
        for address in (host, port)
            .to_socket_addrs()
            .map_err(|_| Error::InvalidAddress)?
        {
            let attempt = if self.connect_timeout.is_zero() {
                TcpStream::connect(address)
            } else {
                TcpStream::connect_timeout(&address, self.connect_timeout)
            };
            match attempt {
                Ok(stream) => return self.configure(stream),
                Err(e) if e.kind() == ErrorKind::TimedOut => last = Error::Timeout,
                Err(_) => last = Error::ConnectionRefused,
            }
        }
        Err(last)
    }
}

impl StdConnector {
    fn configure(&self, stream: TcpStream) -> Result<TcpConnection, Error> {
        stream
            .set_read_timeout(Some(self.read_timeout))
            .map_err(|_| Error::NotOpen)?;
        Ok(TcpConnection::new(stream))
    }
}

impl Read for TcpConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.stream.read(buf).map_err(|e| {
            if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut {
                Error::Timeout
            } else {
                Error::ReadError
            }
        })
    }
}

impl Write for TcpConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream.write(buf).map_err(|_| Error::WriteError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.stream.flush().map_err(|_| Error::WriteError)
    }
}

impl Readable for TcpConnection {
    type Error = Error;

    fn poll_readable(&mut self) -> Result<bool, Self::Error> {
        self.stream
            .set_nonblocking(true)
            .map_err(|_| Error::NotOpen)?;
        let mut probe = [0u8; 1];
        let readable = match self.stream.peek(&mut probe) {
            // Zero bytes means the peer closed; the next read reports it.
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(_) => Err(Error::ReadError),
        };
        self.stream
            .set_nonblocking(false)
            .map_err(|_| Error::NotOpen)?;
        readable
    }
}

impl Close for TcpConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        self.stream
            .shutdown(Shutdown::Both)
            .map_err(|_| Error::NotOpen)
    }
}

impl Connection for TcpConnection {}

#[cfg(test)]
mod tests {
    use super::*;
    use ::std::net::TcpListener;

    #[test]
    fn connects_within_the_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut connector = StdConnector {
            connect_timeout: Duration::from_millis(500),
            ..StdConnector::default()
        };

        let connection = connector.connect("127.0.0.1", port).unwrap();
        assert_eq!(
            connection.stream.read_timeout().unwrap(),
            Some(connector.read_timeout)
        );
        connection.close().unwrap();
    }

    #[test]
    fn zero_timeout_falls_back_to_a_plain_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut connector = StdConnector {
            connect_timeout: Duration::ZERO,
            ..StdConnector::default()
        };
        assert!(connector.connect("127.0.0.1", port).is_ok());
    }

    #[test]
    fn closed_port_is_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut connector = StdConnector::default();
        assert_eq!(
            connector.connect("127.0.0.1", port).map(|_| ()),
            Err(Error::ConnectionRefused)
        );
    }
}
