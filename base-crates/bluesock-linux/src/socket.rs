//! The Bluetooth socket
//!
//! A [`BluetoothSocket`] is the state kept around a socket descriptor: the protocol, the timeout
//! policy, the point in its life cycle, and the service record it advertises (if any). The
//! descriptor operations are done through a [`RawSocket`], which is a [`KernelSocket`] unless
//! another backend is given.

use crate::addr::{Protocol, SocketAddress};
use crate::consts::{BT_SECURITY, L2CAP_LM, L2CAP_OPTIONS, SOL_BLUETOOTH, SOL_L2CAP};
use crate::error::{Error, Result};
use crate::options::{check_mtu, L2capOptions, SecurityLevel};
use crate::raw::{Direction, KernelSocket, RawSocket};
use crate::timeout::{SocketConfig, Timeout};
use bluesock_core::BluetoothDeviceAddress;
use bluesock_sdp::DiscoverySession;
use nix::errno::Errno;
use std::net::Shutdown;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

/// The largest buffer an option can be read into
pub const MAX_OPTION_LEN: usize = 1024;

/// The RFCOMM channels searched for a free channel
const RFCOMM_PORTS: core::ops::RangeInclusive<u16> = 1..=30;

/// The dynamic L2CAP PSMs searched for a free PSM
const L2CAP_PORTS: core::ops::Range<u16> = 0x1001..0x8000;

/// The life cycle of a socket
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketState {
    Open,
    Bound,
    Listening,
    Connected,
    Closed,
}

impl core::fmt::Display for SocketState {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            SocketState::Open => f.write_str("open"),
            SocketState::Bound => f.write_str("bound"),
            SocketState::Listening => f.write_str("listening"),
            SocketState::Connected => f.write_str("connected"),
            SocketState::Closed => f.write_str("closed"),
        }
    }
}

/// A registered service record along with the session it was registered through
pub(crate) struct Advertisement {
    pub handle: u32,
    pub session: DiscoverySession,
}

/// A Bluetooth socket
///
/// ```no_run
/// # use bluesock_linux::{BluetoothSocket, Protocol, SocketAddress};
/// let mut socket: BluetoothSocket = BluetoothSocket::new(Protocol::Rfcomm)?;
///
/// socket.connect(&SocketAddress::rfcomm("01:23:45:67:89:AB", 1)?)?;
///
/// socket.sendall(b"hello")?;
/// # Ok::<(), bluesock_linux::Error>(())
/// ```
pub struct BluetoothSocket<S: RawSocket = KernelSocket> {
    socket: Option<S>,
    protocol: Protocol,
    timeout: Timeout,
    config: SocketConfig,
    state: SocketState,
    pub(crate) advertisement: Option<Advertisement>,
}

impl<S: RawSocket> BluetoothSocket<S> {
    /// Open a new socket with the default configuration
    pub fn new(protocol: Protocol) -> Result<Self> {
        Self::with_config(protocol, SocketConfig::default())
    }

    pub fn with_config(protocol: Protocol, config: SocketConfig) -> Result<Self> {
        let socket = S::open(protocol)?;

        log::debug!("opened {} socket", protocol);

        Self::from_backend(socket, protocol, config)
    }

    /// Create a socket around an open backend
    ///
    /// The socket starts out in the open state with the default timeout of `config`.
    pub fn from_backend(socket: S, protocol: Protocol, config: SocketConfig) -> Result<Self> {
        Self::with_state(socket, protocol, config, SocketState::Open)
    }

    fn with_state(socket: S, protocol: Protocol, config: SocketConfig, state: SocketState) -> Result<Self> {
        let mut this = BluetoothSocket {
            socket: Some(socket),
            protocol,
            timeout: Timeout::Blocking,
            config,
            state,
            advertisement: None,
        };

        this.set_timeout(config.default_timeout)?;

        Ok(this)
    }

    pub(crate) fn backend(&self) -> Result<&S> {
        self.socket.as_ref().ok_or(Error::State("the socket is closed"))
    }

    /// Wait until the socket is ready when it has a timeout
    fn wait_ready(&self, direction: Direction) -> Result<()> {
        match self.timeout.as_poll_ms() {
            Some(ms) if !self.backend()?.wait(direction, ms)? => Err(Error::Timeout),
            _ => Ok(()),
        }
    }

    fn check_protocol(&self, address: &SocketAddress) -> Result<()> {
        if address.protocol() == self.protocol {
            Ok(())
        } else {
            Err(Error::Protocol(format!(
                "a {} address cannot be used with a {} socket",
                address.protocol(),
                self.protocol
            )))
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<SocketAddress> {
        SocketAddress::decode(self.protocol, bytes)?
            .ok_or_else(|| Error::Protocol(format!("no address was returned for the {} socket", self.protocol)))
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    pub fn is_listening(&self) -> bool {
        self.state == SocketState::Listening
    }

    /// Bind the socket to a local address
    ///
    /// A L2CAP or RFCOMM address with a port of zero is bound to the first port that is free.
    pub fn bind(&mut self, address: &SocketAddress) -> Result<()> {
        self.check_protocol(address)?;

        let address = match *address {
            SocketAddress::L2cap { address, psm: 0 } => SocketAddress::L2cap {
                address,
                psm: probe_port::<S>(Protocol::L2cap)?,
            },
            SocketAddress::Rfcomm { address, channel: 0 } => SocketAddress::Rfcomm {
                address,
                channel: probe_port::<S>(Protocol::Rfcomm)? as u8,
            },
            other => other,
        };

        self.backend()?.bind(&address.encode()?)?;

        log::debug!("bound {} socket to {}", self.protocol, address);

        self.state = SocketState::Bound;

        Ok(())
    }

    /// Listen for connections
    ///
    /// A backlog less than one is raised to one.
    pub fn listen(&mut self, backlog: i32) -> Result<()> {
        self.backend()?.listen(backlog.max(1))?;

        self.state = SocketState::Listening;

        Ok(())
    }

    /// Accept a connection
    ///
    /// The returned socket has the default timeout of the configuration of this socket.
    pub fn accept(&self) -> Result<(BluetoothSocket<S>, SocketAddress)> {
        self.wait_ready(Direction::Read)?;

        let (socket, peer) = self.backend()?.accept()?;

        let peer = self.decode(&peer)?;

        log::debug!("accepted {} connection from {}", self.protocol, peer);

        let accepted = Self::with_state(socket, self.protocol, self.config, SocketState::Connected)?;

        Ok((accepted, peer))
    }

    fn try_connect(&self, address: &[u8]) -> Result<()> {
        let socket = self.backend()?;

        match (socket.connect(address), self.timeout.as_poll_ms()) {
            (Ok(()), _) => Ok(()),
            (Err(Errno::EINPROGRESS), Some(ms)) => {
                if !socket.wait(Direction::Write, ms)? {
                    return Err(Error::Timeout);
                }

                // the result of the connection is the result of connecting again
                match socket.connect(address) {
                    Ok(()) | Err(Errno::EISCONN) => Ok(()),
                    Err(e) => Err(e.into()),
                }
            }
            (Err(e), _) => Err(e.into()),
        }
    }

    /// Connect to a remote device
    pub fn connect(&mut self, address: &SocketAddress) -> Result<()> {
        self.check_protocol(address)?;

        self.try_connect(&address.encode()?)?;

        log::debug!("connected {} socket to {}", self.protocol, address);

        self.state = SocketState::Connected;

        Ok(())
    }

    /// Connect without failing on an error from the kernel
    ///
    /// The return is zero when connected, otherwise it is the error number. A timeout is
    /// returned as `EAGAIN`. Errors that are not from the kernel (such as the address being for
    /// a different protocol) are still returned as errors.
    pub fn connect_nonblocking(&mut self, address: &SocketAddress) -> Result<i32> {
        self.check_protocol(address)?;

        match self.try_connect(&address.encode()?) {
            Ok(()) => {
                self.state = SocketState::Connected;
                Ok(0)
            }
            Err(Error::Timeout) => Ok(Errno::EAGAIN as i32),
            Err(Error::Os(errno)) => Ok(errno as i32),
            Err(e) => Err(e),
        }
    }

    pub fn send(&self, data: &[u8]) -> Result<usize> {
        self.wait_ready(Direction::Write)?;

        Ok(self.backend()?.send(data, 0)?)
    }

    /// Send all of `data`
    ///
    /// Sends are repeated until every byte is sent. On failure the returned
    /// [`Error::Incomplete`] has the number of bytes that were sent before the failure.
    pub fn sendall(&self, data: &[u8]) -> Result<()> {
        let mut sent = 0;

        while sent < data.len() {
            match self.send(&data[sent..]) {
                // a send that takes nothing would never finish
                Ok(0) => {
                    return Err(Error::Incomplete {
                        sent,
                        cause: Box::new(Error::Os(Errno::EPIPE)),
                    })
                }
                Ok(len) => sent += len,
                Err(cause) => {
                    return Err(Error::Incomplete {
                        sent,
                        cause: Box::new(cause),
                    })
                }
            }
        }

        Ok(())
    }

    pub fn send_to(&self, data: &[u8], address: &SocketAddress) -> Result<usize> {
        self.check_protocol(address)?;

        let address = address.encode()?;

        self.wait_ready(Direction::Write)?;

        Ok(self.backend()?.send_to(data, 0, &address)?)
    }

    /// Receive into `buffer`, the return is the number of bytes received
    pub fn recv(&self, buffer: &mut [u8]) -> Result<usize> {
        self.wait_ready(Direction::Read)?;

        Ok(self.backend()?.recv(buffer, 0)?)
    }

    /// Receive along with the address of the sender
    ///
    /// The address is `None` when the kernel does not return one (as happens for connected
    /// sockets).
    pub fn recv_from(&self, buffer: &mut [u8]) -> Result<(usize, Option<SocketAddress>)> {
        self.wait_ready(Direction::Read)?;

        let (len, address) = self.backend()?.recv_from(buffer, 0)?;

        Ok((len, SocketAddress::decode(self.protocol, &address)?))
    }

    pub fn timeout(&self) -> Timeout {
        self.timeout
    }

    /// Set the timeout policy
    ///
    /// The descriptor is non-blocking unless the policy is [`Timeout::Blocking`].
    pub fn set_timeout(&mut self, timeout: Timeout) -> Result<()> {
        self.backend()?.set_nonblocking(!timeout.is_blocking())?;

        self.timeout = timeout;

        Ok(())
    }

    pub fn set_blocking(&mut self, blocking: bool) -> Result<()> {
        self.set_timeout(if blocking { Timeout::Blocking } else { Timeout::NonBlocking })
    }

    pub fn option_int(&self, level: i32, name: i32) -> Result<i32> {
        let bytes = self.option(level, name, core::mem::size_of::<i32>())?;

        let mut value = [0u8; 4];

        value[..bytes.len().min(4)].copy_from_slice(&bytes[..bytes.len().min(4)]);

        Ok(i32::from_ne_bytes(value))
    }

    pub fn set_option_int(&self, level: i32, name: i32, value: i32) -> Result<()> {
        self.set_option(level, name, &value.to_ne_bytes())
    }

    /// Get an option
    ///
    /// `len` is the size of the buffer the option is read into, it must be within
    /// `1..=MAX_OPTION_LEN`.
    pub fn option(&self, level: i32, name: i32, len: usize) -> Result<Vec<u8>> {
        if len == 0 || len > MAX_OPTION_LEN {
            return Err(Error::value(format!(
                "option buffer size {} is not within 1..={}",
                len, MAX_OPTION_LEN
            )));
        }

        Ok(self.backend()?.option(level, name, len)?)
    }

    pub fn set_option(&self, level: i32, name: i32, value: &[u8]) -> Result<()> {
        Ok(self.backend()?.set_option(level, name, value)?)
    }

    fn require_l2cap(&self) -> Result<()> {
        match self.protocol {
            Protocol::L2cap => Ok(()),
            other => Err(Error::Unsupported(format!("L2CAP options are not available for a {} socket", other))),
        }
    }

    pub fn l2cap_options(&self) -> Result<L2capOptions> {
        self.require_l2cap()?;

        L2capOptions::from_bytes(&self.option(SOL_L2CAP, L2CAP_OPTIONS, L2capOptions::SIZE)?)
    }

    pub fn set_l2cap_options(&self, options: &L2capOptions) -> Result<()> {
        self.require_l2cap()?;

        self.set_option(SOL_L2CAP, L2CAP_OPTIONS, &options.to_bytes())
    }

    /// Set both the incoming and outgoing MTU
    pub fn set_l2cap_mtu(&self, mtu: u16) -> Result<()> {
        check_mtu(mtu)?;

        let mut options = self.l2cap_options()?;

        options.set_mtu(mtu)?;

        self.set_l2cap_options(&options)
    }

    /// Set the security level of the connection
    ///
    /// Kernels without the `BT_SECURITY` option get the equivalent L2CAP link mode instead.
    pub fn set_l2cap_security(&self, level: SecurityLevel) -> Result<()> {
        match self.backend()?.set_option(SOL_BLUETOOTH, BT_SECURITY, &level.to_bytes()) {
            Err(Errno::ENOPROTOOPT) => {
                log::debug!("BT_SECURITY is not supported, setting the L2CAP link mode instead");

                self.set_option_int(SOL_L2CAP, L2CAP_LM, level.link_mode())
            }
            result => Ok(result?),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddress> {
        self.decode(&self.backend()?.local_addr()?)
    }

    pub fn peer_addr(&self) -> Result<SocketAddress> {
        self.decode(&self.backend()?.peer_addr()?)
    }

    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        Ok(self.backend()?.shutdown(how)?)
    }

    /// Duplicate the socket
    ///
    /// The duplicate does not take part in any advertisement of this socket.
    pub fn try_clone(&self) -> Result<Self> {
        let socket = self.backend()?.try_clone()?;

        // the duplicate shares the file status flags, so it is already in the right blocking mode
        Ok(BluetoothSocket {
            socket: Some(socket),
            protocol: self.protocol,
            timeout: self.timeout,
            config: self.config,
            state: self.state,
            advertisement: None,
        })
    }

    /// Close the socket
    ///
    /// The service record advertised by this socket is unregistered first. Closing a closed
    /// socket does nothing.
    pub fn close(&mut self) {
        if let Some(Advertisement { handle, mut session }) = self.advertisement.take() {
            if let Err(e) = session.unregister(handle) {
                log::warn!("failed to unregister service record {:#010x}: {}", handle, e);
            }

            session.close();
        }

        if self.socket.take().is_some() {
            log::debug!("closed {} socket", self.protocol);
        }

        self.state = SocketState::Closed;
    }
}

impl BluetoothSocket<KernelSocket> {
    /// Adopt an open socket descriptor of `protocol`
    pub fn from_fd(fd: OwnedFd, protocol: Protocol, config: SocketConfig) -> Result<Self> {
        Self::from_backend(KernelSocket::from_fd(fd), protocol, config)
    }
}

impl<S: RawSocket + AsRawFd> AsRawFd for BluetoothSocket<S> {
    /// The descriptor of a closed socket is -1
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_ref().map(AsRawFd::as_raw_fd).unwrap_or(-1)
    }
}

impl<S: RawSocket> Drop for BluetoothSocket<S> {
    fn drop(&mut self) {
        self.close()
    }
}

impl<S: RawSocket> core::fmt::Debug for BluetoothSocket<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("BluetoothSocket")
            .field("protocol", &self.protocol)
            .field("state", &self.state)
            .field("timeout", &self.timeout)
            .field("advertised", &self.advertisement.as_ref().map(|a| a.handle))
            .finish()
    }
}

/// Find a free port by binding throw away sockets
pub(crate) fn probe_port<S: RawSocket>(protocol: Protocol) -> Result<u16> {
    let ports: Box<dyn Iterator<Item = u16>> = match protocol {
        Protocol::Rfcomm => Box::new(RFCOMM_PORTS),
        Protocol::L2cap => Box::new(L2CAP_PORTS.step_by(2)),
        other => return Err(Error::Unsupported(format!("{} sockets do not have ports", other))),
    };

    for port in ports {
        let address = match protocol {
            Protocol::Rfcomm => SocketAddress::Rfcomm {
                address: BluetoothDeviceAddress::ANY,
                channel: port as u8,
            },
            _ => SocketAddress::L2cap {
                address: BluetoothDeviceAddress::ANY,
                psm: port,
            },
        };

        let socket = S::open(protocol)?;

        if socket.bind(&address.encode()?).is_ok() {
            log::trace!("found free {} port {}", protocol, port);

            return Ok(port);
        }
    }

    Err(Errno::EADDRINUSE.into())
}

/// Get the first free L2CAP PSM or RFCOMM channel
pub fn available_port(protocol: Protocol) -> Result<u16> {
    probe_port::<KernelSocket>(protocol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSocket;
    use crate::ErrorKind;
    use std::time::Duration;

    fn l2cap(mock: &MockSocket, config: SocketConfig) -> BluetoothSocket<MockSocket> {
        BluetoothSocket::from_backend(mock.clone(), Protocol::L2cap, config).unwrap()
    }

    #[test]
    fn state_test() {
        let mock = MockSocket::new();

        let mut socket = l2cap(&mock, SocketConfig::default());

        assert_eq!(SocketState::Open, socket.state());

        socket.bind(&SocketAddress::l2cap("00:00:00:00:00:00", 0x1003).unwrap()).unwrap();

        assert_eq!(SocketState::Bound, socket.state());

        socket.listen(0).unwrap();

        assert!(socket.is_listening());

        assert_eq!(Some(1), mock.state().backlog);

        socket.close();

        socket.close();

        assert_eq!(SocketState::Closed, socket.state());

        assert_eq!(ErrorKind::State, socket.send(b"x").unwrap_err().kind());
    }

    #[test]
    fn bind_protocol_test() {
        let mock = MockSocket::new();

        let mut socket = l2cap(&mock, SocketConfig::default());

        let error = socket.bind(&SocketAddress::rfcomm("00:00:00:00:00:00", 1).unwrap()).unwrap_err();

        assert_eq!(ErrorKind::Protocol, error.kind());

        let even = SocketAddress::L2cap {
            address: BluetoothDeviceAddress::ANY,
            psm: 0x1002,
        };

        assert_eq!(ErrorKind::Value, socket.bind(&even).unwrap_err().kind());

        assert_eq!(SocketState::Open, socket.state());
    }

    #[test]
    fn bind_any_port_test() {
        let mock = MockSocket::new();

        let mut socket = l2cap(&mock, SocketConfig::default());

        socket.bind(&SocketAddress::l2cap("00:00:00:00:00:00", 0).unwrap()).unwrap();

        // the mock accepts the first probe
        assert_eq!(
            SocketAddress::L2cap {
                address: BluetoothDeviceAddress::ANY,
                psm: 0x1001
            },
            socket.local_addr().unwrap()
        );
    }

    #[test]
    fn timeout_test() {
        let mock = MockSocket::new();

        let mut socket = l2cap(&mock, SocketConfig::default());

        assert!(!mock.state().nonblocking);

        socket.set_timeout(Timeout::After(Duration::from_millis(10))).unwrap();

        assert!(mock.state().nonblocking);

        mock.state().writable = false;

        assert_eq!(ErrorKind::Timeout, socket.send(b"data").unwrap_err().kind());

        assert!(mock.state().sent.is_empty());

        socket.set_blocking(true).unwrap();

        assert!(!mock.state().nonblocking);

        assert_eq!(4, socket.send(b"data").unwrap());
    }

    #[test]
    fn connect_test() {
        let mock = MockSocket::new();

        let mut socket = l2cap(
            &mock,
            SocketConfig::with_default_timeout(Timeout::After(Duration::from_secs(1))),
        );

        mock.state().connect_results = vec![Err(Errno::EINPROGRESS), Err(Errno::EISCONN)].into();

        let address = SocketAddress::l2cap("01:23:45:67:89:AB", 0x1001).unwrap();

        socket.connect(&address).unwrap();

        assert_eq!(SocketState::Connected, socket.state());

        let mut socket = l2cap(&mock, SocketConfig::default());

        mock.state().connect_results = vec![Err(Errno::EHOSTDOWN)].into();

        assert_eq!(Errno::EHOSTDOWN as i32, socket.connect_nonblocking(&address).unwrap());

        assert_eq!(SocketState::Open, socket.state());

        assert_eq!(0, socket.connect_nonblocking(&address).unwrap());

        let rfcomm = SocketAddress::rfcomm("01:23:45:67:89:AB", 1).unwrap();

        assert!(socket.connect_nonblocking(&rfcomm).is_err());
    }

    #[test]
    fn connect_timeout_test() {
        let mock = MockSocket::new();

        let mut socket = l2cap(
            &mock,
            SocketConfig::with_default_timeout(Timeout::After(Duration::from_millis(5))),
        );

        mock.state().connect_results = vec![Err(Errno::EINPROGRESS)].into();

        mock.state().writable = false;

        let address = SocketAddress::l2cap("01:23:45:67:89:AB", 0x1001).unwrap();

        assert_eq!(Errno::EAGAIN as i32, socket.connect_nonblocking(&address).unwrap());
    }

    #[test]
    fn accept_test() {
        let mock = MockSocket::new();

        let socket = l2cap(&mock, SocketConfig::with_default_timeout(Timeout::NonBlocking));

        let peer = SocketAddress::l2cap("01:23:45:67:89:AB", 0x1001).unwrap();

        mock.state().peer = peer.encode().unwrap();

        let (accepted, from) = socket.accept().unwrap();

        assert_eq!(peer, from);

        assert_eq!(SocketState::Connected, accepted.state());

        assert_eq!(Timeout::NonBlocking, accepted.timeout());
    }

    #[test]
    fn option_test() {
        let mock = MockSocket::new();

        let socket = l2cap(&mock, SocketConfig::default());

        assert_eq!(ErrorKind::Value, socket.option(0, 1, 0).unwrap_err().kind());

        assert_eq!(ErrorKind::Value, socket.option(0, 1, 1025).unwrap_err().kind());

        socket.set_option_int(SOL_L2CAP, L2CAP_LM, 6).unwrap();

        assert_eq!(6, socket.option_int(SOL_L2CAP, L2CAP_LM).unwrap());

        let mut options = L2capOptions::default();

        options.set_mtu(672).unwrap();

        socket.set_l2cap_options(&options).unwrap();

        socket.set_l2cap_mtu(1000).unwrap();

        let options = socket.l2cap_options().unwrap();

        assert_eq!((1000, 1000), (options.incoming_mtu, options.outgoing_mtu));

        assert_eq!(ErrorKind::Value, socket.set_l2cap_mtu(20).unwrap_err().kind());
    }

    #[test]
    fn security_fallback_test() {
        let mock = MockSocket::new();

        let socket = l2cap(&mock, SocketConfig::default());

        mock.state().rejected_options.push((SOL_BLUETOOTH, BT_SECURITY));

        socket.set_l2cap_security(SecurityLevel::Medium).unwrap();

        assert_eq!(
            SecurityLevel::Medium.link_mode(),
            socket.option_int(SOL_L2CAP, L2CAP_LM).unwrap()
        );
    }

    #[test]
    fn unsupported_options_test() {
        let mock = MockSocket::new();

        let socket = BluetoothSocket::from_backend(mock, Protocol::Rfcomm, SocketConfig::default()).unwrap();

        assert_eq!(ErrorKind::Unsupported, socket.l2cap_options().unwrap_err().kind());
    }
}
