//! Connections to SDP servers
//!
//! The SDP server of the local host is reached through the Unix socket of the BlueZ daemon,
//! which is also the only way records of the local device can be registered. The server of a
//! remote device is reached with a L2CAP connection to PSM 1.

use crate::addr::{Protocol, SocketAddress};
use crate::discovery::{discover_devices, DiscoveryConfig};
use crate::error::{Error, Result};
use crate::socket::BluetoothSocket;
use crate::timeout::{SocketConfig, Timeout};
use bluesock_core::{BluetoothDeviceAddress, Uuid};
use bluesock_sdp::pdu::PduHeader;
use bluesock_sdp::{
    DiscoverySession, SdpConfig, SdpConnector, SdpError, SdpTransport, ServiceInfo, SessionTarget, SDP_PSM,
    SDP_UNIX_PATH,
};
use nix::errno::Errno;
use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

/// The largest PDU read from a L2CAP connection
const MAX_PDU_SIZE: usize = 65540;

/// The time waited before connecting again to a busy device
const BUSY_RETRY_DELAY: Duration = Duration::from_millis(100);

fn io_to_sdp(e: io::Error) -> SdpError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => SdpError::Timeout,
        _ => SdpError::Transport(e),
    }
}

fn to_sdp(e: Error) -> SdpError {
    match e {
        Error::Sdp(e) => e,
        Error::Timeout => SdpError::Timeout,
        Error::Os(errno) => SdpError::Transport(io::Error::from_raw_os_error(errno as i32)),
        Error::Format(e) => SdpError::Format(e),
        e => SdpError::Transport(io::Error::new(io::ErrorKind::Other, e.to_string())),
    }
}

/// A connection to the SDP server of the BlueZ daemon
pub struct UnixSdpTransport {
    stream: UnixStream,
}

impl UnixSdpTransport {
    pub fn connect(config: &SdpConfig) -> io::Result<Self> {
        let stream = UnixStream::connect(SDP_UNIX_PATH)?;

        if !config.response_timeout.is_zero() {
            stream.set_read_timeout(Some(config.response_timeout))?;
        }

        Ok(UnixSdpTransport { stream })
    }
}

impl SdpTransport for UnixSdpTransport {
    fn send_pdu(&mut self, pdu: &[u8]) -> core::result::Result<(), SdpError> {
        self.stream.write_all(pdu).map_err(io_to_sdp)
    }

    fn recv_pdu(&mut self) -> core::result::Result<Vec<u8>, SdpError> {
        let mut pdu = vec![0u8; PduHeader::SIZE];

        self.stream.read_exact(&mut pdu).map_err(io_to_sdp)?;

        let header = PduHeader::from_bytes(&pdu)?;

        pdu.resize(PduHeader::SIZE + usize::from(header.parameter_length), 0);

        self.stream.read_exact(&mut pdu[PduHeader::SIZE..]).map_err(io_to_sdp)?;

        Ok(pdu)
    }
}

/// A L2CAP connection to the SDP server of a remote device
pub struct L2capSdpTransport {
    socket: BluetoothSocket,
}

impl L2capSdpTransport {
    /// Connect to the SDP server of `address`
    ///
    /// While the device is busy (the kernel returns `EBUSY`) connecting is retried up to
    /// `busy_retries` times.
    pub fn connect(address: &BluetoothDeviceAddress, config: &SdpConfig) -> Result<Self> {
        let timeout = if config.response_timeout.is_zero() {
            Timeout::Blocking
        } else {
            Timeout::from(config.response_timeout)
        };

        let target = SocketAddress::L2cap {
            address: *address,
            psm: SDP_PSM,
        };

        let mut retries = 0;

        loop {
            let mut socket = BluetoothSocket::with_config(Protocol::L2cap, SocketConfig::with_default_timeout(timeout))?;

            match socket.connect(&target) {
                Ok(()) => break Ok(L2capSdpTransport { socket }),
                Err(Error::Os(Errno::EBUSY)) if retries < config.busy_retries => {
                    retries += 1;

                    log::debug!("{} is busy, retrying the SDP connection ({})", address, retries);

                    std::thread::sleep(BUSY_RETRY_DELAY);
                }
                Err(e) => break Err(e),
            }
        }
    }
}

impl SdpTransport for L2capSdpTransport {
    fn send_pdu(&mut self, pdu: &[u8]) -> core::result::Result<(), SdpError> {
        self.socket.sendall(pdu).map_err(to_sdp)
    }

    fn recv_pdu(&mut self) -> core::result::Result<Vec<u8>, SdpError> {
        let mut buffer = vec![0u8; MAX_PDU_SIZE];

        let len = self.socket.recv(&mut buffer).map_err(to_sdp)?;

        buffer.truncate(len);

        Ok(buffer)
    }
}

/// Opens SDP transports through the kernel
#[derive(Clone, Copy, Debug, Default)]
pub struct KernelConnector {
    pub config: SdpConfig,
}

impl KernelConnector {
    pub fn new(config: SdpConfig) -> Self {
        KernelConnector { config }
    }
}

impl SdpConnector for KernelConnector {
    fn open(&self, target: &SessionTarget) -> core::result::Result<Box<dyn SdpTransport>, SdpError> {
        match target {
            SessionTarget::Local => Ok(Box::new(UnixSdpTransport::connect(&self.config)?)),
            SessionTarget::Remote(address) => Ok(Box::new(
                L2capSdpTransport::connect(address, &self.config).map_err(to_sdp)?,
            )),
        }
    }
}

/// Find services
///
/// `address` is either a device address or `"localhost"`. Without an address the services of
/// every device found by an inquiry are searched. Services are searched by `uuid` if it is given
/// or else every public service is browsed. Only services named `name` are returned when a name
/// is given.
pub fn find_service(name: Option<&str>, uuid: Option<&str>, address: Option<&str>) -> Result<Vec<ServiceInfo>> {
    let uuid = uuid.map(Uuid::parse).transpose()?;

    let targets = match address {
        Some(address) => vec![SessionTarget::parse(address)?],
        None => discover_devices(&DiscoveryConfig::default())?
            .into_iter()
            .map(|device| SessionTarget::Remote(device.address))
            .collect(),
    };

    Ok(find_service_with(&KernelConnector::default(), name, uuid.as_ref(), &targets))
}

/// Find services on each target
///
/// A target that cannot be connected to, or that fails the search, is skipped.
pub fn find_service_with<C>(
    connector: &C,
    name: Option<&str>,
    uuid: Option<&Uuid>,
    targets: &[SessionTarget],
) -> Vec<ServiceInfo>
where
    C: SdpConnector + ?Sized,
{
    let mut services = Vec::new();

    for target in targets {
        let mut session = DiscoverySession::new();

        let found = session.connect(connector, *target).and_then(|_| match uuid {
            Some(uuid) => session.search(uuid),
            None => session.browse(),
        });

        session.close();

        let found = match found {
            Ok(found) => found,
            Err(e) => {
                log::debug!("skipping {}: {}", target, e);
                continue;
            }
        };

        let host = match target {
            SessionTarget::Local => BluetoothDeviceAddress::LOCAL,
            SessionTarget::Remote(address) => *address,
        };

        services.extend(
            found
                .into_iter()
                .filter(|info| name.is_none() || info.name.as_deref() == name)
                .map(|info| ServiceInfo {
                    host: Some(host),
                    ..info
                }),
        );
    }

    services
}
