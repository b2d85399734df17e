//! Raw HCI sockets
//!
//! Commands are sent to a controller through a socket of [`Protocol::Hci`] bound to the device.
//! The controller management done by the kernel (bringing a device up, listing devices, reading
//! the connections, etc.) is through ioctls on any HCI socket.

use crate::addr::{Protocol, SocketAddress};
use crate::consts::{
    ACL_LINK, EVT_CMD_COMPLETE, EVT_REMOTE_NAME_REQ_COMPLETE, EVT_REMOTE_NAME_REQ_COMPLETE_SIZE, HCISETACLMTU,
    HCISETAUTH, HCISETENCRYPT, HCISETLINKMODE, HCISETLINKPOL, HCISETPTYPE, HCISETRAW, HCISETSCAN, HCISETSCOMTU,
    HCI_FILTER, HCI_MAX_DEV, HCI_UP, OCF_READ_AUTOMATIC_FLUSH_TIMEOUT, OCF_REMOTE_NAME_REQ,
    OCF_WRITE_AUTOMATIC_FLUSH_TIMEOUT, OGF_HOST_CTL, OGF_LINK_CTL, SOL_HCI,
};
use crate::error::{Error, Result};
use crate::raw::{Direction, KernelSocket, RawSocket};
use crate::socket::BluetoothSocket;
use crate::sys;
use bluesock_core::BluetoothDeviceAddress;
use bluesock_hci::command::command_packet;
use bluesock_hci::event::nul_terminated;
use bluesock_hci::filter::HCI_FILTER_SIZE;
use bluesock_hci::inquiry::{parse_responses, InquiryInfo, InquiryRequest};
use bluesock_hci::{HciError, Match, Request};
use nix::errno::Errno;
use std::os::fd::AsRawFd;
use std::time::{Duration, Instant};

/// The largest event packet, the packet indicator plus the header and 255 bytes of parameters
pub const HCI_MAX_EVENT_SIZE: usize = 260;

/// The timeout of the flush timeout commands in milliseconds
const FLUSH_TIMEOUT_REQUEST_MS: u64 = 1000;

/// The flush timeout is in units of 0.625 milliseconds
const FLUSH_TIMEOUT_UNIT_MS: f64 = 0.625;

/// The largest automatic flush timeout
const MAX_FLUSH_TIMEOUT: u16 = 0x07FF;

impl<S: RawSocket> BluetoothSocket<S> {
    fn require_hci(&self) -> Result<()> {
        match self.protocol() {
            Protocol::Hci => Ok(()),
            other => Err(Error::Unsupported(format!("HCI commands cannot be sent on a {} socket", other))),
        }
    }

    fn send_packet(&self, packet: &[u8]) -> Result<()> {
        let socket = self.backend()?;

        loop {
            match socket.send(packet, 0) {
                Ok(_) => break Ok(()),
                Err(Errno::EAGAIN | Errno::EINTR) => continue,
                Err(e) => break Err(e.into()),
            }
        }
    }

    /// Send a command to the controller
    ///
    /// This does not wait for a response.
    pub fn send_command(&self, ogf: u16, ocf: u16, parameters: &[u8]) -> Result<()> {
        self.require_hci()?;

        log::trace!("sending HCI command (OGF {:#04x}, OCF {:#06x})", ogf, ocf);

        self.send_packet(&command_packet(ogf, ocf, parameters)?)
    }

    /// Send a command and wait for its response
    ///
    /// The return is the parameters of the response event truncated to the response length of
    /// `request`. A `timeout_ms` of zero waits forever. The filter of the socket is changed for
    /// the duration of the request and restored afterwards.
    pub fn send_request(&self, request: &Request, timeout_ms: u64) -> Result<Vec<u8>> {
        self.require_hci()?;

        let socket = self.backend()?;

        let saved = socket.option(SOL_HCI, HCI_FILTER, HCI_FILTER_SIZE)?;

        socket.set_option(SOL_HCI, HCI_FILTER, &request.filter().to_bytes())?;

        let result = self.exchange(request, timeout_ms);

        match (socket.set_option(SOL_HCI, HCI_FILTER, &saved), result) {
            (Ok(()), result) => result,
            (Err(e), Ok(_)) => Err(e.into()),
            (Err(e), result) => {
                log::warn!("failed to restore the HCI filter: {}", e);
                result
            }
        }
    }

    fn exchange(&self, request: &Request, timeout_ms: u64) -> Result<Vec<u8>> {
        let socket = self.backend()?;

        self.send_packet(&request.packet()?)?;

        let deadline = (timeout_ms != 0).then(|| Instant::now() + Duration::from_millis(timeout_ms));

        let mut matcher = request.matcher();

        let mut buffer = [0u8; HCI_MAX_EVENT_SIZE];

        while !matcher.is_exhausted() {
            let wait_ms = match deadline {
                None => -1,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());

                    if remaining.is_zero() {
                        return Err(Error::Timeout);
                    }

                    i32::try_from(remaining.as_millis().max(1)).unwrap_or(i32::MAX)
                }
            };

            if !socket.wait(Direction::Read, wait_ms)? {
                return Err(Error::Timeout);
            }

            let len = match socket.recv(&mut buffer, 0) {
                Ok(len) => len,
                Err(Errno::EAGAIN | Errno::EINTR) => continue,
                Err(e) => return Err(e.into()),
            };

            match matcher.offer(&buffer[..len]) {
                Match::Pending => continue,
                Match::Complete(response) => return Ok(response),
                Match::Failed(status) => return Err(HciError::Status(status).into()),
            }
        }

        Err(Error::Timeout)
    }

    /// Read the name of a remote device
    ///
    /// See [`REMOTE_NAME_TIMEOUT_MS`](crate::consts::REMOTE_NAME_TIMEOUT_MS) for the timeout
    /// usually used.
    pub fn read_remote_name(&self, address: &BluetoothDeviceAddress, timeout_ms: u64) -> Result<String> {
        let mut parameters = address.as_bytes().to_vec();

        // page scan repetition mode R2, reserved, and no clock offset
        parameters.extend_from_slice(&[0x02, 0x00, 0x00, 0x00]);

        let request = Request::new(
            OGF_LINK_CTL,
            OCF_REMOTE_NAME_REQ,
            EVT_REMOTE_NAME_REQ_COMPLETE,
            EVT_REMOTE_NAME_REQ_COMPLETE_SIZE,
            &parameters,
        );

        let response = self.send_request(&request, timeout_ms)?;

        match response.first() {
            Some(0) => Ok(nul_terminated(response.get(7..).unwrap_or_default())),
            _ => Err(Errno::EIO.into()),
        }
    }

    /// Get the id of the device the socket is bound to, the first device if it is not bound
    fn bound_device(&self) -> u16 {
        match self.local_addr() {
            Ok(SocketAddress::Hci { device, .. }) => device,
            _ => 0,
        }
    }
}

impl<S: RawSocket + AsRawFd> BluetoothSocket<S> {
    /// Perform an inquiry with the device the socket is bound to
    ///
    /// `duration` is in units of 1.28 seconds. Responses are in the order the kernel returned
    /// them.
    pub fn inquiry(&self, duration: u8, flush_cache: bool) -> Result<Vec<InquiryInfo>> {
        self.require_hci()?;

        let dev_id = self.bound_device();

        let mut buffer = InquiryRequest::new(dev_id, duration, flush_cache).to_buffer();

        log::debug!("starting inquiry on hci{} for {} units", dev_id, duration);

        unsafe { sys::hci_inquiry(self.as_raw_fd(), &mut buffer) }?;

        let responses = parse_responses(&buffer);

        log::debug!("inquiry found {} devices", responses.len());

        Ok(responses)
    }

    /// Get the handle of the ACL connection to a remote device
    pub fn acl_connection_handle(&self, address: &BluetoothDeviceAddress) -> Result<u16> {
        let mut req = sys::hci_conn_info_req {
            bdaddr: *address.as_bytes(),
            type_: ACL_LINK,
            ..Default::default()
        };

        unsafe { sys::hci_get_conn_info(self.as_raw_fd(), &mut req) }?;

        Ok(req.conn_info.handle)
    }

    /// Read the automatic flush timeout of the connection to a remote device
    pub fn read_flush_timeout(&self, address: &BluetoothDeviceAddress) -> Result<u16> {
        let handle = self.acl_connection_handle(address)?;

        let request = Request::new(
            OGF_HOST_CTL,
            OCF_READ_AUTOMATIC_FLUSH_TIMEOUT,
            EVT_CMD_COMPLETE,
            5,
            &handle.to_le_bytes(),
        );

        match self.send_request(&request, FLUSH_TIMEOUT_REQUEST_MS)?.as_slice() {
            [0, _, _, lo, hi] => Ok(u16::from_le_bytes([*lo, *hi])),
            [0, ..] => Err(HciError::MalformedEvent("read automatic flush timeout").into()),
            _ => Err(Errno::EIO.into()),
        }
    }

    /// Write the automatic flush timeout of the connection to a remote device
    ///
    /// The timeout is in units of 0.625 milliseconds, zero is an infinite timeout.
    pub fn write_flush_timeout(&self, address: &BluetoothDeviceAddress, timeout: u16) -> Result<()> {
        if timeout > MAX_FLUSH_TIMEOUT {
            return Err(Error::value(format!("flush timeout {:#06x} is out of range", timeout)));
        }

        let handle = self.acl_connection_handle(address)?;

        let mut parameters = handle.to_le_bytes().to_vec();

        parameters.extend_from_slice(&timeout.to_le_bytes());

        let request = Request::new(
            OGF_HOST_CTL,
            OCF_WRITE_AUTOMATIC_FLUSH_TIMEOUT,
            EVT_CMD_COMPLETE,
            3,
            &parameters,
        );

        match self.send_request(&request, FLUSH_TIMEOUT_REQUEST_MS)?.first() {
            Some(0) => Ok(()),
            _ => Err(Errno::EIO.into()),
        }
    }

    /// Set the time after which unsent packets to a remote device are flushed
    pub fn set_packet_timeout(&self, address: &BluetoothDeviceAddress, timeout_ms: f64) -> Result<()> {
        self.write_flush_timeout(address, flush_timeout_units(timeout_ms)?)
    }
}

fn flush_timeout_units(timeout_ms: f64) -> Result<u16> {
    let units = (timeout_ms / FLUSH_TIMEOUT_UNIT_MS).round();

    if units.is_nan() || units < 0.0 || units > f64::from(MAX_FLUSH_TIMEOUT) {
        Err(Error::value(format!("packet timeout of {} ms is out of range", timeout_ms)))
    } else {
        Ok(units as u16)
    }
}

/// An entry of the device list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceListEntry {
    pub id: u16,
    /// The device flags, see [`HCI_UP`] and the other flag bits
    pub flags: u32,
}

impl DeviceListEntry {
    pub fn is_up(&self) -> bool {
        test_flag(self.flags, HCI_UP)
    }
}

/// Test a device flag bit
pub fn test_flag(flags: u32, bit: u32) -> bool {
    bit < 32 && flags & (1 << bit) != 0
}

/// The statistics of a device
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceStats {
    pub err_rx: u32,
    pub err_tx: u32,
    pub cmd_tx: u32,
    pub evt_rx: u32,
    pub acl_tx: u32,
    pub acl_rx: u32,
    pub sco_tx: u32,
    pub sco_rx: u32,
    pub byte_rx: u32,
    pub byte_tx: u32,
}

/// The information the kernel has about a device
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    pub id: u16,
    pub name: String,
    pub address: BluetoothDeviceAddress,
    pub flags: u32,
    pub device_type: u8,
    pub features: [u8; 8],
    pub packet_type: u32,
    pub link_policy: u32,
    pub link_mode: u32,
    pub acl_mtu: u16,
    pub acl_packets: u16,
    pub sco_mtu: u16,
    pub sco_packets: u16,
    pub stats: DeviceStats,
}

impl DeviceInfo {
    pub fn is_up(&self) -> bool {
        test_flag(self.flags, HCI_UP)
    }
}

impl From<&sys::hci_dev_info> for DeviceInfo {
    fn from(info: &sys::hci_dev_info) -> Self {
        let s = &info.stat;

        DeviceInfo {
            id: info.dev_id,
            name: nul_terminated(&info.name),
            address: BluetoothDeviceAddress::from_bytes(info.bdaddr),
            flags: info.flags,
            device_type: info.type_,
            features: info.features,
            packet_type: info.pkt_type,
            link_policy: info.link_policy,
            link_mode: info.link_mode,
            acl_mtu: info.acl_mtu,
            acl_packets: info.acl_pkts,
            sco_mtu: info.sco_mtu,
            sco_packets: info.sco_pkts,
            stats: DeviceStats {
                err_rx: s.err_rx,
                err_tx: s.err_tx,
                cmd_tx: s.cmd_tx,
                evt_rx: s.evt_rx,
                acl_tx: s.acl_tx,
                acl_rx: s.acl_rx,
                sco_tx: s.sco_tx,
                sco_rx: s.sco_rx,
                byte_rx: s.byte_rx,
                byte_tx: s.byte_tx,
            },
        }
    }
}

/// A connection of a device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionInfo {
    pub handle: u16,
    pub address: BluetoothDeviceAddress,
    pub link_type: u8,
    /// The connection was initiated by this device
    pub outgoing: bool,
    pub state: u16,
    pub link_mode: u32,
}

impl From<&sys::hci_conn_info> for ConnectionInfo {
    fn from(info: &sys::hci_conn_info) -> Self {
        ConnectionInfo {
            handle: info.handle,
            address: BluetoothDeviceAddress::from_bytes(info.bdaddr),
            link_type: info.type_,
            outgoing: info.out != 0,
            state: info.state,
            link_mode: info.link_mode,
        }
    }
}

/// Open a socket for the device management ioctls
fn control_socket() -> Result<KernelSocket> {
    Ok(KernelSocket::open(Protocol::Hci)?)
}

/// List the devices
pub fn device_list() -> Result<Vec<DeviceListEntry>> {
    let socket = control_socket()?;

    let mut req = sys::hci_dev_list_req {
        dev_num: HCI_MAX_DEV as u16,
        ..Default::default()
    };

    unsafe { sys::hci_get_dev_list(socket.as_raw_fd(), &mut req) }?;

    Ok(req
        .dev_req
        .iter()
        .take(usize::from(req.dev_num).min(HCI_MAX_DEV))
        .map(|dr| DeviceListEntry {
            id: dr.dev_id,
            flags: dr.dev_opt,
        })
        .collect())
}

pub fn device_info(dev_id: u16) -> Result<DeviceInfo> {
    let socket = control_socket()?;

    let mut info = sys::hci_dev_info {
        dev_id,
        ..Default::default()
    };

    unsafe { sys::hci_get_dev_info(socket.as_raw_fd(), &mut info) }?;

    Ok(DeviceInfo::from(&info))
}

/// Get the addresses of the devices that are up
fn up_devices() -> Result<Vec<(u16, BluetoothDeviceAddress)>> {
    let mut devices = Vec::new();

    for entry in device_list()?.into_iter().filter(DeviceListEntry::is_up) {
        match device_info(entry.id) {
            Ok(info) => devices.push((entry.id, info.address)),
            Err(e) => log::debug!("skipping hci{}: {}", entry.id, e),
        }
    }

    Ok(devices)
}

/// Pick the device used to reach `target`
///
/// This is the first device with an address different from `target`, or failing that the first
/// device with the same address.
fn select_route(devices: &[(u16, BluetoothDeviceAddress)], target: &BluetoothDeviceAddress) -> Option<u16> {
    devices
        .iter()
        .find(|(_, address)| address != target)
        .or_else(|| devices.iter().find(|(_, address)| address == target))
        .map(|(id, _)| *id)
}

/// Get the id of the device to use for reaching `address`
///
/// Without an address this is the first device that is up.
pub fn route(address: Option<&BluetoothDeviceAddress>) -> Result<u16> {
    select_route(&up_devices()?, address.unwrap_or(&BluetoothDeviceAddress::ANY)).ok_or(Errno::ENODEV.into())
}

/// Get the id of the device with `address`
pub fn device_id(address: &BluetoothDeviceAddress) -> Result<u16> {
    up_devices()?
        .into_iter()
        .find(|(_, a)| a == address)
        .map(|(id, _)| id)
        .ok_or(Errno::ENODEV.into())
}

/// Open a socket bound to a device
///
/// A negative `dev_id` opens the first device that is up.
pub fn open_device(dev_id: i32) -> Result<BluetoothSocket> {
    let dev_id = match u16::try_from(dev_id) {
        Ok(id) => id,
        Err(_) if dev_id < 0 => route(None)?,
        Err(_) => return Err(Error::value(format!("invalid device id {}", dev_id))),
    };

    let mut socket = BluetoothSocket::new(Protocol::Hci)?;

    socket.bind(&SocketAddress::hci(dev_id))?;

    Ok(socket)
}

macro_rules! device_ioctl {
    ($(#[$meta:meta])* $name:ident, $ioctl:path) => {
        $(#[$meta])*
        pub fn $name(dev_id: u16) -> Result<()> {
            let socket = control_socket()?;

            unsafe { $ioctl(socket.as_raw_fd(), dev_id.into()) }?;

            log::debug!(concat!(stringify!($name), " hci{}"), dev_id);

            Ok(())
        }
    };
}

device_ioctl!(device_up, sys::hci_dev_up);
device_ioctl!(device_down, sys::hci_dev_down);
device_ioctl!(device_reset, sys::hci_dev_reset);
device_ioctl!(
    /// Reset the statistics of a device
    reset_stats,
    sys::hci_dev_reset_stats
);

fn device_command(nr: u8, dev_id: u16, option: u32) -> Result<()> {
    let socket = control_socket()?;

    let mut req = sys::hci_dev_req { dev_id, dev_opt: option };

    unsafe { sys::hci_dev_cmd(socket.as_raw_fd(), nr, &mut req) }?;

    Ok(())
}

/// Set the scan mode, see [`SCAN_INQUIRY`](crate::consts::SCAN_INQUIRY) and
/// [`SCAN_PAGE`](crate::consts::SCAN_PAGE)
pub fn set_scan(dev_id: u16, mode: u32) -> Result<()> {
    device_command(HCISETSCAN, dev_id, mode)
}

pub fn set_auth(dev_id: u16, enable: bool) -> Result<()> {
    device_command(HCISETAUTH, dev_id, enable.into())
}

pub fn set_encrypt(dev_id: u16, enable: bool) -> Result<()> {
    device_command(HCISETENCRYPT, dev_id, enable.into())
}

pub fn set_packet_type(dev_id: u16, packet_type: u32) -> Result<()> {
    device_command(HCISETPTYPE, dev_id, packet_type)
}

pub fn set_link_policy(dev_id: u16, policy: u32) -> Result<()> {
    device_command(HCISETLINKPOL, dev_id, policy)
}

pub fn set_link_mode(dev_id: u16, mode: u32) -> Result<()> {
    device_command(HCISETLINKMODE, dev_id, mode)
}

/// The MTU and packet count are packed into the option the same as the kernel expects them
fn mtu_option(mtu: u16, packets: u16) -> u32 {
    (u32::from(mtu) << 16) | u32::from(packets)
}

pub fn set_acl_mtu(dev_id: u16, mtu: u16, packets: u16) -> Result<()> {
    device_command(HCISETACLMTU, dev_id, mtu_option(mtu, packets))
}

pub fn set_sco_mtu(dev_id: u16, mtu: u16, packets: u16) -> Result<()> {
    device_command(HCISETSCOMTU, dev_id, mtu_option(mtu, packets))
}

pub fn set_raw(dev_id: u16, enable: bool) -> Result<()> {
    device_command(HCISETRAW, dev_id, enable.into())
}

/// List the connections of a device
pub fn connection_list(dev_id: u16) -> Result<Vec<ConnectionInfo>> {
    let socket = control_socket()?;

    let mut req = sys::hci_conn_list_req {
        dev_id,
        conn_num: sys::HCI_MAX_CONN as u16,
        ..Default::default()
    };

    unsafe { sys::hci_get_conn_list(socket.as_raw_fd(), &mut req) }?;

    Ok(req
        .conn_info
        .iter()
        .take(usize::from(req.conn_num).min(sys::HCI_MAX_CONN))
        .map(ConnectionInfo::from)
        .collect())
}
