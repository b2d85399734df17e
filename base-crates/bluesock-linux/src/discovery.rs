//! Discovery of nearby devices
//!
//! [`discover_devices`] performs a blocking inquiry through the kernel. The
//! [`DeviceDiscoverer`] instead drives the inquiry itself by sending the HCI commands and
//! processing the events as they are read, reporting each device to a [`DiscoveryHandler`] as it
//! is found.

use crate::consts::{
    EVT_CMD_COMPLETE, HCI_EVENT_PKT, OCF_INQUIRY, OCF_INQUIRY_CANCEL, OCF_REMOTE_NAME_REQ, OGF_LINK_CTL,
    REMOTE_NAME_TIMEOUT_MS, SOL_HCI, HCI_FILTER,
};
use crate::error::{Error, Result};
use crate::hci::{open_device, HCI_MAX_EVENT_SIZE};
use crate::raw::{KernelSocket, RawSocket};
use crate::socket::BluetoothSocket;
use bluesock_core::BluetoothDeviceAddress;
use bluesock_hci::event::{InquiryEvent, InquiryResponse};
use bluesock_hci::inquiry::GIAC_LAP;
use bluesock_hci::HciFilter;
use std::collections::{HashSet, VecDeque};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// The most responses an inquiry started by a [`DeviceDiscoverer`] asks for
const MAX_RESPONSES: u8 = 255;

/// Configuration of device discovery
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DiscoveryConfig {
    /// The length of the inquiry in units of 1.28 seconds
    pub duration: u8,
    pub flush_cache: bool,
    /// Look up the name of each device found
    pub lookup_names: bool,
    /// The timeout of each name lookup
    pub name_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            duration: 8,
            flush_cache: true,
            lookup_names: false,
            name_timeout: Duration::from_secs(10),
        }
    }
}

/// A device found by an inquiry
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveredDevice {
    pub address: BluetoothDeviceAddress,
    /// The name of the device, if names were looked up
    pub name: Option<String>,
    pub class_of_device: u32,
}

fn timeout_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

/// Discover the devices in range with the first device that is up
///
/// When names are looked up, devices whose name could not be read are left out.
pub fn discover_devices(config: &DiscoveryConfig) -> Result<Vec<DiscoveredDevice>> {
    let socket = open_device(-1)?;

    discover_with(&socket, config)
}

/// Discover the devices in range with the device `socket` is bound to
pub fn discover_with<S: RawSocket + AsRawFd>(
    socket: &BluetoothSocket<S>,
    config: &DiscoveryConfig,
) -> Result<Vec<DiscoveredDevice>> {
    let responses = socket.inquiry(config.duration, config.flush_cache)?;

    let mut devices = Vec::with_capacity(responses.len());

    for info in responses {
        let name = if config.lookup_names {
            match socket.read_remote_name(&info.address, timeout_ms(config.name_timeout)) {
                Ok(name) => Some(name),
                Err(e) => {
                    log::debug!("skipping {}, the name could not be read: {}", info.address, e);
                    continue;
                }
            }
        } else {
            None
        };

        devices.push(DiscoveredDevice {
            address: info.address,
            name,
            class_of_device: info.class_of_device,
        });
    }

    Ok(devices)
}

/// Look up the name of a remote device
///
/// The return is `None` if the name could not be read.
pub fn lookup_name(address: &BluetoothDeviceAddress, timeout: Option<Duration>) -> Result<Option<String>> {
    let socket = open_device(-1)?;

    let timeout_ms = timeout.map(timeout_ms).unwrap_or(REMOTE_NAME_TIMEOUT_MS);

    match socket.read_remote_name(address, timeout_ms) {
        Ok(name) => Ok(Some(name)),
        Err(e) => {
            log::debug!("failed to read the name of {}: {}", address, e);
            Ok(None)
        }
    }
}

/// The callbacks of a [`DeviceDiscoverer`]
pub trait DiscoveryHandler {
    /// Called right before the inquiry is started
    fn pre_inquiry(&mut self) {}

    /// Called for every device found
    ///
    /// The RSSI is only known for devices reported without a name lookup and only if the
    /// controller reports it.
    fn device_discovered(&mut self, device: &DiscoveredDevice, rssi: Option<i8>);

    /// Called once the inquiry and all name lookups are done
    fn inquiry_complete(&mut self);
}

/// A device waiting for its name to be looked up
#[derive(Clone, Debug)]
struct PendingName {
    address: BluetoothDeviceAddress,
    class_of_device: u32,
    page_scan_repetition_mode: u8,
    clock_offset: u16,
}

impl From<&InquiryResponse> for PendingName {
    fn from(response: &InquiryResponse) -> Self {
        PendingName {
            address: response.address,
            class_of_device: response.class_of_device,
            page_scan_repetition_mode: response.page_scan_repetition_mode,
            clock_offset: response.clock_offset,
        }
    }
}

/// An event driven discoverer of devices
///
/// ```no_run
/// # use bluesock_linux::{DeviceDiscoverer, DiscoveryConfig, DiscoveredDevice, DiscoveryHandler};
/// struct Printer;
///
/// impl DiscoveryHandler for Printer {
///     fn device_discovered(&mut self, device: &DiscoveredDevice, _: Option<i8>) {
///         println!("{} {:?}", device.address, device.name);
///     }
///
///     fn inquiry_complete(&mut self) {}
/// }
///
/// let mut discoverer = DeviceDiscoverer::new(-1, Printer)?;
///
/// discoverer.find_devices(&DiscoveryConfig { lookup_names: true, ..Default::default() })?;
///
/// discoverer.process_inquiry()?;
/// # Ok::<(), bluesock_linux::Error>(())
/// ```
pub struct DeviceDiscoverer<H, S: RawSocket = KernelSocket> {
    socket: BluetoothSocket<S>,
    handler: H,
    lookup_names: bool,
    is_inquiring: bool,
    names_to_find: VecDeque<PendingName>,
    names_found: HashSet<BluetoothDeviceAddress>,
}

impl<H: DiscoveryHandler> DeviceDiscoverer<H> {
    /// Create a discoverer for a device, a negative `dev_id` is the first device that is up
    pub fn new(dev_id: i32, handler: H) -> Result<Self> {
        Ok(Self::with_socket(open_device(dev_id)?, handler))
    }
}

impl<H: DiscoveryHandler, S: RawSocket> DeviceDiscoverer<H, S> {
    /// Create a discoverer that uses a HCI socket already bound to a device
    pub fn with_socket(socket: BluetoothSocket<S>, handler: H) -> Self {
        DeviceDiscoverer {
            socket,
            handler,
            lookup_names: false,
            is_inquiring: false,
            names_to_find: VecDeque::new(),
            names_found: HashSet::new(),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    pub fn is_inquiring(&self) -> bool {
        self.is_inquiring
    }

    /// Check if there is still work for [`process_event`](DeviceDiscoverer::process_event)
    pub fn is_busy(&self) -> bool {
        self.is_inquiring || !self.names_to_find.is_empty()
    }

    /// Start an inquiry
    ///
    /// Only the duration and whether names are looked up are used from `config`.
    pub fn find_devices(&mut self, config: &DiscoveryConfig) -> Result<()> {
        if self.is_inquiring {
            return Err(Error::State("an inquiry is already in progress"));
        }

        self.lookup_names = config.lookup_names;

        let mut filter = HciFilter::new();

        filter.all_events();
        filter.set_packet_type(HCI_EVENT_PKT);

        self.socket.set_option(SOL_HCI, HCI_FILTER, &filter.to_bytes())?;

        self.handler.pre_inquiry();

        let mut parameters = GIAC_LAP.to_vec();

        parameters.extend_from_slice(&[config.duration, MAX_RESPONSES]);

        self.socket.send_command(OGF_LINK_CTL, OCF_INQUIRY, &parameters)?;

        self.is_inquiring = true;
        self.names_to_find.clear();
        self.names_found.clear();

        Ok(())
    }

    /// Stop the inquiry and any name lookups that have not started
    pub fn cancel_inquiry(&mut self) -> Result<()> {
        self.names_to_find.clear();

        if self.is_inquiring {
            let result = self.socket.send_command(OGF_LINK_CTL, OCF_INQUIRY_CANCEL, &[]);

            self.is_inquiring = false;

            result?;
        }

        Ok(())
    }

    /// Read and process one event
    pub fn process_event(&mut self) -> Result<()> {
        let mut buffer = [0u8; HCI_MAX_EVENT_SIZE];

        let len = self.socket.recv(&mut buffer)?;

        self.process_packet(&buffer[..len])
    }

    /// Process events until the inquiry and the name lookups are done
    pub fn process_inquiry(&mut self) -> Result<()> {
        while self.is_busy() {
            self.process_event()?;
        }

        Ok(())
    }

    /// Process a packet read from the HCI socket
    pub fn process_packet(&mut self, packet: &[u8]) -> Result<()> {
        let event = match InquiryEvent::parse(packet) {
            Ok(event) => event,
            Err(e) => {
                log::debug!("ignoring packet: {}", e);
                return Ok(());
            }
        };

        match event {
            InquiryEvent::Result(responses) => {
                for response in responses.iter() {
                    self.inquiry_result(response)
                }

                Ok(())
            }
            InquiryEvent::Complete { .. } | InquiryEvent::Other(EVT_CMD_COMPLETE) => {
                self.is_inquiring = false;

                self.next_name_or_complete()
            }
            InquiryEvent::CommandStatus { status, .. } if status != 0 => {
                log::debug!("inquiry command failed with status {:#04x}", status);

                self.is_inquiring = false;
                self.names_to_find.clear();

                self.handler.inquiry_complete();

                Ok(())
            }
            InquiryEvent::RemoteNameComplete { status, address, name } => {
                let pending = self
                    .names_to_find
                    .iter()
                    .position(|p| p.address == address)
                    .and_then(|at| self.names_to_find.remove(at));

                match (status, pending) {
                    (0, Some(pending)) => {
                        self.names_found.insert(address);

                        let device = DiscoveredDevice {
                            address,
                            name: Some(name),
                            class_of_device: pending.class_of_device,
                        };

                        self.handler.device_discovered(&device, None);
                    }
                    (0, None) => log::trace!("name of {} was not requested", address),
                    (status, _) => log::debug!("name lookup of {} failed with status {:#04x}", address, status),
                }

                if self.is_inquiring {
                    Ok(())
                } else {
                    self.next_name_or_complete()
                }
            }
            _ => Ok(()),
        }
    }

    fn inquiry_result(&mut self, response: &InquiryResponse) {
        if self.lookup_names {
            let address = response.address;

            if !self.names_found.contains(&address) && !self.names_to_find.iter().any(|p| p.address == address) {
                self.names_to_find.push_back(PendingName::from(response));
            }
        } else {
            let device = DiscoveredDevice {
                address: response.address,
                name: None,
                class_of_device: response.class_of_device,
            };

            self.handler.device_discovered(&device, response.rssi);
        }
    }

    fn next_name_or_complete(&mut self) -> Result<()> {
        match self.names_to_find.front() {
            None => {
                self.handler.inquiry_complete();
                Ok(())
            }
            Some(pending) => {
                let mut parameters = pending.address.as_bytes().to_vec();

                parameters.push(pending.page_scan_repetition_mode);
                parameters.push(0);
                parameters.extend_from_slice(&pending.clock_offset.to_le_bytes());

                log::trace!("requesting the name of {}", pending.address);

                self.socket.send_command(OGF_LINK_CTL, OCF_REMOTE_NAME_REQ, &parameters)
            }
        }
    }
}
