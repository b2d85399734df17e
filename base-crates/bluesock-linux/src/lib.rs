//! Bluetooth sockets for Linux
//!
//! Linux has Bluetooth sockets as part of its Bluetooth stack. This crate wraps the sockets of
//! the HCI, L2CAP, RFCOMM, and SCO protocols, the ioctls used to manage the controllers, and the
//! discovery of devices and services.
//!
//! ```no_run
//! use bluesock_linux::{BluetoothSocket, Protocol, SocketAddress};
//! use bluesock_sdp::record::ServiceDescription;
//!
//! let mut server: BluetoothSocket = BluetoothSocket::new(Protocol::Rfcomm)?;
//!
//! server.bind(&SocketAddress::rfcomm("00:00:00:00:00:00", 0)?)?;
//! server.listen(1)?;
//!
//! server.advertise(&ServiceDescription::new("chat").with_service_class("1101"))?;
//!
//! let (client, address) = server.accept()?;
//! # Ok::<(), bluesock_linux::Error>(())
//! ```

pub mod addr;
mod advertise;
pub mod consts;
pub mod discovery;
mod error;
pub mod hci;
#[cfg(test)]
mod mock;
mod options;
pub mod raw;
pub mod sdp;
mod socket;
mod sys;
mod timeout;

pub use addr::{size_of_raw, Protocol, SocketAddress};
pub use discovery::{discover_devices, lookup_name, DeviceDiscoverer, DiscoveredDevice, DiscoveryConfig, DiscoveryHandler};
pub use error::{Error, ErrorKind, Result};
pub use hci::{open_device, ConnectionInfo, DeviceInfo, DeviceListEntry, DeviceStats};
pub use options::{L2capOptions, SecurityLevel};
pub use raw::{Direction, KernelSocket, RawSocket};
pub use sdp::{find_service, KernelConnector};
pub use socket::{available_port, BluetoothSocket, SocketState, MAX_OPTION_LEN};
pub use timeout::{SocketConfig, Timeout};

pub use bluesock_core::{BluetoothDeviceAddress, Uuid};
