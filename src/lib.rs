//! Bluetooth sockets and service discovery
//!
//! bluesock is split into crates by how close they are to the operating system. The address and
//! UUID codecs are re-exported at the root, the HCI command and event formats are in [`hci`],
//! and the SDP records and sessions are in [`sdp`]. None of those touch the kernel. The sockets,
//! the controller ioctls, and device discovery of Linux are in [`linux`].

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub use bluesock_core::{btohl, btohs, htobl, htobs, is_valid_uuid, uuid, BluetoothDeviceAddress, FormatError, Uuid};

#[cfg(feature = "hci")]
pub mod hci {
    pub use bluesock_hci::*;
}

#[cfg(feature = "sdp")]
pub mod sdp {
    pub use bluesock_sdp::*;
}

#[cfg(all(feature = "linux", target_os = "linux"))]
pub mod linux {
    pub use bluesock_linux::*;
}
