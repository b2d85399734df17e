//! Core types shared by the bluesock crates
//!
//! This contains the text codecs for Bluetooth device addresses and service UUIDs along with the
//! byte order helpers. Everything here is pure data manipulation, nothing within this crate
//! touches the operating system.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod address;
mod errors;
pub mod uuid;

pub use address::BluetoothDeviceAddress;
pub use errors::FormatError;
pub use uuid::{is_valid_uuid, Uuid};

/// Convert a host ordered `u16` into Bluetooth (little endian) byte order
pub fn htobs(v: u16) -> u16 {
    v.to_le()
}

/// Convert a Bluetooth (little endian) ordered `u16` into host byte order
pub fn btohs(v: u16) -> u16 {
    u16::from_le(v)
}

/// Convert a host ordered `u32` into Bluetooth (little endian) byte order
pub fn htobl(v: u32) -> u32 {
    v.to_le()
}

/// Convert a Bluetooth (little endian) ordered `u32` into host byte order
pub fn btohl(v: u32) -> u32 {
    u32::from_le(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_order_test() {
        assert_eq!(0x1234u16.to_le_bytes(), htobs(0x1234).to_ne_bytes());

        assert_eq!(0x1234, btohs(htobs(0x1234)));

        assert_eq!(0x1234_5678u32.to_le_bytes(), htobl(0x1234_5678).to_ne_bytes());

        assert_eq!(0x1234_5678, btohl(htobl(0x1234_5678)));
    }
}
