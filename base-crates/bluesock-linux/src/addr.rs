//! Socket addresses
//!
//! Each Bluetooth protocol has its own `sockaddr` structure. A [`SocketAddress`] is encoded into
//! the bytes of the structure for its protocol, and the bytes returned by the kernel are decoded
//! according to the protocol of the socket they came from. Multi-byte fields of the protocol
//! (the PSM and CID) are little-endian, the family and HCI fields are in host order.

use crate::consts::{BTPROTO_HCI, BTPROTO_L2CAP, BTPROTO_RFCOMM, BTPROTO_SCO, HCI_CHANNEL_RAW};
use crate::error::{Error, Result};
use bluesock_core::BluetoothDeviceAddress;

/// `sizeof(struct sockaddr_hci)`
pub const SOCKADDR_HCI_SIZE: usize = 6;
/// `sizeof(struct sockaddr_l2)`
pub const SOCKADDR_L2_SIZE: usize = 14;
/// `sizeof(struct sockaddr_rc)`
pub const SOCKADDR_RC_SIZE: usize = 10;
/// `sizeof(struct sockaddr_sco)`
pub const SOCKADDR_SCO_SIZE: usize = 8;

/// The Bluetooth socket protocols
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Protocol {
    /// Raw access to a controller
    Hci,
    /// Connection oriented sequenced packets
    L2cap,
    /// Stream sockets emulating a serial port
    Rfcomm,
    /// Audio links
    Sco,
}

impl Protocol {
    /// Get the protocol number given to `socket`
    pub const fn number(self) -> i32 {
        match self {
            Protocol::Hci => BTPROTO_HCI,
            Protocol::L2cap => BTPROTO_L2CAP,
            Protocol::Rfcomm => BTPROTO_RFCOMM,
            Protocol::Sco => BTPROTO_SCO,
        }
    }

    /// Get the socket type used with the protocol
    pub fn socket_type(self) -> nix::libc::c_int {
        match self {
            Protocol::Hci => nix::libc::SOCK_RAW,
            Protocol::L2cap | Protocol::Sco => nix::libc::SOCK_SEQPACKET,
            Protocol::Rfcomm => nix::libc::SOCK_STREAM,
        }
    }

    /// Get the size of the socket address structure of the protocol
    pub const fn address_size(self) -> usize {
        match self {
            Protocol::Hci => SOCKADDR_HCI_SIZE,
            Protocol::L2cap => SOCKADDR_L2_SIZE,
            Protocol::Rfcomm => SOCKADDR_RC_SIZE,
            Protocol::Sco => SOCKADDR_SCO_SIZE,
        }
    }
}

impl TryFrom<i32> for Protocol {
    type Error = Error;

    fn try_from(number: i32) -> Result<Self> {
        match number {
            BTPROTO_HCI => Ok(Protocol::Hci),
            BTPROTO_L2CAP => Ok(Protocol::L2cap),
            BTPROTO_RFCOMM => Ok(Protocol::Rfcomm),
            BTPROTO_SCO => Ok(Protocol::Sco),
            _ => Err(Error::UnknownProtocol(number)),
        }
    }
}

impl core::fmt::Display for Protocol {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Protocol::Hci => f.write_str("HCI"),
            Protocol::L2cap => f.write_str("L2CAP"),
            Protocol::Rfcomm => f.write_str("RFCOMM"),
            Protocol::Sco => f.write_str("SCO"),
        }
    }
}

/// Get the size of the socket address structure for a protocol number
pub fn size_of_raw(protocol: i32) -> Result<usize> {
    Protocol::try_from(protocol).map(Protocol::address_size)
}

/// The address of a Bluetooth socket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SocketAddress {
    Hci { device: u16, channel: u16 },
    L2cap { address: BluetoothDeviceAddress, psm: u16 },
    Rfcomm { address: BluetoothDeviceAddress, channel: u8 },
    Sco { address: BluetoothDeviceAddress },
}

impl SocketAddress {
    /// Create the address of a raw channel to a controller
    pub fn hci(device: u16) -> Self {
        SocketAddress::Hci {
            device,
            channel: HCI_CHANNEL_RAW,
        }
    }

    /// Create a L2CAP address from the text form of the device address
    pub fn l2cap(address: &str, psm: u16) -> Result<Self> {
        Ok(SocketAddress::L2cap {
            address: address.parse()?,
            psm,
        })
    }

    pub fn rfcomm(address: &str, channel: u8) -> Result<Self> {
        Ok(SocketAddress::Rfcomm {
            address: address.parse()?,
            channel,
        })
    }

    pub fn sco(address: &str) -> Result<Self> {
        Ok(SocketAddress::Sco {
            address: address.parse()?,
        })
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            SocketAddress::Hci { .. } => Protocol::Hci,
            SocketAddress::L2cap { .. } => Protocol::L2cap,
            SocketAddress::Rfcomm { .. } => Protocol::Rfcomm,
            SocketAddress::Sco { .. } => Protocol::Sco,
        }
    }

    /// Get the device address, HCI addresses do not have one
    pub fn device_address(&self) -> Option<BluetoothDeviceAddress> {
        match *self {
            SocketAddress::Hci { .. } => None,
            SocketAddress::L2cap { address, .. }
            | SocketAddress::Rfcomm { address, .. }
            | SocketAddress::Sco { address } => Some(address),
        }
    }

    /// Get the PSM or channel
    pub fn port(&self) -> Option<u16> {
        match *self {
            SocketAddress::L2cap { psm, .. } => Some(psm),
            SocketAddress::Rfcomm { channel, .. } => Some(channel.into()),
            _ => None,
        }
    }

    /// Encode into the `sockaddr` structure of the protocol
    ///
    /// The PSM of a L2CAP address must be odd, so zero is rejected as well. A socket bound to PSM
    /// zero gets a free port through [`BluetoothSocket::bind`](crate::BluetoothSocket::bind).
    pub fn encode(&self) -> Result<Vec<u8>> {
        let family = (nix::libc::AF_BLUETOOTH as u16).to_ne_bytes();

        let mut bytes = Vec::with_capacity(self.protocol().address_size());

        bytes.extend_from_slice(&family);

        match *self {
            SocketAddress::Hci { device, channel } => {
                bytes.extend_from_slice(&device.to_ne_bytes());
                bytes.extend_from_slice(&channel.to_ne_bytes());
            }
            SocketAddress::L2cap { address, psm } => {
                if psm & 1 == 0 {
                    return Err(Error::value(format!("invalid PSM {:#06x}, a PSM must be odd", psm)));
                }

                bytes.extend_from_slice(&psm.to_le_bytes());
                bytes.extend_from_slice(address.as_bytes());
                // cid, address type, and padding
                bytes.extend_from_slice(&[0; 4]);
            }
            SocketAddress::Rfcomm { address, channel } => {
                bytes.extend_from_slice(address.as_bytes());
                bytes.push(channel);
                bytes.push(0);
            }
            SocketAddress::Sco { address } => bytes.extend_from_slice(address.as_bytes()),
        }

        Ok(bytes)
    }

    /// Decode the `sockaddr` structure of `protocol`
    ///
    /// An empty buffer is no address (which is returned by the kernel for things like a
    /// `recvfrom` on a connected socket).
    pub fn decode(protocol: Protocol, bytes: &[u8]) -> Result<Option<Self>> {
        if bytes.is_empty() {
            return Ok(None);
        }

        let short = || Error::Protocol(format!("{} byte socket address is too short for {}", bytes.len(), protocol));

        // the family is not checked, it is only ever AF_BLUETOOTH
        let body = bytes.get(2..protocol.address_size()).ok_or_else(short)?;

        let address = || BluetoothDeviceAddress::try_from_slice(body).ok_or_else(short);

        let decoded = match protocol {
            Protocol::Hci => SocketAddress::Hci {
                device: u16::from_ne_bytes([body[0], body[1]]),
                channel: u16::from_ne_bytes([body[2], body[3]]),
            },
            Protocol::L2cap => SocketAddress::L2cap {
                address: BluetoothDeviceAddress::try_from_slice(&body[2..]).ok_or_else(short)?,
                psm: u16::from_le_bytes([body[0], body[1]]),
            },
            Protocol::Rfcomm => SocketAddress::Rfcomm {
                address: address()?,
                channel: body[6],
            },
            Protocol::Sco => SocketAddress::Sco { address: address()? },
        };

        Ok(Some(decoded))
    }
}

impl core::fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            SocketAddress::Hci { device, channel } => write!(f, "hci{} (channel {})", device, channel),
            SocketAddress::L2cap { address, psm } => write!(f, "{} psm {:#06x}", address, psm),
            SocketAddress::Rfcomm { address, channel } => write!(f, "{} channel {}", address, channel),
            SocketAddress::Sco { address } => core::fmt::Display::fmt(address, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn round_trip(address: SocketAddress) {
        let bytes = address.encode().unwrap();

        assert_eq!(address.protocol().address_size(), bytes.len());

        assert_eq!(Some(address), SocketAddress::decode(address.protocol(), &bytes).unwrap());
    }

    #[test]
    fn l2cap_test() {
        let address = SocketAddress::l2cap("01:23:45:67:89:AB", 0x1001).unwrap();

        let bytes = address.encode().unwrap();

        assert_eq!([0x01, 0x10, 0xAB, 0x89, 0x67, 0x45, 0x23, 0x01], bytes[2..10]);

        round_trip(address);

        assert_eq!(
            ErrorKindOf::Value,
            ErrorKindOf::of(SocketAddress::l2cap("01:23:45:67:89:AB", 0x1000).unwrap().encode())
        );

        assert_eq!(
            ErrorKindOf::Value,
            ErrorKindOf::of(SocketAddress::l2cap("00:00:00:00:00:00", 0).unwrap().encode())
        );
    }

    #[test]
    fn local_address_test() {
        let bytes = SocketAddress::Rfcomm {
            address: BluetoothDeviceAddress::LOCAL,
            channel: 1,
        }
        .encode()
        .unwrap();

        // BDADDR_LOCAL of BlueZ
        assert_eq!([0, 0, 0, 0xFF, 0xFF, 0xFF], bytes[2..8]);

        let sco = SocketAddress::sco("FF:FF:FF:00:00:00").unwrap().encode().unwrap();

        assert_eq!([0, 0, 0, 0xFF, 0xFF, 0xFF], sco[2..8]);
    }

    #[test]
    fn other_protocols_test() {
        round_trip(SocketAddress::hci(1));

        round_trip(SocketAddress::Hci { device: 0, channel: 1 });

        round_trip(SocketAddress::rfcomm("01:23:45:67:89:AB", 30).unwrap());

        round_trip(SocketAddress::sco("01:23:45:67:89:AB").unwrap());

        assert!(SocketAddress::rfcomm("01:23:45:67:89", 1).is_err());
    }

    #[test]
    fn decode_test() {
        assert_eq!(None, SocketAddress::decode(Protocol::L2cap, &[]).unwrap());

        assert!(SocketAddress::decode(Protocol::Rfcomm, &[0x1F, 0x00, 1, 2, 3]).is_err());

        let rc = SocketAddress::rfcomm("01:23:45:67:89:AB", 3).unwrap().encode().unwrap();

        // an RFCOMM address does not have enough bytes for L2CAP
        assert!(SocketAddress::decode(Protocol::L2cap, &rc).is_err());
    }

    #[test]
    fn protocol_test() {
        assert_eq!(Protocol::L2cap, Protocol::try_from(0).unwrap());

        assert_eq!(Protocol::Hci, Protocol::try_from(1).unwrap());

        assert_eq!(Protocol::Sco, Protocol::try_from(2).unwrap());

        assert_eq!(Protocol::Rfcomm, Protocol::try_from(3).unwrap());

        assert!(matches!(Protocol::try_from(4), Err(Error::UnknownProtocol(4))));

        assert_eq!(14, size_of_raw(0).unwrap());

        assert_eq!(6, size_of_raw(1).unwrap());

        assert_eq!(8, size_of_raw(2).unwrap());

        assert_eq!(10, size_of_raw(3).unwrap());

        assert!(size_of_raw(-1).is_err());
    }

    #[quickcheck]
    fn l2cap_round_trip(bytes: (u8, u8, u8, u8, u8, u8), psm: u16) -> bool {
        let address = SocketAddress::L2cap {
            address: BluetoothDeviceAddress::from_bytes([bytes.0, bytes.1, bytes.2, bytes.3, bytes.4, bytes.5]),
            psm: psm | 1,
        };

        let encoded = address.encode().unwrap();

        SocketAddress::decode(Protocol::L2cap, &encoded).unwrap() == Some(address)
    }

    #[derive(Debug, PartialEq)]
    enum ErrorKindOf {
        Value,
        Other,
        Ok,
    }

    impl ErrorKindOf {
        fn of<T>(result: Result<T>) -> Self {
            match result {
                Ok(_) => ErrorKindOf::Ok,
                Err(e) if e.kind() == crate::ErrorKind::Value => ErrorKindOf::Value,
                Err(_) => ErrorKindOf::Other,
            }
        }
    }
}
