//! Host Controller Interface commands and filters
//!
//! This is the part of HCI that does not need the kernel. Opcodes, the socket filter, command
//! framing, and event parsing are all done on plain byte buffers here so that the Linux crate only
//! needs to move those buffers to and from a HCI socket.

pub mod command;
pub mod event;
pub mod filter;
pub mod inquiry;
pub mod opcodes;

pub use command::{Match, Request, ResponseMatcher};
pub use filter::{FilterSizeError, HciFilter};
pub use opcodes::{pack_opcode, unpack_ocf, unpack_ogf, OpCodePair};

/// The indicator that prefixes each packet read from or written to a HCI socket
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketType {
    Command,
    Acl,
    Sco,
    Event,
    Iso,
    Vendor,
}

impl PacketType {
    pub const fn val(self) -> u8 {
        match self {
            PacketType::Command => HCI_COMMAND_PKT,
            PacketType::Acl => HCI_ACLDATA_PKT,
            PacketType::Sco => HCI_SCODATA_PKT,
            PacketType::Event => HCI_EVENT_PKT,
            PacketType::Iso => HCI_ISODATA_PKT,
            PacketType::Vendor => HCI_VENDOR_PKT,
        }
    }
}

impl TryFrom<u8> for PacketType {
    type Error = HciError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            HCI_COMMAND_PKT => Ok(PacketType::Command),
            HCI_ACLDATA_PKT => Ok(PacketType::Acl),
            HCI_SCODATA_PKT => Ok(PacketType::Sco),
            HCI_EVENT_PKT => Ok(PacketType::Event),
            HCI_ISODATA_PKT => Ok(PacketType::Iso),
            HCI_VENDOR_PKT => Ok(PacketType::Vendor),
            _ => Err(HciError::UnknownPacketType(raw)),
        }
    }
}

pub const HCI_COMMAND_PKT: u8 = 0x01;
pub const HCI_ACLDATA_PKT: u8 = 0x02;
pub const HCI_SCODATA_PKT: u8 = 0x03;
pub const HCI_EVENT_PKT: u8 = 0x04;
pub const HCI_ISODATA_PKT: u8 = 0x05;
pub const HCI_VENDOR_PKT: u8 = 0xFF;

/// Errors from building or interpreting HCI packets
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HciError {
    #[error("command parameters are {0} bytes, the maximum is 255")]
    ParametersTooLong(usize),
    #[error("unknown packet indicator {0:#x}")]
    UnknownPacketType(u8),
    #[error("packet is not an event packet")]
    NotAnEvent,
    #[error("{0} event is too short")]
    MalformedEvent(&'static str),
    #[error("controller returned status {0:#04x}")]
    Status(u8),
}
