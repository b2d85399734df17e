//! Service Discovery Protocol
//!
//! This crate builds, registers, and queries service records. A service record is a set of
//! attributes where every attribute value is a tree of [`DataElement`]s. Records are sent to and
//! received from an SDP server through a [`DiscoverySession`], which is independent of how the
//! bytes reach the server (see [`SdpTransport`]).

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod attribute;
pub mod data_element;
pub mod pdu;
pub mod record;
pub mod session;

pub use data_element::DataElement;
pub use record::{ProtocolDescriptor, ServiceDescription, ServiceInfo, ServiceProtocol, ServiceRecord};
pub use session::{DiscoverySession, SdpConfig, SdpConnector, SdpTransport, SessionTarget};

use bluesock_core::FormatError;

/// The L2CAP PSM of the SDP server
pub const SDP_PSM: u16 = 0x0001;

/// The path of the Unix socket of the local BlueZ SDP server
pub const SDP_UNIX_PATH: &str = "/var/run/sdp";

/// Error codes of an SDP error response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidVersion,
    InvalidRecordHandle,
    InvalidSyntax,
    InvalidPduSize,
    InvalidContinuationState,
    InsufficientResources,
    Other(u16),
}

impl From<u16> for ErrorCode {
    fn from(raw: u16) -> Self {
        match raw {
            0x0001 => ErrorCode::InvalidVersion,
            0x0002 => ErrorCode::InvalidRecordHandle,
            0x0003 => ErrorCode::InvalidSyntax,
            0x0004 => ErrorCode::InvalidPduSize,
            0x0005 => ErrorCode::InvalidContinuationState,
            0x0006 => ErrorCode::InsufficientResources,
            other => ErrorCode::Other(other),
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> u16 {
        match code {
            ErrorCode::InvalidVersion => 0x0001,
            ErrorCode::InvalidRecordHandle => 0x0002,
            ErrorCode::InvalidSyntax => 0x0003,
            ErrorCode::InvalidPduSize => 0x0004,
            ErrorCode::InvalidContinuationState => 0x0005,
            ErrorCode::InsufficientResources => 0x0006,
            ErrorCode::Other(other) => other,
        }
    }
}

impl core::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            ErrorCode::InvalidVersion => f.write_str("invalid or unsupported SDP version"),
            ErrorCode::InvalidRecordHandle => f.write_str("invalid service record handle"),
            ErrorCode::InvalidSyntax => f.write_str("invalid request syntax"),
            ErrorCode::InvalidPduSize => f.write_str("invalid PDU size"),
            ErrorCode::InvalidContinuationState => f.write_str("invalid continuation state"),
            ErrorCode::InsufficientResources => f.write_str("insufficient resources to satisfy request"),
            ErrorCode::Other(code) => write!(f, "unknown error {:#06x}", code),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SdpError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("malformed data element: {0}")]
    MalformedElement(&'static str),
    #[error("malformed {0} PDU")]
    MalformedPdu(&'static str),
    #[error("unexpected response PDU {0:#04x}")]
    UnexpectedPdu(u8),
    #[error("response transaction id {found} does not match request {expected}")]
    TransactionMismatch { expected: u16, found: u16 },
    #[error("SDP server error: {0}")]
    ErrorResponse(ErrorCode),
    #[error("the discovery session is not connected")]
    NotConnected,
    #[error("timed out waiting for the SDP server")]
    Timeout,
    #[error(transparent)]
    Transport(#[from] std::io::Error),
}
