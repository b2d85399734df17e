//! Sessions with an SDP server
//!
//! A [`DiscoverySession`] performs the request/response exchanges with an SDP server. How the PDUs
//! get to the server is up to the [`SdpTransport`], and the transport for a target is opened by a
//! [`SdpConnector`].

use crate::pdu;
use crate::record::{ServiceInfo, ServiceRecord};
use crate::SdpError;
use bluesock_core::{BluetoothDeviceAddress, FormatError, Uuid};
use std::time::Duration;

/// The number of requests a continued response is followed for before giving up
const MAX_CONTINUATIONS: usize = 256;

/// A connection to an SDP server that sends and receives whole PDUs
pub trait SdpTransport: Send {
    fn send_pdu(&mut self, pdu: &[u8]) -> Result<(), SdpError>;

    fn recv_pdu(&mut self) -> Result<Vec<u8>, SdpError>;
}

/// Opens transports to SDP servers
pub trait SdpConnector {
    fn open(&self, target: &SessionTarget) -> Result<Box<dyn SdpTransport>, SdpError>;
}

/// The SDP server of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionTarget {
    /// The SDP server of this host
    Local,
    Remote(BluetoothDeviceAddress),
}

impl SessionTarget {
    /// Parse a target
    ///
    /// `"localhost"` is the local SDP server, anything else must be a device address.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        if text == "localhost" {
            Ok(SessionTarget::Local)
        } else {
            BluetoothDeviceAddress::parse(text).map(SessionTarget::Remote)
        }
    }
}

impl Default for SessionTarget {
    fn default() -> Self {
        SessionTarget::Local
    }
}

impl core::str::FromStr for SessionTarget {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl core::fmt::Display for SessionTarget {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            SessionTarget::Local => f.write_str("localhost"),
            SessionTarget::Remote(address) => core::fmt::Display::fmt(address, f),
        }
    }
}

/// Configuration of the transports of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SdpConfig {
    /// How long to wait for each response of the server
    pub response_timeout: Duration,
    /// How many times connecting to a remote server is retried while the device is busy
    pub busy_retries: u32,
}

impl Default for SdpConfig {
    fn default() -> Self {
        SdpConfig {
            response_timeout: Duration::from_secs(10),
            busy_retries: 10,
        }
    }
}

/// A session with an SDP server
///
/// A new session is not connected, every request fails with [`SdpError::NotConnected`] until
/// [`connect`](DiscoverySession::connect) is called.
#[derive(Default)]
pub struct DiscoverySession {
    transport: Option<Box<dyn SdpTransport>>,
    target: Option<SessionTarget>,
    transaction_id: u16,
}

impl DiscoverySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session that is connected through `transport`
    pub fn with_transport(target: SessionTarget, transport: Box<dyn SdpTransport>) -> Self {
        DiscoverySession {
            transport: Some(transport),
            target: Some(target),
            transaction_id: 0,
        }
    }

    /// Connect to the SDP server of `target`
    ///
    /// Any prior connection is closed first.
    pub fn connect<C>(&mut self, connector: &C, target: SessionTarget) -> Result<(), SdpError>
    where
        C: SdpConnector + ?Sized,
    {
        self.close();

        log::debug!("connecting to the SDP server of {}", target);

        self.transport = Some(connector.open(&target)?);
        self.target = Some(target);

        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Get the target of the connection
    pub fn target(&self) -> Option<SessionTarget> {
        self.target
    }

    /// Search for the services with `uuid` within their records
    pub fn search(&mut self, uuid: &Uuid) -> Result<Vec<ServiceInfo>, SdpError> {
        let host = match self.target {
            Some(SessionTarget::Remote(address)) => Some(address),
            _ => None,
        };

        Ok(self
            .search_records(&[*uuid])?
            .iter()
            .map(|record| ServiceInfo {
                host,
                ..ServiceInfo::from(record)
            })
            .collect())
    }

    /// Get the services within the public browse group
    pub fn browse(&mut self) -> Result<Vec<ServiceInfo>, SdpError> {
        self.search(&Uuid::PUBLIC_BROWSE_GROUP)
    }

    /// Get the complete records of every service matching all of `uuids`
    ///
    /// Records are in the order returned by the server.
    pub fn search_records(&mut self, uuids: &[Uuid]) -> Result<Vec<ServiceRecord>, SdpError> {
        let mut attribute_lists = Vec::new();
        let mut continuation = Vec::new();

        for _ in 0..MAX_CONTINUATIONS {
            let request = pdu::service_search_attribute_request(uuids, &continuation)?;

            let response = self.exchange(
                pdu::SERVICE_SEARCH_ATTRIBUTE_REQUEST,
                &request,
                pdu::SERVICE_SEARCH_ATTRIBUTE_RESPONSE,
            )?;

            let part = pdu::service_search_attribute_response(&response)?;

            attribute_lists.extend_from_slice(part.attribute_lists);

            if part.continuation.is_empty() {
                return pdu::parse_attribute_lists(&attribute_lists);
            }

            log::trace!("response continues with state {:x?}", part.continuation);

            continuation = part.continuation.to_vec();
        }

        Err(SdpError::MalformedPdu("endless continuation"))
    }

    /// Register a record with the local SDP server
    ///
    /// The returned handle is used to unregister the record.
    pub fn register(&mut self, record: &ServiceRecord) -> Result<u32, SdpError> {
        let response = self.exchange(
            pdu::SERVICE_REGISTER_REQUEST,
            &pdu::register_request(record),
            pdu::SERVICE_REGISTER_RESPONSE,
        )?;

        let handle = pdu::register_response(&response)?;

        log::debug!("registered service record {:#010x}", handle);

        Ok(handle)
    }

    pub fn unregister(&mut self, handle: u32) -> Result<(), SdpError> {
        let response = self.exchange(
            pdu::SERVICE_REMOVE_REQUEST,
            &pdu::remove_request(handle),
            pdu::SERVICE_REMOVE_RESPONSE,
        )?;

        pdu::remove_response(&response)?;

        log::debug!("unregistered service record {:#010x}", handle);

        Ok(())
    }

    /// Close the connection to the server
    ///
    /// Closing a session that is not connected does nothing.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            log::debug!("closed SDP session");
        }

        self.target = None;
    }

    fn exchange(&mut self, request_id: u8, parameters: &[u8], response_id: u8) -> Result<Vec<u8>, SdpError> {
        self.transaction_id = self.transaction_id.wrapping_add(1);

        let transaction_id = self.transaction_id;

        let transport = self.transport.as_mut().ok_or(SdpError::NotConnected)?;

        transport.send_pdu(&pdu::encode(request_id, transaction_id, parameters)?)?;

        let response = transport.recv_pdu()?;

        pdu::decode_response(&response, response_id, transaction_id).map(<[u8]>::to_vec)
    }
}

impl core::fmt::Debug for DiscoverySession {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("DiscoverySession")
            .field("connected", &self.is_connected())
            .field("target", &self.target)
            .field("transaction_id", &self.transaction_id)
            .finish()
    }
}
