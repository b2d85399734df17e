//! Advertising the service of a listening socket
//!
//! The service record is registered with the SDP server of the local host. The session the
//! record was registered through is kept by the socket until the record is unregistered, either
//! by [`stop_advertising`](BluetoothSocket::stop_advertising) or when the socket is closed.

use crate::addr::{Protocol, SocketAddress};
use crate::error::{Error, Result};
use crate::raw::RawSocket;
use crate::sdp::KernelConnector;
use crate::socket::{Advertisement, BluetoothSocket};
use bluesock_sdp::record::{BaseProtocol, ServiceDescription};
use bluesock_sdp::{DiscoverySession, SdpConnector, SessionTarget};

impl<S: RawSocket> BluetoothSocket<S> {
    /// Advertise the service of this socket with the local SDP server
    ///
    /// The socket must be a listening L2CAP or RFCOMM socket. The port of the service is the port
    /// the socket is bound to.
    pub fn advertise(&mut self, description: &ServiceDescription) -> Result<()> {
        self.advertise_with(&KernelConnector::default(), description)
    }

    /// Advertise through the SDP server reached by `connector`
    pub fn advertise_with<C>(&mut self, connector: &C, description: &ServiceDescription) -> Result<()>
    where
        C: SdpConnector + ?Sized,
    {
        if !self.is_listening() {
            return Err(Error::State("only a listening socket can be advertised"));
        }

        if !matches!(self.protocol(), Protocol::L2cap | Protocol::Rfcomm) {
            return Err(Error::Unsupported(format!(
                "{} sockets cannot be advertised",
                self.protocol()
            )));
        }

        if self.advertisement.is_some() {
            return Err(Error::State("the socket is already advertised"));
        }

        if description.name.is_empty() {
            return Err(Error::value("the service name is empty"));
        }

        description.validate()?;

        let base = match self.local_addr()? {
            SocketAddress::L2cap { psm, .. } => BaseProtocol::L2cap { psm },
            SocketAddress::Rfcomm { channel, .. } => BaseProtocol::Rfcomm { channel },
            other => return Err(Error::Protocol(format!("cannot advertise a socket bound to {}", other))),
        };

        let record = description.to_record(base)?;

        let mut session = DiscoverySession::new();

        session.connect(connector, SessionTarget::Local)?;

        let handle = match session.register(&record) {
            Ok(handle) => handle,
            Err(e) => {
                session.close();
                return Err(e.into());
            }
        };

        log::info!("advertising \"{}\" as service record {:#010x}", description.name, handle);

        self.advertisement = Some(Advertisement { handle, session });

        Ok(())
    }

    /// Stop advertising the service
    ///
    /// The record is forgotten even when unregistering it fails.
    pub fn stop_advertising(&mut self) -> Result<()> {
        let Advertisement { handle, mut session } = self
            .advertisement
            .take()
            .ok_or(Error::State("the socket is not advertised"))?;

        let result = session.unregister(handle);

        session.close();

        Ok(result?)
    }

    /// Get the handle of the advertised service record
    pub fn advertised_handle(&self) -> Option<u32> {
        self.advertisement.as_ref().map(|a| a.handle)
    }
}
