//! Advertising a listening socket with a recording SDP server

use bluesock_core::Uuid;
use bluesock_linux::{BluetoothSocket, Direction, ErrorKind, Protocol, RawSocket, SocketAddress, SocketConfig};
use bluesock_sdp::pdu::{self, PduHeader};
use bluesock_sdp::record::ServiceDescription;
use bluesock_sdp::{DataElement, SdpConnector, SdpError, SdpTransport, ServiceRecord, SessionTarget};
use nix::errno::Errno;
use std::collections::VecDeque;
use std::net::Shutdown;
use std::sync::{Arc, Mutex};

/// A backend that remembers the address it was bound to
#[derive(Clone, Default)]
struct Bound(Arc<Mutex<Vec<u8>>>);

impl RawSocket for Bound {
    fn open(_: Protocol) -> Result<Self, Errno> {
        Ok(Bound::default())
    }

    fn bind(&self, address: &[u8]) -> Result<(), Errno> {
        *self.0.lock().unwrap() = address.to_vec();
        Ok(())
    }

    fn listen(&self, _: i32) -> Result<(), Errno> {
        Ok(())
    }

    fn accept(&self) -> Result<(Self, Vec<u8>), Errno> {
        Err(Errno::EAGAIN)
    }

    fn connect(&self, _: &[u8]) -> Result<(), Errno> {
        Err(Errno::EOPNOTSUPP)
    }

    fn send(&self, _: &[u8], _: i32) -> Result<usize, Errno> {
        Err(Errno::ENOTCONN)
    }

    fn send_to(&self, _: &[u8], _: i32, _: &[u8]) -> Result<usize, Errno> {
        Err(Errno::ENOTCONN)
    }

    fn recv(&self, _: &mut [u8], _: i32) -> Result<usize, Errno> {
        Err(Errno::ENOTCONN)
    }

    fn recv_from(&self, _: &mut [u8], _: i32) -> Result<(usize, Vec<u8>), Errno> {
        Err(Errno::ENOTCONN)
    }

    fn wait(&self, _: Direction, _: i32) -> Result<bool, Errno> {
        Ok(true)
    }

    fn set_nonblocking(&self, _: bool) -> Result<(), Errno> {
        Ok(())
    }

    fn set_option(&self, _: i32, _: i32, _: &[u8]) -> Result<(), Errno> {
        Ok(())
    }

    fn option(&self, _: i32, _: i32, len: usize) -> Result<Vec<u8>, Errno> {
        Ok(vec![0; len])
    }

    fn local_addr(&self) -> Result<Vec<u8>, Errno> {
        Ok(self.0.lock().unwrap().clone())
    }

    fn peer_addr(&self) -> Result<Vec<u8>, Errno> {
        Err(Errno::ENOTCONN)
    }

    fn shutdown(&self, _: Shutdown) -> Result<(), Errno> {
        Ok(())
    }

    fn try_clone(&self) -> Result<Self, Errno> {
        Ok(self.clone())
    }
}

#[derive(Default)]
struct Server {
    registered: Vec<ServiceRecord>,
    removed: Vec<u32>,
}

struct Transport {
    server: Arc<Mutex<Server>>,
    responses: VecDeque<Vec<u8>>,
}

impl SdpTransport for Transport {
    fn send_pdu(&mut self, request: &[u8]) -> Result<(), SdpError> {
        let header = PduHeader::from_bytes(request)?;

        // the parameters of a register request start with a byte of flags
        let parameters = &request[PduHeader::SIZE..];

        let mut server = self.server.lock().unwrap();

        let (id, response) = match header.pdu_id {
            pdu::SERVICE_REGISTER_REQUEST => {
                let (element, _) = DataElement::decode(&parameters[1..])?;

                server.registered.push(ServiceRecord::from_element(&element)?);

                let handle = 0x0001_0000 + server.registered.len() as u32;

                (pdu::SERVICE_REGISTER_RESPONSE, handle.to_be_bytes().to_vec())
            }
            pdu::SERVICE_REMOVE_REQUEST => {
                let handle = u32::from_be_bytes([parameters[0], parameters[1], parameters[2], parameters[3]]);

                server.removed.push(handle);

                (pdu::SERVICE_REMOVE_RESPONSE, vec![0, 0])
            }
            other => panic!("unexpected request {:#04x}", other),
        };

        self.responses.push_back(pdu::encode(id, header.transaction_id, &response)?);

        Ok(())
    }

    fn recv_pdu(&mut self) -> Result<Vec<u8>, SdpError> {
        self.responses.pop_front().ok_or(SdpError::Timeout)
    }
}

struct LocalServer(Arc<Mutex<Server>>);

impl SdpConnector for LocalServer {
    fn open(&self, target: &SessionTarget) -> Result<Box<dyn SdpTransport>, SdpError> {
        assert_eq!(SessionTarget::Local, *target);

        Ok(Box::new(Transport {
            server: self.0.clone(),
            responses: VecDeque::new(),
        }))
    }
}

fn l2cap_socket() -> BluetoothSocket<Bound> {
    BluetoothSocket::from_backend(Bound::default(), Protocol::L2cap, SocketConfig::default()).unwrap()
}

#[test]
fn advertise_then_close() {
    let server = Arc::new(Mutex::new(Server::default()));
    let connector = LocalServer(server.clone());

    let mut socket = l2cap_socket();

    socket.bind(&SocketAddress::l2cap("00:00:00:00:00:00", 0x1003).unwrap()).unwrap();
    socket.listen(1).unwrap();

    socket
        .advertise_with(&connector, &ServiceDescription::new("svc").with_service_class("1101"))
        .unwrap();

    {
        let server = server.lock().unwrap();

        assert_eq!(1, server.registered.len());

        let record = &server.registered[0];

        assert_eq!(Some("svc"), record.name());

        assert_eq!(vec![Uuid::parse("1101").unwrap()], record.service_classes());

        assert_eq!((Some(bluesock_sdp::ServiceProtocol::L2cap), Some(0x1003)), record.protocol_port());

        assert!(server.removed.is_empty());
    }

    socket.close();

    assert_eq!(vec![0x0001_0001], server.lock().unwrap().removed);

    // the record is only removed once
    drop(socket);

    assert_eq!(1, server.lock().unwrap().removed.len());
}

#[test]
fn advertise_needs_listening_socket() {
    let server = Arc::new(Mutex::new(Server::default()));
    let connector = LocalServer(server.clone());

    let mut socket = l2cap_socket();

    socket.bind(&SocketAddress::l2cap("00:00:00:00:00:00", 0x1003).unwrap()).unwrap();

    let e = socket
        .advertise_with(&connector, &ServiceDescription::new("svc"))
        .unwrap_err();

    assert_eq!(ErrorKind::State, e.kind());

    assert!(server.lock().unwrap().registered.is_empty());
}

#[test]
fn advertise_twice() {
    let server = Arc::new(Mutex::new(Server::default()));
    let connector = LocalServer(server.clone());

    let description = ServiceDescription::new("svc").with_profile("1101", 0x0100);

    let mut socket = l2cap_socket();

    socket.bind(&SocketAddress::l2cap("00:00:00:00:00:00", 0x1005).unwrap()).unwrap();
    socket.listen(0).unwrap();

    socket.advertise_with(&connector, &description).unwrap();

    assert_eq!(
        ErrorKind::State,
        socket.advertise_with(&connector, &description).unwrap_err().kind()
    );

    socket.stop_advertising().unwrap();

    socket.advertise_with(&connector, &description).unwrap();

    let server = server.lock().unwrap();

    assert_eq!(2, server.registered.len());

    assert_eq!(vec![0x0001_0001], server.removed);
}
