//! Socket behavior over a backend that only takes a few bytes at a time

use bluesock_linux::{
    BluetoothSocket, Direction, Error, ErrorKind, Protocol, RawSocket, SocketAddress, SocketConfig, SocketState,
    Timeout,
};
use nix::errno::Errno;
use std::collections::VecDeque;
use std::net::Shutdown;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Bytes taken by each send
const CHUNK: usize = 3;

#[derive(Default)]
struct Link {
    written: Vec<u8>,
    send_calls: usize,
    /// The number of polls for writing that report the socket as ready, `None` is unlimited
    writable_polls: Option<usize>,
    /// Sends take nothing once this many bytes were written
    capacity: Option<usize>,
    incoming: VecDeque<Vec<u8>>,
    local: Vec<u8>,
    peer: Vec<u8>,
    connect_results: VecDeque<Result<(), Errno>>,
}

#[derive(Clone, Default)]
struct Trickle(Arc<Mutex<Link>>);

impl Trickle {
    fn link(&self) -> std::sync::MutexGuard<'_, Link> {
        self.0.lock().unwrap()
    }
}

impl RawSocket for Trickle {
    fn open(_: Protocol) -> Result<Self, Errno> {
        Ok(Trickle::default())
    }

    fn bind(&self, address: &[u8]) -> Result<(), Errno> {
        self.link().local = address.to_vec();
        Ok(())
    }

    fn listen(&self, _: i32) -> Result<(), Errno> {
        Ok(())
    }

    fn accept(&self) -> Result<(Self, Vec<u8>), Errno> {
        Ok((Trickle::default(), self.link().peer.clone()))
    }

    fn connect(&self, address: &[u8]) -> Result<(), Errno> {
        let mut link = self.link();

        link.peer = address.to_vec();

        link.connect_results.pop_front().unwrap_or(Ok(()))
    }

    fn send(&self, data: &[u8], _: i32) -> Result<usize, Errno> {
        let mut link = self.link();

        let room = link.capacity.map_or(usize::MAX, |capacity| capacity - link.written.len());

        let len = data.len().min(CHUNK).min(room);

        link.send_calls += 1;
        link.written.extend_from_slice(&data[..len]);

        Ok(len)
    }

    fn send_to(&self, data: &[u8], flags: i32, _: &[u8]) -> Result<usize, Errno> {
        self.send(data, flags)
    }

    fn recv(&self, buffer: &mut [u8], _: i32) -> Result<usize, Errno> {
        let packet = self.link().incoming.pop_front().ok_or(Errno::EAGAIN)?;

        let len = packet.len().min(buffer.len());

        buffer[..len].copy_from_slice(&packet[..len]);

        Ok(len)
    }

    fn recv_from(&self, buffer: &mut [u8], flags: i32) -> Result<(usize, Vec<u8>), Errno> {
        let len = self.recv(buffer, flags)?;

        Ok((len, self.link().peer.clone()))
    }

    fn wait(&self, direction: Direction, _: i32) -> Result<bool, Errno> {
        let mut link = self.link();

        match direction {
            Direction::Read => Ok(!link.incoming.is_empty()),
            Direction::Write => match link.writable_polls.as_mut() {
                None => Ok(true),
                Some(0) => Ok(false),
                Some(polls) => {
                    *polls -= 1;
                    Ok(true)
                }
            },
        }
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
        Ok(self.link().local.clone())
    }

    fn peer_addr(&self) -> Result<Vec<u8>, Errno> {
        Ok(self.link().peer.clone())
    }

    fn shutdown(&self, _: Shutdown) -> Result<(), Errno> {
        Ok(())
    }

    fn try_clone(&self) -> Result<Self, Errno> {
        Ok(self.clone())
    }
}

fn rfcomm(backend: &Trickle, timeout: Timeout) -> BluetoothSocket<Trickle> {
    BluetoothSocket::from_backend(backend.clone(), Protocol::Rfcomm, SocketConfig::with_default_timeout(timeout))
        .unwrap()
}

#[test]
fn sendall_repeats_sends() {
    let backend = Trickle::default();

    let socket = rfcomm(&backend, Timeout::Blocking);

    socket.sendall(b"0123456789").unwrap();

    let link = backend.link();

    assert_eq!(4, link.send_calls);

    assert_eq!(b"0123456789".to_vec(), link.written);
}

#[test]
fn sendall_reports_bytes_sent() {
    let backend = Trickle::default();

    backend.link().writable_polls = Some(2);

    let socket = rfcomm(&backend, Timeout::After(Duration::from_millis(50)));

    let e = socket.sendall(b"0123456789").unwrap_err();

    assert!(matches!(e, Error::Incomplete { sent: 6, .. }));

    assert_eq!(ErrorKind::Timeout, e.kind());

    // nothing is sent after the timeout
    assert_eq!(2, backend.link().send_calls);
}

#[test]
fn sendall_stops_when_nothing_is_taken() {
    let backend = Trickle::default();

    backend.link().capacity = Some(6);

    let socket = rfcomm(&backend, Timeout::Blocking);

    let e = socket.sendall(b"0123456789").unwrap_err();

    assert!(matches!(e, Error::Incomplete { sent: 6, .. }));

    assert_eq!(Some(Errno::EPIPE), e.errno());

    assert_eq!(ErrorKind::Os, e.kind());

    assert_eq!(3, backend.link().send_calls);
}

#[test]
fn connect_in_progress() {
    let backend = Trickle::default();

    backend
        .link()
        .connect_results
        .extend([Err(Errno::EINPROGRESS), Err(Errno::EISCONN)]);

    let mut socket = rfcomm(&backend, Timeout::After(Duration::from_secs(1)));

    let address = SocketAddress::rfcomm("01:23:45:67:89:AB", 4).unwrap();

    socket.connect(&address).unwrap();

    assert_eq!(SocketState::Connected, socket.state());

    assert_eq!(address, socket.peer_addr().unwrap());

    // without a timeout the error of the kernel is returned as is
    let backend = Trickle::default();

    backend.link().connect_results.push_back(Err(Errno::EINPROGRESS));

    let mut socket = rfcomm(&backend, Timeout::NonBlocking);

    assert_eq!(Errno::EINPROGRESS as i32, socket.connect_nonblocking(&address).unwrap());

    assert_eq!(SocketState::Open, socket.state());
}

#[test]
fn receive_with_timeout() {
    let backend = Trickle::default();

    let socket = rfcomm(&backend, Timeout::After(Duration::from_millis(10)));

    let mut buffer = [0u8; 16];

    assert_eq!(ErrorKind::Timeout, socket.recv(&mut buffer).unwrap_err().kind());

    backend.link().incoming.push_back(b"hello".to_vec());

    assert_eq!(5, socket.recv(&mut buffer).unwrap());

    assert_eq!(b"hello", &buffer[..5]);
}

#[test]
fn closed_socket() {
    let backend = Trickle::default();

    let mut socket = rfcomm(&backend, Timeout::Blocking);

    socket.close();

    assert_eq!(SocketState::Closed, socket.state());

    assert_eq!(ErrorKind::State, socket.send(b"data").unwrap_err().kind());

    // closing again does nothing
    socket.close();
}
