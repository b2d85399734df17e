//! An in memory socket backend for unit tests

use crate::addr::Protocol;
use crate::raw::{Direction, RawSocket};
use nix::errno::Errno;
use std::collections::{HashMap, VecDeque};
use std::net::Shutdown;
use std::sync::{Arc, Mutex, MutexGuard};

pub struct MockState {
    pub sent: Vec<Vec<u8>>,
    pub incoming: VecDeque<Vec<u8>>,
    pub options: HashMap<(i32, i32), Vec<u8>>,
    /// Options that fail with `ENOPROTOOPT` when set
    pub rejected_options: Vec<(i32, i32)>,
    pub local: Vec<u8>,
    pub peer: Vec<u8>,
    pub backlog: Option<i32>,
    pub nonblocking: bool,
    pub writable: bool,
    /// Results of connect, an empty queue connects
    pub connect_results: VecDeque<Result<(), Errno>>,
}

impl Default for MockState {
    fn default() -> Self {
        MockState {
            sent: Vec::new(),
            incoming: VecDeque::new(),
            options: HashMap::new(),
            rejected_options: Vec::new(),
            local: Vec::new(),
            peer: Vec::new(),
            backlog: None,
            nonblocking: false,
            writable: true,
            connect_results: VecDeque::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct MockSocket(Arc<Mutex<MockState>>);

impl MockSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.0.lock().unwrap()
    }
}

impl RawSocket for MockSocket {
    fn open(_: Protocol) -> Result<Self, Errno> {
        Ok(MockSocket::new())
    }

    fn bind(&self, address: &[u8]) -> Result<(), Errno> {
        self.state().local = address.to_vec();
        Ok(())
    }

    fn listen(&self, backlog: i32) -> Result<(), Errno> {
        self.state().backlog = Some(backlog);
        Ok(())
    }

    fn accept(&self) -> Result<(Self, Vec<u8>), Errno> {
        let peer = self.state().peer.clone();

        Ok((MockSocket::new(), peer))
    }

    fn connect(&self, address: &[u8]) -> Result<(), Errno> {
        let mut state = self.state();

        state.peer = address.to_vec();

        state.connect_results.pop_front().unwrap_or(Ok(()))
    }

    fn send(&self, data: &[u8], _: i32) -> Result<usize, Errno> {
        self.state().sent.push(data.to_vec());
        Ok(data.len())
    }

    fn send_to(&self, data: &[u8], flags: i32, _: &[u8]) -> Result<usize, Errno> {
        self.send(data, flags)
    }

    fn recv(&self, buffer: &mut [u8], _: i32) -> Result<usize, Errno> {
        let packet = self.state().incoming.pop_front().ok_or(Errno::EAGAIN)?;

        let len = packet.len().min(buffer.len());

        buffer[..len].copy_from_slice(&packet[..len]);

        Ok(len)
    }

    fn recv_from(&self, buffer: &mut [u8], flags: i32) -> Result<(usize, Vec<u8>), Errno> {
        let len = self.recv(buffer, flags)?;

        Ok((len, self.state().peer.clone()))
    }

    fn wait(&self, direction: Direction, _: i32) -> Result<bool, Errno> {
        let state = self.state();

        match direction {
            Direction::Read => Ok(!state.incoming.is_empty()),
            Direction::Write => Ok(state.writable),
        }
    }

    fn set_nonblocking(&self, nonblocking: bool) -> Result<(), Errno> {
        self.state().nonblocking = nonblocking;
        Ok(())
    }

    fn set_option(&self, level: i32, name: i32, value: &[u8]) -> Result<(), Errno> {
        let mut state = self.state();

        if state.rejected_options.contains(&(level, name)) {
            return Err(Errno::ENOPROTOOPT);
        }

        state.options.insert((level, name), value.to_vec());

        Ok(())
    }

    fn option(&self, level: i32, name: i32, len: usize) -> Result<Vec<u8>, Errno> {
        let mut value = self
            .state()
            .options
            .get(&(level, name))
            .cloned()
            .unwrap_or_else(|| vec![0; len]);

        value.truncate(len);

        Ok(value)
    }

    fn local_addr(&self) -> Result<Vec<u8>, Errno> {
        Ok(self.state().local.clone())
    }

    fn peer_addr(&self) -> Result<Vec<u8>, Errno> {
        Ok(self.state().peer.clone())
    }

    fn shutdown(&self, _: Shutdown) -> Result<(), Errno> {
        Ok(())
    }

    fn try_clone(&self) -> Result<Self, Errno> {
        Ok(self.clone())
    }
}
