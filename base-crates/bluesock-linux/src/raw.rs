//! The descriptor operations beneath a [`BluetoothSocket`](crate::BluetoothSocket)
//!
//! Socket addresses are passed through this layer as the raw bytes of the `sockaddr` structure,
//! the encoding and decoding is done by the socket above it.

use crate::addr::Protocol;
use nix::errno::Errno;
use nix::libc;
use std::mem::size_of;
use std::net::Shutdown;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

/// The readiness waited for by [`RawSocket::wait`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// A socket descriptor
pub trait RawSocket: Sized {
    fn open(protocol: Protocol) -> Result<Self, Errno>;

    fn bind(&self, address: &[u8]) -> Result<(), Errno>;

    fn listen(&self, backlog: i32) -> Result<(), Errno>;

    /// Accept a connection, returning the new socket along with the address of the peer
    fn accept(&self) -> Result<(Self, Vec<u8>), Errno>;

    fn connect(&self, address: &[u8]) -> Result<(), Errno>;

    fn send(&self, data: &[u8], flags: i32) -> Result<usize, Errno>;

    fn send_to(&self, data: &[u8], flags: i32, address: &[u8]) -> Result<usize, Errno>;

    fn recv(&self, buffer: &mut [u8], flags: i32) -> Result<usize, Errno>;

    fn recv_from(&self, buffer: &mut [u8], flags: i32) -> Result<(usize, Vec<u8>), Errno>;

    /// Wait for the socket to become ready
    ///
    /// A negative timeout waits forever. The return is false if the timeout elapsed.
    fn wait(&self, direction: Direction, timeout_ms: i32) -> Result<bool, Errno>;

    fn set_nonblocking(&self, nonblocking: bool) -> Result<(), Errno>;

    fn set_option(&self, level: i32, name: i32, value: &[u8]) -> Result<(), Errno>;

    /// Get an option, the returned value is at most `len` bytes
    fn option(&self, level: i32, name: i32, len: usize) -> Result<Vec<u8>, Errno>;

    fn local_addr(&self) -> Result<Vec<u8>, Errno>;

    fn peer_addr(&self) -> Result<Vec<u8>, Errno>;

    fn shutdown(&self, how: Shutdown) -> Result<(), Errno>;

    fn try_clone(&self) -> Result<Self, Errno>;
}

/// A socket of the Linux kernel
#[derive(Debug)]
pub struct KernelSocket {
    fd: OwnedFd,
}

impl KernelSocket {
    /// Take ownership of an open socket descriptor
    pub fn from_fd(fd: OwnedFd) -> Self {
        KernelSocket { fd }
    }

    pub fn into_fd(self) -> OwnedFd {
        self.fd
    }
}

fn check(ret: libc::c_int) -> Result<(), Errno> {
    Errno::result(ret).map(drop)
}

fn check_len(ret: libc::ssize_t) -> Result<usize, Errno> {
    Errno::result(ret).map(|len| len as usize)
}

fn to_storage(address: &[u8]) -> Result<(libc::sockaddr_storage, libc::socklen_t), Errno> {
    if address.len() > size_of::<libc::sockaddr_storage>() {
        return Err(Errno::EINVAL);
    }

    let mut storage: libc::sockaddr_storage = unsafe { core::mem::zeroed() };

    unsafe {
        core::ptr::copy_nonoverlapping(
            address.as_ptr(),
            &mut storage as *mut libc::sockaddr_storage as *mut u8,
            address.len(),
        )
    };

    Ok((storage, address.len() as libc::socklen_t))
}

fn from_storage(storage: &libc::sockaddr_storage, len: libc::socklen_t) -> Vec<u8> {
    let len = (len as usize).min(size_of::<libc::sockaddr_storage>());

    unsafe { core::slice::from_raw_parts(storage as *const libc::sockaddr_storage as *const u8, len) }.to_vec()
}

fn empty_storage() -> (libc::sockaddr_storage, libc::socklen_t) {
    (
        unsafe { core::mem::zeroed() },
        size_of::<libc::sockaddr_storage>() as libc::socklen_t,
    )
}

impl RawSocket for KernelSocket {
    fn open(protocol: Protocol) -> Result<Self, Errno> {
        let raw_fd = unsafe {
            libc::socket(
                libc::AF_BLUETOOTH,
                protocol.socket_type() | libc::SOCK_CLOEXEC,
                protocol.number(),
            )
        };

        if raw_fd < 0 {
            return Err(Errno::last());
        }

        Ok(KernelSocket {
            fd: unsafe { OwnedFd::from_raw_fd(raw_fd) },
        })
    }

    fn bind(&self, address: &[u8]) -> Result<(), Errno> {
        let (storage, len) = to_storage(address)?;

        check(unsafe {
            libc::bind(
                self.fd.as_raw_fd(),
                &storage as *const libc::sockaddr_storage as *const libc::sockaddr,
                len,
            )
        })
    }

    fn listen(&self, backlog: i32) -> Result<(), Errno> {
        check(unsafe { libc::listen(self.fd.as_raw_fd(), backlog) })
    }

    fn accept(&self) -> Result<(Self, Vec<u8>), Errno> {
        let (mut storage, mut len) = empty_storage();

        let raw_fd = unsafe {
            libc::accept4(
                self.fd.as_raw_fd(),
                &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr,
                &mut len,
                libc::SOCK_CLOEXEC,
            )
        };

        if raw_fd < 0 {
            return Err(Errno::last());
        }

        let socket = KernelSocket {
            fd: unsafe { OwnedFd::from_raw_fd(raw_fd) },
        };

        Ok((socket, from_storage(&storage, len)))
    }

    fn connect(&self, address: &[u8]) -> Result<(), Errno> {
        let (storage, len) = to_storage(address)?;

        check(unsafe {
            libc::connect(
                self.fd.as_raw_fd(),
                &storage as *const libc::sockaddr_storage as *const libc::sockaddr,
                len,
            )
        })
    }

    fn send(&self, data: &[u8], flags: i32) -> Result<usize, Errno> {
        check_len(unsafe { libc::send(self.fd.as_raw_fd(), data.as_ptr() as *const libc::c_void, data.len(), flags) })
    }

    fn send_to(&self, data: &[u8], flags: i32, address: &[u8]) -> Result<usize, Errno> {
        let (storage, len) = to_storage(address)?;

        check_len(unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                data.as_ptr() as *const libc::c_void,
                data.len(),
                flags,
                &storage as *const libc::sockaddr_storage as *const libc::sockaddr,
                len,
            )
        })
    }

    fn recv(&self, buffer: &mut [u8], flags: i32) -> Result<usize, Errno> {
        check_len(unsafe {
            libc::recv(
                self.fd.as_raw_fd(),
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
                flags,
            )
        })
    }

    fn recv_from(&self, buffer: &mut [u8], flags: i32) -> Result<(usize, Vec<u8>), Errno> {
        let (mut storage, mut len) = empty_storage();

        let received = check_len(unsafe {
            libc::recvfrom(
                self.fd.as_raw_fd(),
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
                flags,
                &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr,
                &mut len,
            )
        })?;

        Ok((received, from_storage(&storage, len)))
    }

    fn wait(&self, direction: Direction, timeout_ms: i32) -> Result<bool, Errno> {
        use nix::poll::{poll, PollFd, PollFlags};

        let events = match direction {
            Direction::Read => PollFlags::POLLIN,
            Direction::Write => PollFlags::POLLOUT,
        };

        let mut fds = [PollFd::new(&self.fd, events)];

        loop {
            match poll(&mut fds, timeout_ms) {
                Ok(ready) => break Ok(ready > 0),
                Err(Errno::EINTR) => continue,
                Err(e) => break Err(e),
            }
        }
    }

    fn set_nonblocking(&self, nonblocking: bool) -> Result<(), Errno> {
        use nix::fcntl::{fcntl, FcntlArg, OFlag};

        let mut flags = OFlag::from_bits_truncate(fcntl(self.fd.as_raw_fd(), FcntlArg::F_GETFL)?);

        flags.set(OFlag::O_NONBLOCK, nonblocking);

        fcntl(self.fd.as_raw_fd(), FcntlArg::F_SETFL(flags)).map(drop)
    }

    fn set_option(&self, level: i32, name: i32, value: &[u8]) -> Result<(), Errno> {
        check(unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                level,
                name,
                value.as_ptr() as *const libc::c_void,
                value.len() as libc::socklen_t,
            )
        })
    }

    fn option(&self, level: i32, name: i32, len: usize) -> Result<Vec<u8>, Errno> {
        let mut value = vec![0u8; len];

        let mut value_len = len as libc::socklen_t;

        check(unsafe {
            libc::getsockopt(
                self.fd.as_raw_fd(),
                level,
                name,
                value.as_mut_ptr() as *mut libc::c_void,
                &mut value_len,
            )
        })?;

        value.truncate(value_len as usize);

        Ok(value)
    }

    fn local_addr(&self) -> Result<Vec<u8>, Errno> {
        let (mut storage, mut len) = empty_storage();

        check(unsafe {
            libc::getsockname(
                self.fd.as_raw_fd(),
                &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr,
                &mut len,
            )
        })?;

        Ok(from_storage(&storage, len))
    }

    fn peer_addr(&self) -> Result<Vec<u8>, Errno> {
        let (mut storage, mut len) = empty_storage();

        check(unsafe {
            libc::getpeername(
                self.fd.as_raw_fd(),
                &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr,
                &mut len,
            )
        })?;

        Ok(from_storage(&storage, len))
    }

    fn shutdown(&self, how: Shutdown) -> Result<(), Errno> {
        let how = match how {
            Shutdown::Read => libc::SHUT_RD,
            Shutdown::Write => libc::SHUT_WR,
            Shutdown::Both => libc::SHUT_RDWR,
        };

        check(unsafe { libc::shutdown(self.fd.as_raw_fd(), how) })
    }

    fn try_clone(&self) -> Result<Self, Errno> {
        let raw_fd = unsafe { libc::fcntl(self.fd.as_raw_fd(), libc::F_DUPFD_CLOEXEC, 0) };

        if raw_fd < 0 {
            return Err(Errno::last());
        }

        Ok(KernelSocket {
            fd: unsafe { OwnedFd::from_raw_fd(raw_fd) },
        })
    }
}

impl AsRawFd for KernelSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for KernelSocket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl IntoRawFd for KernelSocket {
    fn into_raw_fd(self) -> RawFd {
        self.fd.into_raw_fd()
    }
}
