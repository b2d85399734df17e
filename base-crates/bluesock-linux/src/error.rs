use bluesock_core::FormatError;
use bluesock_hci::{FilterSizeError, HciError};
use bluesock_sdp::SdpError;
use nix::errno::Errno;

/// The kind of an [`Error`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed address or UUID text
    Format,
    /// An invalid parameter for the operation
    Value,
    /// An unknown protocol, or an address for a different protocol
    Protocol,
    /// The operation is not valid for the current state of the socket
    State,
    /// The operation is not supported by the protocol of the socket
    Unsupported,
    /// The timeout of the socket elapsed
    Timeout,
    /// The kernel (or the controller) refused the operation
    Os,
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let name = match self {
            ErrorKind::Format => "format error",
            ErrorKind::Value => "value error",
            ErrorKind::Protocol => "protocol error",
            ErrorKind::State => "state error",
            ErrorKind::Unsupported => "unsupported operation",
            ErrorKind::Timeout => "timed out",
            ErrorKind::Os => "OS error",
        };

        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("{0}")]
    Value(String),
    #[error("unknown Bluetooth protocol {0}")]
    UnknownProtocol(i32),
    #[error("{0}")]
    Protocol(String),
    #[error("{0}")]
    State(&'static str),
    #[error("{0}")]
    Unsupported(String),
    #[error("timed out")]
    Timeout,
    #[error(transparent)]
    Os(#[from] Errno),
    #[error(transparent)]
    Filter(#[from] FilterSizeError),
    #[error(transparent)]
    Hci(#[from] HciError),
    #[error(transparent)]
    Sdp(#[from] SdpError),
    /// A `sendall` that failed part way through
    #[error("failed after sending {sent} bytes: {cause}")]
    Incomplete {
        sent: usize,
        #[source]
        cause: Box<Error>,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Format(_) => ErrorKind::Format,
            Error::Value(_) | Error::Filter(_) => ErrorKind::Value,
            Error::UnknownProtocol(_) | Error::Protocol(_) => ErrorKind::Protocol,
            Error::State(_) => ErrorKind::State,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::Timeout => ErrorKind::Timeout,
            Error::Os(_) | Error::Hci(_) => ErrorKind::Os,
            Error::Sdp(SdpError::Format(_)) => ErrorKind::Format,
            Error::Sdp(SdpError::Timeout) => ErrorKind::Timeout,
            Error::Sdp(SdpError::NotConnected) => ErrorKind::State,
            Error::Sdp(_) => ErrorKind::Os,
            Error::Incomplete { cause, .. } => cause.kind(),
        }
    }

    /// Get the error number of the kernel, if there is one
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Error::Os(errno) => Some(*errno),
            Error::Hci(HciError::Status(_)) => Some(Errno::EIO),
            Error::Sdp(SdpError::Transport(io)) => io.raw_os_error().map(Errno::from_i32),
            Error::Incomplete { cause, .. } => cause.errno(),
            _ => None,
        }
    }

    pub(crate) fn value<S: Into<String>>(message: S) -> Self {
        Error::Value(message.into())
    }
}

pub type Result<T> = core::result::Result<T, Error>;
