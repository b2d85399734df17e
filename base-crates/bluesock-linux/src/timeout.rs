use crate::error::{Error, Result};
use std::time::Duration;

/// The blocking policy of a socket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Timeout {
    /// Operations block until they complete
    #[default]
    Blocking,
    /// Operations that would block fail immediately
    NonBlocking,
    /// Operations wait at most this long for the socket to become ready
    After(Duration),
}

impl Timeout {
    /// Convert from a timeout in seconds
    ///
    /// `None` is blocking and zero is non-blocking. A negative (or otherwise invalid) number of
    /// seconds is rejected.
    pub fn from_secs_f64(seconds: Option<f64>) -> Result<Self> {
        match seconds {
            None => Ok(Timeout::Blocking),
            Some(s) if s.is_nan() || s < 0.0 => Err(Error::value("timeout value must be positive")),
            Some(s) if s == 0.0 => Ok(Timeout::NonBlocking),
            Some(s) => Duration::try_from_secs_f64(s)
                .map(Timeout::After)
                .map_err(|_| Error::value("timeout value is too large")),
        }
    }

    /// Convert into a timeout in seconds
    pub fn as_secs_f64(&self) -> Option<f64> {
        match self {
            Timeout::Blocking => None,
            Timeout::NonBlocking => Some(0.0),
            Timeout::After(d) => Some(d.as_secs_f64()),
        }
    }

    pub fn is_blocking(&self) -> bool {
        *self == Timeout::Blocking
    }

    /// Get the timeout given to `poll`, if the socket is polled before an operation
    ///
    /// Only a socket with a timeout polls, a non-blocking socket lets the operation fail with
    /// `EAGAIN` instead.
    pub fn as_poll_ms(&self) -> Option<i32> {
        match self {
            Timeout::After(d) => {
                // rounded up, a part of a millisecond must not become a poll that never waits
                let ms = (d.as_nanos() + 999_999) / 1_000_000;

                Some(i32::try_from(ms).unwrap_or(i32::MAX))
            }
            _ => None,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Timeout::NonBlocking
        } else {
            Timeout::After(duration)
        }
    }
}

/// Configuration given to a socket when it is created
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SocketConfig {
    /// The timeout of new sockets, this includes sockets created by `accept`
    pub default_timeout: Timeout,
}

impl SocketConfig {
    pub fn with_default_timeout(default_timeout: Timeout) -> Self {
        SocketConfig { default_timeout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_secs_test() {
        assert_eq!(Timeout::Blocking, Timeout::from_secs_f64(None).unwrap());

        assert_eq!(Timeout::NonBlocking, Timeout::from_secs_f64(Some(0.0)).unwrap());

        assert_eq!(
            Timeout::After(Duration::from_millis(1500)),
            Timeout::from_secs_f64(Some(1.5)).unwrap()
        );

        assert_eq!(
            crate::ErrorKind::Value,
            Timeout::from_secs_f64(Some(-1.0)).unwrap_err().kind()
        );

        assert!(Timeout::from_secs_f64(Some(f64::NAN)).is_err());
    }

    #[test]
    fn poll_test() {
        assert_eq!(None, Timeout::Blocking.as_poll_ms());

        assert_eq!(None, Timeout::NonBlocking.as_poll_ms());

        assert_eq!(Some(250), Timeout::After(Duration::from_millis(250)).as_poll_ms());

        assert_eq!(Some(1), Timeout::After(Duration::from_micros(100)).as_poll_ms());

        assert_eq!(Some(3), Timeout::After(Duration::from_micros(2001)).as_poll_ms());

        assert_eq!(Some(i32::MAX), Timeout::After(Duration::from_secs(u64::MAX / 2)).as_poll_ms());

        assert_eq!(Some(0.25), Timeout::After(Duration::from_millis(250)).as_secs_f64());

        assert_eq!(Timeout::NonBlocking, Timeout::from(Duration::ZERO));

        assert!(SocketConfig::default().default_timeout.is_blocking());
    }
}
