use crate::consts::{
    BT_SECURITY_HIGH, BT_SECURITY_LOW, BT_SECURITY_MEDIUM, BT_SECURITY_SDP, L2CAP_DEFAULT_MTU, L2CAP_LM_AUTH,
    L2CAP_LM_ENCRYPT, L2CAP_LM_SECURE, L2CAP_MIN_MTU, L2CAP_MODE_BASIC,
};
use crate::error::{Error, Result};

/// `struct l2cap_options`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct L2capOptions {
    pub outgoing_mtu: u16,
    pub incoming_mtu: u16,
    pub flush_timeout: u16,
    pub mode: u8,
    pub fcs: u8,
    pub max_transmit: u8,
    pub transmit_window: u16,
}

impl L2capOptions {
    /// `sizeof(struct l2cap_options)`
    pub const SIZE: usize = 12;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];

        bytes[0..2].copy_from_slice(&self.outgoing_mtu.to_ne_bytes());
        bytes[2..4].copy_from_slice(&self.incoming_mtu.to_ne_bytes());
        bytes[4..6].copy_from_slice(&self.flush_timeout.to_ne_bytes());
        bytes[6] = self.mode;
        bytes[7] = self.fcs;
        bytes[8] = self.max_transmit;
        bytes[10..12].copy_from_slice(&self.transmit_window.to_ne_bytes());

        bytes
    }

    /// Read the options returned by the kernel
    ///
    /// Older kernels do not have the transmit window, the default is used if it is missing.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 9 {
            return Err(Error::Protocol(format!("{} bytes is too short for L2CAP options", bytes.len())));
        }

        let u16_at = |at: usize| u16::from_ne_bytes([bytes[at], bytes[at + 1]]);

        Ok(L2capOptions {
            outgoing_mtu: u16_at(0),
            incoming_mtu: u16_at(2),
            flush_timeout: u16_at(4),
            mode: bytes[6],
            fcs: bytes[7],
            max_transmit: bytes[8],
            transmit_window: if bytes.len() >= Self::SIZE {
                u16_at(10)
            } else {
                Self::default().transmit_window
            },
        })
    }

    /// Set both MTUs
    pub fn set_mtu(&mut self, mtu: u16) -> Result<()> {
        check_mtu(mtu)?;

        self.outgoing_mtu = mtu;
        self.incoming_mtu = mtu;

        Ok(())
    }
}

impl Default for L2capOptions {
    fn default() -> Self {
        L2capOptions {
            outgoing_mtu: 0,
            incoming_mtu: L2CAP_DEFAULT_MTU,
            flush_timeout: 0xFFFF,
            mode: L2CAP_MODE_BASIC,
            fcs: 1,
            max_transmit: 3,
            transmit_window: 63,
        }
    }
}

pub(crate) fn check_mtu(mtu: u16) -> Result<()> {
    if mtu < L2CAP_MIN_MTU {
        Err(Error::value(format!(
            "MTU {} is out of range, it must be within {}..=65535",
            mtu, L2CAP_MIN_MTU
        )))
    } else {
        Ok(())
    }
}

/// The security levels of `BT_SECURITY`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SecurityLevel {
    Sdp,
    Low,
    Medium,
    High,
}

impl SecurityLevel {
    pub fn val(self) -> u8 {
        match self {
            SecurityLevel::Sdp => BT_SECURITY_SDP,
            SecurityLevel::Low => BT_SECURITY_LOW,
            SecurityLevel::Medium => BT_SECURITY_MEDIUM,
            SecurityLevel::High => BT_SECURITY_HIGH,
        }
    }

    /// Get the `L2CAP_LM` link mode used by kernels without `BT_SECURITY`
    pub fn link_mode(self) -> i32 {
        match self {
            SecurityLevel::Sdp => 0,
            SecurityLevel::Low => L2CAP_LM_AUTH,
            SecurityLevel::Medium => L2CAP_LM_AUTH | L2CAP_LM_ENCRYPT,
            SecurityLevel::High => L2CAP_LM_AUTH | L2CAP_LM_ENCRYPT | L2CAP_LM_SECURE,
        }
    }

    /// `struct bt_security`, the key size is left for the kernel to choose
    pub fn to_bytes(self) -> [u8; 2] {
        [self.val(), 0]
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self> {
        match level {
            BT_SECURITY_SDP => Ok(SecurityLevel::Sdp),
            BT_SECURITY_LOW => Ok(SecurityLevel::Low),
            BT_SECURITY_MEDIUM => Ok(SecurityLevel::Medium),
            BT_SECURITY_HIGH => Ok(SecurityLevel::High),
            _ => Err(Error::value(format!("invalid security level {}", level))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2cap_options_test() {
        let options = L2capOptions::default();

        let bytes = options.to_bytes();

        assert_eq!(0, bytes[9]);

        assert_eq!(options, L2capOptions::from_bytes(&bytes).unwrap());

        assert_eq!(options, L2capOptions::from_bytes(&bytes[..10]).unwrap());

        assert!(L2capOptions::from_bytes(&bytes[..8]).is_err());
    }

    #[test]
    fn mtu_test() {
        let mut options = L2capOptions::default();

        options.set_mtu(1024).unwrap();

        assert_eq!((1024, 1024), (options.incoming_mtu, options.outgoing_mtu));

        assert!(options.set_mtu(47).is_err());

        assert!(options.set_mtu(48).is_ok());

        assert!(options.set_mtu(u16::MAX).is_ok());
    }

    #[test]
    fn security_test() {
        assert_eq!(0, SecurityLevel::Sdp.link_mode());

        assert_eq!(0x02 | 0x04 | 0x20, SecurityLevel::High.link_mode());

        assert_eq!([2, 0], SecurityLevel::Medium.to_bytes());

        assert_eq!(SecurityLevel::Low, SecurityLevel::try_from(1).unwrap());

        assert!(SecurityLevel::try_from(4).is_err());
    }
}
