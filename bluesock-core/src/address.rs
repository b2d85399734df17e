//! Bluetooth device address

use crate::FormatError;
use core::fmt::{Display, Formatter};

/// A Bluetooth device address
///
/// The six bytes are kept in the same order the kernel uses (the BlueZ `bdaddr_t` order). This is
/// the reverse of how an address is written out, so the octet displayed last is the first byte of
/// the address.
///
/// ```
/// # use bluesock_core::BluetoothDeviceAddress;
/// let address: BluetoothDeviceAddress = "01:23:45:67:89:AB".parse().unwrap();
///
/// assert_eq!(&[0xAB, 0x89, 0x67, 0x45, 0x23, 0x01], address.as_bytes());
///
/// assert_eq!("01:23:45:67:89:AB", address.to_string());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BluetoothDeviceAddress(pub [u8; 6]);

impl BluetoothDeviceAddress {
    /// The length of the text form of an address
    pub const STRING_LEN: usize = 17;

    /// The wildcard address (`00:00:00:00:00:00`)
    pub const ANY: Self = BluetoothDeviceAddress([0; 6]);

    /// The address used to refer to the local host (`FF:FF:FF:00:00:00`)
    pub const LOCAL: Self = BluetoothDeviceAddress([0, 0, 0, 0xFF, 0xFF, 0xFF]);

    /// Create an address from bytes in kernel order
    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        BluetoothDeviceAddress(bytes)
    }

    /// Get the address bytes in kernel order
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Create an address from a slice containing the bytes in kernel order
    ///
    /// `None` is returned if `bytes` is shorter than six bytes. Only the first six bytes are used.
    pub fn try_from_slice(bytes: &[u8]) -> Option<Self> {
        let mut address = [0u8; 6];

        address.copy_from_slice(bytes.get(..6)?);

        Some(BluetoothDeviceAddress(address))
    }

    /// Parse an address from the form `XX:XX:XX:XX:XX:XX`
    ///
    /// Hexadecimal digits may be upper or lower case. The text must be exactly 17 characters,
    /// shorter addresses are not padded out.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        if text.len() != Self::STRING_LEN {
            return Err(FormatError::AddressLength { length: text.len() });
        }

        if !Self::validate(text) {
            return Err(FormatError::AddressSyntax(text.to_string()));
        }

        let mut address = [0u8; 6];

        for (octet, byte) in text.split(':').zip(address.iter_mut().rev()) {
            *byte = u8::from_str_radix(octet, 16).map_err(|_| FormatError::AddressSyntax(text.to_string()))?;
        }

        Ok(BluetoothDeviceAddress(address))
    }

    /// Check if `text` is a correctly formed address
    ///
    /// This is a strict check of the length and the positions of the digits and separators.
    pub fn validate(text: &str) -> bool {
        let bytes = text.as_bytes();

        bytes.len() == Self::STRING_LEN
            && bytes.iter().enumerate().all(|(index, c)| match index % 3 {
                2 => *c == b':',
                _ => c.is_ascii_hexdigit(),
            })
    }

    /// Format the address into its uppercase text form
    pub fn format(&self) -> String {
        self.to_string()
    }
}

impl Display for BluetoothDeviceAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[5], self.0[4], self.0[3], self.0[2], self.0[1], self.0[0]
        )
    }
}

impl core::fmt::Debug for BluetoothDeviceAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Display::fmt(self, f)
    }
}

impl core::str::FromStr for BluetoothDeviceAddress {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for BluetoothDeviceAddress {
    type Error = FormatError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<[u8; 6]> for BluetoothDeviceAddress {
    fn from(bytes: [u8; 6]) -> Self {
        BluetoothDeviceAddress(bytes)
    }
}

impl From<BluetoothDeviceAddress> for [u8; 6] {
    fn from(address: BluetoothDeviceAddress) -> Self {
        address.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn parse_test() {
        let address = BluetoothDeviceAddress::parse("01:23:45:67:89:ab").unwrap();

        assert_eq!([0xab, 0x89, 0x67, 0x45, 0x23, 0x01], address.0);

        assert_eq!("01:23:45:67:89:AB", address.format());

        assert_eq!(BluetoothDeviceAddress::ANY, "00:00:00:00:00:00".parse().unwrap());

        assert_eq!(BluetoothDeviceAddress::LOCAL, "FF:FF:FF:00:00:00".parse().unwrap());

        assert_eq!(&[0, 0, 0, 0xFF, 0xFF, 0xFF], BluetoothDeviceAddress::LOCAL.as_bytes());

        assert_eq!("FF:FF:FF:00:00:00", BluetoothDeviceAddress::LOCAL.to_string());
    }

    #[test]
    fn reject_malformed_test() {
        // too short, the legacy shorthand is not accepted
        assert_eq!(
            Err(FormatError::AddressLength { length: 2 }),
            BluetoothDeviceAddress::parse("01")
        );

        assert!(BluetoothDeviceAddress::parse("01:23:45:67:89:AB:").is_err());

        // wrong separator
        assert!(BluetoothDeviceAddress::parse("01-23-45-67-89-AB").is_err());

        // non hex digits
        assert!(BluetoothDeviceAddress::parse("01:23:45:67:89:AG").is_err());

        // a sign is not a digit even though `from_str_radix` would take it
        assert!(BluetoothDeviceAddress::parse("+1:23:45:67:89:AB").is_err());

        // multibyte characters
        assert!(BluetoothDeviceAddress::parse("01:23:45:67:89:é").is_err());
    }

    #[test]
    fn validate_test() {
        assert!(BluetoothDeviceAddress::validate("AA:bb:CC:dd:EE:ff"));

        assert!(!BluetoothDeviceAddress::validate("AA:bb:CC:dd:EE"));

        assert!(!BluetoothDeviceAddress::validate("AA:bb:CC:dd:EE:fff"));

        assert!(!BluetoothDeviceAddress::validate("AAAbb:CC:dd:EE:ff"));
    }

    #[test]
    fn slice_test() {
        let bytes = [1, 2, 3, 4, 5, 6, 7];

        assert_eq!(
            Some(BluetoothDeviceAddress([1, 2, 3, 4, 5, 6])),
            BluetoothDeviceAddress::try_from_slice(&bytes)
        );

        assert_eq!(None, BluetoothDeviceAddress::try_from_slice(&bytes[..5]));
    }

    #[quickcheck]
    fn format_parse_round_trip(octets: (u8, u8, u8, u8, u8, u8)) -> bool {
        let address = BluetoothDeviceAddress([octets.0, octets.1, octets.2, octets.3, octets.4, octets.5]);

        BluetoothDeviceAddress::parse(&address.format()) == Ok(address)
    }

    #[quickcheck]
    fn lowercase_normalizes(octets: (u8, u8, u8, u8, u8, u8)) -> bool {
        let text = format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            octets.0, octets.1, octets.2, octets.3, octets.4, octets.5
        );

        BluetoothDeviceAddress::parse(&text).map(|a| a.format()) == Ok(text.to_uppercase())
    }
}
