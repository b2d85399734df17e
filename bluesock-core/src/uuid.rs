//! Service UUIDs
//!
//! A UUID in Bluetooth has some differences from the UUID of
//! [RFC 4122](https://datatracker.ietf.org/doc/html/rfc4122). They are still unique identifiers,
//! but to reduce the load of having to transfer 128-bits for commonly used identifiers, the
//! specification has mapped two ranges for shortened UUIDs. These shortened UUIDs are sized at 16
//! and 32 bit. A shortened UUID can always be converted into a full sized UUID.

use crate::FormatError;
use core::fmt::{Display, Formatter};
use core::hash::{Hash, Hasher};

/// See Vol 3 part B sec 2.5.1 for where this value comes from.
/// This can also be found as the Bluetooth Base UUID in the assigned numbers document.
const BLUETOOTH_BASE_UUID: u128 = 0x0000000000001000800000805F9B34FB;

/// The positions of the dashes within the text form of a 128 bit UUID
const DASH_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Universally Unique Identifier
///
/// The width of the UUID is kept as it was created so that the text and protocol forms are
/// rendered at the same width. Comparison is always done on the full 128 bit value, so a shortened
/// UUID is equal to its 128 bit expansion.
///
/// ```
/// # use bluesock_core::Uuid;
/// let serial_port: Uuid = "1101".parse().unwrap();
///
/// assert_eq!(Uuid::from_u16(0x1101), serial_port);
///
/// assert_eq!(serial_port, "00001101-0000-1000-8000-00805F9B34FB".parse().unwrap());
///
/// assert_eq!("1101", serial_port.to_string());
/// ```
#[derive(Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Uuid {
    Uuid16(u16),
    Uuid32(u32),
    Uuid128(u128),
}

impl Uuid {
    pub const SDP: Uuid = Uuid::Uuid16(0x0001);
    pub const UDP: Uuid = Uuid::Uuid16(0x0002);
    pub const RFCOMM: Uuid = Uuid::Uuid16(0x0003);
    pub const TCP: Uuid = Uuid::Uuid16(0x0004);
    pub const OBEX: Uuid = Uuid::Uuid16(0x0008);
    pub const BNEP: Uuid = Uuid::Uuid16(0x000F);
    pub const HIDP: Uuid = Uuid::Uuid16(0x0011);
    pub const AVCTP: Uuid = Uuid::Uuid16(0x0017);
    pub const AVDTP: Uuid = Uuid::Uuid16(0x0019);
    pub const L2CAP: Uuid = Uuid::Uuid16(0x0100);

    pub const SDP_SERVER: Uuid = Uuid::Uuid16(0x1000);
    pub const BROWSE_GROUP_DESCRIPTOR: Uuid = Uuid::Uuid16(0x1001);
    pub const PUBLIC_BROWSE_GROUP: Uuid = Uuid::Uuid16(0x1002);
    pub const SERIAL_PORT: Uuid = Uuid::Uuid16(0x1101);
    pub const LAN_ACCESS: Uuid = Uuid::Uuid16(0x1102);
    pub const DIALUP_NETWORKING: Uuid = Uuid::Uuid16(0x1103);
    pub const IRMC_SYNC: Uuid = Uuid::Uuid16(0x1104);
    pub const OBEX_OBJECT_PUSH: Uuid = Uuid::Uuid16(0x1105);
    pub const OBEX_FILE_TRANSFER: Uuid = Uuid::Uuid16(0x1106);
    pub const HEADSET: Uuid = Uuid::Uuid16(0x1108);
    pub const AUDIO_SOURCE: Uuid = Uuid::Uuid16(0x110A);
    pub const AUDIO_SINK: Uuid = Uuid::Uuid16(0x110B);
    pub const AV_REMOTE_TARGET: Uuid = Uuid::Uuid16(0x110C);
    pub const ADVANCED_AUDIO: Uuid = Uuid::Uuid16(0x110D);
    pub const AV_REMOTE: Uuid = Uuid::Uuid16(0x110E);
    pub const HEADSET_AUDIO_GATEWAY: Uuid = Uuid::Uuid16(0x1112);
    pub const PANU: Uuid = Uuid::Uuid16(0x1115);
    pub const NAP: Uuid = Uuid::Uuid16(0x1116);
    pub const GN: Uuid = Uuid::Uuid16(0x1117);
    pub const HANDSFREE: Uuid = Uuid::Uuid16(0x111E);
    pub const HANDSFREE_AUDIO_GATEWAY: Uuid = Uuid::Uuid16(0x111F);
    pub const HUMAN_INTERFACE_DEVICE: Uuid = Uuid::Uuid16(0x1124);
    pub const PNP_INFO: Uuid = Uuid::Uuid16(0x1200);
    pub const GENERIC_NETWORKING: Uuid = Uuid::Uuid16(0x1201);
    pub const GENERIC_FILE_TRANSFER: Uuid = Uuid::Uuid16(0x1202);
    pub const GENERIC_AUDIO: Uuid = Uuid::Uuid16(0x1203);
    pub const GENERIC_TELEPHONY: Uuid = Uuid::Uuid16(0x1204);

    pub const fn from_u16(v: u16) -> Self {
        Uuid::Uuid16(v)
    }

    pub const fn from_u32(v: u32) -> Self {
        Uuid::Uuid32(v)
    }

    pub const fn from_u128(v: u128) -> Self {
        Uuid::Uuid128(v)
    }

    /// Get the full 128 bit value of the UUID
    pub const fn to_u128(&self) -> u128 {
        match *self {
            // See Vol 3 part B sec 2.5.1 for this equation
            Uuid::Uuid16(v) => ((v as u128) << 96) | BLUETOOTH_BASE_UUID,
            Uuid::Uuid32(v) => ((v as u128) << 96) | BLUETOOTH_BASE_UUID,
            Uuid::Uuid128(v) => v,
        }
    }

    /// Get the number of bytes of the UUID as it was created
    pub const fn width(&self) -> usize {
        match self {
            Uuid::Uuid16(_) => 2,
            Uuid::Uuid32(_) => 4,
            Uuid::Uuid128(_) => 16,
        }
    }

    /// Returns true if the UUID can be a 16 bit shortened UUID
    pub fn can_be_16_bit(&self) -> bool {
        !((!0u16 as u128) << 96) & self.to_u128() == BLUETOOTH_BASE_UUID
    }

    /// Returns true if the UUID can be a 32 bit shortened UUID
    pub fn can_be_32_bit(&self) -> bool {
        !(((!0u32) as u128) << 96) & self.to_u128() == BLUETOOTH_BASE_UUID
    }

    /// Parse a UUID from its text form
    ///
    /// The length of `text` selects the width of the UUID. Four hex digits is a 16 bit UUID,
    /// eight is a 32 bit UUID, and a 128 bit UUID is written in the form
    /// `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`. Digits can be upper or lower case.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let syntax_error = || FormatError::UuidSyntax(text.to_string());

        match text.len() {
            4 => parse_hex(text).map(|v| Uuid::Uuid16(v as u16)).ok_or_else(syntax_error),
            8 => parse_hex(text).map(|v| Uuid::Uuid32(v as u32)).ok_or_else(syntax_error),
            36 => {
                let bytes = text.as_bytes();

                if DASH_POSITIONS.iter().any(|p| bytes[*p] != b'-') {
                    return Err(syntax_error());
                }

                let digits: String = text.split('-').collect();

                // a misplaced dash shows up as a digit count that is off
                if digits.len() != 32 {
                    return Err(syntax_error());
                }

                parse_hex(&digits).map(Uuid::Uuid128).ok_or_else(syntax_error)
            }
            length => Err(FormatError::UuidLength { length }),
        }
    }

    /// Format the UUID into its uppercase text form
    pub fn format(&self) -> String {
        self.to_string()
    }
}

/// Check if `text` is a valid UUID
pub fn is_valid_uuid(text: &str) -> bool {
    Uuid::parse(text).is_ok()
}

/// Parse a string of only hexadecimal digits
///
/// `from_str_radix` accepts a leading sign, so the digits are checked first.
fn parse_hex(text: &str) -> Option<u128> {
    if text.bytes().all(|c| c.is_ascii_hexdigit()) {
        u128::from_str_radix(text, 16).ok()
    } else {
        None
    }
}

impl PartialEq for Uuid {
    fn eq(&self, other: &Self) -> bool {
        self.to_u128() == other.to_u128()
    }
}

impl Eq for Uuid {}

impl Hash for Uuid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_u128().hash(state)
    }
}

impl PartialOrd for Uuid {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Uuid {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.to_u128().cmp(&other.to_u128())
    }
}

impl Display for Uuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match *self {
            Uuid::Uuid16(v) => write!(f, "{:04X}", v),
            Uuid::Uuid32(v) => write!(f, "{:08X}", v),
            Uuid::Uuid128(v) => {
                let words = [(v >> 96) as u32, (v >> 64) as u32, (v >> 32) as u32, v as u32];

                write!(
                    f,
                    "{:08X}-{:04X}-{:04X}-{:04X}-{:04X}{:08X}",
                    words[0],
                    words[1] >> 16,
                    words[1] & 0xFFFF,
                    words[2] >> 16,
                    words[2] & 0xFFFF,
                    words[3]
                )
            }
        }
    }
}

impl core::fmt::Debug for Uuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Uuid::Uuid16(_) => write!(f, "{} (16b)", self),
            Uuid::Uuid32(_) => write!(f, "{} (32b)", self),
            Uuid::Uuid128(_) => write!(f, "{} (128b)", self),
        }
    }
}

impl core::str::FromStr for Uuid {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Uuid {
    type Error = FormatError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<u128> for Uuid {
    fn from(v: u128) -> Uuid {
        Self::from_u128(v)
    }
}

impl From<u32> for Uuid {
    fn from(v: u32) -> Uuid {
        Self::from_u32(v)
    }
}

impl From<u16> for Uuid {
    fn from(v: u16) -> Uuid {
        Self::from_u16(v)
    }
}

impl From<Uuid> for u128 {
    fn from(uuid: Uuid) -> u128 {
        uuid.to_u128()
    }
}

impl TryFrom<Uuid> for u16 {
    type Error = ();

    /// Try to convert a UUID into its 16 bit shortened form. This doesn't check that the value is
    /// pre-allocated (a.k.a. assigned number) from the Bluetooth SIG.
    fn try_from(uuid: Uuid) -> Result<u16, ()> {
        if uuid.can_be_16_bit() {
            Ok((uuid.to_u128() >> 96) as u16)
        } else {
            Err(())
        }
    }
}

impl TryFrom<Uuid> for u32 {
    type Error = ();

    /// Try to convert a UUID into its 32 bit shortened form. This doesn't check that the value is
    /// pre-allocated (a.k.a. assigned number) from the Bluetooth SIG.
    fn try_from(uuid: Uuid) -> Result<u32, ()> {
        if uuid.can_be_32_bit() {
            Ok((uuid.to_u128() >> 96) as u32)
        } else {
            Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn uuid_16_test() {
        let uuid = Uuid::parse("abcd").unwrap();

        // expected full 128 bit form of the uuid
        let uuid_128_val: u128 = 0x0000ABCD00001000800000805F9B34FB;

        assert_eq!(uuid_128_val, uuid.to_u128());

        assert_eq!(uuid, Uuid::from_u128(uuid_128_val));

        assert_eq!(Ok(0xABCD), <u16>::try_from(uuid));

        assert_eq!(2, uuid.width());

        assert_eq!("ABCD", uuid.format());
    }

    #[test]
    fn uuid_32_test() {
        let uuid = Uuid::parse("1234abcd").unwrap();

        assert_eq!(0x1234ABCD00001000800000805F9B34FB, uuid.to_u128());

        assert!(!uuid.can_be_16_bit());

        assert!(uuid.can_be_32_bit());

        assert_eq!(Err(()), <u16>::try_from(uuid));

        assert_eq!("1234ABCD", uuid.format());

        assert_eq!("0000ABCD", Uuid::from_u32(0xabcd).format());
    }

    #[test]
    fn uuid_128_test() {
        let text = "68d82662-0305-4e6f-a679-6be1475f5e04";

        let uuid = Uuid::parse(text).unwrap();

        assert_eq!(0x68d82662_0305_4e6f_a679_6be1475f5e04, uuid.to_u128());

        assert!(!uuid.can_be_32_bit());

        assert_eq!(text.to_uppercase(), uuid.format());

        assert_eq!(Uuid::SERIAL_PORT, Uuid::parse("00001101-0000-1000-8000-00805f9b34fb").unwrap());
    }

    #[test]
    fn malformed_test() {
        assert_eq!(Err(FormatError::UuidLength { length: 5 }), Uuid::parse("12345"));

        assert!(Uuid::parse("12G4").is_err());

        assert!(Uuid::parse("+123").is_err());

        // dashes in the wrong places
        assert!(Uuid::parse("68d8266-20305-4e6f-a679-6be1475f5e04").is_err());

        // too many dashes
        assert!(Uuid::parse("68d82662-0305-4e6f-a679-6be1475f5e0-").is_err());

        assert!(!is_valid_uuid(""));

        assert!(is_valid_uuid("0100"));
    }

    #[quickcheck]
    fn uuid_16_round_trip(v: u16) -> bool {
        let uuid = Uuid::from_u16(v);

        Uuid::parse(&uuid.format()).map(|u| u.to_u128()) == Ok(uuid.to_u128())
    }

    #[quickcheck]
    fn uuid_32_round_trip(v: u32) -> bool {
        let uuid = Uuid::from_u32(v);

        Uuid::parse(&uuid.format()).map(|u| u.to_u128()) == Ok(uuid.to_u128())
    }

    #[quickcheck]
    fn uuid_128_round_trip(v: u128) -> bool {
        let uuid = Uuid::from_u128(v);

        Uuid::parse(&uuid.format()).map(|u| u.to_u128()) == Ok(v)
    }
}
