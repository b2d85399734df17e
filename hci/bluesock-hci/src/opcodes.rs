//! HCI Command Opcodes
//!
//! Opcodes are composed of a group identifier (OGF) and an individual command identifier (OCF)
//! specific to the group. The group identifier and individual identifier are put together to form
//! the raw opcode value.
//!
//! ```
//! # use bluesock_hci::opcodes::{pack_opcode, unpack_ocf, unpack_ogf, OGF_HOST_CTL, OCF_RESET};
//! let opcode = pack_opcode(OGF_HOST_CTL, OCF_RESET);
//!
//! assert_eq!(0xC03, opcode);
//! assert_eq!(OGF_HOST_CTL, unpack_ogf(opcode));
//! assert_eq!(OCF_RESET, unpack_ocf(opcode));
//! ```

/// Pack an OGF and OCF into an opcode
///
/// The first 10 bits of the opcode is the OCF field and the last 6 bits is the OGF field. Bits of
/// the OCF above the first 10 are discarded.
pub const fn pack_opcode(ogf: u16, ocf: u16) -> u16 {
    (ocf & 0x3FF) | (ogf << 10)
}

/// Get the OGF of an opcode
pub const fn unpack_ogf(opcode: u16) -> u16 {
    opcode >> 10
}

/// Get the OCF of an opcode
pub const fn unpack_ocf(opcode: u16) -> u16 {
    opcode & 0x3FF
}

/// An type for the pair of OGF (OpCode Group Field) and OCF (OpCode Command Field)
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct OpCodePair {
    pub ogf: u16,
    pub ocf: u16,
}

impl OpCodePair {
    pub const fn new(ogf: u16, ocf: u16) -> Self {
        OpCodePair { ogf, ocf }
    }

    /// Convert the OpCodePair into the opcode
    pub const fn into_opcode(self) -> u16 {
        pack_opcode(self.ogf, self.ocf)
    }

    /// Convert an opcode into an OpCodePair
    pub const fn from_opcode(opcode: u16) -> Self {
        OpCodePair {
            ogf: unpack_ogf(opcode),
            ocf: unpack_ocf(opcode),
        }
    }
}

impl core::fmt::Display for OpCodePair {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{:#x}:{:#x}", self.ogf, self.ocf)
    }
}

// Link control
pub const OGF_LINK_CTL: u16 = 0x01;

pub const OCF_INQUIRY: u16 = 0x0001;
pub const OCF_INQUIRY_CANCEL: u16 = 0x0002;
pub const OCF_PERIODIC_INQUIRY: u16 = 0x0003;
pub const OCF_EXIT_PERIODIC_INQUIRY: u16 = 0x0004;
pub const OCF_CREATE_CONN: u16 = 0x0005;
pub const OCF_DISCONNECT: u16 = 0x0006;
pub const OCF_ADD_SCO: u16 = 0x0007;
pub const OCF_CREATE_CONN_CANCEL: u16 = 0x0008;
pub const OCF_ACCEPT_CONN_REQ: u16 = 0x0009;
pub const OCF_REJECT_CONN_REQ: u16 = 0x000A;
pub const OCF_LINK_KEY_REPLY: u16 = 0x000B;
pub const OCF_LINK_KEY_NEG_REPLY: u16 = 0x000C;
pub const OCF_PIN_CODE_REPLY: u16 = 0x000D;
pub const OCF_PIN_CODE_NEG_REPLY: u16 = 0x000E;
pub const OCF_SET_CONN_PTYPE: u16 = 0x000F;
pub const OCF_AUTH_REQUESTED: u16 = 0x0011;
pub const OCF_SET_CONN_ENCRYPT: u16 = 0x0013;
pub const OCF_CHANGE_CONN_LINK_KEY: u16 = 0x0015;
pub const OCF_MASTER_LINK_KEY: u16 = 0x0017;
pub const OCF_REMOTE_NAME_REQ: u16 = 0x0019;
pub const OCF_REMOTE_NAME_REQ_CANCEL: u16 = 0x001A;
pub const OCF_READ_REMOTE_FEATURES: u16 = 0x001B;
pub const OCF_READ_REMOTE_EXT_FEATURES: u16 = 0x001C;
pub const OCF_READ_REMOTE_VERSION: u16 = 0x001D;
pub const OCF_READ_CLOCK_OFFSET: u16 = 0x001F;

// Link policy
pub const OGF_LINK_POLICY: u16 = 0x02;

pub const OCF_HOLD_MODE: u16 = 0x0001;
pub const OCF_SNIFF_MODE: u16 = 0x0003;
pub const OCF_EXIT_SNIFF_MODE: u16 = 0x0004;
pub const OCF_PARK_MODE: u16 = 0x0005;
pub const OCF_EXIT_PARK_MODE: u16 = 0x0006;
pub const OCF_QOS_SETUP: u16 = 0x0007;
pub const OCF_ROLE_DISCOVERY: u16 = 0x0009;
pub const OCF_SWITCH_ROLE: u16 = 0x000B;
pub const OCF_READ_LINK_POLICY: u16 = 0x000C;
pub const OCF_WRITE_LINK_POLICY: u16 = 0x000D;

// Controller and baseband
pub const OGF_HOST_CTL: u16 = 0x03;

pub const OCF_SET_EVENT_MASK: u16 = 0x0001;
pub const OCF_RESET: u16 = 0x0003;
pub const OCF_SET_EVENT_FLT: u16 = 0x0005;
pub const OCF_FLUSH: u16 = 0x0008;
pub const OCF_READ_PIN_TYPE: u16 = 0x0009;
pub const OCF_WRITE_PIN_TYPE: u16 = 0x000A;
pub const OCF_CREATE_NEW_UNIT_KEY: u16 = 0x000B;
pub const OCF_READ_STORED_LINK_KEY: u16 = 0x000D;
pub const OCF_WRITE_STORED_LINK_KEY: u16 = 0x0011;
pub const OCF_DELETE_STORED_LINK_KEY: u16 = 0x0012;
pub const OCF_CHANGE_LOCAL_NAME: u16 = 0x0013;
pub const OCF_READ_LOCAL_NAME: u16 = 0x0014;
pub const OCF_READ_CONN_ACCEPT_TIMEOUT: u16 = 0x0015;
pub const OCF_WRITE_CONN_ACCEPT_TIMEOUT: u16 = 0x0016;
pub const OCF_READ_PAGE_TIMEOUT: u16 = 0x0017;
pub const OCF_WRITE_PAGE_TIMEOUT: u16 = 0x0018;
pub const OCF_READ_SCAN_ENABLE: u16 = 0x0019;
pub const OCF_WRITE_SCAN_ENABLE: u16 = 0x001A;
pub const OCF_READ_PAGE_ACTIVITY: u16 = 0x001B;
pub const OCF_WRITE_PAGE_ACTIVITY: u16 = 0x001C;
pub const OCF_READ_INQ_ACTIVITY: u16 = 0x001D;
pub const OCF_WRITE_INQ_ACTIVITY: u16 = 0x001E;
pub const OCF_READ_AUTH_ENABLE: u16 = 0x001F;
pub const OCF_WRITE_AUTH_ENABLE: u16 = 0x0020;
pub const OCF_READ_ENCRYPT_MODE: u16 = 0x0021;
pub const OCF_WRITE_ENCRYPT_MODE: u16 = 0x0022;
pub const OCF_READ_CLASS_OF_DEV: u16 = 0x0023;
pub const OCF_WRITE_CLASS_OF_DEV: u16 = 0x0024;
pub const OCF_READ_VOICE_SETTING: u16 = 0x0025;
pub const OCF_WRITE_VOICE_SETTING: u16 = 0x0026;
pub const OCF_READ_AUTOMATIC_FLUSH_TIMEOUT: u16 = 0x0027;
pub const OCF_WRITE_AUTOMATIC_FLUSH_TIMEOUT: u16 = 0x0028;
pub const OCF_READ_TRANSMIT_POWER_LEVEL: u16 = 0x002D;
pub const OCF_HOST_BUFFER_SIZE: u16 = 0x0033;
pub const OCF_READ_LINK_SUPERVISION_TIMEOUT: u16 = 0x0036;
pub const OCF_WRITE_LINK_SUPERVISION_TIMEOUT: u16 = 0x0037;
pub const OCF_READ_CURRENT_IAC_LAP: u16 = 0x0039;
pub const OCF_WRITE_CURRENT_IAC_LAP: u16 = 0x003A;
pub const OCF_SET_AFH_CLASSIFICATION: u16 = 0x003F;
pub const OCF_READ_INQUIRY_SCAN_TYPE: u16 = 0x0042;
pub const OCF_WRITE_INQUIRY_SCAN_TYPE: u16 = 0x0043;
pub const OCF_READ_INQUIRY_MODE: u16 = 0x0044;
pub const OCF_WRITE_INQUIRY_MODE: u16 = 0x0045;
pub const OCF_READ_AFH_MODE: u16 = 0x0048;
pub const OCF_WRITE_AFH_MODE: u16 = 0x0049;
pub const OCF_READ_EXT_INQUIRY_RESPONSE: u16 = 0x0051;
pub const OCF_WRITE_EXT_INQUIRY_RESPONSE: u16 = 0x0052;
pub const OCF_WRITE_SIMPLE_PAIRING_MODE: u16 = 0x0056;

// Informational parameters
pub const OGF_INFO_PARAM: u16 = 0x04;

pub const OCF_READ_LOCAL_VERSION: u16 = 0x0001;
pub const OCF_READ_LOCAL_COMMANDS: u16 = 0x0002;
pub const OCF_READ_LOCAL_FEATURES: u16 = 0x0003;
pub const OCF_READ_LOCAL_EXT_FEATURES: u16 = 0x0004;
pub const OCF_READ_BUFFER_SIZE: u16 = 0x0005;
pub const OCF_READ_COUNTRY_CODE: u16 = 0x0007;
pub const OCF_READ_BD_ADDR: u16 = 0x0009;

// Status parameters
pub const OGF_STATUS_PARAM: u16 = 0x05;

pub const OCF_READ_FAILED_CONTACT_COUNTER: u16 = 0x0001;
pub const OCF_RESET_FAILED_CONTACT_COUNTER: u16 = 0x0002;
pub const OCF_READ_LINK_QUALITY: u16 = 0x0003;
pub const OCF_READ_RSSI: u16 = 0x0005;
pub const OCF_READ_AFH_MAP: u16 = 0x0006;
pub const OCF_READ_CLOCK: u16 = 0x0007;

pub const OGF_LE_CTL: u16 = 0x08;
pub const OGF_TESTING_CMD: u16 = 0x3E;
pub const OGF_VENDOR_CMD: u16 = 0x3F;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_test() {
        assert_eq!(0x0401, pack_opcode(OGF_LINK_CTL, OCF_INQUIRY));

        assert_eq!(0x0419, pack_opcode(OGF_LINK_CTL, OCF_REMOTE_NAME_REQ));

        assert_eq!(0x0C28, pack_opcode(OGF_HOST_CTL, OCF_WRITE_AUTOMATIC_FLUSH_TIMEOUT));

        assert_eq!(0xFC00, pack_opcode(OGF_VENDOR_CMD, 0));

        // bits of the ocf beyond 10 are dropped
        assert_eq!(pack_opcode(OGF_HOST_CTL, 0x3), pack_opcode(OGF_HOST_CTL, 0x403));

        let pair = OpCodePair::from_opcode(0x2006);

        assert_eq!(OpCodePair::new(OGF_LE_CTL, 0x0006), pair);

        assert_eq!(0x2006, pair.into_opcode());
    }

    #[quickcheck_macros::quickcheck]
    fn unpack_inverts_pack(ogf: u16, ocf: u16) -> bool {
        let (ogf, ocf) = (ogf & 0x3F, ocf & 0x3FF);

        let opcode = pack_opcode(ogf, ocf);

        unpack_ogf(opcode) == ogf && unpack_ocf(opcode) == ocf
    }
}
