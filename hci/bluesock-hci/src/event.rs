//! HCI events
//!
//! Event codes and the parsing of the events used for device discovery. Packets handed to the
//! parsers here are as read from a raw HCI socket, so they begin with the packet indicator.

use crate::HciError;
use bluesock_core::BluetoothDeviceAddress;

pub const EVT_INQUIRY_COMPLETE: u8 = 0x01;
pub const EVT_INQUIRY_RESULT: u8 = 0x02;
pub const EVT_CONN_COMPLETE: u8 = 0x03;
pub const EVT_CONN_REQUEST: u8 = 0x04;
pub const EVT_DISCONN_COMPLETE: u8 = 0x05;
pub const EVT_AUTH_COMPLETE: u8 = 0x06;
pub const EVT_REMOTE_NAME_REQ_COMPLETE: u8 = 0x07;
pub const EVT_ENCRYPT_CHANGE: u8 = 0x08;
pub const EVT_CHANGE_CONN_LINK_KEY_COMPLETE: u8 = 0x09;
pub const EVT_MASTER_LINK_KEY_COMPLETE: u8 = 0x0A;
pub const EVT_READ_REMOTE_FEATURES_COMPLETE: u8 = 0x0B;
pub const EVT_READ_REMOTE_VERSION_COMPLETE: u8 = 0x0C;
pub const EVT_QOS_SETUP_COMPLETE: u8 = 0x0D;
pub const EVT_CMD_COMPLETE: u8 = 0x0E;
pub const EVT_CMD_STATUS: u8 = 0x0F;
pub const EVT_HARDWARE_ERROR: u8 = 0x10;
pub const EVT_FLUSH_OCCURRED: u8 = 0x11;
pub const EVT_ROLE_CHANGE: u8 = 0x12;
pub const EVT_NUM_COMP_PKTS: u8 = 0x13;
pub const EVT_MODE_CHANGE: u8 = 0x14;
pub const EVT_RETURN_LINK_KEYS: u8 = 0x15;
pub const EVT_PIN_CODE_REQ: u8 = 0x16;
pub const EVT_LINK_KEY_REQ: u8 = 0x17;
pub const EVT_LINK_KEY_NOTIFY: u8 = 0x18;
pub const EVT_LOOPBACK_COMMAND: u8 = 0x19;
pub const EVT_DATA_BUFFER_OVERFLOW: u8 = 0x1A;
pub const EVT_MAX_SLOTS_CHANGE: u8 = 0x1B;
pub const EVT_READ_CLOCK_OFFSET_COMPLETE: u8 = 0x1C;
pub const EVT_CONN_PTYPE_CHANGED: u8 = 0x1D;
pub const EVT_QOS_VIOLATION: u8 = 0x1E;
pub const EVT_PSCAN_REP_MODE_CHANGE: u8 = 0x20;
pub const EVT_FLOW_SPEC_COMPLETE: u8 = 0x21;
pub const EVT_INQUIRY_RESULT_WITH_RSSI: u8 = 0x22;
pub const EVT_READ_REMOTE_EXT_FEATURES_COMPLETE: u8 = 0x23;
pub const EVT_SYNC_CONN_COMPLETE: u8 = 0x2C;
pub const EVT_SYNC_CONN_CHANGED: u8 = 0x2D;
pub const EVT_SNIFF_SUBRATING: u8 = 0x2E;
pub const EVT_EXTENDED_INQUIRY_RESULT: u8 = 0x2F;
pub const EVT_ENCRYPTION_KEY_REFRESH_COMPLETE: u8 = 0x30;
pub const EVT_IO_CAPABILITY_REQUEST: u8 = 0x31;
pub const EVT_IO_CAPABILITY_RESPONSE: u8 = 0x32;
pub const EVT_USER_CONFIRM_REQUEST: u8 = 0x33;
pub const EVT_USER_PASSKEY_REQUEST: u8 = 0x34;
pub const EVT_REMOTE_OOB_DATA_REQUEST: u8 = 0x35;
pub const EVT_SIMPLE_PAIRING_COMPLETE: u8 = 0x36;
pub const EVT_LINK_SUPERVISION_TIMEOUT_CHANGED: u8 = 0x38;
pub const EVT_ENHANCED_FLUSH_COMPLETE: u8 = 0x39;
pub const EVT_USER_PASSKEY_NOTIFY: u8 = 0x3B;
pub const EVT_KEYPRESS_NOTIFY: u8 = 0x3C;
pub const EVT_REMOTE_HOST_FEATURES_NOTIFY: u8 = 0x3D;
pub const EVT_LE_META_EVENT: u8 = 0x3E;
pub const EVT_TESTING: u8 = 0xFE;
pub const EVT_VENDOR: u8 = 0xFF;

pub const HCI_EVENT_HDR_SIZE: usize = 2;
pub const EVT_CMD_COMPLETE_SIZE: usize = 3;
pub const EVT_CMD_STATUS_SIZE: usize = 4;
pub const EVT_REMOTE_NAME_REQ_COMPLETE_SIZE: usize = 255;

/// An event packet split into its code and parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventPacket<'a> {
    pub code: u8,
    pub parameters: &'a [u8],
}

impl<'a> EventPacket<'a> {
    /// Split a packet read from a HCI socket
    ///
    /// The packet must start with the event packet indicator. The parameter length is clamped to
    /// the bytes that were actually read.
    pub fn from_packet(packet: &'a [u8]) -> Result<Self, HciError> {
        match packet {
            [crate::HCI_EVENT_PKT, code, len, rest @ ..] => Ok(EventPacket {
                code: *code,
                parameters: &rest[..rest.len().min(usize::from(*len))],
            }),
            [crate::HCI_EVENT_PKT, ..] => Err(HciError::MalformedEvent("HCI")),
            _ => Err(HciError::NotAnEvent),
        }
    }
}

/// A device reported by an inquiry result event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InquiryResponse {
    pub address: BluetoothDeviceAddress,
    pub page_scan_repetition_mode: u8,
    pub page_scan_period_mode: u8,
    pub class_of_device: u32,
    pub clock_offset: u16,
    pub rssi: Option<i8>,
}

/// The events of interest while discovering devices
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InquiryEvent {
    Result(Vec<InquiryResponse>),
    Complete {
        status: u8,
    },
    CommandStatus {
        status: u8,
        num_packets: u8,
        opcode: u16,
    },
    RemoteNameComplete {
        status: u8,
        address: BluetoothDeviceAddress,
        name: String,
    },
    Other(u8),
}

impl InquiryEvent {
    /// Parse an event packet read from a HCI socket
    pub fn parse(packet: &[u8]) -> Result<Self, HciError> {
        let event = EventPacket::from_packet(packet)?;
        let p = event.parameters;

        match event.code {
            EVT_INQUIRY_RESULT => Self::parse_results(p, false),
            EVT_INQUIRY_RESULT_WITH_RSSI => Self::parse_results(p, true),
            EVT_INQUIRY_COMPLETE => match p.first() {
                Some(status) => Ok(InquiryEvent::Complete { status: *status }),
                None => Err(HciError::MalformedEvent("inquiry complete")),
            },
            EVT_CMD_STATUS => match p {
                [status, num_packets, lo, hi, ..] => Ok(InquiryEvent::CommandStatus {
                    status: *status,
                    num_packets: *num_packets,
                    opcode: u16::from_le_bytes([*lo, *hi]),
                }),
                _ => Err(HciError::MalformedEvent("command status")),
            },
            EVT_REMOTE_NAME_REQ_COMPLETE => {
                if p.len() < 7 {
                    return Err(HciError::MalformedEvent("remote name request complete"));
                }

                let address = BluetoothDeviceAddress::try_from_slice(&p[1..7])
                    .ok_or(HciError::MalformedEvent("remote name request complete"))?;

                Ok(InquiryEvent::RemoteNameComplete {
                    status: p[0],
                    address,
                    name: nul_terminated(&p[7..]),
                })
            }
            code => Ok(InquiryEvent::Other(code)),
        }
    }

    /// Parse the results of an inquiry result event
    ///
    /// The parameters of the event are arrays, each array containing one field for every
    /// response. The result with RSSI event has one less reserved field than the plain event and
    /// the RSSI at the end.
    fn parse_results(p: &[u8], with_rssi: bool) -> Result<Self, HciError> {
        let n = usize::from(*p.first().ok_or(HciError::MalformedEvent("inquiry result"))?);

        // both layouts add up to fourteen bytes for each response
        if p.len() < 1 + n * 14 {
            return Err(HciError::MalformedEvent("inquiry result"));
        }

        let (class_at, clock_at) = if with_rssi { (8 * n, 11 * n) } else { (9 * n, 12 * n) };

        let responses = (0..n)
            .map(|i| {
                let field = |offset: usize, size: usize| &p[1 + offset + size * i..1 + offset + size * (i + 1)];

                let class = field(class_at, 3);
                let clock = field(clock_at, 2);

                InquiryResponse {
                    address: BluetoothDeviceAddress::try_from_slice(field(0, 6)).unwrap_or_default(),
                    page_scan_repetition_mode: field(6 * n, 1)[0],
                    page_scan_period_mode: field(7 * n, 1)[0],
                    class_of_device: u32::from_le_bytes([class[0], class[1], class[2], 0]),
                    clock_offset: u16::from_le_bytes([clock[0], clock[1]]),
                    rssi: with_rssi.then(|| field(13 * n, 1)[0] as i8),
                }
            })
            .collect();

        Ok(InquiryEvent::Result(responses))
    }
}

/// Take the text before the first NUL
pub fn nul_terminated(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());

    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_packet_test() {
        let packet = [0x04, EVT_CMD_COMPLETE, 4, 1, 0x03, 0x0C, 0x00, 0xFF];

        let event = EventPacket::from_packet(&packet).unwrap();

        assert_eq!(EVT_CMD_COMPLETE, event.code);

        // the trailing byte is beyond the parameter length
        assert_eq!(&[1, 0x03, 0x0C, 0x00], event.parameters);

        assert_eq!(Err(HciError::NotAnEvent), EventPacket::from_packet(&[0x02, 0, 0]));

        assert!(EventPacket::from_packet(&[0x04, 0x0E]).is_err());
    }

    #[test]
    fn inquiry_result_test() {
        #[rustfmt::skip]
        let packet = [
            0x04, EVT_INQUIRY_RESULT, 29, 2,
            // addresses
            1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12,
            // page scan repetition mode
            1, 2,
            // page scan period mode
            0, 0,
            // reserved
            0, 0,
            // class of device
            0x0C, 0x01, 0x5A, 0x04, 0x02, 0x24,
            // clock offset
            0x34, 0x12, 0x78, 0x56,
        ];

        let InquiryEvent::Result(responses) = InquiryEvent::parse(&packet).unwrap() else {
            panic!("expected inquiry results")
        };

        assert_eq!(2, responses.len());

        assert_eq!("06:05:04:03:02:01", responses[0].address.to_string());

        assert_eq!("0C:0B:0A:09:08:07", responses[1].address.to_string());

        assert_eq!(2, responses[1].page_scan_repetition_mode);

        assert_eq!(0x5A010C, responses[0].class_of_device);

        assert_eq!(0x240204, responses[1].class_of_device);

        assert_eq!(0x5678, responses[1].clock_offset);

        assert_eq!(None, responses[0].rssi);
    }

    #[test]
    fn inquiry_result_with_rssi_test() {
        #[rustfmt::skip]
        let packet = [
            0x04, EVT_INQUIRY_RESULT_WITH_RSSI, 15, 1,
            1, 2, 3, 4, 5, 6,
            1,
            0,
            0x0C, 0x01, 0x5A,
            0x34, 0x12,
            0xC4,
        ];

        let InquiryEvent::Result(responses) = InquiryEvent::parse(&packet).unwrap() else {
            panic!("expected inquiry results")
        };

        assert_eq!(0x5A010C, responses[0].class_of_device);

        assert_eq!(0x1234, responses[0].clock_offset);

        assert_eq!(Some(-60), responses[0].rssi);

        // truncated
        assert!(InquiryEvent::parse(&packet[..10]).is_err());
    }

    #[test]
    fn remote_name_test() {
        let mut packet = vec![0x04, EVT_REMOTE_NAME_REQ_COMPLETE, 255, 0, 1, 2, 3, 4, 5, 6];

        packet.extend_from_slice(b"phone\0garbage");

        assert_eq!(
            Ok(InquiryEvent::RemoteNameComplete {
                status: 0,
                address: BluetoothDeviceAddress([1, 2, 3, 4, 5, 6]),
                name: "phone".to_string()
            }),
            InquiryEvent::parse(&packet)
        );
    }

    #[test]
    fn status_and_complete_test() {
        assert_eq!(
            Ok(InquiryEvent::CommandStatus {
                status: 0x0C,
                num_packets: 1,
                opcode: 0x0401
            }),
            InquiryEvent::parse(&[0x04, EVT_CMD_STATUS, 4, 0x0C, 1, 0x01, 0x04])
        );

        assert_eq!(
            Ok(InquiryEvent::Complete { status: 0 }),
            InquiryEvent::parse(&[0x04, EVT_INQUIRY_COMPLETE, 1, 0])
        );

        assert_eq!(
            Ok(InquiryEvent::Other(EVT_CONN_REQUEST)),
            InquiryEvent::parse(&[0x04, EVT_CONN_REQUEST, 0])
        );
    }
}
