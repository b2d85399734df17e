//! Constants of the Linux Bluetooth sockets
//!
//! These are the values of the BlueZ kernel headers. The HCI opcodes and event codes along with
//! the SDP attribute IDs are re-exported here so that everything a socket user needs is in one
//! place.

pub use bluesock_hci::event::*;
pub use bluesock_hci::opcodes::*;
pub use bluesock_hci::{HCI_ACLDATA_PKT, HCI_COMMAND_PKT, HCI_EVENT_PKT, HCI_ISODATA_PKT, HCI_SCODATA_PKT, HCI_VENDOR_PKT};
pub use bluesock_sdp::attribute::*;

pub const AF_BLUETOOTH: i32 = nix::libc::AF_BLUETOOTH;

// Protocols
pub const BTPROTO_L2CAP: i32 = 0;
pub const BTPROTO_HCI: i32 = 1;
pub const BTPROTO_SCO: i32 = 2;
pub const BTPROTO_RFCOMM: i32 = 3;
pub const BTPROTO_BNEP: i32 = 4;
pub const BTPROTO_CMTP: i32 = 5;
pub const BTPROTO_HIDP: i32 = 6;
pub const BTPROTO_AVDTP: i32 = 7;

// Socket option levels
pub const SOL_HCI: i32 = 0;
pub const SOL_L2CAP: i32 = 6;
pub const SOL_SCO: i32 = 17;
pub const SOL_RFCOMM: i32 = 18;
pub const SOL_BLUETOOTH: i32 = 274;

// HCI socket options
pub const HCI_DATA_DIR: i32 = 1;
pub const HCI_FILTER: i32 = 2;
pub const HCI_TIME_STAMP: i32 = 3;

// HCI channels
pub const HCI_CHANNEL_RAW: u16 = 0;
pub const HCI_CHANNEL_USER: u16 = 1;
pub const HCI_CHANNEL_MONITOR: u16 = 2;
pub const HCI_CHANNEL_CONTROL: u16 = 3;

pub const HCI_DEV_NONE: u16 = 0xFFFF;
pub const HCI_MAX_DEV: usize = 16;

// L2CAP socket options
pub const L2CAP_OPTIONS: i32 = 0x01;
pub const L2CAP_CONNINFO: i32 = 0x02;
pub const L2CAP_LM: i32 = 0x03;

pub const L2CAP_LM_MASTER: i32 = 0x0001;
pub const L2CAP_LM_AUTH: i32 = 0x0002;
pub const L2CAP_LM_ENCRYPT: i32 = 0x0004;
pub const L2CAP_LM_TRUSTED: i32 = 0x0008;
pub const L2CAP_LM_RELIABLE: i32 = 0x0010;
pub const L2CAP_LM_SECURE: i32 = 0x0020;

pub const L2CAP_MODE_BASIC: u8 = 0x00;
pub const L2CAP_MODE_ERTM: u8 = 0x03;
pub const L2CAP_MODE_STREAMING: u8 = 0x04;

pub const L2CAP_DEFAULT_MTU: u16 = 672;
pub const L2CAP_MIN_MTU: u16 = 48;

// RFCOMM socket options
pub const RFCOMM_CONNINFO: i32 = 0x02;
pub const RFCOMM_LM: i32 = 0x03;

pub const RFCOMM_LM_MASTER: i32 = 0x0001;
pub const RFCOMM_LM_AUTH: i32 = 0x0002;
pub const RFCOMM_LM_ENCRYPT: i32 = 0x0004;
pub const RFCOMM_LM_TRUSTED: i32 = 0x0008;
pub const RFCOMM_LM_RELIABLE: i32 = 0x0010;
pub const RFCOMM_LM_SECURE: i32 = 0x0020;

// SCO socket options
pub const SCO_OPTIONS: i32 = 0x01;
pub const SCO_CONNINFO: i32 = 0x02;

// Bluetooth level socket options
pub const BT_SECURITY: i32 = 4;
pub const BT_DEFER_SETUP: i32 = 7;

pub const BT_SECURITY_SDP: u8 = 0;
pub const BT_SECURITY_LOW: u8 = 1;
pub const BT_SECURITY_MEDIUM: u8 = 2;
pub const BT_SECURITY_HIGH: u8 = 3;

// HCI device flags (these are bit positions)
pub const HCI_UP: u32 = 0;
pub const HCI_INIT: u32 = 1;
pub const HCI_RUNNING: u32 = 2;
pub const HCI_PSCAN: u32 = 3;
pub const HCI_ISCAN: u32 = 4;
pub const HCI_AUTH: u32 = 5;
pub const HCI_ENCRYPT: u32 = 6;
pub const HCI_INQUIRY: u32 = 7;
pub const HCI_RAW: u32 = 8;

// Scan modes
pub const SCAN_DISABLED: u32 = 0x00;
pub const SCAN_INQUIRY: u32 = 0x01;
pub const SCAN_PAGE: u32 = 0x02;

// ACL packet types
pub const HCI_DM1: u32 = 0x0008;
pub const HCI_DM3: u32 = 0x0400;
pub const HCI_DM5: u32 = 0x4000;
pub const HCI_DH1: u32 = 0x0010;
pub const HCI_DH3: u32 = 0x0800;
pub const HCI_DH5: u32 = 0x8000;

// SCO packet types
pub const HCI_HV1: u32 = 0x0020;
pub const HCI_HV2: u32 = 0x0040;
pub const HCI_HV3: u32 = 0x0080;

pub const ACL_PTYPE_MASK: u32 = HCI_DM1 | HCI_DH1 | HCI_DM3 | HCI_DH3 | HCI_DM5 | HCI_DH5;
pub const SCO_PTYPE_MASK: u32 = HCI_HV1 | HCI_HV2 | HCI_HV3;

// Link types
pub const SCO_LINK: u8 = 0x00;
pub const ACL_LINK: u8 = 0x01;
pub const ESCO_LINK: u8 = 0x02;

// Link policy
pub const HCI_LP_RSWITCH: u32 = 0x0001;
pub const HCI_LP_HOLD: u32 = 0x0002;
pub const HCI_LP_SNIFF: u32 = 0x0004;
pub const HCI_LP_PARK: u32 = 0x0008;

// Link mode
pub const HCI_LM_ACCEPT: u32 = 0x8000;
pub const HCI_LM_MASTER: u32 = 0x0001;
pub const HCI_LM_AUTH: u32 = 0x0002;
pub const HCI_LM_ENCRYPT: u32 = 0x0004;
pub const HCI_LM_TRUSTED: u32 = 0x0008;
pub const HCI_LM_RELIABLE: u32 = 0x0010;
pub const HCI_LM_SECURE: u32 = 0x0020;

// HCI ioctl numbers, the magic of each is 'H'
pub const HCI_IOC_MAGIC: u8 = b'H';

pub const HCIDEVUP: u8 = 201;
pub const HCIDEVDOWN: u8 = 202;
pub const HCIDEVRESET: u8 = 203;
pub const HCIDEVRESTAT: u8 = 204;
pub const HCIGETDEVLIST: u8 = 210;
pub const HCIGETDEVINFO: u8 = 211;
pub const HCIGETCONNLIST: u8 = 212;
pub const HCIGETCONNINFO: u8 = 213;
pub const HCIGETAUTHINFO: u8 = 215;
pub const HCISETRAW: u8 = 220;
pub const HCISETSCAN: u8 = 221;
pub const HCISETAUTH: u8 = 222;
pub const HCISETENCRYPT: u8 = 223;
pub const HCISETPTYPE: u8 = 224;
pub const HCISETLINKPOL: u8 = 225;
pub const HCISETLINKMODE: u8 = 226;
pub const HCISETACLMTU: u8 = 227;
pub const HCISETSCOMTU: u8 = 228;
pub const HCIBLOCKADDR: u8 = 230;
pub const HCIUNBLOCKADDR: u8 = 231;
pub const HCIINQUIRY: u8 = 240;

// Ports
pub const PSM_ANY: u16 = 0;
pub const CHANNEL_ANY: u8 = 0;

/// The default timeout of a remote name request in milliseconds
pub const REMOTE_NAME_TIMEOUT_MS: u64 = 5192;
