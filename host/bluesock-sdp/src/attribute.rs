//! Attribute identifiers of a service record

pub const SERVICE_RECORD_HANDLE: u16 = 0x0000;
pub const SERVICE_CLASS_ID_LIST: u16 = 0x0001;
pub const SERVICE_RECORD_STATE: u16 = 0x0002;
pub const SERVICE_ID: u16 = 0x0003;
pub const PROTOCOL_DESCRIPTOR_LIST: u16 = 0x0004;
pub const BROWSE_GROUP_LIST: u16 = 0x0005;
pub const LANGUAGE_BASE_ATTRIBUTE_ID_LIST: u16 = 0x0006;
pub const SERVICE_INFO_TIME_TO_LIVE: u16 = 0x0007;
pub const SERVICE_AVAILABILITY: u16 = 0x0008;
pub const BLUETOOTH_PROFILE_DESCRIPTOR_LIST: u16 = 0x0009;
pub const DOCUMENTATION_URL: u16 = 0x000A;
pub const CLIENT_EXECUTABLE_URL: u16 = 0x000B;
pub const ICON_URL: u16 = 0x000C;
pub const ADDITIONAL_PROTOCOL_DESCRIPTOR_LISTS: u16 = 0x000D;

/// The attribute base of the primary language
///
/// The text attributes are offsets from a language base. Only the primary language is used here.
pub const PRIMARY_LANGUAGE_BASE: u16 = 0x0100;

pub const SERVICE_NAME_OFFSET: u16 = 0x0000;
pub const SERVICE_DESCRIPTION_OFFSET: u16 = 0x0001;
pub const PROVIDER_NAME_OFFSET: u16 = 0x0002;

pub const SERVICE_NAME: u16 = PRIMARY_LANGUAGE_BASE + SERVICE_NAME_OFFSET;
pub const SERVICE_DESCRIPTION: u16 = PRIMARY_LANGUAGE_BASE + SERVICE_DESCRIPTION_OFFSET;
pub const PROVIDER_NAME: u16 = PRIMARY_LANGUAGE_BASE + PROVIDER_NAME_OFFSET;

/// The attribute ID range covering every attribute
pub const ALL_ATTRIBUTES: u32 = 0x0000_FFFF;
