//! The buffer of the kernel's inquiry request
//!
//! The `HCIINQUIRY` ioctl takes a `struct hci_inquiry_req` directly followed by space for the
//! `inquiry_info` of every response. The kernel writes the number of responses back into the
//! request header.

use bluesock_core::BluetoothDeviceAddress;

/// The general inquiry access code (0x9E8B33)
pub const GIAC_LAP: [u8; 3] = [0x33, 0x8B, 0x9E];

/// The limited inquiry access code (0x9E8B00)
pub const LIAC_LAP: [u8; 3] = [0x00, 0x8B, 0x9E];

/// The number of responses the request buffer has room for
pub const MAX_RESPONSES: usize = 250;

/// Flag to have the kernel flush its inquiry cache before the inquiry
pub const IREQ_CACHE_FLUSH: u16 = 0x0001;

/// `sizeof(struct hci_inquiry_req)`
pub const INQUIRY_REQ_SIZE: usize = 10;

/// `sizeof(inquiry_info)`
pub const INQUIRY_INFO_SIZE: usize = 14;

/// An inquiry request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InquiryRequest {
    pub dev_id: u16,
    pub flags: u16,
    pub lap: [u8; 3],
    /// The length of the inquiry in units of 1.28 seconds
    pub length: u8,
    pub max_responses: u8,
}

impl InquiryRequest {
    /// Create a general inquiry request
    pub fn new(dev_id: u16, length: u8, flush_cache: bool) -> Self {
        InquiryRequest {
            dev_id,
            flags: if flush_cache { IREQ_CACHE_FLUSH } else { 0 },
            lap: GIAC_LAP,
            length,
            max_responses: MAX_RESPONSES as u8,
        }
    }

    /// Create the buffer handed to the ioctl
    pub fn to_buffer(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; INQUIRY_REQ_SIZE + MAX_RESPONSES * INQUIRY_INFO_SIZE];

        buffer[0..2].copy_from_slice(&self.dev_id.to_ne_bytes());
        buffer[2..4].copy_from_slice(&self.flags.to_ne_bytes());
        buffer[4..7].copy_from_slice(&self.lap);
        buffer[7] = self.length;
        buffer[8] = self.max_responses;

        buffer
    }
}

/// An `inquiry_info` returned by the kernel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InquiryInfo {
    pub address: BluetoothDeviceAddress,
    pub page_scan_repetition_mode: u8,
    pub page_scan_period_mode: u8,
    pub page_scan_mode: u8,
    pub class_of_device: u32,
    pub clock_offset: u16,
}

impl InquiryInfo {
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let address = BluetoothDeviceAddress::try_from_slice(bytes)?;

        match bytes.get(6..INQUIRY_INFO_SIZE)? {
            [rep, period, mode, c0, c1, c2, lo, hi] => Some(InquiryInfo {
                address,
                page_scan_repetition_mode: *rep,
                page_scan_period_mode: *period,
                page_scan_mode: *mode,
                class_of_device: u32::from_le_bytes([*c0, *c1, *c2, 0]),
                clock_offset: u16::from_le_bytes([*lo, *hi]),
            }),
            _ => None,
        }
    }
}

/// Read the responses out of a buffer filled in by the kernel
///
/// Responses are in the order the kernel returned them.
pub fn parse_responses(buffer: &[u8]) -> Vec<InquiryInfo> {
    let count = buffer.get(8).copied().map(usize::from).unwrap_or_default();

    buffer
        .get(INQUIRY_REQ_SIZE..)
        .unwrap_or_default()
        .chunks_exact(INQUIRY_INFO_SIZE)
        .take(count)
        .filter_map(InquiryInfo::from_bytes)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_buffer_test() {
        let buffer = InquiryRequest::new(1, 8, true).to_buffer();

        assert_eq!(INQUIRY_REQ_SIZE + 250 * INQUIRY_INFO_SIZE, buffer.len());

        assert_eq!(1u16.to_ne_bytes(), buffer[0..2]);

        assert_eq!(IREQ_CACHE_FLUSH.to_ne_bytes(), buffer[2..4]);

        assert_eq!([0x33, 0x8B, 0x9E, 8, 250], buffer[4..9]);

        assert_eq!(0, InquiryRequest::new(0, 8, false).flags);
    }

    #[test]
    fn parse_responses_test() {
        let mut buffer = InquiryRequest::new(0, 8, true).to_buffer();

        // the kernel overwrites the number of responses
        buffer[8] = 2;

        let first = &mut buffer[INQUIRY_REQ_SIZE..INQUIRY_REQ_SIZE + INQUIRY_INFO_SIZE];
        first.copy_from_slice(&[1, 2, 3, 4, 5, 6, 1, 0, 0, 0x0C, 0x01, 0x5A, 0x34, 0x12]);

        let second = &mut buffer[INQUIRY_REQ_SIZE + INQUIRY_INFO_SIZE..INQUIRY_REQ_SIZE + 2 * INQUIRY_INFO_SIZE];
        second.copy_from_slice(&[6, 5, 4, 3, 2, 1, 0, 0, 0, 0, 0, 0, 0, 0]);

        let responses = parse_responses(&buffer);

        assert_eq!(2, responses.len());

        assert_eq!("06:05:04:03:02:01", responses[0].address.to_string());

        assert_eq!(0x5A010C, responses[0].class_of_device);

        assert_eq!(0x1234, responses[0].clock_offset);

        assert_eq!("01:02:03:04:05:06", responses[1].address.to_string());

        assert!(parse_responses(&buffer[..4]).is_empty());
    }
}
