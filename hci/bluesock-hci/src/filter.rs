//! The HCI socket filter
//!
//! A raw HCI socket only passes the packets that match its filter. The filter is a bit mask of
//! the packet types, a bit mask of the event codes, and an opcode for matching command complete
//! and command status events. The kernel takes the filter as the `struct hci_filter` bytes given
//! to the `HCI_FILTER` socket option.
//!
//! [`HciFilter`] is the typed form. The free functions within [`raw`] work on a buffer of the
//! kernel layout (such as one returned by reading the socket option) and refuse any buffer that is
//! not exactly [`HCI_FILTER_SIZE`] bytes.

/// The size of `struct hci_filter`
///
/// The structure is a `u32` type mask, two `u32` event mask words, and a `u16` opcode, padded out
/// to the alignment of the `u32` fields.
pub const HCI_FILTER_SIZE: usize = 16;

const HCI_FLT_TYPE_BITS: u8 = 31;
const HCI_FLT_EVENT_BITS: u8 = 63;

/// Error for a filter buffer that is not [`HCI_FILTER_SIZE`] bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("bad filter: expected a buffer of {HCI_FILTER_SIZE} bytes, found {0}")]
pub struct FilterSizeError(pub usize);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciFilter {
    /// Create a filter that passes nothing
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default()
    }

    pub fn all_packet_types(&mut self) {
        self.type_mask = !0;
    }

    pub fn all_events(&mut self) {
        self.event_mask = [!0; 2];
    }

    /// Set the bit for a packet type indicator
    ///
    /// The vendor packet type (0xFF) shares bit zero.
    pub fn set_packet_type(&mut self, packet_type: u8) {
        self.type_mask |= 1 << Self::type_bit(packet_type);
    }

    pub fn clear_packet_type(&mut self, packet_type: u8) {
        self.type_mask &= !(1 << Self::type_bit(packet_type));
    }

    pub fn test_packet_type(&self, packet_type: u8) -> bool {
        self.type_mask & (1 << Self::type_bit(packet_type)) != 0
    }

    pub fn set_event(&mut self, event: u8) {
        let (word, bit) = Self::event_bit(event);

        self.event_mask[word] |= 1 << bit;
    }

    pub fn clear_event(&mut self, event: u8) {
        let (word, bit) = Self::event_bit(event);

        self.event_mask[word] &= !(1 << bit);
    }

    pub fn test_event(&self, event: u8) -> bool {
        let (word, bit) = Self::event_bit(event);

        self.event_mask[word] & (1 << bit) != 0
    }

    pub fn set_opcode(&mut self, opcode: u16) {
        self.opcode = opcode;
    }

    pub fn clear_opcode(&mut self) {
        self.opcode = 0;
    }

    pub fn test_opcode(&self, opcode: u16) -> bool {
        self.opcode == opcode
    }

    /// Get the filter in the kernel's `struct hci_filter` layout
    pub fn to_bytes(&self) -> [u8; HCI_FILTER_SIZE] {
        let mut bytes = [0u8; HCI_FILTER_SIZE];

        bytes[0..4].copy_from_slice(&self.type_mask.to_ne_bytes());
        bytes[4..8].copy_from_slice(&self.event_mask[0].to_ne_bytes());
        bytes[8..12].copy_from_slice(&self.event_mask[1].to_ne_bytes());
        bytes[12..14].copy_from_slice(&self.opcode.to_le_bytes());

        bytes
    }

    /// Create a filter from the kernel's `struct hci_filter` layout
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FilterSizeError> {
        if bytes.len() != HCI_FILTER_SIZE {
            return Err(FilterSizeError(bytes.len()));
        }

        let word = |at: usize| u32::from_ne_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        Ok(HciFilter {
            type_mask: word(0),
            event_mask: [word(4), word(8)],
            opcode: u16::from_le_bytes([bytes[12], bytes[13]]),
        })
    }

    fn type_bit(packet_type: u8) -> u32 {
        if packet_type == crate::HCI_VENDOR_PKT {
            0
        } else {
            (packet_type & HCI_FLT_TYPE_BITS).into()
        }
    }

    fn event_bit(event: u8) -> (usize, u32) {
        let bit = event & HCI_FLT_EVENT_BITS;

        ((bit >> 5).into(), (bit & 31).into())
    }
}

/// Filter operations over a buffer in the kernel layout
///
/// Every function checks the length of the buffer before anything is changed, a buffer of the
/// wrong size is returned with an error and left untouched.
pub mod raw {
    use super::{FilterSizeError, HciFilter, HCI_FILTER_SIZE};

    /// Create a new (empty) filter buffer
    pub fn new() -> [u8; HCI_FILTER_SIZE] {
        HciFilter::new().to_bytes()
    }

    fn modify<F>(buffer: &mut [u8], f: F) -> Result<(), FilterSizeError>
    where
        F: FnOnce(&mut HciFilter),
    {
        let mut filter = HciFilter::from_bytes(buffer)?;

        f(&mut filter);

        buffer.copy_from_slice(&filter.to_bytes());

        Ok(())
    }

    pub fn clear(buffer: &mut [u8]) -> Result<(), FilterSizeError> {
        modify(buffer, HciFilter::clear)
    }

    pub fn all_packet_types(buffer: &mut [u8]) -> Result<(), FilterSizeError> {
        modify(buffer, HciFilter::all_packet_types)
    }

    pub fn all_events(buffer: &mut [u8]) -> Result<(), FilterSizeError> {
        modify(buffer, HciFilter::all_events)
    }

    pub fn set_packet_type(buffer: &mut [u8], packet_type: u8) -> Result<(), FilterSizeError> {
        modify(buffer, |f| f.set_packet_type(packet_type))
    }

    pub fn clear_packet_type(buffer: &mut [u8], packet_type: u8) -> Result<(), FilterSizeError> {
        modify(buffer, |f| f.clear_packet_type(packet_type))
    }

    pub fn test_packet_type(buffer: &[u8], packet_type: u8) -> Result<bool, FilterSizeError> {
        HciFilter::from_bytes(buffer).map(|f| f.test_packet_type(packet_type))
    }

    pub fn set_event(buffer: &mut [u8], event: u8) -> Result<(), FilterSizeError> {
        modify(buffer, |f| f.set_event(event))
    }

    pub fn clear_event(buffer: &mut [u8], event: u8) -> Result<(), FilterSizeError> {
        modify(buffer, |f| f.clear_event(event))
    }

    pub fn test_event(buffer: &[u8], event: u8) -> Result<bool, FilterSizeError> {
        HciFilter::from_bytes(buffer).map(|f| f.test_event(event))
    }

    pub fn set_opcode(buffer: &mut [u8], opcode: u16) -> Result<(), FilterSizeError> {
        modify(buffer, |f| f.set_opcode(opcode))
    }

    pub fn clear_opcode(buffer: &mut [u8]) -> Result<(), FilterSizeError> {
        modify(buffer, HciFilter::clear_opcode)
    }

    pub fn test_opcode(buffer: &[u8], opcode: u16) -> Result<bool, FilterSizeError> {
        HciFilter::from_bytes(buffer).map(|f| f.test_opcode(opcode))
    }
}
