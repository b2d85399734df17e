//! HCI command framing and the matching of responses
//!
//! A request is a command sent to the controller followed by a wait for the event that carries
//! its response. The controller gives no indication of how large the response is, so the caller
//! sizes it up front. [`ResponseMatcher`] is fed every event packet read from the socket until it
//! finds the response.

use crate::event::{
    EventPacket, EVT_CMD_COMPLETE, EVT_CMD_COMPLETE_SIZE, EVT_CMD_STATUS, EVT_LE_META_EVENT,
    EVT_REMOTE_NAME_REQ_COMPLETE,
};
use crate::filter::HciFilter;
use crate::opcodes::pack_opcode;
use crate::{HciError, HCI_COMMAND_PKT, HCI_EVENT_PKT};

/// The maximum size of the parameters of a command
pub const MAX_PARAMETER_LEN: usize = 255;

/// The number of unmatched packets read before a request gives up
pub const REQUEST_TRIES: usize = 10;

/// Create the packet for a command
///
/// The packet is prefixed with the command packet indicator as expected by a HCI socket.
pub fn command_packet(ogf: u16, ocf: u16, parameters: &[u8]) -> Result<Vec<u8>, HciError> {
    let len = u8::try_from(parameters.len()).map_err(|_| HciError::ParametersTooLong(parameters.len()))?;

    let mut packet = Vec::with_capacity(4 + parameters.len());

    packet.push(HCI_COMMAND_PKT);
    packet.extend_from_slice(&pack_opcode(ogf, ocf).to_le_bytes());
    packet.push(len);
    packet.extend_from_slice(parameters);

    Ok(packet)
}

/// A command along with the event that carries its response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub ogf: u16,
    pub ocf: u16,
    pub event: u8,
    pub response_len: usize,
    pub parameters: Vec<u8>,
}

impl Request {
    pub fn new(ogf: u16, ocf: u16, event: u8, response_len: usize, parameters: &[u8]) -> Self {
        Request {
            ogf,
            ocf,
            event,
            response_len,
            parameters: parameters.to_vec(),
        }
    }

    pub fn opcode(&self) -> u16 {
        pack_opcode(self.ogf, self.ocf)
    }

    pub fn packet(&self) -> Result<Vec<u8>, HciError> {
        command_packet(self.ogf, self.ocf, &self.parameters)
    }

    /// Get the socket filter that lets through the events for this request
    pub fn filter(&self) -> HciFilter {
        let mut filter = HciFilter::new();

        filter.set_packet_type(HCI_EVENT_PKT);
        filter.set_event(EVT_CMD_STATUS);
        filter.set_event(EVT_CMD_COMPLETE);
        filter.set_event(EVT_LE_META_EVENT);
        filter.set_event(self.event);
        filter.set_opcode(self.opcode());

        filter
    }

    pub fn matcher(&self) -> ResponseMatcher {
        ResponseMatcher {
            opcode: self.opcode(),
            event: self.event,
            response_len: self.response_len,
            address: self.parameters.get(..6).map(|a| {
                let mut address = [0u8; 6];
                address.copy_from_slice(a);
                address
            }),
            tries: REQUEST_TRIES,
        }
    }
}

/// The outcome of offering an event packet to a [`ResponseMatcher`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Match {
    /// The packet was not the response, keep reading
    Pending,
    /// The response parameters truncated to the response length
    Complete(Vec<u8>),
    /// The controller refused the command with this status
    Failed(u8),
}

/// Matches event packets against a [`Request`]
#[derive(Clone, Debug)]
pub struct ResponseMatcher {
    opcode: u16,
    event: u8,
    response_len: usize,
    address: Option<[u8; 6]>,
    tries: usize,
}

impl ResponseMatcher {
    /// Check if the number of packets that can be offered has run out
    pub fn is_exhausted(&self) -> bool {
        self.tries == 0
    }

    /// Offer an event packet read from the socket
    ///
    /// Packets that cannot be parsed as an event are treated as not matching.
    pub fn offer(&mut self, packet: &[u8]) -> Match {
        self.tries = self.tries.saturating_sub(1);

        let event = match EventPacket::from_packet(packet) {
            Ok(event) => event,
            Err(e) => {
                log::trace!("ignoring packet while waiting for a response: {}", e);
                return Match::Pending;
            }
        };

        let p = event.parameters;

        match event.code {
            EVT_CMD_STATUS => match p {
                [status, _, lo, hi, ..] if u16::from_le_bytes([*lo, *hi]) == self.opcode => {
                    if self.event == EVT_CMD_STATUS {
                        self.complete(p)
                    } else if *status != 0 {
                        Match::Failed(*status)
                    } else {
                        // the command is pending, the response comes with a later event
                        Match::Pending
                    }
                }
                _ => Match::Pending,
            },
            EVT_CMD_COMPLETE => match p {
                [_, lo, hi, ..] if u16::from_le_bytes([*lo, *hi]) == self.opcode => {
                    self.complete(&p[EVT_CMD_COMPLETE_SIZE..])
                }
                _ => Match::Pending,
            },
            EVT_REMOTE_NAME_REQ_COMPLETE if event.code == self.event => match (p.get(1..7), self.address) {
                (Some(address), Some(expected)) if address == expected => self.complete(p),
                _ => Match::Pending,
            },
            EVT_LE_META_EVENT => match p.split_first() {
                Some((sub_event, data)) if *sub_event == self.event => self.complete(data),
                _ => Match::Pending,
            },
            code if code == self.event => self.complete(p),
            _ => Match::Pending,
        }
    }

    fn complete(&self, data: &[u8]) -> Match {
        Match::Complete(data[..data.len().min(self.response_len)].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EVT_INQUIRY_COMPLETE;
    use crate::opcodes::*;

    #[test]
    fn command_packet_test() {
        assert_eq!(
            vec![0x01, 0x03, 0x0C, 0x00],
            command_packet(OGF_HOST_CTL, OCF_RESET, &[]).unwrap()
        );

        assert_eq!(
            vec![0x01, 0x01, 0x04, 0x05, 0x33, 0x8B, 0x9E, 0x08, 0x00],
            command_packet(OGF_LINK_CTL, OCF_INQUIRY, &[0x33, 0x8B, 0x9E, 0x08, 0x00]).unwrap()
        );

        assert_eq!(
            Err(HciError::ParametersTooLong(256)),
            command_packet(OGF_LINK_CTL, OCF_INQUIRY, &[0; 256])
        );
    }

    #[test]
    fn request_filter_test() {
        let request = Request::new(OGF_HOST_CTL, OCF_READ_LOCAL_NAME, EVT_CMD_COMPLETE, 249, &[]);

        let filter = request.filter();

        assert!(filter.test_packet_type(HCI_EVENT_PKT));

        assert!(filter.test_event(EVT_CMD_STATUS));

        assert!(filter.test_event(EVT_CMD_COMPLETE));

        assert!(!filter.test_event(EVT_INQUIRY_COMPLETE));

        assert!(filter.test_opcode(0x0C14));
    }

    #[test]
    fn command_complete_test() {
        let request = Request::new(OGF_HOST_CTL, OCF_READ_AUTOMATIC_FLUSH_TIMEOUT, EVT_CMD_COMPLETE, 5, &[1, 0]);

        let mut matcher = request.matcher();

        // complete for a different opcode
        assert_eq!(Match::Pending, matcher.offer(&[0x04, 0x0E, 4, 1, 0x03, 0x0C, 0]));

        // not an event
        assert_eq!(Match::Pending, matcher.offer(&[0x02, 0, 0]));

        assert_eq!(
            Match::Complete(vec![0, 1, 0, 0x10, 0x00]),
            matcher.offer(&[0x04, 0x0E, 9, 1, 0x27, 0x0C, 0, 1, 0, 0x10, 0x00, 0xFF])
        );
    }

    #[test]
    fn command_status_test() {
        let request = Request::new(OGF_LINK_CTL, OCF_INQUIRY, EVT_INQUIRY_COMPLETE, 1, &[]);

        let mut matcher = request.matcher();

        assert_eq!(Match::Pending, matcher.offer(&[0x04, 0x0F, 4, 0, 1, 0x01, 0x04]));

        assert_eq!(Match::Failed(0x0C), matcher.offer(&[0x04, 0x0F, 4, 0x0C, 1, 0x01, 0x04]));

        assert_eq!(Match::Complete(vec![0]), matcher.offer(&[0x04, EVT_INQUIRY_COMPLETE, 1, 0]));

        let status_request = Request::new(OGF_LINK_CTL, OCF_INQUIRY, EVT_CMD_STATUS, 4, &[]);

        assert_eq!(
            Match::Complete(vec![0, 1, 0x01, 0x04]),
            status_request.matcher().offer(&[0x04, 0x0F, 4, 0, 1, 0x01, 0x04])
        );
    }

    #[test]
    fn remote_name_test() {
        let mut parameters = vec![1, 2, 3, 4, 5, 6];

        parameters.extend_from_slice(&[0x02, 0, 0, 0]);

        let request = Request::new(
            OGF_LINK_CTL,
            OCF_REMOTE_NAME_REQ,
            EVT_REMOTE_NAME_REQ_COMPLETE,
            255,
            &parameters,
        );

        let mut matcher = request.matcher();

        // name for another device
        assert_eq!(
            Match::Pending,
            matcher.offer(&[0x04, 0x07, 10, 0, 9, 9, 9, 9, 9, 9, b'x', b'y', 0])
        );

        assert_eq!(
            Match::Complete(vec![0, 1, 2, 3, 4, 5, 6, b'a', 0]),
            matcher.offer(&[0x04, 0x07, 9, 0, 1, 2, 3, 4, 5, 6, b'a', 0])
        );
    }

    #[test]
    fn le_meta_test() {
        let request = Request::new(OGF_LE_CTL, 0x000D, 0x0A, 3, &[]);

        let mut matcher = request.matcher();

        assert_eq!(Match::Pending, matcher.offer(&[0x04, 0x3E, 3, 0x01, 0, 0]));

        assert_eq!(
            Match::Complete(vec![0, 0x40, 0]),
            matcher.offer(&[0x04, 0x3E, 5, 0x0A, 0, 0x40, 0, 0])
        );
    }

    #[test]
    fn exhausted_test() {
        let request = Request::new(OGF_HOST_CTL, OCF_RESET, EVT_CMD_COMPLETE, 1, &[]);

        let mut matcher = request.matcher();

        for _ in 0..REQUEST_TRIES {
            assert!(!matcher.is_exhausted());

            matcher.offer(&[0x04, EVT_INQUIRY_COMPLETE, 1, 0]);
        }

        assert!(matcher.is_exhausted());
    }
}
