//! SDP protocol data units
//!
//! Every PDU starts with a five byte header of the PDU ID, the transaction ID, and the length of
//! the parameters that follow it. Everything within a PDU is big-endian.
//!
//! Along with the requests and responses of the Bluetooth specification, the BlueZ SDP server
//! accepts PDUs for registering records of the local device. Those are only accepted through the
//! server's Unix socket.

use crate::data_element::DataElement;
use crate::record::ServiceRecord;
use crate::{ErrorCode, SdpError};
use bluesock_core::Uuid;

pub const ERROR_RESPONSE: u8 = 0x01;
pub const SERVICE_SEARCH_REQUEST: u8 = 0x02;
pub const SERVICE_SEARCH_RESPONSE: u8 = 0x03;
pub const SERVICE_ATTRIBUTE_REQUEST: u8 = 0x04;
pub const SERVICE_ATTRIBUTE_RESPONSE: u8 = 0x05;
pub const SERVICE_SEARCH_ATTRIBUTE_REQUEST: u8 = 0x06;
pub const SERVICE_SEARCH_ATTRIBUTE_RESPONSE: u8 = 0x07;

pub const SERVICE_REGISTER_REQUEST: u8 = 0x75;
pub const SERVICE_REGISTER_RESPONSE: u8 = 0x76;
pub const SERVICE_UPDATE_REQUEST: u8 = 0x77;
pub const SERVICE_UPDATE_RESPONSE: u8 = 0x78;
pub const SERVICE_REMOVE_REQUEST: u8 = 0x79;
pub const SERVICE_REMOVE_RESPONSE: u8 = 0x80;

/// The maximum length of the continuation state
pub const MAX_CONTINUATION_LEN: usize = 16;

/// The maximum number of attribute bytes asked for within a single response
pub const MAX_ATTRIBUTE_BYTE_COUNT: u16 = 0xFFFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PduHeader {
    pub pdu_id: u8,
    pub transaction_id: u16,
    pub parameter_length: u16,
}

impl PduHeader {
    pub const SIZE: usize = 5;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let [t0, t1] = self.transaction_id.to_be_bytes();
        let [l0, l1] = self.parameter_length.to_be_bytes();

        [self.pdu_id, t0, t1, l0, l1]
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SdpError> {
        match bytes {
            [pdu_id, t0, t1, l0, l1, ..] => Ok(PduHeader {
                pdu_id: *pdu_id,
                transaction_id: u16::from_be_bytes([*t0, *t1]),
                parameter_length: u16::from_be_bytes([*l0, *l1]),
            }),
            _ => Err(SdpError::MalformedPdu("header")),
        }
    }
}

/// Create a complete PDU
pub fn encode(pdu_id: u8, transaction_id: u16, parameters: &[u8]) -> Result<Vec<u8>, SdpError> {
    let parameter_length = u16::try_from(parameters.len()).map_err(|_| SdpError::MalformedPdu("oversized"))?;

    let header = PduHeader {
        pdu_id,
        transaction_id,
        parameter_length,
    };

    let mut pdu = Vec::with_capacity(PduHeader::SIZE + parameters.len());

    pdu.extend_from_slice(&header.to_bytes());
    pdu.extend_from_slice(parameters);

    Ok(pdu)
}

/// Get the parameters of a response
///
/// An error response PDU is returned as [`SdpError::ErrorResponse`].
pub fn decode_response(pdu: &[u8], expected_pdu: u8, transaction_id: u16) -> Result<&[u8], SdpError> {
    let header = PduHeader::from_bytes(pdu)?;

    if header.transaction_id != transaction_id {
        return Err(SdpError::TransactionMismatch {
            expected: transaction_id,
            found: header.transaction_id,
        });
    }

    let parameters = pdu
        .get(PduHeader::SIZE..PduHeader::SIZE + usize::from(header.parameter_length))
        .ok_or(SdpError::MalformedPdu("truncated"))?;

    match header.pdu_id {
        ERROR_RESPONSE => match parameters {
            [hi, lo, ..] => Err(SdpError::ErrorResponse(u16::from_be_bytes([*hi, *lo]).into())),
            _ => Err(SdpError::MalformedPdu("error response")),
        },
        id if id == expected_pdu => Ok(parameters),
        id => Err(SdpError::UnexpectedPdu(id)),
    }
}

/// Create the parameters of an error response
pub fn error_response(code: ErrorCode) -> Vec<u8> {
    u16::from(code).to_be_bytes().to_vec()
}

fn push_continuation(out: &mut Vec<u8>, continuation: &[u8]) -> Result<(), SdpError> {
    if continuation.len() > MAX_CONTINUATION_LEN {
        return Err(SdpError::MalformedPdu("continuation state"));
    }

    out.push(continuation.len() as u8);
    out.extend_from_slice(continuation);

    Ok(())
}

/// Create the parameters of a service search attribute request for every attribute
pub fn service_search_attribute_request(uuids: &[Uuid], continuation: &[u8]) -> Result<Vec<u8>, SdpError> {
    let pattern = DataElement::Sequence(uuids.iter().copied().map(DataElement::Uuid).collect());

    let attribute_ranges = DataElement::Sequence(vec![DataElement::Uint32(crate::attribute::ALL_ATTRIBUTES)]);

    let mut parameters = pattern.to_bytes();

    parameters.extend_from_slice(&MAX_ATTRIBUTE_BYTE_COUNT.to_be_bytes());

    attribute_ranges.encode(&mut parameters);

    push_continuation(&mut parameters, continuation)?;

    Ok(parameters)
}

/// A part of the attribute lists returned by a service search attribute response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeListsPart<'a> {
    pub attribute_lists: &'a [u8],
    /// The continuation state to send with the next request, empty when this is the last part
    pub continuation: &'a [u8],
}

pub fn service_search_attribute_response(parameters: &[u8]) -> Result<AttributeListsPart<'_>, SdpError> {
    const MALFORMED: SdpError = SdpError::MalformedPdu("service search attribute response");

    let (count, rest) = match parameters {
        [hi, lo, rest @ ..] => (usize::from(u16::from_be_bytes([*hi, *lo])), rest),
        _ => return Err(MALFORMED),
    };

    if rest.len() <= count {
        return Err(MALFORMED);
    }

    let (attribute_lists, rest) = rest.split_at(count);

    let continuation_len = usize::from(rest[0]);

    if continuation_len > MAX_CONTINUATION_LEN {
        return Err(MALFORMED);
    }

    let continuation = rest.get(1..1 + continuation_len).ok_or(MALFORMED)?;

    Ok(AttributeListsPart {
        attribute_lists,
        continuation,
    })
}

/// Parse the complete attribute lists of a service search attribute response into records
pub fn parse_attribute_lists(attribute_lists: &[u8]) -> Result<Vec<ServiceRecord>, SdpError> {
    if attribute_lists.is_empty() {
        return Ok(Vec::new());
    }

    let (lists, _) = DataElement::decode(attribute_lists)?;

    match lists {
        DataElement::Sequence(records) => records.iter().map(ServiceRecord::from_element).collect(),
        _ => Err(SdpError::MalformedElement("attribute lists is not a sequence")),
    }
}

/// Create the parameters of a request to register a record for the local device
pub fn register_request(record: &ServiceRecord) -> Vec<u8> {
    // flags, no device specific or update flags are used
    let mut parameters = vec![0u8];

    parameters.extend_from_slice(&record.to_pdu_bytes());

    parameters
}

/// Get the handle assigned to a registered record
pub fn register_response(parameters: &[u8]) -> Result<u32, SdpError> {
    match parameters {
        [b0, b1, b2, b3, ..] => Ok(u32::from_be_bytes([*b0, *b1, *b2, *b3])),
        _ => Err(SdpError::MalformedPdu("register response")),
    }
}

pub fn remove_request(handle: u32) -> Vec<u8> {
    handle.to_be_bytes().to_vec()
}

/// Check the status of a remove response
pub fn remove_response(parameters: &[u8]) -> Result<(), SdpError> {
    match parameters {
        [] | [0, 0, ..] => Ok(()),
        [hi, lo, ..] => Err(SdpError::ErrorResponse(u16::from_be_bytes([*hi, *lo]).into())),
        _ => Err(SdpError::MalformedPdu("remove response")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_test() {
        let pdu = encode(SERVICE_SEARCH_ATTRIBUTE_REQUEST, 0x0102, &[0xAA; 3]).unwrap();

        assert_eq!(vec![0x06, 0x01, 0x02, 0x00, 0x03, 0xAA, 0xAA, 0xAA], pdu);

        assert_eq!(
            PduHeader {
                pdu_id: 0x06,
                transaction_id: 0x0102,
                parameter_length: 3
            },
            PduHeader::from_bytes(&pdu).unwrap()
        );

        assert!(PduHeader::from_bytes(&pdu[..4]).is_err());

        assert!(encode(0x06, 0, &vec![0; 0x10000]).is_err());
    }

    #[test]
    fn decode_response_test() {
        let pdu = encode(SERVICE_REGISTER_RESPONSE, 7, &[0, 1, 0, 4]).unwrap();

        assert_eq!(Ok(&[0u8, 1, 0, 4][..]), decode_response(&pdu, SERVICE_REGISTER_RESPONSE, 7).map_err(|_| ()));

        assert!(matches!(
            decode_response(&pdu, SERVICE_REGISTER_RESPONSE, 8),
            Err(SdpError::TransactionMismatch { expected: 8, found: 7 })
        ));

        assert!(matches!(
            decode_response(&pdu, SERVICE_REMOVE_RESPONSE, 7),
            Err(SdpError::UnexpectedPdu(SERVICE_REGISTER_RESPONSE))
        ));

        let error = encode(ERROR_RESPONSE, 7, &error_response(ErrorCode::InvalidRecordHandle)).unwrap();

        assert!(matches!(
            decode_response(&error, SERVICE_REMOVE_RESPONSE, 7),
            Err(SdpError::ErrorResponse(ErrorCode::InvalidRecordHandle))
        ));

        // parameter length longer than the PDU
        assert!(decode_response(&[0x76, 0, 7, 0, 9, 0], SERVICE_REGISTER_RESPONSE, 7).is_err());
    }

    #[test]
    fn search_attribute_request_test() {
        let parameters = service_search_attribute_request(&[Uuid::PUBLIC_BROWSE_GROUP], &[]).unwrap();

        assert_eq!(
            vec![
                0x35, 0x03, 0x19, 0x10, 0x02, // pattern
                0xFF, 0xFF, // maximum byte count
                0x35, 0x05, 0x0A, 0x00, 0x00, 0xFF, 0xFF, // attribute range
                0x00, // continuation
            ],
            parameters
        );

        let continued = service_search_attribute_request(&[Uuid::SERIAL_PORT], &[1, 2]).unwrap();

        assert_eq!([2, 1, 2], continued[continued.len() - 3..]);

        assert!(service_search_attribute_request(&[Uuid::SERIAL_PORT], &[0; 17]).is_err());
    }

    #[test]
    fn search_attribute_response_test() {
        let parameters = [0x00, 0x02, 0x35, 0x00, 0x02, 0xAB, 0xCD];

        let part = service_search_attribute_response(&parameters).unwrap();

        assert_eq!(&[0x35, 0x00], part.attribute_lists);

        assert_eq!(&[0xAB, 0xCD], part.continuation);

        // missing continuation byte
        assert!(service_search_attribute_response(&[0x00, 0x01, 0x35]).is_err());

        // continuation longer than the parameters
        assert!(service_search_attribute_response(&[0x00, 0x00, 0x04, 0x01]).is_err());
    }

    #[test]
    fn attribute_lists_test() {
        let mut record = ServiceRecord::new();

        record.set_handle(0x10000);
        record.set_service_classes(&[Uuid::SERIAL_PORT]);

        let lists = DataElement::Sequence(vec![record.to_element(), ServiceRecord::new().to_element()]);

        let records = parse_attribute_lists(&lists.to_bytes()).unwrap();

        assert_eq!(2, records.len());

        assert_eq!(record, records[0]);

        assert!(parse_attribute_lists(&[]).unwrap().is_empty());

        assert!(parse_attribute_lists(&DataElement::Uint8(1).to_bytes()).is_err());
    }

    #[test]
    fn register_test() {
        let mut record = ServiceRecord::new();

        record.set_service_classes(&[Uuid::SERIAL_PORT]);

        let parameters = register_request(&record);

        assert_eq!(0, parameters[0]);

        assert_eq!(record.to_pdu_bytes(), parameters[1..]);

        assert_eq!(0x0001_0005, register_response(&[0, 1, 0, 5]).unwrap());

        assert!(register_response(&[0, 1]).is_err());

        assert_eq!(vec![0, 1, 0, 5], remove_request(0x0001_0005));

        assert!(remove_response(&[0, 0]).is_ok());

        assert!(matches!(
            remove_response(&[0, 2]),
            Err(SdpError::ErrorResponse(ErrorCode::InvalidRecordHandle))
        ));
    }
}
