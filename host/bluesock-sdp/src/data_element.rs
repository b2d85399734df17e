//! SDP data elements
//!
//! A data element is a one byte header (a five bit type descriptor and a three bit size index)
//! followed by the data. Sequences and alternatives contain further data elements, so an
//! attribute value is a tree. All multi-byte values are big-endian.

use crate::SdpError;
use bluesock_core::Uuid;

const TYPE_NIL: u8 = 0;
const TYPE_UINT: u8 = 1;
const TYPE_INT: u8 = 2;
const TYPE_UUID: u8 = 3;
const TYPE_TEXT: u8 = 4;
const TYPE_BOOL: u8 = 5;
const TYPE_SEQUENCE: u8 = 6;
const TYPE_ALTERNATIVE: u8 = 7;
const TYPE_URL: u8 = 8;

const SIZE_U8_LEN: u8 = 5;
const SIZE_U16_LEN: u8 = 6;
const SIZE_U32_LEN: u8 = 7;

/// Nesting deeper than this is refused when decoding
const MAX_DEPTH: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataElement {
    Nil,
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Uint128(u128),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128(i128),
    Uuid(Uuid),
    Text(String),
    Bool(bool),
    Sequence(Vec<DataElement>),
    Alternative(Vec<DataElement>),
    Url(String),
}

impl DataElement {
    /// Get the value of an unsigned integer element
    pub fn as_uint(&self) -> Option<u128> {
        match *self {
            DataElement::Uint8(v) => Some(v.into()),
            DataElement::Uint16(v) => Some(v.into()),
            DataElement::Uint32(v) => Some(v.into()),
            DataElement::Uint64(v) => Some(v.into()),
            DataElement::Uint128(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            DataElement::Uuid(uuid) => Some(*uuid),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DataElement::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Get the elements of a sequence or alternative
    pub fn as_list(&self) -> Option<&[DataElement]> {
        match self {
            DataElement::Sequence(list) | DataElement::Alternative(list) => Some(list),
            _ => None,
        }
    }

    /// Encode this element onto the end of `out`
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            DataElement::Nil => out.push(TYPE_NIL << 3),
            DataElement::Uint8(v) => fixed(out, TYPE_UINT, &v.to_be_bytes()),
            DataElement::Uint16(v) => fixed(out, TYPE_UINT, &v.to_be_bytes()),
            DataElement::Uint32(v) => fixed(out, TYPE_UINT, &v.to_be_bytes()),
            DataElement::Uint64(v) => fixed(out, TYPE_UINT, &v.to_be_bytes()),
            DataElement::Uint128(v) => fixed(out, TYPE_UINT, &v.to_be_bytes()),
            DataElement::Int8(v) => fixed(out, TYPE_INT, &v.to_be_bytes()),
            DataElement::Int16(v) => fixed(out, TYPE_INT, &v.to_be_bytes()),
            DataElement::Int32(v) => fixed(out, TYPE_INT, &v.to_be_bytes()),
            DataElement::Int64(v) => fixed(out, TYPE_INT, &v.to_be_bytes()),
            DataElement::Int128(v) => fixed(out, TYPE_INT, &v.to_be_bytes()),
            DataElement::Uuid(Uuid::Uuid16(v)) => fixed(out, TYPE_UUID, &v.to_be_bytes()),
            DataElement::Uuid(Uuid::Uuid32(v)) => fixed(out, TYPE_UUID, &v.to_be_bytes()),
            DataElement::Uuid(Uuid::Uuid128(v)) => fixed(out, TYPE_UUID, &v.to_be_bytes()),
            DataElement::Bool(v) => fixed(out, TYPE_BOOL, &[u8::from(*v)]),
            DataElement::Text(text) => variable(out, TYPE_TEXT, text.as_bytes()),
            DataElement::Url(url) => variable(out, TYPE_URL, url.as_bytes()),
            DataElement::Sequence(list) => variable(out, TYPE_SEQUENCE, &encode_list(list)),
            DataElement::Alternative(list) => variable(out, TYPE_ALTERNATIVE, &encode_list(list)),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();

        self.encode(&mut out);

        out
    }

    /// Decode the element at the start of `bytes`
    ///
    /// The element is returned with the number of bytes it took up.
    pub fn decode(bytes: &[u8]) -> Result<(DataElement, usize), SdpError> {
        decode_at_depth(bytes, 0)
    }
}

fn fixed(out: &mut Vec<u8>, data_type: u8, data: &[u8]) {
    let size_index = match data.len() {
        1 => 0,
        2 => 1,
        4 => 2,
        8 => 3,
        _ => 4,
    };

    out.push(data_type << 3 | size_index);
    out.extend_from_slice(data);
}

fn variable(out: &mut Vec<u8>, data_type: u8, data: &[u8]) {
    if let Ok(len) = u8::try_from(data.len()) {
        out.push(data_type << 3 | SIZE_U8_LEN);
        out.push(len);
    } else if let Ok(len) = u16::try_from(data.len()) {
        out.push(data_type << 3 | SIZE_U16_LEN);
        out.extend_from_slice(&len.to_be_bytes());
    } else {
        out.push(data_type << 3 | SIZE_U32_LEN);
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    }

    out.extend_from_slice(data);
}

fn encode_list(list: &[DataElement]) -> Vec<u8> {
    let mut data = Vec::new();

    list.iter().for_each(|element| element.encode(&mut data));

    data
}

fn take(bytes: &[u8], at: usize, len: usize) -> Result<&[u8], SdpError> {
    bytes
        .get(at..at.checked_add(len).ok_or(SdpError::MalformedElement("length overflow"))?)
        .ok_or(SdpError::MalformedElement("data is shorter than its header"))
}

fn decode_at_depth(bytes: &[u8], depth: usize) -> Result<(DataElement, usize), SdpError> {
    if depth > MAX_DEPTH {
        return Err(SdpError::MalformedElement("nested too deeply"));
    }

    let header = *bytes.first().ok_or(SdpError::MalformedElement("missing header"))?;

    let data_type = header >> 3;
    let size_index = header & 0x7;

    // The number of bytes of the header along with the length of the data
    let (header_len, data_len) = match size_index {
        0 if data_type == TYPE_NIL => (1, 0),
        0..=4 => (1, 1usize << size_index),
        SIZE_U8_LEN => (2, usize::from(take(bytes, 1, 1)?[0])),
        SIZE_U16_LEN => {
            let len = take(bytes, 1, 2)?;
            (3, usize::from(u16::from_be_bytes([len[0], len[1]])))
        }
        _ => {
            let len = take(bytes, 1, 4)?;
            (5, u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize)
        }
    };

    let data = take(bytes, header_len, data_len)?;

    macro_rules! be {
        ($ty:ty) => {
            <$ty>::from_be_bytes(data.try_into().map_err(|_| SdpError::MalformedElement("bad size"))?)
        };
    }

    let element = match (data_type, size_index) {
        (TYPE_NIL, 0) => DataElement::Nil,
        (TYPE_UINT, 0) => DataElement::Uint8(data[0]),
        (TYPE_UINT, 1) => DataElement::Uint16(be!(u16)),
        (TYPE_UINT, 2) => DataElement::Uint32(be!(u32)),
        (TYPE_UINT, 3) => DataElement::Uint64(be!(u64)),
        (TYPE_UINT, 4) => DataElement::Uint128(be!(u128)),
        (TYPE_INT, 0) => DataElement::Int8(data[0] as i8),
        (TYPE_INT, 1) => DataElement::Int16(be!(i16)),
        (TYPE_INT, 2) => DataElement::Int32(be!(i32)),
        (TYPE_INT, 3) => DataElement::Int64(be!(i64)),
        (TYPE_INT, 4) => DataElement::Int128(be!(i128)),
        (TYPE_UUID, 1) => DataElement::Uuid(Uuid::Uuid16(be!(u16))),
        (TYPE_UUID, 2) => DataElement::Uuid(Uuid::Uuid32(be!(u32))),
        (TYPE_UUID, 4) => DataElement::Uuid(Uuid::Uuid128(be!(u128))),
        (TYPE_BOOL, 0) => DataElement::Bool(data[0] != 0),
        (TYPE_TEXT, 5..=7) => DataElement::Text(String::from_utf8_lossy(trim_nul(data)).into_owned()),
        (TYPE_URL, 5..=7) => DataElement::Url(String::from_utf8_lossy(trim_nul(data)).into_owned()),
        (TYPE_SEQUENCE, 5..=7) => DataElement::Sequence(decode_list(data, depth)?),
        (TYPE_ALTERNATIVE, 5..=7) => DataElement::Alternative(decode_list(data, depth)?),
        _ => return Err(SdpError::MalformedElement("unknown type and size combination")),
    };

    Ok((element, header_len + data_len))
}

fn decode_list(mut data: &[u8], depth: usize) -> Result<Vec<DataElement>, SdpError> {
    let mut list = Vec::new();

    while !data.is_empty() {
        let (element, used) = decode_at_depth(data, depth + 1)?;

        list.push(element);

        data = &data[used..];
    }

    Ok(list)
}

/// Some servers include the C string terminator within the text
fn trim_nul(data: &[u8]) -> &[u8] {
    match data.iter().position(|b| *b == 0) {
        Some(end) => &data[..end],
        None => data,
    }
}
