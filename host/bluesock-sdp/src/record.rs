//! Service records
//!
//! A [`ServiceRecord`] is a map of attribute IDs to attribute values. Records are built either
//! from a [`ServiceDescription`] for advertising a listening socket, or from the attribute lists
//! returned by a search. [`ServiceInfo`] is the flattened view of a record that is returned to the
//! user from a search.

use crate::attribute::*;
use crate::data_element::DataElement;
use crate::SdpError;
use bluesock_core::{BluetoothDeviceAddress, FormatError, Uuid};
use std::collections::BTreeMap;

/// The handle of a record that has not been registered
pub const UNREGISTERED_HANDLE: u32 = 0xFFFF_FFFF;

/// One layer of a protocol stack
///
/// This is the UUID of the protocol followed by the parameters of the protocol (such as the PSM
/// for L2CAP or the channel for RFCOMM).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolDescriptor {
    pub uuid: Uuid,
    pub parameters: Vec<DataElement>,
}

impl ProtocolDescriptor {
    pub fn new(uuid: Uuid) -> Self {
        ProtocolDescriptor {
            uuid,
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: DataElement) -> Self {
        self.parameters.push(parameter);
        self
    }

    fn to_element(&self) -> DataElement {
        let mut sequence = vec![DataElement::Uuid(self.uuid)];

        sequence.extend(self.parameters.iter().cloned());

        DataElement::Sequence(sequence)
    }

    fn from_element(element: &DataElement) -> Option<Self> {
        let (first, rest) = element.as_list()?.split_first()?;

        Some(ProtocolDescriptor {
            uuid: first.as_uuid()?,
            parameters: rest.to_vec(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceRecord {
    handle: u32,
    attributes: BTreeMap<u16, DataElement>,
}

impl ServiceRecord {
    pub fn new() -> Self {
        ServiceRecord {
            handle: UNREGISTERED_HANDLE,
            attributes: BTreeMap::new(),
        }
    }

    pub fn handle(&self) -> u32 {
        self.handle
    }

    pub fn set_handle(&mut self, handle: u32) {
        self.handle = handle
    }

    pub fn is_registered(&self) -> bool {
        self.handle != UNREGISTERED_HANDLE
    }

    pub fn attribute(&self, id: u16) -> Option<&DataElement> {
        self.attributes.get(&id)
    }

    pub fn set_attribute(&mut self, id: u16, value: DataElement) {
        if id == SERVICE_RECORD_HANDLE {
            if let Some(handle) = value.as_uint().and_then(|h| u32::try_from(h).ok()) {
                self.handle = handle;
            }
        } else {
            self.attributes.insert(id, value);
        }
    }

    pub fn remove_attribute(&mut self, id: u16) -> Option<DataElement> {
        self.attributes.remove(&id)
    }

    /// Iterate over the attributes in ascending ID order
    ///
    /// The record handle is not included.
    pub fn attributes(&self) -> impl Iterator<Item = (u16, &DataElement)> {
        self.attributes.iter().map(|(id, value)| (*id, value))
    }

    pub fn set_browse_groups(&mut self, groups: &[Uuid]) {
        self.set_attribute(BROWSE_GROUP_LIST, uuid_sequence(groups))
    }

    pub fn set_service_classes(&mut self, classes: &[Uuid]) {
        self.set_attribute(SERVICE_CLASS_ID_LIST, uuid_sequence(classes))
    }

    /// Set the profile descriptor list from pairs of a profile UUID and its version
    pub fn set_profiles(&mut self, profiles: &[(Uuid, u16)]) {
        let list = profiles
            .iter()
            .map(|(uuid, version)| DataElement::Sequence(vec![DataElement::Uuid(*uuid), DataElement::Uint16(*version)]))
            .collect();

        self.set_attribute(BLUETOOTH_PROFILE_DESCRIPTOR_LIST, DataElement::Sequence(list))
    }

    /// Set the protocol descriptor list to a single protocol stack
    ///
    /// The stack is ordered from the lowest layer up.
    pub fn set_access_protocols(&mut self, stack: &[ProtocolDescriptor]) {
        let stack = stack.iter().map(ProtocolDescriptor::to_element).collect();

        self.set_attribute(PROTOCOL_DESCRIPTOR_LIST, DataElement::Sequence(stack))
    }

    pub fn set_service_id(&mut self, id: Uuid) {
        self.set_attribute(SERVICE_ID, DataElement::Uuid(id))
    }

    /// Set the text attributes of the primary language
    ///
    /// Any `None` leaves the attribute as it was.
    pub fn set_info(&mut self, name: Option<&str>, provider: Option<&str>, description: Option<&str>) {
        [(SERVICE_NAME, name), (PROVIDER_NAME, provider), (SERVICE_DESCRIPTION, description)]
            .into_iter()
            .filter_map(|(id, text)| text.map(|t| (id, t)))
            .for_each(|(id, text)| self.set_attribute(id, DataElement::Text(text.to_string())))
    }

    pub fn name(&self) -> Option<&str> {
        self.attribute(SERVICE_NAME).and_then(DataElement::as_text)
    }

    pub fn description(&self) -> Option<&str> {
        self.attribute(SERVICE_DESCRIPTION).and_then(DataElement::as_text)
    }

    pub fn provider(&self) -> Option<&str> {
        self.attribute(PROVIDER_NAME).and_then(DataElement::as_text)
    }

    pub fn service_id(&self) -> Option<Uuid> {
        self.attribute(SERVICE_ID).and_then(DataElement::as_uuid)
    }

    pub fn service_classes(&self) -> Vec<Uuid> {
        self.attribute(SERVICE_CLASS_ID_LIST)
            .and_then(DataElement::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(DataElement::as_uuid)
            .collect()
    }

    pub fn browse_groups(&self) -> Vec<Uuid> {
        self.attribute(BROWSE_GROUP_LIST)
            .and_then(DataElement::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(DataElement::as_uuid)
            .collect()
    }

    pub fn profiles(&self) -> Vec<(Uuid, u16)> {
        self.attribute(BLUETOOTH_PROFILE_DESCRIPTOR_LIST)
            .and_then(DataElement::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(|profile| match profile.as_list()? {
                [uuid, version, ..] => Some((uuid.as_uuid()?, u16::try_from(version.as_uint()?).ok()?)),
                _ => None,
            })
            .collect()
    }

    /// Get the protocol stacks of the protocol descriptor list
    ///
    /// The list is either a single stack or, when the service can be reached more than one way, an
    /// alternative of stacks. `None` is returned when the record has no protocol descriptor list.
    pub fn access_protocols(&self) -> Option<Vec<Vec<ProtocolDescriptor>>> {
        let list = self.attribute(PROTOCOL_DESCRIPTOR_LIST)?;

        let stacks: Vec<&DataElement> = match list {
            DataElement::Sequence(_) => vec![list],
            DataElement::Alternative(stacks) => stacks.iter().collect(),
            _ => return None,
        };

        Some(
            stacks
                .into_iter()
                .map(|stack| {
                    stack
                        .as_list()
                        .unwrap_or_default()
                        .iter()
                        .filter_map(ProtocolDescriptor::from_element)
                        .collect()
                })
                .collect(),
        )
    }

    /// Get the transport a client uses to reach the service, along with its port
    ///
    /// The port is the RFCOMM channel when the service runs over RFCOMM, otherwise it is the L2CAP
    /// PSM. Both are `None` if the record has no protocol descriptor list.
    pub fn protocol_port(&self) -> (Option<ServiceProtocol>, Option<u16>) {
        let stacks = match self.access_protocols() {
            Some(stacks) => stacks,
            None => return (None, None),
        };

        let port_of = |uuid: Uuid| {
            stacks
                .iter()
                .flatten()
                .filter(|descriptor| descriptor.uuid == uuid)
                .filter_map(|descriptor| descriptor.parameters.first()?.as_uint())
                .filter_map(|port| u16::try_from(port).ok())
                .find(|port| *port != 0)
        };

        if let Some(channel) = port_of(Uuid::RFCOMM) {
            (Some(ServiceProtocol::Rfcomm), Some(channel))
        } else if let Some(psm) = port_of(Uuid::L2CAP) {
            (Some(ServiceProtocol::L2cap), Some(psm))
        } else {
            (Some(ServiceProtocol::Unknown), None)
        }
    }

    /// Convert the record into its attribute list data element
    ///
    /// The record handle is only part of the list once the record is registered.
    pub fn to_element(&self) -> DataElement {
        let handle = self
            .is_registered()
            .then_some((SERVICE_RECORD_HANDLE, DataElement::Uint32(self.handle)));

        let list = handle
            .into_iter()
            .chain(self.attributes.iter().map(|(id, value)| (*id, value.clone())))
            .flat_map(|(id, value)| [DataElement::Uint16(id), value])
            .collect();

        DataElement::Sequence(list)
    }

    /// Create a record from an attribute list data element
    pub fn from_element(element: &DataElement) -> Result<Self, SdpError> {
        let list = match element {
            DataElement::Sequence(list) => list,
            _ => return Err(SdpError::MalformedElement("attribute list is not a sequence")),
        };

        if list.len() % 2 != 0 {
            return Err(SdpError::MalformedElement("attribute list has an ID without a value"));
        }

        let mut record = ServiceRecord::new();

        for pair in list.chunks_exact(2) {
            match &pair[0] {
                DataElement::Uint16(id) => record.set_attribute(*id, pair[1].clone()),
                _ => return Err(SdpError::MalformedElement("attribute ID is not a 16 bit unsigned integer")),
            }
        }

        Ok(record)
    }

    /// Get the bytes of the record as sent to the SDP server to register it
    pub fn to_pdu_bytes(&self) -> Vec<u8> {
        self.to_element().to_bytes()
    }
}

impl Default for ServiceRecord {
    fn default() -> Self {
        Self::new()
    }
}

fn uuid_sequence(uuids: &[Uuid]) -> DataElement {
    DataElement::Sequence(uuids.iter().copied().map(DataElement::Uuid).collect())
}

/// The transport protocol of a service
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ServiceProtocol {
    Rfcomm,
    L2cap,
    Unknown,
}

impl core::fmt::Display for ServiceProtocol {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            ServiceProtocol::Rfcomm => f.write_str("RFCOMM"),
            ServiceProtocol::L2cap => f.write_str("L2CAP"),
            ServiceProtocol::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// The information about a service returned by a search
///
/// UUIDs are in their text form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceInfo {
    pub name: Option<String>,
    pub description: Option<String>,
    pub provider: Option<String>,
    pub service_id: Option<String>,
    pub protocol: Option<ServiceProtocol>,
    pub port: Option<u16>,
    pub service_classes: Vec<String>,
    pub profiles: Vec<(String, u16)>,
    /// The device the service was found on
    pub host: Option<BluetoothDeviceAddress>,
}

impl From<&ServiceRecord> for ServiceInfo {
    fn from(record: &ServiceRecord) -> Self {
        let (protocol, port) = record.protocol_port();

        ServiceInfo {
            name: record.name().map(str::to_string),
            description: record.description().map(str::to_string),
            provider: record.provider().map(str::to_string),
            service_id: record.service_id().map(|id| id.format()),
            protocol,
            port,
            service_classes: record.service_classes().iter().map(Uuid::format).collect(),
            profiles: record
                .profiles()
                .into_iter()
                .map(|(uuid, version)| (uuid.format(), version))
                .collect(),
            host: None,
        }
    }
}

/// The transport a listening socket is reached with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BaseProtocol {
    L2cap { psm: u16 },
    Rfcomm { channel: u8 },
}

/// A description of a service to advertise
///
/// UUIDs are given in their text form and are not checked until the record is built.
///
/// ```
/// # use bluesock_sdp::record::{BaseProtocol, ServiceDescription};
/// let record = ServiceDescription::new("svc")
///     .with_service_class("1101")
///     .to_record(BaseProtocol::L2cap { psm: 0x1003 })
///     .unwrap();
///
/// assert_eq!(Some("svc"), record.name());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceDescription {
    pub name: String,
    /// An empty ID is the same as no ID
    pub service_id: Option<String>,
    pub service_classes: Vec<String>,
    pub profiles: Vec<(String, u16)>,
    pub provider: Option<String>,
    pub description: Option<String>,
    /// Protocols layered above the transport
    pub protocols: Vec<String>,
}

impl ServiceDescription {
    pub fn new<N: Into<String>>(name: N) -> Self {
        ServiceDescription {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_service_id<S: Into<String>>(mut self, id: S) -> Self {
        self.service_id = Some(id.into());
        self
    }

    pub fn with_service_class<S: Into<String>>(mut self, class: S) -> Self {
        self.service_classes.push(class.into());
        self
    }

    pub fn with_profile<S: Into<String>>(mut self, profile: S, version: u16) -> Self {
        self.profiles.push((profile.into(), version));
        self
    }

    pub fn with_provider<S: Into<String>>(mut self, provider: S) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_protocol<S: Into<String>>(mut self, protocol: S) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Check that every UUID of the description is valid
    ///
    /// This returns the error of the first invalid UUID.
    pub fn validate(&self) -> Result<(), FormatError> {
        self.parse_uuids().map(|_| ())
    }

    /// Build the service record for a socket reached with `base`
    pub fn to_record(&self, base: BaseProtocol) -> Result<ServiceRecord, FormatError> {
        let parsed = self.parse_uuids()?;

        let mut stack = match base {
            BaseProtocol::L2cap { psm } => {
                vec![ProtocolDescriptor::new(Uuid::L2CAP).with_parameter(DataElement::Uint16(psm))]
            }
            BaseProtocol::Rfcomm { channel } => vec![
                ProtocolDescriptor::new(Uuid::L2CAP),
                ProtocolDescriptor::new(Uuid::RFCOMM).with_parameter(DataElement::Uint8(channel)),
            ],
        };

        stack.extend(parsed.protocols.into_iter().map(ProtocolDescriptor::new));

        let mut record = ServiceRecord::new();

        record.set_browse_groups(&[Uuid::PUBLIC_BROWSE_GROUP]);
        record.set_access_protocols(&stack);

        if !parsed.classes.is_empty() {
            record.set_service_classes(&parsed.classes);
        }

        if !parsed.profiles.is_empty() {
            record.set_profiles(&parsed.profiles);
        }

        if let Some(id) = parsed.service_id {
            record.set_service_id(id);
        }

        record.set_info(Some(&self.name), self.provider.as_deref(), self.description.as_deref());

        Ok(record)
    }

    fn parse_uuids(&self) -> Result<ParsedUuids, FormatError> {
        Ok(ParsedUuids {
            service_id: self
                .service_id
                .as_deref()
                .filter(|id| !id.is_empty())
                .map(Uuid::parse)
                .transpose()?,
            classes: self
                .service_classes
                .iter()
                .map(|c| Uuid::parse(c))
                .collect::<Result<_, _>>()?,
            profiles: self
                .profiles
                .iter()
                .map(|(p, v)| Uuid::parse(p).map(|uuid| (uuid, *v)))
                .collect::<Result<_, _>>()?,
            protocols: self
                .protocols
                .iter()
                .map(|p| Uuid::parse(p))
                .collect::<Result<_, _>>()?,
        })
    }
}

struct ParsedUuids {
    service_id: Option<Uuid>,
    classes: Vec<Uuid>,
    profiles: Vec<(Uuid, u16)>,
    protocols: Vec<Uuid>,
}
