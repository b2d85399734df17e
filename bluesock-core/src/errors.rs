/// Error for text that is not a valid address or UUID
///
/// These are raised before any system resource is touched, so a `FormatError` never leaves
/// anything partially done.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("invalid length {length} for a device address, expected 17 characters")]
    AddressLength { length: usize },
    #[error("device address '{0}' is not in the form XX:XX:XX:XX:XX:XX")]
    AddressSyntax(String),
    #[error("invalid length {length} for a UUID, expected 4, 8, or 36 characters")]
    UuidLength { length: usize },
    #[error("'{0}' is not a valid UUID")]
    UuidSyntax(String),
}
