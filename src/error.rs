//! Zipcrab error types.

use zipcrab_wire::WireError;

/// A zipcrab error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An inbound frame could not be decoded.
    Decode(WireError),
    /// An outbound frame could not be encoded.
    Encode(WireError),
    /// An ack or message wait exceeded its deadline.
    Timeout,
    /// The datagram connection failed.
    Transport(TransportError),
    /// The Z/IP peer violated (or we violated) protocol expectations.
    Protocol(ProtocolError),
    /// An inbound frame had no matching handler or waiter.
    Unhandled,
    /// An item in a list could not be found.
    NotFound,
    /// An internal error occurred. This indicates something that shouldn't
    /// happen within zipcrab.
    Internal,
}

impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Decode(e) => write!(f, "decode: {}", e),
            Error::Encode(e) => write!(f, "encode: {}", e),
            Error::Timeout => f.write_str("timeout"),
            Error::Transport(e) => write!(f, "transport: {}", e),
            Error::Protocol(e) => write!(f, "protocol: {}", e),
            Error::Unhandled => f.write_str("no handler or waiter matched the frame"),
            Error::NotFound => f.write_str("item not found"),
            Error::Internal => f.write_str("internal error"),
        }
    }
}

/// Datagram connection errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The socket is closed or was never opened.
    NotConnected,
    /// Sending a datagram failed.
    Send,
    /// Binding or connecting the socket failed.
    Setup,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransportError::NotConnected => f.write_str("socket not connected"),
            TransportError::Send => f.write_str("failed to send datagram"),
            TransportError::Setup => f.write_str("failed to open socket"),
        }
    }
}

/// Z/IP protocol violations.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// An ack slot for this sequence number already exists. This is a
    /// programmer error at the API boundary and aborts the operation.
    DuplicateAckId(u8),
    /// The peer nacked the send without a waiting indication.
    NackFail,
    /// An unsolicited frame requested an ack but its sender could not be
    /// mapped to a node.
    UnansweredAckRequest,
}

impl core::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProtocolError::DuplicateAckId(seq) => write!(f, "duplicate ack id {}", seq),
            ProtocolError::NackFail => f.write_str("peer nacked the send"),
            ProtocolError::UnansweredAckRequest => f.write_str("ack requested by unknown sender"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl From<WireError> for Error {
    fn from(e: WireError) -> Self {
        match e {
            WireError::UnalignedWrite | WireError::ValueOutOfRange => Self::Encode(e),
            _ => Self::Decode(e),
        }
    }
}
