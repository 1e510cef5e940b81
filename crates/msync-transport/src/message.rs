use bytes::Bytes;
use msync_types::MessageHeaders;

/// One message as it travels through a transport: the encoded payload and
/// the attributes a receiver inspects before decoding it.
#[derive(Clone, Debug, PartialEq)]
pub struct WireMessage {
    pub data: Bytes,
    pub headers: MessageHeaders,
}

impl WireMessage {
    pub fn new(data: impl Into<Bytes>, headers: MessageHeaders) -> Self {
        Self {
            data: data.into(),
            headers,
        }
    }

    /// Returns `true` if the message was produced by an msync publisher.
    pub fn is_managed(&self) -> bool {
        self.headers.is_managed()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
