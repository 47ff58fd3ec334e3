use bytes::Bytes;

/// One inbound unit of a camera stream, discriminated once at ingress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// One complete compressed image
    Binary(Bytes),
    /// One JSON telemetry object
    Text(String),
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(bytes))
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Binary(bytes)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}
