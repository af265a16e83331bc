use crate::{from_slice, to_vec, Param, RequestEnvelope, Result, SerializeType, WireRequest};

/// Turns envelopes into bytes and reply bytes back into values.
pub trait Serializer: Send + Sync {
    fn serialize_type(&self) -> SerializeType;
    fn encode(&self, envelope: &RequestEnvelope) -> Result<Vec<u8>>;
    fn decode(&self, data: &[u8], reply: &mut dyn Param) -> Result<()>;
}

/// Serializer backed by one of the built-in serde formats.
#[derive(Debug, Copy, Clone, Default)]
pub struct CodecSerializer {
    st: SerializeType,
}

impl CodecSerializer {
    pub fn new(st: SerializeType) -> Self {
        CodecSerializer { st }
    }

    /// Decodes what `encode` produced. Used by providers and test transports.
    pub fn decode_request(&self, data: &[u8]) -> Result<WireRequest> {
        from_slice(self.st, data)
    }
}

impl Serializer for CodecSerializer {
    fn serialize_type(&self) -> SerializeType {
        self.st
    }

    fn encode(&self, envelope: &RequestEnvelope) -> Result<Vec<u8>> {
        let req = WireRequest {
            service: envelope.service().clone(),
            method: envelope.method().to_owned(),
            args: envelope.args().into_bytes(self.st)?,
        };
        to_vec(self.st, &req)
    }

    fn decode(&self, data: &[u8], reply: &mut dyn Param) -> Result<()> {
        reply.from_slice(self.st, data)
    }
}
