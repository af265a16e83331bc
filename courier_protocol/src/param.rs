use std::fmt::Debug;

use bytes::BytesMut;
use serde::{de::DeserializeOwned, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{Error, ErrorKind, Result};

#[derive(Debug, Copy, Clone, Display, PartialEq, Eq, Hash, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SerializeType {
    Json,
    MsgPack,
}

impl Default for SerializeType {
    fn default() -> Self {
        SerializeType::Json
    }
}

/// A value that can travel as an argument or a reply.
///
/// Implemented for the common scalars here and for serde types through
/// `#[derive(Param)]`.
pub trait Param: Debug + Send + Sync {
    fn into_bytes(&self, st: SerializeType) -> Result<Vec<u8>>;
    fn from_slice(&mut self, st: SerializeType, data: &[u8]) -> Result<()>;
}

impl Param for BytesMut {
    fn into_bytes(&self, _: SerializeType) -> Result<Vec<u8>> {
        Ok(self.to_vec())
    }
    fn from_slice(&mut self, _: SerializeType, data: &[u8]) -> Result<()> {
        self.clear();
        self.extend_from_slice(data);
        Ok(())
    }
}

pub fn to_vec<T: Serialize + ?Sized>(st: SerializeType, value: &T) -> Result<Vec<u8>> {
    match st {
        SerializeType::Json => {
            serde_json::to_vec(value).map_err(|err| Error::new(ErrorKind::Encoding, err))
        }
        SerializeType::MsgPack => {
            rmp_serde::to_vec_named(value).map_err(|err| Error::new(ErrorKind::Encoding, err))
        }
    }
}

pub fn from_slice<T: DeserializeOwned>(st: SerializeType, data: &[u8]) -> Result<T> {
    match st {
        SerializeType::Json => {
            serde_json::from_slice(data).map_err(|err| Error::new(ErrorKind::Decoding, err))
        }
        SerializeType::MsgPack => {
            rmp_serde::from_slice(data).map_err(|err| Error::new(ErrorKind::Decoding, err))
        }
    }
}

macro_rules! serde_param {
    ($($t:ty),*) => {
        $(
            impl Param for $t {
                fn into_bytes(&self, st: SerializeType) -> Result<Vec<u8>> {
                    to_vec(st, self)
                }
                fn from_slice(&mut self, st: SerializeType, data: &[u8]) -> Result<()> {
                    *self = from_slice(st, data)?;
                    Ok(())
                }
            }
        )*
    };
}

serde_param!((), bool, i32, i64, u32, u64, f64, String, Vec<String>, Vec<u64>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serialize_type() {
        assert_eq!(SerializeType::Json, "json".parse().unwrap());
        assert_eq!(SerializeType::MsgPack, "msg_pack".parse().unwrap());
        assert_eq!(SerializeType::MsgPack, "MSG_PACK".parse().unwrap());
        assert!("thrift".parse::<SerializeType>().is_err());
    }

    #[test]
    fn scalar_reply_decodes_in_place() {
        let mut reply = 0u64;
        reply.from_slice(SerializeType::Json, b"42").unwrap();
        assert_eq!(42, reply);

        let data = Param::into_bytes(&"hello".to_owned(), SerializeType::MsgPack).unwrap();
        let mut s = String::new();
        s.from_slice(SerializeType::MsgPack, &data).unwrap();
        assert_eq!("hello", s);
    }

    #[test]
    fn malformed_reply_is_a_decoding_error() {
        let mut reply = 0u64;
        let err = reply
            .from_slice(SerializeType::Json, b"\"not a number\"")
            .unwrap_err();
        assert_eq!(ErrorKind::Decoding, err.kind());
    }

    #[test]
    fn bytes_pass_through_untouched() {
        let mut buf = BytesMut::new();
        buf.from_slice(SerializeType::Json, &[1, 2, 3]).unwrap();
        assert_eq!(vec![1, 2, 3], Param::into_bytes(&buf, SerializeType::MsgPack).unwrap());
    }
}
