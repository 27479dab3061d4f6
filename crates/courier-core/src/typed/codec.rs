//! Codec - payload の encode / decode
//!
//! Endpoint は `C: Codec` でジェネリックです。
//! generic メソッドを持つので object-safe ではありませんが、
//! その分 handler 登録時に decode/encode を型ごとに束縛できます。

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// CodecError は encode / decode の失敗
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("encode: {0}")]
    Encode(String),

    #[error("decode: {0}")]
    Decode(String),
}

/// Codec は値と bytes の相互変換
pub trait Codec: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Compact binary codec backed by `bincode`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
