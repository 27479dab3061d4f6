//! Errors - Endpoint の公開エラー型
//!
//! 各レイヤーのエラー（TransportError, CodecError）を
//! 呼び出し側から見た分類にまとめます。

use thiserror::Error;

use crate::ports::TransportError;
use crate::typed::CodecError;

/// EndpointError は Endpoint の操作エラー
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("fail to connect to transport: {0}")]
    Connect(#[source] TransportError),

    #[error("codec is required to build an endpoint")]
    CodecRequired,

    #[error("fail to encode payload: {0}")]
    Encode(#[source] CodecError),

    #[error("fail to decode reply: {0}")]
    Decode(#[source] CodecError),

    #[error("fail to send payload: {0}")]
    Send(#[source] TransportError),

    /// Request timed out or the transport call failed.
    #[error("fail to get reply: {0}")]
    Request(#[source] TransportError),

    /// The remote handler returned an error.
    #[error("remote handler error: {0}")]
    Remote(String),

    #[error("invalid handler kind: {0}")]
    InvalidHandlerKind(String),

    #[error("fail to subscribe: {0}")]
    Subscribe(#[source] TransportError),

    #[error("endpoint is closed")]
    Closed,
}

impl EndpointError {
    /// True when the failure came from the handler on the other side.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// True when a request gave up waiting for its reply.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(TransportError::Timeout))
    }
}
