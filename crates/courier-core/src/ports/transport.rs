//! Transport port - pub/sub トランスポートの抽象化
//!
//! 接続管理・配送保証・queue group の負荷分散はトランスポート側の責務です。
//! このクレートは以下の能力だけを前提にします。
//! - `publish(topic, bytes)`
//! - `request(topic, bytes, timeout) -> bytes`
//! - `subscribe(topic, handler)` / `queue_subscribe(topic, group, handler)`
//!
//! # 実装
//! - `impls::InMemoryBroker`: プロセス内ブローカー（開発・テスト用）

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// TransportError はトランスポート層のエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("connection closed")]
    Closed,

    #[error("request timed out")]
    Timeout,

    #[error("no responders available for request")]
    NoResponders,

    #[error("invalid topic: {0:?}")]
    InvalidTopic(String),

    #[error("{0}")]
    Other(String),
}

/// Responder は受信メッセージへの返信口
///
/// 一度だけ使える（`self: Box<Self>`）。
pub trait Responder: Send {
    fn respond(self: Box<Self>, payload: Vec<u8>) -> Result<(), TransportError>;
}

/// A message delivered by the transport.
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
    responder: Option<Box<dyn Responder>>,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload,
            responder: None,
        }
    }

    pub fn with_responder(mut self, responder: Box<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Whether the sender is waiting for a reply.
    pub fn expects_reply(&self) -> bool {
        self.responder.is_some()
    }

    /// Reply to the sender. A no-op when the message was a plain publish.
    pub fn respond(&mut self, payload: Vec<u8>) -> Result<(), TransportError> {
        match self.responder.take() {
            Some(responder) => responder.respond(payload),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("topic", &self.topic)
            .field("payload_len", &self.payload.len())
            .field("expects_reply", &self.expects_reply())
            .finish()
    }
}

/// MessageHandler はトランスポートから呼ばれるコールバック
///
/// メッセージごとに並行して呼ばれる可能性があります。
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, message: Message);
}

/// A live subscription owned by whoever subscribed.
#[async_trait]
pub trait Subscription: Send + Sync {
    fn topic(&self) -> &str;

    async fn unsubscribe(&self) -> Result<(), TransportError>;
}

/// One connection to the transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fire-and-forget send.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Send and wait up to `timeout` for the first reply.
    async fn request(
        &self,
        topic: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// Broadcast subscription: every subscriber receives every message.
    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn Subscription>, TransportError>;

    /// Group subscription: each message goes to one member of `group`.
    async fn queue_subscribe(
        &self,
        topic: &str,
        group: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn Subscription>, TransportError>;

    async fn close(&self);
}

/// Connector はアドレスから Transport 接続を作る
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Arc<dyn Transport>, TransportError>;
}
