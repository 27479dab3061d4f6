//! Dispatcher - 受信メッセージを handler に渡して返信する
//!
//! # フロー
//! 1. 入力があれば payload を decode（失敗したら破棄、返信しない）
//! 2. handler 実行
//! 3. 戻り値を Envelope に詰める
//! 4. Envelope を encode して返信（失敗したら空の返信）
//!
//! publish で届いたメッセージにも同じように返信します。
//! 返信先がなければ transport 側で no-op になります。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::status::EndpointStats;
use crate::ports::{Message, MessageHandler};
use crate::typed::{Codec, DispatchError, DynHandler};

pub struct Dispatcher<C: Codec> {
    endpoint_id: String,
    wire_topic: String,
    handler: Arc<dyn DynHandler<C>>,
    codec: Arc<C>,
    stats: Arc<EndpointStats>,
}

impl<C: Codec> Dispatcher<C> {
    pub fn new(
        endpoint_id: String,
        wire_topic: String,
        handler: Arc<dyn DynHandler<C>>,
        codec: Arc<C>,
        stats: Arc<EndpointStats>,
    ) -> Self {
        Self {
            endpoint_id,
            wire_topic,
            handler,
            codec,
            stats,
        }
    }

    fn reply(&self, message: &mut Message, payload: Vec<u8>) {
        if !message.expects_reply() {
            return;
        }
        match message.respond(payload) {
            Ok(()) => self.stats.record_replied(),
            Err(e) => warn!(
                endpoint = %self.endpoint_id,
                topic = %self.wire_topic,
                error = %e,
                "reply not delivered"
            ),
        }
    }
}

#[async_trait]
impl<C: Codec> MessageHandler for Dispatcher<C> {
    async fn on_message(&self, mut message: Message) {
        self.stats.record_delivered();

        let envelope = match self.handler.call(self.codec.as_ref(), &message.payload).await {
            Ok(envelope) => envelope,
            Err(DispatchError::Decode(e)) => {
                self.stats.record_dropped();
                debug!(
                    endpoint = %self.endpoint_id,
                    topic = %self.wire_topic,
                    error = %e,
                    "dropping message with undecodable payload"
                );
                return;
            }
            Err(DispatchError::Encode(e)) => {
                warn!(
                    endpoint = %self.endpoint_id,
                    topic = %self.wire_topic,
                    error = %e,
                    "handler result could not be encoded, sending empty reply"
                );
                self.reply(&mut message, Vec::new());
                return;
            }
        };

        if envelope.is_error() {
            self.stats.record_handler_error();
            debug!(
                endpoint = %self.endpoint_id,
                topic = %self.wire_topic,
                error = %envelope.error,
                "handler returned an error"
            );
        }

        let payload = self.codec.encode(&envelope).unwrap_or_else(|e| {
            warn!(
                endpoint = %self.endpoint_id,
                topic = %self.wire_topic,
                error = %e,
                "envelope could not be encoded, sending empty reply"
            );
            Vec::new()
        });
        self.reply(&mut message, payload);
    }
}
