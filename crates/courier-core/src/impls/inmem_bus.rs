//! InMemoryBroker - 開発・テスト用のプロセス内 pub/sub
//!
//! # 実装詳細
//! - トピックは完全一致
//! - group なしの購読者は全員が受信（broadcast）
//! - group ありの購読者は group ごとに 1 人だけが受信（ランダムに選択）
//! - 空の group 名は group なしとして扱う
//! - 配送ごとに `tokio::spawn` するので handler は並行に動く
//! - request は最初の返信を採用。購読者がいなければ即 `NoResponders`
//!
//! ロックは `std::sync::Mutex`。ロックを持ったまま await しない。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::ports::{
    Connector, Message, MessageHandler, Responder, Subscription, Transport, TransportError,
};

/// Address accepted by `InMemoryBroker::default()`.
pub const DEFAULT_ADDRESS: &str = "mem://local";

#[derive(Clone)]
struct Route {
    sid: u64,
    connection: u64,
    group: Option<String>,
    handler: Arc<dyn MessageHandler>,
}

#[derive(Default)]
struct BrokerState {
    next_sid: u64,
    routes: HashMap<String, Vec<Route>>,
}

struct BrokerInner {
    address: String,
    next_connection: AtomicU64,
    state: Mutex<BrokerState>,
}

impl BrokerInner {
    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add_route(
        &self,
        topic: &str,
        connection: u64,
        group: Option<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> u64 {
        let mut state = self.state();
        state.next_sid += 1;
        let sid = state.next_sid;
        state.routes.entry(topic.to_string()).or_default().push(Route {
            sid,
            connection,
            group,
            handler,
        });
        sid
    }

    fn remove_route(&self, topic: &str, sid: u64) {
        let mut state = self.state();
        if let Some(routes) = state.routes.get_mut(topic) {
            routes.retain(|r| r.sid != sid);
            if routes.is_empty() {
                state.routes.remove(topic);
            }
        }
    }

    fn remove_connection(&self, connection: u64) {
        let mut state = self.state();
        state.routes.retain(|_, routes| {
            routes.retain(|r| r.connection != connection);
            !routes.is_empty()
        });
    }

    /// Broadcast routes plus one randomly chosen member per queue group.
    fn recipients(&self, topic: &str) -> Vec<Arc<dyn MessageHandler>> {
        let state = self.state();
        let Some(routes) = state.routes.get(topic) else {
            return Vec::new();
        };

        let mut recipients = Vec::new();
        let mut groups: HashMap<&str, Vec<&Route>> = HashMap::new();
        for route in routes {
            match &route.group {
                None => recipients.push(Arc::clone(&route.handler)),
                Some(group) => groups.entry(group.as_str()).or_default().push(route),
            }
        }

        let mut rng = rand::thread_rng();
        for members in groups.values() {
            if let Some(route) = members.choose(&mut rng) {
                recipients.push(Arc::clone(&route.handler));
            }
        }
        recipients
    }

    /// Spawn one delivery per recipient; returns how many were spawned.
    fn deliver(&self, topic: &str, payload: Vec<u8>, reply: Option<&ReplySlot>) -> usize {
        let recipients = self.recipients(topic);
        let count = recipients.len();
        for handler in recipients {
            let mut message = Message::new(topic, payload.clone());
            if let Some(slot) = reply {
                message = message.with_responder(Box::new(slot.clone()));
            }
            tokio::spawn(async move {
                handler.on_message(message).await;
            });
        }
        trace!(topic, recipients = count, "message routed");
        count
    }

    fn route_count(&self, topic: &str) -> usize {
        self.state().routes.get(topic).map_or(0, Vec::len)
    }
}

/// Shared reply channel; the first responder wins.
#[derive(Clone)]
struct ReplySlot {
    sender: Arc<Mutex<Option<oneshot::Sender<Vec<u8>>>>>,
}

impl ReplySlot {
    fn new(sender: oneshot::Sender<Vec<u8>>) -> Self {
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
        }
    }
}

impl Responder for ReplySlot {
    fn respond(self: Box<Self>, payload: Vec<u8>) -> Result<(), TransportError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(sender) => sender
                .send(payload)
                .map_err(|_| TransportError::Other("requester is no longer waiting".to_string())),
            // 既に別の購読者が返信済み
            None => Ok(()),
        }
    }
}

/// InMemoryBroker はプロセス内のブローカー
///
/// # 使用例
/// ```ignore
/// let broker = InMemoryBroker::default();
/// let endpoint = EndpointBuilder::new()
///     .address(broker.address())
///     .codec(JsonCodec)
///     .connect(&broker)
///     .await?;
/// ```
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                address: address.into(),
                next_connection: AtomicU64::new(1),
                state: Mutex::new(BrokerState::default()),
            }),
        }
    }

    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Open a connection without going through `Connector`.
    pub fn connection(&self) -> InMemoryConnection {
        let id = self.inner.next_connection.fetch_add(1, Ordering::Relaxed);
        InMemoryConnection {
            id,
            broker: Arc::clone(&self.inner),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of live subscriptions on `topic`, across all connections.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner.route_count(topic)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS)
    }
}

#[async_trait]
impl Connector for InMemoryBroker {
    async fn connect(&self, address: &str) -> Result<Arc<dyn Transport>, TransportError> {
        if address != self.inner.address {
            return Err(TransportError::ConnectionRefused(address.to_string()));
        }
        let connection = self.connection();
        debug!(address, connection = connection.id, "in-memory connection opened");
        Ok(Arc::new(connection))
    }
}

/// One client connection to an `InMemoryBroker`.
pub struct InMemoryConnection {
    id: u64,
    broker: Arc<BrokerInner>,
    closed: AtomicBool,
}

impl InMemoryConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn check(&self, topic: &str) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        if topic.is_empty() || topic.chars().any(char::is_whitespace) {
            return Err(TransportError::InvalidTopic(topic.to_string()));
        }
        Ok(())
    }

    fn add_subscription(
        &self,
        topic: &str,
        group: Option<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Box<dyn Subscription> {
        let sid = self.broker.add_route(topic, self.id, group, handler);
        Box::new(InMemorySubscription {
            sid,
            topic: topic.to_string(),
            broker: Arc::clone(&self.broker),
        })
    }
}

#[async_trait]
impl Transport for InMemoryConnection {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.check(topic)?;
        self.broker.deliver(topic, payload, None);
        Ok(())
    }

    async fn request(
        &self,
        topic: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.check(topic)?;

        let (tx, rx) = oneshot::channel();
        // slot を最後まで保持する: 全員がメッセージを捨てても timeout まで待つ
        let slot = ReplySlot::new(tx);
        if self.broker.deliver(topic, payload, Some(&slot)) == 0 {
            return Err(TransportError::NoResponders);
        }

        let reply = tokio::time::timeout(timeout, rx).await;
        drop(slot);
        match reply {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(_)) => Err(TransportError::Other("reply channel closed".to_string())),
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn Subscription>, TransportError> {
        self.check(topic)?;
        Ok(self.add_subscription(topic, None, handler))
    }

    async fn queue_subscribe(
        &self,
        topic: &str,
        group: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn Subscription>, TransportError> {
        self.check(topic)?;
        // 空の group は NATS と同じく通常の購読
        let group = Some(group.to_string()).filter(|g| !g.is_empty());
        Ok(self.add_subscription(topic, group, handler))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.broker.remove_connection(self.id);
            debug!(connection = self.id, "in-memory connection closed");
        }
    }
}

struct InMemorySubscription {
    sid: u64,
    topic: String,
    broker: Arc<BrokerInner>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn unsubscribe(&self) -> Result<(), TransportError> {
        self.broker.remove_route(&self.topic, self.sid);
        Ok(())
    }
}
