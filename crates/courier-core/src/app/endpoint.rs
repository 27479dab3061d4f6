//! Endpoint - 1 つのトランスポート接続に束縛された publisher / subscriber
//!
//! # 状態
//! `EndpointBuilder::connect` で Connected になり、`close()` で Closed になる。
//!
//! # 並行性
//! - `publish` / `request` と handler の実行は並行に動いてよい
//! - 購読レジストリは `tokio::sync::Mutex` で守り、
//!   subscribe / unsubscribe / close の read-modify-write 全体でロックを保持する

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::dispatcher::Dispatcher;
use super::status::{EndpointStats, StatsSnapshot};
use crate::domain::{Envelope, EndpointError, TopicNamer};
use crate::ports::Transport;
use crate::typed::{Codec, Handler, SubscriptionRegistry};

pub struct Endpoint<C: Codec> {
    id: String,
    namer: TopicNamer,
    default_timeout: Duration,
    codec: Arc<C>,
    transport: Arc<dyn Transport>,
    registry: Mutex<SubscriptionRegistry>,
    stats: Arc<EndpointStats>,
    closed: AtomicBool,
}

impl<C: Codec> Endpoint<C> {
    pub(crate) fn new(
        id: String,
        namer: TopicNamer,
        default_timeout: Duration,
        codec: C,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            id,
            namer,
            default_timeout,
            codec: Arc::new(codec),
            transport,
            registry: Mutex::new(SubscriptionRegistry::new()),
            stats: Arc::new(EndpointStats::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Wire topic that `topic` resolves to on this endpoint.
    pub fn wire_topic(&self, topic: &str) -> String {
        self.namer.wire_topic(topic)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Wire topics with an active subscription, sorted.
    pub async fn subscribed_topics(&self) -> Vec<String> {
        self.registry.lock().await.topics()
    }

    /// Bind `handler` to `topic`.
    ///
    /// `exclusive` joins the queue group named by the endpoint secret, so
    /// endpoints sharing the secret split the messages between them. With an
    /// empty secret the subscription is a plain broadcast one.
    ///
    /// Subscribing again on the same topic unsubscribes the previous handler
    /// before the new one is installed, so the two never run side by side.
    /// If installing fails the topic is left without a handler.
    pub async fn subscribe(
        &self,
        topic: &str,
        exclusive: bool,
        handler: Handler<C>,
    ) -> Result<(), EndpointError> {
        let signature = handler.signature();
        signature.validate().map_err(EndpointError::InvalidHandlerKind)?;

        let wire_topic = self.namer.wire_topic(topic);
        let dispatcher = Arc::new(Dispatcher::new(
            self.id.clone(),
            wire_topic.clone(),
            handler.into_dyn(),
            Arc::clone(&self.codec),
            Arc::clone(&self.stats),
        ));

        let mut registry = self.registry.lock().await;
        // close() は lock の前に flag を立てる
        if self.is_closed() {
            return Err(EndpointError::Closed);
        }

        if let Some(previous) = registry.remove(&wire_topic)
            && let Err(e) = previous.unsubscribe().await
        {
            warn!(endpoint = %self.id, topic = %wire_topic, error = %e, "fail to drop replaced subscription");
        }

        let subscription = if exclusive {
            self.transport
                .queue_subscribe(&wire_topic, self.namer.secret(), dispatcher)
                .await
        } else {
            self.transport.subscribe(&wire_topic, dispatcher).await
        }
        .map_err(EndpointError::Subscribe)?;
        registry.replace(wire_topic.clone(), subscription);

        debug!(endpoint = %self.id, topic = %wire_topic, exclusive, signature = %signature, "subscribed");
        Ok(())
    }

    /// Remove the handler bound to `topic`, if any.
    pub async fn unsubscribe(&self, topic: &str) {
        let wire_topic = self.namer.wire_topic(topic);
        let Some(subscription) = self.registry.lock().await.remove(&wire_topic) else {
            return;
        };
        match subscription.unsubscribe().await {
            Ok(()) => debug!(endpoint = %self.id, topic = %wire_topic, "unsubscribed"),
            Err(e) => warn!(endpoint = %self.id, topic = %wire_topic, error = %e, "fail to unsubscribe"),
        }
    }

    /// Fire-and-forget publish. Success says nothing about delivery.
    pub async fn publish<P>(&self, topic: &str, payload: &P) -> Result<(), EndpointError>
    where
        P: Serialize + ?Sized,
    {
        let wire_topic = self.namer.wire_topic(topic);
        let bytes = self.codec.encode(payload).map_err(EndpointError::Encode)?;
        self.transport
            .publish(&wire_topic, bytes)
            .await
            .map_err(EndpointError::Send)?;
        self.stats.record_published();
        debug!(endpoint = %self.id, topic = %wire_topic, "published");
        Ok(())
    }

    /// Request with the default timeout and decode the handler's value.
    pub async fn request<P, R>(&self, topic: &str, payload: &P) -> Result<R, EndpointError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.request_with_timeout(topic, payload, self.default_timeout)
            .await
    }

    /// Like `request`, with an explicit timeout.
    ///
    /// A handler without a value output replies with no data; that decodes
    /// as the codec's encoding of `None`, so `R` should be `()` or `Option<_>`.
    pub async fn request_with_timeout<P, R>(
        &self,
        topic: &str,
        payload: &P,
        timeout: Duration,
    ) -> Result<R, EndpointError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let data = match self.round_trip(topic, payload, timeout).await? {
            Some(data) => data,
            None => self
                .codec
                .encode(&Option::<()>::None)
                .map_err(EndpointError::Encode)?,
        };
        self.codec.decode(&data).map_err(EndpointError::Decode)
    }

    /// Request and write the reply into `reply`.
    ///
    /// `reply` is only written when the whole exchange succeeds and the
    /// handler returned a value; otherwise it keeps its previous value.
    pub async fn request_into<P, R>(
        &self,
        topic: &str,
        payload: &P,
        reply: &mut R,
    ) -> Result<(), EndpointError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        if let Some(data) = self.round_trip(topic, payload, self.default_timeout).await? {
            *reply = self.codec.decode(&data).map_err(EndpointError::Decode)?;
        }
        Ok(())
    }

    /// Publish, or request when a reply slot is given.
    pub async fn publish_to<P, R>(
        &self,
        topic: &str,
        payload: &P,
        reply: Option<&mut R>,
    ) -> Result<(), EndpointError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        match reply {
            Some(reply) => self.request_into(topic, payload, reply).await,
            None => self.publish(topic, payload).await,
        }
    }

    /// Send a request and open the reply envelope.
    async fn round_trip<P>(
        &self,
        topic: &str,
        payload: &P,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, EndpointError>
    where
        P: Serialize + ?Sized,
    {
        let wire_topic = self.namer.wire_topic(topic);
        let bytes = self.codec.encode(payload).map_err(EndpointError::Encode)?;

        self.stats.record_request();
        let reply = self
            .transport
            .request(&wire_topic, bytes, timeout)
            .await
            .map_err(EndpointError::Request)?;
        debug!(endpoint = %self.id, topic = %wire_topic, reply_len = reply.len(), "reply received");

        let envelope: Envelope = self.codec.decode(&reply).map_err(EndpointError::Decode)?;
        envelope.into_result().map_err(EndpointError::Remote)
    }

    /// Unsubscribe everything, then close the transport.
    ///
    /// Unsubscribe failures are logged and skipped. Calling `close` again
    /// finds an empty registry.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);

        let subscriptions = self.registry.lock().await.drain();
        for (topic, subscription) in subscriptions {
            if let Err(e) = subscription.unsubscribe().await {
                warn!(endpoint = %self.id, topic = %topic, error = %e, "fail to unsubscribe on close");
            }
        }
        self.transport.close().await;
        debug!(endpoint = %self.id, "endpoint closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::EndpointBuilder;
    use crate::impls::InMemoryBroker;
    use crate::ports::{MessageHandler, Subscription, TransportError};
    use crate::typed::handler::{self, DynHandler, Outputs, Signature};
    use crate::typed::{DispatchError, JsonCodec};
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    const SHORT: Duration = Duration::from_millis(200);

    async fn endpoint(broker: &InMemoryBroker, id: &str) -> Endpoint<JsonCodec> {
        endpoint_in(broker, id, "test").await
    }

    async fn endpoint_in(broker: &InMemoryBroker, id: &str, prefix: &str) -> Endpoint<JsonCodec> {
        EndpointBuilder::new()
            .id(id)
            .address(broker.address())
            .prefix(prefix)
            .secret("secret")
            .codec(JsonCodec)
            .connect(broker)
            .await
            .unwrap()
    }

    fn hello() -> Handler<JsonCodec> {
        handler::call(|name: String| format!("Hello {name}"))
    }

    fn hello_with_error() -> Handler<JsonCodec> {
        handler::try_call(|name: String| {
            if name != "world" {
                return Err("name should be only world".to_string());
            }
            Ok(format!("Hello {name}"))
        })
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u64,
        items: Vec<String>,
        note: Option<String>,
    }

    #[tokio::test]
    async fn test_hello() {
        let broker = InMemoryBroker::default();
        let s1 = endpoint(&broker, "s1").await;
        let s2 = endpoint(&broker, "s2").await;
        s1.subscribe("hello", false, hello()).await.unwrap();
        s2.subscribe("hello", false, hello()).await.unwrap();

        let publisher = endpoint(&broker, "p1").await;
        let mut res = String::new();
        publisher.request_into("hello", "world", &mut res).await.unwrap();
        assert_eq!(res, "Hello world");
    }

    #[tokio::test]
    async fn test_hello_with_error_leaves_reply_untouched() {
        let broker = InMemoryBroker::default();
        let s1 = endpoint(&broker, "s1").await;
        s1.subscribe("helloWithError", false, hello_with_error()).await.unwrap();

        let publisher = endpoint(&broker, "p1").await;
        let mut res = "unchanged".to_string();
        let err = publisher
            .request_into("helloWithError", "arief", &mut res)
            .await
            .unwrap_err();
        assert!(err.is_remote());
        assert!(err.to_string().contains("name should be only world"));
        assert_eq!(res, "unchanged");

        let ok: String = publisher.request("helloWithError", "world").await.unwrap();
        assert_eq!(ok, "Hello world");
    }

    #[tokio::test]
    async fn test_identity_round_trip() {
        let broker = InMemoryBroker::default();
        let subscriber = endpoint(&broker, "s1").await;
        subscriber
            .subscribe("echo", false, handler::call(|order: Order| order))
            .await
            .unwrap();

        let publisher = endpoint(&broker, "p1").await;
        let order = Order {
            id: 7,
            items: vec!["tea".to_string(), "rice".to_string()],
            note: None,
        };
        let echoed: Order = publisher.request("echo", &order).await.unwrap();
        assert_eq!(echoed, order);
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_handler() {
        let broker = InMemoryBroker::default();
        let subscriber = endpoint(&broker, "s1").await;
        let first_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&first_calls);

        subscriber
            .subscribe(
                "greet",
                false,
                handler::call(move |_: String| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    "A".to_string()
                }),
            )
            .await
            .unwrap();
        subscriber
            .subscribe("greet", false, handler::call(|_: String| "B".to_string()))
            .await
            .unwrap();

        let wire_topic = subscriber.wire_topic("greet");
        assert_eq!(broker.subscriber_count(&wire_topic), 1);
        assert_eq!(subscriber.subscribed_topics().await, vec![wire_topic]);

        let publisher = endpoint(&broker, "p1").await;
        for _ in 0..5 {
            let reply: String = publisher.request("greet", "x").await.unwrap();
            assert_eq!(reply, "B");
        }
        assert_eq!(first_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exclusive_subscribers_share_the_load() {
        let broker = InMemoryBroker::default();
        let s1 = endpoint(&broker, "s1").await;
        let s2 = endpoint(&broker, "s2").await;
        for worker in [&s1, &s2] {
            let worker_name = worker.id().to_string();
            worker
                .subscribe(
                    "helloQue",
                    true,
                    handler::call(move |name: String| format!("Hello {name} from {worker_name}")),
                )
                .await
                .unwrap();
        }

        let publisher = endpoint(&broker, "p1").await;
        let mut seen = HashSet::new();
        for _ in 0..40 {
            let reply: String = publisher.request("helloQue", "world").await.unwrap();
            seen.insert(reply);
        }
        assert_eq!(
            seen,
            HashSet::from([
                "Hello world from s1".to_string(),
                "Hello world from s2".to_string()
            ])
        );

        let delivered = s1.stats().delivered + s2.stats().delivered;
        assert_eq!(delivered, 40);
    }

    #[tokio::test]
    async fn test_exclusive_without_secret_is_broadcast() {
        let broker = InMemoryBroker::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subscribers = Vec::new();
        for id in ["s1", "s2"] {
            let subscriber = EndpointBuilder::new()
                .id(id)
                .address(broker.address())
                .prefix("test")
                .codec(JsonCodec)
                .connect(&broker)
                .await
                .unwrap();
            let tx = tx.clone();
            let worker = id.to_string();
            subscriber
                .subscribe(
                    "q",
                    true,
                    handler::sink(move |_: String| {
                        let _ = tx.send(worker.clone());
                    }),
                )
                .await
                .unwrap();
            subscribers.push(subscriber);
        }

        let publisher = endpoint(&broker, "p1").await;
        for _ in 0..10 {
            publisher.publish("q", "x").await.unwrap();
        }
        let mut per_worker = std::collections::HashMap::new();
        for _ in 0..20 {
            let worker = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            *per_worker.entry(worker).or_insert(0) += 1;
        }
        assert_eq!(per_worker.get("s1"), Some(&10));
        assert_eq!(per_worker.get("s2"), Some(&10));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_dropped() {
        let broker = InMemoryBroker::default();
        let subscriber = endpoint(&broker, "s1").await;
        subscriber
            .subscribe("double", false, handler::call(|n: u32| n * 2))
            .await
            .unwrap();

        let publisher = endpoint(&broker, "p1").await;
        let err = publisher
            .request_with_timeout::<_, u32>("double", "not a number", SHORT)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(subscriber.stats().dropped, 1);

        // subscriber keeps serving
        let doubled: u32 = publisher.request("double", &21u32).await.unwrap();
        assert_eq!(doubled, 42);
    }

    #[tokio::test]
    async fn test_fire_and_forget_publish() {
        let broker = InMemoryBroker::default();
        let subscriber = endpoint(&broker, "s1").await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        subscriber
            .subscribe(
                "events",
                false,
                handler::sink(move |event: String| {
                    let _ = tx.send(event);
                }),
            )
            .await
            .unwrap();

        let publisher = endpoint(&broker, "p1").await;
        publisher.publish("events", "started").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "started");
        assert_eq!(publisher.stats().published, 1);
    }

    #[tokio::test]
    async fn test_handler_without_value_replies_without_data() {
        let broker = InMemoryBroker::default();
        let subscriber = endpoint(&broker, "s1").await;
        subscriber
            .subscribe("log", false, handler::sink(|_: String| {}))
            .await
            .unwrap();

        let publisher = endpoint(&broker, "p1").await;
        publisher.request::<_, ()>("log", "line").await.unwrap();
        let none: Option<String> = publisher.request("log", "line").await.unwrap();
        assert!(none.is_none());

        let mut slot = "kept".to_string();
        publisher.request_into("log", "line", &mut slot).await.unwrap();
        assert_eq!(slot, "kept");
    }

    #[tokio::test]
    async fn test_publish_to() {
        let broker = InMemoryBroker::default();
        let subscriber = endpoint(&broker, "s1").await;
        subscriber.subscribe("hello", false, hello()).await.unwrap();

        let publisher = endpoint(&broker, "p1").await;
        let mut res = String::new();
        publisher
            .publish_to("hello", "world", Some(&mut res))
            .await
            .unwrap();
        assert_eq!(res, "Hello world");

        publisher
            .publish_to::<_, String>("hello", "world", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_escaped_topic_crosses_namespaces() {
        let broker = InMemoryBroker::default();
        let other = endpoint_in(&broker, "s1", "other").await;
        other.subscribe("ping", false, handler::call0(|| "pong".to_string())).await.unwrap();

        let publisher = endpoint(&broker, "p1").await;
        assert_eq!(publisher.wire_topic("~other/ping"), other.wire_topic("ping"));
        let reply: String = publisher.request("~other/ping", &()).await.unwrap();
        assert_eq!(reply, "pong");
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let broker = InMemoryBroker::default();
        let subscriber = endpoint(&broker, "s1").await;
        subscriber.subscribe("hello", false, hello()).await.unwrap();
        subscriber.unsubscribe("hello").await;
        subscriber.unsubscribe("hello").await;
        assert!(subscriber.subscribed_topics().await.is_empty());

        let publisher = endpoint(&broker, "p1").await;
        let err = publisher.request::<_, String>("hello", "world").await.unwrap_err();
        assert!(matches!(err, EndpointError::Request(TransportError::NoResponders)));
    }

    #[tokio::test]
    async fn test_close_tears_down_subscriptions() {
        let broker = InMemoryBroker::default();
        let subscriber = endpoint(&broker, "s1").await;
        subscriber.subscribe("hello", false, hello()).await.unwrap();
        subscriber.subscribe("helloQue", true, hello()).await.unwrap();

        subscriber.close().await;
        assert!(subscriber.is_closed());
        assert!(subscriber.subscribed_topics().await.is_empty());
        assert_eq!(broker.subscriber_count(&subscriber.wire_topic("hello")), 0);
        assert_eq!(broker.subscriber_count(&subscriber.wire_topic("helloQue")), 0);

        subscriber.close().await;

        let err = subscriber.subscribe("hello", false, hello()).await.unwrap_err();
        assert!(matches!(err, EndpointError::Closed));
        let err = subscriber.publish("hello", "world").await.unwrap_err();
        assert!(matches!(err, EndpointError::Send(TransportError::Closed)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_subscribe_racing_close_leaves_nothing_behind() {
        let broker = InMemoryBroker::default();
        for round in 0..20 {
            let subscriber = Arc::new(endpoint(&broker, &format!("s{round}")).await);
            let racer = Arc::clone(&subscriber);
            let subscribing =
                tokio::spawn(async move { racer.subscribe("hello", false, hello()).await });
            subscriber.close().await;

            let result = subscribing.await.unwrap();
            assert!(matches!(result, Ok(()) | Err(EndpointError::Closed)));
            assert!(subscriber.subscribed_topics().await.is_empty());
            assert_eq!(broker.subscriber_count(&subscriber.wire_topic("hello")), 0);
        }
    }

    /// Transport that only records subscribe / unsubscribe calls.
    #[derive(Default)]
    struct Recording {
        log: Arc<std::sync::Mutex<Vec<String>>>,
        refuse: AtomicBool,
    }

    impl Recording {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn install(&self, entry: String, topic: &str) -> Result<Box<dyn Subscription>, TransportError> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(TransportError::Other("refused".to_string()));
            }
            self.log.lock().unwrap().push(entry);
            Ok(Box::new(RecordedSubscription {
                topic: topic.to_string(),
                log: Arc::clone(&self.log),
            }))
        }
    }

    struct RecordedSubscription {
        topic: String,
        log: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Subscription for RecordedSubscription {
        fn topic(&self) -> &str {
            &self.topic
        }

        async fn unsubscribe(&self) -> Result<(), TransportError> {
            self.log.lock().unwrap().push(format!("unsubscribe {}", self.topic));
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for Recording {
        async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<(), TransportError> {
            Ok(())
        }

        async fn request(
            &self,
            _topic: &str,
            _payload: Vec<u8>,
            _timeout: Duration,
        ) -> Result<Vec<u8>, TransportError> {
            Err(TransportError::NoResponders)
        }

        async fn subscribe(
            &self,
            topic: &str,
            _handler: Arc<dyn MessageHandler>,
        ) -> Result<Box<dyn Subscription>, TransportError> {
            self.install(format!("subscribe {topic}"), topic)
        }

        async fn queue_subscribe(
            &self,
            topic: &str,
            group: &str,
            _handler: Arc<dyn MessageHandler>,
        ) -> Result<Box<dyn Subscription>, TransportError> {
            self.install(format!("queue_subscribe {topic} {group}"), topic)
        }

        async fn close(&self) {}
    }

    fn recorded_endpoint(transport: &Arc<Recording>) -> Endpoint<JsonCodec> {
        Endpoint::new(
            "s1".to_string(),
            TopicNamer::new("test", "secret"),
            SHORT,
            JsonCodec,
            Arc::clone(transport) as Arc<dyn Transport>,
        )
    }

    #[tokio::test]
    async fn test_resubscribe_drops_previous_before_installing() {
        let transport = Arc::new(Recording::default());
        let subscriber = recorded_endpoint(&transport);

        subscriber.subscribe("greet", false, hello()).await.unwrap();
        subscriber.subscribe("greet", true, hello()).await.unwrap();

        assert_eq!(
            transport.log(),
            vec![
                "subscribe test/greet@secret".to_string(),
                "unsubscribe test/greet@secret".to_string(),
                "queue_subscribe test/greet@secret secret".to_string(),
            ]
        );
        assert_eq!(subscriber.subscribed_topics().await, vec!["test/greet@secret".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_resubscribe_leaves_topic_unbound() {
        let transport = Arc::new(Recording::default());
        let subscriber = recorded_endpoint(&transport);
        subscriber.subscribe("greet", false, hello()).await.unwrap();

        transport.refuse.store(true, Ordering::SeqCst);
        let err = subscriber.subscribe("greet", false, hello()).await.unwrap_err();
        assert!(matches!(err, EndpointError::Subscribe(TransportError::Other(_))));
        assert!(subscriber.subscribed_topics().await.is_empty());
        assert_eq!(transport.log().last().map(String::as_str), Some("unsubscribe test/greet@secret"));
    }

    #[tokio::test]
    async fn test_encode_error() {
        let broker = InMemoryBroker::default();
        let publisher = endpoint(&broker, "p1").await;
        let payload = std::collections::HashMap::from([((1, 2), "x")]);
        let err = publisher.publish("anything", &payload).await.unwrap_err();
        assert!(matches!(err, EndpointError::Encode(_)));
    }

    #[tokio::test]
    async fn test_reply_type_mismatch_is_decode_error() {
        let broker = InMemoryBroker::default();
        let subscriber = endpoint(&broker, "s1").await;
        subscriber.subscribe("hello", false, hello()).await.unwrap();

        let publisher = endpoint(&broker, "p1").await;
        let err = publisher.request::<_, u64>("hello", "world").await.unwrap_err();
        assert!(matches!(err, EndpointError::Decode(_)));
    }

    struct TwoArgs;

    #[async_trait]
    impl DynHandler<JsonCodec> for TwoArgs {
        fn signature(&self) -> Signature {
            Signature {
                inputs: 2,
                input_type: Some("(String, String)"),
                outputs: Outputs::Value,
            }
        }

        async fn call(&self, _codec: &JsonCodec, _payload: &[u8]) -> Result<Envelope, DispatchError> {
            Ok(Envelope::success(None))
        }
    }

    #[tokio::test]
    async fn test_invalid_handler_kind() {
        let broker = InMemoryBroker::default();
        let subscriber = endpoint(&broker, "s1").await;
        let err = subscriber
            .subscribe("two", false, Handler::from_dyn(Arc::new(TwoArgs)))
            .await
            .unwrap_err();
        assert!(matches!(err, EndpointError::InvalidHandlerKind(_)));
        assert!(subscriber.subscribed_topics().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests() {
        let broker = InMemoryBroker::default();
        let subscriber = endpoint(&broker, "s1").await;
        subscriber
            .subscribe("square", true, handler::call(|n: u64| n * n))
            .await
            .unwrap();

        let publisher = Arc::new(endpoint(&broker, "p1").await);
        let mut joins = Vec::new();
        for n in 0..32u64 {
            let publisher = Arc::clone(&publisher);
            joins.push(tokio::spawn(async move {
                let squared: u64 = publisher.request("square", &n).await.unwrap();
                assert_eq!(squared, n * n);
            }));
        }
        for join in joins {
            join.await.unwrap();
        }
        assert_eq!(subscriber.stats().delivered, 32);
    }
}
