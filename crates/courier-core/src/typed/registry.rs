//! SubscriptionRegistry - wire トピックごとの購読ハンドル管理
//!
//! # 方針
//! - 1 つの Endpoint で、1 つの wire トピックにつき購読は常に 1 つ
//! - 同じトピックへの再登録は「後勝ち」: 古いハンドルを返すので、
//!   呼び出し側が unsubscribe する
//! - ロックは持たない。Endpoint が `tokio::sync::Mutex` で包んで使う

use std::collections::HashMap;

use crate::ports::Subscription;

#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: HashMap<String, Box<dyn Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
        }
    }

    /// Track `subscription` under `wire_topic`, returning the one it replaces.
    pub fn replace(
        &mut self,
        wire_topic: String,
        subscription: Box<dyn Subscription>,
    ) -> Option<Box<dyn Subscription>> {
        self.subscriptions.insert(wire_topic, subscription)
    }

    pub fn remove(&mut self, wire_topic: &str) -> Option<Box<dyn Subscription>> {
        self.subscriptions.remove(wire_topic)
    }

    /// Take every tracked subscription, leaving the registry empty.
    pub fn drain(&mut self) -> Vec<(String, Box<dyn Subscription>)> {
        self.subscriptions.drain().collect()
    }

    pub fn contains(&self, wire_topic: &str) -> bool {
        self.subscriptions.contains_key(wire_topic)
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.subscriptions.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
