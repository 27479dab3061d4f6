//! Status - Endpoint のカウンタ
//!
//! 不正な payload の破棄は返信を返さない（プロトコル上の仕様）ので、
//! ここの `dropped` カウンタだけが痕跡になります。

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct EndpointStats {
    published: AtomicU64,
    requests: AtomicU64,
    delivered: AtomicU64,
    replied: AtomicU64,
    dropped: AtomicU64,
    handler_errors: AtomicU64,
}

/// Point-in-time copy of `EndpointStats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub published: u64,
    pub requests: u64,
    pub delivered: u64,
    pub replied: u64,
    pub dropped: u64,
    pub handler_errors: u64,
}

impl EndpointStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_replied(&self) {
        self.replied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            replied: self.replied.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
        }
    }
}
