//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryBroker**: プロセス内の pub/sub ブローカー
//!
//! 本番用のトランスポート（NATS など）は `Connector` / `Transport` を
//! 実装する別クレートに置きます。

pub mod inmem_bus;

pub use self::inmem_bus::{DEFAULT_ADDRESS, InMemoryBroker, InMemoryConnection};
