//! courier-core
//!
//! pub/sub トランスポートの上に薄い層を足します。
//!
//! - トピックの名前空間（prefix）と共有 secret
//! - publish の上に request/reply の RPC 規約
//! - 受信メッセージを入出力シグネチャで選ばれた型付き handler に渡す
//!
//! # モジュール構成
//! - **domain**: TopicNamer, Envelope, EndpointError
//! - **ports**: Transport / Connector / Subscription などの抽象
//! - **typed**: Codec, 型付き Handler, SubscriptionRegistry
//! - **app**: EndpointBuilder, Endpoint, Dispatcher, 設定とカウンタ
//! - **impls**: InMemoryBroker（開発・テスト用）
//!
//! # 使用例
//! ```ignore
//! let broker = InMemoryBroker::default();
//! let endpoint = EndpointBuilder::new()
//!     .address(broker.address())
//!     .prefix("test")
//!     .secret("secret")
//!     .codec(JsonCodec)
//!     .connect(&broker)
//!     .await?;
//!
//! endpoint
//!     .subscribe("hello", false, handler::call(|name: String| format!("Hello {name}")))
//!     .await?;
//! let reply: String = endpoint.request("hello", "world").await?;
//! ```

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{Endpoint, EndpointBuilder, EndpointConfig, Publisher, Subscriber};
pub use domain::{Envelope, EndpointError, TopicNamer};
pub use typed::{BincodeCodec, Codec, Handler, JsonCodec, handler};
