//! App - アプリケーション層
//!
//! ports と typed を組み合わせて Endpoint を実装します。
//!
//! # 主要コンポーネント
//! - **EndpointBuilder**: 設定の検証と接続
//! - **Endpoint**: publish / request / subscribe / close
//! - **Publisher / Subscriber**: Endpoint の役割ごとの trait
//! - **Dispatcher**: 受信メッセージ → decode → handler → 返信
//! - **EndpointStats**: 配送・返信・破棄のカウンタ

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod endpoint;
pub mod roles;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::EndpointBuilder;
pub use self::config::{ConfigError, EndpointConfig};
pub use self::dispatcher::Dispatcher;
pub use self::endpoint::Endpoint;
pub use self::roles::{Publisher, Subscriber};
pub use self::status::{EndpointStats, StatsSnapshot};
