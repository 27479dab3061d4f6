//! Ports - 抽象化レイヤー
//!
//! 外部システム（pub/sub トランスポート）へのインターフェースを定義し、
//! 実装の詳細を隠蔽します。codec は `typed::codec` にあります。

pub mod transport;

pub use self::transport::{
    Connector, Message, MessageHandler, Responder, Subscription, Transport, TransportError,
};
