//! Typed - 型付き handler API
//!
//! # 二層構造
//! - **表層（Typed）**: `handler::call` などのラッパー関数, `Service<I>` trait - 型安全
//! - **内部（Dyn）**: `DynHandler<C>` trait - object-safe, type erasure
//!
//! codec と購読レジストリもここに置きます。

pub mod codec;
pub mod handler;
pub mod registry;

// 主要な trait/型 を再エクスポート
pub use self::codec::{BincodeCodec, Codec, CodecError, JsonCodec};
pub use self::handler::{DispatchError, DynHandler, Handler, Outputs, Service, Signature};
pub use self::registry::SubscriptionRegistry;
