//! Handler - 受信メッセージを型付き関数に束縛する
//!
//! # 二層構造
//! - **表層（Typed）**: `call`, `try_call`, `sink` などのラッパー関数と
//!   `Service<I>` trait。入力型・出力型はコンパイル時に決まる
//! - **内部（Dyn）**: `DynHandler<C>` trait。object-safe で、
//!   Dispatcher は `Arc<dyn DynHandler<C>>` だけを保持する
//!
//! 登録時にラッパー関数を選ぶことで、入力 {なし, 1 つ} × 出力
//! {なし, 値, エラー, 値+エラー} の組み合わせが決まります。
//! decode / encode はそのときに `C` に束縛されます。

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::codec::{Codec, CodecError};
use crate::domain::Envelope;

/// Declared outputs of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outputs {
    None,
    Value,
    Error,
    ValueAndError,
}

impl Outputs {
    pub fn has_value(self) -> bool {
        matches!(self, Self::Value | Self::ValueAndError)
    }

    pub fn has_error(self) -> bool {
        matches!(self, Self::Error | Self::ValueAndError)
    }
}

/// Signature は handler の入出力の形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub inputs: usize,
    pub input_type: Option<&'static str>,
    pub outputs: Outputs,
}

impl Signature {
    pub const MAX_INPUTS: usize = 1;

    pub fn nullary(outputs: Outputs) -> Self {
        Self {
            inputs: 0,
            input_type: None,
            outputs,
        }
    }

    pub fn unary<I>(outputs: Outputs) -> Self {
        Self {
            inputs: 1,
            input_type: Some(type_name::<I>()),
            outputs,
        }
    }

    pub fn expects_input(&self) -> bool {
        self.inputs > 0
    }

    /// Check the shape the dispatcher can drive.
    pub fn validate(&self) -> Result<(), String> {
        if self.inputs > Self::MAX_INPUTS {
            return Err(format!(
                "handler declares {} inputs, at most {} is supported",
                self.inputs,
                Self::MAX_INPUTS
            ));
        }
        if self.expects_input() != self.input_type.is_some() {
            return Err(format!(
                "handler declares {} inputs but input type is {:?}",
                self.inputs, self.input_type
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outputs = match (self.outputs.has_value(), self.outputs.has_error()) {
            (true, true) => "value, error",
            (true, false) => "value",
            (false, true) => "error",
            (false, false) => "()",
        };
        write!(f, "fn({}) -> {outputs}", self.input_type.unwrap_or(""))
    }
}

/// DispatchError は 1 メッセージの処理失敗
///
/// - `Decode`: 入力の decode 失敗。メッセージは捨てられ、返信しない
/// - `Encode`: 戻り値の encode 失敗。空の返信になる
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    Decode(CodecError),
    Encode(CodecError),
}

/// DynHandler は object-safe な handler の抽象化
#[async_trait]
pub trait DynHandler<C: Codec>: Send + Sync {
    fn signature(&self) -> Signature;

    /// Decode `payload`, invoke, and fold the outputs into an envelope.
    async fn call(&self, codec: &C, payload: &[u8]) -> Result<Envelope, DispatchError>;
}

/// Service は非同期の型付き handler
///
/// # 使用例
/// ```ignore
/// struct Greeter;
///
/// #[async_trait]
/// impl Service<String> for Greeter {
///     type Output = String;
///     type Error = std::convert::Infallible;
///
///     async fn handle(&self, name: String) -> Result<String, Self::Error> {
///         Ok(format!("Hello {name}"))
///     }
/// }
///
/// endpoint.subscribe("hello", false, Handler::from_service(Greeter)).await?;
/// ```
#[async_trait]
pub trait Service<I>: Send + Sync
where
    I: DeserializeOwned + Send + 'static,
{
    type Output: Serialize + Send;
    type Error: fmt::Display + Send;

    async fn handle(&self, input: I) -> Result<Self::Output, Self::Error>;
}

/// Adapts a `Service<I>` into a `DynHandler<C>`.
pub struct TypedService<I, S> {
    service: S,
    _marker: PhantomData<fn(I)>,
}

impl<I, S> TypedService<I, S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<C, I, S> DynHandler<C> for TypedService<I, S>
where
    C: Codec,
    I: DeserializeOwned + Send + 'static,
    S: Service<I>,
{
    fn signature(&self) -> Signature {
        Signature::unary::<I>(Outputs::ValueAndError)
    }

    async fn call(&self, codec: &C, payload: &[u8]) -> Result<Envelope, DispatchError> {
        let input: I = decode_input(codec, payload)?;
        let result = self.service.handle(input).await;
        fold_result(codec, result)
    }
}

type Invoke<C> = dyn Fn(&C, &[u8]) -> Result<Envelope, DispatchError> + Send + Sync;

/// Synchronous closure with its decode/encode steps already bound.
struct FnHandler<C: Codec> {
    signature: Signature,
    invoke: Box<Invoke<C>>,
}

#[async_trait]
impl<C: Codec> DynHandler<C> for FnHandler<C> {
    fn signature(&self) -> Signature {
        self.signature
    }

    async fn call(&self, codec: &C, payload: &[u8]) -> Result<Envelope, DispatchError> {
        (self.invoke)(codec, payload)
    }
}

/// Handler は Endpoint::subscribe に渡す型消去済みの handler
pub struct Handler<C: Codec> {
    inner: Arc<dyn DynHandler<C>>,
}

impl<C: Codec> Handler<C> {
    pub fn from_dyn(inner: Arc<dyn DynHandler<C>>) -> Self {
        Self { inner }
    }

    pub fn from_service<I, S>(service: S) -> Self
    where
        I: DeserializeOwned + Send + 'static,
        S: Service<I> + 'static,
    {
        Self::from_dyn(Arc::new(TypedService::new(service)))
    }

    fn from_fn(
        signature: Signature,
        invoke: impl Fn(&C, &[u8]) -> Result<Envelope, DispatchError> + Send + Sync + 'static,
    ) -> Self {
        Self::from_dyn(Arc::new(FnHandler {
            signature,
            invoke: Box::new(invoke),
        }))
    }

    pub fn signature(&self) -> Signature {
        self.inner.signature()
    }

    pub fn into_dyn(self) -> Arc<dyn DynHandler<C>> {
        self.inner
    }
}

impl<C: Codec> Clone for Handler<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Codec> fmt::Debug for Handler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("signature", &self.signature())
            .finish()
    }
}

/// One input, one value output: `fn(I) -> O`.
pub fn call<C, I, O, F>(f: F) -> Handler<C>
where
    C: Codec,
    I: DeserializeOwned + 'static,
    O: Serialize + 'static,
    F: Fn(I) -> O + Send + Sync + 'static,
{
    Handler::from_fn(
        Signature::unary::<I>(Outputs::Value),
        move |codec: &C, payload: &[u8]| {
            let input: I = decode_input(codec, payload)?;
            Ok(Envelope::success(Some(encode_value(codec, &f(input))?)))
        },
    )
}

/// One input, value and error outputs: `fn(I) -> Result<O, E>`.
pub fn try_call<C, I, O, E, F>(f: F) -> Handler<C>
where
    C: Codec,
    I: DeserializeOwned + 'static,
    O: Serialize + 'static,
    E: fmt::Display + 'static,
    F: Fn(I) -> Result<O, E> + Send + Sync + 'static,
{
    Handler::from_fn(
        Signature::unary::<I>(Outputs::ValueAndError),
        move |codec: &C, payload: &[u8]| {
            let input: I = decode_input(codec, payload)?;
            fold_result(codec, f(input))
        },
    )
}

/// No input, one value output: `fn() -> O`.
pub fn call0<C, O, F>(f: F) -> Handler<C>
where
    C: Codec,
    O: Serialize + 'static,
    F: Fn() -> O + Send + Sync + 'static,
{
    Handler::from_fn(
        Signature::nullary(Outputs::Value),
        move |codec: &C, _payload: &[u8]| {
            Ok(Envelope::success(Some(encode_value(codec, &f())?)))
        },
    )
}

/// No input, value and error outputs: `fn() -> Result<O, E>`.
pub fn try_call0<C, O, E, F>(f: F) -> Handler<C>
where
    C: Codec,
    O: Serialize + 'static,
    E: fmt::Display + 'static,
    F: Fn() -> Result<O, E> + Send + Sync + 'static,
{
    Handler::from_fn(
        Signature::nullary(Outputs::ValueAndError),
        move |codec: &C, _payload: &[u8]| fold_result(codec, f()),
    )
}

/// One input, no outputs: `fn(I)`. Replies carry no data.
pub fn sink<C, I, F>(f: F) -> Handler<C>
where
    C: Codec,
    I: DeserializeOwned + 'static,
    F: Fn(I) + Send + Sync + 'static,
{
    Handler::from_fn(
        Signature::unary::<I>(Outputs::None),
        move |codec: &C, payload: &[u8]| {
            let input: I = decode_input(codec, payload)?;
            f(input);
            Ok(Envelope::success(None))
        },
    )
}

/// One input, error output only: `fn(I) -> Result<(), E>`.
pub fn try_sink<C, I, E, F>(f: F) -> Handler<C>
where
    C: Codec,
    I: DeserializeOwned + 'static,
    E: fmt::Display + 'static,
    F: Fn(I) -> Result<(), E> + Send + Sync + 'static,
{
    Handler::from_fn(
        Signature::unary::<I>(Outputs::Error),
        move |codec: &C, payload: &[u8]| {
            let input: I = decode_input(codec, payload)?;
            Ok(match f(input) {
                Ok(()) => Envelope::success(None),
                Err(e) => Envelope::failure(e.to_string()),
            })
        },
    )
}

fn decode_input<C, I>(codec: &C, payload: &[u8]) -> Result<I, DispatchError>
where
    C: Codec,
    I: DeserializeOwned,
{
    codec.decode(payload).map_err(DispatchError::Decode)
}

fn encode_value<C, O>(codec: &C, value: &O) -> Result<Vec<u8>, DispatchError>
where
    C: Codec,
    O: Serialize + ?Sized,
{
    codec.encode(value).map_err(DispatchError::Encode)
}

fn fold_result<C, O, E>(codec: &C, result: Result<O, E>) -> Result<Envelope, DispatchError>
where
    C: Codec,
    O: Serialize,
    E: fmt::Display,
{
    match result {
        Ok(value) => Ok(Envelope::success(Some(encode_value(codec, &value)?))),
        Err(e) => Ok(Envelope::failure(e.to_string())),
    }
}
