//! Publisher / Subscriber - Endpoint の役割ごとの抽象
//!
//! 送るだけ、受けるだけのコードは片方の trait だけに依存できます。
//! `Endpoint` は両方を実装します。

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::endpoint::Endpoint;
use crate::domain::EndpointError;
use crate::typed::{Codec, Handler};

/// Publisher は送信側の役割
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish<P>(&self, topic: &str, payload: &P) -> Result<(), EndpointError>
    where
        P: Serialize + Sync + ?Sized;

    async fn request<P, R>(&self, topic: &str, payload: &P) -> Result<R, EndpointError>
    where
        P: Serialize + Sync + ?Sized,
        R: DeserializeOwned + Send;

    async fn request_into<P, R>(
        &self,
        topic: &str,
        payload: &P,
        reply: &mut R,
    ) -> Result<(), EndpointError>
    where
        P: Serialize + Sync + ?Sized,
        R: DeserializeOwned + Send;
}

/// Subscriber は受信側の役割
#[async_trait]
pub trait Subscriber<C: Codec>: Send + Sync {
    async fn subscribe(
        &self,
        topic: &str,
        exclusive: bool,
        handler: Handler<C>,
    ) -> Result<(), EndpointError>;

    async fn unsubscribe(&self, topic: &str);
}

#[async_trait]
impl<C: Codec> Publisher for Endpoint<C> {
    async fn publish<P>(&self, topic: &str, payload: &P) -> Result<(), EndpointError>
    where
        P: Serialize + Sync + ?Sized,
    {
        Endpoint::publish(self, topic, payload).await
    }

    async fn request<P, R>(&self, topic: &str, payload: &P) -> Result<R, EndpointError>
    where
        P: Serialize + Sync + ?Sized,
        R: DeserializeOwned + Send,
    {
        Endpoint::request(self, topic, payload).await
    }

    async fn request_into<P, R>(
        &self,
        topic: &str,
        payload: &P,
        reply: &mut R,
    ) -> Result<(), EndpointError>
    where
        P: Serialize + Sync + ?Sized,
        R: DeserializeOwned + Send,
    {
        Endpoint::request_into(self, topic, payload, reply).await
    }
}

#[async_trait]
impl<C: Codec> Subscriber<C> for Endpoint<C> {
    async fn subscribe(
        &self,
        topic: &str,
        exclusive: bool,
        handler: Handler<C>,
    ) -> Result<(), EndpointError> {
        Endpoint::subscribe(self, topic, exclusive, handler).await
    }

    async fn unsubscribe(&self, topic: &str) {
        Endpoint::unsubscribe(self, topic).await
    }
}
