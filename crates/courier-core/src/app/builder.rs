//! EndpointBuilder - Endpoint の構築と接続
//!
//! # Fail-fast 設計
//! - codec が未設定なら `EndpointError::CodecRequired`
//! - 接続できなければ `EndpointError::Connect`
//! - どちらの場合も中途半端な Endpoint は返さない

use std::time::Duration;

use tracing::info;
use ulid::Ulid;

use super::config::EndpointConfig;
use super::endpoint::Endpoint;
use crate::domain::{EndpointError, TopicNamer};
use crate::ports::Connector;
use crate::typed::Codec;

/// EndpointBuilder は Endpoint を構築
///
/// # 使用例
/// ```ignore
/// let endpoint = EndpointBuilder::new()
///     .id("s1")
///     .address(broker.address())
///     .prefix("test")
///     .secret("secret")
///     .codec(JsonCodec)
///     .connect(&broker)
///     .await?;
/// ```
pub struct EndpointBuilder<C: Codec> {
    config: EndpointConfig,
    codec: Option<C>,
}

impl<C: Codec> EndpointBuilder<C> {
    pub fn new() -> Self {
        Self {
            config: EndpointConfig::default(),
            codec: None,
        }
    }

    /// Replace every setting with `config`; the codec is kept.
    pub fn config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.config.secret = secret.into();
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn codec(mut self, codec: C) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Validate, connect, and hand back a connected `Endpoint`.
    pub async fn connect(self, connector: &dyn Connector) -> Result<Endpoint<C>, EndpointError> {
        let codec = self.codec.ok_or(EndpointError::CodecRequired)?;
        let transport = connector
            .connect(&self.config.address)
            .await
            .map_err(EndpointError::Connect)?;

        let id = if self.config.id.is_empty() {
            Ulid::new().to_string()
        } else {
            self.config.id.clone()
        };
        let namer = TopicNamer::new(self.config.prefix.clone(), self.config.secret.clone());

        info!(
            endpoint = %id,
            address = %self.config.address,
            prefix = %namer.prefix(),
            codec = codec.name(),
            "endpoint connected"
        );
        Ok(Endpoint::new(
            id,
            namer,
            self.config.default_timeout(),
            codec,
            transport,
        ))
    }
}

impl<C: Codec> Default for EndpointBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}
