use std::error::Error;

use async_trait::async_trait;
use courier_core::app::{EndpointBuilder, EndpointConfig};
use courier_core::impls::InMemoryBroker;
use courier_core::typed::handler::{self, Service};
use courier_core::{Endpoint, Handler, JsonCodec};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct Order {
    id: u64,
    items: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Receipt {
    order_id: u64,
    total_items: usize,
}

/// 非同期 handler の例
struct Checkout;

#[async_trait]
impl Service<Order> for Checkout {
    type Output = Receipt;
    type Error = String;

    async fn handle(&self, order: Order) -> Result<Receipt, String> {
        if order.items.is_empty() {
            return Err(format!("order {} has no items", order.id));
        }
        Ok(Receipt {
            order_id: order.id,
            total_items: order.items.len(),
        })
    }
}

/// config を元に endpoint を 1 つ作る（id だけ差し替え）
async fn endpoint(
    broker: &InMemoryBroker,
    config: &EndpointConfig,
    id: &str,
) -> Result<Endpoint<JsonCodec>, Box<dyn Error>> {
    let endpoint = EndpointBuilder::new()
        .config(config.clone())
        .id(id)
        .codec(JsonCodec)
        .connect(broker)
        .await?;
    Ok(endpoint)
}

fn que(worker: String) -> Handler<JsonCodec> {
    handler::call(move |name: String| format!("Hello {name} from {worker}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // (A) 設定: COURIER_* 環境変数、未指定なら demo 用の値
    let broker = InMemoryBroker::default();
    let mut config = EndpointConfig::from_env()?;
    if config.address.is_empty() {
        config.address = broker.address().to_string();
    }
    if config.prefix.is_empty() {
        config.prefix = "test".to_string();
    }
    if config.secret.is_empty() {
        config.secret = "secret".to_string();
    }

    // (B) subscriber を 2 つ用意
    let sub1 = endpoint(&broker, &config, "s1").await?;
    let sub2 = endpoint(&broker, &config, "s2").await?;

    for sub in [&sub1, &sub2] {
        sub.subscribe("hello", false, handler::call(|name: String| format!("Hello {name}")))
            .await?;
        sub.subscribe("helloQue", true, que(sub.id().to_string())).await?;
    }
    sub1.subscribe(
        "helloWithError",
        false,
        handler::try_call(|name: String| {
            if name != "world" {
                return Err("name should be only world".to_string());
            }
            Ok(format!("Hello {name}"))
        }),
    )
    .await?;
    sub1.subscribe("checkout", false, Handler::from_service(Checkout))
        .await?;

    // (C) publisher
    let publisher = endpoint(&broker, &config, "p1").await?;

    let mut res = String::new();
    publisher.request_into("hello", "world", &mut res).await?;
    info!(result = %res, "hello");

    match publisher.request::<_, String>("helloWithError", "arief").await {
        Ok(res) => info!(result = %res, "helloWithError"),
        Err(e) => info!(error = %e, "helloWithError failed as expected"),
    }

    for _ in 0..5 {
        let res: String = publisher.request("helloQue", "world").await?;
        info!(result = %res, "helloQue");
    }

    let order = Order {
        id: 42,
        items: vec!["tea".to_string(), "rice".to_string()],
    };
    let receipt: Receipt = publisher.request("checkout", &order).await?;
    info!(?receipt, "checkout");

    info!(sub1 = ?sub1.stats(), sub2 = ?sub2.stats(), publisher = ?publisher.stats(), "stats");

    // (D) 後片付け
    for endpoint in [&publisher, &sub1, &sub2] {
        endpoint.close().await;
    }
    Ok(())
}
