/// JSON-RPC / WebSocket ledger client
use super::types::{parse_flex_u64, LedgerRound};
use super::{LedgerConnector, LedgerSource};
use crate::backend::HttpClient;
use crate::config::LedgerConfig;
use crate::errors::{FeedError, FeedResult};
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

/// Buffered round events between the socket reader and the consumer
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Clone)]
struct RpcMethods {
    count: String,
    round: String,
    subscribe: String,
}

pub struct JsonRpcLedger {
    http: HttpClient,
    rpc_url: Url,
    ws_url: Url,
    methods: RpcMethods,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    pub fn new(config: &LedgerConfig) -> FeedResult<Self> {
        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        let http = HttpClient::new(request_timeout).map_err(FeedError::Config)?;

        Ok(Self {
            http,
            rpc_url: parse_url(&config.rpc_url)?,
            ws_url: parse_url(&config.ws_url)?,
            methods: RpcMethods {
                count: config.count_method.clone(),
                round: config.round_method.clone(),
                subscribe: config.subscribe_method.clone(),
            },
            request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, method: &str, params: Value) -> FeedResult<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self.http.client().post(self.rpc_url.clone()).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                endpoint: format!("ledger.{}", method),
                status: status.as_u16(),
            });
        }

        let body: RpcResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(FeedError::Rpc { code: error.code, message: error.message });
        }

        body.result
            .ok_or_else(|| FeedError::InvalidResponse(format!("{}: missing result", method)))
    }
}

#[async_trait]
impl LedgerSource for JsonRpcLedger {
    async fn round_count(&self) -> FeedResult<u64> {
        let result = self.call(&self.methods.count, json!([])).await?;
        parse_flex_u64(&result).ok_or_else(|| {
            FeedError::InvalidResponse(format!("{}: expected a count, got {}", self.methods.count, result))
        })
    }

    async fn round(&self, number: u64) -> FeedResult<LedgerRound> {
        let result = self.call(&self.methods.round, json!([number])).await?;
        LedgerRound::from_value(result)
    }

    async fn subscribe_rounds(&self) -> FeedResult<mpsc::Receiver<LedgerRound>> {
        let (ws_stream, _) = tokio::time::timeout(self.request_timeout, connect_async(self.ws_url.as_str()))
            .await
            .map_err(|_| FeedError::Timeout(format!("WebSocket connect to {}", self.ws_url)))?
            .map_err(|e| FeedError::Network(format!("Failed to connect to WebSocket: {}", e)))?;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let subscribe = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: &self.methods.subscribe,
            params: json!([]),
        };
        let subscribe_text = serde_json::to_string(&subscribe)?;

        ws_sender
            .send(Message::Text(subscribe_text))
            .await
            .map_err(|e| FeedError::Network(format!("Failed to send subscription: {}", e)))?;

        logger::debug(
            LogTag::Subscriber,
            &format!("Subscribed to {} on {}", self.methods.subscribe, self.ws_url),
        );

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            // held so the socket stays open for the lifetime of the reader
            let _ws_sender = ws_sender;

            while let Some(message) = ws_receiver.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if let Some(round) = parse_notification(&text) {
                            if tx.send(round).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        logger::debug(LogTag::Subscriber, "WebSocket closed by ledger");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        logger::debug(LogTag::Subscriber, &format!("WebSocket error: {}", e));
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Round carried by a subscription notification
///
/// Subscription confirmations and unrelated messages yield `None`.
pub fn parse_notification(text: &str) -> Option<LedgerRound> {
    let message: Value = serde_json::from_str(text).ok()?;
    let params = message.get("params")?;
    let payload = params.get("result").unwrap_or(params).clone();

    match LedgerRound::from_value(payload) {
        Ok(round) => Some(round),
        Err(e) => {
            logger::debug(LogTag::Subscriber, &format!("Ignoring notification: {}", e));
            None
        }
    }
}

/// Connects by probing the round count within the gate's timeout
pub struct JsonRpcConnector {
    config: LedgerConfig,
}

impl JsonRpcConnector {
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LedgerConnector for JsonRpcConnector {
    async fn connect(&self) -> FeedResult<Arc<dyn LedgerSource>> {
        let ledger = JsonRpcLedger::new(&self.config)?;
        let count = ledger.round_count().await?;
        logger::debug(LogTag::Ledger, &format!("Ledger reports {} recorded rounds", count));
        Ok(Arc::new(ledger))
    }
}

fn parse_url(value: &str) -> FeedResult<Url> {
    Url::parse(value).map_err(|e| FeedError::Config(format!("Invalid URL '{}': {}", value, e)))
}
