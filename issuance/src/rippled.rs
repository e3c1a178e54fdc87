//! rippled client over WebSocket.
//!
//! Speaks rippled's native WebSocket API: every request is one JSON object
//! carrying `id`, `command` and the method fields at the top level, and every
//! reply echoes the `id` inside a `{"status", "type": "response", "result"}`
//! envelope. Unsolicited stream messages are skipped. Signing and address
//! derivation are delegated to the node (`sign` with `offline: true`,
//! `wallet_propose`), so the endpoint must be a node that permits them.
//!
//! ```no_run
//! use issuance::config::RippledRpcConfig;
//! use issuance::rippled::RippledClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RippledClient::connect("ws://127.0.0.1:6006", RippledRpcConfig::default()).await?;
//! println!("current ledger {}", client.ledger_current().await?);
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::config::RippledRpcConfig;
use crate::credential::{Credential, Secret};
use crate::error::IssuanceError;
use crate::ledger::{
    AccountInfo, Drops, LedgerClient, LedgerConnector, SignedTransaction, SubmitOutcome,
    Transaction, TrustLineEntry,
};

/// Error token rippled returns for an unfunded address.
const ACCOUNT_NOT_FOUND: &str = "actNotFound";
/// Error token of `tx` while the transaction is not yet known to the node.
const TXN_NOT_FOUND: &str = "txnNotFound";
/// Prefix of seeds encoded for Ed25519 keys.
const ED25519_SEED_PREFIX: &str = "sEd";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens one [`RippledClient`] per orchestration.
#[derive(Clone, Debug, Default)]
pub struct RippledConnector {
    config: RippledRpcConfig,
}

impl RippledConnector {
    pub fn new(config: RippledRpcConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LedgerConnector for RippledConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn LedgerClient>, IssuanceError> {
        let client = RippledClient::connect(endpoint, self.config.clone()).await?;
        Ok(Box::new(client))
    }
}

/// Reply of one rippled command.
#[derive(Debug)]
enum Reply {
    Success(Value),
    Error { token: String, message: String },
}

enum Link {
    Open(WsStream),
    /// The socket failed; the next command reconnects.
    Dropped,
    /// Closed by `disconnect`; never reopened.
    Closed,
}

pub struct RippledClient {
    link: Mutex<Link>,
    next_id: AtomicU64,
    endpoint: String,
    config: RippledRpcConfig,
}

impl RippledClient {
    pub async fn connect(endpoint: &str, config: RippledRpcConfig) -> Result<Self, IssuanceError> {
        let stream = Self::open(endpoint, &config).await?;
        debug!(endpoint, "connected to rippled");
        Ok(Self {
            link: Mutex::new(Link::Open(stream)),
            next_id: AtomicU64::new(1),
            endpoint: endpoint.to_string(),
            config,
        })
    }

    async fn open(endpoint: &str, config: &RippledRpcConfig) -> Result<WsStream, IssuanceError> {
        match tokio::time::timeout(config.connection_timeout, connect_async(endpoint)).await {
            Ok(Ok((stream, _))) => Ok(stream),
            Ok(Err(e)) => Err(IssuanceError::Connection(format!(
                "failed to connect to {endpoint}: {e}"
            ))),
            Err(_) => Err(IssuanceError::Connection(format!(
                "timed out connecting to {endpoint}"
            ))),
        }
    }

    /// Reconnect a dropped socket. A client closed by `disconnect` stays closed.
    async fn ensure_open<'a>(&self, link: &'a mut Link) -> Result<&'a mut WsStream, IssuanceError> {
        if let Link::Dropped = link {
            let mut attempts = 0;
            loop {
                attempts += 1;
                match Self::open(&self.endpoint, &self.config).await {
                    Ok(stream) => {
                        debug!(endpoint = %self.endpoint, attempts, "reconnected to rippled");
                        *link = Link::Open(stream);
                        break;
                    }
                    Err(e) => {
                        warn!(endpoint = %self.endpoint, attempts, error = %e, "rippled reconnect failed");
                        if attempts >= self.config.max_reconnect_attempts {
                            return Err(e);
                        }
                        tokio::time::sleep(self.config.reconnect_delay).await;
                    }
                }
            }
        }
        match link {
            Link::Open(stream) => Ok(stream),
            _ => Err(IssuanceError::Connection("client is disconnected".into())),
        }
    }

    /// Send one command and wait for the reply carrying its id. A command is
    /// never resent; a broken socket is only reopened for the next one.
    async fn request(&self, command: &'static str, params: Value) -> Result<Reply, IssuanceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = request_frame(id, command, params)?;
        let mut link = self.link.lock().await;
        let stream = self.ensure_open(&mut link).await?;
        let exchanged = exchange(stream, id, frame);
        match tokio::time::timeout(self.config.request_timeout, exchanged).await {
            Ok(Ok(envelope)) => parse_reply(envelope),
            Ok(Err(e)) => {
                if matches!(e, IssuanceError::Connection(_)) {
                    *link = Link::Dropped;
                }
                Err(e)
            }
            Err(_) => {
                *link = Link::Dropped;
                Err(IssuanceError::Connection(format!(
                    "{command} timed out after {:?}",
                    self.config.request_timeout
                )))
            }
        }
    }

    async fn call(&self, command: &'static str, params: Value) -> Result<Value, IssuanceError> {
        match self.request(command, params).await? {
            Reply::Success(result) => Ok(result),
            Reply::Error { token, message } => Err(IssuanceError::Rpc(format!(
                "{command} failed: {token} {message}"
            ))),
        }
    }

    /// Index of the open ledger.
    pub async fn ledger_current(&self) -> Result<u32, IssuanceError> {
        let result = self.call("ledger_current", json!({})).await?;
        ledger_index(&result, "/ledger_current_index")
    }

    /// Index of the latest validated ledger.
    pub async fn ledger_validated(&self) -> Result<u32, IssuanceError> {
        let result = self
            .call("ledger", json!({ "ledger_index": "validated" }))
            .await?;
        ledger_index(&result, "/ledger_index")
            .or_else(|_| ledger_index(&result, "/ledger/ledger_index"))
    }

    /// Open-ledger fee, capped at the configured maximum.
    pub async fn fee(&self) -> Result<Drops, IssuanceError> {
        let result = self.call("fee", json!({})).await?;
        let open = Drops::parse(str_field(&result, "/drops/open_ledger_fee")?)?;
        let base = str_field(&result, "/drops/base_fee")
            .and_then(Drops::parse)
            .unwrap_or_default();
        Ok(open.max(base).min(self.config.max_fee))
    }

    async fn sequence(&self, address: &str) -> Result<u32, IssuanceError> {
        let params = json!({ "account": address, "ledger_index": "current" });
        match self.request("account_info", params).await? {
            Reply::Success(result) => u32_field(&result, "/account_data/Sequence"),
            Reply::Error { token, .. } if token == ACCOUNT_NOT_FOUND => {
                Err(IssuanceError::AccountNotFound(address.to_string()))
            }
            Reply::Error { token, message } => Err(IssuanceError::Rpc(format!(
                "account_info failed: {token} {message}"
            ))),
        }
    }

    async fn poll_validated(
        &self,
        hash: &str,
        last_ledger_sequence: Option<u32>,
    ) -> Result<SubmitOutcome, IssuanceError> {
        let started = Instant::now();
        loop {
            tokio::time::sleep(self.config.poll_interval).await;
            match self.request("tx", json!({ "transaction": hash })).await? {
                Reply::Success(result) if result.get("validated") == Some(&Value::Bool(true)) => {
                    let code = str_field(&result, "/meta/TransactionResult")?;
                    return Ok(SubmitOutcome {
                        hash: hash.to_string(),
                        result_code: code.to_string(),
                        validated: true,
                    });
                }
                Reply::Success(_) => {}
                Reply::Error { token, .. } if token == TXN_NOT_FOUND => {}
                Reply::Error { token, message } => {
                    return Err(IssuanceError::Rpc(format!("tx failed: {token} {message}")))
                }
            }

            if let Some(last) = last_ledger_sequence {
                if self.ledger_validated().await? > last {
                    warn!(hash, last_ledger_sequence = last, "transaction expired unvalidated");
                    return Err(IssuanceError::SubmitTimeout {
                        hash: hash.to_string(),
                    });
                }
            }
            if started.elapsed() >= self.config.submit_timeout {
                warn!(hash, "gave up waiting for validation");
                return Err(IssuanceError::SubmitTimeout {
                    hash: hash.to_string(),
                });
            }
        }
    }
}

#[async_trait]
impl LedgerClient for RippledClient {
    async fn derive_address(&self, secret: &Secret) -> Result<String, IssuanceError> {
        let mut params = Map::new();
        params.insert("seed".into(), Value::String(secret.expose().to_string()));
        if secret.expose().starts_with(ED25519_SEED_PREFIX) {
            params.insert("key_type".into(), Value::String("ed25519".into()));
        }
        let result = self.call("wallet_propose", Value::Object(params)).await?;
        Ok(str_field(&result, "/account_id")?.to_string())
    }

    async fn autofill(&self, mut tx: Transaction) -> Result<Transaction, IssuanceError> {
        if tx.sequence.is_none() {
            tx.sequence = Some(self.sequence(&tx.account).await?);
        }
        if tx.fee.is_none() {
            tx.fee = Some(self.fee().await?.0.to_string());
        }
        if tx.last_ledger_sequence.is_none() {
            let current = self.ledger_current().await?;
            tx.last_ledger_sequence = Some(current + self.config.ledger_offset);
        }
        debug!(
            account = %tx.account,
            tx_type = tx.body.transaction_type(),
            sequence = ?tx.sequence,
            fee = ?tx.fee,
            "autofilled transaction"
        );
        Ok(tx)
    }

    async fn sign(
        &self,
        tx: &Transaction,
        credential: &Credential,
    ) -> Result<SignedTransaction, IssuanceError> {
        let params = sign_params(tx.to_json()?, credential.secret());
        let result = self.call("sign", params).await?;
        Ok(SignedTransaction {
            tx_blob: str_field(&result, "/tx_blob")?.to_string(),
            hash: str_field(&result, "/tx_json/hash")?.to_string(),
            last_ledger_sequence: tx.last_ledger_sequence,
        })
    }

    async fn submit_and_wait(
        &self,
        signed: &SignedTransaction,
    ) -> Result<SubmitOutcome, IssuanceError> {
        let result = self
            .call("submit", json!({ "tx_blob": signed.tx_blob }))
            .await?;
        let engine_result = str_field(&result, "/engine_result")?;
        debug!(hash = %signed.hash, engine_result, "submitted transaction");
        if is_final_without_ledger(engine_result) {
            return Ok(SubmitOutcome {
                hash: signed.hash.clone(),
                result_code: engine_result.to_string(),
                validated: false,
            });
        }
        self.poll_validated(&signed.hash, signed.last_ledger_sequence)
            .await
    }

    async fn account_info(&self, address: &str) -> Result<AccountInfo, IssuanceError> {
        let params = json!({ "account": address, "ledger_index": "validated" });
        let result = match self.request("account_info", params).await? {
            Reply::Success(result) => result,
            Reply::Error { token, .. } if token == ACCOUNT_NOT_FOUND => {
                return Err(IssuanceError::AccountNotFound(address.to_string()))
            }
            Reply::Error { token, message } => {
                return Err(IssuanceError::Rpc(format!(
                    "account_info failed: {token} {message}"
                )))
            }
        };
        Ok(AccountInfo {
            address: address.to_string(),
            balance: Drops::parse(str_field(&result, "/account_data/Balance")?)?,
            sequence: u32_field(&result, "/account_data/Sequence")?,
        })
    }

    async fn account_lines(&self, address: &str) -> Result<Vec<TrustLineEntry>, IssuanceError> {
        let result = self
            .call(
                "account_lines",
                json!({ "account": address, "ledger_index": "validated" }),
            )
            .await?;
        let lines = result
            .get("lines")
            .and_then(Value::as_array)
            .ok_or_else(|| IssuanceError::Serialization("account_lines: missing lines".into()))?;
        lines
            .iter()
            .map(|line| {
                Ok(TrustLineEntry {
                    currency: str_field(line, "/currency")?.to_string(),
                    balance: str_field(line, "/balance")?.to_string(),
                    issuer: str_field(line, "/account")?.to_string(),
                })
            })
            .collect()
    }

    async fn disconnect(&self) -> Result<(), IssuanceError> {
        let mut link = self.link.lock().await;
        if let Link::Open(mut stream) = std::mem::replace(&mut *link, Link::Closed) {
            if let Err(e) = stream.close(None).await {
                debug!(endpoint = %self.endpoint, error = %e, "rippled close handshake failed");
            }
        }
        debug!(endpoint = %self.endpoint, "disconnected from rippled");
        Ok(())
    }
}

/// Top-level request object: `{"id", "command", ...params}`.
fn request_frame(id: u64, command: &'static str, params: Value) -> Result<Message, IssuanceError> {
    let mut frame = match params {
        Value::Object(fields) => fields,
        Value::Null => Map::new(),
        _ => {
            return Err(IssuanceError::Serialization(format!(
                "{command} parameters must be an object"
            )))
        }
    };
    frame.insert("id".into(), Value::from(id));
    frame.insert("command".into(), Value::String(command.into()));
    Ok(Message::Text(Value::Object(frame).to_string()))
}

/// Write `frame` and read until the response with `id` arrives.
async fn exchange(stream: &mut WsStream, id: u64, frame: Message) -> Result<Value, IssuanceError> {
    stream
        .send(frame)
        .await
        .map_err(|e| IssuanceError::Connection(format!("send failed: {e}")))?;
    while let Some(message) = stream.next().await {
        let text = match message.map_err(|e| IssuanceError::Connection(format!("read failed: {e}")))? {
            Message::Text(text) => text,
            Message::Binary(bytes) => String::from_utf8(bytes)
                .map_err(|e| IssuanceError::Serialization(format!("non-utf8 frame: {e}")))?,
            Message::Close(_) => break,
            _ => continue,
        };
        let envelope: Value = serde_json::from_str(&text)?;
        if envelope.get("id").and_then(Value::as_u64) == Some(id) {
            return Ok(envelope);
        }
        trace!(kind = ?envelope.get("type"), "skipping unsolicited rippled message");
    }
    Err(IssuanceError::Connection("rippled closed the connection".into()))
}

/// rippled reports command errors on the envelope (`status: "error"` with a
/// top-level `error` token); some builds nest them inside `result` instead.
fn parse_reply(envelope: Value) -> Result<Reply, IssuanceError> {
    let failed = |value: &Value| value.get("status").and_then(Value::as_str) == Some("error");
    if failed(&envelope) {
        return Ok(error_reply(&envelope));
    }
    let Some(result) = envelope.get("result") else {
        return Err(IssuanceError::Serialization(
            "rippled response has no result".into(),
        ));
    };
    if failed(result) {
        return Ok(error_reply(result));
    }
    Ok(Reply::Success(result.clone()))
}

fn error_reply(value: &Value) -> Reply {
    let token = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let message = value
        .get("error_message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Reply::Error { token, message }
}

fn sign_params(tx_json: Value, secret: &Secret) -> Value {
    let mut params = Map::new();
    params.insert("tx_json".into(), tx_json);
    params.insert("offline".into(), Value::Bool(true));
    if secret.expose().starts_with(ED25519_SEED_PREFIX) {
        params.insert("seed".into(), Value::String(secret.expose().to_string()));
        params.insert("key_type".into(), Value::String("ed25519".into()));
    } else {
        params.insert("secret".into(), Value::String(secret.expose().to_string()));
    }
    Value::Object(params)
}

/// Malformed (`tem`), failed (`tef`) and locally rejected (`tel`) results
/// never reach a ledger, so there is nothing to wait for.
fn is_final_without_ledger(engine_result: &str) -> bool {
    ["tem", "tef", "tel"]
        .iter()
        .any(|prefix| engine_result.starts_with(prefix))
}

fn str_field<'a>(value: &'a Value, pointer: &str) -> Result<&'a str, IssuanceError> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| IssuanceError::Serialization(format!("missing string field {pointer}")))
}

fn u32_field(value: &Value, pointer: &str) -> Result<u32, IssuanceError> {
    value
        .pointer(pointer)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| IssuanceError::Serialization(format!("missing integer field {pointer}")))
}

/// Ledger indexes come back as numbers or numeric strings depending on method.
fn ledger_index(value: &Value, pointer: &str) -> Result<u32, IssuanceError> {
    match value.pointer(pointer) {
        Some(Value::String(s)) => s
            .parse()
            .map_err(|e| IssuanceError::Serialization(format!("invalid ledger index {s:?}: {e}"))),
        Some(_) => u32_field(value, pointer),
        None => Err(IssuanceError::Serialization(format!("missing ledger index {pointer}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_is_parsed_into_token() {
        let reply = parse_reply(json!({
            "id": 3,
            "status": "error",
            "type": "response",
            "error": "actNotFound",
            "error_message": "Account not found.",
        }))
        .unwrap();
        match reply {
            Reply::Error { token, message } => {
                assert_eq!(token, ACCOUNT_NOT_FOUND);
                assert_eq!(message, "Account not found.");
            }
            Reply::Success(_) => panic!("expected error reply"),
        }

        let nested = parse_reply(json!({
            "id": 4,
            "type": "response",
            "result": { "status": "error", "error": "txnNotFound" },
        }))
        .unwrap();
        assert!(matches!(nested, Reply::Error { token, .. } if token == TXN_NOT_FOUND));

        let ok = parse_reply(json!({
            "id": 5,
            "status": "success",
            "type": "response",
            "result": { "ledger_current_index": 5 },
        }))
        .unwrap();
        assert!(matches!(ok, Reply::Success(result) if result["ledger_current_index"] == 5));
        assert!(parse_reply(json!({ "id": 6, "status": "success" })).is_err());
    }

    #[test]
    fn frames_put_fields_at_top_level() {
        let frame = request_frame(7, "account_info", json!({ "account": "rIssuer" })).unwrap();
        let Message::Text(text) = frame else {
            panic!("expected text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({ "id": 7, "command": "account_info", "account": "rIssuer" }));
        assert!(request_frame(8, "fee", json!([1])).is_err());
    }

    #[test]
    fn local_rejections_skip_polling() {
        assert!(is_final_without_ledger("temBAD_FEE"));
        assert!(is_final_without_ledger("tefPAST_SEQ"));
        assert!(is_final_without_ledger("telINSUF_FEE_P"));
        assert!(!is_final_without_ledger("tesSUCCESS"));
        assert!(!is_final_without_ledger("tecNO_LINE"));
        assert!(!is_final_without_ledger("terQUEUED"));
    }

    #[test]
    fn sign_params_pick_key_type_from_seed() {
        let tx = json!({ "Account": "rIssuer" });
        let ed = sign_params(tx.clone(), &Secret::new("sEdTM1uX8pu2do5XvTnutH6HsouMaM2"));
        assert_eq!(ed["key_type"], "ed25519");
        assert!(ed.get("secret").is_none());
        assert_eq!(ed["offline"], true);

        let secp = sign_params(tx, &Secret::new("snoPBrXtMeMyMHUVTgbuqAfg1SUTb"));
        assert_eq!(secp["secret"], "snoPBrXtMeMyMHUVTgbuqAfg1SUTb");
        assert!(secp.get("key_type").is_none());
    }

    #[test]
    fn ledger_index_accepts_numbers_and_strings() {
        assert_eq!(ledger_index(&json!({ "ledger_index": 42 }), "/ledger_index").unwrap(), 42);
        assert_eq!(ledger_index(&json!({ "ledger_index": "42" }), "/ledger_index").unwrap(), 42);
        assert!(ledger_index(&json!({}), "/ledger_index").is_err());
    }
}
