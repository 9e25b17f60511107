//! [`LedgerClient`] over the node's JSON-RPC HTTP interface.

use crate::ledger::{
    Address,
    LedgerClient,
    ObjectId,
    ObjectRef,
    OwnedObjectsQuery,
    SignedTransaction,
    TransactionConfirmation,
    TransactionDigest,
};
use color_eyre::eyre::{
    Report,
    Result,
    WrapErr,
    eyre,
};
use serde::{
    Deserialize,
    de::DeserializeOwned,
};
use serde_json::{
    Value,
    json,
};
use std::{
    sync::atomic::{
        AtomicU64,
        Ordering,
    },
    time::Duration,
};
use thiserror::Error;
use tokio::time;

const JSONRPC_VERSION: &str = "2.0";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Failures reported by the node itself, as opposed to the transport.
#[derive(Debug, Error)]
enum RpcError {
    #[error("{method} failed with code {code}: {message}")]
    Response {
        method: String,
        code: i64,
        message: String,
    },
    #[error("unexpected {method} result")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RpcError {
    fn is_not_found(&self) -> bool {
        match self {
            RpcError::Response { message, .. } => {
                let message = message.to_ascii_lowercase();
                message.contains("could not find") || message.contains("not found")
            }
            RpcError::Decode { .. } => false,
        }
    }
}

/// Whether polling for a transaction should go on after `err`. Transport
/// failures and unknown digests are transient; anything else the node
/// answered is final.
fn keeps_polling(err: &Report) -> bool {
    err.downcast_ref::<RpcError>()
        .is_none_or(RpcError::is_not_found)
}

#[derive(Debug)]
pub struct JsonRpcLedgerClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl JsonRpcLedgerClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for ledger RPC")?;
        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        })
    }

    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.wait_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = request_payload(id, method, params);
        let res = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .wrap_err_with(|| format!("{method} request to {} failed", self.url))?;
        let status = res.status();
        if !status.is_success() {
            let body = res
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable body>".to_string());
            return Err(eyre!("ledger responded with {status} to {method}: {body}"));
        }
        let body: Value = res
            .json()
            .await
            .wrap_err_with(|| format!("invalid {method} response body"))?;
        parse_response(method, body)
    }

    async fn owned_objects_page(
        &self,
        owner: &Address,
        query: &OwnedObjectsQuery,
        cursor: Option<String>,
    ) -> Result<OwnedObjectsPage> {
        let filter = query
            .struct_type
            .as_ref()
            .map(|t| json!({ "StructType": t }));
        let params = json!([
            owner.to_hex(),
            {
                "filter": filter,
                "options": {
                    "showType": query.show_type,
                    "showContent": query.show_content,
                },
            },
            cursor,
            query.page_size,
        ]);
        self.call("iotax_getOwnedObjects", params).await
    }
}

impl LedgerClient for JsonRpcLedgerClient {
    async fn get_owned_objects(
        &self,
        owner: &Address,
        query: &OwnedObjectsQuery,
    ) -> Result<Vec<ObjectRef>> {
        let mut objects = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.owned_objects_page(owner, query, cursor).await?;
            for entry in page.data {
                match entry.into_object_ref() {
                    Ok(object) => objects.push(object),
                    Err(err) => tracing::warn!(?err, "skipping unreadable owned object"),
                }
            }
            match (page.has_next_page, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }
        Ok(objects)
    }

    async fn execute_transaction_block(
        &self,
        signed: &SignedTransaction,
    ) -> Result<TransactionDigest> {
        let params = json!([
            signed.bytes,
            [signed.signature],
            { "showEffects": true },
            "WaitForEffectsCert",
        ]);
        let response: TransactionBlockResponse =
            self.call("iota_executeTransactionBlock", params).await?;
        response.ensure_success()?;
        Ok(response.digest)
    }

    async fn wait_for_transaction(
        &self,
        digest: &TransactionDigest,
    ) -> Result<TransactionConfirmation> {
        let poll = async {
            loop {
                let params = json!([digest.0, { "showEffects": true }]);
                match self
                    .call::<TransactionBlockResponse>("iota_getTransactionBlock", params)
                    .await
                {
                    Ok(response) => {
                        response.ensure_success()?;
                        return Ok::<_, Report>(TransactionConfirmation {
                            digest: response.digest,
                            checkpoint: response.checkpoint.and_then(|c| c.parse().ok()),
                        });
                    }
                    Err(err) if keeps_polling(&err) => {
                        tracing::debug!(%digest, ?err, "transaction not visible yet");
                        time::sleep(self.poll_interval).await;
                    }
                    Err(err) => {
                        tracing::warn!(%digest, ?err, "giving up on transaction status");
                        return Err(err);
                    }
                }
            }
        };
        time::timeout(self.wait_timeout, poll)
            .await
            .map_err(|_| eyre!("timed out waiting for transaction {digest}"))?
    }
}

fn request_payload(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "method": method,
        "params": params,
    })
}

fn parse_response<T: DeserializeOwned>(method: &str, body: Value) -> Result<T> {
    if let Some(error) = body.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("<no message>");
        return Err(RpcError::Response {
            method: method.to_string(),
            code,
            message: message.to_string(),
        }
        .into());
    }
    let result = body
        .get("result")
        .cloned()
        .ok_or_else(|| eyre!("{method} response has neither result nor error"))?;
    serde_json::from_value(result).map_err(|source| {
        RpcError::Decode {
            method: method.to_string(),
            source,
        }
        .into()
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnedObjectsPage {
    data: Vec<OwnedObjectEntry>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct OwnedObjectEntry {
    #[serde(default)]
    data: Option<ObjectData>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectData {
    object_id: ObjectId,
    version: String,
    digest: String,
    #[serde(default, rename = "type")]
    type_tag: Option<String>,
    #[serde(default)]
    content: Option<ObjectContent>,
}

#[derive(Debug, Deserialize)]
struct ObjectContent {
    #[serde(default, rename = "type")]
    type_tag: Option<String>,
}

impl OwnedObjectEntry {
    fn into_object_ref(self) -> Result<ObjectRef> {
        let data = match (self.data, self.error) {
            (Some(data), _) => data,
            (None, Some(error)) => return Err(eyre!("object error: {error}")),
            (None, None) => return Err(eyre!("object entry without data")),
        };
        let type_tag = data
            .type_tag
            .or_else(|| data.content.and_then(|c| c.type_tag))
            .unwrap_or_default();
        Ok(ObjectRef {
            object_id: data.object_id,
            version: data
                .version
                .parse()
                .wrap_err_with(|| format!("bad version {:?}", data.version))?,
            digest: data.digest,
            type_tag,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TransactionBlockResponse {
    digest: TransactionDigest,
    #[serde(default)]
    effects: Option<Effects>,
    #[serde(default)]
    checkpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Effects {
    status: ExecutionStatus,
}

#[derive(Debug, Deserialize)]
struct ExecutionStatus {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

impl TransactionBlockResponse {
    fn ensure_success(&self) -> Result<()> {
        match &self.effects {
            Some(Effects { status }) if status.status != "success" => Err(eyre!(
                "transaction {} failed: {}",
                self.digest,
                status.error.as_deref().unwrap_or("unknown error")
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn request_payload__wraps_method_and_params() {
        let payload = request_payload(7, "iota_getTransactionBlock", json!(["abc"]));

        assert_eq!(
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "iota_getTransactionBlock",
                "params": ["abc"],
            }),
            payload
        );
    }

    #[test]
    fn parse_response__surfaces_rpc_error() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32602, "message": "Invalid params" },
        });

        let err = parse_response::<Value>("iotax_getOwnedObjects", body).unwrap_err();

        assert!(err.to_string().contains("-32602"));
        assert!(err.to_string().contains("Invalid params"));
    }

    #[test]
    fn keeps_polling__only_for_transient_failures() {
        // given
        let unknown_digest = parse_response::<Value>(
            "iota_getTransactionBlock",
            json!({
                "error": {
                    "code": -32602,
                    "message": "Could not find the referenced transaction [TransactionDigest(9xyz)]."
                }
            }),
        )
        .unwrap_err();
        let invalid_params = parse_response::<Value>(
            "iota_getTransactionBlock",
            json!({ "error": { "code": -32602, "message": "Invalid params" } }),
        )
        .unwrap_err();
        let undecodable = parse_response::<TransactionBlockResponse>(
            "iota_getTransactionBlock",
            json!({ "result": { "unexpected": true } }),
        )
        .unwrap_err();
        let transport = eyre!("connection reset by peer");

        // then
        assert!(keeps_polling(&unknown_digest));
        assert!(keeps_polling(&transport));
        assert!(!keeps_polling(&invalid_params));
        assert!(!keeps_polling(&undecodable));
    }

    #[test]
    fn owned_objects_page__reads_type_from_content_when_missing() {
        // given
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "data": [
                    {
                        "data": {
                            "objectId": "0x01",
                            "version": "12",
                            "digest": "D1",
                            "content": { "type": "0x2::coin::Coin<0xb0b::brownie::BROWNIE>" }
                        }
                    },
                    { "error": { "code": "deleted" } }
                ],
                "nextCursor": "0x01",
                "hasNextPage": false
            }
        });

        // when
        let page: OwnedObjectsPage = parse_response("iotax_getOwnedObjects", body).unwrap();
        let mut entries = page.data.into_iter();
        let object = entries.next().unwrap().into_object_ref().unwrap();

        // then
        assert_eq!(12, object.version);
        assert!(object.is_coin_of("0xb0b::brownie::BROWNIE"));
        assert!(entries.next().unwrap().into_object_ref().is_err());
        assert!(!page.has_next_page);
    }

    #[test]
    fn ensure_success__rejects_failed_effects() {
        let response: TransactionBlockResponse = serde_json::from_value(json!({
            "digest": "9xyz",
            "effects": { "status": { "status": "failure", "error": "InsufficientGas" } },
        }))
        .unwrap();

        let err = response.ensure_success().unwrap_err();

        assert!(err.to_string().contains("InsufficientGas"));
    }

    #[test]
    fn ensure_success__accepts_success_and_reads_checkpoint() {
        let response: TransactionBlockResponse = serde_json::from_value(json!({
            "digest": "9xyz",
            "effects": { "status": { "status": "success" } },
            "checkpoint": "42",
        }))
        .unwrap();

        assert!(response.ensure_success().is_ok());
        assert_eq!(Some("42".to_string()), response.checkpoint);
    }
}
