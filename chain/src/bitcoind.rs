//! bitcoind-compatible JSON-RPC client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use txflow_types::{to_minor_units, RawInput, RawOutput, RawTx};

use crate::{ChainError, ChainFeed, NodeResolver};

/// bitcoind's error code for "No such mempool or blockchain transaction".
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;
/// bitcoind's error code for "Block height out of range".
const RPC_INVALID_PARAMETER: i64 = -8;

/// HTTP client for a bitcoind-compatible node.
///
/// Wraps `reqwest::Client` with the node's URL and credentials and provides
/// typed methods for the RPC calls the pipeline needs.
#[derive(Clone)]
pub struct BitcoindClient {
    http: reqwest::Client,
    url: String,
    user: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<serde_json::Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct VerboseTx {
    txid: String,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    vin: Vec<VerboseInput>,
    #[serde(default)]
    vout: Vec<VerboseOutput>,
    #[serde(default)]
    blocktime: Option<i64>,
}

#[derive(Deserialize)]
struct VerboseInput {
    #[serde(default)]
    txid: Option<String>,
    #[serde(default)]
    vout: Option<u32>,
    #[serde(default)]
    coinbase: Option<String>,
}

#[derive(Deserialize)]
struct VerboseOutput {
    value: f64,
    n: u32,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: ScriptPubKey,
}

#[derive(Deserialize)]
struct ScriptPubKey {
    /// Newer nodes report a single `address`.
    #[serde(default)]
    address: Option<String>,
    /// Older nodes report an `addresses` list.
    #[serde(default)]
    addresses: Vec<String>,
}

#[derive(Deserialize)]
struct VerboseBlock {
    #[serde(default)]
    tx: Vec<String>,
}

/// Convert a `getrawtransaction <txid> true` result into a [`RawTx`].
pub fn parse_verbose_transaction(value: serde_json::Value) -> Result<RawTx, ChainError> {
    let verbose: VerboseTx = serde_json::from_value(value)
        .map_err(|e| ChainError::InvalidResponse(format!("verbose transaction: {e}")))?;

    let inputs = verbose
        .vin
        .into_iter()
        .map(|vin| match (vin.coinbase, vin.txid) {
            (Some(_), _) | (None, None) => RawInput::coinbase(),
            (None, Some(txid)) => RawInput::spend(txid, vin.vout.unwrap_or(0)),
        })
        .collect();

    let mut outputs = Vec::with_capacity(verbose.vout.len());
    for vout in verbose.vout {
        let value = to_minor_units(vout.value)
            .map_err(|e| ChainError::InvalidResponse(format!("output {}: {e}", vout.n)))?;
        let mut addresses = vout.script_pub_key.addresses;
        if let Some(address) = vout.script_pub_key.address {
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }
        outputs.push(RawOutput::new(vout.n, value, addresses));
    }

    Ok(RawTx {
        hash: verbose.hash.unwrap_or_else(|| verbose.txid.clone()),
        txid: verbose.txid,
        inputs,
        outputs,
        block_time: verbose.blocktime,
    })
}

impl BitcoindClient {
    /// Create a client targeting `url` (e.g. `http://127.0.0.1:8332`).
    ///
    /// `timeout` bounds every request, including connection setup.
    pub fn new(
        url: impl Into<String>,
        user: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ChainError::NodeUnavailable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            user,
            password,
        })
    }

    /// The configured node URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a JSON-RPC request and return the `result` field.
    async fn rpc_call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ChainError> {
        let body = serde_json::json!({
            "jsonrpc": "1.0",
            "id": "txflow",
            "method": method,
            "params": params,
        });

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ChainError::NodeUnavailable(format!("{method}: request timed out"))
            } else {
                ChainError::NodeUnavailable(format!("{method}: request failed: {e}"))
            }
        })?;

        // bitcoind answers RPC-level errors with HTTP 404/500 and a JSON body,
        // so the body is decoded before looking at the status.
        let status = response.status();
        let rpc: RpcResponse = response.json().await.map_err(|e| {
            ChainError::InvalidResponse(format!("{method}: HTTP {status}, invalid JSON: {e}"))
        })?;

        if let Some(err) = rpc.error {
            return Err(match err.code {
                RPC_INVALID_ADDRESS_OR_KEY | RPC_INVALID_PARAMETER => {
                    ChainError::NotFound(format!("{method}: {}", err.message))
                }
                _ => ChainError::NodeUnavailable(format!(
                    "{method}: error {}: {}",
                    err.code, err.message
                )),
            });
        }

        rpc.result
            .ok_or_else(|| ChainError::InvalidResponse(format!("{method}: missing result")))
    }
}

#[async_trait]
impl NodeResolver for BitcoindClient {
    async fn get_raw_transaction(&self, txid: &str) -> Result<RawTx, ChainError> {
        debug!(txid, "getrawtransaction");
        let result = self
            .rpc_call("getrawtransaction", serde_json::json!([txid, true]))
            .await?;
        parse_verbose_transaction(result)
    }

    async fn get_block_height(&self) -> Result<i64, ChainError> {
        let result = self.rpc_call("getblockcount", serde_json::json!([])).await?;
        result
            .as_i64()
            .ok_or_else(|| ChainError::InvalidResponse("getblockcount: not an integer".into()))
    }
}

#[async_trait]
impl ChainFeed for BitcoindClient {
    async fn mempool_tx_ids(&self) -> Result<Vec<String>, ChainError> {
        let result = self.rpc_call("getrawmempool", serde_json::json!([])).await?;
        serde_json::from_value(result)
            .map_err(|e| ChainError::InvalidResponse(format!("getrawmempool: {e}")))
    }

    async fn block_tx_ids(&self, height: i64) -> Result<Vec<String>, ChainError> {
        let hash = self
            .rpc_call("getblockhash", serde_json::json!([height]))
            .await?;
        let hash = hash
            .as_str()
            .ok_or_else(|| ChainError::InvalidResponse("getblockhash: not a string".into()))?
            .to_string();
        let block = self
            .rpc_call("getblock", serde_json::json!([hash, 1]))
            .await?;
        let block: VerboseBlock = serde_json::from_value(block)
            .map_err(|e| ChainError::InvalidResponse(format!("getblock: {e}")))?;
        Ok(block.tx)
    }
}
