//! Time-bounded node access and previous-output resolution.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::warn;
use txflow_chain::{ChainError, NodeResolver};
use txflow_types::{checked_total, money_range, RawInput, RawTx, TypesError};

/// Run `fut`, failing with `on_timeout(limit_ms)` if it takes longer than `limit`.
pub(crate) async fn bounded<T, E, F>(
    limit: Duration,
    fut: F,
    on_timeout: fn(u64) -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(limit.as_millis() as u64)),
    }
}

/// The output an input spends: its value and the addresses it paid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedInput {
    pub value: i64,
    pub addresses: Vec<String>,
}

/// Outcome of resolving every input of one transaction.
#[derive(Clone, Debug, Default)]
pub struct InputResolution {
    /// Resolved inputs, in input order.
    pub resolved: Vec<ResolvedInput>,
    /// Inputs whose previous output could not be fetched.
    pub failed: usize,
    pub coinbase: bool,
}

impl InputResolution {
    /// Sum of the resolved input values.
    pub fn total(&self) -> Result<i64, TypesError> {
        checked_total(self.resolved.iter().map(|input| input.value))
    }
}

/// Node access with a deadline on every call.
#[derive(Clone)]
pub struct InputResolver {
    node: Arc<dyn NodeResolver>,
    timeout: Duration,
}

impl InputResolver {
    pub fn new(node: Arc<dyn NodeResolver>, timeout: Duration) -> Self {
        Self { node, timeout }
    }

    pub async fn raw_transaction(&self, txid: &str) -> Result<RawTx, ChainError> {
        bounded(
            self.timeout,
            self.node.get_raw_transaction(txid),
            ChainError::Timeout,
        )
        .await
    }

    pub async fn chain_height(&self) -> Result<i64, ChainError> {
        bounded(self.timeout, self.node.get_block_height(), ChainError::Timeout).await
    }

    /// Fetch the output `input` spends. Coinbase inputs resolve to `None`.
    pub async fn resolve_input(&self, input: &RawInput) -> Result<Option<ResolvedInput>, ChainError> {
        let Some(prev_txid) = input.prev_txid.as_deref() else {
            return Ok(None);
        };
        let prev = self.raw_transaction(prev_txid).await?;
        let output = prev.output(input.prev_vout).ok_or_else(|| {
            ChainError::InvalidResponse(format!(
                "{prev_txid} has no output {}",
                input.prev_vout
            ))
        })?;
        if !money_range(output.value) {
            return Err(ChainError::InvalidResponse(format!(
                "{prev_txid} output {} has value {}",
                input.prev_vout, output.value
            )));
        }
        Ok(Some(ResolvedInput {
            value: output.value,
            addresses: output.addresses.clone(),
        }))
    }

    /// Resolve every input of `raw` concurrently.
    ///
    /// A failed input is logged and skipped; the others still resolve.
    pub async fn resolve_inputs(&self, raw: &RawTx) -> InputResolution {
        let results = join_all(raw.inputs.iter().map(|input| self.resolve_input(input))).await;

        let mut resolution = InputResolution {
            coinbase: raw.inputs.iter().any(RawInput::is_coinbase),
            ..Default::default()
        };
        for (input, result) in raw.inputs.iter().zip(results) {
            match result {
                Ok(Some(resolved)) => resolution.resolved.push(resolved),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        txid = %raw.txid,
                        prev_txid = ?input.prev_txid,
                        vout = input.prev_vout,
                        error = %e,
                        "input resolution failed, skipping input"
                    );
                    resolution.failed += 1;
                }
            }
        }
        resolution
    }
}
