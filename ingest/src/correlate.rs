//! Correlation: match a raw transaction's inputs and outputs against the
//! address index and build the unified record.

use std::sync::Arc;

use tracing::trace;
use txflow_chain::ChainError;
use txflow_types::{
    AddressAmount, AddressWithWalletInfo, Clock, RawTx, TypesError, UnifiedTransaction,
    WalletReference, NO_BLOCK_TIME,
};

use crate::address_index::AddressIndex;
use crate::fee::network_fee;
use crate::metrics::IngestMetrics;
use crate::resolver::{InputResolution, InputResolver};
use crate::IngestError;

pub struct Correlator {
    resolver: InputResolver,
    index: Arc<AddressIndex>,
    clock: Arc<dyn Clock>,
    metrics: Arc<IngestMetrics>,
}

impl Correlator {
    pub fn new(
        resolver: InputResolver,
        index: Arc<AddressIndex>,
        clock: Arc<dyn Clock>,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self {
            resolver,
            index,
            clock,
            metrics,
        }
    }

    /// Resolve `raw`'s inputs and match both sides against the index.
    ///
    /// Returns `None` when no tracked address is involved, and an
    /// `InvalidResponse` when the node reported impossible amounts.
    pub async fn correlate(
        &self,
        raw: &RawTx,
        block_height: i64,
    ) -> Result<Option<UnifiedTransaction>, IngestError> {
        let inputs = self.resolver.resolve_inputs(raw).await;
        if inputs.failed > 0 {
            self.metrics
                .input_resolution_failures
                .inc_by(inputs.failed as u64);
        }
        let tx = match_sides(raw, &inputs, block_height, &self.index, self.clock.now())
            .map_err(|e| ChainError::InvalidResponse(format!("{}: {e}", raw.txid)))?;
        if tx.is_none() {
            trace!(txid = %raw.txid, "no tracked address involved");
        }
        Ok(tx)
    }
}

/// Build the unified record from already-resolved inputs.
///
/// `inputs`/`outputs` list every resolved contribution; the wallet lists hold
/// only the tracked ones. The fee is fixed here, before any split; amounts
/// outside the money range fail the whole transaction.
pub fn match_sides(
    raw: &RawTx,
    resolution: &InputResolution,
    block_height: i64,
    index: &AddressIndex,
    now: i64,
) -> Result<Option<UnifiedTransaction>, TypesError> {
    let mut inputs = Vec::new();
    let mut wallets_input = Vec::new();
    for input in &resolution.resolved {
        for address in &input.addresses {
            inputs.push(AddressAmount::new(address.clone(), input.value));
            wallets_input.extend(wallet_reference(index, address, input.value));
        }
    }

    let mut outputs = Vec::new();
    let mut wallets_output = Vec::new();
    for output in &raw.outputs {
        for address in &output.addresses {
            outputs.push(AddressAmount::new(address.clone(), output.value));
            wallets_output.extend(wallet_reference(index, address, output.value));
        }
    }

    if wallets_input.is_empty() && wallets_output.is_empty() {
        return Ok(None);
    }
    let fee = network_fee(resolution, raw.output_total()?)?;

    Ok(Some(UnifiedTransaction {
        tx_id: raw.txid.clone(),
        tx_hash: raw.hash.clone(),
        block_height,
        block_time: block_time(block_height, raw.block_time, now),
        mempool_time: now,
        fee,
        exchange_rates: Vec::new(),
        inputs,
        outputs,
        wallets_input,
        wallets_output,
    }))
}

/// Wallet reference for `address` if the index tracks it.
pub(crate) fn wallet_reference(
    index: &AddressIndex,
    address: &str,
    amount: i64,
) -> Option<WalletReference> {
    index.lookup(address).map(|owner| WalletReference {
        user_id: owner.user_id,
        wallet_index: owner.wallet_index,
        address: AddressWithWalletInfo {
            address: address.to_string(),
            address_index: owner.address_index,
            amount,
        },
    })
}

/// Block time to record: the node's value, or `now` for a block the node
/// did not date, or [`NO_BLOCK_TIME`] in the mempool.
pub(crate) fn block_time(block_height: i64, reported: Option<i64>, now: i64) -> i64 {
    if block_height < 0 {
        return NO_BLOCK_TIME;
    }
    reported.unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolvedInput;
    use txflow_types::{RawInput, RawOutput, User, MEMPOOL_HEIGHT};

    fn index() -> AddressIndex {
        let users = vec![
            User::new("alice").with_wallet(0, &["A"]),
            User::new("bob").with_wallet(2, &["x", "B"]),
        ];
        AddressIndex::from_users(&users).0
    }

    fn raw(outputs: Vec<RawOutput>) -> RawTx {
        RawTx {
            txid: "t1".into(),
            hash: "h1".into(),
            inputs: vec![RawInput::spend("prev", 0)],
            outputs,
            block_time: Some(1_600_000_000),
        }
    }

    fn resolved(value: i64, address: &str) -> InputResolution {
        InputResolution {
            resolved: vec![ResolvedInput {
                value,
                addresses: vec![address.into()],
            }],
            failed: 0,
            coinbase: false,
        }
    }

    #[test]
    fn untracked_transaction_is_not_ours() {
        let raw = raw(vec![RawOutput::new(0, 90, vec!["Z".into()])]);
        assert_eq!(match_sides(&raw, &resolved(100, "Y"), 10, &index(), 0), Ok(None));
    }

    #[test]
    fn tracked_input_fills_input_side_only() {
        let raw = raw(vec![RawOutput::new(0, 4_990_000, vec!["Z".into()])]);
        let tx = match_sides(&raw, &resolved(5_000_000, "A"), MEMPOOL_HEIGHT, &index(), 7)
            .unwrap()
            .expect("ours");
        assert_eq!(tx.fee, 10_000);
        assert_eq!(tx.wallets_input.len(), 1);
        assert_eq!(tx.wallets_input[0].user_id, "alice");
        assert_eq!(tx.wallets_input[0].address.amount, 5_000_000);
        assert!(tx.wallets_output.is_empty());
        assert_eq!(tx.outputs, vec![AddressAmount::new("Z", 4_990_000)]);
        assert_eq!(tx.block_time, NO_BLOCK_TIME);
        assert_eq!(tx.mempool_time, 7);
    }

    #[test]
    fn output_match_carries_wallet_and_address_index() {
        let raw = raw(vec![
            RawOutput::new(0, 300, vec!["B".into()]),
            RawOutput::new(1, 0, vec![]),
        ]);
        let tx = match_sides(&raw, &resolved(400, "Y"), 12, &index(), 7)
            .unwrap()
            .expect("ours");
        let bob = &tx.wallets_output[0];
        assert_eq!((bob.wallet_index, bob.address.address_index), (2, 1));
        assert_eq!(bob.address.amount, 300);
        assert_eq!(tx.block_time, 1_600_000_000);
        assert_eq!(tx.fee, 100);
    }

    #[test]
    fn overflowing_outputs_are_rejected() {
        let raw = raw(vec![
            RawOutput::new(0, i64::MAX, vec!["B".into()]),
            RawOutput::new(1, i64::MAX, vec!["Z".into()]),
        ]);
        let result = match_sides(&raw, &resolved(400, "Y"), 12, &index(), 7);
        assert!(matches!(result, Err(TypesError::InvalidAmount(_))));
    }

    #[test]
    fn undated_block_uses_clock() {
        assert_eq!(block_time(5, None, 99), 99);
        assert_eq!(block_time(5, Some(11), 99), 11);
        assert_eq!(block_time(MEMPOOL_HEIGHT, Some(11), 99), NO_BLOCK_TIME);
    }
}
