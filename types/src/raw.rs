//! Verbose raw transactions as supplied by the node.
//!
//! Output values are already converted to minor units. Inputs only reference
//! previous outputs; their values are learned by resolving the previous transaction.

use serde::{Deserialize, Serialize};

use crate::amount::checked_total;
use crate::TypesError;

/// A verbose raw transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTx {
    pub txid: String,
    pub hash: String,
    pub inputs: Vec<RawInput>,
    pub outputs: Vec<RawOutput>,
    /// Block time reported by the node, absent for mempool transactions.
    #[serde(default)]
    pub block_time: Option<i64>,
}

/// A reference to a previous transaction's output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInput {
    /// `None` for coinbase inputs, which spend nothing.
    pub prev_txid: Option<String>,
    pub prev_vout: u32,
}

/// One transaction output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutput {
    pub n: u32,
    /// Value in minor units.
    pub value: i64,
    /// Destination addresses. Empty for unspendable or non-standard scripts,
    /// more than one for bare multisig.
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl RawInput {
    pub fn spend(prev_txid: impl Into<String>, prev_vout: u32) -> Self {
        Self {
            prev_txid: Some(prev_txid.into()),
            prev_vout,
        }
    }

    pub fn coinbase() -> Self {
        Self {
            prev_txid: None,
            prev_vout: 0,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.prev_txid.is_none()
    }
}

impl RawOutput {
    pub fn new(n: u32, value: i64, addresses: Vec<String>) -> Self {
        Self {
            n,
            value,
            addresses,
        }
    }
}

impl RawTx {
    /// Find the output with index `n`.
    ///
    /// Outputs are normally stored in index order, so the positional slot is
    /// tried first before falling back to a scan.
    pub fn output(&self, n: u32) -> Option<&RawOutput> {
        match self.outputs.get(n as usize) {
            Some(out) if out.n == n => Some(out),
            _ => self.outputs.iter().find(|out| out.n == n),
        }
    }

    /// Sum of all output values in minor units.
    ///
    /// Fails if an output or the total is outside the on-chain money range.
    pub fn output_total(&self) -> Result<i64, TypesError> {
        checked_total(self.outputs.iter().map(|out| out.value))
    }
}
