//! Span constructors shared by the pipeline and its triggers, so every
//! log line carries the same field names.

use tracing::{info_span, Span};

/// One raw transaction moving through correlate/classify/persist/notify.
pub fn tx_process_span(tx_id: &str, block_height: i64) -> Span {
    info_span!("tx_process", txid = %tx_id, height = block_height)
}

/// One pass of a trigger (mempool poll, block poll, resync step).
pub fn trigger_span(trigger: &str, height: i64) -> Span {
    info_span!("trigger", kind = %trigger, height = height)
}

/// One account-model event.
pub fn account_event_span(hash: &str, kind: &str) -> Span {
    info_span!("account_event", hash = %hash, kind = %kind)
}
