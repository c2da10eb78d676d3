//! Confirmation-status classification and the directional split.
//!
//! Both functions are pure: the same inputs always give the same result.

use txflow_types::{
    Direction, DirectionalView, TxStatus, UnifiedTransaction, CONFIRMATIONS_REQUIRED,
};

/// Status of a transaction at `block_height` seen from `direction`, given
/// the node's `current_height`.
///
/// Negative heights are mempool. A block behind the node's view of the tip
/// (negative depth) still counts as in a block.
pub fn status(block_height: i64, current_height: i64, direction: Direction) -> TxStatus {
    if block_height < 0 {
        return TxStatus::mempool(direction);
    }
    let depth = current_height - block_height;
    if depth < CONFIRMATIONS_REQUIRED {
        TxStatus::in_block(direction)
    } else {
        TxStatus::confirmed(direction)
    }
}

/// Split `tx` into one view per side that matched a tracked wallet.
///
/// Outgoing comes first when both sides matched; both views share the
/// transaction-level fields.
pub fn split(tx: UnifiedTransaction, current_height: i64) -> Vec<DirectionalView> {
    let outgoing = !tx.wallets_input.is_empty();
    let incoming = !tx.wallets_output.is_empty();
    let height = tx.block_height;
    let view = |tx: UnifiedTransaction, direction: Direction| {
        DirectionalView::new(tx, direction, status(height, current_height, direction))
    };

    match (outgoing, incoming) {
        (true, true) => vec![
            view(tx.clone(), Direction::Outgoing),
            view(tx, Direction::Incoming),
        ],
        (true, false) => vec![view(tx, Direction::Outgoing)],
        (false, true) => vec![view(tx, Direction::Incoming)],
        (false, false) => Vec::new(),
    }
}
