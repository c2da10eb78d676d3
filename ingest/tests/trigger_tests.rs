//! Trigger loops driven against the nullable node: mempool polling, block
//! polling with the confirmation sweep, and resync.

use std::sync::Arc;
use std::time::Duration;

use txflow_ingest::{
    resync, BlockListener, IngestConfig, IngestMetrics, MempoolListener, Pipeline, PipelineDeps,
    ShutdownController,
};
use txflow_nullables::{NullClock, NullNode, NullNotifier, NullStore};
use txflow_types::{RawInput, RawOutput, RawTx, TxStatus, User};

const H: i64 = 1_000;

struct Harness {
    node: Arc<NullNode>,
    store: Arc<NullStore>,
    config: IngestConfig,
    pipeline: Arc<Pipeline>,
}

async fn harness() -> Harness {
    let node = Arc::new(NullNode::new(H));
    let store = Arc::new(NullStore::with_users([User::new("bob").with_wallet(0, &["B"])]));
    let config = IngestConfig {
        max_concurrent_txs: 2,
        mempool_poll_interval_ms: 10,
        block_poll_interval_ms: 10,
        ..IngestConfig::default()
    };
    let deps = PipelineDeps {
        node: node.clone(),
        users: store.clone(),
        ledger: store.clone(),
        rates: store.clone(),
        notifier: Arc::new(NullNotifier::new()),
        clock: Arc::new(NullClock::new(1_700_000_000)),
    };
    let pipeline = Pipeline::start(&config, deps, Arc::new(IngestMetrics::new()))
        .await
        .expect("index loads");
    Harness {
        node,
        store,
        config,
        pipeline: Arc::new(pipeline),
    }
}

fn payment(txid: &str, address: &str) -> RawTx {
    RawTx {
        txid: txid.into(),
        hash: txid.into(),
        inputs: vec![RawInput::coinbase()],
        outputs: vec![RawOutput::new(0, 1_000, vec![address.into()])],
        block_time: None,
    }
}

#[tokio::test]
async fn mempool_poll_processes_each_txid_once() {
    let h = harness().await;
    for i in 0..5 {
        h.node.add_mempool_tx(payment(&format!("m{i}"), "B"));
    }
    h.node.add_mempool_tx(payment("other", "Z"));
    let listener = MempoolListener::new(h.pipeline.clone(), h.node.clone(), &h.config);

    let report = listener.poll_once().await.unwrap();
    assert_eq!(report.processed, 6);
    assert_eq!(report.matched, 5);
    assert_eq!(h.store.ledger("bob").len(), 5);

    let calls = h.node.raw_tx_calls();
    let again = listener.poll_once().await.unwrap();
    assert_eq!(again.processed, 0);
    assert_eq!(h.node.raw_tx_calls(), calls);
}

#[tokio::test]
async fn vanished_mempool_tx_is_counted_as_failed() {
    let h = harness().await;
    h.node.add_mempool_tx(payment("gone", "B"));
    h.node.fail_tx("gone");
    let listener = MempoolListener::new(h.pipeline.clone(), h.node.clone(), &h.config);
    let report = listener.poll_once().await.unwrap();
    assert_eq!((report.processed, report.failed), (0, 1));
}

#[tokio::test]
async fn mempool_tx_with_impossible_amounts_is_counted_as_failed() {
    let h = harness().await;
    let mut huge = payment("huge", "B");
    huge.outputs.push(RawOutput::new(1, i64::MAX, vec!["B".into()]));
    h.node.add_mempool_tx(huge);
    h.node.add_mempool_tx(payment("fine", "B"));
    let listener = MempoolListener::new(h.pipeline.clone(), h.node.clone(), &h.config);

    let report = listener.poll_once().await.unwrap();
    assert_eq!((report.processed, report.matched, report.failed), (1, 1, 1));
    assert_eq!(h.store.ledger("bob").len(), 1);
}

#[tokio::test]
async fn block_listener_walks_new_heights_and_sweeps_matured_block() {
    let h = harness().await;
    h.node.add_block_tx(H - 6, payment("old", "B"));
    h.node.add_block_tx(H, payment("tip", "B"));
    h.node.add_block_tx(H + 1, payment("next", "B"));

    let listener = BlockListener::new(h.pipeline.clone(), h.node.clone(), &h.config, Some(H - 1));
    let report = listener.poll_once().await.unwrap();
    assert_eq!(report.blocks, 1);
    assert_eq!(listener.last_height().await, Some(H));

    let ledger = h.store.ledger("bob");
    let status = |txid: &str| {
        ledger
            .iter()
            .find(|e| e.view.tx.tx_id == txid)
            .map(|e| e.view.status)
    };
    assert_eq!(status("tip"), Some(TxStatus::AppearedInBlockIncoming));
    assert_eq!(status("old"), Some(TxStatus::InBlockConfirmedIncoming));
    assert_eq!(status("next"), None);

    h.node.set_height(H + 1);
    let report = listener.poll_once().await.unwrap();
    assert_eq!(report.blocks, 1);
    assert_eq!(listener.last_height().await, Some(H + 1));
    assert_eq!(h.store.ledger("bob").len(), 3);
}

#[tokio::test]
async fn block_listener_retries_a_missing_block() {
    let h = harness().await;
    h.node.set_height(H + 2);
    h.node.add_block_tx(H + 1, payment("a", "B"));
    // H + 2 is not known to the node yet.
    let listener = BlockListener::new(h.pipeline.clone(), h.node.clone(), &h.config, Some(H));

    assert!(listener.poll_once().await.is_err());
    assert_eq!(listener.last_height().await, Some(H + 1));

    h.node.add_block_tx(H + 2, payment("b", "B"));
    listener.poll_once().await.unwrap();
    assert_eq!(listener.last_height().await, Some(H + 2));
}

#[tokio::test]
async fn resync_replays_range_with_recorded_heights() {
    let h = harness().await;
    h.node.add_block_tx(H - 20, payment("r1", "B"));
    h.node.add_block_tx(H - 2, payment("r2", "B"));
    let shutdown = ShutdownController::new();

    let report = resync(
        h.pipeline.clone(),
        h.node.clone(),
        &h.config,
        H - 20,
        H - 2,
        shutdown.subscribe(),
    )
    .await
    .unwrap();
    // Heights without a known block are skipped.
    assert_eq!(report.blocks, 2);
    assert_eq!(report.matched, 2);

    let ledger = h.store.ledger("bob");
    let r1 = ledger.iter().find(|e| e.view.tx.tx_id == "r1").unwrap();
    let r2 = ledger.iter().find(|e| e.view.tx.tx_id == "r2").unwrap();
    assert_eq!(r1.view.status, TxStatus::InBlockConfirmedIncoming);
    assert_eq!(r1.view.tx.block_height, H - 20);
    assert_eq!(r2.view.status, TxStatus::AppearedInBlockIncoming);
}

#[tokio::test]
async fn resync_rejects_inverted_range() {
    let h = harness().await;
    let shutdown = ShutdownController::new();
    let result = resync(
        h.pipeline.clone(),
        h.node.clone(),
        &h.config,
        10,
        5,
        shutdown.subscribe(),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn listener_stops_on_shutdown() {
    let h = harness().await;
    let listener = Arc::new(MempoolListener::new(
        h.pipeline.clone(),
        h.node.clone(),
        &h.config,
    ));
    let shutdown = ShutdownController::new();
    let rx = shutdown.subscribe();
    let task = tokio::spawn({
        let listener = listener.clone();
        async move { listener.run(rx).await }
    });

    h.node.add_mempool_tx(payment("late", "B"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.shutdown();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("listener exits")
        .unwrap();
    assert_eq!(h.store.ledger("bob").len(), 1);
}
