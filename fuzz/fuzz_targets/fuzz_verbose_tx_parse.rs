#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Node responses are untrusted: parsing must fail cleanly, never panic.
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        if let Ok(tx) = txflow_chain::parse_verbose_transaction(value) {
            for output in &tx.outputs {
                assert!(tx.output(output.n).is_some());
            }
        }
    }
});
