#![no_main]

use libfuzzer_sys::fuzz_target;
use txflow_types::TxStatus;

fuzz_target!(|data: &[u8]| {
    // Stored status codes come back from the ledger; any byte must either
    // decode to a status that re-encodes to itself or be rejected.
    for &code in data {
        if let Ok(status) = TxStatus::try_from(code) {
            assert_eq!(status.code(), code);
        }
    }
    let _ = serde_json::from_slice::<TxStatus>(data);
});
