#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use txflow_ingest::classify::split;
use txflow_ingest::correlate::match_sides;
use txflow_ingest::resolver::{InputResolution, ResolvedInput};
use txflow_ingest::AddressIndex;
use txflow_types::{RawInput, RawOutput, RawTx, User};

#[derive(Debug, Arbitrary)]
struct Input {
    input_values: Vec<(u32, u8)>,
    output_values: Vec<(u32, u8)>,
    block_height: i32,
    tip: i32,
}

// Addresses 0..8 are tracked by two users; 8..=255 are foreign.
fn address(id: u8) -> String {
    format!("addr{id}")
}

fuzz_target!(|input: Input| {
    let index = AddressIndex::from_users(&[
        User::new("u1").with_wallet(0, &["addr0", "addr1", "addr2", "addr3"]),
        User::new("u2").with_wallet(0, &["addr4", "addr5", "addr6", "addr7"]),
    ])
    .0;

    let raw = RawTx {
        txid: "fuzz".into(),
        hash: "fuzz".into(),
        inputs: vec![RawInput::spend("prev", 0)],
        outputs: input
            .output_values
            .iter()
            .enumerate()
            .map(|(n, (v, a))| RawOutput::new(n as u32, *v as i64, vec![address(*a)]))
            .collect(),
        block_time: None,
    };
    let resolution = InputResolution {
        resolved: input
            .input_values
            .iter()
            .map(|(v, a)| ResolvedInput {
                value: *v as i64,
                addresses: vec![address(*a)],
            })
            .collect(),
        failed: 0,
        coinbase: false,
    };

    let tracked = |(_, a): &(u32, u8)| *a < 8;
    let ours = input.input_values.iter().any(tracked) || input.output_values.iter().any(tracked);

    match match_sides(&raw, &resolution, input.block_height as i64, &index, 0) {
        Err(_) => {}
        Ok(None) => assert!(!ours),
        Ok(Some(tx)) => {
            assert!(ours);
            let fee = tx.fee;
            let views = split(tx, input.tip as i64);
            assert!(!views.is_empty() && views.len() <= 2);
            assert!(views.iter().all(|v| v.tx.fee == fee));
            assert!(views.iter().all(|v| v.status.direction() == v.direction));
        }
    }
});
