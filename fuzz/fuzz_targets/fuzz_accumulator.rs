#![no_main]

use headprobe::ChunkAccumulator;
use headprobe::formats::probe;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u8, &[u8])| {
    let (step, data) = input;
    let step = usize::from(step.max(1));

    let mut acc = ChunkAccumulator::new();
    let mut found = None;
    for slice in data.chunks(step) {
        if let Some(size) = acc.push(slice) {
            found = Some(size);
            break;
        }
    }

    if let Some(size) = found {
        assert_eq!(probe(acc.as_bytes()).1, size);
    }
});
