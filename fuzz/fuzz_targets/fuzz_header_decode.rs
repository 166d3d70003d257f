#![no_main]

use headprobe::formats::{ImageFormat, probe};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let (format, size) = probe(data);
    assert_eq!(format, ImageFormat::classify(data));
    if !format.is_decodable() {
        assert!(size.is_zero());
    }
    if let Some(min) = format.minimum_length() {
        if data.len() < min {
            assert!(size.is_zero());
        }
    }
});
