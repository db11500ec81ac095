#![no_main]

use libfuzzer_sys::fuzz_target;
use tr_image::engine::{decode, sniff_content_type};

fuzz_target!(|data: &[u8]| {
    let Some(format) = sniff_content_type(data) else {
        return;
    };
    if format.is_passthrough() {
        return;
    }
    let _ = decode(data, format);
});
