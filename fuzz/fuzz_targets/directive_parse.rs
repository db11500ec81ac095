#![no_main]

use libfuzzer_sys::fuzz_target;
use tr_image::engine::{strip_directive, url_extension, Directive, TransformRequest};

fuzz_target!(|data: &[u8]| {
    let url = String::from_utf8_lossy(data);

    let directive = Directive::from_url(&url);
    let request = TransformRequest::from_directive(&directive);
    assert!(request.quality <= 100);
    assert!(request.width != Some(0) && request.height != Some(0));

    let _ = strip_directive(&url);
    let _ = url_extension(&url);
});
