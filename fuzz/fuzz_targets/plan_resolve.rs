#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tr_image::engine::TransformRequest;
use tr_image::{resolve_plan, EncoderCapabilities, SourceFormat, SourceInfo};

#[derive(Arbitrary, Debug)]
struct Input {
    directive: String,
    width: u32,
    height: u32,
    png: bool,
    transparent: bool,
    caps: u8,
}

fuzz_target!(|input: Input| {
    let request = TransformRequest::from_url(&format!("https://fuzz.test/a?tr={}", input.directive));
    let source = SourceInfo {
        width: input.width,
        height: input.height,
        format: if input.png { SourceFormat::Png } else { SourceFormat::Jpeg },
        has_transparency: input.transparent,
    };
    let caps = EncoderCapabilities::from_bits_truncate(input.caps);

    if let Ok(plan) = resolve_plan(&request, &source, caps) {
        if let Some(g) = plan.geometry {
            assert!(g.resize_width >= 1 && g.resize_height >= 1);
            assert!(g.src_x >= 0.0 && g.src_y >= 0.0);
        }
    }
});
