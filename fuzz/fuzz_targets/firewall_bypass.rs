#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tr_image::engine::{FirewallConfig, FirewallPolicy};

#[derive(Arbitrary, Debug)]
struct Input {
    policy: String,
    max_pixels: Option<u64>,
    max_bytes: Option<u64>,
    width: u32,
    height: u32,
    len: usize,
}

fuzz_target!(|input: Input| {
    let mut fw = match input.policy.parse::<FirewallPolicy>() {
        Ok(FirewallPolicy::Custom) | Err(_) => FirewallConfig::custom(),
        Ok(policy) => FirewallConfig::apply_policy(policy),
    };
    if fw.policy == FirewallPolicy::Custom {
        fw.max_pixels = input.max_pixels;
        fw.max_bytes = input.max_bytes;
    }

    let pixels = input.width as u64 * input.height as u64;
    let pixel_check = fw.enforce_pixels(input.width, input.height);
    let over_pixels = fw.enabled && fw.max_pixels.is_some_and(|max| pixels > max);
    assert_eq!(pixel_check.is_err(), over_pixels);

    let len_check = fw.enforce_source_len(input.len);
    let over_len = fw.enabled && fw.max_bytes.is_some_and(|max| input.len as u64 > max);
    assert_eq!(len_check.is_err(), over_len);
});
