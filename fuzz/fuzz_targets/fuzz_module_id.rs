#![no_main]

use libfuzzer_sys::fuzz_target;
use trellis_bench::naming::module_id;

fuzz_target!(|name: &str| {
    let id = module_id(name);
    assert!(!id.contains(|c: char| c.is_ascii_whitespace() || c.is_ascii_punctuation()));
});
