#![no_main]

use libfuzzer_sys::fuzz_target;
use trellis_bench::BenchConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(document) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let entries = document.as_object().map(serde_json::Map::len);
    if let Ok(config) = BenchConfig::from_document("fuzz", document) {
        assert!(config.len() <= entries.unwrap_or(0));
        for key in config.keys() {
            let _ = config.get(key);
        }
    }
});
