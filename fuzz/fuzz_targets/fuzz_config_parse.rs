#![no_main]

use libfuzzer_sys::fuzz_target;

use bedrock_preview::config::parse_config;

fuzz_target!(|data: &str| {
    // Parsing arbitrary config text must never panic.
    if let Ok(cfg) = parse_config(data) {
        let _ = cfg.validate();
        let _ = cfg.aws.credentials();
    }
});
