#![no_main]

use libfuzzer_sys::fuzz_target;

use bedrock_preview::generation::bedrock::parse_invoke_response;

fuzz_target!(|data: &[u8]| {
    // Arbitrary response bodies must decode or error, never panic.
    let _ = parse_invoke_response(data);

    // Also wrap the input as an outputText to cover the success path.
    if let Ok(text) = std::str::from_utf8(data) {
        let body = serde_json::json!({"results": [{"outputText": text}]}).to_string();
        assert_eq!(parse_invoke_response(body.as_bytes()).ok().as_deref(), Some(text));
    }
});
