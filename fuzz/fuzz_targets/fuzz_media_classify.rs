#![no_main]

use libfuzzer_sys::fuzz_target;

use bedrock_preview::media::{classify, extract_urls, is_image_url, is_video_url};

fuzz_target!(|data: &str| {
    let media = classify(data);

    // Every classified link is a candidate from the text and satisfies its predicate.
    let urls = extract_urls(data);
    for link in &media.video_links {
        assert!(urls.contains(&link.as_str()));
        assert!(is_video_url(link));
    }
    for link in &media.image_links {
        assert!(urls.contains(&link.as_str()));
        assert!(is_image_url(link));
    }

    assert_eq!(classify(data), media);
});
