//! Media link extraction
//!
//! Finds `http://` / `https://` URLs in generated text and sorts them into
//! embeddable videos and images:
//!
//! - **video**: the URL contains `youtube.com` or `vimeo.com` anywhere
//! - **image**: the URL ends with `.jpg`, `.jpeg`, `.png` or `.gif` (case-sensitive)
//!
//! Both predicates are applied independently to the same candidate list, so a
//! URL satisfying both shows up in both lists. Links matching neither are
//! dropped. Order and duplicates follow the source text.
//!
//! # Example
//!
//! ```
//! use bedrock_preview::media::classify;
//!
//! let media = classify("visit https://example.com/a.png and https://youtube.com/x");
//! assert_eq!(media.image_links, vec!["https://example.com/a.png"]);
//! assert_eq!(media.video_links, vec!["https://youtube.com/x"]);
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// `http(s)://` followed by one or more non-whitespace characters.
///
/// The ASCII information separators U+001C..U+001F also end a URL. They are
/// not Unicode `White_Space`, but text tools commonly treat them as line and
/// field breaks.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s\x1C-\x1F]+").expect("URL pattern is valid")
});

/// Hosts whose links are rendered as embedded video.
pub const VIDEO_HOSTS: &[&str] = &["youtube.com", "vimeo.com"];

/// Suffixes whose links are rendered as inline images.
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];

/// Displayable media found in a block of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaClassification {
    pub video_links: Vec<String>,
    pub image_links: Vec<String>,
}

impl MediaClassification {
    pub fn is_empty(&self) -> bool {
        self.video_links.is_empty() && self.image_links.is_empty()
    }
}

/// Every URL candidate in `text`, in order of appearance.
pub fn extract_urls(text: &str) -> Vec<&str> {
    URL_PATTERN.find_iter(text).map(|m| m.as_str()).collect()
}

pub fn is_video_url(url: &str) -> bool {
    VIDEO_HOSTS.iter().any(|host| url.contains(host))
}

pub fn is_image_url(url: &str) -> bool {
    IMAGE_EXTENSIONS.iter().any(|ext| url.ends_with(ext))
}

/// Partition the URLs in `text` into video and image links.
pub fn classify(text: &str) -> MediaClassification {
    let urls = extract_urls(text);
    MediaClassification {
        video_links: urls
            .iter()
            .filter(|url| is_video_url(url))
            .map(|url| url.to_string())
            .collect(),
        image_links: urls
            .iter()
            .filter(|url| is_image_url(url))
            .map(|url| url.to_string())
            .collect(),
    }
}
