//! AWS Signature Version 4 request signing for the Bedrock runtime.
//!
//! Only the subset needed for a JSON `POST` without query parameters is
//! implemented: the signed headers are `host`, `x-amz-content-sha256`,
//! `x-amz-date` and, for temporary credentials, `x-amz-security-token`.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Timestamp format used by the `x-amz-date` header.
pub const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Service name used in the credential scope.
pub const BEDROCK_SERVICE: &str = "bedrock";

/// An AWS access key pair with an optional STS session token.
///
/// The secret material is wiped from memory when the value is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &"***")
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.is_some())
            .finish()
    }
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Attach a session token. Blank tokens are ignored.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        if token.trim().is_empty() {
            self.session_token = None;
        } else {
            self.session_token = Some(token);
        }
        self
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn has_session_token(&self) -> bool {
        self.session_token.is_some()
    }

    pub(crate) fn has_access_key_id(&self) -> bool {
        !self.access_key_id.trim().is_empty()
    }

    pub(crate) fn has_secret_access_key(&self) -> bool {
        !self.secret_access_key.trim().is_empty()
    }
}

/// Signs requests for one region/host pair.
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    region: String,
    host: String,
    credentials: AwsCredentials,
}

impl SigV4Signer {
    pub fn new(region: impl Into<String>, host: impl Into<String>, credentials: AwsCredentials) -> Self {
        Self {
            region: region.into(),
            host: host.into(),
            credentials,
        }
    }

    /// Same credentials and region, different `host` header.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Produce the headers that authenticate a request.
    ///
    /// `uri_path` is the path exactly as sent on the wire (segments already
    /// percent-encoded once). `datetime` must be in [`AMZ_DATE_FORMAT`].
    pub fn sign(
        &self,
        method: &str,
        uri_path: &str,
        body: &[u8],
        datetime: &str,
    ) -> Vec<(String, String)> {
        let date = &datetime[..8.min(datetime.len())];
        let payload_hash = hex_sha256(body);

        let mut signed_header_names = vec!["host", "x-amz-content-sha256", "x-amz-date"];
        if self.credentials.session_token.is_some() {
            signed_header_names.push("x-amz-security-token");
        }
        signed_header_names.sort_unstable();

        let mut canonical_headers = String::new();
        for name in &signed_header_names {
            let value = match *name {
                "host" => self.host.as_str(),
                "x-amz-content-sha256" => payload_hash.as_str(),
                "x-amz-date" => datetime,
                "x-amz-security-token" => self.credentials.session_token.as_deref().unwrap_or(""),
                _ => "",
            };
            canonical_headers.push_str(name);
            canonical_headers.push(':');
            canonical_headers.push_str(value.trim());
            canonical_headers.push('\n');
        }
        let signed_headers = signed_header_names.join(";");

        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method,
            canonical_uri(uri_path),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date, self.region, BEDROCK_SERVICE
        );

        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            datetime,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.credentials.secret_access_key,
            date,
            &self.region,
            BEDROCK_SERVICE,
        );
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.credentials.access_key_id, credential_scope, signed_headers, signature
        );

        let mut headers = vec![
            ("host".to_string(), self.host.clone()),
            ("x-amz-date".to_string(), datetime.to_string()),
            ("x-amz-content-sha256".to_string(), payload_hash),
            ("authorization".to_string(), authorization),
        ];
        if let Some(ref token) = self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers
    }
}

/// Every service except S3 expects each path segment encoded a second time
/// in the canonical request.
fn canonical_uri(uri_path: &str) -> String {
    uri_path
        .split('/')
        .map(percent_encode_path_segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// Compute the hex-encoded SHA-256 digest of `data`.
pub(crate) fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the SigV4 signing key:
///   kDate    = HMAC("AWS4" + secret, date)
///   kRegion  = HMAC(kDate, region)
///   kService = HMAC(kRegion, service)
///   kSigning = HMAC(kService, "aws4_request")
fn derive_signing_key(secret_access_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let mut k_secret = format!("AWS4{}", secret_access_key);
    let k_date = hmac_sha256(k_secret.as_bytes(), date.as_bytes());
    k_secret.zeroize();
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Percent-encode a URI path segment (RFC 3986 unreserved characters pass through).
pub(crate) fn percent_encode_path_segment(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 2);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char)
            }
            _ => {
                result.push('%');
                result.push_str(&format!("{:02X}", byte));
            }
        }
    }
    result
}
