//! HMAC-SHA256 request signing.
//!
//! Signed endpoints require a `timestamp` parameter and an HMAC-SHA256
//! signature of the full query string, appended as the final `signature`
//! parameter. The API key travels in the `x-mbx-apikey` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Build a query string from key/value pairs in insertion order.
///
/// Order matters: the signature is computed over this exact string, so the
/// `signature` parameter must be appended after signing.
pub fn build_query_string(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// HMAC-SHA256 request signer.
#[derive(Clone)]
pub struct HmacSigner {
    api_key: String,
    api_secret: String,
}

impl HmacSigner {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Add `timestamp`, sign the query string, and append `signature`.
    pub fn sign(&self, params: &mut Vec<(String, String)>, timestamp: u64) {
        params.push(("timestamp".to_string(), timestamp.to_string()));

        let query = build_query_string(params);
        let signature = self.compute_signature(&query);

        params.push(("signature".to_string(), signature));
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_key_header(&self) -> &'static str {
        "x-mbx-apikey"
    }

    fn compute_signature(&self, data: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(self.api_secret.as_bytes()).expect("HMAC can take any size");
        mac.update(data.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}
