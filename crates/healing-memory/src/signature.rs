//! Page signatures for memory scoping
//!
//! A signature identifies a recognizable page state: the normalized URL plus
//! a short content hash of the leading DOM bytes. Heals remembered under one
//! signature are only replayed when the page looks the same again.

use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use url::Url;

/// How many leading DOM bytes participate in the signature hash.
///
/// The prefix covers the head and the opening of the body, which is where
/// template identity lives; hashing the whole document would churn the
/// signature on every dynamic list row.
pub const DOM_PREFIX_BYTES: usize = 2048;

/// Hex characters kept from the content hash.
pub const SIGNATURE_HASH_CHARS: usize = 16;

/// Normalized URL + short DOM-prefix hash
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PageSignature(pub String);

impl PageSignature {
    /// Compute the signature for a page as the driver reported it.
    pub fn compute(url: &str, dom: &str) -> Self {
        Self(format!(
            "{}::{}",
            normalize_url(url),
            dom_prefix_hash(dom)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reduce a URL to scheme, host, and path.
///
/// Query strings and fragments carry session noise (cache busters, tracking
/// parameters) and are dropped; a trailing slash is trimmed so `/checkout`
/// and `/checkout/` land on the same signature. Unparseable input is kept
/// verbatim.
fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(url) => {
            let mut path = url.path().to_string();
            if path.len() > 1 && path.ends_with('/') {
                path.pop();
            }
            match url.host_str() {
                Some(host) => {
                    let port = url
                        .port()
                        .map(|p| format!(":{p}"))
                        .unwrap_or_default();
                    format!("{}://{}{}{}", url.scheme(), host, port, path)
                }
                None => format!("{}:{}", url.scheme(), path),
            }
        }
        Err(_) => raw.trim().to_string(),
    }
}

fn dom_prefix_hash(dom: &str) -> String {
    let bytes = dom.as_bytes();
    let prefix = &bytes[..bytes.len().min(DOM_PREFIX_BYTES)];
    let mut hasher = Hasher::new();
    hasher.update(prefix);
    let hex = hasher.finalize().to_hex().to_string();
    hex[..SIGNATURE_HASH_CHARS].to_string()
}
