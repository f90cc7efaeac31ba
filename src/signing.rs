//! TC3-HMAC-SHA256 request signing for Tencent Cloud APIs
//!
//! Pure function of its inputs: no I/O, the caller supplies the timestamp.
//! Only `content-type` and `host` are signed and the query string is always
//! empty, which is all the JSON POST APIs need.

use chrono::DateTime;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

const ALGORITHM: &str = "TC3-HMAC-SHA256";
const SIGNED_HEADERS: &str = "content-type;host";
const TERMINATOR: &str = "tc3_request";

type HmacSha256 = Hmac<Sha256>;

/// Everything that goes into one signature
#[derive(Debug, Clone)]
pub struct SigningRequest<'a> {
    pub secret_id: &'a str,
    pub secret_key: &'a str,
    pub method: &'a str,
    pub path: &'a str,
    pub content_type: &'a str,
    pub host: &'a str,
    pub service: &'a str,
    pub action: &'a str,
    pub version: &'a str,
    pub region: &'a str,
    /// Exact bytes sent as the request body
    pub body: &'a [u8],
    /// Unix timestamp in seconds
    pub timestamp: i64,
}

/// Headers to attach to a signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub host: String,
    pub action: String,
    pub version: String,
    pub timestamp: String,
    pub region: String,
}

impl SignedHeaders {
    /// Header name/value pairs in the order Tencent documents them
    #[must_use]
    pub fn pairs(&self) -> [(&'static str, &str); 6] {
        [
            ("Authorization", &self.authorization),
            ("Host", &self.host),
            ("X-TC-Action", &self.action),
            ("X-TC-Version", &self.version),
            ("X-TC-Timestamp", &self.timestamp),
            ("X-TC-Region", &self.region),
        ]
    }

    /// Attach the headers to a request
    #[must_use]
    pub fn apply(&self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (name, value) in self.pairs() {
            builder = builder.header(name, value);
        }
        builder
    }
}

/// Sign a request
///
/// # Errors
///
/// Returns [`Error::Config`] if a credential is missing or the timestamp
/// cannot be mapped to a calendar date
pub fn sign(request: &SigningRequest<'_>) -> Result<SignedHeaders> {
    if request.secret_id.trim().is_empty() || request.secret_key.trim().is_empty() {
        return Err(Error::Config(
            "Tencent Cloud credentials not configured".to_string(),
        ));
    }

    let date = utc_date(request.timestamp)?;
    let scope = credential_scope(&date, request.service);
    let canonical = canonical_request(request);
    let to_sign = string_to_sign(request.timestamp, &scope, &canonical);

    let key = signing_key(request.secret_key, &date, request.service);
    let signature = hex::encode(hmac_sha256(&key, to_sign.as_bytes()));

    Ok(SignedHeaders {
        authorization: format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            request.secret_id
        ),
        host: request.host.to_string(),
        action: request.action.to_string(),
        version: request.version.to_string(),
        timestamp: request.timestamp.to_string(),
        region: request.region.to_string(),
    })
}

fn utc_date(timestamp: i64) -> Result<String> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.format("%Y-%m-%d").to_string())
        .ok_or_else(|| Error::Config(format!("timestamp out of range: {timestamp}")))
}

fn credential_scope(date: &str, service: &str) -> String {
    format!("{date}/{service}/{TERMINATOR}")
}

fn canonical_request(request: &SigningRequest<'_>) -> String {
    let canonical_headers = format!(
        "content-type:{}\nhost:{}\n",
        request.content_type, request.host
    );
    format!(
        "{}\n{}\n\n{canonical_headers}\n{SIGNED_HEADERS}\n{}",
        request.method,
        request.path,
        sha256_hex(request.body)
    )
}

fn string_to_sign(timestamp: i64, scope: &str, canonical_request: &str) -> String {
    format!(
        "{ALGORITHM}\n{timestamp}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    )
}

fn signing_key(secret_key: &str, date: &str, service: &str) -> Vec<u8> {
    let secret_date = hmac_sha256(format!("TC3{secret_key}").as_bytes(), date.as_bytes());
    let secret_service = hmac_sha256(&secret_date, service.as_bytes());
    hmac_sha256(&secret_service, TERMINATOR.as_bytes())
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so this cannot fail
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key length")
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
