//! TC3-HMAC-SHA256 request signing for Tencent Cloud API 3.0

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::error::ApiError;

pub const ALGORITHM: &str = "TC3-HMAC-SHA256";
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";
const SIGNED_HEADERS: &str = "content-type;host";

type HmacSha256 = Hmac<Sha256>;

/// Secret pair plus optional STS token
#[derive(Clone)]
pub struct Credential {
    pub secret_id: String,
    pub secret_key: String,
    pub token: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"***")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Everything that goes into one signature
pub struct SignRequest<'a> {
    pub service: &'a str,
    pub host: &'a str,
    pub payload: &'a str,
    pub timestamp: i64,
    /// UTC date of `timestamp`, `YYYY-MM-DD`
    pub date: &'a str,
}

pub struct Signer<'a> {
    credential: &'a Credential,
}

impl<'a> Signer<'a> {
    pub fn new(credential: &'a Credential) -> Self {
        Self { credential }
    }

    /// Value for the `Authorization` header
    pub fn authorization(&self, request: &SignRequest<'_>) -> Result<String, ApiError> {
        let scope = format!("{}/{}/tc3_request", request.date, request.service);
        let canonical = canonical_request(request.host, request.payload);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            request.timestamp,
            scope,
            sha256_hex(canonical.as_bytes())
        );

        let secret_date = hmac_sha256(
            format!("TC3{}", self.credential.secret_key).as_bytes(),
            request.date.as_bytes(),
        )?;
        let secret_service = hmac_sha256(&secret_date, request.service.as_bytes())?;
        let secret_signing = hmac_sha256(&secret_service, b"tc3_request")?;
        let signature = hex::encode(hmac_sha256(&secret_signing, string_to_sign.as_bytes())?);

        Ok(format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.credential.secret_id, scope, SIGNED_HEADERS, signature
        ))
    }
}

fn canonical_request(host: &str, payload: &str) -> String {
    format!(
        "POST\n/\n\ncontent-type:{}\nhost:{}\n\n{}\n{}",
        CONTENT_TYPE,
        host,
        SIGNED_HEADERS,
        sha256_hex(payload.as_bytes())
    )
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, ApiError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| ApiError::Validation(format!("invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
