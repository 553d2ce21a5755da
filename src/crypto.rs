use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AdsError;

type HmacSha256 = Hmac<Sha256>;

/// How long a signed state parameter stays valid.
const STATE_MAX_AGE_SECS: i64 = 600;

/// Signs and verifies the OAuth `state` parameter with HMAC-SHA256.
///
/// The payload carries `user_id:timestamp`; the signature binds the
/// callback to the user that initiated the connect flow.
pub struct StateSigner {
    key: Vec<u8>,
}

impl StateSigner {
    /// Create a signer from a base64-encoded key.
    pub fn new(secret_b64: &str) -> Result<Self, AdsError> {
        let key = base64::engine::general_purpose::STANDARD
            .decode(secret_b64)
            .map_err(|e| AdsError::Internal(format!("Invalid STATE_SECRET base64: {e}")))?;

        if key.len() < 32 {
            return Err(AdsError::Internal(format!(
                "STATE_SECRET must be at least 32 bytes, got {}",
                key.len()
            )));
        }

        Ok(Self { key })
    }

    fn mac(&self) -> Result<HmacSha256, AdsError> {
        <HmacSha256 as Mac>::new_from_slice(&self.key)
            .map_err(|e| AdsError::Internal(format!("HMAC init failed: {e}")))
    }

    /// Sign a payload. Returns base64url(hmac || payload).
    pub fn sign(&self, payload: &str) -> Result<String, AdsError> {
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();

        let mut combined = signature.to_vec();
        combined.extend_from_slice(payload.as_bytes());

        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&combined))
    }

    /// Verify a signed value and extract the payload.
    pub fn verify(&self, signed: &str) -> Result<String, AdsError> {
        let combined = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(signed)
            .map_err(|_| AdsError::InvalidState)?;

        if combined.len() < 32 {
            return Err(AdsError::InvalidState);
        }

        let (signature, payload_bytes) = combined.split_at(32);

        let mut mac = self.mac()?;
        mac.update(payload_bytes);
        mac.verify_slice(signature)
            .map_err(|_| AdsError::InvalidState)?;

        String::from_utf8(payload_bytes.to_vec()).map_err(|_| AdsError::InvalidState)
    }

    /// Issue a state parameter for a connect flow: `user_id:timestamp`, signed.
    pub fn issue(&self, user_id: &str) -> Result<String, AdsError> {
        let payload = format!("{}:{}", user_id, chrono::Utc::now().timestamp());
        self.sign(&payload)
    }

    /// Verify a callback state parameter and return the user id. Rejects
    /// states older than ten minutes.
    pub fn open(&self, signed: &str) -> Result<String, AdsError> {
        let payload = self.verify(signed)?;
        let (user_id, ts) = payload.rsplit_once(':').ok_or(AdsError::InvalidState)?;
        let ts: i64 = ts.parse().map_err(|_| AdsError::InvalidState)?;

        if chrono::Utc::now().timestamp() - ts > STATE_MAX_AGE_SECS {
            return Err(AdsError::InvalidState);
        }

        Ok(user_id.to_string())
    }
}
