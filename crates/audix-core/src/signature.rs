//! Detached Ed25519 signatures over event hashes.
//!
//! A signature binds a signer identity to a sealed event's hex
//! digest. It is stored alongside the event but excluded from the
//! canonical form, so attaching one does not disturb the chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),
}

/// A detached signature over an event hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Signer identifier (operator id or key fingerprint).
    pub signer_id: String,
    pub signed_at: DateTime<Utc>,
    /// Hex-encoded signature bytes (64 bytes for Ed25519).
    pub signature_hex: String,
}

impl Signature {
    pub fn create(
        signer_id: impl Into<String>,
        message: &[u8],
        signing_key: &ed25519_dalek::SigningKey,
    ) -> Self {
        use ed25519_dalek::Signer;
        let signature = signing_key.sign(message);

        Self {
            signer_id: signer_id.into(),
            signed_at: Utc::now(),
            signature_hex: hex::encode(signature.to_bytes()),
        }
    }

    /// Verify against a message and public key. Malformed signature
    /// encodings are reported as `Ok(false)`; a well-formed signature
    /// that does not match the message is an error.
    pub fn verify(
        &self,
        message: &[u8],
        verifying_key: &ed25519_dalek::VerifyingKey,
    ) -> Result<bool, SignatureError> {
        let sig_bytes = match hex::decode(&self.signature_hex) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(false),
        };

        let sig_array: [u8; 64] = match sig_bytes.try_into() {
            Ok(arr) => arr,
            Err(_) => return Ok(false),
        };

        let signature = ed25519_dalek::Signature::from_bytes(&sig_array);

        match verifying_key.verify_strict(message, &signature) {
            Ok(()) => Ok(true),
            Err(e) => Err(SignatureError::VerificationFailed(e.to_string())),
        }
    }
}
