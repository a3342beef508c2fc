//! Proof payload construction and canonical serialization.
//!
//! The canonical byte form of a payload (compact JSON, keys sorted
//! lexicographically, UTF-8) is the exact sequence the signer signs and
//! the verifier must reproduce. All payload values are strings, so the
//! encoding carries no float, locale or ordering variance and can be
//! reproduced in any language from the same key/value set.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PixsealError, Result};

/// Nonce length in bytes (32 lowercase hex characters on the wire).
pub const NONCE_BYTES: usize = 16;

/// Signature scheme identifier carried in the `sig_alg` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigAlg {
    /// Detached Ed25519 over the canonical bytes; self-contained via the
    /// embedded public key.
    #[serde(rename = "Ed25519")]
    Ed25519,
    /// Detached PKCS#7 container, RSA with SHA-256; verification key
    /// comes from an externally distributed certificate.
    #[serde(rename = "PKCS7-RSA-SHA256")]
    Pkcs7RsaSha256,
}

impl SigAlg {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigAlg::Ed25519 => "Ed25519",
            SigAlg::Pkcs7RsaSha256 => "PKCS7-RSA-SHA256",
        }
    }

    pub fn from_wire(s: &str) -> Result<Self> {
        match s {
            "Ed25519" => Ok(SigAlg::Ed25519),
            "PKCS7-RSA-SHA256" => Ok(SigAlg::Pkcs7RsaSha256),
            other => Err(PixsealError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Name of the signature field this scheme writes into the proof.
    pub fn signature_field(&self) -> &'static str {
        match self {
            SigAlg::Ed25519 => "signature",
            SigAlg::Pkcs7RsaSha256 => "signature_pkcs7",
        }
    }
}

impl fmt::Display for SigAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unsigned provenance payload. Immutable after signing; the only
/// later addition is the signature field on [`SignedProof`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPayload {
    pub device_id: String,
    /// RFC3339 UTC, second precision, literal `Z` suffix.
    pub timestamp: String,
    /// Canonical content hash, 64 lowercase hex characters.
    pub image_hash: String,
    /// Single-use randomness, 32 lowercase hex characters. Distinguishes
    /// otherwise-identical proofs; provides no secrecy.
    pub nonce: String,
    pub firmware: String,
    pub sig_alg: SigAlg,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_b64: Option<String>,
}

impl ProofPayload {
    /// Assemble a fresh payload for one capture, generating the timestamp
    /// and a CSPRNG nonce.
    pub fn build(
        device_id: &str,
        image_hash: &str,
        firmware: &str,
        sig_alg: SigAlg,
        public_key_b64: Option<String>,
    ) -> Self {
        let mut nonce = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut nonce);
        Self {
            device_id: device_id.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            image_hash: image_hash.to_string(),
            nonce: hex::encode(nonce),
            firmware: firmware.to_string(),
            sig_alg,
            public_key_b64,
        }
    }

    /// Canonical byte form of this payload; this is what gets signed.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let value = serde_json::to_value(self)
            .map_err(|e| PixsealError::Serialization(e.to_string()))?;
        canonical_json_bytes(&value)
    }
}

/// Serialize a JSON value compactly. `serde_json::Map` is BTreeMap-backed,
/// so object keys are already in lexicographic order and the compact
/// writer adds no whitespace.
pub(crate) fn canonical_json_bytes(value: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| PixsealError::Serialization(e.to_string()))
}

/// Canonical bytes of a raw proof value with its signature field(s)
/// removed. Reproduces exactly what the signer signed, including any
/// extra signed fields a newer device may have added.
pub fn canonical_unsigned_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut obj = value
        .as_object()
        .cloned()
        .ok_or_else(|| PixsealError::MalformedProof("proof is not a JSON object".into()))?;
    obj.remove("signature");
    obj.remove("signature_pkcs7");
    canonical_json_bytes(&Value::Object(obj))
}

/// A proof payload plus exactly one scheme-named signature field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedProof {
    #[serde(flatten)]
    pub payload: ProofPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_pkcs7: Option<String>,
}

impl SignedProof {
    /// Attach a signature to a payload under the field its scheme names.
    pub fn new(payload: ProofPayload, signature_b64: String) -> Self {
        match payload.sig_alg {
            SigAlg::Ed25519 => Self {
                payload,
                signature: Some(signature_b64),
                signature_pkcs7: None,
            },
            SigAlg::Pkcs7RsaSha256 => Self {
                payload,
                signature: None,
                signature_pkcs7: Some(signature_b64),
            },
        }
    }

    /// Base64 signature under the field name this proof's scheme uses.
    pub fn signature_b64(&self) -> Option<&str> {
        match self.payload.sig_alg {
            SigAlg::Ed25519 => self.signature.as_deref(),
            SigAlg::Pkcs7RsaSha256 => self.signature_pkcs7.as_deref(),
        }
    }

    /// Compact JSON as persisted in the metadata carrier.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| PixsealError::Serialization(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| PixsealError::MalformedProof(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Parse and schema-validate a raw proof value.
    ///
    /// An unknown `sig_alg` surfaces as `UnsupportedScheme`; every other
    /// violation is `MalformedProof`.
    pub fn from_value(value: Value) -> Result<Self> {
        let sig_alg = value
            .get("sig_alg")
            .and_then(Value::as_str)
            .ok_or_else(|| PixsealError::MalformedProof("missing sig_alg".into()))?;
        SigAlg::from_wire(sig_alg)?;

        let proof: SignedProof = serde_json::from_value(value)
            .map_err(|e| PixsealError::MalformedProof(e.to_string()))?;
        proof.validate()?;
        Ok(proof)
    }

    fn validate(&self) -> Result<()> {
        let p = &self.payload;
        if p.device_id.is_empty() {
            return Err(malformed("device_id is empty"));
        }
        if !is_lower_hex(&p.image_hash, 64) {
            return Err(malformed("image_hash must be 64 lowercase hex characters"));
        }
        if !is_lower_hex(&p.nonce, 2 * NONCE_BYTES) {
            return Err(malformed("nonce must be 32 lowercase hex characters"));
        }
        // Canonical form only: UTC, second precision, literal Z suffix.
        if DateTime::parse_from_rfc3339(&p.timestamp).is_err()
            || !p.timestamp.ends_with('Z')
            || p.timestamp.contains('.')
        {
            return Err(malformed(
                "timestamp must be RFC3339 UTC at second precision with a Z suffix",
            ));
        }
        match (p.sig_alg, &self.signature, &self.signature_pkcs7) {
            (SigAlg::Ed25519, Some(_), None) => Ok(()),
            (SigAlg::Pkcs7RsaSha256, None, Some(_)) => Ok(()),
            (_, None, None) => Err(malformed("proof carries no signature field")),
            _ => Err(malformed(
                "proof must carry exactly the signature field its scheme names",
            )),
        }
    }
}

fn malformed(msg: &str) -> PixsealError {
    PixsealError::MalformedProof(msg.to_string())
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len
        && s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
