//! Verification: extract the proof, recompute the hash, re-check the
//! signature.
//!
//! Both the hash check and the signature check always run when a proof
//! is present and well-formed; [`VerificationReport`] carries their
//! results independently, and the overall verdict gives hash mismatch
//! precedence over an invalid signature. A proof is never reported valid
//! unless both checks passed.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, VerifyingKey};
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;
use serde_json::Value;
use tracing::debug;

use crate::carrier::MetadataCarrier;
use crate::error::{PixsealError, Result};
use crate::hash::{canonical_hash, HashMode, HashPolicy};
use crate::proof::{canonical_unsigned_bytes, SigAlg, SignedProof};

/// Key or certificate a verifier accepts without further proof.
pub enum TrustAnchor {
    /// Accept the public key embedded in the proof itself. Sufficient
    /// for the self-contained Ed25519 scheme, where it proves possession
    /// of that key but not a pre-registered device identity.
    Embedded,
    /// PEM certificate whose public key must have produced the
    /// signature. Required for PKCS#7 proofs.
    CertificatePem(Vec<u8>),
}

/// Why verification did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    MissingProof,
    MalformedProof(String),
    UnsupportedScheme(String),
    /// The recomputed content hash differs from the signed one.
    TamperDetected { expected: String, actual: String },
    SignatureInvalid(String),
}

/// Structured verification outcome.
#[derive(Debug)]
pub struct VerificationReport {
    pub verdict: Verdict,
    /// `None` when no well-formed proof was available to check against.
    pub hash_matched: Option<bool>,
    pub signature_valid: Option<bool>,
    pub hash_mode: Option<HashMode>,
    pub proof: Option<SignedProof>,
}

impl VerificationReport {
    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }

    fn before_checks(verdict: Verdict) -> Self {
        Self {
            verdict,
            hash_matched: None,
            signature_valid: None,
            hash_mode: None,
            proof: None,
        }
    }
}

/// Verify the proof embedded in an image container.
///
/// `policy` must be the canonicalization policy used at sealing time.
/// Steps, in contract order: extract, parse/validate, recompute hash,
/// reconstruct canonical bytes, resolve key, check signature.
///
/// Returns `Err` only for verifier-side problems (e.g. a missing or
/// unreadable trust anchor); every statement about the image itself is a
/// [`Verdict`].
pub fn verify_image<C: MetadataCarrier>(
    container: &[u8],
    anchor: &TrustAnchor,
    policy: HashPolicy,
    carrier: &C,
) -> Result<VerificationReport> {
    // 1. Extract.
    let raw = match carrier.get_field(container)? {
        Some(raw) => raw,
        None => return Ok(VerificationReport::before_checks(Verdict::MissingProof)),
    };

    // 2. Parse and schema-validate.
    let value: Value = match serde_json::from_slice(&raw) {
        Ok(v) => v,
        Err(e) => {
            return Ok(VerificationReport::before_checks(Verdict::MalformedProof(
                format!("invalid JSON: {e}"),
            )))
        }
    };
    let proof = match SignedProof::from_value(value.clone()) {
        Ok(p) => p,
        Err(PixsealError::UnsupportedScheme(s)) => {
            return Ok(VerificationReport::before_checks(
                Verdict::UnsupportedScheme(s),
            ))
        }
        Err(PixsealError::MalformedProof(m)) => {
            return Ok(VerificationReport::before_checks(Verdict::MalformedProof(
                m,
            )))
        }
        Err(e) => return Err(e),
    };

    // 3. Recompute the canonical hash under the sealing-time policy.
    let recomputed = canonical_hash(container, policy);
    let hash_matched = recomputed.digest == proof.payload.image_hash;
    if !hash_matched {
        debug!(
            expected = %proof.payload.image_hash,
            actual = %recomputed.digest,
            "content hash mismatch"
        );
    }

    // 4. Reconstruct the exact bytes the signer signed.
    let canonical = canonical_unsigned_bytes(&value)?;

    // 5-6. Resolve the key and check the signature. Runs even when the
    // hash check failed, so the report carries both results.
    let signature_failure = check_signature(&proof, &canonical, anchor)?;
    let signature_valid = signature_failure.is_none();

    let verdict = if !hash_matched {
        Verdict::TamperDetected {
            expected: proof.payload.image_hash.clone(),
            actual: recomputed.digest.clone(),
        }
    } else if let Some(reason) = signature_failure {
        Verdict::SignatureInvalid(reason)
    } else {
        Verdict::Valid
    };

    Ok(VerificationReport {
        verdict,
        hash_matched: Some(hash_matched),
        signature_valid: Some(signature_valid),
        hash_mode: Some(recomputed.mode),
        proof: Some(proof),
    })
}

/// `None` means the signature checked out; `Some(reason)` is a failed
/// check. `Err` is reserved for verifier misconfiguration.
fn check_signature(
    proof: &SignedProof,
    canonical: &[u8],
    anchor: &TrustAnchor,
) -> Result<Option<String>> {
    let sig_b64 = match proof.signature_b64() {
        Some(s) => s,
        // Unreachable after validation, but never report valid on it.
        None => return Ok(Some("proof carries no signature value".into())),
    };
    let sig_bytes = match BASE64.decode(sig_b64) {
        Ok(b) => b,
        Err(e) => return Ok(Some(format!("signature is not valid base64: {e}"))),
    };

    match proof.payload.sig_alg {
        SigAlg::Ed25519 => {
            let key_b64 = match &proof.payload.public_key_b64 {
                Some(k) => k,
                None => return Ok(Some("no public key embedded in proof".into())),
            };
            let raw = match BASE64.decode(key_b64) {
                Ok(r) => r,
                Err(e) => return Ok(Some(format!("embedded public key is not valid base64: {e}"))),
            };
            let raw: [u8; 32] = match raw.try_into() {
                Ok(a) => a,
                Err(_) => return Ok(Some("embedded public key is not 32 bytes".into())),
            };
            let key = match VerifyingKey::from_bytes(&raw) {
                Ok(k) => k,
                Err(e) => return Ok(Some(format!("embedded public key is invalid: {e}"))),
            };
            let sig = match Signature::from_slice(&sig_bytes) {
                Ok(s) => s,
                Err(e) => return Ok(Some(format!("signature has wrong length: {e}"))),
            };
            match key.verify_strict(canonical, &sig) {
                Ok(()) => Ok(None),
                Err(_) => Ok(Some(
                    "Ed25519 signature does not match canonical payload".into(),
                )),
            }
        }
        SigAlg::Pkcs7RsaSha256 => {
            let cert_pem = match anchor {
                TrustAnchor::CertificatePem(pem) => pem,
                TrustAnchor::Embedded => {
                    return Err(PixsealError::KeyUnavailable(
                        "a certificate trust anchor is required for PKCS7-RSA-SHA256 proofs"
                            .into(),
                    ))
                }
            };
            let cert = X509::from_pem(cert_pem).map_err(|e| {
                PixsealError::KeyUnavailable(format!("trust anchor certificate: {e}"))
            })?;
            match verify_pkcs7(&sig_bytes, canonical, cert) {
                Ok(()) => Ok(None),
                Err(e) => Ok(Some(format!("PKCS#7 verification failed: {e}"))),
            }
        }
    }
}

fn verify_pkcs7(
    der: &[u8],
    canonical: &[u8],
    cert: X509,
) -> std::result::Result<(), openssl::error::ErrorStack> {
    let pkcs7 = Pkcs7::from_der(der)?;
    let mut store = X509StoreBuilder::new()?;
    store.add_cert(cert.clone())?;
    let mut certs = Stack::new()?;
    certs.push(cert)?;
    pkcs7.verify(
        &certs,
        &store.build(),
        Some(canonical),
        None,
        Pkcs7Flags::BINARY,
    )?;
    Ok(())
}
