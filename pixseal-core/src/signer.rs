//! Signature production over canonical payload bytes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::Signer as _;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use tracing::debug;

use crate::error::{PixsealError, Result};
use crate::keys::{CertificateKeyMaterial, Ed25519KeyMaterial};
use crate::proof::SigAlg;

/// Signing scheme with its key material, dispatched explicitly.
pub enum ProofSigner {
    /// Detached Ed25519 over the canonical bytes. The raw public key is
    /// embedded (base64) in the payload before signing, so verification
    /// is self-contained and needs no key registry. This proves "signed
    /// by the holder of the embedded key", not "signed by a known
    /// device"; binding to a device identity requires trust-anchoring
    /// the key out of band.
    Ed25519(Ed25519KeyMaterial),
    /// Detached PKCS#7 container (DER, RSA/SHA-256, no signed
    /// attributes). The verification key is derived from an
    /// independently distributed X.509 certificate, not from the
    /// payload.
    Pkcs7Rsa(CertificateKeyMaterial),
}

impl ProofSigner {
    pub fn sig_alg(&self) -> SigAlg {
        match self {
            ProofSigner::Ed25519(_) => SigAlg::Ed25519,
            ProofSigner::Pkcs7Rsa(_) => SigAlg::Pkcs7RsaSha256,
        }
    }

    /// Base64 public key to embed in the payload before signing.
    pub fn public_key_b64(&self) -> Result<String> {
        match self {
            ProofSigner::Ed25519(key) => Ok(BASE64.encode(key.public_key_raw())),
            ProofSigner::Pkcs7Rsa(key) => Ok(BASE64.encode(key.public_key_der()?)),
        }
    }

    /// Sign the canonical payload bytes, returning the base64 value for
    /// the scheme's signature field. Read-only over key material; no
    /// other side effects.
    pub fn sign(&self, canonical: &[u8]) -> Result<String> {
        match self {
            ProofSigner::Ed25519(key) => {
                let sig = key.signing_key().sign(canonical);
                debug!(scheme = "Ed25519", bytes = canonical.len(), "signed canonical payload");
                Ok(BASE64.encode(sig.to_bytes()))
            }
            ProofSigner::Pkcs7Rsa(key) => {
                let extra_certs = Stack::new().map_err(backend)?;
                let flags = Pkcs7Flags::DETACHED | Pkcs7Flags::BINARY | Pkcs7Flags::NOATTR;
                let pkcs7 = Pkcs7::sign(key.cert(), key.pkey(), &extra_certs, canonical, flags)
                    .map_err(backend)?;
                let der = pkcs7.to_der().map_err(backend)?;
                debug!(
                    scheme = "PKCS7-RSA-SHA256",
                    bytes = canonical.len(),
                    der_len = der.len(),
                    "signed canonical payload"
                );
                Ok(BASE64.encode(der))
            }
        }
    }
}

fn backend(e: openssl::error::ErrorStack) -> PixsealError {
    PixsealError::SigningBackend(e.to_string())
}
